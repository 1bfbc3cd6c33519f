use clap::Parser;
use std::path::PathBuf;
use tool::calibration::Calibration;
use tool::decoder::{run, DecoderSettings};
use tool::epoch::EpochSettings;

#[derive(Parser, Debug)]
#[command(author, about = "Summarize AX3 CWA accelerometer recordings into epoch CSV files", long_about = None)]
struct Args {
    /// Path to the CWA recording
    filepath: PathBuf,

    /// Output CSV path. Defaults to the input path with a csv extension
    #[arg(short, long)]
    output_file: Option<PathBuf>,

    /// Print progress while processing
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Seconds per epoch
    #[arg(short, long, default_value_t = 5)]
    epoch_period: i64,

    /// chrono format pattern for the Time column
    #[arg(long, default_value = "%Y-%m-%d %H:%M:%S%.3f")]
    time_format: String,

    /// Disable the low pass filter on the activity metric
    #[arg(long, default_value_t = false)]
    no_filter: bool,

    /// Align the first epoch to a whole minute
    #[arg(long, default_value_t = false)]
    start_epoch_whole_minute: bool,

    /// Align the first epoch to a whole second
    #[arg(long, default_value_t = false)]
    start_epoch_whole_second: bool,

    /// Only write stationary epochs and add the mean columns. Forces a 10 s epoch
    #[arg(long, default_value_t = false)]
    stationary: bool,

    /// Per-axis standard deviation limit for stationary epochs
    #[arg(long, default_value_t = 0.013)]
    stationary_std: f64,

    /// Calibration intercept per axis, in g
    #[arg(long, default_value_t = 0.0)]
    x_intercept: f64,
    #[arg(long, default_value_t = 0.0)]
    y_intercept: f64,
    #[arg(long, default_value_t = 0.0)]
    z_intercept: f64,

    /// Calibration slope per axis
    #[arg(long, default_value_t = 1.0)]
    x_slope: f64,
    #[arg(long, default_value_t = 1.0)]
    y_slope: f64,
    #[arg(long, default_value_t = 1.0)]
    z_slope: f64,

    /// Temperature coefficient per axis, in g per degree
    #[arg(long, default_value_t = 0.0)]
    x_temp: f64,
    #[arg(long, default_value_t = 0.0)]
    y_temp: f64,
    #[arg(long, default_value_t = 0.0)]
    z_temp: f64,

    /// Temperature the calibration was estimated at
    #[arg(long, default_value_t = 0.0)]
    mean_temp: f64,

    /// Sensor full-scale range in g
    #[arg(long, default_value_t = 8.0)]
    range: f64,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let output = args
        .output_file
        .clone()
        .unwrap_or_else(|| args.filepath.with_extension("csv"));

    let settings = DecoderSettings {
        epoch: EpochSettings {
            epoch_period: if args.stationary { 10 } else { args.epoch_period },
            time_format: args.time_format.clone(),
            filter: !args.no_filter,
            start_epoch_whole_minute: args.start_epoch_whole_minute,
            start_epoch_whole_second: args.start_epoch_whole_second,
            stationary_only: args.stationary,
            stationary_std: args.stationary_std,
        },
        calibration: Calibration {
            intercept: [args.x_intercept, args.y_intercept, args.z_intercept],
            slope: [args.x_slope, args.y_slope, args.z_slope],
            temp_coef: [args.x_temp, args.y_temp, args.z_temp],
            mean_temp: args.mean_temp,
            range: args.range,
        },
        verbose: args.verbose,
    };

    println!("Reading CWA from {} ...", args.filepath.display());
    let summary = run(&args.filepath, &output, &settings)?;

    println!(
        "{} sectors in, {} rows out to {}",
        summary.sectors,
        summary.rows,
        output.display()
    );
    if summary.skipped_blocks > 0 {
        println!("{} unusable sectors were skipped", summary.skipped_blocks);
    }

    Ok(())
}
