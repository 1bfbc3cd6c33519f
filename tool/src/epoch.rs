use chrono::{Duration, NaiveDateTime, Timelike};
use util::lowpass::LowPassFilter;
use util::resample;
use util::timestamp::nanos_between;

#[derive(Debug, Clone)]
pub struct EpochSettings {
    /// Seconds per summary window.
    pub epoch_period: i64,
    /// chrono format pattern for the Time column.
    pub time_format: String,
    /// Low-pass the activity metric before truncation.
    pub filter: bool,
    pub start_epoch_whole_minute: bool,
    pub start_epoch_whole_second: bool,
    /// Only keep windows where the device barely moved, and add the
    /// per-axis mean columns for them.
    pub stationary_only: bool,
    pub stationary_std: f64,
}

impl Default for EpochSettings {
    fn default() -> Self {
        Self {
            epoch_period: 5,
            time_format: "%Y-%m-%d %H:%M:%S%.3f".into(),
            filter: true,
            start_epoch_whole_minute: false,
            start_epoch_whole_second: false,
            stationary_only: false,
            stationary_std: 0.013,
        }
    }
}

/// One summary row of the output file.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochRow {
    pub time: String,
    pub enmo_trunc: f64,
    pub mean: [f64; 3],
    pub range: [f64; 3],
    pub std_dev: [f64; 3],
    pub temperature_c: f64,
    /// Resampled grid length.
    pub samples: usize,
    pub data_errors: u32,
    pub clips_before: u32,
    pub clips_after: u32,
    /// Buffered sample count before resampling.
    pub raw_samples: usize,
}

pub fn csv_header(stationary_only: bool) -> Vec<&'static str> {
    let mut columns = vec!["Time", "enmoTrunc"];
    if stationary_only {
        columns.extend(["xMean", "yMean", "zMean"]);
    }
    columns.extend([
        "xRange",
        "yRange",
        "zRange",
        "xStd",
        "yStd",
        "zStd",
        "temp",
        "samples",
        "dataErrors",
        "clipsBeforeCalibr",
        "clipsAfterCalibr",
        "rawSamples",
    ]);
    columns
}

impl EpochRow {
    pub fn to_record(&self, stationary_only: bool) -> Vec<String> {
        let mut record = vec![self.time.clone(), format_ceil(self.enmo_trunc, 6)];
        if stationary_only {
            for mean in &self.mean {
                record.push(format_ceil(*mean, 6));
            }
        }
        for range in &self.range {
            record.push(format_ceil(*range, 6));
        }
        for std_dev in &self.std_dev {
            record.push(format_ceil(*std_dev, 6));
        }
        record.push(format_ceil(self.temperature_c, 2));
        record.push(self.samples.to_string());
        record.push(self.data_errors.to_string());
        record.push(self.clips_before.to_string());
        record.push(self.clips_after.to_string());
        record.push(self.raw_samples.to_string());
        record
    }
}

/// Round toward positive infinity at the given number of fractional digits.
pub fn format_ceil(value: f64, digits: usize) -> String {
    if !value.is_finite() {
        return format!("{}", value);
    }
    // Decide on the decimal expansion a few digits past the cut, so values
    // that print exactly (like 0.013) are not bumped by representation noise.
    let extended = format!("{:.*}", digits + 9, value);
    let kept_len = extended.len() - 9;
    let round_up = value > 0.0 && extended.as_bytes()[kept_len..].iter().any(|b| *b != b'0');
    let mut out = extended.as_bytes()[..kept_len].to_vec();
    if round_up {
        let mut i = out.len();
        while i > 0 {
            i -= 1;
            if out[i] == b'.' {
                continue;
            }
            if out[i] == b'9' {
                out[i] = b'0';
            } else {
                out[i] += 1;
                break;
            }
            if i == 0 {
                out.insert(0, b'1');
            }
        }
    }
    let mut result: String = out.iter().map(|b| *b as char).collect();
    if result.starts_with('-') && result[1..].bytes().all(|b| b == b'0' || b == b'.') {
        result.remove(0);
    }
    result
}

struct AxisStats {
    mean: f64,
    range: f64,
    std_dev: f64,
}

// over the non-NaN points; population standard deviation
fn axis_stats(values: &[f64]) -> AxisStats {
    let mut count = 0u32;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &value in values {
        if value.is_nan() {
            continue;
        }
        count += 1;
        sum += value;
        if value < min {
            min = value;
        }
        if value > max {
            max = value;
        }
    }
    if count == 0 {
        return AxisStats { mean: 0.0, range: 0.0, std_dev: 0.0 };
    }
    let mean = sum / f64::from(count);
    let mut squares = 0.0;
    for &value in values {
        if !value.is_nan() {
            let deviation = value - mean;
            squares += deviation * deviation;
        }
    }
    AxisStats {
        mean,
        range: max - min,
        std_dev: (squares / f64::from(count)).sqrt(),
    }
}

/// Rolling summary window. Calibrated samples are appended in time order;
/// the row for a window comes out of the `push` that first lands past it.
pub struct EpochAggregator {
    settings: EpochSettings,
    /// Nominal rate of the sector currently feeding the buffer, used as the
    /// resampling target.
    pub freq: f64,
    session_start: Option<NaiveDateTime>,
    epoch_start: Option<NaiveDateTime>,
    start_offset: Duration,
    time_ms: Vec<f64>,
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
    temperature_sum: f64,
    temperature_count: u32,
    pub data_errors: u32,
    pub clips_before: u32,
    pub clips_after: u32,
}

impl EpochAggregator {
    pub fn new(settings: EpochSettings) -> Self {
        Self {
            settings,
            freq: 100.0,
            session_start: None,
            epoch_start: None,
            start_offset: Duration::zero(),
            time_ms: Vec::new(),
            x: Vec::new(),
            y: Vec::new(),
            z: Vec::new(),
            temperature_sum: 0.0,
            temperature_count: 0,
            data_errors: 0,
            clips_before: 0,
            clips_after: 0,
        }
    }

    /// Planned session start from the header sector. Rows are labeled on its
    /// grid when it sits within 15 s of the first sample.
    pub fn set_session_start(&mut self, start: Option<NaiveDateTime>) {
        self.session_start = start;
    }

    pub fn epoch_start(&self) -> Option<NaiveDateTime> {
        self.epoch_start
    }

    pub fn push(
        &mut self,
        time: NaiveDateTime,
        sample: [f64; 3],
        temperature_c: f64,
    ) -> Option<EpochRow> {
        let mut window = match self.epoch_start {
            Some(window) => window,
            None => self.start_window(time),
        };

        let period = self.settings.epoch_period;
        let current_period = time.signed_duration_since(window).num_seconds();

        let mut emitted = None;
        if current_period >= 2 * period {
            // a recording gap: finish the window we were filling, then jump
            // straight to the window the new sample belongs to. The skipped
            // windows had no data and get no rows.
            if !self.time_ms.is_empty() {
                emitted = self.flush(window);
            }
            window = window + Duration::seconds((current_period / period) * period);
        } else if current_period >= period {
            emitted = self.flush(window);
            window = window + Duration::seconds(period);
        }
        self.epoch_start = Some(window);

        self.time_ms.push(nanos_between(time, window) as f64 / 1e6);
        self.x.push(sample[0]);
        self.y.push(sample[1]);
        self.z.push(sample[2]);
        self.temperature_sum += temperature_c;
        self.temperature_count += 1;
        emitted
    }

    /// Flush the trailing partial window at end of stream.
    pub fn finish(&mut self) -> Option<EpochRow> {
        let window = self.epoch_start?;
        let emitted = self.flush(window);
        self.epoch_start = Some(window + Duration::seconds(self.settings.epoch_period));
        emitted
    }

    fn start_window(&mut self, first_sample: NaiveDateTime) -> NaiveDateTime {
        let mut window = first_sample;
        if self.settings.start_epoch_whole_minute {
            window = window
                .with_second(0)
                .and_then(|t| t.with_nanosecond(0))
                .unwrap_or(window);
        } else if self.settings.start_epoch_whole_second {
            window = window.with_nanosecond(0).unwrap_or(window);
        }
        self.start_offset = match self.session_start {
            Some(session) => {
                let offset = session.signed_duration_since(window);
                if offset.num_milliseconds().abs() <= 15_000 {
                    offset
                } else {
                    Duration::zero()
                }
            }
            None => Duration::zero(),
        };
        self.epoch_start = Some(window);
        window
    }

    fn flush(&mut self, window: NaiveDateTime) -> Option<EpochRow> {
        let emitted = self.summarize(window);
        self.time_ms.clear();
        self.x.clear();
        self.y.clear();
        self.z.clear();
        self.temperature_sum = 0.0;
        self.temperature_count = 0;
        self.data_errors = 0;
        self.clips_before = 0;
        self.clips_after = 0;
        emitted
    }

    fn summarize(&self, window: NaiveDateTime) -> Option<EpochRow> {
        let grid_len = (self.settings.epoch_period as f64 * self.freq) as usize;
        if grid_len == 0 || self.time_ms.is_empty() {
            return None;
        }

        let step_ms = 1000.0 / self.freq;
        let start = self.time_ms[0];
        let grid: Vec<f64> = (0..grid_len)
            .map(|i| (i as f64).mul_add(step_ms, start))
            .collect();
        let x = resample::interp(&self.time_ms, &self.x, &grid);
        let y = resample::interp(&self.time_ms, &self.y, &grid);
        let z = resample::interp(&self.time_ms, &self.z, &grid);

        let stats = [axis_stats(&x), axis_stats(&y), axis_stats(&z)];

        if self.settings.stationary_only
            && !stats.iter().all(|s| s.std_dev < self.settings.stationary_std)
        {
            return None;
        }

        // an axis that reads dead flat far away from anything gravity could
        // produce is stuck, not stationary
        let mut data_errors = self.data_errors;
        for stat in &stats {
            if stat.std_dev == 0.0 && stat.mean.abs() > 1.5 {
                data_errors += 1;
            }
        }

        let mut magnitude = Vec::with_capacity(grid_len);
        for i in 0..grid_len {
            if x[i].is_nan() {
                continue;
            }
            magnitude.push((x[i] * x[i] + y[i] * y[i] + z[i] * z[i]).sqrt() - 1.0);
        }
        if self.settings.filter {
            LowPassFilter::new(self.freq).filter(&mut magnitude);
        }
        let enmo_trunc = if magnitude.is_empty() {
            0.0
        } else {
            magnitude.iter().map(|v| v.max(0.0)).sum::<f64>() / magnitude.len() as f64
        };

        let temperature_c = if self.temperature_count == 0 {
            0.0
        } else {
            self.temperature_sum / f64::from(self.temperature_count)
        };

        Some(EpochRow {
            time: (window + self.start_offset)
                .format(&self.settings.time_format)
                .to_string(),
            enmo_trunc,
            mean: [stats[0].mean, stats[1].mean, stats[2].mean],
            range: [stats[0].range, stats[1].range, stats[2].range],
            std_dev: [stats[0].std_dev, stats[1].std_dev, stats[2].std_dev],
            temperature_c,
            samples: grid_len,
            data_errors,
            clips_before: self.clips_before,
            clips_after: self.clips_after,
            raw_samples: self.time_ms.len(),
        })
    }
}
