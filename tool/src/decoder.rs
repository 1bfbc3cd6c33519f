use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Cursor, ErrorKind, Read, Write};
use std::path::Path;

use anyhow::Context;
use byteorder::{LittleEndian, ReadBytesExt};
use util::packed;

use crate::block::{self, DataBlock, SampleEncoding, PAYLOAD_OFFSET, SECTOR_LEN};
use crate::calibration::Calibration;
use crate::epoch::{self, EpochAggregator, EpochSettings};
use crate::timeline::{BlockSpan, BlockTimeline};

#[derive(Debug, Clone, Default)]
pub struct DecoderSettings {
    pub epoch: EpochSettings,
    pub calibration: Calibration,
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Summary {
    pub sectors: usize,
    pub data_blocks: usize,
    pub skipped_blocks: usize,
    pub rows: usize,
}

/// Convert a recording file into a CSV of epoch summaries.
pub fn run(input: &Path, output: &Path, settings: &DecoderSettings) -> anyhow::Result<Summary> {
    let metadata = fs::metadata(input)
        .with_context(|| format!("unable to read metadata of {}", input.display()))?;
    let file =
        File::open(input).with_context(|| format!("unable to open {}", input.display()))?;
    let out =
        File::create(output).with_context(|| format!("unable to create {}", output.display()))?;

    process(
        BufReader::new(file),
        Some(metadata.len() / SECTOR_LEN as u64),
        BufWriter::new(out),
        settings,
    )
}

/// Stream 512 byte sectors from `input` and write summary rows to `out`.
/// Unusable sectors are reported on stderr and skipped; only I/O failures
/// end processing early.
pub fn process<R: Read, W: Write>(
    mut input: R,
    total_sectors: Option<u64>,
    out: W,
    settings: &DecoderSettings,
) -> anyhow::Result<Summary> {
    let mut writer = csv::Writer::from_writer(out);
    let mut timeline = BlockTimeline::new();
    let mut aggregator = EpochAggregator::new(settings.epoch.clone());
    let mut header_written = false;
    let mut summary = Summary::default();
    let mut last_percent = 0;

    let mut sector = [0u8; SECTOR_LEN];
    loop {
        match input.read_exact(&mut sector) {
            Ok(()) => {}
            // a trailing partial sector ends the stream
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(err).context("read failed"),
        }
        summary.sectors += 1;

        match [sector[0], sector[1]] {
            block::HEADER_TAG => match block::parse_header_block(&sector) {
                Ok(session_start) => {
                    aggregator.set_session_start(session_start);
                    ensure_header(&mut writer, &mut header_written, settings)?;
                }
                Err(err) => {
                    summary.skipped_blocks += 1;
                    eprintln!("skipping header sector: {}", err);
                }
            },
            block::DATA_TAG => match block::parse_data_block(&sector) {
                Ok(data) => {
                    summary.data_blocks += 1;
                    let span = timeline.resolve(&data);
                    aggregator.freq = data.freq;
                    summary.rows += feed_block(
                        &sector,
                        &data,
                        &span,
                        settings,
                        &mut aggregator,
                        &mut writer,
                        &mut header_written,
                    )?;
                }
                // the sector is abandoned and the anchor stays where it was
                Err(err) => {
                    summary.skipped_blocks += 1;
                    eprintln!("skipping sector {}: {}", summary.sectors - 1, err);
                }
            },
            _ => {}
        }

        if settings.verbose {
            if let Some(total) = total_sectors {
                if total > 0 {
                    let percent = summary.sectors * 100 / total as usize;
                    if percent != last_percent && percent % 10 == 0 {
                        println!("{}%", percent);
                        last_percent = percent;
                    }
                }
            }
        }
    }

    if let Some(row) = aggregator.finish() {
        ensure_header(&mut writer, &mut header_written, settings)?;
        writer.write_record(row.to_record(settings.epoch.stationary_only))?;
        summary.rows += 1;
    }
    writer.flush()?;
    Ok(summary)
}

fn ensure_header<W: Write>(
    writer: &mut csv::Writer<W>,
    header_written: &mut bool,
    settings: &DecoderSettings,
) -> anyhow::Result<()> {
    if !*header_written {
        writer.write_record(epoch::csv_header(settings.epoch.stationary_only))?;
        *header_written = true;
    }
    Ok(())
}

fn feed_block<W: Write>(
    sector: &[u8],
    data: &DataBlock,
    span: &BlockSpan,
    settings: &DecoderSettings,
    aggregator: &mut EpochAggregator,
    writer: &mut csv::Writer<W>,
    header_written: &mut bool,
) -> anyhow::Result<usize> {
    let mut rows = 0;
    let bytes_per_sample = data.encoding.bytes_per_sample();
    for index in 0..data.sample_count {
        let offset = PAYLOAD_OFFSET + index * bytes_per_sample;
        let mut cursor = Cursor::new(&sector[offset..offset + bytes_per_sample]);
        let raw = match data.encoding {
            SampleEncoding::Packed => packed::unpack_triplet(cursor.read_u32::<LittleEndian>()?),
            SampleEncoding::Raw16 => (
                cursor.read_i16::<LittleEndian>()?,
                cursor.read_i16::<LittleEndian>()?,
                cursor.read_i16::<LittleEndian>()?,
            ),
            SampleEncoding::Unknown => {
                aggregator.data_errors += 1;
                (0, 0, 0)
            }
        };
        // raw axis units are 1/256 g
        let sample = [
            f64::from(raw.0) / 256.0,
            f64::from(raw.1) / 256.0,
            f64::from(raw.2) / 256.0,
        ];
        let (calibrated, clipped) = settings.calibration.apply(sample, data.temperature_c);
        if clipped.before {
            aggregator.clips_before += 1;
        }
        if clipped.after {
            aggregator.clips_after += 1;
        }

        let time = span.sample_time(index, data.sample_count);
        if let Some(row) = aggregator.push(time, calibrated, data.temperature_c) {
            ensure_header(writer, header_written, settings)?;
            writer.write_record(row.to_record(settings.epoch.stationary_only))?;
            rows += 1;
        }
    }
    Ok(rows)
}
