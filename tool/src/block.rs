use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use chrono::NaiveDateTime;
use thiserror::Error;
use util::timestamp;

// Sector layout:
// https://github.com/digitalinteraction/openmovement/blob/master/Docs/ax3/ax3-technical.md

pub const SECTOR_LEN: usize = 512;
pub const HEADER_TAG: [u8; 2] = *b"MD";
pub const DATA_TAG: [u8; 2] = *b"AX";

/// First sample byte within a data sector.
pub const PAYLOAD_OFFSET: usize = 30;
/// Bytes available for samples in one data sector.
const PAYLOAD_LEN: usize = 480;

pub type Result<T> = std::result::Result<T, BlockError>;

/// Reasons a single sector cannot be used. The caller skips the sector and
/// carries on with the next one.
#[derive(Error, Debug)]
pub enum BlockError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sector truncated to {0} bytes")]
    Truncated(usize),
    #[error("invalid calendar timestamp 0x{0:08x}")]
    InvalidTimestamp(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEncoding {
    /// Three 10 bit axes with a shared exponent in one 32 bit word.
    Packed,
    /// Three little-endian 16 bit axes.
    Raw16,
    /// Anything else. Samples decode to zero and count as data errors.
    Unknown,
}

impl SampleEncoding {
    fn of(num_axes_bps: u8) -> Self {
        match num_axes_bps & 0x0f {
            0 => SampleEncoding::Packed,
            2 => SampleEncoding::Raw16,
            _ => SampleEncoding::Unknown,
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleEncoding::Raw16 => 6,
            _ => 4,
        }
    }
}

/// Parsed header fields of one `AX` data sector.
#[derive(Debug, Clone)]
pub struct DataBlock {
    pub block_time: NaiveDateTime,
    pub temperature_c: f64,
    /// Samples per second, clamped to at least 1.
    pub freq: f64,
    /// Index within the device FIFO stream of the sample taken at
    /// `block_time`, relative to the first sample of this sector.
    pub timestamp_offset: i32,
    pub encoding: SampleEncoding,
    pub sample_count: usize,
}

impl DataBlock {
    /// Most samples a sector of this encoding can carry.
    pub fn max_samples(&self) -> usize {
        PAYLOAD_LEN / self.encoding.bytes_per_sample()
    }
}

/// Read the planned session start out of the `MD` header sector.
/// An undecodable start time is treated as absent, not as an error.
pub fn parse_header_block(buf: &[u8]) -> Result<Option<NaiveDateTime>> {
    if buf.len() < SECTOR_LEN {
        return Err(BlockError::Truncated(buf.len()));
    }
    let mut cursor = Cursor::new(buf);
    cursor.set_position(13);
    let word = cursor.read_u32::<LittleEndian>()?;
    Ok(timestamp::decode_calendar(word))
}

pub fn parse_data_block(buf: &[u8]) -> Result<DataBlock> {
    if buf.len() < SECTOR_LEN {
        return Err(BlockError::Truncated(buf.len()));
    }
    let mut cursor = Cursor::new(buf);

    cursor.set_position(4);
    let old_device_id = cursor.read_u16::<LittleEndian>()?;

    cursor.set_position(14);
    let timestamp_word = cursor.read_u32::<LittleEndian>()?;

    cursor.set_position(20);
    let raw_temperature = cursor.read_u16::<LittleEndian>()?;

    cursor.set_position(24);
    let rate_code = cursor.read_u8()?;
    let num_axes_bps = cursor.read_u8()?;
    let word26 = cursor.read_u16::<LittleEndian>()?;
    let sample_count = cursor.read_u16::<LittleEndian>()?;

    let mut timestamp_offset;
    let freq;
    let fractional;
    if rate_code != 0 {
        timestamp_offset = i32::from(word26 as i16);
        // 3200 Hz at code 14, halving with each code below
        freq = 3200.0 * 2f64.powi(i32::from(rate_code & 15) - 14);
        if old_device_id & 0x8000 != 0 {
            // The top bit marks a fractional block timestamp stashed in the
            // device id word. The firmware also folded the fraction into the
            // timestamp offset for old readers, so take that back out.
            fractional = (old_device_id & 0x7fff) << 1;
            timestamp_offset += (i32::from(fractional) * freq as i32) >> 16;
        } else {
            fractional = 0;
        }
    } else {
        // legacy encoding, the word at 26 is the rate itself
        timestamp_offset = 0;
        freq = f64::from(word26 as i16);
        fractional = 0;
    }
    let freq = if freq <= 0.0 { 1.0 } else { freq };

    let encoding = SampleEncoding::of(num_axes_bps);
    let sample_count = (sample_count as usize).min(PAYLOAD_LEN / encoding.bytes_per_sample());

    let calendar = timestamp::decode_calendar(timestamp_word)
        .ok_or(BlockError::InvalidTimestamp(timestamp_word))?;
    let block_time = timestamp::with_fractional(calendar, fractional);

    Ok(DataBlock {
        block_time,
        temperature_c: (f64::from(raw_temperature) * 150.0 - 20500.0) / 1000.0,
        freq,
        timestamp_offset,
        encoding,
        sample_count,
    })
}
