use chrono::{Duration, NaiveDateTime};
use util::timestamp::{nanos_between, seconds_to_nanos};

use crate::block::DataBlock;

/// Time span covered by the samples of one data sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    pub first: NaiveDateTime,
    pub last: NaiveDateTime,
}

impl BlockSpan {
    /// Time of sample `index` of `count`, linear across the span.
    pub fn sample_time(&self, index: usize, count: usize) -> NaiveDateTime {
        let span = nanos_between(self.last, self.first);
        self.first + Duration::nanoseconds(index as i64 * span / count as i64)
    }
}

/// Anchor state carried across data sectors.
///
/// Each sector names the FIFO index of the sample taken at its own
/// timestamp. Two consecutive (time, index) pairs pin down the true
/// per-sample period without accumulating rounding error, which beats
/// trusting the nominal rate.
#[derive(Debug, Clone, Default)]
pub struct BlockTimeline {
    anchor: Option<(NaiveDateTime, i32)>,
}

impl BlockTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the sample span of `block` and move the anchor onto it.
    pub fn resolve(&mut self, block: &DataBlock) -> BlockSpan {
        let span = self.resolve_span(block);
        self.anchor = Some((
            block.block_time,
            block.timestamp_offset - block.sample_count as i32,
        ));
        span
    }

    fn resolve_span(&self, block: &DataBlock) -> BlockSpan {
        if let Some((anchor_time, anchor_index)) = self.anchor {
            let span_to_sample = nanos_between(block.block_time, anchor_time);
            // an anchor further away than two sectors of samples means the
            // recording was interrupted, the pair no longer measures the rate
            let longest_usable = (2.0 * block.max_samples() as f64 * 1e9 / block.freq) as i64;
            if block.timestamp_offset > anchor_index
                && span_to_sample > 0
                && span_to_sample <= longest_usable
            {
                let index_span = i64::from(block.timestamp_offset - anchor_index);
                let to_first = -i64::from(anchor_index) * span_to_sample / index_span;
                let to_last = to_first + block.sample_count as i64 * span_to_sample / index_span;
                let first = anchor_time + Duration::nanoseconds(to_first);
                let last = anchor_time + Duration::nanoseconds(to_last);
                if first < last {
                    return BlockSpan { first, last };
                }
            }
        }
        // no usable anchor, trust the sector's own timestamp and rate
        let first = block.block_time
            + Duration::nanoseconds(seconds_to_nanos(
                -f64::from(block.timestamp_offset) / block.freq,
            ));
        let last = first
            + Duration::nanoseconds(seconds_to_nanos(block.sample_count as f64 / block.freq));
        BlockSpan { first, last }
    }
}
