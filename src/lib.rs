//! Compressed encoding and interval log parsing for HdrHistogram snapshots.
//!
//! HdrHistogram is a latency histogram that keeps a fixed-size array of counts whose layout is
//! fully determined by three parameters: the lowest and highest trackable values and the number
//! of significant figures to maintain. Because the layout is implied by those parameters, a
//! histogram can be persisted as those three numbers, the total count, and the raw counts array,
//! and then compressed very effectively since most counts are usually zero.
//!
//! This crate implements that persistence format and the text log format that embeds many such
//! snapshots over time:
//!
//! - `serialization::compressed` turns a histogram into a zlib-compressed, cookie-tagged envelope
//!   and back.
//! - `serialization::base64_codec` maps envelopes to printable text.
//! - `serialization::log` reads and writes interval logs, where every line carries the timing of
//!   one interval and the Base64 text of its histogram.
//!
//! The codec does not care how a histogram does its bucket math. It reads a snapshot through the
//! `HistogramSnapshot` trait and builds new histograms through `DecodableHistogram`, so it can be
//! plugged into any histogram that exposes its counts array. `Histogram` is a minimal
//! implementation that only knows how to size that array.
//!
//! # Example
//!
//! ```
//! use hdrhistogram_log::Histogram;
//! use hdrhistogram_log::serialization::compressed;
//!
//! let mut h = Histogram::new_with_bounds(1, 3_600_000_000, 3).unwrap();
//! h.set_count_at_index(17, 4).unwrap();
//! h.set_total_count(4);
//!
//! let bytes = compressed::encode(&h).unwrap();
//! let decoded: Histogram = compressed::decode(&bytes).unwrap();
//!
//! assert_eq!(h, decoded);
//! ```

#![deny(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_results
)]

mod errors;
pub use self::errors::{CreationError, ErrorKind};

pub mod serialization;
pub use self::serialization::{DecodableHistogram, HistogramSnapshot};

/// A histogram counts array together with the configuration that determines its length.
///
/// Only the parts needed to persist and restore a histogram are here: the configuration, the
/// total count, and index-based access to the counts. Mapping values to indexes is left to the
/// histogram implementation that owns the data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    lowest_trackable_value: i64,
    highest_trackable_value: i64,
    significant_figures: i32,

    unit_magnitude: u32,
    sub_bucket_half_count_magnitude: u32,
    sub_bucket_count: usize,
    bucket_count: usize,

    total_count: i64,
    counts: Vec<i64>,
}

impl Histogram {
    /// Construct a histogram covering `[lowest_trackable_value, highest_trackable_value]` with
    /// `significant_figures` digits of precision.
    ///
    /// `lowest_trackable_value` must be >= 1 and is effectively rounded down to the nearest power
    /// of two. `highest_trackable_value` must be >= 2 * `lowest_trackable_value`.
    /// `significant_figures` must be between 1 and 5.
    pub fn new_with_bounds(
        lowest_trackable_value: i64,
        highest_trackable_value: i64,
        significant_figures: i32,
    ) -> Result<Histogram, CreationError> {
        if lowest_trackable_value < 1 {
            return Err(CreationError::LowIsZero);
        }
        if lowest_trackable_value > i64::max_value() / 2 {
            // avoid overflow in 2 * low
            return Err(CreationError::LowExceedsMax);
        }
        if highest_trackable_value < 2 * lowest_trackable_value {
            return Err(CreationError::HighLessThanTwiceLow);
        }
        if significant_figures < 1 || significant_figures > 5 {
            return Err(CreationError::SigFigOutOfRange);
        }

        // Given a 3 decimal point accuracy, the expectation is obviously for "+/- 1 unit at 1000".
        // It also means that it's "ok to be +/- 2 units at 2000". The "tricky" thing is that it is
        // NOT ok to be +/- 2 units at 1999. Only starting at 2000. So internally, we need to
        // maintain single unit resolution to 2x 10^decimal_points.
        let largest_value_with_single_unit_resolution = 2 * 10_i64.pow(significant_figures as u32);

        // floor(log2(lowest)), lowest is >= 1
        let unit_magnitude = 63 - lowest_trackable_value.leading_zeros();

        // ceil(log2(largest)), largest is >= 20
        let sub_bucket_count_magnitude =
            64 - (largest_value_with_single_unit_resolution - 1).leading_zeros();
        let sub_bucket_half_count_magnitude = sub_bucket_count_magnitude.max(1) - 1;

        if unit_magnitude + sub_bucket_half_count_magnitude > 61 {
            return Err(CreationError::CannotRepresentSigFigBeyondLow);
        }

        let sub_bucket_count = 1_usize << (sub_bucket_half_count_magnitude + 1);
        let bucket_count = buckets_to_cover(
            highest_trackable_value,
            sub_bucket_count as i64,
            unit_magnitude,
        );

        let len = (bucket_count + 1)
            .checked_mul(sub_bucket_count / 2)
            .ok_or(CreationError::UsizeTypeTooSmall)?;

        let mut counts = Vec::new();
        counts
            .try_reserve_exact(len)
            .map_err(|_| CreationError::AllocationFailed)?;
        counts.resize(len, 0);

        Ok(Histogram {
            lowest_trackable_value,
            highest_trackable_value,
            significant_figures,
            unit_magnitude,
            sub_bucket_half_count_magnitude,
            sub_bucket_count,
            bucket_count,
            total_count: 0,
            counts,
        })
    }

    /// Get the length of the counts array.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns true if no counts have been set and the total count is zero.
    pub fn is_empty(&self) -> bool {
        self.total_count == 0 && self.counts.iter().all(|&c| c == 0)
    }

    /// Get the configured lowest trackable value.
    pub fn lowest_trackable_value(&self) -> i64 {
        self.lowest_trackable_value
    }

    /// Get the configured highest trackable value.
    pub fn highest_trackable_value(&self) -> i64 {
        self.highest_trackable_value
    }

    /// Get the configured number of significant figures.
    pub fn significant_figures(&self) -> i32 {
        self.significant_figures
    }

    /// Number of buckets, each covering twice the range of the previous one.
    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    /// Number of sub-buckets in each bucket.
    pub fn sub_bucket_count(&self) -> usize {
        self.sub_bucket_count
    }

    /// The total count as last set.
    ///
    /// Setting individual counts does not adjust this; see `set_total_count` and
    /// `restat_total_count`.
    pub fn total_count(&self) -> i64 {
        self.total_count
    }

    /// Overwrite the total count.
    pub fn set_total_count(&mut self, total_count: i64) {
        self.total_count = total_count;
    }

    /// Recompute the total count as the saturating sum of all counts.
    pub fn restat_total_count(&mut self) {
        self.total_count = self
            .counts
            .iter()
            .fold(0_i64, |acc, &c| acc.saturating_add(c));
    }

    /// Get the count at `index`, or `None` if the index is outside the counts array.
    pub fn count_at_index(&self, index: usize) -> Option<i64> {
        self.counts.get(index).cloned()
    }

    /// Set the count at `index`.
    ///
    /// Returns an error if the index is outside the counts array.
    pub fn set_count_at_index(&mut self, index: usize, count: i64) -> Result<(), ()> {
        let c = self.counts.get_mut(index).ok_or(())?;
        *c = count;
        Ok(())
    }

    /// The counts array.
    pub fn counts(&self) -> &[i64] {
        &self.counts
    }

    /// Smallest value whose power-of-two magnitude is tracked with unit resolution.
    pub fn unit_magnitude(&self) -> u32 {
        self.unit_magnitude
    }

    /// log2 of half the sub-bucket count.
    pub fn sub_bucket_half_count_magnitude(&self) -> u32 {
        self.sub_bucket_half_count_magnitude
    }
}

/// Number of buckets needed so that `value` is below the smallest untrackable value.
fn buckets_to_cover(value: i64, sub_bucket_count: i64, unit_magnitude: u32) -> usize {
    // the k'th bucket can express from 0 * 2^k to sub_bucket_count * 2^k in units of 2^k
    let mut smallest_untrackable_value = sub_bucket_count << unit_magnitude;

    // always have at least 1 bucket
    let mut buckets_needed = 1;
    while smallest_untrackable_value <= value {
        if smallest_untrackable_value > i64::max_value() / 2 {
            // next shift will overflow, meaning that bucket could represent values up to ones
            // greater than i64::max_value, so it's the last bucket
            return buckets_needed + 1;
        }
        smallest_untrackable_value <<= 1;
        buckets_needed += 1;
    }
    buckets_needed
}

impl HistogramSnapshot for Histogram {
    fn significant_figures(&self) -> i32 {
        self.significant_figures
    }

    fn lowest_trackable_value(&self) -> i64 {
        self.lowest_trackable_value
    }

    fn highest_trackable_value(&self) -> i64 {
        self.highest_trackable_value
    }

    fn total_count(&self) -> i64 {
        self.total_count
    }

    fn counts_len(&self) -> usize {
        self.counts.len()
    }

    fn count_at_index(&self, index: usize) -> i64 {
        self.counts[index]
    }
}

impl DecodableHistogram for Histogram {
    fn construct(
        lowest_trackable_value: i64,
        highest_trackable_value: i64,
        significant_figures: i32,
    ) -> Result<Self, CreationError> {
        Histogram::new_with_bounds(
            lowest_trackable_value,
            highest_trackable_value,
            significant_figures,
        )
    }

    fn set_total_count(&mut self, total_count: i64) {
        self.total_count = total_count;
    }

    fn counts_mut(&mut self) -> &mut [i64] {
        &mut self.counts
    }
}

#[cfg(test)]
mod tests;
