//! Serialization/deserialization support.
//!
//! A histogram is persisted as a compressed envelope:
//!
//! ```text
//! envelope:        [i32 COMPRESSION_COOKIE][i32 length][length bytes of zlib data]
//! zlib payload:    [i32 ENCODING_COOKIE][i32 significant figures][i64 lowest][i64 highest]
//!                  [i64 total count][counts_len x i64 counts]
//! ```
//!
//! Every integer is big-endian. The header and the counts are fed through one continuous zlib
//! stream, so the counts array, which is mostly zeros for typical latency data, compresses very
//! well. The number of counts is never stored: it is implied by the (lowest, highest, significant
//! figures) triple and is established when the destination histogram is constructed.
//!
//! Both cookies carry a version nibble. Any cookie mismatch is fatal; there is no best-effort
//! recovery of other layouts.
//!
//! # API
//!
//! `compressed::encode` and `compressed::decode` do the binary work. They only need a histogram
//! to implement `HistogramSnapshot` (for encoding) or `DecodableHistogram` (for decoding), which
//! the crate's `Histogram` does.
//!
//! For text transport the envelope is Base64-encoded with `base64_codec`, and `log` handles the
//! interval log format built on top of that.
//!
//! # Examples
//!
//! Round-tripping a histogram through the text form used in interval logs:
//!
//! ```
//! use hdrhistogram_log::Histogram;
//! use hdrhistogram_log::serialization::{base64_codec, compressed};
//!
//! let mut h = Histogram::new_with_bounds(1, 1_000_000, 2).unwrap();
//! for i in 0..10 {
//!     h.set_count_at_index(i * 3, i as i64).unwrap();
//! }
//! h.restat_total_count();
//!
//! let text = base64_codec::encode(&compressed::encode(&h).unwrap());
//! let bytes = base64_codec::decode(&text).unwrap();
//! let restored: Histogram = compressed::decode(&bytes).unwrap();
//!
//! assert_eq!(h, restored);
//! ```

use crate::CreationError;

pub mod base64_codec;
pub mod buffer;
pub mod compressed;
pub mod flyweight;
pub mod log;

pub use self::compressed::{DecodeError, EncodeError};

#[cfg(test)]
mod tests;

/// Identifies the encoded header (the first bytes of the decompressed payload).
pub const ENCODING_COOKIE: i32 = 0x1c84_9308 + (8 << 4);
/// Identifies the compressed envelope.
pub const COMPRESSION_COOKIE: i32 = 0x1c84_9309 + (8 << 4);

/// Size of the encoded header: cookie, significant figures, lowest, highest, total count.
pub const ENCODED_HEADER_SIZE: usize = 32;
/// Size of the envelope header: cookie and compressed length.
pub const ENVELOPE_HEADER_SIZE: usize = 8;

/// Number of counts compressed or decompressed per step.
pub const COUNTS_PER_CHUNK: usize = 512;
/// Initial size of the encode output buffer, enough for a small histogram.
pub const INITIAL_BUFFER_SIZE: usize = 4096;
/// zlib compression level used for every envelope.
pub const COMPRESSION_LEVEL: u32 = 4;

/// Read access to the state of a histogram that is being encoded.
pub trait HistogramSnapshot {
    /// Number of significant decimal digits of precision.
    fn significant_figures(&self) -> i32;
    /// Lowest trackable value, inclusive.
    fn lowest_trackable_value(&self) -> i64;
    /// Highest trackable value, inclusive.
    fn highest_trackable_value(&self) -> i64;
    /// Sum of all counts, as recorded by the histogram.
    fn total_count(&self) -> i64;
    /// Length of the counts array.
    fn counts_len(&self) -> usize;
    /// Count at `index`. `index` is always less than `counts_len()`.
    fn count_at_index(&self, index: usize) -> i64;
}

/// Construction of a histogram that is being decoded.
pub trait DecodableHistogram: Sized {
    /// Create an empty histogram with the given configuration. The length of `counts_mut()` on
    /// the result is the histogram's counts length.
    fn construct(
        lowest_trackable_value: i64,
        highest_trackable_value: i64,
        significant_figures: i32,
    ) -> Result<Self, CreationError>;
    /// Set the total count as read from the encoded header.
    fn set_total_count(&mut self, total_count: i64);
    /// Mutable access to the counts array.
    fn counts_mut(&mut self) -> &mut [i64];
}
