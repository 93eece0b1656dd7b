use std::{error, fmt};

/// Errors that can occur when creating a histogram.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum CreationError {
    /// Lowest trackable value must be >= 1.
    LowIsZero,
    /// Lowest trackable value must be <= `i64::max_value() / 2` because the highest value is an
    /// `i64` and the lowest value must be no bigger than half the highest.
    LowExceedsMax,
    /// Highest trackable value must be >= 2 * lowest trackable value for some internal
    /// calculations to work out. In practice, high is typically much higher than 2 * low.
    HighLessThanTwiceLow,
    /// Number of significant figures must be in the range `[1, 5]`. It is capped at 5 because 5
    /// significant figures is already more than almost anyone needs, and memory usage scales
    /// exponentially as this increases.
    SigFigOutOfRange,
    /// Cannot represent sigfig worth of values beyond the lowest trackable value. Decrease the
    /// significant figures, lowest trackable value, or both.
    ///
    /// The exponent of the largest power of two that is smaller than the lowest value and the bits
    /// needed to represent the requested significant figures must sum to 61 or less.
    CannotRepresentSigFigBeyondLow,
    /// The `usize` type is too small to represent the desired configuration. Use fewer significant
    /// figures or a lower max.
    UsizeTypeTooSmall,
    /// The counts array could not be allocated.
    AllocationFailed,
}

impl fmt::Display for CreationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CreationError::LowIsZero => write!(f, "Lowest trackable value must be >= 1"),
            CreationError::LowExceedsMax => {
                write!(f, "Lowest trackable value must be <= i64::max_value() / 2")
            }
            CreationError::HighLessThanTwiceLow => write!(
                f,
                "Highest trackable value must be >= 2 * lowest trackable value"
            ),
            CreationError::SigFigOutOfRange => {
                write!(f, "Number of significant figures must be in the range [1, 5]")
            }
            CreationError::CannotRepresentSigFigBeyondLow => write!(
                f,
                "Cannot represent the significant figures beyond the lowest trackable value"
            ),
            CreationError::UsizeTypeTooSmall => write!(
                f,
                "The usize type is too small to represent the desired configuration"
            ),
            CreationError::AllocationFailed => write!(f, "The counts array could not be allocated"),
        }
    }
}

impl error::Error for CreationError {}

/// The closed set of failure kinds shared by every codec component.
///
/// Each component has its own error enum carrying details; `kind()` on those maps them here, and
/// `Display` gives the stable human-readable message.
#[derive(Debug, Eq, PartialEq, Clone, Copy, Hash)]
pub enum ErrorKind {
    /// Malformed Base64 length or alphabet, malformed log record, short or inconsistent input.
    InvalidArgument,
    /// Allocation, buffer growth or histogram construction failed.
    OutOfMemory,
    /// The outer envelope cookie did not match.
    CompressionCookieMismatch,
    /// The cookie of the decompressed encoded header did not match.
    EncodingCookieMismatch,
    /// The compressor reported an error or stopped making progress.
    CompressionFailed,
    /// The decompressor reported an error or the stream ended early.
    DecompressionFailed,
    /// Reading or writing the underlying text stream failed.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            ErrorKind::InvalidArgument => "Invalid argument",
            ErrorKind::OutOfMemory => "Out of memory",
            ErrorKind::CompressionCookieMismatch => "Compression cookie mismatch",
            ErrorKind::EncodingCookieMismatch => "Encoding cookie mismatch",
            ErrorKind::CompressionFailed => "Deflate failed",
            ErrorKind::DecompressionFailed => "Inflate failed",
            ErrorKind::Io => "I/O error",
        };
        f.write_str(msg)
    }
}
