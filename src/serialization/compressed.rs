//! Streaming compression of histograms into cookie-tagged zlib envelopes.
//!
//! Encoding feeds the encoded header and then the big-endian counts through a single zlib stream
//! in chunks of `COUNTS_PER_CHUNK` counts, writing into an `OutputBuffer` that starts at
//! `INITIAL_BUFFER_SIZE` bytes and doubles whenever the compressor runs out of room. The first
//! `ENVELOPE_HEADER_SIZE` bytes of the buffer are reserved and filled in once the stream is done
//! and its length is known.
//!
//! Decoding inflates the encoded header first, checks its cookie, constructs the destination
//! histogram from the header's configuration, and then inflates the counts chunk by chunk
//! straight into the histogram. Counts beyond the histogram's counts length are discarded.
//!
//! Neither direction retries anything: every failure is returned to the caller, and the
//! compressor or decompressor is dropped with the call.

use std::{error, fmt};

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use num_traits::ToPrimitive;
use tracing::{debug, warn};

use super::buffer::OutputBuffer;
use super::flyweight::{self, EncodedHeader, EnvelopeHeader};
use super::{
    DecodableHistogram, HistogramSnapshot, COMPRESSION_COOKIE, COMPRESSION_LEVEL,
    COUNTS_PER_CHUNK, ENCODED_HEADER_SIZE, ENCODING_COOKIE, ENVELOPE_HEADER_SIZE,
    INITIAL_BUFFER_SIZE,
};
use crate::{CreationError, ErrorKind};

const CHUNK_BYTES: usize = COUNTS_PER_CHUNK * 8;

/// Errors that occur while encoding.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum EncodeError {
    /// The output buffer could not be allocated or grown.
    OutOfMemory,
    /// The compressor failed, or stopped making progress although output space was available.
    CompressionFailed(String),
    /// The compressed data is too long for the envelope's 32-bit length field.
    PayloadTooLarge(u64),
}

impl EncodeError {
    /// The failure kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EncodeError::OutOfMemory => ErrorKind::OutOfMemory,
            EncodeError::CompressionFailed(_) => ErrorKind::CompressionFailed,
            EncodeError::PayloadTooLarge(_) => ErrorKind::InvalidArgument,
        }
    }
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EncodeError::OutOfMemory => write!(f, "{}", ErrorKind::OutOfMemory),
            EncodeError::CompressionFailed(msg) => {
                write!(f, "{}: {}", ErrorKind::CompressionFailed, msg)
            }
            EncodeError::PayloadTooLarge(len) => write!(
                f,
                "Compressed length {} does not fit in the envelope length field",
                len
            ),
        }
    }
}

impl error::Error for EncodeError {}

/// Errors that occur while decoding.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum DecodeError {
    /// The input is shorter than an envelope header, declares a length it does not contain, or
    /// the destination slot is already populated.
    InvalidArgument,
    /// The envelope cookie is not `COMPRESSION_COOKIE`.
    CompressionCookieMismatch(i32),
    /// The decompressed header's cookie is not `ENCODING_COOKIE`.
    EncodingCookieMismatch(i32),
    /// The histogram described by the header could not be constructed.
    HistogramCreation(CreationError),
    /// The decompressor failed, or the stream ended before it should have.
    DecompressionFailed(String),
}

impl DecodeError {
    /// The failure kind. Histogram construction failures are `OutOfMemory`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::InvalidArgument => ErrorKind::InvalidArgument,
            DecodeError::CompressionCookieMismatch(_) => ErrorKind::CompressionCookieMismatch,
            DecodeError::EncodingCookieMismatch(_) => ErrorKind::EncodingCookieMismatch,
            DecodeError::HistogramCreation(_) => ErrorKind::OutOfMemory,
            DecodeError::DecompressionFailed(_) => ErrorKind::DecompressionFailed,
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeError::InvalidArgument => write!(f, "{}", ErrorKind::InvalidArgument),
            DecodeError::CompressionCookieMismatch(cookie) => write!(
                f,
                "{}: found 0x{:08x}",
                ErrorKind::CompressionCookieMismatch,
                cookie
            ),
            DecodeError::EncodingCookieMismatch(cookie) => write!(
                f,
                "{}: found 0x{:08x}",
                ErrorKind::EncodingCookieMismatch,
                cookie
            ),
            DecodeError::HistogramCreation(e) => write!(f, "{}: {}", ErrorKind::OutOfMemory, e),
            DecodeError::DecompressionFailed(msg) => {
                write!(f, "{}: {}", ErrorKind::DecompressionFailed, msg)
            }
        }
    }
}

impl error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            DecodeError::HistogramCreation(e) => Some(e),
            _ => None,
        }
    }
}

/// Encode `h` into a compressed envelope.
///
/// The returned vector holds exactly the envelope header followed by the compressed data.
pub fn encode<H: HistogramSnapshot + ?Sized>(h: &H) -> Result<Vec<u8>, EncodeError> {
    let mut out =
        OutputBuffer::with_capacity(INITIAL_BUFFER_SIZE).map_err(|_| EncodeError::OutOfMemory)?;
    // reserved for the envelope header, written once the length is known
    out.advance(ENVELOPE_HEADER_SIZE);

    let mut stream = DeflateStream {
        compressor: Compress::new(Compression::new(COMPRESSION_LEVEL), true),
        out,
    };

    let header = EncodedHeader::from_snapshot(h).to_bytes();
    let _ = stream.feed(&header, FlushCompress::None)?;

    let counts_len = h.counts_len();
    let mut counts = [0_i64; COUNTS_PER_CHUNK];
    let mut chunk = [0_u8; CHUNK_BYTES];
    let mut index = 0;

    while index < counts_len {
        let n = COUNTS_PER_CHUNK.min(counts_len - index);
        for (i, c) in counts[..n].iter_mut().enumerate() {
            *c = h.count_at_index(index + i);
        }
        flyweight::write_counts(&counts[..n], &mut chunk[..n * 8]);
        index += n;

        let _ = stream.feed(&chunk[..n * 8], FlushCompress::None)?;
    }

    // The final, empty chunk finishes the stream.
    let status = stream.feed(&[], FlushCompress::Finish)?;
    debug_assert_eq!(Status::StreamEnd, status);

    let compressed_len = stream.compressor.total_out();
    let length = compressed_len
        .to_i32()
        .ok_or(EncodeError::PayloadTooLarge(compressed_len))?;

    let mut out = stream.out;
    EnvelopeHeader::new(length).write_to(out.as_mut_slice());
    debug_assert_eq!(ENVELOPE_HEADER_SIZE + length as usize, out.len());

    debug!(
        counts_len,
        compressed_len,
        capacity = out.capacity(),
        "encoded histogram"
    );

    Ok(out.into_vec())
}

/// A zlib compressor writing into a growable buffer.
struct DeflateStream {
    compressor: Compress,
    out: OutputBuffer,
}

impl DeflateStream {
    /// Compress all of `input`.
    ///
    /// With `FlushCompress::None` this returns once the input has been consumed. With
    /// `FlushCompress::Finish` it keeps going until the stream has ended.
    ///
    /// Whenever the output buffer fills up it is doubled and a sync flush is issued so the
    /// compressor drains pending output into the new space. That can happen any number of times
    /// for a single input.
    fn feed(&mut self, mut input: &[u8], flush: FlushCompress) -> Result<Status, EncodeError> {
        let finishing = flush == FlushCompress::Finish;
        let mut flush = flush;

        loop {
            if !finishing && input.is_empty() && flush == FlushCompress::None {
                // nothing to do, and compressing nothing with no flush makes no progress
                return Ok(Status::Ok);
            }

            let (consumed, produced, status) = self.step(input, flush)?;
            input = &input[consumed..];

            if status == Status::StreamEnd {
                return Ok(status);
            }

            if self.out.is_full() {
                let old_capacity = self.out.capacity();
                self.out.grow().map_err(|_| EncodeError::OutOfMemory)?;
                debug!(
                    old_capacity,
                    new_capacity = self.out.capacity(),
                    "grew compression output buffer"
                );

                // zlib only accepts Finish once finishing has started
                if !finishing {
                    flush = FlushCompress::Sync;
                }
                continue;
            }

            if consumed == 0 && produced == 0 {
                // Output space is available but the compressor did nothing: a sync flush with
                // nothing pending is fine, anything else means it is stuck.
                if !finishing && input.is_empty() {
                    return Ok(status);
                }
                return Err(EncodeError::CompressionFailed(format!(
                    "no progress with {} input bytes pending",
                    input.len()
                )));
            }

            if !finishing && input.is_empty() {
                return Ok(status);
            }

            // more input to consume, without forcing further flushes
            if !finishing {
                flush = FlushCompress::None;
            }
        }
    }

    /// One call into the compressor. Returns bytes consumed, bytes produced, and the status.
    fn step(
        &mut self,
        input: &[u8],
        flush: FlushCompress,
    ) -> Result<(usize, usize, Status), EncodeError> {
        let in_before = self.compressor.total_in();
        let out_before = self.compressor.total_out();

        let status = self
            .compressor
            .compress(input, self.out.spare_mut(), flush)
            .map_err(|e| EncodeError::CompressionFailed(e.to_string()))?;

        let consumed = (self.compressor.total_in() - in_before) as usize;
        let produced = (self.compressor.total_out() - out_before) as usize;
        self.out.advance(produced);

        Ok((consumed, produced, status))
    }
}

/// Decode a compressed envelope into a new histogram.
///
/// Bytes after the envelope's declared length are ignored.
pub fn decode<H: DecodableHistogram>(bytes: &[u8]) -> Result<H, DecodeError> {
    let data = envelope_data(bytes)?;

    let mut stream = InflateStream {
        decompressor: Decompress::new(true),
        input: data,
    };

    // The header is decompressed on its own before anything in it is trusted.
    let mut header_bytes = [0_u8; ENCODED_HEADER_SIZE];
    let (filled, ended) = stream.fill(&mut header_bytes)?;
    let header = match EncodedHeader::read_from(&header_bytes[..filled]) {
        Some(header) => header,
        None => {
            return Err(DecodeError::DecompressionFailed(format!(
                "stream ended after {} header bytes",
                filled
            )))
        }
    };

    if header.cookie != ENCODING_COOKIE {
        return Err(DecodeError::EncodingCookieMismatch(header.cookie));
    }

    let mut h = H::construct(
        header.lowest_trackable_value,
        header.highest_trackable_value,
        header.significant_figures,
    )
    .map_err(DecodeError::HistogramCreation)?;
    h.set_total_count(header.total_count);

    if !ended {
        stream.inflate_counts(h.counts_mut())?;
    }

    Ok(h)
}

/// Decode a compressed envelope into `slot`, which must be empty.
///
/// On failure `slot` is left empty.
pub fn decode_into<H: DecodableHistogram>(
    bytes: &[u8],
    slot: &mut Option<H>,
) -> Result<(), DecodeError> {
    if slot.is_some() {
        return Err(DecodeError::InvalidArgument);
    }

    *slot = Some(decode(bytes)?);
    Ok(())
}

/// The compressed data of a well-formed envelope.
fn envelope_data(bytes: &[u8]) -> Result<&[u8], DecodeError> {
    let envelope = EnvelopeHeader::read_from(bytes).ok_or(DecodeError::InvalidArgument)?;
    // cookie before length, so a foreign format is reported as such
    if envelope.cookie != COMPRESSION_COOKIE {
        return Err(DecodeError::CompressionCookieMismatch(envelope.cookie));
    }

    EnvelopeHeader::split(bytes)
        .map(|(_, data)| data)
        .ok_or(DecodeError::InvalidArgument)
}

/// A zlib decompressor reading from a fixed input slice.
struct InflateStream<'a> {
    decompressor: Decompress,
    input: &'a [u8],
}

impl<'a> InflateStream<'a> {
    /// Inflate until `out` is full or the stream ends.
    ///
    /// Returns how much of `out` was filled and whether the stream ended. Running out of input
    /// before either happens is an error: truncated streams are not resumable.
    fn fill(&mut self, out: &mut [u8]) -> Result<(usize, bool), DecodeError> {
        let mut filled = 0;

        loop {
            let in_before = self.decompressor.total_in();
            let out_before = self.decompressor.total_out();

            let status = self
                .decompressor
                .decompress(self.input, &mut out[filled..], FlushDecompress::Sync)
                .map_err(|e| DecodeError::DecompressionFailed(e.to_string()))?;

            let consumed = (self.decompressor.total_in() - in_before) as usize;
            let produced = (self.decompressor.total_out() - out_before) as usize;
            self.input = &self.input[consumed..];
            filled += produced;

            if status == Status::StreamEnd {
                return Ok((filled, true));
            }

            if filled == out.len() {
                return Ok((filled, false));
            }

            if consumed == 0 && produced == 0 {
                return Err(DecodeError::DecompressionFailed(format!(
                    "stream truncated after {} compressed bytes",
                    self.decompressor.total_in()
                )));
            }
        }
    }

    /// Inflate the rest of the stream as big-endian counts into `counts`.
    fn inflate_counts(&mut self, counts: &mut [i64]) -> Result<(), DecodeError> {
        let mut chunk = [0_u8; CHUNK_BYTES];
        let mut values = [0_i64; COUNTS_PER_CHUNK];
        let mut index = 0;
        let mut discarded: u64 = 0;

        loop {
            let (filled, ended) = self.fill(&mut chunk)?;

            // a trailing partial count at the very end of the stream is ignored
            let available = filled / 8;
            flyweight::read_counts(&chunk[..available * 8], &mut values[..available]);

            let room = counts.len() - index;
            let n = available.min(room);
            counts[index..index + n].copy_from_slice(&values[..n]);
            index += n;
            discarded += (available - n) as u64;

            if ended {
                break;
            }
        }

        if discarded > 0 {
            warn!(
                discarded,
                counts_len = counts.len(),
                "discarded decoded counts beyond the histogram's counts length"
            );
        }

        Ok(())
    }
}
