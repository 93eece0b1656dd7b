//! Fixed binary layouts of the encoded header and the compressed envelope header.
//!
//! Both are packed, with every field big-endian regardless of host byte order. Fields are read
//! and written one at a time; nothing is ever reinterpreted in place.

use byteorder::{BigEndian, ByteOrder};

use super::{
    HistogramSnapshot, COMPRESSION_COOKIE, ENCODED_HEADER_SIZE, ENCODING_COOKIE,
    ENVELOPE_HEADER_SIZE,
};

/// Header at the start of the decompressed payload, followed by the counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedHeader {
    /// Expected to be `ENCODING_COOKIE`.
    pub cookie: i32,
    /// Number of significant figures.
    pub significant_figures: i32,
    /// Lowest trackable value.
    pub lowest_trackable_value: i64,
    /// Highest trackable value.
    pub highest_trackable_value: i64,
    /// Total count.
    pub total_count: i64,
}

impl EncodedHeader {
    /// Header describing `h`, with the current encoding cookie.
    pub fn from_snapshot<H: HistogramSnapshot + ?Sized>(h: &H) -> EncodedHeader {
        EncodedHeader {
            cookie: ENCODING_COOKIE,
            significant_figures: h.significant_figures(),
            lowest_trackable_value: h.lowest_trackable_value(),
            highest_trackable_value: h.highest_trackable_value(),
            total_count: h.total_count(),
        }
    }

    /// Write the header into the first `ENCODED_HEADER_SIZE` bytes of `buf`.
    ///
    /// Panics if `buf` is shorter than `ENCODED_HEADER_SIZE`.
    pub fn write_to(&self, buf: &mut [u8]) {
        BigEndian::write_i32(&mut buf[0..4], self.cookie);
        BigEndian::write_i32(&mut buf[4..8], self.significant_figures);
        BigEndian::write_i64(&mut buf[8..16], self.lowest_trackable_value);
        BigEndian::write_i64(&mut buf[16..24], self.highest_trackable_value);
        BigEndian::write_i64(&mut buf[24..32], self.total_count);
    }

    /// The header as bytes.
    pub fn to_bytes(&self) -> [u8; ENCODED_HEADER_SIZE] {
        let mut buf = [0_u8; ENCODED_HEADER_SIZE];
        self.write_to(&mut buf);
        buf
    }

    /// Read a header from the start of `buf`, or `None` if `buf` does not hold a whole header.
    ///
    /// The cookie is returned as found; checking it is up to the caller.
    pub fn read_from(buf: &[u8]) -> Option<EncodedHeader> {
        if buf.len() < ENCODED_HEADER_SIZE {
            return None;
        }

        Some(EncodedHeader {
            cookie: BigEndian::read_i32(&buf[0..4]),
            significant_figures: BigEndian::read_i32(&buf[4..8]),
            lowest_trackable_value: BigEndian::read_i64(&buf[8..16]),
            highest_trackable_value: BigEndian::read_i64(&buf[16..24]),
            total_count: BigEndian::read_i64(&buf[24..32]),
        })
    }
}

/// Header of the compressed envelope: the cookie and the length of the compressed data that
/// follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeHeader {
    /// Expected to be `COMPRESSION_COOKIE`.
    pub cookie: i32,
    /// Length in bytes of the compressed data after the header.
    pub length: i32,
}

impl EnvelopeHeader {
    /// Header for `length` bytes of compressed data, with the current compression cookie.
    pub fn new(length: i32) -> EnvelopeHeader {
        EnvelopeHeader {
            cookie: COMPRESSION_COOKIE,
            length,
        }
    }

    /// Write the header into the first `ENVELOPE_HEADER_SIZE` bytes of `buf`.
    ///
    /// Panics if `buf` is shorter than `ENVELOPE_HEADER_SIZE`.
    pub fn write_to(&self, buf: &mut [u8]) {
        BigEndian::write_i32(&mut buf[0..4], self.cookie);
        BigEndian::write_i32(&mut buf[4..8], self.length);
    }

    /// Read a header from the start of `buf`, or `None` if `buf` does not hold a whole header.
    pub fn read_from(buf: &[u8]) -> Option<EnvelopeHeader> {
        if buf.len() < ENVELOPE_HEADER_SIZE {
            return None;
        }

        Some(EnvelopeHeader {
            cookie: BigEndian::read_i32(&buf[0..4]),
            length: BigEndian::read_i32(&buf[4..8]),
        })
    }

    /// Split an envelope into its header and the compressed data it declares.
    ///
    /// Returns `None` if the header is incomplete, the declared length is negative, or fewer
    /// bytes than declared follow the header. Bytes beyond the declared length are ignored.
    pub fn split(buf: &[u8]) -> Option<(EnvelopeHeader, &[u8])> {
        let header = EnvelopeHeader::read_from(buf)?;
        if header.length < 0 {
            return None;
        }

        let end = ENVELOPE_HEADER_SIZE.checked_add(header.length as usize)?;
        buf.get(ENVELOPE_HEADER_SIZE..end).map(|data| (header, data))
    }
}

/// Write `counts` as big-endian `i64`s into `buf`, which must be exactly 8 bytes per count.
pub fn write_counts(counts: &[i64], buf: &mut [u8]) {
    BigEndian::write_i64_into(counts, buf);
}

/// Read big-endian `i64`s from `buf` into `counts`, which must hold exactly one count per 8 bytes.
pub fn read_counts(buf: &[u8], counts: &mut [i64]) {
    BigEndian::read_i64_into(buf, counts);
}
