use super::compressed::{decode, decode_into, encode, DecodeError};
use super::flyweight::{write_counts, EncodedHeader, EnvelopeHeader};
use super::{
    base64_codec, HistogramSnapshot, COMPRESSION_COOKIE, ENCODED_HEADER_SIZE, ENCODING_COOKIE,
    ENVELOPE_HEADER_SIZE, INITIAL_BUFFER_SIZE,
};
use crate::{CreationError, ErrorKind, Histogram};
use byteorder::{BigEndian, ReadBytesExt};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use rand::{Rng, SeedableRng};
use std::io::{Read, Write};

fn histo(lowest: i64, highest: i64, significant_figures: i32) -> Histogram {
    Histogram::new_with_bounds(lowest, highest, significant_figures).unwrap()
}

/// A bare snapshot, for feeding the encoder counts arrays that don't match the configuration.
struct RawSnapshot {
    significant_figures: i32,
    lowest: i64,
    highest: i64,
    total_count: i64,
    counts: Vec<i64>,
}

impl HistogramSnapshot for RawSnapshot {
    fn significant_figures(&self) -> i32 {
        self.significant_figures
    }

    fn lowest_trackable_value(&self) -> i64 {
        self.lowest
    }

    fn highest_trackable_value(&self) -> i64 {
        self.highest
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

/// Compress `payload` with zlib and wrap it in a well-formed envelope.
fn envelope_around(payload: &[u8]) -> Vec<u8> {
    let mut compressed = Vec::new();
    {
        let mut encoder = ZlibEncoder::new(&mut compressed, Compression::new(4));
        encoder.write_all(payload).unwrap();
        let _ = encoder.finish().unwrap();
    }

    let mut envelope = vec![0_u8; ENVELOPE_HEADER_SIZE];
    EnvelopeHeader::new(compressed.len() as i32).write_to(&mut envelope);
    envelope.extend_from_slice(&compressed);
    envelope
}

fn payload(header: &EncodedHeader, counts: &[i64]) -> Vec<u8> {
    let mut bytes = header.to_bytes().to_vec();
    let mut counts_bytes = vec![0_u8; counts.len() * 8];
    write_counts(counts, &mut counts_bytes);
    bytes.extend_from_slice(&counts_bytes);
    bytes
}

fn header_for(lowest: i64, highest: i64, significant_figures: i32) -> EncodedHeader {
    EncodedHeader {
        cookie: ENCODING_COOKIE,
        significant_figures,
        lowest_trackable_value: lowest,
        highest_trackable_value: highest,
        total_count: 0,
    }
}

#[test]
fn encode_writes_envelope_header() {
    let h = histo(1, 2047, 3);
    let bytes = encode(&h).unwrap();

    let mut reader = &bytes[..];
    assert_eq!(COMPRESSION_COOKIE, reader.read_i32::<BigEndian>().unwrap());
    let length = reader.read_i32::<BigEndian>().unwrap();
    assert_eq!(bytes.len() - ENVELOPE_HEADER_SIZE, length as usize);
}

#[test]
fn encode_compresses_header_and_big_endian_counts() {
    let mut h = histo(1, 2047, 3);
    h.set_count_at_index(3, 0x0102).unwrap();
    h.set_total_count(0x0102);

    let bytes = encode(&h).unwrap();

    let mut inflated = Vec::new();
    let _ = flate2::read::ZlibDecoder::new(&bytes[ENVELOPE_HEADER_SIZE..])
        .read_to_end(&mut inflated)
        .unwrap();
    assert_eq!(ENCODED_HEADER_SIZE + 2048 * 8, inflated.len());

    let header = EncodedHeader::read_from(&inflated).unwrap();
    assert_eq!(
        EncodedHeader {
            cookie: ENCODING_COOKIE,
            significant_figures: 3,
            lowest_trackable_value: 1,
            highest_trackable_value: 2047,
            total_count: 0x0102,
        },
        header
    );

    let count_3 = ENCODED_HEADER_SIZE + 3 * 8;
    assert_eq!(
        [0, 0, 0, 0, 0, 0, 1, 2],
        inflated[count_3..count_3 + 8]
    );
}

#[test]
fn roundtrip_all_zeros() {
    let h = histo(1, 2047, 3);
    let decoded: Histogram = decode(&encode(&h).unwrap()).unwrap();

    assert_eq!(h, decoded);
    assert!(decoded.is_empty());
}

#[test]
fn roundtrip_single_count() {
    let mut h = histo(1, 3_600_000_000, 3);
    h.set_count_at_index(1234, 77).unwrap();
    h.restat_total_count();

    let decoded: Histogram = decode(&encode(&h).unwrap()).unwrap();

    assert_eq!(h, decoded);
    assert_eq!(77, decoded.total_count());
    assert_eq!(Some(77), decoded.count_at_index(1234));
}

#[test]
fn roundtrip_every_bucket_nonzero() {
    let mut h = histo(1, 100_000, 2);
    for i in 0..h.len() {
        h.set_count_at_index(i, (i as i64) + 1).unwrap();
    }
    h.restat_total_count();

    let decoded: Histogram = decode(&encode(&h).unwrap()).unwrap();

    assert_eq!(h, decoded);
    assert!(decoded.counts().iter().all(|&c| c > 0));
}

#[test]
fn roundtrip_large_random_histogram_grows_buffer() {
    let mut rng = rand::rngs::SmallRng::seed_from_u64(1441812279);
    let mut h = histo(1, i64::max_value(), 3);
    for i in 0..h.len() {
        h.set_count_at_index(i, rng.gen_range(0..1_000_000_000)).unwrap();
    }
    h.restat_total_count();

    let bytes = encode(&h).unwrap();
    // random counts hardly compress, so this needed several doublings of the initial buffer
    assert!(bytes.len() > 4 * INITIAL_BUFFER_SIZE);

    let decoded: Histogram = decode(&bytes).unwrap();
    assert_eq!(h, decoded);
}

#[test]
fn roundtrip_extreme_counts_and_total() {
    let mut h = histo(1, 2047, 3);
    h.set_count_at_index(0, i64::max_value()).unwrap();
    h.set_count_at_index(1, -1).unwrap();
    h.set_count_at_index(2047, i64::min_value()).unwrap();
    h.set_total_count(-42);

    let decoded: Histogram = decode(&encode(&h).unwrap()).unwrap();
    assert_eq!(h, decoded);
}

#[test]
fn roundtrip_through_base64() {
    let mut h = histo(1, 1_000_000, 2);
    h.set_count_at_index(50, 5).unwrap();
    h.restat_total_count();

    let text = base64_codec::encode(&encode(&h).unwrap());
    // padding adds trailing zero bytes past the envelope's declared length
    let bytes = base64_codec::decode(&text).unwrap();

    let decoded: Histogram = decode(&bytes).unwrap();
    assert_eq!(h, decoded);
}

#[test]
fn decode_corrupted_envelope_cookie() {
    let mut bytes = encode(&histo(1, 2047, 3)).unwrap();
    bytes[0] = 0x2c;

    let err = decode::<Histogram>(&bytes).unwrap_err();
    assert_eq!(ErrorKind::CompressionCookieMismatch, err.kind());
    assert_eq!(DecodeError::CompressionCookieMismatch(0x2c84_9389), err);
}

#[test]
fn decode_corrupted_encoding_cookie() {
    let mut header = header_for(1, 2047, 3);
    header.cookie = ENCODING_COOKIE + 1;
    let bytes = envelope_around(&payload(&header, &[0; 2048]));

    let err = decode::<Histogram>(&bytes).unwrap_err();
    assert_eq!(ErrorKind::EncodingCookieMismatch, err.kind());
    assert_eq!(DecodeError::EncodingCookieMismatch(ENCODING_COOKIE + 1), err);
}

#[test]
fn decode_too_short_for_envelope_header() {
    let bytes = encode(&histo(1, 2047, 3)).unwrap();

    assert_eq!(
        Err(DecodeError::InvalidArgument),
        decode::<Histogram>(&bytes[..ENVELOPE_HEADER_SIZE - 1])
    );
    assert_eq!(Err(DecodeError::InvalidArgument), decode::<Histogram>(&[]));
}

#[test]
fn decode_declared_length_past_end() {
    let bytes = encode(&histo(1, 2047, 3)).unwrap();

    assert_eq!(
        Err(DecodeError::InvalidArgument),
        decode::<Histogram>(&bytes[..bytes.len() - 1])
    );
}

#[test]
fn decode_truncated_stream() {
    let mut h = histo(1, 2047, 3);
    h.set_count_at_index(9, 9).unwrap();
    let bytes = encode(&h).unwrap();

    // keep the envelope consistent but cut the zlib stream short
    let cut = (bytes.len() - ENVELOPE_HEADER_SIZE) / 2;
    let mut truncated = bytes[..ENVELOPE_HEADER_SIZE + cut].to_vec();
    EnvelopeHeader::new(cut as i32).write_to(&mut truncated);

    let err = decode::<Histogram>(&truncated).unwrap_err();
    assert_eq!(ErrorKind::DecompressionFailed, err.kind());
}

#[test]
fn decode_garbage_stream() {
    let mut bytes = vec![0_u8; ENVELOPE_HEADER_SIZE];
    EnvelopeHeader::new(16).write_to(&mut bytes);
    bytes.extend_from_slice(&[0xAB; 16]);

    let err = decode::<Histogram>(&bytes).unwrap_err();
    assert_eq!(ErrorKind::DecompressionFailed, err.kind());
}

#[test]
fn decode_invalid_configuration_is_creation_failure() {
    let bytes = envelope_around(&payload(&header_for(0, 2047, 3), &[]));

    let err = decode::<Histogram>(&bytes).unwrap_err();
    assert_eq!(DecodeError::HistogramCreation(CreationError::LowIsZero), err);
    assert_eq!(ErrorKind::OutOfMemory, err.kind());
}

#[test]
fn decode_discards_counts_beyond_counts_len() {
    let mut counts = vec![0_i64; 2048 + 700];
    for (i, c) in counts.iter_mut().enumerate() {
        *c = i as i64;
    }
    let raw = RawSnapshot {
        significant_figures: 3,
        lowest: 1,
        highest: 2047,
        total_count: 5,
        counts: counts.clone(),
    };

    let decoded: Histogram = decode(&encode(&raw).unwrap()).unwrap();

    assert_eq!(2048, decoded.len());
    assert_eq!(&counts[..2048], decoded.counts());
    assert_eq!(5, decoded.total_count());
}

#[test]
fn decode_short_counts_leaves_rest_zero() {
    let raw = RawSnapshot {
        significant_figures: 3,
        lowest: 1,
        highest: 2047,
        total_count: 6,
        counts: vec![1, 2, 3],
    };

    let decoded: Histogram = decode(&encode(&raw).unwrap()).unwrap();

    assert_eq!(&[1, 2, 3], &decoded.counts()[..3]);
    assert!(decoded.counts()[3..].iter().all(|&c| c == 0));
}

#[test]
fn decode_stream_ending_right_after_header() {
    let mut header = header_for(1, 2047, 3);
    header.total_count = 11;
    let bytes = envelope_around(&payload(&header, &[]));

    let decoded: Histogram = decode(&bytes).unwrap();
    assert_eq!(11, decoded.total_count());
    assert!(decoded.counts().iter().all(|&c| c == 0));
}

#[test]
fn decode_stream_ending_inside_header() {
    let header = header_for(1, 2047, 3).to_bytes();
    let bytes = envelope_around(&header[..20]);

    let err = decode::<Histogram>(&bytes).unwrap_err();
    assert_eq!(ErrorKind::DecompressionFailed, err.kind());
}

#[test]
fn decode_into_rejects_populated_slot() {
    let bytes = encode(&histo(1, 2047, 3)).unwrap();
    let existing = histo(1, 1000, 1);
    let mut slot = Some(existing.clone());

    assert_eq!(Err(DecodeError::InvalidArgument), decode_into(&bytes, &mut slot));
    assert_eq!(Some(existing), slot);
}

#[test]
fn decode_into_fills_empty_slot() {
    let mut h = histo(1, 2047, 3);
    h.set_count_at_index(1, 1).unwrap();
    let bytes = encode(&h).unwrap();

    let mut slot: Option<Histogram> = None;
    decode_into(&bytes, &mut slot).unwrap();
    assert_eq!(Some(h), slot);
}

#[test]
fn decode_into_failure_leaves_slot_empty() {
    let mut bytes = encode(&histo(1, 2047, 3)).unwrap();
    bytes[3] = 0;

    let mut slot: Option<Histogram> = None;
    assert!(decode_into(&bytes, &mut slot).is_err());
    assert_eq!(None, slot);
}

#[test]
fn encoded_size_is_small_for_sparse_histogram() {
    let mut h = histo(1, i64::max_value(), 3);
    h.set_count_at_index(100, 1).unwrap();
    h.set_count_at_index(20_000, 1).unwrap();

    // 55296 counts of mostly zeros compress to well under the initial buffer
    assert!(encode(&h).unwrap().len() < INITIAL_BUFFER_SIZE);
}
