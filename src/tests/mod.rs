use super::{CreationError, DecodableHistogram, Histogram, HistogramSnapshot};

fn histo(lowest: i64, highest: i64, significant_figures: i32) -> Histogram {
    Histogram::new_with_bounds(lowest, highest, significant_figures).unwrap()
}

#[test]
fn init_fields_1_bucket_medium_precision() {
    let h = histo(1, 2047, 3);

    assert_eq!(2047, h.highest_trackable_value());
    assert_eq!(1, h.lowest_trackable_value());
    assert_eq!(3, h.significant_figures());

    // 3 sigfigs = 1,000. sub bucket must hold 2,000. 2^11 = 2048.
    assert_eq!(1 << 11, h.sub_bucket_count());
    assert_eq!(10, h.sub_bucket_half_count_magnitude());
    assert_eq!(1, h.bucket_count());
    // one full bucket, one more half bucket
    assert_eq!(2048, h.len());
    assert_eq!(0, h.unit_magnitude());
}

#[test]
fn init_fields_one_hour_of_microseconds() {
    let h = histo(1, 3_600_000_000, 3);

    // 2^21 * 2048 = 2^32 > 3.6e9
    assert_eq!(22, h.bucket_count());
    assert_eq!(23 * 1024, h.len());
}

#[test]
fn init_fields_max_value_medium_precision() {
    let h = histo(1, i64::max_value(), 3);

    // should hit the case where it detects impending overflow
    // 2^52 * 2048 == 2^63, so that's 53 buckets.
    assert_eq!(53, h.bucket_count());
    assert_eq!(52 * 1024 + 2048, h.len());
}

#[test]
fn init_fields_max_value_max_precision_largest_possible_array() {
    let h = histo(1, i64::max_value(), 5);

    // 5 sigfigs = 100,000. sub bucket must hold 200,000. 2^18 = 262,144.
    assert_eq!(1 << 18, h.sub_bucket_count());
    assert_eq!(17, h.sub_bucket_half_count_magnitude());
    assert_eq!(46, h.bucket_count());
    assert_eq!(45 * (1 << 17) + (1 << 18), h.len());
}

#[test]
fn init_fields_unit_magnitude_from_lowest() {
    let h = histo(1000, 1_000_000, 2);

    // 2^9 = 512 <= 1000 < 1024
    assert_eq!(9, h.unit_magnitude());
    // 2 sigfigs = 100. sub bucket must hold 200. 2^8 = 256.
    assert_eq!(256, h.sub_bucket_count());
}

#[test]
fn new_err_low_is_zero() {
    assert_eq!(
        CreationError::LowIsZero,
        Histogram::new_with_bounds(0, 100, 3).unwrap_err()
    );
}

#[test]
fn new_err_low_exceeds_max() {
    assert_eq!(
        CreationError::LowExceedsMax,
        Histogram::new_with_bounds(i64::max_value() / 2 + 1, i64::max_value(), 3).unwrap_err()
    );
}

#[test]
fn new_err_high_not_double_low() {
    assert_eq!(
        CreationError::HighLessThanTwiceLow,
        Histogram::new_with_bounds(10, 15, 3).unwrap_err()
    );
}

#[test]
fn new_err_sigfig_out_of_range() {
    assert_eq!(
        CreationError::SigFigOutOfRange,
        Histogram::new_with_bounds(1, 100, 0).unwrap_err()
    );
    assert_eq!(
        CreationError::SigFigOutOfRange,
        Histogram::new_with_bounds(1, 100, 6).unwrap_err()
    );
}

#[test]
fn new_err_cannot_represent_sigfig_beyond_low() {
    // 2^50 needs 50 bits, 5 sigfigs needs another 17
    assert_eq!(
        CreationError::CannotRepresentSigFigBeyondLow,
        Histogram::new_with_bounds(1 << 50, i64::max_value(), 5).unwrap_err()
    );
}

#[test]
fn set_count_at_index_bounds_checked() {
    let mut h = histo(1, 2047, 3);

    assert_eq!(Ok(()), h.set_count_at_index(2047, 9));
    assert_eq!(Some(9), h.count_at_index(2047));
    assert_eq!(Err(()), h.set_count_at_index(2048, 1));
    assert_eq!(None, h.count_at_index(2048));
}

#[test]
fn restat_total_count_sums_counts() {
    let mut h = histo(1, 2047, 3);
    h.set_count_at_index(0, 3).unwrap();
    h.set_count_at_index(100, 4).unwrap();
    assert_eq!(0, h.total_count());

    h.restat_total_count();
    assert_eq!(7, h.total_count());
    assert!(!h.is_empty());
}

#[test]
fn snapshot_and_construction_traits_agree() {
    let mut h: Histogram = DecodableHistogram::construct(1, 100_000, 2).unwrap();
    h.counts_mut()[5] = 12;
    DecodableHistogram::set_total_count(&mut h, 12);

    assert_eq!(2, HistogramSnapshot::significant_figures(&h));
    assert_eq!(1, HistogramSnapshot::lowest_trackable_value(&h));
    assert_eq!(100_000, HistogramSnapshot::highest_trackable_value(&h));
    assert_eq!(12, HistogramSnapshot::total_count(&h));
    assert_eq!(h.len(), h.counts_len());
    assert_eq!(12, HistogramSnapshot::count_at_index(&h, 5));
}
