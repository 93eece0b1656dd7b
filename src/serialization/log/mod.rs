//! Histogram log parsing and writing.
//!
//! A histogram log is a line-oriented text file recording a sequence of histograms over time,
//! typically one per measurement interval. It starts with `#` comment lines, some of which carry
//! metadata, followed by a column legend and then one record per line:
//!
//! ```text
//! #[Histogram log format version 1.2]
//! #[StartTime: 1441812279.139 (seconds since epoch)]
//! "StartTimestamp","EndTimestamp","Interval_Max","Interval_Compressed_Histogram"
//! 0.127,1.007,2.769,HISTiQAAAC14nO3BMQEAAADCoPVPbQwfoAAAAAAA...
//! ```
//!
//! Each record holds three `seconds.millis` pairs (interval begin, interval end, and the maximum
//! value seen in the interval) and the Base64 text of a compressed histogram envelope.
//!
//! # Reading
//!
//! `LogReader` reads the header block into a `LogHeader`, then decodes every record and hands
//! the histogram to a `RecordSink` (any `FnMut(&LogRecord, H)` closure will do). Reading is
//! strict: a record that doesn't parse, or whose histogram doesn't decode, ends the read with an
//! error carrying the line number. Nothing is skipped.
//!
//! ```
//! use hdrhistogram_log::Histogram;
//! use hdrhistogram_log::serialization::log::LogReader;
//!
//! let text = "#[Histogram log format version 1.2]\n\
//!             \"StartTimestamp\",\"EndTimestamp\",\"Interval_Max\",\"Interval_Compressed_Histogram\"\n";
//!
//! let mut reader = LogReader::new(text.as_bytes());
//! let header = reader.read_header().unwrap();
//! assert_eq!((1, 2), (header.major_version, header.minor_version));
//!
//! let read = reader
//!     .for_each_record(|record, h: Histogram| {
//!         println!("{}: {}", record.begin_timestamp_ms(), h.total_count())
//!     })
//!     .unwrap();
//! assert_eq!(0, read);
//! ```
//!
//! # Writing
//!
//! Start with a `LogWriterBuilder` to set up the header, then write histograms with the
//! resulting `LogWriter`.
//!
//! ```
//! use hdrhistogram_log::Histogram;
//! use hdrhistogram_log::serialization::log::{LogReader, LogWriterBuilder};
//!
//! let mut h = Histogram::new_with_bounds(1, 1_000_000, 3).unwrap();
//! h.set_count_at_index(100, 1).unwrap();
//! h.restat_total_count();
//!
//! let mut buf = Vec::new();
//! {
//!     let mut writer = LogWriterBuilder::new()
//!         .add_comment("load test")
//!         .with_start_time_ms(1_441_812_279_139)
//!         .begin_log(&mut buf)
//!         .unwrap();
//!     writer.write_histogram(&h, 0, 1_000, 100).unwrap();
//! }
//!
//! let mut decoded = Vec::new();
//! let mut reader = LogReader::new(&buf[..]);
//! reader.for_each_record(|_, h: Histogram| decoded.push(h)).unwrap();
//! assert_eq!(vec![h], decoded);
//! ```

use std::convert::TryFrom;
use std::io::Write;
use std::str::FromStr;
use std::{error, fmt, io, iter};

use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::{char, digit1, one_of, space0};
use nom::combinator::{map_res, opt, recognize};
use nom::error::ErrorKind as NomErrorKind;
use nom::sequence::{pair, preceded};
use nom::IResult;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::base64_codec::{self, Base64Error};
use super::compressed::{self, DecodeError, EncodeError};
use super::{DecodableHistogram, HistogramSnapshot};
use crate::ErrorKind;


/// Column legend written after the header comments.
pub const LEGEND: &str =
    "\"StartTimestamp\",\"EndTimestamp\",\"Interval_Max\",\"Interval_Compressed_Histogram\"";

/// Metadata from the comment block at the start of a log.
///
/// Fields that the log doesn't mention are zero.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogHeader {
    /// Major version from `#[Histogram log format version MAJOR.MINOR]`.
    pub major_version: i32,
    /// Minor version from `#[Histogram log format version MAJOR.MINOR]`.
    pub minor_version: i32,
    /// Milliseconds since the epoch from `#[StartTime: SECONDS.FRACTION ...]`.
    pub start_time_ms: i64,
}

/// One record line of a log.
///
/// The numeric fields are exactly as written in the line; `begin_timestamp_ms()` and friends
/// combine each `seconds.millis` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRecord<'a> {
    begin_s: i64,
    begin_ms: i64,
    end_s: i64,
    end_ms: i64,
    interval_max_s: i64,
    interval_max_ms: i64,
    encoded_histogram: &'a str,
}

impl<'a> LogRecord<'a> {
    /// Seconds part of the interval start.
    pub fn begin_s(&self) -> i64 {
        self.begin_s
    }

    /// Milliseconds part of the interval start.
    pub fn begin_ms(&self) -> i64 {
        self.begin_ms
    }

    /// Seconds part of the interval end.
    pub fn end_s(&self) -> i64 {
        self.end_s
    }

    /// Milliseconds part of the interval end.
    pub fn end_ms(&self) -> i64 {
        self.end_ms
    }

    /// Seconds part of the interval max.
    pub fn interval_max_s(&self) -> i64 {
        self.interval_max_s
    }

    /// Milliseconds part of the interval max.
    pub fn interval_max_ms(&self) -> i64 {
        self.interval_max_ms
    }

    /// Interval start in milliseconds.
    pub fn begin_timestamp_ms(&self) -> i64 {
        combine_ms(self.begin_s, self.begin_ms)
    }

    /// Interval end in milliseconds.
    pub fn end_timestamp_ms(&self) -> i64 {
        combine_ms(self.end_s, self.end_ms)
    }

    /// Interval max in milliseconds.
    pub fn interval_max_as_ms(&self) -> i64 {
        combine_ms(self.interval_max_s, self.interval_max_ms)
    }

    /// The Base64 text of the compressed histogram.
    pub fn encoded_histogram(&self) -> &'a str {
        self.encoded_histogram
    }
}

fn combine_ms(seconds: i64, millis: i64) -> i64 {
    seconds.saturating_mul(1000).saturating_add(millis)
}

/// Receives every histogram decoded from a log.
pub trait RecordSink<H> {
    /// Handle the histogram decoded from `record`.
    fn record(&mut self, record: &LogRecord<'_>, histogram: H);
}

impl<H, F> RecordSink<H> for F
where
    F: FnMut(&LogRecord<'_>, H),
{
    fn record(&mut self, record: &LogRecord<'_>, histogram: H) {
        self(record, histogram)
    }
}

/// Errors that can occur while reading a log.
#[derive(Debug)]
pub enum LogError {
    /// Reading from the underlying reader failed, or the text is not UTF-8.
    Io(io::Error),
    /// A record line does not have the `INT.INT,INT.INT,INT.INT,TOKEN` shape.
    MalformedRecord {
        /// 1-based line number.
        line: usize,
    },
    /// A record's histogram text is not valid Base64.
    Base64 {
        /// 1-based line number.
        line: usize,
        /// What was wrong with it.
        source: Base64Error,
    },
    /// A record's histogram could not be decoded.
    Decode {
        /// 1-based line number.
        line: usize,
        /// What was wrong with it.
        source: DecodeError,
    },
}

impl LogError {
    /// The failure kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LogError::Io(_) => ErrorKind::Io,
            LogError::MalformedRecord { .. } => ErrorKind::InvalidArgument,
            LogError::Base64 { source, .. } => source.kind(),
            LogError::Decode { source, .. } => source.kind(),
        }
    }
}

impl From<io::Error> for LogError {
    fn from(e: io::Error) -> Self {
        LogError::Io(e)
    }
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LogError::Io(e) => write!(f, "An i/o error occurred: {}", e),
            LogError::MalformedRecord { line } => {
                write!(f, "Line {}: malformed record ({})", line, self.kind())
            }
            LogError::Base64 { line, source } => write!(f, "Line {}: {}", line, source),
            LogError::Decode { line, source } => write!(f, "Line {}: {}", line, source),
        }
    }
}

impl error::Error for LogError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            LogError::Io(e) => Some(e),
            LogError::MalformedRecord { .. } => None,
            LogError::Base64 { source, .. } => Some(source),
            LogError::Decode { source, .. } => Some(source),
        }
    }
}

/// Reads a histogram log line by line.
pub struct LogReader<R> {
    reader: R,
    header: Option<LogHeader>,
    line: String,
    line_number: usize,
    // decoded Base64, reused across records
    scratch: Vec<u8>,
}

impl<R: io::BufRead> LogReader<R> {
    /// Create a reader positioned at the start of a log.
    pub fn new(reader: R) -> LogReader<R> {
        LogReader {
            reader,
            header: None,
            line: String::new(),
            line_number: 0,
            scratch: Vec::new(),
        }
    }

    /// Read the comment block and the legend line.
    ///
    /// Comment lines are those whose first non-whitespace character is `#`, plus blank lines.
    /// The first line that isn't a comment is taken to be the legend and discarded.
    ///
    /// Only the first call reads anything; later calls return the same header.
    pub fn read_header(&mut self) -> Result<LogHeader, LogError> {
        if let Some(header) = self.header {
            return Ok(header);
        }

        let mut header = LogHeader::default();
        while self.next_line()? {
            let line = self.line.trim_start();
            if !line.is_empty() && !line.starts_with('#') {
                debug!(line = self.line_number, "skipped legend");
                break;
            }

            if let Ok((_, (major, minor))) = format_version(line) {
                debug!(major, minor, "log format version");
                header.major_version = major;
                header.minor_version = minor;
            } else if let Ok((_, start_time_ms)) = start_time(line) {
                debug!(start_time_ms, "log start time");
                header.start_time_ms = start_time_ms;
            }
        }

        self.header = Some(header);
        Ok(header)
    }

    /// Decode every remaining record, passing each histogram to `f`.
    ///
    /// Returns the number of records delivered.
    pub fn for_each_record<H, F>(&mut self, mut f: F) -> Result<usize, LogError>
    where
        H: DecodableHistogram,
        F: FnMut(&LogRecord<'_>, H),
    {
        self.read_records::<H, F>(&mut f)
    }

    /// Decode every remaining record, passing each histogram to `sink`.
    ///
    /// The header is read first if it hasn't been already. Stops at the first bad record.
    /// Returns the number of records delivered.
    pub fn read_records<H, S>(&mut self, sink: &mut S) -> Result<usize, LogError>
    where
        H: DecodableHistogram,
        S: RecordSink<H> + ?Sized,
    {
        let _ = self.read_header()?;

        let mut delivered = 0;
        while self.next_line()? {
            let line = self.line_number;
            let record = match log_record(&self.line) {
                Ok((_, record)) => record,
                Err(_) => return Err(LogError::MalformedRecord { line }),
            };

            base64_codec::decode_into(record.encoded_histogram.as_bytes(), &mut self.scratch)
                .map_err(|source| LogError::Base64 { line, source })?;

            let histogram: H =
                compressed::decode(&self.scratch).map_err(|source| LogError::Decode { line, source })?;

            debug!(
                line,
                begin_ms = record.begin_timestamp_ms(),
                end_ms = record.end_timestamp_ms(),
                "decoded log record"
            );

            sink.record(&record, histogram);
            delivered += 1;
        }

        Ok(delivered)
    }

    /// Number of lines read so far.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Read the next line into `self.line`. Returns false at end of input.
    fn next_line(&mut self) -> Result<bool, LogError> {
        self.line.clear();
        if self.reader.read_line(&mut self.line)? == 0 {
            return Ok(false);
        }

        self.line_number += 1;
        Ok(true)
    }
}

/// Read a whole log, passing each histogram to `sink`, and return its header.
pub fn parse_log<R, H, S>(reader: R, sink: &mut S) -> Result<LogHeader, LogError>
where
    R: io::BufRead,
    H: DecodableHistogram,
    S: RecordSink<H> + ?Sized,
{
    let mut reader = LogReader::new(reader);
    let header = reader.read_header()?;
    let _ = reader.read_records::<H, S>(sink)?;
    Ok(header)
}

/// Prepare a `LogWriter`.
///
/// Everything configured here ends up in the header block written by `begin_log()`.
#[derive(Debug, Clone)]
pub struct LogWriterBuilder {
    comments: Vec<String>,
    start_time_ms: Option<u64>,
    major_version: i32,
    minor_version: i32,
}

impl Default for LogWriterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LogWriterBuilder {
    /// Create a builder for a version 1.2 log with no comments and no start time.
    pub fn new() -> LogWriterBuilder {
        LogWriterBuilder {
            comments: Vec::new(),
            start_time_ms: None,
            major_version: 1,
            minor_version: 2,
        }
    }

    /// Add a comment line to be written at the top of the log.
    ///
    /// Comments containing '\n' will be transformed into multiple lines of comments.
    pub fn add_comment(&mut self, s: &str) -> &mut Self {
        self.comments.push(s.to_owned());
        self
    }

    /// Set the StartTime, in milliseconds since the epoch.
    ///
    /// This can be called multiple times, but only the value for the most recent invocation will
    /// be written.
    pub fn with_start_time_ms(&mut self, start_time_ms: u64) -> &mut Self {
        self.start_time_ms = Some(start_time_ms);
        self
    }

    /// Set the format version written in the header.
    pub fn with_version(&mut self, major: i32, minor: i32) -> &mut Self {
        self.major_version = major;
        self.minor_version = minor;
        self
    }

    /// Write the header block to `writer` and return a `LogWriter` for the records.
    pub fn begin_log<W: io::Write>(&self, writer: W) -> io::Result<LogWriter<W>> {
        let mut log_writer = LogWriter {
            writer,
            text_buf: String::new(),
        };

        for c in &self.comments {
            log_writer.write_comment(c)?;
        }

        writeln!(
            log_writer.writer,
            "#[Histogram log format version {}.{}]",
            self.major_version, self.minor_version
        )?;

        if let Some(st) = self.start_time_ms {
            writeln!(
                log_writer.writer,
                "#[StartTime: {}.{:03} (seconds since epoch)]",
                st / 1000,
                st % 1000
            )?;
        }

        writeln!(log_writer.writer, "{}", LEGEND)?;

        Ok(log_writer)
    }
}

/// Writes histograms as log records.
///
/// Create one with `LogWriterBuilder::begin_log()`.
pub struct LogWriter<W: io::Write> {
    writer: W,
    text_buf: String,
}

impl<W: io::Write> LogWriter<W> {
    /// Write a comment line.
    ///
    /// Comments containing '\n' will be transformed into multiple lines of comments.
    pub fn write_comment(&mut self, s: &str) -> io::Result<()> {
        for l in s.split('\n') {
            writeln!(self.writer, "#{}", l)?;
        }

        Ok(())
    }

    /// Write one record.
    ///
    /// `begin_ms` and `end_ms` bound the interval the histogram covers, and `interval_max_ms`
    /// is the largest value seen in it. All three are written as `seconds.millis` and must not
    /// be negative.
    pub fn write_histogram<H: HistogramSnapshot + ?Sized>(
        &mut self,
        h: &H,
        begin_ms: i64,
        end_ms: i64,
        interval_max_ms: i64,
    ) -> Result<(), LogWriteError> {
        for &ms in &[begin_ms, end_ms, interval_max_ms] {
            if ms < 0 {
                return Err(LogWriteError::NegativeTimestamp(ms));
            }
        }

        let encoded = compressed::encode(h).map_err(LogWriteError::Encode)?;
        self.text_buf.clear();
        base64_codec::encode_into(&encoded, &mut self.text_buf);

        writeln!(
            self.writer,
            "{},{},{},{}",
            SecondsMillis(begin_ms),
            SecondsMillis(end_ms),
            SecondsMillis(interval_max_ms),
            self.text_buf
        )?;

        debug!(
            begin_ms,
            end_ms,
            encoded_len = encoded.len(),
            "wrote log record"
        );

        Ok(())
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Unwrap the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Errors that can occur while writing a log.
#[derive(Debug)]
pub enum LogWriteError {
    /// The histogram could not be encoded.
    Encode(EncodeError),
    /// An i/o error occurred.
    Io(io::Error),
    /// A timestamp was negative.
    NegativeTimestamp(i64),
}

impl LogWriteError {
    /// The failure kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LogWriteError::Encode(e) => e.kind(),
            LogWriteError::Io(_) => ErrorKind::Io,
            LogWriteError::NegativeTimestamp(_) => ErrorKind::InvalidArgument,
        }
    }
}

impl From<io::Error> for LogWriteError {
    fn from(e: io::Error) -> Self {
        LogWriteError::Io(e)
    }
}

impl fmt::Display for LogWriteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LogWriteError::Encode(e) => write!(f, "Histogram encoding failed: {}", e),
            LogWriteError::Io(e) => write!(f, "An i/o error occurred: {}", e),
            LogWriteError::NegativeTimestamp(ms) => {
                write!(f, "Timestamps must not be negative, got {} ms", ms)
            }
        }
    }
}

impl error::Error for LogWriteError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            LogWriteError::Encode(e) => Some(e),
            LogWriteError::Io(e) => Some(e),
            LogWriteError::NegativeTimestamp(_) => None,
        }
    }
}

/// Non-negative milliseconds displayed as `seconds.millis`.
struct SecondsMillis(i64);

impl fmt::Display for SecondsMillis {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{:03}", self.0 / 1000, self.0 % 1000)
    }
}

type ParseResult<'a, T> = IResult<&'a str, T, (&'a str, NomErrorKind)>;

/// A signed decimal integer, after optional blanks.
fn integer(input: &str) -> ParseResult<i64> {
    let (input, _) = space0(input)?;
    map_res(recognize(pair(opt(one_of("+-")), digit1)), i64::from_str)(input)
}

/// `INT.INT`, as a raw (seconds, millis) pair.
fn seconds_millis(input: &str) -> ParseResult<(i64, i64)> {
    let (input, seconds) = integer(input)?;
    let (input, _) = char('.')(input)?;
    let (input, millis) = integer(input)?;
    Ok((input, (seconds, millis)))
}

fn log_record(input: &str) -> ParseResult<LogRecord<'_>> {
    let (input, (begin_s, begin_ms)) = seconds_millis(input)?;
    let (input, _) = char(',')(input)?;
    let (input, (end_s, end_ms)) = seconds_millis(input)?;
    let (input, _) = char(',')(input)?;
    let (input, (interval_max_s, interval_max_ms)) = seconds_millis(input)?;
    let (input, _) = char(',')(input)?;
    let (input, _) = space0(input)?;
    let (input, encoded_histogram) = take_while1(|c: char| !c.is_whitespace())(input)?;

    Ok((
        input,
        LogRecord {
            begin_s,
            begin_ms,
            end_s,
            end_ms,
            interval_max_s,
            interval_max_ms,
            encoded_histogram,
        },
    ))
}

fn format_version(input: &str) -> ParseResult<(i32, i32)> {
    let (input, _) = tag("#[Histogram log format version ")(input)?;
    let (input, major) = map_res(integer, i32::try_from)(input)?;
    let (input, _) = char('.')(input)?;
    let (input, minor) = map_res(integer, i32::try_from)(input)?;
    Ok((input, (major, minor)))
}

/// `#[StartTime: SECONDS.FRACTION`, as milliseconds. The fraction is a decimal fraction of a
/// second; digits past milliseconds are dropped.
fn start_time(input: &str) -> ParseResult<i64> {
    let (input, _) = tag("#[StartTime: ")(input)?;
    let (input, seconds) = map_res(digit1, i64::from_str)(input)?;
    let (input, fraction) = opt(preceded(char('.'), digit1))(input)?;

    let millis = fraction.map(fraction_as_millis).unwrap_or(0);
    match seconds.checked_mul(1000).and_then(|ms| ms.checked_add(millis)) {
        Some(start_time_ms) => Ok((input, start_time_ms)),
        None => Err(nom::Err::Error((input, NomErrorKind::TooLarge))),
    }
}

/// Milliseconds in a string of decimal fraction digits: "139000" is 139, "5" is 500.
fn fraction_as_millis(digits: &str) -> i64 {
    digits
        .bytes()
        .chain(iter::repeat(b'0'))
        .take(3)
        .fold(0, |ms, d| ms * 10 + i64::from(d - b'0'))
}
