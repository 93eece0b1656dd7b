/// Reads a histogram log from stdin and either summarizes each record as JSON or re-encodes the
/// whole log on stdout.
use std::io;
use std::io::{BufRead, Write};

use clap::{App, Arg, SubCommand};
use serde::Serialize;

use hdrhistogram_log::serialization::log::{
    LogError, LogReader, LogRecord, LogWriteError, LogWriterBuilder,
};
use hdrhistogram_log::Histogram;

fn main() {
    let matches = App::new("hdrhistogram log")
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Log decoding details to stderr"),
        )
        .subcommand(
            SubCommand::with_name("summarize")
                .about("Print the log header and one JSON summary per record on stdout"),
        )
        .subcommand(
            SubCommand::with_name("reencode")
                .about("Decode every record and write it back out as a new log on stdout")
                .arg(
                    Arg::with_name("comment")
                        .long("comment")
                        .help("Comment to put at the top of the new log")
                        .takes_value(true),
                ),
        )
        .get_matches();

    let level = if matches.is_present("verbose") {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    let stdin = std::io::stdin();
    let stdin = stdin.lock();

    let stdout = std::io::stdout();
    let stdout = stdout.lock();

    match matches.subcommand() {
        ("summarize", Some(_)) => summarize(stdin, stdout),
        ("reencode", Some(sub_matches)) => reencode(stdin, stdout, sub_matches.value_of("comment")),
        _ => {
            eprintln!("{}", matches.usage());
            std::process::exit(2);
        }
    }
    .expect("Subcommand failed")
}

#[derive(Serialize)]
struct RecordSummary {
    begin_ms: i64,
    end_ms: i64,
    interval_max_ms: i64,
    total_count: i64,
    counts_len: usize,
    nonzero_counts: usize,
}

impl RecordSummary {
    fn new(record: &LogRecord<'_>, h: &Histogram) -> RecordSummary {
        RecordSummary {
            begin_ms: record.begin_timestamp_ms(),
            end_ms: record.end_timestamp_ms(),
            interval_max_ms: record.interval_max_as_ms(),
            total_count: h.total_count(),
            counts_len: h.len(),
            nonzero_counts: h.counts().iter().filter(|&&c| c != 0).count(),
        }
    }
}

/// Print the header, then one line of JSON per record.
fn summarize<R: BufRead, W: Write>(reader: R, mut writer: W) -> Result<(), CliError> {
    let mut log = LogReader::new(reader);
    let header = log.read_header()?;
    serde_json::to_writer(&mut writer, &header)?;
    writer.write_all(b"\n")?;

    // the sink can't fail, so hold on to the first write error and report it afterwards
    let mut write_result = Ok(());
    let _ = log.for_each_record(|record, h: Histogram| {
        if write_result.is_ok() {
            write_result = serde_json::to_writer(&mut writer, &RecordSummary::new(record, &h))
                .map_err(CliError::from)
                .and_then(|_| writer.write_all(b"\n").map_err(CliError::from));
        }
    })?;

    write_result
}

/// Write every decoded record to a fresh log, keeping the start time and timing fields.
fn reencode<R: BufRead, W: Write>(
    reader: R,
    writer: W,
    comment: Option<&str>,
) -> Result<(), CliError> {
    let mut log = LogReader::new(reader);
    let header = log.read_header()?;

    let mut builder = LogWriterBuilder::new();
    if let Some(c) = comment {
        let _ = builder.add_comment(c);
    }
    if header.start_time_ms > 0 {
        let _ = builder.with_start_time_ms(header.start_time_ms as u64);
    }
    let mut log_writer = builder.begin_log(writer)?;

    let mut write_result = Ok(());
    let _ = log.for_each_record(|record, h: Histogram| {
        if write_result.is_ok() {
            write_result = log_writer
                .write_histogram(
                    &h,
                    record.begin_timestamp_ms(),
                    record.end_timestamp_ms(),
                    record.interval_max_as_ms(),
                )
                .map_err(CliError::from);
        }
    })?;
    write_result?;

    log_writer.flush()?;
    Ok(())
}

#[derive(Debug)]
enum CliError {
    Io(io::Error),
    Json(serde_json::Error),
    LogRead(LogError),
    LogWrite(LogWriteError),
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}

impl From<LogError> for CliError {
    fn from(e: LogError) -> Self {
        CliError::LogRead(e)
    }
}

impl From<LogWriteError> for CliError {
    fn from(e: LogWriteError) -> Self {
        CliError::LogWrite(e)
    }
}
