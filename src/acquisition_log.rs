//! The acquisition log: an append-only text record of every raw sample and
//! every dataset boundary or annotation of a capture run. It is the audit
//! trail of a measurement and the input for offline replay.
//!
//! The format is line based:
//!
//! ```text
//! <azimuth>\t<elevation>\t<strength>      a raw sample
//! # @set <name> <origin> [elevation]     a dataset boundary
//! # <free text>                          an annotation
//! ```
//!
//! Numbers are written with the shortest representation that parses back to
//! the same `f64`, so replaying a log reproduces the exact samples a live run
//! saw. Any other `# @...` line is an unrecognized directive; readers warn
//! about it and carry on. A data line that does not hold exactly three
//! numbers is a format error.

use crate::dataset::Mode;
use crate::Sample;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till1},
    character::complete::{char, i32, space0, space1},
    combinator::{eof, map, opt, value},
    error::Error,
    number::complete::double,
    sequence::{preceded, terminated, tuple},
    Finish, IResult,
};
use std::{
    borrow::Cow,
    fmt,
    fs::{File, OpenOptions},
    io::{self, BufRead, BufReader, BufWriter, Lines, Write},
    path::Path,
    str::FromStr,
};

/// One line of the acquisition log.
#[derive(Debug, Clone, PartialEq)]
pub enum LogRecord {
    Sample(Sample),
    Boundary {
        name: String,
        origin: i32,
        mode: Mode,
    },
    Annotation(String),
    /// A `# @...` line that is not a known directive, without the `# `.
    Unrecognized(String),
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogRecord::Sample(s) => write!(f, "{}\t{}\t{}", s.azimuth, s.elevation, s.strength),
            LogRecord::Boundary {
                name,
                origin,
                mode: Mode::Azimuth,
            } => write!(f, "# @set {} {}", name, origin),
            LogRecord::Boundary { name, origin, mode } => {
                write!(f, "# @set {} {} {}", name, origin, mode)
            }
            // One extra space keeps an annotation that looks like a
            // directive from being read back as one.
            LogRecord::Annotation(text) if looks_like_directive(text) => write!(f, "#  {}", text),
            LogRecord::Annotation(text) | LogRecord::Unrecognized(text) => write!(f, "# {}", text),
        }
    }
}

fn looks_like_directive(text: &str) -> bool {
    text.trim_start_matches(' ').starts_with('@')
}

fn parse_sample(s: &str) -> IResult<&str, Sample> {
    map(
        terminated(
            tuple((double, preceded(space1, double), preceded(space1, double))),
            tuple((space0, eof)),
        ),
        |(azimuth, elevation, strength)| Sample {
            azimuth,
            elevation,
            strength,
        },
    )(s)
}

fn parse_mode(s: &str) -> IResult<&str, Mode> {
    alt((
        value(Mode::Azimuth, tag("azimuth")),
        value(Mode::Elevation, tag("elevation")),
    ))(s)
}

fn parse_boundary(s: &str) -> IResult<&str, LogRecord> {
    map(
        terminated(
            preceded(
                tag("@set"),
                tuple((
                    preceded(space1, take_till1(|c: char| c.is_whitespace())),
                    preceded(space1, i32),
                    opt(preceded(space1, parse_mode)),
                )),
            ),
            tuple((space0, eof)),
        ),
        |(name, origin, mode): (&str, i32, Option<Mode>)| LogRecord::Boundary {
            name: name.to_owned(),
            origin,
            mode: mode.unwrap_or_default(),
        },
    )(s)
}

fn parse_comment(s: &str) -> IResult<&str, LogRecord> {
    let (text, _) = preceded(char('#'), opt(char(' ')))(s)?;

    if text.starts_with('@') {
        return Ok(match parse_boundary(text) {
            Ok(parsed) => parsed,
            Err(_) => ("", LogRecord::Unrecognized(text.to_owned())),
        });
    }

    let text = match text.strip_prefix(' ') {
        Some(escaped) if looks_like_directive(escaped) => escaped,
        _ => text,
    };
    Ok(("", LogRecord::Annotation(text.to_owned())))
}

fn parse_record(s: &str) -> IResult<&str, LogRecord> {
    alt((parse_comment, map(parse_sample, LogRecord::Sample)))(s)
}

impl FromStr for LogRecord {
    type Err = Error<String>;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_record(s).finish() {
            Ok((_remaining, record)) => Ok(record),
            Err(Error { input, code }) => Err(Error {
                input: input.to_string(),
                code,
            }),
        }
    }
}

/// Errors while loading an acquisition log.
#[derive(Debug)]
pub enum LogError {
    /// Reading the underlying file failed.
    IoError(std::io::Error),

    /// A data line did not hold exactly three numbers. `line` is 1-based.
    Format { line: usize },
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            LogError::IoError(error) => Cow::from(format!("io error: {}", error)),
            LogError::Format { line } => Cow::from(format!("data file format error on line {}", line)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for LogError {}

impl From<io::Error> for LogError {
    fn from(value: io::Error) -> Self {
        Self::IoError(value)
    }
}

/// Reads [`LogRecord`]s line by line, skipping blank lines.
pub struct LogReader<R> {
    lines: Lines<R>,
    line: usize,
}

impl LogReader<BufReader<File>> {
    /// Opens a log file for replay.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LogError> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> LogReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl<R: BufRead> Iterator for LogReader<R> {
    type Item = Result<LogRecord, LogError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(e) => return Some(Err(LogError::IoError(e))),
            };
            self.line += 1;

            let text = text.trim_end();
            if text.is_empty() {
                continue;
            }

            return Some(
                LogRecord::from_str(text).map_err(|_| LogError::Format { line: self.line }),
            );
        }
    }
}

/// Writes records to the log, flushing after every one so a crash loses at
/// most the record being written.
#[derive(Debug)]
pub struct AcquisitionLog<W: Write> {
    out: W,
}

impl AcquisitionLog<BufWriter<File>> {
    /// Creates a new log file. Fails if `path` already exists so an earlier
    /// run is never overwritten.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> AcquisitionLog<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Appends any record.
    pub fn append(&mut self, record: &LogRecord) -> io::Result<()> {
        writeln!(self.out, "{}", record)?;
        self.out.flush()
    }

    pub fn record_sample(&mut self, sample: &Sample) -> io::Result<()> {
        self.append(&LogRecord::Sample(*sample))
    }

    pub fn begin_dataset(&mut self, name: &str, origin: i32, mode: Mode) -> io::Result<()> {
        self.append(&LogRecord::Boundary {
            name: name.to_owned(),
            origin,
            mode,
        })
    }

    /// Appends a free-text annotation. Line breaks become spaces.
    pub fn annotate(&mut self, text: &str) -> io::Result<()> {
        let text = text.replace(['\n', '\r'], " ");
        self.append(&LogRecord::Annotation(text))
    }

    /// Gives back the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    #[test]
    fn parses_sample_lines() {
        let record: LogRecord = "12.5\t-3\t-54.25".parse().unwrap();
        assert_eq!(
            record,
            LogRecord::Sample(Sample {
                azimuth: 12.5,
                elevation: -3.0,
                strength: -54.25,
            })
        );

        // Any run of blanks separates fields.
        let record: LogRecord = "1 2  3".parse().unwrap();
        assert!(matches!(record, LogRecord::Sample(_)));
    }

    #[test]
    fn rejects_malformed_data() {
        assert!("12.5\t-3".parse::<LogRecord>().is_err());
        assert!("1\t2\t3\t4".parse::<LogRecord>().is_err());
        assert!("north\t2\t3".parse::<LogRecord>().is_err());
    }

    #[test]
    fn parses_boundaries() {
        let record: LogRecord = "# @set bg_scan 15".parse().unwrap();
        assert_eq!(
            record,
            LogRecord::Boundary {
                name: "bg_scan".to_owned(),
                origin: 15,
                mode: Mode::Azimuth,
            }
        );

        let record: LogRecord = "# @set el -20 elevation".parse().unwrap();
        assert_eq!(
            record,
            LogRecord::Boundary {
                name: "el".to_owned(),
                origin: -20,
                mode: Mode::Elevation,
            }
        );
    }

    #[test]
    fn comments_and_unknown_directives() {
        let record: LogRecord = "# Timeout".parse().unwrap();
        assert_eq!(record, LogRecord::Annotation("Timeout".to_owned()));

        let record: LogRecord = "#".parse().unwrap();
        assert_eq!(record, LogRecord::Annotation(String::new()));

        let record: LogRecord = "# @azimuth".parse().unwrap();
        assert_eq!(record, LogRecord::Unrecognized("@azimuth".to_owned()));

        let record: LogRecord = "# @set missing_origin".parse().unwrap();
        assert_eq!(
            record,
            LogRecord::Unrecognized("@set missing_origin".to_owned())
        );
    }

    #[test]
    fn written_records_parse_back() {
        let records = vec![
            LogRecord::Boundary {
                name: "azimuth".to_owned(),
                origin: 0,
                mode: Mode::Azimuth,
            },
            LogRecord::Sample(Sample {
                azimuth: 0.1 + 0.2,
                elevation: 1.0 / 3.0,
                strength: -54.0,
            }),
            LogRecord::Boundary {
                name: "elevation".to_owned(),
                origin: 90,
                mode: Mode::Elevation,
            },
            LogRecord::Annotation("Data collection finished successfully.".to_owned()),
        ];

        let mut log = AcquisitionLog::new(Vec::new());
        for record in &records {
            log.append(record).unwrap();
        }

        let text = log.into_inner();
        let read: Vec<LogRecord> = LogReader::new(Cursor::new(text))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(read, records);
    }

    #[test]
    fn annotations_stay_on_one_line() {
        let mut log = AcquisitionLog::new(Vec::new());
        log.annotate("two\nlines").unwrap();
        assert_eq!(log.into_inner(), b"# two lines\n");
    }

    #[test]
    fn annotations_that_look_like_directives() {
        let mut log = AcquisitionLog::new(Vec::new());
        log.begin_dataset("a", 0, Mode::Azimuth).unwrap();
        log.annotate("@set x 0").unwrap();
        log.annotate(" @azimuth").unwrap();
        log.annotate("at @set").unwrap();

        let text = log.into_inner();
        assert_eq!(
            String::from_utf8(text.clone()).unwrap(),
            "# @set a 0\n#  @set x 0\n#   @azimuth\n# at @set\n"
        );

        let read: Vec<LogRecord> = LogReader::new(Cursor::new(text))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            read[1..],
            [
                LogRecord::Annotation("@set x 0".to_owned()),
                LogRecord::Annotation(" @azimuth".to_owned()),
                LogRecord::Annotation("at @set".to_owned()),
            ]
        );
    }

    #[test]
    fn reader_reports_line_numbers() {
        let text = "# @set a 0\n\n1\t2\t3\n1\t2\n";
        let results: Vec<_> = LogReader::new(Cursor::new(text)).collect();
        assert_eq!(results.len(), 3);
        assert!(matches!(results[2], Err(LogError::Format { line: 4 })));
    }

    #[test]
    fn create_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.log");

        let mut log = AcquisitionLog::create(&path).unwrap();
        log.annotate("first run").unwrap();
        assert!(AcquisitionLog::create(&path).is_err());

        // Every record is on disk as soon as it is appended.
        let mut contents = String::new();
        File::open(&path)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "# first run\n");
    }

    #[test]
    fn open_and_replay_from_disk() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "# @set a 0\n90\t0\t1\n").unwrap();

        let records: Vec<_> = LogReader::open(file.path())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records.len(), 2);
    }
}
