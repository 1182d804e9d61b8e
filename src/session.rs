//! An [`AcquisitionSession`] is everything a capture run writes to: the
//! dataset aggregator and the acquisition log, owned together so every
//! sample that is aggregated is also logged and the other way around.

use crate::acquisition_log::AcquisitionLog;
use crate::dataset::{DatasetAggregator, DatasetError, EmittedDataset, Mode, Statistic};
use crate::Sample;

use log::debug;
use std::{borrow::Cow, fmt, io, io::Write};

/// Errors from a live session.
#[derive(Debug)]
pub enum SessionError {
    /// The dataset lifecycle was misused.
    Dataset(DatasetError),
    /// Writing the log failed.
    IoError(io::Error),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            SessionError::Dataset(error) => Cow::from(error.to_string()),
            SessionError::IoError(error) => Cow::from(format!("log write error: {}", error)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for SessionError {}

impl From<DatasetError> for SessionError {
    fn from(value: DatasetError) -> Self {
        Self::Dataset(value)
    }
}

impl From<io::Error> for SessionError {
    fn from(value: io::Error) -> Self {
        Self::IoError(value)
    }
}

/// See the module documentation.
#[derive(Debug)]
pub struct AcquisitionSession<W: Write> {
    aggregator: DatasetAggregator,
    log: AcquisitionLog<W>,
}

impl<W: Write> AcquisitionSession<W> {
    pub fn new(log: AcquisitionLog<W>, statistic: Statistic) -> Self {
        Self {
            aggregator: DatasetAggregator::new(statistic),
            log,
        }
    }

    /// Opens a dataset and writes its boundary to the log. Nothing is logged
    /// if the aggregator refuses the start.
    pub fn start(&mut self, name: &str, origin: i32, mode: Mode) -> Result<(), SessionError> {
        self.aggregator.start(name, origin, mode)?;
        self.log.begin_dataset(name, origin, mode)?;
        Ok(())
    }

    /// Logs a sample, then buckets it. Samples taken while no dataset is
    /// open are neither logged nor bucketed.
    pub fn record(&mut self, sample: Sample) -> Result<(), SessionError> {
        if !self.aggregator.is_open() {
            debug!("Discarding {:?}: no dataset is open", sample);
            return Ok(());
        }
        debug!("Recording {:?}", sample);
        self.log.record_sample(&sample)?;
        self.aggregator.add(&sample);
        Ok(())
    }

    pub fn annotate(&mut self, text: &str) -> Result<(), SessionError> {
        self.log.annotate(text)?;
        Ok(())
    }

    pub fn emit(&mut self) -> EmittedDataset {
        self.aggregator.emit()
    }

    pub fn is_open(&self) -> bool {
        self.aggregator.is_open()
    }

    /// Closes the session and gives back the log writer.
    pub fn into_log(self) -> AcquisitionLog<W> {
        self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition_log::LogReader;
    use std::io::Cursor;

    fn session() -> AcquisitionSession<Vec<u8>> {
        AcquisitionSession::new(AcquisitionLog::new(Vec::new()), Statistic::Max)
    }

    fn log_text(session: AcquisitionSession<Vec<u8>>) -> String {
        String::from_utf8(session.into_log().into_inner()).unwrap()
    }

    #[test]
    fn start_and_record_are_logged() {
        let mut session = session();
        session.start("azimuth", 30, Mode::Azimuth).unwrap();
        session
            .record(Sample {
                azimuth: 10.5,
                elevation: 0.0,
                strength: -12.0,
            })
            .unwrap();
        session.annotate("Timeout").unwrap();

        assert_eq!(
            log_text(session),
            "# @set azimuth 30\n10.5\t0\t-12\n# Timeout\n"
        );
    }

    #[test]
    fn refused_start_is_not_logged() {
        let mut session = session();
        session.start("a", 0, Mode::Azimuth).unwrap();
        let err = session.start("b", 0, Mode::Azimuth).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Dataset(DatasetError::ProtocolViolation { .. })
        ));
        assert_eq!(log_text(session), "# @set a 0\n");
    }

    #[test]
    fn out_of_range_samples_are_still_logged() {
        let mut session = session();
        session.start("a", 0, Mode::Azimuth).unwrap();
        session
            .record(Sample {
                azimuth: 361.0,
                elevation: 0.0,
                strength: 1.0,
            })
            .unwrap();
        assert!(session.emit().is_empty());
        assert_eq!(log_text(session), "# @set a 0\n361\t0\t1\n");
    }

    #[test]
    fn samples_between_datasets_are_not_logged() {
        let mut session = session();
        let sample = |azimuth| Sample {
            azimuth,
            elevation: 0.0,
            strength: 7.0,
        };
        let mut live = Vec::new();

        session.record(sample(5.0)).unwrap();
        session.start("a", 0, Mode::Azimuth).unwrap();
        session.record(sample(10.0)).unwrap();
        session.emit().write_to(&mut live).unwrap();
        session.record(sample(30.0)).unwrap();

        let text = session.into_log().into_inner();
        assert_eq!(String::from_utf8(text.clone()).unwrap(), "# @set a 0\n10\t0\t7\n");

        let emitted = DatasetAggregator::new(Statistic::Max)
            .replay(LogReader::new(Cursor::new(text)), |_| {})
            .unwrap();
        let mut replayed = Vec::new();
        for dataset in &emitted {
            dataset.write_to(&mut replayed).unwrap();
        }
        assert_eq!(live, b"80\t7\n");
        assert_eq!(replayed, live);
    }

    #[test]
    fn directive_like_notes_replay_as_notes() {
        let mut session = session();
        let sample = |azimuth| Sample {
            azimuth,
            elevation: 0.0,
            strength: 1.0,
        };
        session.start("a", 0, Mode::Azimuth).unwrap();
        session.record(sample(10.0)).unwrap();
        session.annotate("@set bogus 0").unwrap();
        session.record(sample(20.0)).unwrap();

        let text = session.into_log().into_inner();
        let mut notes = Vec::new();
        let emitted = DatasetAggregator::new(Statistic::Max)
            .replay(LogReader::new(Cursor::new(text)), |n| notes.push(n.to_owned()))
            .unwrap();
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[1].points().count(), 2);
        assert_eq!(notes, vec!["@set bogus 0".to_owned()]);
    }

    #[test]
    fn replay_matches_live_emission() {
        let mut session = session();
        let mut live = Vec::new();

        session.start("azimuth", 12, Mode::Azimuth).unwrap();
        for i in 0..720 {
            let angle = i as f64 * 0.49 + 0.013;
            let strength = (angle.to_radians().cos() * 20.0) - 30.0 + (i % 7) as f64 / 3.0;
            session
                .record(Sample {
                    azimuth: angle,
                    elevation: 0.0,
                    strength,
                })
                .unwrap();
        }
        session.emit().write_to(&mut live).unwrap();

        session.start("elevation", 12, Mode::Elevation).unwrap();
        for i in 0..90 {
            session
                .record(Sample {
                    azimuth: 12.0,
                    elevation: i as f64 * 1.01,
                    strength: -(i as f64) / 7.0,
                })
                .unwrap();
        }
        session.emit().write_to(&mut live).unwrap();

        let text = session.into_log().into_inner();
        let emitted = DatasetAggregator::new(Statistic::Max)
            .replay(LogReader::new(Cursor::new(text)), |_| {})
            .unwrap();
        assert_eq!(emitted.len(), 3);
        assert!(emitted[0].is_empty());

        let mut replayed = Vec::new();
        for dataset in &emitted[1..] {
            dataset.write_to(&mut replayed).unwrap();
        }
        assert_eq!(String::from_utf8(live), String::from_utf8(replayed));
    }
}
