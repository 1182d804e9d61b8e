//! The dataset aggregator: owns the [`AngleBucketStore`] and the metadata of
//! the dataset currently being captured, and turns accumulated buckets into
//! plot-ready `(angle, strength)` pairs.
//!
//! A dataset is opened with [`DatasetAggregator::start`], fed with
//! [`DatasetAggregator::add`] and closed with [`DatasetAggregator::emit`].
//! Only one dataset may be open at a time. Replaying a log goes through the
//! exact same bucketing so offline results match what a live run printed.

use crate::acquisition_log::{LogError, LogRecord};
use crate::bucket_store::{AngleBucketStore, Bucket};
use crate::Sample;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::{
    borrow::Cow,
    fmt,
    io::{self, Write},
    str::FromStr,
};

/// Which angle of a sample selects its bucket.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum Mode {
    /// Bucket by azimuth; emitted angles go through the compass transform.
    #[default]
    Azimuth,
    /// Bucket by elevation; emitted angles are the raw degree.
    Elevation,
}

impl Mode {
    fn axis(&self, sample: &Sample) -> f64 {
        match self {
            Mode::Azimuth => sample.azimuth,
            Mode::Elevation => sample.elevation,
        }
    }

    /// Converts a bucket degree into the angle that gets plotted.
    ///
    /// Azimuth readings are compass bearings (clockwise from north) while a
    /// polar plot runs counter-clockwise from the x axis, hence
    /// `90 - (degree - origin)`. The result is not normalised and is not
    /// monotonic in `degree`.
    pub fn display_angle(&self, degree: i32, origin: i32) -> i32 {
        match self {
            Mode::Azimuth => 90 - (degree - origin),
            Mode::Elevation => degree,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Azimuth => write!(f, "azimuth"),
            Mode::Elevation => write!(f, "elevation"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "azimuth" => Ok(Mode::Azimuth),
            "elevation" => Ok(Mode::Elevation),
            other => Err(format!("unknown dataset mode '{other}'")),
        }
    }
}

/// What each emitted bucket reports.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum Statistic {
    /// The strongest reading seen in the bucket.
    #[default]
    Max,
    /// The running average of every reading in the bucket.
    Mean,
}

impl Statistic {
    fn pick(&self, bucket: &Bucket) -> f64 {
        match self {
            Statistic::Max => bucket.max,
            Statistic::Mean => bucket.mean(),
        }
    }
}

/// Name, origin and mode of a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetInfo {
    /// `None` for the implicit dataset that holds replayed samples logged
    /// before any boundary.
    pub name: Option<String>,
    /// Azimuth of the source, subtracted before the compass transform.
    pub origin: i32,
    pub mode: Mode,
}

impl DatasetInfo {
    fn unnamed() -> Self {
        Self {
            name: None,
            origin: 0,
            mode: Mode::Azimuth,
        }
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("(unnamed)")
    }
}

/// Errors from misusing the dataset lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetError {
    /// A dataset was started while another one was still open.
    ProtocolViolation {
        /// Name of the dataset that was never emitted.
        open: String,
    },

    /// The name cannot be written as a boundary record.
    InvalidName(String),
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            DatasetError::ProtocolViolation { open } => Cow::from(format!(
                "protocol violation: dataset '{open}' is still open and was never emitted"
            )),
            DatasetError::InvalidName(name) => Cow::from(format!(
                "invalid dataset name '{name}': must be non-empty without whitespace"
            )),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for DatasetError {}

/// A closed dataset, ready to be printed or plotted.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedDataset {
    info: Option<DatasetInfo>,
    statistic: Statistic,
    store: AngleBucketStore,
}

impl EmittedDataset {
    /// The dataset name, if it had one.
    pub fn name(&self) -> Option<&str> {
        self.info.as_ref().and_then(|i| i.name.as_deref())
    }

    pub fn mode(&self) -> Mode {
        self.info.as_ref().map(|i| i.mode).unwrap_or_default()
    }

    /// `(display_angle, strength)` for every bucket with data, in ascending
    /// bucket order. Can be called any number of times.
    pub fn points(&self) -> impl Iterator<Item = (i32, f64)> + '_ {
        let (origin, mode) = self
            .info
            .as_ref()
            .map(|i| (i.origin, i.mode))
            .unwrap_or((0, Mode::Azimuth));
        let statistic = self.statistic;

        self.store.iter().map(move |(degree, bucket)| {
            (
                mode.display_angle(degree as i32, origin),
                statistic.pick(bucket),
            )
        })
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Writes one `angle<TAB>strength` line per bucket.
    pub fn write_to(&self, out: &mut impl Write) -> io::Result<()> {
        for (angle, strength) in self.points() {
            writeln!(out, "{}\t{}", angle, strength)?;
        }
        out.flush()
    }
}

/// See the module documentation.
#[derive(Debug, Clone, Default)]
pub struct DatasetAggregator {
    store: AngleBucketStore,
    open: Option<DatasetInfo>,
    statistic: Statistic,
}

impl DatasetAggregator {
    pub fn new(statistic: Statistic) -> Self {
        Self {
            store: AngleBucketStore::new(),
            open: None,
            statistic,
        }
    }

    /// True between a `start` and the following `emit`.
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn current(&self) -> Option<&DatasetInfo> {
        self.open.as_ref()
    }

    /// Checks that `name` fits in a boundary record.
    pub fn validate_name(name: &str) -> Result<(), DatasetError> {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(DatasetError::InvalidName(name.to_owned()));
        }
        Ok(())
    }

    /// Opens a new dataset.
    ///
    /// Starting while another dataset is open is a
    /// [`DatasetError::ProtocolViolation`], whether or not the open dataset
    /// has any samples yet.
    pub fn start(&mut self, name: &str, origin: i32, mode: Mode) -> Result<(), DatasetError> {
        if let Some(open) = &self.open {
            return Err(DatasetError::ProtocolViolation {
                open: open.label().to_owned(),
            });
        }
        Self::validate_name(name)?;

        info!("Starting {} dataset '{}' (origin {})", mode, name, origin);
        self.reset(DatasetInfo {
            name: Some(name.to_owned()),
            origin,
            mode,
        });
        Ok(())
    }

    fn reset(&mut self, info: DatasetInfo) {
        self.store.clear();
        self.open = Some(info);
    }

    /// Buckets a sample into the open dataset. Returns `false` if the sample
    /// was ignored, either because no dataset is open or because its angle
    /// is out of range.
    pub fn add(&mut self, sample: &Sample) -> bool {
        let Some(info) = &self.open else {
            debug!("Ignoring {:?}: no dataset is open", sample);
            return false;
        };

        let angle = info.mode.axis(sample);
        let recorded = self.store.record(angle, sample.strength);
        if !recorded {
            warn!("Dropping sample with {} of {}", info.mode, angle);
        }
        recorded
    }

    /// Closes the open dataset and hands its contents back. Emitting with no
    /// dataset open yields an empty dataset.
    pub fn emit(&mut self) -> EmittedDataset {
        let info = self.open.take();
        if let Some(info) = &info {
            info!("Emitting dataset '{}'", info.label());
        }

        EmittedDataset {
            info,
            statistic: self.statistic,
            store: std::mem::take(&mut self.store),
        }
    }

    /// Rebuilds datasets from logged records.
    ///
    /// Samples before the first boundary go into an implicit unnamed
    /// dataset. Every boundary emits whatever was pending and opens the next
    /// dataset, and the end of the records emits the last one, so a log with
    /// `n` boundaries always yields `n + 1` datasets. Annotations are handed
    /// to `on_annotation`. On a read error the aggregator is left closed
    /// and empty.
    pub fn replay<I, F>(
        &mut self,
        records: I,
        mut on_annotation: F,
    ) -> Result<Vec<EmittedDataset>, LogError>
    where
        I: IntoIterator<Item = Result<LogRecord, LogError>>,
        F: FnMut(&str),
    {
        self.reset(DatasetInfo::unnamed());
        let mut emitted = Vec::new();

        for record in records {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    self.store.clear();
                    self.open = None;
                    return Err(e);
                }
            };
            match record {
                LogRecord::Sample(sample) => {
                    self.add(&sample);
                }
                LogRecord::Boundary { name, origin, mode } => {
                    emitted.push(self.emit());
                    self.reset(DatasetInfo {
                        name: Some(name),
                        origin,
                        mode,
                    });
                }
                LogRecord::Annotation(text) => on_annotation(&text),
                LogRecord::Unrecognized(text) => {
                    warn!("Ignoring unrecognized directive '# {}'", text)
                }
            }
        }

        emitted.push(self.emit());
        Ok(emitted)
    }
}
