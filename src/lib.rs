//! antpattern measures the radiation pattern of an antenna. It steers a
//! mechanical rotator through azimuth and elevation sweeps, reads the signal
//! strength of a receiver while the rotator is moving, and reduces the raw
//! readings into a compact angle to strength table that is easy to plot.
//!
//! The pieces, from the bottom up:
//!
//! - [`bucket_store`] keeps the best reading per integer degree.
//! - [`dataset`] runs the lifecycle of named datasets on top of it and turns
//!   buckets into plot angles.
//! - [`acquisition_log`] writes every raw sample to disk and reads it back,
//!   so any run can be replayed offline through the same aggregation.
//! - [`session`] ties one aggregator to one log.
//! - [`scan_plan`] and [`scan_controller`] decide where the rotator goes and
//!   feed the session while it gets there.
//! - [`hardware`], [`rotator`], [`receiver`], [`source`] and [`dummy_rig`]
//!   talk to (or pretend to be) the actual equipment.
//! - [`config`], [`args`] and [`gui`] are what the binaries need to get a
//!   run configured.

#![warn(missing_docs)]
pub mod acquisition_log;
pub mod args;
pub mod bucket_store;
pub mod config;
pub mod dataset;
pub mod dummy_rig;
pub mod gui;
pub mod hardware;
pub mod receiver;
pub mod rotator;
pub mod scan_controller;
pub mod scan_plan;
pub mod session;
pub mod source;

/// One signal strength reading taken at a known orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Degrees, clockwise from north.
    pub azimuth: f64,
    /// Degrees above the horizon.
    pub elevation: f64,
    /// Receiver units, usually dB.
    pub strength: f64,
}
