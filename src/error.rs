/// Errors raised by the data-conditioning pipeline
use thiserror::Error;

use crate::merge::Incompatibility;

pub type Result<T> = std::result::Result<T, MogError>;

#[derive(Error, Debug)]
pub enum MogError {
    /// A depth could not be located on a trajectory
    #[error("Depth {depth} is outside of the trajectory (covered length: 0-{length})")]
    OutOfRange { depth: f64, length: f64 },

    #[error("Invalid borehole geometry: {0}")]
    Geometry(String),

    #[error("{other} is not compatible with {reference}: {reasons:?}")]
    Incompatible {
        reference: String,
        other: String,
        reasons: Vec<Incompatibility>,
    },

    /// Travel times are missing for traces that are needed
    #[error("Traveltimes were not picked for {mog} (traces: {traces:?})")]
    IncompleteData { mog: String, traces: Vec<usize> },

    #[error("Air shot calibration failed: {0}")]
    Calibration(String),

    #[error("An SNR threshold is set for {mog} but no SNR estimate was supplied")]
    MissingSnr { mog: String },

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    /// A project file that parses but does not describe a consistent project
    #[error("Invalid project file: {0}")]
    Format(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
