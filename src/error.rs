//! Error types shared by the grid, the contact layer and the PDB adapter.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Cutoff is not a positive finite distance representable on the grid
    #[error("invalid cutoff {0}: must be a positive, finite distance")]
    InvalidCutoff(f64),

    /// One of the two atom sets handed to the grid is empty
    #[error("{0}-atom set is empty")]
    EmptyAtomSet(&'static str),

    #[error("{set}-atom {index} has a non-finite coordinate")]
    NonFiniteCoordinate { set: &'static str, index: usize },

    /// Coordinate beyond the range the fixed-point grid can bucket
    #[error("{set}-atom {index} has a coordinate beyond the grid range")]
    CoordinateOutOfRange { set: &'static str, index: usize },

    /// A precomputed bounding box does not enclose the atoms it was passed with
    #[error("bounding box hint for the {set}-atom set does not enclose atom {index}")]
    StaleBoundingBox { set: &'static str, index: usize },

    /// Non-crossed distances requested for two distinct atom sets
    #[error("non-crossed distances need the i- and j-atom sets to be the same slice")]
    NotSymmetric,

    /// Distances or density requested before any atoms were added
    #[error("no atoms have been added to the grid")]
    NoAtoms,

    #[error("invalid contact type: {0}")]
    InvalidContactType(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
