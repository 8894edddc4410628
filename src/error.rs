//! Error kinds surfaced by the playback and editing core.
//!
//! Lookups that routinely miss (agents, groups, selected tiles that no
//! longer exist after a round transition) return `Option` instead.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("cell ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    },
    #[error("round {received} arrived out of sequence, expected round {expected}")]
    Sequence { expected: u32, received: u32 },
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("invalid value for field '{field}': {reason}")]
    InvalidField { field: String, reason: String },
    #[error("edit rejected: {0}")]
    Rejected(String),
    #[error("world cannot be edited once the simulation has started")]
    Editing,
}

pub type EngineResult<T> = Result<T, EngineError>;
