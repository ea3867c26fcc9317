pub mod executor;
pub mod runner;

pub use runner::{process_steps, run};

use thiserror::Error;

use crate::script::ParseError;

/// Outcome of executing a step or a whole step sequence. Signals propagate
/// upward through nested sequences: `BreakLoop` is absorbed by the nearest
/// enclosing loop, `BreakRun` is never absorbed and unwinds the entire run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    BreakLoop,
    BreakRun,
}

#[derive(Debug, Error)]
pub enum RunError {
    /// A required reference file or on-screen match was absent.
    #[error("{0}")]
    ImageNotFound(String),
    /// Malformed action payload, caught when the action executes.
    #[error("{0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Load(#[from] ParseError),
    #[error("failed to read script: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
pub(crate) mod testing;
