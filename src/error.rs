use thiserror::Error;

use crate::parse::LiteralError;
use crate::types::{CaptureError, GrammarError, PersistError};

/// Unified error type covering grammar definition, persistence, packet
/// capture, literal validation and I/O.
#[derive(Debug, Error)]
pub enum GuideError {
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Literal(#[from] LiteralError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
