use thiserror::Error;

use crate::leb128::Leb128Error;

/// An error reading primitive values out of a byte buffer.
#[derive(Error, Copy, Clone, Debug, Eq, PartialEq)]
pub enum BufferError {
    #[error("The input ended {0} byte(s) short of the requested read.")]
    UnexpectedEnd(usize),
    #[error("{0}")]
    Leb128(#[from] Leb128Error),
}
