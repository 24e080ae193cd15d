use thiserror::Error;

use crate::buffer::BufferError;
use crate::instruction::InstructionError;
use crate::model::ModelError;

/// A recoverable problem while decoding one section entry. The reader reports
/// it with section/entry context and reseeks to the section boundary.
#[derive(Error, Clone, Debug, Eq, PartialEq)]
pub enum ReadError {
    #[error("{0}")]
    Buffer(#[from] BufferError),
    #[error("{0}")]
    Instruction(#[from] InstructionError),
    #[error("{0}")]
    Model(#[from] ModelError),
    #[error("{0}")]
    Malformed(String),
}

impl ReadError {
    pub fn malformed(message: impl Into<String>) -> Self {
        ReadError::Malformed(message.into())
    }
}

/// A hard failure while emitting: only the output sink can produce one.
#[derive(Error, Debug)]
pub enum EmitError {
    #[error("An IO error occurred.")]
    Io(#[from] std::io::Error),
}
