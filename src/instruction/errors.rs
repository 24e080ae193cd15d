use thiserror::Error;

use crate::buffer::BufferError;

/// An error decoding a single instruction from the binary format.
#[derive(Error, Clone, Debug, Eq, PartialEq)]
pub enum InstructionError {
    #[error("{0}")]
    Buffer(#[from] BufferError),
    #[error("invalid opcode 0x{0:02x}")]
    UnknownOpcode(u32),
    #[error("invalid opcode 0x{0:02x} 0x{1:02x}")]
    UnknownPrefixedOpcode(u8, u32),
    #[error("invalid block type {0}")]
    InvalidBlockType(i64),
    #[error("reserved byte must be zero, found 0x{0:02x}")]
    NonZeroReserved(u8),
    #[error("lane index {0} exceeds the limit of {1}")]
    LaneOutOfRange(u8, u8),
}
