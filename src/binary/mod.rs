//! The binary codec: a recovering section reader and a scope-stack writer.

mod errors;
pub mod reader;
pub mod writer;

pub use errors::{EmitError, ReadError};
pub use reader::parse_binary;
pub use writer::emit_binary;
