use thiserror::Error;

/// An error in LEB128 encoding or decoding.
#[derive(Error, Copy, Clone, Debug, Eq, PartialEq)]
pub enum Leb128Error {
    #[error("The encoding uses {0} bytes, but at most {1} are allowed for this width.")]
    Overlong(usize, usize),
    #[error("The input ended inside an LEB128 encoding.")]
    Truncated,
    #[error("The final encoding group carries bits outside the value's width.")]
    Overflow,
}
