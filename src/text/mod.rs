//! The text front end: lexer and token buffer, the two-pass parser, and the
//! flat and folded printers.

pub mod folded;
pub mod lexer;
pub mod number;
pub mod parser;
pub mod printer;
pub mod tokens;

pub use lexer::tokenize;
pub use parser::parse_text;
pub use printer::{emit_folded_text, emit_text};
pub use tokens::{Token, TokenBuffer, TokenKind};
