//! A WebAssembly toolchain: parses the textual format, decodes the binary
//! format, validates modules against the type and stack discipline, and
//! re-emits them as text, binary, or a behavior-preserving C translation.
//!
//! Both front ends populate the same [`model::Module`]; every back end
//! consumes it. Recoverable input problems accumulate in a
//! [`diagnostics::Diagnostics`] collector instead of unwinding, so a single
//! pass reports everything wrong with a module.
//!
//! # Examples
//! ```rust
//! use wasm_mill::{emit_binary, parse_text, validate, Diagnostics};
//!
//! let mut diagnostics = Diagnostics::new();
//! let module = parse_text("(module)", &mut diagnostics);
//!
//! validate(&module, &mut diagnostics);
//! assert!(!diagnostics.has_errors());
//!
//! let mut binary = Vec::new();
//! emit_binary(&module, &mut binary).unwrap();
//!
//! assert_eq!(binary, b"\x00\x61\x73\x6D\x01\x00\x00\x00");
//! ```

pub mod binary;
pub mod buffer;
pub mod cgen;
pub mod diagnostics;
pub mod encodings;
pub mod instruction;
pub mod leb128;
pub mod model;
pub mod script;
pub mod text;
pub mod validator;

pub use binary::{emit_binary, parse_binary, EmitError};
pub use cgen::emit_c;
pub use diagnostics::{Context, Diagnostic, Diagnostics, Severity, SourcePos};
pub use encodings::{ExternalKind, Limits, Mutability, Opcode, SectionKind, ValueType};
pub use instruction::{BlockType, Immediate, Instruction};
pub use model::Module;
pub use script::{parse_script, Command, Script, ScriptValue};
pub use text::{emit_folded_text, emit_text, parse_text};
pub use validator::validate;
