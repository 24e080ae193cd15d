//! Deterministic C identifiers for module entities: the export or import
//! name when there is one, the textual id otherwise, and a numbered fallback.
//! Reserved words and non-identifier bytes are escaped.

use crate::encodings::ExternalKind;
use crate::model::{IdSpace, Module};

/// C and runtime-header words a generated identifier may not collide with.
const RESERVED: &[&str] = &[
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
    "enum", "extern", "float", "for", "goto", "if", "inline", "int", "long", "register",
    "restrict", "return", "short", "signed", "sizeof", "static", "struct", "switch", "typedef",
    "union", "unsigned", "void", "volatile", "while", "bool", "true", "false", "main",
    "initialize", "ceil", "floor", "trunc", "sqrt", "fabs", "memcpy", "abort", "log", "exp",
    "pow", "sin", "cos", "tan", "rint", "fmin", "fmax", "copysign",
];

/// Escapes an arbitrary byte string into a C identifier.
pub fn escape(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());

    for (index, byte) in name.bytes().enumerate() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => escaped.push(byte as char),
            b'0'..=b'9' if index > 0 => escaped.push(byte as char),
            _ => escaped.push_str(&format!("_{:02x}", byte)),
        }
    }

    if escaped.is_empty() || RESERVED.contains(&escaped.as_str()) {
        escaped.push('_');
    }

    escaped
}

fn entity_name(
    module: &Module,
    kind: ExternalKind,
    space: IdSpace,
    index: u32,
    fallback_prefix: &str,
) -> String {
    let import = module
        .imports()
        .iter()
        .find(|import| import.kind == kind && import.index == index)
        .map(|import| import.field.as_str());

    if let Some(name) = import {
        return escape(name);
    }

    if let Some(export) = module.export_of(kind, index) {
        return escape(&export.name);
    }

    if let Some(id) = module.id_of(space, index) {
        return escape(id);
    }

    format!("{}{}", fallback_prefix, index)
}

pub fn function_name(module: &Module, index: u32) -> String {
    entity_name(module, ExternalKind::Function, IdSpace::Function, index, "f")
}

pub fn global_name(module: &Module, index: u32) -> String {
    entity_name(module, ExternalKind::Global, IdSpace::Global, index, "g")
}

pub fn memory_name(module: &Module, index: u32) -> String {
    entity_name(module, ExternalKind::Memory, IdSpace::Memory, index, "memory")
}

pub fn table_name(module: &Module, index: u32) -> String {
    entity_name(module, ExternalKind::Table, IdSpace::Table, index, "table")
}

/// A parameter or local of a function body.
pub fn local_name(index: u32, param_count: u32) -> String {
    if index < param_count {
        format!("p{}", index)
    } else {
        format!("l{}", index - param_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_pass_through() {
        assert_eq!(escape("add"), "add");
        assert_eq!(escape("two_words"), "two_words");
    }

    #[test]
    fn reserved_words_get_a_suffix() {
        assert_eq!(escape("while"), "while_");
        assert_eq!(escape("main"), "main_");
    }

    #[test]
    fn strange_bytes_are_hex_escaped() {
        assert_eq!(escape("a-b"), "a_2db");
        assert_eq!(escape("1st"), "_31st");
        assert_eq!(escape(""), "_");
    }

    #[test]
    fn locals_split_params_from_the_rest() {
        assert_eq!(local_name(0, 2), "p0");
        assert_eq!(local_name(1, 2), "p1");
        assert_eq!(local_name(2, 2), "l0");
    }
}
