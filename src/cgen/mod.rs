//! The C back end: translates a validated module into one self-contained C
//! translation unit backed by the small fixed runtime in `libwasm.h`.

pub mod builder;
pub mod names;
pub mod node;
pub mod printer;
pub mod simplify;

use std::io::Write;

use log::debug;

use crate::binary::EmitError;
use crate::diagnostics::{Context, Diagnostics};
use crate::encodings::{ExternalKind, Opcode, ValueType};
use crate::instruction::{Immediate, Instruction};
use crate::model::{Expression, Module, Signature};

use builder::BodyBuilder;

/// Emits the whole module as C. Unsupported constructs are reported through
/// the collector; the output is still produced for everything else.
pub fn emit_c<O: Write + ?Sized>(
    module: &Module,
    output: &mut O,
    optimize: bool,
    diagnostics: &mut Diagnostics,
) -> Result<(), EmitError> {
    let mut out = String::new();
    let mut generator = Generator {
        module,
        diagnostics,
        optimize,
    };

    generator.generate(&mut out);
    output.write_all(out.as_bytes())?;

    Ok(())
}

struct Generator<'a> {
    module: &'a Module,
    diagnostics: &'a mut Diagnostics,
    optimize: bool,
}

impl Generator<'_> {
    fn generate(&mut self, out: &mut String) {
        out.push_str("#include \"libwasm.h\"\n");
        out.push_str("\n#include <stdint.h>\n#include <math.h>\n#include <string.h>\n");

        self.generate_typedefs(out);
        self.generate_imports(out);
        self.generate_globals(out);
        self.generate_memories(out);
        self.generate_tables(out);
        self.generate_prototypes(out);
        self.generate_initialize(out);
        self.generate_functions(out);
    }

    /// The C type carrying one wasm value.
    fn c_type(&mut self, kind: ValueType) -> &'static str {
        if !matches!(
            kind,
            ValueType::I32 | ValueType::I64 | ValueType::F32 | ValueType::F64
        ) {
            if kind == ValueType::V128 {
                self.diagnostics.warning(
                    Context::None,
                    "v128 values in the C output require the SIMD runtime",
                );
            }
        }

        kind.c_name()
    }

    fn result_type(&mut self, signature: &Signature) -> &'static str {
        match signature.results.len() {
            0 => "void",
            1 => self.c_type(signature.results[0]),
            _ => {
                self.diagnostics.error(
                    Context::None,
                    "multiple results are not supported by the C generator",
                );
                "void"
            }
        }
    }

    fn generate_typedefs(&mut self, out: &mut String) {
        if self.module.types().is_empty() {
            return;
        }

        out.push('\n');

        for (index, declaration) in self.module.types().iter().enumerate() {
            let result = self.result_type(&declaration.signature).to_string();
            let params: Vec<String> = declaration
                .signature
                .param_types()
                .map(|kind| self.c_type(kind).to_string())
                .collect();

            out.push_str(&format!(
                "typedef {} (*type{})({});\n",
                result,
                index,
                if params.is_empty() {
                    "void".to_string()
                } else {
                    params.join(", ")
                }
            ));
        }
    }

    fn generate_imports(&mut self, out: &mut String) {
        if self.module.imports().is_empty() {
            return;
        }

        out.push('\n');

        for import in self.module.imports() {
            match import.kind {
                ExternalKind::Function => {
                    if let Some(function) = self.module.function(import.index) {
                        let signature = function.type_use.signature.clone();
                        let name = names::function_name(self.module, import.index);
                        let result = self.result_type(&signature).to_string();
                        let params: Vec<String> = signature
                            .param_types()
                            .map(|kind| self.c_type(kind).to_string())
                            .collect();

                        out.push_str(&format!(
                            "extern {} {}({});\n",
                            result,
                            name,
                            if params.is_empty() {
                                "void".to_string()
                            } else {
                                params.join(", ")
                            }
                        ));
                    }
                }
                ExternalKind::Global => {
                    if let Some(global) = self.module.global(import.index) {
                        let kind = self.c_type(global.value_type);

                        out.push_str(&format!(
                            "extern {} {};\n",
                            kind,
                            names::global_name(self.module, import.index)
                        ));
                    }
                }
                ExternalKind::Memory => {
                    out.push_str(&format!(
                        "extern Memory {};\n",
                        names::memory_name(self.module, import.index)
                    ));
                }
                ExternalKind::Table => {
                    out.push_str(&format!(
                        "extern Table {};\n",
                        names::table_name(self.module, import.index)
                    ));
                }
                ExternalKind::Event => {
                    self.diagnostics.warning(
                        Context::None,
                        "imported events are not represented in the C output",
                    );
                }
            }
        }
    }

    /// The C spelling of a constant initialiser.
    fn constant_text(&mut self, expression: &Expression) -> String {
        let instruction = match expression.instructions.first() {
            Some(instruction) => instruction,
            None => return "0".to_string(),
        };

        self.instruction_constant_text(instruction)
    }

    fn instruction_constant_text(&mut self, instruction: &Instruction) -> String {
        match (&instruction.opcode, &instruction.imm) {
            (Opcode::I32Const, Immediate::I32(value)) => value.to_string(),
            (Opcode::I64Const, Immediate::I64(value)) => {
                if *value == i64::MIN {
                    "(-9223372036854775807LL - 1)".to_string()
                } else {
                    format!("{}LL", value)
                }
            }
            (Opcode::F32Const, Immediate::F32(value)) => {
                let mut text = String::new();
                let (tree, id) = single_node_tree(node::CKind::F32(*value));

                printer::print_expression(&tree, id, &mut text);
                text
            }
            (Opcode::F64Const, Immediate::F64(value)) => {
                let mut text = String::new();
                let (tree, id) = single_node_tree(node::CKind::F64(*value));

                printer::print_expression(&tree, id, &mut text);
                text
            }
            (Opcode::GlobalGet, Immediate::Index(index)) => {
                names::global_name(self.module, *index)
            }
            (Opcode::RefNull, _) => "NULL".to_string(),
            (Opcode::RefFunc, Immediate::Index(index)) => {
                names::function_name(self.module, *index)
            }
            _ => {
                self.diagnostics.error(
                    Context::None,
                    format!(
                        "'{}' is not a constant the C generator understands",
                        instruction.opcode
                    ),
                );
                "0".to_string()
            }
        }
    }

    fn generate_globals(&mut self, out: &mut String) {
        let imported = self.module.imported_global_count() as usize;

        if self.module.globals().len() == imported {
            return;
        }

        out.push('\n');

        for (offset, global) in self.module.globals()[imported..].iter().enumerate() {
            let index = (imported + offset) as u32;
            let name = names::global_name(self.module, index);
            let kind = self.c_type(global.value_type);
            let value = match &global.initializer {
                Some(expression) => self.constant_text(expression),
                None => "0".to_string(),
            };

            out.push_str(&format!("{} {} = {};\n", kind, name, value));
        }
    }

    fn generate_memories(&mut self, out: &mut String) {
        let imported = self.module.imported_memory_count() as usize;

        if self.module.memories().len() == imported {
            return;
        }

        out.push('\n');

        for index in imported..self.module.memories().len() {
            out.push_str(&format!(
                "Memory {};\n",
                names::memory_name(self.module, index as u32)
            ));
        }
    }

    fn generate_tables(&mut self, out: &mut String) {
        let imported = self.module.imported_table_count() as usize;

        if self.module.tables().len() == imported {
            return;
        }

        out.push('\n');

        for index in imported..self.module.tables().len() {
            out.push_str(&format!(
                "Table {};\n",
                names::table_name(self.module, index as u32)
            ));
        }
    }

    fn function_header(&mut self, index: u32) -> String {
        let signature = self
            .module
            .function(index)
            .map(|function| function.type_use.signature.clone())
            .unwrap_or_default();
        let result = self.result_type(&signature).to_string();
        let name = names::function_name(self.module, index);

        let params: Vec<String> = signature
            .param_types()
            .enumerate()
            .map(|(position, kind)| {
                format!("{} p{}", self.c_type(kind), position)
            })
            .collect();

        format!(
            "{} {}({})",
            result,
            name,
            if params.is_empty() {
                "void".to_string()
            } else {
                params.join(", ")
            }
        )
    }

    fn generate_prototypes(&mut self, out: &mut String) {
        let imported = self.module.imported_function_count();

        if self.module.functions().len() == imported as usize {
            return;
        }

        out.push('\n');

        for index in imported..self.module.functions().len() as u32 {
            let header = self.function_header(index);

            out.push_str(&format!("{};\n", header));
        }
    }

    /// `initialize()` fills every non-imported memory and table with its
    /// segments' contents.
    fn generate_initialize(&mut self, out: &mut String) {
        out.push_str("\nvoid initialize()\n{\n");

        let imported_memories = self.module.imported_memory_count();

        for index in imported_memories..self.module.memories().len() as u32 {
            let memory = &self.module.memories()[index as usize];
            let name = names::memory_name(self.module, index);

            out.push_str(&format!(
                "    initializeMemory(&{}, {}, {});\n",
                name,
                memory.limits.min,
                memory.limits.max.unwrap_or(0xFFFF)
            ));
        }

        for segment in self.module.data_segments() {
            if !segment.is_active() {
                continue;
            }

            let name = names::memory_name(self.module, segment.memory_index);
            let offset = segment
                .offset
                .as_ref()
                .map(|expression| self.constant_text(expression))
                .unwrap_or_else(|| "0".to_string());

            out.push_str(&format!(
                "    memcpy({}.data + {}, \"{}\", {});\n",
                name,
                offset,
                escape_c_bytes(&segment.bytes),
                segment.bytes.len()
            ));
        }

        let imported_tables = self.module.imported_table_count();

        for index in imported_tables..self.module.tables().len() as u32 {
            let table = &self.module.tables()[index as usize];
            let name = names::table_name(self.module, index);

            out.push_str(&format!(
                "    initializeTable(&{}, {}, {});\n",
                name,
                table.limits.min,
                table.limits.max.unwrap_or(0xFFFFFFFF)
            ));
        }

        let active_elements = self
            .module
            .elements()
            .iter()
            .any(|element| element.is_active());

        if active_elements {
            out.push_str("    uint32_t offset;\n");
        }

        for element in self.module.elements() {
            if !element.is_active() {
                continue;
            }

            let table = names::table_name(self.module, element.table_index);
            let offset = element
                .offset
                .as_ref()
                .map(|expression| self.constant_text(expression))
                .unwrap_or_else(|| "0".to_string());

            out.push_str(&format!("    offset = {};\n", offset));

            if element.uses_expressions() {
                for expression in &element.ref_expressions {
                    let value = self.constant_text(expression);

                    out.push_str(&format!(
                        "    {}.data[offset++] = {};\n",
                        table, value
                    ));
                }
            } else {
                for &function in &element.function_indexes {
                    out.push_str(&format!(
                        "    {}.data[offset++] = {};\n",
                        table,
                        names::function_name(self.module, function)
                    ));
                }
            }
        }

        if let Some(start) = self.module.start() {
            out.push_str(&format!(
                "    {}();\n",
                names::function_name(self.module, start)
            ));
        }

        out.push_str("}\n");
    }

    fn generate_functions(&mut self, out: &mut String) {
        for entry in self.module.code_entries() {
            debug!("generating C for function {}", entry.number);

            let header = self.function_header(entry.number);
            let built = BodyBuilder::new(self.module, entry, self.diagnostics).generate();
            let mut tree = built.tree;

            if self.optimize {
                simplify::simplify(&mut tree, built.body);
            }

            out.push_str(&format!("\n{}\n{{\n", header));

            let param_count = self
                .module
                .function(entry.number)
                .map(|function| function.type_use.signature.params.len() as u32)
                .unwrap_or(0);

            for (position, local) in entry.locals.iter().enumerate() {
                let kind = self.c_type(local.value_type);
                let name = names::local_name(param_count + position as u32, param_count);

                out.push_str(&format!("    {} {} = 0;\n", kind, name));
            }

            for statement in tree.children(built.body) {
                printer::print_statement(&tree, statement, out, 1);
            }

            out.push_str("}\n");
        }
    }
}

fn single_node_tree(kind: node::CKind) -> (node::CTree, node::NodeId) {
    let mut tree = node::CTree::new();
    let id = tree.add(kind);

    (tree, id)
}

/// Escapes raw segment bytes into a C string literal body. Octal escapes are
/// fixed-width so a following digit cannot extend them.
fn escape_c_bytes(bytes: &[u8]) -> String {
    let mut escaped = String::with_capacity(bytes.len());

    for &byte in bytes {
        match byte {
            b'"' => escaped.push_str("\\\""),
            b'\\' => escaped.push_str("\\\\"),
            0x20..=0x7E => escaped.push(byte as char),
            _ => escaped.push_str(&format!("\\{:03o}", byte)),
        }
    }

    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::parse_text;

    fn generate(source: &str, optimize: bool) -> (String, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let module = parse_text(source, &mut diagnostics);

        assert!(!diagnostics.has_errors(), "{}", diagnostics);

        let mut output = Vec::new();

        emit_c(&module, &mut output, optimize, &mut diagnostics).unwrap();
        (String::from_utf8(output).unwrap(), diagnostics)
    }

    #[test]
    fn add_one_compiles_to_a_single_return() {
        let (output, diagnostics) = generate(
            "(module
               (func (export \"addOne\") (param i32) (result i32)
                 local.get 0
                 i32.const 1
                 i32.add))",
            true,
        );

        assert!(!diagnostics.has_errors(), "{}", diagnostics);
        assert!(output.contains("int32_t addOne(int32_t p0)"), "{}", output);
        assert!(output.contains("return p0 + 1;"), "{}", output);
    }

    #[test]
    fn header_includes_runtime_and_libc() {
        let (output, _) = generate("(module)", false);

        assert!(output.contains("#include \"libwasm.h\""));
        assert!(output.contains("#include <stdint.h>"));
        assert!(output.contains("#include <math.h>"));
        assert!(output.contains("#include <string.h>"));
        assert!(output.contains("void initialize()"));
    }

    #[test]
    fn imports_become_extern_declarations() {
        let (output, _) = generate(
            "(module
               (import \"env\" \"log\" (func $log (param i32)))
               (import \"env\" \"mem\" (memory 1))
               (func (export \"run\") (i32.const 7) (call $log)))",
            false,
        );

        assert!(output.contains("extern void log_(int32_t);"), "{}", output);
        assert!(output.contains("extern Memory mem;"), "{}", output);
        assert!(output.contains("log_(7);"), "{}", output);
    }

    #[test]
    fn initialize_fills_memory_and_tables() {
        let (output, diagnostics) = generate(
            "(module
               (func $f)
               (memory 2 4)
               (table 2 funcref)
               (elem (i32.const 1) func $f)
               (data (i32.const 8) \"ok\\00\"))",
            false,
        );

        assert!(!diagnostics.has_errors(), "{}", diagnostics);
        assert!(
            output.contains("initializeMemory(&memory0, 2, 4);"),
            "{}",
            output
        );
        assert!(
            output.contains("memcpy(memory0.data + 8, \"ok\\000\", 3);"),
            "{}",
            output
        );
        assert!(
            output.contains("initializeTable(&table0, 2, 4294967295);"),
            "{}",
            output
        );
        assert!(output.contains("offset = 1;"), "{}", output);
        assert!(output.contains("table0.data[offset++] = f;"), "{}", output);
    }

    #[test]
    fn globals_and_typedefs_are_emitted() {
        let (output, _) = generate(
            "(module
               (type $binop (func (param i32 i32) (result i32)))
               (global $counter (mut i64) (i64.const 7))
               (func (type $binop) local.get 0))",
            false,
        );

        assert!(
            output.contains("typedef int32_t (*type0)(int32_t, int32_t);"),
            "{}",
            output
        );
        assert!(output.contains("int64_t counter = 7LL;"), "{}", output);
    }

    #[test]
    fn load_store_and_helpers_appear_by_name() {
        let (output, diagnostics) = generate(
            "(module
               (memory 1)
               (func (export \"touch\") (param i32) (result i32)
                 (i64.store offset=8 (local.get 0) (i64.const 1))
                 (i32.clz (i32.load (local.get 0)))))",
            false,
        );

        assert!(!diagnostics.has_errors(), "{}", diagnostics);
        assert!(output.contains("storeI64(&memory0, p0 + 8, 1LL);"), "{}", output);
        assert!(output.contains("clz32(loadI32(&memory0, p0))"), "{}", output);
    }

    #[test]
    fn locals_are_zero_initialised() {
        let (output, _) = generate(
            "(module
               (func (export \"l\") (result i32)
                 (local i32 i64)
                 local.get 0))",
            false,
        );

        assert!(output.contains("int32_t l0 = 0;"), "{}", output);
        assert!(output.contains("int64_t l1 = 0;"), "{}", output);
    }
}
