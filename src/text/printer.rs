//! The text-format printer: flat (one instruction per line) and folded
//! (S-expression) renderings share everything but the body printer.

use std::io::Write;

use crate::binary::EmitError;
use crate::encodings::{ExternalKind, ImmediateKind, Limits, Mutability, Opcode, ValueType};
use crate::instruction::{BlockType, Immediate, Instruction};
use crate::model::{CodeEntry, ExportDeclaration, Expression, IdSpace, Module, Signature};
use crate::text::folded::{fold_expression, ExprS};

/// Prints the module flat: postfix instructions, one per line.
pub fn emit_text<O: Write + ?Sized>(module: &Module, output: &mut O) -> Result<(), EmitError> {
    let mut printer = Printer {
        module,
        out: String::new(),
        folded: false,
    };

    printer.print_module();
    output.write_all(printer.out.as_bytes())?;

    Ok(())
}

/// Prints the module with instruction operands regrouped into folded form.
pub fn emit_folded_text<O: Write + ?Sized>(
    module: &Module,
    output: &mut O,
) -> Result<(), EmitError> {
    let mut printer = Printer {
        module,
        out: String::new(),
        folded: true,
    };

    printer.print_module();
    output.write_all(printer.out.as_bytes())?;

    Ok(())
}

/// Tracks nesting depth for the body printers.
pub struct InstructionContext {
    indent: usize,
}

impl InstructionContext {
    pub fn new(indent: usize) -> Self {
        InstructionContext { indent }
    }

    pub fn enter(&mut self) {
        self.indent += 1;
    }

    pub fn leave(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    pub fn margin(&self) -> String {
        "  ".repeat(self.indent)
    }
}

struct Printer<'m> {
    module: &'m Module,
    out: String,
    folded: bool,
}

impl Printer<'_> {
    fn push(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn print_module(&mut self) {
        self.push("(module");

        if let Some(id) = &self.module.id {
            self.push(&format!(" ${}", id));
        }

        self.print_types();
        self.print_imports();
        self.print_tables();
        self.print_memories();
        self.print_globals();
        self.print_functions();
        self.print_exports();
        self.print_start();
        self.print_elements();
        self.print_data();

        self.push(")\n");
    }

    fn name_or_index(&self, space: IdSpace, index: u32) -> String {
        match self.module.id_of(space, index) {
            Some(id) => format!("${}", id),
            None => index.to_string(),
        }
    }

    /// A declaration-position id: ` $name` when bound, nothing otherwise
    /// (declarations never carry numeric indices).
    fn declared_id(&self, space: IdSpace, index: u32) -> String {
        match self.module.id_of(space, index) {
            Some(id) => format!(" ${}", id),
            None => String::new(),
        }
    }

    fn print_types(&mut self) {
        for declaration in self.module.types() {
            let name = match &declaration.id {
                Some(id) => format!(" ${}", id),
                None => String::new(),
            };

            self.push(&format!("\n  (type{} (func", name));
            self.push(&signature_text(&declaration.signature));
            self.push("))");
        }
    }

    fn print_imports(&mut self) {
        for import in self.module.imports() {
            self.push(&format!(
                "\n  (import \"{}\" \"{}\" ",
                escape_text(&import.module),
                escape_text(&import.field)
            ));

            match import.kind {
                ExternalKind::Function => {
                    let declaration = self.module.function(import.index);
                    let name = self.declared_id(IdSpace::Function, import.index);
                    let type_index = declaration.map(|decl| decl.type_use.index).unwrap_or(0);

                    self.push(&format!("(func{} (type {})", name, type_index));
                }
                ExternalKind::Table => {
                    let name = self.declared_id(IdSpace::Table, import.index);

                    self.push(&format!("(table{}", name));

                    if let Some(table) = self.module.table(import.index) {
                        self.push(&format!(" {} {}", limits_text(&table.limits), table.ref_type));
                    }
                }
                ExternalKind::Memory => {
                    let name = self.declared_id(IdSpace::Memory, import.index);

                    self.push(&format!("(memory{}", name));

                    if let Some(memory) = self.module.memory(import.index) {
                        self.push(&format!(" {}", limits_text(&memory.limits)));
                    }
                }
                ExternalKind::Global => {
                    let name = self.declared_id(IdSpace::Global, import.index);

                    self.push(&format!("(global{}", name));

                    if let Some(global) = self.module.global(import.index) {
                        self.push(&format!(" {}", global_type_text(global.value_type, global.mutability)));
                    }
                }
                ExternalKind::Event => {
                    let name = self.declared_id(IdSpace::Event, import.index);

                    self.push(&format!("(event{}", name));

                    if let Some(event) = self.module.event(import.index) {
                        self.push(&format!(" (type {})", event.type_use.index));
                    }
                }
            }

            self.push("))");
        }
    }

    fn print_tables(&mut self) {
        let imported = self.module.imported_table_count() as usize;

        for (offset, table) in self.module.tables()[imported..].iter().enumerate() {
            let index = (imported + offset) as u32;
            let name = self.declared_id(IdSpace::Table, index);

            self.push(&format!(
                "\n  (table{} {} {})",
                name,
                limits_text(&table.limits),
                table.ref_type
            ));
        }
    }

    fn print_memories(&mut self) {
        let imported = self.module.imported_memory_count() as usize;

        for (offset, memory) in self.module.memories()[imported..].iter().enumerate() {
            let index = (imported + offset) as u32;
            let name = self.declared_id(IdSpace::Memory, index);

            self.push(&format!("\n  (memory{} {})", name, limits_text(&memory.limits)));
        }
    }

    fn print_globals(&mut self) {
        let imported = self.module.imported_global_count() as usize;

        for (offset, global) in self.module.globals()[imported..].iter().enumerate() {
            let index = (imported + offset) as u32;
            let name = self.declared_id(IdSpace::Global, index);
            let initializer = global
                .initializer
                .as_ref()
                .map(|expression| self.init_text(expression))
                .unwrap_or_default();

            self.push(&format!(
                "\n  (global{} {} {})",
                name,
                global_type_text(global.value_type, global.mutability),
                initializer
            ));
        }
    }

    /// A constant initialiser as a single folded expression.
    fn init_text(&self, expression: &Expression) -> String {
        expression
            .instructions
            .iter()
            .map(|instruction| format!("({})", self.instruction_text(instruction, None)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn print_functions(&mut self) {
        let imported = self.module.imported_function_count() as usize;

        for (offset, function) in self.module.functions()[imported..].iter().enumerate() {
            let index = (imported + offset) as u32;
            let name = self.declared_id(IdSpace::Function, index);

            self.push(&format!(
                "\n  (func{} (type {})",
                name, function.type_use.index
            ));
            self.push(&signature_text(&function.type_use.signature));

            if let Some(entry) = self.module.code_entry(index) {
                self.print_locals(entry);

                if self.folded {
                    self.print_folded_body(entry);
                } else {
                    self.print_flat_body(entry);
                }
            }

            self.push(")");
        }
    }

    fn print_locals(&mut self, entry: &CodeEntry) {
        for local in &entry.locals {
            match &local.id {
                Some(id) => self.push(&format!("\n    (local ${} {})", id, local.value_type)),
                None => self.push(&format!("\n    (local {})", local.value_type)),
            }
        }
    }

    fn print_flat_body(&mut self, entry: &CodeEntry) {
        let mut context = InstructionContext::new(2);
        let instructions = &entry.expression.instructions;

        // The structural end closing the function body stays implicit.
        let body = match instructions.last() {
            Some(last) if last.opcode == Opcode::End => &instructions[..instructions.len() - 1],
            _ => &instructions[..],
        };

        for instruction in body {
            match instruction.opcode {
                Opcode::End => context.leave(),
                Opcode::Else | Opcode::Catch => context.leave(),
                _ => {}
            }

            self.push(&format!(
                "\n{}{}",
                context.margin(),
                self.instruction_text(instruction, Some(entry))
            ));

            match instruction.opcode {
                Opcode::Else | Opcode::Catch => context.enter(),
                opcode if opcode.is_block_start() => context.enter(),
                _ => {}
            }
        }
    }

    fn print_folded_body(&mut self, entry: &CodeEntry) {
        let folded = fold_expression(&entry.expression, self.module);
        let mut context = InstructionContext::new(2);

        for expr in &folded {
            self.print_folded_expr(expr, entry, &mut context);
        }
    }

    fn print_folded_expr(
        &mut self,
        expr: &ExprS,
        entry: &CodeEntry,
        context: &mut InstructionContext,
    ) {
        match expr {
            ExprS::Plain {
                instruction,
                children,
            } => {
                let text = self.instruction_text(instruction, Some(entry));

                if children.is_empty() {
                    self.push(&format!("\n{}({})", context.margin(), text));
                } else {
                    self.push(&format!("\n{}({}", context.margin(), text));
                    context.enter();

                    for child in children {
                        self.print_folded_expr(child, entry, context);
                    }

                    context.leave();
                    self.push(")");
                }
            }
            ExprS::Block { instruction, body } => {
                let text = self.instruction_text(instruction, Some(entry));

                self.push(&format!("\n{}({}", context.margin(), text));
                context.enter();

                for child in body {
                    self.print_folded_expr(child, entry, context);
                }

                context.leave();
                self.push(")");
            }
            ExprS::If {
                instruction,
                condition,
                then_body,
                else_body,
            } => {
                let text = self.instruction_text(instruction, Some(entry));

                self.push(&format!("\n{}({}", context.margin(), text));
                context.enter();

                for child in condition {
                    self.print_folded_expr(child, entry, context);
                }

                self.push(&format!("\n{}(then", context.margin()));
                context.enter();

                for child in then_body {
                    self.print_folded_expr(child, entry, context);
                }

                context.leave();
                self.push(")");

                if let Some(else_body) = else_body {
                    self.push(&format!("\n{}(else", context.margin()));
                    context.enter();

                    for child in else_body {
                        self.print_folded_expr(child, entry, context);
                    }

                    context.leave();
                    self.push(")");
                }

                context.leave();
                self.push(")");
            }
        }
    }

    fn print_exports(&mut self) {
        for export in self.module.exports() {
            self.print_export(export);
        }
    }

    fn print_export(&mut self, export: &ExportDeclaration) {
        let space = match export.kind {
            ExternalKind::Function => IdSpace::Function,
            ExternalKind::Table => IdSpace::Table,
            ExternalKind::Memory => IdSpace::Memory,
            ExternalKind::Global => IdSpace::Global,
            ExternalKind::Event => IdSpace::Event,
        };

        self.push(&format!(
            "\n  (export \"{}\" ({} {}))",
            escape_text(&export.name),
            export.kind,
            self.name_or_index(space, export.index)
        ));
    }

    fn print_start(&mut self) {
        if let Some(index) = self.module.start() {
            self.push(&format!(
                "\n  (start {})",
                self.name_or_index(IdSpace::Function, index)
            ));
        }
    }

    fn print_elements(&mut self) {
        for element in self.module.elements() {
            // Zero-offset single-table segments synthesised from inline
            // `(table … (elem …))` forms print in the standalone spelling.
            self.push("\n  (elem");

            if element.is_active() {
                if element.table_index != 0 {
                    self.push(&format!(
                        " (table {})",
                        self.name_or_index(IdSpace::Table, element.table_index)
                    ));
                }

                if let Some(offset) = &element.offset {
                    self.push(&format!(" {}", self.init_text(offset)));
                }
            } else if element.flags & crate::model::ELEMENT_EXPLICIT_INDEX != 0 {
                self.push(" declare");
            }

            if element.uses_expressions() {
                self.push(&format!(" {}", element.ref_type));

                for expression in &element.ref_expressions {
                    self.push(&format!(" (item {})", self.init_text(expression)));
                }
            } else {
                self.push(" func");

                for &index in &element.function_indexes {
                    self.push(&format!(" {}", self.name_or_index(IdSpace::Function, index)));
                }
            }

            self.push(")");
        }
    }

    fn print_data(&mut self) {
        for segment in self.module.data_segments() {
            self.push("\n  (data");

            if segment.is_active() {
                if segment.memory_index != 0 {
                    self.push(&format!(
                        " (memory {})",
                        self.name_or_index(IdSpace::Memory, segment.memory_index)
                    ));
                }

                if let Some(offset) = &segment.offset {
                    self.push(&format!(" {}", self.init_text(offset)));
                }
            }

            self.push(&format!(" \"{}\")", escape_bytes(&segment.bytes)));
        }
    }

    /// One instruction, without newline or margin.
    fn instruction_text(&self, instruction: &Instruction, entry: Option<&CodeEntry>) -> String {
        let opcode = instruction.opcode;
        let mut text = opcode.name().to_string();

        match &instruction.imm {
            Immediate::None => {}
            Immediate::I32(value) => text.push_str(&format!(" {}", value)),
            Immediate::I64(value) => text.push_str(&format!(" {}", value)),
            Immediate::F32(value) => text.push_str(&format!(" {}", format_f32(*value))),
            Immediate::F64(value) => text.push_str(&format!(" {}", format_f64(*value))),
            Immediate::V128(bytes) => {
                text.push_str(" i8x16");

                for byte in bytes {
                    text.push_str(&format!(" {}", byte));
                }
            }
            Immediate::Block { block_type, label } => {
                if let Some(label) = label {
                    text.push_str(&format!(" ${}", label));
                }

                match block_type {
                    BlockType::Void => {}
                    BlockType::Value(kind) => text.push_str(&format!(" (result {})", kind)),
                    BlockType::TypeIndex(index) => {
                        text.push_str(&format!(" (type {})", index));

                        if let Some(signature) = self.module.signature(*index) {
                            text.push_str(&signature_text(signature));
                        }
                    }
                }
            }
            Immediate::Index(index) => {
                let rendered = match opcode.imm() {
                    ImmediateKind::LocalIdx => local_name(entry, *index),
                    ImmediateKind::GlobalIdx => self.name_or_index(IdSpace::Global, *index),
                    ImmediateKind::FunctionIdx => self.name_or_index(IdSpace::Function, *index),
                    ImmediateKind::LabelIdx => index.to_string(),
                    ImmediateKind::Idx | ImmediateKind::IdxZero => {
                        let space = match opcode {
                            Opcode::DataDrop | Opcode::MemoryInit => IdSpace::Data,
                            Opcode::ElemDrop => IdSpace::Element,
                            Opcode::Throw => IdSpace::Event,
                            _ => IdSpace::Table,
                        };

                        self.name_or_index(space, *index)
                    }
                    _ => index.to_string(),
                };

                text.push_str(&format!(" {}", rendered));
            }
            Immediate::BrTable { targets, default } => {
                for target in targets {
                    text.push_str(&format!(" {}", target));
                }

                text.push_str(&format!(" {}", default));
            }
            Immediate::Memory { align, offset } => {
                text.push_str(&memarg_text(opcode, *align, *offset));
            }
            Immediate::IndexPair(first, second) => {
                if opcode == Opcode::TableInit {
                    // Binary order is element, table; text is table element.
                    text.push_str(&format!(" {} {}", second, first));
                } else {
                    text.push_str(&format!(" {} {}", first, second));
                }
            }
            Immediate::Indirect { type_index, .. } => {
                text.push_str(&format!(" (type {})", type_index));
            }
            Immediate::Lane(lane) => text.push_str(&format!(" {}", lane)),
            Immediate::MemoryLane {
                align,
                offset,
                lane,
            } => {
                text.push_str(&memarg_text(opcode, *align, *offset));
                text.push_str(&format!(" {}", lane));
            }
            Immediate::Shuffle(lanes) => {
                for lane in lanes {
                    text.push_str(&format!(" {}", lane));
                }
            }
        }

        text
    }
}

fn local_name(entry: Option<&CodeEntry>, index: u32) -> String {
    entry
        .and_then(|entry| {
            entry
                .local_ids
                .iter()
                .find(|(_, &bound)| bound == index)
                .map(|(name, _)| format!("${}", name))
        })
        .unwrap_or_else(|| index.to_string())
}

fn signature_text(signature: &Signature) -> String {
    let mut text = String::new();

    for param in &signature.params {
        match &param.id {
            Some(id) => text.push_str(&format!(" (param ${} {})", id, param.value_type)),
            None => text.push_str(&format!(" (param {})", param.value_type)),
        }
    }

    if !signature.results.is_empty() {
        text.push_str(" (result");

        for result in &signature.results {
            text.push_str(&format!(" {}", result));
        }

        text.push(')');
    }

    text
}

fn limits_text(limits: &Limits) -> String {
    let mut text = limits.min.to_string();

    if let Some(max) = limits.max {
        text.push_str(&format!(" {}", max));
    }

    if limits.shared {
        text.push_str(" shared");
    }

    text
}

fn global_type_text(value_type: ValueType, mutability: Mutability) -> String {
    match mutability {
        Mutability::Var => format!("(mut {})", value_type),
        Mutability::Const => value_type.to_string(),
    }
}

fn memarg_text(opcode: Opcode, align: u32, offset: u32) -> String {
    let mut text = String::new();

    if offset != 0 {
        text.push_str(&format!(" offset={}", offset));
    }

    if align != opcode.align() {
        text.push_str(&format!(" align={}", 1u32 << align));
    }

    text
}

/// Renders a float so the text parser reproduces the exact bits.
pub fn format_f64(value: f64) -> String {
    if value.is_nan() {
        let bits = value.to_bits();
        let sign = if bits >> 63 != 0 { "-" } else { "" };
        let payload = bits & 0x000F_FFFF_FFFF_FFFF;

        return if payload == 0x0008_0000_0000_0000 {
            format!("{}nan", sign)
        } else {
            format!("{}nan:0x{:x}", sign, payload)
        };
    }

    if value.is_infinite() {
        return if value < 0.0 { "-inf" } else { "inf" }.to_string();
    }

    let text = format!("{}", value);

    // Keep the token in the floating grammar.
    if text.contains(['.', 'e', 'E']) {
        text
    } else {
        format!("{}.0", text)
    }
}

pub fn format_f32(value: f32) -> String {
    if value.is_nan() {
        let bits = value.to_bits();
        let sign = if bits >> 31 != 0 { "-" } else { "" };
        let payload = bits & 0x007F_FFFF;

        return if payload == 0x0040_0000 {
            format!("{}nan", sign)
        } else {
            format!("{}nan:0x{:x}", sign, payload)
        };
    }

    if value.is_infinite() {
        return if value < 0.0 { "-inf" } else { "inf" }.to_string();
    }

    let text = format!("{}", value);

    if text.contains(['.', 'e', 'E']) {
        text
    } else {
        format!("{}.0", text)
    }
}

/// Escapes a name for a quoted string.
fn escape_text(text: &str) -> String {
    escape_bytes(text.as_bytes())
}

fn escape_bytes(bytes: &[u8]) -> String {
    let mut escaped = String::with_capacity(bytes.len());

    for &byte in bytes {
        match byte {
            b'\t' => escaped.push_str("\\t"),
            b'\n' => escaped.push_str("\\n"),
            b'\r' => escaped.push_str("\\r"),
            b'"' => escaped.push_str("\\\""),
            b'\\' => escaped.push_str("\\\\"),
            0x20..=0x7E => escaped.push(byte as char),
            _ => escaped.push_str(&format!("\\{:02x}", byte)),
        }
    }

    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::emit_binary;
    use crate::diagnostics::Diagnostics;
    use crate::text::parser::parse_text;

    fn parse(source: &str) -> Module {
        let mut diagnostics = Diagnostics::new();
        let module = parse_text(source, &mut diagnostics);

        assert!(!diagnostics.has_errors(), "{}", diagnostics);
        module
    }

    fn print_flat(module: &Module) -> String {
        let mut output = Vec::new();

        emit_text(module, &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    fn print_folded(module: &Module) -> String {
        let mut output = Vec::new();

        emit_folded_text(module, &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    fn binary(module: &Module) -> Vec<u8> {
        let mut bytes = Vec::new();

        emit_binary(module, &mut bytes).unwrap();
        bytes
    }

    #[test]
    fn empty_module_prints() {
        assert_eq!(print_flat(&parse("(module)")), "(module)\n");
    }

    const ADD: &str = "(module
        (func $add (param $x i32) (param $y i32) (result i32)
          local.get $x
          local.get $y
          i32.add)
        (export \"add\" (func $add)))";

    #[test]
    fn flat_output_reparses_identically() {
        let module = parse(ADD);
        let printed = print_flat(&module);
        let reparsed = parse(&printed);

        assert_eq!(binary(&module), binary(&reparsed));
    }

    #[test]
    fn folded_output_reparses_identically() {
        let module = parse(ADD);
        let printed = print_folded(&module);
        let reparsed = parse(&printed);

        assert_eq!(binary(&module), binary(&reparsed));
    }

    #[test]
    fn flat_body_uses_local_names() {
        let printed = print_flat(&parse(ADD));

        assert!(printed.contains("local.get $x"), "{}", printed);
        assert!(printed.contains("i32.add"), "{}", printed);
        assert!(printed.contains("(export \"add\" (func $add))"), "{}", printed);
    }

    #[test]
    fn folded_body_groups_operands() {
        let printed = print_folded(&parse(ADD));

        assert!(
            printed.contains("(i32.add"),
            "expected folded body in {}",
            printed
        );
    }

    #[test]
    fn control_flow_round_trips() {
        let module = parse(
            "(module
               (func (param i32) (result i32)
                 (if (result i32) (local.get 0)
                   (then (i32.const 1))
                   (else (i32.const 2)))))",
        );

        for printed in [print_flat(&module), print_folded(&module)] {
            let reparsed = parse(&printed);

            assert_eq!(binary(&module), binary(&reparsed), "from: {}", printed);
        }
    }

    #[test]
    fn memory_table_global_round_trip() {
        let module = parse(
            "(module
               (memory $m 1 2)
               (table $t 3 funcref)
               (global $g (mut i64) (i64.const -1))
               (data (i32.const 0) \"ab\\00c\"))",
        );

        let printed = print_flat(&module);
        let reparsed = parse(&printed);

        assert_eq!(binary(&module), binary(&reparsed), "from: {}", printed);
    }

    #[test]
    fn float_formats_round_trip() {
        for (bits, expected) in [
            (f64::to_bits(1.5), "1.5"),
            (f64::to_bits(f64::INFINITY), "inf"),
            (0x7FF8_0000_0000_0000u64, "nan"),
            (0x7FF0_0000_0000_0001u64, "nan:0x1"),
        ] {
            assert_eq!(format_f64(f64::from_bits(bits)), expected);
        }

        assert_eq!(format_f32(2.0), "2.0");
    }

    #[test]
    fn nan_payload_survives_print_and_reparse() {
        let module = parse("(module (func (result f64) f64.const nan:0x123))");
        let printed = print_flat(&module);
        let reparsed = parse(&printed);

        assert_eq!(binary(&module), binary(&reparsed));
    }
}
