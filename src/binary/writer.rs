//! The binary-format writer. Every size-prefixed region is produced with the
//! buffer's scope stack: push, emit the contents, pop, emit the length.

use std::io::Write;

use log::debug;

use crate::buffer::DataBuffer;
use crate::encodings::{ExternalKind, Limits, Opcode, SectionKind, ValueType};
use crate::model::{
    CodeEntry, DataSegment, ElementDeclaration, Expression, Module, Signature,
    DATA_EXPLICIT_INDEX, DATA_PASSIVE, ELEMENT_EXPLICIT_INDEX, ELEMENT_EXPRESSIONS,
    ELEMENT_PASSIVE,
};

use super::errors::EmitError;
use crate::instruction::Instruction;

const MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6D];
const VERSION: u32 = 1;

/// The function-type form byte introducing every type-section entry.
const FUNCTION_FORM: i32 = -32;

/// Emits the module in the binary format, returning the number of bytes
/// written. A needed-but-absent data-count section is synthesised.
pub fn emit_binary<O: Write + ?Sized>(module: &Module, output: &mut O) -> Result<usize, EmitError> {
    let mut writer = Writer {
        buffer: DataBuffer::new(),
    };

    writer.write_module(module);

    let bytes = writer.buffer.into_vec();
    output.write_all(&bytes)?;

    Ok(bytes.len())
}

struct Writer {
    buffer: DataBuffer,
}

impl Writer {
    fn write_module(&mut self, module: &Module) {
        self.buffer.put_bytes(&MAGIC);
        self.buffer.put_u32(VERSION);

        self.write_customs(module, SectionKind::Custom);

        for kind in SectionKind::EMISSION_ORDER {
            self.write_section(module, kind);
            self.write_customs(module, kind);
        }
    }

    /// Opens a scope for the section body and emits it length-prefixed,
    /// skipping sections with nothing to say.
    fn write_section(&mut self, module: &Module, kind: SectionKind) {
        let present = match kind {
            SectionKind::Custom => false,
            SectionKind::Type => !module.types().is_empty(),
            SectionKind::Import => !module.imports().is_empty(),
            SectionKind::Function => {
                module.functions().len() > module.imported_function_count() as usize
            }
            SectionKind::Table => module.tables().len() > module.imported_table_count() as usize,
            SectionKind::Memory => {
                module.memories().len() > module.imported_memory_count() as usize
            }
            SectionKind::Global => {
                module.globals().len() > module.imported_global_count() as usize
            }
            SectionKind::Export => !module.exports().is_empty(),
            SectionKind::Start => module.start().is_some(),
            SectionKind::Element => !module.elements().is_empty(),
            SectionKind::DataCount => self.effective_data_count(module).is_some(),
            SectionKind::Code => !module.code_entries().is_empty(),
            SectionKind::Data => !module.data_segments().is_empty(),
        };

        if !present {
            return;
        }

        debug!("writing {} section", kind);
        self.buffer.put_u8(kind as u8);
        self.buffer.push_scope();

        match kind {
            SectionKind::Custom => {}
            SectionKind::Type => self.write_type_section(module),
            SectionKind::Import => self.write_import_section(module),
            SectionKind::Function => self.write_function_section(module),
            SectionKind::Table => self.write_table_section(module),
            SectionKind::Memory => self.write_memory_section(module),
            SectionKind::Global => self.write_global_section(module),
            SectionKind::Export => self.write_export_section(module),
            SectionKind::Start => self.buffer.put_u32_leb(module.start().unwrap()),
            SectionKind::Element => self.write_element_section(module),
            SectionKind::DataCount => {
                let count = self.effective_data_count(module).unwrap();
                self.buffer.put_u32_leb(count);
            }
            SectionKind::Code => self.write_code_section(module),
            SectionKind::Data => self.write_data_section(module),
        }

        let body = self.buffer.pop_scope();
        self.buffer.put_u32_leb(body.len() as u32);
        self.buffer.put_bytes(&body);
    }

    fn effective_data_count(&self, module: &Module) -> Option<u32> {
        module.data_count().or_else(|| {
            if module.needs_data_count() {
                Some(module.data_segments().len() as u32)
            } else {
                None
            }
        })
    }

    fn write_customs(&mut self, module: &Module, placement: SectionKind) {
        for custom in module
            .customs()
            .iter()
            .filter(|custom| custom.placement == placement)
        {
            self.buffer.put_u8(SectionKind::Custom as u8);
            self.buffer.push_scope();
            self.write_name(&custom.name);
            self.buffer.put_bytes(&custom.bytes);

            let body = self.buffer.pop_scope();
            self.buffer.put_u32_leb(body.len() as u32);
            self.buffer.put_bytes(&body);
        }
    }

    fn write_name(&mut self, name: &str) {
        self.buffer.put_u32_leb(name.len() as u32);
        self.buffer.put_bytes(name.as_bytes());
    }

    fn write_value_type(&mut self, kind: ValueType) {
        self.buffer.put_i32_leb(kind.code());
    }

    fn write_limits(&mut self, limits: &Limits) {
        self.buffer.put_u8(limits.flags());
        self.buffer.put_u32_leb(limits.min);

        if let Some(max) = limits.max {
            self.buffer.put_u32_leb(max);
        }
    }

    fn write_signature(&mut self, signature: &Signature) {
        self.buffer.put_i32_leb(FUNCTION_FORM);
        self.buffer.put_u32_leb(signature.params.len() as u32);

        for param in &signature.params {
            self.write_value_type(param.value_type);
        }

        self.buffer.put_u32_leb(signature.results.len() as u32);

        for &result in &signature.results {
            self.write_value_type(result);
        }
    }

    /// Emits an initialiser: its single instruction plus `end`.
    fn write_init_expression(&mut self, expression: &Expression) {
        for instruction in &expression.instructions {
            instruction.write(&mut self.buffer);
        }

        Instruction::plain(Opcode::End).write(&mut self.buffer);
    }

    fn write_type_section(&mut self, module: &Module) {
        self.buffer.put_u32_leb(module.types().len() as u32);

        for declaration in module.types() {
            self.write_signature(&declaration.signature);
        }
    }

    fn write_import_section(&mut self, module: &Module) {
        self.buffer.put_u32_leb(module.imports().len() as u32);

        for import in module.imports() {
            self.write_name(&import.module);
            self.write_name(&import.field);
            self.buffer.put_u8(import.kind as u8);

            match import.kind {
                ExternalKind::Function => {
                    let index = module
                        .function(import.index)
                        .map(|function| function.type_use.index)
                        .unwrap_or(0);

                    self.buffer.put_u32_leb(index);
                }
                ExternalKind::Table => {
                    if let Some(table) = module.table(import.index) {
                        self.write_value_type(table.ref_type);
                        self.write_limits(&table.limits);
                    }
                }
                ExternalKind::Memory => {
                    if let Some(memory) = module.memory(import.index) {
                        self.write_limits(&memory.limits);
                    }
                }
                ExternalKind::Global => {
                    if let Some(global) = module.global(import.index) {
                        self.write_value_type(global.value_type);
                        self.buffer.put_u8(global.mutability as u8);
                    }
                }
                ExternalKind::Event => {
                    if let Some(event) = module.event(import.index) {
                        self.buffer.put_u32_leb(event.attribute);
                        self.buffer.put_u32_leb(event.type_use.index);
                    }
                }
            }
        }
    }

    fn write_function_section(&mut self, module: &Module) {
        let imported = module.imported_function_count() as usize;
        let local = &module.functions()[imported..];

        self.buffer.put_u32_leb(local.len() as u32);

        for function in local {
            self.buffer.put_u32_leb(function.type_use.index);
        }
    }

    fn write_table_section(&mut self, module: &Module) {
        let imported = module.imported_table_count() as usize;
        let local = &module.tables()[imported..];

        self.buffer.put_u32_leb(local.len() as u32);

        for table in local {
            self.write_value_type(table.ref_type);
            self.write_limits(&table.limits);
        }
    }

    fn write_memory_section(&mut self, module: &Module) {
        let imported = module.imported_memory_count() as usize;
        let local = &module.memories()[imported..];

        self.buffer.put_u32_leb(local.len() as u32);

        for memory in local {
            self.write_limits(&memory.limits);
        }
    }

    fn write_global_section(&mut self, module: &Module) {
        let imported = module.imported_global_count() as usize;
        let local = &module.globals()[imported..];

        self.buffer.put_u32_leb(local.len() as u32);

        for global in local {
            self.write_value_type(global.value_type);
            self.buffer.put_u8(global.mutability as u8);

            if let Some(initializer) = &global.initializer {
                self.write_init_expression(initializer);
            } else {
                Instruction::plain(Opcode::End).write(&mut self.buffer);
            }
        }
    }

    fn write_export_section(&mut self, module: &Module) {
        self.buffer.put_u32_leb(module.exports().len() as u32);

        for export in module.exports() {
            self.write_name(&export.name);
            self.buffer.put_u8(export.kind as u8);
            self.buffer.put_u32_leb(export.index);
        }
    }

    fn write_element_section(&mut self, module: &Module) {
        self.buffer.put_u32_leb(module.elements().len() as u32);

        for element in module.elements() {
            self.write_element(element);
        }
    }

    fn write_element(&mut self, element: &ElementDeclaration) {
        let flags = element.flags;

        self.buffer.put_u32_leb(flags);

        if element.is_active() && flags & ELEMENT_EXPLICIT_INDEX != 0 {
            self.buffer.put_u32_leb(element.table_index);
        }

        if let Some(offset) = &element.offset {
            self.write_init_expression(offset);
        }

        if flags & (ELEMENT_PASSIVE | ELEMENT_EXPLICIT_INDEX) != 0 {
            if flags & ELEMENT_EXPRESSIONS != 0 {
                self.write_value_type(element.ref_type);
            } else {
                self.buffer.put_u8(0);
            }
        }

        if flags & ELEMENT_EXPRESSIONS != 0 {
            self.buffer
                .put_u32_leb(element.ref_expressions.len() as u32);

            for expression in &element.ref_expressions {
                self.write_init_expression(expression);
            }
        } else {
            self.buffer
                .put_u32_leb(element.function_indexes.len() as u32);

            for &index in &element.function_indexes {
                self.buffer.put_u32_leb(index);
            }
        }
    }

    fn write_code_section(&mut self, module: &Module) {
        self.buffer.put_u32_leb(module.code_entries().len() as u32);

        for entry in module.code_entries() {
            self.write_code_entry(entry);
        }
    }

    fn write_code_entry(&mut self, entry: &CodeEntry) {
        self.buffer.push_scope();

        // Locals are re-grouped into runs of equal types.
        let mut runs: Vec<(u32, ValueType)> = Vec::new();

        for local in &entry.locals {
            match runs.last_mut() {
                Some((count, kind)) if *kind == local.value_type => *count += 1,
                _ => runs.push((1, local.value_type)),
            }
        }

        self.buffer.put_u32_leb(runs.len() as u32);

        for (count, kind) in runs {
            self.buffer.put_u32_leb(count);
            self.write_value_type(kind);
        }

        for instruction in &entry.expression.instructions {
            instruction.write(&mut self.buffer);
        }

        let body = self.buffer.pop_scope();
        self.buffer.put_u32_leb(body.len() as u32);
        self.buffer.put_bytes(&body);
    }

    fn write_data_section(&mut self, module: &Module) {
        self.buffer.put_u32_leb(module.data_segments().len() as u32);

        for segment in module.data_segments() {
            self.write_data_segment(segment);
        }
    }

    fn write_data_segment(&mut self, segment: &DataSegment) {
        self.buffer.put_u32_leb(segment.flags);

        if segment.flags & DATA_EXPLICIT_INDEX != 0 {
            self.buffer.put_u32_leb(segment.memory_index);
        }

        if segment.flags & DATA_PASSIVE == 0 {
            if let Some(offset) = &segment.offset {
                self.write_init_expression(offset);
            }
        }

        self.buffer.put_u32_leb(segment.bytes.len() as u32);
        self.buffer.put_bytes(&segment.bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;

    fn round_trip(bytes: &[u8]) -> Vec<u8> {
        let mut diagnostics = Diagnostics::new();
        let module = super::super::reader::parse_binary(bytes, &mut diagnostics);

        assert!(!diagnostics.has_errors(), "{}", diagnostics);

        let mut output = Vec::new();
        emit_binary(&module, &mut output).unwrap();
        output
    }

    #[test]
    fn empty_module_is_the_preamble() {
        let mut output = Vec::new();
        let written = emit_binary(&Module::new(), &mut output).unwrap();

        assert_eq!(written, 8);
        assert_eq!(output, b"\x00\x61\x73\x6D\x01\x00\x00\x00");
    }

    #[test]
    fn add_function_round_trips_byte_for_byte() {
        let bytes: Vec<u8> = vec![
            0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00, // preamble
            0x01, 0x07, 0x01, 0x60, 0x02, 0x7F, 0x7F, 0x01, 0x7F, // type
            0x03, 0x02, 0x01, 0x00, // function
            0x07, 0x07, 0x01, 0x03, b'a', b'd', b'd', 0x00, 0x00, // export
            0x0A, 0x09, 0x01, 0x07, 0x00, 0x20, 0x00, 0x20, 0x01, 0x6A, 0x0B, // code
        ];

        assert_eq!(round_trip(&bytes), bytes);
    }

    #[test]
    fn imports_and_globals_round_trip() {
        let bytes: Vec<u8> = vec![
            0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00, // preamble
            0x01, 0x04, 0x01, 0x60, 0x00, 0x00, // type () -> ()
            0x02, 0x15, 0x02, // import section, two entries
            0x03, b'e', b'n', b'v', 0x01, b'f', 0x00, 0x00, // func import
            0x03, b'e', b'n', b'v', 0x03, b'm', b'e', b'm', 0x02, 0x01, 0x01,
            0x02, // memory import, bounded 1..2
            0x06, 0x06, 0x01, 0x7F, 0x01, 0x41, 0x2A, 0x0B, // mutable global = 42
        ];

        assert_eq!(round_trip(&bytes), bytes);
    }

    #[test]
    fn element_and_data_round_trip() {
        let bytes: Vec<u8> = vec![
            0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00, // preamble
            0x01, 0x04, 0x01, 0x60, 0x00, 0x00, // type
            0x03, 0x02, 0x01, 0x00, // function
            0x04, 0x04, 0x01, 0x70, 0x00, 0x01, // table funcref 1
            0x05, 0x03, 0x01, 0x00, 0x01, // memory 1
            0x09, 0x07, 0x01, 0x00, 0x41, 0x00, 0x0B, 0x01, 0x00, // element
            0x0A, 0x04, 0x01, 0x02, 0x00, 0x0B, // code: empty body
            0x0B, 0x08, 0x01, 0x00, 0x41, 0x00, 0x0B, 0x02, 0xAB, 0xCD, // data
        ];

        assert_eq!(round_trip(&bytes), bytes);
    }

    #[test]
    fn custom_sections_round_trip_in_place() {
        let mut bytes = b"\x00\x61\x73\x6D\x01\x00\x00\x00".to_vec();
        bytes.extend([0x00, 0x0D, 0x07]);
        bytes.extend(b"version");
        bytes.extend(b"0.1.0");
        bytes.extend([0x01, 0x04, 0x01, 0x60, 0x00, 0x00]); // type section

        assert_eq!(round_trip(&bytes), bytes);
    }

    #[test]
    fn matches_the_reference_assembler() {
        let source = "(module
            (func (export \"add\") (param i32 i32) (result i32)
              local.get 0
              local.get 1
              i32.add))";
        let reference = wat::parse_str(source).unwrap();

        let mut diagnostics = Diagnostics::new();
        let module = crate::text::parse_text(source, &mut diagnostics);

        assert!(!diagnostics.has_errors(), "{}", diagnostics);

        let mut ours = Vec::new();
        emit_binary(&module, &mut ours).unwrap();

        assert_eq!(ours, reference);
    }

    #[test]
    fn data_count_section_is_synthesised() {
        // Passive segment plus memory.init, no data count in the input.
        let bytes: Vec<u8> = vec![
            0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00, // preamble
            0x01, 0x04, 0x01, 0x60, 0x00, 0x00, // type
            0x03, 0x02, 0x01, 0x00, // function
            0x05, 0x03, 0x01, 0x00, 0x01, // memory
            0x0A, 0x0E, 0x01, 0x0C, 0x00, // code
            0x41, 0x00, 0x41, 0x00, 0x41, 0x01, 0xFC, 0x08, 0x00, 0x00, 0x0B,
            0x0B, 0x04, 0x01, 0x01, 0x01, 0x2A, // data: passive
        ];

        let emitted = round_trip(&bytes);

        // The data count section (id 12, size 1, count 1) must appear
        // between the memory and code sections.
        let needle = [0x0C, 0x01, 0x01, 0x0A];
        let found = emitted
            .windows(needle.len())
            .any(|window| window == needle);

        assert!(found, "no data count section in {:02x?}", emitted);
    }
}
