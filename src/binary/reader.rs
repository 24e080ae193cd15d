//! The binary-format reader: preamble, then section-by-section decoding with
//! cursor recovery at every section boundary.

use log::{debug, warn};

use crate::buffer::DataBuffer;
use crate::diagnostics::Diagnostics;
use crate::encodings::{
    ExternalKind, Limits, Mutability, Opcode, RelocationType, SectionKind, ValueType,
};
use crate::instruction::Instruction;
use crate::model::{
    CodeEntry, CustomSection, DataSegment, ElementDeclaration, EventDeclaration,
    ExportDeclaration, Expression, FunctionDeclaration, GlobalDeclaration, LinkingSection, Local,
    MemoryDeclaration, Module, Param, RelocationEntry, RelocationSection, Signature,
    TableDeclaration, TypeDeclaration, TypeUse, DATA_EXPLICIT_INDEX, DATA_PASSIVE,
    ELEMENT_EXPLICIT_INDEX, ELEMENT_EXPRESSIONS, ELEMENT_PASSIVE,
};

use super::errors::ReadError;

const MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6D];
const VERSION: u32 = 1;

/// The function-type form byte introducing every type-section entry.
const FUNCTION_FORM: i32 = -32;

/// Decodes a binary module. Problems are accumulated; the returned module
/// holds everything that could be salvaged.
pub fn parse_binary(input: &[u8], diagnostics: &mut Diagnostics) -> Module {
    let mut reader = Reader {
        buffer: DataBuffer::of(input.to_vec()),
        module: Module::new(),
        diagnostics,
        section: SectionKind::Custom,
        entry: 0,
    };

    reader.run();
    reader.module
}

struct Reader<'a> {
    buffer: DataBuffer,
    module: Module,
    diagnostics: &'a mut Diagnostics,
    section: SectionKind,
    entry: u32,
}

impl Reader<'_> {
    fn fail(&mut self, message: impl Into<String>) {
        self.diagnostics
            .error_in(self.section, self.entry, message);
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.diagnostics
            .warning_in(self.section, self.entry, message);
    }

    fn run(&mut self) {
        match self.buffer.get_bytes(4) {
            Ok(magic) if magic == MAGIC => {}
            _ => {
                self.fail("missing module preamble");
                return;
            }
        }

        match self.buffer.get_u32() {
            Ok(VERSION) => {}
            Ok(version) => {
                self.fail(format!("unsupported version {}", version));
                return;
            }
            Err(_) => {
                self.fail("truncated version field");
                return;
            }
        }

        // Custom sections are placed after the last known section seen.
        let mut placement = SectionKind::Custom;

        while !self.buffer.at_end() {
            let (kind, size) = match self.read_section_header() {
                Ok(header) => header,
                Err(error) => {
                    self.section = SectionKind::Custom;
                    self.fail(error.to_string());
                    return;
                }
            };

            let start = self.buffer.pos();
            let end = start + size as usize;

            if end > self.buffer.len() {
                self.section = kind;
                self.fail(format!("section extends {} byte(s) past the end of the input",
                    end - self.buffer.len()));
                return;
            }

            self.section = kind;
            self.entry = 0;
            debug!("reading {} section of {} bytes", kind, size);

            let outcome = match kind {
                SectionKind::Custom => self.read_custom_section(placement, end),
                SectionKind::Type => self.read_type_section(),
                SectionKind::Import => self.read_import_section(),
                SectionKind::Function => self.read_function_section(),
                SectionKind::Table => self.read_table_section(),
                SectionKind::Memory => self.read_memory_section(),
                SectionKind::Global => self.read_global_section(),
                SectionKind::Export => self.read_export_section(),
                SectionKind::Start => self.read_start_section(),
                SectionKind::Element => self.read_element_section(),
                SectionKind::Code => self.read_code_section(),
                SectionKind::Data => self.read_data_section(),
                SectionKind::DataCount => self.read_data_count_section(),
            };

            let failed = outcome.is_err();

            if let Err(error) = outcome {
                self.fail(error.to_string());
            }

            if self.buffer.pos() != end {
                // One error per broken section: an entry failure already
                // explained the mismatch, so only report a clean overrun.
                if !failed {
                    self.fail(format!(
                        "section size mismatch: expected {} byte(s), consumed {}",
                        size,
                        self.buffer.pos() - start
                    ));
                }

                self.buffer.set_pos(end);
            }

            if kind != SectionKind::Custom {
                placement = kind;
            }
        }
    }

    fn read_section_header(&mut self) -> Result<(SectionKind, u32), ReadError> {
        let byte = self.buffer.get_u8()?;
        let kind = SectionKind::from_byte(byte)
            .ok_or_else(|| ReadError::malformed(format!("unknown section type {}", byte)))?;
        let size = self.buffer.get_u32_leb()?;

        Ok((kind, size))
    }

    fn read_name(&mut self) -> Result<String, ReadError> {
        let length = self.buffer.get_u32_leb()? as usize;
        let bytes = self.buffer.get_bytes(length)?;

        String::from_utf8(bytes.to_vec())
            .map_err(|_| ReadError::malformed("name is not valid UTF-8"))
    }

    fn read_value_type(&mut self) -> Result<ValueType, ReadError> {
        let code = self.buffer.get_i32_leb()?;

        ValueType::from_code(code)
            .filter(|kind| kind.is_concrete())
            .ok_or_else(|| ReadError::malformed(format!("invalid value type {}", code)))
    }

    fn read_limits(&mut self) -> Result<Limits, ReadError> {
        let flags = self.buffer.get_u8()?;

        if flags & !(Limits::HAS_MAX | Limits::IS_SHARED) != 0 {
            return Err(ReadError::malformed(format!(
                "invalid limits flags 0x{:02x}",
                flags
            )));
        }

        let min = self.buffer.get_u32_leb()?;
        let max = if flags & Limits::HAS_MAX != 0 {
            Some(self.buffer.get_u32_leb()?)
        } else {
            None
        };

        Ok(Limits {
            min,
            max,
            shared: flags & Limits::IS_SHARED != 0,
        })
    }

    fn type_use(&mut self, index: u32) -> TypeUse {
        match self.module.signature(index) {
            Some(signature) => TypeUse::new(index, signature.clone()),
            None => {
                self.fail(format!("type index {} is out of bounds", index));
                TypeUse::new(index, Signature::default())
            }
        }
    }

    /// Reads one instruction, tracking the data-count requirement.
    fn read_instruction(&mut self) -> Result<Instruction, ReadError> {
        let instruction = Instruction::read(&mut self.buffer)?;

        if matches!(instruction.opcode, Opcode::MemoryInit | Opcode::DataDrop) {
            self.module.flag_data_count_needed();
        }

        Ok(instruction)
    }

    /// Reads instructions through the structurally matching `end`, which is
    /// kept as the final instruction.
    fn read_expression(&mut self) -> Result<Expression, ReadError> {
        let mut instructions = Vec::new();
        let mut depth = 0u32;

        loop {
            let instruction = self.read_instruction()?;
            let opcode = instruction.opcode;

            instructions.push(instruction);

            if opcode.is_block_start() {
                depth += 1;
            } else if opcode == Opcode::End {
                if depth == 0 {
                    return Ok(Expression::new(instructions));
                }

                depth -= 1;
            }
        }
    }

    /// A constant initialiser: exactly one instruction followed by `end`.
    fn read_init_expression(&mut self) -> Result<Expression, ReadError> {
        let instruction = self.read_instruction()?;

        if instruction.opcode == Opcode::End {
            return Err(ReadError::malformed("initialiser expression is empty"));
        }

        let end = self.read_instruction()?;

        if end.opcode != Opcode::End {
            return Err(ReadError::malformed(
                "initialiser expression must be a single instruction",
            ));
        }

        Ok(Expression::new(vec![instruction]))
    }

    fn read_type_section(&mut self) -> Result<(), ReadError> {
        let count = self.buffer.get_u32_leb()?;

        for entry in 0..count {
            self.entry = entry;

            let form = self.buffer.get_i32_leb()?;

            if form != FUNCTION_FORM {
                return Err(ReadError::malformed(format!("invalid type form {}", form)));
            }

            let param_count = self.buffer.get_u32_leb()?;
            let mut params = Vec::with_capacity(param_count as usize);

            for _ in 0..param_count {
                params.push(Param::new(self.read_value_type()?));
            }

            let result_count = self.buffer.get_u32_leb()?;
            let mut results = Vec::with_capacity(result_count as usize);

            for _ in 0..result_count {
                results.push(self.read_value_type()?);
            }

            let declaration = TypeDeclaration {
                id: None,
                signature: Signature::new(params, results),
            };

            self.module.add_type(declaration).ok();
        }

        Ok(())
    }

    fn read_import_section(&mut self) -> Result<(), ReadError> {
        let count = self.buffer.get_u32_leb()?;

        for entry in 0..count {
            self.entry = entry;

            let module_name = self.read_name()?;
            let field = self.read_name()?;
            let kind_byte = self.buffer.get_u8()?;
            let kind = ExternalKind::from_byte(kind_byte).ok_or_else(|| {
                ReadError::malformed(format!("invalid import kind {}", kind_byte))
            })?;

            match kind {
                ExternalKind::Function => {
                    let index = self.buffer.get_u32_leb()?;
                    let type_use = self.type_use(index);

                    self.module
                        .import_function(module_name, field, FunctionDeclaration {
                            id: None,
                            type_use,
                        })?;
                }
                ExternalKind::Table => {
                    let ref_type = self.read_value_type()?;
                    let limits = self.read_limits()?;

                    self.module.import_table(module_name, field, TableDeclaration {
                        id: None,
                        ref_type,
                        limits,
                    })?;
                }
                ExternalKind::Memory => {
                    let limits = self.read_limits()?;

                    self.module.import_memory(module_name, field, MemoryDeclaration {
                        id: None,
                        limits,
                    })?;
                }
                ExternalKind::Global => {
                    let value_type = self.read_value_type()?;
                    let mutability = self.read_mutability()?;

                    self.module.import_global(module_name, field, GlobalDeclaration {
                        id: None,
                        value_type,
                        mutability,
                        initializer: None,
                    })?;
                }
                ExternalKind::Event => {
                    let attribute = self.buffer.get_u32_leb()?;
                    let index = self.buffer.get_u32_leb()?;
                    let type_use = self.type_use(index);

                    self.module.import_event(module_name, field, EventDeclaration {
                        id: None,
                        attribute,
                        type_use,
                    })?;
                }
            }
        }

        Ok(())
    }

    fn read_mutability(&mut self) -> Result<Mutability, ReadError> {
        let byte = self.buffer.get_u8()?;

        Mutability::from_byte(byte)
            .ok_or_else(|| ReadError::malformed(format!("invalid mutability {}", byte)))
    }

    fn read_function_section(&mut self) -> Result<(), ReadError> {
        let count = self.buffer.get_u32_leb()?;

        for entry in 0..count {
            self.entry = entry;

            let index = self.buffer.get_u32_leb()?;
            let type_use = self.type_use(index);

            self.module.add_function(FunctionDeclaration {
                id: None,
                type_use,
            })?;
        }

        Ok(())
    }

    fn read_table_section(&mut self) -> Result<(), ReadError> {
        let count = self.buffer.get_u32_leb()?;

        for entry in 0..count {
            self.entry = entry;

            let ref_type = self.read_value_type()?;
            let limits = self.read_limits()?;

            self.module.add_table(TableDeclaration {
                id: None,
                ref_type,
                limits,
            })?;
        }

        Ok(())
    }

    fn read_memory_section(&mut self) -> Result<(), ReadError> {
        let count = self.buffer.get_u32_leb()?;

        for entry in 0..count {
            self.entry = entry;

            let limits = self.read_limits()?;

            self.module.add_memory(MemoryDeclaration { id: None, limits })?;
        }

        Ok(())
    }

    fn read_global_section(&mut self) -> Result<(), ReadError> {
        let count = self.buffer.get_u32_leb()?;

        for entry in 0..count {
            self.entry = entry;

            let value_type = self.read_value_type()?;
            let mutability = self.read_mutability()?;
            let initializer = self.read_init_expression()?;

            self.module.add_global(GlobalDeclaration {
                id: None,
                value_type,
                mutability,
                initializer: Some(initializer),
            })?;
        }

        Ok(())
    }

    fn read_export_section(&mut self) -> Result<(), ReadError> {
        let count = self.buffer.get_u32_leb()?;

        for entry in 0..count {
            self.entry = entry;

            let name = self.read_name()?;
            let kind_byte = self.buffer.get_u8()?;
            let kind = ExternalKind::from_byte(kind_byte).ok_or_else(|| {
                ReadError::malformed(format!("invalid export kind {}", kind_byte))
            })?;
            let index = self.buffer.get_u32_leb()?;

            self.module.add_export(ExportDeclaration { name, kind, index });
        }

        Ok(())
    }

    fn read_start_section(&mut self) -> Result<(), ReadError> {
        let index = self.buffer.get_u32_leb()?;

        self.module.set_start(index);

        Ok(())
    }

    fn read_element_section(&mut self) -> Result<(), ReadError> {
        let count = self.buffer.get_u32_leb()?;

        for entry in 0..count {
            self.entry = entry;

            let flags = self.buffer.get_u32_leb()?;

            if flags > 7 {
                return Err(ReadError::malformed(format!(
                    "invalid element segment flags {}",
                    flags
                )));
            }

            let active = flags & ELEMENT_PASSIVE == 0;
            let table_index = if active && flags & ELEMENT_EXPLICIT_INDEX != 0 {
                self.buffer.get_u32_leb()?
            } else {
                0
            };
            let offset = if active {
                Some(self.read_init_expression()?)
            } else {
                None
            };

            let mut ref_type = ValueType::FuncRef;

            // A representation byte follows for every form but the original
            // MVP one: an element kind for index lists, a reference type for
            // expression lists.
            if flags & (ELEMENT_PASSIVE | ELEMENT_EXPLICIT_INDEX) != 0 {
                if flags & ELEMENT_EXPRESSIONS != 0 {
                    ref_type = self.read_value_type()?;
                } else {
                    let elem_kind = self.buffer.get_u8()?;

                    if elem_kind != 0 {
                        return Err(ReadError::malformed(format!(
                            "invalid element kind {}",
                            elem_kind
                        )));
                    }
                }
            }

            let item_count = self.buffer.get_u32_leb()?;
            let mut function_indexes = Vec::new();
            let mut ref_expressions = Vec::new();

            if flags & ELEMENT_EXPRESSIONS != 0 {
                for _ in 0..item_count {
                    ref_expressions.push(self.read_init_expression()?);
                }
            } else {
                for _ in 0..item_count {
                    function_indexes.push(self.buffer.get_u32_leb()?);
                }
            }

            self.module.add_element(ElementDeclaration {
                id: None,
                flags,
                table_index,
                ref_type,
                offset,
                function_indexes,
                ref_expressions,
            })?;
        }

        Ok(())
    }

    fn read_code_section(&mut self) -> Result<(), ReadError> {
        let count = self.buffer.get_u32_leb()?;
        let imported = self.module.imported_function_count();

        for entry in 0..count {
            self.entry = entry;

            let size = self.buffer.get_u32_leb()? as usize;
            let start = self.buffer.pos();
            let end = start + size;

            let run_count = self.buffer.get_u32_leb()?;
            let mut locals = Vec::new();

            for _ in 0..run_count {
                let repeat = self.buffer.get_u32_leb()?;
                let value_type = self.read_value_type()?;

                if locals.len() + repeat as usize > 65536 {
                    return Err(ReadError::malformed("too many locals"));
                }

                for _ in 0..repeat {
                    locals.push(Local::new(value_type));
                }
            }

            let expression = self.read_expression()?;

            if self.buffer.pos() != end {
                self.fail(format!(
                    "code body size mismatch: expected {} byte(s), consumed {}",
                    size,
                    self.buffer.pos() - start
                ));
                self.buffer.set_pos(end);
            }

            self.module.add_code_entry(CodeEntry {
                number: imported + entry,
                locals,
                expression,
                local_ids: Default::default(),
            });
        }

        Ok(())
    }

    fn read_data_section(&mut self) -> Result<(), ReadError> {
        let count = self.buffer.get_u32_leb()?;

        if let Some(declared) = self.module.data_count() {
            if declared != count {
                self.fail(format!(
                    "data count section declares {} segment(s), data section has {}",
                    declared, count
                ));
            }
        }

        for entry in 0..count {
            self.entry = entry;

            let flags = self.buffer.get_u32_leb()?;

            if flags > 2 {
                return Err(ReadError::malformed(format!(
                    "invalid data segment flags {}",
                    flags
                )));
            }

            let memory_index = if flags & DATA_EXPLICIT_INDEX != 0 {
                self.buffer.get_u32_leb()?
            } else {
                0
            };
            let offset = if flags & DATA_PASSIVE == 0 {
                Some(self.read_init_expression()?)
            } else {
                None
            };
            let length = self.buffer.get_u32_leb()? as usize;
            let bytes = self.buffer.get_bytes(length)?.to_vec();

            self.module.add_data_segment(DataSegment {
                id: None,
                flags,
                memory_index,
                offset,
                bytes,
            })?;
        }

        Ok(())
    }

    fn read_data_count_section(&mut self) -> Result<(), ReadError> {
        let count = self.buffer.get_u32_leb()?;

        self.module.set_data_count(count);

        Ok(())
    }

    fn read_custom_section(
        &mut self,
        placement: SectionKind,
        end: usize,
    ) -> Result<(), ReadError> {
        let name = self.read_name()?;
        let bytes = self
            .buffer
            .get_bytes(end - self.buffer.pos())?
            .to_vec();

        // Always retained verbatim so emission round-trips; reloc.* and
        // linking contents are additionally decoded for metadata.
        self.module.add_custom(CustomSection {
            placement,
            name: name.clone(),
            bytes: bytes.clone(),
        });

        if let Some(decoded) = name.strip_prefix("reloc.") {
            match self.decode_relocations(&name, &bytes) {
                Ok(section) => self.module.add_relocation_section(section),
                Err(error) => self.warn(format!(
                    "ignoring malformed relocation section for '{}': {}",
                    decoded, error
                )),
            }
        } else if name == "linking" {
            match self.decode_linking(&bytes) {
                Ok(section) => self.module.set_linking(section),
                Err(error) => self.warn(format!("ignoring malformed linking section: {}", error)),
            }
        } else if name != "name" {
            warn!("retaining unknown custom section '{}'", name);
            self.warn(format!("unknown custom section '{}'", name));
        }

        Ok(())
    }

    fn decode_relocations(
        &mut self,
        name: &str,
        bytes: &[u8],
    ) -> Result<RelocationSection, ReadError> {
        let mut buffer = DataBuffer::of(bytes.to_vec());
        let target_section = buffer.get_u32_leb()?;
        let count = buffer.get_u32_leb()?;
        let mut entries = Vec::with_capacity(count as usize);

        for _ in 0..count {
            let kind_byte = buffer.get_u8()?;
            let kind = RelocationType::from_byte(kind_byte).ok_or_else(|| {
                ReadError::malformed(format!("invalid relocation type {}", kind_byte))
            })?;
            let offset = buffer.get_u32_leb()?;
            let index = buffer.get_u32_leb()?;
            let addend = if kind.has_addend() {
                Some(buffer.get_i32_leb()?)
            } else {
                None
            };

            entries.push(RelocationEntry {
                kind,
                offset,
                index,
                addend,
            });
        }

        Ok(RelocationSection {
            name: name.to_string(),
            target_section,
            entries,
        })
    }

    fn decode_linking(&mut self, bytes: &[u8]) -> Result<LinkingSection, ReadError> {
        let mut buffer = DataBuffer::of(bytes.to_vec());
        let version = buffer.get_u32_leb()?;
        let mut section = LinkingSection {
            version,
            subsections: Vec::new(),
        };

        while !buffer.at_end() {
            let kind = buffer.get_u8()?;
            let size = buffer.get_u32_leb()? as usize;
            let payload = buffer.get_bytes(size)?.to_vec();

            // A duplicated subsection keeps only its final occurrence.
            if let Some(existing) = section
                .subsections
                .iter_mut()
                .find(|(existing, _)| *existing == kind)
            {
                self.warn(format!(
                    "duplicate linking subsection {}; keeping the last",
                    kind
                ));
                existing.1 = payload;
            } else {
                section.subsections.push((kind, payload));
            }
        }

        Ok(section)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_module_parses() {
        let mut diagnostics = Diagnostics::new();
        let module = parse_binary(b"\x00\x61\x73\x6D\x01\x00\x00\x00", &mut diagnostics);

        assert!(!diagnostics.has_errors());
        assert!(module.types().is_empty());
        assert!(module.functions().is_empty());
    }

    #[test]
    fn bad_magic_is_an_error() {
        let mut diagnostics = Diagnostics::new();
        parse_binary(b"\x00asn\x01\x00\x00\x00", &mut diagnostics);

        assert!(diagnostics.has_errors());
    }

    #[test]
    fn bad_version_is_an_error() {
        let mut diagnostics = Diagnostics::new();
        parse_binary(b"\x00\x61\x73\x6D\x02\x00\x00\x00", &mut diagnostics);

        assert_eq!(diagnostics.error_count(), 1);
        assert!(diagnostics.items()[0].message.contains("version"));
    }

    #[test]
    fn section_overrun_is_recovered() {
        // A type section with a stray trailing byte; the cursor is forced to
        // the declared boundary and the export section after it still reads.
        let mut bytes = b"\x00\x61\x73\x6D\x01\x00\x00\x00".to_vec();
        bytes.extend([0x01, 0x05, 0x01, 0x60, 0x00, 0x00, 0x00]); // 5 declared, 4 used
        bytes.extend([0x07, 0x01, 0x00]); // export section: zero entries

        let mut diagnostics = Diagnostics::new();
        let module = parse_binary(&bytes, &mut diagnostics);

        assert_eq!(diagnostics.error_count(), 1);
        assert!(diagnostics.items()[0].message.contains("size mismatch"));
        assert_eq!(module.types().len(), 1);
    }

    #[test]
    fn add_function_module_decodes() {
        // (module (func (param i32 i32) (result i32) ...) (export "add" ...))
        let bytes: Vec<u8> = vec![
            0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00, // preamble
            0x01, 0x07, 0x01, 0x60, 0x02, 0x7F, 0x7F, 0x01, 0x7F, // type
            0x03, 0x02, 0x01, 0x00, // function
            0x07, 0x07, 0x01, 0x03, b'a', b'd', b'd', 0x00, 0x00, // export
            0x0A, 0x09, 0x01, 0x07, 0x00, 0x20, 0x00, 0x20, 0x01, 0x6A, 0x0B, // code
        ];

        let mut diagnostics = Diagnostics::new();
        let module = parse_binary(&bytes, &mut diagnostics);

        assert!(!diagnostics.has_errors(), "{}", diagnostics);
        assert_eq!(module.types().len(), 1);
        assert_eq!(module.functions().len(), 1);
        assert_eq!(module.exports().len(), 1);
        assert_eq!(module.exports()[0].name, "add");

        let body = &module.code_entries()[0].expression;

        assert_eq!(body.instructions.len(), 4);
        assert_eq!(body.instructions[2].opcode, Opcode::I32Add);
        assert_eq!(body.instructions[3].opcode, Opcode::End);
    }

    #[test]
    fn memory_init_flags_data_count() {
        // A module with one passive data segment, one memory, and a function
        // using memory.init, but no data count section.
        let bytes: Vec<u8> = vec![
            0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00, // preamble
            0x01, 0x04, 0x01, 0x60, 0x00, 0x00, // type () -> ()
            0x03, 0x02, 0x01, 0x00, // function
            0x05, 0x03, 0x01, 0x00, 0x01, // memory 1 page
            0x0A, 0x0E, 0x01, 0x0C, 0x00, // code: 1 entry, 12 bytes, 0 locals
            0x41, 0x00, 0x41, 0x00, 0x41, 0x01, // three i32.const
            0xFC, 0x08, 0x00, 0x00, // memory.init 0
            0x0B, // end
            0x0B, 0x04, 0x01, 0x01, 0x01, 0x2A, // data: passive, 1 byte
        ];

        let mut diagnostics = Diagnostics::new();
        let mut module = parse_binary(&bytes, &mut diagnostics);

        assert!(!diagnostics.has_errors(), "{}", diagnostics);
        assert!(module.needs_data_count());
        assert_eq!(module.data_count(), None);

        module.make_data_count_section();

        assert_eq!(module.data_count(), Some(1));
    }

    #[test]
    fn custom_sections_are_retained() {
        let mut bytes = b"\x00\x61\x73\x6D\x01\x00\x00\x00".to_vec();
        bytes.extend([0x00, 0x0D, 0x07]); // custom, 13 bytes, name length 7
        bytes.extend(b"version");
        bytes.extend(b"0.1.0");

        let mut diagnostics = Diagnostics::new();
        let module = parse_binary(&bytes, &mut diagnostics);

        assert!(!diagnostics.has_errors());
        assert_eq!(module.customs().len(), 1);
        assert_eq!(module.customs()[0].name, "version");
        assert_eq!(module.customs()[0].bytes, b"0.1.0");
    }
}
