//! The semantic checker and the stack/frame validator.
//!
//! Module-level checks enforce index bounds and well-formedness; each code
//! entry is then validated against the stack-polymorphic type discipline with
//! an explicit frame stack. Violations are reported and validation continues,
//! so one pass yields every error in the module.

use log::debug;
use smallvec::SmallVec;

use crate::diagnostics::{Context, Diagnostics, SourcePos};
use crate::encodings::{Mutability, Opcode, SectionKind, SignatureCode, ValueType};
use crate::instruction::{BlockType, Immediate, Instruction};
use crate::model::{CodeEntry, Expression, Module};

/// Validates the whole module, accumulating problems in the collector.
pub fn validate(module: &Module, diagnostics: &mut Diagnostics) {
    let mut checker = Checker {
        module,
        diagnostics,
    };

    checker.check_module();
}

struct Checker<'a> {
    module: &'a Module,
    diagnostics: &'a mut Diagnostics,
}

impl Checker<'_> {
    fn check_module(&mut self) {
        self.check_functions();
        self.check_tables();
        self.check_memories();
        self.check_globals();
        self.check_exports();
        self.check_start();
        self.check_elements();
        self.check_data();
        self.check_code();
    }

    fn check_functions(&mut self) {
        let type_count = self.module.types().len() as u32;

        for (index, function) in self.module.functions().iter().enumerate() {
            if function.type_use.index >= type_count {
                self.diagnostics.error_in(
                    SectionKind::Function,
                    index as u32,
                    format!("type index {} is out of bounds", function.type_use.index),
                );
            }
        }
    }

    fn check_tables(&mut self) {
        for (index, table) in self.module.tables().iter().enumerate() {
            if !table.limits.is_well_formed() {
                self.diagnostics.error_in(
                    SectionKind::Table,
                    index as u32,
                    "minimum is greater than maximum",
                );
            }
        }
    }

    fn check_memories(&mut self) {
        for (index, memory) in self.module.memories().iter().enumerate() {
            if !memory.limits.is_well_formed() {
                self.diagnostics.error_in(
                    SectionKind::Memory,
                    index as u32,
                    "minimum is greater than maximum",
                );
            }

            const MAX_PAGES: u32 = 0x10000;

            if memory.limits.min > MAX_PAGES || memory.limits.max.unwrap_or(0) > MAX_PAGES {
                self.diagnostics.error_in(
                    SectionKind::Memory,
                    index as u32,
                    "memory size exceeds 65536 pages",
                );
            }
        }
    }

    fn check_globals(&mut self) {
        let imported = self.module.imported_global_count() as usize;

        for (offset, global) in self.module.globals()[imported..].iter().enumerate() {
            let entry = (imported + offset) as u32;

            match &global.initializer {
                Some(expression) => self.check_init_expression(
                    SectionKind::Global,
                    entry,
                    expression,
                    global.value_type,
                ),
                None => self.diagnostics.error_in(
                    SectionKind::Global,
                    entry,
                    "missing initialiser expression",
                ),
            }
        }
    }

    /// A constant initialiser: one constant instruction of the right type.
    fn check_init_expression(
        &mut self,
        section: SectionKind,
        entry: u32,
        expression: &Expression,
        expected: ValueType,
    ) {
        let instruction = match expression.instructions.first() {
            Some(instruction) if expression.instructions.len() == 1 => instruction,
            _ => {
                self.diagnostics.error_in(
                    section,
                    entry,
                    "initialiser must be a single constant instruction",
                );
                return;
            }
        };

        let produced = match instruction.opcode {
            Opcode::I32Const => Some(ValueType::I32),
            Opcode::I64Const => Some(ValueType::I64),
            Opcode::F32Const => Some(ValueType::F32),
            Opcode::F64Const => Some(ValueType::F64),
            Opcode::V128Const => Some(ValueType::V128),
            Opcode::RefNull => Some(ValueType::NullRef),
            Opcode::RefFunc => Some(ValueType::FuncRef),
            Opcode::GlobalGet => {
                let index = instruction.index_value().unwrap_or(0);

                match self.module.global(index) {
                    Some(global) if index < self.module.imported_global_count() => {
                        if global.mutability == Mutability::Var {
                            self.diagnostics.error_in(
                                section,
                                entry,
                                "initialiser may not read a mutable global",
                            );
                        }

                        Some(global.value_type)
                    }
                    Some(_) => {
                        self.diagnostics.error_in(
                            section,
                            entry,
                            "initialiser may only read imported globals",
                        );
                        None
                    }
                    None => {
                        self.diagnostics.error_in(
                            section,
                            entry,
                            format!("global index {} is out of bounds", index),
                        );
                        None
                    }
                }
            }
            opcode => {
                self.diagnostics.error_in(
                    section,
                    entry,
                    format!("'{}' is not a constant instruction", opcode),
                );
                None
            }
        };

        if let Some(produced) = produced {
            if !types_match(produced, expected) {
                self.diagnostics.error_in(
                    section,
                    entry,
                    format!("type mismatch: expected {}, found {}", expected, produced),
                );
            }
        }
    }

    fn check_exports(&mut self) {
        for (index, export) in self.module.exports().iter().enumerate() {
            let bound = match export.kind {
                crate::encodings::ExternalKind::Function => self.module.functions().len(),
                crate::encodings::ExternalKind::Table => self.module.tables().len(),
                crate::encodings::ExternalKind::Memory => self.module.memories().len(),
                crate::encodings::ExternalKind::Global => self.module.globals().len(),
                crate::encodings::ExternalKind::Event => self.module.events().len(),
            };

            if export.index as usize >= bound {
                self.diagnostics.error_in(
                    SectionKind::Export,
                    index as u32,
                    format!("{} index {} is out of bounds", export.kind, export.index),
                );
            }

            let duplicated = self.module.exports()[..index]
                .iter()
                .any(|previous| previous.name == export.name);

            if duplicated {
                self.diagnostics.error_in(
                    SectionKind::Export,
                    index as u32,
                    format!("duplicate export name '{}'", export.name),
                );
            }
        }
    }

    fn check_start(&mut self) {
        let index = match self.module.start() {
            Some(index) => index,
            None => return,
        };

        match self.module.function(index) {
            Some(function) => {
                let signature = &function.type_use.signature;

                if !signature.params.is_empty() || !signature.results.is_empty() {
                    self.diagnostics.error_in(
                        SectionKind::Start,
                        0,
                        "start function must have no parameters and no results",
                    );
                }
            }
            None => self.diagnostics.error_in(
                SectionKind::Start,
                0,
                format!("function index {} is out of bounds", index),
            ),
        }
    }

    fn check_elements(&mut self) {
        let function_count = self.module.functions().len() as u32;

        for (index, element) in self.module.elements().iter().enumerate() {
            let entry = index as u32;

            if element.is_active() {
                if self.module.table(element.table_index).is_none() {
                    self.diagnostics.error_in(
                        SectionKind::Element,
                        entry,
                        format!("table index {} is out of bounds", element.table_index),
                    );
                }

                match &element.offset {
                    Some(offset) => self.check_init_expression(
                        SectionKind::Element,
                        entry,
                        offset,
                        ValueType::I32,
                    ),
                    None => self.diagnostics.error_in(
                        SectionKind::Element,
                        entry,
                        "active element segment is missing its offset",
                    ),
                }
            }

            for &function in &element.function_indexes {
                if function >= function_count {
                    self.diagnostics.error_in(
                        SectionKind::Element,
                        entry,
                        format!("function index {} is out of bounds", function),
                    );
                }
            }

            for expression in &element.ref_expressions {
                self.check_init_expression(
                    SectionKind::Element,
                    entry,
                    expression,
                    element.ref_type,
                );
            }
        }
    }

    fn check_data(&mut self) {
        for (index, segment) in self.module.data_segments().iter().enumerate() {
            let entry = index as u32;

            if segment.is_active() {
                if self.module.memory(segment.memory_index).is_none() {
                    self.diagnostics.error_in(
                        SectionKind::Data,
                        entry,
                        format!("memory index {} is out of bounds", segment.memory_index),
                    );
                }

                match &segment.offset {
                    Some(offset) => self.check_init_expression(
                        SectionKind::Data,
                        entry,
                        offset,
                        ValueType::I32,
                    ),
                    None => self.diagnostics.error_in(
                        SectionKind::Data,
                        entry,
                        "active data segment is missing its offset",
                    ),
                }
            }
        }

        if let Some(declared) = self.module.data_count() {
            if declared != self.module.data_segments().len() as u32 {
                self.diagnostics.error_in(
                    SectionKind::DataCount,
                    0,
                    format!(
                        "data count section declares {} segment(s), data section has {}",
                        declared,
                        self.module.data_segments().len()
                    ),
                );
            }
        }
    }

    fn check_code(&mut self) {
        let local_functions =
            self.module.functions().len() - self.module.imported_function_count() as usize;

        if local_functions != self.module.code_entries().len() {
            self.diagnostics.error(
                Context::None,
                format!(
                    "{} function declaration(s) but {} code entr(ies)",
                    local_functions,
                    self.module.code_entries().len()
                ),
            );
        }

        for entry in self.module.code_entries() {
            debug!("validating function {}", entry.number);

            let mut validator = Validator::new(self.module, self.diagnostics, entry);

            validator.check_body(entry);
        }
    }
}

/// Subtype-aware matching; `Void` stands for a polymorphic operand and
/// `nullref` matches any reference type.
fn types_match(actual: ValueType, expected: ValueType) -> bool {
    actual == expected
        || actual == ValueType::Void
        || expected == ValueType::Void
        || (actual == ValueType::NullRef && expected.is_reference())
        || (expected == ValueType::NullRef && actual.is_reference())
}

/// One open block: the types branches to it carry, the types its natural end
/// produces, its input types, its stack watermark, and the polymorphic flag.
struct Frame {
    label_types: SmallVec<[ValueType; 2]>,
    end_types: SmallVec<[ValueType; 2]>,
    param_types: SmallVec<[ValueType; 2]>,
    height: usize,
    unreachable: bool,
}

struct Validator<'a> {
    module: &'a Module,
    diagnostics: &'a mut Diagnostics,
    locals: Vec<ValueType>,
    operands: Vec<ValueType>,
    frames: Vec<Frame>,
    entry: u32,
    line: u32,
}

impl<'a> Validator<'a> {
    fn new(module: &'a Module, diagnostics: &'a mut Diagnostics, entry: &CodeEntry) -> Self {
        let mut locals = Vec::new();

        if let Some(function) = module.function(entry.number) {
            locals.extend(function.type_use.signature.param_types());
        }

        locals.extend(entry.locals.iter().map(|local| local.value_type));

        Validator {
            module,
            diagnostics,
            locals,
            operands: Vec::new(),
            frames: Vec::new(),
            entry: entry.number,
            line: 0,
        }
    }

    fn context(&self) -> Context {
        if self.line != 0 {
            Context::Source(SourcePos::new(self.line, 1))
        } else {
            Context::Section {
                kind: SectionKind::Code,
                entry: self.entry,
            }
        }
    }

    fn fail(&mut self, message: impl Into<String>) {
        let context = self.context();
        self.diagnostics.error(context, message);
    }

    fn check_body(&mut self, entry: &CodeEntry) {
        let results: SmallVec<[ValueType; 2]> = self
            .module
            .function(entry.number)
            .map(|function| function.type_use.signature.results.iter().copied().collect())
            .unwrap_or_default();

        self.push_frame(results.clone(), results, SmallVec::new());

        for instruction in &entry.expression.instructions {
            self.line = instruction.line;
            self.check(instruction);
        }

        if !self.frames.is_empty() {
            self.fail("unclosed block at the end of the function");
        }
    }

    // --- operand stack ---

    fn push_operand(&mut self, kind: ValueType) {
        self.operands.push(kind);
    }

    fn push_operands(&mut self, kinds: &[ValueType]) {
        self.operands.extend_from_slice(kinds);
    }

    /// Pops one operand; underflow against the frame watermark yields a
    /// polymorphic `Void` silently when the frame is unreachable and reports
    /// otherwise.
    fn pop_operand(&mut self) -> ValueType {
        let frame_height = self.frames.last().map(|frame| frame.height).unwrap_or(0);

        if self.operands.len() <= frame_height {
            let unreachable = self
                .frames
                .last()
                .map(|frame| frame.unreachable)
                .unwrap_or(true);

            if !unreachable {
                self.fail("stack underflow");
            }

            return ValueType::Void;
        }

        self.operands.pop().unwrap_or(ValueType::Void)
    }

    fn pop_expect(&mut self, expected: ValueType) -> ValueType {
        let actual = self.pop_operand();

        if !types_match(actual, expected) {
            self.fail(format!(
                "type mismatch: expected {}, found {}",
                expected, actual
            ));
        }

        actual
    }

    fn pop_expect_all(&mut self, expected: &[ValueType]) {
        for &kind in expected.iter().rev() {
            self.pop_expect(kind);
        }
    }

    fn pop_reference(&mut self) -> ValueType {
        let actual = self.pop_operand();

        if actual != ValueType::Void && !actual.is_reference() {
            self.fail(format!(
                "type mismatch: expected a reference type, found {}",
                actual
            ));
        }

        actual
    }

    // --- frame stack ---

    fn push_frame(
        &mut self,
        label_types: SmallVec<[ValueType; 2]>,
        end_types: SmallVec<[ValueType; 2]>,
        param_types: SmallVec<[ValueType; 2]>,
    ) {
        self.frames.push(Frame {
            label_types,
            end_types,
            param_types,
            height: self.operands.len(),
            unreachable: false,
        });
    }

    /// Checks the end types and closes the frame, returning what the
    /// following code sees pushed.
    fn pop_frame(&mut self) -> SmallVec<[ValueType; 2]> {
        let (end_types, height) = match self.frames.last() {
            Some(frame) => (frame.end_types.clone(), frame.height),
            None => {
                self.fail("'end' without an open block");
                return SmallVec::new();
            }
        };

        self.pop_expect_all(&end_types);

        if self.operands.len() > height {
            let frame_unreachable = self.frames.last().map(|f| f.unreachable).unwrap_or(false);

            if !frame_unreachable {
                self.fail(format!(
                    "{} value(s) remaining on the stack at the end of the block",
                    self.operands.len() - height
                ));
            }
        }

        self.operands.truncate(height);
        self.frames.pop();

        end_types
    }

    fn set_unreachable(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.unreachable = true;
            self.operands.truncate(frame.height);
        }
    }

    /// The frame a label index names; 0 is the innermost.
    fn frame_at(&mut self, depth: u32) -> Option<usize> {
        if (depth as usize) < self.frames.len() {
            Some(self.frames.len() - 1 - depth as usize)
        } else {
            self.fail(format!("label index {} is out of bounds", depth));
            None
        }
    }

    fn label_types_at(&mut self, depth: u32) -> Option<SmallVec<[ValueType; 2]>> {
        self.frame_at(depth)
            .map(|index| self.frames[index].label_types.clone())
    }

    // --- per-instruction transitions ---

    fn check(&mut self, instruction: &Instruction) {
        match instruction.opcode.sig() {
            SignatureCode::Fixed { params, results } => {
                self.check_memarg(instruction);
                self.pop_expect_all(params);
                self.push_operands(results);
            }
            SignatureCode::Special => self.check_special(instruction),
        }
    }

    /// Alignment never exceeds the access width, and the module must have a
    /// memory at all for memory-access opcodes.
    fn check_memarg(&mut self, instruction: &Instruction) {
        let (align, check_memory) = match instruction.imm {
            Immediate::Memory { align, .. } => (align, true),
            Immediate::MemoryLane { align, .. } => (align, true),
            _ => match instruction.opcode {
                Opcode::MemorySize | Opcode::MemoryGrow | Opcode::MemoryInit
                | Opcode::MemoryCopy | Opcode::MemoryFill => (0, true),
                _ => return,
            },
        };

        if align > instruction.opcode.align() {
            self.fail(format!(
                "alignment must not exceed {}",
                1u32 << instruction.opcode.align()
            ));
        }

        if check_memory && self.module.memories().is_empty() {
            self.fail("unknown memory 0");
        }
    }

    fn block_signature(
        &mut self,
        block_type: BlockType,
    ) -> (SmallVec<[ValueType; 2]>, SmallVec<[ValueType; 2]>) {
        match block_type {
            BlockType::Void => (SmallVec::new(), SmallVec::new()),
            BlockType::Value(kind) => (SmallVec::new(), SmallVec::from_slice(&[kind])),
            BlockType::TypeIndex(index) => match self.module.signature(index) {
                Some(signature) => (
                    signature.param_types().collect(),
                    signature.results.iter().copied().collect(),
                ),
                None => {
                    self.fail(format!("type index {} is out of bounds", index));
                    (SmallVec::new(), SmallVec::new())
                }
            },
        }
    }

    fn check_block(&mut self, instruction: &Instruction) {
        let block_type = match instruction.imm {
            Immediate::Block { block_type, .. } => block_type,
            _ => BlockType::Void,
        };
        let (params, results) = self.block_signature(block_type);

        if instruction.opcode == Opcode::If {
            self.pop_expect(ValueType::I32);
        }

        self.pop_expect_all(&params);

        let label_types = if instruction.opcode == Opcode::Loop {
            params.clone()
        } else {
            results.clone()
        };

        self.push_frame(label_types, results, params.clone());
        self.push_operands(&params);
    }

    fn check_special(&mut self, instruction: &Instruction) {
        match instruction.opcode {
            Opcode::Block | Opcode::Loop | Opcode::If | Opcode::Try => {
                self.check_block(instruction);
            }
            Opcode::End => {
                let results = self.pop_frame();
                self.push_operands(&results);
            }
            Opcode::Else => {
                let (params, results) = match self.frames.last() {
                    Some(frame) => (frame.param_types.clone(), frame.end_types.clone()),
                    None => (SmallVec::new(), SmallVec::new()),
                };

                self.pop_frame();
                self.push_frame(results.clone(), results, params.clone());
                self.push_operands(&params);
            }
            Opcode::Catch => {
                let results = match self.frames.last() {
                    Some(frame) => frame.end_types.clone(),
                    None => SmallVec::new(),
                };

                self.pop_frame();
                self.push_frame(results.clone(), results, SmallVec::new());
                self.push_operand(ValueType::ExnRef);
            }
            Opcode::Unreachable => self.set_unreachable(),
            Opcode::Drop => {
                self.pop_operand();
            }
            Opcode::Select => {
                self.pop_expect(ValueType::I32);

                let first = self.pop_operand();
                let second = self.pop_expect(first);

                self.push_operand(if second == ValueType::Void {
                    first
                } else {
                    second
                });
            }
            Opcode::RefNull => self.push_operand(ValueType::NullRef),
            Opcode::RefIsNull => {
                self.pop_reference();
                self.push_operand(ValueType::I32);
            }
            Opcode::RefFunc => {
                let index = instruction.index_value().unwrap_or(0);

                if self.module.function(index).is_none() {
                    self.fail(format!("function index {} is out of bounds", index));
                }

                self.push_operand(ValueType::FuncRef);
            }
            Opcode::LocalGet | Opcode::LocalSet | Opcode::LocalTee => {
                self.check_local(instruction);
            }
            Opcode::GlobalGet | Opcode::GlobalSet => self.check_global(instruction),
            Opcode::Br => {
                let depth = instruction.index_value().unwrap_or(0);

                if let Some(label_types) = self.label_types_at(depth) {
                    self.pop_expect_all(&label_types);
                }

                self.set_unreachable();
            }
            Opcode::BrIf => {
                self.pop_expect(ValueType::I32);

                let depth = instruction.index_value().unwrap_or(0);

                if let Some(label_types) = self.label_types_at(depth) {
                    self.pop_expect_all(&label_types);
                    self.push_operands(&label_types);
                }
            }
            Opcode::BrTable => self.check_br_table(instruction),
            Opcode::Return => {
                let label_types = self
                    .frames
                    .first()
                    .map(|frame| frame.end_types.clone())
                    .unwrap_or_default();

                self.pop_expect_all(&label_types);
                self.set_unreachable();
            }
            Opcode::Call | Opcode::ReturnCall => {
                let index = instruction.index_value().unwrap_or(0);
                let signature = match self.module.function(index) {
                    Some(function) => function.type_use.signature.clone(),
                    None => {
                        self.fail(format!("function index {} is out of bounds", index));
                        return;
                    }
                };

                let params: SmallVec<[ValueType; 2]> = signature.param_types().collect();

                self.pop_expect_all(&params);

                if instruction.opcode == Opcode::ReturnCall {
                    self.set_unreachable();
                } else {
                    self.push_operands(&signature.results);
                }
            }
            Opcode::CallIndirect | Opcode::ReturnCallIndirect => {
                let type_index = match instruction.imm {
                    Immediate::Indirect { type_index, .. } => type_index,
                    _ => 0,
                };

                if self.module.tables().is_empty() {
                    self.fail("unknown table 0");
                }

                self.pop_expect(ValueType::I32);

                let signature = match self.module.signature(type_index) {
                    Some(signature) => signature.clone(),
                    None => {
                        self.fail(format!("type index {} is out of bounds", type_index));
                        return;
                    }
                };

                let params: SmallVec<[ValueType; 2]> = signature.param_types().collect();

                self.pop_expect_all(&params);

                if instruction.opcode == Opcode::ReturnCallIndirect {
                    self.set_unreachable();
                } else {
                    self.push_operands(&signature.results);
                }
            }
            Opcode::Throw => {
                let index = instruction.index_value().unwrap_or(0);

                if let Some(event) = self.module.event(index) {
                    let params: SmallVec<[ValueType; 2]> =
                        event.type_use.signature.param_types().collect();

                    self.pop_expect_all(&params);
                } else {
                    self.fail(format!("event index {} is out of bounds", index));
                }

                self.set_unreachable();
            }
            Opcode::Rethrow => {
                self.pop_expect(ValueType::ExnRef);
                self.set_unreachable();
            }
            Opcode::TableGet | Opcode::TableSet | Opcode::TableGrow | Opcode::TableFill => {
                self.check_table(instruction);
            }
            opcode => {
                self.fail(format!("'{}' is not validated", opcode));
            }
        }
    }

    fn check_local(&mut self, instruction: &Instruction) {
        let index = instruction.index_value().unwrap_or(0);
        let kind = match self.locals.get(index as usize) {
            Some(&kind) => kind,
            None => {
                self.fail(format!("local index {} is out of bounds", index));
                ValueType::I32
            }
        };

        match instruction.opcode {
            Opcode::LocalGet => self.push_operand(kind),
            Opcode::LocalSet => {
                self.pop_expect(kind);
            }
            _ => {
                self.pop_expect(kind);
                self.push_operand(kind);
            }
        }
    }

    fn check_global(&mut self, instruction: &Instruction) {
        let index = instruction.index_value().unwrap_or(0);
        let (kind, mutability) = match self.module.global(index) {
            Some(global) => (global.value_type, global.mutability),
            None => {
                self.fail(format!("global index {} is out of bounds", index));
                (ValueType::I32, Mutability::Var)
            }
        };

        if instruction.opcode == Opcode::GlobalGet {
            self.push_operand(kind);
        } else {
            if mutability == Mutability::Const {
                self.fail(format!("global {} is immutable", index));
            }

            self.pop_expect(kind);
        }
    }

    fn check_table(&mut self, instruction: &Instruction) {
        let index = instruction.index_value().unwrap_or(0);
        let ref_type = match self.module.table(index) {
            Some(table) => table.ref_type,
            None => {
                self.fail(format!("table index {} is out of bounds", index));
                ValueType::FuncRef
            }
        };

        match instruction.opcode {
            Opcode::TableGet => {
                self.pop_expect(ValueType::I32);
                self.push_operand(ref_type);
            }
            Opcode::TableSet => {
                self.pop_expect(ref_type);
                self.pop_expect(ValueType::I32);
            }
            Opcode::TableGrow => {
                self.pop_expect(ValueType::I32);
                self.pop_expect(ref_type);
                self.push_operand(ValueType::I32);
            }
            _ => {
                self.pop_expect(ValueType::I32);
                self.pop_expect(ref_type);
                self.pop_expect(ValueType::I32);
            }
        }
    }

    /// Every listed label must carry the same types as the default.
    fn check_br_table(&mut self, instruction: &Instruction) {
        let (targets, default) = match &instruction.imm {
            Immediate::BrTable { targets, default } => (targets.clone(), *default),
            _ => return,
        };

        self.pop_expect(ValueType::I32);

        let default_types = match self.label_types_at(default) {
            Some(types) => types,
            None => return,
        };

        for target in targets {
            match self.label_types_at(target) {
                Some(types) if types == default_types => {}
                Some(types) => self.fail(format!(
                    "br_table target {} expects [{}], the default expects [{}]",
                    target,
                    type_list(&types),
                    type_list(&default_types)
                )),
                None => {}
            }
        }

        self.pop_expect_all(&default_types);
        self.set_unreachable();
    }
}

fn type_list(types: &[ValueType]) -> String {
    types
        .iter()
        .map(|kind| kind.name())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::parse_text;

    fn validate_text(source: &str) -> Diagnostics {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut diagnostics = Diagnostics::new();
        let module = parse_text(source, &mut diagnostics);

        assert!(!diagnostics.has_errors(), "parse failed: {}", diagnostics);

        validate(&module, &mut diagnostics);
        diagnostics
    }

    #[test]
    fn valid_add_function() {
        let diagnostics = validate_text(
            "(module (func (param i32 i32) (result i32)
               local.get 0
               local.get 1
               i32.add))",
        );

        assert!(!diagnostics.has_errors(), "{}", diagnostics);
    }

    #[test]
    fn result_type_mismatch_is_one_error() {
        let diagnostics = validate_text("(module (func (result i32) i64.const 1))");

        assert_eq!(diagnostics.error_count(), 1, "{}", diagnostics);
        assert!(diagnostics.items()[0].message.contains("expected i32"));
        assert!(diagnostics.items()[0].message.contains("found i64"));
    }

    #[test]
    fn stack_underflow_is_reported() {
        let diagnostics = validate_text("(module (func i32.add drop))");

        assert!(diagnostics
            .items()
            .iter()
            .any(|item| item.message.contains("stack underflow")));
    }

    #[test]
    fn unreachable_makes_the_stack_polymorphic() {
        let diagnostics = validate_text(
            "(module (func (result i32)
               unreachable
               i32.add))",
        );

        assert!(!diagnostics.has_errors(), "{}", diagnostics);
    }

    #[test]
    fn branch_types_are_checked() {
        let diagnostics = validate_text(
            "(module (func (result i32)
               (block (result i32)
                 i64.const 1
                 br 0)))",
        );

        assert!(diagnostics.has_errors());
    }

    #[test]
    fn loop_labels_use_params() {
        // A branch to a loop label carries the loop's inputs (none here).
        let diagnostics = validate_text(
            "(module (func
               (loop
                 br 0)))",
        );

        assert!(!diagnostics.has_errors(), "{}", diagnostics);
    }

    #[test]
    fn br_table_label_types_must_agree() {
        let diagnostics = validate_text(
            "(module (func (param i32)
               (block (result i64)
                 (block (result i32)
                   i32.const 0
                   local.get 0
                   br_table 0 1)
                 drop
                 i64.const 0)
               drop))",
        );

        assert!(diagnostics.has_errors(), "{}", diagnostics);
        assert!(diagnostics
            .items()
            .iter()
            .any(|item| item.message.contains("br_table")));
    }

    #[test]
    fn if_arms_must_match_declared_results() {
        let diagnostics = validate_text(
            "(module (func (param i32) (result i32)
               (if (result i32) (local.get 0)
                 (then (i32.const 1))
                 (else (i64.const 2)))))",
        );

        assert!(diagnostics.has_errors());
    }

    #[test]
    fn block_height_is_enforced() {
        let diagnostics = validate_text(
            "(module (func
               (block
                 i32.const 1)))",
        );

        assert!(diagnostics.has_errors());
        assert!(diagnostics
            .items()
            .iter()
            .any(|item| item.message.contains("remaining on the stack")));
    }

    #[test]
    fn call_signatures_apply() {
        let diagnostics = validate_text(
            "(module
               (func $callee (param i32) (result i64)
                 i64.const 1)
               (func (result i64)
                 i32.const 0
                 call $callee))",
        );

        assert!(!diagnostics.has_errors(), "{}", diagnostics);
    }

    #[test]
    fn call_argument_mismatch_fails() {
        let diagnostics = validate_text(
            "(module
               (func $callee (param i32))
               (func
                 i64.const 0
                 call $callee))",
        );

        assert!(diagnostics.has_errors());
    }

    #[test]
    fn immutable_globals_reject_set() {
        let diagnostics = validate_text(
            "(module
               (global $g i32 (i32.const 0))
               (func
                 i32.const 1
                 global.set $g))",
        );

        assert!(diagnostics.has_errors());
        assert!(diagnostics
            .items()
            .iter()
            .any(|item| item.message.contains("immutable")));
    }

    #[test]
    fn memory_limits_are_checked() {
        let diagnostics = validate_text("(module (memory 2 1))");

        assert!(diagnostics.has_errors());
        assert!(diagnostics
            .items()
            .iter()
            .any(|item| item.message.contains("minimum is greater than maximum")));
    }

    #[test]
    fn start_function_must_be_nullary() {
        let diagnostics = validate_text(
            "(module
               (func $main (param i32))
               (start $main))",
        );

        assert!(diagnostics.has_errors());
    }

    #[test]
    fn select_requires_matching_operands() {
        let diagnostics = validate_text(
            "(module (func (param i32) (result i32)
               i32.const 1
               i64.const 2
               local.get 0
               select))",
        );

        assert!(diagnostics.has_errors());
    }

    #[test]
    fn alignment_may_not_exceed_natural() {
        let diagnostics = validate_text(
            "(module
               (memory 1)
               (func (param i32) (result i32)
                 (i32.load align=8 (local.get 0))))",
        );

        assert!(diagnostics.has_errors());
        assert!(diagnostics
            .items()
            .iter()
            .any(|item| item.message.contains("alignment")));
    }

    #[test]
    fn missing_memory_is_reported() {
        let diagnostics = validate_text(
            "(module (func (param i32) (result i32)
               (i32.load (local.get 0))))",
        );

        assert!(diagnostics.has_errors());
        assert!(diagnostics
            .items()
            .iter()
            .any(|item| item.message.contains("unknown memory")));
    }

    #[test]
    fn fixed_signature_stack_delta() {
        // After a fixed-signature instruction the height changes by
        // (pushed - popped): two pops, one push for i32.add.
        let diagnostics = validate_text(
            "(module (func (result i32)
               i32.const 1
               i32.const 2
               i32.add))",
        );

        assert!(!diagnostics.has_errors(), "{}", diagnostics);
    }
}
