//! Builds C statement trees from validated instruction streams with a
//! two-register machine: an expression stack of built-but-unconsumed values
//! and a label stack for the open blocks.

use crate::diagnostics::{Context, Diagnostics};
use crate::encodings::{Opcode, ValueType};
use crate::instruction::{BlockType, Immediate, Instruction};
use crate::model::{CodeEntry, Module};

use super::names;
use super::node::{CKind, CTree, NodeId};

/// The built body of one function.
pub struct BuiltFunction {
    pub tree: CTree,
    pub body: NodeId,
}

/// One open block as the generator sees it.
struct LabelInfo {
    id: u32,
    result: Option<(String, ValueType)>,
    backward: bool,
    branch_target: bool,
}

enum Terminator {
    End,
    Else,
    Exhausted,
}

pub struct BodyBuilder<'a> {
    module: &'a Module,
    diagnostics: &'a mut Diagnostics,
    tree: CTree,
    stack: Vec<NodeId>,
    labels: Vec<LabelInfo>,
    next_label: u32,
    instructions: &'a [Instruction],
    pos: usize,
    param_count: u32,
    results: Vec<ValueType>,
    entry: u32,
}

impl<'a> BodyBuilder<'a> {
    pub fn new(
        module: &'a Module,
        entry: &'a CodeEntry,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        let signature = module
            .function(entry.number)
            .map(|function| function.type_use.signature.clone())
            .unwrap_or_default();

        BodyBuilder {
            module,
            diagnostics,
            tree: CTree::new(),
            stack: Vec::new(),
            labels: Vec::new(),
            next_label: 0,
            instructions: &entry.expression.instructions,
            pos: 0,
            param_count: signature.params.len() as u32,
            results: signature.results,
            entry: entry.number,
        }
    }

    pub fn generate(mut self) -> BuiltFunction {
        let body = self.tree.add(CKind::Compound);
        let has_result = !self.results.is_empty();

        if self.results.len() > 1 {
            self.unsupported("multiple results");
        }

        // Label 0 is the function's own exit.
        let result = if has_result {
            Some(("result0".to_string(), self.results[0]))
        } else {
            None
        };

        let result_variable = result.as_ref().map(|(name, kind)| {
            let variable = self.tree.add(CKind::Variable {
                c_type: *kind,
                name: name.clone(),
            });

            self.tree.link(variable, body);
            variable
        });

        self.labels.push(LabelInfo {
            id: 0,
            result,
            backward: false,
            branch_target: false,
        });
        self.next_label = 1;

        self.generate_statements(body);

        let info = self.labels.pop().unwrap();
        let value = if has_result { self.stack.pop() } else { None };

        if info.branch_target {
            if let Some(value) = value {
                let assignment = self.assign("result0", value);

                self.tree.link(assignment, body);
            }

            let label = self.tree.add(CKind::Label(0));
            self.tree.link(label, body);

            if has_result {
                let ret = self.tree.add(CKind::Return);
                let name = self.tree.add(CKind::NameUse("result0".to_string()));

                self.tree.link(name, ret);
                self.tree.link(ret, body);
            }
        } else {
            // The declaration slot is unused; drop it.
            if let Some(variable) = result_variable {
                self.tree.unlink(variable);
            }

            if let Some(value) = value {
                let ret = self.tree.add(CKind::Return);

                self.tree.link(value, ret);
                self.tree.link(ret, body);
            }
        }

        BuiltFunction {
            tree: self.tree,
            body,
        }
    }

    fn unsupported(&mut self, what: impl std::fmt::Display) {
        self.diagnostics.error(
            Context::None,
            format!(
                "function {}: {} not supported by the C generator",
                self.entry, what
            ),
        );
    }

    fn next_instruction(&mut self) -> Option<&'a Instruction> {
        let instruction = self.instructions.get(self.pos)?;
        self.pos += 1;

        Some(instruction)
    }

    /// Skips the dead code that may follow a terminal instruction, stopping
    /// just before the `end` or `else` closing the current block.
    fn skip_unreachable(&mut self) {
        let mut depth = 0u32;

        while let Some(instruction) = self.instructions.get(self.pos) {
            match instruction.opcode {
                Opcode::End | Opcode::Else if depth == 0 => return,
                Opcode::End => depth -= 1,
                opcode if opcode.is_block_start() => depth += 1,
                _ => {}
            }

            self.pos += 1;
        }
    }

    // --- expression stack ---

    fn push_expr(&mut self, id: NodeId) {
        self.stack.push(id);
    }

    fn pop_expr(&mut self) -> NodeId {
        match self.stack.pop() {
            Some(id) => id,
            None => {
                // Only reachable on invalid input; validation runs first.
                self.unsupported("expression stack underflow");
                self.tree.add(CKind::I32(0))
            }
        }
    }

    fn assign(&mut self, name: &str, value: NodeId) -> NodeId {
        let assignment = self.tree.add(CKind::Binary { op: "=" });
        let target = self.tree.add(CKind::NameUse(name.to_string()));

        self.tree.link(target, assignment);
        self.tree.link(value, assignment);
        assignment
    }

    // --- structured control flow ---

    fn block_results(&mut self, instruction: &Instruction) -> Vec<ValueType> {
        let block_type = match instruction.imm {
            Immediate::Block { block_type, .. } => block_type,
            _ => BlockType::Void,
        };

        match block_type {
            BlockType::Void => Vec::new(),
            BlockType::Value(kind) => vec![kind],
            BlockType::TypeIndex(index) => match self.module.signature(index) {
                Some(signature) => {
                    if !signature.params.is_empty() {
                        self.unsupported("block parameters");
                    }

                    signature.results.clone()
                }
                None => Vec::new(),
            },
        }
    }

    fn open_label(&mut self, results: &[ValueType], backward: bool, parent: NodeId) -> u32 {
        let id = self.next_label;
        self.next_label += 1;

        let result = results.first().map(|&kind| {
            let name = format!("result{}", id);
            let variable = self.tree.add(CKind::Variable {
                c_type: kind,
                name: name.clone(),
            });

            self.tree.link(variable, parent);
            (name, kind)
        });

        if results.len() > 1 {
            self.unsupported("multiple block results");
        }

        self.labels.push(LabelInfo {
            id,
            result,
            backward,
            branch_target: false,
        });

        id
    }

    /// Closes the innermost label: flushes the result value into its
    /// variable and returns the info for label placement.
    fn close_label(&mut self, inner: NodeId, height: usize) -> LabelInfo {
        let info = self.labels.pop().unwrap();

        if let Some((name, _)) = &info.result {
            if self.stack.len() > height {
                let value = self.pop_expr();
                let assignment = self.assign(&name.clone(), value);

                self.tree.link(assignment, inner);
            }
        }

        // Whatever the dead code left behind stays out of the output.
        self.stack.truncate(height);
        info
    }

    fn generate_block(&mut self, compound: NodeId, instruction: &Instruction, backward: bool) {
        let results = self.block_results(instruction);
        let height = self.stack.len();
        let label_id = self.open_label(&results, backward, compound);

        let inner = self.tree.add(CKind::Compound);
        self.tree.link(inner, compound);

        self.generate_statements(inner);

        let info = self.close_label(inner, height);

        if info.branch_target {
            let label = self.tree.add(CKind::Label(label_id));

            if backward {
                // A loop's label sits in front so branches jump backwards.
                self.tree.link_before(label, compound, inner);
            } else {
                self.tree.link(label, compound);
            }
        }

        if let Some((name, _)) = info.result {
            let value = self.tree.add(CKind::NameUse(name));

            self.push_expr(value);
        }
    }

    fn generate_if(&mut self, compound: NodeId, instruction: &Instruction) {
        let condition = self.pop_expr();
        let results = self.block_results(instruction);
        let height = self.stack.len();
        let label_id = self.open_label(&results, false, compound);

        let if_node = self.tree.add(CKind::If);
        self.tree.link(condition, if_node);

        let then_compound = self.tree.add(CKind::Compound);
        self.tree.link(then_compound, if_node);
        self.tree.link(if_node, compound);

        let terminator = self.generate_statements(then_compound);

        // Flush the then-arm value without closing the label yet.
        if let Some((name, _)) = self.labels.last().and_then(|info| info.result.clone()) {
            if self.stack.len() > height {
                let value = self.pop_expr();
                let assignment = self.assign(&name, value);

                self.tree.link(assignment, then_compound);
            }
        }

        self.stack.truncate(height);

        if matches!(terminator, Terminator::Else) {
            let else_compound = self.tree.add(CKind::Compound);
            self.tree.link(else_compound, if_node);

            self.generate_statements(else_compound);

            let info = self.close_label(else_compound, height);

            self.finish_if(compound, info);
        } else {
            let info = self.labels.pop().unwrap();

            self.stack.truncate(height);
            self.finish_if(compound, info);
        }
    }

    fn finish_if(&mut self, compound: NodeId, info: LabelInfo) {
        if info.branch_target {
            let label = self.tree.add(CKind::Label(info.id));

            self.tree.link(label, compound);
        }

        if let Some((name, _)) = info.result {
            let value = self.tree.add(CKind::NameUse(name));

            self.push_expr(value);
        }
    }

    fn label_at(&mut self, depth: u32) -> Option<usize> {
        let index = self.labels.len().checked_sub(1 + depth as usize);

        if index.is_none() {
            self.unsupported(format!("branch depth {}", depth));
        }

        index
    }

    /// The goto for a branch, prefixed by the result-variable store when the
    /// target label carries a value.
    fn generate_branch(&mut self, compound: NodeId, depth: u32) {
        let Some(index) = self.label_at(depth) else {
            return;
        };

        self.labels[index].branch_target = true;

        let id = self.labels[index].id;
        let carries_value =
            !self.labels[index].backward && self.labels[index].result.is_some();

        if carries_value {
            let name = self.labels[index].result.as_ref().unwrap().0.clone();
            let value = self.pop_expr();
            let assignment = self.assign(&name, value);

            self.tree.link(assignment, compound);
        }

        let branch = self.tree.add(CKind::Br { label: id });
        self.tree.link(branch, compound);
    }

    fn generate_br_if(&mut self, compound: NodeId, depth: u32) {
        let condition = self.pop_expr();

        if let Some(index) = self.label_at(depth) {
            if !self.labels[index].backward && self.labels[index].result.is_some() {
                self.unsupported("conditional branches that carry values");
                return;
            }
        }

        let if_node = self.tree.add(CKind::If);
        self.tree.link(condition, if_node);

        let then_compound = self.tree.add(CKind::Compound);
        self.tree.link(then_compound, if_node);
        self.tree.link(if_node, compound);

        self.generate_branch(then_compound, depth);
    }

    fn generate_br_table(&mut self, compound: NodeId, instruction: &Instruction) {
        let (targets, default) = match &instruction.imm {
            Immediate::BrTable { targets, default } => (targets.clone(), *default),
            _ => return,
        };

        let scrutinee = self.pop_expr();
        let mut cases = Vec::with_capacity(targets.len());

        for (value, &depth) in targets.iter().enumerate() {
            let Some(index) = self.label_at(depth) else {
                continue;
            };

            if self.labels[index].result.is_some() && !self.labels[index].backward {
                self.unsupported("branch tables that carry values");
            }

            self.labels[index].branch_target = true;
            cases.push((value as i64, self.labels[index].id));
        }

        let default_id = match self.label_at(default) {
            Some(index) => {
                self.labels[index].branch_target = true;
                self.labels[index].id
            }
            None => 0,
        };

        let switch = self.tree.add(CKind::Switch {
            cases,
            default: default_id,
        });

        self.tree.link(scrutinee, switch);
        self.tree.link(switch, compound);
    }

    fn generate_return(&mut self, compound: NodeId) {
        let ret = self.tree.add(CKind::Return);

        if !self.results.is_empty() {
            let value = self.pop_expr();

            self.tree.link(value, ret);
        }

        self.tree.link(ret, compound);
    }

    // --- the statement loop ---

    fn generate_statements(&mut self, compound: NodeId) -> Terminator {
        loop {
            let instruction = match self.next_instruction() {
                Some(instruction) => instruction,
                None => return Terminator::Exhausted,
            };

            match instruction.opcode {
                Opcode::End => return Terminator::End,
                Opcode::Else => return Terminator::Else,
                Opcode::Nop => {}
                Opcode::Unreachable => self.skip_unreachable(),
                Opcode::Block => self.generate_block(compound, instruction, false),
                Opcode::Loop => self.generate_block(compound, instruction, true),
                Opcode::If => self.generate_if(compound, instruction),
                Opcode::Br => {
                    let depth = instruction.index_value().unwrap_or(0);

                    self.generate_branch(compound, depth);
                    self.skip_unreachable();
                }
                Opcode::BrIf => {
                    let depth = instruction.index_value().unwrap_or(0);

                    self.generate_br_if(compound, depth);
                }
                Opcode::BrTable => {
                    self.generate_br_table(compound, instruction);
                    self.skip_unreachable();
                }
                Opcode::Return => {
                    self.generate_return(compound);
                    self.skip_unreachable();
                }
                _ => self.generate_plain(compound, instruction),
            }
        }
    }

    // --- plain expressions and statements ---

    fn binary(&mut self, op: &'static str) {
        let right = self.pop_expr();
        let left = self.pop_expr();
        let node = self.tree.add(CKind::Binary { op });

        self.tree.link(left, node);
        self.tree.link(right, node);
        self.push_expr(node);
    }

    fn cast_expr(&mut self, c_type: &str, value: NodeId) -> NodeId {
        let node = self.tree.add(CKind::Cast {
            c_type: c_type.to_string(),
        });

        self.tree.link(value, node);
        node
    }

    /// An unsigned operation: both operands cast, the result cast back.
    fn binary_unsigned(&mut self, op: &'static str, unsigned: &str, signed: &str) {
        let right = self.pop_expr();
        let right = self.cast_expr(unsigned, right);
        let left = self.pop_expr();
        let left = self.cast_expr(unsigned, left);
        let node = self.tree.add(CKind::Binary { op });

        self.tree.link(left, node);
        self.tree.link(right, node);

        let result = self.cast_expr(signed, node);
        self.push_expr(result);
    }

    /// An unsigned comparison: operands cast, result already `int`.
    fn compare_unsigned(&mut self, op: &'static str, unsigned: &str) {
        let right = self.pop_expr();
        let right = self.cast_expr(unsigned, right);
        let left = self.pop_expr();
        let left = self.cast_expr(unsigned, left);
        let node = self.tree.add(CKind::Binary { op });

        self.tree.link(left, node);
        self.tree.link(right, node);
        self.push_expr(node);
    }

    fn unary(&mut self, op: &'static str) {
        let value = self.pop_expr();
        let node = self.tree.add(CKind::Unary { op });

        self.tree.link(value, node);
        self.push_expr(node);
    }

    fn call_helper(&mut self, name: &str, argc: usize) {
        let mut arguments = Vec::with_capacity(argc);

        for _ in 0..argc {
            arguments.push(self.pop_expr());
        }

        arguments.reverse();

        let call = self.tree.add(CKind::Call {
            name: name.to_string(),
        });

        for argument in arguments {
            self.tree.link(argument, call);
        }

        self.push_expr(call);
    }

    fn cast(&mut self, c_type: &str) {
        let value = self.pop_expr();
        let node = self.cast_expr(c_type, value);

        self.push_expr(node);
    }

    fn cast_via(&mut self, outer: &str, inner: &str) {
        let value = self.pop_expr();
        let inner_node = self.cast_expr(inner, value);
        let node = self.cast_expr(outer, inner_node);

        self.push_expr(node);
    }

    /// A load/store address with the static offset folded into a constant
    /// dynamic address at build time.
    fn address(&mut self, offset: u32) -> NodeId {
        let dynamic = self.pop_expr();

        if offset == 0 {
            return dynamic;
        }

        if let CKind::I32(value) = *self.tree.kind(dynamic) {
            let combined = self
                .tree
                .add(CKind::I32((value as u32).wrapping_add(offset) as i32));

            return combined;
        }

        let sum = self.tree.add(CKind::Binary { op: "+" });
        let offset_node = self.tree.add(CKind::I32(offset as i32));

        self.tree.link(dynamic, sum);
        self.tree.link(offset_node, sum);
        sum
    }

    fn memory_argument(&mut self) -> NodeId {
        let name = names::memory_name(self.module, 0);
        let reference = self.tree.add(CKind::Unary { op: "&" });
        let memory = self.tree.add(CKind::NameUse(name));

        self.tree.link(memory, reference);
        reference
    }

    fn load(&mut self, what: &'static str, instruction: &Instruction) {
        let offset = match instruction.imm {
            Immediate::Memory { offset, .. } => offset,
            _ => 0,
        };
        let address = self.address(offset);
        let memory = names::memory_name(self.module, 0);
        let node = self.tree.add(CKind::Load {
            what,
            memory,
        });

        self.tree.link(address, node);
        self.push_expr(node);
    }

    fn store(&mut self, what: &'static str, compound: NodeId, instruction: &Instruction) {
        let offset = match instruction.imm {
            Immediate::Memory { offset, .. } => offset,
            _ => 0,
        };
        let value = self.pop_expr();
        let address = self.address(offset);
        let memory = names::memory_name(self.module, 0);
        let node = self.tree.add(CKind::Store {
            what,
            memory,
        });

        self.tree.link(address, node);
        self.tree.link(value, node);
        self.tree.link(node, compound);
    }

    fn local_name_for(&self, index: u32) -> String {
        names::local_name(index, self.param_count)
    }

    fn generate_call(&mut self, compound: NodeId, index: u32) {
        let signature = match self.module.function(index) {
            Some(function) => function.type_use.signature.clone(),
            None => return,
        };

        let mut arguments = Vec::with_capacity(signature.params.len());

        for _ in 0..signature.params.len() {
            arguments.push(self.pop_expr());
        }

        arguments.reverse();

        let call = self.tree.add(CKind::Call {
            name: names::function_name(self.module, index),
        });

        for argument in arguments {
            self.tree.link(argument, call);
        }

        match signature.results.len() {
            0 => self.tree.link(call, compound),
            1 => self.push_expr(call),
            _ => self.unsupported("calls with multiple results"),
        }
    }

    fn generate_call_indirect(&mut self, compound: NodeId, instruction: &Instruction) {
        let (type_index, table_index) = match instruction.imm {
            Immediate::Indirect {
                type_index,
                table_index,
            } => (type_index, table_index),
            _ => (0, 0),
        };

        let signature = match self.module.signature(type_index) {
            Some(signature) => signature.clone(),
            None => return,
        };

        let element = self.pop_expr();
        let mut arguments = Vec::with_capacity(signature.params.len());

        for _ in 0..signature.params.len() {
            arguments.push(self.pop_expr());
        }

        arguments.reverse();

        let call = self.tree.add(CKind::CallIndirect {
            type_index,
            table: names::table_name(self.module, table_index),
        });

        self.tree.link(element, call);

        for argument in arguments {
            self.tree.link(argument, call);
        }

        match signature.results.len() {
            0 => self.tree.link(call, compound),
            1 => self.push_expr(call),
            _ => self.unsupported("calls with multiple results"),
        }
    }

    fn generate_plain(&mut self, compound: NodeId, instruction: &Instruction) {
        use Opcode::*;

        match instruction.opcode {
            // Constants.
            I32Const => {
                let value = match instruction.imm {
                    Immediate::I32(value) => value,
                    _ => 0,
                };
                let node = self.tree.add(CKind::I32(value));

                self.push_expr(node);
            }
            I64Const => {
                let value = match instruction.imm {
                    Immediate::I64(value) => value,
                    _ => 0,
                };
                let node = self.tree.add(CKind::I64(value));

                self.push_expr(node);
            }
            F32Const => {
                let value = match instruction.imm {
                    Immediate::F32(value) => value,
                    _ => 0.0,
                };
                let node = self.tree.add(CKind::F32(value));

                self.push_expr(node);
            }
            F64Const => {
                let value = match instruction.imm {
                    Immediate::F64(value) => value,
                    _ => 0.0,
                };
                let node = self.tree.add(CKind::F64(value));

                self.push_expr(node);
            }

            // Locals and globals.
            LocalGet => {
                let name = self.local_name_for(instruction.index_value().unwrap_or(0));
                let node = self.tree.add(CKind::NameUse(name));

                self.push_expr(node);
            }
            LocalSet => {
                let name = self.local_name_for(instruction.index_value().unwrap_or(0));
                let value = self.pop_expr();
                let assignment = self.assign(&name, value);

                self.tree.link(assignment, compound);
            }
            LocalTee => {
                let name = self.local_name_for(instruction.index_value().unwrap_or(0));
                let value = self.pop_expr();
                let assignment = self.assign(&name, value);

                self.tree.link(assignment, compound);

                let read = self.tree.add(CKind::NameUse(name));
                self.push_expr(read);
            }
            GlobalGet => {
                let name = names::global_name(self.module, instruction.index_value().unwrap_or(0));
                let node = self.tree.add(CKind::NameUse(name));

                self.push_expr(node);
            }
            GlobalSet => {
                let name = names::global_name(self.module, instruction.index_value().unwrap_or(0));
                let value = self.pop_expr();
                let assignment = self.assign(&name, value);

                self.tree.link(assignment, compound);
            }

            // Parametric.
            Drop => {
                let value = self.pop_expr();

                self.tree.link(value, compound);
            }
            Select => {
                let condition = self.pop_expr();
                let otherwise = self.pop_expr();
                let consequent = self.pop_expr();
                let node = self.tree.add(CKind::Ternary);

                self.tree.link(condition, node);
                self.tree.link(consequent, node);
                self.tree.link(otherwise, node);
                self.push_expr(node);
            }

            // Calls.
            Call | ReturnCall => {
                let index = instruction.index_value().unwrap_or(0);

                self.generate_call(compound, index);

                if instruction.opcode == ReturnCall {
                    self.generate_return(compound);
                    self.skip_unreachable();
                }
            }
            CallIndirect | ReturnCallIndirect => {
                self.generate_call_indirect(compound, instruction);

                if instruction.opcode == ReturnCallIndirect {
                    self.generate_return(compound);
                    self.skip_unreachable();
                }
            }

            // Memory.
            I32Load => self.load("loadI32", instruction),
            I64Load => self.load("loadI64", instruction),
            F32Load => self.load("loadF32", instruction),
            F64Load => self.load("loadF64", instruction),
            I32Load8S => self.load("loadI32I8", instruction),
            I32Load8U => self.load("loadI32U8", instruction),
            I32Load16S => self.load("loadI32I16", instruction),
            I32Load16U => self.load("loadI32U16", instruction),
            I64Load8S => self.load("loadI64I8", instruction),
            I64Load8U => self.load("loadI64U8", instruction),
            I64Load16S => self.load("loadI64I16", instruction),
            I64Load16U => self.load("loadI64U16", instruction),
            I64Load32S => self.load("loadI64I32", instruction),
            I64Load32U => self.load("loadI64U32", instruction),
            I32Store => self.store("storeI32", compound, instruction),
            I64Store => self.store("storeI64", compound, instruction),
            F32Store => self.store("storeF32", compound, instruction),
            F64Store => self.store("storeF64", compound, instruction),
            I32Store8 => self.store("storeI32I8", compound, instruction),
            I32Store16 => self.store("storeI32I16", compound, instruction),
            I64Store8 => self.store("storeI64I8", compound, instruction),
            I64Store16 => self.store("storeI64I16", compound, instruction),
            I64Store32 => self.store("storeI64I32", compound, instruction),
            MemorySize => {
                let name = names::memory_name(self.module, 0);
                let node = self.tree.add(CKind::NameUse(format!("{}.pageCount", name)));

                self.push_expr(node);
            }
            MemoryGrow => {
                let delta = self.pop_expr();
                let memory = self.memory_argument();
                let call = self.tree.add(CKind::Call {
                    name: "growMemory".to_string(),
                });

                self.tree.link(memory, call);
                self.tree.link(delta, call);
                self.push_expr(call);
            }

            // i32 comparisons.
            I32Eqz => self.unary("!"),
            I32Eq => self.binary("=="),
            I32Ne => self.binary("!="),
            I32LtS => self.binary("<"),
            I32LtU => self.compare_unsigned("<", "uint32_t"),
            I32GtS => self.binary(">"),
            I32GtU => self.compare_unsigned(">", "uint32_t"),
            I32LeS => self.binary("<="),
            I32LeU => self.compare_unsigned("<=", "uint32_t"),
            I32GeS => self.binary(">="),
            I32GeU => self.compare_unsigned(">=", "uint32_t"),

            // i64 comparisons.
            I64Eqz => self.unary("!"),
            I64Eq => self.binary("=="),
            I64Ne => self.binary("!="),
            I64LtS => self.binary("<"),
            I64LtU => self.compare_unsigned("<", "uint64_t"),
            I64GtS => self.binary(">"),
            I64GtU => self.compare_unsigned(">", "uint64_t"),
            I64LeS => self.binary("<="),
            I64LeU => self.compare_unsigned("<=", "uint64_t"),
            I64GeS => self.binary(">="),
            I64GeU => self.compare_unsigned(">=", "uint64_t"),

            // f32/f64 comparisons.
            F32Eq | F64Eq => self.binary("=="),
            F32Ne | F64Ne => self.binary("!="),
            F32Lt | F64Lt => self.binary("<"),
            F32Gt | F64Gt => self.binary(">"),
            F32Le | F64Le => self.binary("<="),
            F32Ge | F64Ge => self.binary(">="),

            // i32 arithmetic.
            I32Clz => self.call_helper("clz32", 1),
            I32Ctz => self.call_helper("ctz32", 1),
            I32Popcnt => self.call_helper("popcnt32", 1),
            I32Add => self.binary("+"),
            I32Sub => self.binary("-"),
            I32Mul => self.binary("*"),
            I32DivS => self.binary("/"),
            I32DivU => self.binary_unsigned("/", "uint32_t", "int32_t"),
            I32RemS => self.binary("%"),
            I32RemU => self.binary_unsigned("%", "uint32_t", "int32_t"),
            I32And => self.binary("&"),
            I32Or => self.binary("|"),
            I32Xor => self.binary("^"),
            I32Shl => self.binary("<<"),
            I32ShrS => self.binary(">>"),
            I32ShrU => self.binary_unsigned(">>", "uint32_t", "int32_t"),
            I32Rotl => self.call_helper("rotl32", 2),
            I32Rotr => self.call_helper("rotr32", 2),

            // i64 arithmetic.
            I64Clz => self.call_helper("clz64", 1),
            I64Ctz => self.call_helper("ctz64", 1),
            I64Popcnt => self.call_helper("popcnt64", 1),
            I64Add => self.binary("+"),
            I64Sub => self.binary("-"),
            I64Mul => self.binary("*"),
            I64DivS => self.binary("/"),
            I64DivU => self.binary_unsigned("/", "uint64_t", "int64_t"),
            I64RemS => self.binary("%"),
            I64RemU => self.binary_unsigned("%", "uint64_t", "int64_t"),
            I64And => self.binary("&"),
            I64Or => self.binary("|"),
            I64Xor => self.binary("^"),
            I64Shl => self.binary("<<"),
            I64ShrS => self.binary(">>"),
            I64ShrU => self.binary_unsigned(">>", "uint64_t", "int64_t"),
            I64Rotl => self.call_helper("rotl64", 2),
            I64Rotr => self.call_helper("rotr64", 2),

            // f32 arithmetic.
            F32Abs => self.call_helper("fabsf", 1),
            F32Neg => self.unary("-"),
            F32Ceil => self.call_helper("ceilf", 1),
            F32Floor => self.call_helper("floorf", 1),
            F32Trunc => self.call_helper("truncf", 1),
            F32Nearest => self.call_helper("rintf", 1),
            F32Sqrt => self.call_helper("sqrtf", 1),
            F32Add => self.binary("+"),
            F32Sub => self.binary("-"),
            F32Mul => self.binary("*"),
            F32Div => self.binary("/"),
            F32Min => self.call_helper("fminf", 2),
            F32Max => self.call_helper("fmaxf", 2),
            F32Copysign => self.call_helper("copysignf", 2),

            // f64 arithmetic.
            F64Abs => self.call_helper("fabs", 1),
            F64Neg => self.unary("-"),
            F64Ceil => self.call_helper("ceil", 1),
            F64Floor => self.call_helper("floor", 1),
            F64Trunc => self.call_helper("trunc", 1),
            F64Nearest => self.call_helper("rint", 1),
            F64Sqrt => self.call_helper("sqrt", 1),
            F64Add => self.binary("+"),
            F64Sub => self.binary("-"),
            F64Mul => self.binary("*"),
            F64Div => self.binary("/"),
            F64Min => self.call_helper("fmin", 2),
            F64Max => self.call_helper("fmax", 2),
            F64Copysign => self.call_helper("copysign", 2),

            // Conversions.
            I32WrapI64 => self.cast("int32_t"),
            I32TruncF32S | I32TruncF64S => self.cast("int32_t"),
            I32TruncF32U | I32TruncF64U => self.cast_via("int32_t", "uint32_t"),
            I64ExtendI32S => self.cast("int64_t"),
            I64ExtendI32U => self.cast_via("int64_t", "uint32_t"),
            I64TruncF32S | I64TruncF64S => self.cast("int64_t"),
            I64TruncF32U | I64TruncF64U => self.cast_via("int64_t", "uint64_t"),
            F32ConvertI32S | F32ConvertI64S => self.cast("float"),
            F32ConvertI32U => self.cast_via("float", "uint32_t"),
            F32ConvertI64U => self.cast_via("float", "uint64_t"),
            F32DemoteF64 => self.cast("float"),
            F64ConvertI32S | F64ConvertI64S => self.cast("double"),
            F64ConvertI32U => self.cast_via("double", "uint32_t"),
            F64ConvertI64U => self.cast_via("double", "uint64_t"),
            F64PromoteF32 => self.cast("double"),
            I32ReinterpretF32 => self.call_helper("reinterpretI32F32", 1),
            I64ReinterpretF64 => self.call_helper("reinterpretI64F64", 1),
            F32ReinterpretI32 => self.call_helper("reinterpretF32I32", 1),
            F64ReinterpretI64 => self.call_helper("reinterpretF64I64", 1),

            // Saturating truncations.
            I32TruncSatF32S => self.call_helper("satI32F32", 1),
            I32TruncSatF32U => self.call_helper("satU32F32", 1),
            I32TruncSatF64S => self.call_helper("satI32F64", 1),
            I32TruncSatF64U => self.call_helper("satU32F64", 1),
            I64TruncSatF32S => self.call_helper("satI64F32", 1),
            I64TruncSatF32U => self.call_helper("satU64F32", 1),
            I64TruncSatF64S => self.call_helper("satI64F64", 1),
            I64TruncSatF64U => self.call_helper("satU64F64", 1),

            // Sign extension.
            I32Extend8S => self.cast_via("int32_t", "int8_t"),
            I32Extend16S => self.cast_via("int32_t", "int16_t"),
            I64Extend8S => self.cast_via("int64_t", "int8_t"),
            I64Extend16S => self.cast_via("int64_t", "int16_t"),
            I64Extend32S => self.cast_via("int64_t", "int32_t"),

            // References.
            RefNull => {
                let node = self.tree.add(CKind::NameUse("NULL".to_string()));

                self.push_expr(node);
            }
            RefIsNull => {
                let value = self.pop_expr();
                let node = self.tree.add(CKind::Binary { op: "==" });
                let null = self.tree.add(CKind::NameUse("NULL".to_string()));

                self.tree.link(value, node);
                self.tree.link(null, node);
                self.push_expr(node);
            }
            RefFunc => {
                let index = instruction.index_value().unwrap_or(0);
                let node = self
                    .tree
                    .add(CKind::NameUse(names::function_name(self.module, index)));

                self.push_expr(node);
            }

            opcode => self.unsupported(format!("'{}'", opcode)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::parse_text;

    fn build(source: &str) -> (BuiltFunction, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let module = parse_text(source, &mut diagnostics);

        assert!(!diagnostics.has_errors(), "{}", diagnostics);

        let entry = &module.code_entries()[0];
        let built = BodyBuilder::new(&module, entry, &mut diagnostics).generate();

        (built, diagnostics)
    }

    #[test]
    fn add_one_builds_a_return_of_a_sum() {
        let (built, diagnostics) = build(
            "(module (func (param i32) (result i32)
               local.get 0
               i32.const 1
               i32.add))",
        );

        assert!(!diagnostics.has_errors(), "{}", diagnostics);

        // Body: a single return of p0 + 1.
        let statements: Vec<_> = built.tree.children(built.body).collect();

        assert_eq!(statements.len(), 1);
        assert_eq!(built.tree.kind(statements[0]), &CKind::Return);

        let sum = built.tree.first_child(statements[0]).unwrap();

        assert_eq!(built.tree.kind(sum), &CKind::Binary { op: "+" });
    }

    #[test]
    fn static_offsets_fold_into_constant_addresses() {
        let (built, diagnostics) = build(
            "(module
               (memory 1)
               (func (result i32)
                 (i32.load offset=16 (i32.const 4))))",
        );

        assert!(!diagnostics.has_errors(), "{}", diagnostics);

        let ret = built.tree.children(built.body).next().unwrap();
        let load = built.tree.first_child(ret).unwrap();

        match built.tree.kind(load) {
            CKind::Load { what, .. } => assert_eq!(*what, "loadI32"),
            other => panic!("expected a load, found {:?}", other),
        }

        let address = built.tree.first_child(load).unwrap();

        assert_eq!(built.tree.kind(address), &CKind::I32(20));
    }

    #[test]
    fn loops_place_their_label_in_front() {
        let (built, diagnostics) = build(
            "(module (func
               (loop $l
                 br $l)))",
        );

        assert!(!diagnostics.has_errors(), "{}", diagnostics);

        let statements: Vec<_> = built.tree.children(built.body).collect();

        // Label first, then the loop body compound.
        assert!(matches!(built.tree.kind(statements[0]), CKind::Label(_)));
        assert!(matches!(built.tree.kind(statements[1]), CKind::Compound));
    }

    #[test]
    fn unsupported_opcodes_are_reported() {
        let (_, diagnostics) = build(
            "(module
               (memory 1)
               (func (param i32)
                 (memory.fill (i32.const 0) (local.get 0) (i32.const 4))))",
        );

        assert!(diagnostics.has_errors());
        assert!(diagnostics
            .items()
            .iter()
            .any(|item| item.message.contains("not supported")));
    }
}
