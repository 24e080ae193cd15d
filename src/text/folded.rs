//! Regroups flat instruction streams into folded S-expressions for text
//! output: an instruction adopts as many of the immediately preceding
//! value-producing expressions as its operand count allows. When the count is
//! unknown (or the stack at this point is shorter), the instruction simply
//! folds fewer operands; the flat order is preserved either way, so the
//! regrouped form always denotes the same instruction sequence.

use crate::encodings::{Opcode, SignatureCode};
use crate::instruction::{Immediate, Instruction};
use crate::model::{Expression, Module};

/// A folded expression tree node.
#[derive(Clone, Debug)]
pub enum ExprS {
    Plain {
        instruction: Instruction,
        children: Vec<ExprS>,
    },
    Block {
        instruction: Instruction,
        body: Vec<ExprS>,
    },
    If {
        instruction: Instruction,
        condition: Vec<ExprS>,
        then_body: Vec<ExprS>,
        else_body: Option<Vec<ExprS>>,
    },
}

impl ExprS {
    /// Whether this node leaves a value available for folding into a later
    /// instruction. Conservative: blocks never fold.
    fn produces_value(&self, module: &Module) -> bool {
        match self {
            ExprS::Plain { instruction, .. } => match instruction.opcode.sig() {
                SignatureCode::Fixed { results, .. } => results.len() == 1,
                SignatureCode::Special => matches!(
                    instruction.opcode,
                    Opcode::LocalGet
                        | Opcode::LocalTee
                        | Opcode::GlobalGet
                        | Opcode::Select
                        | Opcode::RefNull
                        | Opcode::RefFunc
                        | Opcode::RefIsNull
                        | Opcode::TableGet
                        | Opcode::TableGrow
                ) || matches!(instruction.opcode, Opcode::Call
                        if call_results(instruction, module) == 1)
                    || matches!(instruction.opcode, Opcode::CallIndirect
                        if indirect_results(instruction, module) == 1),
            },
            _ => false,
        }
    }
}

fn call_results(instruction: &Instruction, module: &Module) -> usize {
    instruction
        .index_value()
        .and_then(|index| module.function(index))
        .map(|function| function.type_use.signature.results.len())
        .unwrap_or(0)
}

fn indirect_results(instruction: &Instruction, module: &Module) -> usize {
    match instruction.imm {
        Immediate::Indirect { type_index, .. } => module
            .signature(type_index)
            .map(|signature| signature.results.len())
            .unwrap_or(0),
        _ => 0,
    }
}

/// How many built expressions the instruction may adopt, when known.
fn operand_count(instruction: &Instruction, module: &Module) -> usize {
    match instruction.opcode.sig() {
        SignatureCode::Fixed { params, .. } => params.len(),
        SignatureCode::Special => match instruction.opcode {
            Opcode::Drop
            | Opcode::LocalSet
            | Opcode::LocalTee
            | Opcode::GlobalSet
            | Opcode::RefIsNull
            | Opcode::BrIf
            | Opcode::TableGet => 1,
            Opcode::Select | Opcode::TableFill => 3,
            Opcode::TableSet | Opcode::TableGrow => 2,
            Opcode::Call | Opcode::ReturnCall => instruction
                .index_value()
                .and_then(|index| module.function(index))
                .map(|function| function.type_use.signature.params.len())
                .unwrap_or(0),
            Opcode::CallIndirect | Opcode::ReturnCallIndirect => match instruction.imm {
                Immediate::Indirect { type_index, .. } => module
                    .signature(type_index)
                    .map(|signature| signature.params.len() + 1)
                    .unwrap_or(1),
                _ => 1,
            },
            _ => 0,
        },
    }
}

/// Folds a function body. The trailing structural `end` is dropped.
pub fn fold_expression(expression: &Expression, module: &Module) -> Vec<ExprS> {
    let mut folder = Folder {
        module,
        frames: vec![Frame::new(FrameKind::Body)],
    };

    for instruction in &expression.instructions {
        folder.feed(instruction);
    }

    folder.finish()
}

enum FrameKind {
    Body,
    Block(Instruction),
    Then(Instruction, Vec<ExprS>),
    Else(Instruction, Vec<ExprS>, Vec<ExprS>),
}

struct Frame {
    kind: FrameKind,
    items: Vec<ExprS>,
}

impl Frame {
    fn new(kind: FrameKind) -> Self {
        Frame {
            kind,
            items: Vec::new(),
        }
    }
}

struct Folder<'m> {
    module: &'m Module,
    frames: Vec<Frame>,
}

impl Folder<'_> {
    fn feed(&mut self, instruction: &Instruction) {
        match instruction.opcode {
            Opcode::Block | Opcode::Loop | Opcode::Try => {
                self.frames
                    .push(Frame::new(FrameKind::Block(instruction.clone())));
            }
            Opcode::If => {
                // The condition is the most recent value-producing sibling.
                let condition = self.pop_operands(1);

                self.frames
                    .push(Frame::new(FrameKind::Then(instruction.clone(), condition)));
            }
            Opcode::Else => {
                let frame = self.frames.pop().expect("else outside a frame");

                match frame.kind {
                    FrameKind::Then(if_instruction, condition) => {
                        self.frames.push(Frame::new(FrameKind::Else(
                            if_instruction,
                            condition,
                            frame.items,
                        )));
                    }
                    _ => {
                        // Stray else: keep it flat.
                        self.frames.push(frame);
                        self.push_plain(instruction.clone(), Vec::new());
                    }
                }
            }
            Opcode::End => {
                if self.frames.len() == 1 {
                    // The function body's structural end.
                    return;
                }

                let frame = self.frames.pop().unwrap();
                let closed = match frame.kind {
                    FrameKind::Block(block_instruction) => ExprS::Block {
                        instruction: block_instruction,
                        body: frame.items,
                    },
                    FrameKind::Then(if_instruction, condition) => ExprS::If {
                        instruction: if_instruction,
                        condition,
                        then_body: frame.items,
                        else_body: None,
                    },
                    FrameKind::Else(if_instruction, condition, then_body) => ExprS::If {
                        instruction: if_instruction,
                        condition,
                        then_body,
                        else_body: Some(frame.items),
                    },
                    FrameKind::Body => unreachable!(),
                };

                self.top().items.push(closed);
            }
            _ => {
                let count = operand_count(instruction, self.module);
                let children = self.pop_operands(count);

                self.push_plain(instruction.clone(), children);
            }
        }
    }

    fn top(&mut self) -> &mut Frame {
        self.frames.last_mut().unwrap()
    }

    fn push_plain(&mut self, instruction: Instruction, children: Vec<ExprS>) {
        self.top().items.push(ExprS::Plain {
            instruction,
            children,
        });
    }

    /// Takes up to `count` trailing value-producing siblings, in order.
    fn pop_operands(&mut self, count: usize) -> Vec<ExprS> {
        let module = self.module;
        let items = &mut self.frames.last_mut().unwrap().items;
        let mut taken = 0;

        while taken < count && taken < items.len() {
            let candidate = &items[items.len() - 1 - taken];

            if candidate.produces_value(module) {
                taken += 1;
            } else {
                break;
            }
        }

        items.split_off(items.len() - taken)
    }

    fn finish(mut self) -> Vec<ExprS> {
        // Unclosed frames flatten back out in order.
        while self.frames.len() > 1 {
            let frame = self.frames.pop().unwrap();
            let items = frame.items;

            match frame.kind {
                FrameKind::Block(instruction) => {
                    self.top().items.push(ExprS::Block {
                        instruction,
                        body: items,
                    });
                }
                FrameKind::Then(instruction, condition) => {
                    self.top().items.push(ExprS::If {
                        instruction,
                        condition,
                        then_body: items,
                        else_body: None,
                    });
                }
                FrameKind::Else(instruction, condition, then_body) => {
                    self.top().items.push(ExprS::If {
                        instruction,
                        condition,
                        then_body,
                        else_body: Some(items),
                    });
                }
                FrameKind::Body => unreachable!(),
            }
        }

        self.frames.pop().unwrap().items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encodings::Opcode;

    fn fold(instructions: Vec<Instruction>) -> Vec<ExprS> {
        let module = Module::new();

        fold_expression(&Expression::new(instructions), &module)
    }

    #[test]
    fn binary_operator_adopts_both_constants() {
        let folded = fold(vec![
            Instruction::i32_const(1),
            Instruction::i32_const(2),
            Instruction::plain(Opcode::I32Add),
            Instruction::plain(Opcode::End),
        ]);

        assert_eq!(folded.len(), 1);

        match &folded[0] {
            ExprS::Plain {
                instruction,
                children,
            } => {
                assert_eq!(instruction.opcode, Opcode::I32Add);
                assert_eq!(children.len(), 2);
            }
            _ => panic!("expected a folded i32.add"),
        }
    }

    #[test]
    fn shortfall_folds_partially() {
        // Only one operand is in reach; i32.add folds just that one.
        let folded = fold(vec![
            Instruction::plain(Opcode::Drop),
            Instruction::i32_const(2),
            Instruction::plain(Opcode::I32Add),
            Instruction::plain(Opcode::End),
        ]);

        assert_eq!(folded.len(), 2);

        match &folded[1] {
            ExprS::Plain { children, .. } => assert_eq!(children.len(), 1),
            _ => panic!("expected a partially folded i32.add"),
        }
    }

    #[test]
    fn if_captures_condition_and_arms() {
        use crate::instruction::{BlockType, Immediate};

        let folded = fold(vec![
            Instruction::i32_const(1),
            Instruction::new(
                Opcode::If,
                Immediate::Block {
                    block_type: BlockType::Void,
                    label: None,
                },
            ),
            Instruction::plain(Opcode::Nop),
            Instruction::plain(Opcode::Else),
            Instruction::plain(Opcode::Unreachable),
            Instruction::plain(Opcode::End),
            Instruction::plain(Opcode::End),
        ]);

        assert_eq!(folded.len(), 1);

        match &folded[0] {
            ExprS::If {
                condition,
                then_body,
                else_body,
                ..
            } => {
                assert_eq!(condition.len(), 1);
                assert_eq!(then_body.len(), 1);
                assert_eq!(else_body.as_ref().map(Vec::len), Some(1));
            }
            _ => panic!("expected a folded if"),
        }
    }
}
