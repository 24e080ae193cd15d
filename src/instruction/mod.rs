//! The instruction representation: one opcode, a source line, and a tagged
//! immediate payload, with the wire codec for both directions.
//!
//! Text parsing and printing live with the text front end; this module owns
//! the shapes and the binary encoding.

mod errors;

pub use errors::InstructionError;

use crate::buffer::DataBuffer;
use crate::encodings::{ImmediateKind, Opcode, ValueType};

/// The declared signature of a structured control-flow block.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum BlockType {
    Void,
    Value(ValueType),
    TypeIndex(u32),
}

impl BlockType {
    /// The signed LEB the binary format spells this block type as.
    pub fn code(self) -> i64 {
        match self {
            BlockType::Void => ValueType::Void.code() as i64,
            BlockType::Value(kind) => kind.code() as i64,
            BlockType::TypeIndex(index) => index as i64,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        if code >= 0 {
            Some(BlockType::TypeIndex(code as u32))
        } else if code == ValueType::Void.code() as i64 {
            Some(BlockType::Void)
        } else {
            i32::try_from(code)
                .ok()
                .and_then(ValueType::from_code)
                .filter(|kind| kind.is_concrete())
                .map(BlockType::Value)
        }
    }
}

/// The immediate payload of an instruction, one variant per wire shape.
#[derive(Clone, Debug, PartialEq)]
pub enum Immediate {
    None,
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    V128([u8; 16]),
    Block {
        block_type: BlockType,
        label: Option<String>,
    },
    /// A single index: label, function, local, global, segment, element,
    /// table, or event, depending on the opcode.
    Index(u32),
    BrTable {
        targets: Vec<u32>,
        default: u32,
    },
    Memory {
        align: u32,
        offset: u32,
    },
    /// Two indices (`table.init`: element then table; `table.copy`:
    /// destination then source).
    IndexPair(u32, u32),
    Indirect {
        type_index: u32,
        table_index: u32,
    },
    Lane(u8),
    MemoryLane {
        align: u32,
        offset: u32,
        lane: u8,
    },
    Shuffle([u8; 16]),
}

/// One decoded instruction. The line is zero for binary input.
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub line: u32,
    pub imm: Immediate,
}

impl Instruction {
    pub fn new(opcode: Opcode, imm: Immediate) -> Self {
        Instruction {
            opcode,
            line: 0,
            imm,
        }
    }

    pub fn plain(opcode: Opcode) -> Self {
        Instruction::new(opcode, Immediate::None)
    }

    pub fn i32_const(value: i32) -> Self {
        Instruction::new(Opcode::I32Const, Immediate::I32(value))
    }

    pub fn i64_const(value: i64) -> Self {
        Instruction::new(Opcode::I64Const, Immediate::I64(value))
    }

    pub fn f32_const(value: f32) -> Self {
        Instruction::new(Opcode::F32Const, Immediate::F32(value))
    }

    pub fn f64_const(value: f64) -> Self {
        Instruction::new(Opcode::F64Const, Immediate::F64(value))
    }

    pub fn index(opcode: Opcode, index: u32) -> Self {
        Instruction::new(opcode, Immediate::Index(index))
    }

    pub fn at(mut self, line: u32) -> Self {
        self.line = line;
        self
    }

    /// The single index payload, when there is one.
    pub fn index_value(&self) -> Option<u32> {
        match self.imm {
            Immediate::Index(index) => Some(index),
            _ => None,
        }
    }

    /// Decodes the opcode and immediates at the buffer's cursor.
    pub fn read(buffer: &mut DataBuffer) -> Result<Instruction, InstructionError> {
        let opcode = read_opcode(buffer)?;
        let imm = read_immediate(opcode, buffer)?;

        Ok(Instruction::new(opcode, imm))
    }

    /// Encodes the opcode and immediates.
    pub fn write(&self, buffer: &mut DataBuffer) {
        write_opcode(self.opcode, buffer);
        write_immediate(self, buffer);
    }
}

fn read_opcode(buffer: &mut DataBuffer) -> Result<Opcode, InstructionError> {
    let primary = buffer.get_u8()?;

    match primary {
        0xFC | 0xFD | 0xFE => {
            let secondary = buffer.get_u32_leb()?;

            Opcode::from_prefixed(primary, secondary)
                .ok_or(InstructionError::UnknownPrefixedOpcode(primary, secondary))
        }
        _ => Opcode::from_code(primary as u32)
            .ok_or(InstructionError::UnknownOpcode(primary as u32)),
    }
}

fn write_opcode(opcode: Opcode, buffer: &mut DataBuffer) {
    match opcode.prefix() {
        Some(prefix) => {
            buffer.put_u8(prefix);
            buffer.put_u32_leb(opcode.secondary());
        }
        None => buffer.put_u8(opcode.secondary() as u8),
    }
}

fn read_zero(buffer: &mut DataBuffer) -> Result<(), InstructionError> {
    let byte = buffer.get_u8()?;

    if byte != 0 {
        return Err(InstructionError::NonZeroReserved(byte));
    }

    Ok(())
}

fn read_lane(buffer: &mut DataBuffer, limit: u8) -> Result<u8, InstructionError> {
    let lane = buffer.get_u8()?;

    if lane >= limit {
        return Err(InstructionError::LaneOutOfRange(lane, limit));
    }

    Ok(lane)
}

fn read_immediate(opcode: Opcode, buffer: &mut DataBuffer) -> Result<Immediate, InstructionError> {
    let kind = opcode.imm();

    Ok(match kind {
        ImmediateKind::None => Immediate::None,
        ImmediateKind::I32 => Immediate::I32(buffer.get_i32_leb()?),
        ImmediateKind::I64 => Immediate::I64(buffer.get_i64_leb()?),
        ImmediateKind::F32 => Immediate::F32(buffer.get_f32()?),
        ImmediateKind::F64 => Immediate::F64(buffer.get_f64()?),
        ImmediateKind::V128 => {
            let bytes: [u8; 16] = buffer.get_bytes(16)?.try_into().unwrap();

            Immediate::V128(bytes)
        }
        ImmediateKind::Block => {
            let code = buffer.get_i64_leb()?;
            let block_type =
                BlockType::from_code(code).ok_or(InstructionError::InvalidBlockType(code))?;

            Immediate::Block {
                block_type,
                label: None,
            }
        }
        ImmediateKind::Idx
        | ImmediateKind::LocalIdx
        | ImmediateKind::GlobalIdx
        | ImmediateKind::FunctionIdx
        | ImmediateKind::LabelIdx => Immediate::Index(buffer.get_u32_leb()?),
        ImmediateKind::Table => {
            let count = buffer.get_u32_leb()?;
            let mut targets = Vec::with_capacity(count as usize);

            for _ in 0..count {
                targets.push(buffer.get_u32_leb()?);
            }

            Immediate::BrTable {
                targets,
                default: buffer.get_u32_leb()?,
            }
        }
        ImmediateKind::Memory => Immediate::Memory {
            align: buffer.get_u32_leb()?,
            offset: buffer.get_u32_leb()?,
        },
        ImmediateKind::Memory0 => {
            read_zero(buffer)?;

            Immediate::None
        }
        ImmediateKind::ZeroZero => {
            read_zero(buffer)?;
            read_zero(buffer)?;

            Immediate::None
        }
        ImmediateKind::IdxZero => {
            let index = buffer.get_u32_leb()?;
            read_zero(buffer)?;

            Immediate::Index(index)
        }
        ImmediateKind::IdxIdx => {
            Immediate::IndexPair(buffer.get_u32_leb()?, buffer.get_u32_leb()?)
        }
        ImmediateKind::Indirect => Immediate::Indirect {
            type_index: buffer.get_u32_leb()?,
            table_index: buffer.get_u32_leb()?,
        },
        ImmediateKind::Lane2
        | ImmediateKind::Lane4
        | ImmediateKind::Lane8
        | ImmediateKind::Lane16 => {
            Immediate::Lane(read_lane(buffer, kind.lane_count().unwrap())?)
        }
        ImmediateKind::MemoryLane2
        | ImmediateKind::MemoryLane4
        | ImmediateKind::MemoryLane8
        | ImmediateKind::MemoryLane16 => {
            let align = buffer.get_u32_leb()?;
            let offset = buffer.get_u32_leb()?;
            let lane = read_lane(buffer, kind.lane_count().unwrap())?;

            Immediate::MemoryLane {
                align,
                offset,
                lane,
            }
        }
        ImmediateKind::Shuffle => {
            let mut lanes = [0u8; 16];

            for lane in &mut lanes {
                *lane = read_lane(buffer, 32)?;
            }

            Immediate::Shuffle(lanes)
        }
    })
}

fn write_immediate(instruction: &Instruction, buffer: &mut DataBuffer) {
    match &instruction.imm {
        Immediate::None => match instruction.opcode.imm() {
            ImmediateKind::Memory0 => buffer.put_u8(0),
            ImmediateKind::ZeroZero => {
                buffer.put_u8(0);
                buffer.put_u8(0);
            }
            _ => {}
        },
        Immediate::I32(value) => buffer.put_i32_leb(*value),
        Immediate::I64(value) => buffer.put_i64_leb(*value),
        Immediate::F32(value) => buffer.put_f32(*value),
        Immediate::F64(value) => buffer.put_f64(*value),
        Immediate::V128(bytes) => buffer.put_bytes(bytes),
        Immediate::Block { block_type, .. } => buffer.put_i64_leb(block_type.code()),
        Immediate::Index(index) => {
            buffer.put_u32_leb(*index);

            if instruction.opcode.imm() == ImmediateKind::IdxZero {
                buffer.put_u8(0);
            }
        }
        Immediate::BrTable { targets, default } => {
            buffer.put_u32_leb(targets.len() as u32);

            for target in targets {
                buffer.put_u32_leb(*target);
            }

            buffer.put_u32_leb(*default);
        }
        Immediate::Memory { align, offset } => {
            buffer.put_u32_leb(*align);
            buffer.put_u32_leb(*offset);
        }
        Immediate::IndexPair(first, second) => {
            buffer.put_u32_leb(*first);
            buffer.put_u32_leb(*second);
        }
        Immediate::Indirect {
            type_index,
            table_index,
        } => {
            buffer.put_u32_leb(*type_index);
            buffer.put_u32_leb(*table_index);
        }
        Immediate::Lane(lane) => buffer.put_u8(*lane),
        Immediate::MemoryLane {
            align,
            offset,
            lane,
        } => {
            buffer.put_u32_leb(*align);
            buffer.put_u32_leb(*offset);
            buffer.put_u8(*lane);
        }
        Immediate::Shuffle(lanes) => buffer.put_bytes(lanes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(instruction: Instruction) -> Instruction {
        let mut buffer = DataBuffer::new();
        instruction.write(&mut buffer);

        let mut buffer = DataBuffer::of(buffer.into_vec());
        let decoded = Instruction::read(&mut buffer).unwrap();

        assert!(buffer.at_end());
        decoded
    }

    #[test]
    fn plain_instruction_is_one_byte() {
        let mut buffer = DataBuffer::new();
        Instruction::plain(Opcode::I32Add).write(&mut buffer);

        assert_eq!(buffer.as_slice(), &[0x6A]);
    }

    #[test]
    fn constants_round_trip() {
        for value in [0, 1, -1, i32::MIN, i32::MAX] {
            assert_eq!(
                round_trip(Instruction::i32_const(value)),
                Instruction::i32_const(value)
            );
        }

        assert_eq!(
            round_trip(Instruction::i64_const(i64::MIN)),
            Instruction::i64_const(i64::MIN)
        );
    }

    #[test]
    fn local_get_encoding() {
        let mut buffer = DataBuffer::new();
        Instruction::index(Opcode::LocalGet, 0).write(&mut buffer);

        assert_eq!(buffer.as_slice(), &[0x20, 0x00]);
    }

    #[test]
    fn memory_immediates_round_trip() {
        let load = Instruction::new(
            Opcode::I32Load,
            Immediate::Memory {
                align: 2,
                offset: 1024,
            },
        );

        assert_eq!(round_trip(load.clone()), load);
    }

    #[test]
    fn memory_size_reserved_byte() {
        let mut buffer = DataBuffer::new();
        Instruction::plain(Opcode::MemorySize).write(&mut buffer);

        assert_eq!(buffer.as_slice(), &[0x3F, 0x00]);

        let mut buffer = DataBuffer::of(vec![0x3F, 0x01]);

        assert_eq!(
            Instruction::read(&mut buffer),
            Err(InstructionError::NonZeroReserved(1))
        );
    }

    #[test]
    fn memory_init_has_trailing_zero() {
        let mut buffer = DataBuffer::new();
        Instruction::index(Opcode::MemoryInit, 3).write(&mut buffer);

        assert_eq!(buffer.as_slice(), &[0xFC, 0x08, 0x03, 0x00]);
    }

    #[test]
    fn br_table_round_trips() {
        let table = Instruction::new(
            Opcode::BrTable,
            Immediate::BrTable {
                targets: vec![0, 1, 2],
                default: 3,
            },
        );

        assert_eq!(round_trip(table.clone()), table);
    }

    #[test]
    fn block_types_round_trip() {
        for block_type in [
            BlockType::Void,
            BlockType::Value(ValueType::I32),
            BlockType::TypeIndex(7),
        ] {
            let block = Instruction::new(
                Opcode::Block,
                Immediate::Block {
                    block_type,
                    label: None,
                },
            );

            assert_eq!(round_trip(block.clone()), block);
        }
    }

    #[test]
    fn void_block_type_is_0x40() {
        let mut buffer = DataBuffer::new();
        let block = Instruction::new(
            Opcode::Block,
            Immediate::Block {
                block_type: BlockType::Void,
                label: None,
            },
        );
        block.write(&mut buffer);

        assert_eq!(buffer.as_slice(), &[0x02, 0x40]);
    }

    #[test]
    fn simd_shuffle_lanes_are_checked() {
        let mut bytes = vec![0xFD, 0x0D];
        bytes.extend([32u8; 16]);

        let mut buffer = DataBuffer::of(bytes);

        assert_eq!(
            Instruction::read(&mut buffer),
            Err(InstructionError::LaneOutOfRange(32, 32))
        );
    }

    #[test]
    fn prefixed_opcode_round_trips() {
        let sat = Instruction::plain(Opcode::I32TruncSatF32S);

        assert_eq!(round_trip(sat.clone()), sat);

        let mut buffer = DataBuffer::new();
        sat.write(&mut buffer);

        assert_eq!(buffer.as_slice(), &[0xFC, 0x00]);
    }

    #[test]
    fn unknown_opcode_is_reported() {
        let mut buffer = DataBuffer::of(vec![0x0A]);

        assert_eq!(
            Instruction::read(&mut buffer),
            Err(InstructionError::UnknownOpcode(0x0A))
        );
    }
}
