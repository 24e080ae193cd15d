//! The opcode table: textual name, wire encoding, immediate shape, stack
//! signature, and natural alignment for every instruction.
//!
//! Prefixed pages (0xFC saturating/bulk, 0xFD SIMD, 0xFE threads) are folded
//! into a single `u32` code: plain opcodes are their byte, prefixed opcodes
//! are `prefix << 16 | secondary`. Two lazily-built indexes answer name ->
//! opcode and code -> opcode queries.

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;

use super::ValueType;

/// The shape of the immediate bytes following an opcode.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ImmediateKind {
    /// Nothing follows the opcode.
    None,
    /// A signed 32-bit LEB.
    I32,
    /// A signed 64-bit LEB.
    I64,
    /// Four raw IEEE-754 bytes.
    F32,
    /// Eight raw IEEE-754 bytes.
    F64,
    /// Sixteen raw bytes.
    V128,
    /// A block type: `void`, a value type, or a type index.
    Block,
    /// A single unsigned LEB index (segment, element, table, event).
    Idx,
    LocalIdx,
    GlobalIdx,
    FunctionIdx,
    LabelIdx,
    /// `br_table`: a vector of label indices plus a default.
    Table,
    /// Alignment exponent then offset.
    Memory,
    /// A single mandatory zero byte (reserved index).
    Memory0,
    /// Two mandatory zero bytes (`memory.copy`).
    ZeroZero,
    /// An unsigned LEB index followed by a zero byte (`memory.init`).
    IdxZero,
    /// Two unsigned LEB indices (`table.init`, `table.copy`).
    IdxIdx,
    /// `call_indirect`: a type index plus a table index.
    Indirect,
    /// A lane index below the given lane count.
    Lane2,
    Lane4,
    Lane8,
    Lane16,
    /// Alignment/offset plus a lane index.
    MemoryLane2,
    MemoryLane4,
    MemoryLane8,
    MemoryLane16,
    /// Sixteen lane indices below 32.
    Shuffle,
}

impl ImmediateKind {
    /// The lane count for lane-indexed immediates.
    pub fn lane_count(self) -> Option<u8> {
        match self {
            ImmediateKind::Lane2 | ImmediateKind::MemoryLane2 => Some(2),
            ImmediateKind::Lane4 | ImmediateKind::MemoryLane4 => Some(4),
            ImmediateKind::Lane8 | ImmediateKind::MemoryLane8 => Some(8),
            ImmediateKind::Lane16 | ImmediateKind::MemoryLane16 => Some(16),
            _ => None,
        }
    }

    pub fn has_memarg(self) -> bool {
        matches!(
            self,
            ImmediateKind::Memory
                | ImmediateKind::MemoryLane2
                | ImmediateKind::MemoryLane4
                | ImmediateKind::MemoryLane8
                | ImmediateKind::MemoryLane16
        )
    }
}

/// The stack effect of an instruction: a fixed pop/push vector, or `Special`
/// when the validator must consult context (calls, branches, locals, ...).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SignatureCode {
    Fixed {
        params: &'static [ValueType],
        results: &'static [ValueType],
    },
    Special,
}

/// The fixed-signature catalogue, named result-first the way the opcode
/// table reads: `I32__F32_F32` pops two `f32` and pushes one `i32`.
pub mod sig {
    use super::SignatureCode;
    use crate::encodings::ValueType::*;

    macro_rules! fixed {
        ($name:ident, [$($param:expr),*], [$($result:expr),*]) => {
            pub const $name: SignatureCode = SignatureCode::Fixed {
                params: &[$($param),*],
                results: &[$($result),*],
            };
        };
    }

    pub const SPECIAL: SignatureCode = SignatureCode::Special;

    fixed!(VOID_, [], []);
    fixed!(I32_, [], [I32]);
    fixed!(I64_, [], [I64]);
    fixed!(F32_, [], [F32]);
    fixed!(F64_, [], [F64]);
    fixed!(V128_, [], [V128]);

    fixed!(I32__I32, [I32], [I32]);
    fixed!(I32__I64, [I64], [I32]);
    fixed!(I32__F32, [F32], [I32]);
    fixed!(I32__F64, [F64], [I32]);
    fixed!(I32__I32_I32, [I32, I32], [I32]);
    fixed!(I32__I64_I64, [I64, I64], [I32]);
    fixed!(I32__F32_F32, [F32, F32], [I32]);
    fixed!(I32__F64_F64, [F64, F64], [I32]);

    fixed!(I64__I32, [I32], [I64]);
    fixed!(I64__I64, [I64], [I64]);
    fixed!(I64__F32, [F32], [I64]);
    fixed!(I64__F64, [F64], [I64]);
    fixed!(I64__I64_I64, [I64, I64], [I64]);

    fixed!(F32__I32, [I32], [F32]);
    fixed!(F32__I64, [I64], [F32]);
    fixed!(F32__F32, [F32], [F32]);
    fixed!(F32__F64, [F64], [F32]);
    fixed!(F32__F32_F32, [F32, F32], [F32]);

    fixed!(F64__I32, [I32], [F64]);
    fixed!(F64__I64, [I64], [F64]);
    fixed!(F64__F32, [F32], [F64]);
    fixed!(F64__F64, [F64], [F64]);
    fixed!(F64__F64_F64, [F64, F64], [F64]);

    fixed!(VOID__I32_I32, [I32, I32], []);
    fixed!(VOID__I32_I64, [I32, I64], []);
    fixed!(VOID__I32_F32, [I32, F32], []);
    fixed!(VOID__I32_F64, [I32, F64], []);
    fixed!(VOID__I32_I32_I32, [I32, I32, I32], []);

    fixed!(I32__V128, [V128], [I32]);
    fixed!(I64__V128, [V128], [I64]);
    fixed!(F32__V128, [V128], [F32]);
    fixed!(F64__V128, [V128], [F64]);
    fixed!(V128__I32, [I32], [V128]);
    fixed!(V128__I64, [I64], [V128]);
    fixed!(V128__F32, [F32], [V128]);
    fixed!(V128__F64, [F64], [V128]);
    fixed!(V128__V128, [V128], [V128]);
    fixed!(V128__V128_I32, [V128, I32], [V128]);
    fixed!(V128__V128_I64, [V128, I64], [V128]);
    fixed!(V128__V128_F32, [V128, F32], [V128]);
    fixed!(V128__V128_F64, [V128, F64], [V128]);
    fixed!(V128__V128_V128, [V128, V128], [V128]);
    fixed!(V128__V128_V128_V128, [V128, V128, V128], [V128]);
    fixed!(V128__I32_V128, [I32, V128], [V128]);
    fixed!(VOID__I32_V128, [I32, V128], []);

    fixed!(I32__I32_I32_I32, [I32, I32, I32], [I32]);
    fixed!(I32__I32_I32_I64, [I32, I32, I64], [I32]);
    fixed!(I32__I32_I64_I64, [I32, I64, I64], [I32]);
    fixed!(I64__I32_I64, [I32, I64], [I64]);
    fixed!(I64__I32_I64_I64, [I32, I64, I64], [I64]);
}

/// Everything the table knows about one opcode.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OpcodeInfo {
    pub name: &'static str,
    pub code: u32,
    pub imm: ImmediateKind,
    pub sig: SignatureCode,
    /// Natural alignment exponent for memory-access opcodes, zero otherwise.
    pub align: u32,
}

macro_rules! opcodes {
    ($($variant:ident = $code:expr => $name:literal, $imm:ident, $sig:expr, $align:expr;)*) => {
        /// Every recognised opcode, named after its textual form.
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        #[repr(u32)]
        pub enum Opcode {
            $($variant = $code,)*
        }

        impl Opcode {
            pub fn info(self) -> &'static OpcodeInfo {
                match self {
                    $(
                        Opcode::$variant => &OpcodeInfo {
                            name: $name,
                            code: $code,
                            imm: ImmediateKind::$imm,
                            sig: $sig,
                            align: $align,
                        },
                    )*
                }
            }
        }

        lazy_static! {
            static ref BY_NAME: HashMap<&'static str, Opcode> = {
                let mut map = HashMap::new();
                $(map.insert($name, Opcode::$variant);)*
                map
            };

            static ref BY_CODE: HashMap<u32, Opcode> = {
                let mut map = HashMap::new();
                $(map.insert($code, Opcode::$variant);)*
                map
            };
        }
    };
}

impl Opcode {
    /// The multi-byte page prefix, when there is one.
    pub fn prefix(self) -> Option<u8> {
        let code = self.info().code;

        if code > 0xFF {
            Some((code >> 16) as u8)
        } else {
            None
        }
    }

    /// The in-page code: the primary byte for plain opcodes, the LEB-encoded
    /// secondary for prefixed ones.
    pub fn secondary(self) -> u32 {
        self.info().code & 0xFFFF
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn imm(self) -> ImmediateKind {
        self.info().imm
    }

    pub fn sig(self) -> SignatureCode {
        self.info().sig
    }

    /// Natural alignment exponent for memory-access opcodes.
    pub fn align(self) -> u32 {
        self.info().align
    }

    pub fn from_name(name: &str) -> Option<Opcode> {
        BY_NAME.get(name).copied()
    }

    /// Looks up a combined code: plain byte, or `prefix << 16 | secondary`.
    pub fn from_code(code: u32) -> Option<Opcode> {
        BY_CODE.get(&code).copied()
    }

    pub fn from_prefixed(prefix: u8, secondary: u32) -> Option<Opcode> {
        Opcode::from_code((prefix as u32) << 16 | secondary)
    }

    pub fn is_block_start(self) -> bool {
        matches!(self, Opcode::Block | Opcode::Loop | Opcode::If | Opcode::Try)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

use sig::*;

opcodes! {
    // Control.
    Unreachable = 0x00 => "unreachable", None, SPECIAL, 0;
    Nop = 0x01 => "nop", None, VOID_, 0;
    Block = 0x02 => "block", Block, SPECIAL, 0;
    Loop = 0x03 => "loop", Block, SPECIAL, 0;
    If = 0x04 => "if", Block, SPECIAL, 0;
    Else = 0x05 => "else", None, SPECIAL, 0;
    Try = 0x06 => "try", Block, SPECIAL, 0;
    Catch = 0x07 => "catch", None, SPECIAL, 0;
    Throw = 0x08 => "throw", Idx, SPECIAL, 0;
    Rethrow = 0x09 => "rethrow", None, SPECIAL, 0;
    End = 0x0B => "end", None, SPECIAL, 0;
    Br = 0x0C => "br", LabelIdx, SPECIAL, 0;
    BrIf = 0x0D => "br_if", LabelIdx, SPECIAL, 0;
    BrTable = 0x0E => "br_table", Table, SPECIAL, 0;
    Return = 0x0F => "return", None, SPECIAL, 0;
    Call = 0x10 => "call", FunctionIdx, SPECIAL, 0;
    CallIndirect = 0x11 => "call_indirect", Indirect, SPECIAL, 0;
    ReturnCall = 0x12 => "return_call", FunctionIdx, SPECIAL, 0;
    ReturnCallIndirect = 0x13 => "return_call_indirect", Indirect, SPECIAL, 0;

    // Parametric.
    Drop = 0x1A => "drop", None, SPECIAL, 0;
    Select = 0x1B => "select", None, SPECIAL, 0;

    // Variables.
    LocalGet = 0x20 => "local.get", LocalIdx, SPECIAL, 0;
    LocalSet = 0x21 => "local.set", LocalIdx, SPECIAL, 0;
    LocalTee = 0x22 => "local.tee", LocalIdx, SPECIAL, 0;
    GlobalGet = 0x23 => "global.get", GlobalIdx, SPECIAL, 0;
    GlobalSet = 0x24 => "global.set", GlobalIdx, SPECIAL, 0;
    TableGet = 0x25 => "table.get", Idx, SPECIAL, 0;
    TableSet = 0x26 => "table.set", Idx, SPECIAL, 0;

    // Memory access.
    I32Load = 0x28 => "i32.load", Memory, I32__I32, 2;
    I64Load = 0x29 => "i64.load", Memory, I64__I32, 3;
    F32Load = 0x2A => "f32.load", Memory, F32__I32, 2;
    F64Load = 0x2B => "f64.load", Memory, F64__I32, 3;
    I32Load8S = 0x2C => "i32.load8_s", Memory, I32__I32, 0;
    I32Load8U = 0x2D => "i32.load8_u", Memory, I32__I32, 0;
    I32Load16S = 0x2E => "i32.load16_s", Memory, I32__I32, 1;
    I32Load16U = 0x2F => "i32.load16_u", Memory, I32__I32, 1;
    I64Load8S = 0x30 => "i64.load8_s", Memory, I64__I32, 0;
    I64Load8U = 0x31 => "i64.load8_u", Memory, I64__I32, 0;
    I64Load16S = 0x32 => "i64.load16_s", Memory, I64__I32, 1;
    I64Load16U = 0x33 => "i64.load16_u", Memory, I64__I32, 1;
    I64Load32S = 0x34 => "i64.load32_s", Memory, I64__I32, 2;
    I64Load32U = 0x35 => "i64.load32_u", Memory, I64__I32, 2;
    I32Store = 0x36 => "i32.store", Memory, VOID__I32_I32, 2;
    I64Store = 0x37 => "i64.store", Memory, VOID__I32_I64, 3;
    F32Store = 0x38 => "f32.store", Memory, VOID__I32_F32, 2;
    F64Store = 0x39 => "f64.store", Memory, VOID__I32_F64, 3;
    I32Store8 = 0x3A => "i32.store8", Memory, VOID__I32_I32, 0;
    I32Store16 = 0x3B => "i32.store16", Memory, VOID__I32_I32, 1;
    I64Store8 = 0x3C => "i64.store8", Memory, VOID__I32_I64, 0;
    I64Store16 = 0x3D => "i64.store16", Memory, VOID__I32_I64, 1;
    I64Store32 = 0x3E => "i64.store32", Memory, VOID__I32_I64, 2;
    MemorySize = 0x3F => "memory.size", Memory0, I32_, 0;
    MemoryGrow = 0x40 => "memory.grow", Memory0, I32__I32, 0;

    // Constants.
    I32Const = 0x41 => "i32.const", I32, I32_, 0;
    I64Const = 0x42 => "i64.const", I64, I64_, 0;
    F32Const = 0x43 => "f32.const", F32, F32_, 0;
    F64Const = 0x44 => "f64.const", F64, F64_, 0;

    // i32 comparisons.
    I32Eqz = 0x45 => "i32.eqz", None, I32__I32, 0;
    I32Eq = 0x46 => "i32.eq", None, I32__I32_I32, 0;
    I32Ne = 0x47 => "i32.ne", None, I32__I32_I32, 0;
    I32LtS = 0x48 => "i32.lt_s", None, I32__I32_I32, 0;
    I32LtU = 0x49 => "i32.lt_u", None, I32__I32_I32, 0;
    I32GtS = 0x4A => "i32.gt_s", None, I32__I32_I32, 0;
    I32GtU = 0x4B => "i32.gt_u", None, I32__I32_I32, 0;
    I32LeS = 0x4C => "i32.le_s", None, I32__I32_I32, 0;
    I32LeU = 0x4D => "i32.le_u", None, I32__I32_I32, 0;
    I32GeS = 0x4E => "i32.ge_s", None, I32__I32_I32, 0;
    I32GeU = 0x4F => "i32.ge_u", None, I32__I32_I32, 0;

    // i64 comparisons.
    I64Eqz = 0x50 => "i64.eqz", None, I32__I64, 0;
    I64Eq = 0x51 => "i64.eq", None, I32__I64_I64, 0;
    I64Ne = 0x52 => "i64.ne", None, I32__I64_I64, 0;
    I64LtS = 0x53 => "i64.lt_s", None, I32__I64_I64, 0;
    I64LtU = 0x54 => "i64.lt_u", None, I32__I64_I64, 0;
    I64GtS = 0x55 => "i64.gt_s", None, I32__I64_I64, 0;
    I64GtU = 0x56 => "i64.gt_u", None, I32__I64_I64, 0;
    I64LeS = 0x57 => "i64.le_s", None, I32__I64_I64, 0;
    I64LeU = 0x58 => "i64.le_u", None, I32__I64_I64, 0;
    I64GeS = 0x59 => "i64.ge_s", None, I32__I64_I64, 0;
    I64GeU = 0x5A => "i64.ge_u", None, I32__I64_I64, 0;

    // f32 comparisons.
    F32Eq = 0x5B => "f32.eq", None, I32__F32_F32, 0;
    F32Ne = 0x5C => "f32.ne", None, I32__F32_F32, 0;
    F32Lt = 0x5D => "f32.lt", None, I32__F32_F32, 0;
    F32Gt = 0x5E => "f32.gt", None, I32__F32_F32, 0;
    F32Le = 0x5F => "f32.le", None, I32__F32_F32, 0;
    F32Ge = 0x60 => "f32.ge", None, I32__F32_F32, 0;

    // f64 comparisons.
    F64Eq = 0x61 => "f64.eq", None, I32__F64_F64, 0;
    F64Ne = 0x62 => "f64.ne", None, I32__F64_F64, 0;
    F64Lt = 0x63 => "f64.lt", None, I32__F64_F64, 0;
    F64Gt = 0x64 => "f64.gt", None, I32__F64_F64, 0;
    F64Le = 0x65 => "f64.le", None, I32__F64_F64, 0;
    F64Ge = 0x66 => "f64.ge", None, I32__F64_F64, 0;

    // i32 arithmetic.
    I32Clz = 0x67 => "i32.clz", None, I32__I32, 0;
    I32Ctz = 0x68 => "i32.ctz", None, I32__I32, 0;
    I32Popcnt = 0x69 => "i32.popcnt", None, I32__I32, 0;
    I32Add = 0x6A => "i32.add", None, I32__I32_I32, 0;
    I32Sub = 0x6B => "i32.sub", None, I32__I32_I32, 0;
    I32Mul = 0x6C => "i32.mul", None, I32__I32_I32, 0;
    I32DivS = 0x6D => "i32.div_s", None, I32__I32_I32, 0;
    I32DivU = 0x6E => "i32.div_u", None, I32__I32_I32, 0;
    I32RemS = 0x6F => "i32.rem_s", None, I32__I32_I32, 0;
    I32RemU = 0x70 => "i32.rem_u", None, I32__I32_I32, 0;
    I32And = 0x71 => "i32.and", None, I32__I32_I32, 0;
    I32Or = 0x72 => "i32.or", None, I32__I32_I32, 0;
    I32Xor = 0x73 => "i32.xor", None, I32__I32_I32, 0;
    I32Shl = 0x74 => "i32.shl", None, I32__I32_I32, 0;
    I32ShrS = 0x75 => "i32.shr_s", None, I32__I32_I32, 0;
    I32ShrU = 0x76 => "i32.shr_u", None, I32__I32_I32, 0;
    I32Rotl = 0x77 => "i32.rotl", None, I32__I32_I32, 0;
    I32Rotr = 0x78 => "i32.rotr", None, I32__I32_I32, 0;

    // i64 arithmetic.
    I64Clz = 0x79 => "i64.clz", None, I64__I64, 0;
    I64Ctz = 0x7A => "i64.ctz", None, I64__I64, 0;
    I64Popcnt = 0x7B => "i64.popcnt", None, I64__I64, 0;
    I64Add = 0x7C => "i64.add", None, I64__I64_I64, 0;
    I64Sub = 0x7D => "i64.sub", None, I64__I64_I64, 0;
    I64Mul = 0x7E => "i64.mul", None, I64__I64_I64, 0;
    I64DivS = 0x7F => "i64.div_s", None, I64__I64_I64, 0;
    I64DivU = 0x80 => "i64.div_u", None, I64__I64_I64, 0;
    I64RemS = 0x81 => "i64.rem_s", None, I64__I64_I64, 0;
    I64RemU = 0x82 => "i64.rem_u", None, I64__I64_I64, 0;
    I64And = 0x83 => "i64.and", None, I64__I64_I64, 0;
    I64Or = 0x84 => "i64.or", None, I64__I64_I64, 0;
    I64Xor = 0x85 => "i64.xor", None, I64__I64_I64, 0;
    I64Shl = 0x86 => "i64.shl", None, I64__I64_I64, 0;
    I64ShrS = 0x87 => "i64.shr_s", None, I64__I64_I64, 0;
    I64ShrU = 0x88 => "i64.shr_u", None, I64__I64_I64, 0;
    I64Rotl = 0x89 => "i64.rotl", None, I64__I64_I64, 0;
    I64Rotr = 0x8A => "i64.rotr", None, I64__I64_I64, 0;

    // f32 arithmetic.
    F32Abs = 0x8B => "f32.abs", None, F32__F32, 0;
    F32Neg = 0x8C => "f32.neg", None, F32__F32, 0;
    F32Ceil = 0x8D => "f32.ceil", None, F32__F32, 0;
    F32Floor = 0x8E => "f32.floor", None, F32__F32, 0;
    F32Trunc = 0x8F => "f32.trunc", None, F32__F32, 0;
    F32Nearest = 0x90 => "f32.nearest", None, F32__F32, 0;
    F32Sqrt = 0x91 => "f32.sqrt", None, F32__F32, 0;
    F32Add = 0x92 => "f32.add", None, F32__F32_F32, 0;
    F32Sub = 0x93 => "f32.sub", None, F32__F32_F32, 0;
    F32Mul = 0x94 => "f32.mul", None, F32__F32_F32, 0;
    F32Div = 0x95 => "f32.div", None, F32__F32_F32, 0;
    F32Min = 0x96 => "f32.min", None, F32__F32_F32, 0;
    F32Max = 0x97 => "f32.max", None, F32__F32_F32, 0;
    F32Copysign = 0x98 => "f32.copysign", None, F32__F32_F32, 0;

    // f64 arithmetic.
    F64Abs = 0x99 => "f64.abs", None, F64__F64, 0;
    F64Neg = 0x9A => "f64.neg", None, F64__F64, 0;
    F64Ceil = 0x9B => "f64.ceil", None, F64__F64, 0;
    F64Floor = 0x9C => "f64.floor", None, F64__F64, 0;
    F64Trunc = 0x9D => "f64.trunc", None, F64__F64, 0;
    F64Nearest = 0x9E => "f64.nearest", None, F64__F64, 0;
    F64Sqrt = 0x9F => "f64.sqrt", None, F64__F64, 0;
    F64Add = 0xA0 => "f64.add", None, F64__F64_F64, 0;
    F64Sub = 0xA1 => "f64.sub", None, F64__F64_F64, 0;
    F64Mul = 0xA2 => "f64.mul", None, F64__F64_F64, 0;
    F64Div = 0xA3 => "f64.div", None, F64__F64_F64, 0;
    F64Min = 0xA4 => "f64.min", None, F64__F64_F64, 0;
    F64Max = 0xA5 => "f64.max", None, F64__F64_F64, 0;
    F64Copysign = 0xA6 => "f64.copysign", None, F64__F64_F64, 0;

    // Conversions.
    I32WrapI64 = 0xA7 => "i32.wrap_i64", None, I32__I64, 0;
    I32TruncF32S = 0xA8 => "i32.trunc_f32_s", None, I32__F32, 0;
    I32TruncF32U = 0xA9 => "i32.trunc_f32_u", None, I32__F32, 0;
    I32TruncF64S = 0xAA => "i32.trunc_f64_s", None, I32__F64, 0;
    I32TruncF64U = 0xAB => "i32.trunc_f64_u", None, I32__F64, 0;
    I64ExtendI32S = 0xAC => "i64.extend_i32_s", None, I64__I32, 0;
    I64ExtendI32U = 0xAD => "i64.extend_i32_u", None, I64__I32, 0;
    I64TruncF32S = 0xAE => "i64.trunc_f32_s", None, I64__F32, 0;
    I64TruncF32U = 0xAF => "i64.trunc_f32_u", None, I64__F32, 0;
    I64TruncF64S = 0xB0 => "i64.trunc_f64_s", None, I64__F64, 0;
    I64TruncF64U = 0xB1 => "i64.trunc_f64_u", None, I64__F64, 0;
    F32ConvertI32S = 0xB2 => "f32.convert_i32_s", None, F32__I32, 0;
    F32ConvertI32U = 0xB3 => "f32.convert_i32_u", None, F32__I32, 0;
    F32ConvertI64S = 0xB4 => "f32.convert_i64_s", None, F32__I64, 0;
    F32ConvertI64U = 0xB5 => "f32.convert_i64_u", None, F32__I64, 0;
    F32DemoteF64 = 0xB6 => "f32.demote_f64", None, F32__F64, 0;
    F64ConvertI32S = 0xB7 => "f64.convert_i32_s", None, F64__I32, 0;
    F64ConvertI32U = 0xB8 => "f64.convert_i32_u", None, F64__I32, 0;
    F64ConvertI64S = 0xB9 => "f64.convert_i64_s", None, F64__I64, 0;
    F64ConvertI64U = 0xBA => "f64.convert_i64_u", None, F64__I64, 0;
    F64PromoteF32 = 0xBB => "f64.promote_f32", None, F64__F32, 0;
    I32ReinterpretF32 = 0xBC => "i32.reinterpret_f32", None, I32__F32, 0;
    I64ReinterpretF64 = 0xBD => "i64.reinterpret_f64", None, I64__F64, 0;
    F32ReinterpretI32 = 0xBE => "f32.reinterpret_i32", None, F32__I32, 0;
    F64ReinterpretI64 = 0xBF => "f64.reinterpret_i64", None, F64__I64, 0;

    // Sign extension.
    I32Extend8S = 0xC0 => "i32.extend8_s", None, I32__I32, 0;
    I32Extend16S = 0xC1 => "i32.extend16_s", None, I32__I32, 0;
    I64Extend8S = 0xC2 => "i64.extend8_s", None, I64__I64, 0;
    I64Extend16S = 0xC3 => "i64.extend16_s", None, I64__I64, 0;
    I64Extend32S = 0xC4 => "i64.extend32_s", None, I64__I64, 0;

    // Reference types.
    RefNull = 0xD0 => "ref.null", None, SPECIAL, 0;
    RefIsNull = 0xD1 => "ref.is_null", None, SPECIAL, 0;
    RefFunc = 0xD2 => "ref.func", FunctionIdx, SPECIAL, 0;

    // Saturating truncations and bulk memory (0xFC page).
    I32TruncSatF32S = 0xFC0000 => "i32.trunc_sat_f32_s", None, I32__F32, 0;
    I32TruncSatF32U = 0xFC0001 => "i32.trunc_sat_f32_u", None, I32__F32, 0;
    I32TruncSatF64S = 0xFC0002 => "i32.trunc_sat_f64_s", None, I32__F64, 0;
    I32TruncSatF64U = 0xFC0003 => "i32.trunc_sat_f64_u", None, I32__F64, 0;
    I64TruncSatF32S = 0xFC0004 => "i64.trunc_sat_f32_s", None, I64__F32, 0;
    I64TruncSatF32U = 0xFC0005 => "i64.trunc_sat_f32_u", None, I64__F32, 0;
    I64TruncSatF64S = 0xFC0006 => "i64.trunc_sat_f64_s", None, I64__F64, 0;
    I64TruncSatF64U = 0xFC0007 => "i64.trunc_sat_f64_u", None, I64__F64, 0;
    MemoryInit = 0xFC0008 => "memory.init", IdxZero, VOID__I32_I32_I32, 0;
    DataDrop = 0xFC0009 => "data.drop", Idx, VOID_, 0;
    MemoryCopy = 0xFC000A => "memory.copy", ZeroZero, VOID__I32_I32_I32, 0;
    MemoryFill = 0xFC000B => "memory.fill", Memory0, VOID__I32_I32_I32, 0;
    TableInit = 0xFC000C => "table.init", IdxIdx, VOID__I32_I32_I32, 0;
    ElemDrop = 0xFC000D => "elem.drop", Idx, VOID_, 0;
    TableCopy = 0xFC000E => "table.copy", IdxIdx, VOID__I32_I32_I32, 0;
    TableGrow = 0xFC000F => "table.grow", Idx, SPECIAL, 0;
    TableSize = 0xFC0010 => "table.size", Idx, I32_, 0;
    TableFill = 0xFC0011 => "table.fill", Idx, SPECIAL, 0;

    // SIMD loads and stores (0xFD page).
    V128Load = 0xFD0000 => "v128.load", Memory, V128__I32, 4;
    V128Load8x8S = 0xFD0001 => "v128.load8x8_s", Memory, V128__I32, 3;
    V128Load8x8U = 0xFD0002 => "v128.load8x8_u", Memory, V128__I32, 3;
    V128Load16x4S = 0xFD0003 => "v128.load16x4_s", Memory, V128__I32, 3;
    V128Load16x4U = 0xFD0004 => "v128.load16x4_u", Memory, V128__I32, 3;
    V128Load32x2S = 0xFD0005 => "v128.load32x2_s", Memory, V128__I32, 3;
    V128Load32x2U = 0xFD0006 => "v128.load32x2_u", Memory, V128__I32, 3;
    V128Load8Splat = 0xFD0007 => "v128.load8_splat", Memory, V128__I32, 0;
    V128Load16Splat = 0xFD0008 => "v128.load16_splat", Memory, V128__I32, 1;
    V128Load32Splat = 0xFD0009 => "v128.load32_splat", Memory, V128__I32, 2;
    V128Load64Splat = 0xFD000A => "v128.load64_splat", Memory, V128__I32, 3;
    V128Store = 0xFD000B => "v128.store", Memory, VOID__I32_V128, 4;
    V128Const = 0xFD000C => "v128.const", V128, V128_, 0;
    I8x16Shuffle = 0xFD000D => "i8x16.shuffle", Shuffle, V128__V128_V128, 0;
    I8x16Swizzle = 0xFD000E => "i8x16.swizzle", None, V128__V128_V128, 0;
    I8x16Splat = 0xFD000F => "i8x16.splat", None, V128__I32, 0;
    I16x8Splat = 0xFD0010 => "i16x8.splat", None, V128__I32, 0;
    I32x4Splat = 0xFD0011 => "i32x4.splat", None, V128__I32, 0;
    I64x2Splat = 0xFD0012 => "i64x2.splat", None, V128__I64, 0;
    F32x4Splat = 0xFD0013 => "f32x4.splat", None, V128__F32, 0;
    F64x2Splat = 0xFD0014 => "f64x2.splat", None, V128__F64, 0;
    I8x16ExtractLaneS = 0xFD0015 => "i8x16.extract_lane_s", Lane16, I32__V128, 0;
    I8x16ExtractLaneU = 0xFD0016 => "i8x16.extract_lane_u", Lane16, I32__V128, 0;
    I8x16ReplaceLane = 0xFD0017 => "i8x16.replace_lane", Lane16, V128__V128_I32, 0;
    I16x8ExtractLaneS = 0xFD0018 => "i16x8.extract_lane_s", Lane8, I32__V128, 0;
    I16x8ExtractLaneU = 0xFD0019 => "i16x8.extract_lane_u", Lane8, I32__V128, 0;
    I16x8ReplaceLane = 0xFD001A => "i16x8.replace_lane", Lane8, V128__V128_I32, 0;
    I32x4ExtractLane = 0xFD001B => "i32x4.extract_lane", Lane4, I32__V128, 0;
    I32x4ReplaceLane = 0xFD001C => "i32x4.replace_lane", Lane4, V128__V128_I32, 0;
    I64x2ExtractLane = 0xFD001D => "i64x2.extract_lane", Lane2, I64__V128, 0;
    I64x2ReplaceLane = 0xFD001E => "i64x2.replace_lane", Lane2, V128__V128_I64, 0;
    F32x4ExtractLane = 0xFD001F => "f32x4.extract_lane", Lane4, F32__V128, 0;
    F32x4ReplaceLane = 0xFD0020 => "f32x4.replace_lane", Lane4, V128__V128_F32, 0;
    F64x2ExtractLane = 0xFD0021 => "f64x2.extract_lane", Lane2, F64__V128, 0;
    F64x2ReplaceLane = 0xFD0022 => "f64x2.replace_lane", Lane2, V128__V128_F64, 0;

    // SIMD comparisons.
    I8x16Eq = 0xFD0023 => "i8x16.eq", None, V128__V128_V128, 0;
    I8x16Ne = 0xFD0024 => "i8x16.ne", None, V128__V128_V128, 0;
    I8x16LtS = 0xFD0025 => "i8x16.lt_s", None, V128__V128_V128, 0;
    I8x16LtU = 0xFD0026 => "i8x16.lt_u", None, V128__V128_V128, 0;
    I8x16GtS = 0xFD0027 => "i8x16.gt_s", None, V128__V128_V128, 0;
    I8x16GtU = 0xFD0028 => "i8x16.gt_u", None, V128__V128_V128, 0;
    I8x16LeS = 0xFD0029 => "i8x16.le_s", None, V128__V128_V128, 0;
    I8x16LeU = 0xFD002A => "i8x16.le_u", None, V128__V128_V128, 0;
    I8x16GeS = 0xFD002B => "i8x16.ge_s", None, V128__V128_V128, 0;
    I8x16GeU = 0xFD002C => "i8x16.ge_u", None, V128__V128_V128, 0;
    I16x8Eq = 0xFD002D => "i16x8.eq", None, V128__V128_V128, 0;
    I16x8Ne = 0xFD002E => "i16x8.ne", None, V128__V128_V128, 0;
    I16x8LtS = 0xFD002F => "i16x8.lt_s", None, V128__V128_V128, 0;
    I16x8LtU = 0xFD0030 => "i16x8.lt_u", None, V128__V128_V128, 0;
    I16x8GtS = 0xFD0031 => "i16x8.gt_s", None, V128__V128_V128, 0;
    I16x8GtU = 0xFD0032 => "i16x8.gt_u", None, V128__V128_V128, 0;
    I16x8LeS = 0xFD0033 => "i16x8.le_s", None, V128__V128_V128, 0;
    I16x8LeU = 0xFD0034 => "i16x8.le_u", None, V128__V128_V128, 0;
    I16x8GeS = 0xFD0035 => "i16x8.ge_s", None, V128__V128_V128, 0;
    I16x8GeU = 0xFD0036 => "i16x8.ge_u", None, V128__V128_V128, 0;
    I32x4Eq = 0xFD0037 => "i32x4.eq", None, V128__V128_V128, 0;
    I32x4Ne = 0xFD0038 => "i32x4.ne", None, V128__V128_V128, 0;
    I32x4LtS = 0xFD0039 => "i32x4.lt_s", None, V128__V128_V128, 0;
    I32x4LtU = 0xFD003A => "i32x4.lt_u", None, V128__V128_V128, 0;
    I32x4GtS = 0xFD003B => "i32x4.gt_s", None, V128__V128_V128, 0;
    I32x4GtU = 0xFD003C => "i32x4.gt_u", None, V128__V128_V128, 0;
    I32x4LeS = 0xFD003D => "i32x4.le_s", None, V128__V128_V128, 0;
    I32x4LeU = 0xFD003E => "i32x4.le_u", None, V128__V128_V128, 0;
    I32x4GeS = 0xFD003F => "i32x4.ge_s", None, V128__V128_V128, 0;
    I32x4GeU = 0xFD0040 => "i32x4.ge_u", None, V128__V128_V128, 0;
    F32x4Eq = 0xFD0041 => "f32x4.eq", None, V128__V128_V128, 0;
    F32x4Ne = 0xFD0042 => "f32x4.ne", None, V128__V128_V128, 0;
    F32x4Lt = 0xFD0043 => "f32x4.lt", None, V128__V128_V128, 0;
    F32x4Gt = 0xFD0044 => "f32x4.gt", None, V128__V128_V128, 0;
    F32x4Le = 0xFD0045 => "f32x4.le", None, V128__V128_V128, 0;
    F32x4Ge = 0xFD0046 => "f32x4.ge", None, V128__V128_V128, 0;
    F64x2Eq = 0xFD0047 => "f64x2.eq", None, V128__V128_V128, 0;
    F64x2Ne = 0xFD0048 => "f64x2.ne", None, V128__V128_V128, 0;
    F64x2Lt = 0xFD0049 => "f64x2.lt", None, V128__V128_V128, 0;
    F64x2Gt = 0xFD004A => "f64x2.gt", None, V128__V128_V128, 0;
    F64x2Le = 0xFD004B => "f64x2.le", None, V128__V128_V128, 0;
    F64x2Ge = 0xFD004C => "f64x2.ge", None, V128__V128_V128, 0;

    // SIMD bitwise.
    V128Not = 0xFD004D => "v128.not", None, V128__V128, 0;
    V128And = 0xFD004E => "v128.and", None, V128__V128_V128, 0;
    V128Andnot = 0xFD004F => "v128.andnot", None, V128__V128_V128, 0;
    V128Or = 0xFD0050 => "v128.or", None, V128__V128_V128, 0;
    V128Xor = 0xFD0051 => "v128.xor", None, V128__V128_V128, 0;
    V128Bitselect = 0xFD0052 => "v128.bitselect", None, V128__V128_V128_V128, 0;
    V128AnyTrue = 0xFD0053 => "v128.any_true", None, I32__V128, 0;

    // SIMD lane memory access.
    V128Load8Lane = 0xFD0054 => "v128.load8_lane", MemoryLane16, V128__I32_V128, 0;
    V128Load16Lane = 0xFD0055 => "v128.load16_lane", MemoryLane8, V128__I32_V128, 1;
    V128Load32Lane = 0xFD0056 => "v128.load32_lane", MemoryLane4, V128__I32_V128, 2;
    V128Load64Lane = 0xFD0057 => "v128.load64_lane", MemoryLane2, V128__I32_V128, 3;
    V128Store8Lane = 0xFD0058 => "v128.store8_lane", MemoryLane16, VOID__I32_V128, 0;
    V128Store16Lane = 0xFD0059 => "v128.store16_lane", MemoryLane8, VOID__I32_V128, 1;
    V128Store32Lane = 0xFD005A => "v128.store32_lane", MemoryLane4, VOID__I32_V128, 2;
    V128Store64Lane = 0xFD005B => "v128.store64_lane", MemoryLane2, VOID__I32_V128, 3;
    V128Load32Zero = 0xFD005C => "v128.load32_zero", Memory, V128__I32, 2;
    V128Load64Zero = 0xFD005D => "v128.load64_zero", Memory, V128__I32, 3;
    F32x4DemoteF64x2Zero = 0xFD005E => "f32x4.demote_f64x2_zero", None, V128__V128, 0;
    F64x2PromoteLowF32x4 = 0xFD005F => "f64x2.promote_low_f32x4", None, V128__V128, 0;

    // i8x16 operations.
    I8x16Abs = 0xFD0060 => "i8x16.abs", None, V128__V128, 0;
    I8x16Neg = 0xFD0061 => "i8x16.neg", None, V128__V128, 0;
    I8x16Popcnt = 0xFD0062 => "i8x16.popcnt", None, V128__V128, 0;
    I8x16AllTrue = 0xFD0063 => "i8x16.all_true", None, I32__V128, 0;
    I8x16Bitmask = 0xFD0064 => "i8x16.bitmask", None, I32__V128, 0;
    I8x16NarrowI16x8S = 0xFD0065 => "i8x16.narrow_i16x8_s", None, V128__V128_V128, 0;
    I8x16NarrowI16x8U = 0xFD0066 => "i8x16.narrow_i16x8_u", None, V128__V128_V128, 0;
    F32x4Ceil = 0xFD0067 => "f32x4.ceil", None, V128__V128, 0;
    F32x4Floor = 0xFD0068 => "f32x4.floor", None, V128__V128, 0;
    F32x4Trunc = 0xFD0069 => "f32x4.trunc", None, V128__V128, 0;
    F32x4Nearest = 0xFD006A => "f32x4.nearest", None, V128__V128, 0;
    I8x16Shl = 0xFD006B => "i8x16.shl", None, V128__V128_I32, 0;
    I8x16ShrS = 0xFD006C => "i8x16.shr_s", None, V128__V128_I32, 0;
    I8x16ShrU = 0xFD006D => "i8x16.shr_u", None, V128__V128_I32, 0;
    I8x16Add = 0xFD006E => "i8x16.add", None, V128__V128_V128, 0;
    I8x16AddSatS = 0xFD006F => "i8x16.add_sat_s", None, V128__V128_V128, 0;
    I8x16AddSatU = 0xFD0070 => "i8x16.add_sat_u", None, V128__V128_V128, 0;
    I8x16Sub = 0xFD0071 => "i8x16.sub", None, V128__V128_V128, 0;
    I8x16SubSatS = 0xFD0072 => "i8x16.sub_sat_s", None, V128__V128_V128, 0;
    I8x16SubSatU = 0xFD0073 => "i8x16.sub_sat_u", None, V128__V128_V128, 0;
    F64x2Ceil = 0xFD0074 => "f64x2.ceil", None, V128__V128, 0;
    F64x2Floor = 0xFD0075 => "f64x2.floor", None, V128__V128, 0;
    I8x16MinS = 0xFD0076 => "i8x16.min_s", None, V128__V128_V128, 0;
    I8x16MinU = 0xFD0077 => "i8x16.min_u", None, V128__V128_V128, 0;
    I8x16MaxS = 0xFD0078 => "i8x16.max_s", None, V128__V128_V128, 0;
    I8x16MaxU = 0xFD0079 => "i8x16.max_u", None, V128__V128_V128, 0;
    F64x2Trunc = 0xFD007A => "f64x2.trunc", None, V128__V128, 0;
    I8x16AvgrU = 0xFD007B => "i8x16.avgr_u", None, V128__V128_V128, 0;

    // i16x8 operations.
    I16x8ExtaddPairwiseI8x16S = 0xFD007C => "i16x8.extadd_pairwise_i8x16_s", None, V128__V128, 0;
    I16x8ExtaddPairwiseI8x16U = 0xFD007D => "i16x8.extadd_pairwise_i8x16_u", None, V128__V128, 0;
    I32x4ExtaddPairwiseI16x8S = 0xFD007E => "i32x4.extadd_pairwise_i16x8_s", None, V128__V128, 0;
    I32x4ExtaddPairwiseI16x8U = 0xFD007F => "i32x4.extadd_pairwise_i16x8_u", None, V128__V128, 0;
    I16x8Abs = 0xFD0080 => "i16x8.abs", None, V128__V128, 0;
    I16x8Neg = 0xFD0081 => "i16x8.neg", None, V128__V128, 0;
    I16x8Q15mulrSatS = 0xFD0082 => "i16x8.q15mulr_sat_s", None, V128__V128_V128, 0;
    I16x8AllTrue = 0xFD0083 => "i16x8.all_true", None, I32__V128, 0;
    I16x8Bitmask = 0xFD0084 => "i16x8.bitmask", None, I32__V128, 0;
    I16x8NarrowI32x4S = 0xFD0085 => "i16x8.narrow_i32x4_s", None, V128__V128_V128, 0;
    I16x8NarrowI32x4U = 0xFD0086 => "i16x8.narrow_i32x4_u", None, V128__V128_V128, 0;
    I16x8ExtendLowI8x16S = 0xFD0087 => "i16x8.extend_low_i8x16_s", None, V128__V128, 0;
    I16x8ExtendHighI8x16S = 0xFD0088 => "i16x8.extend_high_i8x16_s", None, V128__V128, 0;
    I16x8ExtendLowI8x16U = 0xFD0089 => "i16x8.extend_low_i8x16_u", None, V128__V128, 0;
    I16x8ExtendHighI8x16U = 0xFD008A => "i16x8.extend_high_i8x16_u", None, V128__V128, 0;
    I16x8Shl = 0xFD008B => "i16x8.shl", None, V128__V128_I32, 0;
    I16x8ShrS = 0xFD008C => "i16x8.shr_s", None, V128__V128_I32, 0;
    I16x8ShrU = 0xFD008D => "i16x8.shr_u", None, V128__V128_I32, 0;
    I16x8Add = 0xFD008E => "i16x8.add", None, V128__V128_V128, 0;
    I16x8AddSatS = 0xFD008F => "i16x8.add_sat_s", None, V128__V128_V128, 0;
    I16x8AddSatU = 0xFD0090 => "i16x8.add_sat_u", None, V128__V128_V128, 0;
    I16x8Sub = 0xFD0091 => "i16x8.sub", None, V128__V128_V128, 0;
    I16x8SubSatS = 0xFD0092 => "i16x8.sub_sat_s", None, V128__V128_V128, 0;
    I16x8SubSatU = 0xFD0093 => "i16x8.sub_sat_u", None, V128__V128_V128, 0;
    F64x2Nearest = 0xFD0094 => "f64x2.nearest", None, V128__V128, 0;
    I16x8Mul = 0xFD0095 => "i16x8.mul", None, V128__V128_V128, 0;
    I16x8MinS = 0xFD0096 => "i16x8.min_s", None, V128__V128_V128, 0;
    I16x8MinU = 0xFD0097 => "i16x8.min_u", None, V128__V128_V128, 0;
    I16x8MaxS = 0xFD0098 => "i16x8.max_s", None, V128__V128_V128, 0;
    I16x8MaxU = 0xFD0099 => "i16x8.max_u", None, V128__V128_V128, 0;
    I16x8AvgrU = 0xFD009B => "i16x8.avgr_u", None, V128__V128_V128, 0;
    I16x8ExtmulLowI8x16S = 0xFD009C => "i16x8.extmul_low_i8x16_s", None, V128__V128_V128, 0;
    I16x8ExtmulHighI8x16S = 0xFD009D => "i16x8.extmul_high_i8x16_s", None, V128__V128_V128, 0;
    I16x8ExtmulLowI8x16U = 0xFD009E => "i16x8.extmul_low_i8x16_u", None, V128__V128_V128, 0;
    I16x8ExtmulHighI8x16U = 0xFD009F => "i16x8.extmul_high_i8x16_u", None, V128__V128_V128, 0;

    // i32x4 operations.
    I32x4Abs = 0xFD00A0 => "i32x4.abs", None, V128__V128, 0;
    I32x4Neg = 0xFD00A1 => "i32x4.neg", None, V128__V128, 0;
    I32x4AllTrue = 0xFD00A3 => "i32x4.all_true", None, I32__V128, 0;
    I32x4Bitmask = 0xFD00A4 => "i32x4.bitmask", None, I32__V128, 0;
    I32x4ExtendLowI16x8S = 0xFD00A7 => "i32x4.extend_low_i16x8_s", None, V128__V128, 0;
    I32x4ExtendHighI16x8S = 0xFD00A8 => "i32x4.extend_high_i16x8_s", None, V128__V128, 0;
    I32x4ExtendLowI16x8U = 0xFD00A9 => "i32x4.extend_low_i16x8_u", None, V128__V128, 0;
    I32x4ExtendHighI16x8U = 0xFD00AA => "i32x4.extend_high_i16x8_u", None, V128__V128, 0;
    I32x4Shl = 0xFD00AB => "i32x4.shl", None, V128__V128_I32, 0;
    I32x4ShrS = 0xFD00AC => "i32x4.shr_s", None, V128__V128_I32, 0;
    I32x4ShrU = 0xFD00AD => "i32x4.shr_u", None, V128__V128_I32, 0;
    I32x4Add = 0xFD00AE => "i32x4.add", None, V128__V128_V128, 0;
    I32x4Sub = 0xFD00B1 => "i32x4.sub", None, V128__V128_V128, 0;
    I32x4Mul = 0xFD00B5 => "i32x4.mul", None, V128__V128_V128, 0;
    I32x4MinS = 0xFD00B6 => "i32x4.min_s", None, V128__V128_V128, 0;
    I32x4MinU = 0xFD00B7 => "i32x4.min_u", None, V128__V128_V128, 0;
    I32x4MaxS = 0xFD00B8 => "i32x4.max_s", None, V128__V128_V128, 0;
    I32x4MaxU = 0xFD00B9 => "i32x4.max_u", None, V128__V128_V128, 0;
    I32x4DotI16x8S = 0xFD00BA => "i32x4.dot_i16x8_s", None, V128__V128_V128, 0;
    I32x4ExtmulLowI16x8S = 0xFD00BC => "i32x4.extmul_low_i16x8_s", None, V128__V128_V128, 0;
    I32x4ExtmulHighI16x8S = 0xFD00BD => "i32x4.extmul_high_i16x8_s", None, V128__V128_V128, 0;
    I32x4ExtmulLowI16x8U = 0xFD00BE => "i32x4.extmul_low_i16x8_u", None, V128__V128_V128, 0;
    I32x4ExtmulHighI16x8U = 0xFD00BF => "i32x4.extmul_high_i16x8_u", None, V128__V128_V128, 0;

    // i64x2 operations.
    I64x2Abs = 0xFD00C0 => "i64x2.abs", None, V128__V128, 0;
    I64x2Neg = 0xFD00C1 => "i64x2.neg", None, V128__V128, 0;
    I64x2AllTrue = 0xFD00C3 => "i64x2.all_true", None, I32__V128, 0;
    I64x2Bitmask = 0xFD00C4 => "i64x2.bitmask", None, I32__V128, 0;
    I64x2ExtendLowI32x4S = 0xFD00C7 => "i64x2.extend_low_i32x4_s", None, V128__V128, 0;
    I64x2ExtendHighI32x4S = 0xFD00C8 => "i64x2.extend_high_i32x4_s", None, V128__V128, 0;
    I64x2ExtendLowI32x4U = 0xFD00C9 => "i64x2.extend_low_i32x4_u", None, V128__V128, 0;
    I64x2ExtendHighI32x4U = 0xFD00CA => "i64x2.extend_high_i32x4_u", None, V128__V128, 0;
    I64x2Shl = 0xFD00CB => "i64x2.shl", None, V128__V128_I32, 0;
    I64x2ShrS = 0xFD00CC => "i64x2.shr_s", None, V128__V128_I32, 0;
    I64x2ShrU = 0xFD00CD => "i64x2.shr_u", None, V128__V128_I32, 0;
    I64x2Add = 0xFD00CE => "i64x2.add", None, V128__V128_V128, 0;
    I64x2Sub = 0xFD00D1 => "i64x2.sub", None, V128__V128_V128, 0;
    I64x2Mul = 0xFD00D5 => "i64x2.mul", None, V128__V128_V128, 0;
    I64x2Eq = 0xFD00D6 => "i64x2.eq", None, V128__V128_V128, 0;
    I64x2Ne = 0xFD00D7 => "i64x2.ne", None, V128__V128_V128, 0;
    I64x2LtS = 0xFD00D8 => "i64x2.lt_s", None, V128__V128_V128, 0;
    I64x2GtS = 0xFD00D9 => "i64x2.gt_s", None, V128__V128_V128, 0;
    I64x2LeS = 0xFD00DA => "i64x2.le_s", None, V128__V128_V128, 0;
    I64x2GeS = 0xFD00DB => "i64x2.ge_s", None, V128__V128_V128, 0;
    I64x2ExtmulLowI32x4S = 0xFD00DC => "i64x2.extmul_low_i32x4_s", None, V128__V128_V128, 0;
    I64x2ExtmulHighI32x4S = 0xFD00DD => "i64x2.extmul_high_i32x4_s", None, V128__V128_V128, 0;
    I64x2ExtmulLowI32x4U = 0xFD00DE => "i64x2.extmul_low_i32x4_u", None, V128__V128_V128, 0;
    I64x2ExtmulHighI32x4U = 0xFD00DF => "i64x2.extmul_high_i32x4_u", None, V128__V128_V128, 0;

    // f32x4 operations.
    F32x4Abs = 0xFD00E0 => "f32x4.abs", None, V128__V128, 0;
    F32x4Neg = 0xFD00E1 => "f32x4.neg", None, V128__V128, 0;
    F32x4Sqrt = 0xFD00E3 => "f32x4.sqrt", None, V128__V128, 0;
    F32x4Add = 0xFD00E4 => "f32x4.add", None, V128__V128_V128, 0;
    F32x4Sub = 0xFD00E5 => "f32x4.sub", None, V128__V128_V128, 0;
    F32x4Mul = 0xFD00E6 => "f32x4.mul", None, V128__V128_V128, 0;
    F32x4Div = 0xFD00E7 => "f32x4.div", None, V128__V128_V128, 0;
    F32x4Min = 0xFD00E8 => "f32x4.min", None, V128__V128_V128, 0;
    F32x4Max = 0xFD00E9 => "f32x4.max", None, V128__V128_V128, 0;
    F32x4Pmin = 0xFD00EA => "f32x4.pmin", None, V128__V128_V128, 0;
    F32x4Pmax = 0xFD00EB => "f32x4.pmax", None, V128__V128_V128, 0;

    // f64x2 operations.
    F64x2Abs = 0xFD00EC => "f64x2.abs", None, V128__V128, 0;
    F64x2Neg = 0xFD00ED => "f64x2.neg", None, V128__V128, 0;
    F64x2Sqrt = 0xFD00EF => "f64x2.sqrt", None, V128__V128, 0;
    F64x2Add = 0xFD00F0 => "f64x2.add", None, V128__V128_V128, 0;
    F64x2Sub = 0xFD00F1 => "f64x2.sub", None, V128__V128_V128, 0;
    F64x2Mul = 0xFD00F2 => "f64x2.mul", None, V128__V128_V128, 0;
    F64x2Div = 0xFD00F3 => "f64x2.div", None, V128__V128_V128, 0;
    F64x2Min = 0xFD00F4 => "f64x2.min", None, V128__V128_V128, 0;
    F64x2Max = 0xFD00F5 => "f64x2.max", None, V128__V128_V128, 0;
    F64x2Pmin = 0xFD00F6 => "f64x2.pmin", None, V128__V128_V128, 0;
    F64x2Pmax = 0xFD00F7 => "f64x2.pmax", None, V128__V128_V128, 0;

    // SIMD conversions.
    I32x4TruncSatF32x4S = 0xFD00F8 => "i32x4.trunc_sat_f32x4_s", None, V128__V128, 0;
    I32x4TruncSatF32x4U = 0xFD00F9 => "i32x4.trunc_sat_f32x4_u", None, V128__V128, 0;
    F32x4ConvertI32x4S = 0xFD00FA => "f32x4.convert_i32x4_s", None, V128__V128, 0;
    F32x4ConvertI32x4U = 0xFD00FB => "f32x4.convert_i32x4_u", None, V128__V128, 0;
    I32x4TruncSatF64x2SZero = 0xFD00FC => "i32x4.trunc_sat_f64x2_s_zero", None, V128__V128, 0;
    I32x4TruncSatF64x2UZero = 0xFD00FD => "i32x4.trunc_sat_f64x2_u_zero", None, V128__V128, 0;
    F64x2ConvertLowI32x4S = 0xFD00FE => "f64x2.convert_low_i32x4_s", None, V128__V128, 0;
    F64x2ConvertLowI32x4U = 0xFD00FF => "f64x2.convert_low_i32x4_u", None, V128__V128, 0;

    // Threads (0xFE page).
    MemoryAtomicNotify = 0xFE0000 => "memory.atomic.notify", Memory, I32__I32_I32, 2;
    MemoryAtomicWait32 = 0xFE0001 => "memory.atomic.wait32", Memory, I32__I32_I32_I64, 2;
    MemoryAtomicWait64 = 0xFE0002 => "memory.atomic.wait64", Memory, I32__I32_I64_I64, 3;
    AtomicFence = 0xFE0003 => "atomic.fence", Memory0, VOID_, 0;
    I32AtomicLoad = 0xFE0010 => "i32.atomic.load", Memory, I32__I32, 2;
    I64AtomicLoad = 0xFE0011 => "i64.atomic.load", Memory, I64__I32, 3;
    I32AtomicLoad8U = 0xFE0012 => "i32.atomic.load8_u", Memory, I32__I32, 0;
    I32AtomicLoad16U = 0xFE0013 => "i32.atomic.load16_u", Memory, I32__I32, 1;
    I64AtomicLoad8U = 0xFE0014 => "i64.atomic.load8_u", Memory, I64__I32, 0;
    I64AtomicLoad16U = 0xFE0015 => "i64.atomic.load16_u", Memory, I64__I32, 1;
    I64AtomicLoad32U = 0xFE0016 => "i64.atomic.load32_u", Memory, I64__I32, 2;
    I32AtomicStore = 0xFE0017 => "i32.atomic.store", Memory, VOID__I32_I32, 2;
    I64AtomicStore = 0xFE0018 => "i64.atomic.store", Memory, VOID__I32_I64, 3;
    I32AtomicStore8 = 0xFE0019 => "i32.atomic.store8", Memory, VOID__I32_I32, 0;
    I32AtomicStore16 = 0xFE001A => "i32.atomic.store16", Memory, VOID__I32_I32, 1;
    I64AtomicStore8 = 0xFE001B => "i64.atomic.store8", Memory, VOID__I32_I64, 0;
    I64AtomicStore16 = 0xFE001C => "i64.atomic.store16", Memory, VOID__I32_I64, 1;
    I64AtomicStore32 = 0xFE001D => "i64.atomic.store32", Memory, VOID__I32_I64, 2;
    I32AtomicRmwAdd = 0xFE001E => "i32.atomic.rmw.add", Memory, I32__I32_I32, 2;
    I64AtomicRmwAdd = 0xFE001F => "i64.atomic.rmw.add", Memory, I64__I32_I64, 3;
    I32AtomicRmw8AddU = 0xFE0020 => "i32.atomic.rmw8.add_u", Memory, I32__I32_I32, 0;
    I32AtomicRmw16AddU = 0xFE0021 => "i32.atomic.rmw16.add_u", Memory, I32__I32_I32, 1;
    I64AtomicRmw8AddU = 0xFE0022 => "i64.atomic.rmw8.add_u", Memory, I64__I32_I64, 0;
    I64AtomicRmw16AddU = 0xFE0023 => "i64.atomic.rmw16.add_u", Memory, I64__I32_I64, 1;
    I64AtomicRmw32AddU = 0xFE0024 => "i64.atomic.rmw32.add_u", Memory, I64__I32_I64, 2;
    I32AtomicRmwSub = 0xFE0025 => "i32.atomic.rmw.sub", Memory, I32__I32_I32, 2;
    I64AtomicRmwSub = 0xFE0026 => "i64.atomic.rmw.sub", Memory, I64__I32_I64, 3;
    I32AtomicRmw8SubU = 0xFE0027 => "i32.atomic.rmw8.sub_u", Memory, I32__I32_I32, 0;
    I32AtomicRmw16SubU = 0xFE0028 => "i32.atomic.rmw16.sub_u", Memory, I32__I32_I32, 1;
    I64AtomicRmw8SubU = 0xFE0029 => "i64.atomic.rmw8.sub_u", Memory, I64__I32_I64, 0;
    I64AtomicRmw16SubU = 0xFE002A => "i64.atomic.rmw16.sub_u", Memory, I64__I32_I64, 1;
    I64AtomicRmw32SubU = 0xFE002B => "i64.atomic.rmw32.sub_u", Memory, I64__I32_I64, 2;
    I32AtomicRmwAnd = 0xFE002C => "i32.atomic.rmw.and", Memory, I32__I32_I32, 2;
    I64AtomicRmwAnd = 0xFE002D => "i64.atomic.rmw.and", Memory, I64__I32_I64, 3;
    I32AtomicRmw8AndU = 0xFE002E => "i32.atomic.rmw8.and_u", Memory, I32__I32_I32, 0;
    I32AtomicRmw16AndU = 0xFE002F => "i32.atomic.rmw16.and_u", Memory, I32__I32_I32, 1;
    I64AtomicRmw8AndU = 0xFE0030 => "i64.atomic.rmw8.and_u", Memory, I64__I32_I64, 0;
    I64AtomicRmw16AndU = 0xFE0031 => "i64.atomic.rmw16.and_u", Memory, I64__I32_I64, 1;
    I64AtomicRmw32AndU = 0xFE0032 => "i64.atomic.rmw32.and_u", Memory, I64__I32_I64, 2;
    I32AtomicRmwOr = 0xFE0033 => "i32.atomic.rmw.or", Memory, I32__I32_I32, 2;
    I64AtomicRmwOr = 0xFE0034 => "i64.atomic.rmw.or", Memory, I64__I32_I64, 3;
    I32AtomicRmw8OrU = 0xFE0035 => "i32.atomic.rmw8.or_u", Memory, I32__I32_I32, 0;
    I32AtomicRmw16OrU = 0xFE0036 => "i32.atomic.rmw16.or_u", Memory, I32__I32_I32, 1;
    I64AtomicRmw8OrU = 0xFE0037 => "i64.atomic.rmw8.or_u", Memory, I64__I32_I64, 0;
    I64AtomicRmw16OrU = 0xFE0038 => "i64.atomic.rmw16.or_u", Memory, I64__I32_I64, 1;
    I64AtomicRmw32OrU = 0xFE0039 => "i64.atomic.rmw32.or_u", Memory, I64__I32_I64, 2;
    I32AtomicRmwXor = 0xFE003A => "i32.atomic.rmw.xor", Memory, I32__I32_I32, 2;
    I64AtomicRmwXor = 0xFE003B => "i64.atomic.rmw.xor", Memory, I64__I32_I64, 3;
    I32AtomicRmw8XorU = 0xFE003C => "i32.atomic.rmw8.xor_u", Memory, I32__I32_I32, 0;
    I32AtomicRmw16XorU = 0xFE003D => "i32.atomic.rmw16.xor_u", Memory, I32__I32_I32, 1;
    I64AtomicRmw8XorU = 0xFE003E => "i64.atomic.rmw8.xor_u", Memory, I64__I32_I64, 0;
    I64AtomicRmw16XorU = 0xFE003F => "i64.atomic.rmw16.xor_u", Memory, I64__I32_I64, 1;
    I64AtomicRmw32XorU = 0xFE0040 => "i64.atomic.rmw32.xor_u", Memory, I64__I32_I64, 2;
    I32AtomicRmwXchg = 0xFE0041 => "i32.atomic.rmw.xchg", Memory, I32__I32_I32, 2;
    I64AtomicRmwXchg = 0xFE0042 => "i64.atomic.rmw.xchg", Memory, I64__I32_I64, 3;
    I32AtomicRmw8XchgU = 0xFE0043 => "i32.atomic.rmw8.xchg_u", Memory, I32__I32_I32, 0;
    I32AtomicRmw16XchgU = 0xFE0044 => "i32.atomic.rmw16.xchg_u", Memory, I32__I32_I32, 1;
    I64AtomicRmw8XchgU = 0xFE0045 => "i64.atomic.rmw8.xchg_u", Memory, I64__I32_I64, 0;
    I64AtomicRmw16XchgU = 0xFE0046 => "i64.atomic.rmw16.xchg_u", Memory, I64__I32_I64, 1;
    I64AtomicRmw32XchgU = 0xFE0047 => "i64.atomic.rmw32.xchg_u", Memory, I64__I32_I64, 2;
    I32AtomicRmwCmpxchg = 0xFE0048 => "i32.atomic.rmw.cmpxchg", Memory, I32__I32_I32_I32, 2;
    I64AtomicRmwCmpxchg = 0xFE0049 => "i64.atomic.rmw.cmpxchg", Memory, I64__I32_I64_I64, 3;
    I32AtomicRmw8CmpxchgU = 0xFE004A => "i32.atomic.rmw8.cmpxchg_u", Memory, I32__I32_I32_I32, 0;
    I32AtomicRmw16CmpxchgU = 0xFE004B => "i32.atomic.rmw16.cmpxchg_u", Memory, I32__I32_I32_I32, 1;
    I64AtomicRmw8CmpxchgU = 0xFE004C => "i64.atomic.rmw8.cmpxchg_u", Memory, I64__I32_I64_I64, 0;
    I64AtomicRmw16CmpxchgU = 0xFE004D => "i64.atomic.rmw16.cmpxchg_u", Memory, I64__I32_I64_I64, 1;
    I64AtomicRmw32CmpxchgU = 0xFE004E => "i64.atomic.rmw32.cmpxchg_u", Memory, I64__I32_I64_I64, 2;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_opcodes_have_no_prefix() {
        assert_eq!(Opcode::I32Add.prefix(), None);
        assert_eq!(Opcode::I32Add.secondary(), 0x6A);
    }

    #[test]
    fn prefixed_opcodes_split() {
        assert_eq!(Opcode::MemoryInit.prefix(), Some(0xFC));
        assert_eq!(Opcode::MemoryInit.secondary(), 8);
        assert_eq!(Opcode::V128Const.prefix(), Some(0xFD));
        assert_eq!(Opcode::V128Const.secondary(), 0x0C);
        assert_eq!(Opcode::I32AtomicLoad.prefix(), Some(0xFE));
        assert_eq!(Opcode::I32AtomicLoad.secondary(), 0x10);
    }

    #[test]
    fn name_lookup_round_trips() {
        for (name, opcode) in [
            ("unreachable", Opcode::Unreachable),
            ("i32.add", Opcode::I32Add),
            ("local.get", Opcode::LocalGet),
            ("memory.init", Opcode::MemoryInit),
            ("i8x16.shuffle", Opcode::I8x16Shuffle),
            ("i64.atomic.rmw32.cmpxchg_u", Opcode::I64AtomicRmw32CmpxchgU),
        ] {
            assert_eq!(Opcode::from_name(name), Some(opcode));
            assert_eq!(opcode.name(), name);
        }

        assert_eq!(Opcode::from_name("i32.frobnicate"), None);
    }

    #[test]
    fn code_lookup_round_trips() {
        assert_eq!(Opcode::from_code(0x6A), Some(Opcode::I32Add));
        assert_eq!(Opcode::from_prefixed(0xFC, 8), Some(Opcode::MemoryInit));
        assert_eq!(Opcode::from_prefixed(0xFD, 0x0C), Some(Opcode::V128Const));
        assert_eq!(Opcode::from_code(0x0A), None);
    }

    #[test]
    fn natural_alignments() {
        assert_eq!(Opcode::I32Load.align(), 2);
        assert_eq!(Opcode::I64Load.align(), 3);
        assert_eq!(Opcode::I32Load8U.align(), 0);
        assert_eq!(Opcode::V128Load.align(), 4);
    }

    #[test]
    fn fixed_signatures_expose_their_stack_shape() {
        match Opcode::I32Add.sig() {
            SignatureCode::Fixed { params, results } => {
                assert_eq!(params, &[ValueType::I32, ValueType::I32][..]);
                assert_eq!(results, &[ValueType::I32][..]);
            }
            SignatureCode::Special => panic!("i32.add has a fixed signature"),
        }

        assert_eq!(Opcode::Call.sig(), SignatureCode::Special);
    }

    #[test]
    fn lane_counts() {
        assert_eq!(Opcode::I8x16ExtractLaneS.imm().lane_count(), Some(16));
        assert_eq!(Opcode::I64x2ExtractLane.imm().lane_count(), Some(2));
        assert_eq!(Opcode::V128Load32Lane.imm().lane_count(), Some(4));
        assert_eq!(Opcode::I32Add.imm().lane_count(), None);
    }
}
