//! Enumerations shared by every codec: value types, section kinds, external
//! kinds, limits, mutability, and the relocation/linking metadata enums.
//!
//! Value types are encoded as signed LEB128 negative codes; sections and
//! external kinds as plain bytes.

pub mod opcodes;

pub use opcodes::{ImmediateKind, Opcode, OpcodeInfo, SignatureCode};

use std::fmt;

/// A WebAssembly value type, including the block pseudo-type `void` and the
/// parser-only `nullref` placeholder used during validation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
    V128,
    FuncRef,
    AnyRef,
    NullRef,
    ExnRef,
    Void,
}

impl ValueType {
    /// The signed LEB128 code in the binary format.
    pub fn code(self) -> i32 {
        match self {
            ValueType::I32 => -1,
            ValueType::I64 => -2,
            ValueType::F32 => -3,
            ValueType::F64 => -4,
            ValueType::V128 => -5,
            ValueType::FuncRef => -16,
            ValueType::AnyRef => -17,
            ValueType::NullRef => -18,
            ValueType::ExnRef => -24,
            ValueType::Void => -64,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(ValueType::I32),
            -2 => Some(ValueType::I64),
            -3 => Some(ValueType::F32),
            -4 => Some(ValueType::F64),
            -5 => Some(ValueType::V128),
            -16 => Some(ValueType::FuncRef),
            -17 => Some(ValueType::AnyRef),
            -18 => Some(ValueType::NullRef),
            -24 => Some(ValueType::ExnRef),
            -64 => Some(ValueType::Void),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "i32" => Some(ValueType::I32),
            "i64" => Some(ValueType::I64),
            "f32" => Some(ValueType::F32),
            "f64" => Some(ValueType::F64),
            "v128" => Some(ValueType::V128),
            "funcref" | "anyfunc" => Some(ValueType::FuncRef),
            "anyref" | "externref" => Some(ValueType::AnyRef),
            "nullref" => Some(ValueType::NullRef),
            "exnref" => Some(ValueType::ExnRef),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
            ValueType::V128 => "v128",
            ValueType::FuncRef => "funcref",
            ValueType::AnyRef => "anyref",
            ValueType::NullRef => "nullref",
            ValueType::ExnRef => "exnref",
            ValueType::Void => "void",
        }
    }

    /// Whether this type may appear as a local, parameter, or result.
    pub fn is_concrete(self) -> bool {
        !matches!(self, ValueType::Void | ValueType::NullRef)
    }

    pub fn is_reference(self) -> bool {
        matches!(
            self,
            ValueType::FuncRef | ValueType::AnyRef | ValueType::NullRef | ValueType::ExnRef
        )
    }

    /// The C type used by the code generator.
    pub fn c_name(self) -> &'static str {
        match self {
            ValueType::I32 => "int32_t",
            ValueType::I64 => "int64_t",
            ValueType::F32 => "float",
            ValueType::F64 => "double",
            ValueType::V128 => "V128",
            ValueType::Void => "void",
            _ => "void*",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Binary section identifiers, in canonical emission order.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum SectionKind {
    Custom = 0,
    Type = 1,
    Import = 2,
    Function = 3,
    Table = 4,
    Memory = 5,
    Global = 6,
    Export = 7,
    Start = 8,
    Element = 9,
    Code = 10,
    Data = 11,
    DataCount = 12,
}

impl SectionKind {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(SectionKind::Custom),
            1 => Some(SectionKind::Type),
            2 => Some(SectionKind::Import),
            3 => Some(SectionKind::Function),
            4 => Some(SectionKind::Table),
            5 => Some(SectionKind::Memory),
            6 => Some(SectionKind::Global),
            7 => Some(SectionKind::Export),
            8 => Some(SectionKind::Start),
            9 => Some(SectionKind::Element),
            10 => Some(SectionKind::Code),
            11 => Some(SectionKind::Data),
            12 => Some(SectionKind::DataCount),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SectionKind::Custom => "custom",
            SectionKind::Type => "type",
            SectionKind::Import => "import",
            SectionKind::Function => "function",
            SectionKind::Table => "table",
            SectionKind::Memory => "memory",
            SectionKind::Global => "global",
            SectionKind::Export => "export",
            SectionKind::Start => "start",
            SectionKind::Element => "element",
            SectionKind::Code => "code",
            SectionKind::Data => "data",
            SectionKind::DataCount => "data count",
        }
    }

    /// The canonical binary emission order. Custom sections float.
    pub const EMISSION_ORDER: [SectionKind; 12] = [
        SectionKind::Type,
        SectionKind::Import,
        SectionKind::Function,
        SectionKind::Table,
        SectionKind::Memory,
        SectionKind::Global,
        SectionKind::Export,
        SectionKind::Start,
        SectionKind::Element,
        SectionKind::DataCount,
        SectionKind::Code,
        SectionKind::Data,
    ];
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The kind of an import or export target.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ExternalKind {
    Function = 0,
    Table = 1,
    Memory = 2,
    Global = 3,
    Event = 4,
}

impl ExternalKind {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(ExternalKind::Function),
            1 => Some(ExternalKind::Table),
            2 => Some(ExternalKind::Memory),
            3 => Some(ExternalKind::Global),
            4 => Some(ExternalKind::Event),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "func" => Some(ExternalKind::Function),
            "table" => Some(ExternalKind::Table),
            "memory" => Some(ExternalKind::Memory),
            "global" => Some(ExternalKind::Global),
            "event" => Some(ExternalKind::Event),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ExternalKind::Function => "func",
            ExternalKind::Table => "table",
            ExternalKind::Memory => "memory",
            ExternalKind::Global => "global",
            ExternalKind::Event => "event",
        }
    }
}

impl fmt::Display for ExternalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Global (and local, in the text format) mutability.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Mutability {
    Const = 0,
    Var = 1,
}

impl Mutability {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Mutability::Const),
            1 => Some(Mutability::Var),
            _ => None,
        }
    }
}

/// Size limits for tables and memories. The binary flags byte carries
/// `has max` (bit 0) and `shared` (bit 1).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Limits {
    pub min: u32,
    pub max: Option<u32>,
    pub shared: bool,
}

impl Limits {
    pub const HAS_MAX: u8 = 0x01;
    pub const IS_SHARED: u8 = 0x02;

    pub fn unbounded(min: u32) -> Self {
        Limits {
            min,
            max: None,
            shared: false,
        }
    }

    pub fn bounded(min: u32, max: u32) -> Self {
        Limits {
            min,
            max: Some(max),
            shared: false,
        }
    }

    pub fn flags(&self) -> u8 {
        let mut flags = 0;

        if self.max.is_some() {
            flags |= Limits::HAS_MAX;
        }

        if self.shared {
            flags |= Limits::IS_SHARED;
        }

        flags
    }

    /// `min <= max` whenever a maximum is present.
    pub fn is_well_formed(&self) -> bool {
        self.max.map_or(true, |max| self.min <= max)
    }
}

impl fmt::Display for Limits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.min)?;

        if let Some(max) = self.max {
            write!(f, " {}", max)?;
        }

        if self.shared {
            write!(f, " shared")?;
        }

        Ok(())
    }
}

/// Relocation entry kinds recognised in `reloc.*` custom sections.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RelocationType {
    FunctionIndexLeb = 0,
    TableIndexSleb = 1,
    TableIndexI32 = 2,
    MemoryAddrLeb = 3,
    MemoryAddrSleb = 4,
    MemoryAddrI32 = 5,
    TypeIndexLeb = 6,
    GlobalIndexLeb = 7,
    FunctionOffsetI32 = 8,
    SectionOffsetI32 = 9,
    EventIndexLeb = 10,
    MemoryAddrRelSleb = 11,
    TableIndexRelSleb = 12,
}

impl RelocationType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        use RelocationType::*;

        match byte {
            0 => Some(FunctionIndexLeb),
            1 => Some(TableIndexSleb),
            2 => Some(TableIndexI32),
            3 => Some(MemoryAddrLeb),
            4 => Some(MemoryAddrSleb),
            5 => Some(MemoryAddrI32),
            6 => Some(TypeIndexLeb),
            7 => Some(GlobalIndexLeb),
            8 => Some(FunctionOffsetI32),
            9 => Some(SectionOffsetI32),
            10 => Some(EventIndexLeb),
            11 => Some(MemoryAddrRelSleb),
            12 => Some(TableIndexRelSleb),
            _ => None,
        }
    }

    /// Whether entries of this type carry an addend.
    pub fn has_addend(self) -> bool {
        use RelocationType::*;

        matches!(
            self,
            MemoryAddrLeb
                | MemoryAddrSleb
                | MemoryAddrI32
                | FunctionOffsetI32
                | SectionOffsetI32
                | MemoryAddrRelSleb
        )
    }
}

/// Subsection kinds recognised in the `linking` custom section.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LinkingType {
    SegmentInfo = 5,
    InitFuncs = 6,
    ComdatInfo = 7,
    SymbolTable = 8,
}

impl LinkingType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            5 => Some(LinkingType::SegmentInfo),
            6 => Some(LinkingType::InitFuncs),
            7 => Some(LinkingType::ComdatInfo),
            8 => Some(LinkingType::SymbolTable),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_type_codes_round_trip() {
        for kind in [
            ValueType::I32,
            ValueType::I64,
            ValueType::F32,
            ValueType::F64,
            ValueType::V128,
            ValueType::FuncRef,
            ValueType::AnyRef,
            ValueType::ExnRef,
            ValueType::Void,
        ] {
            assert_eq!(ValueType::from_code(kind.code()), Some(kind));
        }
    }

    #[test]
    fn value_type_names_round_trip() {
        for name in ["i32", "i64", "f32", "f64", "v128", "funcref", "anyref", "exnref"] {
            let kind = ValueType::from_name(name).unwrap();

            assert_eq!(kind.name(), name);
        }
    }

    #[test]
    fn void_is_not_concrete() {
        assert!(!ValueType::Void.is_concrete());
        assert!(!ValueType::NullRef.is_concrete());
        assert!(ValueType::FuncRef.is_concrete());
    }

    #[test]
    fn section_kinds_map_to_their_ids() {
        for byte in 0..=12u8 {
            let kind = SectionKind::from_byte(byte).unwrap();

            assert_eq!(kind as u8, byte);
        }

        assert_eq!(SectionKind::from_byte(13), None);
    }

    #[test]
    fn limits_flags() {
        assert_eq!(Limits::unbounded(1).flags(), 0);
        assert_eq!(Limits::bounded(1, 2).flags(), Limits::HAS_MAX);

        let shared = Limits {
            min: 1,
            max: Some(2),
            shared: true,
        };

        assert_eq!(shared.flags(), Limits::HAS_MAX | Limits::IS_SHARED);
    }

    #[test]
    fn limits_reject_min_above_max() {
        assert!(!Limits::bounded(3, 2).is_well_formed());
        assert!(Limits::bounded(2, 2).is_well_formed());
        assert!(Limits::unbounded(u32::MAX).is_well_formed());
    }

    #[test]
    fn relocation_addends() {
        assert!(RelocationType::MemoryAddrLeb.has_addend());
        assert!(!RelocationType::FunctionIndexLeb.has_addend());
    }
}
