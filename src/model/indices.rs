//! Zero-based index spaces. Each class of definition has its own space; the
//! spaces for functions, tables, memories, globals and events include the
//! imports declared in the same module, whose indices precede those of local
//! definitions.

pub type TypeIndex = u32;
pub type FunctionIndex = u32;
pub type TableIndex = u32;
pub type MemoryIndex = u32;
pub type GlobalIndex = u32;
pub type EventIndex = u32;
pub type ElementIndex = u32;
pub type DataIndex = u32;
pub type LocalIndex = u32;
pub type LabelIndex = u32;
