//! The module: every entity the module format defines, its index spaces, and
//! the identifier maps that resolve `$names` to numeric indices.
//!
//! Imports prepend their entries to the corresponding index space, so imported
//! functions occupy indices `0..imported_function_count` and locally defined
//! functions follow. Cross-entity links are indices, never references, which
//! keeps serialisation a straight index write.

use indexmap::IndexMap;

use crate::encodings::{ExternalKind, Limits, Mutability, RelocationType, SectionKind, ValueType};
use crate::model::errors::ModelError;
use crate::model::types::{Expression, Local, Signature, TypeUse};

/// An entry of the type section.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeDeclaration {
    pub id: Option<String>,
    pub signature: Signature,
}

/// An entry of the import section. The payload lives in the target index
/// space; the import records only the two-level name and where it points.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportDeclaration {
    pub module: String,
    pub field: String,
    pub kind: ExternalKind,
    /// Index into the target space (always below the imported count).
    pub index: u32,
}

/// An entry of the function index space: a type use. The body is a separate
/// [`CodeEntry`] with the same number for locally defined functions.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDeclaration {
    pub id: Option<String>,
    pub type_use: TypeUse,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableDeclaration {
    pub id: Option<String>,
    pub ref_type: ValueType,
    pub limits: Limits,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MemoryDeclaration {
    pub id: Option<String>,
    pub limits: Limits,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GlobalDeclaration {
    pub id: Option<String>,
    pub value_type: ValueType,
    pub mutability: Mutability,
    /// Absent for imported globals.
    pub initializer: Option<Expression>,
}

/// An exception event: an attribute byte plus a signature reference.
#[derive(Clone, Debug, PartialEq)]
pub struct EventDeclaration {
    pub id: Option<String>,
    pub attribute: u32,
    pub type_use: TypeUse,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExportDeclaration {
    pub name: String,
    pub kind: ExternalKind,
    pub index: u32,
}

/// Element segment flag bits, as the binary format spells them.
pub const ELEMENT_PASSIVE: u32 = 0x1;
pub const ELEMENT_EXPLICIT_INDEX: u32 = 0x2;
pub const ELEMENT_EXPRESSIONS: u32 = 0x4;

/// An element segment: either a function-index list or a list of reference
/// expressions, active (table + offset), passive, or declarative.
#[derive(Clone, Debug, PartialEq)]
pub struct ElementDeclaration {
    pub id: Option<String>,
    pub flags: u32,
    pub table_index: u32,
    pub ref_type: ValueType,
    /// Present iff the segment is active.
    pub offset: Option<Expression>,
    pub function_indexes: Vec<u32>,
    pub ref_expressions: Vec<Expression>,
}

impl ElementDeclaration {
    pub fn is_active(&self) -> bool {
        self.flags & ELEMENT_PASSIVE == 0
    }

    pub fn uses_expressions(&self) -> bool {
        self.flags & ELEMENT_EXPRESSIONS != 0
    }
}

/// Data segment flag bits.
pub const DATA_PASSIVE: u32 = 0x1;
pub const DATA_EXPLICIT_INDEX: u32 = 0x2;

#[derive(Clone, Debug, PartialEq)]
pub struct DataSegment {
    pub id: Option<String>,
    pub flags: u32,
    pub memory_index: u32,
    /// Present iff the segment is active.
    pub offset: Option<Expression>,
    pub bytes: Vec<u8>,
}

impl DataSegment {
    pub fn is_active(&self) -> bool {
        self.flags & DATA_PASSIVE == 0
    }
}

/// The body of a locally defined function: locals plus instructions. The
/// local identifier map is snapshotted at `end_code_entry` so printers can
/// reopen it by function number.
#[derive(Clone, Debug, Default)]
pub struct CodeEntry {
    /// The function-space index this body belongs to.
    pub number: u32,
    pub locals: Vec<Local>,
    pub expression: Expression,
    pub local_ids: IndexMap<String, u32>,
}

/// An unrecognised custom section, retained verbatim.
#[derive(Clone, Debug, PartialEq)]
pub struct CustomSection {
    /// The known section after which this one appeared (Custom = the start).
    pub placement: SectionKind,
    pub name: String,
    pub bytes: Vec<u8>,
}

/// One entry of a `reloc.*` custom section.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RelocationEntry {
    pub kind: RelocationType,
    pub offset: u32,
    pub index: u32,
    pub addend: Option<i32>,
}

/// A decoded `reloc.*` custom section.
#[derive(Clone, Debug, PartialEq)]
pub struct RelocationSection {
    pub name: String,
    pub target_section: u32,
    pub entries: Vec<RelocationEntry>,
}

/// A decoded `linking` custom section. Subsection payloads are retained
/// opaquely; a duplicated subsection keeps only the final occurrence.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinkingSection {
    pub version: u32,
    pub subsections: Vec<(u8, Vec<u8>)>,
}

/// An identifier map for one index space. Insertion order is observable.
#[derive(Clone, Debug, Default)]
pub struct IdMap {
    ids: IndexMap<String, u32>,
}

impl IdMap {
    pub fn bind(&mut self, id: &str, index: u32) -> Result<(), ModelError> {
        if self.ids.contains_key(id) {
            return Err(ModelError::DuplicateId(id.to_string()));
        }

        self.ids.insert(id.to_string(), index);

        Ok(())
    }

    pub fn resolve(&self, id: &str) -> Option<u32> {
        self.ids.get(id).copied()
    }

    pub fn name_of(&self, index: u32) -> Option<&str> {
        self.ids
            .iter()
            .find(|(_, &bound)| bound == index)
            .map(|(name, _)| name.as_str())
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn snapshot(&self) -> IndexMap<String, u32> {
        self.ids.clone()
    }
}

/// The index spaces an identifier can belong to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IdSpace {
    Type,
    Function,
    Table,
    Memory,
    Global,
    Event,
    Element,
    Data,
}

#[derive(Debug, Default)]
pub struct Module {
    pub id: Option<String>,

    types: Vec<TypeDeclaration>,
    imports: Vec<ImportDeclaration>,
    functions: Vec<FunctionDeclaration>,
    tables: Vec<TableDeclaration>,
    memories: Vec<MemoryDeclaration>,
    globals: Vec<GlobalDeclaration>,
    events: Vec<EventDeclaration>,
    exports: Vec<ExportDeclaration>,
    elements: Vec<ElementDeclaration>,
    data: Vec<DataSegment>,
    code: Vec<CodeEntry>,
    start: Option<u32>,

    imported_functions: u32,
    imported_tables: u32,
    imported_memories: u32,
    imported_globals: u32,
    imported_events: u32,

    type_ids: IdMap,
    function_ids: IdMap,
    table_ids: IdMap,
    memory_ids: IdMap,
    global_ids: IdMap,
    event_ids: IdMap,
    element_ids: IdMap,
    data_ids: IdMap,

    // Per-function state, live between start_code_entry and end_code_entry.
    local_ids: IdMap,
    local_count: u32,
    labels: Vec<Option<String>>,

    data_count: Option<u32>,
    needs_data_count: bool,

    customs: Vec<CustomSection>,
    relocations: Vec<RelocationSection>,
    linking: Option<LinkingSection>,
}

impl Module {
    pub fn new() -> Self {
        Module::default()
    }

    // --- type space ---

    pub fn types(&self) -> &[TypeDeclaration] {
        &self.types
    }

    pub fn type_declaration(&self, index: u32) -> Option<&TypeDeclaration> {
        self.types.get(index as usize)
    }

    pub fn signature(&self, index: u32) -> Option<&Signature> {
        self.types.get(index as usize).map(|decl| &decl.signature)
    }

    pub fn add_type(&mut self, declaration: TypeDeclaration) -> Result<u32, ModelError> {
        let index = self.types.len() as u32;

        if let Some(id) = &declaration.id {
            self.type_ids.bind(id, index)?;
        }

        self.types.push(declaration);

        Ok(index)
    }

    /// The index of a matching signature, appending a fresh anonymous type
    /// when none exists yet.
    pub fn type_for(&mut self, signature: &Signature) -> u32 {
        if let Some(index) = self
            .types
            .iter()
            .position(|decl| &decl.signature == signature)
        {
            return index as u32;
        }

        let index = self.types.len() as u32;

        self.types.push(TypeDeclaration {
            id: None,
            signature: signature.clone(),
        });

        index
    }

    // --- imports ---

    pub fn imports(&self) -> &[ImportDeclaration] {
        &self.imports
    }

    pub fn add_import(&mut self, module: String, field: String, kind: ExternalKind, index: u32) {
        self.imports.push(ImportDeclaration {
            module,
            field,
            kind,
            index,
        });
    }

    // --- function space ---

    pub fn functions(&self) -> &[FunctionDeclaration] {
        &self.functions
    }

    pub fn function(&self, index: u32) -> Option<&FunctionDeclaration> {
        self.functions.get(index as usize)
    }

    pub fn imported_function_count(&self) -> u32 {
        self.imported_functions
    }

    pub fn add_function(&mut self, declaration: FunctionDeclaration) -> Result<u32, ModelError> {
        let index = self.functions.len() as u32;

        if let Some(id) = &declaration.id {
            self.function_ids.bind(id, index)?;
        }

        self.functions.push(declaration);

        Ok(index)
    }

    pub fn import_function(
        &mut self,
        module: String,
        field: String,
        declaration: FunctionDeclaration,
    ) -> Result<u32, ModelError> {
        let index = self.add_function(declaration)?;

        self.imported_functions += 1;
        self.add_import(module, field, ExternalKind::Function, index);

        Ok(index)
    }

    // --- table space ---

    pub fn tables(&self) -> &[TableDeclaration] {
        &self.tables
    }

    pub fn table(&self, index: u32) -> Option<&TableDeclaration> {
        self.tables.get(index as usize)
    }

    pub fn imported_table_count(&self) -> u32 {
        self.imported_tables
    }

    pub fn add_table(&mut self, declaration: TableDeclaration) -> Result<u32, ModelError> {
        let index = self.tables.len() as u32;

        if let Some(id) = &declaration.id {
            self.table_ids.bind(id, index)?;
        }

        self.tables.push(declaration);

        Ok(index)
    }

    pub fn import_table(
        &mut self,
        module: String,
        field: String,
        declaration: TableDeclaration,
    ) -> Result<u32, ModelError> {
        let index = self.add_table(declaration)?;

        self.imported_tables += 1;
        self.add_import(module, field, ExternalKind::Table, index);

        Ok(index)
    }

    // --- memory space ---

    pub fn memories(&self) -> &[MemoryDeclaration] {
        &self.memories
    }

    pub fn memory(&self, index: u32) -> Option<&MemoryDeclaration> {
        self.memories.get(index as usize)
    }

    pub fn imported_memory_count(&self) -> u32 {
        self.imported_memories
    }

    pub fn add_memory(&mut self, declaration: MemoryDeclaration) -> Result<u32, ModelError> {
        let index = self.memories.len() as u32;

        if let Some(id) = &declaration.id {
            self.memory_ids.bind(id, index)?;
        }

        self.memories.push(declaration);

        Ok(index)
    }

    pub fn import_memory(
        &mut self,
        module: String,
        field: String,
        declaration: MemoryDeclaration,
    ) -> Result<u32, ModelError> {
        let index = self.add_memory(declaration)?;

        self.imported_memories += 1;
        self.add_import(module, field, ExternalKind::Memory, index);

        Ok(index)
    }

    // --- global space ---

    pub fn globals(&self) -> &[GlobalDeclaration] {
        &self.globals
    }

    pub fn global(&self, index: u32) -> Option<&GlobalDeclaration> {
        self.globals.get(index as usize)
    }

    pub fn imported_global_count(&self) -> u32 {
        self.imported_globals
    }

    pub fn add_global(&mut self, declaration: GlobalDeclaration) -> Result<u32, ModelError> {
        let index = self.globals.len() as u32;

        if let Some(id) = &declaration.id {
            self.global_ids.bind(id, index)?;
        }

        self.globals.push(declaration);

        Ok(index)
    }

    pub fn import_global(
        &mut self,
        module: String,
        field: String,
        declaration: GlobalDeclaration,
    ) -> Result<u32, ModelError> {
        let index = self.add_global(declaration)?;

        self.imported_globals += 1;
        self.add_import(module, field, ExternalKind::Global, index);

        Ok(index)
    }

    // --- event space ---

    pub fn events(&self) -> &[EventDeclaration] {
        &self.events
    }

    pub fn event(&self, index: u32) -> Option<&EventDeclaration> {
        self.events.get(index as usize)
    }

    pub fn imported_event_count(&self) -> u32 {
        self.imported_events
    }

    pub fn import_event(
        &mut self,
        module: String,
        field: String,
        declaration: EventDeclaration,
    ) -> Result<u32, ModelError> {
        let index = self.events.len() as u32;

        if let Some(id) = &declaration.id {
            self.event_ids.bind(id, index)?;
        }

        self.events.push(declaration);
        self.imported_events += 1;
        self.add_import(module, field, ExternalKind::Event, index);

        Ok(index)
    }

    // --- exports, start ---

    pub fn exports(&self) -> &[ExportDeclaration] {
        &self.exports
    }

    pub fn add_export(&mut self, declaration: ExportDeclaration) {
        self.exports.push(declaration);
    }

    /// The export naming the given target, if any. Used for C naming.
    pub fn export_of(&self, kind: ExternalKind, index: u32) -> Option<&ExportDeclaration> {
        self.exports
            .iter()
            .find(|export| export.kind == kind && export.index == index)
    }

    pub fn start(&self) -> Option<u32> {
        self.start
    }

    pub fn set_start(&mut self, function: u32) {
        self.start = Some(function);
    }

    // --- elements, data, code ---

    pub fn elements(&self) -> &[ElementDeclaration] {
        &self.elements
    }

    pub fn add_element(&mut self, declaration: ElementDeclaration) -> Result<u32, ModelError> {
        let index = self.elements.len() as u32;

        if let Some(id) = &declaration.id {
            self.element_ids.bind(id, index)?;
        }

        self.elements.push(declaration);

        Ok(index)
    }

    pub fn data_segments(&self) -> &[DataSegment] {
        &self.data
    }

    pub fn add_data_segment(&mut self, segment: DataSegment) -> Result<u32, ModelError> {
        let index = self.data.len() as u32;

        if let Some(id) = &segment.id {
            self.data_ids.bind(id, index)?;
        }

        self.data.push(segment);

        Ok(index)
    }

    pub fn code_entries(&self) -> &[CodeEntry] {
        &self.code
    }

    pub fn code_entry(&self, number: u32) -> Option<&CodeEntry> {
        self.code
            .iter()
            .find(|entry| entry.number == number)
    }

    pub fn add_code_entry(&mut self, entry: CodeEntry) {
        self.code.push(entry);
    }

    // --- per-function state ---

    /// Opens a code entry: clears the local identifier map and label stack.
    pub fn start_code_entry(&mut self) {
        self.local_ids.clear();
        self.local_count = 0;
        self.labels.clear();
    }

    /// Closes the entry and hands back the finished local identifier map.
    pub fn end_code_entry(&mut self) -> IndexMap<String, u32> {
        self.labels.clear();
        self.local_count = 0;

        let snapshot = self.local_ids.snapshot();
        self.local_ids.clear();

        snapshot
    }

    /// Registers the next local (or parameter), optionally named.
    pub fn add_local_binding(&mut self, id: Option<&str>) -> Result<u32, ModelError> {
        let index = self.local_count;
        self.local_count += 1;

        if let Some(id) = id {
            self.local_ids.bind(id, index)?;
        }

        Ok(index)
    }

    pub fn resolve_local(&self, id: &str) -> Option<u32> {
        self.local_ids.resolve(id)
    }

    /// Pushes a label for an entered block. Index 0 names the innermost.
    pub fn push_label(&mut self, id: Option<String>) {
        self.labels.push(id);
    }

    pub fn pop_label(&mut self) {
        self.labels.pop();
    }

    pub fn label_depth(&self) -> u32 {
        self.labels.len() as u32
    }

    /// Resolves a label id to its relative depth from the innermost block.
    pub fn resolve_label(&self, id: &str) -> Option<u32> {
        self.labels
            .iter()
            .rev()
            .position(|label| label.as_deref() == Some(id))
            .map(|depth| depth as u32)
    }

    // --- id resolution ---

    pub fn bind_id(&mut self, space: IdSpace, id: &str, index: u32) -> Result<(), ModelError> {
        self.ids_mut(space).bind(id, index)
    }

    pub fn resolve_id(&self, space: IdSpace, id: &str) -> Option<u32> {
        self.ids(space).resolve(id)
    }

    pub fn id_of(&self, space: IdSpace, index: u32) -> Option<&str> {
        self.ids(space).name_of(index)
    }

    fn ids(&self, space: IdSpace) -> &IdMap {
        match space {
            IdSpace::Type => &self.type_ids,
            IdSpace::Function => &self.function_ids,
            IdSpace::Table => &self.table_ids,
            IdSpace::Memory => &self.memory_ids,
            IdSpace::Global => &self.global_ids,
            IdSpace::Event => &self.event_ids,
            IdSpace::Element => &self.element_ids,
            IdSpace::Data => &self.data_ids,
        }
    }

    fn ids_mut(&mut self, space: IdSpace) -> &mut IdMap {
        match space {
            IdSpace::Type => &mut self.type_ids,
            IdSpace::Function => &mut self.function_ids,
            IdSpace::Table => &mut self.table_ids,
            IdSpace::Memory => &mut self.memory_ids,
            IdSpace::Global => &mut self.global_ids,
            IdSpace::Event => &mut self.event_ids,
            IdSpace::Element => &mut self.element_ids,
            IdSpace::Data => &mut self.data_ids,
        }
    }

    // --- data count ---

    pub fn data_count(&self) -> Option<u32> {
        self.data_count
    }

    pub fn set_data_count(&mut self, count: u32) {
        self.data_count = Some(count);
    }

    /// Raised when `memory.init` or `data.drop` is decoded or validated.
    pub fn flag_data_count_needed(&mut self) {
        self.needs_data_count = true;
    }

    pub fn needs_data_count(&self) -> bool {
        self.needs_data_count
    }

    /// Synthesises the data-count section when instructions demand one and
    /// the input lacked it. Idempotent.
    pub fn make_data_count_section(&mut self) {
        if self.needs_data_count && self.data_count.is_none() {
            self.data_count = Some(self.data.len() as u32);
        }
    }

    // --- custom metadata ---

    pub fn customs(&self) -> &[CustomSection] {
        &self.customs
    }

    pub fn add_custom(&mut self, section: CustomSection) {
        self.customs.push(section);
    }

    pub fn relocations(&self) -> &[RelocationSection] {
        &self.relocations
    }

    pub fn add_relocation_section(&mut self, section: RelocationSection) {
        self.relocations.push(section);
    }

    pub fn linking(&self) -> Option<&LinkingSection> {
        self.linking.as_ref()
    }

    pub fn set_linking(&mut self, section: LinkingSection) {
        self.linking = Some(section);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encodings::Limits;

    fn signature_i32() -> Signature {
        Signature::from_types(vec![ValueType::I32], vec![ValueType::I32])
    }

    #[test]
    fn imports_precede_local_functions() {
        let mut module = Module::new();
        let type_index = module
            .add_type(TypeDeclaration {
                id: None,
                signature: signature_i32(),
            })
            .unwrap();

        let imported = module
            .import_function(
                "env".into(),
                "mirror".into(),
                FunctionDeclaration {
                    id: None,
                    type_use: TypeUse::new(type_index, signature_i32()),
                },
            )
            .unwrap();

        let local = module
            .add_function(FunctionDeclaration {
                id: Some("double".into()),
                type_use: TypeUse::new(type_index, signature_i32()),
            })
            .unwrap();

        assert_eq!(imported, 0);
        assert_eq!(local, 1);
        assert_eq!(module.imported_function_count(), 1);
        assert_eq!(module.resolve_id(IdSpace::Function, "double"), Some(1));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut module = Module::new();

        module
            .add_memory(MemoryDeclaration {
                id: Some("heap".into()),
                limits: Limits::unbounded(1),
            })
            .unwrap();

        let duplicate = module.add_memory(MemoryDeclaration {
            id: Some("heap".into()),
            limits: Limits::unbounded(2),
        });

        assert_eq!(duplicate, Err(ModelError::DuplicateId("heap".into())));
    }

    #[test]
    fn unknown_ids_do_not_resolve() {
        let module = Module::new();

        assert_eq!(module.resolve_id(IdSpace::Table, "missing"), None);
    }

    #[test]
    fn type_for_reuses_matching_signatures() {
        let mut module = Module::new();

        let first = module.type_for(&signature_i32());
        let second = module.type_for(&signature_i32());
        let third = module.type_for(&Signature::from_types(vec![], vec![]));

        assert_eq!(first, second);
        assert_ne!(first, third);
        assert_eq!(module.types().len(), 2);
    }

    #[test]
    fn labels_resolve_to_relative_depth() {
        let mut module = Module::new();
        module.start_code_entry();

        module.push_label(Some("outer".into()));
        module.push_label(None);
        module.push_label(Some("inner".into()));

        assert_eq!(module.resolve_label("inner"), Some(0));
        assert_eq!(module.resolve_label("outer"), Some(2));
        assert_eq!(module.resolve_label("missing"), None);

        module.pop_label();

        assert_eq!(module.resolve_label("outer"), Some(1));
    }

    #[test]
    fn code_entry_snapshots_local_ids() {
        let mut module = Module::new();
        module.start_code_entry();

        module.add_local_binding(Some("x")).unwrap();
        module.add_local_binding(None).unwrap();
        module.add_local_binding(Some("y")).unwrap();

        assert_eq!(module.resolve_local("y"), Some(2));

        let snapshot = module.end_code_entry();

        assert_eq!(snapshot.get("x"), Some(&0));
        assert_eq!(snapshot.get("y"), Some(&2));
        assert_eq!(module.resolve_local("x"), None);
    }

    #[test]
    fn make_data_count_section_is_idempotent() {
        let mut module = Module::new();

        module
            .add_data_segment(DataSegment {
                id: None,
                flags: DATA_PASSIVE,
                memory_index: 0,
                offset: None,
                bytes: vec![1, 2, 3],
            })
            .unwrap();

        module.make_data_count_section();
        assert_eq!(module.data_count(), None);

        module.flag_data_count_needed();
        module.make_data_count_section();
        assert_eq!(module.data_count(), Some(1));

        module.make_data_count_section();
        assert_eq!(module.data_count(), Some(1));
    }
}
