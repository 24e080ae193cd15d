//! The text-format parser.
//!
//! Parsing is two-pass: a pre-scan walks the top-level forms of the module and
//! classifies each into a section kind (a `(func …)`, `(table …)`,
//! `(memory …)` or `(global …)` form immediately containing `(import …)` is
//! reclassified as an import). The sections are then parsed in canonical
//! order by seeking back to the recorded token positions, so every identifier
//! is registered before its users parse. Function bodies are deferred to a
//! final pass for the same reason.

use log::debug;

use crate::diagnostics::Diagnostics;
use crate::encodings::{ExternalKind, ImmediateKind, Limits, Mutability, Opcode, ValueType};
use crate::instruction::{BlockType, Immediate, Instruction};
use crate::model::{
    CodeEntry, DataSegment, ElementDeclaration, EventDeclaration, ExportDeclaration, Expression,
    FunctionDeclaration, GlobalDeclaration, IdSpace, Local, MemoryDeclaration, Module, Param,
    Signature, TableDeclaration, TypeDeclaration, TypeUse, DATA_EXPLICIT_INDEX, DATA_PASSIVE,
    ELEMENT_EXPLICIT_INDEX, ELEMENT_EXPRESSIONS, ELEMENT_PASSIVE,
};
use crate::text::lexer::tokenize;
use crate::text::tokens::{TokenBuffer, TokenKind};

/// Parses `(module …)` source text. Problems are accumulated; the returned
/// module holds everything that could be salvaged.
pub fn parse_text(source: &str, diagnostics: &mut Diagnostics) -> Module {
    let tokens = tokenize(source, diagnostics);
    let mut parser = Parser { tokens, diagnostics };

    parser.parse_module()
}

/// The section a top-level form belongs to, assigned by the pre-scan.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum FieldKind {
    Type,
    Import,
    Function,
    Table,
    Memory,
    Global,
    Export,
    Start,
    Element,
    Data,
}

const FIELD_ORDER: [FieldKind; 10] = [
    FieldKind::Type,
    FieldKind::Import,
    FieldKind::Function,
    FieldKind::Table,
    FieldKind::Memory,
    FieldKind::Global,
    FieldKind::Export,
    FieldKind::Start,
    FieldKind::Element,
    FieldKind::Data,
];

pub(crate) struct Parser<'a> {
    pub tokens: TokenBuffer,
    pub diagnostics: &'a mut Diagnostics,
}

impl Parser<'_> {
    pub(crate) fn new(tokens: TokenBuffer, diagnostics: &mut Diagnostics) -> Parser<'_> {
        Parser { tokens, diagnostics }
    }

    fn fail(&mut self, message: impl Into<String>) {
        let pos = self.tokens.source_pos();
        self.diagnostics.error_at(pos, message);
    }

    fn expect_close(&mut self) {
        if !self.tokens.get_parenthesis(')') {
            self.fail("missing ')'");
            self.tokens.recover();
        }
    }

    fn expect_open(&mut self) -> bool {
        if self.tokens.get_parenthesis('(') {
            true
        } else {
            self.fail("missing '('");
            false
        }
    }

    /// Parses a whole `(module …)` form.
    pub fn parse_module(&mut self) -> Module {
        if !self.tokens.get_parenthesis('(') || !self.tokens.get_keyword("module") {
            self.fail("expected '(module'");
            return Module::new();
        }

        self.parse_module_rest()
    }

    /// Parses module contents after `(module` has been consumed.
    pub(crate) fn parse_module_rest(&mut self) -> Module {
        let mut module = Module::new();
        module.id = self.tokens.get_id();

        let fields = self.prescan();
        let mut bodies: Vec<(u32, usize)> = Vec::new();

        for kind in FIELD_ORDER {
            for &(field, position) in fields.iter().filter(|(field, _)| *field == kind) {
                self.tokens.set_position(position);
                self.tokens.get_parenthesis('(');

                self.parse_field(&mut module, field, &mut bodies);
            }
        }

        // Function bodies run last, with every index space fully populated.
        for &(index, position) in &bodies {
            self.tokens.set_position(position);
            self.parse_code_body(&mut module, index);
        }

        // The cursor position after the scan is already at the module's ')'.
        self.seek_module_end(&fields);
        self.expect_close();

        module
    }

    /// Walks the top-level forms, classifying each and recording its token
    /// position, then leaves the cursor at the module's closing parenthesis.
    fn prescan(&mut self) -> Vec<(FieldKind, usize)> {
        let mut fields = Vec::new();

        while self.tokens.peek_parenthesis('(') {
            let position = self.tokens.position();

            self.tokens.get_parenthesis('(');

            let head = match self.tokens.get_any_keyword() {
                Some(head) => head,
                None => {
                    self.fail("expected a module field");
                    self.tokens.recover();
                    continue;
                }
            };

            let kind = match head.as_str() {
                "type" => Some(FieldKind::Type),
                "import" => Some(FieldKind::Import),
                "func" | "table" | "memory" | "global" => {
                    if self.peek_inline_import() {
                        Some(FieldKind::Import)
                    } else {
                        match head.as_str() {
                            "func" => Some(FieldKind::Function),
                            "table" => Some(FieldKind::Table),
                            "memory" => Some(FieldKind::Memory),
                            _ => Some(FieldKind::Global),
                        }
                    }
                }
                "export" => Some(FieldKind::Export),
                "start" => Some(FieldKind::Start),
                "elem" => Some(FieldKind::Element),
                "data" => Some(FieldKind::Data),
                _ => {
                    self.fail(format!("unknown module field '{}'", head));
                    None
                }
            };

            self.tokens.recover();

            if let Some(kind) = kind {
                fields.push((kind, position));
            }
        }

        fields
    }

    /// True when the form at the cursor carries `(import …)` directly after
    /// its optional id and inline exports.
    fn peek_inline_import(&self) -> bool {
        let mut ahead = 0;

        if matches!(self.tokens.peek_at(ahead), Some(token) if token.kind == TokenKind::Id) {
            ahead += 1;
        }

        loop {
            let open = matches!(self.tokens.peek_at(ahead), Some(token)
                if token.kind == TokenKind::Parenthesis && token.text == "(");

            if !open {
                return false;
            }

            match self.tokens.peek_at(ahead + 1) {
                Some(token) if token.kind == TokenKind::Keyword && token.text == "import" => {
                    return true;
                }
                Some(token) if token.kind == TokenKind::Keyword && token.text == "export" => {
                    // Skip the balanced export form.
                    let mut depth = 1;
                    ahead += 2;

                    while depth > 0 {
                        match self.tokens.peek_at(ahead) {
                            Some(token) if token.kind == TokenKind::Parenthesis => {
                                if token.text == "(" {
                                    depth += 1;
                                } else {
                                    depth -= 1;
                                }

                                ahead += 1;
                            }
                            Some(_) => ahead += 1,
                            None => return false,
                        }
                    }
                }
                _ => return false,
            }
        }
    }

    fn seek_module_end(&mut self, fields: &[(FieldKind, usize)]) {
        // Re-seek past the final recorded form (or stay put when empty).
        if let Some(&(_, position)) = fields.last() {
            self.tokens.set_position(position);
            self.tokens.get_parenthesis('(');
            self.tokens.recover();
        }

        // Skip any forms the pre-scan rejected.
        while self.tokens.peek_parenthesis('(') {
            self.tokens.get_parenthesis('(');
            self.tokens.recover();
        }
    }

    fn parse_field(&mut self, module: &mut Module, field: FieldKind, bodies: &mut Vec<(u32, usize)>) {
        let head = self.tokens.get_any_keyword().unwrap_or_default();

        debug!("parsing {:?} field '{}'", field, head);

        match field {
            FieldKind::Type => self.parse_type_entry(module),
            FieldKind::Import => self.parse_import_entry(module, &head),
            FieldKind::Function => self.parse_function_entry(module, bodies),
            FieldKind::Table => self.parse_table_entry(module),
            FieldKind::Memory => self.parse_memory_entry(module),
            FieldKind::Global => self.parse_global_entry(module),
            FieldKind::Export => self.parse_export_entry(module),
            FieldKind::Start => self.parse_start_entry(module),
            FieldKind::Element => self.parse_element_entry(module),
            FieldKind::Data => self.parse_data_entry(module),
        }
    }

    // --- shared pieces ---

    fn parse_value_type(&mut self) -> Option<ValueType> {
        match self.tokens.peek_keyword().and_then(ValueType::from_name) {
            Some(kind) => {
                self.tokens.get_any_keyword();
                Some(kind)
            }
            None => None,
        }
    }

    fn expect_value_type(&mut self) -> ValueType {
        match self.parse_value_type() {
            Some(kind) => kind,
            None => {
                self.fail("expected a value type");
                ValueType::I32
            }
        }
    }

    fn parse_ref_type(&mut self) -> Option<ValueType> {
        match self.tokens.peek_keyword().and_then(ValueType::from_name) {
            Some(kind) if kind.is_reference() => {
                self.tokens.get_any_keyword();
                Some(kind)
            }
            _ => None,
        }
    }

    /// `(param …)* (result …)*`; a named param binds exactly one type.
    fn parse_signature(&mut self) -> Signature {
        let mut signature = Signature::default();
        let mut seen_result = false;

        loop {
            if self.tokens.peek_parenthesis('(')
                && matches!(self.tokens.peek_at(1), Some(token)
                    if token.kind == TokenKind::Keyword && token.text == "param")
            {
                self.tokens.get_parenthesis('(');
                self.tokens.get_any_keyword();

                if seen_result {
                    self.fail("'param' may not follow 'result'");
                }

                if let Some(id) = self.tokens.get_id() {
                    signature
                        .params
                        .push(Param::named(id, self.expect_value_type()));
                } else {
                    while let Some(kind) = self.parse_value_type() {
                        signature.params.push(Param::new(kind));
                    }
                }

                self.expect_close();
            } else if self.tokens.peek_parenthesis('(')
                && matches!(self.tokens.peek_at(1), Some(token)
                    if token.kind == TokenKind::Keyword && token.text == "result")
            {
                self.tokens.get_parenthesis('(');
                self.tokens.get_any_keyword();
                seen_result = true;

                while let Some(kind) = self.parse_value_type() {
                    signature.results.push(kind);
                }

                self.expect_close();
            } else {
                return signature;
            }
        }
    }

    /// `(type N)? (param …)* (result …)*` with agreement checking.
    fn parse_type_use(&mut self, module: &mut Module) -> TypeUse {
        let mut declared = None;

        if self.tokens.peek_parenthesis('(')
            && matches!(self.tokens.peek_at(1), Some(token)
                if token.kind == TokenKind::Keyword && token.text == "type")
        {
            self.tokens.get_parenthesis('(');
            self.tokens.get_any_keyword();
            declared = Some(self.parse_index(module, IdSpace::Type));
            self.expect_close();
        }

        let inline = self.parse_signature();

        match declared {
            Some(index) => {
                let resolved = match module.signature(index) {
                    Some(signature) => signature.clone(),
                    None => {
                        self.fail(format!("type index {} is out of bounds", index));
                        Signature::default()
                    }
                };

                if !inline.params.is_empty() || !inline.results.is_empty() {
                    if inline != resolved {
                        self.fail(format!(
                            "inline signature does not match type {}",
                            index
                        ));
                    }

                    // The inline copy carries parameter ids; prefer it.
                    TypeUse::new(index, inline)
                } else {
                    TypeUse::new(index, resolved)
                }
            }
            None => {
                let index = module.type_for(&inline);

                TypeUse::new(index, inline)
            }
        }
    }

    /// An index or `$id` resolved in the given space. Unknown ids and missing
    /// tokens report and yield zero.
    fn parse_index(&mut self, module: &Module, space: IdSpace) -> u32 {
        if let Some(index) = self.tokens.get_u32() {
            return index;
        }

        if let Some(id) = self.tokens.get_id() {
            match module.resolve_id(space, &id) {
                Some(index) => return index,
                None => {
                    self.fail(format!("'${}' out of bounds", id));
                    return 0;
                }
            }
        }

        self.fail("expected an index");
        0
    }

    fn peek_index_token(&self) -> bool {
        matches!(self.tokens.peek(), Some(token)
            if matches!(token.kind, TokenKind::Integer | TokenKind::Id))
    }

    /// `min max? shared?`.
    fn parse_limits(&mut self) -> Limits {
        let min = self.tokens.get_u32().unwrap_or_else(|| {
            self.fail("expected a limit");
            0
        });
        let max = self.tokens.get_u32();
        let shared = self.tokens.get_keyword("shared");

        Limits { min, max, shared }
    }

    fn report_duplicate(&mut self, result: Result<u32, crate::model::ModelError>) -> u32 {
        match result {
            Ok(index) => index,
            Err(error) => {
                self.fail(error.to_string());
                0
            }
        }
    }

    // --- section entries ---

    fn parse_type_entry(&mut self, module: &mut Module) {
        let id = self.tokens.get_id();

        if !self.expect_open() || !self.tokens.get_keyword("func") {
            self.fail("expected '(func' in type declaration");
            self.tokens.recover();
            self.expect_close();
            return;
        }

        let signature = self.parse_signature();

        self.expect_close();

        let result = module.add_type(TypeDeclaration { id, signature });
        self.report_duplicate(result);
        self.expect_close();
    }

    /// Both import shapes: `(import "m" "n" (kind …))` and the inline
    /// `(func $f (import "m" "n") …)` family.
    fn parse_import_entry(&mut self, module: &mut Module, head: &str) {
        if head == "import" {
            let module_name = self.tokens.get_text().unwrap_or_else(|| {
                self.fail("expected a module name");
                String::new()
            });
            let field = self.tokens.get_text().unwrap_or_else(|| {
                self.fail("expected an import name");
                String::new()
            });

            if !self.expect_open() {
                self.tokens.recover();
                return;
            }

            let kind = self.tokens.get_any_keyword().unwrap_or_default();
            let id = self.tokens.get_id();

            self.parse_import_payload(module, &kind, id, module_name, field);
            self.expect_close();
            self.expect_close();
        } else {
            // (func $f (export "e")* (import "m" "n") …)
            let id = self.tokens.get_id();
            let export_names = self.collect_inline_export_names();

            let (module_name, field) = if self.tokens.get_parenthesis('(')
                && self.tokens.get_keyword("import")
            {
                let module_name = self.tokens.get_text().unwrap_or_default();
                let field = self.tokens.get_text().unwrap_or_default();
                self.expect_close();

                (module_name, field)
            } else {
                self.fail("expected '(import'");
                (String::new(), String::new())
            };

            let index =
                self.parse_import_payload(module, head, id, module_name, field);

            if let Some((kind, index)) = index {
                for name in export_names {
                    module.add_export(ExportDeclaration { name, kind, index });
                }
            }

            self.expect_close();
        }
    }

    fn collect_inline_export_names(&mut self) -> Vec<String> {
        let mut names = Vec::new();

        while self.tokens.peek_parenthesis('(')
            && matches!(self.tokens.peek_at(1), Some(token)
                if token.kind == TokenKind::Keyword && token.text == "export")
        {
            self.tokens.get_parenthesis('(');
            self.tokens.get_any_keyword();

            if let Some(name) = self.tokens.get_text() {
                names.push(name);
            } else {
                self.fail("expected an export name");
            }

            self.expect_close();
        }

        names
    }

    fn parse_import_payload(
        &mut self,
        module: &mut Module,
        kind: &str,
        id: Option<String>,
        module_name: String,
        field: String,
    ) -> Option<(ExternalKind, u32)> {
        match kind {
            "func" => {
                let type_use = self.parse_type_use(module);
                let result = module.import_function(
                    module_name,
                    field,
                    FunctionDeclaration { id, type_use },
                );
                let index = self.report_duplicate(result);

                Some((ExternalKind::Function, index))
            }
            "table" => {
                let limits = self.parse_limits();
                let ref_type = self.parse_ref_type().unwrap_or_else(|| {
                    self.fail("expected a reference type");
                    ValueType::FuncRef
                });
                let result = module.import_table(
                    module_name,
                    field,
                    TableDeclaration {
                        id,
                        ref_type,
                        limits,
                    },
                );
                let index = self.report_duplicate(result);

                Some((ExternalKind::Table, index))
            }
            "memory" => {
                let limits = self.parse_limits();
                let result =
                    module.import_memory(module_name, field, MemoryDeclaration { id, limits });
                let index = self.report_duplicate(result);

                Some((ExternalKind::Memory, index))
            }
            "global" => {
                let (value_type, mutability) = self.parse_global_type();
                let result = module.import_global(
                    module_name,
                    field,
                    GlobalDeclaration {
                        id,
                        value_type,
                        mutability,
                        initializer: None,
                    },
                );
                let index = self.report_duplicate(result);

                Some((ExternalKind::Global, index))
            }
            "event" => {
                let type_use = self.parse_type_use(module);
                let result = module.import_event(
                    module_name,
                    field,
                    EventDeclaration {
                        id,
                        attribute: 0,
                        type_use,
                    },
                );
                let index = self.report_duplicate(result);

                Some((ExternalKind::Event, index))
            }
            _ => {
                self.fail(format!("unknown import kind '{}'", kind));
                self.tokens.recover();
                None
            }
        }
    }

    fn parse_global_type(&mut self) -> (ValueType, Mutability) {
        if self.tokens.peek_parenthesis('(')
            && matches!(self.tokens.peek_at(1), Some(token)
                if token.kind == TokenKind::Keyword && token.text == "mut")
        {
            self.tokens.get_parenthesis('(');
            self.tokens.get_any_keyword();

            let value_type = self.expect_value_type();

            self.expect_close();

            (value_type, Mutability::Var)
        } else {
            (self.expect_value_type(), Mutability::Const)
        }
    }

    fn parse_function_entry(&mut self, module: &mut Module, bodies: &mut Vec<(u32, usize)>) {
        let id = self.tokens.get_id();
        let export_names = self.collect_inline_export_names();
        let type_use = self.parse_type_use(module);

        let result = module.add_function(FunctionDeclaration { id, type_use });
        let index = self.report_duplicate(result);

        for name in export_names {
            module.add_export(ExportDeclaration {
                name,
                kind: ExternalKind::Function,
                index,
            });
        }

        // The locals and instructions run in the final pass.
        bodies.push((index, self.tokens.position()));
        self.tokens.recover();
    }

    fn parse_table_entry(&mut self, module: &mut Module) {
        let id = self.tokens.get_id();
        let export_names = self.collect_inline_export_names();

        if self.peek_index_token() {
            let limits = self.parse_limits();
            let ref_type = self.parse_ref_type().unwrap_or_else(|| {
                self.fail("expected a reference type");
                ValueType::FuncRef
            });

            let result = module.add_table(TableDeclaration {
                id,
                ref_type,
                limits,
            });
            let index = self.report_duplicate(result);

            self.export_all(module, export_names, ExternalKind::Table, index);
        } else {
            // (table $t funcref (elem $f …)): the item count fixes the
            // limits and an active zero-offset segment is synthesised.
            let ref_type = self.parse_ref_type().unwrap_or_else(|| {
                self.fail("expected limits or a reference type");
                ValueType::FuncRef
            });

            if !(self.tokens.get_parenthesis('(') && self.tokens.get_keyword("elem")) {
                self.fail("expected '(elem' after the element type");
                self.tokens.recover();
                self.expect_close();
                return;
            }

            let mut function_indexes = Vec::new();

            while self.peek_index_token() {
                function_indexes.push(self.parse_index(module, IdSpace::Function));
            }

            self.expect_close();

            let count = function_indexes.len() as u32;
            let result = module.add_table(TableDeclaration {
                id,
                ref_type,
                limits: Limits::bounded(count, count),
            });
            let index = self.report_duplicate(result);

            self.export_all(module, export_names, ExternalKind::Table, index);

            let flags = if index == 0 { 0 } else { ELEMENT_EXPLICIT_INDEX };

            module
                .add_element(ElementDeclaration {
                    id: None,
                    flags,
                    table_index: index,
                    ref_type: ValueType::FuncRef,
                    offset: Some(Expression::new(vec![Instruction::i32_const(0)])),
                    function_indexes,
                    ref_expressions: Vec::new(),
                })
                .ok();
        }

        self.expect_close();
    }

    fn export_all(
        &mut self,
        module: &mut Module,
        names: Vec<String>,
        kind: ExternalKind,
        index: u32,
    ) {
        for name in names {
            module.add_export(ExportDeclaration { name, kind, index });
        }
    }

    fn parse_memory_entry(&mut self, module: &mut Module) {
        let id = self.tokens.get_id();
        let export_names = self.collect_inline_export_names();

        let (limits, inline_data) = if self.peek_index_token() {
            (self.parse_limits(), None)
        } else if self.tokens.get_parenthesis('(') && self.tokens.get_keyword("data") {
            let mut bytes = Vec::new();

            while let Some(chunk) = self.tokens.get_string() {
                bytes.extend(chunk);
            }

            self.expect_close();

            const PAGE: usize = 65536;
            let pages = bytes.len().div_ceil(PAGE) as u32;

            (Limits::bounded(pages, pages), Some(bytes))
        } else {
            self.fail("expected limits or '(data'");
            (Limits::unbounded(0), None)
        };

        let result = module.add_memory(MemoryDeclaration { id, limits });
        let index = self.report_duplicate(result);

        for name in export_names {
            module.add_export(ExportDeclaration {
                name,
                kind: ExternalKind::Memory,
                index,
            });
        }

        if let Some(bytes) = inline_data {
            let flags = if index == 0 { 0 } else { DATA_EXPLICIT_INDEX };

            module
                .add_data_segment(DataSegment {
                    id: None,
                    flags,
                    memory_index: index,
                    offset: Some(Expression::new(vec![Instruction::i32_const(0)])),
                    bytes,
                })
                .ok();
        }

        self.expect_close();
    }

    fn parse_global_entry(&mut self, module: &mut Module) {
        let id = self.tokens.get_id();
        let export_names = self.collect_inline_export_names();
        let (value_type, mutability) = self.parse_global_type();
        let initializer = self.parse_init_expression(module);

        let result = module.add_global(GlobalDeclaration {
            id,
            value_type,
            mutability,
            initializer: Some(initializer),
        });
        let index = self.report_duplicate(result);

        for name in export_names {
            module.add_export(ExportDeclaration {
                name,
                kind: ExternalKind::Global,
                index,
            });
        }

        self.expect_close();
    }

    /// A constant initialiser: folded instructions up to the closing
    /// parenthesis of the surrounding form.
    fn parse_init_expression(&mut self, module: &mut Module) -> Expression {
        let mut instructions = Vec::new();

        while self.tokens.peek_parenthesis('(') {
            self.parse_folded_instruction(module, &mut instructions);
        }

        if instructions.is_empty() {
            self.fail("expected a constant expression");
        }

        Expression::new(instructions)
    }

    fn parse_export_entry(&mut self, module: &mut Module) {
        let name = self.tokens.get_text().unwrap_or_else(|| {
            self.fail("expected an export name");
            String::new()
        });

        if !self.expect_open() {
            self.tokens.recover();
            return;
        }

        let kind = match self
            .tokens
            .get_any_keyword()
            .as_deref()
            .and_then(ExternalKind::from_name)
        {
            Some(kind) => kind,
            None => {
                self.fail("expected an export kind");
                self.tokens.recover();
                self.expect_close();
                return;
            }
        };

        let space = match kind {
            ExternalKind::Function => IdSpace::Function,
            ExternalKind::Table => IdSpace::Table,
            ExternalKind::Memory => IdSpace::Memory,
            ExternalKind::Global => IdSpace::Global,
            ExternalKind::Event => IdSpace::Event,
        };
        let index = self.parse_index(module, space);

        self.expect_close();
        module.add_export(ExportDeclaration { name, kind, index });
        self.expect_close();
    }

    fn parse_start_entry(&mut self, module: &mut Module) {
        let index = self.parse_index(module, IdSpace::Function);

        module.set_start(index);
        self.expect_close();
    }

    fn parse_element_entry(&mut self, module: &mut Module) {
        let id = self.tokens.get_id();
        let mut table_index = 0;
        let mut explicit_table = false;

        if self.tokens.peek_parenthesis('(')
            && matches!(self.tokens.peek_at(1), Some(token)
                if token.kind == TokenKind::Keyword && token.text == "table")
        {
            self.tokens.get_parenthesis('(');
            self.tokens.get_any_keyword();
            table_index = self.parse_index(module, IdSpace::Table);
            explicit_table = true;
            self.expect_close();
        }

        let declarative = self.tokens.get_keyword("declare");

        // An offset: either an explicit (offset …) or a folded instruction.
        let offset = if !declarative && self.tokens.peek_parenthesis('(') {
            if matches!(self.tokens.peek_at(1), Some(token)
                if token.kind == TokenKind::Keyword && token.text == "offset")
            {
                self.tokens.get_parenthesis('(');
                self.tokens.get_any_keyword();

                let mut instructions = Vec::new();

                while self.tokens.peek_parenthesis('(') {
                    self.parse_folded_instruction(module, &mut instructions);
                }

                self.expect_close();
                Some(Expression::new(instructions))
            } else {
                let mut instructions = Vec::new();

                self.parse_folded_instruction(module, &mut instructions);
                Some(Expression::new(instructions))
            }
        } else {
            None
        };

        let active = offset.is_some();
        let mut ref_type = ValueType::FuncRef;
        let mut function_indexes = Vec::new();
        let mut ref_expressions = Vec::new();
        let mut expressions = false;

        if self.tokens.get_keyword("func") {
            while self.peek_index_token() {
                function_indexes.push(self.parse_index(module, IdSpace::Function));
            }
        } else if let Some(kind) = self.parse_ref_type() {
            ref_type = kind;
            expressions = true;

            while self.tokens.peek_parenthesis('(') {
                self.tokens.get_parenthesis('(');

                let mut instructions = Vec::new();

                if self.tokens.get_keyword("item") {
                    while self.tokens.peek_parenthesis('(') {
                        self.parse_folded_instruction(module, &mut instructions);
                    }
                } else {
                    self.parse_folded_tail(module, &mut instructions);
                }

                self.expect_close();
                ref_expressions.push(Expression::new(instructions));
            }
        } else {
            // The MVP spelling: bare function indices.
            while self.peek_index_token() {
                function_indexes.push(self.parse_index(module, IdSpace::Function));
            }
        }

        let mut flags = 0;

        if declarative {
            flags |= ELEMENT_PASSIVE | ELEMENT_EXPLICIT_INDEX;
        } else if !active {
            flags |= ELEMENT_PASSIVE;
        } else if explicit_table && table_index != 0 {
            flags |= ELEMENT_EXPLICIT_INDEX;
        }

        if expressions {
            flags |= ELEMENT_EXPRESSIONS;
        }

        module
            .add_element(ElementDeclaration {
                id,
                flags,
                table_index,
                ref_type,
                offset,
                function_indexes,
                ref_expressions,
            })
            .ok();

        self.expect_close();
    }

    fn parse_data_entry(&mut self, module: &mut Module) {
        let id = self.tokens.get_id();
        let mut memory_index = 0;

        if self.tokens.peek_parenthesis('(')
            && matches!(self.tokens.peek_at(1), Some(token)
                if token.kind == TokenKind::Keyword && token.text == "memory")
        {
            self.tokens.get_parenthesis('(');
            self.tokens.get_any_keyword();
            memory_index = self.parse_index(module, IdSpace::Memory);
            self.expect_close();
        }

        let offset = if self.tokens.peek_parenthesis('(') {
            if matches!(self.tokens.peek_at(1), Some(token)
                if token.kind == TokenKind::Keyword && token.text == "offset")
            {
                self.tokens.get_parenthesis('(');
                self.tokens.get_any_keyword();

                let mut instructions = Vec::new();

                while self.tokens.peek_parenthesis('(') {
                    self.parse_folded_instruction(module, &mut instructions);
                }

                self.expect_close();
                Some(Expression::new(instructions))
            } else {
                let mut instructions = Vec::new();

                self.parse_folded_instruction(module, &mut instructions);
                Some(Expression::new(instructions))
            }
        } else {
            None
        };

        let mut bytes = Vec::new();

        while let Some(chunk) = self.tokens.get_string() {
            bytes.extend(chunk);
        }

        let mut flags = 0;

        if offset.is_none() {
            flags |= DATA_PASSIVE;
        } else if memory_index != 0 {
            flags |= DATA_EXPLICIT_INDEX;
        }

        module
            .add_data_segment(DataSegment {
                id,
                flags,
                memory_index,
                offset,
                bytes,
            })
            .ok();

        self.expect_close();
    }

    // --- code bodies ---

    fn parse_code_body(&mut self, module: &mut Module, index: u32) {
        module.start_code_entry();

        let params: Vec<Option<String>> = match module.function(index) {
            Some(declaration) => declaration
                .type_use
                .signature
                .params
                .iter()
                .map(|param| param.id.clone())
                .collect(),
            None => Vec::new(),
        };

        for id in params {
            if let Err(error) = module.add_local_binding(id.as_deref()) {
                self.fail(error.to_string());
            }
        }

        let mut locals = Vec::new();

        while self.tokens.peek_parenthesis('(')
            && matches!(self.tokens.peek_at(1), Some(token)
                if token.kind == TokenKind::Keyword && token.text == "local")
        {
            self.tokens.get_parenthesis('(');
            self.tokens.get_any_keyword();

            if let Some(id) = self.tokens.get_id() {
                let kind = self.expect_value_type();

                if let Err(error) = module.add_local_binding(Some(&id)) {
                    self.fail(error.to_string());
                }

                locals.push(Local::named(id, kind));
            } else {
                while let Some(kind) = self.parse_value_type() {
                    module.add_local_binding(None).ok();
                    locals.push(Local::new(kind));
                }
            }

            self.expect_close();
        }

        let mut instructions = Vec::new();

        self.parse_instruction_sequence(module, &mut instructions);

        let line = self.tokens.source_pos().line;
        instructions.push(Instruction::plain(Opcode::End).at(line));

        self.expect_close();

        let local_ids = module.end_code_entry();

        module.add_code_entry(CodeEntry {
            number: index,
            locals,
            expression: Expression::new(instructions),
            local_ids,
        });
    }

    /// Flat and folded instructions, until the enclosing ')'.
    fn parse_instruction_sequence(&mut self, module: &mut Module, out: &mut Vec<Instruction>) {
        loop {
            if self.tokens.peek_parenthesis(')') || self.tokens.at_end() {
                return;
            }

            if self.tokens.peek_parenthesis('(') {
                self.parse_folded_instruction(module, out);
            } else if self.tokens.peek_keyword().is_some() {
                self.parse_flat_instruction(module, out);
            } else {
                self.fail("expected an instruction");
                self.tokens.advance();
            }
        }
    }

    fn parse_flat_instruction(&mut self, module: &mut Module, out: &mut Vec<Instruction>) {
        let line = self.tokens.source_pos().line;
        let name = self.tokens.get_any_keyword().unwrap_or_default();

        let opcode = match Opcode::from_name(&name) {
            Some(opcode) => opcode,
            None => {
                self.fail(format!("unknown instruction '{}'", name));
                return;
            }
        };

        match opcode {
            Opcode::End => {
                // An optional trailing label must match the open block's.
                self.tokens.get_id();
                module.pop_label();
                out.push(Instruction::plain(Opcode::End).at(line));
            }
            Opcode::Else | Opcode::Catch => {
                self.tokens.get_id();
                out.push(Instruction::plain(opcode).at(line));
            }
            _ if opcode.is_block_start() => {
                let (block_type, label) = self.parse_block_header(module);

                module.push_label(label.clone());
                out.push(
                    Instruction::new(opcode, Immediate::Block { block_type, label }).at(line),
                );
            }
            _ => {
                let imm = self.parse_immediates(module, opcode);

                out.push(Instruction::new(opcode, imm).at(line));
            }
        }
    }

    fn parse_folded_instruction(&mut self, module: &mut Module, out: &mut Vec<Instruction>) {
        self.tokens.get_parenthesis('(');
        self.parse_folded_tail(module, out);
        self.expect_close();
    }

    /// The contents of a folded instruction, after its '(' was consumed and
    /// before its ')' is.
    fn parse_folded_tail(&mut self, module: &mut Module, out: &mut Vec<Instruction>) {
        let line = self.tokens.source_pos().line;
        let name = match self.tokens.get_any_keyword() {
            Some(name) => name,
            None => {
                self.fail("expected an instruction");
                self.tokens.recover();

                // recover() consumed the ')', rewind the caller's expectation.
                self.rewind_one();
                return;
            }
        };

        let opcode = match Opcode::from_name(&name) {
            Some(opcode) => opcode,
            None => {
                self.fail(format!("unknown instruction '{}'", name));
                self.tokens.recover();
                self.rewind_one();
                return;
            }
        };

        match opcode {
            Opcode::Block | Opcode::Loop | Opcode::Try => {
                let (block_type, label) = self.parse_block_header(module);

                module.push_label(label.clone());
                out.push(
                    Instruction::new(opcode, Immediate::Block { block_type, label }).at(line),
                );

                self.parse_instruction_sequence(module, out);

                module.pop_label();
                out.push(Instruction::plain(Opcode::End).at(line));
            }
            Opcode::If => self.parse_folded_if(module, out, line),
            Opcode::Else | Opcode::End | Opcode::Catch => {
                self.fail(format!("'{}' may not be folded", name));
            }
            _ => {
                let imm = self.parse_immediates(module, opcode);

                while self.tokens.peek_parenthesis('(') {
                    self.parse_folded_instruction(module, out);
                }

                out.push(Instruction::new(opcode, imm).at(line));
            }
        }
    }

    /// `(if label? blocktype (folded-condition)* (then …) (else …)?)`.
    fn parse_folded_if(&mut self, module: &mut Module, out: &mut Vec<Instruction>, line: u32) {
        let (block_type, label) = self.parse_block_header(module);

        // Condition folds run before the 'if' itself.
        while self.tokens.peek_parenthesis('(')
            && !matches!(self.tokens.peek_at(1), Some(token)
                if token.kind == TokenKind::Keyword && (token.text == "then" || token.text == "else"))
        {
            self.parse_folded_instruction(module, out);
        }

        module.push_label(label.clone());
        out.push(Instruction::new(Opcode::If, Immediate::Block { block_type, label }).at(line));

        if self.tokens.get_parenthesis('(') && self.tokens.get_keyword("then") {
            self.parse_instruction_sequence(module, out);
            self.expect_close();
        } else {
            self.fail("expected '(then'");
        }

        if self.tokens.peek_parenthesis('(')
            && matches!(self.tokens.peek_at(1), Some(token)
                if token.kind == TokenKind::Keyword && token.text == "else")
        {
            self.tokens.get_parenthesis('(');
            self.tokens.get_any_keyword();
            out.push(Instruction::plain(Opcode::Else).at(line));
            self.parse_instruction_sequence(module, out);
            self.expect_close();
        }

        module.pop_label();
        out.push(Instruction::plain(Opcode::End).at(line));
    }

    /// Steps the cursor back over a ')' consumed during recovery, so the
    /// caller's `expect_close` stays balanced.
    fn rewind_one(&mut self) {
        let position = self.tokens.position();

        self.tokens.set_position(position.saturating_sub(1));
    }

    /// `label? (type N)? (param)* (result)*` for block-kind instructions.
    fn parse_block_header(&mut self, module: &mut Module) -> (BlockType, Option<String>) {
        let label = self.tokens.get_id();

        let mut declared = None;

        if self.tokens.peek_parenthesis('(')
            && matches!(self.tokens.peek_at(1), Some(token)
                if token.kind == TokenKind::Keyword && token.text == "type")
        {
            self.tokens.get_parenthesis('(');
            self.tokens.get_any_keyword();
            declared = Some(self.parse_index(module, IdSpace::Type));
            self.expect_close();
        }

        let inline = self.parse_signature();

        let block_type = match declared {
            Some(index) => {
                if !inline.is_empty() {
                    match module.signature(index) {
                        Some(signature) if *signature == inline => {}
                        Some(_) => {
                            self.fail(format!("inline signature does not match type {}", index))
                        }
                        None => self.fail(format!("type index {} is out of bounds", index)),
                    }
                }

                BlockType::TypeIndex(index)
            }
            None if inline.params.is_empty() && inline.results.len() <= 1 => {
                match inline.results.first() {
                    Some(&result) => BlockType::Value(result),
                    None => BlockType::Void,
                }
            }
            None => BlockType::TypeIndex(module.type_for(&inline)),
        };

        (block_type, label)
    }

    /// The index space a plain-`Idx` opcode resolves in.
    fn idx_space(opcode: Opcode) -> IdSpace {
        match opcode {
            Opcode::DataDrop | Opcode::MemoryInit => IdSpace::Data,
            Opcode::ElemDrop => IdSpace::Element,
            Opcode::Throw => IdSpace::Event,
            _ => IdSpace::Table,
        }
    }

    fn parse_immediates(&mut self, module: &mut Module, opcode: Opcode) -> Immediate {
        if matches!(opcode, Opcode::MemoryInit | Opcode::DataDrop) {
            module.flag_data_count_needed();
        }

        match opcode.imm() {
            ImmediateKind::None | ImmediateKind::Memory0 | ImmediateKind::ZeroZero => {
                Immediate::None
            }
            ImmediateKind::I32 => Immediate::I32(self.tokens.get_i32().unwrap_or_else(|| {
                self.fail("expected an i32 constant");
                0
            })),
            ImmediateKind::I64 => Immediate::I64(self.tokens.get_i64().unwrap_or_else(|| {
                self.fail("expected an i64 constant");
                0
            })),
            ImmediateKind::F32 => Immediate::F32(self.tokens.get_f32().unwrap_or_else(|| {
                self.fail("expected an f32 constant");
                0.0
            })),
            ImmediateKind::F64 => Immediate::F64(self.tokens.get_f64().unwrap_or_else(|| {
                self.fail("expected an f64 constant");
                0.0
            })),
            ImmediateKind::V128 => Immediate::V128(self.parse_v128()),
            ImmediateKind::Block => {
                // Handled by the block paths; reaching here is a table bug.
                Immediate::None
            }
            ImmediateKind::Idx | ImmediateKind::IdxZero => {
                Immediate::Index(self.parse_index(module, Self::idx_space(opcode)))
            }
            ImmediateKind::LocalIdx => Immediate::Index(self.parse_local_index(module)),
            ImmediateKind::GlobalIdx => {
                Immediate::Index(self.parse_index(module, IdSpace::Global))
            }
            ImmediateKind::FunctionIdx => {
                Immediate::Index(self.parse_index(module, IdSpace::Function))
            }
            ImmediateKind::LabelIdx => Immediate::Index(self.parse_label_index(module)),
            ImmediateKind::Table => {
                let mut labels = Vec::new();

                while self.peek_index_token() {
                    labels.push(self.parse_label_index(module));
                }

                let default = labels.pop().unwrap_or_else(|| {
                    self.fail("expected at least one label");
                    0
                });

                Immediate::BrTable {
                    targets: labels,
                    default,
                }
            }
            ImmediateKind::Memory => {
                let (align, offset) = self.parse_memarg(opcode);

                Immediate::Memory { align, offset }
            }
            ImmediateKind::IdxIdx => self.parse_index_pair(module, opcode),
            ImmediateKind::Indirect => {
                let table_index = if self.peek_index_token() {
                    self.parse_index(module, IdSpace::Table)
                } else {
                    0
                };
                let type_use = self.parse_type_use(module);

                Immediate::Indirect {
                    type_index: type_use.index,
                    table_index,
                }
            }
            ImmediateKind::Lane2 | ImmediateKind::Lane4 | ImmediateKind::Lane8
            | ImmediateKind::Lane16 => {
                Immediate::Lane(self.parse_lane(opcode.imm().lane_count().unwrap()))
            }
            ImmediateKind::MemoryLane2
            | ImmediateKind::MemoryLane4
            | ImmediateKind::MemoryLane8
            | ImmediateKind::MemoryLane16 => {
                let (align, offset) = self.parse_memarg(opcode);
                let lane = self.parse_lane(opcode.imm().lane_count().unwrap());

                Immediate::MemoryLane {
                    align,
                    offset,
                    lane,
                }
            }
            ImmediateKind::Shuffle => {
                let mut lanes = [0u8; 16];

                for lane in &mut lanes {
                    *lane = self.parse_lane(32);
                }

                Immediate::Shuffle(lanes)
            }
        }
    }

    fn parse_local_index(&mut self, module: &Module) -> u32 {
        if let Some(index) = self.tokens.get_u32() {
            return index;
        }

        if let Some(id) = self.tokens.get_id() {
            match module.resolve_local(&id) {
                Some(index) => return index,
                None => {
                    self.fail(format!("'${}' out of bounds", id));
                    return 0;
                }
            }
        }

        self.fail("expected a local index");
        0
    }

    fn parse_label_index(&mut self, module: &Module) -> u32 {
        if let Some(index) = self.tokens.get_u32() {
            return index;
        }

        if let Some(id) = self.tokens.get_id() {
            match module.resolve_label(&id) {
                Some(depth) => return depth,
                None => {
                    self.fail(format!("'${}' out of bounds", id));
                    return 0;
                }
            }
        }

        self.fail("expected a label index");
        0
    }

    /// `table.init t? e` and `table.copy d? s?`, with the binary operand
    /// order (element first for init).
    fn parse_index_pair(&mut self, module: &mut Module, opcode: Opcode) -> Immediate {
        let second_index = matches!(self.tokens.peek_at(1), Some(token)
            if matches!(token.kind, TokenKind::Integer | TokenKind::Id));

        if opcode == Opcode::TableInit {
            if self.peek_index_token() && second_index {
                let table = self.parse_index(module, IdSpace::Table);
                let element = self.parse_index(module, IdSpace::Element);

                Immediate::IndexPair(element, table)
            } else if self.peek_index_token() {
                // A single index is the element segment; the table defaults.
                let element = self.parse_index(module, IdSpace::Element);

                Immediate::IndexPair(element, 0)
            } else {
                self.fail("expected an element segment index");
                Immediate::IndexPair(0, 0)
            }
        } else if self.peek_index_token() {
            let destination = self.parse_index(module, IdSpace::Table);
            let source = if self.peek_index_token() {
                self.parse_index(module, IdSpace::Table)
            } else {
                self.fail("expected both table indices");
                0
            };

            Immediate::IndexPair(destination, source)
        } else {
            Immediate::IndexPair(0, 0)
        }
    }

    /// `offset=N? align=N?`; the alignment must be a power of two and is
    /// stored as its exponent, defaulting to the opcode's natural alignment.
    fn parse_memarg(&mut self, opcode: Opcode) -> (u32, u32) {
        let mut offset = 0;
        let mut align = opcode.align();

        if self.tokens.get_keyword("offset=") {
            offset = self.tokens.get_u32().unwrap_or_else(|| {
                self.fail("expected an offset value");
                0
            });
        }

        if self.tokens.get_keyword("align=") {
            let bytes = self.tokens.get_u32().unwrap_or_else(|| {
                self.fail("expected an alignment value");
                1
            });

            if bytes.is_power_of_two() {
                align = bytes.trailing_zeros();
            } else {
                self.fail(format!("alignment {} is not a power of two", bytes));
            }
        }

        (align, offset)
    }

    fn parse_lane(&mut self, limit: u8) -> u8 {
        match self.tokens.get_u32() {
            Some(lane) if lane < limit as u32 => lane as u8,
            Some(lane) => {
                self.fail(format!("lane index {} exceeds the limit of {}", lane, limit));
                0
            }
            None => {
                self.fail("expected a lane index");
                0
            }
        }
    }

    /// `v128.const i8x16 …` in all six shapes, little-endian.
    fn parse_v128(&mut self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        let shape = self.tokens.get_any_keyword().unwrap_or_default();

        match shape.as_str() {
            "i8x16" => {
                for index in 0..16 {
                    let value = self.tokens.get_i32().unwrap_or_else(|| {
                        self.fail("expected a lane value");
                        0
                    });

                    bytes[index] = value as u8;
                }
            }
            "i16x8" => {
                for index in 0..8 {
                    let value = self.tokens.get_i32().unwrap_or_else(|| {
                        self.fail("expected a lane value");
                        0
                    });

                    bytes[index * 2..index * 2 + 2]
                        .copy_from_slice(&(value as u16).to_le_bytes());
                }
            }
            "i32x4" => {
                for index in 0..4 {
                    let value = self.tokens.get_i32().unwrap_or_else(|| {
                        self.fail("expected a lane value");
                        0
                    });

                    bytes[index * 4..index * 4 + 4].copy_from_slice(&value.to_le_bytes());
                }
            }
            "i64x2" => {
                for index in 0..2 {
                    let value = self.tokens.get_i64().unwrap_or_else(|| {
                        self.fail("expected a lane value");
                        0
                    });

                    bytes[index * 8..index * 8 + 8].copy_from_slice(&value.to_le_bytes());
                }
            }
            "f32x4" => {
                for index in 0..4 {
                    let value = self.tokens.get_f32().unwrap_or_else(|| {
                        self.fail("expected a lane value");
                        0.0
                    });

                    bytes[index * 4..index * 4 + 4]
                        .copy_from_slice(&value.to_bits().to_le_bytes());
                }
            }
            "f64x2" => {
                for index in 0..2 {
                    let value = self.tokens.get_f64().unwrap_or_else(|| {
                        self.fail("expected a lane value");
                        0.0
                    });

                    bytes[index * 8..index * 8 + 8]
                        .copy_from_slice(&value.to_bits().to_le_bytes());
                }
            }
            _ => self.fail(format!("unknown vector shape '{}'", shape)),
        }

        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::emit_binary;

    fn parse(source: &str) -> (Module, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let module = parse_text(source, &mut diagnostics);

        (module, diagnostics)
    }

    fn emit(module: &Module) -> Vec<u8> {
        let mut bytes = Vec::new();

        emit_binary(module, &mut bytes).unwrap();
        bytes
    }

    #[test]
    fn empty_module() {
        let (module, diagnostics) = parse("(module)");

        assert!(!diagnostics.has_errors(), "{}", diagnostics);
        assert_eq!(emit(&module), b"\x00\x61\x73\x6D\x01\x00\x00\x00");
    }

    #[test]
    fn named_module() {
        let (module, diagnostics) = parse("(module $main)");

        assert!(!diagnostics.has_errors());
        assert_eq!(module.id.as_deref(), Some("main"));
    }

    #[test]
    fn add_function_matches_expected_binary() {
        let (module, diagnostics) = parse(
            "(module
               (func $add (param i32 i32) (result i32)
                 local.get 0
                 local.get 1
                 i32.add)
               (export \"add\" (func $add)))",
        );

        assert!(!diagnostics.has_errors(), "{}", diagnostics);

        let expected: Vec<u8> = vec![
            0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00, // preamble
            0x01, 0x07, 0x01, 0x60, 0x02, 0x7F, 0x7F, 0x01, 0x7F, // type
            0x03, 0x02, 0x01, 0x00, // function
            0x07, 0x07, 0x01, 0x03, b'a', b'd', b'd', 0x00, 0x00, // export
            0x0A, 0x09, 0x01, 0x07, 0x00, 0x20, 0x00, 0x20, 0x01, 0x6A, 0x0B, // code
        ];

        assert_eq!(emit(&module), expected);
    }

    #[test]
    fn folded_and_flat_forms_are_equivalent() {
        let (folded, first) = parse(
            "(module (func (result i32) (i32.add (i32.const 1) (i32.const 2))))",
        );
        let (flat, second) = parse(
            "(module (func (result i32) i32.const 1 i32.const 2 i32.add))",
        );

        assert!(!first.has_errors(), "{}", first);
        assert!(!second.has_errors(), "{}", second);
        assert_eq!(emit(&folded), emit(&flat));
    }

    #[test]
    fn forward_references_resolve() {
        let (module, diagnostics) = parse(
            "(module
               (func $caller call $callee)
               (func $callee))",
        );

        assert!(!diagnostics.has_errors(), "{}", diagnostics);

        let body = &module.code_entries()[0].expression.instructions;

        assert_eq!(body[0].opcode, Opcode::Call);
        assert_eq!(body[0].index_value(), Some(1));
    }

    #[test]
    fn inline_import_reclassifies() {
        let (module, diagnostics) = parse(
            "(module
               (func $local (result i32) i32.const 7)
               (func $imported (import \"env\" \"f\") (param i32)))",
        );

        assert!(!diagnostics.has_errors(), "{}", diagnostics);
        assert_eq!(module.imports().len(), 1);
        assert_eq!(module.imported_function_count(), 1);
        // The import takes function index 0; the local definition follows.
        assert_eq!(module.resolve_id(IdSpace::Function, "imported"), Some(0));
        assert_eq!(module.resolve_id(IdSpace::Function, "local"), Some(1));
    }

    #[test]
    fn inline_exports_are_synthesised() {
        let (module, diagnostics) = parse(
            "(module (func $f (export \"first\") (export \"second\")))",
        );

        assert!(!diagnostics.has_errors(), "{}", diagnostics);
        assert_eq!(module.exports().len(), 2);
        assert_eq!(module.exports()[0].name, "first");
        assert_eq!(module.exports()[1].name, "second");
    }

    #[test]
    fn blocks_and_labels() {
        let (module, diagnostics) = parse(
            "(module
               (func
                 (block $out
                   (loop $again
                     br $again
                     br $out))))",
        );

        assert!(!diagnostics.has_errors(), "{}", diagnostics);

        let body = &module.code_entries()[0].expression.instructions;
        let branches: Vec<u32> = body
            .iter()
            .filter(|instruction| instruction.opcode == Opcode::Br)
            .map(|instruction| instruction.index_value().unwrap())
            .collect();

        assert_eq!(branches, vec![0, 1]);
    }

    #[test]
    fn folded_if_orders_condition_first() {
        let (module, diagnostics) = parse(
            "(module
               (func (param i32) (result i32)
                 (if (result i32) (local.get 0)
                   (then (i32.const 1))
                   (else (i32.const 2)))))",
        );

        assert!(!diagnostics.has_errors(), "{}", diagnostics);

        let opcodes: Vec<Opcode> = module.code_entries()[0]
            .expression
            .instructions
            .iter()
            .map(|instruction| instruction.opcode)
            .collect();

        assert_eq!(
            opcodes,
            vec![
                Opcode::LocalGet,
                Opcode::If,
                Opcode::I32Const,
                Opcode::Else,
                Opcode::I32Const,
                Opcode::End,
                Opcode::End,
            ]
        );
    }

    #[test]
    fn type_use_mismatch_is_an_error() {
        let (_, diagnostics) = parse(
            "(module
               (type $t (func (param i32)))
               (func (type $t) (param i64)))",
        );

        assert!(diagnostics.has_errors());
        assert!(diagnostics
            .items()
            .iter()
            .any(|item| item.message.contains("does not match type")));
    }

    #[test]
    fn matching_inline_type_is_reused() {
        let (module, diagnostics) = parse(
            "(module
               (type $t (func (param i32) (result i32)))
               (func (param i32) (result i32) local.get 0))",
        );

        assert!(!diagnostics.has_errors(), "{}", diagnostics);
        assert_eq!(module.types().len(), 1);
    }

    #[test]
    fn duplicate_ids_error_with_position() {
        let (_, diagnostics) = parse("(module (func $f) (func $f))");

        assert!(diagnostics.has_errors());
        assert!(diagnostics.items()[0].message.contains("duplicate id"));
    }

    #[test]
    fn unknown_id_reports_out_of_bounds() {
        let (_, diagnostics) = parse("(module (func call $missing))");

        assert!(diagnostics.has_errors());
        assert!(diagnostics.items()[0].message.contains("out of bounds"));
    }

    #[test]
    fn memarg_keys() {
        let (module, diagnostics) = parse(
            "(module
               (memory 1)
               (func (param i32)
                 (i32.store offset=8 align=2 (local.get 0) (i32.const 5))))",
        );

        assert!(!diagnostics.has_errors(), "{}", diagnostics);

        let store = module.code_entries()[0]
            .expression
            .instructions
            .iter()
            .find(|instruction| instruction.opcode == Opcode::I32Store)
            .unwrap();

        assert_eq!(
            store.imm,
            Immediate::Memory {
                align: 1,
                offset: 8
            }
        );
    }

    #[test]
    fn inline_table_element() {
        let (module, diagnostics) = parse(
            "(module
               (func $f)
               (table funcref (elem $f $f)))",
        );

        assert!(!diagnostics.has_errors(), "{}", diagnostics);
        assert_eq!(module.tables()[0].limits, Limits::bounded(2, 2));
        assert_eq!(module.elements().len(), 1);
        assert_eq!(module.elements()[0].function_indexes, vec![0, 0]);
    }

    #[test]
    fn inline_memory_data() {
        let (module, diagnostics) = parse("(module (memory (data \"hi\")))");

        assert!(!diagnostics.has_errors(), "{}", diagnostics);
        assert_eq!(module.memories()[0].limits, Limits::bounded(1, 1));
        assert_eq!(module.data_segments()[0].bytes, b"hi");
    }

    #[test]
    fn element_with_ref_expressions() {
        let (module, diagnostics) = parse(
            "(module
               (func $f)
               (table 1 funcref)
               (elem (i32.const 0) funcref (ref.func $f)))",
        );

        assert!(!diagnostics.has_errors(), "{}", diagnostics);

        let element = &module.elements()[0];

        assert!(element.uses_expressions());
        assert_eq!(element.ref_expressions.len(), 1);
    }

    #[test]
    fn start_section() {
        let (module, diagnostics) = parse("(module (func $main) (start $main))");

        assert!(!diagnostics.has_errors());
        assert_eq!(module.start(), Some(0));
    }

    #[test]
    fn globals_with_initialisers() {
        let (module, diagnostics) = parse(
            "(module
               (global $g (mut i32) (i32.const 42))
               (global $c f64 (f64.const 1.5)))",
        );

        assert!(!diagnostics.has_errors(), "{}", diagnostics);
        assert_eq!(module.globals().len(), 2);
        assert_eq!(module.globals()[0].mutability, Mutability::Var);
        assert_eq!(module.globals()[1].mutability, Mutability::Const);
    }
}
