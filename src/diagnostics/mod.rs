//! Accumulating diagnostics for every front end and checker.
//!
//! Recoverable problems never unwind. Parsers, readers and the validator push
//! a [`Diagnostic`] into a shared [`Diagnostics`] collector and keep going, so
//! a single pass over a module reports every error it contains. Hard failures
//! (writing to a broken sink) use `Result` as usual.

use std::fmt;

use crate::encodings::SectionKind;

/// A line/column pair into the textual source. Lines and columns are 1-based.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct SourcePos {
    pub line: u32,
    pub column: u32,
}

impl SourcePos {
    pub fn new(line: u32, column: u32) -> Self {
        SourcePos { line, column }
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}({})", self.line, self.column)
    }
}

/// How bad a diagnostic is. Only errors suppress emission.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Severity {
    Warning,
    Error,
}

/// Where a diagnostic was detected.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Context {
    /// No useful location (e.g. a module-level consistency check).
    None,
    /// A position in textual source.
    Source(SourcePos),
    /// A section and entry index in a binary module.
    Section { kind: SectionKind, entry: u32 },
}

/// A single reported problem.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub context: Context,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        };

        match &self.context {
            Context::None => write!(f, "{}: {}", label, self.message),
            Context::Source(pos) => write!(f, "{} at {}: {}", label, pos, self.message),
            Context::Section { kind, entry } => write!(
                f,
                "{} in {} section at entry {}: {}",
                label, kind, entry, self.message
            ),
        }
    }
}

/// The collector every pass appends to.
///
/// Detection order is reporting order; nothing is deduplicated or reordered.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
    errors: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::default()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity == Severity::Error {
            self.errors += 1;
        }

        log::debug!("{}", diagnostic);
        self.items.push(diagnostic);
    }

    pub fn error(&mut self, context: Context, message: impl Into<String>) {
        self.report(Diagnostic {
            severity: Severity::Error,
            context,
            message: message.into(),
        });
    }

    pub fn error_at(&mut self, pos: SourcePos, message: impl Into<String>) {
        self.error(Context::Source(pos), message);
    }

    pub fn error_in(&mut self, kind: SectionKind, entry: u32, message: impl Into<String>) {
        self.error(Context::Section { kind, entry }, message);
    }

    pub fn warning(&mut self, context: Context, message: impl Into<String>) {
        self.report(Diagnostic {
            severity: Severity::Warning,
            context,
            message: message.into(),
        });
    }

    pub fn warning_at(&mut self, pos: SourcePos, message: impl Into<String>) {
        self.warning(Context::Source(pos), message);
    }

    pub fn warning_in(&mut self, kind: SectionKind, entry: u32, message: impl Into<String>) {
        self.warning(Context::Section { kind, entry }, message);
    }

    /// Every diagnostic reported so far, in detection order.
    pub fn items(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn has_errors(&self) -> bool {
        self.errors != 0
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in &self.items {
            writeln!(f, "{}", item)?;
        }

        match self.errors {
            0 => Ok(()),
            1 => writeln!(f, "1 error."),
            n => writeln!(f, "{} errors.", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_only_errors() {
        let mut diagnostics = Diagnostics::new();

        diagnostics.warning_at(SourcePos::new(1, 1), "unused data");
        diagnostics.error_at(SourcePos::new(2, 7), "missing ')'");

        assert_eq!(diagnostics.error_count(), 1);
        assert_eq!(diagnostics.items().len(), 2);
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn renders_source_context() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.error_at(SourcePos::new(3, 14), "unknown keyword 'frobnicate'");

        let rendered = diagnostics.items()[0].to_string();

        assert_eq!(rendered, "Error at line 3(14): unknown keyword 'frobnicate'");
    }

    #[test]
    fn renders_section_context() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.error_in(SectionKind::Code, 2, "invalid opcode 0xff");

        let rendered = diagnostics.items()[0].to_string();

        assert_eq!(rendered, "Error in code section at entry 2: invalid opcode 0xff");
    }

    #[test]
    fn detection_order_is_preserved() {
        let mut diagnostics = Diagnostics::new();

        for line in 1..=5u32 {
            diagnostics.error_at(SourcePos::new(line, 1), format!("problem {}", line));
        }

        let lines: Vec<u32> = diagnostics
            .items()
            .iter()
            .map(|item| match item.context {
                Context::Source(pos) => pos.line,
                _ => 0,
            })
            .collect();

        assert_eq!(lines, vec![1, 2, 3, 4, 5]);
    }
}
