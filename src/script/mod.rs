//! The script layer: a superset of the text format wrapping modules together
//! with spectest-style commands, and a C back end that turns the assertions
//! into a self-checking `main`.

use std::io::Write;

use log::warn;

use crate::binary::EmitError;
use crate::cgen::{self, names};
use crate::diagnostics::Diagnostics;
use crate::encodings::ExternalKind;
use crate::model::Module;
use crate::text::lexer::tokenize;
use crate::text::parser::Parser;

/// A constant argument or expectation of an invocation.
#[derive(Clone, Debug, PartialEq)]
pub enum ScriptValue {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    F32CanonicalNan,
    F32ArithmeticNan,
    F64CanonicalNan,
    F64ArithmeticNan,
    V128([u8; 16]),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Invocation {
    pub name: String,
    pub arguments: Vec<ScriptValue>,
    pub line: u32,
}

#[derive(Debug)]
pub enum Command {
    Module(Module),
    Invoke(Invocation),
    AssertReturn {
        invocation: Invocation,
        expected: Vec<ScriptValue>,
    },
}

#[derive(Debug, Default)]
pub struct Script {
    pub commands: Vec<Command>,
}

impl Script {
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.commands.iter().filter_map(|command| match command {
            Command::Module(module) => Some(module),
            _ => None,
        })
    }

    /// Emits the final module plus a `main` running every assertion.
    pub fn emit_c<O: Write + ?Sized>(
        &self,
        output: &mut O,
        optimize: bool,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), EmitError> {
        let module = match self.modules().last() {
            Some(module) => module,
            None => {
                diagnostics.error(
                    crate::diagnostics::Context::None,
                    "the script holds no module to emit",
                );
                return Ok(());
            }
        };

        if self.modules().count() > 1 {
            diagnostics.warning(
                crate::diagnostics::Context::None,
                "only the final module of the script is emitted as C",
            );
        }

        cgen::emit_c(module, output, optimize, diagnostics)?;

        let mut out = String::new();

        out.push_str("\n#include <stdio.h>\n");
        out.push_str("\nstatic int failures;\n");
        out.push_str("\nint main()\n{\n    initialize();\n");

        for command in &self.commands {
            match command {
                Command::Module(_) => {}
                Command::Invoke(invocation) => {
                    if let Some(call) = self.call_text(module, invocation, diagnostics) {
                        out.push_str(&format!("    {};\n", call));
                    }
                }
                Command::AssertReturn {
                    invocation,
                    expected,
                } => {
                    self.emit_assertion(module, invocation, expected, &mut out, diagnostics);
                }
            }
        }

        out.push_str("    if (failures == 0) {\n        puts(\"all tests passed\");\n    }\n");
        out.push_str("    return failures != 0;\n}\n");

        output.write_all(out.as_bytes())?;
        Ok(())
    }

    fn exported_function(&self, module: &Module, name: &str) -> Option<u32> {
        module
            .exports()
            .iter()
            .find(|export| export.kind == ExternalKind::Function && export.name == name)
            .map(|export| export.index)
    }

    fn call_text(
        &self,
        module: &Module,
        invocation: &Invocation,
        diagnostics: &mut Diagnostics,
    ) -> Option<String> {
        let index = match self.exported_function(module, &invocation.name) {
            Some(index) => index,
            None => {
                diagnostics.error(
                    crate::diagnostics::Context::Source(crate::diagnostics::SourcePos::new(
                        invocation.line,
                        1,
                    )),
                    format!("no exported function named '{}'", invocation.name),
                );
                return None;
            }
        };

        let arguments: Vec<String> = invocation
            .arguments
            .iter()
            .map(value_literal)
            .collect();

        Some(format!(
            "{}({})",
            names::function_name(module, index),
            arguments.join(", ")
        ))
    }

    fn emit_assertion(
        &self,
        module: &Module,
        invocation: &Invocation,
        expected: &[ScriptValue],
        out: &mut String,
        diagnostics: &mut Diagnostics,
    ) {
        let Some(call) = self.call_text(module, invocation, diagnostics) else {
            return;
        };

        let label = format!("{} (line {})", invocation.name, invocation.line);

        if expected.len() > 1 {
            diagnostics.warning(
                crate::diagnostics::Context::None,
                "multi-value expectations are not generated",
            );
            return;
        }

        out.push_str("    {\n");

        let check = match expected.first() {
            None => {
                out.push_str(&format!("        {};\n", call));
                "1".to_string()
            }
            Some(ScriptValue::I32(value)) => {
                out.push_str(&format!("        int32_t found = {};\n", call));
                format!("found == {}", value)
            }
            Some(ScriptValue::I64(value)) => {
                out.push_str(&format!("        int64_t found = {};\n", call));
                format!("found == {}", int64_literal(*value))
            }
            Some(ScriptValue::F32(value)) => {
                out.push_str(&format!("        float found = {};\n", call));
                format!(
                    "reinterpretI32F32(found) == 0x{:08x}U",
                    value.to_bits()
                )
            }
            Some(ScriptValue::F64(value)) => {
                out.push_str(&format!("        double found = {};\n", call));
                format!(
                    "reinterpretI64F64(found) == 0x{:016x}ULL",
                    value.to_bits()
                )
            }
            Some(ScriptValue::F32CanonicalNan) => {
                out.push_str(&format!("        float found = {};\n", call));
                "(reinterpretI32F32(found) & 0x7fffffffU) == 0x7fc00000U".to_string()
            }
            Some(ScriptValue::F32ArithmeticNan) => {
                out.push_str(&format!("        float found = {};\n", call));
                "(reinterpretI32F32(found) & 0x7fc00000U) == 0x7fc00000U".to_string()
            }
            Some(ScriptValue::F64CanonicalNan) => {
                out.push_str(&format!("        double found = {};\n", call));
                "(reinterpretI64F64(found) & 0x7fffffffffffffffULL) == 0x7ff8000000000000ULL"
                    .to_string()
            }
            Some(ScriptValue::F64ArithmeticNan) => {
                out.push_str(&format!("        double found = {};\n", call));
                "(reinterpretI64F64(found) & 0x7ff8000000000000ULL) == 0x7ff8000000000000ULL"
                    .to_string()
            }
            Some(ScriptValue::V128(bytes)) => {
                let low = u64::from_le_bytes(bytes[..8].try_into().unwrap());
                let high = u64::from_le_bytes(bytes[8..].try_into().unwrap());

                out.push_str(&format!("        V128 found = {};\n", call));
                out.push_str(&format!(
                    "        V128 wanted = makeV128(0x{:016x}ULL, 0x{:016x}ULL);\n",
                    low, high
                ));
                "memcmp(&found, &wanted, 16) == 0".to_string()
            }
        };

        out.push_str(&format!(
            "        if ({}) {{\n            puts(\"PASS: {}\");\n",
            check, label
        ));
        out.push_str(&format!(
            "        }} else {{\n            ++failures;\n            puts(\"FAIL: {}\");\n        }}\n",
            label
        ));
        out.push_str("    }\n");
    }
}

fn int64_literal(value: i64) -> String {
    if value == i64::MIN {
        "(-9223372036854775807LL - 1)".to_string()
    } else {
        format!("{}LL", value)
    }
}

fn value_literal(value: &ScriptValue) -> String {
    match value {
        ScriptValue::I32(value) => value.to_string(),
        ScriptValue::I64(value) => int64_literal(*value),
        ScriptValue::F32(value) => format!("reinterpretF32I32(0x{:08x}U)", value.to_bits()),
        ScriptValue::F64(value) => format!("reinterpretF64I64(0x{:016x}ULL)", value.to_bits()),
        ScriptValue::F32CanonicalNan | ScriptValue::F32ArithmeticNan => {
            "reinterpretF32I32(0x7fc00000U)".to_string()
        }
        ScriptValue::F64CanonicalNan | ScriptValue::F64ArithmeticNan => {
            "reinterpretF64I64(0x7ff8000000000000ULL)".to_string()
        }
        ScriptValue::V128(bytes) => {
            let low = u64::from_le_bytes(bytes[..8].try_into().unwrap());
            let high = u64::from_le_bytes(bytes[8..].try_into().unwrap());

            format!("makeV128(0x{:016x}ULL, 0x{:016x}ULL)", low, high)
        }
    }
}

/// Parses a spectest-style script: `(module …)`, `(invoke …)`, and
/// `(assert_return …)` commands. Unsupported assertions are skipped with a
/// warning.
pub fn parse_script(source: &str, diagnostics: &mut Diagnostics) -> Script {
    let tokens = tokenize(source, diagnostics);
    let mut parser = Parser::new(tokens, diagnostics);
    let mut script = Script::default();

    loop {
        if parser.tokens.at_end() {
            return script;
        }

        let pos = parser.tokens.source_pos();

        if !parser.tokens.get_parenthesis('(') {
            parser.diagnostics.error_at(pos, "expected a command");
            parser.tokens.advance();
            continue;
        }

        let head = match parser.tokens.get_any_keyword() {
            Some(head) => head,
            None => {
                parser.diagnostics.error_at(pos, "expected a command");
                parser.tokens.recover();
                continue;
            }
        };

        match head.as_str() {
            "module" => {
                let module = parser.parse_module_rest();

                script.commands.push(Command::Module(module));
            }
            "invoke" => {
                if let Some(invocation) = parse_invocation_tail(&mut parser, pos.line) {
                    script.commands.push(Command::Invoke(invocation));
                }
            }
            "assert_return" => {
                let invocation = if parser.tokens.get_parenthesis('(')
                    && parser.tokens.get_keyword("invoke")
                {
                    parse_invocation_tail(&mut parser, pos.line)
                } else {
                    parser
                        .diagnostics
                        .error_at(pos, "expected '(invoke' in assert_return");
                    None
                };

                let mut expected = Vec::new();

                while parser.tokens.peek_parenthesis('(') {
                    if let Some(value) = parse_value(&mut parser) {
                        expected.push(value);
                    }
                }

                if !parser.tokens.get_parenthesis(')') {
                    parser.diagnostics.error_at(pos, "missing ')'");
                    parser.tokens.recover();
                }

                if let Some(invocation) = invocation {
                    script.commands.push(Command::AssertReturn {
                        invocation,
                        expected,
                    });
                }
            }
            other if other.starts_with("assert_") => {
                warn!("skipping unsupported script command '{}'", other);
                parser.diagnostics.warning_at(
                    pos,
                    format!("unsupported script command '{}'", other),
                );
                parser.tokens.recover();
            }
            other => {
                parser
                    .diagnostics
                    .error_at(pos, format!("unknown script command '{}'", other));
                parser.tokens.recover();
            }
        }
    }
}

/// The contents of `(invoke "name" const…)` after its keyword.
fn parse_invocation_tail(parser: &mut Parser<'_>, line: u32) -> Option<Invocation> {
    let name = match parser.tokens.get_text() {
        Some(name) => name,
        None => {
            let pos = parser.tokens.source_pos();

            parser.diagnostics.error_at(pos, "expected an export name");
            parser.tokens.recover();
            return None;
        }
    };

    let mut arguments = Vec::new();

    while parser.tokens.peek_parenthesis('(') {
        match parse_value(parser) {
            Some(value) => arguments.push(value),
            None => break,
        }
    }

    if !parser.tokens.get_parenthesis(')') {
        let pos = parser.tokens.source_pos();

        parser.diagnostics.error_at(pos, "missing ')'");
        parser.tokens.recover();
    }

    Some(Invocation {
        name,
        arguments,
        line,
    })
}

/// One `(t.const …)` form.
fn parse_value(parser: &mut Parser<'_>) -> Option<ScriptValue> {
    let pos = parser.tokens.source_pos();

    if !parser.tokens.get_parenthesis('(') {
        return None;
    }

    let head = parser.tokens.get_any_keyword().unwrap_or_default();

    let value = match head.as_str() {
        "i32.const" => parser.tokens.get_i32().map(ScriptValue::I32),
        "i64.const" => parser.tokens.get_i64().map(ScriptValue::I64),
        "f32.const" => {
            if parser.tokens.get_keyword("nan:canonical") {
                Some(ScriptValue::F32CanonicalNan)
            } else if parser.tokens.get_keyword("nan:arithmetic") {
                Some(ScriptValue::F32ArithmeticNan)
            } else {
                parser.tokens.get_f32().map(ScriptValue::F32)
            }
        }
        "f64.const" => {
            if parser.tokens.get_keyword("nan:canonical") {
                Some(ScriptValue::F64CanonicalNan)
            } else if parser.tokens.get_keyword("nan:arithmetic") {
                Some(ScriptValue::F64ArithmeticNan)
            } else {
                parser.tokens.get_f64().map(ScriptValue::F64)
            }
        }
        "v128.const" => Some(ScriptValue::V128(parse_v128_value(parser)?)),
        _ => None,
    };

    match value {
        Some(value) => {
            if !parser.tokens.get_parenthesis(')') {
                parser.diagnostics.error_at(pos, "missing ')'");
                parser.tokens.recover();
            }

            Some(value)
        }
        None => {
            parser
                .diagnostics
                .error_at(pos, format!("invalid constant '{}'", head));
            parser.tokens.recover();
            None
        }
    }
}

fn parse_v128_value(parser: &mut Parser<'_>) -> Option<[u8; 16]> {
    let shape = parser.tokens.get_any_keyword()?;
    let mut bytes = [0u8; 16];

    match shape.as_str() {
        "i8x16" => {
            for index in 0..16 {
                bytes[index] = parser.tokens.get_i32()? as u8;
            }
        }
        "i16x8" => {
            for index in 0..8 {
                let value = parser.tokens.get_i32()? as u16;

                bytes[index * 2..index * 2 + 2].copy_from_slice(&value.to_le_bytes());
            }
        }
        "i32x4" => {
            for index in 0..4 {
                let value = parser.tokens.get_i32()?;

                bytes[index * 4..index * 4 + 4].copy_from_slice(&value.to_le_bytes());
            }
        }
        "i64x2" => {
            for index in 0..2 {
                let value = parser.tokens.get_i64()?;

                bytes[index * 8..index * 8 + 8].copy_from_slice(&value.to_le_bytes());
            }
        }
        _ => return None,
    }

    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> (Script, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let script = parse_script(source, &mut diagnostics);

        (script, diagnostics)
    }

    const ADD_SCRIPT: &str = "(module
        (func (export \"add\") (param i32 i32) (result i32)
          local.get 0
          local.get 1
          i32.add))
      (assert_return (invoke \"add\" (i32.const 1) (i32.const 2)) (i32.const 3))
      (invoke \"add\" (i32.const 0) (i32.const 0))";

    #[test]
    fn commands_parse_in_order() {
        let (script, diagnostics) = parse(ADD_SCRIPT);

        assert!(!diagnostics.has_errors(), "{}", diagnostics);
        assert_eq!(script.commands.len(), 3);
        assert!(matches!(script.commands[0], Command::Module(_)));
        assert!(matches!(script.commands[1], Command::AssertReturn { .. }));
        assert!(matches!(script.commands[2], Command::Invoke(_)));
    }

    #[test]
    fn assertion_values_decode() {
        let (script, diagnostics) = parse(
            "(module (func (export \"f\") (result f64) f64.const 1.5))
             (assert_return (invoke \"f\") (f64.const nan:canonical))",
        );

        assert!(!diagnostics.has_errors(), "{}", diagnostics);

        match &script.commands[1] {
            Command::AssertReturn { expected, .. } => {
                assert_eq!(expected, &vec![ScriptValue::F64CanonicalNan]);
            }
            _ => panic!("expected an assertion"),
        }
    }

    #[test]
    fn unsupported_assertions_warn_and_continue() {
        let (script, diagnostics) = parse(
            "(module)
             (assert_trap (invoke \"f\") \"integer divide by zero\")
             (module)",
        );

        assert!(!diagnostics.has_errors());
        assert_eq!(diagnostics.items().len(), 1);
        assert_eq!(script.modules().count(), 2);
    }

    #[test]
    fn generated_main_checks_results() {
        let (script, mut diagnostics) = parse(ADD_SCRIPT);
        let mut output = Vec::new();

        script.emit_c(&mut output, true, &mut diagnostics).unwrap();

        let text = String::from_utf8(output).unwrap();

        assert!(!diagnostics.has_errors(), "{}", diagnostics);
        assert!(text.contains("int main()"), "{}", text);
        assert!(text.contains("initialize();"), "{}", text);
        assert!(text.contains("int32_t found = add(1, 2);"), "{}", text);
        assert!(text.contains("found == 3"), "{}", text);
        assert!(text.contains("PASS: add"), "{}", text);
        assert!(text.contains("FAIL: add"), "{}", text);
        assert!(text.contains("return failures != 0;"), "{}", text);
    }

    #[test]
    fn v128_expectations_compare_by_bytes() {
        let (script, mut diagnostics) = parse(
            "(module (func (export \"v\") (result v128)
               v128.const i8x16 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16))
             (assert_return (invoke \"v\")
               (v128.const i8x16 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16))",
        );

        let mut output = Vec::new();

        script.emit_c(&mut output, false, &mut diagnostics).unwrap();

        let text = String::from_utf8(output).unwrap();

        assert!(text.contains("makeV128("), "{}", text);
        assert!(text.contains("memcmp(&found, &wanted, 16) == 0"), "{}", text);
    }

    #[test]
    fn nan_class_checks_use_bit_predicates() {
        let (script, mut diagnostics) = parse(
            "(module (func (export \"f\") (result f64) f64.const nan))
             (assert_return (invoke \"f\") (f64.const nan:canonical))",
        );

        let mut output = Vec::new();

        script.emit_c(&mut output, false, &mut diagnostics).unwrap();

        let text = String::from_utf8(output).unwrap();

        assert!(
            text.contains("(reinterpretI64F64(found) & 0x7fffffffffffffffULL) == 0x7ff8000000000000ULL"),
            "{}",
            text
        );
    }
}
