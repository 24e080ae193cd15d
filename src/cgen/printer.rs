//! Pretty-prints built C trees with minimal parenthesisation.

use crate::encodings::ValueType;
use crate::text::printer::{format_f32, format_f64};

use super::node::{CKind, CTree, NodeId};

/// C operator precedence, higher binds tighter.
fn precedence(op: &str) -> u8 {
    match op {
        "=" => 2,
        "||" => 4,
        "&&" => 5,
        "|" => 6,
        "^" => 7,
        "&" => 8,
        "==" | "!=" => 9,
        "<" | "<=" | ">" | ">=" => 10,
        "<<" | ">>" => 11,
        "+" | "-" => 12,
        "*" | "/" | "%" => 13,
        _ => 14,
    }
}

const UNARY_PRECEDENCE: u8 = 15;
const PRIMARY_PRECEDENCE: u8 = 16;

fn expression_precedence(tree: &CTree, id: NodeId) -> u8 {
    match tree.kind(id) {
        CKind::Binary { op } => precedence(op),
        CKind::Unary { .. } | CKind::Cast { .. } => UNARY_PRECEDENCE,
        CKind::Ternary => 3,
        CKind::I32(value) if *value < 0 => UNARY_PRECEDENCE,
        CKind::I64(value) if *value < 0 => UNARY_PRECEDENCE,
        _ => PRIMARY_PRECEDENCE,
    }
}

/// Operators where `a op (b op c)` needs no parentheses.
fn is_associative(op: &str) -> bool {
    matches!(op, "+" | "*")
}

pub fn print_expression(tree: &CTree, id: NodeId, out: &mut String) {
    print_expr(tree, id, out);
}

fn needs_parenthesis(parent_precedence: u8, child_precedence: u8) -> bool {
    child_precedence < parent_precedence
}

fn print_operand(tree: &CTree, id: NodeId, out: &mut String, minimum: u8) {
    if needs_parenthesis(minimum, expression_precedence(tree, id)) {
        out.push('(');
        print_expr(tree, id, out);
        out.push(')');
    } else {
        print_expr(tree, id, out);
    }
}

fn print_expr(tree: &CTree, id: NodeId, out: &mut String) {
    match tree.kind(id) {
        CKind::Binary { op } => print_binary(tree, id, op, out),
        CKind::Unary { op } => {
            let operand = tree.first_child(id).expect("unary operand");

            out.push_str(op);

            // `- -x` must not collapse into a decrement.
            let negative_literal = matches!(
                tree.kind(operand),
                CKind::Unary { op: "-" } | CKind::I32(i32::MIN..=-1) | CKind::I64(i64::MIN..=-1)
            );

            if *op == "-" && negative_literal {
                out.push('(');
                print_expr(tree, operand, out);
                out.push(')');
            } else {
                print_operand(tree, operand, out, UNARY_PRECEDENCE);
            }
        }
        CKind::Ternary => {
            let mut children = tree.children(id);
            let condition = children.next().expect("ternary condition");
            let consequent = children.next().expect("ternary consequent");
            let otherwise = children.next().expect("ternary alternative");

            print_operand(tree, condition, out, 4);
            out.push_str(" ? ");
            print_operand(tree, consequent, out, 4);
            out.push_str(" : ");
            print_operand(tree, otherwise, out, 3);
        }
        CKind::Call { name } => {
            out.push_str(name);
            out.push('(');
            print_arguments(tree, tree.children(id), out);
            out.push(')');
        }
        CKind::CallIndirect { type_index, table } => {
            let mut children = tree.children(id);
            let element = children.next().expect("call_indirect element");

            out.push_str(&format!("((type{}) {}.data[", type_index, table));
            print_expr(tree, element, out);
            out.push_str("])(");
            print_arguments(tree, children, out);
            out.push(')');
        }
        CKind::Cast { c_type } => {
            let operand = tree.first_child(id).expect("cast operand");

            out.push_str(&format!("({})", c_type));
            print_operand(tree, operand, out, UNARY_PRECEDENCE);
        }
        CKind::Load { what, memory } => {
            let address = tree.first_child(id).expect("load address");

            out.push_str(&format!("{}(&{}, ", what, memory));
            print_expr(tree, address, out);
            out.push(')');
        }
        CKind::Store { what, memory } => {
            let mut children = tree.children(id);
            let address = children.next().expect("store address");
            let value = children.next().expect("store value");

            out.push_str(&format!("{}(&{}, ", what, memory));
            print_expr(tree, address, out);
            out.push_str(", ");
            print_expr(tree, value, out);
            out.push(')');
        }
        CKind::I32(value) => out.push_str(&value.to_string()),
        CKind::I64(value) => {
            if *value == i64::MIN {
                // The literal would overflow before the negation applies.
                out.push_str("(-9223372036854775807LL - 1)");
            } else {
                out.push_str(&format!("{}LL", value));
            }
        }
        CKind::F32(value) => print_f32(*value, out),
        CKind::F64(value) => print_f64(*value, out),
        CKind::NameUse(name) => out.push_str(name),
        other => out.push_str(&format!("/* {:?} */", other)),
    }
}

fn print_arguments(tree: &CTree, children: super::node::Children<'_>, out: &mut String) {
    for (index, argument) in children.enumerate() {
        if index > 0 {
            out.push_str(", ");
        }

        print_expr(tree, argument, out);
    }
}

fn print_binary(tree: &CTree, id: NodeId, op: &'static str, out: &mut String) {
    let mut children = tree.children(id);
    let left = children.next().expect("binary left operand");
    let right = children.next().expect("binary right operand");
    let level = precedence(op);

    if op == "=" {
        // `x = x op y` prints as the compound assignment `x op= y`.
        if let (CKind::NameUse(target), CKind::Binary { op: inner }) =
            (tree.kind(left), tree.kind(right))
        {
            let compoundable = matches!(
                *inner,
                "+" | "-" | "*" | "/" | "%" | "<<" | ">>" | "&" | "^" | "|"
            );

            if compoundable {
                let inner_left = tree.first_child(right).expect("operand");

                if tree.kind(inner_left) == &CKind::NameUse(target.clone()) {
                    let inner_right = tree.next(inner_left).expect("operand");

                    out.push_str(target);
                    out.push_str(&format!(" {}= ", inner));
                    print_operand(tree, inner_right, out, precedence(inner) + 1);
                    return;
                }
            }
        }

        print_expr(tree, left, out);
        out.push_str(" = ");
        print_operand(tree, right, out, level);
        return;
    }

    print_operand(tree, left, out, level);
    out.push_str(&format!(" {} ", op));

    // The right operand of a left-associative operator needs parentheses at
    // equal precedence, except inside the same associative operator.
    let right_precedence = expression_precedence(tree, right);
    let same_associative =
        is_associative(op) && matches!(tree.kind(right), CKind::Binary { op: inner } if *inner == op);

    if right_precedence < level || (right_precedence == level && !same_associative) {
        out.push('(');
        print_expr(tree, right, out);
        out.push(')');
    } else {
        print_expr(tree, right, out);
    }
}

fn print_f32(value: f32, out: &mut String) {
    if value.is_finite() {
        out.push_str(&format!("{}F", format_f32(value)));
    } else if value.is_infinite() {
        out.push_str(if value < 0.0 { "-INFINITY" } else { "INFINITY" });
    } else {
        out.push_str(&format!(
            "reinterpretF32I32(0x{:08x}U)",
            value.to_bits()
        ));
    }
}

fn print_f64(value: f64, out: &mut String) {
    if value.is_finite() {
        out.push_str(&format_f64(value));
    } else if value.is_infinite() {
        out.push_str(if value < 0.0 { "-INFINITY" } else { "INFINITY" });
    } else {
        out.push_str(&format!(
            "reinterpretF64I64(0x{:016x}ULL)",
            value.to_bits()
        ));
    }
}

pub fn print_statement(tree: &CTree, id: NodeId, out: &mut String, indent: usize) {
    let margin = "    ".repeat(indent);

    match tree.kind(id) {
        CKind::Compound => {
            out.push_str(&format!("{}{{\n", margin));

            for child in tree.children(id) {
                print_statement(tree, child, out, indent + 1);
            }

            out.push_str(&format!("{}}}\n", margin));
        }
        CKind::Variable { c_type, name } => {
            out.push_str(&format!("{}{} {}", margin, c_type_name(*c_type), name));

            if let Some(initializer) = tree.first_child(id) {
                out.push_str(" = ");
                print_expr(tree, initializer, out);
            }

            out.push_str(";\n");
        }
        CKind::Return => {
            match tree.first_child(id) {
                Some(value) => {
                    out.push_str(&format!("{}return ", margin));
                    print_expr(tree, value, out);
                    out.push_str(";\n");
                }
                None => out.push_str(&format!("{}return;\n", margin)),
            }
        }
        CKind::Br { label } => {
            out.push_str(&format!("{}goto label{};\n", margin, label));
        }
        CKind::Label(label) => {
            out.push_str(&format!("label{}:;\n", label));
        }
        CKind::If => {
            let mut children = tree.children(id);
            let condition = children.next().expect("if condition");
            let then_compound = children.next();
            let else_compound = children.next();

            out.push_str(&format!("{}if (", margin));
            print_expr(tree, condition, out);
            out.push_str(") {\n");

            if let Some(then_compound) = then_compound {
                for child in tree.children(then_compound) {
                    print_statement(tree, child, out, indent + 1);
                }
            }

            match else_compound {
                Some(else_compound) => {
                    out.push_str(&format!("{}}} else {{\n", margin));

                    for child in tree.children(else_compound) {
                        print_statement(tree, child, out, indent + 1);
                    }

                    out.push_str(&format!("{}}}\n", margin));
                }
                None => out.push_str(&format!("{}}}\n", margin)),
            }
        }
        CKind::Switch { cases, default } => {
            let scrutinee = tree.first_child(id).expect("switch scrutinee");

            out.push_str(&format!("{}switch (", margin));
            print_expr(tree, scrutinee, out);
            out.push_str(") {\n");

            for (value, label) in cases {
                out.push_str(&format!(
                    "{}    case {}: goto label{};\n",
                    margin, value, label
                ));
            }

            out.push_str(&format!("{}    default: goto label{};\n", margin, default));
            out.push_str(&format!("{}}}\n", margin));
        }
        _ => {
            out.push_str(&margin);
            print_expr(tree, id, out);
            out.push_str(";\n");
        }
    }
}

pub fn c_type_name(kind: ValueType) -> &'static str {
    kind.c_name()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary(tree: &mut CTree, op: &'static str, left: NodeId, right: NodeId) -> NodeId {
        let node = tree.add(CKind::Binary { op });

        tree.link(left, node);
        tree.link(right, node);
        node
    }

    fn name(tree: &mut CTree, text: &str) -> NodeId {
        tree.add(CKind::NameUse(text.to_string()))
    }

    fn rendered(tree: &CTree, id: NodeId) -> String {
        let mut out = String::new();

        print_expression(tree, id, &mut out);
        out
    }

    #[test]
    fn tighter_children_need_no_parentheses() {
        let mut tree = CTree::new();
        let a = name(&mut tree, "a");
        let b = name(&mut tree, "b");
        let c = name(&mut tree, "c");
        let product = binary(&mut tree, "*", b, c);
        let sum = binary(&mut tree, "+", a, product);

        assert_eq!(rendered(&tree, sum), "a + b * c");
    }

    #[test]
    fn looser_children_are_parenthesised() {
        let mut tree = CTree::new();
        let a = name(&mut tree, "a");
        let b = name(&mut tree, "b");
        let c = name(&mut tree, "c");
        let sum = binary(&mut tree, "+", a, b);
        let product = binary(&mut tree, "*", sum, c);

        assert_eq!(rendered(&tree, product), "(a + b) * c");
    }

    #[test]
    fn associative_right_nesting_skips_parentheses() {
        let mut tree = CTree::new();
        let a = name(&mut tree, "a");
        let b = name(&mut tree, "b");
        let c = name(&mut tree, "c");
        let inner = binary(&mut tree, "+", b, c);
        let outer = binary(&mut tree, "+", a, inner);

        assert_eq!(rendered(&tree, outer), "a + b + c");
    }

    #[test]
    fn non_associative_right_nesting_keeps_parentheses() {
        let mut tree = CTree::new();
        let a = name(&mut tree, "a");
        let b = name(&mut tree, "b");
        let c = name(&mut tree, "c");
        let inner = binary(&mut tree, "-", b, c);
        let outer = binary(&mut tree, "-", a, inner);

        assert_eq!(rendered(&tree, outer), "a - (b - c)");
    }

    #[test]
    fn compound_assignment() {
        let mut tree = CTree::new();
        let x = name(&mut tree, "x");
        let x_again = name(&mut tree, "x");
        let y = name(&mut tree, "y");
        let sum = binary(&mut tree, "+", x_again, y);
        let assignment = binary(&mut tree, "=", x, sum);

        assert_eq!(rendered(&tree, assignment), "x += y");
    }

    #[test]
    fn plain_assignment_when_target_differs() {
        let mut tree = CTree::new();
        let x = name(&mut tree, "x");
        let z = name(&mut tree, "z");
        let y = name(&mut tree, "y");
        let sum = binary(&mut tree, "+", z, y);
        let assignment = binary(&mut tree, "=", x, sum);

        assert_eq!(rendered(&tree, assignment), "x = z + y");
    }

    #[test]
    fn casts_wrap_looser_operands() {
        let mut tree = CTree::new();
        let a = name(&mut tree, "a");
        let b = name(&mut tree, "b");
        let sum = binary(&mut tree, "+", a, b);
        let cast = tree.add(CKind::Cast {
            c_type: "uint32_t".to_string(),
        });

        tree.link(sum, cast);

        assert_eq!(rendered(&tree, cast), "(uint32_t)(a + b)");
    }

    #[test]
    fn negative_literals_stay_unambiguous() {
        let mut tree = CTree::new();
        let minus_one = tree.add(CKind::I32(-1));
        let negated = tree.add(CKind::Unary { op: "-" });

        tree.link(minus_one, negated);

        assert_eq!(rendered(&tree, negated), "-(-1)");
    }

    #[test]
    fn statements_render_with_indentation() {
        let mut tree = CTree::new();
        let ret = tree.add(CKind::Return);
        let a = name(&mut tree, "p0");
        let one = tree.add(CKind::I32(1));
        let sum = binary(&mut tree, "+", a, one);

        tree.link(sum, ret);

        let mut out = String::new();

        print_statement(&tree, ret, &mut out, 1);

        assert_eq!(out, "    return p0 + 1;\n");
    }
}
