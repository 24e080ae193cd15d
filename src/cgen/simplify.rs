//! Local simplification of built C trees: double negations collapse, negated
//! relational operators flip, a branch-only `if` absorbs the statements it
//! jumps over, and labels nothing jumps to disappear. Applying the pass twice
//! yields the same tree as applying it once.

use super::node::{CKind, CTree, NodeId};

pub fn simplify(tree: &mut CTree, body: NodeId) {
    // Negation rules cascade (e.g. !!(a < b)); iterate to a fixpoint.
    loop {
        let collapsed = collapse_double_nots(tree, body);
        let flipped = flip_negated_relations(tree, body);

        if !collapsed && !flipped {
            break;
        }
    }

    restructure_branching_ifs(tree, body);
    remove_unused_labels(tree, body);
}

fn is_not(tree: &CTree, id: NodeId) -> bool {
    matches!(tree.kind(id), CKind::Unary { op: "!" })
}

/// `!(!e)` becomes `e`.
fn collapse_double_nots(tree: &mut CTree, body: NodeId) -> bool {
    let mut changed = false;

    for id in tree.collect(body) {
        if !attached(tree, body, id) || !is_not(tree, id) {
            continue;
        }

        let Some(inner) = tree.first_child(id) else {
            continue;
        };

        if !is_not(tree, inner) {
            continue;
        }

        let Some(value) = tree.first_child(inner) else {
            continue;
        };

        tree.unlink(value);
        tree.replace(id, value);
        changed = true;
    }

    changed
}

fn flipped(op: &str) -> Option<&'static str> {
    match op {
        "==" => Some("!="),
        "!=" => Some("=="),
        "<" => Some(">="),
        ">=" => Some("<"),
        ">" => Some("<="),
        "<=" => Some(">"),
        _ => None,
    }
}

/// `!(a < b)` becomes `a >= b`, and so on for every relational operator.
fn flip_negated_relations(tree: &mut CTree, body: NodeId) -> bool {
    let mut changed = false;

    for id in tree.collect(body) {
        if !attached(tree, body, id) || !is_not(tree, id) {
            continue;
        }

        let Some(inner) = tree.first_child(id) else {
            continue;
        };

        let replacement = match tree.kind(inner) {
            CKind::Binary { op } => flipped(op),
            _ => None,
        };

        let Some(new_op) = replacement else {
            continue;
        };

        *tree.kind_mut(inner) = CKind::Binary { op: new_op };
        tree.unlink(inner);
        tree.replace(id, inner);
        changed = true;
    }

    changed
}

/// An `if` whose then-branch is a lone `goto L`, where `L` is reachable by
/// fall-through after some trailing statements, turns into a negated `if`
/// holding those statements.
fn restructure_branching_ifs(tree: &mut CTree, body: NodeId) {
    for id in tree.collect(body) {
        if !attached(tree, body, id) {
            continue;
        }

        if !matches!(tree.kind(id), CKind::If) {
            continue;
        }

        // Condition plus a then-compound only; an else blocks the rewrite.
        if tree.child_count(id) != 2 {
            continue;
        }

        let then_compound = tree.nth_child(id, 1).unwrap();

        if tree.child_count(then_compound) != 1 {
            continue;
        }

        let branch = tree.first_child(then_compound).unwrap();
        let target = match tree.kind(branch) {
            CKind::Br { label } => *label,
            _ => continue,
        };

        // Collect the statements between the if and the matching label.
        let mut intervening = Vec::new();
        let mut cursor = tree.next(id);
        let mut found = false;

        while let Some(sibling) = cursor {
            if tree.kind(sibling) == &CKind::Label(target) {
                found = true;
                break;
            }

            intervening.push(sibling);
            cursor = tree.next(sibling);
        }

        if !found || intervening.is_empty() {
            continue;
        }

        // Negate the condition in place.
        let condition = tree.first_child(id).unwrap();
        let negated = tree.add(CKind::Unary { op: "!" });

        tree.replace(condition, negated);
        tree.link(condition, negated);

        // The branch goes away; the skipped statements move inside.
        tree.unlink(branch);

        for statement in intervening {
            tree.unlink(statement);
            tree.link(statement, then_compound);
        }
    }

    // A follow-up negation pass keeps `if (!(a < b))` from surviving.
    loop {
        let collapsed = collapse_double_nots(tree, body);
        let flipped = flip_negated_relations(tree, body);

        if !collapsed && !flipped {
            break;
        }
    }
}

/// Unlinks every label no branch or switch references any more.
fn remove_unused_labels(tree: &mut CTree, body: NodeId) {
    let mut used = std::collections::HashSet::new();

    for id in tree.collect(body) {
        match tree.kind(id) {
            CKind::Br { label } => {
                used.insert(*label);
            }
            CKind::Switch { cases, default } => {
                used.insert(*default);

                for (_, label) in cases {
                    used.insert(*label);
                }
            }
            _ => {}
        }
    }

    for id in tree.collect(body) {
        if let CKind::Label(label) = tree.kind(id) {
            if !used.contains(label) {
                tree.unlink(id);
            }
        }
    }
}

/// Whether the node is still reachable from the body root.
fn attached(tree: &CTree, body: NodeId, id: NodeId) -> bool {
    let mut cursor = Some(id);

    while let Some(current) = cursor {
        if current == body {
            return true;
        }

        cursor = tree.parent(current);
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn not(tree: &mut CTree, child: NodeId) -> NodeId {
        let node = tree.add(CKind::Unary { op: "!" });

        tree.link(child, node);
        node
    }

    #[test]
    fn double_negation_collapses() {
        let mut tree = CTree::new();
        let body = tree.add(CKind::Compound);
        let name = tree.add(CKind::NameUse("x".to_string()));
        let inner = not(&mut tree, name);
        let outer = not(&mut tree, inner);

        tree.link(outer, body);
        simplify(&mut tree, body);

        let statement = tree.first_child(body).unwrap();

        assert_eq!(tree.kind(statement), &CKind::NameUse("x".to_string()));
    }

    #[test]
    fn negated_relation_flips() {
        let mut tree = CTree::new();
        let body = tree.add(CKind::Compound);
        let less = tree.add(CKind::Binary { op: "<" });
        let a = tree.add(CKind::NameUse("a".to_string()));
        let b = tree.add(CKind::NameUse("b".to_string()));

        tree.link(a, less);
        tree.link(b, less);

        let negated = not(&mut tree, less);

        tree.link(negated, body);
        simplify(&mut tree, body);

        let statement = tree.first_child(body).unwrap();

        assert_eq!(tree.kind(statement), &CKind::Binary { op: ">=" });
    }

    #[test]
    fn branch_only_if_absorbs_skipped_statements() {
        // if (c) goto l1; x = 1; l1:;  =>  if (!c) { x = 1; }
        let mut tree = CTree::new();
        let body = tree.add(CKind::Compound);

        let if_node = tree.add(CKind::If);
        let condition = tree.add(CKind::NameUse("c".to_string()));
        let then_compound = tree.add(CKind::Compound);
        let branch = tree.add(CKind::Br { label: 1 });

        tree.link(condition, if_node);
        tree.link(branch, then_compound);
        tree.link(then_compound, if_node);
        tree.link(if_node, body);

        let assignment = tree.add(CKind::Binary { op: "=" });
        let x = tree.add(CKind::NameUse("x".to_string()));
        let one = tree.add(CKind::I32(1));

        tree.link(x, assignment);
        tree.link(one, assignment);
        tree.link(assignment, body);

        let label = tree.add(CKind::Label(1));
        tree.link(label, body);

        simplify(&mut tree, body);

        // The if is now the only statement; the label died with its use.
        let statements: Vec<_> = tree.children(body).collect();

        assert_eq!(statements.len(), 1);
        assert!(matches!(tree.kind(statements[0]), CKind::If));

        let new_condition = tree.first_child(statements[0]).unwrap();

        assert_eq!(tree.kind(new_condition), &CKind::Unary { op: "!" });

        let moved = tree.nth_child(statements[0], 1).unwrap();

        assert_eq!(tree.child_count(moved), 1);
    }

    #[test]
    fn simplification_is_idempotent() {
        let mut tree = CTree::new();
        let body = tree.add(CKind::Compound);
        let less = tree.add(CKind::Binary { op: "<" });
        let a = tree.add(CKind::NameUse("a".to_string()));
        let b = tree.add(CKind::NameUse("b".to_string()));

        tree.link(a, less);
        tree.link(b, less);

        let negated = not(&mut tree, less);
        tree.link(negated, body);

        simplify(&mut tree, body);

        let after_once: Vec<_> = tree
            .collect(body)
            .into_iter()
            .map(|id| tree.kind(id).clone())
            .collect();

        simplify(&mut tree, body);

        let after_twice: Vec<_> = tree
            .collect(body)
            .into_iter()
            .map(|id| tree.kind(id).clone())
            .collect();

        assert_eq!(after_once, after_twice);
    }
}
