//! Signatures, type uses, locals and constant expressions.

use crate::encodings::ValueType;
use crate::instruction::Instruction;

/// A named (or anonymous) function parameter. Identifiers take part in local
/// resolution but never in signature equality.
#[derive(Clone, Debug)]
pub struct Param {
    pub id: Option<String>,
    pub value_type: ValueType,
}

impl Param {
    pub fn new(value_type: ValueType) -> Self {
        Param {
            id: None,
            value_type,
        }
    }

    pub fn named(id: impl Into<String>, value_type: ValueType) -> Self {
        Param {
            id: Some(id.into()),
            value_type,
        }
    }
}

/// A function signature: ordered parameters and results.
///
/// Two signatures are equal iff their parameter *types* are pairwise equal
/// (ids are ignored) and their results are pairwise equal.
#[derive(Clone, Debug, Default)]
pub struct Signature {
    pub params: Vec<Param>,
    pub results: Vec<ValueType>,
}

impl Signature {
    pub fn new(params: Vec<Param>, results: Vec<ValueType>) -> Self {
        Signature { params, results }
    }

    /// A signature from bare value types, as the binary format spells them.
    pub fn from_types(params: Vec<ValueType>, results: Vec<ValueType>) -> Self {
        Signature {
            params: params.into_iter().map(Param::new).collect(),
            results,
        }
    }

    pub fn param_types(&self) -> impl Iterator<Item = ValueType> + '_ {
        self.params.iter().map(|param| param.value_type)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty() && self.results.is_empty()
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.params.len() == other.params.len()
            && self.results == other.results
            && self
                .param_types()
                .zip(other.param_types())
                .all(|(left, right)| left == right)
    }
}

impl Eq for Signature {}

/// A reference to a signature: a type index plus the resolved signature copy.
///
/// During text parsing the use may start out with only an inline signature or
/// only a `(type N)` reference; resolution fills in the other half and checks
/// that both agree when the source supplies both.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeUse {
    pub index: u32,
    pub signature: Signature,
}

impl TypeUse {
    pub fn new(index: u32, signature: Signature) -> Self {
        TypeUse { index, signature }
    }
}

/// A single local variable of a code entry. The binary format groups runs of
/// equal types; the model keeps one entry per local and the writer re-groups.
#[derive(Clone, Debug)]
pub struct Local {
    pub id: Option<String>,
    pub value_type: ValueType,
}

impl Local {
    pub fn new(value_type: ValueType) -> Self {
        Local {
            id: None,
            value_type,
        }
    }

    pub fn named(id: impl Into<String>, value_type: ValueType) -> Self {
        Local {
            id: Some(id.into()),
            value_type,
        }
    }
}

/// An instruction sequence, e.g. a function body or a constant initialiser.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Expression {
    pub instructions: Vec<Instruction>,
}

impl Expression {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Expression { instructions }
    }

    pub fn empty() -> Self {
        Expression {
            instructions: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl From<Vec<Instruction>> for Expression {
    fn from(instructions: Vec<Instruction>) -> Self {
        Expression { instructions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_equality_ignores_ids() {
        let anonymous = Signature::from_types(vec![ValueType::I32], vec![ValueType::I32]);
        let named = Signature::new(
            vec![Param::named("x", ValueType::I32)],
            vec![ValueType::I32],
        );

        assert_eq!(anonymous, named);
    }

    #[test]
    fn signature_equality_respects_types() {
        let left = Signature::from_types(vec![ValueType::I32], vec![]);
        let right = Signature::from_types(vec![ValueType::I64], vec![]);

        assert_ne!(left, right);
        assert_ne!(left, Signature::from_types(vec![], vec![]));
    }

    #[test]
    fn signature_equality_respects_results() {
        let left = Signature::from_types(vec![], vec![ValueType::F32]);
        let right = Signature::from_types(vec![], vec![ValueType::F64]);

        assert_ne!(left, right);
    }
}
