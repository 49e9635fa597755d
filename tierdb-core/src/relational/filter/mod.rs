//! Partition filter conditions
//!
//! A [`Condition`] is an immutable boolean expression over partition column
//! values, parsed once per filter string and reused across many partition
//! evaluations during scan pruning and eviction scoping. Evaluation is a
//! pure recursive function over the tree.

pub mod parser;

pub use parser::{parse, FilterError};

use std::collections::HashMap;

/// Comparison operators allowed in condition leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

/// Logical connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

/// A literal operand in its native type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Int(i64),
    Str(String),
}

/// Column values of one partition, keyed by column reference.
pub type PartitionValues = HashMap<String, Literal>;

/// A parsed partition filter expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `column <op> literal`
    Leaf {
        op: CompareOp,
        column: String,
        literal: Literal,
    },
    /// `!child`
    Not(Box<Condition>),
    /// `left && right` / `left || right`
    Binary {
        op: LogicOp,
        left: Box<Condition>,
        right: Box<Condition>,
    },
}

impl Condition {
    /// Evaluate this condition against one partition's column values.
    ///
    /// Comparisons use the literal's native type; a missing column or a
    /// type mismatch makes the leaf false. AND/OR short-circuit and the
    /// tree is never mutated, so one parsed condition serves any number
    /// of partitions.
    pub fn evaluate(&self, values: &PartitionValues) -> bool {
        match self {
            Condition::Leaf {
                op,
                column,
                literal,
            } => match values.get(column) {
                Some(value) => compare(*op, value, literal),
                None => false,
            },
            Condition::Not(child) => !child.evaluate(values),
            Condition::Binary { op, left, right } => match op {
                LogicOp::And => left.evaluate(values) && right.evaluate(values),
                LogicOp::Or => left.evaluate(values) || right.evaluate(values),
            },
        }
    }
}

fn compare(op: CompareOp, value: &Literal, literal: &Literal) -> bool {
    match (value, literal) {
        (Literal::Int(a), Literal::Int(b)) => compare_ord(op, a, b),
        (Literal::Str(a), Literal::Str(b)) => compare_ord(op, a, b),
        _ => false,
    }
}

fn compare_ord<T: Ord + ?Sized>(op: CompareOp, a: &T, b: &T) -> bool {
    match op {
        CompareOp::Eq => a == b,
        CompareOp::Lt => a < b,
        CompareOp::Lte => a <= b,
        CompareOp::Gt => a > b,
        CompareOp::Gte => a >= b,
    }
}
