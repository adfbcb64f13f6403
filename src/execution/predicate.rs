use std::cmp::Ordering;
use std::fmt;

use crate::tuple::{Tuple, Value};

/// Comparison operators understood by predicates and selectivity estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEq,
    LessThan,
    LessThanOrEq,
    Like,
}

impl Op {
    /// Evaluates `left op right`. Values of different kinds never match.
    ///
    /// `Like` is substring containment on strings and equality on integers.
    pub fn apply(&self, left: &Value, right: &Value) -> bool {
        if let (Op::Like, Value::Str(l), Value::Str(r)) = (self, left, right) {
            return l.contains(r.as_str());
        }

        let Some(ord) = left.compare(right) else {
            return false;
        };
        match self {
            Op::Equals | Op::Like => ord == Ordering::Equal,
            Op::NotEquals => ord != Ordering::Equal,
            Op::GreaterThan => ord == Ordering::Greater,
            Op::GreaterThanOrEq => ord != Ordering::Less,
            Op::LessThan => ord == Ordering::Less,
            Op::LessThanOrEq => ord != Ordering::Greater,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Op::Equals => "=",
            Op::NotEquals => "<>",
            Op::GreaterThan => ">",
            Op::GreaterThanOrEq => ">=",
            Op::LessThan => "<",
            Op::LessThanOrEq => "<=",
            Op::Like => "LIKE",
        };
        f.write_str(s)
    }
}

/// Compares a field of an outer tuple with a field of an inner tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinPredicate {
    pub left_field: usize,
    pub op: Op,
    pub right_field: usize,
}

impl JoinPredicate {
    pub fn new(left_field: usize, op: Op, right_field: usize) -> Self {
        Self {
            left_field,
            op,
            right_field,
        }
    }

    /// Returns true if `left.left_field op right.right_field` holds.
    /// A missing field never matches.
    pub fn filter(&self, left: &Tuple, right: &Tuple) -> bool {
        match (left.value(self.left_field), right.value(self.right_field)) {
            (Some(l), Some(r)) => self.op.apply(l, r),
            _ => false,
        }
    }
}

impl fmt::Display for JoinPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${} {} ${}", self.left_field, self.op, self.right_field)
    }
}
