//! Predicate model for selection: attributes, comparators, conditions,
//! and the fold of key conditions into a single integer interval.

use tarn_common::{Result, TarnError};

/// Attribute a condition or projection refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Attr {
    /// The integer primary key column.
    Key = 1,
    /// The value column.
    Value = 2,
}

impl TryFrom<i32> for Attr {
    type Error = TarnError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            1 => Ok(Attr::Key),
            2 => Ok(Attr::Value),
            other => Err(TarnError::InvalidAttribute(other)),
        }
    }
}

/// What a select emits per matching tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Projection {
    /// Emit the key.
    Key = 1,
    /// Emit the value.
    Value = 2,
    /// Emit both key and value.
    All = 3,
    /// Emit nothing per tuple; print the match count at the end.
    Count = 4,
}

impl TryFrom<i32> for Projection {
    type Error = TarnError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            1 => Ok(Projection::Key),
            2 => Ok(Projection::Value),
            3 => Ok(Projection::All),
            4 => Ok(Projection::Count),
            other => Err(TarnError::InvalidAttribute(other)),
        }
    }
}

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl CompOp {
    /// Evaluates the comparator against an ordering of tuple attribute
    /// versus literal.
    pub fn matches(self, ord: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CompOp::Eq => ord == Equal,
            CompOp::Ne => ord != Equal,
            CompOp::Gt => ord == Greater,
            CompOp::Lt => ord == Less,
            CompOp::Ge => ord != Less,
            CompOp::Le => ord != Greater,
        }
    }
}

/// A single predicate from the parsed statement: attribute, comparator,
/// and literal (always surfaced as text by the parser).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub attr: Attr,
    pub op: CompOp,
    pub value: String,
}

impl Condition {
    /// Builds a key condition from an integer literal.
    pub fn key(op: CompOp, literal: i64) -> Self {
        Self {
            attr: Attr::Key,
            op,
            value: literal.to_string(),
        }
    }

    /// Builds a value condition from a string literal.
    pub fn value(op: CompOp, literal: &str) -> Self {
        Self {
            attr: Attr::Value,
            op,
            value: literal.to_string(),
        }
    }

    /// The literal as an integer; unparsable text compares as 0.
    pub fn key_literal(&self) -> i64 {
        self.value.trim().parse().unwrap_or(0)
    }

    /// Evaluates the condition against one tuple.
    pub fn matches(&self, key: i32, value: &str) -> bool {
        match self.attr {
            Attr::Key => self.op.matches((key as i64).cmp(&self.key_literal())),
            Attr::Value => self.op.matches(value.cmp(self.value.as_str())),
        }
    }
}

/// Evaluates a conjunction of conditions against one tuple.
pub fn matches_all(conds: &[Condition], key: i32, value: &str) -> bool {
    conds.iter().all(|c| c.matches(key, value))
}

/// Closed key interval, kept in i64 so comparator widening cannot
/// overflow at the i32 extremes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRange {
    pub lo: i64,
    pub hi: i64,
}

impl KeyRange {
    /// The interval covering every key.
    pub fn unbounded() -> Self {
        Self {
            lo: i64::MIN,
            hi: i64::MAX,
        }
    }

    /// Returns true if no key condition narrowed the interval.
    pub fn is_unbounded(&self) -> bool {
        self.lo == i64::MIN && self.hi == i64::MAX
    }

    /// Returns true if no i32 key can inhabit the interval.
    pub fn is_empty_for_keys(&self) -> bool {
        self.lo > self.hi || self.lo > i32::MAX as i64 || self.hi < (i32::MIN as i64)
    }
}

/// Folds every key condition into a single `[lo, hi]` interval plus
/// residual conditions evaluated per tuple.
///
/// Returns None when the conjunction is provably empty. Residuals are
/// all value conditions plus key `Ne` literals strictly inside the
/// interval; an `Ne` at a bound shrinks the interval instead, and an
/// `Ne` outside it is vacuous and dropped.
pub fn fold_key_range(conds: &[Condition]) -> Option<(KeyRange, Vec<Condition>)> {
    let mut range = KeyRange::unbounded();
    let mut residuals = Vec::new();

    for cond in conds {
        if cond.attr == Attr::Value {
            residuals.push(cond.clone());
            continue;
        }

        let v = cond.key_literal();
        match cond.op {
            CompOp::Eq => {
                if v < range.lo || v > range.hi {
                    return None;
                }
                range.lo = v;
                range.hi = v;
            }
            CompOp::Gt | CompOp::Ge => {
                let v = if cond.op == CompOp::Gt {
                    v.saturating_add(1)
                } else {
                    v
                };
                if v > range.hi {
                    return None;
                }
                if v > range.lo {
                    range.lo = v;
                }
            }
            CompOp::Lt | CompOp::Le => {
                let v = if cond.op == CompOp::Lt {
                    v.saturating_sub(1)
                } else {
                    v
                };
                if v < range.lo {
                    return None;
                }
                if v < range.hi {
                    range.hi = v;
                }
            }
            CompOp::Ne => {
                if v > range.lo && v < range.hi {
                    residuals.push(cond.clone());
                } else if v == range.lo && v == range.hi {
                    return None;
                } else if v == range.lo {
                    range.lo += 1;
                } else if v == range.hi {
                    range.hi -= 1;
                }
                // Outside the interval: vacuously true, dropped.
            }
        }
    }

    Some((range, residuals))
}
