//! Scalar expressions carried as operator parameters.

use std::collections::BTreeSet;
use std::fmt::{Debug, Display, Formatter};

use derive_more::From;
use itertools::Itertools;
use strum_macros::Display as StrumDisplay;

/// Identity of a column produced somewhere in a query.
///
/// Column ids are handed out by the semantic analyzer and are unique within one query.
#[derive(Copy, Clone, Debug, derive_more::Display, From, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[display(fmt = "c{}", _0)]
pub struct ColumnId(pub u32);

/// Ordered set of column ids.
#[derive(Clone, Default, Hash, Eq, PartialEq)]
pub struct ColumnSet(BTreeSet<ColumnId>);

impl ColumnSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: ColumnId) -> bool {
        self.0.insert(column)
    }

    pub fn contains(&self, column: ColumnId) -> bool {
        self.0.contains(&column)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ColumnId> + '_ {
        self.0.iter().copied()
    }

    pub fn extend_from(&mut self, other: &ColumnSet) {
        self.0.extend(other.iter());
    }

    pub fn union(&self, other: &ColumnSet) -> ColumnSet {
        ColumnSet(self.0.union(&other.0).copied().collect())
    }

    pub fn intersection(&self, other: &ColumnSet) -> ColumnSet {
        ColumnSet(self.0.intersection(&other.0).copied().collect())
    }

    pub fn is_subset(&self, other: &ColumnSet) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn intersects(&self, other: &ColumnSet) -> bool {
        !self.0.is_disjoint(&other.0)
    }
}

impl FromIterator<ColumnId> for ColumnSet {
    fn from_iter<T: IntoIterator<Item = ColumnId>>(iter: T) -> Self {
        ColumnSet(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a ColumnId> for ColumnSet {
    fn from_iter<T: IntoIterator<Item = &'a ColumnId>>(iter: T) -> Self {
        ColumnSet(iter.into_iter().copied().collect())
    }
}

impl Debug for ColumnSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", self.0.iter().join(", "))
    }
}

impl Display for ColumnSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

/// Literal values. There is no floating point variant: expressions must stay `Eq + Hash`
/// since they are part of group expression signatures.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum ScalarValue {
    Null,
    Boolean(bool),
    Int64(i64),
    Utf8(String),
}

impl Display for ScalarValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarValue::Null => write!(f, "NULL"),
            ScalarValue::Boolean(b) => write!(f, "{}", b),
            ScalarValue::Int64(v) => write!(f, "{}", v),
            ScalarValue::Utf8(s) => write!(f, "'{}'", s),
        }
    }
}

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, StrumDisplay)]
pub enum BinaryOperator {
    #[strum(serialize = "=")]
    Eq,
    #[strum(serialize = "<>")]
    NotEq,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    LtEq,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    GtEq,
    #[strum(serialize = "AND")]
    And,
    #[strum(serialize = "OR")]
    Or,
    #[strum(serialize = "+")]
    Plus,
    #[strum(serialize = "-")]
    Minus,
}

impl BinaryOperator {
    /// Comparisons evaluate to unknown when either side is null.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::NotEq
                | BinaryOperator::Lt
                | BinaryOperator::LtEq
                | BinaryOperator::Gt
                | BinaryOperator::GtEq
        )
    }
}

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, StrumDisplay)]
pub enum AggregateFunction {
    #[strum(serialize = "count")]
    Count,
    #[strum(serialize = "sum")]
    Sum,
    #[strum(serialize = "min")]
    Min,
    #[strum(serialize = "max")]
    Max,
}

/// Scalar expression tree.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum Expr {
    Column(ColumnId),
    Literal(ScalarValue),
    BinaryExpr {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    IsNull(Box<Expr>),
    IsNotNull(Box<Expr>),
    Aggregate {
        func: AggregateFunction,
        arg: Box<Expr>,
    },
}

pub fn col(column: u32) -> Expr {
    Expr::Column(ColumnId(column))
}

pub fn lit_bool(value: bool) -> Expr {
    Expr::Literal(ScalarValue::Boolean(value))
}

pub fn lit_i64(value: i64) -> Expr {
    Expr::Literal(ScalarValue::Int64(value))
}

pub fn binary_expr(left: Expr, op: BinaryOperator, right: Expr) -> Expr {
    Expr::BinaryExpr {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

impl Expr {
    pub fn eq(self, other: Expr) -> Expr {
        binary_expr(self, BinaryOperator::Eq, other)
    }

    pub fn gt(self, other: Expr) -> Expr {
        binary_expr(self, BinaryOperator::Gt, other)
    }

    pub fn and(self, other: Expr) -> Expr {
        binary_expr(self, BinaryOperator::And, other)
    }

    pub fn or(self, other: Expr) -> Expr {
        binary_expr(self, BinaryOperator::Or, other)
    }

    pub fn is_true_literal(&self) -> bool {
        matches!(self, Expr::Literal(ScalarValue::Boolean(true)))
    }

    /// Columns referenced anywhere in this expression.
    pub fn used_columns(&self) -> ColumnSet {
        let mut columns = ColumnSet::new();
        self.collect_columns(&mut columns);
        columns
    }

    fn collect_columns(&self, columns: &mut ColumnSet) {
        match self {
            Expr::Column(c) => {
                columns.insert(*c);
            }
            Expr::Literal(_) => {}
            Expr::BinaryExpr { left, right, .. } => {
                left.collect_columns(columns);
                right.collect_columns(columns);
            }
            Expr::Not(e) | Expr::IsNull(e) | Expr::IsNotNull(e) => e.collect_columns(columns),
            Expr::Aggregate { arg, .. } => arg.collect_columns(columns),
        }
    }

    /// Splits a conjunction into its conjuncts.
    pub fn conjuncts(&self) -> Vec<&Expr> {
        match self {
            Expr::BinaryExpr {
                left,
                op: BinaryOperator::And,
                right,
            } => {
                let mut ret = left.conjuncts();
                ret.extend(right.conjuncts());
                ret
            }
            e => vec![e],
        }
    }

    /// Equality conjuncts of the form `a = b` between plain columns.
    pub fn equi_join_pairs(&self) -> Vec<(ColumnId, ColumnId)> {
        self.conjuncts()
            .into_iter()
            .filter_map(|e| match e {
                Expr::BinaryExpr {
                    left,
                    op: BinaryOperator::Eq,
                    right,
                } => match (left.as_ref(), right.as_ref()) {
                    (Expr::Column(l), Expr::Column(r)) => Some((*l, *r)),
                    _ => None,
                },
                _ => None,
            })
            .collect()
    }

    /// Columns on which this predicate rejects nulls: if any of them is null, the predicate
    /// cannot evaluate to true.
    pub fn null_rejected_columns(&self) -> ColumnSet {
        match self {
            Expr::BinaryExpr {
                left,
                op: BinaryOperator::And,
                right,
            } => left
                .null_rejected_columns()
                .union(&right.null_rejected_columns()),
            Expr::BinaryExpr {
                left,
                op: BinaryOperator::Or,
                right,
            } => left
                .null_rejected_columns()
                .intersection(&right.null_rejected_columns()),
            Expr::BinaryExpr { left, op, right } if op.is_comparison() => {
                left.used_columns().union(&right.used_columns())
            }
            Expr::IsNotNull(e) => match e.as_ref() {
                Expr::Column(c) => std::iter::once(*c).collect(),
                _ => ColumnSet::new(),
            },
            _ => ColumnSet::new(),
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Column(c) => write!(f, "{}", c),
            Expr::Literal(v) => write!(f, "{}", v),
            Expr::BinaryExpr { left, op, right } => write!(f, "({} {} {})", left, op, right),
            Expr::Not(e) => write!(f, "NOT {}", e),
            Expr::IsNull(e) => write!(f, "{} IS NULL", e),
            Expr::IsNotNull(e) => write!(f, "{} IS NOT NULL", e),
            Expr::Aggregate { func, arg } => write!(f, "{}({})", func, arg),
        }
    }
}
