use std::fmt::{Display, Formatter};

use itertools::Itertools;

use crate::expr::{ColumnId, ColumnSet};
use crate::properties::PhysicalProp;

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct SortKey {
    pub column: ColumnId,
    pub descending: bool,
    pub nulls_first: bool,
}

impl SortKey {
    pub fn asc(column: ColumnId) -> Self {
        Self {
            column,
            descending: false,
            nulls_first: false,
        }
    }

    pub fn desc(column: ColumnId) -> Self {
        Self {
            column,
            descending: true,
            nulls_first: true,
        }
    }
}

impl Display for SortKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}",
            self.column,
            if self.descending { "DESC" } else { "ASC" }
        )
    }
}

/// Sort order of a stream. The empty order means "no order".
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq)]
pub struct OrderSpec {
    keys: Vec<SortKey>,
}

impl OrderSpec {
    pub fn new(keys: Vec<SortKey>) -> Self {
        Self { keys }
    }

    pub fn any() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn used_columns(&self) -> ColumnSet {
        self.keys.iter().map(|k| k.column).collect()
    }

    /// Keeps the longest prefix whose columns are all in `columns`.
    pub fn restrict_to(&self, columns: &ColumnSet) -> OrderSpec {
        OrderSpec {
            keys: self
                .keys
                .iter()
                .take_while(|k| columns.contains(k.column))
                .copied()
                .collect(),
        }
    }
}

impl PhysicalProp for OrderSpec {
    /// A stream sorted on `a, b, c` satisfies a requirement of `a, b`.
    fn satisfies(&self, required: &Self) -> bool {
        required.keys.len() <= self.keys.len()
            && required.keys.iter().zip(self.keys.iter()).all(|(r, d)| r == d)
    }
}

impl Display for OrderSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.keys.is_empty() {
            write!(f, "<any>")
        } else {
            write!(f, "[{}]", self.keys.iter().join(", "))
        }
    }
}

/// How a required order is matched against a delivered one.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum OrderMatching {
    Satisfy,
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct EnforcedOrder {
    pub spec: OrderSpec,
    pub matching: OrderMatching,
}

impl EnforcedOrder {
    pub fn new(spec: OrderSpec) -> Self {
        Self {
            spec,
            matching: OrderMatching::Satisfy,
        }
    }

    pub fn is_satisfied_by(&self, delivered: &OrderSpec) -> bool {
        match self.matching {
            OrderMatching::Satisfy => delivered.satisfies(&self.spec),
        }
    }
}
