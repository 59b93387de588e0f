use enum_as_inner::EnumAsInner;

use crate::expr::ColumnSet;

/// Logical properties of a relational group.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct RelationalProperty {
    output_columns: ColumnSet,
    /// Upper bound of output rows, if known.
    max_rows: Option<u64>,
    /// Column sets known to be unique in the output.
    unique_keys: Vec<ColumnSet>,
}

impl RelationalProperty {
    pub fn new(output_columns: ColumnSet) -> Self {
        Self {
            output_columns,
            max_rows: None,
            unique_keys: vec![],
        }
    }

    pub fn with_max_rows(mut self, max_rows: Option<u64>) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn with_unique_keys(mut self, unique_keys: Vec<ColumnSet>) -> Self {
        self.unique_keys = unique_keys
            .into_iter()
            .filter(|k| !k.is_empty() && k.is_subset(&self.output_columns))
            .collect();
        self
    }

    pub fn output_columns(&self) -> &ColumnSet {
        &self.output_columns
    }

    pub fn max_rows(&self) -> Option<u64> {
        self.max_rows
    }

    pub fn unique_keys(&self) -> &[ColumnSet] {
        &self.unique_keys
    }
}

/// Logical properties of a scalar group.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct ScalarProperty {
    used_columns: ColumnSet,
}

impl ScalarProperty {
    pub fn new(used_columns: ColumnSet) -> Self {
        Self { used_columns }
    }

    pub fn used_columns(&self) -> &ColumnSet {
        &self.used_columns
    }
}

/// Properties shared by all expressions of a group, derived once from its first expression.
#[derive(Clone, PartialEq, Debug, EnumAsInner)]
pub enum LogicalProperty {
    Relational(RelationalProperty),
    Scalar(ScalarProperty),
}

impl LogicalProperty {
    pub fn is_scalar(&self) -> bool {
        matches!(self, LogicalProperty::Scalar(_))
    }

    /// Output columns of a relational group, empty for scalar groups.
    pub fn output_columns(&self) -> ColumnSet {
        match self {
            LogicalProperty::Relational(p) => p.output_columns().clone(),
            LogicalProperty::Scalar(_) => ColumnSet::new(),
        }
    }
}
