use crate::error::{OptError, OptResult};
use crate::expr::{ColumnId, ColumnSet};
use crate::operator::{LogicalOperatorTrait, PhysicalOperatorTrait};
use crate::properties::{
    DeliveredProperties, DistributionSpec, LogicalProperty, RelationalProperty,
    RequiredProperties, Rewindability,
};

/// Scan of a base table.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct TableScan {
    table_name: String,
    columns: Vec<ColumnId>,
    /// How the table is stored across workers.
    distribution: DistributionSpec,
    unique_keys: Vec<Vec<ColumnId>>,
}

impl TableScan {
    pub fn new<S: Into<String>>(table_name: S, columns: Vec<ColumnId>) -> Self {
        Self {
            table_name: table_name.into(),
            columns,
            distribution: DistributionSpec::Random,
            unique_keys: vec![],
        }
    }

    pub fn with_distribution(mut self, distribution: DistributionSpec) -> Self {
        self.distribution = distribution;
        self
    }

    pub fn with_unique_key(mut self, key: Vec<ColumnId>) -> Self {
        self.unique_keys.push(key);
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn columns(&self) -> &[ColumnId] {
        &self.columns
    }

    pub fn distribution(&self) -> &DistributionSpec {
        &self.distribution
    }
}

impl LogicalOperatorTrait for TableScan {
    fn arity(&self) -> usize {
        0
    }

    fn derive_logical_prop(&self, _inputs: &[&LogicalProperty]) -> OptResult<LogicalProperty> {
        let keys = self
            .unique_keys
            .iter()
            .map(|k| k.iter().collect::<ColumnSet>())
            .collect();
        Ok(LogicalProperty::Relational(
            RelationalProperty::new(self.columns.iter().collect()).with_unique_keys(keys),
        ))
    }
}

impl PhysicalOperatorTrait for TableScan {
    fn arity(&self) -> usize {
        0
    }

    fn required_child_props(
        &self,
        _required: &RequiredProperties,
        child_index: usize,
        _child_output: &ColumnSet,
    ) -> OptResult<RequiredProperties> {
        Err(OptError::invariant(format!(
            "table scan of {} has no child {}",
            self.table_name, child_index
        )))
    }

    fn derive_delivered(&self, _inputs: &[&DeliveredProperties]) -> OptResult<DeliveredProperties> {
        Ok(DeliveredProperties::new(self.distribution.clone())
            .with_rewindability(Rewindability::General))
    }
}
