use crate::error::OptResult;
use crate::expr::{ColumnId, ColumnSet};
use crate::operator::{
    check_child_index, delivered_input, relational_input, LogicalOperatorTrait,
    PhysicalOperatorTrait,
};
use crate::properties::{
    DeliveredProperties, DistributionSpec, LogicalProperty, RelationalProperty,
    RequiredProperties,
};

/// Inserts rows of its input into a table.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Insert {
    table_name: String,
    columns: Vec<ColumnId>,
}

impl Insert {
    pub fn new<S: Into<String>>(table_name: S, columns: Vec<ColumnId>) -> Self {
        Self {
            table_name: table_name.into(),
            columns,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn columns(&self) -> &[ColumnId] {
        &self.columns
    }
}

impl LogicalOperatorTrait for Insert {
    fn arity(&self) -> usize {
        1
    }

    fn derive_logical_prop(&self, inputs: &[&LogicalProperty]) -> OptResult<LogicalProperty> {
        relational_input(inputs, 0)?;
        Ok(LogicalProperty::Relational(RelationalProperty::new(
            ColumnSet::new(),
        )))
    }
}

impl PhysicalOperatorTrait for Insert {
    fn arity(&self) -> usize {
        1
    }

    fn required_child_props(
        &self,
        required: &RequiredProperties,
        child_index: usize,
        child_output: &ColumnSet,
    ) -> OptResult<RequiredProperties> {
        check_child_index("insert", child_index, 1)?;
        let columns: ColumnSet = self.columns.iter().collect();
        Ok(RequiredProperties::any(columns.intersection(child_output))
            .with_ctes(required.ctes().clone()))
    }

    fn derive_delivered(&self, inputs: &[&DeliveredProperties]) -> OptResult<DeliveredProperties> {
        let input = delivered_input(inputs, 0)?;
        Ok(DeliveredProperties::new(DistributionSpec::Random).with_ctes(input.ctes.clone()))
    }
}
