use crate::error::OptResult;
use crate::expr::{ColumnId, ColumnSet, Expr};
use crate::operator::{
    check_child_index, delivered_input, relational_input, LogicalOperatorTrait,
    PhysicalOperatorTrait,
};
use crate::properties::{
    DeliveredProperties, DistributionMatching, DistributionSpec, LogicalProperty, OrderSpec,
    RelationalProperty, RequiredProperties, Rewindability, SingletonKind,
};

/// Grouped aggregation. Physically a hash aggregate.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Aggregate {
    group_by: Vec<ColumnId>,
    aggregates: Vec<(ColumnId, Expr)>,
}

impl Aggregate {
    pub fn new(group_by: Vec<ColumnId>, aggregates: Vec<(ColumnId, Expr)>) -> Self {
        Self {
            group_by,
            aggregates,
        }
    }

    pub fn group_by(&self) -> &[ColumnId] {
        &self.group_by
    }

    pub fn aggregates(&self) -> &[(ColumnId, Expr)] {
        &self.aggregates
    }

    fn group_by_set(&self) -> ColumnSet {
        self.group_by.iter().collect()
    }
}

impl LogicalOperatorTrait for Aggregate {
    fn arity(&self) -> usize {
        1
    }

    fn derive_logical_prop(&self, inputs: &[&LogicalProperty]) -> OptResult<LogicalProperty> {
        let input = relational_input(inputs, 0)?;
        let mut output = self.group_by_set();
        output.extend_from(&self.aggregates.iter().map(|(c, _)| *c).collect());

        let prop = if self.group_by.is_empty() {
            RelationalProperty::new(output).with_max_rows(Some(1))
        } else {
            RelationalProperty::new(output)
                .with_max_rows(input.max_rows())
                .with_unique_keys(vec![self.group_by_set()])
        };
        Ok(LogicalProperty::Relational(prop))
    }
}

impl PhysicalOperatorTrait for Aggregate {
    fn arity(&self) -> usize {
        1
    }

    /// Rows of a group have to meet on one worker: the input is hashed on a subset of the
    /// grouping columns, or gathered when there are none.
    fn required_child_props(
        &self,
        required: &RequiredProperties,
        child_index: usize,
        child_output: &ColumnSet,
    ) -> OptResult<RequiredProperties> {
        check_child_index("aggregate", child_index, 1)?;
        let mut columns = self.group_by_set();
        for (_, e) in &self.aggregates {
            columns.extend_from(&e.used_columns());
        }
        let (distribution, matching) = if self.group_by.is_empty() {
            (
                DistributionSpec::Singleton(SingletonKind::Worker),
                DistributionMatching::Satisfy,
            )
        } else {
            (
                DistributionSpec::Hashed(self.group_by.clone()),
                DistributionMatching::Subset,
            )
        };
        Ok(required
            .clone()
            .with_columns(columns.intersection(child_output))
            .with_order(OrderSpec::any())
            .with_distribution(distribution, matching)
            .with_rewindability(Rewindability::None))
    }

    fn derive_delivered(&self, inputs: &[&DeliveredProperties]) -> OptResult<DeliveredProperties> {
        let input = delivered_input(inputs, 0)?;
        Ok(DeliveredProperties::new(input.distribution.clone()).with_ctes(input.ctes.clone()))
    }
}
