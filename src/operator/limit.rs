use crate::error::OptResult;
use crate::expr::ColumnSet;
use crate::operator::{
    check_child_index, child_columns, delivered_input, relational_input, LogicalOperatorTrait,
    PhysicalOperatorTrait,
};
use crate::properties::{
    DeliveredProperties, DistributionMatching, DistributionSpec, LogicalProperty, OrderSpec,
    RequiredProperties, SingletonKind,
};

/// Keeps `count` rows after skipping `offset` rows of the input sorted on `order`.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Limit {
    order: OrderSpec,
    offset: u64,
    count: Option<u64>,
}

impl Limit {
    pub fn new(count: u64) -> Self {
        Self {
            order: OrderSpec::any(),
            offset: 0,
            count: Some(count),
        }
    }

    pub fn with_order(mut self, order: OrderSpec) -> Self {
        self.order = order;
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Top level `ORDER BY` without `LIMIT` is a limit without count.
    pub fn order_only(order: OrderSpec) -> Self {
        Self {
            order,
            offset: 0,
            count: None,
        }
    }

    pub fn order(&self) -> &OrderSpec {
        &self.order
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn count(&self) -> Option<u64> {
        self.count
    }
}

impl LogicalOperatorTrait for Limit {
    fn arity(&self) -> usize {
        1
    }

    fn derive_logical_prop(&self, inputs: &[&LogicalProperty]) -> OptResult<LogicalProperty> {
        let input = relational_input(inputs, 0)?;
        let max_rows = match (input.max_rows(), self.count) {
            (Some(rows), Some(count)) => Some(rows.saturating_sub(self.offset).min(count)),
            (Some(rows), None) => Some(rows.saturating_sub(self.offset)),
            (None, count) => count,
        };
        Ok(LogicalProperty::Relational(
            input.clone().with_max_rows(max_rows),
        ))
    }
}

impl PhysicalOperatorTrait for Limit {
    fn arity(&self) -> usize {
        1
    }

    /// The input has to be gathered on one node and sorted on the limit order.
    fn required_child_props(
        &self,
        required: &RequiredProperties,
        child_index: usize,
        child_output: &ColumnSet,
    ) -> OptResult<RequiredProperties> {
        check_child_index("limit", child_index, 1)?;
        let singleton = match required.distribution().spec {
            DistributionSpec::Singleton(kind) => kind,
            _ => SingletonKind::Worker,
        };
        Ok(required
            .clone()
            .with_columns(child_columns(
                required,
                &self.order.used_columns(),
                child_output,
            ))
            .with_order(self.order.clone())
            .with_distribution(
                DistributionSpec::Singleton(singleton),
                DistributionMatching::Satisfy,
            ))
    }

    fn derive_delivered(&self, inputs: &[&DeliveredProperties]) -> OptResult<DeliveredProperties> {
        Ok(delivered_input(inputs, 0)?.clone())
    }
}
