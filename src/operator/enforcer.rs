//! Enforcers establish one physical property on top of an input lacking it.

use crate::error::OptResult;
use crate::expr::{ColumnId, ColumnSet};
use crate::operator::{check_child_index, delivered_input, PhysicalOperatorTrait};
use crate::properties::{
    DeliveredProperties, DistributionMatching, DistributionSpec, OrderSpec, RequiredProperties,
    Rewindability, SingletonKind,
};

fn input_columns(required: &RequiredProperties, child_output: &ColumnSet) -> ColumnSet {
    required.columns().intersection(child_output)
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Sort {
    order: OrderSpec,
}

impl Sort {
    pub fn new(order: OrderSpec) -> Self {
        Self { order }
    }

    pub fn order(&self) -> &OrderSpec {
        &self.order
    }
}

impl PhysicalOperatorTrait for Sort {
    fn arity(&self) -> usize {
        1
    }

    fn required_child_props(
        &self,
        required: &RequiredProperties,
        child_index: usize,
        child_output: &ColumnSet,
    ) -> OptResult<RequiredProperties> {
        check_child_index("sort", child_index, 1)?;
        let mut columns = input_columns(required, child_output);
        columns.extend_from(&self.order.used_columns().intersection(child_output));
        Ok(required
            .clone()
            .with_columns(columns)
            .with_order(OrderSpec::any())
            .with_rewindability(Rewindability::None))
    }

    /// Sorting materializes the input, so the output can be rescanned.
    fn derive_delivered(&self, inputs: &[&DeliveredProperties]) -> OptResult<DeliveredProperties> {
        Ok(delivered_input(inputs, 0)?
            .clone()
            .with_order(self.order.clone())
            .with_rewindability(Rewindability::General))
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum MotionKind {
    /// Sends all rows to one node, merging sorted streams.
    Gather(SingletonKind),
    Redistribute(Vec<ColumnId>),
    Broadcast,
}

/// Moves rows between workers.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Motion {
    kind: MotionKind,
}

impl Motion {
    pub fn new(kind: MotionKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> &MotionKind {
        &self.kind
    }

    fn delivered_distribution(&self) -> DistributionSpec {
        match &self.kind {
            MotionKind::Gather(kind) => DistributionSpec::Singleton(*kind),
            MotionKind::Redistribute(columns) => DistributionSpec::Hashed(columns.clone()),
            MotionKind::Broadcast => DistributionSpec::Replicated,
        }
    }
}

impl PhysicalOperatorTrait for Motion {
    fn arity(&self) -> usize {
        1
    }

    fn required_child_props(
        &self,
        required: &RequiredProperties,
        child_index: usize,
        child_output: &ColumnSet,
    ) -> OptResult<RequiredProperties> {
        check_child_index("motion", child_index, 1)?;
        let mut columns = input_columns(required, child_output);
        let order = match &self.kind {
            MotionKind::Gather(_) => required.order().spec.restrict_to(child_output),
            MotionKind::Redistribute(keys) => {
                columns.extend_from(&keys.iter().collect::<ColumnSet>().intersection(child_output));
                OrderSpec::any()
            }
            MotionKind::Broadcast => OrderSpec::any(),
        };
        Ok(required
            .clone()
            .with_columns(columns)
            .with_order(order)
            .with_distribution(DistributionSpec::Any, DistributionMatching::Satisfy)
            .with_rewindability(Rewindability::None))
    }

    fn derive_delivered(&self, inputs: &[&DeliveredProperties]) -> OptResult<DeliveredProperties> {
        let input = delivered_input(inputs, 0)?;
        let order = match &self.kind {
            MotionKind::Gather(_) => input.order.clone(),
            _ => OrderSpec::any(),
        };
        Ok(DeliveredProperties::new(self.delivered_distribution())
            .with_order(order)
            .with_ctes(input.ctes.clone()))
    }
}

/// Materializes its input to make it rewindable.
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq)]
pub struct Spool;

impl PhysicalOperatorTrait for Spool {
    fn arity(&self) -> usize {
        1
    }

    fn required_child_props(
        &self,
        required: &RequiredProperties,
        child_index: usize,
        child_output: &ColumnSet,
    ) -> OptResult<RequiredProperties> {
        check_child_index("spool", child_index, 1)?;
        Ok(required
            .clone()
            .with_columns(input_columns(required, child_output))
            .with_rewindability(Rewindability::None))
    }

    fn derive_delivered(&self, inputs: &[&DeliveredProperties]) -> OptResult<DeliveredProperties> {
        Ok(delivered_input(inputs, 0)?
            .clone()
            .with_rewindability(Rewindability::General))
    }
}
