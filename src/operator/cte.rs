use crate::error::{OptError, OptResult};
use crate::expr::{ColumnId, ColumnSet};
use crate::operator::{
    check_child_index, delivered_input, pass_through, relational_input, LogicalOperatorTrait,
    PhysicalOperatorTrait,
};
use crate::properties::{
    CteId, CteKind, CteMap, CteRequirement, DeliveredProperties, DistributionSpec,
    LogicalProperty, RelationalProperty, RequiredProperties,
};

/// Scope of a common table expression. Child 0 produces the cte, child 1 is the body which
/// consumes it. Physically a sequence which runs its children in order.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct CteAnchor {
    id: CteId,
}

impl CteAnchor {
    pub fn new(id: CteId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> CteId {
        self.id
    }
}

impl LogicalOperatorTrait for CteAnchor {
    fn arity(&self) -> usize {
        2
    }

    fn derive_logical_prop(&self, inputs: &[&LogicalProperty]) -> OptResult<LogicalProperty> {
        Ok(LogicalProperty::Relational(
            relational_input(inputs, 1)?.clone(),
        ))
    }
}

impl PhysicalOperatorTrait for CteAnchor {
    fn arity(&self) -> usize {
        2
    }

    fn required_child_props(
        &self,
        required: &RequiredProperties,
        child_index: usize,
        child_output: &ColumnSet,
    ) -> OptResult<RequiredProperties> {
        check_child_index("sequence", child_index, 2)?;
        if child_index == 0 {
            Ok(RequiredProperties::any(child_output.clone()).with_ctes(
                CteRequirement::new().with_entry(self.id, CteKind::Producer, true),
            ))
        } else {
            let ctes = required
                .ctes()
                .clone()
                .with_entry(self.id, CteKind::Consumer, false);
            Ok(pass_through(required, &ColumnSet::new(), child_output).with_ctes(ctes))
        }
    }

    fn derive_delivered(&self, inputs: &[&DeliveredProperties]) -> OptResult<DeliveredProperties> {
        let producer = delivered_input(inputs, 0)?;
        let body = delivered_input(inputs, 1)?;
        let mut delivered = body.clone();
        delivered.ctes = producer.ctes.combine(&body.ctes).without(self.id);
        Ok(delivered)
    }
}

/// Materializes its input as cte `id`.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct CteProducer {
    id: CteId,
    columns: Vec<ColumnId>,
}

impl CteProducer {
    pub fn new(id: CteId, columns: Vec<ColumnId>) -> Self {
        Self { id, columns }
    }

    pub fn id(&self) -> CteId {
        self.id
    }

    pub fn columns(&self) -> &[ColumnId] {
        &self.columns
    }
}

impl LogicalOperatorTrait for CteProducer {
    fn arity(&self) -> usize {
        1
    }

    fn derive_logical_prop(&self, inputs: &[&LogicalProperty]) -> OptResult<LogicalProperty> {
        let input = relational_input(inputs, 0)?;
        Ok(LogicalProperty::Relational(
            RelationalProperty::new(self.columns.iter().collect()).with_max_rows(input.max_rows()),
        ))
    }
}

impl PhysicalOperatorTrait for CteProducer {
    fn arity(&self) -> usize {
        1
    }

    fn required_child_props(
        &self,
        required: &RequiredProperties,
        child_index: usize,
        child_output: &ColumnSet,
    ) -> OptResult<RequiredProperties> {
        check_child_index("cte producer", child_index, 1)?;
        let columns: ColumnSet = self.columns.iter().collect();
        Ok(RequiredProperties::any(columns.intersection(child_output))
            .with_ctes(required.ctes().without(self.id)))
    }

    fn derive_delivered(&self, inputs: &[&DeliveredProperties]) -> OptResult<DeliveredProperties> {
        let input = delivered_input(inputs, 0)?;
        let mut delivered = input.clone();
        delivered.ctes = input
            .ctes
            .combine(&CteMap::new().with_entry(self.id, CteKind::Producer));
        Ok(delivered)
    }
}

/// Reads cte `id` produced elsewhere in the plan.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct CteConsumer {
    id: CteId,
    columns: Vec<ColumnId>,
}

impl CteConsumer {
    pub fn new(id: CteId, columns: Vec<ColumnId>) -> Self {
        Self { id, columns }
    }

    pub fn id(&self) -> CteId {
        self.id
    }

    pub fn columns(&self) -> &[ColumnId] {
        &self.columns
    }
}

impl LogicalOperatorTrait for CteConsumer {
    fn arity(&self) -> usize {
        0
    }

    fn derive_logical_prop(&self, _inputs: &[&LogicalProperty]) -> OptResult<LogicalProperty> {
        Ok(LogicalProperty::Relational(RelationalProperty::new(
            self.columns.iter().collect(),
        )))
    }
}

impl PhysicalOperatorTrait for CteConsumer {
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
            "consumer of {} has no child {}",
            self.id, child_index
        )))
    }

    fn derive_delivered(&self, _inputs: &[&DeliveredProperties]) -> OptResult<DeliveredProperties> {
        Ok(DeliveredProperties::new(DistributionSpec::Random)
            .with_ctes(CteMap::new().with_entry(self.id, CteKind::Consumer)))
    }
}
