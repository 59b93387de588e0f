use enum_as_inner::EnumAsInner;
use enum_dispatch::enum_dispatch;
use strum::IntoStaticStr;

use crate::error::OptResult;
use crate::expr::ColumnSet;
use crate::operator::{
    Aggregate, CteAnchor, CteConsumer, CteProducer, Filter, HashJoin, Insert, Limit, Motion,
    NestedLoopJoin, PhysicalOperatorTrait, Projection, Sort, Spool, TableScan,
};
use crate::properties::{DeliveredProperties, RequiredProperties};

/// Physical relational operator.
#[enum_dispatch(PhysicalOperatorTrait)]
#[derive(Clone, Debug, Hash, Eq, PartialEq, EnumAsInner, IntoStaticStr)]
pub enum PhysicalOperator {
    PhysicalTableScan(TableScan),
    PhysicalFilter(Filter),
    PhysicalProjection(Projection),
    PhysicalHashJoin(HashJoin),
    PhysicalNestedLoopJoin(NestedLoopJoin),
    PhysicalLimit(Limit),
    PhysicalHashAggregate(Aggregate),
    PhysicalSort(Sort),
    PhysicalMotion(Motion),
    PhysicalSpool(Spool),
    PhysicalCteProducer(CteProducer),
    PhysicalCteConsumer(CteConsumer),
    /// Runs the cte producer first, then the body consuming it.
    PhysicalSequence(CteAnchor),
    PhysicalInsert(Insert),
}

impl PhysicalOperator {
    /// Enforcers only change physical properties of their input.
    pub fn is_enforcer(&self) -> bool {
        matches!(
            self,
            PhysicalOperator::PhysicalSort(_)
                | PhysicalOperator::PhysicalMotion(_)
                | PhysicalOperator::PhysicalSpool(_)
        )
    }

    pub fn name(&self) -> &'static str {
        self.into()
    }
}
