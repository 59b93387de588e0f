use enum_as_inner::EnumAsInner;
use enum_dispatch::enum_dispatch;
use strum::IntoStaticStr;

use crate::error::OptResult;
use crate::operator::{
    Aggregate, CteAnchor, CteConsumer, CteProducer, Filter, Insert, Join, Limit,
    LogicalOperatorTrait, Projection, TableScan,
};
use crate::properties::LogicalProperty;

/// Logical relational operator.
#[enum_dispatch(LogicalOperatorTrait)]
#[derive(Clone, Debug, Hash, Eq, PartialEq, EnumAsInner, IntoStaticStr)]
pub enum LogicalOperator {
    LogicalScan(TableScan),
    LogicalFilter(Filter),
    LogicalProjection(Projection),
    LogicalJoin(Join),
    LogicalLimit(Limit),
    LogicalAggregate(Aggregate),
    LogicalCteAnchor(CteAnchor),
    LogicalCteProducer(CteProducer),
    LogicalCteConsumer(CteConsumer),
    LogicalInsert(Insert),
}

impl LogicalOperator {
    pub fn name(&self) -> &'static str {
        self.into()
    }
}
