use crate::heuristic::{HepNodeId, PlanGraph};
use crate::operator::LogicalOperator::{LogicalCteAnchor, LogicalCteConsumer};
use crate::operator::Operator::Logical;
use crate::rules::{OptExpression, Rule, RuleId, RuleResult};

/// Drops a cte whose body never consumes it, keeping only the body.
#[derive(Clone, Debug)]
pub struct RemoveUnusedCteRule;

impl Rule for RemoveUnusedCteRule {
    fn id(&self) -> RuleId {
        RuleId::RemoveUnusedCte
    }

    fn apply(
        &self,
        node: HepNodeId,
        graph: &PlanGraph,
        result: &mut RuleResult,
    ) -> anyhow::Result<()> {
        let id = match graph.operator(node) {
            Logical(LogicalCteAnchor(anchor)) => anchor.id(),
            _ => return Ok(()),
        };
        let body = graph.input(node, 1)?;
        let consumed = graph.reaches(body, |operator| {
            matches!(operator, Logical(LogicalCteConsumer(consumer)) if consumer.id() == id)
        });
        if !consumed {
            result.add(OptExpression::existing(body));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::expr::{col, lit_i64, ColumnId};
    use crate::heuristic::HepOptimizer;
    use crate::operator::TableScan;
    use crate::optimizer::{Optimizer, OptimizerContext};
    use crate::plan::LogicalPlanBuilder;
    use crate::properties::CteId;
    use crate::rules::RuleId;

    fn producer() -> LogicalPlanBuilder {
        LogicalPlanBuilder::scan(TableScan::new("t1", vec![ColumnId(1)]))
            .cte_producer(CteId(0), vec![ColumnId(1)])
    }

    fn optimize(plan: crate::plan::Plan) -> crate::plan::Plan {
        let config = OptimizerContext::default().with_rules(RuleId::RemoveUnusedCte.into());
        HepOptimizer::new(config, plan).find_best_plan().unwrap()
    }

    #[test]
    fn test_remove_unused_cte() {
        let body = LogicalPlanBuilder::scan(TableScan::new("t2", vec![ColumnId(2)]))
            .filter(col(2).gt(lit_i64(1)))
            .build();
        let optimized = optimize(producer().cte_anchor(CteId(0), body).build());
        assert_eq!("LogicalFilter", optimized.root().operator().name());
        assert_eq!(2, optimized.bfs_iterator().count());
    }

    #[test]
    fn test_keep_consumed_cte() {
        let body = LogicalPlanBuilder::cte_consumer(CteId(0), vec![ColumnId(5)]).build();
        let optimized = optimize(producer().cte_anchor(CteId(0), body).build());
        assert_eq!("LogicalCteAnchor", optimized.root().operator().name());
        assert_eq!(4, optimized.bfs_iterator().count());
    }
}
