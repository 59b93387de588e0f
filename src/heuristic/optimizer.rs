use anyhow::anyhow;
use log::{debug, trace};

use crate::error::OptResult;
use crate::heuristic::{HepNodeId, PlanGraph};
use crate::optimizer::{Optimizer, OptimizerContext};
use crate::plan::Plan;
use crate::rules::{Rule, RuleImpl, RuleResult};

pub struct HepOptimizer {
    rules: Vec<RuleImpl>,
    graph: PlanGraph,
    context: OptimizerContext,
}

impl Optimizer for HepOptimizer {
    fn context(&self) -> &OptimizerContext {
        &self.context
    }

    fn find_best_plan(mut self) -> OptResult<Plan> {
        for times in 0..self.context.max_iter_times {
            // The plan no longer changes after iteration
            let mut fixed_point = true;
            let node_ids = self.graph.nodes_iter(self.context.match_order);
            for node_id in node_ids {
                for rule in &self.rules.clone() {
                    trace!(
                        "Trying to apply rule {} to {}",
                        rule.id(),
                        self.graph.operator(node_id).name()
                    );
                    if self.apply_rule(rule, node_id)? {
                        debug!("Applied rule {} in iteration {}", rule.id(), times);
                        fixed_point = false;
                        break;
                    }
                }

                if !fixed_point {
                    break;
                }
            }

            if fixed_point {
                break;
            }
        }

        self.graph.to_plan()
    }
}

impl HepOptimizer {
    /// Rules come from `context.rules`.
    pub fn new(context: OptimizerContext, plan: Plan) -> Self {
        Self {
            rules: RuleImpl::from_ids(context.rules),
            graph: PlanGraph::from(plan),
            context,
        }
    }

    fn apply_rule(&mut self, rule: &RuleImpl, node_id: HepNodeId) -> OptResult<bool> {
        let mut results = RuleResult::new();
        rule.apply(node_id, &self.graph, &mut results)?;

        let mut results = results.results();
        match results.next() {
            Some(new_expr) => {
                if results.next().is_some() {
                    return Err(anyhow!("Rewrite rule {} returned more than 1 result.", rule.id()).into());
                }
                Ok(self.graph.replace_opt_expression(&new_expr, node_id))
            }
            // No transformation generated.
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{col, lit_bool, lit_i64, ColumnId};
    use crate::operator::TableScan;
    use crate::optimizer::MatchOrder;
    use crate::plan::LogicalPlanBuilder;

    fn plan() -> Plan {
        LogicalPlanBuilder::scan(TableScan::new("t1", vec![ColumnId(1), ColumnId(2)]))
            .filter(lit_bool(true))
            .filter(col(1).gt(lit_i64(1)))
            .filter(lit_bool(true))
            .build()
    }

    #[test]
    fn test_fixed_point() {
        let _ = env_logger::builder().is_test(true).try_init();
        for match_order in [MatchOrder::TopDown, MatchOrder::BottomUp] {
            let context = OptimizerContext::default().with_match_order(match_order);
            let optimized = HepOptimizer::new(context, plan()).find_best_plan().unwrap();
            assert_eq!(2, optimized.depth(), "{:?}", match_order);
            assert_eq!("LogicalFilter", optimized.root().operator().name());
        }
    }

    #[test]
    fn test_max_iter_times() {
        let context = OptimizerContext::default().with_max_iter_times(1);
        let optimized = HepOptimizer::new(context, plan()).find_best_plan().unwrap();
        assert_eq!(3, optimized.depth());
    }

    #[test]
    fn test_no_rules() {
        let context = OptimizerContext::default().with_rules(Default::default());
        let optimizer = HepOptimizer::new(context, plan());
        assert!(optimizer.context().rules.is_empty());
        assert_eq!(4, optimizer.find_best_plan().unwrap().depth());
    }
}
