use crate::heuristic::{HepNodeId, PlanGraph};
use crate::operator::LogicalOperator::{LogicalFilter, LogicalJoin};
use crate::operator::Operator::Logical;
use crate::operator::{Join, JoinType};
use crate::rules::{OptExpression, Rule, RuleId, RuleResult};

/// Turns a left outer join into an inner join when the filter above it rejects the nulls the
/// join would produce for unmatched rows.
#[derive(Clone, Debug)]
pub struct OuterJoinToInnerRule;

impl Rule for OuterJoinToInnerRule {
    fn id(&self) -> RuleId {
        RuleId::OuterJoinToInner
    }

    fn apply(
        &self,
        node: HepNodeId,
        graph: &PlanGraph,
        result: &mut RuleResult,
    ) -> anyhow::Result<()> {
        let filter = match graph.operator(node) {
            Logical(LogicalFilter(filter)) => filter,
            _ => return Ok(()),
        };
        let join_node = graph.input(node, 0)?;
        let join = match graph.operator(join_node) {
            Logical(LogicalJoin(join)) if join.join_type() == JoinType::Left => join,
            _ => return Ok(()),
        };

        let right = graph.input(join_node, 1)?;
        let right_columns = graph.logical_prop(right)?.output_columns();
        if !filter
            .predicate()
            .null_rejected_columns()
            .intersects(&right_columns)
        {
            return Ok(());
        }

        let inner = OptExpression::with_operator(
            Logical(LogicalJoin(Join::new(
                JoinType::Inner,
                join.condition().clone(),
            ))),
            vec![
                OptExpression::existing(graph.input(join_node, 0)?),
                OptExpression::existing(right),
            ],
        );
        result.add(OptExpression::with_operator(
            Logical(LogicalFilter(filter.clone())),
            vec![inner],
        ));
        Ok(())
    }
}
