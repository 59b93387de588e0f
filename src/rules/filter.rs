use crate::heuristic::{HepNodeId, PlanGraph};
use crate::operator::LogicalOperator::LogicalFilter;
use crate::operator::Operator::Logical;
use crate::operator::{Filter, LogicalOperator};
use crate::rules::{OptExpression, Rule, RuleId, RuleResult};

fn as_filter(graph: &PlanGraph, node: HepNodeId) -> Option<&Filter> {
    graph
        .operator(node)
        .as_logical()
        .and_then(LogicalOperator::as_logical_filter)
}

/// Removes filters whose predicate is the literal `true`.
#[derive(Clone, Debug)]
pub struct EliminateTrueFilterRule;

impl Rule for EliminateTrueFilterRule {
    fn id(&self) -> RuleId {
        RuleId::EliminateTrueFilter
    }

    fn apply(
        &self,
        node: HepNodeId,
        graph: &PlanGraph,
        result: &mut RuleResult,
    ) -> anyhow::Result<()> {
        if let Some(filter) = as_filter(graph, node) {
            if filter.predicate().is_true_literal() {
                let input = graph.input(node, 0)?;
                result.add(OptExpression::existing(input));
            }
        }
        Ok(())
    }
}

/// Merges two adjacent filters into one with the conjunction of their predicates.
#[derive(Clone, Debug)]
pub struct MergeFiltersRule;

impl Rule for MergeFiltersRule {
    fn id(&self) -> RuleId {
        RuleId::MergeFilters
    }

    fn apply(
        &self,
        node: HepNodeId,
        graph: &PlanGraph,
        result: &mut RuleResult,
    ) -> anyhow::Result<()> {
        let upper = match as_filter(graph, node) {
            Some(filter) => filter,
            None => return Ok(()),
        };
        let child = graph.input(node, 0)?;
        if let Some(lower) = as_filter(graph, child) {
            let predicate = upper.predicate().clone().and(lower.predicate().clone());
            result.add(OptExpression::with_operator(
                Logical(LogicalFilter(Filter::new(predicate))),
                vec![OptExpression::existing(graph.input(child, 0)?)],
            ));
        }
        Ok(())
    }
}
