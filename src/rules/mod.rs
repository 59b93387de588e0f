//! Rewrite rules of the heuristic preprocessor.
//!
//! A rule looks at one node of a [`PlanGraph`] and, when it matches, produces a replacement
//! for it as an [`OptExpression`]. Parts of the replacement may reuse existing graph nodes.

use enum_dispatch::enum_dispatch;
use enumset::{EnumSet, EnumSetType};
use strum_macros::Display;

use crate::heuristic::{HepNodeId, PlanGraph};
use crate::operator::Operator;

mod cte;
pub use cte::*;
mod filter;
pub use filter::*;
mod join;
pub use join::*;

#[derive(EnumSetType, Debug, Display)]
pub enum RuleId {
    EliminateTrueFilter,
    MergeFilters,
    OuterJoinToInner,
    RemoveUnusedCte,
}

#[enum_dispatch]
pub trait Rule {
    fn id(&self) -> RuleId;

    /// Tries to rewrite `node`, pushing at most one replacement to `result`.
    fn apply(&self, node: HepNodeId, graph: &PlanGraph, result: &mut RuleResult)
        -> anyhow::Result<()>;
}

#[enum_dispatch(Rule)]
#[derive(Clone, Debug)]
pub enum RuleImpl {
    EliminateTrueFilterRule,
    MergeFiltersRule,
    OuterJoinToInnerRule,
    RemoveUnusedCteRule,
}

impl From<RuleId> for RuleImpl {
    fn from(id: RuleId) -> Self {
        match id {
            RuleId::EliminateTrueFilter => EliminateTrueFilterRule.into(),
            RuleId::MergeFilters => MergeFiltersRule.into(),
            RuleId::OuterJoinToInner => OuterJoinToInnerRule.into(),
            RuleId::RemoveUnusedCte => RemoveUnusedCteRule.into(),
        }
    }
}

impl RuleImpl {
    /// Rules of `ids` in declaration order.
    pub fn from_ids(ids: EnumSet<RuleId>) -> Vec<RuleImpl> {
        ids.iter().map(RuleImpl::from).collect()
    }
}

#[derive(Clone, Debug)]
pub enum OptExprNode {
    OperatorNode(Operator),
    /// Node already in the graph, reused as is.
    ExistingNode(HepNodeId),
}

/// Tree produced by a rule.
#[derive(Clone, Debug)]
pub struct OptExpression {
    node: OptExprNode,
    inputs: Vec<OptExpression>,
}

impl OptExpression {
    pub fn with_operator<O: Into<Operator>>(operator: O, inputs: Vec<OptExpression>) -> Self {
        Self {
            node: OptExprNode::OperatorNode(operator.into()),
            inputs,
        }
    }

    pub fn existing(node: HepNodeId) -> Self {
        Self {
            node: OptExprNode::ExistingNode(node),
            inputs: vec![],
        }
    }

    pub fn node(&self) -> &OptExprNode {
        &self.node
    }

    pub fn inputs(&self) -> &[OptExpression] {
        &self.inputs
    }
}

#[derive(Debug, Default)]
pub struct RuleResult {
    opt_exprs: Vec<OptExpression>,
}

impl RuleResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, opt_expr: OptExpression) {
        self.opt_exprs.push(opt_expr);
    }

    pub fn results(self) -> impl Iterator<Item = OptExpression> {
        self.opt_exprs.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules_from_ids() {
        let rules = RuleImpl::from_ids(RuleId::MergeFilters | RuleId::RemoveUnusedCte);
        let ids: Vec<RuleId> = rules.iter().map(|r| r.id()).collect();
        assert_eq!(vec![RuleId::MergeFilters, RuleId::RemoveUnusedCte], ids);
        assert_eq!(4, RuleImpl::from_ids(EnumSet::all()).len());
    }
}
