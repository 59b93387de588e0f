//! Turns a bound logical plan and the caller's output columns into the seed of a search: the
//! preprocessed plan plus the required properties of its root.

use std::collections::BTreeSet;

use log::debug;

use crate::error::OptResult;
use crate::expr::{ColumnId, ColumnSet};
use crate::heuristic::HepOptimizer;
use crate::operator::LogicalOperator::{
    LogicalCteAnchor, LogicalCteConsumer, LogicalCteProducer, LogicalInsert, LogicalLimit,
};
use crate::operator::Operator::Logical;
use crate::optimizer::{Optimizer, OptimizerContext};
use crate::plan::{Plan, PlanNode};
use crate::properties::{
    CteId, CteKind, CteRequirement, DistributionMatching, DistributionSpec, OrderSpec,
    RequiredProperties, Rewindability, SingletonKind,
};

#[derive(Debug)]
pub struct QueryContext {
    plan: Plan,
    required: RequiredProperties,
    output_columns: Vec<ColumnId>,
}

impl QueryContext {
    /// Output columns must be produced by `plan`, checking that is up to the caller.
    pub fn build(
        plan: Plan,
        output_columns: &[ColumnId],
        config: &OptimizerContext,
    ) -> OptResult<QueryContext> {
        let plan = HepOptimizer::new(config.clone(), plan).find_best_plan()?;
        let root = plan.root();
        let top = top_operator(&root);

        let order = match top.operator() {
            Logical(LogicalLimit(limit)) => limit.order().clone(),
            _ => OrderSpec::any(),
        };
        let distribution = match top.operator() {
            Logical(LogicalInsert(_)) => DistributionSpec::Any,
            _ => DistributionSpec::Singleton(SingletonKind::Coordinator),
        };

        let mut columns: ColumnSet = output_columns.iter().collect();
        columns.extend_from(&order.used_columns());
        debug_assert!(
            output_columns
                .iter()
                .all(|c| top_output_contains(&plan, *c)),
            "output columns must be produced by the plan"
        );

        let required = RequiredProperties::any(columns)
            .with_order(order)
            .with_distribution(distribution, DistributionMatching::Satisfy)
            .with_rewindability(Rewindability::None)
            .with_ctes(referenced_ctes(&plan));
        debug!("Required properties of query: {}", required);

        Ok(Self {
            plan,
            required,
            output_columns: output_columns.to_vec(),
        })
    }

    /// The plan after preprocessing.
    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn required(&self) -> &RequiredProperties {
        &self.required
    }

    pub fn output_columns(&self) -> &[ColumnId] {
        &self.output_columns
    }

    pub fn into_parts(self) -> (Plan, RequiredProperties) {
        (self.plan, self.required)
    }
}

/// Operator producing the query result, looking through cte anchors into their bodies.
fn top_operator(root: &PlanNode) -> &PlanNode {
    let mut node = root;
    while let Logical(LogicalCteAnchor(_)) = node.operator() {
        match node.inputs().get(1) {
            Some(body) => node = &**body,
            None => break,
        }
    }
    node
}

fn top_output_contains(plan: &Plan, column: ColumnId) -> bool {
    plan.derive_logical_prop()
        .map(|prop| prop.output_columns().contains(column))
        .unwrap_or(false)
}

/// Optional producer entries for every cte that is both produced and consumed.
fn referenced_ctes(plan: &Plan) -> CteRequirement {
    let mut produced = BTreeSet::<CteId>::new();
    let mut consumed = BTreeSet::<CteId>::new();
    for node in plan.bfs_iterator() {
        match node.operator() {
            Logical(LogicalCteProducer(producer)) => {
                produced.insert(producer.id());
            }
            Logical(LogicalCteConsumer(consumer)) => {
                consumed.insert(consumer.id());
            }
            _ => {}
        }
    }
    produced
        .intersection(&consumed)
        .fold(CteRequirement::new(), |ctes, id| {
            ctes.with_entry(*id, CteKind::Producer, false)
        })
}
