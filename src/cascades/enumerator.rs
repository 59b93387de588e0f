use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::cascades::{Group, GroupId, Memo, OptContextId};
use crate::cost::Cost;
use crate::error::{OptError, OptResult};
use crate::operator::Operator;
use crate::plan::{Plan, PlanNodeBuilder, PlanNodeId, PlanNodeRef};
use crate::properties::{DeliveredProperties, LogicalProperty, RequiredProperties};
use crate::stat::Statistics;

#[derive(Debug)]
struct ScalarNode {
    operator: Operator,
    logical_prop: LogicalProperty,
    inputs: Vec<ScalarNode>,
}

#[derive(Debug)]
enum ChildRef {
    Context(usize),
    Scalar(ScalarNode),
}

#[derive(Debug)]
struct Alternative {
    operator: Operator,
    logical_prop: LogicalProperty,
    cost: Cost,
    delivered: DeliveredProperties,
    stat: Option<Statistics>,
    children: Vec<ChildRef>,
    /// Plans of each child as counted when this alternative was snapshotted.
    child_counts: Vec<u64>,
    count: u64,
}

#[derive(Debug, Default)]
struct ContextEntry {
    alternatives: Vec<Alternative>,
    count: u64,
}

/// Snapshot of all costed alternatives reachable from one optimization context.
///
/// Plans are numbered by choosing alternatives in the order they were offered, first child
/// varying slowest. An alternative reaching back to a context it is part of yields no plans.
#[derive(Debug)]
pub struct PlanEnumerator {
    entries: Vec<ContextEntry>,
    root: usize,
}

struct Builder<'a> {
    memo: &'a Memo,
    entries: Vec<ContextEntry>,
    visited: HashMap<OptContextId, usize>,
    in_progress: Vec<bool>,
}

impl PlanEnumerator {
    /// Called by [`Memo::build_plan_enumerator`] with maintenance passes excluded.
    pub(super) fn build(
        memo: &Memo,
        root: GroupId,
        required: &RequiredProperties,
    ) -> OptResult<Self> {
        let group = memo.group(memo.canonical_group(root)?)?;
        let ctx = group.context(required).ok_or_else(|| OptError::NoPlanFound {
            group: group.id(),
            required: required.to_string(),
        })?;
        let mut builder = Builder {
            memo,
            entries: vec![],
            visited: HashMap::new(),
            in_progress: vec![],
        };
        let root = builder.visit(ctx, 0)?;
        let ret = Self {
            entries: builder.entries,
            root,
        };
        debug!(
            "Plan enumerator of group {} holds {} contexts and {} plans",
            group.id(),
            ret.entries.len(),
            ret.count()
        );
        Ok(ret)
    }

    /// Number of distinct complete plans, saturating at `u64::MAX`.
    pub fn count(&self) -> u64 {
        self.entries[self.root].count
    }

    /// The `rank`-th plan, `None` when `rank >= count()`.
    pub fn plan(&self, rank: u64) -> Option<Plan> {
        if rank >= self.count() {
            return None;
        }
        let mut next_id = 0;
        Some(Plan::new(self.unrank(self.root, rank, &mut next_id)))
    }

    fn unrank(&self, entry: usize, mut rank: u64, next_id: &mut PlanNodeId) -> PlanNodeRef {
        let mut chosen = None;
        for alternative in &self.entries[entry].alternatives {
            if rank < alternative.count {
                chosen = Some(alternative);
                break;
            }
            rank -= alternative.count;
        }
        // Callers keep rank below the entry's count, which sums the alternatives' counts.
        let alternative = match chosen {
            Some(alternative) => alternative,
            None => &self.entries[entry].alternatives[0],
        };

        let id = *next_id;
        *next_id += 1;
        let mut child_ranks = vec![0; alternative.children.len()];
        for idx in (0..alternative.children.len()).rev() {
            let child_count = alternative.child_counts[idx].max(1);
            child_ranks[idx] = rank % child_count;
            rank /= child_count;
        }
        let inputs: Vec<PlanNodeRef> = alternative
            .children
            .iter()
            .zip(child_ranks)
            .map(|(child, child_rank)| match child {
                ChildRef::Context(child) => self.unrank(*child, child_rank, next_id),
                ChildRef::Scalar(scalar) => scalar_plan(scalar, next_id),
            })
            .collect();

        Arc::new(
            PlanNodeBuilder::new(id, &alternative.operator)
                .add_inputs(inputs)
                .with_logical_prop(Some(alternative.logical_prop.clone()))
                .with_statistics(alternative.stat.clone())
                .with_cost(Some(alternative.cost))
                .with_delivered(Some(alternative.delivered.clone()))
                .build(),
        )
    }
}

fn scalar_plan(scalar: &ScalarNode, next_id: &mut PlanNodeId) -> PlanNodeRef {
    let id = *next_id;
    *next_id += 1;
    let inputs: Vec<PlanNodeRef> = scalar
        .inputs
        .iter()
        .map(|input| scalar_plan(input, next_id))
        .collect();
    Arc::new(
        PlanNodeBuilder::new(id, &scalar.operator)
            .add_inputs(inputs)
            .with_logical_prop(Some(scalar.logical_prop.clone()))
            .build(),
    )
}

impl<'a> Builder<'a> {
    fn check_depth(&self, depth: usize) -> OptResult<()> {
        let limit = self.memo.config().max_plan_depth;
        if depth >= limit {
            Err(OptError::PlanDepthExceeded { limit })
        } else {
            Ok(())
        }
    }

    fn visit(&mut self, ctx: OptContextId, depth: usize) -> OptResult<usize> {
        self.check_depth(depth)?;
        let ctx = self.memo.optimization_context(ctx)?;
        if let Some(idx) = self.visited.get(&ctx.id()) {
            return Ok(*idx);
        }
        let idx = self.entries.len();
        self.entries.push(ContextEntry::default());
        self.in_progress.push(true);
        self.visited.insert(ctx.id(), idx);

        let group = self.memo.group(self.memo.canonical_group(ctx.group())?)?;
        let output_columns = group.logical_prop().output_columns();
        let mut alternatives = vec![];
        for candidate in ctx.alternatives() {
            let expr = self.memo.master_expr(candidate.expr())?;
            if candidate.child_contexts().len() != expr.children().len() {
                continue;
            }
            if expr.operator().is_physical()
                && !ctx
                    .required()
                    .is_satisfied_by(candidate.delivered(), &output_columns)
            {
                continue;
            }

            let mut children = Vec::with_capacity(expr.children().len());
            let mut child_counts = Vec::with_capacity(expr.children().len());
            for (child, child_ctx) in expr.children().iter().zip(candidate.child_contexts()) {
                match child_ctx {
                    Some(child_ctx) => {
                        let child = self.visit(*child_ctx, depth + 1)?;
                        let count = if self.in_progress[child] {
                            0
                        } else {
                            self.entries[child].count
                        };
                        children.push(ChildRef::Context(child));
                        child_counts.push(count);
                    }
                    None => {
                        let child = self.memo.group(self.memo.canonical_group(*child)?)?;
                        children.push(ChildRef::Scalar(self.scalar(&child, depth + 1)?));
                        child_counts.push(1);
                    }
                }
            }
            let count = child_counts
                .iter()
                .fold(1u64, |acc, c| acc.saturating_mul(*c));
            alternatives.push(Alternative {
                operator: expr.operator().clone(),
                logical_prop: group.logical_prop().clone(),
                cost: candidate.cost(),
                delivered: candidate.delivered().clone(),
                stat: candidate.stat().cloned(),
                children,
                child_counts,
                count,
            });
        }

        let entry = &mut self.entries[idx];
        entry.count = alternatives
            .iter()
            .fold(0u64, |acc, a| acc.saturating_add(a.count));
        entry.alternatives = alternatives;
        self.in_progress[idx] = false;
        Ok(idx)
    }

    fn scalar(&self, group: &Group, depth: usize) -> OptResult<ScalarNode> {
        self.check_depth(depth)?;
        if !group.is_scalar() {
            return Err(OptError::invariant(format!(
                "relational group {} has no context",
                group.id()
            )));
        }
        let expr = group
            .first_live_member()
            .ok_or_else(|| OptError::invariant(format!("scalar group {} is empty", group.id())))?;
        let expr = self.memo.group_expr(expr)?;
        let inputs = expr
            .children()
            .iter()
            .map(|child| {
                let child = self.memo.group(self.memo.canonical_group(*child)?)?;
                self.scalar(&child, depth + 1)
            })
            .collect::<OptResult<Vec<_>>>()?;
        Ok(ScalarNode {
            operator: expr.operator().clone(),
            logical_prop: group.logical_prop().clone(),
            inputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascades::{CostContext, GroupExprId, NewGroupExpr};
    use crate::expr::{col, ColumnId, ColumnSet};
    use crate::operator::{
        HashJoin, Join, JoinType, LogicalOperator, NestedLoopJoin, PhysicalOperator, Spool,
        TableScan,
    };
    use crate::properties::DistributionSpec;

    fn columns(ids: &[u32]) -> ColumnSet {
        ids.iter().map(|c| ColumnId(*c)).collect()
    }

    fn table(name: &str, ids: &[u32]) -> TableScan {
        TableScan::new(name, ids.iter().map(|c| ColumnId(*c)).collect())
    }

    fn insert<O: Into<Operator>>(
        memo: &Memo,
        operator: O,
        children: Vec<GroupId>,
        group: Option<GroupId>,
    ) -> (GroupId, GroupExprId) {
        let outcome = memo
            .insert_or_find(NewGroupExpr::new(operator, children), group)
            .unwrap();
        (outcome.group(), outcome.expr())
    }

    fn offer(memo: &Memo, ctx: OptContextId, expr: GroupExprId, cost: f64, children: Vec<OptContextId>) {
        memo.improve_optimization_context(
            ctx,
            CostContext::new(
                expr,
                Cost::new(cost),
                DeliveredProperties::new(DistributionSpec::Random),
            )
            .with_child_contexts(children.into_iter().map(Some).collect()),
        )
        .unwrap();
    }

    #[test]
    fn test_enumerate_join_plans() {
        let _ = env_logger::builder().is_test(true).try_init();
        let memo = Memo::default();
        let (t1, _) = insert(&memo, LogicalOperator::LogicalScan(table("t1", &[1, 2])), vec![], None);
        let (t2, _) = insert(&memo, LogicalOperator::LogicalScan(table("t2", &[3, 4])), vec![], None);
        let join = Join::new(JoinType::Inner, col(1).eq(col(3)));
        let (root, _) = insert(
            &memo,
            LogicalOperator::LogicalJoin(join.clone()),
            vec![t1, t2],
            None,
        );

        let (_, scan1) = insert(&memo, PhysicalOperator::PhysicalTableScan(table("t1", &[1, 2])), vec![], Some(t1));
        let (_, spool) = insert(&memo, PhysicalOperator::PhysicalSpool(Spool), vec![t1], Some(t1));
        let (_, scan2a) = insert(&memo, PhysicalOperator::PhysicalTableScan(table("t2", &[3, 4])), vec![], Some(t2));
        let (_, scan2b) = insert(
            &memo,
            PhysicalOperator::PhysicalTableScan(
                table("t2", &[3, 4]).with_distribution(DistributionSpec::Replicated),
            ),
            vec![],
            Some(t2),
        );
        let (_, hash_join) = insert(
            &memo,
            PhysicalOperator::PhysicalHashJoin(HashJoin::new(join.clone())),
            vec![t1, t2],
            Some(root),
        );
        let (_, nl_join) = insert(
            &memo,
            PhysicalOperator::PhysicalNestedLoopJoin(NestedLoopJoin::new(join)),
            vec![t1, t2],
            Some(root),
        );

        let ctx1 = memo
            .lookup_or_create_optimization_context(t1, &RequiredProperties::any(columns(&[1, 2])))
            .unwrap();
        let ctx2 = memo
            .lookup_or_create_optimization_context(t2, &RequiredProperties::any(columns(&[3, 4])))
            .unwrap();
        let required = RequiredProperties::any(columns(&[1, 2, 3, 4]));
        let root_ctx = memo
            .lookup_or_create_optimization_context(root, &required)
            .unwrap();
        offer(&memo, ctx1, scan1, 1.0, vec![]);
        // Reaches back into its own context.
        offer(&memo, ctx1, spool, 2.0, vec![ctx1]);
        offer(&memo, ctx2, scan2a, 1.0, vec![]);
        offer(&memo, ctx2, scan2b, 4.0, vec![]);
        offer(&memo, root_ctx, hash_join, 5.0, vec![ctx1, ctx2]);
        offer(&memo, root_ctx, nl_join, 9.0, vec![ctx1, ctx2]);

        let enumerator = memo.build_plan_enumerator(root, &required).unwrap();
        assert_eq!(4, enumerator.count());
        assert!(enumerator.plan(4).is_none());

        let plans: Vec<Plan> = (0..4).map(|r| enumerator.plan(r).unwrap()).collect();
        for (i, a) in plans.iter().enumerate() {
            for b in &plans[i + 1..] {
                assert_ne!(a, b);
            }
        }

        let second = plans[1].root();
        assert!(matches!(
            second.operator(),
            Operator::Physical(PhysicalOperator::PhysicalHashJoin(_))
        ));
        assert_eq!(Some(Cost::new(4.0)), second.inputs()[1].cost());
        assert!(matches!(
            plans[2].root().operator(),
            Operator::Physical(PhysicalOperator::PhysicalNestedLoopJoin(_))
        ));
        assert_eq!(
            vec![0, 1, 2],
            plans[3].bfs_iterator().map(|n| n.id()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_missing_context() {
        let memo = Memo::default();
        let (t1, _) = insert(&memo, LogicalOperator::LogicalScan(table("t1", &[1])), vec![], None);
        let res = memo.build_plan_enumerator(t1, &RequiredProperties::any(columns(&[1])));
        assert!(matches!(res, Err(OptError::NoPlanFound { .. })));
    }
}
