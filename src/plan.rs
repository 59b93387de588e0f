use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::cost::Cost;
use crate::error::{OptError, OptResult};
use crate::expr::{ColumnId, Expr};
use crate::operator::LogicalOperator::{
    LogicalAggregate, LogicalCteAnchor, LogicalCteConsumer, LogicalCteProducer, LogicalFilter,
    LogicalInsert, LogicalJoin, LogicalLimit, LogicalProjection, LogicalScan,
};
use crate::operator::Operator::Logical;
use crate::operator::{
    Aggregate, CteAnchor, CteConsumer, CteProducer, Filter, Insert, Join, JoinType, Limit,
    Operator, Projection, TableScan,
};
use crate::properties::{CteId, DeliveredProperties, LogicalProperty};
use crate::stat::Statistics;

pub type PlanNodeId = u32;

pub type PlanNodeRef = Arc<PlanNode>;

/// Operator with its inputs, optionally annotated with what is known about it. Both the input
/// of the search and the plan extracted from the memo use this type.
#[derive(Debug)]
pub struct PlanNode {
    id: PlanNodeId,
    operator: Operator,
    inputs: Vec<PlanNodeRef>,
    logical_prop: Option<LogicalProperty>,
    stat: Option<Statistics>,
    cost: Option<Cost>,
    delivered: Option<DeliveredProperties>,
}

/// Ids are ignored.
impl PartialEq for PlanNode {
    fn eq(&self, other: &Self) -> bool {
        self.operator == other.operator
            && self.inputs == other.inputs
            && self.logical_prop == other.logical_prop
            && self.stat == other.stat
            && self.cost == other.cost
            && self.delivered == other.delivered
    }
}

/// Single root dag of plan nodes. Shared subtrees keep their node id.
#[derive(PartialEq, Debug, Clone)]
pub struct Plan {
    root: PlanNodeRef,
}

/// Visits every node once, level by level.
struct BfsIter {
    seen: HashSet<PlanNodeId>,
    queue: VecDeque<PlanNodeRef>,
}

impl Iterator for BfsIter {
    type Item = PlanNodeRef;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.queue.pop_front()?;
        for input in &node.inputs {
            if self.seen.insert(input.id) {
                self.queue.push_back(input.clone());
            }
        }
        Some(node)
    }
}

impl Plan {
    pub fn new(root: PlanNodeRef) -> Self {
        Self { root }
    }

    pub fn root(&self) -> PlanNodeRef {
        self.root.clone()
    }

    pub fn bfs_iterator(&self) -> impl Iterator<Item = PlanNodeRef> {
        BfsIter {
            seen: HashSet::from([self.root.id]),
            queue: VecDeque::from([self.root.clone()]),
        }
    }

    /// Every node once, inputs before the nodes consuming them. The root comes last.
    pub fn post_order(&self) -> Vec<PlanNodeRef> {
        let mut order = Vec::new();
        let mut seen = HashSet::from([self.root.id]);
        let mut stack = vec![(self.root.clone(), 0usize)];
        while let Some((node, next)) = stack.pop() {
            match node.inputs.get(next).cloned() {
                Some(input) => {
                    stack.push((node, next + 1));
                    if seen.insert(input.id) {
                        stack.push((input, 0));
                    }
                }
                None => order.push(node),
            }
        }
        order
    }

    /// Number of operators on the longest root to leaf path.
    pub fn depth(&self) -> usize {
        let mut depths = HashMap::<PlanNodeId, usize>::new();
        for node in self.post_order() {
            let below = node
                .inputs
                .iter()
                .filter_map(|i| depths.get(&i.id))
                .max()
                .copied()
                .unwrap_or(0);
            depths.insert(node.id, below + 1);
        }
        depths.get(&self.root.id).copied().unwrap_or(0)
    }

    /// Derives logical property of the root from the leaves up. Nodes already carrying a
    /// logical property are trusted.
    pub fn derive_logical_prop(&self) -> OptResult<LogicalProperty> {
        let mut props = HashMap::<PlanNodeId, LogicalProperty>::new();
        for node in self.post_order() {
            let prop = match &node.logical_prop {
                Some(prop) => prop.clone(),
                None => {
                    let inputs = node
                        .inputs
                        .iter()
                        .map(|i| {
                            props.get(&i.id).ok_or_else(|| {
                                OptError::invariant(format!("input {} derived after parent", i.id))
                            })
                        })
                        .collect::<OptResult<Vec<_>>>()?;
                    node.operator.derive_logical_prop(&inputs)?
                }
            };
            props.insert(node.id, prop);
        }
        props
            .remove(&self.root.id)
            .ok_or_else(|| OptError::invariant("plan root was not visited"))
    }
}

impl Display for Plan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        fn fmt_node(node: &PlanNode, level: usize, f: &mut Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:indent$}{}", "", node.operator.name(), indent = level * 2)?;
            if let Some(cost) = node.cost {
                write!(f, " (cost={})", cost)?;
            }
            writeln!(f)?;
            for input in &node.inputs {
                fmt_node(input, level + 1, f)?;
            }
            Ok(())
        }
        fmt_node(&self.root, 0, f)
    }
}

impl PlanNode {
    pub fn new(id: PlanNodeId, operator: Operator, inputs: Vec<PlanNodeRef>) -> Self {
        Self {
            id,
            operator,
            inputs,
            logical_prop: None,
            stat: None,
            cost: None,
            delivered: None,
        }
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn id(&self) -> PlanNodeId {
        self.id
    }

    pub fn inputs(&self) -> &[PlanNodeRef] {
        &self.inputs
    }

    pub fn logical_prop(&self) -> Option<&LogicalProperty> {
        self.logical_prop.as_ref()
    }

    pub fn stat(&self) -> Option<&Statistics> {
        self.stat.as_ref()
    }

    pub fn cost(&self) -> Option<Cost> {
        self.cost
    }

    pub fn delivered(&self) -> Option<&DeliveredProperties> {
        self.delivered.as_ref()
    }
}

pub struct PlanNodeBuilder {
    plan_node: PlanNode,
}

impl PlanNodeBuilder {
    pub fn new(id: PlanNodeId, operator: &Operator) -> Self {
        Self {
            plan_node: PlanNode::new(id, operator.clone(), vec![]),
        }
    }

    pub fn add_inputs<I>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = PlanNodeRef>,
    {
        self.plan_node.inputs.extend(inputs);
        self
    }

    pub fn with_logical_prop(mut self, logical_prop: Option<LogicalProperty>) -> Self {
        self.plan_node.logical_prop = logical_prop;
        self
    }

    pub fn with_statistics(mut self, stat: Option<Statistics>) -> Self {
        self.plan_node.stat = stat;
        self
    }

    pub fn with_cost(mut self, cost: Option<Cost>) -> Self {
        self.plan_node.cost = cost;
        self
    }

    pub fn with_delivered(mut self, delivered: Option<DeliveredProperties>) -> Self {
        self.plan_node.delivered = delivered;
        self
    }

    pub fn build(self) -> PlanNode {
        self.plan_node
    }
}

/// Builds logical plans bottom up.
///
/// Plan node ids are unique within a builder. Plans passed in as inputs of binary operators are
/// copied with fresh ids.
pub struct LogicalPlanBuilder {
    root: PlanNodeRef,
    next_plan_node_id: PlanNodeId,
}

impl LogicalPlanBuilder {
    fn leaf(operator: Operator) -> Self {
        Self {
            root: Arc::new(PlanNode::new(0, operator, vec![])),
            next_plan_node_id: 1,
        }
    }

    pub fn scan(table_scan: TableScan) -> Self {
        Self::leaf(Logical(LogicalScan(table_scan)))
    }

    pub fn cte_consumer(id: CteId, columns: Vec<ColumnId>) -> Self {
        Self::leaf(Logical(LogicalCteConsumer(CteConsumer::new(id, columns))))
    }

    fn push(mut self, operator: Operator, extra_inputs: Vec<PlanNodeRef>) -> Self {
        let mut inputs = vec![self.root.clone()];
        for input in extra_inputs {
            let mut ids = HashMap::new();
            inputs.push(self.adopt(&input, &mut ids));
        }
        self.root = Arc::new(PlanNode::new(self.next_plan_node_id, operator, inputs));
        self.next_plan_node_id += 1;
        self
    }

    /// Copies a foreign subtree with ids of this builder, keeping shared nodes shared.
    fn adopt(
        &mut self,
        node: &PlanNodeRef,
        ids: &mut HashMap<PlanNodeId, PlanNodeRef>,
    ) -> PlanNodeRef {
        if let Some(copied) = ids.get(&node.id) {
            return copied.clone();
        }
        let inputs: Vec<_> = node.inputs.iter().map(|i| self.adopt(i, ids)).collect();
        let copied = Arc::new(
            PlanNodeBuilder::new(self.next_plan_node_id, &node.operator)
                .add_inputs(inputs)
                .with_logical_prop(node.logical_prop.clone())
                .with_statistics(node.stat.clone())
                .with_cost(node.cost)
                .with_delivered(node.delivered.clone())
                .build(),
        );
        self.next_plan_node_id += 1;
        ids.insert(node.id, copied.clone());
        copied
    }

    pub fn filter(self, predicate: Expr) -> Self {
        self.push(Logical(LogicalFilter(Filter::new(predicate))), vec![])
    }

    pub fn projection(self, exprs: Vec<(ColumnId, Expr)>) -> Self {
        self.push(Logical(LogicalProjection(Projection::new(exprs))), vec![])
    }

    pub fn limit(self, limit: Limit) -> Self {
        self.push(Logical(LogicalLimit(limit)), vec![])
    }

    pub fn aggregate(self, group_by: Vec<ColumnId>, aggregates: Vec<(ColumnId, Expr)>) -> Self {
        self.push(
            Logical(LogicalAggregate(Aggregate::new(group_by, aggregates))),
            vec![],
        )
    }

    pub fn join(self, join_type: JoinType, condition: Expr, right: Plan) -> Self {
        self.push(
            Logical(LogicalJoin(Join::new(join_type, condition))),
            vec![right.root],
        )
    }

    /// Wraps current plan in a producer of cte `id`.
    pub fn cte_producer(self, id: CteId, columns: Vec<ColumnId>) -> Self {
        self.push(
            Logical(LogicalCteProducer(CteProducer::new(id, columns))),
            vec![],
        )
    }

    /// Current plan, which must be the producer of cte `id`, becomes the anchor's first child
    /// and `body` the second.
    pub fn cte_anchor(self, id: CteId, body: Plan) -> Self {
        self.push(Logical(LogicalCteAnchor(CteAnchor::new(id))), vec![body.root])
    }

    pub fn insert<S: Into<String>>(self, table_name: S, columns: Vec<ColumnId>) -> Self {
        self.push(
            Logical(LogicalInsert(Insert::new(table_name, columns))),
            vec![],
        )
    }

    pub fn build(self) -> Plan {
        Plan { root: self.root }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{col, lit_i64};

    fn scan(name: &str, columns: &[u32]) -> LogicalPlanBuilder {
        LogicalPlanBuilder::scan(TableScan::new(
            name,
            columns.iter().map(|c| ColumnId(*c)).collect(),
        ))
    }

    #[test]
    fn test_ids_unique_after_join() {
        let right = scan("t2", &[3, 4]).filter(col(4).gt(col(3))).build();
        let plan = scan("t1", &[1, 2])
            .join(JoinType::Inner, col(1).eq(col(3)), right)
            .build();

        let ids: HashSet<PlanNodeId> = plan.bfs_iterator().map(|n| n.id()).collect();
        assert_eq!(4, ids.len());
        assert_eq!(3, plan.depth());
    }

    #[test]
    fn test_derive_logical_prop() {
        let right = scan("t2", &[3, 4]).build();
        let plan = scan("t1", &[1, 2])
            .join(JoinType::LeftSemi, col(1).eq(col(3)), right)
            .limit(Limit::new(3))
            .build();
        let prop = plan.derive_logical_prop().unwrap();
        let prop = prop.as_relational().unwrap();
        assert_eq!(2, prop.output_columns().len());
        assert_eq!(Some(3), prop.max_rows());
    }

    #[test]
    fn test_deep_plan_walks_without_recursion() {
        let plan = (0..2000)
            .fold(scan("t1", &[1, 2]), |builder, i| {
                builder.filter(col(1).gt(lit_i64(i)))
            })
            .build();
        assert_eq!(2001, plan.depth());

        let order = plan.post_order();
        assert_eq!(2001, order.len());
        assert_eq!(plan.root().id(), order[order.len() - 1].id());
        assert_eq!("LogicalScan", order[0].operator().name());

        let prop = plan.derive_logical_prop().unwrap();
        assert_eq!(2, prop.output_columns().len());
    }

    #[test]
    fn test_post_order_visits_shared_input_once() {
        let shared = scan("t1", &[1]).build();
        let shared_root = shared.root();
        let plan = Plan::new(Arc::new(PlanNode::new(
            9,
            Logical(LogicalJoin(Join::new(
                JoinType::Inner,
                col(1).eq(col(1)),
            ))),
            vec![shared_root.clone(), shared_root],
        )));
        let ids: Vec<PlanNodeId> = plan.post_order().iter().map(|n| n.id()).collect();
        assert_eq!(2, ids.len());
        assert_eq!(9, ids[1]);
    }
}
