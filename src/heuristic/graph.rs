use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use petgraph::prelude::{NodeIndex, StableGraph};
use petgraph::visit::{Bfs, DfsPostOrder, EdgeRef};
use petgraph::{Directed, Direction};

use crate::error::{OptError, OptResult};
use crate::operator::Operator;
use crate::optimizer::MatchOrder;
use crate::plan::{Plan, PlanNode, PlanNodeBuilder, PlanNodeId, PlanNodeRef};
use crate::properties::LogicalProperty;
use crate::rules::OptExprNode::{ExistingNode, OperatorNode};
use crate::rules::OptExpression;
use crate::stat::Statistics;

/// Edge weight is the index of the child in its parent's inputs.
type HepGraph = StableGraph<HepOptimizerNode, usize, Directed, PlanNodeId>;
pub type HepNodeId = NodeIndex<PlanNodeId>;

#[derive(Debug)]
pub struct HepOptimizerNode {
    operator: Operator,
    logical_prop: Option<LogicalProperty>,
    stat: Option<Statistics>,
}

/// A plan should be a single root dag.
#[derive(Debug)]
pub struct PlanGraph {
    graph: HepGraph,
    root: HepNodeId,
}

impl PlanGraph {
    pub fn root(&self) -> HepNodeId {
        self.root
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn operator(&self, node: HepNodeId) -> &Operator {
        &self.graph[node].operator
    }

    /// Inputs of `node` in child order.
    pub fn inputs(&self, node: HepNodeId) -> Vec<HepNodeId> {
        let mut edges: Vec<(usize, HepNodeId)> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|e| (*e.weight(), e.target()))
            .collect();
        edges.sort_by_key(|(idx, _)| *idx);
        edges.into_iter().map(|(_, target)| target).collect()
    }

    pub fn input(&self, node: HepNodeId, idx: usize) -> OptResult<HepNodeId> {
        self.inputs(node).get(idx).copied().ok_or_else(|| {
            OptError::invariant(format!(
                "{} has no input {}",
                self.operator(node).name(),
                idx
            ))
        })
    }

    /// Logical property of `node`, derived from its inputs unless already known.
    pub fn logical_prop(&self, node: HepNodeId) -> OptResult<LogicalProperty> {
        let mut props = HashMap::<HepNodeId, LogicalProperty>::new();
        let mut dfs = DfsPostOrder::new(&self.graph, node);
        while let Some(node_id) = dfs.next(&self.graph) {
            let hep_node = &self.graph[node_id];
            let prop = match &hep_node.logical_prop {
                Some(prop) => prop.clone(),
                None => {
                    let inputs = self
                        .inputs(node_id)
                        .into_iter()
                        .map(|input| {
                            props.get(&input).ok_or_else(|| {
                                OptError::invariant(format!(
                                    "input {:?} visited after parent",
                                    input
                                ))
                            })
                        })
                        .collect::<OptResult<Vec<_>>>()?;
                    hep_node.operator.derive_logical_prop(&inputs)?
                }
            };
            props.insert(node_id, prop);
        }
        props
            .remove(&node)
            .ok_or_else(|| OptError::invariant(format!("{:?} missing from plan graph", node)))
    }

    /// Whether `node` or any node below it matches `pred`.
    pub fn reaches<F>(&self, node: HepNodeId, pred: F) -> bool
    where
        F: Fn(&Operator) -> bool,
    {
        let mut bfs = Bfs::new(&self.graph, node);
        while let Some(node_id) = bfs.next(&self.graph) {
            if pred(&self.graph[node_id].operator) {
                return true;
            }
        }
        false
    }

    pub(super) fn nodes_iter(&self, match_order: MatchOrder) -> Vec<HepNodeId> {
        match match_order {
            MatchOrder::TopDown => self.top_down_node_ids(),
            MatchOrder::BottomUp => self.bottom_up_node_ids(),
        }
    }

    /// Replace relational expression with optimizer rule result.
    ///
    /// # Return
    ///
    /// The return value indicates whether graph changed.
    pub(super) fn replace_opt_expression(
        &mut self,
        opt_expr: &OptExpression,
        origin_node_id: HepNodeId,
    ) -> bool {
        let new_hep_node_id = self.insert_opt_node(opt_expr);
        if new_hep_node_id == origin_node_id {
            return false;
        }

        // Redirect parents' child to new node
        let parents: Vec<(HepNodeId, usize)> = self
            .graph
            .edges_directed(origin_node_id, Direction::Incoming)
            .map(|e| (e.source(), *e.weight()))
            .collect();
        for (parent, idx) in parents {
            self.graph.add_edge(parent, new_hep_node_id, idx);
        }
        self.graph.remove_node(origin_node_id);
        if self.root == origin_node_id {
            self.root = new_hep_node_id;
        }
        self.remove_unreachable();
        true
    }

    fn insert_opt_node(&mut self, opt_expr: &OptExpression) -> HepNodeId {
        match opt_expr.node() {
            ExistingNode(node_id) => *node_id,
            OperatorNode(operator) => {
                let input_ids: Vec<HepNodeId> = opt_expr
                    .inputs()
                    .iter()
                    .map(|input| self.insert_opt_node(input))
                    .collect();

                let new_node_id = self.graph.add_node(HepOptimizerNode {
                    operator: operator.clone(),
                    logical_prop: None,
                    stat: None,
                });
                for (idx, input_id) in input_ids.into_iter().enumerate() {
                    self.graph.add_edge(new_node_id, input_id, idx);
                }
                new_node_id
            }
        }
    }

    fn remove_unreachable(&mut self) {
        let mut reachable = HashSet::new();
        let mut bfs = Bfs::new(&self.graph, self.root);
        while let Some(node_id) = bfs.next(&self.graph) {
            reachable.insert(node_id);
        }
        let unreachable: Vec<HepNodeId> = self
            .graph
            .node_indices()
            .filter(|n| !reachable.contains(n))
            .collect();
        for node_id in unreachable {
            self.graph.remove_node(node_id);
        }
    }

    /// Children before parents.
    fn bottom_up_node_ids(&self) -> Vec<HepNodeId> {
        let mut ids = Vec::with_capacity(self.graph.node_count());
        let mut dfs = DfsPostOrder::new(&self.graph, self.root);
        while let Some(node_id) = dfs.next(&self.graph) {
            ids.push(node_id);
        }
        ids
    }

    fn top_down_node_ids(&self) -> Vec<HepNodeId> {
        let mut ids = Vec::with_capacity(self.graph.node_count());
        let mut bfs = Bfs::new(&self.graph, self.root);
        while let Some(node_id) = bfs.next(&self.graph) {
            ids.push(node_id);
        }
        ids
    }

    pub(super) fn to_plan(&self) -> OptResult<Plan> {
        let mut next_plan_node_id: PlanNodeId = 0;
        let mut plan_nodes = HashMap::<HepNodeId, PlanNodeRef>::new();
        // Children are converted before their parents.
        for node_id in self.bottom_up_node_ids() {
            let node = &self.graph[node_id];
            let inputs = self
                .inputs(node_id)
                .into_iter()
                .map(|input| {
                    plan_nodes.get(&input).cloned().ok_or_else(|| {
                        OptError::invariant(format!("input {:?} visited after parent", input))
                    })
                })
                .collect::<OptResult<Vec<_>>>()?;

            let plan_node = PlanNodeBuilder::new(next_plan_node_id, &node.operator)
                .with_statistics(node.stat.clone())
                .with_logical_prop(node.logical_prop.clone())
                .add_inputs(inputs)
                .build();
            next_plan_node_id += 1;
            plan_nodes.insert(node_id, Arc::new(plan_node));
        }

        plan_nodes
            .get(&self.root)
            .map(|root| Plan::new(root.clone()))
            .ok_or_else(|| OptError::invariant("root missing from plan graph"))
    }
}

/// Converts from raw plan to plan graph.
impl From<Plan> for PlanGraph {
    fn from(plan: Plan) -> Self {
        let mut graph = HepGraph::default();
        let mut node_id_map = HashMap::<PlanNodeId, HepNodeId>::new();
        let mut edges = vec![];

        for plan_node in plan.bfs_iterator() {
            if node_id_map.contains_key(&plan_node.id()) {
                continue;
            }
            for (idx, input) in plan_node.inputs().iter().enumerate() {
                edges.push((plan_node.id(), input.id(), idx));
            }
            let hep_node_id = graph.add_node((&*plan_node).into());
            node_id_map.insert(plan_node.id(), hep_node_id);
        }

        for (parent, input, idx) in edges {
            graph.add_edge(node_id_map[&parent], node_id_map[&input], idx);
        }

        Self {
            graph,
            root: node_id_map[&plan.root().id()],
        }
    }
}

impl<'a> From<&'a PlanNode> for HepOptimizerNode {
    fn from(t: &'a PlanNode) -> Self {
        Self {
            operator: t.operator().clone(),
            logical_prop: t.logical_prop().cloned(),
            stat: t.stat().cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{col, lit_i64, ColumnId};
    use crate::operator::{JoinType, TableScan};
    use crate::plan::LogicalPlanBuilder;

    fn join_plan() -> Plan {
        let right = LogicalPlanBuilder::scan(TableScan::new("t2", vec![ColumnId(3)])).build();
        LogicalPlanBuilder::scan(TableScan::new("t1", vec![ColumnId(1)]))
            .join(JoinType::Inner, col(1).eq(col(3)), right)
            .filter(col(1).gt(lit_i64(0)))
            .build()
    }

    #[test]
    fn test_round_trip_keeps_child_order() {
        let plan = join_plan();
        let graph = PlanGraph::from(plan.clone());
        assert_eq!(4, graph.node_count());

        let join = graph.input(graph.root(), 0).unwrap();
        let inputs = graph.inputs(join);
        assert_eq!(2, inputs.len());
        let names: Vec<&str> = inputs
            .iter()
            .map(|i| match graph.operator(*i) {
                Operator::Logical(op) => op.as_logical_scan().map(|s| s.table_name()).unwrap(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(vec!["t1", "t2"], names);

        let back = graph.to_plan().unwrap();
        assert_eq!(plan.root().operator(), back.root().operator());
        assert_eq!(
            4,
            back.bfs_iterator()
                .map(|n| n.id())
                .collect::<HashSet<_>>()
                .len()
        );
    }

    #[test]
    fn test_bottom_up_order() {
        let graph = PlanGraph::from(join_plan());
        let ids = graph.nodes_iter(MatchOrder::BottomUp);
        assert_eq!(Some(&graph.root()), ids.last());
        let join = graph.input(graph.root(), 0).unwrap();
        let join_pos = ids.iter().position(|n| *n == join).unwrap();
        for input in graph.inputs(join) {
            assert!(ids.iter().position(|n| *n == input).unwrap() < join_pos);
        }
        assert_eq!(
            Some(&graph.root()),
            graph.nodes_iter(MatchOrder::TopDown).first()
        );
    }

    #[test]
    fn test_derive_logical_prop() {
        let graph = PlanGraph::from(join_plan());
        let prop = graph.logical_prop(graph.root()).unwrap();
        assert_eq!(2, prop.output_columns().len());
    }

    #[test]
    fn test_derive_logical_prop_of_deep_graph() {
        let plan = (0..2000)
            .fold(
                LogicalPlanBuilder::scan(TableScan::new("t1", vec![ColumnId(1), ColumnId(2)])),
                |builder, i| builder.filter(col(1).gt(lit_i64(i))),
            )
            .build();
        let graph = PlanGraph::from(plan);
        assert_eq!(2001, graph.node_count());
        let prop = graph.logical_prop(graph.root()).unwrap();
        assert_eq!(2, prop.output_columns().len());
    }
}
