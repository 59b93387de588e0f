use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cascades::{id_from_slot, GroupExprId, GroupId, OptContextId, NO_ID};
use crate::cost::Cost;
use crate::properties::{DeliveredProperties, RequiredProperties};
use crate::stat::Statistics;

/// One costed alternative for an optimization context.
#[derive(Clone, Debug, PartialEq)]
pub struct CostContext {
    expr: GroupExprId,
    cost: Cost,
    /// Context used for each child of `expr`, `None` for scalar children.
    child_contexts: Vec<Option<OptContextId>>,
    delivered: DeliveredProperties,
    stat: Option<Statistics>,
}

impl CostContext {
    pub fn new(expr: GroupExprId, cost: Cost, delivered: DeliveredProperties) -> Self {
        Self {
            expr,
            cost,
            child_contexts: vec![],
            delivered,
            stat: None,
        }
    }

    pub fn with_child_contexts(mut self, child_contexts: Vec<Option<OptContextId>>) -> Self {
        self.child_contexts = child_contexts;
        self
    }

    pub fn with_statistics(mut self, stat: Statistics) -> Self {
        self.stat = Some(stat);
        self
    }

    pub fn expr(&self) -> GroupExprId {
        self.expr
    }

    pub fn cost(&self) -> Cost {
        self.cost
    }

    pub fn child_contexts(&self) -> &[Option<OptContextId>] {
        &self.child_contexts
    }

    pub fn delivered(&self) -> &DeliveredProperties {
        &self.delivered
    }

    pub fn stat(&self) -> Option<&Statistics> {
        self.stat.as_ref()
    }
}

#[derive(Debug, Default)]
struct ContextState {
    /// Index of the winner in `alternatives`.
    best: Option<usize>,
    alternatives: Vec<CostContext>,
}

pub(super) enum OfferOutcome {
    Recorded(bool),
    /// The context was folded into another one, offer there.
    Forward(OptContextId, CostContext),
}

/// Memoized best plan of a group for one set of required properties.
#[derive(Debug)]
pub struct OptimizationContext {
    id: OptContextId,
    group: AtomicUsize,
    required: Arc<RequiredProperties>,
    state: Mutex<ContextState>,
    /// Set when this context was folded into the context of a canonical group.
    merged_into: AtomicUsize,
}

impl OptimizationContext {
    pub(super) fn new(id: OptContextId, group: GroupId, required: Arc<RequiredProperties>) -> Self {
        Self {
            id,
            group: AtomicUsize::new(group.0),
            required,
            state: Mutex::new(ContextState::default()),
            merged_into: AtomicUsize::new(NO_ID),
        }
    }

    pub fn id(&self) -> OptContextId {
        self.id
    }

    pub fn group(&self) -> GroupId {
        GroupId(self.group.load(Ordering::Acquire))
    }

    pub(super) fn set_group(&self, group: GroupId) {
        self.group.store(group.0, Ordering::Release);
    }

    pub fn required(&self) -> &Arc<RequiredProperties> {
        &self.required
    }

    pub fn best(&self) -> Option<CostContext> {
        let state = self.state.lock();
        state.best.map(|idx| state.alternatives[idx].clone())
    }

    pub fn best_cost(&self) -> Option<Cost> {
        let state = self.state.lock();
        state.best.map(|idx| state.alternatives[idx].cost())
    }

    /// Every valid alternative offered so far, in the order offered.
    pub fn alternatives(&self) -> Vec<CostContext> {
        self.state.lock().alternatives.clone()
    }

    /// Records `candidate` and makes it the winner if it is strictly cheaper than the current
    /// one. Comparison and replacement happen under one lock, so the best cost never grows.
    pub(super) fn offer(&self, candidate: CostContext) -> OfferOutcome {
        let mut state = self.state.lock();
        if let Some(target) = self.merged_into() {
            return OfferOutcome::Forward(target, candidate);
        }
        let better = match state.best {
            Some(idx) => candidate.cost < state.alternatives[idx].cost,
            None => true,
        };
        state.alternatives.push(candidate);
        if better {
            state.best = Some(state.alternatives.len() - 1);
        }
        OfferOutcome::Recorded(better)
    }

    /// Forwards future offers to `target` and hands out the alternatives recorded so far.
    pub(super) fn seal_into(&self, target: OptContextId) -> Vec<CostContext> {
        let mut state = self.state.lock();
        self.merged_into.store(target.0, Ordering::Release);
        state.best = None;
        std::mem::take(&mut state.alternatives)
    }

    pub(super) fn merged_into(&self) -> Option<OptContextId> {
        id_from_slot(self.merged_into.load(Ordering::Acquire)).map(OptContextId)
    }
}
