use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use itertools::Itertools;
use log::{debug, trace};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use prettytable::Table;

use crate::cascades::{
    id_from_slot, CostContext, Group, GroupExpr, GroupExprId, GroupExprKey, GroupId, GroupIds,
    NewGroupExpr, OfferOutcome, OptContextId, OptimizationContext, PlanEnumerator, NO_ID,
};
use crate::error::{OptError, OptResult};
use crate::operator::Operator;
use crate::optimizer::OptimizerContext;
use crate::plan::{Plan, PlanNodeBuilder, PlanNodeId, PlanNodeRef};
use crate::properties::{LogicalProperty, RequiredProperties};

/// Result of [`Memo::insert_or_find`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InsertOutcome {
    Inserted {
        group: GroupId,
        expr: GroupExprId,
        new_group: bool,
    },
    /// An equivalent expression already exists, the candidate was discarded.
    Existing { group: GroupId, expr: GroupExprId },
}

impl InsertOutcome {
    /// Canonical group containing the expression.
    pub fn group(&self) -> GroupId {
        match self {
            InsertOutcome::Inserted { group, .. } | InsertOutcome::Existing { group, .. } => *group,
        }
    }

    pub fn expr(&self) -> GroupExprId {
        match self {
            InsertOutcome::Inserted { expr, .. } | InsertOutcome::Existing { expr, .. } => *expr,
        }
    }

    pub fn is_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted { .. })
    }
}

/// Keeps maintenance passes out while held. Search workers may hold one across a unit of work;
/// memo operations called meanwhile from the same thread do not block on it.
pub struct SearchSession<'a> {
    _guard: RwLockReadGuard<'a, ()>,
}

enum InsertTarget {
    Existing(GroupId),
    New(LogicalProperty),
}

/// Search space of one optimization episode.
pub struct Memo {
    config: OptimizerContext,
    groups: RwLock<Vec<Arc<Group>>>,
    exprs: RwLock<Vec<Arc<GroupExpr>>>,
    contexts: RwLock<Vec<Arc<OptimizationContext>>>,
    index: DashMap<GroupExprKey, GroupExprId>,
    root: AtomicUsize,
    /// Serializes updates of group duplicate pointers.
    union_lock: Mutex<()>,
    /// Taken in read mode by search operations and in write mode by maintenance passes.
    phase: RwLock<()>,
    duplicate_groups: AtomicUsize,
}

impl Default for Memo {
    fn default() -> Self {
        Self::new(OptimizerContext::default())
    }
}

impl Memo {
    pub fn new(config: OptimizerContext) -> Self {
        Self {
            config,
            groups: RwLock::new(vec![]),
            exprs: RwLock::new(vec![]),
            contexts: RwLock::new(vec![]),
            index: DashMap::new(),
            root: AtomicUsize::new(NO_ID),
            union_lock: Mutex::new(()),
            phase: RwLock::new(()),
            duplicate_groups: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &OptimizerContext {
        &self.config
    }

    /// Starts a unit of search work.
    ///
    /// Don't call maintenance passes from a thread holding a session, they would wait for it
    /// forever.
    pub fn search_session(&self) -> SearchSession<'_> {
        SearchSession {
            _guard: self.phase.read_recursive(),
        }
    }

    pub fn group(&self, id: GroupId) -> OptResult<Arc<Group>> {
        self.groups
            .read_recursive()
            .get(id.0)
            .cloned()
            .ok_or_else(|| OptError::invariant(format!("unknown group {}", id)))
    }

    pub fn group_expr(&self, id: GroupExprId) -> OptResult<Arc<GroupExpr>> {
        self.exprs
            .read_recursive()
            .get(id.0)
            .cloned()
            .ok_or_else(|| OptError::invariant(format!("unknown group expression {}", id)))
    }

    /// Optimization context `id`, or the one it was folded into by a group merge.
    pub fn optimization_context(&self, id: OptContextId) -> OptResult<Arc<OptimizationContext>> {
        let contexts = self.contexts.read_recursive();
        let mut cur = id;
        for _ in 0..=contexts.len() {
            let ctx = contexts.get(cur.0).ok_or_else(|| {
                OptError::invariant(format!("unknown optimization context {}", cur))
            })?;
            match ctx.merged_into() {
                Some(next) => cur = next,
                None => return Ok(ctx.clone()),
            }
        }
        Err(OptError::invariant(format!(
            "optimization context {} is merged in a cycle",
            id
        )))
    }

    pub fn group_count(&self) -> usize {
        self.groups.read_recursive().len()
    }

    pub fn group_expr_count(&self) -> usize {
        self.exprs.read_recursive().len()
    }

    pub fn duplicate_group_count(&self) -> usize {
        self.duplicate_groups.load(Ordering::Relaxed)
    }

    pub fn optimization_context_count(&self) -> usize {
        self.contexts.read_recursive().len()
    }

    pub fn root(&self) -> Option<GroupId> {
        id_from_slot(self.root.load(Ordering::Acquire)).map(GroupId)
    }

    pub fn set_root(&self, group: GroupId) -> OptResult<()> {
        let group = self.canonical_group(group)?;
        self.root.store(group.0, Ordering::Release);
        Ok(())
    }

    /// Follows duplicate pointers to the representative of `id`'s equivalence class.
    pub fn canonical_group(&self, id: GroupId) -> OptResult<GroupId> {
        let groups = self.groups.read_recursive();
        let mut cur = id;
        for _ in 0..=groups.len() {
            let group = groups
                .get(cur.0)
                .ok_or_else(|| OptError::invariant(format!("unknown group {}", cur)))?;
            match group.duplicate_of() {
                Some(next) => cur = next,
                None => return Ok(cur),
            }
        }
        Err(OptError::invariant(format!(
            "duplicate chain of group {} has a cycle",
            id
        )))
    }

    /// Inserts `candidate` into `target`, or into a new group when `target` is `None`, unless
    /// an equivalent expression already exists.
    ///
    /// Children of the candidate may be given by any id of their equivalence class. A new
    /// group derives its logical property from the candidate before anything is inserted, so
    /// a failed derivation leaves the memo untouched.
    pub fn insert_or_find(
        &self,
        candidate: NewGroupExpr,
        target: Option<GroupId>,
    ) -> OptResult<InsertOutcome> {
        let _session = self.phase.read_recursive();
        self.insert_or_find_locked(candidate, target)
    }

    fn insert_or_find_locked(
        &self,
        candidate: NewGroupExpr,
        target: Option<GroupId>,
    ) -> OptResult<InsertOutcome> {
        let NewGroupExpr { operator, children } = candidate;
        if operator.arity() != children.len() {
            return Err(OptError::invariant(format!(
                "{} expects {} children, got {}",
                operator.name(),
                operator.arity(),
                children.len()
            )));
        }
        let children = children
            .iter()
            .map(|c| self.canonical_group(*c))
            .collect::<OptResult<GroupIds>>()?;
        let key = GroupExprKey { operator, children };

        if let Some(existing) = self.index.get(&key).map(|e| *e) {
            return self.existing(existing);
        }

        let target = match target {
            Some(group) => InsertTarget::Existing(self.canonical_group(group)?),
            None => InsertTarget::New(self.derive_logical_prop(&key)?),
        };

        match self.index.entry(key) {
            Entry::Occupied(entry) => {
                let existing = *entry.get();
                drop(entry);
                self.existing(existing)
            }
            Entry::Vacant(entry) => {
                let (group, new_group) = match target {
                    InsertTarget::Existing(id) => (self.group(id)?, false),
                    InsertTarget::New(logical_prop) => (self.new_group(logical_prop), true),
                };
                let key = entry.key();
                let expr = self.new_group_expr(key.operator.clone(), key.children.clone(), group.id());
                group.add_member(expr);
                entry.insert(expr);
                trace!("Inserted group expression {} into group {}", expr, group.id());
                Ok(InsertOutcome::Inserted {
                    group: group.id(),
                    expr,
                    new_group,
                })
            }
        }
    }

    fn existing(&self, expr: GroupExprId) -> OptResult<InsertOutcome> {
        let group = self.canonical_group(self.group_expr(expr)?.group())?;
        trace!("Found existing group expression {} in group {}", expr, group);
        Ok(InsertOutcome::Existing { group, expr })
    }

    fn derive_logical_prop(&self, key: &GroupExprKey) -> OptResult<LogicalProperty> {
        let children = key
            .children
            .iter()
            .map(|c| self.group(*c))
            .collect::<OptResult<Vec<_>>>()?;
        let inputs: Vec<&LogicalProperty> = children.iter().map(|g| g.logical_prop()).collect();
        key.operator.derive_logical_prop(&inputs)
    }

    fn new_group(&self, logical_prop: LogicalProperty) -> Arc<Group> {
        let mut groups = self.groups.write();
        let id = GroupId(groups.len());
        let group = Arc::new(Group::new(id, logical_prop));
        groups.push(group.clone());
        debug!("Created group {}", id);
        group
    }

    fn new_group_expr(
        &self,
        operator: Operator,
        children: GroupIds,
        group: GroupId,
    ) -> GroupExprId {
        let mut exprs = self.exprs.write();
        let id = GroupExprId(exprs.len());
        exprs.push(Arc::new(GroupExpr::new(id, operator, children, group)));
        id
    }

    /// Copies a logical plan into the memo bottom up, returning the group of its root.
    ///
    /// Plans deeper than `max_plan_depth` are rejected before anything is inserted.
    pub fn insert_plan(&self, plan: &Plan) -> OptResult<GroupId> {
        let _session = self.phase.read_recursive();
        self.check_depth(plan.depth().saturating_sub(1))?;

        let mut inserted = HashMap::<PlanNodeId, GroupId>::new();
        let mut root = None;
        for node in plan.post_order() {
            let children = node
                .inputs()
                .iter()
                .map(|input| {
                    inserted.get(&input.id()).copied().ok_or_else(|| {
                        OptError::invariant(format!(
                            "input {} of plan node {} not inserted",
                            input.id(),
                            node.id()
                        ))
                    })
                })
                .collect::<OptResult<GroupIds>>()?;
            let group = self
                .insert_or_find_locked(NewGroupExpr::new(node.operator().clone(), children), None)?
                .group();
            inserted.insert(node.id(), group);
            root = Some(group);
        }
        root.ok_or_else(|| OptError::invariant("plan without nodes"))
    }

    /// Returns the optimization context of `(group, required)`, creating it on first request.
    /// At most one context exists per pair.
    pub fn lookup_or_create_optimization_context(
        &self,
        group: GroupId,
        required: &RequiredProperties,
    ) -> OptResult<OptContextId> {
        let _session = self.phase.read_recursive();
        loop {
            let group = self.group(self.canonical_group(group)?)?;
            if let Some(id) = group.context(required) {
                return Ok(self.optimization_context(id)?.id());
            }

            let mut contexts = group.contexts.write();
            // Merged meanwhile, its contexts moved to the canonical group.
            if group.duplicate_of().is_some() {
                continue;
            }
            if let Some(id) = contexts.get(required) {
                return Ok(*id);
            }
            let required = Arc::new(required.clone());
            let id = {
                let mut arena = self.contexts.write();
                let id = OptContextId(arena.len());
                arena.push(Arc::new(OptimizationContext::new(
                    id,
                    group.id(),
                    required.clone(),
                )));
                id
            };
            contexts.insert(required, id);
            trace!("Created optimization context {} for group {}", id, group.id());
            return Ok(id);
        }
    }

    /// Offers a costed alternative to context `ctx`. Returns whether it became the winner.
    ///
    /// Offers of duplicate expressions are ignored. A candidate not belonging to the context's
    /// group, with a wrong number of child contexts or with an invalid cost is rejected.
    pub fn improve_optimization_context(
        &self,
        ctx: OptContextId,
        candidate: CostContext,
    ) -> OptResult<bool> {
        let _session = self.phase.read_recursive();
        let expr = self.group_expr(candidate.expr())?;
        if expr.is_duplicate() {
            trace!("Ignored duplicate group expression {}", expr.id());
            return Ok(false);
        }
        if !candidate.cost().is_valid() {
            return Err(OptError::invariant(format!(
                "invalid cost offered for group expression {}",
                expr.id()
            )));
        }
        if candidate.child_contexts().len() != expr.children().len() {
            return Err(OptError::invariant(format!(
                "group expression {} has {} children, got {} child contexts",
                expr.id(),
                expr.children().len(),
                candidate.child_contexts().len()
            )));
        }
        for (child, child_ctx) in expr.children().iter().zip(candidate.child_contexts()) {
            let child = self.canonical_group(*child)?;
            match child_ctx {
                Some(child_ctx) => {
                    let child_ctx = self.optimization_context(*child_ctx)?;
                    if self.canonical_group(child_ctx.group())? != child {
                        return Err(OptError::invariant(format!(
                            "child context {} doesn't belong to group {}",
                            child_ctx.id(),
                            child
                        )));
                    }
                }
                None if self.group(child)?.is_scalar() => {}
                None => {
                    return Err(OptError::invariant(format!(
                        "relational child group {} of {} has no context",
                        child,
                        expr.id()
                    )))
                }
            }
        }

        let mut ctx = self.optimization_context(ctx)?;
        let expr_group = self.canonical_group(expr.group())?;
        let mut candidate = candidate;
        loop {
            let ctx_group = self.canonical_group(ctx.group())?;
            if expr_group != ctx_group {
                return Err(OptError::invariant(format!(
                    "group expression {} of group {} offered to context {} of group {}",
                    expr.id(),
                    expr_group,
                    ctx.id(),
                    ctx_group
                )));
            }
            match ctx.offer(candidate) {
                OfferOutcome::Recorded(improved) => {
                    if improved {
                        trace!(
                            "Group expression {} is the new winner of context {}",
                            expr.id(),
                            ctx.id()
                        );
                    }
                    return Ok(improved);
                }
                OfferOutcome::Forward(target, returned) => {
                    ctx = self.optimization_context(target)?;
                    candidate = returned;
                }
            }
        }
    }

    /// Records that groups `a` and `b` are equivalent. The smaller canonical id stays canonical.
    ///
    /// Returns whether anything changed. Contexts of the subsumed group are folded into the
    /// canonical group, so extraction from either group yields the same plan.
    pub fn mark_groups_duplicate(&self, a: GroupId, b: GroupId) -> OptResult<bool> {
        let _session = self.phase.read_recursive();
        self.mark_groups_duplicate_locked(a, b)
    }

    fn mark_groups_duplicate_locked(&self, a: GroupId, b: GroupId) -> OptResult<bool> {
        if a == b {
            return Err(OptError::invariant(format!(
                "group {} marked as duplicate of itself",
                a
            )));
        }
        let _union = self.union_lock.lock();
        let (ra, rb) = (self.canonical_group(a)?, self.canonical_group(b)?);
        if ra == rb {
            return Ok(false);
        }
        let (canonical, subsumed) = if ra < rb { (ra, rb) } else { (rb, ra) };
        let subsumed_group = self.group(subsumed)?;
        subsumed_group.set_duplicate_of(canonical);
        self.compress_paths()?;
        self.fold_contexts(&subsumed_group, canonical)?;
        self.duplicate_groups.fetch_add(1, Ordering::Relaxed);
        debug!("Marked group {} as duplicate of group {}", subsumed, canonical);
        Ok(true)
    }

    /// Points every group directly at its canonical group.
    fn compress_paths(&self) -> OptResult<()> {
        let groups = self.groups.read_recursive().clone();
        for group in groups {
            let canonical = self.canonical_group(group.id())?;
            if canonical != group.id() && group.duplicate_of() != Some(canonical) {
                group.set_duplicate_of(canonical);
            }
        }
        Ok(())
    }

    fn fold_contexts(&self, subsumed: &Group, canonical: GroupId) -> OptResult<()> {
        let moved: Vec<_> = subsumed.contexts.write().drain().collect();
        let target = self.group(canonical)?;
        let mut target_contexts = target.contexts.write();
        for (required, id) in moved {
            let ctx = self.optimization_context(id)?;
            match target_contexts.get(&required).copied() {
                Some(existing) => {
                    let existing = self.optimization_context(existing)?;
                    for alternative in ctx.seal_into(existing.id()) {
                        if let OfferOutcome::Forward(to, _) = existing.offer(alternative) {
                            return Err(OptError::invariant(format!(
                                "context {} of canonical group {} is forwarded to {}",
                                existing.id(),
                                canonical,
                                to
                            )));
                        }
                    }
                }
                None => {
                    ctx.set_group(canonical);
                    target_contexts.insert(required, ctx.id());
                }
            }
        }
        Ok(())
    }

    /// One rehash pass: re-inserts every indexed expression using current child group ids.
    ///
    /// An expression colliding with one inserted before it is quarantined as its duplicate,
    /// and their groups are marked duplicate when they differ. Returns whether new duplicate
    /// groups were found. Waits for running search operations.
    pub fn rehash(&self) -> OptResult<bool> {
        let _barrier = self.phase.write();
        self.rehash_locked()
    }

    fn rehash_locked(&self) -> OptResult<bool> {
        let mut drained: Vec<GroupExprId> = self.index.iter().map(|e| *e.value()).collect();
        self.index.clear();
        drained.sort();

        let mut new_duplicates = false;
        for id in drained {
            let expr = self.group_expr(id)?;
            let key = self.key_of(&expr)?;
            let master = match self.index.entry(key) {
                Entry::Vacant(entry) => {
                    entry.insert(id);
                    continue;
                }
                Entry::Occupied(entry) => *entry.get(),
            };

            expr.mark_duplicate_of(master);
            self.group(expr.group())?.quarantine(id);
            trace!("Group expression {} is a duplicate of {}", id, master);

            let group = self.canonical_group(expr.group())?;
            let master_group = self.canonical_group(self.group_expr(master)?.group())?;
            if group != master_group && self.mark_groups_duplicate_locked(group, master_group)? {
                new_duplicates = true;
            }
        }
        Ok(new_duplicates)
    }

    fn key_of(&self, expr: &GroupExpr) -> OptResult<GroupExprKey> {
        Ok(GroupExprKey {
            operator: expr.operator().clone(),
            children: expr
                .children()
                .iter()
                .map(|c| self.canonical_group(*c))
                .collect::<OptResult<GroupIds>>()?,
        })
    }

    /// Moves live members of subsumed groups into their canonical group.
    fn merge_duplicate_groups_locked(&self) -> OptResult<()> {
        let groups = self.groups.read_recursive().clone();
        for group in groups.iter().filter(|g| g.duplicate_of().is_some()) {
            let members = group.take_live_members();
            if members.is_empty() {
                continue;
            }
            let canonical = self.canonical_group(group.id())?;
            for expr in &members {
                self.group_expr(*expr)?.set_group(canonical);
            }
            debug!(
                "Moved {} group expressions from group {} to group {}",
                members.len(),
                group.id(),
                canonical
            );
            self.group(canonical)?.extend_live_members(members);
        }
        if let Some(root) = self.root() {
            self.root
                .store(self.canonical_group(root)?.0, Ordering::Release);
        }
        Ok(())
    }

    /// Merges duplicate groups and rehashes until a pass finds no new duplicates.
    ///
    /// Returns whether any new duplicate group was found. Waits for running search operations
    /// and blocks new ones while it runs.
    pub fn rehash_and_merge(&self) -> OptResult<bool> {
        let _barrier = self.phase.write();
        let mut found = false;
        let mut passes = 0;
        loop {
            passes += 1;
            self.merge_duplicate_groups_locked()?;
            let new_duplicates = self.rehash_locked()?;
            found |= new_duplicates;
            if !new_duplicates {
                break;
            }
            if let Some(max_passes) = self.config.max_merge_passes {
                if passes >= max_passes {
                    return Err(OptError::MergeDidNotConverge { passes });
                }
            }
        }
        debug!(
            "Rehash and merge finished after {} passes, found duplicates: {}",
            passes, found
        );
        Ok(found)
    }

    /// Drops all optimization contexts to start a new search stage.
    pub fn reset_optimization_contexts(&self) {
        let _barrier = self.phase.write();
        for group in self.groups.read_recursive().iter() {
            group.contexts.write().clear();
        }
        self.contexts.write().clear();
        debug!("Reset optimization contexts");
    }

    /// Extracts the winning plan of `root` for `required`.
    ///
    /// Follows child contexts recorded with each winner, so extraction never searches and
    /// returns the same plan until the memo changes.
    pub fn extract_plan(&self, root: GroupId, required: &RequiredProperties) -> OptResult<Plan> {
        let _session = self.phase.read_recursive();
        let mut next_id = 0;
        let root_node = self.extract_group(root, required, 0, &mut next_id)?;
        let plan = Plan::new(root_node);
        debug!("Extracted plan of group {}:\n{}", root, plan);
        Ok(plan)
    }

    fn check_depth(&self, depth: usize) -> OptResult<()> {
        if depth >= self.config.max_plan_depth {
            Err(OptError::PlanDepthExceeded {
                limit: self.config.max_plan_depth,
            })
        } else {
            Ok(())
        }
    }

    fn extract_group(
        &self,
        group: GroupId,
        required: &RequiredProperties,
        depth: usize,
        next_id: &mut PlanNodeId,
    ) -> OptResult<PlanNodeRef> {
        self.check_depth(depth)?;
        let group = self.group(self.canonical_group(group)?)?;
        if group.is_scalar() {
            return self.extract_scalar(&group, depth, next_id);
        }
        let ctx = group.context(required).ok_or_else(|| OptError::NoPlanFound {
            group: group.id(),
            required: required.to_string(),
        })?;
        self.extract_context(ctx, depth, next_id)
    }

    fn extract_context(
        &self,
        ctx: OptContextId,
        depth: usize,
        next_id: &mut PlanNodeId,
    ) -> OptResult<PlanNodeRef> {
        self.check_depth(depth)?;
        let ctx = self.optimization_context(ctx)?;
        let group = self.group(self.canonical_group(ctx.group())?)?;
        let best = ctx.best().ok_or_else(|| OptError::NoPlanFound {
            group: group.id(),
            required: ctx.required().to_string(),
        })?;
        let expr = self.master_expr(best.expr())?;

        if expr.operator().is_physical()
            && !ctx
                .required()
                .is_satisfied_by(best.delivered(), &group.logical_prop().output_columns())
        {
            return Err(OptError::UnsatisfiedRequiredProperties {
                group: group.id(),
                required: ctx.required().to_string(),
            });
        }
        if best.child_contexts().len() != expr.children().len() {
            return Err(OptError::invariant(format!(
                "winner {} of context {} has mismatched child contexts",
                expr.id(),
                ctx.id()
            )));
        }

        let id = *next_id;
        *next_id += 1;
        let mut inputs = Vec::with_capacity(expr.children().len());
        for (child, child_ctx) in expr.children().iter().zip(best.child_contexts()) {
            let input = match child_ctx {
                Some(child_ctx) => self.extract_context(*child_ctx, depth + 1, next_id)?,
                None => {
                    let child = self.group(self.canonical_group(*child)?)?;
                    if !child.is_scalar() {
                        return Err(OptError::invariant(format!(
                            "relational child group {} of {} has no context",
                            child.id(),
                            expr.id()
                        )));
                    }
                    self.extract_scalar(&child, depth + 1, next_id)?
                }
            };
            inputs.push(input);
        }

        Ok(Arc::new(
            PlanNodeBuilder::new(id, expr.operator())
                .add_inputs(inputs)
                .with_logical_prop(Some(group.logical_prop().clone()))
                .with_statistics(best.stat().cloned())
                .with_cost(Some(best.cost()))
                .with_delivered(Some(best.delivered().clone()))
                .build(),
        ))
    }

    fn extract_scalar(
        &self,
        group: &Group,
        depth: usize,
        next_id: &mut PlanNodeId,
    ) -> OptResult<PlanNodeRef> {
        self.check_depth(depth)?;
        let expr = group
            .first_live_member()
            .ok_or_else(|| OptError::invariant(format!("scalar group {} is empty", group.id())))?;
        let expr = self.group_expr(expr)?;

        let id = *next_id;
        *next_id += 1;
        let mut inputs = Vec::with_capacity(expr.children().len());
        for child in expr.children() {
            let child = self.group(self.canonical_group(*child)?)?;
            inputs.push(self.extract_scalar(&child, depth + 1, next_id)?);
        }
        Ok(Arc::new(
            PlanNodeBuilder::new(id, expr.operator())
                .add_inputs(inputs)
                .with_logical_prop(Some(group.logical_prop().clone()))
                .build(),
        ))
    }

    /// The expression `id` duplicates, or `id` itself.
    pub(super) fn master_expr(&self, id: GroupExprId) -> OptResult<Arc<GroupExpr>> {
        let count = self.group_expr_count();
        let mut expr = self.group_expr(id)?;
        for _ in 0..=count {
            match expr.duplicate_of() {
                Some(master) => expr = self.group_expr(master)?,
                None => return Ok(expr),
            }
        }
        Err(OptError::invariant(format!(
            "duplicate chain of group expression {} has a cycle",
            id
        )))
    }

    /// Snapshots all costed alternatives reachable from `(root, required)` for plan enumeration.
    pub fn build_plan_enumerator(
        &self,
        root: GroupId,
        required: &RequiredProperties,
    ) -> OptResult<PlanEnumerator> {
        let _barrier = self.phase.write();
        PlanEnumerator::build(self, root, required)
    }

    /// Verifies index and membership consistency and acyclicity of group duplicate pointers.
    pub fn check_consistency(&self) -> OptResult<()> {
        let _barrier = self.phase.write();
        let groups = self.groups.read_recursive().clone();
        let exprs = self.exprs.read_recursive().clone();

        for group in &groups {
            self.canonical_group(group.id())?;
        }

        let mut indexed = HashSet::new();
        for entry in self.index.iter() {
            if !indexed.insert(*entry.value()) {
                return Err(OptError::invariant(format!(
                    "group expression {} is indexed twice",
                    entry.value()
                )));
            }
        }

        let mut owners = HashMap::new();
        for group in &groups {
            for id in group.live_members() {
                if owners.insert(id, group.id()).is_some() {
                    return Err(OptError::invariant(format!(
                        "group expression {} is a member of several groups",
                        id
                    )));
                }
                let expr = self.group_expr(id)?;
                if expr.is_duplicate() || expr.group() != group.id() {
                    return Err(OptError::invariant(format!(
                        "group {} has inconsistent live member {}",
                        group.id(),
                        id
                    )));
                }
            }
            for id in group.duplicate_members() {
                if !self.group_expr(id)?.is_duplicate() {
                    return Err(OptError::invariant(format!(
                        "quarantined group expression {} is not a duplicate",
                        id
                    )));
                }
            }
        }

        for expr in &exprs {
            let live = !expr.is_duplicate();
            if live != indexed.contains(&expr.id()) || live != owners.contains_key(&expr.id()) {
                return Err(OptError::invariant(format!(
                    "group expression {} is inconsistent with index or membership",
                    expr.id()
                )));
            }
        }
        Ok(())
    }
}

impl Debug for Memo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut table = Table::new();
        table.set_titles(row![
            "Group",
            "Duplicate of",
            "Expressions",
            "Quarantined",
            "Contexts"
        ]);
        for group in self.groups.read_recursive().iter() {
            let exprs = group
                .live_members()
                .into_iter()
                .filter_map(|id| self.group_expr(id).ok())
                .map(|e| {
                    format!(
                        "{}: {} [{}]",
                        e.id(),
                        e.operator().name(),
                        e.children().iter().join(", ")
                    )
                })
                .join("\n");
            let contexts = group
                .contexts
                .read()
                .iter()
                .sorted_by_key(|(_, id)| **id)
                .map(|(required, id)| {
                    let best = self
                        .optimization_context(*id)
                        .ok()
                        .and_then(|ctx| ctx.best())
                        .map(|best| format!("{} @ {}", best.expr(), best.cost()))
                        .unwrap_or_else(|| "-".to_string());
                    format!("{}: {} => {}", id, required, best)
                })
                .join("\n");
            table.add_row(row![
                group.id(),
                group
                    .duplicate_of()
                    .map(|g| g.to_string())
                    .unwrap_or_default(),
                exprs,
                group.duplicate_members().iter().join(", "),
                contexts
            ]);
        }
        write!(f, "{}", table)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::{self, RecvTimeoutError};
    use std::time::Duration;

    use super::*;
    use crate::cost::Cost;
    use crate::expr::{col, lit_i64, ColumnId, ColumnSet};
    use crate::operator::{
        Filter, HashJoin, Join, JoinType, LogicalOperator, Operator, PhysicalOperator, TableScan,
    };
    use crate::plan::LogicalPlanBuilder;
    use crate::properties::{
        DeliveredProperties, DistributionMatching, DistributionSpec, SingletonKind,
    };

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn columns(ids: &[u32]) -> ColumnSet {
        ids.iter().map(|c| ColumnId(*c)).collect()
    }

    fn table(name: &str, ids: &[u32]) -> TableScan {
        TableScan::new(name, ids.iter().map(|c| ColumnId(*c)).collect()).with_distribution(
            DistributionSpec::Hashed(vec![ColumnId(ids[0])]),
        )
    }

    fn hashed(column: u32) -> DeliveredProperties {
        DeliveredProperties::new(DistributionSpec::Hashed(vec![ColumnId(column)]))
    }

    fn join() -> Join {
        Join::new(JoinType::Inner, col(1).eq(col(3)))
    }

    struct JoinMemo {
        memo: Memo,
        t1: GroupId,
        t2: GroupId,
        join: GroupId,
    }

    fn join_memo(config: OptimizerContext) -> JoinMemo {
        let memo = Memo::new(config);
        let t1 = memo
            .insert_or_find(
                NewGroupExpr::new(LogicalOperator::LogicalScan(table("t1", &[1, 2])), vec![]),
                None,
            )
            .unwrap()
            .group();
        let t2 = memo
            .insert_or_find(
                NewGroupExpr::new(LogicalOperator::LogicalScan(table("t2", &[3, 4])), vec![]),
                None,
            )
            .unwrap()
            .group();
        let join = memo
            .insert_or_find(
                NewGroupExpr::new(LogicalOperator::LogicalJoin(join()), vec![t1, t2]),
                None,
            )
            .unwrap()
            .group();
        memo.set_root(join).unwrap();
        JoinMemo { memo, t1, t2, join }
    }

    fn insert_physical<O: Into<Operator>>(
        memo: &Memo,
        operator: O,
        children: Vec<GroupId>,
        group: GroupId,
    ) -> GroupExprId {
        memo.insert_or_find(NewGroupExpr::new(operator, children), Some(group))
            .unwrap()
            .expr()
    }

    /// Costs physical scans and a hash join, returning the root context.
    fn optimize_join(m: &JoinMemo, root_required: &RequiredProperties) -> OptContextId {
        let memo = &m.memo;
        let scan1 = insert_physical(
            memo,
            PhysicalOperator::PhysicalTableScan(table("t1", &[1, 2])),
            vec![],
            m.t1,
        );
        let scan2 = insert_physical(
            memo,
            PhysicalOperator::PhysicalTableScan(table("t2", &[3, 4])),
            vec![],
            m.t2,
        );
        let hash_join = insert_physical(
            memo,
            PhysicalOperator::PhysicalHashJoin(HashJoin::new(join())),
            vec![m.t1, m.t2],
            m.join,
        );

        let ctx1 = memo
            .lookup_or_create_optimization_context(m.t1, &RequiredProperties::any(columns(&[1, 2])))
            .unwrap();
        let ctx2 = memo
            .lookup_or_create_optimization_context(m.t2, &RequiredProperties::any(columns(&[3, 4])))
            .unwrap();
        assert!(memo
            .improve_optimization_context(ctx1, CostContext::new(scan1, Cost::new(1.0), hashed(1)))
            .unwrap());
        assert!(memo
            .improve_optimization_context(ctx2, CostContext::new(scan2, Cost::new(1.0), hashed(3)))
            .unwrap());

        let root = memo
            .lookup_or_create_optimization_context(m.join, root_required)
            .unwrap();
        assert!(memo
            .improve_optimization_context(
                root,
                CostContext::new(hash_join, Cost::new(3.0), hashed(1))
                    .with_child_contexts(vec![Some(ctx1), Some(ctx2)]),
            )
            .unwrap());
        root
    }

    #[test]
    fn test_insert_join() {
        init();
        let m = join_memo(OptimizerContext::default());
        assert_eq!(3, m.memo.group_count());
        assert_eq!(3, m.memo.group_expr_count());
        assert_eq!(Some(m.join), m.memo.root());

        let again = m
            .memo
            .insert_or_find(
                NewGroupExpr::new(LogicalOperator::LogicalJoin(join()), vec![m.t1, m.t2]),
                None,
            )
            .unwrap();
        assert_eq!(
            InsertOutcome::Existing {
                group: m.join,
                expr: GroupExprId(2)
            },
            again
        );
        assert_eq!(3, m.memo.group_expr_count());
        assert_eq!(
            vec![GroupExprId(2)],
            m.memo.group(m.join).unwrap().live_members()
        );

        let prop = m.memo.group(m.join).unwrap().logical_prop().output_columns();
        assert_eq!(columns(&[1, 2, 3, 4]), prop);
    }

    #[test]
    fn test_insert_into_other_group_finds_existing() {
        let m = join_memo(OptimizerContext::default());
        let outcome = m
            .memo
            .insert_or_find(
                NewGroupExpr::new(LogicalOperator::LogicalScan(table("t1", &[1, 2])), vec![]),
                Some(m.t2),
            )
            .unwrap();
        assert!(!outcome.is_inserted());
        assert_eq!(m.t1, outcome.group());
        assert_eq!(3, m.memo.group_expr_count());
    }

    #[test]
    fn test_physical_operator_needs_target_group() {
        let memo = Memo::default();
        let res = memo.insert_or_find(
            NewGroupExpr::new(
                PhysicalOperator::PhysicalTableScan(table("t1", &[1, 2])),
                vec![],
            ),
            None,
        );
        assert!(matches!(res, Err(OptError::InvariantViolation(_))));
        assert_eq!(0, memo.group_count());
        assert_eq!(0, memo.group_expr_count());
    }

    #[test]
    fn test_arity_mismatch() {
        let m = join_memo(OptimizerContext::default());
        let res = m.memo.insert_or_find(
            NewGroupExpr::new(LogicalOperator::LogicalJoin(join()), vec![m.t1]),
            None,
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_context_is_unique_per_requirement() {
        let m = join_memo(OptimizerContext::default());
        let any = RequiredProperties::any(columns(&[1, 2]));
        let c1 = m.memo.lookup_or_create_optimization_context(m.t1, &any).unwrap();
        let c2 = m
            .memo
            .lookup_or_create_optimization_context(m.t1, &any.clone())
            .unwrap();
        assert_eq!(c1, c2);

        let singleton = any.with_distribution(
            DistributionSpec::Singleton(SingletonKind::Coordinator),
            DistributionMatching::Satisfy,
        );
        let c3 = m
            .memo
            .lookup_or_create_optimization_context(m.t1, &singleton)
            .unwrap();
        assert_ne!(c1, c3);
        assert_eq!(2, m.memo.group(m.t1).unwrap().context_count());
    }

    #[test]
    fn test_best_cost_never_increases() {
        let m = join_memo(OptimizerContext::default());
        let scan = insert_physical(
            &m.memo,
            PhysicalOperator::PhysicalTableScan(table("t1", &[1, 2])),
            vec![],
            m.t1,
        );
        let ctx = m
            .memo
            .lookup_or_create_optimization_context(m.t1, &RequiredProperties::any(columns(&[1])))
            .unwrap();

        let mut best = vec![];
        for cost in [5.0, 3.0, 4.0, 1.0, 2.0] {
            m.memo
                .improve_optimization_context(ctx, CostContext::new(scan, Cost::new(cost), hashed(1)))
                .unwrap();
            best.push(
                m.memo
                    .optimization_context(ctx)
                    .unwrap()
                    .best_cost()
                    .unwrap()
                    .value(),
            );
        }
        assert_eq!(vec![5.0, 3.0, 3.0, 1.0, 1.0], best);
    }

    #[test]
    fn test_improve_rejects_foreign_expression() {
        let m = join_memo(OptimizerContext::default());
        let scan = insert_physical(
            &m.memo,
            PhysicalOperator::PhysicalTableScan(table("t1", &[1, 2])),
            vec![],
            m.t1,
        );
        let ctx = m
            .memo
            .lookup_or_create_optimization_context(m.t2, &RequiredProperties::any(columns(&[3])))
            .unwrap();
        let res = m
            .memo
            .improve_optimization_context(ctx, CostContext::new(scan, Cost::new(1.0), hashed(1)));
        assert!(res.is_err());

        let res = m.memo.improve_optimization_context(
            ctx,
            CostContext::new(scan, Cost::new(f64::NAN), hashed(1)),
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_extract_before_improve() {
        let m = join_memo(OptimizerContext::default());
        let required = RequiredProperties::any(columns(&[1, 2, 3, 4]));
        let res = m.memo.extract_plan(m.join, &required);
        assert!(matches!(res, Err(OptError::NoPlanFound { .. })));

        m.memo
            .lookup_or_create_optimization_context(m.join, &required)
            .unwrap();
        let err = m.memo.extract_plan(m.join, &required).unwrap_err();
        assert!(err.is_plan_generation_failure());
    }

    #[test]
    fn test_extract_plan() {
        init();
        let m = join_memo(OptimizerContext::default());
        let required = RequiredProperties::any(columns(&[1, 2, 3, 4]));
        optimize_join(&m, &required);

        let plan = m.memo.extract_plan(m.join, &required).unwrap();
        let root = plan.root();
        assert_eq!(0, root.id());
        assert!(matches!(
            root.operator(),
            Operator::Physical(PhysicalOperator::PhysicalHashJoin(_))
        ));
        assert_eq!(Some(Cost::new(3.0)), root.cost());
        assert_eq!(
            vec![1, 2],
            root.inputs().iter().map(|n| n.id()).collect::<Vec<_>>()
        );
        assert_eq!(
            "t2",
            root.inputs()[1]
                .operator()
                .as_physical()
                .and_then(|op| op.as_physical_table_scan())
                .unwrap()
                .table_name()
        );

        assert_eq!(plan, m.memo.extract_plan(m.join, &required).unwrap());
    }

    #[test]
    fn test_extract_unsatisfied() {
        let m = join_memo(OptimizerContext::default());
        let required = RequiredProperties::any(columns(&[1, 2, 3, 4])).with_distribution(
            DistributionSpec::Singleton(SingletonKind::Coordinator),
            DistributionMatching::Satisfy,
        );
        optimize_join(&m, &required);
        let res = m.memo.extract_plan(m.join, &required);
        assert!(matches!(
            res,
            Err(OptError::UnsatisfiedRequiredProperties { .. })
        ));
    }

    #[test]
    fn test_extract_depth_limit() {
        let m = join_memo(OptimizerContext::default().with_max_plan_depth(1));
        let required = RequiredProperties::any(columns(&[1, 2, 3, 4]));
        optimize_join(&m, &required);
        let res = m.memo.extract_plan(m.join, &required);
        assert!(matches!(res, Err(OptError::PlanDepthExceeded { limit: 1 })));
    }

    fn filter_group(memo: &Memo, input: GroupId, literal: i64) -> GroupId {
        memo.insert_or_find(
            NewGroupExpr::new(
                LogicalOperator::LogicalFilter(Filter::new(col(2).gt(lit_i64(literal)))),
                vec![input],
            ),
            None,
        )
        .unwrap()
        .group()
    }

    fn physical_filter(memo: &Memo, input: GroupId, literal: i64, group: GroupId) -> GroupExprId {
        insert_physical(
            memo,
            PhysicalOperator::PhysicalFilter(Filter::new(col(2).gt(lit_i64(literal)))),
            vec![input],
            group,
        )
    }

    #[test]
    fn test_mark_groups_duplicate() {
        init();
        let m = join_memo(OptimizerContext::default());
        let memo = &m.memo;
        let g3 = filter_group(memo, m.t1, 1);
        let g4 = filter_group(memo, m.t1, 2);
        let required = RequiredProperties::any(columns(&[1, 2]));

        let scan = insert_physical(
            memo,
            PhysicalOperator::PhysicalTableScan(table("t1", &[1, 2])),
            vec![],
            m.t1,
        );
        let scan_ctx = memo
            .lookup_or_create_optimization_context(m.t1, &required)
            .unwrap();
        memo.improve_optimization_context(scan_ctx, CostContext::new(scan, Cost::new(1.0), hashed(1)))
            .unwrap();

        let f3 = physical_filter(memo, m.t1, 1, g3);
        let f4 = physical_filter(memo, m.t1, 2, g4);
        let ctx3 = memo.lookup_or_create_optimization_context(g3, &required).unwrap();
        let ctx4 = memo.lookup_or_create_optimization_context(g4, &required).unwrap();
        memo.improve_optimization_context(
            ctx3,
            CostContext::new(f3, Cost::new(5.0), hashed(1)).with_child_contexts(vec![Some(scan_ctx)]),
        )
        .unwrap();
        memo.improve_optimization_context(
            ctx4,
            CostContext::new(f4, Cost::new(2.0), hashed(1)).with_child_contexts(vec![Some(scan_ctx)]),
        )
        .unwrap();

        assert!(memo.mark_groups_duplicate(g4, g3).unwrap());
        assert!(!memo.mark_groups_duplicate(g3, g4).unwrap());
        assert!(memo.mark_groups_duplicate(g3, g3).is_err());
        assert_eq!(g3, memo.canonical_group(g4).unwrap());
        assert_eq!(1, memo.duplicate_group_count());

        let from_g3 = memo.extract_plan(g3, &required).unwrap();
        let from_g4 = memo.extract_plan(g4, &required).unwrap();
        assert_eq!(from_g3, from_g4);
        assert_eq!(Some(Cost::new(2.0)), from_g3.root().cost());

        // Offers to the folded context land in the canonical one.
        memo.improve_optimization_context(
            ctx4,
            CostContext::new(f4, Cost::new(0.5), hashed(1)).with_child_contexts(vec![Some(scan_ctx)]),
        )
        .unwrap();
        assert_eq!(
            Some(Cost::new(0.5)),
            memo.optimization_context(ctx3).unwrap().best_cost()
        );
        assert_eq!(
            ctx3,
            memo.lookup_or_create_optimization_context(g4, &required)
                .unwrap()
        );
    }

    #[test]
    fn test_fold_into_sealed_context_fails() {
        init();
        let m = join_memo(OptimizerContext::default());
        let memo = &m.memo;
        let g3 = filter_group(memo, m.t1, 1);
        let g4 = filter_group(memo, m.t1, 2);
        let required = RequiredProperties::any(columns(&[1, 2]));

        let scan = insert_physical(
            memo,
            PhysicalOperator::PhysicalTableScan(table("t1", &[1, 2])),
            vec![],
            m.t1,
        );
        let scan_ctx = memo
            .lookup_or_create_optimization_context(m.t1, &required)
            .unwrap();
        memo.improve_optimization_context(scan_ctx, CostContext::new(scan, Cost::new(1.0), hashed(1)))
            .unwrap();
        let f4 = physical_filter(memo, m.t1, 2, g4);
        let ctx3 = memo.lookup_or_create_optimization_context(g3, &required).unwrap();
        let ctx4 = memo.lookup_or_create_optimization_context(g4, &required).unwrap();
        memo.improve_optimization_context(
            ctx4,
            CostContext::new(f4, Cost::new(2.0), hashed(1)).with_child_contexts(vec![Some(scan_ctx)]),
        )
        .unwrap();

        // The surviving group's context forwards into the one being folded, so folding has
        // nowhere to put the alternatives.
        memo.optimization_context(ctx3).unwrap().seal_into(ctx4);
        let res = memo.mark_groups_duplicate(g3, g4);
        assert!(matches!(res, Err(OptError::InvariantViolation(_))));
    }

    /// Two scans found equivalent, each with the same filter on top.
    fn mirrored_filters(memo: &Memo) -> (GroupId, GroupId, GroupId, GroupId) {
        let scan_a = memo
            .insert_or_find(
                NewGroupExpr::new(LogicalOperator::LogicalScan(table("t1", &[1, 2])), vec![]),
                None,
            )
            .unwrap()
            .group();
        let scan_b = memo
            .insert_or_find(
                NewGroupExpr::new(LogicalOperator::LogicalScan(table("t1_copy", &[1, 2])), vec![]),
                None,
            )
            .unwrap()
            .group();
        let filter_a = filter_group(memo, scan_a, 1);
        let filter_b = filter_group(memo, scan_b, 1);
        assert_ne!(filter_a, filter_b);
        memo.mark_groups_duplicate(scan_a, scan_b).unwrap();
        (scan_a, scan_b, filter_a, filter_b)
    }

    #[test]
    fn test_rehash_and_merge() {
        init();
        let memo = Memo::default();
        let (scan_a, scan_b, filter_a, filter_b) = mirrored_filters(&memo);

        assert!(memo.rehash_and_merge().unwrap());
        assert_eq!(filter_a, memo.canonical_group(filter_b).unwrap());
        assert_eq!(scan_a, memo.canonical_group(scan_b).unwrap());
        assert_eq!(2, memo.duplicate_group_count());

        let quarantined = memo.group(filter_b).unwrap().duplicate_members();
        assert_eq!(1, quarantined.len());
        let duplicate = memo.group_expr(quarantined[0]).unwrap();
        assert_eq!(
            memo.group(filter_a).unwrap().first_live_member(),
            duplicate.duplicate_of()
        );
        assert_eq!(2, memo.group(scan_a).unwrap().live_members().len());

        assert!(!memo.rehash_and_merge().unwrap());
        assert!(!memo.rehash().unwrap());
        memo.check_consistency().unwrap();

        let again = memo
            .insert_or_find(
                NewGroupExpr::new(
                    LogicalOperator::LogicalFilter(Filter::new(col(2).gt(lit_i64(1)))),
                    vec![scan_b],
                ),
                None,
            )
            .unwrap();
        assert_eq!(filter_a, again.group());
        assert!(!again.is_inserted());
    }

    #[test]
    fn test_duplicate_expression_offer_ignored() {
        let memo = Memo::default();
        let (_, _, filter_a, filter_b) = mirrored_filters(&memo);
        let duplicate = memo.group(filter_b).unwrap().first_live_member().unwrap();
        memo.rehash_and_merge().unwrap();

        let ctx = memo
            .lookup_or_create_optimization_context(filter_a, &RequiredProperties::any(columns(&[2])))
            .unwrap();
        let improved = memo
            .improve_optimization_context(ctx, CostContext::new(duplicate, Cost::new(1.0), hashed(1)))
            .unwrap();
        assert!(!improved);
        assert!(memo.optimization_context(ctx).unwrap().best().is_none());
    }

    #[test]
    fn test_merge_pass_limit() {
        let memo = Memo::new(OptimizerContext::default().with_max_merge_passes(1));
        mirrored_filters(&memo);
        let res = memo.rehash_and_merge();
        assert!(matches!(res, Err(OptError::MergeDidNotConverge { passes: 1 })));
    }

    #[test]
    fn test_insert_plan_and_reset() {
        let right = LogicalPlanBuilder::scan(table("t2", &[3, 4])).build();
        let plan = LogicalPlanBuilder::scan(table("t1", &[1, 2]))
            .join(JoinType::Inner, col(1).eq(col(3)), right)
            .build();
        let m = join_memo(OptimizerContext::default());
        let root = m.memo.insert_plan(&plan).unwrap();
        assert_eq!(m.join, root);
        assert_eq!(3, m.memo.group_count());

        optimize_join(&m, &RequiredProperties::any(columns(&[1, 2, 3, 4])));
        assert_eq!(3, m.memo.optimization_context_count());
        m.memo.reset_optimization_contexts();
        assert_eq!(0, m.memo.optimization_context_count());
        assert_eq!(0, m.memo.group(m.join).unwrap().context_count());

        let debug = format!("{:?}", m.memo);
        assert!(debug.contains("LogicalJoin"));
    }

    #[test]
    fn test_insert_plan_depth_limit() {
        init();
        let plan = (0..100)
            .fold(LogicalPlanBuilder::scan(table("t1", &[1, 2])), |builder, i| {
                builder.filter(col(1).gt(lit_i64(i)))
            })
            .build();

        let memo = Memo::new(OptimizerContext::default().with_max_plan_depth(64));
        let res = memo.insert_plan(&plan);
        assert!(matches!(res, Err(OptError::PlanDepthExceeded { limit: 64 })));
        assert_eq!(0, memo.group_count());

        let memo = Memo::new(OptimizerContext::default().with_max_plan_depth(101));
        let root = memo.insert_plan(&plan).unwrap();
        assert_eq!(101, memo.group_count());
        assert_eq!(Some(GroupExprId(100)), memo.group(root).unwrap().first_live_member());
    }

    #[test]
    fn test_maintenance_waits_for_search_session() {
        init();
        let m = join_memo(OptimizerContext::default());
        let memo = &m.memo;
        let (tx, rx) = mpsc::channel();

        std::thread::scope(|scope| {
            let session = memo.search_session();
            scope.spawn(move || {
                let merged = memo.rehash_and_merge();
                tx.send(merged.is_ok()).unwrap();
            });
            assert_eq!(
                Err(RecvTimeoutError::Timeout),
                rx.recv_timeout(Duration::from_millis(200))
            );
            // Search operations still run while the pass waits.
            memo.lookup_or_create_optimization_context(m.t1, &RequiredProperties::any(columns(&[1])))
                .unwrap();

            drop(session);
            assert_eq!(Ok(true), rx.recv_timeout(Duration::from_secs(10)));
        });
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_insert_and_improve() {
        init();
        let memo = Arc::new(join_memo(OptimizerContext::default()));
        let required = RequiredProperties::any(columns(&[1, 2]));

        let handles = (0..8)
            .map(|i| {
                let m = memo.clone();
                let required = required.clone();
                tokio::spawn(async move {
                    let _session = m.memo.search_session();
                    let outcome = m
                        .memo
                        .insert_or_find(
                            NewGroupExpr::new(
                                PhysicalOperator::PhysicalTableScan(table("t1", &[1, 2])),
                                vec![],
                            ),
                            Some(m.t1),
                        )
                        .unwrap();
                    let ctx = m
                        .memo
                        .lookup_or_create_optimization_context(m.t1, &required)
                        .unwrap();
                    m.memo
                        .improve_optimization_context(
                            ctx,
                            CostContext::new(outcome.expr(), Cost::new(10.0 - i as f64), hashed(1)),
                        )
                        .unwrap();
                    (outcome.is_inserted(), ctx)
                })
            })
            .collect::<Vec<_>>();

        let mut inserted = 0;
        let mut contexts = HashSet::new();
        for handle in handles {
            let (is_inserted, ctx) = handle.await.unwrap();
            inserted += is_inserted as usize;
            contexts.insert(ctx);
        }
        assert_eq!(1, inserted);
        assert_eq!(1, contexts.len());

        let ctx = memo
            .memo
            .optimization_context(*contexts.iter().next().unwrap())
            .unwrap();
        assert_eq!(Some(Cost::new(3.0)), ctx.best_cost());
        assert_eq!(8, ctx.alternatives().len());
        memo.memo.check_consistency().unwrap();
    }
}
