use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::cascades::{id_from_slot, GroupExprId, GroupId, OptContextId, NO_ID};
use crate::properties::{LogicalProperty, RequiredProperties};

#[derive(Debug, Default)]
struct GroupMembers {
    live: Vec<GroupExprId>,
    /// Expressions found to duplicate another expression, kept for tracing only.
    duplicates: Vec<GroupExprId>,
}

/// Equivalence class of group expressions producing the same logical result.
#[derive(Debug)]
pub struct Group {
    id: GroupId,
    /// Derived from the expression which created the group, never changes.
    logical_prop: LogicalProperty,
    members: Mutex<GroupMembers>,
    duplicate_of: AtomicUsize,
    pub(super) contexts: RwLock<HashMap<Arc<RequiredProperties>, OptContextId>>,
}

impl Group {
    pub(super) fn new(id: GroupId, logical_prop: LogicalProperty) -> Self {
        Self {
            id,
            logical_prop,
            members: Mutex::new(GroupMembers::default()),
            duplicate_of: AtomicUsize::new(NO_ID),
            contexts: RwLock::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn logical_prop(&self) -> &LogicalProperty {
        &self.logical_prop
    }

    pub fn is_scalar(&self) -> bool {
        self.logical_prop.is_scalar()
    }

    /// Live members in insertion order.
    pub fn live_members(&self) -> Vec<GroupExprId> {
        self.members.lock().live.clone()
    }

    pub fn duplicate_members(&self) -> Vec<GroupExprId> {
        self.members.lock().duplicates.clone()
    }

    pub fn first_live_member(&self) -> Option<GroupExprId> {
        self.members.lock().live.first().copied()
    }

    /// Group this group has been merged into, if any.
    pub fn duplicate_of(&self) -> Option<GroupId> {
        id_from_slot(self.duplicate_of.load(Ordering::Acquire)).map(GroupId)
    }

    pub(super) fn set_duplicate_of(&self, canonical: GroupId) {
        self.duplicate_of.store(canonical.0, Ordering::SeqCst);
    }

    pub(super) fn add_member(&self, expr: GroupExprId) {
        self.members.lock().live.push(expr);
    }

    pub(super) fn quarantine(&self, expr: GroupExprId) {
        let mut members = self.members.lock();
        members.live.retain(|e| *e != expr);
        members.duplicates.push(expr);
    }

    pub(super) fn take_live_members(&self) -> Vec<GroupExprId> {
        std::mem::take(&mut self.members.lock().live)
    }

    pub(super) fn extend_live_members(&self, exprs: Vec<GroupExprId>) {
        let mut members = self.members.lock();
        members.live.extend(exprs);
        members.live.sort();
    }

    /// Optimization context registered for `required`, without creating one.
    pub fn context(&self, required: &RequiredProperties) -> Option<OptContextId> {
        self.contexts.read().get(required).copied()
    }

    pub fn context_count(&self) -> usize {
        self.contexts.read().len()
    }
}
