use std::sync::atomic::{AtomicUsize, Ordering};

use smallvec::SmallVec;

use crate::cascades::{id_from_slot, GroupExprId, GroupId, NO_ID};
use crate::operator::Operator;

pub type GroupIds = SmallVec<[GroupId; 4]>;

/// Expression waiting to be inserted into the memo.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct NewGroupExpr {
    pub operator: Operator,
    pub children: GroupIds,
}

impl NewGroupExpr {
    pub fn new<O, I>(operator: O, children: I) -> Self
    where
        O: Into<Operator>,
        I: IntoIterator<Item = GroupId>,
    {
        Self {
            operator: operator.into(),
            children: children.into_iter().collect(),
        }
    }
}

/// Signature of a group expression in the deduplication index.
///
/// Children are canonical group ids at the time the key was computed. A key goes stale when a
/// child group is merged, until the next rehash recomputes it.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct GroupExprKey {
    pub operator: Operator,
    pub children: GroupIds,
}

/// One operator whose inputs are groups.
#[derive(Debug)]
pub struct GroupExpr {
    id: GroupExprId,
    operator: Operator,
    children: GroupIds,
    /// Owning group, changes only when a merge moves the expression into its canonical group.
    group: AtomicUsize,
    duplicate_of: AtomicUsize,
}

impl GroupExpr {
    pub(super) fn new(
        id: GroupExprId,
        operator: Operator,
        children: GroupIds,
        group: GroupId,
    ) -> Self {
        Self {
            id,
            operator,
            children,
            group: AtomicUsize::new(group.0),
            duplicate_of: AtomicUsize::new(NO_ID),
        }
    }

    /// Also the insertion sequence number of this expression.
    pub fn id(&self) -> GroupExprId {
        self.id
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    /// Child groups as they were when this expression was inserted. They may have been merged
    /// into other groups since.
    pub fn children(&self) -> &[GroupId] {
        &self.children
    }

    pub fn group(&self) -> GroupId {
        GroupId(self.group.load(Ordering::Acquire))
    }

    pub(super) fn set_group(&self, group: GroupId) {
        self.group.store(group.0, Ordering::Release);
    }

    pub fn duplicate_of(&self) -> Option<GroupExprId> {
        id_from_slot(self.duplicate_of.load(Ordering::Acquire)).map(GroupExprId)
    }

    pub fn is_duplicate(&self) -> bool {
        self.duplicate_of().is_some()
    }

    pub(super) fn mark_duplicate_of(&self, master: GroupExprId) {
        self.duplicate_of.store(master.0, Ordering::Release);
    }
}
