//! Cascades style memo.
//!
//! The memo holds the search space of a cost based optimizer as groups of logically equivalent
//! group expressions. A group expression refers to its inputs by group id, so one expression
//! stands for every combination of alternatives of its input groups. Groups, expressions and
//! optimization contexts live in arenas owned by the memo and refer to each other by index.
//!
//! The memo is shared by search workers as `Arc<Memo>`. Insertion and optimization context
//! maintenance are safe to run concurrently. Maintenance passes (`rehash_and_merge`,
//! `reset_optimization_contexts`, building a plan enumerator) wait for concurrent search
//! operations to finish and block new ones while they run.

use derive_more::Display;

mod group_expr;
pub use group_expr::*;
mod group;
pub use group::*;
mod context;
pub use context::*;
mod memo;
pub use memo::*;
mod enumerator;
pub use enumerator::*;

#[derive(Copy, Clone, Debug, Display, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[display(fmt = "G{}", _0)]
pub struct GroupId(pub usize);

#[derive(Copy, Clone, Debug, Display, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[display(fmt = "E{}", _0)]
pub struct GroupExprId(pub usize);

#[derive(Copy, Clone, Debug, Display, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[display(fmt = "C{}", _0)]
pub struct OptContextId(pub usize);

/// Marks an unset id slot stored in an atomic.
const NO_ID: usize = usize::MAX;

fn id_from_slot(slot: usize) -> Option<usize> {
    if slot == NO_ID {
        None
    } else {
        Some(slot)
    }
}
