//! Properties of relation operators.
//!
//! Logical properties describe what a group produces and are shared by every expression in the
//! group. Physical properties describe how a plan delivers its rows; consumers state what they
//! need as [`RequiredProperties`] and costed alternatives report what they produce as
//! [`DeliveredProperties`].

mod distribution;

use std::fmt::Debug;
use std::hash::Hash;

pub use distribution::*;
mod order;
pub use order::*;
mod logical;
pub use logical::*;
mod physical;
pub use physical::*;
mod rewindability;
pub use rewindability::*;
mod cte;
pub use cte::*;
mod required;
pub use required::*;

pub trait PhysicalProp: Debug + Hash {
    /// Tests whether `self`, as delivered by a plan, satisfies `required`.
    fn satisfies(&self, required: &Self) -> bool;
}
