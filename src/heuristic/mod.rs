//! Rule based preprocessing of logical plans.
//!
//! The plan is loaded into a [`PlanGraph`] and [`HepOptimizer`] applies the enabled rewrite
//! rules node by node, in the configured match order, until a pass changes nothing or the
//! iteration limit is hit. Modeled after calcite's HepPlanner.

mod graph;
mod optimizer;

pub use graph::{HepNodeId, HepOptimizerNode, PlanGraph};
pub use optimizer::HepOptimizer;
