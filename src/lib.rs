//! ## Background
//!
//! A cost based optimizer turns a logical plan into the cheapest physical plan it can find.
//! Bottom-up enumeration with dynamic programming was introduced by [1]. Cascades [2] searches
//! top-down instead, memoizing every optimized sub plan so none is optimized twice.
//!
//! This crate provides the search space of a cascades style optimizer, the memo, together with
//! what is needed to seed it from a logical plan and to read the winning plan back. Exploration
//! and implementation rules, costing and statistics are supplied by the caller.
//!
//! ## Design
//!
//! ### Query Context
//!
//! A [`query_context::QueryContext`] turns a bound logical plan and the columns the caller wants
//! into the required properties of the root, after a preprocessing pass by the heuristic
//! optimizer.
//!
//! ### Heuristic Optimizer
//!
//! Heuristic optimizer is a rule base optimizer. It runs a batch of rules iteratively, until
//! reaching fix point or maximum number of iteration times. Here it preprocesses the logical
//! plan before it is copied into the memo, e.g. dropping trivial filters or turning outer joins
//! into inner joins when a filter above rejects their nulls.
//!
//! ### Cascade Optimizer
//!
//! The [`cascades::Memo`] stores groups of logically equivalent group expressions. An
//! expression refers to its inputs by group, so a memo with a few groups compactly represents a
//! huge number of plans. Every expression is deduplicated on insertion by its operator and
//! input groups. When a rule discovers that two groups are equivalent, they are merged and the
//! memo is rehashed, which may discover further duplicates upwards.
//!
//! Search records, per group and set of required physical properties, an optimization context
//! holding the cheapest costed alternative found so far together with the contexts used for its
//! inputs. The final plan is extracted by following winners from the root context.
//!
//! ## Reference
//!
//! 1. Selinger, P. Griffiths, et al. "Access path selection in a relational database management
//! system." Readings in Artificial Intelligence and Databases. Morgan Kaufmann, 1989. 511-522.
//! 2. Graefe, G., 1995. The cascades framework for query optimization. IEEE Data Eng. Bull., 18(3),
//! pp.19-29.

#[macro_use]
extern crate prettytable;

pub mod cascades;
pub mod cost;
pub mod error;
pub mod expr;
pub mod heuristic;
pub mod operator;
pub mod optimizer;
pub mod plan;
pub mod properties;
pub mod query_context;
pub mod rules;
pub mod stat;
