//! Relational operators.
//!
//! An [`Operator`] is the payload of a plan node and of a group expression. Its parameters take
//! part in group expression signatures, so every operator is `Eq + Hash`.

use enum_as_inner::EnumAsInner;
use enum_dispatch::enum_dispatch;

use crate::error::{OptError, OptResult};
use crate::expr::{ColumnSet, Expr};
use crate::properties::{
    DeliveredProperties, DistributionMatching, DistributionSpec, LogicalProperty,
    RelationalProperty, RequiredProperties, ScalarProperty,
};

/// Behavior of logical operators.
#[enum_dispatch]
pub trait LogicalOperatorTrait {
    /// Number of inputs.
    fn arity(&self) -> usize;

    /// Derives logical property from already derived properties of inputs.
    fn derive_logical_prop(&self, inputs: &[&LogicalProperty]) -> OptResult<LogicalProperty>;
}

/// Behavior of physical operators.
#[enum_dispatch]
pub trait PhysicalOperatorTrait {
    /// Number of inputs.
    fn arity(&self) -> usize;

    /// Requirement for input `child_index` when this operator has to satisfy `required`.
    fn required_child_props(
        &self,
        required: &RequiredProperties,
        child_index: usize,
        child_output: &ColumnSet,
    ) -> OptResult<RequiredProperties>;

    /// Properties delivered by this operator given what its inputs deliver.
    fn derive_delivered(&self, inputs: &[&DeliveredProperties]) -> OptResult<DeliveredProperties>;
}

mod logical;
pub use logical::*;
mod physical;
pub use physical::*;
mod table_scan;
pub use table_scan::*;
mod filter;
pub use filter::*;
mod projection;
pub use projection::*;
mod join;
pub use join::*;
mod limit;
pub use limit::*;
mod aggregate;
pub use aggregate::*;
mod cte;
pub use cte::*;
mod insert;
pub use insert::*;
mod enforcer;
pub use enforcer::*;

#[derive(Clone, Debug, Hash, Eq, PartialEq, EnumAsInner)]
pub enum Operator {
    Logical(LogicalOperator),
    Physical(PhysicalOperator),
    Scalar(Expr),
}

impl Operator {
    pub fn is_logical(&self) -> bool {
        matches!(self, Operator::Logical(_))
    }

    pub fn is_physical(&self) -> bool {
        matches!(self, Operator::Physical(_))
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Operator::Scalar(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operator::Logical(op) => op.name(),
            Operator::Physical(op) => op.name(),
            Operator::Scalar(_) => "Scalar",
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Operator::Logical(op) => LogicalOperatorTrait::arity(op),
            Operator::Physical(op) => PhysicalOperatorTrait::arity(op),
            Operator::Scalar(_) => 0,
        }
    }

    /// Physical operators never start a group, so they have no logical property of their own.
    pub fn derive_logical_prop(&self, inputs: &[&LogicalProperty]) -> OptResult<LogicalProperty> {
        match self {
            Operator::Logical(op) => op.derive_logical_prop(inputs),
            Operator::Scalar(expr) => Ok(LogicalProperty::Scalar(ScalarProperty::new(
                expr.used_columns(),
            ))),
            Operator::Physical(op) => Err(OptError::invariant(format!(
                "physical operator {:?} can't derive logical property",
                op
            ))),
        }
    }
}

impl From<LogicalOperator> for Operator {
    fn from(op: LogicalOperator) -> Self {
        Operator::Logical(op)
    }
}

impl From<PhysicalOperator> for Operator {
    fn from(op: PhysicalOperator) -> Self {
        Operator::Physical(op)
    }
}

fn relational_input<'a>(
    inputs: &[&'a LogicalProperty],
    idx: usize,
) -> OptResult<&'a RelationalProperty> {
    inputs
        .get(idx)
        .and_then(|p| p.as_relational())
        .ok_or_else(|| OptError::invariant(format!("missing relational input {}", idx)))
}

fn delivered_input<'a>(
    inputs: &[&'a DeliveredProperties],
    idx: usize,
) -> OptResult<&'a DeliveredProperties> {
    inputs
        .get(idx)
        .copied()
        .ok_or_else(|| OptError::invariant(format!("missing delivered input {}", idx)))
}

fn check_child_index(operator: &str, child_index: usize, arity: usize) -> OptResult<()> {
    if child_index < arity {
        Ok(())
    } else {
        Err(OptError::invariant(format!(
            "{} has no child {}",
            operator, child_index
        )))
    }
}

/// Columns a child has to produce: those the parent asks for plus those the operator uses,
/// restricted to what the child can produce.
fn child_columns(
    required: &RequiredProperties,
    used: &ColumnSet,
    child_output: &ColumnSet,
) -> ColumnSet {
    required.columns().union(used).intersection(child_output)
}

/// Hands the parent's requirement to the only child of an operator which keeps rows as they
/// are, restricting columns and order to what the child produces.
fn pass_through(
    required: &RequiredProperties,
    used: &ColumnSet,
    child_output: &ColumnSet,
) -> RequiredProperties {
    let order = required.order().spec.restrict_to(child_output);
    let distribution = &required.distribution().spec;
    let ret = required
        .clone()
        .with_columns(child_columns(required, used, child_output))
        .with_order(order);
    if distribution.used_columns().is_subset(child_output) {
        ret
    } else {
        ret.with_distribution(DistributionSpec::Any, DistributionMatching::Satisfy)
    }
}
