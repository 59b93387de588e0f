use strum_macros::Display as StrumDisplay;

use crate::error::OptResult;
use crate::expr::{ColumnId, ColumnSet, Expr};
use crate::operator::{
    check_child_index, child_columns, delivered_input, pass_through, relational_input,
    LogicalOperatorTrait, PhysicalOperatorTrait,
};
use crate::properties::{
    CteRequirement, DeliveredProperties, DistributionMatching, DistributionSpec,
    LogicalProperty, RelationalProperty, RequiredProperties, Rewindability,
};

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, StrumDisplay)]
pub enum JoinType {
    Inner,
    Left,
    Full,
    LeftSemi,
    LeftAnti,
}

/// Logical join operator. Child 0 is the outer side, child 1 the inner side.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Join {
    join_type: JoinType,
    condition: Expr,
}

impl Join {
    pub fn new(join_type: JoinType, condition: Expr) -> Self {
        Self {
            join_type,
            condition,
        }
    }

    pub fn join_type(&self) -> JoinType {
        self.join_type
    }

    pub fn condition(&self) -> &Expr {
        &self.condition
    }

    /// Equi join columns of the side producing `child_output`, aligned with the other side.
    fn equi_keys(&self, child_output: &ColumnSet) -> Vec<ColumnId> {
        self.condition
            .equi_join_pairs()
            .into_iter()
            .filter_map(|(l, r)| {
                if child_output.contains(l) {
                    Some(l)
                } else if child_output.contains(r) {
                    Some(r)
                } else {
                    None
                }
            })
            .collect()
    }

    fn equi_key_set(&self, side: &RelationalProperty) -> ColumnSet {
        self.equi_keys(side.output_columns()).into_iter().collect()
    }
}

/// Every row of `this` side matches at most one row of `other` when a unique key of `other`
/// is covered by the equi join columns.
fn keys_preserved(join: &Join, this: &RelationalProperty, other: &RelationalProperty) -> Vec<ColumnSet> {
    let other_keys = join.equi_key_set(other);
    if other.unique_keys().iter().any(|k| k.is_subset(&other_keys)) {
        this.unique_keys().to_vec()
    } else {
        vec![]
    }
}

impl LogicalOperatorTrait for Join {
    fn arity(&self) -> usize {
        2
    }

    fn derive_logical_prop(&self, inputs: &[&LogicalProperty]) -> OptResult<LogicalProperty> {
        let left = relational_input(inputs, 0)?;
        let right = relational_input(inputs, 1)?;

        let prop = match self.join_type {
            JoinType::LeftSemi | JoinType::LeftAnti => left.clone(),
            join_type => {
                let max_rows = match (left.max_rows(), right.max_rows()) {
                    (Some(l), Some(r)) => l.checked_mul(r),
                    _ => None,
                };
                let mut keys = vec![];
                if join_type != JoinType::Full {
                    keys.extend(keys_preserved(self, left, right));
                    if join_type == JoinType::Inner {
                        keys.extend(keys_preserved(self, right, left));
                    }
                }
                RelationalProperty::new(left.output_columns().union(right.output_columns()))
                    .with_max_rows(max_rows)
                    .with_unique_keys(keys)
            }
        };
        Ok(LogicalProperty::Relational(prop))
    }
}

/// Hash join. Both sides are hashed on their equi join columns; without any, the inner side is
/// broadcast.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct HashJoin(Join);

impl HashJoin {
    pub fn new(join: Join) -> Self {
        Self(join)
    }

    pub fn join(&self) -> &Join {
        &self.0
    }
}

impl PhysicalOperatorTrait for HashJoin {
    fn arity(&self) -> usize {
        2
    }

    fn required_child_props(
        &self,
        required: &RequiredProperties,
        child_index: usize,
        child_output: &ColumnSet,
    ) -> OptResult<RequiredProperties> {
        check_child_index("hash join", child_index, 2)?;
        let keys = self.0.equi_keys(child_output);
        let distribution = match (keys.is_empty(), child_index) {
            (false, _) => DistributionSpec::Hashed(keys),
            (true, 0) => DistributionSpec::Any,
            (true, _) => DistributionSpec::Replicated,
        };
        let ctes = if child_index == 0 {
            required.ctes().clone()
        } else {
            CteRequirement::new()
        };
        Ok(RequiredProperties::any(child_columns(
            required,
            &self.0.condition.used_columns(),
            child_output,
        ))
        .with_distribution(distribution, DistributionMatching::Satisfy)
        .with_ctes(ctes))
    }

    fn derive_delivered(&self, inputs: &[&DeliveredProperties]) -> OptResult<DeliveredProperties> {
        let outer = delivered_input(inputs, 0)?;
        let inner = delivered_input(inputs, 1)?;
        Ok(DeliveredProperties::new(outer.distribution.clone())
            .with_ctes(outer.ctes.combine(&inner.ctes)))
    }
}

/// Nested loop join. Keeps the order of the outer side and rescans the inner side, which must
/// be replicated and rewindable.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct NestedLoopJoin(Join);

impl NestedLoopJoin {
    pub fn new(join: Join) -> Self {
        Self(join)
    }

    pub fn join(&self) -> &Join {
        &self.0
    }
}

impl PhysicalOperatorTrait for NestedLoopJoin {
    fn arity(&self) -> usize {
        2
    }

    fn required_child_props(
        &self,
        required: &RequiredProperties,
        child_index: usize,
        child_output: &ColumnSet,
    ) -> OptResult<RequiredProperties> {
        check_child_index("nested loop join", child_index, 2)?;
        let used = self.0.condition.used_columns();
        if child_index == 0 {
            Ok(pass_through(required, &used, child_output)
                .with_rewindability(Rewindability::None))
        } else {
            Ok(
                RequiredProperties::any(child_columns(required, &used, child_output))
                    .with_distribution(DistributionSpec::Replicated, DistributionMatching::Satisfy)
                    .with_rewindability(Rewindability::General),
            )
        }
    }

    fn derive_delivered(&self, inputs: &[&DeliveredProperties]) -> OptResult<DeliveredProperties> {
        let outer = delivered_input(inputs, 0)?;
        let inner = delivered_input(inputs, 1)?;
        Ok(DeliveredProperties::new(outer.distribution.clone())
            .with_order(outer.order.clone())
            .with_ctes(outer.ctes.combine(&inner.ctes)))
    }
}
