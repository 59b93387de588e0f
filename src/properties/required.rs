use std::fmt::{Display, Formatter};

use crate::error::OptResult;
use crate::expr::ColumnSet;
use crate::operator::{PhysicalOperator, PhysicalOperatorTrait};
use crate::properties::{
    CteRequirement, DeliveredProperties, DistributionMatching, DistributionSpec,
    EnforcedDistribution, EnforcedOrder, EnforcedRewindability, OrderSpec, Rewindability,
};

/// What a consumer needs from the plan producing its input.
///
/// Required properties are immutable. The whole value, compared structurally, identifies an
/// optimization request against a group, so it is used directly as the key of optimization
/// contexts.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct RequiredProperties {
    columns: ColumnSet,
    order: EnforcedOrder,
    distribution: EnforcedDistribution,
    rewindability: EnforcedRewindability,
    ctes: CteRequirement,
}

impl RequiredProperties {
    pub fn new(
        columns: ColumnSet,
        order: EnforcedOrder,
        distribution: EnforcedDistribution,
        rewindability: EnforcedRewindability,
        ctes: CteRequirement,
    ) -> Self {
        Self {
            columns,
            order,
            distribution,
            rewindability,
            ctes,
        }
    }

    /// Requires only `columns`, everything else is left open.
    pub fn any(columns: ColumnSet) -> Self {
        Self::new(
            columns,
            EnforcedOrder::new(OrderSpec::any()),
            EnforcedDistribution::any(),
            EnforcedRewindability::new(Rewindability::None),
            CteRequirement::new(),
        )
    }

    pub fn with_order(mut self, order: OrderSpec) -> Self {
        self.order = EnforcedOrder::new(order);
        self
    }

    pub fn with_distribution(
        mut self,
        distribution: DistributionSpec,
        matching: DistributionMatching,
    ) -> Self {
        self.distribution = EnforcedDistribution::new(distribution, matching);
        self
    }

    pub fn with_rewindability(mut self, rewindability: Rewindability) -> Self {
        self.rewindability = EnforcedRewindability::new(rewindability);
        self
    }

    pub fn with_ctes(mut self, ctes: CteRequirement) -> Self {
        self.ctes = ctes;
        self
    }

    pub fn with_columns(mut self, columns: ColumnSet) -> Self {
        self.columns = columns;
        self
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    pub fn order(&self) -> &EnforcedOrder {
        &self.order
    }

    pub fn distribution(&self) -> &EnforcedDistribution {
        &self.distribution
    }

    pub fn rewindability(&self) -> &EnforcedRewindability {
        &self.rewindability
    }

    pub fn ctes(&self) -> &CteRequirement {
        &self.ctes
    }

    /// Requirement for child `child_index` of `operator` when `operator` must satisfy `self`.
    ///
    /// This is a pure function of its arguments.
    pub fn derive_for_child(
        &self,
        operator: &PhysicalOperator,
        child_index: usize,
        child_output: &ColumnSet,
    ) -> OptResult<RequiredProperties> {
        operator.required_child_props(self, child_index, child_output)
    }

    /// Checks a plan delivering `delivered` and producing `output_columns` against `self`.
    pub fn is_satisfied_by(&self, delivered: &DeliveredProperties, output_columns: &ColumnSet) -> bool {
        self.columns.is_subset(output_columns)
            && self.order.is_satisfied_by(&delivered.order)
            && self.distribution.is_satisfied_by(&delivered.distribution)
            && self.rewindability.is_satisfied_by(&delivered.rewindability)
            && self.ctes.is_satisfied_by(&delivered.ctes)
    }
}

impl Display for RequiredProperties {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{columns: {}, order: {}, distribution: {} {}, rewindability: {}, ctes: {}}}",
            self.columns,
            self.order.spec,
            self.distribution.matching,
            self.distribution.spec,
            self.rewindability.spec,
            self.ctes
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ColumnId;
    use crate::properties::{CteId, CteKind, CteMap, SingletonKind, SortKey};

    fn columns(ids: &[u32]) -> ColumnSet {
        ids.iter().map(|id| ColumnId(*id)).collect()
    }

    #[test]
    fn test_satisfied_by_delivered() {
        let required = RequiredProperties::any(columns(&[1, 2]))
            .with_order(OrderSpec::new(vec![SortKey::asc(ColumnId(1))]))
            .with_distribution(
                DistributionSpec::Singleton(SingletonKind::Coordinator),
                DistributionMatching::Satisfy,
            );

        let delivered = DeliveredProperties::new(DistributionSpec::Singleton(
            SingletonKind::Coordinator,
        ))
        .with_order(OrderSpec::new(vec![
            SortKey::asc(ColumnId(1)),
            SortKey::asc(ColumnId(2)),
        ]));

        assert!(required.is_satisfied_by(&delivered, &columns(&[1, 2, 3])));
        assert!(!required.is_satisfied_by(&delivered, &columns(&[1])));

        let unordered = delivered.clone().with_order(OrderSpec::any());
        assert!(!required.is_satisfied_by(&unordered, &columns(&[1, 2])));

        let mut random = delivered;
        random.distribution = DistributionSpec::Random;
        assert!(!required.is_satisfied_by(&random, &columns(&[1, 2])));
    }

    #[test]
    fn test_cte_requirement() {
        let required = RequiredProperties::any(ColumnSet::new()).with_ctes(
            CteRequirement::new().with_entry(CteId(7), CteKind::Producer, true),
        );
        let delivered = DeliveredProperties::new(DistributionSpec::Random);
        assert!(!required.is_satisfied_by(&delivered, &ColumnSet::new()));

        let delivered =
            delivered.with_ctes(CteMap::new().with_entry(CteId(7), CteKind::Producer));
        assert!(required.is_satisfied_by(&delivered, &ColumnSet::new()));
    }

    #[test]
    fn test_structural_identity() {
        let a = RequiredProperties::any(columns(&[1])).with_rewindability(Rewindability::General);
        let b = RequiredProperties::any(columns(&[1])).with_rewindability(Rewindability::General);
        let c = RequiredProperties::any(columns(&[1]));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
