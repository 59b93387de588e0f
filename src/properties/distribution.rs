use std::fmt::{Display, Formatter};

use itertools::Itertools;
use strum_macros::Display as StrumDisplay;

use crate::expr::{ColumnId, ColumnSet};
use crate::properties::PhysicalProp;

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, StrumDisplay)]
pub enum SingletonKind {
    /// The coordinator node which returns results to the client.
    Coordinator,
    /// Any one worker.
    Worker,
}

/// Placement of rows across workers.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum DistributionSpec {
    /// No requirement. Never delivered by a plan.
    Any,
    /// All rows on one node.
    Singleton(SingletonKind),
    /// Rows hashed on the given columns.
    Hashed(Vec<ColumnId>),
    /// Rows spread without any known placement.
    Random,
    /// Every worker holds all rows.
    Replicated,
    /// Rows are available wherever needed, e.g. constant tables.
    Universal,
}

impl DistributionSpec {
    pub fn used_columns(&self) -> ColumnSet {
        match self {
            DistributionSpec::Hashed(columns) => columns.iter().collect(),
            _ => ColumnSet::new(),
        }
    }

    pub fn is_singleton(&self) -> bool {
        matches!(self, DistributionSpec::Singleton(_))
    }

    /// Hashed distribution whose columns form a subset of `required`'s columns. Rows equal on
    /// the required columns are then co-located as well.
    fn is_hashed_subset_of(&self, required: &DistributionSpec) -> bool {
        match (self, required) {
            (DistributionSpec::Hashed(delivered), DistributionSpec::Hashed(required)) => {
                !delivered.is_empty() && delivered.iter().all(|c| required.contains(c))
            }
            _ => false,
        }
    }
}

impl PhysicalProp for DistributionSpec {
    fn satisfies(&self, required: &Self) -> bool {
        if self == required {
            return true;
        }

        match required {
            DistributionSpec::Any => true,
            DistributionSpec::Singleton(_) => matches!(self, DistributionSpec::Universal),
            DistributionSpec::Hashed(_) => self.is_hashed_subset_of(required),
            DistributionSpec::Random => {
                matches!(self, DistributionSpec::Hashed(_) | DistributionSpec::Universal)
            }
            DistributionSpec::Replicated => matches!(self, DistributionSpec::Universal),
            DistributionSpec::Universal => false,
        }
    }
}

impl Display for DistributionSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DistributionSpec::Any => write!(f, "ANY"),
            DistributionSpec::Singleton(kind) => write!(f, "SINGLETON({})", kind),
            DistributionSpec::Hashed(columns) => write!(f, "HASHED({})", columns.iter().join(", ")),
            DistributionSpec::Random => write!(f, "RANDOM"),
            DistributionSpec::Replicated => write!(f, "REPLICATED"),
            DistributionSpec::Universal => write!(f, "UNIVERSAL"),
        }
    }
}

/// How a required distribution is matched against a delivered one.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, StrumDisplay)]
pub enum DistributionMatching {
    /// Delivered must be equal to required.
    Exact,
    /// Delivered must satisfy required.
    Satisfy,
    /// Delivered hashed columns must be a subset of required hashed columns.
    Subset,
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct EnforcedDistribution {
    pub spec: DistributionSpec,
    pub matching: DistributionMatching,
}

impl EnforcedDistribution {
    pub fn new(spec: DistributionSpec, matching: DistributionMatching) -> Self {
        Self { spec, matching }
    }

    pub fn any() -> Self {
        Self::new(DistributionSpec::Any, DistributionMatching::Satisfy)
    }

    pub fn is_satisfied_by(&self, delivered: &DistributionSpec) -> bool {
        match self.matching {
            DistributionMatching::Exact => {
                self.spec == DistributionSpec::Any || delivered == &self.spec
            }
            DistributionMatching::Satisfy => delivered.satisfies(&self.spec),
            DistributionMatching::Subset => match &self.spec {
                DistributionSpec::Hashed(_) => delivered.is_hashed_subset_of(&self.spec),
                _ => delivered.satisfies(&self.spec),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singleton_requirement() {
        let coordinator = DistributionSpec::Singleton(SingletonKind::Coordinator);
        assert!(coordinator.satisfies(&coordinator));
        assert!(DistributionSpec::Universal.satisfies(&coordinator));
        assert!(!DistributionSpec::Random.satisfies(&coordinator));
        assert!(!DistributionSpec::Singleton(SingletonKind::Worker).satisfies(&coordinator));
    }

    #[test]
    fn test_hashed_requirement() {
        let ab = DistributionSpec::Hashed(vec![ColumnId(1), ColumnId(2)]);
        let a = DistributionSpec::Hashed(vec![ColumnId(1)]);
        let c = DistributionSpec::Hashed(vec![ColumnId(3)]);

        assert!(a.satisfies(&ab));
        assert!(!ab.satisfies(&a));
        assert!(!c.satisfies(&ab));
        assert!(a.satisfies(&DistributionSpec::Random));
        assert!(a.satisfies(&DistributionSpec::Any));
    }

    #[test]
    fn test_matching_modes() {
        let ab = DistributionSpec::Hashed(vec![ColumnId(1), ColumnId(2)]);
        let a = DistributionSpec::Hashed(vec![ColumnId(1)]);

        let exact = EnforcedDistribution::new(ab.clone(), DistributionMatching::Exact);
        assert!(exact.is_satisfied_by(&ab));
        assert!(!exact.is_satisfied_by(&a));

        let subset = EnforcedDistribution::new(ab, DistributionMatching::Subset);
        assert!(subset.is_satisfied_by(&a));

        assert!(EnforcedDistribution::any().is_satisfied_by(&DistributionSpec::Random));
    }
}
