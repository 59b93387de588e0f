use std::fmt::{Display, Formatter};

use crate::properties::{CteMap, DistributionSpec, OrderSpec, Rewindability};

/// Physical properties a costed plan actually delivers.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct DeliveredProperties {
    pub order: OrderSpec,
    pub distribution: DistributionSpec,
    pub rewindability: Rewindability,
    pub ctes: CteMap,
}

impl DeliveredProperties {
    pub fn new(distribution: DistributionSpec) -> Self {
        Self {
            order: OrderSpec::any(),
            distribution,
            rewindability: Rewindability::None,
            ctes: CteMap::new(),
        }
    }

    pub fn with_order(mut self, order: OrderSpec) -> Self {
        self.order = order;
        self
    }

    pub fn with_rewindability(mut self, rewindability: Rewindability) -> Self {
        self.rewindability = rewindability;
        self
    }

    pub fn with_ctes(mut self, ctes: CteMap) -> Self {
        self.ctes = ctes;
        self
    }
}

impl Display for DeliveredProperties {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "order: {}, distribution: {}, rewindability: {}",
            self.order, self.distribution, self.rewindability
        )
    }
}
