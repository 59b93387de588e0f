use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use derive_more::{Add, From};

/// Cost of a (sub)plan as produced by the costing model.
///
/// The memo is agnostic to cost units and only compares values. `NaN` is never a valid cost.
#[derive(Copy, Clone, Debug, PartialEq, From, Add)]
pub struct Cost(f64);

impl Cost {
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(0.0)
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn is_valid(&self) -> bool {
        !self.0.is_nan()
    }
}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.0.partial_cmp(&other.0)
    }
}

impl Display for Cost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}
