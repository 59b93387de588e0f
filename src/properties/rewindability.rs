use strum_macros::Display as StrumDisplay;

use crate::properties::PhysicalProp;

/// Whether a stream can be re-read from the start.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, StrumDisplay)]
pub enum Rewindability {
    #[strum(serialize = "NON-REWINDABLE")]
    None,
    #[strum(serialize = "MARK-RESTORE")]
    MarkRestore,
    #[strum(serialize = "REWINDABLE")]
    General,
}

impl PhysicalProp for Rewindability {
    fn satisfies(&self, required: &Self) -> bool {
        self == required
            || *required == Rewindability::None
            || (*self == Rewindability::MarkRestore && *required == Rewindability::General)
    }
}

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum RewindabilityMatching {
    Satisfy,
}

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct EnforcedRewindability {
    pub spec: Rewindability,
    pub matching: RewindabilityMatching,
}

impl EnforcedRewindability {
    pub fn new(spec: Rewindability) -> Self {
        Self {
            spec,
            matching: RewindabilityMatching::Satisfy,
        }
    }

    pub fn is_satisfied_by(&self, delivered: &Rewindability) -> bool {
        match self.matching {
            RewindabilityMatching::Satisfy => delivered.satisfies(&self.spec),
        }
    }
}
