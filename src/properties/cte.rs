use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use derive_more::From;
use itertools::Itertools;
use strum_macros::Display as StrumDisplay;

/// Identity of a common table expression.
#[derive(Copy, Clone, Debug, derive_more::Display, From, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[display(fmt = "cte{}", _0)]
pub struct CteId(pub u32);

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, StrumDisplay)]
pub enum CteKind {
    Producer,
    Consumer,
}

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct CteRequirementEntry {
    pub kind: CteKind,
    /// Optional entries only record that a plan may contain the cte.
    pub required: bool,
}

/// Common table expression obligations of a plan.
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq)]
pub struct CteRequirement {
    entries: BTreeMap<CteId, CteRequirementEntry>,
}

impl CteRequirement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: CteId, kind: CteKind, required: bool) {
        self.entries.insert(id, CteRequirementEntry { kind, required });
    }

    pub fn with_entry(mut self, id: CteId, kind: CteKind, required: bool) -> Self {
        self.insert(id, kind, required);
        self
    }

    pub fn get(&self, id: CteId) -> Option<&CteRequirementEntry> {
        self.entries.get(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = CteId> + '_ {
        self.entries.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn without(&self, id: CteId) -> CteRequirement {
        let mut ret = self.clone();
        ret.entries.remove(&id);
        ret
    }

    pub fn is_satisfied_by(&self, delivered: &CteMap) -> bool {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.required)
            .all(|(id, entry)| delivered.get(*id) == Some(entry.kind))
    }
}

impl Display for CteRequirement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}]",
            self.entries
                .iter()
                .map(|(id, e)| format!(
                    "{}:{}{}",
                    id,
                    e.kind,
                    if e.required { "" } else { "(opt)" }
                ))
                .join(", ")
        )
    }
}

/// Ctes produced or consumed inside a plan.
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq)]
pub struct CteMap {
    entries: BTreeMap<CteId, CteKind>,
}

impl CteMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, id: CteId, kind: CteKind) -> Self {
        self.entries.insert(id, kind);
        self
    }

    pub fn get(&self, id: CteId) -> Option<CteKind> {
        self.entries.get(&id).copied()
    }

    /// Combines maps of sibling subplans. A producer wins over a consumer of the same cte.
    pub fn combine(&self, other: &CteMap) -> CteMap {
        let mut entries = self.entries.clone();
        for (id, kind) in &other.entries {
            entries
                .entry(*id)
                .and_modify(|k| {
                    if *kind == CteKind::Producer {
                        *k = CteKind::Producer;
                    }
                })
                .or_insert(*kind);
        }
        CteMap { entries }
    }

    /// A producer together with its consumers is self contained, so both disappear from the
    /// map of a sequence over them.
    pub fn without(&self, id: CteId) -> CteMap {
        let mut ret = self.clone();
        ret.entries.remove(&id);
        ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_entries_only() {
        let req = CteRequirement::new()
            .with_entry(CteId(1), CteKind::Producer, true)
            .with_entry(CteId(2), CteKind::Producer, false);

        assert!(!req.is_satisfied_by(&CteMap::new()));
        assert!(req.is_satisfied_by(&CteMap::new().with_entry(CteId(1), CteKind::Producer)));
        assert!(!req.is_satisfied_by(&CteMap::new().with_entry(CteId(1), CteKind::Consumer)));
    }

    #[test]
    fn test_combine_prefers_producer() {
        let left = CteMap::new().with_entry(CteId(1), CteKind::Consumer);
        let right = CteMap::new().with_entry(CteId(1), CteKind::Producer);
        assert_eq!(Some(CteKind::Producer), left.combine(&right).get(CteId(1)));
    }
}
