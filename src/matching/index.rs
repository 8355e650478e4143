// src/matching/index.rs

use log::warn;
use std::collections::HashMap;

use crate::matching::normalize::{normalize, NormalizedKey};
use crate::models::CanonicalEntity;

/// Lookup structures over the canonical registry, built once per run.
///
/// Holds references into the caller's registry slice; canonical entities are
/// never copied. Insertion order of `fuzzy_entries` follows registry order,
/// which makes fuzzy tie-breaks deterministic for a fixed registry load.
pub struct CandidateIndex<'a> {
    spaced: HashMap<String, &'a CanonicalEntity>,
    no_space: HashMap<String, &'a CanonicalEntity>,
    fuzzy_entries: Vec<(String, &'a CanonicalEntity)>,
}

impl<'a> CandidateIndex<'a> {
    /// Normalizes every registry entry once and builds both exact maps plus
    /// the ordered fuzzy list. O(n) construction, O(1) exact lookups.
    ///
    /// When two entities normalize to the same key the first writer wins;
    /// the collision is logged because it is a registry quality risk, not a
    /// condition this component can resolve.
    pub fn build(registry: &'a [CanonicalEntity]) -> Self {
        let mut spaced = HashMap::with_capacity(registry.len());
        let mut no_space = HashMap::with_capacity(registry.len());
        let mut fuzzy_entries = Vec::with_capacity(registry.len());

        for entity in registry {
            let key = normalize(Some(&entity.name));
            if key.is_empty() {
                warn!(
                    "Registry entry {} ('{}') normalizes to empty, excluded from index",
                    entity.id, entity.name
                );
                continue;
            }
            match spaced.entry(key.spaced.clone()) {
                std::collections::hash_map::Entry::Vacant(slot) => {
                    slot.insert(entity);
                    fuzzy_entries.push((key.spaced.clone(), entity));
                }
                std::collections::hash_map::Entry::Occupied(existing) => {
                    warn!(
                        "Registry key collision on '{}': {} shadowed by {}",
                        key.spaced,
                        entity.id,
                        existing.get().id
                    );
                }
            }
            no_space.entry(key.no_space).or_insert(entity);
        }

        CandidateIndex {
            spaced,
            no_space,
            fuzzy_entries,
        }
    }

    pub fn lookup_spaced(&self, key: &NormalizedKey) -> Option<&'a CanonicalEntity> {
        if key.is_empty() {
            return None;
        }
        self.spaced.get(&key.spaced).copied()
    }

    pub fn lookup_no_space(&self, key: &NormalizedKey) -> Option<&'a CanonicalEntity> {
        if key.is_empty() {
            return None;
        }
        self.no_space.get(&key.no_space).copied()
    }

    /// Normalized keys and their entities in registry order, for fuzzy scans.
    pub fn fuzzy_entries(&self) -> &[(String, &'a CanonicalEntity)] {
        &self.fuzzy_entries
    }

    pub fn len(&self) -> usize {
        self.fuzzy_entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fuzzy_entries.is_empty()
    }
}
