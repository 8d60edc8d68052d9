//! Prefix-sum cache of cumulative histograms.
//!
//! Entries are addressed by `(ScaledIndex, dimension name)`. Indices are only
//! comparable within one active dimension's index space, so the whole store
//! is dropped whenever the active dimension changes.

use super::histogram::CumulativeHistogram;
use crate::scale::ScaledIndex;
use ahash::AHashMap;

/// Result of a single-dimension lookup
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup<'a> {
    pub hit: bool,
    pub data: Option<&'a CumulativeHistogram>,
}

/// Result of an all-dimension lookup
#[derive(Debug, Clone, PartialEq)]
pub struct LookupAll<'a> {
    /// True only when every expected dimension has an entry
    pub hit: bool,
    /// Whatever entries exist at the index, even on a miss
    pub data: Vec<(&'a str, &'a CumulativeHistogram)>,
}

/// Two-level store: index -> dimension name -> cumulative histogram.
#[derive(Debug, Clone)]
pub struct RangeCache {
    entries: AHashMap<ScaledIndex, AHashMap<String, CumulativeHistogram>>,
    /// All dimension names, in configuration order
    tracked: Vec<String>,
    /// Dimension whose index space the entries live in
    active: String,
    /// Bumped on every invalidation
    generation: u64,
}

impl RangeCache {
    pub fn new(tracked: Vec<String>, active: impl Into<String>) -> Self {
        RangeCache {
            entries: AHashMap::new(),
            tracked,
            active: active.into(),
            generation: 0,
        }
    }

    /// Verify all invariants hold for this cache
    #[cfg(debug_assertions)]
    pub fn verify_invariants(&self) {
        debug_assert!(
            self.tracked.iter().any(|name| *name == self.active),
            "Invariant violated: active dimension '{}' is not tracked",
            self.active
        );
        for (index, per_dimension) in &self.entries {
            debug_assert!(
                !per_dimension.is_empty(),
                "Invariant violated: empty bucket left at index {}",
                index
            );
        }
    }

    #[cfg(not(debug_assertions))]
    #[inline(always)]
    pub fn verify_invariants(&self) {}

    pub fn get(&self, index: ScaledIndex, dimension: &str) -> Lookup<'_> {
        let data = self
            .entries
            .get(&index)
            .and_then(|per_dimension| per_dimension.get(dimension));
        Lookup {
            hit: data.is_some(),
            data,
        }
    }

    pub fn get_all(&self, index: ScaledIndex) -> LookupAll<'_> {
        let data: Vec<(&str, &CumulativeHistogram)> = match self.entries.get(&index) {
            Some(per_dimension) => self
                .expected()
                .filter_map(|name| per_dimension.get(name).map(|hist| (name, hist)))
                .collect(),
            None => Vec::new(),
        };
        LookupAll {
            hit: data.len() == self.expected().count(),
            data,
        }
    }

    /// Store an entry, replacing any previous one for the same key
    pub fn set(&mut self, index: ScaledIndex, dimension: impl Into<String>, data: CumulativeHistogram) {
        self.entries
            .entry(index)
            .or_default()
            .insert(dimension.into(), data);
        self.verify_invariants();
    }

    /// True when every dimension other than the active one has an entry at `index`
    pub fn has_full_data(&self, index: ScaledIndex) -> bool {
        match self.entries.get(&index) {
            Some(per_dimension) => self.expected().all(|name| per_dimension.contains_key(name)),
            None => self.expected().next().is_none(),
        }
    }

    /// Drop every entry
    pub fn invalidate(&mut self) {
        self.entries = AHashMap::new();
        self.generation += 1;
    }

    /// Point the cache at a new active dimension's index space, dropping
    /// all entries
    pub fn retarget(&mut self, active: &str) {
        self.active = active.to_string();
        self.invalidate();
        self.verify_invariants();
    }

    pub fn active(&self) -> &str {
        &self.active
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of stored (index, dimension) entries
    pub fn len(&self) -> usize {
        self.entries.values().map(|per_dimension| per_dimension.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dimensions expected at every fully populated index
    pub fn expected(&self) -> impl Iterator<Item = &str> + '_ {
        self.tracked
            .iter()
            .map(String::as_str)
            .filter(move |name| *name != self.active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> RangeCache {
        RangeCache::new(vec!["x".into(), "y".into(), "z".into()], "x")
    }

    fn hist(values: &[f64]) -> CumulativeHistogram {
        CumulativeHistogram::new(values.to_vec())
    }

    #[test]
    fn test_get_miss_then_hit() {
        let mut cache = cache();
        assert!(!cache.get(ScaledIndex(3), "y").hit);

        cache.set(ScaledIndex(3), "y", hist(&[1.0, 2.0]));
        let lookup = cache.get(ScaledIndex(3), "y");
        assert!(lookup.hit);
        assert_eq!(lookup.data, Some(&hist(&[1.0, 2.0])));
        assert!(!cache.get(ScaledIndex(4), "y").hit);
        assert!(!cache.get(ScaledIndex(3), "z").hit);
    }

    #[test]
    fn test_set_is_last_writer_wins_and_idempotent() {
        let mut cache = cache();
        cache.set(ScaledIndex(1), "y", hist(&[1.0]));
        cache.set(ScaledIndex(1), "y", hist(&[5.0]));
        assert_eq!(cache.get(ScaledIndex(1), "y").data, Some(&hist(&[5.0])));

        cache.set(ScaledIndex(1), "y", hist(&[5.0]));
        assert_eq!(cache.get(ScaledIndex(1), "y").data, Some(&hist(&[5.0])));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_all_requires_every_non_active_dimension() {
        let mut cache = cache();
        cache.set(ScaledIndex(7), "y", hist(&[1.0]));

        let partial = cache.get_all(ScaledIndex(7));
        assert!(!partial.hit);
        assert_eq!(partial.data.len(), 1);
        assert!(!cache.has_full_data(ScaledIndex(7)));

        cache.set(ScaledIndex(7), "z", hist(&[2.0]));
        let full = cache.get_all(ScaledIndex(7));
        assert!(full.hit);
        assert_eq!(full.data, vec![("y", &hist(&[1.0])), ("z", &hist(&[2.0]))]);
        assert!(cache.has_full_data(ScaledIndex(7)));
    }

    #[test]
    fn test_active_dimension_entries_do_not_count() {
        let mut cache = cache();
        cache.set(ScaledIndex(2), "x", hist(&[1.0]));
        cache.set(ScaledIndex(2), "y", hist(&[1.0]));
        assert!(!cache.has_full_data(ScaledIndex(2)));
        assert_eq!(cache.get_all(ScaledIndex(2)).data.len(), 1);
    }

    #[test]
    fn test_invalidate_clears_everything() {
        let mut cache = cache();
        for i in 0..10 {
            cache.set(ScaledIndex(i), "y", hist(&[i as f64]));
            cache.set(ScaledIndex(i), "z", hist(&[i as f64]));
        }
        let before = cache.generation();
        cache.invalidate();
        assert!(cache.is_empty());
        assert_eq!(cache.generation(), before + 1);
        for i in 0..10 {
            assert!(!cache.get(ScaledIndex(i), "y").hit);
            assert!(!cache.get(ScaledIndex(i), "z").hit);
        }
    }

    #[test]
    fn test_retarget_changes_expected_dimensions() {
        let mut cache = cache();
        cache.set(ScaledIndex(0), "y", hist(&[1.0]));
        cache.retarget("y");
        assert!(cache.is_empty());
        assert_eq!(cache.active(), "y");
        assert_eq!(cache.expected().collect::<Vec<_>>(), vec!["x", "z"]);
    }

    #[test]
    fn test_single_dimension_is_always_full() {
        let cache = RangeCache::new(vec!["only".into()], "only");
        assert!(cache.has_full_data(ScaledIndex(0)));
        assert!(cache.get_all(ScaledIndex(0)).hit);
    }
}
