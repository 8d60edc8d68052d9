//! Query coordinator
//!
//! Owns the active dimension and the last brush range of every dimension,
//! and resolves brush events against the range cache. Cache misses become
//! transport requests; results arriving later are filtered against the
//! *current* active dimension, stored, and emitted once both boundaries of
//! the current range are present.
//!
//! ## State machine
//!
//! ```text
//!            set_state(d, r), d == active
//!           ┌──────────────┐
//!           ▼              │
//!      Active(a) ──────────┘
//!           │
//!           │ set_state(d, r), d != active
//!           ▼
//!   invalidate cache, Active(d)
//! ```
//!
//! `set_active_dimension` is the only transition that changes the active
//! dimension, and the only one that drops cached boundaries because of it.

use super::consumer::{FnConsumer, ResultConsumer};
use super::error::CoordinatorError;
use super::message::{ResolutionSpec, ResultMessage, TransportMessage};
use super::transport::Transport;
use crate::cache::{combine_ranges, Combined, IntegrityWarning, RangeCache};
use crate::config::{CoordinatorConfig, LookupMode};
use crate::dimension::{Dimension, Interval};
use crate::scale::{ScaleRegistry, ScaledIndex};
use ahash::AHashMap;
use tracing::{debug, error, info, warn};

/// Outcome of a brush event
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub active_dimension: String,
    /// Cache indices of the brushed range
    pub scaled_range: (ScaledIndex, ScaledIndex),
    /// Dimensions answered from cache, in configuration order
    pub emitted: Vec<String>,
    /// Dimensions still waiting on at least one boundary
    pub pending: Vec<String>,
    pub warnings: Vec<IntegrityWarning>,
    /// Active dimension changed (and the cache was dropped)
    pub switched: bool,
    /// A `setRange` request went to the transport
    pub request_sent: bool,
}

impl Resolution {
    /// Every other dimension was answered from cache
    pub fn is_hit(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Outcome of result intake
#[derive(Debug, Clone, PartialEq)]
pub enum ResultOutcome {
    /// Computed for a dimension that is no longer active; dropped
    Stale,
    /// Names a dimension this coordinator does not know; dropped
    UnknownDimension,
    /// Cached, but the current range still misses a boundary
    Stored,
    /// Cached and completed the current range for its dimension
    Emitted { warning: Option<IntegrityWarning> },
}

/// Outcome of a point request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Sent(ScaledIndex),
    /// Every dimension was already cached at this index
    Cached(ScaledIndex),
}

pub struct QueryCoordinator<T: Transport> {
    dimensions: Vec<Dimension>,
    scales: ScaleRegistry,
    cache: RangeCache,
    active_dimension: String,
    ranges: AHashMap<String, Interval>,
    lookup: LookupMode,
    transport: T,
    consumer: Option<Box<dyn ResultConsumer>>,
}

impl<T: Transport> QueryCoordinator<T> {
    /// Build a coordinator over `dimensions`. The first dimension starts
    /// active and every range starts at its dimension's full domain.
    pub fn new(
        dimensions: Vec<Dimension>,
        config: &CoordinatorConfig,
        transport: T,
    ) -> Result<Self, CoordinatorError> {
        let first = dimensions
            .first()
            .ok_or(CoordinatorError::NoDimensions)?
            .name()
            .to_string();

        let mut scales = ScaleRegistry::new(config.default_resolution);
        let mut ranges = AHashMap::new();
        for dimension in &dimensions {
            if ranges.insert(dimension.name().to_string(), dimension.range()).is_some() {
                return Err(CoordinatorError::DuplicateDimension(dimension.name().to_string()));
            }
            scales.configure(dimension, config.resolution_for(dimension.name()))?;
        }
        if let Some(unknown) = config.resolutions.keys().find(|name| !ranges.contains_key(*name)) {
            return Err(CoordinatorError::UnknownDimension(unknown.clone()));
        }

        let names = dimensions.iter().map(|d| d.name().to_string()).collect();
        let coordinator = QueryCoordinator {
            cache: RangeCache::new(names, first.clone()),
            dimensions,
            scales,
            active_dimension: first,
            ranges,
            lookup: config.lookup,
            transport,
            consumer: None,
        };
        coordinator.verify_invariants();
        Ok(coordinator)
    }

    /// Verify all invariants hold for this coordinator
    #[cfg(debug_assertions)]
    pub fn verify_invariants(&self) {
        debug_assert!(
            self.dimension(&self.active_dimension).is_some(),
            "Invariant violated: active dimension '{}' is not configured",
            self.active_dimension
        );
        debug_assert_eq!(
            self.cache.active(),
            self.active_dimension,
            "Invariant violated: cache scoped to a different dimension"
        );
        for dimension in &self.dimensions {
            debug_assert!(
                self.ranges.contains_key(dimension.name()),
                "Invariant violated: no range recorded for '{}'",
                dimension.name()
            );
            debug_assert!(
                self.scales.get(dimension.name()).is_some(),
                "Invariant violated: no scale for '{}'",
                dimension.name()
            );
        }
    }

    #[cfg(not(debug_assertions))]
    #[inline(always)]
    pub fn verify_invariants(&self) {}

    /// Register the consumer for combined histograms, replacing any previous one
    pub fn set_consumer(&mut self, consumer: Box<dyn ResultConsumer>) {
        self.consumer = Some(consumer);
    }

    /// Register a closure as the consumer
    pub fn on_result<F>(&mut self, callback: F)
    where
        F: FnMut(&str, &[f64]) + Send + 'static,
    {
        self.set_consumer(Box::new(FnConsumer::new(callback)));
    }

    /// Resize index spaces and announce every dimension's effective
    /// resolution to the transport. Drops the cache: indices produced under
    /// different resolutions are not comparable.
    pub fn init(&mut self, resolutions: &[ResolutionSpec]) -> Result<(), CoordinatorError> {
        // Resize on a copy so a rejected entry leaves scales and cache as they were
        let mut scales = self.scales.clone();
        for requested in resolutions {
            let dimension = self
                .dimensions
                .iter()
                .find(|d| d.name() == requested.dimension)
                .ok_or_else(|| CoordinatorError::UnknownDimension(requested.dimension.clone()))?;
            scales.configure(dimension, Some(requested.value))?;
        }
        self.scales = scales;
        self.cache.invalidate();

        let effective: Vec<ResolutionSpec> = self
            .dimensions
            .iter()
            .filter_map(|d| {
                self.scales
                    .resolution(d.name())
                    .map(|value| ResolutionSpec::new(d.name(), value))
            })
            .collect();
        info!("Initializing resolutions: {:?}", effective);
        self.transport.send(TransportMessage::Init {
            resolutions: effective,
        });
        self.verify_invariants();
        Ok(())
    }

    /// Make `dimension` active. Switching drops the whole cache; re-selecting
    /// the active dimension is a no-op. Returns whether a switch happened.
    pub fn set_active_dimension(&mut self, dimension: &str) -> Result<bool, CoordinatorError> {
        self.require_dimension(dimension)?;
        if dimension == self.active_dimension {
            return Ok(false);
        }

        info!(
            "Active dimension {} -> {}, dropping {} cached boundaries",
            self.active_dimension,
            dimension,
            self.cache.len()
        );
        self.cache.retarget(dimension);
        self.active_dimension = dimension.to_string();
        self.verify_invariants();
        Ok(true)
    }

    /// Brush moved: record the range and answer what the cache can.
    pub fn set_state(
        &mut self,
        dimension: &str,
        range: Interval,
    ) -> Result<Resolution, CoordinatorError> {
        let switched = self.set_active_dimension(dimension)?;
        self.ranges.insert(dimension.to_string(), range);

        let (low, high) = self.scaled_range(dimension)?;
        let mut resolution = Resolution {
            active_dimension: dimension.to_string(),
            scaled_range: (low, high),
            emitted: Vec::new(),
            pending: Vec::new(),
            warnings: Vec::new(),
            switched,
            request_sent: false,
        };

        let (ready, pending) = self.collect_ready(low, high);
        resolution.pending = pending;
        for (other, combined) in ready {
            let combined = combined.map_err(|source| {
                error!("Combine failed for '{}' at [{}, {}]: {}", other, low, high, source);
                CoordinatorError::Combine {
                    dimension: other.clone(),
                    source,
                }
            })?;
            if let Some(warning) = self.emit(&other, low, high, combined) {
                resolution.warnings.push(warning);
            }
            resolution.emitted.push(other);
        }

        if resolution.pending.is_empty() {
            debug!("Cache hit for {} [{}, {}]", dimension, low, high);
        } else {
            debug!(
                "Cache miss for {} [{}, {}], waiting on {:?}",
                dimension, low, high, resolution.pending
            );
        }
        Ok(resolution)
    }

    /// `set_state`, then always ask the engine to compute the range so
    /// coverage keeps improving even when the cache answered.
    pub fn set_range(
        &mut self,
        dimension: &str,
        range: Interval,
    ) -> Result<Resolution, CoordinatorError> {
        let mut resolution = self.set_state(dimension, range)?;
        self.transport.send(TransportMessage::SetRange {
            dimension: dimension.to_string(),
            range,
        });
        resolution.request_sent = true;
        Ok(resolution)
    }

    /// Brush-range-changed from a chart, with raw endpoints
    pub fn brush(
        &mut self,
        dimension: &str,
        low: f64,
        high: f64,
    ) -> Result<Resolution, CoordinatorError> {
        let range = Interval::new(low, high)?;
        self.set_range(dimension, range)
    }

    /// Request the boundary at `value` immediately, unless it is fully cached.
    ///
    /// The cache only describes the active dimension's index space, so
    /// requests for any other dimension are always sent.
    pub fn load(&mut self, dimension: &str, value: f64) -> Result<LoadOutcome, CoordinatorError> {
        let index = self.scale_value(dimension, value)?;
        if dimension == self.active_dimension && self.cache.has_full_data(index) {
            debug!("Skipping load of {} at {}: fully cached", dimension, index);
            return Ok(LoadOutcome::Cached(index));
        }
        self.transport.send(TransportMessage::Load {
            dimension: dimension.to_string(),
            value: index,
        });
        Ok(LoadOutcome::Sent(index))
    }

    /// Hint that the boundary at `value` will likely be needed. Always sent.
    pub fn preload(&mut self, dimension: &str, value: f64) -> Result<LoadOutcome, CoordinatorError> {
        let index = self.scale_value(dimension, value)?;
        self.transport.send(TransportMessage::Preload {
            dimension: dimension.to_string(),
            value: index,
        });
        Ok(LoadOutcome::Sent(index))
    }

    /// Result intake. Everything is checked against the coordinator's state
    /// at arrival time, not at request time.
    pub fn handle_result(
        &mut self,
        result: ResultMessage,
    ) -> Result<ResultOutcome, CoordinatorError> {
        if result.active_dimension != self.active_dimension {
            debug!(
                "Dropping stale result for {} at {} (computed for {}, active is {})",
                result.dimension, result.index, result.active_dimension, self.active_dimension
            );
            return Ok(ResultOutcome::Stale);
        }
        if self.dimension(&result.dimension).is_none() {
            warn!("Dropping result for unknown dimension '{}'", result.dimension);
            return Ok(ResultOutcome::UnknownDimension);
        }

        let ResultMessage {
            dimension,
            index,
            data,
            ..
        } = result;
        self.cache.set(index, dimension.clone(), data);

        let active = self.active_dimension.clone();
        let (low, high) = self.scaled_range(&active)?;
        let combined = match self.combine_boundaries(&dimension, low, high) {
            Some(combined) => combined.map_err(|source| {
                error!("Combine failed for '{}' at [{}, {}]: {}", dimension, low, high, source);
                CoordinatorError::Combine {
                    dimension: dimension.clone(),
                    source,
                }
            })?,
            None => return Ok(ResultOutcome::Stored),
        };

        let warning = self.emit(&dimension, low, high, combined);
        Ok(ResultOutcome::Emitted { warning })
    }

    /// Combine every other dimension whose boundaries are both cached.
    /// Returns (ready, pending) in configuration order.
    fn collect_ready(
        &self,
        low: ScaledIndex,
        high: ScaledIndex,
    ) -> (Vec<(String, Result<Combined, crate::cache::CombineError>)>, Vec<String>) {
        let mut ready = Vec::new();
        let mut pending = Vec::new();

        match self.lookup {
            LookupMode::PerDimension => {
                for other in self.cache.expected() {
                    match self.combine_boundaries(other, low, high) {
                        Some(combined) => ready.push((other.to_string(), combined)),
                        None => pending.push(other.to_string()),
                    }
                }
            }
            LookupMode::AllDimensions => {
                let low_all = self.cache.get_all(low);
                let high_all = self.cache.get_all(high);
                if low_all.hit && high_all.hit {
                    for ((name, low_hist), (_, high_hist)) in low_all.data.iter().zip(&high_all.data) {
                        ready.push((name.to_string(), combine_ranges(low_hist, high_hist)));
                    }
                } else {
                    pending = self.cache.expected().map(str::to_string).collect();
                }
            }
        }

        (ready, pending)
    }

    fn combine_boundaries(
        &self,
        dimension: &str,
        low: ScaledIndex,
        high: ScaledIndex,
    ) -> Option<Result<Combined, crate::cache::CombineError>> {
        let low_hist = self.cache.get(low, dimension).data?;
        let high_hist = self.cache.get(high, dimension).data?;
        Some(combine_ranges(low_hist, high_hist))
    }

    /// Deliver a combined histogram; returns the integrity warning, if any
    fn emit(
        &mut self,
        dimension: &str,
        low: ScaledIndex,
        high: ScaledIndex,
        combined: Combined,
    ) -> Option<IntegrityWarning> {
        let warning = if combined.is_monotonic() {
            None
        } else {
            let warning = IntegrityWarning {
                active_dimension: self.active_dimension.clone(),
                dimension: dimension.to_string(),
                low,
                high,
                negative_bins: combined.negative_bins.clone(),
            };
            warn!("{}", warning);
            Some(warning)
        };

        if let Some(consumer) = self.consumer.as_mut() {
            consumer.on_range_histogram(dimension, &combined.data);
            if let Some(warning) = &warning {
                consumer.on_integrity_warning(warning);
            }
        }
        warning
    }

    fn require_dimension(&self, dimension: &str) -> Result<&Dimension, CoordinatorError> {
        self.dimension(dimension)
            .ok_or_else(|| CoordinatorError::UnknownDimension(dimension.to_string()))
    }

    fn scale_value(&self, dimension: &str, value: f64) -> Result<ScaledIndex, CoordinatorError> {
        self.scales
            .scale(dimension, value)
            .ok_or_else(|| CoordinatorError::UnknownDimension(dimension.to_string()))
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name() == name)
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn active_dimension(&self) -> &str {
        &self.active_dimension
    }

    /// Last brush range recorded for `dimension`
    pub fn range(&self, dimension: &str) -> Option<Interval> {
        self.ranges.get(dimension).copied()
    }

    /// Cache indices of the last range recorded for `dimension`
    pub fn scaled_range(
        &self,
        dimension: &str,
    ) -> Result<(ScaledIndex, ScaledIndex), CoordinatorError> {
        let range = self
            .range(dimension)
            .ok_or_else(|| CoordinatorError::UnknownDimension(dimension.to_string()))?;
        self.scales
            .scale_interval(dimension, range)
            .ok_or_else(|| CoordinatorError::UnknownDimension(dimension.to_string()))
    }

    pub fn cache(&self) -> &RangeCache {
        &self.cache
    }

    pub fn scales(&self) -> &ScaleRegistry {
        &self.scales
    }

    pub fn lookup_mode(&self) -> LookupMode {
        self.lookup
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::consumer::CollectingConsumer;
    use crate::coordinator::transport::RecordingTransport;

    fn dim(name: &str, low: f64, high: f64, bins: u32) -> Dimension {
        Dimension::new(name, Interval::new(low, high).unwrap(), bins).unwrap()
    }

    fn coordinator() -> (QueryCoordinator<RecordingTransport>, CollectingConsumer) {
        let dims = vec![
            dim("x", 0.0, 100.0, 10),
            dim("y", 0.0, 10.0, 4),
            dim("z", -1.0, 1.0, 4),
        ];
        let mut coordinator =
            QueryCoordinator::new(dims, &CoordinatorConfig::test(), RecordingTransport::new()).unwrap();
        let consumer = CollectingConsumer::new();
        coordinator.set_consumer(Box::new(consumer.clone()));
        (coordinator, consumer)
    }

    fn interval(low: f64, high: f64) -> Interval {
        Interval::new(low, high).unwrap()
    }

    #[test]
    fn test_new_starts_on_first_dimension_with_full_ranges() {
        let (coordinator, _) = coordinator();
        assert_eq!(coordinator.active_dimension(), "x");
        assert_eq!(coordinator.range("y"), Some(interval(0.0, 10.0)));
        assert_eq!(coordinator.cache().active(), "x");
    }

    #[test]
    fn test_new_rejects_bad_dimension_sets() {
        let config = CoordinatorConfig::test();
        assert!(matches!(
            QueryCoordinator::new(Vec::new(), &config, RecordingTransport::new()),
            Err(CoordinatorError::NoDimensions)
        ));

        let dup = vec![dim("x", 0.0, 1.0, 2), dim("x", 0.0, 2.0, 2)];
        assert!(matches!(
            QueryCoordinator::new(dup, &config, RecordingTransport::new()),
            Err(CoordinatorError::DuplicateDimension(_))
        ));

        let mut config = CoordinatorConfig::test();
        config.resolutions.insert("ghost".into(), 10);
        assert!(matches!(
            QueryCoordinator::new(vec![dim("x", 0.0, 1.0, 2)], &config, RecordingTransport::new()),
            Err(CoordinatorError::UnknownDimension(_))
        ));
    }

    #[test]
    fn test_set_active_dimension_is_idempotent() {
        let (mut coordinator, _) = coordinator();
        coordinator
            .handle_result(ResultMessage::new("x", "y", ScaledIndex(5), vec![1.0; 4]))
            .unwrap();
        assert!(!coordinator.set_active_dimension("x").unwrap());
        assert_eq!(coordinator.cache().len(), 1);

        assert!(coordinator.set_active_dimension("y").unwrap());
        assert!(coordinator.cache().is_empty());
        assert!(!coordinator.cache().get(ScaledIndex(5), "y").hit);
    }

    #[test]
    fn test_unknown_dimension_rejected() {
        let (mut coordinator, _) = coordinator();
        let result = coordinator.set_range("w", interval(0.0, 1.0));
        assert_eq!(result, Err(CoordinatorError::UnknownDimension("w".into())));
        assert!(coordinator.transport().sent().is_empty());
        assert_eq!(coordinator.active_dimension(), "x");
    }

    #[test]
    fn test_brush_rejects_inverted_endpoints() {
        let (mut coordinator, _) = coordinator();
        let err = coordinator.brush("x", 80.0, 20.0).unwrap_err();
        assert!(matches!(err, CoordinatorError::InvalidDimension(_)));
        assert!(coordinator.transport().sent().is_empty());

        let resolution = coordinator.brush("x", 20.0, 80.0).unwrap();
        assert!(resolution.request_sent);
    }

    #[test]
    fn test_partial_boundary_hit_waits_for_both() {
        let (mut coordinator, consumer) = coordinator();
        coordinator.set_range("x", interval(20.0, 80.0)).unwrap();

        let outcome = coordinator
            .handle_result(ResultMessage::new("x", "y", ScaledIndex(20), vec![1.0; 4]))
            .unwrap();
        assert_eq!(outcome, ResultOutcome::Stored);
        assert_eq!(consumer.emission_count(), 0);

        let outcome = coordinator
            .handle_result(ResultMessage::new("x", "y", ScaledIndex(80), vec![3.0; 4]))
            .unwrap();
        assert_eq!(outcome, ResultOutcome::Emitted { warning: None });
        assert_eq!(consumer.last_for("y"), Some(vec![2.0; 4]));
    }

    #[test]
    fn test_per_dimension_lookup_emits_what_it_can() {
        let (mut coordinator, consumer) = coordinator();
        coordinator.set_state("x", interval(10.0, 30.0)).unwrap();
        for index in [10, 30] {
            coordinator
                .handle_result(ResultMessage::new("x", "y", ScaledIndex(index), vec![index as f64; 4]))
                .unwrap();
        }
        let before = consumer.emission_count();

        let resolution = coordinator.set_state("x", interval(10.0, 30.0)).unwrap();
        assert_eq!(resolution.emitted, vec!["y".to_string()]);
        assert_eq!(resolution.pending, vec!["z".to_string()]);
        assert!(!resolution.is_hit());
        assert_eq!(consumer.emission_count(), before + 1);
    }

    #[test]
    fn test_all_dimensions_lookup_requires_full_hit() {
        let dims = vec![dim("x", 0.0, 100.0, 10), dim("y", 0.0, 10.0, 2), dim("z", 0.0, 10.0, 2)];
        let config = CoordinatorConfig {
            lookup: LookupMode::AllDimensions,
            ..CoordinatorConfig::test()
        };
        let mut coordinator = QueryCoordinator::new(dims, &config, RecordingTransport::new()).unwrap();
        let consumer = CollectingConsumer::new();
        coordinator.set_consumer(Box::new(consumer.clone()));

        coordinator.set_state("x", interval(0.0, 50.0)).unwrap();
        for index in [0, 50] {
            coordinator
                .handle_result(ResultMessage::new("x", "y", ScaledIndex(index), vec![index as f64; 2]))
                .unwrap();
        }
        let partial = coordinator.set_state("x", interval(0.0, 50.0)).unwrap();
        assert!(partial.emitted.is_empty());
        assert_eq!(partial.pending, vec!["y".to_string(), "z".to_string()]);

        for index in [0, 50] {
            coordinator
                .handle_result(ResultMessage::new("x", "z", ScaledIndex(index), vec![0.0; 2]))
                .unwrap();
        }
        let full = coordinator.set_state("x", interval(0.0, 50.0)).unwrap();
        assert_eq!(full.emitted, vec!["y".to_string(), "z".to_string()]);
        assert!(full.is_hit());
    }

    #[test]
    fn test_length_mismatch_surfaces_as_error() {
        let (mut coordinator, consumer) = coordinator();
        coordinator.set_state("x", interval(20.0, 80.0)).unwrap();
        coordinator
            .handle_result(ResultMessage::new("x", "y", ScaledIndex(20), vec![1.0; 4]))
            .unwrap();
        let err = coordinator
            .handle_result(ResultMessage::new("x", "y", ScaledIndex(80), vec![1.0; 3]))
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Combine { ref dimension, .. } if dimension == "y"));
        assert_eq!(consumer.emission_count(), 0);

        let err = coordinator.set_state("x", interval(20.0, 80.0)).unwrap_err();
        assert!(matches!(err, CoordinatorError::Combine { .. }));
    }

    #[test]
    fn test_negative_bins_flagged_and_still_emitted() {
        let (mut coordinator, consumer) = coordinator();
        coordinator.set_state("x", interval(20.0, 80.0)).unwrap();
        coordinator
            .handle_result(ResultMessage::new("x", "y", ScaledIndex(20), vec![5.0, 1.0, 1.0, 1.0]))
            .unwrap();
        let outcome = coordinator
            .handle_result(ResultMessage::new("x", "y", ScaledIndex(80), vec![2.0, 2.0, 2.0, 2.0]))
            .unwrap();

        let warning = match outcome {
            ResultOutcome::Emitted { warning: Some(w) } => w,
            other => panic!("expected flagged emission, got {:?}", other),
        };
        assert_eq!(warning.negative_bins, vec![0]);
        assert_eq!(warning.low, ScaledIndex(20));
        assert_eq!(warning.high, ScaledIndex(80));
        assert_eq!(consumer.last_for("y"), Some(vec![-3.0, 1.0, 1.0, 1.0]));
        assert_eq!(consumer.warnings(), vec![warning.clone()]);

        let resolution = coordinator.set_state("x", interval(20.0, 80.0)).unwrap();
        assert_eq!(resolution.warnings, vec![warning]);
    }

    #[test]
    fn test_unknown_result_dimension_dropped() {
        let (mut coordinator, _) = coordinator();
        let outcome = coordinator
            .handle_result(ResultMessage::new("x", "w", ScaledIndex(0), vec![1.0]))
            .unwrap();
        assert_eq!(outcome, ResultOutcome::UnknownDimension);
        assert!(coordinator.cache().is_empty());
    }

    #[test]
    fn test_load_skips_fully_cached_index() {
        let (mut coordinator, _) = coordinator();
        assert_eq!(coordinator.load("x", 40.0).unwrap(), LoadOutcome::Sent(ScaledIndex(40)));

        for other in ["y", "z"] {
            coordinator
                .handle_result(ResultMessage::new("x", other, ScaledIndex(40), vec![0.0; 4]))
                .unwrap();
        }
        assert_eq!(coordinator.load("x", 40.0).unwrap(), LoadOutcome::Cached(ScaledIndex(40)));
        assert_eq!(coordinator.transport().count_loads(), 1);

        // Preload is a hint and goes out regardless
        assert_eq!(coordinator.preload("x", 40.0).unwrap(), LoadOutcome::Sent(ScaledIndex(40)));
        assert!(coordinator.transport().sent().last().is_some_and(TransportMessage::is_background));
    }

    #[test]
    fn test_load_for_inactive_dimension_always_sent() {
        let (mut coordinator, _) = coordinator();
        for other in ["x", "z"] {
            coordinator
                .handle_result(ResultMessage::new("x", other, ScaledIndex(5), vec![0.0; 4]))
                .unwrap();
        }
        assert_eq!(coordinator.load("y", 0.5).unwrap(), LoadOutcome::Sent(ScaledIndex(5)));
        assert_eq!(coordinator.active_dimension(), "x");
    }

    #[test]
    fn test_init_resizes_and_drops_cache() {
        let (mut coordinator, _) = coordinator();
        coordinator
            .handle_result(ResultMessage::new("x", "y", ScaledIndex(5), vec![0.0; 4]))
            .unwrap();

        coordinator.init(&[ResolutionSpec::new("x", 10)]).unwrap();
        assert!(coordinator.cache().is_empty());
        assert_eq!(coordinator.scales().resolution("x"), Some(10));

        let sent = coordinator.transport_mut().drain();
        assert_eq!(
            sent,
            vec![TransportMessage::Init {
                resolutions: vec![
                    ResolutionSpec::new("x", 10),
                    ResolutionSpec::new("y", 100),
                    ResolutionSpec::new("z", 100),
                ]
            }]
        );

        assert!(matches!(
            coordinator.init(&[ResolutionSpec::new("ghost", 10)]),
            Err(CoordinatorError::UnknownDimension(_))
        ));
        assert!(matches!(
            coordinator.init(&[ResolutionSpec::new("x", 0)]),
            Err(CoordinatorError::InvalidResolution(_))
        ));
    }

    #[test]
    fn test_rejected_init_changes_nothing() {
        let (mut coordinator, consumer) = coordinator();
        coordinator.set_state("x", Interval::new(2.0, 8.0).unwrap()).unwrap();
        for index in [2, 8] {
            coordinator
                .handle_result(ResultMessage::new("x", "y", ScaledIndex(index), vec![index as f64; 4]))
                .unwrap();
        }
        assert_eq!(consumer.emission_count(), 1);
        let before = coordinator.cache().len();
        coordinator.transport_mut().drain();

        let err = coordinator
            .init(&[ResolutionSpec::new("x", 10), ResolutionSpec::new("y", 0)])
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::InvalidResolution(_)));
        assert_eq!(coordinator.scales().resolution("x"), Some(100));
        assert_eq!(coordinator.cache().len(), before);
        assert!(coordinator.transport().sent().is_empty());

        // Old-resolution boundaries are not served for a different range
        let resolution = coordinator.set_state("x", Interval::new(20.0, 80.0).unwrap()).unwrap();
        assert_eq!(resolution.scaled_range, (ScaledIndex(20), ScaledIndex(80)));
        assert!(resolution.emitted.is_empty());
        assert_eq!(consumer.emission_count(), 1);
    }

    #[test]
    fn test_on_result_closure_consumer() {
        use std::sync::{Arc, Mutex};

        let (mut coordinator, _) = coordinator();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        coordinator.on_result(move |dimension, data| {
            sink.lock().unwrap().push((dimension.to_string(), data.to_vec()));
        });

        coordinator.set_state("x", interval(0.0, 100.0)).unwrap();
        coordinator
            .handle_result(ResultMessage::new("x", "z", ScaledIndex(0), vec![0.0, 0.0, 0.0, 0.0]))
            .unwrap();
        coordinator
            .handle_result(ResultMessage::new("x", "z", ScaledIndex(100), vec![1.0, 2.0, 3.0, 4.0]))
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![("z".to_string(), vec![1.0, 2.0, 3.0, 4.0])]
        );
    }
}
