//! Reference query engine
//!
//! Answers transport messages with cumulative histograms computed from a
//! `Dataset`: for active dimension `a`, boundary index `i` and dimension
//! `d`, bin `b` counts the records with `a <= invert(i)` that fall in bin
//! `b` of `d`. Every result is stamped with the active dimension of the
//! request that produced it.

use super::{Dataset, DeterministicRng, Rng};
use crate::buggify::faults;
use crate::coordinator::{ResultMessage, TransportMessage};
use crate::scale::{ScaleRegistry, ScaledIndex, DEFAULT_RESOLUTION};
use tracing::{debug, warn};

pub struct SimulatedEngine {
    dataset: Dataset,
    scales: ScaleRegistry,
    requests: u64,
    results: u64,
    corrupted: u64,
}

impl SimulatedEngine {
    /// Every dimension starts at `DEFAULT_RESOLUTION` until an `init` arrives
    pub fn new(dataset: Dataset) -> Self {
        let mut scales = ScaleRegistry::new(DEFAULT_RESOLUTION);
        for dimension in dataset.dimensions() {
            if let Err(e) = scales.configure(dimension, None) {
                warn!("Engine has no scale for '{}': {}", dimension.name(), e);
            }
        }
        SimulatedEngine {
            dataset,
            scales,
            requests: 0,
            results: 0,
            corrupted: 0,
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn scales(&self) -> &ScaleRegistry {
        &self.scales
    }

    /// Answer one request. `init` produces no results; range and point
    /// requests produce one result per boundary per other dimension.
    pub fn handle(
        &mut self,
        message: &TransportMessage,
        rng: &mut DeterministicRng,
    ) -> Vec<ResultMessage> {
        self.requests += 1;
        let (active, indices) = match message {
            TransportMessage::Init { resolutions } => {
                for requested in resolutions {
                    let configured = self
                        .dataset
                        .dimension(&requested.dimension)
                        .map(|dimension| self.scales.configure(dimension, Some(requested.value)).is_ok());
                    if configured != Some(true) {
                        warn!("Engine ignoring resolution {:?}", requested);
                    }
                }
                return Vec::new();
            }
            TransportMessage::SetRange { dimension, range } => {
                match self.scales.scale_interval(dimension, *range) {
                    Some((low, high)) if low == high => (dimension, vec![low]),
                    Some((low, high)) => (dimension, vec![low, high]),
                    None => return self.unknown(dimension),
                }
            }
            TransportMessage::Load { dimension, value }
            | TransportMessage::Preload { dimension, value } => (dimension, vec![*value]),
        };
        if self.dataset.dimension(active).is_none() {
            return self.unknown(active);
        }

        let mut out = Vec::new();
        for index in indices {
            for other in self.dataset.dimensions().iter().map(|d| d.name()) {
                if other == active.as_str() {
                    continue;
                }
                let Some(mut data) = self.cumulative(active, index, other) else {
                    continue;
                };
                if crate::buggify!(rng, faults::engine::NON_MONOTONIC) {
                    let bin = rng.gen_range(0, data.len() as u64) as usize;
                    data[bin] = -1.0;
                    self.corrupted += 1;
                }
                out.push(ResultMessage::new(active.clone(), other, index, data));
            }
        }
        self.results += out.len() as u64;
        debug!("Engine answered {:?} with {} results", message.dimension(), out.len());
        out
    }

    fn unknown(&self, dimension: &str) -> Vec<ResultMessage> {
        warn!("Engine got request for unknown dimension '{}'", dimension);
        Vec::new()
    }

    /// Cumulative histogram of `dimension` at boundary `index` of `active`
    pub fn cumulative(&self, active: &str, index: ScaledIndex, dimension: &str) -> Option<Vec<f64>> {
        let bound = self.scales.get(active)?.invert(index);
        self.dataset.histogram(active, |v| v <= bound, dimension)
    }

    /// Histogram of `dimension` over records strictly above boundary `low`
    /// and at or below boundary `high` of `active`. Computed directly from
    /// the records, independent of `cumulative`.
    pub fn range_histogram(
        &self,
        active: &str,
        low: ScaledIndex,
        high: ScaledIndex,
        dimension: &str,
    ) -> Option<Vec<f64>> {
        let scale = self.scales.get(active)?;
        let (from, to) = (scale.invert(low), scale.invert(high));
        self.dataset.histogram(active, |v| from < v && v <= to, dimension)
    }

    pub fn requests(&self) -> u64 {
        self.requests
    }

    pub fn results(&self) -> u64 {
        self.results
    }

    /// Results deliberately made non-monotonic
    pub fn corrupted(&self) -> u64 {
        self.corrupted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buggify::{self, FaultConfig};
    use crate::coordinator::ResolutionSpec;
    use crate::dimension::{Dimension, Interval};

    fn engine() -> SimulatedEngine {
        let dims = vec![
            Dimension::new("x", Interval::new(0.0, 10.0).unwrap(), 10).unwrap(),
            Dimension::new("y", Interval::new(0.0, 4.0).unwrap(), 4).unwrap(),
        ];
        let records = vec![
            vec![1.0, 0.5],
            vec![2.0, 1.5],
            vec![5.0, 1.5],
            vec![8.0, 3.5],
        ];
        SimulatedEngine::new(Dataset::new(dims, records))
    }

    #[test]
    fn test_new_scales_every_dimension_at_default() {
        let engine = engine();
        for name in ["x", "y"] {
            assert_eq!(engine.scales().resolution(name), Some(DEFAULT_RESOLUTION));
        }
    }

    #[test]
    fn test_init_resizes_scales() {
        let mut engine = engine();
        let mut rng = DeterministicRng::new(0);
        let results = engine.handle(
            &TransportMessage::Init {
                resolutions: vec![ResolutionSpec::new("x", 10), ResolutionSpec::new("nope", 5)],
            },
            &mut rng,
        );
        assert!(results.is_empty());
        assert_eq!(engine.scales().resolution("x"), Some(10));
        assert_eq!(engine.scales().resolution("y"), Some(DEFAULT_RESOLUTION));
    }

    #[test]
    fn test_set_range_answers_both_boundaries() {
        buggify::set_config(FaultConfig::disabled());
        let mut engine = engine();
        let mut rng = DeterministicRng::new(0);
        engine.handle(
            &TransportMessage::Init {
                resolutions: vec![ResolutionSpec::new("x", 10)],
            },
            &mut rng,
        );

        let results = engine.handle(
            &TransportMessage::SetRange {
                dimension: "x".into(),
                range: Interval::new(1.0, 5.0).unwrap(),
            },
            &mut rng,
        );
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.active_dimension == "x" && r.dimension == "y"));
        assert_eq!(results[0].index, ScaledIndex(1));
        assert_eq!(results[0].data.as_slice(), &[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(results[1].index, ScaledIndex(5));
        assert_eq!(results[1].data.as_slice(), &[1.0, 2.0, 0.0, 0.0]);

        assert_eq!(
            engine.range_histogram("x", ScaledIndex(1), ScaledIndex(5), "y"),
            Some(vec![0.0, 2.0, 0.0, 0.0])
        );
    }

    #[test]
    fn test_corruption_fault_breaks_monotonicity() {
        buggify::set_config(FaultConfig::new().with(faults::engine::NON_MONOTONIC, 1.0));
        let mut engine = engine();
        let mut rng = DeterministicRng::new(0);
        let results = engine.handle(
            &TransportMessage::Load {
                dimension: "y".into(),
                value: ScaledIndex(50),
            },
            &mut rng,
        );
        buggify::set_config(FaultConfig::disabled());

        assert_eq!(results.len(), 1);
        assert!(results[0].data.as_slice().contains(&-1.0));
        assert_eq!(engine.corrupted(), 1);
    }

    #[test]
    fn test_unknown_dimension_yields_nothing() {
        let mut engine = engine();
        let mut rng = DeterministicRng::new(0);
        let results = engine.handle(
            &TransportMessage::Preload {
                dimension: "w".into(),
                value: ScaledIndex(1),
            },
            &mut rng,
        );
        assert!(results.is_empty());
    }
}
