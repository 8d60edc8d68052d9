//! Scale registry
//!
//! Maps each dimension's continuous domain onto an integer index space
//! `[0, resolution]`. Indices are the cache's addressing unit, so the
//! resolution bounds how many distinct boundary histograms can be cached.

use crate::dimension::{Dimension, Interval};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Resolution used when a dimension has none configured
pub const DEFAULT_RESOLUTION: u32 = 100;

/// Position in a dimension's discretized index space
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScaledIndex(pub u32);

impl std::fmt::Display for ScaledIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaleError {
    ZeroResolution { dimension: String },
}

impl std::fmt::Display for ScaleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleError::ZeroResolution { dimension } => {
                write!(f, "resolution for dimension '{}' must be positive", dimension)
            }
        }
    }
}

impl std::error::Error for ScaleError {}

/// Linear, clamped mapping from a domain to `[0, resolution]`.
///
/// Pure function of `(domain, resolution)`: two scales built from the same
/// pair always agree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    domain: Interval,
    resolution: u32,
}

impl LinearScale {
    pub fn new(domain: Interval, resolution: u32) -> Self {
        LinearScale { domain, resolution }
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn domain(&self) -> Interval {
        self.domain
    }

    /// Scale a value, rounding to the nearest index. Out-of-domain values
    /// clamp to the ends of the index space.
    pub fn apply(&self, value: f64) -> ScaledIndex {
        let width = self.domain.width();
        if width <= 0.0 {
            return ScaledIndex(0);
        }
        let resolution = self.resolution as f64;
        let position = (value - self.domain.low()) * resolution / width;
        ScaledIndex(position.round().clamp(0.0, resolution) as u32)
    }

    /// Domain value that an index stands for
    pub fn invert(&self, index: ScaledIndex) -> f64 {
        if self.resolution == 0 {
            return self.domain.low();
        }
        self.domain.low() + index.0 as f64 * self.domain.width() / self.resolution as f64
    }

    pub fn apply_interval(&self, interval: Interval) -> (ScaledIndex, ScaledIndex) {
        (self.apply(interval.low()), self.apply(interval.high()))
    }
}

/// Per-dimension scales, keyed by dimension name
#[derive(Debug, Clone)]
pub struct ScaleRegistry {
    scales: AHashMap<String, LinearScale>,
    default_resolution: u32,
}

impl ScaleRegistry {
    pub fn new(default_resolution: u32) -> Self {
        ScaleRegistry {
            scales: AHashMap::new(),
            default_resolution,
        }
    }

    pub fn default_resolution(&self) -> u32 {
        self.default_resolution
    }

    /// Install (or replace) the scale for `dimension`. `None` selects the
    /// registry's default resolution.
    pub fn configure(
        &mut self,
        dimension: &Dimension,
        resolution: Option<u32>,
    ) -> Result<&LinearScale, ScaleError> {
        let resolution = resolution.unwrap_or(self.default_resolution);
        if resolution == 0 {
            return Err(ScaleError::ZeroResolution {
                dimension: dimension.name().to_string(),
            });
        }
        let scale = LinearScale::new(dimension.range(), resolution);
        self.scales.insert(dimension.name().to_string(), scale);
        Ok(&self.scales[dimension.name()])
    }

    pub fn get(&self, dimension: &str) -> Option<&LinearScale> {
        self.scales.get(dimension)
    }

    pub fn resolution(&self, dimension: &str) -> Option<u32> {
        self.scales.get(dimension).map(LinearScale::resolution)
    }

    pub fn scale(&self, dimension: &str, value: f64) -> Option<ScaledIndex> {
        self.scales.get(dimension).map(|scale| scale.apply(value))
    }

    pub fn scale_interval(
        &self,
        dimension: &str,
        interval: Interval,
    ) -> Option<(ScaledIndex, ScaledIndex)> {
        self.scales
            .get(dimension)
            .map(|scale| scale.apply_interval(interval))
    }
}

impl Default for ScaleRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_RESOLUTION)
    }
}
