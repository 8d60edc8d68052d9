//! Dimensions and brush intervals
//!
//! A `Dimension` is one column of the dataset: a named continuous domain that
//! histograms split into `bins` equal-width buckets. An `Interval` is a brush
//! selection inside that domain.

use serde::{Deserialize, Serialize};

/// Error type for dimension and interval construction
#[derive(Debug, Clone, PartialEq)]
pub enum DimensionError {
    /// Dimension name is empty
    EmptyName,
    /// Dimension has zero bins
    ZeroBins { dimension: String },
    /// Interval endpoints are not finite or are inverted
    InvalidInterval { low: f64, high: f64 },
}

impl std::fmt::Display for DimensionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DimensionError::EmptyName => write!(f, "dimension name must not be empty"),
            DimensionError::ZeroBins { dimension } => {
                write!(f, "dimension '{}' must have at least one bin", dimension)
            }
            DimensionError::InvalidInterval { low, high } => {
                write!(f, "invalid interval [{}, {}]: endpoints must be finite and ordered", low, high)
            }
        }
    }
}

impl std::error::Error for DimensionError {}

/// Closed interval `[low, high]` in a dimension's continuous domain.
///
/// Serialized as a two-element array, which is how brush ranges travel on the
/// wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "(f64, f64)", into = "(f64, f64)")]
pub struct Interval {
    low: f64,
    high: f64,
}

impl Interval {
    pub fn new(low: f64, high: f64) -> Result<Self, DimensionError> {
        if !low.is_finite() || !high.is_finite() || low > high {
            return Err(DimensionError::InvalidInterval { low, high });
        }
        Ok(Interval { low, high })
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }
}

impl TryFrom<(f64, f64)> for Interval {
    type Error = DimensionError;

    fn try_from((low, high): (f64, f64)) -> Result<Self, Self::Error> {
        Interval::new(low, high)
    }
}

impl From<Interval> for (f64, f64) {
    fn from(interval: Interval) -> Self {
        (interval.low, interval.high)
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.low, self.high)
    }
}

/// One dimension of the dataset. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    name: String,
    range: Interval,
    bins: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
}

impl Dimension {
    pub fn new(name: impl Into<String>, range: Interval, bins: u32) -> Result<Self, DimensionError> {
        let name = name.into();
        if name.is_empty() {
            return Err(DimensionError::EmptyName);
        }
        if bins == 0 {
            return Err(DimensionError::ZeroBins { dimension: name });
        }
        Ok(Dimension {
            name,
            range,
            bins,
            title: None,
        })
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn range(&self) -> Interval {
        self.range
    }

    pub fn bins(&self) -> u32 {
        self.bins
    }

    /// Display title, falling back to the name
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    /// Width of one bin in domain units
    pub fn bin_width(&self) -> f64 {
        self.range.width() / self.bins as f64
    }

    /// Bin holding `value`. Values outside the domain clamp to the first or
    /// last bin; the upper domain edge belongs to the last bin.
    pub fn bin_of(&self, value: f64) -> usize {
        let last = self.bins as usize - 1;
        let width = self.range.width();
        if width <= 0.0 || value <= self.range.low {
            return 0;
        }
        let position = (value - self.range.low) / width * self.bins as f64;
        (position.floor() as usize).min(last)
    }

    /// Domain extent `[start, end)` covered by bin `bin`
    pub fn bin_extent(&self, bin: usize) -> (f64, f64) {
        let start = self.range.low + bin as f64 * self.bin_width();
        (start, start + self.bin_width())
    }
}
