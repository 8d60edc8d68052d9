//! Cumulative histograms and range combination
//!
//! A cumulative histogram at index `k` counts, per bin of another dimension,
//! the records whose active-dimension value is at or below the value of `k`.
//! The histogram of a brushed range is the bin-wise difference of the
//! cumulative histograms at its two boundaries.

use crate::scale::ScaledIndex;
use serde::{Deserialize, Serialize};

/// Per-bin cumulative counts, as produced by the remote engine
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CumulativeHistogram(Vec<f64>);

impl CumulativeHistogram {
    pub fn new(bins: Vec<f64>) -> Self {
        CumulativeHistogram(bins)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl From<Vec<f64>> for CumulativeHistogram {
    fn from(bins: Vec<f64>) -> Self {
        CumulativeHistogram(bins)
    }
}

/// Error type for range combination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CombineError {
    /// Boundary histograms have different bin counts
    LengthMismatch { low: usize, high: usize },
}

impl std::fmt::Display for CombineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CombineError::LengthMismatch { low, high } => write!(
                f,
                "cannot combine cumulative histograms of different lengths: low has {} bins, high has {}",
                low, high
            ),
        }
    }
}

impl std::error::Error for CombineError {}

/// Output of a successful combination
#[derive(Debug, Clone, PartialEq)]
pub struct Combined {
    pub data: Vec<f64>,
    /// Bins where `high < low`. Non-empty means the cumulative inputs were
    /// not monotonic; the data is still returned unclamped.
    pub negative_bins: Vec<usize>,
}

impl Combined {
    pub fn is_monotonic(&self) -> bool {
        self.negative_bins.is_empty()
    }
}

/// Range histogram from two cumulative boundary histograms: `high[i] - low[i]`.
pub fn combine_ranges(
    low: &CumulativeHistogram,
    high: &CumulativeHistogram,
) -> Result<Combined, CombineError> {
    if low.len() != high.len() {
        return Err(CombineError::LengthMismatch {
            low: low.len(),
            high: high.len(),
        });
    }

    let mut negative_bins = Vec::new();
    let data = low
        .as_slice()
        .iter()
        .zip(high.as_slice())
        .enumerate()
        .map(|(bin, (lo, hi))| {
            let value = hi - lo;
            if value < 0.0 {
                negative_bins.push(bin);
            }
            value
        })
        .collect();

    Ok(Combined {
        data,
        negative_bins,
    })
}

/// Non-monotonic cumulative data detected while combining a range.
///
/// Indicates a bug in whatever produced the cumulative histograms.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityWarning {
    /// Active dimension whose index space the boundaries belong to
    pub active_dimension: String,
    /// Dimension whose histogram was combined
    pub dimension: String,
    pub low: ScaledIndex,
    pub high: ScaledIndex,
    pub negative_bins: Vec<usize>,
}

impl std::fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "non-monotonic cumulative data for '{}' between indices {} and {} of '{}' (negative bins: {:?})",
            self.dimension, self.low, self.high, self.active_dimension, self.negative_bins
        )
    }
}
