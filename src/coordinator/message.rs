//! Wire messages between the coordinator and the remote engine.
//!
//! Both directions are JSON. Transport messages carry a `type` tag
//! (`init`, `setRange`, `load`, `preload`); result messages use camelCase
//! field names.

use crate::cache::CumulativeHistogram;
use crate::dimension::Interval;
use crate::scale::ScaledIndex;
use serde::{Deserialize, Serialize};

/// Resolution of one dimension's index space
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionSpec {
    pub dimension: String,
    pub value: u32,
}

impl ResolutionSpec {
    pub fn new(dimension: impl Into<String>, value: u32) -> Self {
        ResolutionSpec {
            dimension: dimension.into(),
            value,
        }
    }
}

/// Coordinator -> engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TransportMessage {
    /// Establish or resize index-space resolutions
    Init { resolutions: Vec<ResolutionSpec> },
    /// Compute (or keep refining) boundaries for a brushed range
    SetRange { dimension: String, range: Interval },
    /// Compute one boundary now
    Load { dimension: String, value: ScaledIndex },
    /// Compute one boundary when idle
    Preload { dimension: String, value: ScaledIndex },
}

impl TransportMessage {
    /// Dimension the request is scoped to, if any
    pub fn dimension(&self) -> Option<&str> {
        match self {
            TransportMessage::Init { .. } => None,
            TransportMessage::SetRange { dimension, .. } => Some(dimension),
            TransportMessage::Load { dimension, .. } => Some(dimension),
            TransportMessage::Preload { dimension, .. } => Some(dimension),
        }
    }

    /// Low-priority hint rather than a request the UI is waiting on
    pub fn is_background(&self) -> bool {
        matches!(self, TransportMessage::Preload { .. })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

/// Engine -> coordinator: one cumulative histogram at one boundary index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMessage {
    /// Active dimension the engine computed against
    pub active_dimension: String,
    /// Dimension the histogram is binned by
    pub dimension: String,
    pub index: ScaledIndex,
    pub data: CumulativeHistogram,
}

impl ResultMessage {
    pub fn new(
        active_dimension: impl Into<String>,
        dimension: impl Into<String>,
        index: ScaledIndex,
        data: impl Into<CumulativeHistogram>,
    ) -> Self {
        ResultMessage {
            active_dimension: active_dimension.into(),
            dimension: dimension.into(),
            index,
            data: data.into(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}
