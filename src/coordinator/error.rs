use crate::cache::CombineError;
use crate::dimension::DimensionError;
use crate::scale::ScaleError;

/// Error type for coordinator operations
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorError {
    /// Coordinator needs at least one dimension
    NoDimensions,
    /// Two dimensions share a name
    DuplicateDimension(String),
    /// Event referenced a dimension that was never configured
    UnknownDimension(String),
    /// Dimension or interval failed validation
    InvalidDimension(DimensionError),
    /// Resolution failed validation
    InvalidResolution(ScaleError),
    /// Combining two cached boundaries failed
    Combine {
        dimension: String,
        source: CombineError,
    },
    /// The coordinator actor is no longer running
    ActorClosed,
}

impl std::fmt::Display for CoordinatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinatorError::NoDimensions => write!(f, "at least one dimension is required"),
            CoordinatorError::DuplicateDimension(name) => {
                write!(f, "dimension '{}' is configured more than once", name)
            }
            CoordinatorError::UnknownDimension(name) => write!(f, "unknown dimension '{}'", name),
            CoordinatorError::InvalidDimension(e) => write!(f, "invalid dimension: {}", e),
            CoordinatorError::InvalidResolution(e) => write!(f, "invalid resolution: {}", e),
            CoordinatorError::Combine { dimension, source } => {
                write!(f, "failed to combine range for '{}': {}", dimension, source)
            }
            CoordinatorError::ActorClosed => write!(f, "coordinator actor has shut down"),
        }
    }
}

impl std::error::Error for CoordinatorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoordinatorError::InvalidDimension(e) => Some(e),
            CoordinatorError::InvalidResolution(e) => Some(e),
            CoordinatorError::Combine { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<DimensionError> for CoordinatorError {
    fn from(e: DimensionError) -> Self {
        CoordinatorError::InvalidDimension(e)
    }
}

impl From<ScaleError> for CoordinatorError {
    fn from(e: ScaleError) -> Self {
        CoordinatorError::InvalidResolution(e)
    }
}
