//! Brush range-query cache and dimension-state coordinator.
//!
//! Charts over a shared dataset are linked by brushing: dragging a range on
//! one chart (the active dimension) refilters every other chart. A remote
//! engine answers with cumulative histograms at range boundaries; the
//! coordinator caches them, subtracts boundary pairs to get range
//! histograms, and drops anything computed for a dimension that is no
//! longer active.

pub mod buggify;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod dimension;
pub mod observability;
pub mod scale;
pub mod simulator;

pub use cache::{combine_ranges, CumulativeHistogram, IntegrityWarning, RangeCache};
pub use config::{ConfigError, CoordinatorConfig, LookupMode, LoggingConfig};
pub use coordinator::{
    spawn_coordinator, CoordinatorError, CoordinatorHandle, QueryCoordinator, Resolution,
    ResultConsumer, ResultMessage, ResultOutcome, Transport, TransportMessage,
};
pub use dimension::{Dimension, DimensionError, Interval};
pub use scale::{LinearScale, ScaleRegistry, ScaledIndex};
