//! Brush query coordination
//!
//! - `query`: the coordinator state machine (active dimension, ranges,
//!   cache lookups, stale-result filtering)
//! - `message`: JSON wire messages in both directions
//! - `transport`: outbound seam toward the engine
//! - `consumer`: inbound seam toward the charts
//! - `actor`: tokio task wrapper with an async handle

pub mod actor;
pub mod consumer;
pub mod error;
pub mod message;
pub mod query;
pub mod transport;

pub use actor::{spawn_coordinator, CoordinatorHandle, CoordinatorMessage};
pub use consumer::{
    CollectingConsumer, Emission, FnConsumer, HistogramView, ResultConsumer, ViewRouter,
};
pub use error::CoordinatorError;
pub use message::{ResolutionSpec, ResultMessage, TransportMessage};
pub use query::{LoadOutcome, QueryCoordinator, Resolution, ResultOutcome};
pub use transport::{
    ChannelTransport, RecordingTransport, Transport, TransportReceiver, TransportSender,
};
