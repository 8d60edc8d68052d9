//! Deterministic simulation of the coordinator talking to a query engine
//! over an unreliable link.
//!
//! - `executor`/`network`/`time`/`rng`: seeded discrete event loop
//! - `dataset`: synthetic records
//! - `engine`: reference engine answering transport messages from a dataset
//! - `dst`: multi-seed harness checking coordinator invariants against
//!   ground truth

mod executor;
mod network;
mod rng;
mod time;
pub mod dataset;
pub mod dst;
pub mod engine;

pub use dataset::Dataset;
pub use dst::{
    run_brush_dst_batch, summarize_brush_dst_batch, BrushDSTConfig, BrushDSTHarness,
    BrushDSTResult,
};
pub use engine::SimulatedEngine;
pub use executor::{Simulation, SimulationConfig};
pub use network::{Host, PacketDelay};
pub use rng::{DeterministicRng, Rng};
pub use time::{Duration, VirtualTime};

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(pub usize);

#[derive(Debug, Clone)]
pub struct Event {
    pub time: VirtualTime,
    /// Scheduling order, breaks ties between events at the same time
    pub seq: u64,
    pub host_id: HostId,
    pub event_type: EventType,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    // Reversed: BinaryHeap is a max-heap and we want the earliest event
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Clone)]
pub enum EventType {
    Timer(TimerId),
    NetworkMessage(Message),
    HostStart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

#[derive(Debug, Clone)]
pub struct Message {
    pub from: HostId,
    pub to: HostId,
    pub payload: Vec<u8>,
}
