//! Named fault injection sites

/// Faults on the simulated link between coordinator and engine
pub mod network {
    /// Drop a message
    pub const PACKET_DROP: &str = "network.packet_drop";
    /// Deliver a message twice
    pub const DUPLICATE: &str = "network.duplicate";
    /// Add a long extra delay, reordering the message behind later ones
    pub const DELAY: &str = "network.delay";
}

/// Faults inside the simulated query engine
pub mod engine {
    /// Take much longer than usual to answer one boundary
    pub const SLOW_RESULT: &str = "engine.slow_result";
    /// Return a cumulative histogram that decreases somewhere
    pub const NON_MONOTONIC: &str = "engine.non_monotonic";
}

pub const ALL_FAULTS: &[&str] = &[
    network::PACKET_DROP,
    network::DUPLICATE,
    network::DELAY,
    engine::SLOW_RESULT,
    engine::NON_MONOTONIC,
];
