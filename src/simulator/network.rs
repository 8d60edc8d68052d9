use super::{DeterministicRng, Duration, HostId, Rng};
use crate::buggify::faults;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct PacketDelay {
    pub min_latency: Duration,
    pub max_latency: Duration,
}

impl Default for PacketDelay {
    fn default() -> Self {
        PacketDelay {
            min_latency: Duration::from_millis(1),
            max_latency: Duration::from_millis(10),
        }
    }
}

/// Extra latency added by the `network.delay` fault, enough to land the
/// message behind several later ones
const DELAY_FAULT_MIN_MS: u64 = 50;
const DELAY_FAULT_MAX_MS: u64 = 250;

pub struct Network {
    packet_delay: PacketDelay,
    drop_rate: f64,
    partitions: HashSet<(HostId, HostId)>,
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Network {
    pub fn new() -> Self {
        Network {
            packet_delay: PacketDelay::default(),
            drop_rate: 0.0,
            partitions: HashSet::new(),
        }
    }

    pub fn set_packet_delay(&mut self, packet_delay: PacketDelay) {
        self.packet_delay = packet_delay;
    }

    pub fn set_drop_rate(&mut self, rate: f64) {
        self.drop_rate = rate.clamp(0.0, 1.0);
    }

    pub fn partition(&mut self, host1: HostId, host2: HostId) {
        self.partitions.insert((host1, host2));
        self.partitions.insert((host2, host1));
    }

    pub fn heal_partition(&mut self, host1: HostId, host2: HostId) {
        self.partitions.remove(&(host1, host2));
        self.partitions.remove(&(host2, host1));
    }

    pub fn is_partitioned(&self, from: HostId, to: HostId) -> bool {
        self.partitions.contains(&(from, to))
    }

    /// Delivery delays for one send: empty when the message is lost, two
    /// entries when it is duplicated.
    pub fn should_deliver(
        &self,
        from: HostId,
        to: HostId,
        rng: &mut DeterministicRng,
    ) -> Vec<Duration> {
        if self.is_partitioned(from, to) {
            return Vec::new();
        }
        if rng.gen_bool(self.drop_rate) || crate::buggify!(rng, faults::network::PACKET_DROP) {
            return Vec::new();
        }

        let mut delays = vec![self.latency(rng)];
        if crate::buggify!(rng, faults::network::DUPLICATE) {
            delays.push(self.latency(rng));
        }
        delays
    }

    fn latency(&self, rng: &mut DeterministicRng) -> Duration {
        let mut latency = rng.gen_range(
            self.packet_delay.min_latency.as_millis(),
            self.packet_delay.max_latency.as_millis().saturating_add(1),
        );
        if crate::buggify!(rng, faults::network::DELAY) {
            latency += rng.gen_range(DELAY_FAULT_MIN_MS, DELAY_FAULT_MAX_MS);
        }
        Duration::from_millis(latency)
    }
}

pub struct Host {
    pub id: HostId,
    pub name: String,
}

impl Host {
    pub fn new(id: HostId, name: String) -> Self {
        Host { id, name }
    }
}
