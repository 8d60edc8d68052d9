use super::network::{Network, PacketDelay};
use super::*;
use std::collections::{BinaryHeap, HashMap};

pub struct SimulationConfig {
    pub seed: u64,
    pub max_time: VirtualTime,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            seed: 42,
            max_time: VirtualTime::from_millis(60_000),
        }
    }
}

/// Single-threaded discrete event loop. Events at the same instant run in
/// the order they were scheduled.
pub struct Simulation {
    config: SimulationConfig,
    current_time: VirtualTime,
    events: BinaryHeap<Event>,
    hosts: HashMap<HostId, Host>,
    network: Network,
    rng: DeterministicRng,
    next_timer_id: u64,
    next_host_id: usize,
    next_seq: u64,
    delivered: u64,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Self {
        Simulation {
            rng: DeterministicRng::new(config.seed),
            current_time: VirtualTime::ZERO,
            events: BinaryHeap::new(),
            hosts: HashMap::new(),
            network: Network::new(),
            next_timer_id: 0,
            next_host_id: 0,
            next_seq: 0,
            delivered: 0,
            config,
        }
    }

    fn push(&mut self, time: VirtualTime, host_id: HostId, event_type: EventType) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(Event {
            time,
            seq,
            host_id,
            event_type,
        });
    }

    pub fn add_host(&mut self, name: impl Into<String>) -> HostId {
        let id = HostId(self.next_host_id);
        self.next_host_id += 1;
        self.hosts.insert(id, Host::new(id, name.into()));
        self.push(self.current_time, id, EventType::HostStart);
        id
    }

    pub fn host_name(&self, host_id: HostId) -> Option<&str> {
        self.hosts.get(&host_id).map(|h| h.name.as_str())
    }

    pub fn schedule_timer(&mut self, host_id: HostId, delay: Duration) -> TimerId {
        let timer_id = TimerId(self.next_timer_id);
        self.next_timer_id += 1;
        self.push(self.current_time + delay, host_id, EventType::Timer(timer_id));
        timer_id
    }

    /// Send through the simulated network; may be dropped, delayed or duplicated
    pub fn send_message(&mut self, from: HostId, to: HostId, payload: Vec<u8>) -> usize {
        self.send_message_after(from, to, payload, Duration::ZERO)
    }

    /// Like `send_message`, with `extra` added to every delivery delay
    pub fn send_message_after(
        &mut self,
        from: HostId,
        to: HostId,
        payload: Vec<u8>,
        extra: Duration,
    ) -> usize {
        let delays = self.network.should_deliver(from, to, &mut self.rng);
        let copies = delays.len();
        for delay in delays {
            let message = Message {
                from,
                to,
                payload: payload.clone(),
            };
            self.push(
                self.current_time + delay + extra,
                to,
                EventType::NetworkMessage(message),
            );
        }
        copies
    }

    pub fn set_network_drop_rate(&mut self, rate: f64) {
        self.network.set_drop_rate(rate);
    }

    pub fn set_packet_delay(&mut self, packet_delay: PacketDelay) {
        self.network.set_packet_delay(packet_delay);
    }

    pub fn partition_hosts(&mut self, host1: HostId, host2: HostId) {
        self.network.partition(host1, host2);
    }

    pub fn heal_partition(&mut self, host1: HostId, host2: HostId) {
        self.network.heal_partition(host1, host2);
    }

    pub fn current_time(&self) -> VirtualTime {
        self.current_time
    }

    pub fn rng(&mut self) -> &mut DeterministicRng {
        &mut self.rng
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Network messages handed to a host so far
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn run_until(&mut self, max_time: VirtualTime, mut event_handler: impl FnMut(&mut Self, &Event)) {
        while let Some(event) = self.events.pop() {
            if event.time > max_time {
                self.events.push(event);
                break;
            }

            self.current_time = event.time;
            if matches!(event.event_type, EventType::NetworkMessage(_)) {
                self.delivered += 1;
            }
            event_handler(self, &event);
        }
    }

    pub fn run(&mut self, event_handler: impl FnMut(&mut Self, &Event)) {
        let max_time = self.config.max_time;
        self.run_until(max_time, event_handler);
    }
}
