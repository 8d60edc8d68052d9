//! Brush DST Harness
//!
//! Drives a `QueryCoordinator` and a `SimulatedEngine` over a simulated link
//! with buggify fault injection, and checks after every step:
//!
//! - **Exactness**: every emitted histogram equals the range histogram
//!   computed directly from the dataset
//! - **Switch clears**: a dimension switch leaves the cache empty and emits
//!   nothing
//! - **Stale filtering**: a result computed for another dimension neither
//!   emits nor touches the cache
//! - **Integrity**: negative bins are emitted if and only if they are
//!   flagged; without engine corruption nothing is ever flagged
//!
//! ## DST Methodology
//!
//! 1. Generate a seeded dataset and hand it to the engine
//! 2. Handshake resolutions (delivered reliably)
//! 3. Fire random brush, load and preload operations at random times
//! 4. Ship requests and results through the lossy, reordering network
//! 5. Verify invariants at each step against the engine's ground truth

use super::{
    Dataset, Duration, Event, EventType, HostId, Rng, SimulatedEngine, Simulation,
    SimulationConfig, VirtualTime,
};
use crate::buggify::{self, faults, FaultConfig};
use crate::cache::IntegrityWarning;
use crate::config::{CoordinatorConfig, LookupMode};
use crate::coordinator::{
    CollectingConsumer, CoordinatorError, Emission, QueryCoordinator, RecordingTransport,
    ResolutionSpec, Resolution, ResultMessage, ResultOutcome, TransportMessage,
};
use crate::dimension::{Dimension, Interval};
use crate::scale::ScaledIndex;

/// Result of a single DST run
#[derive(Debug, Clone)]
pub struct BrushDSTResult {
    pub seed: u64,
    pub operations: usize,
    /// Brush events answered fully from cache
    pub cache_hits: usize,
    pub switches: usize,
    pub requests_sent: usize,
    pub results_received: usize,
    pub stale_results: usize,
    pub emissions: usize,
    pub warnings: usize,
    pub corrupted_results: u64,
    pub invariant_violations: Vec<String>,
}

impl BrushDSTResult {
    pub fn is_success(&self) -> bool {
        self.invariant_violations.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Seed {}: {} ops, {} hits, {} switches, {} requests, {} results ({} stale), {} emissions, {} warnings, {} violations",
            self.seed,
            self.operations,
            self.cache_hits,
            self.switches,
            self.requests_sent,
            self.results_received,
            self.stale_results,
            self.emissions,
            self.warnings,
            self.invariant_violations.len()
        )
    }
}

/// Configuration for the brush DST harness
#[derive(Debug, Clone)]
pub struct BrushDSTConfig {
    pub num_operations: usize,
    pub num_records: usize,
    /// Index-space resolution for every dimension
    pub resolution: u32,
    pub lookup: LookupMode,
    pub faults: FaultConfig,
    /// Maximum gap between operations
    pub max_think_time_ms: u64,
    /// Extra delay on results of preload hints
    pub preload_delay_ms: u64,
    pub max_time: VirtualTime,
}

impl Default for BrushDSTConfig {
    fn default() -> Self {
        BrushDSTConfig {
            num_operations: 200,
            num_records: 300,
            resolution: 20,
            lookup: LookupMode::PerDimension,
            faults: FaultConfig::disabled(),
            max_think_time_ms: 30,
            preload_delay_ms: 40,
            max_time: VirtualTime::from_secs(600),
        }
    }
}

impl BrushDSTConfig {
    /// Reliable link, correct engine
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lossy() -> Self {
        BrushDSTConfig {
            faults: FaultConfig::moderate(),
            ..Default::default()
        }
    }

    pub fn chaos() -> Self {
        BrushDSTConfig {
            faults: FaultConfig::chaos(),
            ..Default::default()
        }
    }

    /// Chaos plus an engine that sometimes returns non-monotonic data
    pub fn corrupting() -> Self {
        BrushDSTConfig {
            faults: FaultConfig::chaos().with(faults::engine::NON_MONOTONIC, 0.05),
            ..Default::default()
        }
    }

    /// Lossy link, emitting only on a full all-dimension hit
    pub fn all_dimensions() -> Self {
        BrushDSTConfig {
            lookup: LookupMode::AllDimensions,
            faults: FaultConfig::moderate(),
            ..Default::default()
        }
    }

    fn corrupting_engine(&self) -> bool {
        self.faults.get(faults::engine::NON_MONOTONIC) > 0.0
    }
}

/// Dimensions used by every run
pub fn dst_dimensions() -> Vec<Dimension> {
    let dim = |name: &str, low: f64, high: f64, bins: u32| {
        Interval::new(low, high).and_then(|range| Dimension::new(name, range, bins))
    };
    [
        dim("delay", -20.0, 180.0, 10),
        dim("distance", 0.0, 2000.0, 8),
        dim("time", 0.0, 24.0, 6),
        dim("day", 1.0, 31.0, 5),
    ]
    .into_iter()
    .filter_map(Result::ok)
    .collect()
}

pub struct BrushDSTHarness {
    seed: u64,
    config: BrushDSTConfig,
}

impl BrushDSTHarness {
    pub fn new(seed: u64, config: BrushDSTConfig) -> Self {
        BrushDSTHarness { seed, config }
    }

    /// Run a single DST scenario
    pub fn run(&mut self) -> BrushDSTResult {
        buggify::set_config(self.config.faults.clone());
        buggify::reset_stats();

        let mut sim = Simulation::new(SimulationConfig {
            seed: self.seed,
            max_time: self.config.max_time,
        });
        let mut data_rng = sim.rng().fork();
        let dimensions = dst_dimensions();
        let dataset = Dataset::generate(dimensions.clone(), self.config.num_records, &mut data_rng);

        let coordinator_config = CoordinatorConfig {
            default_resolution: self.config.resolution,
            lookup: self.config.lookup,
            ..CoordinatorConfig::test()
        };
        let mut world = match BrushWorld::new(
            &mut sim,
            dimensions,
            dataset,
            &coordinator_config,
            self.config.clone(),
        ) {
            Ok(world) => world,
            Err(e) => {
                let mut result = BrushWorld::empty_result(self.seed);
                result.invariant_violations.push(format!("setup failed: {}", e));
                return result;
            }
        };

        let mut at = 0;
        for _ in 0..self.config.num_operations {
            at += sim.rng().gen_range(1, self.config.max_think_time_ms.max(1) + 1);
            sim.schedule_timer(world.coordinator_host, Duration::from_millis(at));
        }

        sim.run(|sim, event| world.on_event(sim, event));
        world.finish(self.seed)
    }
}

/// Everything the event loop touches besides the simulation itself
struct BrushWorld {
    coordinator: QueryCoordinator<RecordingTransport>,
    consumer: CollectingConsumer,
    engine: SimulatedEngine,
    coordinator_host: HostId,
    engine_host: HostId,
    config: BrushDSTConfig,
    /// Candidate brush endpoints per dimension
    grid: Vec<(String, Vec<f64>)>,
    stats: BrushDSTResult,
}

impl BrushWorld {
    fn new(
        sim: &mut Simulation,
        dimensions: Vec<Dimension>,
        dataset: Dataset,
        coordinator_config: &CoordinatorConfig,
        config: BrushDSTConfig,
    ) -> Result<Self, CoordinatorError> {
        let coordinator_host = sim.add_host("coordinator");
        let engine_host = sim.add_host("engine");

        let grid = dimensions
            .iter()
            .map(|d| {
                let range = d.range();
                let points = (0..=10)
                    .map(|k| range.low() + range.width() * k as f64 / 10.0)
                    .collect();
                (d.name().to_string(), points)
            })
            .collect();

        let resolutions: Vec<ResolutionSpec> = dimensions
            .iter()
            .map(|d| ResolutionSpec::new(d.name(), config.resolution))
            .collect();

        let mut coordinator =
            QueryCoordinator::new(dimensions, coordinator_config, RecordingTransport::new())?;
        let consumer = CollectingConsumer::new();
        coordinator.set_consumer(Box::new(consumer.clone()));
        coordinator.init(&resolutions)?;

        // The handshake is not part of what is being tested; deliver it
        // directly and without faults.
        let mut engine = SimulatedEngine::new(dataset);
        {
            let _guard = crate::suppress_buggify!();
            for message in coordinator.transport_mut().drain() {
                engine.handle(&message, sim.rng());
            }
        }

        Ok(BrushWorld {
            coordinator,
            consumer,
            engine,
            coordinator_host,
            engine_host,
            config,
            grid,
            stats: Self::empty_result(0),
        })
    }

    fn empty_result(seed: u64) -> BrushDSTResult {
        BrushDSTResult {
            seed,
            operations: 0,
            cache_hits: 0,
            switches: 0,
            requests_sent: 0,
            results_received: 0,
            stale_results: 0,
            emissions: 0,
            warnings: 0,
            corrupted_results: 0,
            invariant_violations: Vec::new(),
        }
    }

    fn violation(&mut self, sim: &Simulation, message: String) {
        self.stats
            .invariant_violations
            .push(format!("[{}] {}", sim.current_time(), message));
    }

    fn on_event(&mut self, sim: &mut Simulation, event: &Event) {
        match &event.event_type {
            EventType::Timer(_) if event.host_id == self.coordinator_host => {
                self.run_operation(sim);
                self.flush_requests(sim);
            }
            EventType::NetworkMessage(msg) if event.host_id == self.engine_host => {
                self.engine_receive(sim, &msg.payload);
            }
            EventType::NetworkMessage(msg) if event.host_id == self.coordinator_host => {
                self.coordinator_receive(sim, &msg.payload);
            }
            _ => {}
        }
        self.coordinator.verify_invariants();
    }

    fn random_dimension(&self, sim: &mut Simulation) -> String {
        let names: Vec<&str> = self.coordinator.dimensions().iter().map(|d| d.name()).collect();
        let pick = sim.rng().gen_range(0, names.len() as u64) as usize;
        names[pick].to_string()
    }

    fn random_value(&self, sim: &mut Simulation, dimension: &str) -> f64 {
        let points = self
            .grid
            .iter()
            .find(|(name, _)| name == dimension)
            .map(|(_, points)| points.as_slice())
            .unwrap_or(&[]);
        if points.is_empty() {
            return 0.0;
        }
        points[sim.rng().gen_range(0, points.len() as u64) as usize]
    }

    fn random_interval(&self, sim: &mut Simulation, dimension: &str) -> Option<Interval> {
        let a = self.random_value(sim, dimension);
        let b = self.random_value(sim, dimension);
        Interval::new(a.min(b), a.max(b)).ok()
    }

    fn run_operation(&mut self, sim: &mut Simulation) {
        self.stats.operations += 1;
        let roll = sim.rng().gen_range(0, 100);
        let dimension = if roll < 55 {
            self.coordinator.active_dimension().to_string()
        } else {
            self.random_dimension(sim)
        };

        match roll {
            0..=79 => {
                let Some(range) = self.random_interval(sim, &dimension) else {
                    return;
                };
                let before = self.consumer.emission_count();
                let forward = roll < 75;
                let result = if forward {
                    self.coordinator.set_range(&dimension, range)
                } else {
                    self.coordinator.set_state(&dimension, range)
                };
                match result {
                    Ok(resolution) => self.check_resolution(sim, &resolution, before),
                    Err(e) => self.violation(sim, format!("brush on {} failed: {}", dimension, e)),
                }
            }
            80..=91 => {
                let value = self.random_value(sim, &dimension);
                if let Err(e) = self.coordinator.load(&dimension, value) {
                    self.violation(sim, format!("load failed: {}", e));
                }
            }
            _ => {
                let value = self.random_value(sim, &dimension);
                if let Err(e) = self.coordinator.preload(&dimension, value) {
                    self.violation(sim, format!("preload failed: {}", e));
                }
            }
        }
    }

    fn check_resolution(&mut self, sim: &Simulation, resolution: &Resolution, before: usize) {
        let emitted = self.consumer.emissions_since(before);
        if resolution.switched {
            self.stats.switches += 1;
            if !self.coordinator.cache().is_empty() {
                self.violation(sim, "cache not empty after dimension switch".to_string());
            }
            if !emitted.is_empty() {
                self.violation(sim, "emission right after dimension switch".to_string());
            }
        }
        if resolution.is_hit() {
            self.stats.cache_hits += 1;
        }

        let names: Vec<&str> = emitted.iter().map(|e| e.dimension.as_str()).collect();
        if names != resolution.emitted {
            self.violation(
                sim,
                format!("emitted {:?} but reported {:?}", names, resolution.emitted),
            );
        }
        let (low, high) = resolution.scaled_range;
        self.check_emissions(sim, &emitted, low, high, &resolution.warnings);
    }

    fn check_emissions(
        &mut self,
        sim: &Simulation,
        emitted: &[Emission],
        low: ScaledIndex,
        high: ScaledIndex,
        warnings: &[IntegrityWarning],
    ) {
        self.stats.emissions += emitted.len();
        self.stats.warnings += warnings.len();
        let active = self.coordinator.active_dimension().to_string();

        for emission in emitted {
            let flagged = warnings.iter().any(|w| w.dimension == emission.dimension);
            let negative = emission.data.iter().any(|v| *v < 0.0);
            if negative != flagged {
                self.violation(
                    sim,
                    format!(
                        "{} emission negative={} but flagged={}",
                        emission.dimension, negative, flagged
                    ),
                );
            }

            if self.config.corrupting_engine() {
                continue;
            }
            if flagged {
                self.violation(sim, format!("warning for {} without corruption", emission.dimension));
            }
            let truth = self.engine.range_histogram(&active, low, high, &emission.dimension);
            if truth.as_deref() != Some(emission.data.as_slice()) {
                self.violation(
                    sim,
                    format!(
                        "{} over {} [{}, {}]: emitted {:?}, expected {:?}",
                        emission.dimension, active, low, high, emission.data, truth
                    ),
                );
            }
        }
    }

    fn flush_requests(&mut self, sim: &mut Simulation) {
        for message in self.coordinator.transport_mut().drain() {
            let payload = match message.to_bytes() {
                Ok(payload) => payload,
                Err(e) => {
                    self.violation(sim, format!("encode failed: {}", e));
                    continue;
                }
            };
            self.stats.requests_sent += 1;
            sim.send_message(self.coordinator_host, self.engine_host, payload);
        }
    }

    fn engine_receive(&mut self, sim: &mut Simulation, payload: &[u8]) {
        let message = match TransportMessage::from_bytes(payload) {
            Ok(message) => message,
            Err(e) => {
                self.violation(sim, format!("engine decode failed: {}", e));
                return;
            }
        };

        let base_extra = if message.is_background() {
            self.config.preload_delay_ms
        } else {
            0
        };
        for result in self.engine.handle(&message, sim.rng()) {
            let mut extra = base_extra;
            if crate::buggify!(sim.rng(), faults::engine::SLOW_RESULT) {
                extra += sim.rng().gen_range(100, 300);
            }
            match result.to_bytes() {
                Ok(bytes) => {
                    sim.send_message_after(
                        self.engine_host,
                        self.coordinator_host,
                        bytes,
                        Duration::from_millis(extra),
                    );
                }
                Err(e) => self.violation(sim, format!("result encode failed: {}", e)),
            }
        }
    }

    fn coordinator_receive(&mut self, sim: &mut Simulation, payload: &[u8]) {
        let result = match ResultMessage::from_bytes(payload) {
            Ok(result) => result,
            Err(e) => {
                self.violation(sim, format!("coordinator decode failed: {}", e));
                return;
            }
        };
        self.stats.results_received += 1;

        let active = self.coordinator.active_dimension().to_string();
        let cache_len = self.coordinator.cache().len();
        let before = self.consumer.emission_count();
        let computed_for = result.active_dimension.clone();
        let dimension = result.dimension.clone();

        match self.coordinator.handle_result(result) {
            Ok(ResultOutcome::Stale) => {
                self.stats.stale_results += 1;
                if computed_for == active {
                    self.violation(sim, format!("result for active {} dropped as stale", active));
                }
                if self.coordinator.cache().len() != cache_len {
                    self.violation(sim, "stale result changed the cache".to_string());
                }
                if self.consumer.emission_count() != before {
                    self.violation(sim, "stale result emitted".to_string());
                }
            }
            Ok(ResultOutcome::Stored) => {
                if self.consumer.emission_count() != before {
                    self.violation(sim, "stored result emitted".to_string());
                }
            }
            Ok(ResultOutcome::Emitted { warning }) => {
                let emitted = self.consumer.emissions_since(before);
                if emitted.len() != 1 || emitted[0].dimension != dimension {
                    self.violation(
                        sim,
                        format!("result for {} produced {} emissions", dimension, emitted.len()),
                    );
                }
                match self.coordinator.scaled_range(&active) {
                    Ok((low, high)) => {
                        let warnings: Vec<IntegrityWarning> = warning.into_iter().collect();
                        self.check_emissions(sim, &emitted, low, high, &warnings);
                    }
                    Err(e) => self.violation(sim, format!("no range for {}: {}", active, e)),
                }
            }
            Ok(ResultOutcome::UnknownDimension) => {
                self.violation(sim, format!("engine produced unknown dimension {}", dimension));
            }
            Err(e) => self.violation(sim, format!("result intake failed: {}", e)),
        }
    }

    fn finish(mut self, seed: u64) -> BrushDSTResult {
        if self.consumer.emission_count() != self.stats.emissions {
            self.stats.invariant_violations.push(format!(
                "consumer saw {} emissions, harness counted {}",
                self.consumer.emission_count(),
                self.stats.emissions
            ));
        }
        if self.consumer.warning_count() > 0 && !self.config.corrupting_engine() {
            self.stats.invariant_violations.push(format!(
                "{} integrity warnings without corruption",
                self.consumer.warning_count()
            ));
        }
        self.stats.seed = seed;
        self.stats.corrupted_results = self.engine.corrupted();
        self.stats
    }
}

/// Run a batch of DST tests across multiple seeds
pub fn run_brush_dst_batch(seeds: std::ops::Range<u64>, config: BrushDSTConfig) -> Vec<BrushDSTResult> {
    seeds
        .map(|seed| BrushDSTHarness::new(seed, config.clone()).run())
        .collect()
}

/// Summarize batch results
pub fn summarize_brush_dst_batch(results: &[BrushDSTResult]) -> String {
    let total = results.len();
    let passed = results.iter().filter(|r| r.is_success()).count();
    let failed = total - passed;

    let emissions: usize = results.iter().map(|r| r.emissions).sum();
    let hits: usize = results.iter().map(|r| r.cache_hits).sum();
    let stale: usize = results.iter().map(|r| r.stale_results).sum();
    let switches: usize = results.iter().map(|r| r.switches).sum();

    let mut summary = format!(
        "Brush DST Batch: {}/{} passed ({} failed)\n\
         Emissions: {}, Cache hits: {}, Stale results: {}, Switches: {}",
        passed, total, failed, emissions, hits, stale, switches
    );

    if failed > 0 {
        summary.push_str("\n\nFailed seeds:");
        for r in results.iter().filter(|r| !r.is_success()) {
            summary.push_str(&format!(
                "\n  Seed {}: {}",
                r.seed,
                r.invariant_violations.first().map(String::as_str).unwrap_or("unknown")
            ));
        }
    }

    summary
}
