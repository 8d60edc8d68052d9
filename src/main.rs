use brush_cache::coordinator::{
    CollectingConsumer, QueryCoordinator, RecordingTransport, ResultMessage, TransportMessage,
};
use brush_cache::simulator::{run_brush_dst_batch, summarize_brush_dst_batch, BrushDSTConfig};
use brush_cache::{observability, CoordinatorConfig, Dimension, Interval, ScaledIndex};
use std::error::Error;
use tracing::info;

fn main() -> Result<(), Box<dyn Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => CoordinatorConfig::load(path)?,
        None => CoordinatorConfig::default(),
    }
    .with_env_overrides()?;
    observability::init_tracing(&config.logging)?;

    println!("=== Brush Range-Query Cache ===\n");

    let (mut coordinator, consumer) = build_coordinator(&config)?;
    scenario_cold_brush(&mut coordinator, &consumer)?;
    scenario_warm_brush(&mut coordinator, &consumer)?;
    scenario_dimension_switch(&mut coordinator, &consumer)?;
    run_dst();

    println!("\n=== All scenarios completed ===");
    Ok(())
}

fn build_coordinator(
    config: &CoordinatorConfig,
) -> Result<(QueryCoordinator<RecordingTransport>, CollectingConsumer), Box<dyn Error>> {
    let dimensions = vec![
        Dimension::new("X", Interval::new(0.0, 100.0)?, 10)?.with_title("Departure delay"),
        Dimension::new("Y", Interval::new(0.0, 10.0)?, 10)?.with_title("Arrival delay"),
        Dimension::new("Z", Interval::new(0.0, 24.0)?, 6)?.with_title("Hour of day"),
    ];
    let mut coordinator = QueryCoordinator::new(dimensions, config, RecordingTransport::new())?;
    let consumer = CollectingConsumer::new();
    coordinator.set_consumer(Box::new(consumer.clone()));
    Ok((coordinator, consumer))
}

fn scenario_cold_brush(
    coordinator: &mut QueryCoordinator<RecordingTransport>,
    consumer: &CollectingConsumer,
) -> Result<(), Box<dyn Error>> {
    println!("--- Scenario 1: Cold brush ---");

    let resolution = coordinator.set_range("X", Interval::new(20.0, 80.0)?)?;
    println!(
        "  Brush X [20, 80] -> indices [{}, {}], pending {:?}",
        resolution.scaled_range.0, resolution.scaled_range.1, resolution.pending
    );
    for message in coordinator.transport_mut().drain() {
        println!("  -> {}", String::from_utf8_lossy(&message.to_bytes()?));
    }

    let results = [
        ResultMessage::new("X", "Y", ScaledIndex(20), vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0, 2.0, 3.0, 3.0, 4.0]),
        ResultMessage::new("X", "Y", ScaledIndex(80), vec![0.0, 1.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 8.0, 9.0]),
    ];
    for result in results {
        let outcome = coordinator.handle_result(result)?;
        println!("  <- result: {:?}", outcome);
    }

    if let Some(data) = consumer.last_for("Y") {
        draw("Y", coordinator, &data);
    }
    println!();
    Ok(())
}

fn scenario_warm_brush(
    coordinator: &mut QueryCoordinator<RecordingTransport>,
    consumer: &CollectingConsumer,
) -> Result<(), Box<dyn Error>> {
    println!("--- Scenario 2: Same brush again ---");

    let before = consumer.emission_count();
    let resolution = coordinator.set_state("X", Interval::new(20.0, 80.0)?)?;
    let point_queries = coordinator
        .transport()
        .sent()
        .iter()
        .filter(|m| matches!(m, TransportMessage::Load { .. } | TransportMessage::Preload { .. }))
        .count();
    println!(
        "  Emitted {:?} from cache ({} new emissions, {} point queries)",
        resolution.emitted,
        consumer.emission_count() - before,
        point_queries
    );
    println!();
    Ok(())
}

fn scenario_dimension_switch(
    coordinator: &mut QueryCoordinator<RecordingTransport>,
    consumer: &CollectingConsumer,
) -> Result<(), Box<dyn Error>> {
    println!("--- Scenario 3: Switch to Z ---");

    let cached = coordinator.cache().len();
    let before = consumer.emission_count();
    let resolution = coordinator.set_state("Z", Interval::new(4.8, 19.2)?)?;
    println!(
        "  Switched: {}, dropped {} entries, cache now {} entries",
        resolution.switched,
        cached,
        coordinator.cache().len()
    );
    println!(
        "  Indices [{}, {}] miss: pending {:?}, {} emissions",
        resolution.scaled_range.0,
        resolution.scaled_range.1,
        resolution.pending,
        consumer.emission_count() - before
    );

    let stale = ResultMessage::new("X", "Y", ScaledIndex(20), vec![0.0; 10]);
    println!("  Late X result: {:?}", coordinator.handle_result(stale)?);
    println!();
    Ok(())
}

fn run_dst() {
    println!("--- Scenario 4: Deterministic simulation ---");
    for (name, config) in [
        ("reliable", BrushDSTConfig::new()),
        ("chaos", BrushDSTConfig::chaos()),
        ("corrupting", BrushDSTConfig::corrupting()),
    ] {
        let results = run_brush_dst_batch(0..10, config);
        info!("DST {} finished", name);
        println!("  [{}] {}", name, summarize_brush_dst_batch(&results).replace('\n', "\n    "));
    }
}

/// One text bar per bin
fn draw(dimension: &str, coordinator: &QueryCoordinator<RecordingTransport>, data: &[f64]) {
    let Some(dim) = coordinator.dimension(dimension) else {
        return;
    };
    let max = data.iter().cloned().fold(0.0, f64::max).max(1.0);
    println!("  {}:", dim.title());
    for (bin, count) in data.iter().enumerate() {
        let (start, end) = dim.bin_extent(bin);
        let width = (count.max(0.0) / max * 30.0).round() as usize;
        println!("    [{:>5.1}, {:>5.1}) {:<30} {}", start, end, "#".repeat(width), count);
    }
}
