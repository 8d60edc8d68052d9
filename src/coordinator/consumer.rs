//! Consumers of combined range histograms.
//!
//! Everything handed to a consumer is already a range histogram (difference
//! of two cumulative boundaries), never raw cumulative data.

use crate::cache::IntegrityWarning;
use ahash::AHashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

pub trait ResultConsumer: Send {
    /// New histogram for `dimension`, one value per bin
    fn on_range_histogram(&mut self, dimension: &str, data: &[f64]);

    /// Combined data was not monotonic. Called after the histogram itself
    /// has been delivered.
    fn on_integrity_warning(&mut self, _warning: &IntegrityWarning) {}
}

/// Adapts a closure into a consumer
pub struct FnConsumer<F> {
    callback: F,
}

impl<F> FnConsumer<F>
where
    F: FnMut(&str, &[f64]) + Send,
{
    pub fn new(callback: F) -> Self {
        FnConsumer { callback }
    }
}

impl<F> ResultConsumer for FnConsumer<F>
where
    F: FnMut(&str, &[f64]) + Send,
{
    fn on_range_histogram(&mut self, dimension: &str, data: &[f64]) {
        (self.callback)(dimension, data)
    }
}

/// A delivered range histogram
#[derive(Debug, Clone, PartialEq)]
pub struct Emission {
    pub dimension: String,
    pub data: Vec<f64>,
}

/// Records everything it receives. Clones share the same log, so one clone
/// can be handed to the coordinator while another is inspected.
#[derive(Debug, Clone, Default)]
pub struct CollectingConsumer {
    emissions: Arc<Mutex<Vec<Emission>>>,
    warnings: Arc<Mutex<Vec<IntegrityWarning>>>,
}

impl CollectingConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emissions(&self) -> Vec<Emission> {
        self.emissions.lock().clone()
    }

    pub fn emission_count(&self) -> usize {
        self.emissions.lock().len()
    }

    /// Emissions recorded after the first `start`
    pub fn emissions_since(&self, start: usize) -> Vec<Emission> {
        self.emissions.lock().iter().skip(start).cloned().collect()
    }

    pub fn last_for(&self, dimension: &str) -> Option<Vec<f64>> {
        self.emissions
            .lock()
            .iter()
            .rev()
            .find(|e| e.dimension == dimension)
            .map(|e| e.data.clone())
    }

    pub fn warnings(&self) -> Vec<IntegrityWarning> {
        self.warnings.lock().clone()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.lock().len()
    }
}

impl ResultConsumer for CollectingConsumer {
    fn on_range_histogram(&mut self, dimension: &str, data: &[f64]) {
        self.emissions.lock().push(Emission {
            dimension: dimension.to_string(),
            data: data.to_vec(),
        });
    }

    fn on_integrity_warning(&mut self, warning: &IntegrityWarning) {
        self.warnings.lock().push(warning.clone());
    }
}

/// A chart that draws one bar per bin
pub trait HistogramView: Send {
    fn update(&mut self, data: &[f64]);
}

/// Routes each emission to the view registered for its dimension
#[derive(Default)]
pub struct ViewRouter {
    views: AHashMap<String, Box<dyn HistogramView>>,
    unrouted: u64,
}

impl ViewRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, dimension: impl Into<String>, view: Box<dyn HistogramView>) {
        self.views.insert(dimension.into(), view);
    }

    /// Emissions that arrived for a dimension with no view
    pub fn unrouted(&self) -> u64 {
        self.unrouted
    }
}

impl ResultConsumer for ViewRouter {
    fn on_range_histogram(&mut self, dimension: &str, data: &[f64]) {
        match self.views.get_mut(dimension) {
            Some(view) => view.update(data),
            None => {
                debug!("No view registered for dimension '{}'", dimension);
                self.unrouted += 1;
            }
        }
    }
}
