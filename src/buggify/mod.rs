//! BUGGIFY - deterministic fault injection for the brush simulator
//!
//! Every point where the simulated link or engine could misbehave is a named
//! fault site. Whether a site fires is decided by the simulation's seeded
//! RNG, so a failing seed replays the exact same fault sequence.
//!
//! # Usage
//!
//! ```ignore
//! use crate::buggify::faults;
//!
//! // Configured probability
//! if buggify!(rng, faults::network::PACKET_DROP) {
//!     return; // lose the message
//! }
//!
//! // Explicit probability
//! if buggify!(rng, faults::engine::SLOW_RESULT, 0.10) {
//!     extra_delay += 200;
//! }
//! ```

pub mod config;
pub mod faults;

pub use config::FaultConfig;
pub use faults::ALL_FAULTS;

use crate::simulator::Rng;
use std::cell::RefCell;
use std::collections::HashMap;

/// Check and trigger counts per fault site
#[derive(Debug, Clone, Default)]
pub struct BuggifyStats {
    pub checks: HashMap<String, u64>,
    pub triggers: HashMap<String, u64>,
}

impl BuggifyStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_check(&mut self, fault_id: &str) {
        *self.checks.entry(fault_id.to_string()).or_insert(0) += 1;
    }

    pub fn record_trigger(&mut self, fault_id: &str) {
        *self.triggers.entry(fault_id.to_string()).or_insert(0) += 1;
    }

    pub fn triggered(&self, fault_id: &str) -> u64 {
        self.triggers.get(fault_id).copied().unwrap_or(0)
    }

    pub fn trigger_rate(&self, fault_id: &str) -> f64 {
        let checks = self.checks.get(fault_id).copied().unwrap_or(0);
        if checks == 0 {
            0.0
        } else {
            self.triggered(fault_id) as f64 / checks as f64
        }
    }

    pub fn summary(&self) -> String {
        let mut sorted_faults: Vec<_> = self.checks.keys().collect();
        sorted_faults.sort();

        let mut lines = vec!["BUGGIFY Statistics:".to_string()];
        for fault_id in sorted_faults {
            let checks = self.checks.get(fault_id).copied().unwrap_or(0);
            lines.push(format!(
                "  {}: {}/{} ({:.2}%)",
                fault_id,
                self.triggered(fault_id),
                checks,
                self.trigger_rate(fault_id) * 100.0
            ));
        }
        lines.join("\n")
    }
}

thread_local! {
    static BUGGIFY_CONTEXT: RefCell<BuggifyContext> = RefCell::new(BuggifyContext::default());
}

#[derive(Debug, Default)]
struct BuggifyContext {
    config: FaultConfig,
    stats: BuggifyStats,
    /// When true, all buggify calls return false
    suppressed: bool,
}

/// Set the fault configuration for the current thread
pub fn set_config(config: FaultConfig) {
    BUGGIFY_CONTEXT.with(|ctx| {
        ctx.borrow_mut().config = config;
    });
}

pub fn get_stats() -> BuggifyStats {
    BUGGIFY_CONTEXT.with(|ctx| ctx.borrow().stats.clone())
}

pub fn reset_stats() {
    BUGGIFY_CONTEXT.with(|ctx| {
        ctx.borrow_mut().stats = BuggifyStats::new();
    });
}

/// Disables fault injection until dropped
pub struct BuggifySuppressor {
    previous: bool,
}

impl BuggifySuppressor {
    pub fn new() -> Self {
        let previous = BUGGIFY_CONTEXT.with(|ctx| {
            let mut ctx = ctx.borrow_mut();
            std::mem::replace(&mut ctx.suppressed, true)
        });
        BuggifySuppressor { previous }
    }
}

impl Default for BuggifySuppressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BuggifySuppressor {
    fn drop(&mut self) {
        let previous = self.previous;
        BUGGIFY_CONTEXT.with(|ctx| {
            ctx.borrow_mut().suppressed = previous;
        });
    }
}

/// Returns true if the fault should be injected. Called by `buggify!`.
#[inline]
pub fn should_buggify<R: Rng>(rng: &mut R, fault_id: &str) -> bool {
    BUGGIFY_CONTEXT.with(|ctx| {
        let mut ctx = ctx.borrow_mut();
        ctx.stats.record_check(fault_id);

        if ctx.suppressed {
            return false;
        }
        let prob = ctx.config.get(fault_id);
        if prob <= 0.0 {
            return false;
        }

        let triggered = rng.gen_range(0, 1_000_000) as f64 / 1_000_000.0 < prob;
        if triggered {
            ctx.stats.record_trigger(fault_id);
        }
        triggered
    })
}

/// Like `should_buggify`, with the probability given by the call site
#[inline]
pub fn should_buggify_with_prob<R: Rng>(rng: &mut R, fault_id: &str, probability: f64) -> bool {
    BUGGIFY_CONTEXT.with(|ctx| {
        let mut ctx = ctx.borrow_mut();
        ctx.stats.record_check(fault_id);

        if ctx.suppressed || !ctx.config.enabled {
            return false;
        }

        let triggered =
            rng.gen_range(0, 1_000_000) as f64 / 1_000_000.0 < probability.clamp(0.0, 1.0);
        if triggered {
            ctx.stats.record_trigger(fault_id);
        }
        triggered
    })
}

#[macro_export]
macro_rules! buggify {
    ($rng:expr, $fault_id:expr) => {
        $crate::buggify::should_buggify($rng, $fault_id)
    };
    ($rng:expr, $fault_id:expr, $prob:expr) => {
        $crate::buggify::should_buggify_with_prob($rng, $fault_id, $prob)
    };
}

/// Suppress all buggify calls within a scope
#[macro_export]
macro_rules! suppress_buggify {
    () => {
        $crate::buggify::BuggifySuppressor::new()
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::DeterministicRng;

    #[test]
    fn test_buggify_disabled() {
        set_config(FaultConfig::disabled());
        let mut rng = DeterministicRng::new(1);
        for _ in 0..1000 {
            assert!(!buggify!(&mut rng, faults::network::PACKET_DROP));
            assert!(!buggify!(&mut rng, faults::network::DELAY, 1.0));
        }
    }

    #[test]
    fn test_buggify_with_prob() {
        set_config(FaultConfig::new());
        let mut rng = DeterministicRng::new(2);

        let always = (0..100).filter(|_| buggify!(&mut rng, "test.always", 1.0)).count();
        assert_eq!(always, 100);

        let never = (0..100).filter(|_| buggify!(&mut rng, "test.never", 0.0)).count();
        assert_eq!(never, 0);
    }

    #[test]
    fn test_buggify_stats() {
        reset_stats();
        set_config(FaultConfig::moderate());
        let mut rng = DeterministicRng::new(3);

        for _ in 0..1000 {
            let _ = buggify!(&mut rng, faults::network::PACKET_DROP);
        }

        let stats = get_stats();
        assert_eq!(stats.checks.get(faults::network::PACKET_DROP), Some(&1000));
        // Configured at 5%
        let triggers = stats.triggered(faults::network::PACKET_DROP);
        assert!(triggers > 10 && triggers < 120, "triggers: {}", triggers);
        assert!(stats.summary().contains(faults::network::PACKET_DROP));
    }

    #[test]
    fn test_same_seed_same_faults() {
        set_config(FaultConfig::chaos());
        let run = |seed| {
            let mut rng = DeterministicRng::new(seed);
            (0..200)
                .map(|_| buggify!(&mut rng, faults::network::DELAY))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(11), run(11));
    }

    #[test]
    fn test_buggify_suppression_nests() {
        set_config(FaultConfig::new());
        let mut rng = DeterministicRng::new(4);

        {
            let _outer = suppress_buggify!();
            {
                let _inner = suppress_buggify!();
                assert!(!buggify!(&mut rng, "test.inner", 1.0));
            }
            assert!(!buggify!(&mut rng, "test.outer", 1.0));
        }

        assert!(buggify!(&mut rng, "test.after_suppress", 1.0));
    }
}
