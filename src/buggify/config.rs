use super::faults;
use std::collections::HashMap;

/// Per-fault trigger probabilities
#[derive(Debug, Clone)]
pub struct FaultConfig {
    pub enabled: bool,
    probabilities: HashMap<String, f64>,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

impl FaultConfig {
    /// Enabled, with every named fault at zero until set
    pub fn new() -> Self {
        FaultConfig {
            enabled: true,
            probabilities: HashMap::new(),
        }
    }

    pub fn disabled() -> Self {
        FaultConfig {
            enabled: false,
            probabilities: HashMap::new(),
        }
    }

    /// Occasional transport trouble; engine data stays correct
    pub fn moderate() -> Self {
        Self::new()
            .with(faults::network::PACKET_DROP, 0.05)
            .with(faults::network::DUPLICATE, 0.02)
            .with(faults::network::DELAY, 0.05)
            .with(faults::engine::SLOW_RESULT, 0.05)
    }

    /// Heavy transport trouble; engine data stays correct
    pub fn chaos() -> Self {
        Self::new()
            .with(faults::network::PACKET_DROP, 0.20)
            .with(faults::network::DUPLICATE, 0.10)
            .with(faults::network::DELAY, 0.20)
            .with(faults::engine::SLOW_RESULT, 0.15)
    }

    pub fn with(mut self, fault_id: &str, probability: f64) -> Self {
        self.set(fault_id, probability);
        self
    }

    pub fn set(&mut self, fault_id: &str, probability: f64) {
        self.probabilities
            .insert(fault_id.to_string(), probability.clamp(0.0, 1.0));
    }

    /// Effective probability; zero when disabled or unset
    pub fn get(&self, fault_id: &str) -> f64 {
        if !self.enabled {
            return 0.0;
        }
        self.probabilities.get(fault_id).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_reports_zero() {
        let config = FaultConfig::moderate();
        assert!(config.get(faults::network::PACKET_DROP) > 0.0);

        let mut off = config.clone();
        off.enabled = false;
        assert_eq!(off.get(faults::network::PACKET_DROP), 0.0);
    }

    #[test]
    fn test_presets_keep_engine_data_correct() {
        for config in [FaultConfig::moderate(), FaultConfig::chaos()] {
            assert_eq!(config.get(faults::engine::NON_MONOTONIC), 0.0);
        }
    }

    #[test]
    fn test_set_clamps() {
        let config = FaultConfig::new().with("x", 3.0);
        assert_eq!(config.get("x"), 1.0);
    }
}
