use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Wait that grows with the number of reveal actions already performed.
///
/// `wait = base + base * growth^(actions / step)` with integer division, so the
/// wait only grows once every `step` actions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayPolicy {
    pub growth: f64,
    pub step: u32,
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self {
            growth: 1.2,
            step: 10,
        }
    }
}

impl DelayPolicy {
    pub fn wait(&self, base_secs: f64, actions: u32) -> Duration {
        if base_secs <= 0.0 || !base_secs.is_finite() {
            return Duration::ZERO;
        }
        let exponent = (actions / self.step.max(1)) as i32;
        let secs = base_secs + base_secs * self.growth.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}
