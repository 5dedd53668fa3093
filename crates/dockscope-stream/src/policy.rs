use std::time::Duration;

/// Exponential backoff for reconnect attempts
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first attempt
    pub base_delay: Duration,

    /// Growth factor applied per attempt
    pub multiplier: f64,

    /// Attempts made before giving up
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(2000),
            multiplier: 1.5,
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before attempt `attempt` (1-based): `base * multiplier^(attempt-1)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let millis = self.base_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        Duration::from_millis(millis.max(0.0).round() as u64)
    }

    /// Whether another attempt may follow `attempts` already made
    pub fn allows_another(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

/// Delay in whole seconds as announced to users
pub fn announced_seconds(delay: Duration) -> u64 {
    (delay.as_millis() as f64 / 1000.0).round() as u64
}
