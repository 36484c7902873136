use std::time::Duration;

use phantia_shared::config::StoreSettings;

/// Capped exponential backoff for connection acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &StoreSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base: Duration::from_millis(settings.retry_base_ms),
            cap: Duration::from_millis(settings.retry_max_ms),
        }
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`, capped.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.cap)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&StoreSettings::default())
    }
}
