//! Fixed-window rate limiter
//!
//! The window expiry is attached by the same store step that increments, and
//! only when the counter has none, which pins the window to its first use.
//! Resetting it on every increment would turn this into a rolling window.

use std::sync::Arc;

use phantia_shared::config::RateLimitSettings;
use tracing::{debug, warn};

use crate::error::StateError;
use crate::keys::{KeyKind, KeySpace};
use crate::store::KeyValueStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { count: u64, remaining: u64 },
    Limited { count: u64 },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }

    pub fn count(&self) -> u64 {
        match *self {
            RateDecision::Allowed { count, .. } | RateDecision::Limited { count } => count,
        }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
    keys: KeySpace,
    settings: RateLimitSettings,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KeyValueStore>, keys: KeySpace, settings: RateLimitSettings) -> Self {
        Self {
            store,
            keys,
            settings,
        }
    }

    pub async fn increment(&self, identifier: &str) -> Result<u64, StateError> {
        self.increment_in_window(identifier, self.settings.window_secs).await
    }

    /// INCR with the window expiry applied in the same step. A counter left
    /// without an expiry gets one on its next increment.
    pub async fn increment_in_window(
        &self,
        identifier: &str,
        window_secs: u64,
    ) -> Result<u64, StateError> {
        let key = self.keys.key(KeyKind::Rate, identifier)?;
        let raw = self.store.incr_in_window(&key, window_secs).await?;
        let count = u64::try_from(raw).map_err(|_| StateError::Corrupt {
            key: key.clone(),
            reason: format!("negative counter {}", raw),
        })?;
        if count == 1 {
            debug!("Rate window opened: {} ({}s)", key, window_secs);
        }
        Ok(count)
    }

    pub async fn check(&self, identifier: &str) -> Result<bool, StateError> {
        self.check_against(identifier, self.settings.max_requests).await
    }

    /// Read-only: true if the counter is absent or below `max_requests`.
    ///
    /// Pairing this with a later `increment` is racy under concurrency; use
    /// [`RateLimiter::hit`] to gate and record in one step.
    pub async fn check_against(&self, identifier: &str, max_requests: u64) -> Result<bool, StateError> {
        let key = self.keys.key(KeyKind::Rate, identifier)?;
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(true);
        };
        let count: u64 = raw.trim().parse().map_err(|_| StateError::Corrupt {
            key: key.clone(),
            reason: format!("non-numeric counter {:?}", raw),
        })?;
        Ok(count < max_requests)
    }

    pub async fn hit(&self, identifier: &str) -> Result<RateDecision, StateError> {
        self.hit_with(identifier, self.settings.window_secs, self.settings.max_requests)
            .await
    }

    /// Increment and compare in one step. Each INCR returns a distinct count,
    /// so exactly `max_requests` callers per window are admitted even under
    /// concurrency; the stored counter itself may run past the limit.
    pub async fn hit_with(
        &self,
        identifier: &str,
        window_secs: u64,
        max_requests: u64,
    ) -> Result<RateDecision, StateError> {
        let count = self.increment_in_window(identifier, window_secs).await?;
        if count <= max_requests {
            Ok(RateDecision::Allowed {
                count,
                remaining: max_requests - count,
            })
        } else {
            warn!("Rate limit exceeded for {} ({} > {})", identifier, count, max_requests);
            Ok(RateDecision::Limited { count })
        }
    }
}
