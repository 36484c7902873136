use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

pub enum Value {
    Text(String),
    List(VecDeque<String>),
}

pub struct Entry {
    pub value: Value,
    pub expires_at: Option<Instant>, // None: persistent
}

impl Entry {
    pub fn text(value: impl Into<String>, ttl: Option<Duration>, now: Instant) -> Self {
        Self {
            value: Value::Text(value.into()),
            expires_at: ttl.map(|d| now + d),
        }
    }

    pub fn empty_list() -> Self {
        Self {
            value: Value::List(VecDeque::new()),
            expires_at: None,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    /// Remaining lifetime rounded to whole seconds, as Redis TTL reports it.
    pub fn ttl_secs(&self, now: Instant) -> Option<u64> {
        let at = self.expires_at?;
        let ms = at.saturating_duration_since(now).as_millis() as u64;
        Some((ms + 500) / 1000)
    }
}
