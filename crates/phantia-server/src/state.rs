use std::time::Instant;

use phantia_core::Coordinator;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Coordinator,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(coordinator: Coordinator) -> Self {
        Self {
            coordinator,
            started_at: Instant::now(),
        }
    }
}
