//! Per-message rollout percentiles

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use rand::Rng;

/// Stable random bucket per message for staged rollouts
///
/// The first call for a message id assigns a value in `[0, 1)`; every later
/// call returns the same value. Implementations that persist must do the
/// read-or-assign atomically per id.
pub trait PercentileStore: Send + Sync {
    /// Percentile assigned to `message_id`
    fn percentile(&self, message_id: &str) -> f32;
}

/// [`PercentileStore`] kept in memory for the lifetime of the process
#[derive(Debug, Default)]
pub struct InMemoryPercentileStore {
    percentiles: Mutex<HashMap<String, f32>>,
}

impl InMemoryPercentileStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with existing assignments
    #[must_use]
    pub fn with_percentiles(percentiles: HashMap<String, f32>) -> Self {
        Self {
            percentiles: Mutex::new(percentiles),
        }
    }

    /// Snapshot of all assignments, for persisting elsewhere
    #[must_use]
    pub fn percentiles(&self) -> HashMap<String, f32> {
        self.percentiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PercentileStore for InMemoryPercentileStore {
    fn percentile(&self, message_id: &str) -> f32 {
        let mut percentiles = self
            .percentiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *percentiles
            .entry(message_id.to_string())
            .or_insert_with(|| {
                let value = rand::rng().random::<f32>();
                tracing::debug!(message_id, percentile = value, "Assigned rollout percentile");
                value
            })
    }
}
