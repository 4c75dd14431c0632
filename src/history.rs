use crate::types::AggregateResult;
use std::collections::{BTreeMap, VecDeque};

pub const HISTORY_CAPACITY: usize = 10;

/// Rolling window of successful run averages per endpoint, oldest first
#[derive(Debug, Default)]
pub struct HistoryStore {
    entries: BTreeMap<String, VecDeque<f64>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, endpoint: &str, value: f64) {
        let window = self.entries.entry(endpoint.to_string()).or_default();
        push_bounded(window, value, HISTORY_CAPACITY);
    }

    /// Appends the average of every non-error result; failed endpoints keep
    /// their previous window untouched.
    pub fn record_batch(&mut self, results: &[AggregateResult]) {
        for result in results.iter().filter(|r| !r.error) {
            if let Some(average) = result.average {
                self.record(&result.endpoint, average);
            }
        }
    }

    pub fn get(&self, endpoint: &str) -> Vec<f64> {
        self.entries
            .get(endpoint)
            .map(|window| window.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> BTreeMap<String, Vec<f64>> {
        self.entries
            .iter()
            .filter(|(_, window)| !window.is_empty())
            .map(|(endpoint, window)| (endpoint.clone(), window.iter().copied().collect()))
            .collect()
    }
}

/// Appends to a FIFO window, evicting the oldest value once at capacity.
/// A zero-capacity window stays empty.
pub fn push_bounded<T>(window: &mut VecDeque<T>, value: T, capacity: usize) {
    if capacity == 0 {
        window.clear();
        return;
    }
    while window.len() >= capacity {
        window.pop_front();
    }
    window.push_back(value);
}
