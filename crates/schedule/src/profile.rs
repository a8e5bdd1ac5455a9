use crate::graph::TaskId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Scheduler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Record per-task render times.
    pub profiling: bool,
    /// Weight of the running average against each new sample.
    pub smoothing_weight: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            profiling: false,
            smoothing_weight: 20,
        }
    }
}

/// Per-task moving average of render time, in milliseconds.
///
/// Each sample updates the average as `(avg * w + sample) / (w + 1)`; the
/// first sample for a task becomes its average.
#[derive(Debug, Clone)]
pub struct Profiler {
    weight: f64,
    averages: HashMap<TaskId, f64>,
}

impl Profiler {
    pub fn new(smoothing_weight: u32) -> Self {
        Self {
            weight: f64::from(smoothing_weight),
            averages: HashMap::new(),
        }
    }

    pub fn record(&mut self, id: TaskId, elapsed: Duration) -> f64 {
        self.record_ms(id, elapsed.as_secs_f64() * 1000.0)
    }

    pub fn record_ms(&mut self, id: TaskId, sample: f64) -> f64 {
        let weight = self.weight;
        let avg = self
            .averages
            .entry(id)
            .and_modify(|avg| *avg = (*avg * weight + sample) / (weight + 1.0))
            .or_insert(sample);
        *avg
    }

    pub fn average(&self, id: TaskId) -> Option<f64> {
        self.averages.get(&id).copied()
    }

    pub fn forget(&mut self, id: TaskId) {
        self.averages.remove(&id);
    }

    pub fn reset(&mut self) {
        self.averages.clear();
    }

    pub fn len(&self) -> usize {
        self.averages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.averages.is_empty()
    }
}
