//! Metric trackers for early stopping and best-checkpoint selection

use crate::stage::{CheckpointPolicy, EarlyStoppingPolicy, MonitorMode};

/// Stops a stage when the monitored metric plateaus
///
/// Counts consecutive validation events without improvement and signals a
/// stop once `patience` of them have been seen.
///
/// # Example
///
/// ```rust
/// use aproximar::stage::{EarlyStoppingPolicy, MonitorMode};
/// use aproximar::train::EarlyStopping;
///
/// let mut es = EarlyStopping::new(&EarlyStoppingPolicy {
///     monitor: "val_loss".into(),
///     mode: MonitorMode::Min,
///     patience: 2,
///     min_delta: 0.0,
/// });
/// assert!(!es.observe(1.0));
/// assert!(!es.observe(1.0));
/// assert!(es.observe(1.0));
/// ```
#[derive(Clone, Debug)]
pub struct EarlyStopping {
    monitor: String,
    mode: MonitorMode,
    /// Non-improving events tolerated
    patience: usize,
    /// Minimum improvement to reset patience
    min_delta: f64,
    best: Option<f64>,
    events_without_improvement: usize,
}

impl EarlyStopping {
    pub fn new(policy: &EarlyStoppingPolicy) -> Self {
        Self {
            monitor: policy.monitor.clone(),
            mode: policy.mode,
            patience: policy.patience,
            min_delta: policy.min_delta,
            best: None,
            events_without_improvement: 0,
        }
    }

    pub fn monitor(&self) -> &str {
        &self.monitor
    }

    pub fn best(&self) -> Option<f64> {
        self.best
    }

    pub fn events_without_improvement(&self) -> usize {
        self.events_without_improvement
    }

    /// Record one validation event; returns `true` when the stage must stop.
    pub fn observe(&mut self, value: f64) -> bool {
        if self.mode.improves(value, self.best, self.min_delta) {
            self.best = Some(value);
            self.events_without_improvement = 0;
            false
        } else {
            self.events_without_improvement += 1;
            self.events_without_improvement >= self.patience
        }
    }
}

/// Tracks the best value of the checkpoint monitor
///
/// Only strict improvements count; an exact tie keeps the earlier checkpoint.
#[derive(Clone, Debug)]
pub struct BestTracker {
    monitor: String,
    mode: MonitorMode,
    best: Option<f64>,
}

impl BestTracker {
    pub fn new(policy: &CheckpointPolicy) -> Self {
        Self {
            monitor: policy.monitor.clone(),
            mode: policy.mode,
            best: None,
        }
    }

    pub fn monitor(&self) -> &str {
        &self.monitor
    }

    pub fn best(&self) -> Option<f64> {
        self.best
    }

    /// Whether `value` should replace the current best checkpoint.
    pub fn offer(&mut self, value: f64) -> bool {
        if self.mode.improves(value, self.best, 0.0) {
            self.best = Some(value);
            true
        } else {
            false
        }
    }
}
