//! Rolling validation counters owned by the orchestrator
//!
//! The counters are plain data; the orchestrator serializes every mutation
//! through its engine-state lock, so one batch is always applied atomically.

use crate::types::{Timestamp, ValidationResult, ValidationStatus};
use log::debug;
use serde::{Deserialize, Serialize};

/// Rolling counters across every batch this engine has run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationStatistics {
    pub total_validations: u64,
    pub passed: u64,
    pub failed: u64,
    pub warnings: u64,
    /// Weighted running mean of validator duration, in milliseconds
    pub average_duration: f64,
    pub last_run: Option<Timestamp>,
    /// passed / total × 100; 100 before any validation has run
    pub uptime: f64,
}

impl ValidationStatistics {
    pub fn new() -> Self {
        Self {
            uptime: 100.0,
            ..Self::default()
        }
    }

    /// Fold one batch of results into the counters
    ///
    /// The running mean is weighted by the number of validations on each side,
    /// so a batch of five moves the average five times as far as a single run.
    pub fn record_batch(&mut self, results: &[ValidationResult], finished_at: Timestamp) {
        if results.is_empty() {
            self.last_run = Some(finished_at);
            return;
        }

        let previous_total = self.total_validations;
        let batch_size = results.len() as u64;
        let batch_duration: f64 = results.iter().map(|r| r.duration as f64).sum();

        for result in results {
            match result.status {
                ValidationStatus::Passed => self.passed += 1,
                ValidationStatus::Warning => self.warnings += 1,
                ValidationStatus::Failed => self.failed += 1,
            }
        }

        self.total_validations = previous_total + batch_size;
        self.average_duration = (self.average_duration * previous_total as f64 + batch_duration)
            / self.total_validations as f64;
        self.last_run = Some(finished_at);
        self.uptime = self.compute_uptime();

        debug!(
            "Statistics updated: total={}, passed={}, warnings={}, failed={}, avg_duration={:.1}ms",
            self.total_validations, self.passed, self.warnings, self.failed, self.average_duration
        );
    }

    fn compute_uptime(&self) -> f64 {
        if self.total_validations == 0 {
            100.0
        } else {
            self.passed as f64 / self.total_validations as f64 * 100.0
        }
    }

    /// Seconds since the last run, if there has been one
    pub fn last_run_age_secs(&self, now: Timestamp) -> Option<i64> {
        self.last_run.map(|last| (now - last).num_seconds().max(0))
    }
}
