//! Domain validators
//!
//! Each validator turns one domain snapshot plus its configuration into a
//! [`ValidationResult`]. Validators are pure: they read only their own
//! snapshot and config, so the orchestrator may run them in parallel.

pub mod ab_testing;
pub mod dashboard;
pub mod event_tracking;
pub mod funnel;
pub mod performance;

pub use ab_testing::AbTestingValidator;
pub use dashboard::DashboardValidator;
pub use event_tracking::EventTrackingValidator;
pub use funnel::FunnelValidator;
pub use performance::PerformanceValidator;

use crate::config::ValidationConfig;
use crate::error::ValidationError;
use crate::snapshot::DomainSnapshot;
use crate::types::{Severity, Timestamp, ValidationDomain, ValidationResult, ValidationStatus};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// A single problem spotted by a validator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Finding {
    pub severity: Severity,
    pub message: String,
}

impl Finding {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }
}

/// Status roll-up a validator derives from its analysis
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub status: ValidationStatus,
    pub severity: Severity,
    pub message: String,
    pub recommendations: Vec<String>,
}

/// A validator's result together with the domain health score it implies
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub result: ValidationResult,
    /// 0–100; 0 when the validator could not complete
    pub health_score: f64,
}

/// Common shape of the five domain validators
///
/// Implementors provide the analysis, the verdict and the health score; the
/// provided `evaluate` wraps them with timing and converts analysis errors into
/// a failed result so that nothing escapes the validator boundary.
pub trait DomainValidator {
    type Input: ?Sized;
    type Analysis: Serialize;

    fn domain(&self) -> ValidationDomain;

    /// Run every check over the snapshot
    fn analyze(&self, input: &Self::Input, now: Timestamp) -> Result<Self::Analysis, ValidationError>;

    /// Derive status, severity, message and recommendations
    fn verdict(&self, analysis: &Self::Analysis) -> Verdict;

    /// 0–100 health score for the domain
    fn health_score(&self, analysis: &Self::Analysis) -> f64;

    fn evaluate(&self, input: &Self::Input, now: Timestamp) -> Evaluation {
        let started = Instant::now();
        let domain = self.domain();

        let outcome = self.analyze(input, now).and_then(|analysis| {
            let details = serde_json::to_value(&analysis)
                .map_err(|e| ValidationError::Internal(format!("cannot serialize analysis: {}", e)))?;
            Ok((self.verdict(&analysis), self.health_score(&analysis), details))
        });

        match outcome {
            Ok((verdict, health_score, mut details)) => {
                let health_score = health_score.clamp(0.0, 100.0);
                if let Some(object) = details.as_object_mut() {
                    object.insert("healthScore".to_string(), serde_json::json!(health_score));
                }

                let result = ValidationResult::new(
                    domain,
                    verdict.status,
                    verdict.severity,
                    elapsed_ms(started),
                    verdict.message,
                    details,
                    verdict.recommendations,
                );
                debug!(
                    "{} validation finished: {:?} in {}ms",
                    domain, result.status, result.duration
                );
                Evaluation {
                    result,
                    health_score,
                }
            }
            Err(e) => {
                warn!("{} validation errored: {}", domain, e);
                Evaluation {
                    result: ValidationResult::errored(domain, elapsed_ms(started), e.to_string()),
                    health_score: 0.0,
                }
            }
        }
    }
}

/// Run the validator matching the snapshot's domain
pub fn evaluate_snapshot(
    config: &ValidationConfig,
    snapshot: &DomainSnapshot,
    now: Timestamp,
) -> Evaluation {
    match snapshot {
        DomainSnapshot::EventTracking(events) => {
            EventTrackingValidator::new(config.event_tracking.clone()).evaluate(events.as_slice(), now)
        }
        DomainSnapshot::AbTesting(experiments) => {
            AbTestingValidator::new(config.ab_testing.clone()).evaluate(experiments.as_slice(), now)
        }
        DomainSnapshot::ConversionFunnel(funnels) => {
            FunnelValidator::new(config.conversion_funnel.clone()).evaluate(funnels.as_slice(), now)
        }
        DomainSnapshot::Performance(metrics) => {
            PerformanceValidator::new(config.performance.clone()).evaluate(metrics, now)
        }
        DomainSnapshot::Dashboard(dashboards) => {
            DashboardValidator::new(config.dashboard.clone()).evaluate(dashboards.as_slice(), now)
        }
    }
}

/// Severity that mirrors a status: failed → critical, warning → medium, passed → low
pub(crate) fn mirrored_severity(status: ValidationStatus) -> Severity {
    match status {
        ValidationStatus::Failed => Severity::Critical,
        ValidationStatus::Warning => Severity::Medium,
        ValidationStatus::Passed => Severity::Low,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
