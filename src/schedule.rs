//! Validation schedule metadata
//!
//! Schedules describe when an external scheduler should trigger validations.
//! Nothing here runs a timer; the orchestrator only keeps the counters current.

use crate::config::ValidationConfig;
use crate::types::{Timestamp, ValidationDomain, ValidationResult};
use serde::{Deserialize, Serialize};

pub const FULL_RUN_SCHEDULE_ID: &str = "full-validation";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSchedule {
    pub id: String,
    pub name: String,
    /// `None` for the full-run schedule
    pub domain: Option<ValidationDomain>,
    /// Cron expression (minute hour day month weekday)
    pub trigger: String,
    pub enabled: bool,
    pub run_count: u64,
    pub failure_count: u64,
    pub last_run: Option<Timestamp>,
}

impl ValidationSchedule {
    fn new(id: &str, name: &str, domain: Option<ValidationDomain>, trigger: &str, enabled: bool) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            domain,
            trigger: trigger.to_string(),
            enabled,
            run_count: 0,
            failure_count: 0,
            last_run: None,
        }
    }

    fn record(&mut self, failed: bool, at: Timestamp) {
        self.run_count += 1;
        if failed {
            self.failure_count += 1;
        }
        self.last_run = Some(at);
    }
}

fn trigger_for(domain: ValidationDomain) -> &'static str {
    match domain {
        ValidationDomain::EventTracking => "*/15 * * * *",
        ValidationDomain::AbTesting => "0 * * * *",
        ValidationDomain::ConversionFunnel => "0 */6 * * *",
        ValidationDomain::Performance => "*/5 * * * *",
        ValidationDomain::Dashboard => "*/10 * * * *",
    }
}

/// One schedule per domain, enabled as configured, plus the daily full run
pub fn default_schedules(config: &ValidationConfig) -> Vec<ValidationSchedule> {
    let mut schedules: Vec<ValidationSchedule> = ValidationDomain::ALL
        .iter()
        .map(|&domain| {
            ValidationSchedule::new(
                &format!("{}-validation", domain),
                &format!("{} validation", domain.label()),
                Some(domain),
                trigger_for(domain),
                config.is_enabled(domain),
            )
        })
        .collect();

    schedules.push(ValidationSchedule::new(
        FULL_RUN_SCHEDULE_ID,
        "Full validation",
        None,
        "0 0 * * *",
        true,
    ));
    schedules
}

/// Bump counters for every domain in the batch and for the full-run schedule
pub fn record_run(schedules: &mut [ValidationSchedule], results: &[ValidationResult], at: Timestamp) {
    for result in results {
        if let Some(schedule) = schedules
            .iter_mut()
            .find(|s| s.domain == Some(result.domain))
        {
            schedule.record(result.is_failed(), at);
        }
    }

    if let Some(full) = schedules.iter_mut().find(|s| s.id == FULL_RUN_SCHEDULE_ID) {
        full.record(results.iter().any(ValidationResult::is_failed), at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Severity, ValidationStatus};
    use chrono::Utc;
    use serde_json::json;

    fn result(domain: ValidationDomain, status: ValidationStatus) -> ValidationResult {
        ValidationResult::new(domain, status, Severity::Low, 1, "", json!({}), vec![])
    }

    #[test]
    fn test_default_schedules_follow_config() {
        let mut config = ValidationConfig::default();
        config.dashboard.enabled = false;

        let schedules = default_schedules(&config);
        assert_eq!(schedules.len(), 6);
        assert_eq!(schedules[0].id, "eventTracking-validation");
        assert!(schedules[0].enabled);
        assert!(!schedules[4].enabled);
        assert_eq!(schedules[5].id, FULL_RUN_SCHEDULE_ID);
        assert_eq!(schedules[5].domain, None);
    }

    #[test]
    fn test_record_run_updates_counters() {
        let mut schedules = default_schedules(&ValidationConfig::default());
        let now = Utc::now();

        record_run(
            &mut schedules,
            &[
                result(ValidationDomain::EventTracking, ValidationStatus::Passed),
                result(ValidationDomain::Performance, ValidationStatus::Failed),
            ],
            now,
        );

        assert_eq!(schedules[0].run_count, 1);
        assert_eq!(schedules[0].failure_count, 0);
        assert_eq!(schedules[3].failure_count, 1);
        assert_eq!(schedules[1].run_count, 0);
        assert_eq!(schedules[5].run_count, 1);
        assert_eq!(schedules[5].failure_count, 1);
        assert_eq!(schedules[5].last_run, Some(now));
    }
}
