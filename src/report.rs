//! Report assembly: trends and batch-level recommendations

use crate::statistics::ValidationStatistics;
use crate::types::{
    ReportPeriod, ValidationReport, ValidationResult, ValidationStatus, ValidationTrends,
};
use chrono::Utc;
use uuid::Uuid;

/// Pass rate the trends are measured against, in percent
pub const BASELINE_PERCENT: f64 = 85.0;
/// Share of warnings above which the batch deserves monitoring
const WARNING_SHARE_LIMIT: f64 = 0.3;

fn count(results: &[ValidationResult], status: ValidationStatus) -> usize {
    results.iter().filter(|r| r.status == status).count()
}

fn domains_with(results: &[ValidationResult], status: ValidationStatus) -> String {
    results
        .iter()
        .filter(|r| r.status == status)
        .map(|r| r.domain.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Percentage-point deltas of this batch against the baseline
///
/// An empty batch carries no signal and yields zero trends.
pub fn calculate_trends(results: &[ValidationResult]) -> ValidationTrends {
    if results.is_empty() {
        return ValidationTrends::default();
    }

    let total = results.len() as f64;
    let passed = count(results, ValidationStatus::Passed) as f64;
    let failed = count(results, ValidationStatus::Failed) as f64;

    let pass_rate = passed / total * 100.0;
    let non_failed_rate = (total - failed) / total * 100.0;
    let issue_rate = (total - passed) / total * 100.0;

    ValidationTrends {
        accuracy_trend: pass_rate - BASELINE_PERCENT,
        performance_trend: non_failed_rate - BASELINE_PERCENT,
        issues_trend: issue_rate - (100.0 - BASELINE_PERCENT),
    }
}

pub fn recommendations(results: &[ValidationResult]) -> Vec<String> {
    if results.is_empty() {
        return vec!["No validators ran: enable at least one validator".to_string()];
    }

    let mut recommendations = Vec::new();
    let failed = count(results, ValidationStatus::Failed);
    let warnings = count(results, ValidationStatus::Warning);

    if failed > 0 {
        recommendations.push(format!(
            "Address {} failed validation(s) immediately: {}",
            failed,
            domains_with(results, ValidationStatus::Failed)
        ));
    }
    if warnings as f64 > results.len() as f64 * WARNING_SHARE_LIMIT {
        recommendations.push(format!(
            "Monitor {} validation(s) with warnings closely: {}",
            warnings,
            domains_with(results, ValidationStatus::Warning)
        ));
    }
    if failed == 0 && warnings == 0 {
        recommendations.push("All validations passed: continue monitoring".to_string());
    }

    recommendations
}

pub fn build_report(
    results: Vec<ValidationResult>,
    summary: ValidationStatistics,
    period: ReportPeriod,
) -> ValidationReport {
    ValidationReport {
        id: Uuid::new_v4().to_string(),
        generated_at: Utc::now(),
        period,
        summary,
        trends: calculate_trends(&results),
        recommendations: recommendations(&results),
        results,
        error: None,
    }
}

/// Report for a run that failed before any validator executed
pub fn error_report(
    error: String,
    summary: ValidationStatistics,
    period: ReportPeriod,
) -> ValidationReport {
    ValidationReport {
        id: Uuid::new_v4().to_string(),
        generated_at: Utc::now(),
        period,
        summary,
        results: Vec::new(),
        trends: ValidationTrends::default(),
        recommendations: vec![format!(
            "Validation run could not start ({}); check the snapshot source",
            error
        )],
        error: Some(error),
    }
}
