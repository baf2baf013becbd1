//! Performance validation
//!
//! Every metric family has its own tiered-multiple policy: a value is compared
//! against multiples of the configured threshold and the highest tier it
//! exceeds decides the violation severity.

use super::{DomainValidator, Verdict};
use crate::config::PerformanceConfig;
use crate::error::ValidationError;
use crate::health;
use crate::snapshot::PerformanceSnapshot;
use crate::types::{Severity, Timestamp, ValidationDomain, ValidationStatus};
use serde::Serialize;

const PAGE_LOAD_TIERS: &[(f64, Severity)] = &[
    (2.0, Severity::Critical),
    (1.5, Severity::High),
    (1.0, Severity::Medium),
];
const API_AVERAGE_TIERS: &[(f64, Severity)] = &[(2.0, Severity::Critical), (1.0, Severity::Medium)];
/// Applied against twice the API threshold
const API_P95_TIERS: &[(f64, Severity)] = &[(2.0, Severity::Critical), (1.0, Severity::High)];
const ERROR_RATE_TIERS: &[(f64, Severity)] = &[
    (3.0, Severity::Critical),
    (2.0, Severity::High),
    (1.0, Severity::Medium),
];
const MEMORY_TIERS: &[(f64, Severity)] = &[(1.25, Severity::Critical), (1.0, Severity::High)];
const CPU_TIERS: &[(f64, Severity)] = &[(1.5, Severity::Critical), (1.0, Severity::Medium)];

/// Share of violated metrics above which the batch fails
const VIOLATION_RATIO_LIMIT: f64 = 0.3;
/// A blended score below this fails the batch
const FAILING_SCORE: f64 = 50.0;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MetricFamily {
    PageLoad,
    ApiAverage,
    ApiP95,
    ErrorRate,
    Memory,
    Cpu,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub family: MetricFamily,
    pub metric: String,
    pub value: f64,
    pub threshold: f64,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceAnalysis {
    pub violations: Vec<Violation>,
    pub metric_count: usize,
    pub mean_page_load_time: Option<f64>,
    pub mean_api_response_time: Option<f64>,
    pub performance_score: f64,
    pub active_users: u64,
}

impl PerformanceAnalysis {
    pub fn max_severity(&self) -> Option<Severity> {
        self.violations.iter().map(|v| v.severity).max()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.violations.iter().filter(|v| v.severity == severity).count()
    }
}

/// Highest tier `value` exceeds, tiers ordered by descending multiple
pub fn tiered_severity(value: f64, threshold: f64, tiers: &[(f64, Severity)]) -> Option<Severity> {
    tiers
        .iter()
        .find(|(multiple, _)| value > multiple * threshold)
        .map(|&(_, severity)| severity)
}

/// Penalty curve over a mean timing: 100 at or under the threshold, then
/// 50 points lost per threshold-multiple above it
pub fn timing_curve(mean: Option<f64>, threshold: f64) -> f64 {
    match mean {
        Some(mean) if mean > threshold => (100.0 - (mean / threshold - 1.0) * 50.0).max(0.0),
        _ => 100.0,
    }
}

fn mean<'a>(values: impl Iterator<Item = &'a f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

fn check_finite(metric: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidInput(format!(
            "metric '{}' has invalid value {}",
            metric, value
        )))
    }
}

pub struct PerformanceValidator {
    config: PerformanceConfig,
}

impl PerformanceValidator {
    pub fn new(config: PerformanceConfig) -> Self {
        Self { config }
    }

    fn check(
        violations: &mut Vec<Violation>,
        family: MetricFamily,
        metric: &str,
        value: f64,
        threshold: f64,
        tiers: &[(f64, Severity)],
    ) -> Result<(), ValidationError> {
        check_finite(metric, value)?;
        if let Some(severity) = tiered_severity(value, threshold, tiers) {
            violations.push(Violation {
                family,
                metric: metric.to_string(),
                value,
                threshold,
                severity,
            });
        }
        Ok(())
    }
}

impl DomainValidator for PerformanceValidator {
    type Input = PerformanceSnapshot;
    type Analysis = PerformanceAnalysis;

    fn domain(&self) -> ValidationDomain {
        ValidationDomain::Performance
    }

    fn analyze(
        &self,
        snapshot: &PerformanceSnapshot,
        _now: Timestamp,
    ) -> Result<PerformanceAnalysis, ValidationError> {
        let config = &self.config;
        let mut violations = Vec::new();

        for (page, &load_time) in &snapshot.page_load_times {
            Self::check(
                &mut violations,
                MetricFamily::PageLoad,
                page,
                load_time,
                config.page_load_time,
                PAGE_LOAD_TIERS,
            )?;
        }
        for (endpoint, timing) in &snapshot.api_response_times {
            Self::check(
                &mut violations,
                MetricFamily::ApiAverage,
                endpoint,
                timing.average,
                config.api_response_time,
                API_AVERAGE_TIERS,
            )?;
            Self::check(
                &mut violations,
                MetricFamily::ApiP95,
                endpoint,
                timing.p95,
                config.api_response_time * 2.0,
                API_P95_TIERS,
            )?;
        }
        for (service, &rate) in &snapshot.error_rates {
            Self::check(
                &mut violations,
                MetricFamily::ErrorRate,
                service,
                rate,
                config.error_rate,
                ERROR_RATE_TIERS,
            )?;
        }
        Self::check(
            &mut violations,
            MetricFamily::Memory,
            "memory_usage",
            snapshot.system.memory_usage,
            config.memory_usage,
            MEMORY_TIERS,
        )?;
        Self::check(
            &mut violations,
            MetricFamily::Cpu,
            "cpu_usage",
            snapshot.system.cpu_usage,
            config.cpu_usage,
            CPU_TIERS,
        )?;

        let metric_count = snapshot.page_load_times.len()
            + snapshot.api_response_times.len() * 2
            + snapshot.error_rates.len()
            + 2;
        let mean_page_load_time = mean(snapshot.page_load_times.values());
        let mean_api_response_time = mean(snapshot.api_response_times.values().map(|t| &t.average));

        let violation_score = violations.iter().fold(100.0, |score, violation| {
            score - health::severity_penalty(violation.severity)
        });
        let performance_score = ((violation_score
            + timing_curve(mean_page_load_time, config.page_load_time)
            + timing_curve(mean_api_response_time, config.api_response_time))
            / 3.0)
            .clamp(0.0, 100.0);

        Ok(PerformanceAnalysis {
            violations,
            metric_count,
            mean_page_load_time,
            mean_api_response_time,
            performance_score,
            active_users: snapshot.system.active_users,
        })
    }

    fn verdict(&self, analysis: &PerformanceAnalysis) -> Verdict {
        let max_severity = analysis.max_severity();
        let violated_share = analysis.violations.len() as f64 / analysis.metric_count.max(1) as f64;

        let status = match max_severity {
            Some(Severity::Critical) | Some(Severity::High) => ValidationStatus::Failed,
            _ if violated_share > VIOLATION_RATIO_LIMIT => ValidationStatus::Failed,
            _ if analysis.performance_score < FAILING_SCORE => ValidationStatus::Failed,
            Some(_) => ValidationStatus::Warning,
            None => ValidationStatus::Passed,
        };
        let severity = match status {
            ValidationStatus::Failed if max_severity == Some(Severity::Critical) => Severity::Critical,
            ValidationStatus::Failed => Severity::High,
            ValidationStatus::Warning => Severity::Medium,
            ValidationStatus::Passed => Severity::Low,
        };

        let message = format!(
            "{} of {} metrics over threshold ({} critical, {} high), performance score {:.1}",
            analysis.violations.len(),
            analysis.metric_count,
            analysis.count(Severity::Critical),
            analysis.count(Severity::High),
            analysis.performance_score
        );

        let mut recommendations = Vec::new();
        let families = |family: MetricFamily| {
            analysis
                .violations
                .iter()
                .filter(|v| v.family == family)
                .map(|v| v.metric.as_str())
                .collect::<Vec<_>>()
        };
        let pages = families(MetricFamily::PageLoad);
        if !pages.is_empty() {
            recommendations.push(format!(
                "Optimize slow pages (bundle size, caching, lazy loading): {}",
                pages.join(", ")
            ));
        }
        let mut endpoints = families(MetricFamily::ApiAverage);
        endpoints.extend(families(MetricFamily::ApiP95));
        endpoints.sort_unstable();
        endpoints.dedup();
        if !endpoints.is_empty() {
            recommendations.push(format!(
                "Profile slow API endpoints and their queries: {}",
                endpoints.join(", ")
            ));
        }
        let services = families(MetricFamily::ErrorRate);
        if !services.is_empty() {
            recommendations.push(format!(
                "Investigate elevated error rates: {}",
                services.join(", ")
            ));
        }
        if !families(MetricFamily::Memory).is_empty() {
            recommendations.push("Check for memory leaks or raise memory limits".to_string());
        }
        if !families(MetricFamily::Cpu).is_empty() {
            recommendations.push("Reduce CPU load or scale out".to_string());
        }

        Verdict {
            status,
            severity,
            message,
            recommendations,
        }
    }

    fn health_score(&self, analysis: &PerformanceAnalysis) -> f64 {
        health::performance_score(analysis)
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    // Doubling an over-threshold value never lowers its severity
    #[quickcheck]
    fn prop_severity_monotonic_in_ratio(threshold: u16, excess: u16) -> bool {
        let threshold = threshold as f64 + 1.0;
        let value = threshold + excess as f64 + 0.5;

        [
            PAGE_LOAD_TIERS,
            API_AVERAGE_TIERS,
            API_P95_TIERS,
            ERROR_RATE_TIERS,
            MEMORY_TIERS,
            CPU_TIERS,
        ]
        .iter()
        .all(|tiers| {
            let before = tiered_severity(value, threshold, tiers);
            let after = tiered_severity(value * 2.0, threshold, tiers);
            before.is_some() && after >= before
        })
    }

    #[quickcheck]
    fn prop_timing_curve_bounded(mean: u32, threshold: u16) -> bool {
        let score = timing_curve(Some(mean as f64), threshold as f64 + 1.0);
        (0.0..=100.0).contains(&score)
    }
}
