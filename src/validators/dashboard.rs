//! Dashboard validation
//!
//! Dashboards are checked for staleness, per-metric plausibility, cross-metric
//! consistency and cache health. Cache findings are advisory: they count as
//! consistency issues but never fail a dashboard on their own.

use super::{DomainValidator, Verdict};
use crate::config::DashboardConfig;
use crate::error::ValidationError;
use crate::health;
use crate::snapshot::{CacheInfo, Dashboard, DashboardMetric};
use crate::types::{Severity, Timestamp, ValidationDomain, ValidationStatus};
use serde::Serialize;
use std::collections::BTreeMap;

/// Tolerance between a reported and a derived conversion rate
const RATE_TOLERANCE: f64 = 0.01;
/// Absolute trend (percent) above which a metric is implausible
const MAX_TREND_PERCENT: f64 = 100.0;
const MIN_CACHE_HIT_RATE: f64 = 0.7;
const MAX_CACHE_SIZE_BYTES: u64 = 1024 * 1024;

const STALE_RATIO_LIMIT: f64 = 0.5;
const ISSUE_RATIO_LIMIT: f64 = 0.7;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardAnalysis {
    pub dashboard_id: String,
    pub name: String,
    pub age_minutes: i64,
    pub stale: bool,
    pub consistency_issues: Vec<String>,
    pub cache_issues: Vec<String>,
}

impl DashboardAnalysis {
    pub fn is_clean(&self) -> bool {
        !self.stale && self.consistency_issues.is_empty() && self.cache_issues.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardValidationAnalysis {
    pub total_dashboards: usize,
    pub stale_dashboards: usize,
    /// Consistency findings, cache findings included
    pub consistency_issues: usize,
    pub total_issues: usize,
    pub dashboards: Vec<DashboardAnalysis>,
}

/// Names like `revenue_change` or `growth_rate` may legitimately go negative
fn permits_negative(name: &str) -> bool {
    let name = name.to_lowercase();
    ["trend", "growth_rate", "change"]
        .iter()
        .any(|keyword| name.contains(keyword))
}

/// Plausible value range implied by a metric's name
fn plausible_range(name: &str) -> Option<(f64, f64)> {
    if permits_negative(name) {
        return None;
    }
    let name = name.to_lowercase();
    let tokens: Vec<&str> = name.split(|c: char| !c.is_alphanumeric()).collect();

    if tokens.iter().any(|t| matches!(*t, "percent" | "percentage" | "pct")) {
        Some((0.0, 100.0))
    } else if tokens.iter().any(|t| matches!(*t, "rate" | "ratio" | "conversion")) {
        Some((0.0, 1.0))
    } else {
        None
    }
}

fn minutes_since(then: Timestamp, now: Timestamp) -> i64 {
    (now - then).num_minutes()
}

pub struct DashboardValidator {
    config: DashboardConfig,
}

impl DashboardValidator {
    pub fn new(config: DashboardConfig) -> Self {
        Self { config }
    }

    fn is_stale(&self, last_update: Timestamp, now: Timestamp) -> bool {
        (now - last_update).num_seconds() > self.config.stale_data_threshold as i64 * 60
    }

    fn metric_issues(&self, name: &str, metric: &DashboardMetric, now: Timestamp) -> Vec<String> {
        let mut issues = Vec::new();
        let value = metric.value;

        if !value.is_finite() {
            issues.push(format!("Metric '{}' has non-numeric value {}", name, value));
            return issues;
        }
        if value < 0.0 && !permits_negative(name) {
            issues.push(format!("Metric '{}' is negative ({})", name, value));
        } else if let Some((low, high)) = plausible_range(name) {
            if !(low..=high).contains(&value) {
                issues.push(format!(
                    "Metric '{}' value {} is outside the plausible range [{}, {}]",
                    name, value, low, high
                ));
            }
        }
        if metric.trend.abs() > MAX_TREND_PERCENT {
            issues.push(format!(
                "Metric '{}' trend of {:.1}% is implausible",
                name, metric.trend
            ));
        }
        if self.is_stale(metric.last_update, now) {
            issues.push(format!(
                "Metric '{}' was last updated {} minutes ago",
                name,
                minutes_since(metric.last_update, now)
            ));
        }

        issues
    }

    /// Cross-metric checks: reported vs derived conversion rate, funnel step ordering
    fn cross_metric_issues(metrics: &BTreeMap<String, DashboardMetric>) -> Vec<String> {
        let mut issues = Vec::new();
        let value = |name: &str| metrics.get(name).map(|m| m.value);

        if let Some(reported) = value("conversion_rate") {
            let derived = [("successes", "attempts"), ("conversions", "visitors")]
                .iter()
                .find_map(|&(numerator, denominator)| match (value(numerator), value(denominator)) {
                    (Some(n), Some(d)) if d > 0.0 => Some(n / d),
                    _ => None,
                });
            if let Some(derived) = derived {
                if (derived - reported).abs() > RATE_TOLERANCE {
                    issues.push(format!(
                        "Reported conversion rate {:.4} does not match derived rate {:.4}",
                        reported, derived
                    ));
                }
            }
        }

        let mut steps: Vec<(u32, &str, f64)> = metrics
            .iter()
            .filter_map(|(name, metric)| {
                name.strip_prefix("funnel_step_")
                    .and_then(|order| order.parse::<u32>().ok())
                    .map(|order| (order, name.as_str(), metric.value))
            })
            .collect();
        steps.sort_by_key(|(order, _, _)| *order);
        for pair in steps.windows(2) {
            let (_, previous_name, previous) = pair[0];
            let (_, name, current) = pair[1];
            if current > previous {
                issues.push(format!(
                    "Funnel metric '{}' ({}) exceeds preceding '{}' ({})",
                    name, current, previous_name, previous
                ));
            }
        }

        issues
    }

    fn cache_issues(&self, cache: &CacheInfo, now: Timestamp) -> Vec<String> {
        let mut issues = Vec::new();

        let refresh_age = (now - cache.last_refresh).num_seconds();
        if refresh_age > self.config.refresh_interval_secs as i64 * 2 {
            issues.push(format!(
                "Cache last refreshed {}s ago, over twice the {}s refresh interval",
                refresh_age, self.config.refresh_interval_secs
            ));
        }
        if cache.hit_rate < MIN_CACHE_HIT_RATE {
            issues.push(format!(
                "Cache hit rate {:.0}% is below {:.0}%",
                cache.hit_rate * 100.0,
                MIN_CACHE_HIT_RATE * 100.0
            ));
        }
        if cache.size > MAX_CACHE_SIZE_BYTES {
            issues.push(format!("Cache holds {} bytes, over the 1MB budget", cache.size));
        }

        issues
    }

    fn analyze_dashboard(&self, dashboard: &Dashboard, now: Timestamp) -> DashboardAnalysis {
        let mut consistency_issues = Vec::new();
        if self.config.data_consistency_checks {
            for (name, metric) in &dashboard.metrics {
                consistency_issues.extend(self.metric_issues(name, metric, now));
            }
            consistency_issues.extend(Self::cross_metric_issues(&dashboard.metrics));
        }

        let cache_issues = if self.config.cache_validation {
            self.cache_issues(&dashboard.cache, now)
        } else {
            Vec::new()
        };

        DashboardAnalysis {
            dashboard_id: dashboard.id.clone(),
            name: dashboard.name.clone(),
            age_minutes: minutes_since(dashboard.last_update, now),
            stale: self.is_stale(dashboard.last_update, now),
            consistency_issues,
            cache_issues,
        }
    }
}

impl DomainValidator for DashboardValidator {
    type Input = [Dashboard];
    type Analysis = DashboardValidationAnalysis;

    fn domain(&self) -> ValidationDomain {
        ValidationDomain::Dashboard
    }

    fn analyze(
        &self,
        dashboards: &[Dashboard],
        now: Timestamp,
    ) -> Result<DashboardValidationAnalysis, ValidationError> {
        let dashboards: Vec<DashboardAnalysis> = dashboards
            .iter()
            .map(|dashboard| self.analyze_dashboard(dashboard, now))
            .collect();

        let stale_dashboards = dashboards.iter().filter(|d| d.stale).count();
        let consistency_issues = dashboards
            .iter()
            .map(|d| d.consistency_issues.len() + d.cache_issues.len())
            .sum::<usize>();

        Ok(DashboardValidationAnalysis {
            total_dashboards: dashboards.len(),
            stale_dashboards,
            consistency_issues,
            total_issues: stale_dashboards + consistency_issues,
            dashboards,
        })
    }

    fn verdict(&self, analysis: &DashboardValidationAnalysis) -> Verdict {
        let total = analysis.total_dashboards as f64;
        let status = if analysis.stale_dashboards as f64 > total * STALE_RATIO_LIMIT
            || analysis.total_issues as f64 > total * ISSUE_RATIO_LIMIT
        {
            ValidationStatus::Failed
        } else if analysis.total_issues > 0 {
            ValidationStatus::Warning
        } else {
            ValidationStatus::Passed
        };
        let severity = match status {
            ValidationStatus::Failed => Severity::High,
            ValidationStatus::Warning => Severity::Medium,
            ValidationStatus::Passed => Severity::Low,
        };

        let message = format!(
            "{} dashboards checked: {} stale, {} consistency issues",
            analysis.total_dashboards, analysis.stale_dashboards, analysis.consistency_issues
        );

        let mut recommendations = Vec::new();
        let stale: Vec<&str> = analysis
            .dashboards
            .iter()
            .filter(|d| d.stale)
            .map(|d| d.dashboard_id.as_str())
            .collect();
        if !stale.is_empty() {
            recommendations.push(format!(
                "Refresh stale dashboards (older than {} minutes): {}",
                self.config.stale_data_threshold,
                stale.join(", ")
            ));
        }
        if analysis.dashboards.iter().any(|d| !d.consistency_issues.is_empty()) {
            recommendations.push(
                "Reconcile dashboard metrics with their source queries".to_string(),
            );
        }
        if analysis.dashboards.iter().any(|d| !d.cache_issues.is_empty()) {
            recommendations.push(format!(
                "Tune dashboard caching: refresh every {}s, keep hit rate above {:.0}%",
                self.config.refresh_interval_secs,
                MIN_CACHE_HIT_RATE * 100.0
            ));
        }

        Verdict {
            status,
            severity,
            message,
            recommendations,
        }
    }

    fn health_score(&self, analysis: &DashboardValidationAnalysis) -> f64 {
        health::dashboard_score(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationConfig;
    use crate::fixtures;
    use chrono::{Duration, Utc};

    fn validator() -> DashboardValidator {
        DashboardValidator::new(ValidationConfig::default().dashboard)
    }

    fn metric(value: f64, now: Timestamp) -> DashboardMetric {
        DashboardMetric {
            value,
            last_update: now,
            trend: 0.0,
            status: "ok".to_string(),
        }
    }

    #[test]
    fn test_name_heuristics() {
        assert!(permits_negative("revenue_change"));
        assert!(permits_negative("user_growth_rate"));
        assert!(!permits_negative("active_users"));

        assert_eq!(plausible_range("bounce_rate"), Some((0.0, 1.0)));
        assert_eq!(plausible_range("conversion_rate"), Some((0.0, 1.0)));
        assert_eq!(plausible_range("cpu_percent"), Some((0.0, 100.0)));
        assert_eq!(plausible_range("user_growth_rate"), None);
        assert_eq!(plausible_range("conversions"), None);
    }

    #[test]
    fn test_fresh_dashboards_pass() {
        let now = Utc::now();
        let evaluation = validator().evaluate(&fixtures::dashboards(now), now);

        assert_eq!(evaluation.result.status, ValidationStatus::Passed);
        assert_eq!(evaluation.health_score, 100.0);
    }

    #[test]
    fn test_stale_majority_fails() {
        let now = Utc::now();
        let mut dashboards = fixtures::dashboards(now);
        for dashboard in dashboards.iter_mut() {
            dashboard.last_update = now - Duration::minutes(45);
        }

        let evaluation = validator().evaluate(&dashboards, now);
        assert_eq!(evaluation.result.status, ValidationStatus::Failed);
        assert_eq!(evaluation.result.severity, Severity::High);
        assert_eq!(evaluation.health_score, 0.0);
    }

    #[test]
    fn test_issue_density_fails_without_stale_majority() {
        let now = Utc::now();
        let mut dashboards = fixtures::dashboards(now);
        dashboards.truncate(2);
        for dashboard in dashboards.iter_mut() {
            dashboard.cache.hit_rate = 0.4;
        }

        // two issues over two fresh dashboards exceed the 70% ceiling
        let evaluation = validator().evaluate(&dashboards, now);
        assert_eq!(evaluation.result.details["staleDashboards"], 0);
        assert_eq!(evaluation.result.details["totalIssues"], 2);
        assert_eq!(evaluation.result.status, ValidationStatus::Failed);
        assert_eq!(evaluation.result.severity, Severity::High);

        // the same two issues spread over three dashboards stay under it
        let mut dashboards = fixtures::dashboards(now);
        dashboards[0].cache.hit_rate = 0.4;
        dashboards[1].cache.hit_rate = 0.4;
        let evaluation = validator().evaluate(&dashboards, now);
        assert_eq!(evaluation.result.status, ValidationStatus::Warning);
    }

    #[test]
    fn test_conversion_rate_mismatch() {
        let now = Utc::now();
        let mut metrics = BTreeMap::new();
        metrics.insert("successes".to_string(), metric(50.0, now));
        metrics.insert("attempts".to_string(), metric(1_000.0, now));
        metrics.insert("conversion_rate".to_string(), metric(0.08, now));

        let issues = DashboardValidator::cross_metric_issues(&metrics);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("does not match"));

        metrics.insert("conversion_rate".to_string(), metric(0.055, now));
        assert!(DashboardValidator::cross_metric_issues(&metrics).is_empty());
    }

    #[test]
    fn test_funnel_step_metrics_must_not_increase() {
        let now = Utc::now();
        let mut metrics = BTreeMap::new();
        metrics.insert("funnel_step_1".to_string(), metric(1_000.0, now));
        metrics.insert("funnel_step_2".to_string(), metric(400.0, now));
        metrics.insert("funnel_step_10".to_string(), metric(500.0, now));

        let issues = DashboardValidator::cross_metric_issues(&metrics);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("funnel_step_10"));
    }

    #[test]
    fn test_metric_plausibility() {
        let now = Utc::now();
        let validator = validator();

        assert_eq!(validator.metric_issues("active_users", &metric(-3.0, now), now).len(), 1);
        assert!(validator.metric_issues("revenue_change", &metric(-3.0, now), now).is_empty());
        assert_eq!(validator.metric_issues("bounce_rate", &metric(1.7, now), now).len(), 1);

        let mut wild = metric(0.4, now);
        wild.trend = 250.0;
        wild.last_update = now - Duration::minutes(20);
        assert_eq!(validator.metric_issues("bounce_rate", &wild, now).len(), 2);
    }

    #[test]
    fn test_cache_issues_are_advisory() {
        let now = Utc::now();
        let mut dashboards = fixtures::dashboards(now);
        dashboards[0].cache.hit_rate = 0.4;

        let evaluation = validator().evaluate(&dashboards, now);
        assert_eq!(evaluation.result.status, ValidationStatus::Warning);
        assert_eq!(evaluation.result.details["consistencyIssues"], 1);
        assert_eq!(evaluation.result.details["staleDashboards"], 0);
    }

    #[test]
    fn test_cache_checks_can_be_disabled() {
        let now = Utc::now();
        let mut config = ValidationConfig::default().dashboard;
        config.cache_validation = false;
        let mut dashboards = fixtures::dashboards(now);
        dashboards[0].cache.size = 8 * 1024 * 1024;

        let evaluation = DashboardValidator::new(config).evaluate(&dashboards, now);
        assert_eq!(evaluation.result.status, ValidationStatus::Passed);
    }
}
