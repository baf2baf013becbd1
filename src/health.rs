//! Domain health scores
//!
//! Every score is a deterministic 0–100 projection of the analysis its
//! validator produced, so scores for the same snapshot never change between
//! calls.

use crate::types::{Severity, ValidationDomain};
use crate::validators::ab_testing::AbTestingAnalysis;
use crate::validators::dashboard::DashboardValidationAnalysis;
use crate::validators::event_tracking::EventTrackingAnalysis;
use crate::validators::funnel::FunnelValidationAnalysis;
use crate::validators::performance::PerformanceAnalysis;
use crate::validators::Finding;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Score assumed for a domain that has never been validated
pub const INITIAL_SCORE: f64 = 100.0;

/// Points a performance violation costs, by severity
pub fn severity_penalty(severity: Severity) -> f64 {
    match severity {
        Severity::Critical => 15.0,
        Severity::High => 10.0,
        Severity::Medium => 5.0,
        Severity::Low => 2.0,
    }
}

fn funnel_penalty(severity: Severity) -> f64 {
    match severity {
        Severity::Critical => 40.0,
        Severity::High => 25.0,
        Severity::Medium => 10.0,
        Severity::Low => 0.0,
    }
}

fn share_percent(clean: usize, total: usize) -> f64 {
    if total == 0 {
        INITIAL_SCORE
    } else {
        clean as f64 / total as f64 * 100.0
    }
}

pub fn event_tracking_score(analysis: &EventTrackingAnalysis) -> f64 {
    (100.0 - analysis.issue_percentage - 10.0 * analysis.missing_events.len() as f64).clamp(0.0, 100.0)
}

pub fn ab_testing_score(analysis: &AbTestingAnalysis) -> f64 {
    let clean = analysis.experiments.iter().filter(|e| e.is_clean()).count();
    share_percent(clean, analysis.total_experiments)
}

/// Score of a single funnel from its findings
pub fn funnel_health(findings: &[Finding]) -> f64 {
    let penalty: f64 = findings.iter().map(|f| funnel_penalty(f.severity)).sum();
    (100.0 - penalty).max(0.0)
}

pub fn funnel_score(analysis: &FunnelValidationAnalysis) -> f64 {
    if analysis.funnels.is_empty() {
        return INITIAL_SCORE;
    }
    let total: f64 = analysis.funnels.iter().map(|f| f.health_score).sum();
    total / analysis.funnels.len() as f64
}

pub fn performance_score(analysis: &PerformanceAnalysis) -> f64 {
    analysis.performance_score
}

pub fn dashboard_score(analysis: &DashboardValidationAnalysis) -> f64 {
    let clean = analysis.dashboards.iter().filter(|d| d.is_clean()).count();
    share_percent(clean, analysis.total_dashboards)
}

/// Per-domain scores plus their unweighted mean
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthScores {
    pub event_tracking: f64,
    pub ab_testing: f64,
    pub conversion_funnel: f64,
    pub performance: f64,
    pub dashboard: f64,
    pub overall: f64,
}

impl HealthScores {
    /// Domains missing from `scores` count as [`INITIAL_SCORE`]
    pub fn from_scores(scores: &BTreeMap<ValidationDomain, f64>) -> Self {
        let score = |domain| scores.get(&domain).copied().unwrap_or(INITIAL_SCORE);
        let overall = ValidationDomain::ALL.iter().map(|&d| score(d)).sum::<f64>()
            / ValidationDomain::ALL.len() as f64;

        Self {
            event_tracking: score(ValidationDomain::EventTracking),
            ab_testing: score(ValidationDomain::AbTesting),
            conversion_funnel: score(ValidationDomain::ConversionFunnel),
            performance: score(ValidationDomain::Performance),
            dashboard: score(ValidationDomain::Dashboard),
            overall,
        }
    }
}

impl Default for HealthScores {
    fn default() -> Self {
        Self::from_scores(&BTreeMap::new())
    }
}
