//! Conversion funnel validation

use super::{DomainValidator, Finding, Verdict};
use crate::config::FunnelConfig;
use crate::error::ValidationError;
use crate::health;
use crate::snapshot::Funnel;
use crate::types::{Severity, Timestamp, ValidationDomain, ValidationStatus};
use serde::Serialize;

/// Share of the drop-off ceiling above which a step is worth a warning
const HIGH_DROP_OFF_FACTOR: f64 = 0.7;
const SUSPICIOUS_CONVERSION_RATE: f64 = 0.95;
const LOW_CONVERSION_RATE: f64 = 0.01;

/// The transition losing the largest share of users
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DropOff {
    pub from_step: String,
    pub to_step: String,
    /// Percent of `from_step` users lost
    pub rate: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunnelAnalysis {
    pub funnel_id: String,
    pub name: String,
    pub step_count: usize,
    /// Highest severity among the findings; `None` for a clean funnel
    pub severity: Option<Severity>,
    pub findings: Vec<Finding>,
    pub largest_drop_off: Option<DropOff>,
    pub health_score: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProblematicFunnel {
    pub funnel_id: String,
    pub severity: Severity,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunnelValidationAnalysis {
    pub total_funnels: usize,
    pub total_issues: usize,
    pub problematic_funnels: Vec<ProblematicFunnel>,
    pub funnels: Vec<FunnelAnalysis>,
}

impl FunnelValidationAnalysis {
    pub fn max_severity(&self) -> Option<Severity> {
        self.funnels.iter().filter_map(|f| f.severity).max()
    }
}

pub struct FunnelValidator {
    config: FunnelConfig,
}

impl FunnelValidator {
    pub fn new(config: FunnelConfig) -> Self {
        Self { config }
    }

    /// Transition with the largest share of users lost, computed from user counts
    ///
    /// Advisory only; transitions out of an empty step are skipped.
    pub fn largest_drop_off(funnel: &Funnel) -> Option<DropOff> {
        funnel
            .steps
            .windows(2)
            .filter(|pair| pair[0].users > 0)
            .map(|pair| DropOff {
                from_step: pair[0].name.clone(),
                to_step: pair[1].name.clone(),
                rate: (pair[0].users as f64 - pair[1].users as f64) / pair[0].users as f64 * 100.0,
            })
            .fold(None, |largest: Option<DropOff>, candidate| match largest {
                Some(current) if current.rate >= candidate.rate => Some(current),
                _ => Some(candidate),
            })
    }

    fn step_findings(&self, funnel: &Funnel) -> Vec<Finding> {
        let max_drop_off = self.config.max_drop_off_rate;
        let mut findings = Vec::new();

        for (index, step) in funnel.steps.iter().enumerate() {
            if step.users < self.config.minimum_users_per_step {
                findings.push(Finding::new(
                    Severity::High,
                    format!(
                        "Step '{}' has {} users, below the minimum of {}",
                        step.name, step.users, self.config.minimum_users_per_step
                    ),
                ));
            }

            if !step.dropoff_rate.is_finite() || !(0.0..=100.0).contains(&step.dropoff_rate) {
                findings.push(Finding::new(
                    Severity::Critical,
                    format!(
                        "Step '{}' reports drop-off rate {} outside [0, 100]",
                        step.name, step.dropoff_rate
                    ),
                ));
            } else if step.dropoff_rate > max_drop_off {
                findings.push(Finding::new(
                    Severity::High,
                    format!(
                        "Excessive drop-off at step '{}': {:.1}% exceeds {:.1}%",
                        step.name, step.dropoff_rate, max_drop_off
                    ),
                ));
            } else if step.dropoff_rate > HIGH_DROP_OFF_FACTOR * max_drop_off {
                findings.push(Finding::new(
                    Severity::Medium,
                    format!(
                        "High drop-off at step '{}': {:.1}%",
                        step.name, step.dropoff_rate
                    ),
                ));
            }

            if index > 0 {
                let previous = &funnel.steps[index - 1];
                if step.users > previous.users {
                    findings.push(Finding::new(
                        Severity::High,
                        format!(
                            "Step '{}' has more users ({}) than the preceding step '{}' ({})",
                            step.name, step.users, previous.name, previous.users
                        ),
                    ));
                }
            }
        }

        findings
    }

    fn funnel_findings(&self, funnel: &Funnel) -> Vec<Finding> {
        let mut findings = Vec::new();
        let rate = funnel.conversion_rate;

        if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
            findings.push(Finding::new(
                Severity::Critical,
                format!("Conversion rate {} is outside [0, 1]", rate),
            ));
        } else if rate > SUSPICIOUS_CONVERSION_RATE {
            findings.push(Finding::new(
                Severity::High,
                format!("Conversion rate {:.1}% is suspiciously high", rate * 100.0),
            ));
        } else if rate < LOW_CONVERSION_RATE {
            findings.push(Finding::new(
                Severity::Medium,
                format!("Conversion rate {:.2}% is very low", rate * 100.0),
            ));
        }

        let required = self.config.required_steps.len();
        if funnel.steps.len() < required {
            findings.push(Finding::new(
                Severity::Medium,
                format!(
                    "Funnel has {} steps, fewer than the {} required",
                    funnel.steps.len(),
                    required
                ),
            ));
        }

        findings
    }

    fn analyze_funnel(&self, funnel: &Funnel) -> FunnelAnalysis {
        let mut findings = self.step_findings(funnel);
        findings.extend(self.funnel_findings(funnel));

        FunnelAnalysis {
            funnel_id: funnel.id.clone(),
            name: funnel.name.clone(),
            step_count: funnel.steps.len(),
            severity: findings.iter().map(|f| f.severity).max(),
            health_score: health::funnel_health(&findings),
            largest_drop_off: Self::largest_drop_off(funnel),
            findings,
        }
    }
}

impl DomainValidator for FunnelValidator {
    type Input = [Funnel];
    type Analysis = FunnelValidationAnalysis;

    fn domain(&self) -> ValidationDomain {
        ValidationDomain::ConversionFunnel
    }

    fn analyze(
        &self,
        funnels: &[Funnel],
        _now: Timestamp,
    ) -> Result<FunnelValidationAnalysis, ValidationError> {
        let funnels: Vec<FunnelAnalysis> =
            funnels.iter().map(|funnel| self.analyze_funnel(funnel)).collect();

        let problematic_funnels = funnels
            .iter()
            .filter_map(|analysis| {
                analysis.severity.map(|severity| ProblematicFunnel {
                    funnel_id: analysis.funnel_id.clone(),
                    severity,
                    issues: analysis.findings.iter().map(|f| f.message.clone()).collect(),
                })
            })
            .collect();

        Ok(FunnelValidationAnalysis {
            total_funnels: funnels.len(),
            total_issues: funnels.iter().map(|f| f.findings.len()).sum(),
            problematic_funnels,
            funnels,
        })
    }

    fn verdict(&self, analysis: &FunnelValidationAnalysis) -> Verdict {
        let (status, severity) = match analysis.max_severity() {
            Some(severity) if severity >= Severity::High => (ValidationStatus::Failed, severity),
            Some(severity) => (ValidationStatus::Warning, severity.max(Severity::Medium)),
            None => (ValidationStatus::Passed, Severity::Low),
        };

        let message = format!(
            "{} funnels checked: {} problematic, {} issues",
            analysis.total_funnels,
            analysis.problematic_funnels.len(),
            analysis.total_issues
        );

        let mut recommendations = Vec::new();
        for funnel in &analysis.funnels {
            if funnel.severity.is_none() {
                continue;
            }
            if let Some(drop_off) = &funnel.largest_drop_off {
                recommendations.push(format!(
                    "Funnel '{}': focus on the '{}' → '{}' transition, which loses {:.1}% of users",
                    funnel.funnel_id, drop_off.from_step, drop_off.to_step, drop_off.rate
                ));
            }
        }
        let structural = analysis
            .funnels
            .iter()
            .flat_map(|f| f.findings.iter())
            .any(|f| f.severity == Severity::Critical || f.message.contains("more users"));
        if structural {
            recommendations.push(
                "Review the upstream funnel computation: step counts or rates violate funnel invariants"
                    .to_string(),
            );
        }

        Verdict {
            status,
            severity,
            message,
            recommendations,
        }
    }

    fn health_score(&self, analysis: &FunnelValidationAnalysis) -> f64 {
        health::funnel_score(analysis)
    }
}
