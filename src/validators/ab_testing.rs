//! A/B test validation
//!
//! The first variant of every experiment is the control. Each treatment is
//! tested against it for significance and plausible effect size, the traffic
//! split is checked for sample ratio mismatch, and undersized experiments are
//! gated regardless of their significance.

use super::{DomainValidator, Finding, Verdict};
use crate::config::AbTestingConfig;
use crate::error::ValidationError;
use crate::health;
use crate::snapshot::{Experiment, Variant};
use crate::stats;
use crate::types::{Severity, Timestamp, ValidationDomain, ValidationStatus};
use serde::Serialize;

/// Share of experiments with issues above which the batch fails
const ISSUE_RATIO_LIMIT: f64 = 0.3;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VariantAnalysis {
    pub variant_id: String,
    pub visitors: u64,
    pub conversions: u64,
    pub observed_rate: Option<f64>,
    pub p_value: Option<f64>,
    pub effect_size: Option<f64>,
    pub power: Option<f64>,
    pub significant: bool,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentAnalysis {
    pub experiment_id: String,
    pub name: String,
    pub variant_count: usize,
    pub min_visitors: u64,
    pub sample_size_met: bool,
    pub sample_ratio_deviation: Option<f64>,
    pub sample_ratio_mismatch: bool,
    pub control_findings: Vec<Finding>,
    pub variants: Vec<VariantAnalysis>,
}

impl ExperimentAnalysis {
    pub fn statistical_issue_count(&self) -> usize {
        self.control_findings.len() + self.variants.iter().map(|v| v.findings.len()).sum::<usize>()
    }

    /// No findings, adequately sized and evenly split
    pub fn is_clean(&self) -> bool {
        self.sample_size_met && !self.sample_ratio_mismatch && self.statistical_issue_count() == 0
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AbTestingAnalysis {
    pub total_experiments: usize,
    pub statistical_issues: usize,
    pub sample_ratio_mismatches: usize,
    pub undersized_experiments: Vec<String>,
    pub low_power_variants: usize,
    pub experiments: Vec<ExperimentAnalysis>,
}

pub struct AbTestingValidator {
    config: AbTestingConfig,
}

impl AbTestingValidator {
    pub fn new(config: AbTestingConfig) -> Self {
        Self { config }
    }

    fn rate_findings(variant: &Variant) -> Vec<Finding> {
        let mut findings = Vec::new();
        if !(0.0..=1.0).contains(&variant.conversion_rate) {
            findings.push(Finding::new(
                Severity::High,
                format!(
                    "Variant {} reports conversion rate {} outside [0, 1]",
                    variant.id, variant.conversion_rate
                ),
            ));
        }
        if variant.conversions > variant.visitors {
            findings.push(Finding::new(
                Severity::High,
                format!(
                    "Variant {} has more conversions ({}) than visitors ({})",
                    variant.id, variant.conversions, variant.visitors
                ),
            ));
        }
        findings
    }

    fn analyze_variant(&self, control: &Variant, variant: &Variant) -> VariantAnalysis {
        let mut findings = Self::rate_findings(variant);
        let observed_rate = observed_rate(variant);

        let mut analysis = VariantAnalysis {
            variant_id: variant.id.clone(),
            visitors: variant.visitors,
            conversions: variant.conversions,
            observed_rate,
            p_value: None,
            effect_size: None,
            power: None,
            significant: false,
            findings: Vec::new(),
        };

        if control.visitors == 0 || variant.visitors == 0 {
            findings.push(Finding::new(
                Severity::High,
                format!(
                    "Variant {} cannot be compared: zero traffic on {}",
                    variant.id,
                    if control.visitors == 0 { "control" } else { "variant" }
                ),
            ));
            analysis.findings = findings;
            return analysis;
        }
        if control.conversions > control.visitors || variant.conversions > variant.visitors {
            analysis.findings = findings;
            return analysis;
        }

        let p_value = stats::two_proportion_p_value(
            control.conversions,
            control.visitors,
            variant.conversions,
            variant.visitors,
        );
        analysis.p_value = Some(p_value);
        analysis.significant = p_value <= self.config.max_p_value;
        if !analysis.significant {
            findings.push(Finding::new(
                Severity::Medium,
                format!(
                    "Variant {} is not significant (p = {:.4} > {})",
                    variant.id, p_value, self.config.max_p_value
                ),
            ));
        }

        let control_rate = control.conversions as f64 / control.visitors as f64;
        let variant_rate = variant.conversions as f64 / variant.visitors as f64;
        match stats::effect_size(control_rate, variant_rate) {
            Some(effect) => {
                analysis.effect_size = Some(effect);
                analysis.power = Some(stats::statistical_power(
                    effect,
                    self.config.minimum_sample_size,
                ));

                if effect < self.config.effect_size.minimum {
                    findings.push(Finding::new(
                        Severity::Low,
                        format!(
                            "Variant {} effect size {:.4} is negligible (< {})",
                            variant.id, effect, self.config.effect_size.minimum
                        ),
                    ));
                } else if effect > self.config.effect_size.maximum {
                    findings.push(Finding::new(
                        Severity::High,
                        format!(
                            "Variant {} effect size {:.4} is implausibly large (> {}); likely an instrumentation error",
                            variant.id, effect, self.config.effect_size.maximum
                        ),
                    ));
                }
            }
            None => findings.push(Finding::new(
                Severity::Medium,
                format!(
                    "Effect size for variant {} is undefined: control has zero conversions",
                    variant.id
                ),
            )),
        }

        analysis.findings = findings;
        analysis
    }

    fn analyze_experiment(&self, experiment: &Experiment) -> ExperimentAnalysis {
        let visitors: Vec<u64> = experiment.variants.iter().map(|v| v.visitors).collect();
        let min_visitors = visitors.iter().copied().min().unwrap_or(0);

        let mut control_findings = Vec::new();
        let variants = match experiment.variants.split_first() {
            Some((control, treatments)) if !treatments.is_empty() => {
                control_findings.extend(Self::rate_findings(control));
                treatments
                    .iter()
                    .map(|variant| self.analyze_variant(control, variant))
                    .collect()
            }
            _ => {
                control_findings.push(Finding::new(
                    Severity::High,
                    format!(
                        "Experiment {} needs a control and at least one treatment, found {} variant(s)",
                        experiment.id,
                        experiment.variants.len()
                    ),
                ));
                Vec::new()
            }
        };

        let sample_ratio_deviation = stats::sample_ratio_deviation(&visitors);
        let srm = &self.config.sample_ratio_mismatch;
        let sample_ratio_mismatch = srm.enabled
            && experiment.variants.len() > 1
            && sample_ratio_deviation.is_some_and(|deviation| deviation > srm.threshold);

        ExperimentAnalysis {
            experiment_id: experiment.id.clone(),
            name: experiment.name.clone(),
            variant_count: experiment.variants.len(),
            min_visitors,
            sample_size_met: min_visitors >= self.config.minimum_sample_size,
            sample_ratio_deviation,
            sample_ratio_mismatch,
            control_findings,
            variants,
        }
    }
}

fn observed_rate(variant: &Variant) -> Option<f64> {
    (variant.visitors > 0).then(|| variant.conversions as f64 / variant.visitors as f64)
}

impl DomainValidator for AbTestingValidator {
    type Input = [Experiment];
    type Analysis = AbTestingAnalysis;

    fn domain(&self) -> ValidationDomain {
        ValidationDomain::AbTesting
    }

    fn analyze(
        &self,
        experiments: &[Experiment],
        _now: Timestamp,
    ) -> Result<AbTestingAnalysis, ValidationError> {
        let experiments: Vec<ExperimentAnalysis> = experiments
            .iter()
            .map(|experiment| self.analyze_experiment(experiment))
            .collect();

        let statistical_issues = experiments
            .iter()
            .map(ExperimentAnalysis::statistical_issue_count)
            .sum();
        let sample_ratio_mismatches = experiments.iter().filter(|e| e.sample_ratio_mismatch).count();
        let undersized_experiments = experiments
            .iter()
            .filter(|e| !e.sample_size_met)
            .map(|e| e.experiment_id.clone())
            .collect();
        let low_power_variants = experiments
            .iter()
            .flat_map(|e| e.variants.iter())
            .filter(|v| v.power.is_some_and(|power| power < self.config.min_power))
            .count();

        Ok(AbTestingAnalysis {
            total_experiments: experiments.len(),
            statistical_issues,
            sample_ratio_mismatches,
            undersized_experiments,
            low_power_variants,
            experiments,
        })
    }

    fn verdict(&self, analysis: &AbTestingAnalysis) -> Verdict {
        let total_issues = analysis.statistical_issues + analysis.sample_ratio_mismatches;
        let issue_limit = analysis.total_experiments as f64 * ISSUE_RATIO_LIMIT;

        let status = if !analysis.undersized_experiments.is_empty()
            || (total_issues > 0 && total_issues as f64 > issue_limit)
        {
            ValidationStatus::Failed
        } else if total_issues > 0 {
            ValidationStatus::Warning
        } else {
            ValidationStatus::Passed
        };

        let severity = match status {
            ValidationStatus::Failed if analysis.sample_ratio_mismatches > 0 => Severity::Critical,
            ValidationStatus::Failed => Severity::High,
            ValidationStatus::Warning => Severity::Medium,
            ValidationStatus::Passed => Severity::Low,
        };

        let message = format!(
            "{} experiments checked: {} statistical issues, {} sample ratio mismatches, {} below minimum sample size",
            analysis.total_experiments,
            analysis.statistical_issues,
            analysis.sample_ratio_mismatches,
            analysis.undersized_experiments.len()
        );

        let mut recommendations = Vec::new();
        if !analysis.undersized_experiments.is_empty() {
            recommendations.push(format!(
                "Keep collecting traffic before reading results for: {} (minimum {} visitors per variant)",
                analysis.undersized_experiments.join(", "),
                self.config.minimum_sample_size
            ));
        }
        if analysis.sample_ratio_mismatches > 0 {
            recommendations.push(
                "Audit assignment logic: traffic split deviates from the intended allocation".to_string(),
            );
        }
        let implausible = analysis
            .experiments
            .iter()
            .flat_map(|e| e.variants.iter())
            .flat_map(|v| v.findings.iter())
            .any(|f| f.severity == Severity::High);
        if implausible {
            recommendations.push(
                "Verify conversion instrumentation for variants with impossible rates or implausible effects"
                    .to_string(),
            );
        }
        if analysis.low_power_variants > 0 {
            recommendations.push(format!(
                "{} variant comparisons are under-powered (< {:.0}%); extend the test or raise the sample size",
                analysis.low_power_variants,
                self.config.min_power * 100.0
            ));
        }

        Verdict {
            status,
            severity,
            message,
            recommendations,
        }
    }

    fn health_score(&self, analysis: &AbTestingAnalysis) -> f64 {
        health::ab_testing_score(analysis)
    }
}
