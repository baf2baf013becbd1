//! Validation orchestrator
//!
//! Runs the enabled validators concurrently, folds each batch into the
//! rolling statistics, raises alerts for failed results and exposes the
//! read-only status projections the CLI and UI layers consume.
//!
//! Validators run on the blocking pool, each bounded by the configured
//! timeout. All shared state lives in one [`EngineState`] behind a single
//! mutex, and a batch applies its whole mutation in one critical section, so
//! overlapping runs never lose counts.

use crate::alerts::{AlertManager, ValidationAlert};
use crate::config::ValidationConfig;
use crate::error::EngineError;
use crate::health::HealthScores;
use crate::report;
use crate::schedule::{self, ValidationSchedule};
use crate::snapshot::SnapshotSource;
use crate::statistics::ValidationStatistics;
use crate::types::{ReportPeriod, Timestamp, ValidationDomain, ValidationReport, ValidationResult};
use crate::validators::{self, Evaluation};
use chrono::{Duration as ChronoDuration, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Uptime below this marks the system as erroring
const MIN_HEALTHY_UPTIME: f64 = 95.0;
/// Window for counting recent unresolved alerts
const RECENT_ALERT_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SystemState {
    Healthy,
    Warning,
    Error,
}

/// Read-only projection of the engine's health
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub status: SystemState,
    pub message: String,
    pub uptime: f64,
    /// Seconds since the last full run; `None` before the first run
    pub last_validation_age: Option<i64>,
    /// Unresolved alerts raised in the last 24 hours
    pub recent_failures: usize,
    pub total_alerts: usize,
    pub statistics: ValidationStatistics,
}

/// Everything a batch mutates
struct EngineState {
    statistics: ValidationStatistics,
    alerts: AlertManager,
    schedules: Vec<ValidationSchedule>,
    health: BTreeMap<ValidationDomain, f64>,
}

/// Entry point for running validations and reading engine status
///
/// Cloning is cheap and every clone shares the same engine state, so
/// overlapping runs can be fired from several tasks.
#[derive(Clone)]
pub struct ValidationOrchestrator {
    /// Read-only configuration shared with the validator tasks
    config: Arc<ValidationConfig>,
    /// Supplier of the per-domain snapshots
    source: Arc<dyn SnapshotSource>,
    /// Single-writer engine state
    state: Arc<Mutex<EngineState>>,
    /// Deadline for one domain's snapshot fetch plus validation
    validator_timeout: Duration,
}

impl ValidationOrchestrator {
    /// Create an orchestrator that alerts through the log
    ///
    /// # Arguments
    ///
    /// * `config` - Engine configuration; alert limits and the validator
    ///   timeout are taken from its `orchestrator` section
    /// * `source` - Where domain snapshots come from
    pub fn new(config: ValidationConfig, source: Arc<dyn SnapshotSource>) -> Self {
        let alerts = AlertManager::new(
            config.orchestrator.max_alerts,
            config.orchestrator.alert_rate_limit_per_minute,
        );
        Self::with_alert_manager(config, source, alerts)
    }

    /// Orchestrator delivering alerts through a caller-built alert manager
    ///
    /// # Arguments
    ///
    /// * `config` - Engine configuration
    /// * `source` - Where domain snapshots come from
    /// * `alerts` - Alert manager with its own cap, budget and channels
    pub fn with_alert_manager(
        config: ValidationConfig,
        source: Arc<dyn SnapshotSource>,
        alerts: AlertManager,
    ) -> Self {
        let state = EngineState {
            statistics: ValidationStatistics::new(),
            alerts,
            schedules: schedule::default_schedules(&config),
            health: BTreeMap::new(),
        };

        Self {
            validator_timeout: config.validator_timeout(),
            config: Arc::new(config),
            source,
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Override the per-validator deadline taken from the configuration
    ///
    /// # Arguments
    ///
    /// * `timeout` - Deadline for one domain's snapshot fetch plus validation
    pub fn with_validator_timeout(mut self, timeout: Duration) -> Self {
        self.validator_timeout = timeout;
        self
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        // a panicking writer leaves the state consistent: every batch mutation is infallible
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run every enabled validator and fold the batch into the engine state
    ///
    /// Always returns a well-formed report. When the snapshot source cannot
    /// be refreshed the report carries `error` and no results, and the
    /// statistics are left untouched.
    pub async fn run_full_validation(&self) -> ValidationReport {
        let started_at = Utc::now();
        let started = Instant::now();
        let domains = self.config.enabled_domains();
        info!("Starting full validation of {} domains", domains.len());

        if let Err(e) = self.refresh_source().await {
            error!("Full validation aborted: {}", e);
            let summary = self.lock_state().statistics.clone();
            return report::error_report(
                e,
                summary,
                ReportPeriod {
                    start: started_at,
                    end: Utc::now(),
                },
            );
        }

        let handles: Vec<_> = domains
            .iter()
            .map(|&domain| (domain, self.spawn_domain(domain)))
            .collect();

        // awaited in enumeration order regardless of completion order
        let mut evaluations = Vec::with_capacity(handles.len());
        for (domain, handle) in handles {
            let evaluation = match handle.await {
                Ok(evaluation) => evaluation,
                Err(e) => failed_evaluation(domain, 0, format!("validator task failed: {}", e)),
            };
            evaluations.push((domain, evaluation));
        }

        let finished_at = Utc::now();
        let results: Vec<ValidationResult> = evaluations
            .iter()
            .map(|(_, evaluation)| evaluation.result.clone())
            .collect();

        let summary = {
            let mut state = self.lock_state();
            state.statistics.record_batch(&results, finished_at);
            for (domain, evaluation) in &evaluations {
                state.health.insert(*domain, evaluation.health_score);
            }
            let raised = state.alerts.process_results(&results);
            if !raised.is_empty() {
                info!("Raised {} alerts for this batch", raised.len());
            }
            schedule::record_run(&mut state.schedules, &results, finished_at);
            state.statistics.clone()
        };

        let report = report::build_report(
            results,
            summary,
            ReportPeriod {
                start: started_at,
                end: finished_at,
            },
        );
        info!(
            "Full validation finished in {}ms: {} results, {} failed",
            started.elapsed().as_millis(),
            report.results.len(),
            report.results.iter().filter(|r| r.is_failed()).count()
        );
        report
    }

    /// Run a single validator and return its raw result
    ///
    /// Bypasses aggregation: statistics, health scores, alerts and schedules
    /// are not touched.
    pub async fn run_validation(&self, domain: ValidationDomain) -> ValidationResult {
        debug!("Running single validation for {}", domain);
        if let Err(e) = self.refresh_source().await {
            warn!("Cannot run {} validation: {}", domain, e);
            return ValidationResult::errored(domain, 0, e);
        }

        match self.spawn_domain(domain).await {
            Ok(evaluation) => evaluation.result,
            Err(e) => ValidationResult::errored(domain, 0, format!("validator task failed: {}", e)),
        }
    }

    /// [`run_validation`](Self::run_validation) addressed by name
    ///
    /// # Arguments
    ///
    /// * `name` - Domain key in camelCase, snake_case or kebab-case
    ///
    /// # Errors
    ///
    /// Returns `EngineError::UnknownValidationType` when `name` is not a domain.
    pub async fn run_validation_named(&self, name: &str) -> Result<ValidationResult, EngineError> {
        let domain: ValidationDomain = name.parse()?;
        Ok(self.run_validation(domain).await)
    }

    async fn refresh_source(&self) -> Result<(), String> {
        let source = Arc::clone(&self.source);
        match tokio::task::spawn_blocking(move || source.refresh()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("snapshot refresh failed: {}", e)),
            Err(e) => Err(format!("snapshot refresh task failed: {}", e)),
        }
    }

    /// Fetch the domain's snapshot and validate it on the blocking pool,
    /// bounded by the validator timeout
    fn spawn_domain(&self, domain: ValidationDomain) -> tokio::task::JoinHandle<Evaluation> {
        let config = Arc::clone(&self.config);
        let source = Arc::clone(&self.source);
        let timeout = self.validator_timeout;

        tokio::spawn(async move {
            let started = Instant::now();
            let work = tokio::task::spawn_blocking(move || {
                let snapshot = match source.snapshot(domain) {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        warn!("No snapshot for {}: {}", domain, e);
                        return failed_evaluation(domain, elapsed_ms(started), e.to_string());
                    }
                };
                if snapshot.domain() != domain {
                    return failed_evaluation(
                        domain,
                        elapsed_ms(started),
                        format!("snapshot source returned {} data", snapshot.domain()),
                    );
                }
                validators::evaluate_snapshot(&config, &snapshot, Utc::now())
            });

            match tokio::time::timeout(timeout, work).await {
                Ok(Ok(evaluation)) => evaluation,
                Ok(Err(e)) => {
                    error!("{} validator crashed: {}", domain, e);
                    failed_evaluation(domain, elapsed_ms(started), format!("validator crashed: {}", e))
                }
                Err(_) => {
                    warn!("{} validator timed out after {:?}", domain, timeout);
                    failed_evaluation(
                        domain,
                        elapsed_ms(started),
                        format!("timed out after {}ms", timeout.as_millis()),
                    )
                }
            }
        })
    }

    /// Health score per domain from the last full run, plus their mean
    ///
    /// Domains that have not been validated yet score 100.
    pub fn get_health_scores(&self) -> HealthScores {
        HealthScores::from_scores(&self.lock_state().health)
    }

    /// Classify the engine as healthy, warning or error
    ///
    /// Error when the pass rate is below 95%; warning when too many recent
    /// alerts are unresolved, when no run has happened yet, or when the last
    /// run is older than `stale_run_minutes`; healthy otherwise.
    pub fn get_system_status(&self) -> SystemStatus {
        self.system_status_at(Utc::now())
    }

    fn system_status_at(&self, now: Timestamp) -> SystemStatus {
        let state = self.lock_state();
        let statistics = state.statistics.clone();
        let recent_failures = state
            .alerts
            .unresolved_since(now - ChronoDuration::hours(RECENT_ALERT_HOURS));
        let total_alerts = state.alerts.total_alerts();
        drop(state);

        let limits = &self.config.orchestrator;
        let last_validation_age = statistics.last_run_age_secs(now);

        let (status, message) = if statistics.uptime < MIN_HEALTHY_UPTIME {
            (
                SystemState::Error,
                format!(
                    "Validation pass rate {:.1}% is below {:.0}%",
                    statistics.uptime, MIN_HEALTHY_UPTIME
                ),
            )
        } else if recent_failures > limits.recent_failure_limit {
            (
                SystemState::Warning,
                format!("{} unresolved alerts in the last 24 hours", recent_failures),
            )
        } else {
            match last_validation_age {
                None => (SystemState::Warning, "No validation has run yet".to_string()),
                Some(age) if age > limits.stale_run_minutes * 60 => (
                    SystemState::Warning,
                    format!("Last validation ran {} minutes ago", age / 60),
                ),
                Some(_) => (SystemState::Healthy, "All systems operational".to_string()),
            }
        };

        SystemStatus {
            status,
            message,
            uptime: statistics.uptime,
            last_validation_age,
            recent_failures,
            total_alerts,
            statistics,
        }
    }

    pub fn get_statistics(&self) -> ValidationStatistics {
        self.lock_state().statistics.clone()
    }

    /// Alerts in the order they were raised
    ///
    /// # Arguments
    ///
    /// * `include_resolved` - Also return alerts that were resolved
    pub fn get_alerts(&self, include_resolved: bool) -> Vec<ValidationAlert> {
        self.lock_state().alerts.alerts(include_resolved)
    }

    /// Acknowledge an alert on behalf of `by`
    ///
    /// # Returns
    ///
    /// `false` when no alert has this id
    pub fn acknowledge_alert(&self, id: &str, by: &str) -> bool {
        self.lock_state().alerts.acknowledge(id, by)
    }

    /// Resolve an alert
    ///
    /// # Returns
    ///
    /// `false` when no alert has this id
    pub fn resolve_alert(&self, id: &str) -> bool {
        self.lock_state().alerts.resolve(id)
    }

    /// Schedule metadata with the run counters of past full runs
    pub fn get_schedules(&self) -> Vec<ValidationSchedule> {
        self.lock_state().schedules.clone()
    }
}

fn failed_evaluation(domain: ValidationDomain, duration: u64, error: String) -> Evaluation {
    Evaluation {
        result: ValidationResult::errored(domain, duration, error),
        health_score: 0.0,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
