use super::*;

/// Threshold table for an environment
///
/// Development tolerates noisy instrumentation and small experiments,
/// production is the strictest.
pub(super) fn preset(environment: Environment) -> ValidationConfig {
    match environment {
        Environment::Development => ValidationConfig {
            environment,
            orchestrator: OrchestratorConfig {
                validator_timeout_secs: 60,
                max_alerts: 100,
                alert_rate_limit_per_minute: 30,
                stale_run_minutes: 120,
                recent_failure_limit: 20,
            },
            event_tracking: EventTrackingConfig {
                error_threshold: 10.0,
                sample_size: 100,
                ..base_event_tracking()
            },
            ab_testing: AbTestingConfig {
                minimum_sample_size: 100,
                max_p_value: 0.1,
                ..base_ab_testing()
            },
            conversion_funnel: FunnelConfig {
                minimum_users_per_step: 1,
                max_drop_off_rate: 90.0,
                ..base_funnel()
            },
            performance: PerformanceConfig {
                page_load_time: 5000.0,
                api_response_time: 1000.0,
                error_rate: 5.0,
                memory_usage: 90.0,
                cpu_usage: 90.0,
                ..base_performance()
            },
            dashboard: DashboardConfig {
                stale_data_threshold: 60,
                refresh_interval_secs: 900,
                ..base_dashboard()
            },
        },
        Environment::Staging => ValidationConfig {
            environment,
            orchestrator: OrchestratorConfig {
                validator_timeout_secs: 45,
                alert_rate_limit_per_minute: 20,
                stale_run_minutes: 60,
                recent_failure_limit: 10,
                ..base_orchestrator()
            },
            event_tracking: EventTrackingConfig {
                error_threshold: 7.5,
                sample_size: 500,
                ..base_event_tracking()
            },
            ab_testing: AbTestingConfig {
                minimum_sample_size: 500,
                ..base_ab_testing()
            },
            conversion_funnel: FunnelConfig {
                minimum_users_per_step: 5,
                max_drop_off_rate: 85.0,
                ..base_funnel()
            },
            performance: PerformanceConfig {
                page_load_time: 4000.0,
                api_response_time: 750.0,
                error_rate: 2.5,
                memory_usage: 85.0,
                cpu_usage: 85.0,
                ..base_performance()
            },
            dashboard: DashboardConfig {
                stale_data_threshold: 30,
                refresh_interval_secs: 600,
                ..base_dashboard()
            },
        },
        Environment::Production => ValidationConfig {
            environment,
            orchestrator: base_orchestrator(),
            event_tracking: base_event_tracking(),
            ab_testing: base_ab_testing(),
            conversion_funnel: base_funnel(),
            performance: base_performance(),
            dashboard: base_dashboard(),
        },
    }
}

fn base_orchestrator() -> OrchestratorConfig {
    OrchestratorConfig {
        validator_timeout_secs: 30,
        max_alerts: 100,
        alert_rate_limit_per_minute: 10,
        stale_run_minutes: 30,
        recent_failure_limit: 5,
    }
}

fn base_event_tracking() -> EventTrackingConfig {
    EventTrackingConfig {
        enabled: true,
        required_events: vec![
            "page_view".to_string(),
            "session_start".to_string(),
            "button_click".to_string(),
            "conversion".to_string(),
        ],
        sample_size: 1000,
        error_threshold: 5.0,
        duplicate_detection: true,
        timestamp_tolerance_ms: 60_000,
        expected_volumes: BTreeMap::new(),
    }
}

fn base_ab_testing() -> AbTestingConfig {
    AbTestingConfig {
        enabled: true,
        minimum_sample_size: 1000,
        max_p_value: 0.05,
        effect_size: EffectSizeBounds {
            minimum: 0.01,
            maximum: 1.0,
        },
        sample_ratio_mismatch: SampleRatioMismatchConfig {
            enabled: true,
            threshold: 10.0,
        },
        min_power: 0.8,
    }
}

fn base_funnel() -> FunnelConfig {
    FunnelConfig {
        enabled: true,
        minimum_users_per_step: 10,
        max_drop_off_rate: 80.0,
        required_steps: vec![
            "start".to_string(),
            "consider".to_string(),
            "purchase".to_string(),
            "complete".to_string(),
        ],
    }
}

fn base_performance() -> PerformanceConfig {
    PerformanceConfig {
        enabled: true,
        page_load_time: 3000.0,
        api_response_time: 500.0,
        error_rate: 1.0,
        memory_usage: 80.0,
        cpu_usage: 80.0,
    }
}

fn base_dashboard() -> DashboardConfig {
    DashboardConfig {
        enabled: true,
        stale_data_threshold: 15,
        data_consistency_checks: true,
        cache_validation: true,
        refresh_interval_secs: 300,
    }
}
