//! Sample data builders
//!
//! Deterministic snapshots relative to a given instant: healthy data that
//! passes the production thresholds, and degraded variants that fail them.
//! Used by the tests and by the CLI when no snapshot file is supplied.

use crate::error::SnapshotError;
use crate::snapshot::{
    ApiTiming, CacheInfo, Dashboard, DashboardMetric, DomainSnapshot, Experiment, Funnel,
    FunnelStep, PerformanceSnapshot, SnapshotSource, SystemMetrics, TrackingEvent, Variant,
};
use crate::types::{Timestamp, ValidationDomain};
use chrono::{Duration, Utc};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

/// Event types every healthy batch covers in equal shares
pub const SAMPLE_EVENT_TYPES: [&str; 4] = ["page_view", "session_start", "button_click", "conversion"];

/// `count` clean events spread half a second apart, ending one second before `now`
///
/// Every event has its own user, so no two share a duplicate signature.
pub fn tracking_events(now: Timestamp, count: usize) -> Vec<TrackingEvent> {
    let now_ms = now.timestamp_millis();
    (0..count)
        .map(|i| TrackingEvent {
            id: format!("evt-{}", i),
            user_id: format!("user-{}", i),
            event_type: SAMPLE_EVENT_TYPES[i % SAMPLE_EVENT_TYPES.len()].to_string(),
            timestamp: now_ms - 1_000 - i as i64 * 500,
            properties: json!({ "sequence": i }),
            session_id: format!("session-{}", i / SAMPLE_EVENT_TYPES.len()),
        })
        .collect()
}

fn variant(id: &str, visitors: u64, conversions: u64) -> Variant {
    Variant {
        id: id.to_string(),
        visitors,
        conversions,
        conversion_rate: conversions as f64 / visitors as f64,
    }
}

/// Two well-powered, evenly split experiments with clear lifts
pub fn experiments() -> Vec<Experiment> {
    vec![
        Experiment {
            id: "checkout-button".to_string(),
            name: "Checkout button colour".to_string(),
            variants: vec![
                variant("control", 10_000, 1_000),
                variant("treatment", 10_000, 1_200),
            ],
        },
        Experiment {
            id: "pricing-page".to_string(),
            name: "Pricing page layout".to_string(),
            variants: vec![variant("control", 8_000, 400), variant("treatment", 8_000, 480)],
        },
    ]
}

fn step(name: &str, users: u64, dropoff_rate: f64) -> FunnelStep {
    FunnelStep {
        name: name.to_string(),
        users,
        dropoff_rate,
    }
}

/// start=500, consider=200 (60%), purchase=50 (75%), complete=25 (50%)
///
/// Every drop-off stays under an 80% ceiling while two exceed 0.7 × 80.
pub fn checkout_funnel() -> Funnel {
    Funnel {
        id: "checkout".to_string(),
        name: "Checkout".to_string(),
        steps: vec![
            step("start", 500, 0.0),
            step("consider", 200, 60.0),
            step("purchase", 50, 75.0),
            step("complete", 25, 50.0),
        ],
        total_users: 500,
        conversion_rate: 0.05,
    }
}

pub fn funnels() -> Vec<Funnel> {
    vec![
        Funnel {
            id: "purchase".to_string(),
            name: "Purchase".to_string(),
            steps: vec![
                step("start", 1_000, 0.0),
                step("consider", 800, 20.0),
                step("purchase", 500, 37.5),
                step("complete", 400, 20.0),
            ],
            total_users: 1_000,
            conversion_rate: 0.4,
        },
        Funnel {
            id: "signup".to_string(),
            name: "Signup".to_string(),
            steps: vec![
                step("start", 2_000, 0.0),
                step("consider", 1_500, 25.0),
                step("purchase", 900, 40.0),
                step("complete", 600, 33.3),
            ],
            total_users: 2_000,
            conversion_rate: 0.3,
        },
    ]
}

pub fn performance_snapshot() -> PerformanceSnapshot {
    let api = |average, p95| ApiTiming { average, p95 };
    PerformanceSnapshot {
        page_load_times: BTreeMap::from([
            ("/".to_string(), 1_200.0),
            ("/products".to_string(), 1_500.0),
            ("/cart".to_string(), 1_800.0),
        ]),
        api_response_times: BTreeMap::from([
            ("/api/products".to_string(), api(180.0, 350.0)),
            ("/api/cart".to_string(), api(220.0, 420.0)),
        ]),
        error_rates: BTreeMap::from([("checkout".to_string(), 0.2), ("search".to_string(), 0.4)]),
        system: SystemMetrics {
            memory_usage: 55.0,
            cpu_usage: 40.0,
            active_users: 1_200,
        },
    }
}

/// Three fresh, internally consistent dashboards with healthy caches
pub fn dashboards(now: Timestamp) -> Vec<Dashboard> {
    let fresh = now - Duration::minutes(1);
    let metric = |value: f64, trend: f64| DashboardMetric {
        value,
        last_update: fresh,
        trend,
        status: "ok".to_string(),
    };

    ["overview", "growth", "checkout"]
        .iter()
        .map(|id| Dashboard {
            id: id.to_string(),
            name: format!("{} dashboard", id),
            last_update: now - Duration::minutes(2),
            metrics: BTreeMap::from([
                ("active_users".to_string(), metric(1_200.0, 4.5)),
                ("successes".to_string(), metric(50.0, 2.0)),
                ("attempts".to_string(), metric(1_000.0, 1.0)),
                ("conversion_rate".to_string(), metric(0.05, 1.0)),
                ("bounce_rate".to_string(), metric(0.35, -2.0)),
                ("revenue_change".to_string(), metric(-3.5, -3.5)),
                ("funnel_step_1".to_string(), metric(1_000.0, 0.0)),
                ("funnel_step_2".to_string(), metric(600.0, 0.0)),
            ]),
            cache: CacheInfo {
                last_refresh: now - Duration::seconds(60),
                size: 256 * 1024,
                hit_rate: 0.9,
            },
        })
        .collect()
}

/// Data for `domain` that passes the production thresholds
pub fn healthy_snapshot(domain: ValidationDomain, now: Timestamp) -> DomainSnapshot {
    match domain {
        ValidationDomain::EventTracking => DomainSnapshot::EventTracking(tracking_events(now, 1_000)),
        ValidationDomain::AbTesting => DomainSnapshot::AbTesting(experiments()),
        ValidationDomain::ConversionFunnel => DomainSnapshot::ConversionFunnel(funnels()),
        ValidationDomain::Performance => DomainSnapshot::Performance(performance_snapshot()),
        ValidationDomain::Dashboard => DomainSnapshot::Dashboard(dashboards(now)),
    }
}

/// Data for `domain` that fails the production thresholds
pub fn degraded_snapshot(domain: ValidationDomain, now: Timestamp) -> DomainSnapshot {
    match domain {
        ValidationDomain::EventTracking => {
            let mut events = tracking_events(now, 200);
            for event in events.iter_mut().take(30) {
                event.user_id.clear();
            }
            DomainSnapshot::EventTracking(events)
        }
        ValidationDomain::AbTesting => {
            let mut experiments = experiments();
            experiments[0].variants = vec![
                variant("control", 12_000, 1_200),
                variant("treatment", 8_000, 960),
            ];
            DomainSnapshot::AbTesting(experiments)
        }
        ValidationDomain::ConversionFunnel => {
            let mut funnels = funnels();
            funnels[0].steps[2].users = 900;
            DomainSnapshot::ConversionFunnel(funnels)
        }
        ValidationDomain::Performance => {
            let mut performance = performance_snapshot();
            performance.error_rates.insert("payments".to_string(), 4.0);
            DomainSnapshot::Performance(performance)
        }
        ValidationDomain::Dashboard => {
            let mut dashboards = dashboards(now);
            for dashboard in dashboards.iter_mut() {
                dashboard.last_update = now - Duration::hours(2);
            }
            DomainSnapshot::Dashboard(dashboards)
        }
    }
}

/// Snapshot source backed by the builders above
///
/// Every domain is healthy unless degraded or overridden; data is generated
/// relative to the moment it is requested.
#[derive(Debug, Clone, Default)]
pub struct FixtureSnapshotSource {
    degraded: BTreeSet<ValidationDomain>,
    overrides: BTreeMap<ValidationDomain, DomainSnapshot>,
}

impl FixtureSnapshotSource {
    pub fn healthy() -> Self {
        Self::default()
    }

    pub fn degrade(mut self, domain: ValidationDomain) -> Self {
        self.degraded.insert(domain);
        self
    }

    /// Serve `snapshot` for its domain instead of generated data
    pub fn with_snapshot(mut self, snapshot: DomainSnapshot) -> Self {
        self.overrides.insert(snapshot.domain(), snapshot);
        self
    }
}

impl SnapshotSource for FixtureSnapshotSource {
    fn refresh(&self) -> Result<(), SnapshotError> {
        Ok(())
    }

    fn snapshot(&self, domain: ValidationDomain) -> Result<DomainSnapshot, SnapshotError> {
        if let Some(snapshot) = self.overrides.get(&domain) {
            return Ok(snapshot.clone());
        }
        let now = Utc::now();
        Ok(if self.degraded.contains(&domain) {
            degraded_snapshot(domain, now)
        } else {
            healthy_snapshot(domain, now)
        })
    }
}
