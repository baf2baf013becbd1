//! Domain snapshots consumed by the validators
//!
//! A snapshot is a single point-in-time copy of the data one validator needs.
//! Snapshots come from an external telemetry store through [`SnapshotSource`];
//! the engine never collects telemetry itself.

use crate::error::SnapshotError;
use crate::types::{Timestamp, ValidationDomain};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A tracked analytics event as emitted by a client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEvent {
    pub id: String,
    pub user_id: String,
    pub event_type: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    #[serde(default)]
    pub properties: serde_json::Value,
    pub session_id: String,
}

/// One arm of an experiment; the first variant of an experiment is the control
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: String,
    pub visitors: u64,
    pub conversions: u64,
    /// Conversion rate as reported upstream, expected in [0, 1]
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub variants: Vec<Variant>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunnelStep {
    pub name: String,
    pub users: u64,
    /// Percentage of the previous step's users lost at this step, expected in [0, 100]
    pub dropoff_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Funnel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub steps: Vec<FunnelStep>,
    pub total_users: u64,
    /// Overall conversion rate, expected in [0, 1]
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ApiTiming {
    pub average: f64,
    pub p95: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    /// Memory usage in percent of available memory
    pub memory_usage: f64,
    /// CPU usage in percent
    pub cpu_usage: f64,
    pub active_users: u64,
}

/// Performance metrics keyed by page, endpoint or service name
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSnapshot {
    /// Page load time in milliseconds
    #[serde(default)]
    pub page_load_times: BTreeMap<String, f64>,
    /// API response time in milliseconds
    #[serde(default)]
    pub api_response_times: BTreeMap<String, ApiTiming>,
    /// Error rate in percent
    #[serde(default)]
    pub error_rates: BTreeMap<String, f64>,
    #[serde(default)]
    pub system: SystemMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetric {
    pub value: f64,
    pub last_update: Timestamp,
    /// Percent change over the dashboard's comparison window
    #[serde(default)]
    pub trend: f64,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheInfo {
    pub last_refresh: Timestamp,
    /// Cache size in bytes
    pub size: u64,
    /// Hit rate in [0, 1]
    pub hit_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub last_update: Timestamp,
    #[serde(default)]
    pub metrics: BTreeMap<String, DashboardMetric>,
    pub cache: CacheInfo,
}

/// The data one validator consumes
#[derive(Debug, Clone, PartialEq)]
pub enum DomainSnapshot {
    EventTracking(Vec<TrackingEvent>),
    AbTesting(Vec<Experiment>),
    ConversionFunnel(Vec<Funnel>),
    Performance(PerformanceSnapshot),
    Dashboard(Vec<Dashboard>),
}

impl DomainSnapshot {
    pub fn domain(&self) -> ValidationDomain {
        match self {
            DomainSnapshot::EventTracking(_) => ValidationDomain::EventTracking,
            DomainSnapshot::AbTesting(_) => ValidationDomain::AbTesting,
            DomainSnapshot::ConversionFunnel(_) => ValidationDomain::ConversionFunnel,
            DomainSnapshot::Performance(_) => ValidationDomain::Performance,
            DomainSnapshot::Dashboard(_) => ValidationDomain::Dashboard,
        }
    }
}

/// A full set of domain snapshots, as exported by a telemetry store
///
/// Any domain may be absent; validating an absent domain yields a
/// [`SnapshotError::Unavailable`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub events: Option<Vec<TrackingEvent>>,
    #[serde(default)]
    pub experiments: Option<Vec<Experiment>>,
    #[serde(default)]
    pub funnels: Option<Vec<Funnel>>,
    #[serde(default)]
    pub performance: Option<PerformanceSnapshot>,
    #[serde(default)]
    pub dashboards: Option<Vec<Dashboard>>,
}

impl Snapshot {
    /// Parse a snapshot from its JSON export
    pub fn from_json_str(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a snapshot from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self, SnapshotError> {
        info!("Loading snapshot from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Extract one domain's data
    pub fn domain(&self, domain: ValidationDomain) -> Result<DomainSnapshot, SnapshotError> {
        let missing = || SnapshotError::Unavailable(format!("no {} data in snapshot", domain));

        match domain {
            ValidationDomain::EventTracking => self
                .events
                .clone()
                .map(DomainSnapshot::EventTracking)
                .ok_or_else(missing),
            ValidationDomain::AbTesting => self
                .experiments
                .clone()
                .map(DomainSnapshot::AbTesting)
                .ok_or_else(missing),
            ValidationDomain::ConversionFunnel => self
                .funnels
                .clone()
                .map(DomainSnapshot::ConversionFunnel)
                .ok_or_else(missing),
            ValidationDomain::Performance => self
                .performance
                .clone()
                .map(DomainSnapshot::Performance)
                .ok_or_else(missing),
            ValidationDomain::Dashboard => self
                .dashboards
                .clone()
                .map(DomainSnapshot::Dashboard)
                .ok_or_else(missing),
        }
    }
}

/// Supplier of domain snapshots
///
/// `refresh` is called once per full run, before any validator is started; any
/// store lookup belongs there so that validators never wait on I/O.
#[cfg_attr(test, mockall::automock)]
pub trait SnapshotSource: Send + Sync {
    /// Prepare a consistent view for the coming batch
    fn refresh(&self) -> Result<(), SnapshotError>;

    /// Data for a single domain
    fn snapshot(&self, domain: ValidationDomain) -> Result<DomainSnapshot, SnapshotError>;
}

/// Snapshot source backed by an in-memory [`Snapshot`]
#[derive(Debug, Clone, Default)]
pub struct StaticSnapshotSource {
    snapshot: Snapshot,
}

impl StaticSnapshotSource {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, SnapshotError> {
        Ok(Self::new(Snapshot::from_json_file(path)?))
    }
}

impl SnapshotSource for StaticSnapshotSource {
    fn refresh(&self) -> Result<(), SnapshotError> {
        Ok(())
    }

    fn snapshot(&self, domain: ValidationDomain) -> Result<DomainSnapshot, SnapshotError> {
        debug!("Serving static snapshot for {}", domain);
        self.snapshot.domain(domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SNAPSHOT_JSON: &str = r#"{
        "events": [
            {
                "id": "evt-1",
                "userId": "user-1",
                "eventType": "page_view",
                "timestamp": 1700000000000,
                "properties": {"page": "/home"},
                "sessionId": "session-1"
            }
        ],
        "funnels": [
            {
                "id": "checkout",
                "steps": [
                    {"name": "start", "users": 500, "dropoffRate": 0},
                    {"name": "complete", "users": 100, "dropoffRate": 80}
                ],
                "totalUsers": 500,
                "conversionRate": 0.2
            }
        ]
    }"#;

    #[test]
    fn test_snapshot_from_json() {
        let snapshot = Snapshot::from_json_str(SNAPSHOT_JSON).unwrap();

        let events = snapshot.events.as_ref().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].user_id, "user-1");
        assert_eq!(events[0].properties["page"], "/home");

        let funnels = snapshot.funnels.as_ref().unwrap();
        assert_eq!(funnels[0].steps[1].dropoff_rate, 80.0);
        assert!(snapshot.experiments.is_none());
    }

    #[test]
    fn test_snapshot_domain_extraction() {
        let snapshot = Snapshot::from_json_str(SNAPSHOT_JSON).unwrap();

        let events = snapshot.domain(ValidationDomain::EventTracking).unwrap();
        assert_eq!(events.domain(), ValidationDomain::EventTracking);

        let missing = snapshot.domain(ValidationDomain::Dashboard);
        assert!(matches!(missing, Err(SnapshotError::Unavailable(_))));
    }

    #[test]
    fn test_malformed_snapshot_is_rejected() {
        let result = Snapshot::from_json_str(r#"{"events": [{"id": 5}]}"#);
        assert!(matches!(result, Err(SnapshotError::JsonError(_))));
    }

    #[test]
    fn test_static_source_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SNAPSHOT_JSON.as_bytes()).unwrap();

        let source = StaticSnapshotSource::from_json_file(file.path()).unwrap();
        assert!(source.refresh().is_ok());
        assert!(matches!(
            source.snapshot(ValidationDomain::ConversionFunnel),
            Ok(DomainSnapshot::ConversionFunnel(ref funnels)) if funnels.len() == 1
        ));
        assert!(source.snapshot(ValidationDomain::Performance).is_err());
    }

    #[test]
    fn test_static_source_missing_file() {
        let result = StaticSnapshotSource::from_json_file(Path::new("/nonexistent/snapshot.json"));
        assert!(matches!(result, Err(SnapshotError::IoError(_))));
    }
}
