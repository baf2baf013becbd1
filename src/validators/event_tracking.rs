//! Event tracking validation
//!
//! Checks a batch of tracked events for structural validity, duplicate
//! submissions, required-event coverage, per-type volume anomalies and
//! timestamp clustering.

use super::{mirrored_severity, DomainValidator, Verdict};
use crate::config::EventTrackingConfig;
use crate::error::ValidationError;
use crate::health;
use crate::snapshot::TrackingEvent;
use crate::types::{Timestamp, ValidationDomain, ValidationStatus};
use chrono::Duration;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Events further in the past than this are structurally invalid
const MAX_EVENT_AGE_HOURS: i64 = 24;
/// A one-second bucket holding more events than this is suspicious
const CLUSTER_LIMIT: usize = 100;
/// Actual volume below this share of the baseline is signal loss
const SIGNAL_LOSS_RATIO: f64 = 0.1;
/// Actual volume above this multiple of the baseline is a signal storm
const SIGNAL_STORM_RATIO: f64 = 10.0;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VolumeAnomalyKind {
    SignalLoss,
    SignalStorm,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeAnomaly {
    pub event_type: String,
    pub expected: f64,
    pub actual: usize,
    pub kind: VolumeAnomalyKind,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimestampCluster {
    /// Unix second the events were rounded to
    pub second: i64,
    pub count: usize,
}

/// Everything the event tracking checks found in one batch
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventTrackingAnalysis {
    pub total_events: usize,
    pub invalid_events: usize,
    pub duplicate_events: usize,
    pub missing_events: Vec<String>,
    pub volume_anomalies: Vec<VolumeAnomaly>,
    pub suspicious_clusters: Vec<TimestampCluster>,
    pub future_events: usize,
    pub event_type_counts: BTreeMap<String, usize>,
    pub issue_percentage: f64,
    pub error_threshold: f64,
    pub sample_size: usize,
}

impl EventTrackingAnalysis {
    /// Whether any check flagged anything at all
    pub fn has_issues(&self) -> bool {
        self.invalid_events > 0
            || self.duplicate_events > 0
            || !self.missing_events.is_empty()
            || !self.volume_anomalies.is_empty()
            || !self.suspicious_clusters.is_empty()
            || self.future_events > 0
    }
}

pub struct EventTrackingValidator {
    config: EventTrackingConfig,
}

impl EventTrackingValidator {
    pub fn new(config: EventTrackingConfig) -> Self {
        Self { config }
    }

    fn is_structurally_valid(&self, event: &TrackingEvent, now_ms: i64) -> bool {
        let has_text = |value: &str| !value.trim().is_empty();
        let oldest = now_ms.saturating_sub(Duration::hours(MAX_EVENT_AGE_HOURS).num_milliseconds());
        let newest = now_ms.saturating_add(self.config.timestamp_tolerance_ms);

        has_text(&event.id)
            && has_text(&event.user_id)
            && has_text(&event.event_type)
            && has_text(&event.session_id)
            && (oldest..=newest).contains(&event.timestamp)
    }

    /// Identical (user, type, properties) submissions beyond the first
    ///
    /// Ids and timestamps are ignored so that client retries are caught.
    pub fn count_duplicates(events: &[TrackingEvent]) -> usize {
        let mut groups: HashMap<(&str, &str, String), usize> = HashMap::new();
        for event in events {
            *groups
                .entry((
                    event.user_id.as_str(),
                    event.event_type.as_str(),
                    event.properties.to_string(),
                ))
                .or_insert(0) += 1;
        }
        groups.values().map(|count| count - 1).sum()
    }

    fn volume_anomalies(
        &self,
        counts: &BTreeMap<String, usize>,
        total_events: usize,
    ) -> Vec<VolumeAnomaly> {
        let required = &self.config.required_events;
        if required.is_empty() || total_events == 0 {
            return Vec::new();
        }
        let even_share = total_events as f64 / required.len() as f64;

        required
            .iter()
            .filter_map(|event_type| {
                // absent types are already reported as missing
                let actual = *counts.get(event_type)?;
                let expected = self
                    .config
                    .expected_volumes
                    .get(event_type)
                    .copied()
                    .unwrap_or(even_share);

                let kind = if (actual as f64) < expected * SIGNAL_LOSS_RATIO {
                    VolumeAnomalyKind::SignalLoss
                } else if actual as f64 > expected * SIGNAL_STORM_RATIO {
                    VolumeAnomalyKind::SignalStorm
                } else {
                    return None;
                };

                Some(VolumeAnomaly {
                    event_type: event_type.clone(),
                    expected,
                    actual,
                    kind,
                })
            })
            .collect()
    }

    fn timestamp_clusters(events: &[TrackingEvent]) -> Vec<TimestampCluster> {
        let mut buckets: BTreeMap<i64, usize> = BTreeMap::new();
        for event in events {
            let second = event.timestamp.saturating_add(500).div_euclid(1000);
            *buckets.entry(second).or_insert(0) += 1;
        }

        buckets
            .into_iter()
            .filter(|(_, count)| *count > CLUSTER_LIMIT)
            .map(|(second, count)| TimestampCluster { second, count })
            .collect()
    }
}

impl DomainValidator for EventTrackingValidator {
    type Input = [TrackingEvent];
    type Analysis = EventTrackingAnalysis;

    fn domain(&self) -> ValidationDomain {
        ValidationDomain::EventTracking
    }

    fn analyze(
        &self,
        events: &[TrackingEvent],
        now: Timestamp,
    ) -> Result<EventTrackingAnalysis, ValidationError> {
        let now_ms = now.timestamp_millis();
        let total_events = events.len();

        let invalid_events = events
            .iter()
            .filter(|event| !self.is_structurally_valid(event, now_ms))
            .count();

        let duplicate_events = if self.config.duplicate_detection {
            Self::count_duplicates(events)
        } else {
            0
        };

        let mut event_type_counts: BTreeMap<String, usize> = BTreeMap::new();
        for event in events {
            *event_type_counts.entry(event.event_type.clone()).or_insert(0) += 1;
        }

        let observed: BTreeSet<&str> = event_type_counts.keys().map(String::as_str).collect();
        let missing_events = self
            .config
            .required_events
            .iter()
            .filter(|required| !observed.contains(required.as_str()))
            .cloned()
            .collect();

        let volume_anomalies = self.volume_anomalies(&event_type_counts, total_events);
        let suspicious_clusters = Self::timestamp_clusters(events);
        let future_events = events
            .iter()
            .filter(|event| event.timestamp > now_ms.saturating_add(self.config.timestamp_tolerance_ms))
            .count();

        let issue_percentage = if total_events == 0 {
            0.0
        } else {
            (invalid_events + duplicate_events) as f64 / total_events as f64 * 100.0
        };

        Ok(EventTrackingAnalysis {
            total_events,
            invalid_events,
            duplicate_events,
            missing_events,
            volume_anomalies,
            suspicious_clusters,
            future_events,
            event_type_counts,
            issue_percentage,
            error_threshold: self.config.error_threshold,
            sample_size: self.config.sample_size,
        })
    }

    fn verdict(&self, analysis: &EventTrackingAnalysis) -> Verdict {
        let status = if analysis.issue_percentage > self.config.error_threshold {
            ValidationStatus::Failed
        } else if analysis.has_issues() {
            ValidationStatus::Warning
        } else {
            ValidationStatus::Passed
        };

        let message = format!(
            "{} events checked: {} invalid, {} duplicates, {} missing required types ({:.1}% issues, threshold {:.1}%)",
            analysis.total_events,
            analysis.invalid_events,
            analysis.duplicate_events,
            analysis.missing_events.len(),
            analysis.issue_percentage,
            self.config.error_threshold
        );

        let mut recommendations = Vec::new();
        if analysis.invalid_events > 0 {
            recommendations.push(format!(
                "Fix {} structurally invalid events: ids, user, type and session must be set and timestamps must be recent",
                analysis.invalid_events
            ));
        }
        if analysis.duplicate_events > 0 {
            recommendations.push(format!(
                "Deduplicate {} repeated submissions; check client retry logic",
                analysis.duplicate_events
            ));
        }
        if !analysis.missing_events.is_empty() {
            recommendations.push(format!(
                "Restore tracking for missing required events: {}",
                analysis.missing_events.join(", ")
            ));
        }
        for anomaly in &analysis.volume_anomalies {
            let what = match anomaly.kind {
                VolumeAnomalyKind::SignalLoss => "signal loss",
                VolumeAnomalyKind::SignalStorm => "signal storm",
            };
            recommendations.push(format!(
                "Investigate {} for '{}': {} events against a baseline of {:.0}",
                what, anomaly.event_type, anomaly.actual, anomaly.expected
            ));
        }
        if !analysis.suspicious_clusters.is_empty() {
            recommendations.push(format!(
                "{} one-second buckets hold more than {} events; check client-side timestamp generation",
                analysis.suspicious_clusters.len(),
                CLUSTER_LIMIT
            ));
        }
        if analysis.future_events > 0 {
            recommendations.push(format!(
                "{} events are timestamped in the future; check device clock handling",
                analysis.future_events
            ));
        }
        if analysis.total_events < analysis.sample_size {
            recommendations.push(format!(
                "Only {} events sampled, below the configured sample size of {}",
                analysis.total_events, analysis.sample_size
            ));
        }

        Verdict {
            status,
            severity: mirrored_severity(status),
            message,
            recommendations,
        }
    }

    fn health_score(&self, analysis: &EventTrackingAnalysis) -> f64 {
        health::event_tracking_score(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationConfig;
    use crate::fixtures;
    use crate::types::Severity;
    use chrono::Utc;
    use serde_json::json;

    fn validator() -> EventTrackingValidator {
        EventTrackingValidator::new(ValidationConfig::default().event_tracking)
    }

    fn event(id: &str, user: &str, event_type: &str, timestamp: i64) -> TrackingEvent {
        TrackingEvent {
            id: id.to_string(),
            user_id: user.to_string(),
            event_type: event_type.to_string(),
            timestamp,
            properties: json!({"page": "/home"}),
            session_id: format!("session-{}", user),
        }
    }

    #[test]
    fn test_clean_batch_passes() {
        let now = Utc::now();
        let events = fixtures::tracking_events(now, 200);

        let evaluation = validator().evaluate(&events, now);
        let details = &evaluation.result.details;

        assert_eq!(evaluation.result.status, ValidationStatus::Passed);
        assert_eq!(evaluation.result.severity, Severity::Low);
        assert_eq!(details["invalidEvents"], 0);
        assert_eq!(details["duplicateEvents"], 0);
        assert_eq!(details["missingEvents"], json!([]));
        assert_eq!(evaluation.health_score, 100.0);
    }

    #[test]
    fn test_duplicates_ignore_id_and_timestamp() {
        let now_ms = Utc::now().timestamp_millis();
        let events = vec![
            event("a", "u1", "page_view", now_ms - 1_000),
            event("b", "u1", "page_view", now_ms - 2_000),
            event("c", "u1", "page_view", now_ms - 3_000),
            event("d", "u2", "page_view", now_ms - 1_000),
            event("e", "u2", "page_view", now_ms - 5_000),
            event("f", "u3", "page_view", now_ms - 1_000),
        ];

        // u1 group contributes 2, u2 group contributes 1
        assert_eq!(EventTrackingValidator::count_duplicates(&events), 3);
    }

    #[test]
    fn test_duplicates_distinguish_properties() {
        let now_ms = Utc::now().timestamp_millis();
        let mut first = event("a", "u1", "click", now_ms);
        let mut second = event("b", "u1", "click", now_ms);
        first.properties = json!({"button": "buy"});
        second.properties = json!({"button": "cancel"});

        assert_eq!(EventTrackingValidator::count_duplicates(&[first, second]), 0);
    }

    #[test]
    fn test_duplicate_detection_can_be_disabled() {
        let now = Utc::now();
        let mut config = ValidationConfig::default().event_tracking;
        config.duplicate_detection = false;
        config.required_events = vec![];
        let now_ms = now.timestamp_millis();
        let events = vec![
            event("a", "u1", "page_view", now_ms),
            event("b", "u1", "page_view", now_ms),
        ];

        let analysis = EventTrackingValidator::new(config).analyze(&events, now).unwrap();
        assert_eq!(analysis.duplicate_events, 0);
    }

    #[test]
    fn test_structural_violations() {
        let now = Utc::now();
        let now_ms = now.timestamp_millis();
        let mut config = ValidationConfig::default().event_tracking;
        config.required_events = vec![];

        let mut blank_user = event("a", "u1", "page_view", now_ms);
        blank_user.user_id = "  ".to_string();
        let mut blank_session = event("b", "u2", "page_view", now_ms);
        blank_session.session_id = String::new();
        let too_old = event("c", "u3", "page_view", now_ms - Duration::hours(25).num_milliseconds());
        let future = event("d", "u4", "page_view", now_ms + 120_000);
        let fine = event("e", "u5", "page_view", now_ms - 10_000);

        let analysis = EventTrackingValidator::new(config)
            .analyze(&[blank_user, blank_session, too_old, future, fine], now)
            .unwrap();

        assert_eq!(analysis.invalid_events, 4);
        assert_eq!(analysis.future_events, 1);
        assert!((analysis.issue_percentage - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_issue_percentage_over_threshold_fails() {
        let now = Utc::now();
        let mut events = fixtures::tracking_events(now, 100);
        for event in events.iter_mut().take(10) {
            event.id.clear();
        }

        let evaluation = validator().evaluate(&events, now);
        assert_eq!(evaluation.result.status, ValidationStatus::Failed);
        assert_eq!(evaluation.result.severity, Severity::Critical);
        assert_eq!(evaluation.result.details["invalidEvents"], 10);
    }

    #[test]
    fn test_issues_under_threshold_warn() {
        let now = Utc::now();
        let mut events = fixtures::tracking_events(now, 100);
        events[0].id.clear();

        let evaluation = validator().evaluate(&events, now);
        assert_eq!(evaluation.result.status, ValidationStatus::Warning);
        assert_eq!(evaluation.result.severity, Severity::Medium);
    }

    #[test]
    fn test_missing_required_events_warn() {
        let now = Utc::now();
        let events: Vec<_> = fixtures::tracking_events(now, 200)
            .into_iter()
            .filter(|event| event.event_type != "conversion")
            .collect();

        let evaluation = validator().evaluate(&events, now);
        assert_eq!(evaluation.result.status, ValidationStatus::Warning);
        assert_eq!(evaluation.result.details["missingEvents"], json!(["conversion"]));
        assert!(evaluation.health_score < 100.0);
    }

    #[test]
    fn test_volume_signal_loss_and_storm() {
        let now = Utc::now();
        let now_ms = now.timestamp_millis();
        let mut config = ValidationConfig::default().event_tracking;
        config.required_events = vec!["page_view".to_string(), "conversion".to_string()];
        config.expected_volumes.insert("page_view".to_string(), 2.0);
        config.expected_volumes.insert("conversion".to_string(), 500.0);

        let events: Vec<_> = (0..40)
            .map(|i| {
                let event_type = if i < 30 { "page_view" } else { "conversion" };
                event(&format!("e{}", i), &format!("u{}", i), event_type, now_ms - i * 1_000)
            })
            .collect();

        let analysis = EventTrackingValidator::new(config).analyze(&events, now).unwrap();
        let kinds: Vec<_> = analysis
            .volume_anomalies
            .iter()
            .map(|a| (a.event_type.as_str(), a.kind))
            .collect();

        assert!(kinds.contains(&("page_view", VolumeAnomalyKind::SignalStorm)));
        assert!(kinds.contains(&("conversion", VolumeAnomalyKind::SignalLoss)));
    }

    #[test]
    fn test_timestamp_clustering() {
        let now = Utc::now();
        let now_ms = now.timestamp_millis();
        let mut config = ValidationConfig::default().event_tracking;
        config.required_events = vec![];

        let events: Vec<_> = (0..101)
            .map(|i| event(&format!("e{}", i), &format!("u{}", i), "page_view", now_ms - 5_000))
            .collect();

        let analysis = EventTrackingValidator::new(config).analyze(&events, now).unwrap();
        assert_eq!(analysis.suspicious_clusters.len(), 1);
        assert_eq!(analysis.suspicious_clusters[0].count, 101);
        assert!(analysis.has_issues());
    }

    #[test]
    fn test_extreme_timestamp_is_invalid_not_a_crash() {
        let now = Utc::now();
        let events = vec![event("a", "u1", "page_view", i64::MAX), event("b", "u2", "page_view", i64::MIN)];

        let evaluation = validator().evaluate(&events, now);

        assert_eq!(evaluation.result.details["invalidEvents"], 2);
        assert_eq!(evaluation.result.status, ValidationStatus::Failed);
        assert!(evaluation.result.error().is_none());
    }

    #[test]
    fn test_empty_batch() {
        let now = Utc::now();
        let evaluation = validator().evaluate(&[], now);

        assert_eq!(evaluation.result.status, ValidationStatus::Warning);
        assert_eq!(evaluation.result.details["totalEvents"], 0);
        assert_eq!(evaluation.result.details["issuePercentage"], 0.0);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use serde_json::json;

    // Duplicate count equals occurrences − 1 summed over every signature group
    #[quickcheck]
    fn prop_duplicate_count_matches_group_sizes(group_sizes: Vec<u8>) -> bool {
        let group_sizes: Vec<usize> = group_sizes.iter().take(20).map(|s| (*s % 6) as usize + 1).collect();

        let mut events = Vec::new();
        for (group, size) in group_sizes.iter().enumerate() {
            for copy in 0..*size {
                events.push(TrackingEvent {
                    id: format!("g{}-{}", group, copy),
                    user_id: format!("user-{}", group),
                    event_type: "page_view".to_string(),
                    timestamp: copy as i64 * 1_000,
                    properties: json!({"group": group}),
                    session_id: "s".to_string(),
                });
            }
        }

        let expected: usize = group_sizes.iter().map(|size| size - 1).sum();
        EventTrackingValidator::count_duplicates(&events) == expected
    }
}
