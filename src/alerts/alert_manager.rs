use crate::alerts::{LogNotifier, Notifier, RateLimiter};
use crate::error::AlertError;
use crate::types::{Severity, Timestamp, ValidationDomain, ValidationResult, ValidationStatus};
use chrono::Utc;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// Maximum notification title length in bytes
const MAX_TITLE_LENGTH: usize = 256;
/// Maximum notification body length in bytes
const MAX_BODY_LENGTH: usize = 1024;
/// Recommendations listed in a notification body before summarising the rest
const MAX_LISTED_RECOMMENDATIONS: usize = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Critical,
    Warning,
    Info,
}

impl AlertType {
    /// Critical results raise critical alerts, anything else a warning
    pub fn for_severity(severity: Severity) -> Self {
        if severity == Severity::Critical {
            AlertType::Critical
        } else {
            AlertType::Warning
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Sent,
    Failed,
    RateLimited,
}

/// One delivery attempt of an alert on one channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlertAction {
    pub channel: String,
    pub timestamp: Timestamp,
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// An alert raised for a failed validation result
///
/// Acknowledgement and resolution are independent: either may happen first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationAlert {
    pub id: String,
    pub timestamp: Timestamp,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub title: String,
    pub message: String,
    pub source: ValidationDomain,
    /// Id of the result this alert was raised for
    pub validation_result_id: String,
    pub acknowledged: bool,
    #[serde(default)]
    pub acknowledged_by: Option<String>,
    #[serde(default)]
    pub acknowledged_at: Option<Timestamp>,
    pub resolved: bool,
    #[serde(default)]
    pub resolved_at: Option<Timestamp>,
    #[serde(default)]
    pub actions: Vec<AlertAction>,
}

impl ValidationAlert {
    pub fn from_result(result: &ValidationResult) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            alert_type: AlertType::for_severity(result.severity),
            title: format!("{} validation failed", result.domain.label()),
            message: result.message.clone(),
            source: result.domain,
            validation_result_id: result.id.clone(),
            acknowledged: false,
            acknowledged_by: None,
            acknowledged_at: None,
            resolved: false,
            resolved_at: None,
            actions: Vec::new(),
        }
    }
}

/// Owns the alert list and delivers new alerts to the configured channels
///
/// The list is capped at `max_alerts`; once a batch pushes it past the cap
/// the oldest alerts are dropped first, regardless of severity. Delivery
/// shares a per-minute budget across all channels; attempts over budget are
/// recorded as `rate_limited` rather than queued.
pub struct AlertManager {
    /// Alerts in insertion order, oldest at the front
    alerts: VecDeque<ValidationAlert>,
    /// Cap applied after every batch
    max_alerts: usize,
    /// Budget shared by all channels
    rate_limiter: RateLimiter,
    /// Delivery channels, tried in order for every new alert
    notifiers: Vec<Box<dyn Notifier>>,
}

impl AlertManager {
    /// Alert manager that delivers through the log
    ///
    /// # Arguments
    ///
    /// * `max_alerts` - Number of alerts kept; older ones are dropped first
    /// * `max_per_minute` - Notification budget across all channels
    pub fn new(max_alerts: usize, max_per_minute: usize) -> Self {
        Self::with_notifiers(max_alerts, max_per_minute, vec![Box::new(LogNotifier)])
    }

    /// Alert manager that delivers through the given channels
    ///
    /// # Arguments
    ///
    /// * `max_alerts` - Number of alerts kept; older ones are dropped first
    /// * `max_per_minute` - Notification budget across all channels
    /// * `notifiers` - Channels every new alert is offered to; may be empty
    pub fn with_notifiers(
        max_alerts: usize,
        max_per_minute: usize,
        notifiers: Vec<Box<dyn Notifier>>,
    ) -> Self {
        Self {
            alerts: VecDeque::new(),
            max_alerts,
            rate_limiter: RateLimiter::new(max_per_minute),
            notifiers,
        }
    }

    /// Raise one alert per failed result, deliver it, then prune the list
    ///
    /// Delivery failures never propagate: each attempt is recorded in the
    /// alert's `actions` as `sent`, `failed` or `rate_limited`.
    ///
    /// # Arguments
    ///
    /// * `results` - One batch of validation results; only `failed` ones raise alerts
    ///
    /// # Returns
    ///
    /// The alerts created for this batch, in result order, including any that
    /// the cap already pruned from the list
    pub fn process_results(&mut self, results: &[ValidationResult]) -> Vec<ValidationAlert> {
        let mut created = Vec::new();

        for result in results.iter().filter(|r| r.status == ValidationStatus::Failed) {
            let mut alert = ValidationAlert::from_result(result);
            info!(
                "Raised {:?} alert {} for {}: {}",
                alert.alert_type, alert.id, result.domain, result.message
            );
            self.deliver(&mut alert, &result.recommendations);
            created.push(alert.clone());
            self.alerts.push_back(alert);
        }

        self.prune();
        created
    }

    fn deliver(&mut self, alert: &mut ValidationAlert, recommendations: &[String]) {
        let title = Self::truncate_text(&alert.title, MAX_TITLE_LENGTH);
        let body = Self::truncate_text(
            &Self::format_notification_body(&alert.message, recommendations),
            MAX_BODY_LENGTH,
        );

        for notifier in &self.notifiers {
            let channel = notifier.channel();
            let (status, error) = if !self.rate_limiter.can_send() {
                debug!("Alert {} rate limited on channel {}", alert.id, channel);
                (
                    ActionStatus::RateLimited,
                    Some(AlertError::RateLimitExceeded.to_string()),
                )
            } else {
                match notifier.send(&title, &body) {
                    Ok(()) => {
                        self.rate_limiter.record_notification();
                        (ActionStatus::Sent, None)
                    }
                    Err(e) => {
                        error!("Failed to deliver alert {} on {}: {}", alert.id, channel, e);
                        (ActionStatus::Failed, Some(e.to_string()))
                    }
                }
            };

            alert.actions.push(AlertAction {
                channel,
                timestamp: Utc::now(),
                status,
                error,
            });
        }
    }

    fn prune(&mut self) {
        let excess = self.alerts.len().saturating_sub(self.max_alerts);
        if excess > 0 {
            self.alerts.drain(..excess);
            warn!(
                "Alert list over capacity, dropped {} oldest alerts (keeping {})",
                excess, self.max_alerts
            );
        }
    }

    /// Mark an alert acknowledged
    ///
    /// Resolved alerts may still be acknowledged.
    ///
    /// # Arguments
    ///
    /// * `id` - Alert id
    /// * `by` - Who acknowledged it
    ///
    /// # Returns
    ///
    /// `false` when no alert has this id; the list is left unchanged
    pub fn acknowledge(&mut self, id: &str, by: &str) -> bool {
        match self.alerts.iter_mut().find(|alert| alert.id == id) {
            Some(alert) => {
                alert.acknowledged = true;
                alert.acknowledged_by = Some(by.to_string());
                alert.acknowledged_at = Some(Utc::now());
                info!("Alert {} acknowledged by {}", id, by);
                true
            }
            None => {
                debug!("Cannot acknowledge unknown alert {}", id);
                false
            }
        }
    }

    /// Mark an alert resolved
    ///
    /// # Returns
    ///
    /// `false` when no alert has this id; the list is left unchanged
    pub fn resolve(&mut self, id: &str) -> bool {
        match self.alerts.iter_mut().find(|alert| alert.id == id) {
            Some(alert) => {
                alert.resolved = true;
                alert.resolved_at = Some(Utc::now());
                info!("Alert {} resolved", id);
                true
            }
            None => {
                debug!("Cannot resolve unknown alert {}", id);
                false
            }
        }
    }

    /// Alerts in insertion order, resolved ones only when asked for
    pub fn alerts(&self, include_resolved: bool) -> Vec<ValidationAlert> {
        self.alerts
            .iter()
            .filter(|alert| include_resolved || !alert.resolved)
            .cloned()
            .collect()
    }

    /// Unresolved alerts raised at or after `since`
    ///
    /// # Arguments
    ///
    /// * `since` - Start of the counting window
    pub fn unresolved_since(&self, since: Timestamp) -> usize {
        self.alerts
            .iter()
            .filter(|alert| !alert.resolved && alert.timestamp >= since)
            .count()
    }

    /// Number of alerts on record, resolved ones included
    ///
    /// # Returns
    ///
    /// At most the configured `max_alerts`.
    pub fn total_alerts(&self) -> usize {
        self.alerts.len()
    }

    /// Truncate to at most `max_length` bytes, ending in "..." and never
    /// splitting a UTF-8 character
    fn truncate_text(text: &str, max_length: usize) -> String {
        if text.len() <= max_length {
            return text.to_string();
        }

        let mut cut = max_length.saturating_sub(3);
        while cut > 0 && !text.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &text[..cut])
    }

    fn format_notification_body(message: &str, recommendations: &[String]) -> String {
        let mut body = message.to_string();

        if !recommendations.is_empty() {
            body.push_str("\n\nRecommendations:\n");
            for (i, recommendation) in recommendations
                .iter()
                .take(MAX_LISTED_RECOMMENDATIONS)
                .enumerate()
            {
                body.push_str(&format!("{}. {}\n", i + 1, recommendation));
            }
            if recommendations.len() > MAX_LISTED_RECOMMENDATIONS {
                body.push_str(&format!(
                    "... and {} more recommendations",
                    recommendations.len() - MAX_LISTED_RECOMMENDATIONS
                ));
            }
        }

        body.trim().to_string()
    }
}

impl std::fmt::Debug for AlertManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertManager")
            .field("alerts", &self.alerts.len())
            .field("max_alerts", &self.max_alerts)
            .field("rate_limiter", &self.rate_limiter)
            .field("notifiers", &self.notifiers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::notifier::MockNotifier;
    use serde_json::json;

    fn result(domain: ValidationDomain, status: ValidationStatus, severity: Severity) -> ValidationResult {
        ValidationResult::new(
            domain,
            status,
            severity,
            5,
            format!("{} check {:?}", domain, status),
            json!({}),
            vec!["First".to_string(), "Second".to_string()],
        )
    }

    fn failed(severity: Severity) -> ValidationResult {
        result(ValidationDomain::Performance, ValidationStatus::Failed, severity)
    }

    #[test]
    fn test_one_alert_per_failed_result() {
        let mut manager = AlertManager::new(100, 10);
        let batch = vec![
            failed(Severity::Critical),
            result(ValidationDomain::Dashboard, ValidationStatus::Warning, Severity::Medium),
            failed(Severity::High),
            result(ValidationDomain::AbTesting, ValidationStatus::Passed, Severity::Low),
        ];

        let created = manager.process_results(&batch);

        assert_eq!(created.len(), 2);
        assert_eq!(manager.total_alerts(), 2);
        assert_eq!(created[0].alert_type, AlertType::Critical);
        assert_eq!(created[1].alert_type, AlertType::Warning);
        assert_eq!(created[0].validation_result_id, batch[0].id);
        assert_eq!(created[0].source, ValidationDomain::Performance);
        assert!(!created[0].acknowledged && !created[0].resolved);
    }

    #[test]
    fn test_pruning_drops_oldest_first() {
        let mut manager = AlertManager::new(3, 100);
        let first = manager.process_results(&[failed(Severity::Critical), failed(Severity::High)]);
        let second = manager.process_results(&[failed(Severity::High), failed(Severity::High)]);

        let ids: Vec<String> = manager.alerts(true).into_iter().map(|a| a.id).collect();
        assert_eq!(ids.len(), 3);
        // the critical alert is evicted despite its severity
        assert!(!ids.contains(&first[0].id));
        assert_eq!(ids[0], first[1].id);
        assert_eq!(ids[2], second[1].id);
    }

    #[test]
    fn test_acknowledge_and_resolve_in_any_order() {
        let mut manager = AlertManager::new(100, 10);
        let created = manager.process_results(&[failed(Severity::High), failed(Severity::High)]);

        assert!(manager.resolve(&created[0].id));
        assert!(manager.acknowledge(&created[0].id, "oncall"));
        assert!(manager.acknowledge(&created[1].id, "oncall"));

        let all = manager.alerts(true);
        assert_eq!(all[0].acknowledged_by.as_deref(), Some("oncall"));
        assert!(all[0].resolved && all[0].resolved_at.is_some());
        assert!(all[1].acknowledged && !all[1].resolved);

        let open = manager.alerts(false);
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, created[1].id);
    }

    #[test]
    fn test_unknown_ids_return_false_and_change_nothing() {
        let mut manager = AlertManager::new(100, 10);
        manager.process_results(&[failed(Severity::High)]);
        let before = manager.alerts(true);

        assert!(!manager.acknowledge("nonexistent-id", "user"));
        assert!(!manager.resolve("nonexistent-id"));
        assert_eq!(manager.alerts(true), before);
    }

    #[test]
    fn test_delivery_outcomes_are_recorded() {
        let mut working = MockNotifier::new();
        working.expect_channel().return_const("pager".to_string());
        working.expect_send().times(1).returning(|_, _| Ok(()));

        let mut broken = MockNotifier::new();
        broken.expect_channel().return_const("email".to_string());
        broken
            .expect_send()
            .times(1)
            .returning(|_, _| Err(AlertError::NotificationFailed("smtp down".to_string())));

        let mut manager = AlertManager::with_notifiers(100, 10, vec![Box::new(working), Box::new(broken)]);
        let created = manager.process_results(&[failed(Severity::Critical)]);

        let actions = &created[0].actions;
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].channel, "pager");
        assert_eq!(actions[0].status, ActionStatus::Sent);
        assert_eq!(actions[1].status, ActionStatus::Failed);
        assert_eq!(
            actions[1].error.as_deref(),
            Some("Failed to send notification: smtp down")
        );
    }

    #[test]
    fn test_rate_limited_delivery() {
        let mut notifier = MockNotifier::new();
        notifier.expect_channel().return_const("log".to_string());
        notifier.expect_send().times(1).returning(|_, _| Ok(()));

        let mut manager = AlertManager::with_notifiers(100, 1, vec![Box::new(notifier)]);
        let created = manager.process_results(&[failed(Severity::High), failed(Severity::High)]);

        assert_eq!(created[0].actions[0].status, ActionStatus::Sent);
        assert_eq!(created[1].actions[0].status, ActionStatus::RateLimited);
    }

    #[test]
    fn test_format_notification_body() {
        let many: Vec<String> = ["First", "Second", "Third", "Fourth", "Fifth"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let body = AlertManager::format_notification_body("Dashboards are stale", &many);
        assert!(body.starts_with("Dashboards are stale"));
        assert!(body.contains("3. Third"));
        assert!(!body.contains("4. Fourth"));
        assert!(body.contains("... and 2 more recommendations"));

        let bare = AlertManager::format_notification_body("Dashboards are stale", &[]);
        assert_eq!(bare, "Dashboards are stale");
    }

    #[test]
    fn test_truncate_text_respects_char_boundaries() {
        assert_eq!(AlertManager::truncate_text("short", 10), "short");
        assert_eq!(AlertManager::truncate_text("abcdefghij", 8), "abcde...");

        let text = "ééééé"; // 10 bytes
        let truncated = AlertManager::truncate_text(text, 8);
        assert_eq!(truncated, "éé...");
    }

    #[test]
    fn test_alert_serialization_shape() {
        let alert = ValidationAlert::from_result(&failed(Severity::Critical));
        let json = serde_json::to_value(&alert).unwrap();

        assert_eq!(json["type"], "critical");
        assert_eq!(json["source"], "performance");
        assert!(json.get("validationResultId").is_some());
        assert_eq!(json["acknowledged"], false);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    #[derive(Debug, Clone)]
    struct ArbitraryResult(ValidationResult);

    impl Arbitrary for ArbitraryResult {
        fn arbitrary(g: &mut Gen) -> Self {
            let domain = *g.choose(&ValidationDomain::ALL).unwrap();
            let status = *g
                .choose(&[
                    ValidationStatus::Passed,
                    ValidationStatus::Warning,
                    ValidationStatus::Failed,
                ])
                .unwrap();
            let severity = *g
                .choose(&[Severity::Low, Severity::Medium, Severity::High, Severity::Critical])
                .unwrap();
            let recommendations = (0..usize::arbitrary(g) % 6)
                .map(|i| format!("Recommendation {}: {}", i + 1, String::arbitrary(g)))
                .collect();

            ArbitraryResult(ValidationResult::new(
                domain,
                status,
                severity,
                u64::arbitrary(g) % 1000,
                String::arbitrary(g),
                serde_json::Value::Null,
                recommendations,
            ))
        }
    }

    // The list never exceeds its cap and always keeps the newest alerts
    #[quickcheck]
    fn prop_alert_list_is_capped_fifo(batches: Vec<Vec<ArbitraryResult>>, cap: u8) -> bool {
        let cap = cap as usize % 20 + 1;
        let mut manager = AlertManager::new(cap, 1000);
        let mut created_ids = Vec::new();

        for batch in batches {
            let results: Vec<ValidationResult> = batch.into_iter().map(|r| r.0).collect();
            created_ids.extend(manager.process_results(&results).into_iter().map(|a| a.id));
            if manager.total_alerts() > cap {
                return false;
            }
        }

        let kept: Vec<String> = manager.alerts(true).into_iter().map(|a| a.id).collect();
        let expected = &created_ids[created_ids.len().saturating_sub(cap)..];
        kept == expected
    }

    #[quickcheck]
    fn prop_truncated_text_fits(text: String, max: u16) -> bool {
        let max = max as usize % 300 + 3;
        let truncated = AlertManager::truncate_text(&text, max);
        truncated.len() <= max && (text.len() > max || truncated == text)
    }
}
