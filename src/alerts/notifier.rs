use crate::error::AlertError;
use log::warn;

/// A delivery channel for alert notifications
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    /// Channel name recorded on each delivery attempt
    fn channel(&self) -> String;

    fn send(&self, title: &str, body: &str) -> Result<(), AlertError>;
}

/// Writes notifications to the log at warn level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn channel(&self) -> String {
        "log".to_string()
    }

    fn send(&self, title: &str, body: &str) -> Result<(), AlertError> {
        warn!("ALERT {}: {}", title, body.replace('\n', " | "));
        Ok(())
    }
}
