/// Alert lifecycle, delivery channels and rate limiting
pub mod alert_manager;
pub mod notifier;
pub mod rate_limiter;

pub use alert_manager::{ActionStatus, AlertAction, AlertManager, AlertType, ValidationAlert};
pub use notifier::{LogNotifier, Notifier};
pub use rate_limiter::RateLimiter;
