/// Error types for validators, snapshots, alerts and configuration
pub mod error;

/// Shared domain, result and report types
pub mod types;

/// Configuration management and environment presets
pub mod config;

/// Input snapshots and their sources
pub mod snapshot;

/// Statistical primitives used by the A/B testing validator
pub mod stats;

/// The five domain validators
pub mod validators;

/// Per-domain health scoring
pub mod health;

/// Rolling validation statistics
pub mod statistics;

/// Report trends and recommendations
pub mod report;

/// Validation schedule metadata
pub mod schedule;

/// Alert manager and notifications
pub mod alerts;

/// Concurrent validation runs and status projections
pub mod orchestrator;

/// Sample snapshots for tests and demos
pub mod fixtures;

// Re-export commonly used types
pub use config::ValidationConfig;
pub use error::{AlertError, ConfigError, EngineError, SnapshotError, ValidationError};
pub use orchestrator::{SystemState, SystemStatus, ValidationOrchestrator};
pub use types::{Severity, ValidationDomain, ValidationReport, ValidationResult, ValidationStatus};
