use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use instrumentation_validator::config::ValidationConfig;
use instrumentation_validator::error::ConfigError;
use instrumentation_validator::fixtures::FixtureSnapshotSource;
use instrumentation_validator::snapshot::{SnapshotSource, StaticSnapshotSource};
use instrumentation_validator::ValidationOrchestrator;
use log::{error, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Command-line arguments for the instrumentation validator
#[derive(Parser, Debug)]
#[command(
    name = "instrumentation-validator",
    about = "Data-quality validation and alerting for analytics instrumentation",
    long_about = "Validates event tracking, A/B tests, conversion funnels, performance metrics \
                  and dashboards against configurable thresholds, raising alerts for failures."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// JSON snapshot to validate; built-in sample data when omitted
    #[arg(short, long, value_name = "FILE")]
    snapshot: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Run every enabled validator and print the report
    Run {
        /// Keep running full validations until interrupted
        #[arg(long)]
        watch: bool,

        /// Seconds between runs in watch mode
        #[arg(long, default_value_t = 300, value_name = "SECS")]
        interval: u64,
    },
    /// Run a single validator, e.g. `performance` or `conversion_funnel`
    Validate { domain: String },
    /// Run a full validation and print the per-domain health scores
    Health,
    /// Run a full validation and print the system status
    Status,
    /// Print the validation schedules
    Schedules,
}

impl Cli {
    /// Validate CLI arguments
    ///
    /// A missing config file is tolerated (defaults are used); a missing
    /// snapshot file is not.
    fn validate(&self) -> Result<(), String> {
        if let Some(config_path) = &self.config {
            if config_path.exists() {
                if !config_path.is_file() {
                    return Err(format!(
                        "Configuration path is not a file: {}",
                        config_path.display()
                    ));
                }
                if let Some(extension) = config_path.extension() {
                    if extension != "toml" {
                        warn!(
                            "Configuration file does not have .toml extension: {}",
                            config_path.display()
                        );
                    }
                }
            }
        }

        if let Some(snapshot_path) = &self.snapshot {
            if !snapshot_path.is_file() {
                return Err(format!(
                    "Snapshot file not found: {}",
                    snapshot_path.display()
                ));
            }
        }

        if let Some(Command::Run {
            watch: true,
            interval: 0,
        }) = self.command
        {
            return Err("Watch interval must be at least one second".to_string());
        }
        Ok(())
    }
}

/// Load configuration from file or use defaults
///
/// Unreadable or invalid files fall back to the production defaults with a
/// logged warning.
fn load_config(config_path: Option<&Path>) -> ValidationConfig {
    match config_path {
        Some(path) => match ValidationConfig::from_file(path) {
            Ok(config) => config,
            Err(ConfigError::ReadError(_)) => {
                warn!(
                    "Configuration file '{}' not found or unreadable, using defaults",
                    path.display()
                );
                ValidationConfig::default()
            }
            Err(e) => {
                error!("Configuration error in '{}': {}", path.display(), e);
                warn!("Using default configuration due to invalid config file");
                ValidationConfig::default()
            }
        },
        None => {
            info!("Using default configuration");
            ValidationConfig::default()
        }
    }
}

fn snapshot_source(snapshot_path: Option<&Path>) -> Result<Arc<dyn SnapshotSource>> {
    match snapshot_path {
        Some(path) => {
            let source = StaticSnapshotSource::from_json_file(path)
                .with_context(|| format!("cannot load snapshot {}", path.display()))?;
            Ok(Arc::new(source))
        }
        None => {
            info!("No snapshot given, validating built-in sample data");
            Ok(Arc::new(FixtureSnapshotSource::healthy()))
        }
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", output);
    Ok(())
}

/// Execute the requested command; `Ok(false)` when a validation failed
async fn run(cli: Cli, shutdown: Arc<Notify>) -> Result<bool> {
    let config = load_config(cli.config.as_deref());
    let source = snapshot_source(cli.snapshot.as_deref())?;
    let orchestrator = ValidationOrchestrator::new(config, source);
    let command = cli.command.unwrap_or(Command::Run {
        watch: false,
        interval: 300,
    });

    match command {
        Command::Run { watch, interval } => loop {
            let report = orchestrator.run_full_validation().await;
            print_json(&report, cli.pretty)?;
            if !watch {
                return Ok(!report.has_failures());
            }

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
                _ = shutdown.notified() => {
                    info!("Watch mode stopped");
                    print_json(&orchestrator.get_system_status(), cli.pretty)?;
                    return Ok(true);
                }
            }
        },
        Command::Validate { domain } => {
            let result = orchestrator.run_validation_named(&domain).await?;
            print_json(&result, cli.pretty)?;
            Ok(!result.is_failed())
        }
        Command::Health => {
            let report = orchestrator.run_full_validation().await;
            print_json(&orchestrator.get_health_scores(), cli.pretty)?;
            Ok(!report.has_failures())
        }
        Command::Status => {
            orchestrator.run_full_validation().await;
            print_json(&orchestrator.get_system_status(), cli.pretty)?;
            Ok(true)
        }
        Command::Schedules => {
            print_json(&orchestrator.get_schedules(), cli.pretty)?;
            Ok(true)
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    let shutdown = Arc::new(Notify::new());
    let handler_shutdown = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received interrupt signal (SIGINT), shutting down gracefully...");
        handler_shutdown.notify_one();
    }) {
        warn!("Cannot install SIGINT handler: {}", e);
    }

    match runtime.block_on(run(cli, shutdown)) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    fn cli(config: Option<PathBuf>, command: Option<Command>) -> Cli {
        Cli {
            config,
            snapshot: None,
            verbose: false,
            pretty: false,
            command,
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let parsed = Cli::try_parse_from(["instrumentation-validator", "--pretty", "validate", "performance"])
            .unwrap();
        assert!(parsed.pretty);
        assert_eq!(
            parsed.command,
            Some(Command::Validate {
                domain: "performance".to_string()
            })
        );

        let parsed = Cli::try_parse_from(["instrumentation-validator", "run", "--watch"]).unwrap();
        assert_eq!(
            parsed.command,
            Some(Command::Run {
                watch: true,
                interval: 300
            })
        );

        let parsed = Cli::try_parse_from(["instrumentation-validator"]).unwrap();
        assert_eq!(parsed.command, None);
    }

    #[test]
    fn test_cli_validation_with_existing_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "environment = \"staging\"").unwrap();

        assert!(cli(Some(file.path().to_path_buf()), None).validate().is_ok());
    }

    #[test]
    fn test_cli_validation_with_missing_file() {
        // missing config files fall back to defaults
        let args = cli(Some(PathBuf::from("/nonexistent/config.toml")), None);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_cli_validation_with_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(cli(Some(dir.path().to_path_buf()), None).validate().is_err());
    }

    #[test]
    fn test_cli_validation_with_missing_snapshot() {
        let mut args = cli(None, None);
        args.snapshot = Some(PathBuf::from("/nonexistent/snapshot.json"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_cli_validation_rejects_zero_interval() {
        let args = cli(
            None,
            Some(Command::Run {
                watch: true,
                interval: 0,
            }),
        );
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_load_config_falls_back_to_defaults() {
        assert_eq!(load_config(None), ValidationConfig::default());
        assert_eq!(
            load_config(Some(Path::new("/nonexistent/config.toml"))),
            ValidationConfig::default()
        );

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "this is not toml = = =").unwrap();
        assert_eq!(load_config(Some(file.path())), ValidationConfig::default());
    }

    #[tokio::test]
    async fn test_run_single_validation_on_sample_data() {
        let args = cli(
            None,
            Some(Command::Validate {
                domain: "dashboard".to_string(),
            }),
        );
        assert!(run(args, Arc::new(Notify::new())).await.unwrap());
    }

    #[tokio::test]
    async fn test_run_unknown_domain_is_an_error() {
        let args = cli(
            None,
            Some(Command::Validate {
                domain: "billing".to_string(),
            }),
        );
        let error = run(args, Arc::new(Notify::new())).await.unwrap_err();
        assert!(error.to_string().contains("Unknown validation type: billing"));
    }
}
