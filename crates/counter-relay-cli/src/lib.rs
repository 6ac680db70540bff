//! # Counter Relay CLI
//!
//! Command-line interface for the counter relay.
//!
//! This module provides CLI commands for:
//! - Running a relay between two queues
//! - Provisioning and seeding a queue pair
//! - Printing the resolved configuration

use clap::{Parser, Subcommand, ValueEnum};
use counter_relay_core::{
    bootstrap, connect, resolve_relay_queues, AckOrder, CounterValue, LogFormat, MalformedPolicy,
    Relay, RelayConfig, RelayError,
};
use queue_runtime::{ProviderConfig, QueueName};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

// ============================================================================
// CLI Structure
// ============================================================================

/// Counter relay - bounce an integer between two queues, adding one per hop
#[derive(Debug, Parser)]
#[command(name = "counter-relay")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Relay integer counters between SQS queues")]
#[command(
    long_about = "Reads integer messages from an input queue, adds one and forwards the result to an output queue. Two relays wired in opposite directions form a counter loop."
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "COUNTER_RELAY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level (overrides logging.level)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// SQS endpoint URL (overrides backend.endpoint)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Relay counters from INPUT to OUTPUT until interrupted
    Relay {
        /// Queue to read counters from
        input: String,

        /// Queue to forward incremented counters to
        output: String,

        /// Seed placed on bootstrap.first_queue if this relay creates it
        /// (defaults to bootstrap.seed_value)
        #[arg(long)]
        seed_value: Option<String>,

        /// Order of forwarding and acknowledging (overrides relay.ack_order)
        #[arg(long, value_enum)]
        ack_order: Option<AckOrderArg>,

        /// Handling of non-numeric payloads (overrides relay.malformed_policy)
        #[arg(long, value_enum)]
        on_malformed: Option<MalformedArg>,
    },

    /// Create both queues of a pair and seed the first one
    Bootstrap {
        /// First queue, receives the seed (defaults to bootstrap.first_queue)
        #[arg(long)]
        first: Option<String>,

        /// Second queue (defaults to bootstrap.second_queue)
        #[arg(long)]
        second: Option<String>,

        /// Seed payload (defaults to bootstrap.seed_value)
        #[arg(long)]
        seed_value: Option<String>,
    },

    /// Show the resolved configuration
    Config {
        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "json")]
        format: ConfigFormat,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum AckOrderArg {
    /// Send, then delete (at-least-once)
    ForwardThenDelete,
    /// Delete, then send (at-most-once)
    DeleteThenForward,
}

impl From<AckOrderArg> for AckOrder {
    fn from(arg: AckOrderArg) -> Self {
        match arg {
            AckOrderArg::ForwardThenDelete => AckOrder::ForwardThenDelete,
            AckOrderArg::DeleteThenForward => AckOrder::DeleteThenForward,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum MalformedArg {
    /// Log, delete and continue
    Skip,
    /// Stop the relay
    Terminate,
}

impl From<MalformedArg> for MalformedPolicy {
    fn from(arg: MalformedArg) -> Self {
        match arg {
            MalformedArg::Skip => MalformedPolicy::Skip,
            MalformedArg::Terminate => MalformedPolicy::Terminate,
        }
    }
}

/// Configuration format options
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

// ============================================================================
// CLI Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] counter_relay_core::ConfigError),

    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("Logging setup failed: {message}")]
    Logging { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_)
            | Self::ConfigLoad(_)
            | Self::InvalidArgument { .. }
            | Self::Logging { .. } => 1,
            Self::Relay(RelayError::MalformedPayload { .. }) => 2,
            Self::Relay(_) | Self::Io(_) => 3,
        }
    }
}

// ============================================================================
// Configuration Loading
// ============================================================================

/// Where configuration is read from, lowest precedence first
#[derive(Debug, Clone)]
pub struct ConfigSources {
    pub system_file: PathBuf,
    pub local_file: PathBuf,
    pub explicit_file: Option<PathBuf>,
    pub env_prefix: String,
}

impl Default for ConfigSources {
    fn default() -> Self {
        Self {
            system_file: PathBuf::from("/etc/counter-relay/relay"),
            local_file: PathBuf::from("config/relay"),
            explicit_file: None,
            env_prefix: "CR".to_string(),
        }
    }
}

/// Build the configuration from defaults, files and environment
///
/// Sources (applied in order, later sources override earlier ones):
///  1. built-in defaults
///  2. /etc/counter-relay/relay.yaml   (optional)
///  3. ./config/relay.yaml             (optional)
///  4. file given by --config / COUNTER_RELAY_CONFIG (required when given)
///  5. environment variables prefixed CR__ (double-underscore separator),
///     e.g. CR__BACKEND__ENDPOINT=http://localhost:4566
pub fn load_config(sources: &ConfigSources) -> Result<RelayConfig, CliError> {
    let mut builder = config::Config::builder()
        .add_source(config::Config::try_from(&RelayConfig::default())?)
        .add_source(yaml_file(&sources.system_file).required(false))
        .add_source(yaml_file(&sources.local_file).required(false));

    if let Some(explicit) = &sources.explicit_file {
        builder = builder.add_source(yaml_file(explicit).required(true));
    }

    let config: RelayConfig = builder
        .add_source(
            config::Environment::with_prefix(&sources.env_prefix)
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    config.validate()?;
    Ok(config)
}

fn yaml_file(path: &Path) -> config::File<config::FileSourceFile, config::FileFormat> {
    config::File::from(path).format(config::FileFormat::Yaml)
}

/// Fold the global flags into the loaded configuration
pub fn apply_overrides(cli: &Cli, config: &mut RelayConfig) -> Result<(), CliError> {
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.json_logs {
        config.logging.format = LogFormat::Json;
    }
    if let Some(endpoint) = &cli.endpoint {
        match &mut config.backend {
            ProviderConfig::AwsSqs(aws) => aws.endpoint = Some(endpoint.clone()),
            ProviderConfig::InMemory(_) => {
                return Err(CliError::InvalidArgument {
                    arg: "--endpoint".to_string(),
                    message: "only applies to the aws_sqs backend".to_string(),
                })
            }
        }
    }
    Ok(())
}

// ============================================================================
// Logging
// ============================================================================

/// Filter used when RUST_LOG is not set
pub fn default_filter(level: &str) -> String {
    ["counter_relay", "counter_relay_cli", "counter_relay_core", "queue_runtime"]
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global tracing subscriber; logs go to stderr
pub fn initialize_logging(level: &str, format: LogFormat) -> Result<(), CliError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter(level)).map_err(|e| {
            CliError::InvalidArgument {
                arg: "--log-level".to_string(),
                message: e.to_string(),
            }
        })?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };

    result.map_err(|e| CliError::Logging {
        message: e.to_string(),
    })
}

// ============================================================================
// Main Entry Point
// ============================================================================

pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    let sources = ConfigSources {
        explicit_file: cli.config.clone(),
        ..Default::default()
    };
    let loaded = load_config(&sources).and_then(|mut config| {
        apply_overrides(&cli, &mut config)?;
        Ok(config)
    });

    // Log even when the configuration is broken, so the failure is reported
    let logging = match &loaded {
        Ok(config) => config.logging.clone(),
        Err(_) => Default::default(),
    };
    let level = cli.log_level.as_deref().unwrap_or(&logging.level);
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        logging.format
    };
    initialize_logging(level, format)?;

    let config = loaded?;
    execute(cli.command, config).await
}

/// Run a parsed command against a loaded configuration
pub async fn execute(command: Commands, config: RelayConfig) -> Result<(), CliError> {
    match command {
        Commands::Relay {
            input,
            output,
            seed_value,
            ack_order,
            on_malformed,
        } => {
            let mut config = config;
            if let Some(ack_order) = ack_order {
                config.relay.ack_order = ack_order.into();
            }
            if let Some(on_malformed) = on_malformed {
                config.relay.malformed_policy = on_malformed.into();
            }

            let input = queue_argument(&input)?;
            let output = queue_argument(&output)?;
            let seed = seed_argument(seed_value, &config)?;

            tokio::select! {
                result = execute_relay_command(&config, input, output, seed) => result,
                _ = shutdown_signal() => Ok(()),
            }
        }
        Commands::Bootstrap {
            first,
            second,
            seed_value,
        } => {
            let mut config = config;
            if let Some(first) = first {
                config.bootstrap.first_queue = first;
            }
            if let Some(second) = second {
                config.bootstrap.second_queue = second;
            }
            config.validate()?;
            let seed = seed_argument(seed_value, &config)?;

            tokio::select! {
                result = execute_bootstrap_command(&config, seed) => result,
                _ = shutdown_signal() => Ok(()),
            }
        }
        Commands::Config { format } => execute_config_command(&config, format),
    }
}

fn queue_argument(name: &str) -> Result<QueueName, CliError> {
    QueueName::new(name.to_string()).map_err(|source| {
        CliError::Relay(RelayError::InvalidQueueName {
            name: name.to_string(),
            source,
        })
    })
}

fn seed_argument(
    seed_value: Option<String>,
    config: &RelayConfig,
) -> Result<CounterValue, CliError> {
    match seed_value {
        Some(value) => value
            .parse::<CounterValue>()
            .map_err(|e| CliError::InvalidArgument {
                arg: "--seed-value".to_string(),
                message: e.to_string(),
            }),
        None => Ok(config.bootstrap.seed()?),
    }
}

/// Connect, resolve both queues and relay until the loop gives up
async fn execute_relay_command(
    config: &RelayConfig,
    input: QueueName,
    output: QueueName,
    seed: CounterValue,
) -> Result<(), CliError> {
    info!(input = %input, output = %output, "Starting counter relay");

    let topology = config.bootstrap.topology()?;
    let handle = connect(&config.backend, &config.retry.connect_policy()).await;
    let (input, output) = resolve_relay_queues(
        &handle,
        &topology,
        &input,
        &output,
        &seed,
        &config.retry.resolve_policy(),
    )
    .await;

    Relay::new(input, output, config.relay_settings())
        .run()
        .await?;
    Ok(())
}

/// Provision the configured queue pair and seed it
async fn execute_bootstrap_command(
    config: &RelayConfig,
    seed: CounterValue,
) -> Result<(), CliError> {
    let topology = config.bootstrap.topology()?;
    let handle = connect(&config.backend, &config.retry.connect_policy()).await;
    let provisioned = bootstrap(&handle, &topology, &seed, &config.retry.resolve_policy()).await;

    if provisioned.seeded {
        println!(
            "Provisioned {} (seeded with {}) and {}",
            provisioned.first, seed, provisioned.second
        );
    } else {
        println!(
            "Provisioned {} (already existed, not seeded) and {}",
            provisioned.first, provisioned.second
        );
    }
    Ok(())
}

fn execute_config_command(config: &RelayConfig, format: ConfigFormat) -> Result<(), CliError> {
    let rendered = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config).map_err(std::io::Error::from)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config).map_err(|e| CliError::InvalidArgument {
            arg: "--format".to_string(),
            message: e.to_string(),
        })?,
    };
    println!("{}", rendered);
    Ok(())
}

/// Resolve when the process is asked to stop
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
