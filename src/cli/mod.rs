//! Command-line interface for the pulse agent and server.
//!
//! Both binaries follow the same boot sequence: parse flags, initialize
//! logging, build a validated configuration, then run the core until Ctrl-C
//! or SIGTERM.

use crate::agent::Agent;
use crate::core::{
    AgentConfig, AgentConfigBuilder, ListenAddress, PulseError, Result, ServerConfig,
    ServerConfigBuilder,
};
use crate::server::MetricsServer;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Metrics agent: samples its own memory statistics and reports them.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "pulse-agent")]
#[command(version, about, long_about = None)]
pub struct AgentCli {
    /// Server address (`host:port` or base URL)
    #[arg(short = 'a', long = "address")]
    pub address: Option<String>,

    /// Poll interval in seconds
    #[arg(short = 'p', long = "poll-interval", value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval: Option<u64>,

    /// Report interval in seconds
    #[arg(short = 'r', long = "report-interval", value_parser = clap::value_parser!(u64).range(1..))]
    pub report_interval: Option<u64>,

    /// YAML configuration file
    #[arg(short, long, env = "PULSE_AGENT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Metrics server: stores reported gauges and counters in memory.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "pulse-server")]
#[command(version, about, long_about = None)]
pub struct ServerCli {
    /// Listen address (`host:port`, `:port` or a bare port)
    #[arg(short = 'a', long = "address")]
    pub address: Option<String>,

    /// Seconds in-flight requests may take to finish after shutdown starts
    #[arg(long = "shutdown-timeout", value_parser = clap::value_parser!(u64).range(1..))]
    pub shutdown_timeout: Option<u64>,

    /// YAML configuration file
    #[arg(short, long, env = "PULSE_SERVER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parse the process arguments. Usage errors exit with status 1, `--help`
/// and `--version` with status 0.
fn parse_or_exit<P: Parser>() -> P {
    match P::try_parse() {
        Ok(cli) => cli,
        Err(err) if err.use_stderr() => {
            let _ = err.print();
            std::process::exit(1);
        },
        Err(err) => err.exit(),
    }
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

async fn read_config_file(path: &Path) -> Result<String> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        PulseError::config(format!("Failed to read config file {}: {e}", path.display()))
    })?;
    tracing::info!(path = %path.display(), "loaded configuration file");
    Ok(content)
}

impl AgentCli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        parse_or_exit()
    }

    /// Load configuration from the file, the flags and the process environment.
    pub async fn load_config(&self) -> Result<AgentConfig> {
        self.load_config_with_env(process_env).await
    }

    /// Load configuration with `lookup` standing in for the environment.
    pub async fn load_config_with_env<F>(&self, lookup: F) -> Result<AgentConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = AgentConfigBuilder::new();
        if let Some(path) = &self.config {
            builder = builder.from_yaml(&read_config_file(path).await?)?;
        }

        if let Some(address) = &self.address {
            builder = builder.server_url(address.as_str());
        }
        if let Some(secs) = self.poll_interval {
            builder = builder.poll_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = self.report_interval {
            builder = builder.report_interval(Duration::from_secs(secs));
        }

        builder.apply_env(lookup)?.verbose(self.verbose).build()
    }
}

impl ServerCli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        parse_or_exit()
    }

    /// Load configuration from the file, the flags and the process environment.
    pub async fn load_config(&self) -> Result<ServerConfig> {
        self.load_config_with_env(process_env).await
    }

    /// Load configuration with `lookup` standing in for the environment.
    pub async fn load_config_with_env<F>(&self, lookup: F) -> Result<ServerConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = ServerConfigBuilder::new();
        if let Some(path) = &self.config {
            builder = builder.from_yaml(&read_config_file(path).await?)?;
        }

        if let Some(address) = &self.address {
            builder = builder.address(ListenAddress::parse(address)?);
        }
        if let Some(secs) = self.shutdown_timeout {
            builder = builder.shutdown_timeout(Duration::from_secs(secs));
        }

        builder.apply_env(lookup)?.verbose(self.verbose).build()
    }
}

/// Initialize logging. `RUST_LOG` wins; otherwise `debug` when verbose,
/// else `info`.
pub fn init_logging(verbose: bool) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(verbose)
        .with_line_number(verbose)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| PulseError::config(format!("Failed to initialize logging: {e}")))?;

    Ok(())
}

/// Cancel `cancel` on Ctrl-C or SIGTERM. Returns early if it is cancelled
/// by someone else.
pub async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
        () = cancel.cancelled() => return,
    }

    tracing::info!("received shutdown signal");
    cancel.cancel();
}

/// Run the agent until a shutdown signal.
pub async fn execute_agent(cli: AgentCli) -> Result<()> {
    init_logging(cli.verbose)?;

    let config = cli.load_config().await.map_err(|e| {
        tracing::error!(error = %e, "invalid agent configuration");
        e
    })?;
    let agent = Agent::new(config)?;

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    agent.run(cancel).await
}

/// Run the server until a shutdown signal.
pub async fn execute_server(cli: ServerCli) -> Result<()> {
    init_logging(cli.verbose)?;

    let config = cli.load_config().await.map_err(|e| {
        tracing::error!(error = %e, "invalid server configuration");
        e
    })?;
    let server = MetricsServer::with_memory_storage(config);

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    server.run(cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_agent_short_flags() {
        let cli = AgentCli::try_parse_from([
            "pulse-agent", "-a", "example:9000", "-p", "3", "-r", "15", "-v",
        ])
        .unwrap();
        assert_eq!(cli.address.as_deref(), Some("example:9000"));
        assert_eq!(cli.poll_interval, Some(3));
        assert_eq!(cli.report_interval, Some(15));
        assert!(cli.verbose);
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        assert!(AgentCli::try_parse_from(["pulse-agent", "-p", "0"]).is_err());
        assert!(AgentCli::try_parse_from(["pulse-agent", "-r", "abc"]).is_err());
    }

    #[test]
    fn test_server_flags() {
        let cli = ServerCli::try_parse_from(["pulse-server", "--address", ":9090"]).unwrap();
        assert_eq!(cli.address.as_deref(), Some(":9090"));
    }

    #[tokio::test]
    async fn test_agent_defaults() {
        let config = AgentCli::default().load_config_with_env(no_env).await.unwrap();
        assert_eq!(config, AgentConfig::default());
    }

    #[tokio::test]
    async fn test_env_beats_flags() {
        let cli = AgentCli {
            address: Some("flag:1".to_string()),
            poll_interval: Some(5),
            ..AgentCli::default()
        };
        let config = cli
            .load_config_with_env(|key| match key {
                "ADDRESS" => Some("env:2".to_string()),
                _ => None,
            })
            .await
            .unwrap();

        assert_eq!(config.server_url, "env:2");
        assert_eq!(config.poll_interval, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_invalid_server_address() {
        let cli = ServerCli {
            address: Some("host:99999".to_string()),
            ..ServerCli::default()
        };
        assert!(cli.load_config_with_env(no_env).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_config_file() {
        let cli = ServerCli {
            config: Some(PathBuf::from("/nonexistent/pulse.yaml")),
            ..ServerCli::default()
        };
        let err = cli.load_config_with_env(no_env).await.unwrap_err();
        assert!(matches!(err, PulseError::Config(_)));
    }
}
