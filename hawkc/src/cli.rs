//! # CLI
//!
//! This module defines the command-line interface of `hawkc` using `clap`.
//!
//! Connection settings are global flags, each with an environment variable fallback, and
//! are turned into a [`ClientConfig`] before any command runs.
use clap::{ArgAction, Parser, Subcommand};
use hawkc_core::config::{self, ClientConfig, TransportKind};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "hawkc", version, about = "Command-line client for Hawk model indexing servers")]
pub struct Cli {
    /// Host name of the Hawk server
    #[arg(long, env = "HAWK_HOST", default_value = config::DEFAULT_HOST, global = true)]
    pub host: String,

    /// Port of the Hawk server
    #[arg(short, long, env = "HAWK_PORT", default_value_t = config::DEFAULT_PORT, global = true)]
    pub port: u16,

    /// HTTP path of the compact endpoint (ignored with `--transport socket`)
    #[arg(long, env = "HAWK_PATH", default_value = config::DEFAULT_PATH, global = true)]
    pub path: String,

    /// How messages reach the server: `http` or `socket`
    #[arg(long, env = "HAWK_TRANSPORT", default_value = "http", value_parser = parse_transport, global = true)]
    pub transport: TransportKind,

    /// Connect, read and write timeout in seconds
    #[arg(long, env = "HAWK_TIMEOUT", value_parser = parse_timeout, global = true)]
    pub timeout: Option<Duration>,

    /// Extra HTTP header sent with every request ('name: value')
    #[arg(short = 'H', long = "header", value_parser = parse_header, global = true)]
    pub headers: Vec<(String, String)>,

    /// Log more (-v for debug, -vv for trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// List the indexer instances hosted by the server
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// hawkc --host hawk.example.org instances --json
    /// ```
    Instances {
        /// Print the instances as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the storage backends available to new instances
    Backends,
    /// List the plugins installed on the server
    Plugins,
    /// Start an instance
    Start {
        /// Name of the instance
        name: String,
    },
    /// Stop an instance
    Stop {
        /// Name of the instance
        name: String,
    },
    /// Remove an instance and its index
    Remove {
        /// Name of the instance
        name: String,
    },
}

impl Cli {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            host: self.host.clone(),
            port: self.port,
            path: self.path.clone(),
            transport: self.transport,
            timeout: self.timeout,
            headers: self.headers.clone(),
            ..ClientConfig::default()
        }
    }

    /// Default log filter when `RUST_LOG` is not set.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    }
}

fn parse_transport(value: &str) -> Result<TransportKind, String> {
    value.parse().map_err(|e: config::ConfigError| e.to_string())
}

fn parse_timeout(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .parse()
        .map_err(|_| format!("Invalid timeout '{value}', expected a number of seconds"))?;

    if !secs.is_finite() || secs <= 0.0 {
        return Err("Timeout must be a positive number of seconds".to_string());
    }
    Ok(Duration::from_secs_f64(secs))
}

fn parse_header(value: &str) -> Result<(String, String), String> {
    config::split_header(value).map_err(|e| e.to_string())
}
