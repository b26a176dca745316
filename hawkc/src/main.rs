//! # Hawk CLI Entry Point
//!
//! The main executable for the `hawkc` tool. This file drives the application lifecycle:
//!
//! 1. **Initialization**: Parses command-line arguments using [`cli::Cli`] and installs
//!    the log subscriber.
//! 2. **Connection**: Builds the transport stack from the resulting `ClientConfig` and
//!    opens it.
//! 3. **Execution**: Delegates the command to the `HawkClient`.
//! 4. **Presentation**: Formats the result on standard output, or the error on standard
//!    error with a non-zero exit code.

mod cli;
mod formatter;

use clap::Parser;
use cli::{Cli, Commands};
use formatter::{Done, FormattedString, InstanceList, NameList};
use hawkc_core::client::HawkClient;
use hawkc_core::transport::Transport;
use std::process;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    let args = Cli::parse();
    init_logging(args.log_level());

    if let Err(err) = run(args) {
        eprint!("{err}");
        process::exit(1);
    }
}

/// Logs go to stderr so stdout only ever carries results.
fn init_logging(default_level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(args: Cli) -> Result<(), FormattedString> {
    let config = args.client_config();
    tracing::debug!(host = %config.host, port = config.port, transport = %config.transport, "connecting");

    let mut transport = config.build_transport()?;
    let mut session = transport.open_scoped()?;
    let mut client = HawkClient::new(&mut *session).with_limits(config.limits);

    match args.command {
        Commands::Instances { json } => {
            let instances = client.list_instances()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&instances)?);
            } else {
                print!("{}", FormattedString::from(InstanceList(instances)));
            }
        }
        Commands::Backends => {
            let backends = client.list_backends()?;
            print!("{}", FormattedString::from(NameList("Backends", backends)));
        }
        Commands::Plugins => {
            let plugins = client.list_plugins()?;
            print!("{}", FormattedString::from(NameList("Plugins", plugins)));
        }
        Commands::Start { name } => {
            client.start_instance(&name)?;
            print!("{}", FormattedString::from(Done("Started", name)));
        }
        Commands::Stop { name } => {
            client.stop_instance(&name)?;
            print!("{}", FormattedString::from(Done("Stopped", name)));
        }
        Commands::Remove { name } => {
            client.remove_instance(&name)?;
            print!("{}", FormattedString::from(Done("Removed", name)));
        }
    }

    Ok(())
}
