//! dirtree - browse an LDAP directory as a tree
//!
//! ```text
//! dirtree --host ldap.example.com roots
//! dirtree --host ldap.example.com tree dc=example,dc=com
//! dirtree --config dirtree.yaml --json search dc=example,dc=com "(cn=abc*)"
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::debug;

mod commands;
mod config;
mod error;
mod logging;

use commands::{Commands, Output};
use config::{CliConfig, ConnectionOverrides};
use dirtree_ldap::DirectoryService;
use error::CliResult;
use logging::LogFormat;

/// dirtree - LDAP directory browser
#[derive(Parser)]
#[command(name = "dirtree")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// YAML config file
    #[arg(long, short, global = true, env = "DIRTREE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory server, e.g. ldap.example.com:389 or ldaps://ldap.example.com
    #[arg(long, global = true, env = "DIRTREE_HOST")]
    host: Option<String>,

    /// Bind DN; leave unset with --credential for an anonymous bind
    #[arg(long, global = true, env = "DIRTREE_PRINCIPAL")]
    principal: Option<String>,

    /// Bind password
    #[arg(long, global = true, env = "DIRTREE_CREDENTIAL", hide_env_values = true)]
    credential: Option<String>,

    /// Connect with LDAPS
    #[arg(long, global = true)]
    ssl: bool,

    /// Result count at which tree building switches to per-level queries
    #[arg(long, global = true)]
    fast_threshold: Option<usize>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log line format
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = run(cli).await;

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let file_config = CliConfig::load(cli.config.as_deref())?;

    let format = match cli.log_format {
        Some(format) => format,
        None => file_config.logging.format.parse()?,
    };
    let level = logging::level_for_verbosity(cli.verbose, &file_config.logging.level);
    logging::init_logging(&level, format)?;

    let overrides = ConnectionOverrides {
        host: cli.host,
        principal: cli.principal,
        credential: cli.credential,
        use_ssl: cli.ssl,
        fast_threshold: cli.fast_threshold,
    };
    let ldap = file_config.resolve_ldap(&overrides)?;
    debug!(config = ?ldap.redacted(), "Resolved configuration");

    let mut service = DirectoryService::connect(&ldap).await?;
    let output = Output { json: cli.json };

    let result = commands::execute(cli.command, &mut service, &output).await;
    let closed = service.close().await;
    result?;
    closed?;
    Ok(())
}
