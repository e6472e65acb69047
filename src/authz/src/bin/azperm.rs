//! # azperm
//!
//! Command-line front end for the effective-permission evaluator. Directory
//! data is read from a JSON snapshot (see `DirectorySnapshot`).
//!
//! ## Usage
//!
//! ```text
//! azperm --snapshot directory.json evaluate \
//!     --scope /subscriptions/S/resourceGroups/G \
//!     --principal alice@contoso.com \
//!     --action Microsoft.Storage/storageAccounts/listkeys/action
//!
//! azperm --snapshot directory.json assert --scope ... --principal ... --action ...
//! ```
//!
//! ## Configuration
//!
//! - `AZPERM_SNAPSHOT` - snapshot path
//! - `AZPERM_CONFIG` - optional TOML configuration file
//! - `AZPERM_DEADLINE_MS`, `AZPERM_PRIVILEGED_ROLES`, `AZPERM_ENABLE_METRICS` - used
//!   when no configuration file is given
//! - `RUST_LOG` - log filter (default: warn)

use anyhow::{Context, Result};
use azfiles_authz::{
    AssertionGate, AuthzError, DirectorySnapshot, EvaluatorConfig, InMemoryDirectory, Operation,
    PermissionEvaluator,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Effective-permission evaluator CLI
#[derive(Parser)]
#[command(name = "azperm")]
#[command(about = "Evaluate effective Azure permissions against a directory snapshot")]
#[command(version)]
struct Cli {
    /// Directory snapshot (JSON)
    #[arg(short, long, env = "AZPERM_SNAPSHOT")]
    snapshot: PathBuf,

    /// Evaluator configuration (TOML)
    #[arg(short, long, env = "AZPERM_CONFIG")]
    config: Option<PathBuf>,

    /// Override the evaluation deadline
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the verdict for every operation as JSON
    Evaluate {
        #[command(flatten)]
        request: RequestArgs,
    },

    /// Exit non-zero unless every operation is allowed
    Assert {
        #[command(flatten)]
        request: RequestArgs,
    },
}

#[derive(Args)]
struct RequestArgs {
    /// Resource scope (e.g. /subscriptions/S/resourceGroups/G)
    #[arg(long)]
    scope: String,

    /// Principal sign-in name
    #[arg(long)]
    principal: String,

    /// Control-plane operation (repeatable)
    #[arg(long = "action")]
    actions: Vec<String>,

    /// Data-plane operation (repeatable)
    #[arg(long = "data-action")]
    data_actions: Vec<String>,
}

impl RequestArgs {
    fn operations(&self) -> Vec<Operation> {
        self.actions
            .iter()
            .map(Operation::action)
            .chain(self.data_actions.iter().map(Operation::data_action))
            .collect()
    }
}

fn load_config(cli: &Cli) -> Result<EvaluatorConfig> {
    let mut config = match &cli.config {
        Some(path) => EvaluatorConfig::load(path)
            .with_context(|| format!("failed to load configuration from {:?}", path))?,
        None => EvaluatorConfig::from_env().context("invalid AZPERM_* environment")?,
    };

    if let Some(ms) = cli.deadline_ms {
        config = config.with_deadline(Duration::from_millis(ms));
        config.validate()?;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},azfiles_authz={}", log_level, log_level).into()),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!("azperm v{}", azfiles_authz::VERSION);

    let config = load_config(&cli)?;
    let snapshot = DirectorySnapshot::load(&cli.snapshot)
        .with_context(|| format!("failed to load snapshot from {:?}", cli.snapshot))?;
    debug!(
        "Loaded snapshot with {} role definitions, {} role assignments, {} deny assignments",
        snapshot.role_definitions.len(),
        snapshot.role_assignments.len(),
        snapshot.deny_assignments.len()
    );

    let directory = Arc::new(InMemoryDirectory::from_snapshot(snapshot));
    let evaluator = Arc::new(PermissionEvaluator::with_config(directory, config));

    match &cli.command {
        // Each run starts with empty caches, so there is nothing to refresh.
        Command::Evaluate { request } => {
            let result = evaluator
                .evaluate(&request.scope, &request.operations(), &request.principal, false)
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Assert { request } => {
            let gate = AssertionGate::new(evaluator);
            match gate
                .assert_permissions(&request.scope, &request.operations(), &request.principal)
                .await
            {
                Ok(()) => {
                    println!("All requested permissions are held");
                    Ok(ExitCode::SUCCESS)
                }
                Err(e @ AuthzError::InsufficientPermission { .. }) => {
                    eprintln!("{}", e);
                    Ok(ExitCode::FAILURE)
                }
                Err(e) => Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_arguments() {
        let cli = Cli::try_parse_from([
            "azperm",
            "--snapshot",
            "dir.json",
            "evaluate",
            "--scope",
            "/subscriptions/S",
            "--principal",
            "alice@contoso.com",
            "--action",
            "a/read",
            "--data-action",
            "b/read",
        ])
        .unwrap();

        let Command::Evaluate { request } = cli.command else {
            panic!("expected evaluate");
        };
        let ops = request.operations();
        assert_eq!(ops, vec![Operation::action("a/read"), Operation::data_action("b/read")]);
    }

    #[test]
    fn test_refresh_flag_is_not_accepted() {
        let parsed = Cli::try_parse_from([
            "azperm",
            "--snapshot",
            "dir.json",
            "evaluate",
            "--scope",
            "/subscriptions/S",
            "--principal",
            "alice@contoso.com",
            "--refresh",
        ]);
        assert!(parsed.is_err());
    }
}
