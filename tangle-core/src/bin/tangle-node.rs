//! Tangle node binary
//!
//! ```text
//! tangle-node [--config <file>] [submit <sender> <receiver> <amount>]
//! ```
//!
//! Restores the transaction log, optionally submits one transfer, runs a
//! consensus pass and writes the log back.

use anyhow::Context;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::{path::PathBuf, str::FromStr};
use tangle_core::{Config, NewTransaction, Tangle};

/// Single-node tangle ledger.
#[derive(Parser, Debug)]
#[command(name = "tangle-node", version, about = "Single-node tangle ledger")]
struct Cli {
    /// TOML configuration file; falls back to TANGLE_* environment variables.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit one transfer before the consensus pass.
    Submit {
        /// Sending account.
        sender: String,
        /// Receiving account.
        receiver: String,
        /// Amount transferred.
        #[arg(value_parser = parse_amount)]
        amount: Decimal,
    },
}

fn parse_amount(s: &str) -> Result<Decimal, String> {
    let amount = Decimal::from_str(s).map_err(|e| format!("invalid amount {:?}: {}", s, e))?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(format!("amount {} is negative", amount));
    }
    Ok(amount)
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::from_env()?,
    };
    let log_path = config.log_path.clone();

    tracing::info!(service = %config.service_name, log = %log_path.display(), "Starting tangle node");

    let mut tangle = Tangle::new(config)?;

    if log_path.exists() {
        let restored = tangle
            .load_from(&log_path)
            .with_context(|| format!("restoring {}", log_path.display()))?;
        tracing::info!(
            imported = restored.import.imported,
            rejected = restored.import.rejected(),
            skipped_lines = restored.skipped.len(),
            "Log restored"
        );
    }

    if let Some(Command::Submit {
        sender,
        receiver,
        amount,
    }) = cli.command
    {
        let outcome = tangle.submit(NewTransaction::new(sender, receiver, amount))?;
        if let Some(warning) = outcome.warning {
            tracing::warn!(%warning, "Transaction attached with fewer parents");
        }
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }

    let report = tangle.run_consensus();
    println!("{}", serde_json::to_string_pretty(&report)?);

    tangle
        .save_to(&log_path)
        .with_context(|| format!("saving {}", log_path.display()))?;

    tracing::info!(
        transactions = tangle.len(),
        tips = tangle.tips().len(),
        validated = report.validated_total,
        "Shutting down tangle node"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_submit_subcommand() {
        let cli = Cli::try_parse_from([
            "tangle-node",
            "--config",
            "node.toml",
            "submit",
            "alice",
            "bob",
            "12.50",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("node.toml")));
        match cli.command {
            Some(Command::Submit {
                sender,
                receiver,
                amount,
            }) => {
                assert_eq!(sender, "alice");
                assert_eq!(receiver, "bob");
                assert_eq!(amount, Decimal::new(1250, 2));
            }
            None => panic!("expected submit"),
        }
    }

    #[test]
    fn test_no_arguments_runs_consensus_only() {
        let cli = Cli::try_parse_from(["tangle-node"]).unwrap();
        assert!(cli.config.is_none());
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_bad_amount_and_unknown_flag_rejected() {
        assert!(Cli::try_parse_from(["tangle-node", "submit", "alice", "bob", "lots"]).is_err());
        assert!(Cli::try_parse_from(["tangle-node", "submit", "alice", "bob", "-5"]).is_err());
        assert!(Cli::try_parse_from(["tangle-node", "--verbose"]).is_err());
    }
}
