use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::{Parser, Subcommand};
use linkup_deploy::CONFIG_FILENAME;
use tracing::level_filters::LevelFilter;

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Parser)]
#[command(name = "linkup")]
#[command(
    author,
    version,
    about = "Deploy linked contracts in dependency order"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "LINKUP_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the configuration file, or a directory containing `Linkup.toml`.
    ///
    /// Values can be overridden with `LINKUP_*` environment variables, using `__`
    /// to reach nested keys (e.g. `LINKUP_NETWORK__RPC_URL`).
    #[arg(short, long, alias = "conf", env = "LINKUP_CONFIG", default_value = CONFIG_FILENAME)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write a default configuration file.
    Init {
        /// Overwrite an existing configuration file.
        #[arg(long)]
        force: bool,
    },

    /// Show the deployment order without deploying anything.
    Plan {
        /// Ignore the existing address table and plan a fresh deployment.
        #[arg(long, env = "LINKUP_FRESH")]
        fresh: bool,
    },

    /// Deploy every artifact that has no recorded address yet.
    Deploy {
        /// Compute addresses locally instead of sending transactions.
        #[arg(long, env = "LINKUP_DRY_RUN")]
        dry_run: bool,

        /// Ignore the existing address table and deploy everything again.
        #[arg(long, env = "LINKUP_FRESH")]
        fresh: bool,

        /// Override the JSON-RPC endpoint from the configuration.
        #[arg(long, alias = "rpc")]
        rpc_url: Option<url::Url>,

        /// Override the sending account from the configuration.
        #[arg(long)]
        from: Option<Address>,
    },

    /// Print a recorded address table.
    Show {
        /// Table file to read. Defaults to the configured output.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Output format.
        #[arg(long, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_deploy_flags() {
        let cli = Cli::try_parse_from([
            "linkup",
            "--config",
            "contracts/Linkup.toml",
            "deploy",
            "--dry-run",
            "--rpc-url",
            "http://127.0.0.1:7545",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("contracts/Linkup.toml"));
        let Command::Deploy {
            dry_run,
            fresh,
            rpc_url,
            from,
        } = cli.command
        else {
            panic!("expected the deploy command");
        };
        assert!(dry_run);
        assert!(!fresh);
        assert_eq!(rpc_url.unwrap().port(), Some(7545));
        assert!(from.is_none());
    }

    #[test]
    fn test_parse_show_format() {
        let cli = Cli::try_parse_from(["linkup", "show", "--format", "json"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Show {
                format: OutputFormat::Json,
                file: None
            }
        ));
    }
}
