//! linkup deploys compiled contracts and their libraries in dependency order.

mod cli;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::Table;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use cli::{Cli, Command, OutputFormat};
use linkup_deploy::{
    AddressTable, CONFIG_FILENAME, ContractDeployer, DeployConfig, Orchestrator, RpcDeployer,
    SimulatedDeployer, loader,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    match cli.command {
        Command::Init { force } => init(&cli.config, force),
        Command::Plan { fresh } => {
            let config = load_config(&cli.config)?;
            plan(&config, fresh)
        }
        Command::Deploy {
            dry_run,
            fresh,
            rpc_url,
            from,
        } => {
            let mut config = load_config(&cli.config)?;
            if let Some(rpc_url) = rpc_url {
                config.network.rpc_url = rpc_url;
            }
            if let Some(from) = from {
                config.network.from = from;
            }
            deploy(config, dry_run, fresh).await
        }
        Command::Show { file, format } => {
            let path = match file {
                Some(file) => file,
                None => load_config(&cli.config)?.output,
            };
            show(&path, format)
        }
    }
}

/// Merge defaults, the TOML file and `LINKUP_*` environment variables.
fn load_config(path: &Path) -> Result<DeployConfig> {
    let config_path = if path.is_dir() {
        path.join(CONFIG_FILENAME)
    } else {
        path.to_path_buf()
    };

    if !config_path.exists() {
        tracing::warn!(
            path = %config_path.display(),
            "Configuration file not found, using defaults"
        );
    }

    let config: DeployConfig = Figment::from(Serialized::defaults(DeployConfig::default()))
        .merge(Toml::file(&config_path))
        .merge(Env::prefixed("LINKUP_").split("__"))
        .extract()
        .context(format!(
            "Failed to load configuration from {}",
            config_path.display()
        ))?;

    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    Ok(config.resolve_paths(&base))
}

fn init(path: &Path, force: bool) -> Result<()> {
    let config_path = if path.is_dir() {
        path.join(CONFIG_FILENAME)
    } else {
        path.to_path_buf()
    };

    if config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists, pass --force to overwrite it",
            config_path.display()
        );
    }

    DeployConfig::default().save_to_file(&config_path)
}

fn seed_table(config: &DeployConfig, fresh: bool) -> Result<AddressTable> {
    if fresh {
        return Ok(AddressTable::default());
    }
    AddressTable::load_or_default(&config.output)
}

fn build_orchestrator<D: ContractDeployer>(
    config: &DeployConfig,
    deployer: D,
    fresh: bool,
) -> Result<Orchestrator<D>> {
    let registry = loader::load_registry(&config.artifacts_dir)?;
    let args = config.constructor_args(&registry)?;
    let seed = seed_table(config, fresh)?;

    Ok(args.into_iter().fold(
        Orchestrator::new(registry, deployer).with_seed(seed),
        |orchestrator, (id, values)| orchestrator.constructor_args(id, values),
    ))
}

fn plan(config: &DeployConfig, fresh: bool) -> Result<()> {
    let orchestrator = build_orchestrator(config, SimulatedDeployer::default(), fresh)?;
    let steps = orchestrator.plan()?;

    let mut table = Table::new();
    table.set_header(vec!["#", "Artifact", "Depends on", "Status"]);
    for (i, step) in steps.iter().enumerate() {
        let dependencies = step
            .dependencies
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let status = match step.existing {
            Some(address) => format!("deployed at {}", address),
            None => "pending".to_string(),
        };
        table.add_row(vec![
            (i + 1).to_string(),
            step.artifact.to_string(),
            dependencies,
            status,
        ]);
    }

    println!("{table}");
    Ok(())
}

async fn deploy(config: DeployConfig, dry_run: bool, fresh: bool) -> Result<()> {
    if dry_run {
        let deployer = SimulatedDeployer::new(config.network.from, 0);
        let orchestrator = build_orchestrator(&config, deployer, fresh)?;
        // Dry runs never overwrite the recorded table.
        let table = execute(orchestrator, None).await?;
        print_table(&table);
        return Ok(());
    }

    let deployer = RpcDeployer::new(config.network.clone())?;
    let chain_id = deployer
        .chain_id()
        .await
        .context(format!("Failed to reach {}", config.network.rpc_url))?;

    tracing::info!(
        chain_id,
        rpc_url = %config.network.rpc_url,
        from = %config.network.from,
        "Connected to network"
    );

    let orchestrator = build_orchestrator(&config, deployer, fresh)?;
    let table = execute(orchestrator, Some(&config.output)).await?;
    print_table(&table);
    Ok(())
}

/// Run the orchestrator and persist whatever it recorded, including after a failure.
async fn execute<D: ContractDeployer>(
    mut orchestrator: Orchestrator<D>,
    output: Option<&Path>,
) -> Result<AddressTable> {
    match orchestrator.run().await {
        Ok(table) => {
            if let Some(path) = output {
                table.save_to_file(path)?;
            }
            Ok(table)
        }
        Err(failure) => {
            if let Some(path) = output {
                if !failure.table.is_empty() {
                    failure.table.save_to_file(path)?;
                    tracing::info!(
                        path = %path.display(),
                        "Partial address table saved, rerun `linkup deploy` to resume"
                    );
                }
            }
            Err(failure.into())
        }
    }
}

fn show(path: &Path, format: OutputFormat) -> Result<()> {
    let table = AddressTable::load_from_file(path)?;

    match format {
        OutputFormat::Table => print_table(&table),
        OutputFormat::Json => {
            let addresses = serde_json::to_string_pretty(&table.addresses())
                .context("Failed to serialize addresses")?;
            println!("{addresses}");
        }
    }
    Ok(())
}

fn print_table(records: &AddressTable) {
    let mut table = Table::new();
    table.set_header(vec!["#", "Artifact", "Address", "Transaction", "Deployed at"]);
    for record in records.records() {
        table.add_row(vec![
            record.sequence.to_string(),
            record.artifact.to_string(),
            record.address.to_string(),
            record.tx_hash.to_string(),
            record.deployed_at.to_rfc3339(),
        ]);
    }
    println!("{table}");
}
