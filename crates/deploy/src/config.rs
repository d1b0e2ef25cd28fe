//! The `Linkup.toml` configuration file.
//!
//! Names the artifacts directory, the address table file, the target network
//! and per-contract constructor arguments given as text.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use alloy_core::dyn_abi::DynSolValue;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{ArtifactId, ArtifactRegistry, NetworkConfig};

/// The default name for the linkup configuration file.
pub const CONFIG_FILENAME: &str = "Linkup.toml";

/// Per-contract settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractConfig {
    /// Constructor arguments as text, coerced through the constructor ABI.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Everything a deployment run needs besides the artifacts themselves.
///
/// Serialized to/from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Directory holding compiled artifact JSON files.
    pub artifacts_dir: PathBuf,
    /// Where the address table is read from and written to.
    pub output: PathBuf,
    /// Target network.
    pub network: NetworkConfig,
    /// Constructor arguments, keyed by artifact name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub contracts: BTreeMap<String, ContractConfig>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("build/contracts"),
            output: PathBuf::from("deployments.json"),
            network: NetworkConfig::default(),
            contracts: BTreeMap::new(),
        }
    }
}

impl DeployConfig {
    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        std::fs::write(path, content)
            .context(format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file, or from `Linkup.toml` inside a directory.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file or directory not found: {}",
                path.display()
            ));
        }

        let config_path = if path.is_dir() {
            path.join(CONFIG_FILENAME)
        } else {
            path.to_path_buf()
        };

        let content = std::fs::read_to_string(&config_path)
            .context(format!("Failed to read config from {}", config_path.display()))?;
        let config: Self =
            toml::from_str(&content).context("Failed to parse config file as TOML")?;
        tracing::info!(path = %config_path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Resolve relative paths against `base`, typically the config file's directory.
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        if self.artifacts_dir.is_relative() {
            self.artifacts_dir = base.join(&self.artifacts_dir);
        }
        if self.output.is_relative() {
            self.output = base.join(&self.output);
        }
        self
    }

    /// Typed constructor arguments for every configured contract.
    pub fn constructor_args(
        &self,
        registry: &ArtifactRegistry,
    ) -> Result<Vec<(ArtifactId, Vec<DynSolValue>)>> {
        self.contracts
            .iter()
            .map(|(name, contract)| {
                let id = ArtifactId::from(name.as_str());
                let artifact = registry.get(&id)?;
                let schema = artifact.constructor();

                if schema.len() != contract.args.len() {
                    anyhow::bail!(
                        "`{}` constructor takes {} argument(s), {} configured",
                        name,
                        schema.len(),
                        contract.args.len()
                    );
                }

                let values = schema
                    .iter()
                    .zip(&contract.args)
                    .map(|(ty, raw)| {
                        ty.coerce_str(raw).with_context(|| {
                            format!("Invalid `{}` argument for `{}`: {}", ty, name, raw)
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;

                Ok((id, values))
            })
            .collect()
    }
}
