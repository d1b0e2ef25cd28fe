//! Insert-only record of deployed addresses.

use std::{collections::BTreeMap, path::Path};

use alloy_core::primitives::{Address, B256};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ArtifactId, DeployError};

/// Outcome of deploying a single artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub artifact: ArtifactId,
    pub address: Address,
    pub tx_hash: B256,
    /// Position in the overall deployment history of the table.
    pub sequence: u64,
    pub deployed_at: DateTime<Utc>,
    /// SHA-256 of the deployed bytecode, hex encoded.
    pub fingerprint: String,
}

/// Mapping from artifact identity to its deployment record.
///
/// Entries are never replaced. A table from an earlier run can seed a new one,
/// in which case its entries count as already deployed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressTable {
    records: BTreeMap<ArtifactId, DeploymentRecord>,
}

impl AddressTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record. Fails if the artifact already has one.
    pub fn insert(&mut self, record: DeploymentRecord) -> Result<(), DeployError> {
        if self.records.contains_key(&record.artifact) {
            return Err(DeployError::AlreadyRecorded(record.artifact));
        }
        self.records.insert(record.artifact.clone(), record);
        Ok(())
    }

    pub fn get(&self, id: &ArtifactId) -> Option<&DeploymentRecord> {
        self.records.get(id)
    }

    pub fn address(&self, id: &ArtifactId) -> Option<Address> {
        self.records.get(id).map(|record| record.address)
    }

    pub fn contains(&self, id: &ArtifactId) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sequence number the next inserted record should carry.
    pub fn next_sequence(&self) -> u64 {
        self.records
            .values()
            .map(|record| record.sequence + 1)
            .max()
            .unwrap_or(0)
    }

    /// Records in deployment order.
    pub fn records(&self) -> Vec<&DeploymentRecord> {
        let mut records: Vec<_> = self.records.values().collect();
        records.sort_by_key(|record| record.sequence);
        records
    }

    /// Plain identity to address view, for client configuration.
    pub fn addresses(&self) -> BTreeMap<&ArtifactId, Address> {
        self.records
            .iter()
            .map(|(id, record)| (id, record.address))
            .collect()
    }

    /// Save the table as pretty JSON.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize address table")?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context(format!(
                "Failed to create address table directory {}",
                parent.display()
            ))?;
        }

        std::fs::write(path, json)
            .context(format!("Failed to write address table to {}", path.display()))?;

        tracing::info!(path = %path.display(), entries = self.len(), "Address table saved");
        Ok(())
    }

    /// Load a table previously written by [`AddressTable::save_to_file`].
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Address table file does not exist: {}", path.display());
        }

        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read address table from {}", path.display()))?;

        let table: Self =
            serde_json::from_str(&content).context("Failed to parse address table JSON")?;

        for (id, record) in &table.records {
            if *id != record.artifact {
                anyhow::bail!(
                    "Address table entry `{}` holds a record for `{}`",
                    id,
                    record.artifact
                );
            }
        }

        tracing::info!(path = %path.display(), entries = table.len(), "Address table loaded");
        Ok(table)
    }

    /// Load the table at `path`, or an empty one if the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}
