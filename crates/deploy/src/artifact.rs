//! Compiled artifacts and their dependency slots.

use std::collections::{HashMap, HashSet};

use alloy_core::{
    dyn_abi::DynSolType,
    primitives::{Bytes, keccak256},
};
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

use crate::DeployError;

/// Length in hex characters of an address placeholder (20 bytes).
pub const PLACEHOLDER_LEN: usize = 40;

/// Number of hex characters of the name hash kept in a hashed placeholder.
const HASHED_PLACEHOLDER_HASH_LEN: usize = 34;

/// Unique name of an artifact within a run.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ArtifactId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// A placeholder inside an artifact payload that must be replaced by an address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencySlot {
    /// Name of the slot, unique within its artifact.
    pub name: String,
    /// The artifact whose address fills the slot.
    pub target: ArtifactId,
    /// The literal placeholder text in the payload.
    pub marker: String,
}

impl DependencySlot {
    /// Slot using the `__Name_____` placeholder form.
    pub fn legacy(target: impl Into<ArtifactId>) -> Self {
        let target = target.into();
        Self {
            name: target.to_string(),
            marker: legacy_placeholder(target.as_str()),
            target,
        }
    }

    /// Slot using the `__$<hash>$__` placeholder form, keyed by `<source>:<Library>`.
    pub fn hashed(fully_qualified_name: &str, target: impl Into<ArtifactId>) -> Self {
        Self {
            name: fully_qualified_name.to_string(),
            marker: hashed_placeholder(fully_qualified_name),
            target: target.into(),
        }
    }
}

/// Builds the legacy placeholder for a library name.
///
/// Names are cut to fit on a character boundary, so the marker is always
/// exactly [`PLACEHOLDER_LEN`] bytes long.
pub fn legacy_placeholder(name: &str) -> String {
    let mut marker = format!("__{name}");
    let mut end = marker.len().min(PLACEHOLDER_LEN);
    while !marker.is_char_boundary(end) {
        end -= 1;
    }
    marker.truncate(end);
    while marker.len() < PLACEHOLDER_LEN {
        marker.push('_');
    }
    marker
}

/// Builds the hashed placeholder for a fully qualified library name.
pub fn hashed_placeholder(fully_qualified_name: &str) -> String {
    let hash = hex::encode(keccak256(fully_qualified_name.as_bytes()));
    format!("__${}$__", &hash[..HASHED_PLACEHOLDER_HASH_LEN])
}

/// A compiled, possibly unlinked, deployable unit.
///
/// The payload is hex text without `0x`. Until linked it may contain
/// placeholders, so it is not decoded at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    id: ArtifactId,
    payload: String,
    slots: Vec<DependencySlot>,
    constructor: Vec<DynSolType>,
}

impl Artifact {
    /// Create an artifact, checking that slot names are unique, every marker
    /// occurs in the payload and no marker is shared by different targets.
    pub fn new(
        id: impl Into<ArtifactId>,
        payload: impl AsRef<str>,
        slots: Vec<DependencySlot>,
        constructor: Vec<DynSolType>,
    ) -> Result<Self, DeployError> {
        let id = id.into();
        let payload = payload.as_ref().trim();
        let payload = payload.strip_prefix("0x").unwrap_or(payload).to_string();

        let mut names = HashSet::new();
        let mut markers: HashMap<&str, &ArtifactId> = HashMap::new();
        for slot in &slots {
            if !names.insert(slot.name.as_str()) {
                return Err(DeployError::InvalidArtifact {
                    artifact: id,
                    reason: format!("slot `{}` is declared twice", slot.name),
                });
            }
            if !payload.contains(&slot.marker) {
                return Err(DeployError::InvalidArtifact {
                    artifact: id,
                    reason: format!("placeholder for slot `{}` not found in bytecode", slot.name),
                });
            }
            match markers.get(slot.marker.as_str()) {
                Some(target) if **target != slot.target => {
                    return Err(DeployError::InvalidArtifact {
                        artifact: id,
                        reason: format!(
                            "placeholder `{}` is shared by `{}` and `{}`",
                            slot.marker, target, slot.target
                        ),
                    });
                }
                Some(_) => {}
                None => {
                    markers.insert(slot.marker.as_str(), &slot.target);
                }
            }
        }

        Ok(Self {
            id,
            payload,
            slots,
            constructor,
        })
    }

    /// Shorthand for an artifact with no slots and no constructor arguments.
    pub fn standalone(id: impl Into<ArtifactId>, payload: impl AsRef<str>) -> Result<Self, DeployError> {
        Self::new(id, payload, Vec::new(), Vec::new())
    }

    pub fn id(&self) -> &ArtifactId {
        &self.id
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn slots(&self) -> &[DependencySlot] {
        &self.slots
    }

    pub fn constructor(&self) -> &[DynSolType] {
        &self.constructor
    }

    pub fn needs_linking(&self) -> bool {
        !self.slots.is_empty()
    }

    /// Distinct artifacts this artifact depends on, in slot order.
    pub fn dependencies(&self) -> Vec<&ArtifactId> {
        let mut seen = HashSet::new();
        self.slots
            .iter()
            .map(|slot| &slot.target)
            .filter(|target| seen.insert(*target))
            .collect()
    }
}

/// A deploy-ready artifact with every slot resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedArtifact {
    pub id: ArtifactId,
    pub bytecode: Bytes,
    /// SHA-256 of `bytecode`, hex encoded.
    pub fingerprint: String,
}
