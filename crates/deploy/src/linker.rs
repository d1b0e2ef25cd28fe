//! Resolves dependency slots into concrete addresses.

use alloy_core::primitives::Bytes;
use sha2::{Digest, Sha256};

use crate::{AddressTable, Artifact, DeployError, LinkedArtifact};

/// Turns artifacts into deploy-ready bytecode.
///
/// Linking is a pure function of the artifact and the addresses it reads from
/// the table: the same inputs always give the same bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Linker;

impl Linker {
    pub fn link(artifact: &Artifact, table: &AddressTable) -> Result<LinkedArtifact, DeployError> {
        if !artifact.needs_linking() {
            return Self::pass_through(artifact);
        }

        let mut payload = artifact.payload().to_string();
        for slot in artifact.slots() {
            let address = table
                .address(&slot.target)
                .ok_or_else(|| DeployError::MissingAddress {
                    artifact: artifact.id().clone(),
                    dependency: slot.target.clone(),
                })?;

            tracing::trace!(
                artifact = %artifact.id(),
                slot = %slot.name,
                %address,
                "Resolving dependency slot"
            );

            payload = payload.replace(&slot.marker, &hex::encode(address.as_slice()));
        }

        let bytecode = decode(artifact, &payload)?;
        tracing::debug!(
            artifact = %artifact.id(),
            slots = artifact.slots().len(),
            size = bytecode.len(),
            "Linked artifact"
        );
        Ok(finish(artifact, bytecode))
    }

    /// Artifacts without slots are decoded as they are, without touching the table.
    fn pass_through(artifact: &Artifact) -> Result<LinkedArtifact, DeployError> {
        let bytecode = decode(artifact, artifact.payload())?;
        Ok(finish(artifact, bytecode))
    }
}

fn decode(artifact: &Artifact, payload: &str) -> Result<Bytes, DeployError> {
    hex::decode(payload)
        .map(Bytes::from)
        .map_err(|e| DeployError::InvalidArtifact {
            artifact: artifact.id().clone(),
            reason: if payload.contains("__") {
                "bytecode still contains an unresolved placeholder".to_string()
            } else {
                format!("bytecode is not valid hex: {e}")
            },
        })
}

fn finish(artifact: &Artifact, bytecode: Bytes) -> LinkedArtifact {
    LinkedArtifact {
        id: artifact.id().clone(),
        fingerprint: fingerprint(&bytecode),
        bytecode,
    }
}

/// SHA-256 of the given bytecode, hex encoded.
pub fn fingerprint(bytecode: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytecode);
    hex::encode(hasher.finalize())
}
