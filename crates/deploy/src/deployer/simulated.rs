//! In-memory deployer that predicts addresses without touching a network.

use std::sync::{
    Mutex, PoisonError,
    atomic::{AtomicU64, Ordering},
};

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, Bytes, keccak256},
};

use super::{ContractDeployer, DEFAULT_SENDER, DeployReceipt, creation_data};
use crate::{ArtifactId, DeployError, LinkedArtifact};

/// A deployment accepted by a [`SimulatedDeployer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub artifact: ArtifactId,
    pub data: Bytes,
    pub receipt: DeployReceipt,
}

/// Computes the `CREATE` address each deployment would get from `sender`,
/// starting at `nonce`, and records every submission.
#[derive(Debug)]
pub struct SimulatedDeployer {
    sender: Address,
    nonce: AtomicU64,
    submissions: Mutex<Vec<Submission>>,
}

impl Default for SimulatedDeployer {
    fn default() -> Self {
        Self::new(DEFAULT_SENDER, 0)
    }
}

impl SimulatedDeployer {
    pub fn new(sender: Address, nonce: u64) -> Self {
        Self {
            sender,
            nonce: AtomicU64::new(nonce),
            submissions: Mutex::new(Vec::new()),
        }
    }

    pub fn sender(&self) -> Address {
        self.sender
    }

    /// Every accepted submission, in order.
    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ContractDeployer for SimulatedDeployer {
    const NAME: &'static str = "simulated";

    async fn deploy(
        &self,
        artifact: &LinkedArtifact,
        args: &[DynSolValue],
    ) -> Result<DeployReceipt, DeployError> {
        if artifact.bytecode.is_empty() {
            return Err(DeployError::DeploymentRejected {
                artifact: artifact.id.clone(),
                reason: "empty bytecode".to_string(),
            });
        }

        let data = creation_data(&artifact.bytecode, args);
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);

        let mut preimage = Vec::with_capacity(20 + 8 + data.len());
        preimage.extend_from_slice(self.sender.as_slice());
        preimage.extend_from_slice(&nonce.to_be_bytes());
        preimage.extend_from_slice(&data);

        let receipt = DeployReceipt {
            address: self.sender.create(nonce),
            tx_hash: keccak256(&preimage),
        };

        tracing::debug!(
            artifact = %artifact.id,
            nonce,
            address = %receipt.address,
            "Simulated deployment"
        );

        self.submissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Submission {
                artifact: artifact.id.clone(),
                data,
                receipt,
            });

        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linked(name: &str, bytecode: Vec<u8>) -> LinkedArtifact {
        LinkedArtifact {
            id: name.into(),
            bytecode: Bytes::from(bytecode),
            fingerprint: String::new(),
        }
    }

    #[tokio::test]
    async fn test_addresses_follow_create_nonces() {
        let deployer = SimulatedDeployer::default();
        let first = deployer.deploy(&linked("A", vec![0x60]), &[]).await.unwrap();
        let second = deployer.deploy(&linked("B", vec![0x60]), &[]).await.unwrap();

        // First contract a default Anvil account deploys.
        assert_eq!(
            first.address,
            alloy_core::primitives::address!("5fbdb2315678afecb367f032d93f642f64180aa3")
        );
        assert_eq!(first.address, DEFAULT_SENDER.create(0));
        assert_eq!(second.address, DEFAULT_SENDER.create(1));
        assert_ne!(first.tx_hash, second.tx_hash);
        assert_eq!(deployer.submissions().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_bytecode_rejected() {
        let deployer = SimulatedDeployer::default();
        let err = deployer.deploy(&linked("A", vec![]), &[]).await.unwrap_err();
        assert!(matches!(err, DeployError::DeploymentRejected { .. }));
        assert!(deployer.submissions().is_empty());
    }
}
