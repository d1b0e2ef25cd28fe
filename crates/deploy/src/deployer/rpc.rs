//! Deploys through an Ethereum JSON-RPC endpoint with an unlocked sender.

use std::time::Duration;

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, B256, address},
};
use backon::{ConstantBuilder, Retryable};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{ContractDeployer, DeployReceipt, creation_data};
use crate::{ArtifactId, DeployError, LinkedArtifact, rpc};

/// First pre-funded account of a default Anvil instance.
pub const DEFAULT_SENDER: Address = address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266");

/// Default local node endpoint.
pub const DEFAULT_RPC_URL: &str = "http://localhost:8545";

/// Connection and submission settings for the target network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint of the node.
    pub rpc_url: Url,
    /// Unlocked account that signs creation transactions.
    pub from: Address,
    /// Gas limit for each creation transaction. Left to the node when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<u64>,
    /// How long to wait for a receipt before giving up.
    pub receipt_timeout_secs: u64,
    /// Delay between receipt polls.
    pub poll_interval_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: Url::parse(DEFAULT_RPC_URL).expect("default RPC URL is valid"),
            from: DEFAULT_SENDER,
            gas: None,
            receipt_timeout_secs: 60,
            poll_interval_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    transaction_hash: B256,
    contract_address: Option<Address>,
    status: Option<String>,
}

/// [`ContractDeployer`] backed by `eth_sendTransaction`.
///
/// Submission is never retried since a retry could create a second contract.
/// Only the receipt lookup is polled.
#[derive(Debug, Clone)]
pub struct RpcDeployer {
    client: reqwest::Client,
    config: NetworkConfig,
}

impl RpcDeployer {
    pub fn new(config: NetworkConfig) -> Result<Self, anyhow::Error> {
        Ok(Self {
            client: rpc::create_client()?,
            config,
        })
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Chain ID reported by the node.
    pub async fn chain_id(&self) -> Result<u64, anyhow::Error> {
        let chain_id: String =
            rpc::json_rpc_call(&self.client, self.config.rpc_url.as_str(), "eth_chainId", vec![])
                .await?;
        rpc::parse_quantity(&chain_id)
    }

    async fn wait_for_receipt(
        &self,
        artifact: &ArtifactId,
        tx_hash: B256,
    ) -> Result<TransactionReceipt, DeployError> {
        let timeout = Duration::from_secs(self.config.receipt_timeout_secs);
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms.max(1));
        let max_polls = (timeout.as_millis() / poll_interval.as_millis()).max(1) as usize;

        let fetch = move || async move {
            let receipt: Option<TransactionReceipt> = rpc::json_rpc_call(
                &self.client,
                self.config.rpc_url.as_str(),
                "eth_getTransactionReceipt",
                vec![serde_json::json!(tx_hash)],
            )
            .await?;
            receipt.ok_or_else(|| anyhow::anyhow!("Receipt not yet available"))
        };

        let polled = tokio::time::timeout(
            timeout,
            fetch
                .retry(
                    ConstantBuilder::default()
                        .with_delay(poll_interval)
                        .with_max_times(max_polls),
                )
                .notify(|err, _| {
                    tracing::trace!(%artifact, %tx_hash, error = %err, "Waiting for receipt...");
                }),
        )
        .await;

        match polled {
            Ok(Ok(receipt)) => Ok(receipt),
            Ok(Err(err)) => {
                tracing::warn!(%artifact, %tx_hash, error = %err, "Gave up waiting for receipt");
                Err(DeployError::Timeout {
                    artifact: artifact.clone(),
                    waited_secs: self.config.receipt_timeout_secs,
                })
            }
            Err(_) => Err(DeployError::Timeout {
                artifact: artifact.clone(),
                waited_secs: self.config.receipt_timeout_secs,
            }),
        }
    }
}

impl ContractDeployer for RpcDeployer {
    const NAME: &'static str = "json-rpc";

    async fn deploy(
        &self,
        artifact: &LinkedArtifact,
        args: &[DynSolValue],
    ) -> Result<DeployReceipt, DeployError> {
        let data = creation_data(&artifact.bytecode, args);

        let mut tx = serde_json::json!({
            "from": self.config.from,
            "data": data,
        });
        if let Some(gas) = self.config.gas {
            tx["gas"] = serde_json::json!(format!("0x{:x}", gas));
        }

        let tx_hash: B256 = rpc::json_rpc_call(
            &self.client,
            self.config.rpc_url.as_str(),
            "eth_sendTransaction",
            vec![tx],
        )
        .await
        .map_err(|err| {
            if err.is_timeout() {
                // The node may have accepted the transaction.
                tracing::warn!(artifact = %artifact.id, error = %err, "No answer to creation transaction");
                DeployError::Timeout {
                    artifact: artifact.id.clone(),
                    waited_secs: rpc::REQUEST_TIMEOUT.as_secs(),
                }
            } else {
                DeployError::DeploymentRejected {
                    artifact: artifact.id.clone(),
                    reason: err.to_string(),
                }
            }
        })?;

        tracing::info!(artifact = %artifact.id, %tx_hash, "Creation transaction sent");

        let receipt = self.wait_for_receipt(&artifact.id, tx_hash).await?;

        if receipt.status.as_deref() == Some("0x0") {
            return Err(DeployError::DeploymentFailed {
                artifact: artifact.id.clone(),
                reason: format!("transaction {} reverted", receipt.transaction_hash),
            });
        }

        let address = receipt
            .contract_address
            .ok_or_else(|| DeployError::DeploymentFailed {
                artifact: artifact.id.clone(),
                reason: format!(
                    "receipt for {} carries no contract address",
                    receipt.transaction_hash
                ),
            })?;

        Ok(DeployReceipt {
            address,
            tx_hash: receipt.transaction_hash,
        })
    }
}
