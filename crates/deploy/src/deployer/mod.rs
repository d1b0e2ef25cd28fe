//! The deployment capability and its adapters.
//!
//! The orchestrator only sees [`ContractDeployer`]. Each adapter lives in its
//! own submodule:
//! - `rpc` - submits creation transactions to a JSON-RPC node
//! - `simulated` - computes addresses in memory, for dry runs and tests

mod rpc;
mod simulated;

use std::future::Future;

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, B256, Bytes},
};

pub use rpc::{DEFAULT_RPC_URL, DEFAULT_SENDER, NetworkConfig, RpcDeployer};
pub use simulated::{SimulatedDeployer, Submission};

use crate::{DeployError, LinkedArtifact};

/// What the target environment reports for a successful deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployReceipt {
    pub address: Address,
    pub tx_hash: B256,
}

/// Submits deploy-ready artifacts to a target environment.
///
/// Every successful call creates a new contract instance. Calling it twice for
/// the same artifact yields two instances at two addresses.
pub trait ContractDeployer: Send + Sync {
    /// The name of this deployer for logging.
    const NAME: &'static str;

    /// Deploy `artifact` with the given constructor arguments.
    fn deploy(
        &self,
        artifact: &LinkedArtifact,
        args: &[DynSolValue],
    ) -> impl Future<Output = Result<DeployReceipt, DeployError>> + Send;
}

impl<D: ContractDeployer> ContractDeployer for &D {
    const NAME: &'static str = D::NAME;

    fn deploy(
        &self,
        artifact: &LinkedArtifact,
        args: &[DynSolValue],
    ) -> impl Future<Output = Result<DeployReceipt, DeployError>> + Send {
        (**self).deploy(artifact, args)
    }
}

/// Contract creation data: bytecode followed by the ABI-encoded constructor arguments.
pub fn creation_data(bytecode: &Bytes, args: &[DynSolValue]) -> Bytes {
    if args.is_empty() {
        return bytecode.clone();
    }

    let encoded = DynSolValue::Tuple(args.to_vec()).abi_encode_params();
    let mut data = Vec::with_capacity(bytecode.len() + encoded.len());
    data.extend_from_slice(bytecode);
    data.extend_from_slice(&encoded);
    Bytes::from(data)
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::U256;

    use super::*;

    #[test]
    fn test_creation_data_without_args() {
        let bytecode = Bytes::from(vec![0x60, 0x80]);
        assert_eq!(creation_data(&bytecode, &[]), bytecode);
    }

    #[test]
    fn test_creation_data_appends_encoded_args() {
        let bytecode = Bytes::from(vec![0x60, 0x80]);
        let args = [
            DynSolValue::Uint(U256::from(42u64), 256),
            DynSolValue::Address(Address::repeat_byte(0xaa)),
        ];
        let data = creation_data(&bytecode, &args);

        assert_eq!(data.len(), 2 + 64);
        assert_eq!(&data[..2], &[0x60, 0x80]);
        assert_eq!(data[2 + 31], 42);
        assert_eq!(&data[2 + 44..2 + 64], Address::repeat_byte(0xaa).as_slice());
    }
}
