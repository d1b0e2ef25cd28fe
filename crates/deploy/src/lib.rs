//! linkup-deploy - Dependency-ordered contract deployment with library linking.
//!
//! Artifacts are registered in an [`ArtifactRegistry`], ordered by a
//! [`DependencyGraph`], linked against the addresses of their dependencies by
//! the [`Linker`] and submitted through a [`ContractDeployer`]. The
//! [`Orchestrator`] ties these together and records every deployment in an
//! [`AddressTable`].
//!
//! # Example
//!
//! ```no_run
//! use linkup_deploy::{
//!     Artifact, ArtifactRegistry, DependencySlot, Orchestrator, SimulatedDeployer,
//!     artifact::legacy_placeholder,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut registry = ArtifactRegistry::new();
//! registry.register(Artifact::standalone("Arithmetic", "0x6080")?)?;
//! registry.register(Artifact::new(
//!     "Exchange",
//!     format!("0x60{}", legacy_placeholder("Arithmetic")),
//!     vec![DependencySlot::legacy("Arithmetic")],
//!     vec![],
//! )?)?;
//!
//! let table = Orchestrator::new(registry, SimulatedDeployer::default())
//!     .run()
//!     .await?;
//! println!("{:?}", table.addresses());
//! # Ok(())
//! # }
//! ```

pub mod artifact;
mod config;
pub mod deployer;
mod error;
mod graph;
mod linker;
pub mod loader;
mod orchestrator;
mod registry;
mod rpc;
mod table;

pub use artifact::{Artifact, ArtifactId, DependencySlot, LinkedArtifact};
pub use config::{CONFIG_FILENAME, ContractConfig, DeployConfig};
pub use deployer::{
    ContractDeployer, DeployReceipt, NetworkConfig, RpcDeployer, SimulatedDeployer, Submission,
};
pub use error::DeployError;
pub use graph::DependencyGraph;
pub use linker::{Linker, fingerprint};
pub use orchestrator::{Orchestrator, PlannedStep, RunFailure, RunState};
pub use registry::ArtifactRegistry;
pub use table::{AddressTable, DeploymentRecord};
