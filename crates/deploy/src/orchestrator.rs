//! Drives a deployment run over the dependency graph.
//!
//! A run moves through `Init -> Running -> Completed`, or ends in `Failed`.
//! Structural problems (unresolved or cyclic dependencies) fail the run in
//! `Init`, before anything is submitted. A deployment failure ends the run
//! where it happened and hands back every record written so far.

use std::collections::HashMap;

use alloy_core::{dyn_abi::DynSolValue, primitives::Address};
use thiserror::Error;

use crate::{
    AddressTable, Artifact, ArtifactId, ArtifactRegistry, ContractDeployer, DependencyGraph,
    DeployError, DeploymentRecord, Linker,
};

/// Where a run currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    /// Graph not built yet.
    Init,
    /// Walking the deployment order.
    Running,
    /// Every artifact has a record.
    Completed,
    /// The run stopped. `artifact` is unset when the graph itself was invalid.
    Failed {
        artifact: Option<ArtifactId>,
        error: DeployError,
    },
}

/// A failed run, with the records written before the failure.
#[derive(Debug, Clone, Error)]
#[error("deployment run failed{}: {error}", at_artifact(.artifact))]
pub struct RunFailure {
    /// The artifact being processed, if the failure happened past `Init`.
    pub artifact: Option<ArtifactId>,
    pub error: DeployError,
    /// Seeded entries plus everything deployed before the failure.
    pub table: AddressTable,
}

fn at_artifact(artifact: &Option<ArtifactId>) -> String {
    artifact
        .as_ref()
        .map(|id| format!(" at `{}`", id))
        .unwrap_or_default()
}

/// One entry of a deployment plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub artifact: ArtifactId,
    /// Every artifact whose address is linked in, registered or seeded.
    pub dependencies: Vec<ArtifactId>,
    /// Set when a seeded record exists and the artifact will be skipped.
    pub existing: Option<Address>,
}

/// Deploys every registered artifact in dependency order.
///
/// Artifacts already present in the seed table are not redeployed; their
/// recorded address is linked into dependents instead. After a run the seed is
/// replaced by the table the run produced, so calling [`Orchestrator::run`]
/// again after a failure resumes from the failing artifact.
pub struct Orchestrator<D> {
    registry: ArtifactRegistry,
    deployer: D,
    seed: AddressTable,
    args: HashMap<ArtifactId, Vec<DynSolValue>>,
    state: RunState,
}

impl<D: ContractDeployer> Orchestrator<D> {
    pub fn new(registry: ArtifactRegistry, deployer: D) -> Self {
        Self {
            registry,
            deployer,
            seed: AddressTable::default(),
            args: HashMap::new(),
            state: RunState::Init,
        }
    }

    /// Start from the records of an earlier run.
    pub fn with_seed(mut self, seed: AddressTable) -> Self {
        self.seed = seed;
        self
    }

    /// Constructor arguments for an artifact, in declaration order.
    pub fn constructor_args(mut self, id: impl Into<ArtifactId>, args: Vec<DynSolValue>) -> Self {
        self.args.insert(id.into(), args);
        self
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn registry(&self) -> &ArtifactRegistry {
        &self.registry
    }

    pub fn deployer(&self) -> &D {
        &self.deployer
    }

    pub fn seed(&self) -> &AddressTable {
        &self.seed
    }

    /// What a run would do, without submitting anything.
    pub fn plan(&self) -> Result<Vec<PlannedStep>, DeployError> {
        let graph = DependencyGraph::build_with_external(&self.registry, &self.seed)?;

        graph
            .order()
            .iter()
            .map(|id| {
                let artifact = self.registry.get(id)?;
                Ok(PlannedStep {
                    artifact: id.clone(),
                    dependencies: artifact.dependencies().into_iter().cloned().collect(),
                    existing: self.seed.address(id),
                })
            })
            .collect()
    }

    /// Execute a run.
    ///
    /// Returns the final address table on success. On failure the table in
    /// [`RunFailure`] holds whatever was deployed before the error.
    pub async fn run(&mut self) -> Result<AddressTable, RunFailure> {
        self.state = RunState::Init;
        let mut table = self.seed.clone();

        tracing::info!(
            deployer = D::NAME,
            artifacts = self.registry.len(),
            seeded = table.len(),
            "Starting deployment run..."
        );

        let graph = match DependencyGraph::build_with_external(&self.registry, &table) {
            Ok(graph) => graph,
            Err(error) => return Err(self.fail(None, error, table)),
        };

        self.state = RunState::Running;

        for id in graph.order() {
            if let Some(record) = table.get(id) {
                tracing::info!(
                    artifact = %id,
                    address = %record.address,
                    "Already deployed, skipping"
                );
                continue;
            }

            let outcome = self.deploy_one(id, &mut table).await;
            if let Err(error) = outcome {
                return Err(self.fail(Some(id.clone()), error, table));
            }
        }

        self.state = RunState::Completed;
        self.seed = table.clone();

        tracing::info!(deployed = table.len(), "✓ Deployment run complete");
        Ok(table)
    }

    async fn deploy_one(&self, id: &ArtifactId, table: &mut AddressTable) -> Result<(), DeployError> {
        let artifact = self.registry.get(id)?;
        let args = self.args.get(id).map(Vec::as_slice).unwrap_or_default();
        check_constructor_args(artifact, args)?;

        let linked = Linker::link(artifact, table)?;

        tracing::info!(
            artifact = %id,
            size = linked.bytecode.len(),
            linked = artifact.needs_linking(),
            "Deploying artifact..."
        );

        let receipt = self.deployer.deploy(&linked, args).await?;

        table.insert(DeploymentRecord {
            artifact: id.clone(),
            address: receipt.address,
            tx_hash: receipt.tx_hash,
            sequence: table.next_sequence(),
            deployed_at: chrono::Utc::now(),
            fingerprint: linked.fingerprint,
        })?;

        tracing::info!(
            artifact = %id,
            address = %receipt.address,
            tx_hash = %receipt.tx_hash,
            "Artifact deployed"
        );
        Ok(())
    }

    fn fail(
        &mut self,
        artifact: Option<ArtifactId>,
        error: DeployError,
        table: AddressTable,
    ) -> RunFailure {
        tracing::error!(
            artifact = ?artifact,
            error = %error,
            deployed = table.len(),
            "Deployment run failed"
        );

        self.state = RunState::Failed {
            artifact: artifact.clone(),
            error: error.clone(),
        };
        self.seed = table.clone();

        RunFailure {
            artifact,
            error,
            table,
        }
    }
}

/// Reject argument lists that do not fit the constructor before anything is sent.
fn check_constructor_args(artifact: &Artifact, args: &[DynSolValue]) -> Result<(), DeployError> {
    let schema = artifact.constructor();

    if schema.len() != args.len() {
        return Err(DeployError::DeploymentRejected {
            artifact: artifact.id().clone(),
            reason: format!(
                "constructor expects {} argument(s), got {}",
                schema.len(),
                args.len()
            ),
        });
    }

    for (position, (ty, value)) in schema.iter().zip(args).enumerate() {
        if !value.matches(ty) {
            return Err(DeployError::DeploymentRejected {
                artifact: artifact.id().clone(),
                reason: format!("constructor argument {} is not a {}", position, ty),
            });
        }
    }

    Ok(())
}
