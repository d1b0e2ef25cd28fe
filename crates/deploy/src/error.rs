//! Error taxonomy for registry, graph, linking and deployment.

use thiserror::Error;

use crate::ArtifactId;

/// Errors raised while preparing or executing a deployment run.
///
/// Structural errors (registry and graph) are raised before any transaction is
/// submitted. Deployment errors may be raised after earlier artifacts were
/// already deployed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeployError {
    /// An artifact with this identity is already registered.
    #[error("artifact `{0}` is already registered")]
    DuplicateArtifact(ArtifactId),

    /// No artifact with this identity is registered.
    #[error("artifact `{0}` is not registered")]
    UnknownArtifact(ArtifactId),

    /// A dependency slot names an artifact that is neither registered nor seeded.
    #[error("artifact `{artifact}` depends on `{dependency}`, which is not registered")]
    UnresolvedDependency {
        artifact: ArtifactId,
        dependency: ArtifactId,
    },

    /// The dependency graph contains a cycle. The path starts and ends on the same artifact.
    #[error("cyclic dependency: {}", format_cycle(.0))]
    CyclicDependency(Vec<ArtifactId>),

    /// The linker was asked to resolve a slot whose dependency has no address yet.
    ///
    /// The orchestrator never does this; seeing it means the deployment order is broken.
    #[error("no address recorded for `{dependency}` while linking `{artifact}`")]
    MissingAddress {
        artifact: ArtifactId,
        dependency: ArtifactId,
    },

    /// The artifact payload or slot declarations are malformed.
    #[error("invalid artifact `{artifact}`: {reason}")]
    InvalidArtifact { artifact: ArtifactId, reason: String },

    /// The address table already holds a record for this artifact.
    #[error("artifact `{0}` already has a deployment record")]
    AlreadyRecorded(ArtifactId),

    /// The deployment was refused before it reached the target environment.
    #[error("deployment of `{artifact}` rejected: {reason}")]
    DeploymentRejected { artifact: ArtifactId, reason: String },

    /// The deployment was submitted but did not produce a contract.
    #[error("deployment of `{artifact}` failed: {reason}")]
    DeploymentFailed { artifact: ArtifactId, reason: String },

    /// No receipt arrived for the deployment within the allotted time.
    #[error("deployment of `{artifact}` timed out after {waited_secs}s")]
    Timeout { artifact: ArtifactId, waited_secs: u64 },
}

impl DeployError {
    /// Whether the error was raised before any side effect could happen.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::DuplicateArtifact(_)
                | Self::UnknownArtifact(_)
                | Self::UnresolvedDependency { .. }
                | Self::CyclicDependency(_)
                | Self::InvalidArtifact { .. }
        )
    }
}

fn format_cycle(path: &[ArtifactId]) -> String {
    path.iter()
        .map(ArtifactId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_path() {
        let err = DeployError::CyclicDependency(vec!["A".into(), "B".into(), "A".into()]);
        assert_eq!(err.to_string(), "cyclic dependency: A -> B -> A");
    }

    #[test]
    fn test_structural_classification() {
        assert!(DeployError::UnknownArtifact("A".into()).is_structural());
        assert!(
            !DeployError::Timeout {
                artifact: "A".into(),
                waited_secs: 3
            }
            .is_structural()
        );
    }
}
