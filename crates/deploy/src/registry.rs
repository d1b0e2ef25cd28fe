//! Registry of artifacts taking part in a run.

use std::collections::HashMap;

use crate::{Artifact, ArtifactId, DeployError};

/// Holds every artifact of a run, keyed by identity.
///
/// Registration order is kept and used as the tie-break when ordering
/// artifacts that have no dependency relation.
#[derive(Debug, Clone, Default)]
pub struct ArtifactRegistry {
    artifacts: Vec<Artifact>,
    index: HashMap<ArtifactId, usize>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an artifact. Fails if its identity is already taken.
    pub fn register(&mut self, artifact: Artifact) -> Result<(), DeployError> {
        if self.index.contains_key(artifact.id()) {
            return Err(DeployError::DuplicateArtifact(artifact.id().clone()));
        }

        tracing::debug!(
            artifact = %artifact.id(),
            slots = artifact.slots().len(),
            "Registered artifact"
        );

        self.index.insert(artifact.id().clone(), self.artifacts.len());
        self.artifacts.push(artifact);
        Ok(())
    }

    pub fn get(&self, id: &ArtifactId) -> Result<&Artifact, DeployError> {
        self.index
            .get(id)
            .map(|&i| &self.artifacts[i])
            .ok_or_else(|| DeployError::UnknownArtifact(id.clone()))
    }

    pub fn contains(&self, id: &ArtifactId) -> bool {
        self.index.contains_key(id)
    }

    /// Position of the artifact in registration order.
    pub fn position(&self, id: &ArtifactId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Artifacts in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

impl<'a> IntoIterator for &'a ArtifactRegistry {
    type Item = &'a Artifact;
    type IntoIter = std::slice::Iter<'a, Artifact>;

    fn into_iter(self) -> Self::IntoIter {
        self.artifacts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_get() {
        let mut registry = ArtifactRegistry::new();
        registry
            .register(Artifact::standalone("Arithmetic", "6080").unwrap())
            .unwrap();

        let artifact = registry.get(&"Arithmetic".into()).unwrap();
        assert_eq!(artifact.payload(), "6080");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.position(&"Arithmetic".into()), Some(0));
    }

    #[test]
    fn test_register_duplicate_fails() {
        let mut registry = ArtifactRegistry::new();
        registry
            .register(Artifact::standalone("Arithmetic", "6080").unwrap())
            .unwrap();

        let err = registry
            .register(Artifact::standalone("Arithmetic", "6081").unwrap())
            .unwrap_err();
        assert_eq!(err, DeployError::DuplicateArtifact("Arithmetic".into()));
        assert_eq!(registry.get(&"Arithmetic".into()).unwrap().payload(), "6080");
    }

    #[test]
    fn test_get_unknown_fails() {
        let registry = ArtifactRegistry::new();
        let err = registry.get(&"Exchange".into()).unwrap_err();
        assert_eq!(err, DeployError::UnknownArtifact("Exchange".into()));
    }

    #[test]
    fn test_iteration_follows_registration_order() {
        let mut registry = ArtifactRegistry::new();
        for name in ["Zeta", "Alpha", "Mid"] {
            registry
                .register(Artifact::standalone(name, "00").unwrap())
                .unwrap();
        }
        let names: Vec<_> = registry.iter().map(|a| a.id().as_str()).collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
    }
}
