//! Loads compiler output into an [`ArtifactRegistry`].
//!
//! Accepts Truffle-style artifacts (`contractName`, `abi`, `bytecode` as a hex
//! string) and Foundry/Hardhat-style ones (`bytecode.object` with
//! `linkReferences`). Link references become hashed slots; without them, legacy
//! `__Name___` placeholders are read straight from the bytecode.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use alloy_core::{dyn_abi::DynSolType, json_abi::JsonAbi};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    Artifact, ArtifactId, ArtifactRegistry, DependencySlot,
    artifact::{PLACEHOLDER_LEN, hashed_placeholder, legacy_placeholder},
};

/// `source file -> library name -> offsets`. Offsets are not needed since
/// placeholders are located by their text.
type LinkReferences = BTreeMap<String, BTreeMap<String, Value>>;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BytecodeField {
    Hex(String),
    Object {
        object: String,
        #[serde(default, rename = "linkReferences")]
        link_references: LinkReferences,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactFile {
    contract_name: Option<String>,
    #[serde(default)]
    abi: JsonAbi,
    bytecode: Option<BytecodeField>,
    #[serde(default)]
    link_references: LinkReferences,
}

/// Parse one artifact document. `fallback_name` is used when the document
/// carries no `contractName`. Returns `None` for artifacts without bytecode
/// (interfaces, abstract contracts).
pub fn parse_artifact(fallback_name: &str, json: &str) -> Result<Option<Artifact>> {
    let file: ArtifactFile =
        serde_json::from_str(json).context("Failed to parse artifact JSON")?;

    let name = file
        .contract_name
        .unwrap_or_else(|| fallback_name.to_string());

    let (payload, mut link_references) = match file.bytecode {
        Some(BytecodeField::Hex(hex)) => (hex, LinkReferences::new()),
        Some(BytecodeField::Object {
            object,
            link_references,
        }) => (object, link_references),
        None => return Ok(None),
    };
    link_references.extend(file.link_references);

    let payload = payload.trim().trim_start_matches("0x").to_string();
    if payload.is_empty() {
        return Ok(None);
    }

    let slots = if link_references.is_empty() {
        scan_legacy_slots(&payload).with_context(|| format!("Invalid bytecode in `{}`", name))?
    } else {
        slots_from_link_references(&payload, &link_references)
            .with_context(|| format!("Invalid link references in `{}`", name))?
    };

    let constructor = match &file.abi.constructor {
        Some(constructor) => constructor
            .inputs
            .iter()
            .map(|param| {
                DynSolType::parse(&param.selector_type())
                    .with_context(|| format!("Unsupported constructor parameter type `{}`", param.ty))
            })
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    let artifact = Artifact::new(name, payload, slots, constructor)?;
    Ok(Some(artifact))
}

/// Load a single artifact file.
pub fn load_artifact(path: &Path) -> Result<Option<Artifact>> {
    let content = std::fs::read_to_string(path)
        .context(format!("Failed to read artifact from {}", path.display()))?;

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .context("Artifact file name is not valid UTF-8")?;

    parse_artifact(stem, &content).context(format!("Failed to load artifact {}", path.display()))
}

/// Load every `*.json` artifact in `dir`, registering them in file name order.
pub fn load_registry(dir: &Path) -> Result<ArtifactRegistry> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .context(format!("Failed to read artifacts directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut artifacts = Vec::new();
    for path in paths {
        match load_artifact(&path)? {
            Some(artifact) => artifacts.push(artifact),
            None => {
                tracing::debug!(path = %path.display(), "Skipping artifact without bytecode");
            }
        }
    }

    let mut registry = ArtifactRegistry::new();
    for artifact in resolve_legacy_targets(artifacts)? {
        registry.register(artifact)?;
    }

    tracing::info!(
        dir = %dir.display(),
        artifacts = registry.len(),
        "Artifacts loaded"
    );
    Ok(registry)
}

/// Point legacy slots at the loaded artifact whose placeholder they match.
///
/// A legacy placeholder keeps at most 38 characters of the library name and
/// cannot tell trailing underscores from padding, so the name read back from
/// the bytecode is only a hint.
fn resolve_legacy_targets(artifacts: Vec<Artifact>) -> Result<Vec<Artifact>> {
    let mut by_marker: BTreeMap<String, Vec<ArtifactId>> = BTreeMap::new();
    for artifact in &artifacts {
        by_marker
            .entry(legacy_placeholder(artifact.id().as_str()))
            .or_default()
            .push(artifact.id().clone());
    }

    artifacts
        .into_iter()
        .map(|artifact| {
            let mut changed = false;
            let mut slots = Vec::with_capacity(artifact.slots().len());

            for slot in artifact.slots() {
                let candidates = by_marker.get(&slot.marker).map(Vec::as_slice).unwrap_or_default();
                match candidates {
                    [target] if *target != slot.target => {
                        tracing::debug!(
                            artifact = %artifact.id(),
                            placeholder = %slot.target,
                            target = %target,
                            "Resolved legacy placeholder"
                        );
                        slots.push(DependencySlot::legacy(target.clone()));
                        changed = true;
                    }
                    [_, _, ..] => anyhow::bail!(
                        "Placeholder `{}` in `{}` matches several artifacts: {}",
                        slot.marker,
                        artifact.id(),
                        candidates
                            .iter()
                            .map(ArtifactId::as_str)
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                    _ => slots.push(slot.clone()),
                }
            }

            if !changed {
                return Ok(artifact);
            }
            Ok(Artifact::new(
                artifact.id().clone(),
                artifact.payload(),
                slots,
                artifact.constructor().to_vec(),
            )?)
        })
        .collect()
}

fn slots_from_link_references(payload: &str, references: &LinkReferences) -> Result<Vec<DependencySlot>> {
    let mut slots = Vec::new();

    for (source, libraries) in references {
        for library in libraries.keys() {
            let fully_qualified = format!("{}:{}", source, library);

            let slot = if payload.contains(&hashed_placeholder(&fully_qualified)) {
                DependencySlot::hashed(&fully_qualified, library.as_str())
            } else if payload.contains(&legacy_placeholder(library)) {
                DependencySlot::legacy(library.as_str())
            } else {
                anyhow::bail!("No placeholder for `{}` found in bytecode", fully_qualified);
            };

            if slots.iter().any(|s: &DependencySlot| s.marker == slot.marker) {
                continue;
            }
            slots.push(slot);
        }
    }

    Ok(slots)
}

fn scan_legacy_slots(payload: &str) -> Result<Vec<DependencySlot>> {
    let mut slots: Vec<DependencySlot> = Vec::new();
    let mut rest = payload;

    while let Some(start) = rest.find("__") {
        let Some(marker) = rest.get(start..start + PLACEHOLDER_LEN) else {
            anyhow::bail!("Truncated placeholder at end of bytecode");
        };

        if marker.starts_with("__$") {
            anyhow::bail!("Hashed placeholder `{}` found but no link references given", marker);
        }

        let name = marker.trim_start_matches('_').trim_end_matches('_');
        if name.is_empty() || legacy_placeholder(name) != marker {
            anyhow::bail!("Malformed placeholder `{}`", marker);
        }

        if !slots.iter().any(|slot| slot.marker == marker) {
            slots.push(DependencySlot::legacy(name));
        }

        rest = &rest[start + PLACEHOLDER_LEN..];
    }

    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DependencyGraph, DeployError};
    use tempdir::TempDir;

    fn truffle(name: &str, bytecode: &str, abi: Value) -> String {
        serde_json::json!({
            "contractName": name,
            "abi": abi,
            "bytecode": bytecode,
        })
        .to_string()
    }

    #[test]
    fn test_parse_truffle_library() {
        let json = truffle("Arithmetic", "0x60806040", serde_json::json!([]));
        let artifact = parse_artifact("ignored", &json).unwrap().unwrap();

        assert_eq!(artifact.id(), &ArtifactId::from("Arithmetic"));
        assert!(artifact.slots().is_empty());
        assert!(artifact.constructor().is_empty());
    }

    #[test]
    fn test_parse_truffle_legacy_placeholders() {
        let marker = legacy_placeholder("Arithmetic");
        let bytecode = format!("0x6080{marker}6040{marker}");
        let abi = serde_json::json!([{
            "type": "constructor",
            "inputs": [
                {"name": "fee", "type": "uint256"},
                {"name": "owner", "type": "address"}
            ],
            "stateMutability": "nonpayable"
        }]);

        let artifact = parse_artifact("Exchange", &truffle("Exchange", &bytecode, abi))
            .unwrap()
            .unwrap();

        assert_eq!(artifact.slots(), &[DependencySlot::legacy("Arithmetic")]);
        assert_eq!(
            artifact.constructor(),
            &[DynSolType::Uint(256), DynSolType::Address]
        );
    }

    #[test]
    fn test_parse_foundry_link_references() {
        let fq = "src/Arithmetic.sol:Arithmetic";
        let json = serde_json::json!({
            "abi": [],
            "bytecode": {
                "object": format!("0x60{}", hashed_placeholder(fq)),
                "linkReferences": {
                    "src/Arithmetic.sol": {
                        "Arithmetic": [{"start": 1, "length": 20}]
                    }
                }
            }
        })
        .to_string();

        let artifact = parse_artifact("Exchange", &json).unwrap().unwrap();
        assert_eq!(artifact.id(), &ArtifactId::from("Exchange"));
        assert_eq!(artifact.slots(), &[DependencySlot::hashed(fq, "Arithmetic")]);
    }

    #[test]
    fn test_hashed_placeholder_without_references_fails() {
        let json = truffle(
            "Exchange",
            &format!("0x60{}", hashed_placeholder("a.sol:A")),
            serde_json::json!([]),
        );
        assert!(parse_artifact("Exchange", &json).is_err());
    }

    #[test]
    fn test_interface_without_bytecode_is_skipped() {
        let json = truffle("IExchange", "0x", serde_json::json!([]));
        assert!(parse_artifact("IExchange", &json).unwrap().is_none());
    }

    #[test]
    fn test_load_registry_sorted_by_file_name() {
        let temp_dir = TempDir::new("linkup-test").expect("Failed to create temp dir");
        let marker = legacy_placeholder("Arithmetic");

        std::fs::write(
            temp_dir.path().join("Exchange.json"),
            truffle("Exchange", &format!("0x60{marker}"), serde_json::json!([])),
        )
        .unwrap();
        std::fs::write(
            temp_dir.path().join("Arithmetic.json"),
            truffle("Arithmetic", "0x6080", serde_json::json!([])),
        )
        .unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "not an artifact").unwrap();

        let registry = load_registry(temp_dir.path()).unwrap();
        let names: Vec<_> = registry.iter().map(|a| a.id().as_str()).collect();
        assert_eq!(names, vec!["Arithmetic", "Exchange"]);
    }

    #[test]
    fn test_load_registry_resolves_truncated_library_name() {
        let temp_dir = TempDir::new("linkup-test").expect("Failed to create temp dir");
        let library = "VeryLongLibraryNameThatExceedsThirtyEightChars";
        let marker = legacy_placeholder(library);

        std::fs::write(
            temp_dir.path().join(format!("{library}.json")),
            truffle(library, "0x6080", serde_json::json!([])),
        )
        .unwrap();
        std::fs::write(
            temp_dir.path().join("Exchange.json"),
            truffle("Exchange", &format!("0x60{marker}"), serde_json::json!([])),
        )
        .unwrap();

        let registry = load_registry(temp_dir.path()).unwrap();
        let exchange = registry.get(&"Exchange".into()).unwrap();
        assert_eq!(exchange.slots(), &[DependencySlot::legacy(library)]);

        let graph = DependencyGraph::build(&registry).unwrap();
        let order: Vec<_> = graph.order().iter().map(ArtifactId::as_str).collect();
        assert_eq!(order, vec![library, "Exchange"]);
    }

    #[test]
    fn test_load_registry_resolves_trailing_underscore() {
        let temp_dir = TempDir::new("linkup-test").expect("Failed to create temp dir");
        let marker = legacy_placeholder("Math_");

        std::fs::write(
            temp_dir.path().join("Math_.json"),
            truffle("Math_", "0x6080", serde_json::json!([])),
        )
        .unwrap();
        std::fs::write(
            temp_dir.path().join("Exchange.json"),
            truffle("Exchange", &format!("0x60{marker}"), serde_json::json!([])),
        )
        .unwrap();

        let registry = load_registry(temp_dir.path()).unwrap();
        let exchange = registry.get(&"Exchange".into()).unwrap();
        assert_eq!(exchange.dependencies(), vec![&ArtifactId::from("Math_")]);
    }

    #[test]
    fn test_load_registry_rejects_ambiguous_placeholder() {
        let temp_dir = TempDir::new("linkup-test").expect("Failed to create temp dir");
        let marker = legacy_placeholder("Math");

        for name in ["Math", "Math_"] {
            std::fs::write(
                temp_dir.path().join(format!("{name}.json")),
                truffle(name, "0x6080", serde_json::json!([])),
            )
            .unwrap();
        }
        std::fs::write(
            temp_dir.path().join("Exchange.json"),
            truffle("Exchange", &format!("0x60{marker}"), serde_json::json!([])),
        )
        .unwrap();

        let err = load_registry(temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains("matches several artifacts"));
    }

    #[test]
    fn test_load_registry_keeps_unknown_placeholder_for_graph() {
        let temp_dir = TempDir::new("linkup-test").expect("Failed to create temp dir");
        std::fs::write(
            temp_dir.path().join("Exchange.json"),
            truffle(
                "Exchange",
                &format!("0x60{}", legacy_placeholder("Missing")),
                serde_json::json!([]),
            ),
        )
        .unwrap();

        let registry = load_registry(temp_dir.path()).unwrap();
        assert_eq!(
            DependencyGraph::build(&registry).unwrap_err(),
            DeployError::UnresolvedDependency {
                artifact: "Exchange".into(),
                dependency: "Missing".into(),
            }
        );
    }
}
