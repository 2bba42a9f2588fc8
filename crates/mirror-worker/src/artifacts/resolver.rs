use super::{
    AddressCache,
    ArtifactError,
    ProjectLayout,
};
use crate::records::{
    ContractDocument,
    contract_key,
};
use alloy::primitives::Address;
use futures::future::join_all;
use mirror_store::{
    Collection,
    Gateway,
    StoreError,
    UpsertOptions,
    artifact_blob_key,
    dependencies_blob_key,
};
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;
use std::{
    collections::{
        BTreeMap,
        HashMap,
    },
    io::ErrorKind,
    path::Path,
};
use tracing::{
    debug,
    info,
    warn,
};

/// The fields read from a compiler artifact file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompiledArtifact {
    contract_name: String,
    abi: Value,
    ast: Value,
    source: String,
    #[serde(default)]
    networks: HashMap<String, NetworkDeployment>,
}

#[derive(Debug, Clone, Deserialize)]
struct NetworkDeployment {
    address: Option<String>,
}

/// Brownie's `network -> contract name -> [address]` map.
type DeploymentMap = HashMap<String, HashMap<String, Vec<String>>>;

/// What gets stored for a contract and for each of its dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactBundle {
    pub contract_name: String,
    pub abi: Value,
    pub ast: Value,
    pub source: String,
}

impl ArtifactBundle {
    pub fn serialize(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<&CompiledArtifact> for ArtifactBundle {
    fn from(artifact: &CompiledArtifact) -> Self {
        Self {
            contract_name: artifact.contract_name.clone(),
            abi: artifact.abi.clone(),
            ast: artifact.ast.clone(),
            source: artifact.source.clone(),
        }
    }
}

/// A newly deployed contract and its direct dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractUpdate {
    pub name: String,
    pub address: Address,
    pub abi: Value,
    /// Serialized [`ArtifactBundle`] of the contract itself.
    pub artifact: String,
    /// Serialized bundle per dependency name. `None` when the dependency's
    /// artifact could not be loaded.
    pub dependencies: BTreeMap<String, Option<String>>,
}

impl ContractUpdate {
    /// Upsert the contract record and write both blobs under its address.
    pub async fn persist(&self, gateway: &dyn Gateway) -> Result<(), StoreError> {
        let key = contract_key(&self.address);
        let contract = ContractDocument {
            address: self.address,
            name: Some(self.name.clone()),
            abi: Some(self.abi.clone()),
        };

        gateway
            .upsert(
                Collection::Contracts,
                &key,
                contract.to_document()?,
                UpsertOptions::MERGE,
            )
            .await?;
        gateway
            .put_blob(&artifact_blob_key(&key), self.artifact.clone().into_bytes())
            .await?;
        gateway
            .put_blob(
                &dependencies_blob_key(&key),
                serde_json::to_vec(&self.dependencies)?,
            )
            .await?;
        Ok(())
    }
}

/// Turns artifact files into [`ContractUpdate`]s for the active network.
#[derive(Debug, Clone)]
pub struct ArtifactResolver {
    layout: ProjectLayout,
    cache: AddressCache,
}

impl ArtifactResolver {
    pub fn new(layout: ProjectLayout, cache: AddressCache) -> Self {
        Self { layout, cache }
    }

    pub fn artifacts_dir(&self) -> &Path {
        self.layout.artifacts_dir()
    }

    pub async fn resolve_artifact(&self, path: &Path) -> Result<Option<ContractUpdate>, ArtifactError> {
        let raw = tokio::fs::read(path).await.map_err(|source| {
            ArtifactError::Io {
                path: path.to_path_buf(),
                source,
            }
        })?;
        self.resolve_raw(&raw).await
    }

    /// `Ok(None)` when the contract is not deployed on the active network or
    /// its address has not changed since the last [`Self::commit`].
    pub async fn resolve_raw(&self, raw: &[u8]) -> Result<Option<ContractUpdate>, ArtifactError> {
        let artifact: CompiledArtifact = serde_json::from_slice(raw)?;
        let dependency_names = exported_dependencies(&artifact)?;

        let Some(address) = self.deployed_address(&artifact).await? else {
            debug!(contract = %artifact.contract_name, "contract not deployed on active network");
            return Ok(None);
        };
        if self.cache.get(&artifact.contract_name) == Some(address) {
            debug!(contract = %artifact.contract_name, %address, "deployed address unchanged");
            return Ok(None);
        }

        let dependencies = self.load_dependencies(dependency_names).await;
        info!(
            contract = %artifact.contract_name,
            %address,
            dependencies = dependencies.len(),
            "resolved contract artifact"
        );

        Ok(Some(ContractUpdate {
            name: artifact.contract_name.clone(),
            address,
            abi: artifact.abi.clone(),
            artifact: ArtifactBundle::from(&artifact).serialize()?,
            dependencies,
        }))
    }

    /// Mark `update` as stored. Until then every resolve of the contract
    /// yields it again.
    pub fn commit(&self, update: &ContractUpdate) {
        self.cache.observe(&update.name, update.address);
    }

    async fn deployed_address(&self, artifact: &CompiledArtifact) -> Result<Option<Address>, ArtifactError> {
        match &self.layout {
            ProjectLayout::Truffle { network_id, .. } => {
                artifact
                    .networks
                    .get(&network_id.to_string())
                    .and_then(|deployment| deployment.address.as_deref())
                    .map(parse_address)
                    .transpose()
            }
            ProjectLayout::Brownie {
                deployment_map,
                network,
                ..
            } => {
                let raw = match tokio::fs::read(deployment_map).await {
                    Ok(raw) => raw,
                    Err(err) if err.kind() == ErrorKind::NotFound => {
                        debug!(path = %deployment_map.display(), "no deployment map yet");
                        return Ok(None);
                    }
                    Err(source) => {
                        return Err(ArtifactError::Io {
                            path: deployment_map.clone(),
                            source,
                        });
                    }
                };
                let map: DeploymentMap = serde_json::from_slice(&raw)?;
                map.get(network)
                    .and_then(|contracts| contracts.get(&artifact.contract_name))
                    .and_then(|addresses| addresses.first())
                    .map(|address| parse_address(address))
                    .transpose()
            }
        }
    }

    /// Load each dependency's own bundle from `<Name>.json`. Dependencies of
    /// dependencies are not followed.
    async fn load_dependencies(&self, names: Vec<String>) -> BTreeMap<String, Option<String>> {
        let loaded = join_all(names.iter().map(|name| self.load_bundle(name))).await;
        names.into_iter().zip(loaded).collect()
    }

    async fn load_bundle(&self, name: &str) -> Option<String> {
        let path = self.artifacts_dir().join(format!("{name}.json"));
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(dependency = name, "no artifact for dependency");
                return None;
            }
            Err(err) => {
                warn!(dependency = name, error = %err, "failed to read dependency artifact");
                return None;
            }
        };

        match serde_json::from_slice::<CompiledArtifact>(&raw)
            .and_then(|artifact| ArtifactBundle::from(&artifact).serialize())
        {
            Ok(bundle) => Some(bundle),
            Err(err) => {
                warn!(dependency = name, error = %err, "malformed dependency artifact");
                None
            }
        }
    }
}

/// Every exported symbol other than the contract itself.
fn exported_dependencies(artifact: &CompiledArtifact) -> Result<Vec<String>, ArtifactError> {
    let symbols = artifact
        .ast
        .get("exportedSymbols")
        .and_then(Value::as_object)
        .ok_or(ArtifactError::MissingField("ast.exportedSymbols"))?;
    Ok(symbols
        .keys()
        .filter(|name| **name != artifact.contract_name)
        .cloned()
        .collect())
}

fn parse_address(address: &str) -> Result<Address, ArtifactError> {
    address
        .parse()
        .map_err(|_| ArtifactError::InvalidAddress(address.to_string()))
}
