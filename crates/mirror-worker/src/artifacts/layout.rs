use crate::config::Workspace;
use std::path::{
    Path,
    PathBuf,
};

const TRUFFLE_CONFIGS: [&str; 2] = ["truffle-config.js", "truffle.js"];
const BROWNIE_CONFIG: &str = "brownie-config.yaml";

/// Build layout of the watched project, with what its address lookup needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectLayout {
    /// Artifacts embed deployed addresses under `networks.<id>.address`.
    Truffle {
        artifacts_dir: PathBuf,
        network_id: u64,
    },
    /// Addresses live in a separate `network -> contract -> [address]` map,
    /// newest deployment first.
    Brownie {
        artifacts_dir: PathBuf,
        deployment_map: PathBuf,
        network: String,
    },
}

impl ProjectLayout {
    /// Inspect `root` for a known build tool configuration.
    pub fn detect(root: &Path, workspace: &Workspace) -> Option<Self> {
        if TRUFFLE_CONFIGS.iter().any(|name| root.join(name).is_file()) {
            return Some(Self::Truffle {
                artifacts_dir: root.join("build").join("contracts"),
                network_id: workspace.network_id,
            });
        }
        if root.join(BROWNIE_CONFIG).is_file() {
            return Some(Self::Brownie {
                artifacts_dir: root.join("build").join("contracts"),
                deployment_map: root.join("build").join("deployments").join("map.json"),
                network: workspace.network_id.to_string(),
            });
        }
        None
    }

    pub fn artifacts_dir(&self) -> &Path {
        match self {
            Self::Truffle { artifacts_dir, .. } | Self::Brownie { artifacts_dir, .. } => artifacts_dir,
        }
    }
}
