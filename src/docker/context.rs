//! Lookup of docker CLI contexts stored under `<config>/contexts/meta`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::docker::ConnectError;

/// Name of the built-in context that always points at the local daemon.
pub const DEFAULT_CONTEXT: &str = "default";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContextMeta {
    name: String,
    #[serde(default)]
    endpoints: Endpoints,
}

#[derive(Debug, Default, Deserialize)]
struct Endpoints {
    docker: Option<DockerEndpoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DockerEndpoint {
    host: Option<String>,
}

/// A named context resolved to its Docker endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerContext {
    pub name: String,
    pub host: String,
    /// Client certificates stored with the context (`ca.pem`, `cert.pem`, `key.pem`).
    pub tls_dir: Option<PathBuf>,
}

impl DockerContext {
    /// Reads the context definition the same way the docker CLI does: the
    /// metadata directory is named after the SHA-256 digest of the context name.
    pub fn load(config_dir: &Path, name: &str) -> Result<Self, ConnectError> {
        let meta_path = meta_path(config_dir, name);
        if !meta_path.exists() {
            return Err(ConnectError::UnknownContext {
                name: name.to_string(),
                path: meta_path,
            });
        }

        let content = fs::read_to_string(&meta_path).map_err(|e| ConnectError::ContextRead {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        let meta: ContextMeta =
            serde_json::from_str(&content).map_err(|e| ConnectError::ContextRead {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        let host = meta
            .endpoints
            .docker
            .and_then(|endpoint| endpoint.host)
            .filter(|host| !host.is_empty())
            .ok_or_else(|| ConnectError::ContextWithoutHost(name.to_string()))?;

        let tls_dir = tls_path(config_dir, name);
        Ok(Self {
            name: meta.name,
            host,
            tls_dir: tls_dir.is_dir().then_some(tls_dir),
        })
    }
}

/// Directory name the docker CLI uses for a context.
pub fn context_digest(name: &str) -> String {
    hex::encode(Sha256::digest(name.as_bytes()))
}

fn meta_path(config_dir: &Path, name: &str) -> PathBuf {
    config_dir
        .join("contexts")
        .join("meta")
        .join(context_digest(name))
        .join("meta.json")
}

fn tls_path(config_dir: &Path, name: &str) -> PathBuf {
    config_dir
        .join("contexts")
        .join("tls")
        .join(context_digest(name))
        .join("docker")
}
