use std::path::{Path, PathBuf};

use bollard::{Docker, API_DEFAULT_VERSION};
use thiserror::Error;

use crate::docker::context::{DockerContext, DEFAULT_CONTEXT};
use crate::docker::target::{ConnectionTarget, DockerEnv};

/// Request timeout handed to bollard, matching its own defaults.
const TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("unsupported Docker host scheme in '{0}' (expected unix://, npipe://, tcp://, http://, https:// or ssh://)")]
    UnsupportedScheme(String),
    #[error("cannot locate client certificates for TLS endpoint '{0}' (set DOCKER_CERT_PATH)")]
    MissingCertDir(String),
    #[error("Docker context '{}' not found (looked for {})", .name, .path.display())]
    UnknownContext { name: String, path: PathBuf },
    #[error("failed to read Docker context '{name}': {reason}")]
    ContextRead { name: String, reason: String },
    #[error("Docker context '{0}' has no docker endpoint")]
    ContextWithoutHost(String),
    #[error("cannot locate the Docker config directory to resolve context '{0}'")]
    MissingConfigDir(String),
    #[error("failed to connect to Docker daemon: {0}")]
    Engine(#[from] bollard::errors::Error),
}

/// Transport selected from a Docker host URL, following bollard's own
/// `connect_with_defaults` dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Socket(String),
    Http(String),
    /// TLS endpoint with the directory holding `key.pem`, `cert.pem` and `ca.pem`.
    Tls { host: String, cert_dir: PathBuf },
    Ssh(String),
}

impl Endpoint {
    /// Picks the transport for `host`. `tls_verify` turns `tcp://` into TLS,
    /// as `DOCKER_TLS_VERIFY` does for the docker CLI.
    pub fn parse(host: &str, tls_verify: bool, cert_dir: Option<&Path>) -> Result<Self, ConnectError> {
        let host = host.trim();
        let scheme = host.split_once("://").map(|(scheme, _)| scheme.to_lowercase());

        let tls = || match cert_dir {
            Some(dir) => Ok(Endpoint::Tls {
                host: host.to_string(),
                cert_dir: dir.to_path_buf(),
            }),
            None => Err(ConnectError::MissingCertDir(host.to_string())),
        };

        match scheme.as_deref() {
            Some("unix") | Some("npipe") => Ok(Endpoint::Socket(host.to_string())),
            Some("tcp") | Some("http") if tls_verify => tls(),
            Some("tcp") | Some("http") => Ok(Endpoint::Http(host.to_string())),
            Some("https") => tls(),
            Some("ssh") => Ok(Endpoint::Ssh(host.to_string())),
            // A bare path is a socket, as with `docker -H /run/docker.sock`.
            None if host.starts_with('/') => Ok(Endpoint::Socket(host.to_string())),
            _ => Err(ConnectError::UnsupportedScheme(host.to_string())),
        }
    }

    fn connect(&self) -> Result<Docker, ConnectError> {
        let docker = match self {
            Endpoint::Socket(path) => {
                Docker::connect_with_socket(path, TIMEOUT_SECS, API_DEFAULT_VERSION)?
            }
            Endpoint::Http(addr) => {
                Docker::connect_with_http(addr, TIMEOUT_SECS, API_DEFAULT_VERSION)?
            }
            Endpoint::Tls { host, cert_dir } => Docker::connect_with_ssl(
                host,
                &cert_dir.join("key.pem"),
                &cert_dir.join("cert.pem"),
                &cert_dir.join("ca.pem"),
                TIMEOUT_SECS,
                API_DEFAULT_VERSION,
            )?,
            Endpoint::Ssh(addr) => Docker::connect_with_ssh(addr, TIMEOUT_SECS, API_DEFAULT_VERSION)?,
        };
        Ok(docker)
    }
}

/// Docker client built through bollard for one connection target
pub struct DockerClient {
    docker: Docker,
    target: ConnectionTarget,
}

impl DockerClient {
    /// Builds a client for the target. Remote transports send nothing to the
    /// daemon yet, so an unreachable endpoint only shows up on the first request.
    pub fn connect(target: &ConnectionTarget, env: &DockerEnv) -> Result<Self, ConnectError> {
        let docker = match target {
            ConnectionTarget::Local => Docker::connect_with_socket_defaults()?,
            ConnectionTarget::RemoteHost(host) => {
                let cert_dir = env.cert_dir();
                Endpoint::parse(host, env.tls_verify, cert_dir.as_deref())?.connect()?
            }
            ConnectionTarget::NamedContext(name) if name == DEFAULT_CONTEXT => {
                Docker::connect_with_socket_defaults()?
            }
            ConnectionTarget::NamedContext(name) => {
                let config_dir = env
                    .docker_config_dir()
                    .ok_or_else(|| ConnectError::MissingConfigDir(name.clone()))?;
                let context = DockerContext::load(&config_dir, name)?;
                tracing::debug!(context = %context.name, host = %context.host, "resolved docker context");
                let tls_dir = context.tls_dir.as_deref();
                Endpoint::parse(&context.host, tls_dir.is_some(), tls_dir)?.connect()?
            }
        };

        Ok(Self {
            docker,
            target: target.clone(),
        })
    }

    /// Resolves the target from the environment snapshot and connects.
    pub fn from_env(env: &DockerEnv) -> Result<Self, ConnectError> {
        Self::connect(&ConnectionTarget::resolve(env), env)
    }

    /// Returns a reference to the inner Docker client
    pub fn docker(&self) -> &Docker {
        &self.docker
    }

    /// Target this client was built for.
    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }
}
