use std::fmt;
use std::path::PathBuf;

pub const DOCKER_HOST_ENV: &str = "DOCKER_HOST";
pub const DOCKER_CONTEXT_ENV: &str = "DOCKER_CONTEXT";
pub const DOCKER_TLS_VERIFY_ENV: &str = "DOCKER_TLS_VERIFY";
pub const DOCKER_CONFIG_ENV: &str = "DOCKER_CONFIG";
pub const DOCKER_CERT_PATH_ENV: &str = "DOCKER_CERT_PATH";

/// Snapshot of the Docker-related environment, taken once per tool call.
///
/// Empty values are stored as `None` so that `DOCKER_HOST=` behaves like an
/// unset variable. Any other value, whitespace included, counts as set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DockerEnv {
    pub host: Option<String>,
    pub context: Option<String>,
    pub tls_verify: bool,
    pub config_dir: Option<PathBuf>,
    pub cert_path: Option<PathBuf>,
}

impl DockerEnv {
    /// Reads the current process environment.
    pub fn capture() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the snapshot through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        Self {
            host: non_empty(DOCKER_HOST_ENV),
            context: non_empty(DOCKER_CONTEXT_ENV),
            tls_verify: non_empty(DOCKER_TLS_VERIFY_ENV).is_some(),
            config_dir: non_empty(DOCKER_CONFIG_ENV).map(PathBuf::from),
            cert_path: non_empty(DOCKER_CERT_PATH_ENV).map(PathBuf::from),
        }
    }

    #[cfg(test)]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    #[cfg(test)]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Directory holding the docker CLI configuration (`contexts/` lives here).
    pub fn docker_config_dir(&self) -> Option<PathBuf> {
        self.config_dir
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(".docker")))
    }

    /// Client certificates for TLS hosts: `DOCKER_CERT_PATH`, else the config directory.
    pub fn cert_dir(&self) -> Option<PathBuf> {
        self.cert_path.clone().or_else(|| self.docker_config_dir())
    }
}

/// Where the Docker client should connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    /// The platform default socket or named pipe.
    Local,
    /// An explicit endpoint from `DOCKER_HOST`.
    RemoteHost(String),
    /// A docker CLI context from `DOCKER_CONTEXT`.
    NamedContext(String),
}

impl ConnectionTarget {
    /// `DOCKER_HOST` takes priority over `DOCKER_CONTEXT`; neither means local.
    pub fn resolve(env: &DockerEnv) -> Self {
        if let Some(host) = &env.host {
            ConnectionTarget::RemoteHost(host.clone())
        } else if let Some(context) = &env.context {
            ConnectionTarget::NamedContext(context.clone())
        } else {
            ConnectionTarget::Local
        }
    }

    /// Short label of the connection mode.
    pub fn mode(&self) -> &'static str {
        match self {
            ConnectionTarget::Local => "local",
            ConnectionTarget::RemoteHost(_) => "remote-host",
            ConnectionTarget::NamedContext(_) => "named-context",
        }
    }

    /// Host URL or context name; `None` for the local socket.
    pub fn value(&self) -> Option<&str> {
        match self {
            ConnectionTarget::Local => None,
            ConnectionTarget::RemoteHost(host) => Some(host),
            ConnectionTarget::NamedContext(name) => Some(name),
        }
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionTarget::Local => write!(f, "local Docker socket"),
            ConnectionTarget::RemoteHost(host) => write!(f, "remote host {host}"),
            ConnectionTarget::NamedContext(name) => write!(f, "context '{name}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(host: Option<&str>, context: Option<&str>) -> DockerEnv {
        DockerEnv::from_lookup(|key| match key {
            DOCKER_HOST_ENV => host.map(str::to_string),
            DOCKER_CONTEXT_ENV => context.map(str::to_string),
            _ => None,
        })
    }

    #[test]
    fn priority_holds_for_every_combination() {
        let cases = [
            (None, None, ConnectionTarget::Local),
            (
                Some("tcp://10.0.0.5:2375"),
                None,
                ConnectionTarget::RemoteHost("tcp://10.0.0.5:2375".into()),
            ),
            (
                None,
                Some("staging"),
                ConnectionTarget::NamedContext("staging".into()),
            ),
            (
                Some("unix:///run/docker.sock"),
                Some("staging"),
                ConnectionTarget::RemoteHost("unix:///run/docker.sock".into()),
            ),
        ];

        for (host, context, expected) in cases {
            let target = ConnectionTarget::resolve(&env(host, context));
            assert_eq!(target, expected, "host={host:?} context={context:?}");
        }
    }

    #[test]
    fn ssh_host_wins_over_context() {
        let target = ConnectionTarget::resolve(&env(Some("ssh://user@host"), Some("ctx1")));
        assert_eq!(target.mode(), "remote-host");
        assert_eq!(target.value(), Some("ssh://user@host"));
    }

    #[test]
    fn empty_values_count_as_unset() {
        assert_eq!(
            ConnectionTarget::resolve(&env(Some(""), Some("ctx1"))),
            ConnectionTarget::NamedContext("ctx1".into())
        );
        assert_eq!(
            ConnectionTarget::resolve(&env(Some(""), Some(""))),
            ConnectionTarget::Local
        );
    }

    #[test]
    fn whitespace_host_still_counts_as_set() {
        assert_eq!(
            ConnectionTarget::resolve(&env(Some(" "), Some("ctx1"))),
            ConnectionTarget::RemoteHost(" ".into())
        );
        assert_eq!(
            ConnectionTarget::resolve(&env(None, Some(" "))),
            ConnectionTarget::NamedContext(" ".into())
        );
    }

    #[test]
    fn local_target_carries_no_value() {
        let target = ConnectionTarget::resolve(&DockerEnv::default());
        assert_eq!(target, ConnectionTarget::Local);
        assert_eq!(target.value(), None);
        assert_eq!(target.to_string(), "local Docker socket");
    }

    #[test]
    fn tls_verify_and_config_dir_are_captured() {
        let env = DockerEnv::from_lookup(|key| match key {
            DOCKER_TLS_VERIFY_ENV => Some("1".to_string()),
            DOCKER_CONFIG_ENV => Some("/etc/docker-cli".to_string()),
            _ => None,
        });
        assert!(env.tls_verify);
        assert_eq!(env.docker_config_dir(), Some(PathBuf::from("/etc/docker-cli")));
        assert_eq!(env.cert_dir(), Some(PathBuf::from("/etc/docker-cli")));

        let env = DockerEnv {
            cert_path: Some(PathBuf::from("/certs")),
            ..env
        };
        assert_eq!(env.cert_dir(), Some(PathBuf::from("/certs")));
    }
}
