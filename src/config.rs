use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Pull policy applied before a container is created, similar to k3s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImagePullPolicy {
    /// Always pull the image from the registry.
    Always,
    /// Pull only when the image is missing locally.
    IfNotPresent,
}

impl Default for ImagePullPolicy {
    fn default() -> Self {
        ImagePullPolicy::IfNotPresent
    }
}

impl ImagePullPolicy {
    /// Parses a policy from a string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "always" => Ok(ImagePullPolicy::Always),
            "ifnotpresent" | "if_not_present" | "if-not-present" => Ok(ImagePullPolicy::IfNotPresent),
            _ => Err(format!("Unknown image pull policy: {}", s)),
        }
    }

    /// Name used in configuration and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ImagePullPolicy::Always => "always",
            ImagePullPolicy::IfNotPresent => "if-not-present",
        }
    }
}

pub const DEFAULT_LOG_TAIL: usize = 100;
pub const DEFAULT_COMPOSE_DIR: &str = "docker_compose_files";

/// Global server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub image_pull_policy: ImagePullPolicy,
    /// Scratch directory where compose files are written before deployment.
    pub compose_dir: PathBuf,
    /// Number of log lines returned when `get-logs` has no `tail` argument.
    pub log_tail: usize,
    /// docker CLI used for compose deployments.
    pub docker_bin: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_pull_policy: ImagePullPolicy::default(),
            compose_dir: default_compose_dir(),
            log_tail: DEFAULT_LOG_TAIL,
            docker_bin: "docker".to_string(),
        }
    }
}

fn default_compose_dir() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(DEFAULT_COMPOSE_DIR)
}

impl Config {
    /// Loads the configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let image_pull_policy = non_empty("DOCKER_MCP_IMAGE_PULL_POLICY")
            .and_then(|s| match ImagePullPolicy::from_str(&s) {
                Ok(policy) => Some(policy),
                Err(e) => {
                    tracing::warn!("{e}, falling back to {}", defaults.image_pull_policy.as_str());
                    None
                }
            })
            .unwrap_or(defaults.image_pull_policy);

        let compose_dir = non_empty("DOCKER_MCP_COMPOSE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.compose_dir);

        let log_tail = non_empty("DOCKER_MCP_LOG_TAIL")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.log_tail);

        let docker_bin = non_empty("DOCKER_MCP_DOCKER_BIN").unwrap_or(defaults.docker_bin);

        Self {
            image_pull_policy,
            compose_dir,
            log_tail,
            docker_bin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn pull_policy_accepts_common_spellings() {
        assert_eq!(ImagePullPolicy::from_str("Always").unwrap(), ImagePullPolicy::Always);
        assert_eq!(
            ImagePullPolicy::from_str("IfNotPresent").unwrap(),
            ImagePullPolicy::IfNotPresent
        );
        assert_eq!(
            ImagePullPolicy::from_str("if-not-present").unwrap(),
            ImagePullPolicy::IfNotPresent
        );
        assert!(ImagePullPolicy::from_str("never").is_err());
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config.image_pull_policy, ImagePullPolicy::IfNotPresent);
        assert_eq!(config.log_tail, DEFAULT_LOG_TAIL);
        assert_eq!(config.docker_bin, "docker");
        assert!(config.compose_dir.ends_with(DEFAULT_COMPOSE_DIR));
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("DOCKER_MCP_IMAGE_PULL_POLICY", "always"),
            ("DOCKER_MCP_COMPOSE_DIR", "/tmp/compose"),
            ("DOCKER_MCP_LOG_TAIL", "25"),
            ("DOCKER_MCP_DOCKER_BIN", "podman"),
        ]));
        assert_eq!(config.image_pull_policy, ImagePullPolicy::Always);
        assert_eq!(config.compose_dir, PathBuf::from("/tmp/compose"));
        assert_eq!(config.log_tail, 25);
        assert_eq!(config.docker_bin, "podman");
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = Config::from_lookup(lookup(&[
            ("DOCKER_MCP_IMAGE_PULL_POLICY", "sometimes"),
            ("DOCKER_MCP_LOG_TAIL", "0"),
        ]));
        assert_eq!(config.image_pull_policy, ImagePullPolicy::IfNotPresent);
        assert_eq!(config.log_tail, DEFAULT_LOG_TAIL);
    }
}
