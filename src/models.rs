use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Arguments of `create-container`.
#[derive(Debug, Deserialize)]
pub struct CreateContainerArgs {
    pub image: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Host port → container port, e.g. `{"8080": 80, "5353/udp": "53"}`.
    #[serde(default)]
    pub ports: Option<Map<String, Value>>,
    #[serde(default)]
    pub environment: Option<Map<String, Value>>,
    #[serde(default)]
    pub volumes: Option<VolumesArg>,
}

/// Volumes are accepted either as bind specs or as a host → container map.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum VolumesArg {
    Binds(Vec<String>),
    Map(BTreeMap<String, String>),
}

/// Arguments of `deploy-compose`.
#[derive(Debug, Deserialize)]
pub struct DeployComposeArgs {
    pub project_name: String,
    #[serde(default)]
    pub compose_yaml: Option<String>,
    #[serde(default)]
    pub compose_file: Option<PathBuf>,
}

/// Arguments of `get-logs`.
#[derive(Debug, Deserialize)]
pub struct LogsArgs {
    pub container_name: String,
    #[serde(default)]
    pub tail: Option<u64>,
}

/// Arguments of the tools that only need a container reference.
#[derive(Debug, Deserialize)]
pub struct ContainerArgs {
    pub container_name: String,
}

/// Decodes tool arguments, treating a missing `arguments` object as empty.
pub fn parse_args<T: DeserializeOwned>(arguments: &Value) -> Result<T> {
    let value = if arguments.is_null() {
        Value::Object(Map::new())
    } else {
        arguments.clone()
    };
    serde_json::from_value(value).context("Invalid arguments")
}

/// Trims a required string argument and rejects it when blank.
pub fn require_non_empty<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("Missing required {field}");
    }
    Ok(trimmed)
}

/// Compose project names end up in file names and `docker compose -p`.
pub fn validate_project_name(name: &str) -> Result<&str> {
    let name = require_non_empty(name, "project_name")?;
    let valid_start = name
        .chars()
        .next()
        .map(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .unwrap_or(false);
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if !valid_start || !valid_chars {
        bail!(
            "Invalid project_name '{name}': use lowercase letters, digits, '-' and '_', starting with a letter or digit"
        );
    }
    Ok(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            other => Err(anyhow!("Unsupported port protocol '{other}'")),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// One `-p host:container/proto` publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub host_port: u16,
    pub container_port: u16,
    pub protocol: Protocol,
}

impl PortMapping {
    /// The protocol suffix may sit on either side: `{"53/udp": 53}` and
    /// `{"53": "53/udp"}` both publish UDP.
    pub fn parse(host_key: &str, container: &Value) -> Result<Self> {
        let container = match container {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            other => bail!("Invalid container port for host port '{host_key}': {other}"),
        };

        let (host_port, host_proto) = split_protocol(host_key)?;
        let (container_port, container_proto) = split_protocol(&container)?;

        Ok(Self {
            host_port: parse_port(host_port)?,
            container_port: parse_port(container_port)?,
            protocol: host_proto.or(container_proto).unwrap_or(Protocol::Tcp),
        })
    }

    /// Key used by the engine API, e.g. `80/tcp`.
    pub fn container_key(&self) -> String {
        format!("{}/{}", self.container_port, self.protocol)
    }
}

fn split_protocol(spec: &str) -> Result<(&str, Option<Protocol>)> {
    match spec.trim().split_once('/') {
        Some((port, proto)) => Ok((port, Some(Protocol::parse(proto)?))),
        None => Ok((spec.trim(), None)),
    }
}

fn parse_port(port: &str) -> Result<u16> {
    port.trim()
        .parse::<u16>()
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| anyhow!("Invalid port '{port}'"))
}

/// Parses every entry of the `ports` argument.
pub fn parse_port_mappings(ports: &Map<String, Value>) -> Result<Vec<PortMapping>> {
    ports
        .iter()
        .map(|(host, container)| PortMapping::parse(host, container))
        .collect()
}

/// Renders an environment object as `KEY=VALUE` entries.
pub fn environment_entries(environment: &Map<String, Value>) -> Result<Vec<String>> {
    environment
        .iter()
        .map(|(key, value)| {
            if key.is_empty() || key.contains('=') {
                bail!("Invalid environment variable name '{key}'");
            }
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => String::new(),
                other => bail!("Environment variable '{key}' must be a scalar, got {other}"),
            };
            Ok(format!("{key}={value}"))
        })
        .collect()
}

/// Normalizes the volumes argument into engine bind specs (`src:dst[:mode]`).
pub fn volume_binds(volumes: &VolumesArg) -> Result<Vec<String>> {
    let specs: Vec<String> = match volumes {
        VolumesArg::Binds(binds) => binds.iter().map(|b| b.trim().to_string()).collect(),
        VolumesArg::Map(map) => map
            .iter()
            .map(|(host, container)| format!("{}:{}", host.trim(), container.trim()))
            .collect(),
    };

    for spec in &specs {
        let parts: Vec<&str> = spec.split(':').collect();
        let valid = (2..=3).contains(&parts.len()) && parts[..2].iter().all(|p| !p.is_empty());
        if !valid {
            bail!("Invalid volume '{spec}': expected source:target[:mode]");
        }
    }
    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn port_protocol_from_either_side() {
        assert_eq!(
            PortMapping::parse("8080", &json!(80)).unwrap(),
            PortMapping {
                host_port: 8080,
                container_port: 80,
                protocol: Protocol::Tcp
            }
        );
        assert_eq!(
            PortMapping::parse("5353/udp", &json!(53)).unwrap().protocol,
            Protocol::Udp
        );
        let mapping = PortMapping::parse("5353", &json!("53/udp")).unwrap();
        assert_eq!(mapping.protocol, Protocol::Udp);
        assert_eq!(mapping.container_key(), "53/udp");
        assert_eq!(
            PortMapping::parse("8443/tcp", &json!("443")).unwrap().container_key(),
            "443/tcp"
        );
    }

    #[test]
    fn bad_ports_are_rejected() {
        assert!(PortMapping::parse("http", &json!(80)).is_err());
        assert!(PortMapping::parse("8080", &json!(true)).is_err());
        assert!(PortMapping::parse("8080", &json!("80/sctp")).is_err());
        assert!(PortMapping::parse("0", &json!(80)).is_err());
    }

    #[test]
    fn environment_renders_key_value() {
        let env = json!({"POSTGRES_USER": "app", "WORKERS": 4, "DEBUG": false, "EMPTY": null});
        let mut entries = environment_entries(env.as_object().unwrap()).unwrap();
        entries.sort();
        assert_eq!(
            entries,
            vec!["DEBUG=false", "EMPTY=", "POSTGRES_USER=app", "WORKERS=4"]
        );
    }

    #[test]
    fn environment_rejects_nested_values() {
        let env = json!({"CONFIG": {"a": 1}});
        assert!(environment_entries(env.as_object().unwrap()).is_err());
    }

    #[test]
    fn volumes_from_list_and_map() {
        let binds: VolumesArg =
            serde_json::from_value(json!(["/host/data:/usr/share/nginx/html:ro"])).unwrap();
        assert_eq!(
            volume_binds(&binds).unwrap(),
            vec!["/host/data:/usr/share/nginx/html:ro"]
        );

        let map: VolumesArg = serde_json::from_value(json!({"/srv/db": "/var/lib/postgresql/data"})).unwrap();
        assert_eq!(
            volume_binds(&map).unwrap(),
            vec!["/srv/db:/var/lib/postgresql/data"]
        );

        let bad: VolumesArg = serde_json::from_value(json!(["/only-one-side"])).unwrap();
        assert!(volume_binds(&bad).is_err());
    }

    #[test]
    fn create_args_accept_minimal_and_null_fields() {
        let args: CreateContainerArgs =
            parse_args(&json!({"image": "nginx:latest", "ports": null})).unwrap();
        assert_eq!(args.image, "nginx:latest");
        assert!(args.name.is_none());
        assert!(args.ports.is_none());
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let err = parse_args::<ContainerArgs>(&Value::Null).unwrap_err();
        assert!(format!("{err:#}").contains("container_name"));
        assert!(require_non_empty("  ", "container_name").is_err());
    }

    #[test]
    fn project_names_follow_compose_rules() {
        assert_eq!(validate_project_name("web-stack_1").unwrap(), "web-stack_1");
        assert!(validate_project_name("Web").is_err());
        assert!(validate_project_name("../etc").is_err());
        assert!(validate_project_name("-web").is_err());
        assert!(validate_project_name("").is_err());
    }
}
