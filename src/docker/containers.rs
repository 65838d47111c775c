use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use bollard::container::LogOutput;
use bollard::models::{ContainerCreateBody, HostConfig, PortBinding};
use bollard::query_parameters::{
    CreateContainerOptions, InspectContainerOptions, ListContainersOptions, LogsOptions,
    StartContainerOptions, StatsOptions,
};
use futures::StreamExt;

use crate::docker::client::DockerClient;
use crate::models::PortMapping;
use crate::report::{ContainerLine, ContainerReport, StatsReport};

/// Everything needed to create and start a detached container.
#[derive(Debug, Clone, Default)]
pub struct ContainerSpec {
    pub image: String,
    pub name: Option<String>,
    pub ports: Vec<PortMapping>,
    pub env: Vec<String>,
    pub binds: Vec<String>,
}

impl ContainerSpec {
    /// Engine request body: env, exposed ports, port bindings and binds.
    pub fn to_create_body(&self) -> ContainerCreateBody {
        let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
        let mut exposed_ports: HashMap<String, HashMap<(), ()>> = HashMap::new();
        for port in &self.ports {
            let key = port.container_key();
            exposed_ports.entry(key.clone()).or_default();
            port_bindings
                .entry(key)
                .or_insert_with(|| Some(Vec::new()))
                .get_or_insert_with(Vec::new)
                .push(PortBinding {
                    host_ip: None,
                    host_port: Some(port.host_port.to_string()),
                });
        }

        let host_config = HostConfig {
            port_bindings: if port_bindings.is_empty() {
                None
            } else {
                Some(port_bindings)
            },
            binds: if self.binds.is_empty() {
                None
            } else {
                Some(self.binds.clone())
            },
            ..Default::default()
        };

        ContainerCreateBody {
            image: Some(self.image.clone()),
            env: if self.env.is_empty() {
                None
            } else {
                Some(self.env.clone())
            },
            exposed_ports: if exposed_ports.is_empty() {
                None
            } else {
                Some(exposed_ports)
            },
            host_config: Some(host_config),
            ..Default::default()
        }
    }
}

/// Identity of a freshly started container.
#[derive(Debug, Clone)]
pub struct CreatedContainer {
    pub id: String,
    pub name: String,
}

/// Service for container operations on one engine
pub struct ContainerService<'a> {
    client: &'a DockerClient,
}

impl<'a> ContainerService<'a> {
    /// Wraps a client for container calls.
    pub fn new(client: &'a DockerClient) -> Self {
        Self { client }
    }

    /// Creates the container and starts it detached, like `docker run -d`.
    pub async fn run(&self, spec: &ContainerSpec) -> Result<CreatedContainer> {
        let options = spec.name.as_ref().map(|name| CreateContainerOptions {
            name: Some(name.clone()),
            ..Default::default()
        });

        let response = self
            .client
            .docker()
            .create_container(options, spec.to_create_body())
            .await
            .with_context(|| format!("Failed to create container from image {}", spec.image))?;

        tracing::debug!(container = %response.id, image = %spec.image, "created container");

        self.client
            .docker()
            .start_container(&response.id, None::<StartContainerOptions>)
            .await
            .with_context(|| format!("Failed to start container {}", response.id))?;

        let name = match &spec.name {
            Some(name) => name.clone(),
            None => self.inspect(&response.id).await?.name,
        };

        Ok(CreatedContainer {
            id: response.id,
            name,
        })
    }

    /// Last `tail` lines of stdout and stderr, interleaved as the engine sends them.
    pub async fn logs(&self, container: &str, tail: u64) -> Result<String> {
        let options = LogsOptions {
            stdout: true,
            stderr: true,
            tail: tail.to_string(),
            ..Default::default()
        };

        let mut stream = self.client.docker().logs(container, Some(options));
        let mut logs = String::new();
        while let Some(chunk) = stream.next().await {
            let message = match chunk.with_context(|| format!("Failed to read logs of {container}"))? {
                LogOutput::StdOut { message }
                | LogOutput::StdErr { message }
                | LogOutput::StdIn { message }
                | LogOutput::Console { message } => message,
            };
            logs.push_str(&String::from_utf8_lossy(&message));
        }
        Ok(logs)
    }

    /// All containers, including stopped ones.
    pub async fn list(&self) -> Result<Vec<ContainerLine>> {
        let options = ListContainersOptions {
            all: true,
            ..Default::default()
        };

        let containers = self
            .client
            .docker()
            .list_containers(Some(options))
            .await
            .context("Failed to list containers")?;

        Ok(containers.into_iter().map(ContainerLine::from).collect())
    }

    /// Inspects a container by name or ID.
    pub async fn inspect(&self, container: &str) -> Result<ContainerReport> {
        let details = self
            .client
            .docker()
            .inspect_container(container, None::<InspectContainerOptions>)
            .await
            .with_context(|| format!("Failed to inspect container {container}"))?;

        Ok(ContainerReport::from(details))
    }

    /// One stats sample; the engine fills `precpu_stats` so CPU usage can be computed.
    pub async fn stats(&self, container: &str) -> Result<StatsReport> {
        let options = StatsOptions {
            stream: false,
            ..Default::default()
        };

        let mut stream = self.client.docker().stats(container, Some(options));
        let sample = stream
            .next()
            .await
            .ok_or_else(|| anyhow!("No stats returned for container {container}"))?
            .with_context(|| format!("Failed to read stats of {container}"))?;

        Ok(StatsReport::from(sample))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Protocol;

    #[test]
    fn create_body_publishes_ports_and_binds() {
        let spec = ContainerSpec {
            image: "nginx:latest".into(),
            name: Some("web".into()),
            ports: vec![
                PortMapping {
                    host_port: 8080,
                    container_port: 80,
                    protocol: Protocol::Tcp,
                },
                PortMapping {
                    host_port: 8081,
                    container_port: 80,
                    protocol: Protocol::Tcp,
                },
                PortMapping {
                    host_port: 5353,
                    container_port: 53,
                    protocol: Protocol::Udp,
                },
            ],
            env: vec!["MODE=prod".into()],
            binds: vec!["/host/data:/usr/share/nginx/html:ro".into()],
        };

        let body = spec.to_create_body();
        assert_eq!(body.image.as_deref(), Some("nginx:latest"));
        assert_eq!(body.env, Some(vec!["MODE=prod".to_string()]));

        let mut exposed: Vec<String> = body.exposed_ports.clone().unwrap().into_keys().collect();
        exposed.sort();
        assert_eq!(exposed, vec!["53/udp".to_string(), "80/tcp".to_string()]);

        let host_config = body.host_config.unwrap();
        let bindings = host_config.port_bindings.unwrap();
        let web: Vec<String> = bindings["80/tcp"]
            .as_ref()
            .unwrap()
            .iter()
            .filter_map(|b| b.host_port.clone())
            .collect();
        assert_eq!(web, vec!["8080", "8081"]);
        assert_eq!(
            host_config.binds,
            Some(vec!["/host/data:/usr/share/nginx/html:ro".to_string()])
        );
    }

    #[test]
    fn empty_spec_leaves_optional_fields_unset() {
        let body = ContainerSpec {
            image: "alpine".into(),
            ..Default::default()
        }
        .to_create_body();

        assert!(body.env.is_none());
        assert!(body.exposed_ports.is_none());
        let host_config = body.host_config.unwrap();
        assert!(host_config.port_bindings.is_none());
        assert!(host_config.binds.is_none());
    }
}
