use std::fmt;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value;

use crate::compose_processor::ComposeProcessor;
use crate::config::Config;
use crate::docker::{
    CommandOutput, ComposeService, ConnectionTarget, ContainerService, ContainerSpec, DockerClient,
    DockerEnv, ImageService,
};
use crate::mcp::tools::Tool;
use crate::models::{
    environment_entries, parse_args, parse_port_mappings, require_non_empty, validate_project_name,
    volume_binds, ContainerArgs, CreateContainerArgs, DeployComposeArgs, LogsArgs,
};

/// Text returned to the caller. Failures are ordinary results with `is_error` set.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

/// Step-by-step notes appended to every tool result.
#[derive(Debug, Default)]
pub struct DebugTrail(Vec<String>);

impl DebugTrail {
    /// Appends one line.
    pub fn push(&mut self, line: impl Into<String>) {
        self.0.push(line.into());
    }

    fn record(&mut self, step: &str, output: &CommandOutput) {
        self.push(format!("\n=== {step} Command ==="));
        self.push(format!("Return Code: {}", output.code));
        self.push(format!("Stdout: {}", output.stdout.trim_end()));
        self.push(format!("Stderr: {}", output.stderr.trim_end()));
    }
}

impl fmt::Display for DebugTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("\n"))
    }
}

impl ToolOutput {
    fn success(text: String, debug: &DebugTrail) -> Self {
        Self {
            text: format!("{text}\n\nDebug Info:\n{debug}"),
            is_error: false,
        }
    }

    fn failure(action: &str, error: &anyhow::Error, debug: &DebugTrail) -> Self {
        tracing::warn!("error {action}: {error:#}");
        Self {
            text: format!("Error {action}: {error:#}\n\nDebug Information:\n{debug}"),
            is_error: true,
        }
    }
}

/// Runs the Docker tools. Every call resolves its own client from a fresh
/// environment snapshot; nothing is shared between calls.
pub struct ToolHandlers {
    config: Config,
    env_override: Option<DockerEnv>,
}

impl ToolHandlers {
    /// Handlers reading the Docker environment on every call.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            env_override: None,
        }
    }

    /// Uses a fixed Docker environment instead of reading the process one.
    #[cfg(test)]
    pub fn with_env(config: Config, env: DockerEnv) -> Self {
        Self {
            config,
            env_override: Some(env),
        }
    }

    fn docker_env(&self) -> DockerEnv {
        self.env_override.clone().unwrap_or_else(DockerEnv::capture)
    }

    fn connect(&self, debug: &mut DebugTrail) -> Result<DockerClient> {
        let env = self.docker_env();
        let target = ConnectionTarget::resolve(&env);
        debug.push(format!("Docker target: {target}"));
        Ok(DockerClient::connect(&target, &env)?)
    }

    /// Runs one tool; failures come back as error text.
    pub async fn call(&self, tool: Tool, arguments: &Value) -> ToolOutput {
        tracing::info!(tool = tool.name(), "tool call");
        let mut debug = DebugTrail::default();
        let result = match tool {
            Tool::CreateContainer => self.create_container(arguments, &mut debug).await,
            Tool::DeployCompose => self.deploy_compose(arguments, &mut debug).await,
            Tool::GetLogs => self.get_logs(arguments, &mut debug).await,
            Tool::ListContainers => self.list_containers(&mut debug).await,
            Tool::GetContainerInfo => self.get_container_info(arguments, &mut debug).await,
            Tool::GetContainerStats => self.get_container_stats(arguments, &mut debug).await,
        };

        match result {
            Ok(text) => ToolOutput::success(text, &debug),
            Err(e) => ToolOutput::failure(tool.action(), &e, &debug),
        }
    }

    async fn create_container(&self, arguments: &Value, debug: &mut DebugTrail) -> Result<String> {
        debug.push(format!("Arguments: {arguments}"));
        let args: CreateContainerArgs = parse_args(arguments)?;
        let image = require_non_empty(&args.image, "image")?.to_string();

        let spec = ContainerSpec {
            name: args
                .name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            ports: args
                .ports
                .as_ref()
                .map(parse_port_mappings)
                .transpose()?
                .unwrap_or_default(),
            env: args
                .environment
                .as_ref()
                .map(environment_entries)
                .transpose()?
                .unwrap_or_default(),
            binds: args
                .volumes
                .as_ref()
                .map(volume_binds)
                .transpose()?
                .unwrap_or_default(),
            image,
        };

        let client = self.connect(debug)?;

        let images = ImageService::new(&client, self.config.image_pull_policy);
        if images.pull_image(&spec.image).await? {
            debug.push(format!("Pulled image {}", spec.image));
        } else {
            debug.push(format!("Image {} already present", spec.image));
        }

        let created = ContainerService::new(&client).run(&spec).await?;
        debug.push(format!("Started container {}", created.id));

        Ok(format!(
            "Created container '{}' (ID: {})",
            created.name, created.id
        ))
    }

    async fn deploy_compose(&self, arguments: &Value, debug: &mut DebugTrail) -> Result<String> {
        let args: DeployComposeArgs = parse_args(arguments)?;
        let project_name = validate_project_name(&args.project_name)?;

        let inline = args.compose_yaml.as_deref().filter(|yaml| !yaml.trim().is_empty());
        let content = match (inline, &args.compose_file) {
            (Some(yaml), _) => yaml.to_string(),
            (None, Some(path)) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read compose file {}", path.display()))?,
            (None, None) => bail!("Missing required compose_yaml or compose_file"),
        };

        debug.push("=== Original YAML ===");
        debug.push(content.trim_end());
        let value = ComposeProcessor::parse(&content)?;
        let images = ComposeProcessor::extract_images(&value);
        debug.push(format!("\nImages referenced: {}", images.join(", ")));

        let env = self.docker_env();
        let target = ConnectionTarget::resolve(&env);
        debug.push(format!("Docker target: {target}"));

        // A file given by path is deployed in place so relative build contexts keep working.
        if inline.is_none() {
            if let Some(path) = &args.compose_file {
                return self.deploy_stack(path, project_name, &target, debug).await;
            }
        }

        let compose_path = ComposeProcessor::save(&self.config.compose_dir, project_name, &value)?;
        debug.push(format!("Compose file written to {}", compose_path.display()));

        let result = self.deploy_stack(&compose_path, project_name, &target, debug).await;
        ComposeProcessor::cleanup(&compose_path);
        result
    }

    async fn deploy_stack(
        &self,
        compose_path: &Path,
        project_name: &str,
        target: &ConnectionTarget,
        debug: &mut DebugTrail,
    ) -> Result<String> {
        let compose = ComposeService::new(&self.config.docker_bin, target);

        // Tearing down a project that never existed is expected to fail.
        match compose.down(compose_path, project_name).await {
            Ok(output) => debug.record("Down", &output),
            Err(e) => debug.push(format!("Warning during down: {e:#}")),
        }

        let up = compose.up(compose_path, project_name).await?;
        debug.record("Up", &up);
        if !up.success() {
            bail!("Deploy failed with code {}: {}", up.code, up.stderr.trim());
        }

        let services = match compose.ps(compose_path, project_name).await {
            Ok(output) if output.success() => output.stdout,
            _ => "Unable to list services".to_string(),
        };

        tracing::info!(project = project_name, "deployed compose stack");
        Ok(format!(
            "Successfully deployed compose stack '{project_name}'\nRunning services:\n{}",
            services.trim_end()
        ))
    }

    async fn get_logs(&self, arguments: &Value, debug: &mut DebugTrail) -> Result<String> {
        let args: LogsArgs = parse_args(arguments)?;
        let container = require_non_empty(&args.container_name, "container_name")?;
        let tail = args
            .tail
            .filter(|n| *n > 0)
            .unwrap_or(self.config.log_tail as u64);

        debug.push(format!("Fetching last {tail} log lines for container '{container}'"));
        let client = self.connect(debug)?;
        let logs = ContainerService::new(&client).logs(container, tail).await?;

        Ok(format!("Logs for container '{container}':\n{}", logs.trim_end()))
    }

    async fn list_containers(&self, debug: &mut DebugTrail) -> Result<String> {
        debug.push("Listing all Docker containers");
        let client = self.connect(debug)?;
        let containers = ContainerService::new(&client).list().await?;
        debug.push(format!("Found {} containers", containers.len()));

        Ok(crate::report::render_container_list(&containers))
    }

    async fn get_container_info(&self, arguments: &Value, debug: &mut DebugTrail) -> Result<String> {
        let args: ContainerArgs = parse_args(arguments)?;
        let container = require_non_empty(&args.container_name, "container_name")?;

        debug.push(format!("Getting detailed info for container '{container}'"));
        let client = self.connect(debug)?;
        let report = ContainerService::new(&client).inspect(container).await?;

        Ok(report.render())
    }

    async fn get_container_stats(&self, arguments: &Value, debug: &mut DebugTrail) -> Result<String> {
        let args: ContainerArgs = parse_args(arguments)?;
        let container = require_non_empty(&args.container_name, "container_name")?;

        debug.push(format!("Sampling resource usage of container '{container}'"));
        let client = self.connect(debug)?;
        let stats = ContainerService::new(&client).stats(container).await?;

        Ok(stats.render())
    }
}
