use std::path::Path;

use anyhow::{Context, Result};
use tokio::process::Command;

use crate::docker::target::ConnectionTarget;

/// Outcome of one `docker compose` invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command exited with status 0.
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Service deploying compose projects through the docker CLI
pub struct ComposeService<'a> {
    docker_bin: &'a str,
    target: &'a ConnectionTarget,
}

impl<'a> ComposeService<'a> {
    /// Compose runner for one docker binary and target.
    pub fn new(docker_bin: &'a str, target: &'a ConnectionTarget) -> Self {
        Self { docker_bin, target }
    }

    /// Global CLI flags that point the docker CLI at the same engine as the API client.
    pub fn target_args(target: &ConnectionTarget) -> Vec<String> {
        match target {
            ConnectionTarget::Local => Vec::new(),
            ConnectionTarget::RemoteHost(host) => vec!["--host".to_string(), host.clone()],
            ConnectionTarget::NamedContext(name) => vec!["--context".to_string(), name.clone()],
        }
    }

    /// Full argument list for one compose action.
    pub fn command_args(&self, compose_path: &Path, project_name: &str, action: &[&str]) -> Vec<String> {
        let mut args = Self::target_args(self.target);
        args.extend([
            "compose".to_string(),
            "-f".to_string(),
            compose_path.to_string_lossy().into_owned(),
            "-p".to_string(),
            project_name.to_string(),
        ]);
        args.extend(action.iter().map(|a| a.to_string()));
        args
    }

    /// Stops and removes the project.
    pub async fn down(&self, compose_path: &Path, project_name: &str) -> Result<CommandOutput> {
        self.run(compose_path, project_name, &["down"]).await
    }

    /// Starts the project detached.
    pub async fn up(&self, compose_path: &Path, project_name: &str) -> Result<CommandOutput> {
        self.run(compose_path, project_name, &["up", "-d"]).await
    }

    /// Lists the services of the project.
    pub async fn ps(&self, compose_path: &Path, project_name: &str) -> Result<CommandOutput> {
        self.run(compose_path, project_name, &["ps"]).await
    }

    async fn run(&self, compose_path: &Path, project_name: &str, action: &[&str]) -> Result<CommandOutput> {
        let args = self.command_args(compose_path, project_name, action);
        tracing::debug!(bin = self.docker_bin, ?args, "running docker compose");

        let mut command = Command::new(self.docker_bin);
        command.args(&args);
        // The flags above select the engine; stale variables would conflict with them.
        if !matches!(self.target, ConnectionTarget::Local) {
            command.env_remove("DOCKER_HOST").env_remove("DOCKER_CONTEXT");
        }

        let output = command
            .output()
            .await
            .with_context(|| format!("Failed to run {} compose {}", self.docker_bin, action.join(" ")))?;

        Ok(CommandOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
