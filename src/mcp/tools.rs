use serde_json::{json, Value};

/// The tools exposed over MCP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    CreateContainer,
    DeployCompose,
    GetLogs,
    ListContainers,
    GetContainerInfo,
    GetContainerStats,
}

impl Tool {
    pub const ALL: [Tool; 6] = [
        Tool::CreateContainer,
        Tool::DeployCompose,
        Tool::GetLogs,
        Tool::ListContainers,
        Tool::GetContainerInfo,
        Tool::GetContainerStats,
    ];

    /// Tool name on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Tool::CreateContainer => "create-container",
            Tool::DeployCompose => "deploy-compose",
            Tool::GetLogs => "get-logs",
            Tool::ListContainers => "list-containers",
            Tool::GetContainerInfo => "get-container-info",
            Tool::GetContainerStats => "get-container-stats",
        }
    }

    /// Looks a tool up by its wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    /// Phrase used in error text, as in "Error listing containers: ...".
    pub fn action(&self) -> &'static str {
        match self {
            Tool::CreateContainer => "creating container",
            Tool::DeployCompose => "deploying compose stack",
            Tool::GetLogs => "retrieving logs",
            Tool::ListContainers => "listing containers",
            Tool::GetContainerInfo => "getting container info",
            Tool::GetContainerStats => "getting container stats",
        }
    }

    /// Description shown to MCP clients.
    pub fn description(&self) -> &'static str {
        match self {
            Tool::CreateContainer => "Create and start a standalone Docker container",
            Tool::DeployCompose => "Deploy a Docker Compose stack",
            Tool::GetLogs => "Retrieve the latest logs for a specified Docker container",
            Tool::ListContainers => "List all Docker containers, including stopped ones",
            Tool::GetContainerInfo => {
                "Get detailed information about a container: ports, environment, volumes and networks"
            }
            Tool::GetContainerStats => "Get a resource usage snapshot (CPU, memory, network) of a container",
        }
    }

    /// JSON schema of the tool arguments.
    pub fn input_schema(&self) -> Value {
        match self {
            Tool::CreateContainer => json!({
                "type": "object",
                "properties": {
                    "image": {"type": "string", "description": "Image to run, e.g. nginx:latest"},
                    "name": {"type": "string", "description": "Optional container name"},
                    "ports": {
                        "type": "object",
                        "description": "Host port to container port, e.g. {\"8080\": 80} or {\"5353/udp\": 53}",
                        "additionalProperties": {"type": ["string", "integer"]}
                    },
                    "environment": {
                        "type": "object",
                        "description": "Environment variables",
                        "additionalProperties": {"type": ["string", "number", "boolean"]}
                    },
                    "volumes": {
                        "description": "Bind mounts as [\"src:dst[:mode]\"] or {\"src\": \"dst[:mode]\"}",
                        "type": ["array", "object"]
                    }
                },
                "required": ["image"]
            }),
            Tool::DeployCompose => json!({
                "type": "object",
                "properties": {
                    "project_name": {"type": "string", "description": "Compose project name"},
                    "compose_yaml": {"type": "string", "description": "Compose file content"},
                    "compose_file": {"type": "string", "description": "Path to an existing compose file"}
                },
                "required": ["project_name"]
            }),
            Tool::GetLogs => json!({
                "type": "object",
                "properties": {
                    "container_name": {"type": "string", "description": "Container name or ID"},
                    "tail": {"type": "integer", "minimum": 1, "description": "Number of lines to return"}
                },
                "required": ["container_name"]
            }),
            Tool::ListContainers => json!({
                "type": "object",
                "properties": {}
            }),
            Tool::GetContainerInfo | Tool::GetContainerStats => json!({
                "type": "object",
                "properties": {
                    "container_name": {"type": "string", "description": "Container name or ID"}
                },
                "required": ["container_name"]
            }),
        }
    }

    /// Entry of the `tools/list` result.
    pub fn definition(&self) -> Value {
        json!({
            "name": self.name(),
            "description": self.description(),
            "inputSchema": self.input_schema(),
        })
    }
}
