//! Text rendering of the data returned by the Docker Engine.

use std::collections::BTreeMap;

use bollard::models::{ContainerInspectResponse, ContainerStatsResponse, ContainerSummary};

const NOT_AVAILABLE: &str = "N/A";

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Engine enums serialize to their wire names, e.g. `running` or `bind`.
fn wire_name<T: serde::Serialize>(value: &T) -> Option<String> {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_lowercase))
        .filter(|v| !v.is_empty())
}

/// Flattened view of `docker inspect` for the info report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerReport {
    pub name: String,
    pub id: String,
    pub status: String,
    pub image: String,
    pub created: Option<String>,
    pub started: Option<String>,
    pub env: Vec<String>,
    pub ports: Vec<PortEntry>,
    pub mounts: Vec<MountEntry>,
    pub networks: Vec<NetworkEntry>,
    pub memory_bytes: Option<i64>,
    pub cpu_shares: Option<i64>,
    pub working_dir: Option<String>,
    pub command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortEntry {
    /// Engine key such as `80/tcp`.
    pub container_port: String,
    /// `(host ip, host port)` pairs; empty when the port is exposed but unbound.
    pub bindings: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MountEntry {
    pub kind: String,
    pub source: String,
    pub destination: String,
    pub mode: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkEntry {
    pub name: String,
    pub ip_address: Option<String>,
}

impl From<ContainerInspectResponse> for ContainerReport {
    fn from(details: ContainerInspectResponse) -> Self {
        let state = details.state.as_ref();
        let config = details.config.as_ref();
        let host_config = details.host_config.as_ref();
        let network_settings = details.network_settings.as_ref();

        let mut ports: Vec<PortEntry> = network_settings
            .and_then(|n| n.ports.as_ref())
            .map(|ports| {
                ports
                    .iter()
                    .map(|(container_port, bindings)| PortEntry {
                        container_port: container_port.clone(),
                        bindings: bindings
                            .iter()
                            .flatten()
                            .map(|b| {
                                (
                                    non_empty(b.host_ip.clone()).unwrap_or_else(|| "0.0.0.0".to_string()),
                                    b.host_port.clone().unwrap_or_default(),
                                )
                            })
                            .collect(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        ports.sort_by(|a, b| a.container_port.cmp(&b.container_port));

        let networks: BTreeMap<String, Option<String>> = network_settings
            .and_then(|n| n.networks.as_ref())
            .map(|networks| {
                networks
                    .iter()
                    .map(|(name, endpoint)| (name.clone(), non_empty(endpoint.ip_address.clone())))
                    .collect()
            })
            .unwrap_or_default();

        let mounts = details
            .mounts
            .as_ref()
            .map(|mounts| {
                mounts
                    .iter()
                    .map(|m| MountEntry {
                        kind: m
                            .typ
                            .as_ref()
                            .and_then(wire_name)
                            .unwrap_or_else(|| "unknown".to_string()),
                        source: non_empty(m.source.clone()).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                        destination: non_empty(m.destination.clone())
                            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                        mode: non_empty(m.mode.clone()).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: details
                .name
                .clone()
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            id: details.id.clone().unwrap_or_default(),
            status: state
                .and_then(|s| s.status.as_ref())
                .and_then(wire_name)
                .unwrap_or_else(|| "unknown".to_string()),
            image: config.and_then(|c| c.image.clone()).unwrap_or_default(),
            created: details.created.as_ref().map(|c| c.to_string()),
            started: state.and_then(|s| s.started_at.as_ref()).map(|t| t.to_string()),
            env: config.and_then(|c| c.env.clone()).unwrap_or_default(),
            ports,
            mounts,
            networks: networks
                .into_iter()
                .map(|(name, ip_address)| NetworkEntry { name, ip_address })
                .collect(),
            memory_bytes: host_config.and_then(|h| h.memory),
            cpu_shares: host_config.and_then(|h| h.cpu_shares),
            working_dir: non_empty(config.and_then(|c| c.working_dir.clone())),
            command: config.and_then(|c| c.cmd.clone()).unwrap_or_default(),
        }
    }
}

impl ContainerReport {
    /// Sectioned text report of the container.
    pub fn render(&self) -> String {
        let mut lines = vec![
            "=== Container Information ===".to_string(),
            format!("Name: {}", self.name),
            format!("ID: {}", self.id),
            format!("Status: {}", self.status),
            format!("Image: {}", self.image),
            format!("Created: {}", self.created.as_deref().unwrap_or(NOT_AVAILABLE)),
            format!("Started: {}", self.started.as_deref().unwrap_or(NOT_AVAILABLE)),
            String::new(),
            "=== Environment Variables ===".to_string(),
        ];

        if self.env.is_empty() {
            lines.push("  No environment variables set".to_string());
        } else {
            lines.extend(self.env.iter().map(|var| format!("  {var}")));
        }

        lines.extend([String::new(), "=== Port Mappings ===".to_string()]);
        if self.ports.is_empty() {
            lines.push("  No port mappings".to_string());
        }
        for port in &self.ports {
            if port.bindings.is_empty() {
                lines.push(format!("  {} (not bound to host)", port.container_port));
            }
            for (host_ip, host_port) in &port.bindings {
                lines.push(format!("  {host_ip}:{host_port} -> {}", port.container_port));
            }
        }

        lines.extend([String::new(), "=== Volume Mounts ===".to_string()]);
        if self.mounts.is_empty() {
            lines.push("  No volume mounts".to_string());
        }
        for mount in &self.mounts {
            lines.push(format!(
                "  {}: {} -> {} ({})",
                mount.kind, mount.source, mount.destination, mount.mode
            ));
        }

        lines.extend([String::new(), "=== Network Settings ===".to_string()]);
        if self.networks.is_empty() {
            lines.push("  No network information available".to_string());
        }
        for network in &self.networks {
            lines.push(format!(
                "  Network: {} (IP: {})",
                network.name,
                network.ip_address.as_deref().unwrap_or(NOT_AVAILABLE)
            ));
        }

        lines.extend([String::new(), "=== Resource Limits ===".to_string()]);
        match self.memory_bytes.filter(|m| *m > 0) {
            Some(memory) => lines.push(format!(
                "  Memory Limit: {:.0}MB",
                memory as f64 / (1024.0 * 1024.0)
            )),
            None => lines.push("  Memory Limit: Not set".to_string()),
        }
        match self.cpu_shares.filter(|c| *c > 0) {
            Some(shares) => lines.push(format!("  CPU Shares: {shares}")),
            None => lines.push("  CPU Shares: Not set".to_string()),
        }

        lines.extend([String::new(), "=== Working Directory & Command ===".to_string()]);
        lines.push(format!(
            "  Working Dir: {}",
            self.working_dir.as_deref().unwrap_or(NOT_AVAILABLE)
        ));
        if self.command.is_empty() {
            lines.push(format!("  Command: {NOT_AVAILABLE}"));
        } else {
            lines.push(format!("  Command: {}", self.command.join(" ")));
        }

        lines.join("\n")
    }
}

/// One row of `list-containers`.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerLine {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: String,
    pub status: String,
}

impl From<ContainerSummary> for ContainerLine {
    fn from(summary: ContainerSummary) -> Self {
        let name = summary
            .names
            .as_ref()
            .and_then(|names| names.first())
            .map(|n| n.trim_start_matches('/').to_string())
            .unwrap_or_default();

        Self {
            id: summary.id.clone().unwrap_or_default(),
            name,
            image: summary.image.clone().unwrap_or_default(),
            state: summary
                .state
                .as_ref()
                .and_then(wire_name)
                .unwrap_or_else(|| "unknown".to_string()),
            status: summary.status.clone().unwrap_or_default(),
        }
    }
}

/// Report of `list-containers`.
pub fn render_container_list(containers: &[ContainerLine]) -> String {
    let mut lines = vec!["All Docker Containers:".to_string()];
    if containers.is_empty() {
        lines.push("  No containers found".to_string());
    }
    for c in containers {
        let short_id: String = c.id.chars().take(12).collect();
        let mut line = format!("{short_id} - {} - {} - {}", c.name, c.image, c.state);
        if !c.status.is_empty() {
            line.push_str(&format!(" ({})", c.status));
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// A single resource usage sample, computed the way `docker stats` does.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsReport {
    pub name: String,
    pub cpu_percent: f64,
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub net_rx: u64,
    pub net_tx: u64,
    pub pids: Option<u64>,
}

impl From<ContainerStatsResponse> for StatsReport {
    fn from(stats: ContainerStatsResponse) -> Self {
        let cpu = stats.cpu_stats.as_ref();
        let precpu = stats.precpu_stats.as_ref();

        let cpu_total = cpu
            .and_then(|c| c.cpu_usage.as_ref())
            .and_then(|u| u.total_usage)
            .unwrap_or_default() as f64;
        let precpu_total = precpu
            .and_then(|c| c.cpu_usage.as_ref())
            .and_then(|u| u.total_usage)
            .unwrap_or_default() as f64;
        let system = cpu.and_then(|c| c.system_cpu_usage).unwrap_or_default() as f64;
        let presystem = precpu.and_then(|c| c.system_cpu_usage).unwrap_or_default() as f64;
        let online_cpus = cpu
            .and_then(|c| c.online_cpus)
            .map(|n| n as f64)
            .or_else(|| {
                cpu.and_then(|c| c.cpu_usage.as_ref())
                    .and_then(|u| u.percpu_usage.as_ref())
                    .map(|per| per.len() as f64)
            })
            .filter(|n| *n > 0.0)
            .unwrap_or(1.0);

        let memory = stats.memory_stats.as_ref();
        let raw_usage = memory.and_then(|m| m.usage).unwrap_or_default() as u64;
        // cgroup v2 reports inactive_file, v1 reports total_inactive_file / cache
        let cache = memory
            .and_then(|m| m.stats.as_ref())
            .and_then(|s| {
                s.get("inactive_file")
                    .or_else(|| s.get("total_inactive_file"))
                    .or_else(|| s.get("cache"))
            })
            .map(|v| *v as u64)
            .unwrap_or_default();

        let (net_rx, net_tx) = stats
            .networks
            .as_ref()
            .map(|networks| {
                networks.values().fold((0u64, 0u64), |(rx, tx), n| {
                    (
                        rx + n.rx_bytes.unwrap_or_default() as u64,
                        tx + n.tx_bytes.unwrap_or_default() as u64,
                    )
                })
            })
            .unwrap_or_default();

        Self {
            name: stats
                .name
                .clone()
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            cpu_percent: cpu_percent(cpu_total - precpu_total, system - presystem, online_cpus),
            memory_usage: raw_usage.saturating_sub(cache),
            memory_limit: memory.and_then(|m| m.limit).unwrap_or_default() as u64,
            net_rx,
            net_tx,
            pids: stats
                .pids_stats
                .as_ref()
                .and_then(|p| p.current)
                .map(|n| n as u64),
        }
    }
}

/// CPU usage in percent of one CPU, times the number of online CPUs.
pub fn cpu_percent(cpu_delta: f64, system_delta: f64, online_cpus: f64) -> f64 {
    if cpu_delta > 0.0 && system_delta > 0.0 {
        cpu_delta / system_delta * online_cpus * 100.0
    } else {
        0.0
    }
}

impl StatsReport {
    /// Memory usage relative to the limit.
    pub fn memory_percent(&self) -> f64 {
        if self.memory_limit == 0 {
            0.0
        } else {
            self.memory_usage as f64 / self.memory_limit as f64 * 100.0
        }
    }

    /// Text report of the sample.
    pub fn render(&self) -> String {
        [
            "=== Container Stats ===".to_string(),
            format!("Name: {}", self.name),
            format!("CPU: {:.2}%", self.cpu_percent),
            format!(
                "Memory: {} / {} ({:.2}%)",
                format_bytes(self.memory_usage),
                format_bytes(self.memory_limit),
                self.memory_percent()
            ),
            format!(
                "Network I/O: {} received / {} sent",
                format_bytes(self.net_rx),
                format_bytes(self.net_tx)
            ),
            format!(
                "PIDs: {}",
                self.pids
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string())
            ),
        ]
        .join("\n")
    }
}

/// Human readable size in binary units.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes}B")
    } else {
        format!("{value:.2}{}", UNITS[unit])
    }
}
