//! Model types
//!
//! The in-memory representation the caller (usually a form) edits field by field. Text fields
//! hold raw user input, an empty string means "not set". Flags that distinguish "unset" from
//! `false` are `Option<bool>`.
//!
//! Every type has an all-empty [Default] which is the constructor for new entities.
use serde::{Deserialize, Serialize};

/// Ordered key/value pair as entered in a form
///
/// Duplicate keys are allowed and kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
#[serde(default)]
pub struct KeyValue {
    #[new(into)]
    pub key: String,
    #[new(into)]
    pub value: String,
}

/// Selects how a collection is written to the document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionSyntax {
    /// list of strings (`KEY=value`, `host:container`)
    #[default]
    Array,
    /// map (`KEY: value`) or list of objects (`{type, source, target}`)
    Dict,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    None,
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            Protocol::None => None,
            Protocol::Tcp => Some("tcp"),
            Protocol::Udp => Some("udp"),
        }
    }
}

impl std::str::FromStr for Protocol {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "none" => Ok(Protocol::None),
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    No,
    Always,
    OnFailure,
    UnlessStopped,
}

impl RestartPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestartPolicy::No => "no",
            RestartPolicy::Always => "always",
            RestartPolicy::OnFailure => "on-failure",
            RestartPolicy::UnlessStopped => "unless-stopped",
        }
    }
}

impl std::str::FromStr for RestartPolicy {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no" => Ok(RestartPolicy::No),
            "always" => Ok(RestartPolicy::Always),
            "on-failure" => Ok(RestartPolicy::OnFailure),
            "unless-stopped" => Ok(RestartPolicy::UnlessStopped),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown variant `{0}`")]
pub struct UnknownVariant(pub String);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
#[serde(default)]
pub struct PortMapping {
    #[new(into)]
    pub host: String,
    #[new(into)]
    pub container: String,
    pub protocol: Protocol,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
#[serde(default)]
pub struct VolumeMapping {
    /// host path or named volume
    #[new(into)]
    pub host: String,
    #[new(into)]
    pub container: String,
    pub read_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Healthcheck {
    /// command, JSON array or shell form
    pub test: String,
    pub interval: String,
    pub timeout: String,
    pub retries: String,
    pub start_period: String,
    pub start_interval: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ulimit {
    pub name: String,
    pub soft: String,
    pub hard: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceSpec {
    /// decimal, e.g. `0.5`
    pub cpus: String,
    /// size, e.g. `512m`
    pub memory: String,
}

impl ResourceSpec {
    pub fn is_empty(&self) -> bool {
        self.cpus.is_empty() && self.memory.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resources {
    pub limits: ResourceSpec,
    pub reservations: ResourceSpec,
}

impl Resources {
    pub fn is_empty(&self) -> bool {
        self.limits.is_empty() && self.reservations.is_empty()
    }
}

/// Reference from a service to a top-level `configs` entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
#[serde(default)]
pub struct ConfigMount {
    #[new(into)]
    pub source: String,
    #[new(into)]
    pub target: String,
}

/// One deployable unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Service {
    /// unique key, `[a-z0-9_-]+`
    pub name: String,
    pub image: String,
    pub container_name: String,
    pub ports: Vec<PortMapping>,
    /// bare port numbers
    pub expose: Vec<String>,
    pub volumes: Vec<VolumeMapping>,
    pub environment: Vec<KeyValue>,
    pub environment_syntax: CollectionSyntax,
    pub volumes_syntax: CollectionSyntax,
    /// JSON array (`["npm", "start"]`) or shell form (`npm start`)
    pub command: String,
    pub restart: Option<RestartPolicy>,
    pub healthcheck: Option<Healthcheck>,
    pub depends_on: Vec<String>,
    pub entrypoint: String,
    /// comma separated file names
    pub env_file: String,
    pub extra_hosts: Vec<String>,
    pub dns: Vec<String>,
    pub networks: Vec<String>,
    pub user: String,
    pub working_dir: String,
    pub labels: Vec<KeyValue>,
    pub privileged: Option<bool>,
    pub read_only: Option<bool>,
    pub shm_size: String,
    pub security_opt: Vec<String>,
    pub network_mode: String,
    pub cap_add: Vec<String>,
    pub cap_drop: Vec<String>,
    pub sysctls: Vec<KeyValue>,
    pub devices: Vec<String>,
    pub tmpfs: Vec<String>,
    pub ulimits: Vec<Ulimit>,
    pub init: Option<bool>,
    pub stop_grace_period: String,
    pub stop_signal: String,
    pub tty: Option<bool>,
    pub stdin_open: Option<bool>,
    pub hostname: String,
    pub domainname: String,
    pub mac_address: String,
    pub ipc_mode: String,
    pub pid: String,
    pub uts: String,
    pub cgroup_parent: String,
    pub isolation: String,
    pub configs: Vec<ConfigMount>,
    pub resources: Resources,
}

impl Service {
    pub fn named(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
#[serde(default)]
pub struct IpamPool {
    #[new(into)]
    pub subnet: String,
    #[new(into)]
    pub gateway: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ipam {
    pub driver: String,
    pub config: Vec<IpamPool>,
    pub options: Vec<KeyValue>,
}

impl Ipam {
    pub fn is_empty(&self) -> bool {
        self.driver.is_empty() && self.config.is_empty() && self.options.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Network {
    pub name: String,
    pub driver: String,
    pub driver_opts: Vec<KeyValue>,
    pub attachable: bool,
    pub labels: Vec<KeyValue>,
    pub external: bool,
    /// name of the external network if it differs from `name`
    pub external_name: String,
    pub internal: bool,
    pub enable_ipv6: bool,
    pub ipam: Ipam,
}

impl Network {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Volume {
    pub name: String,
    pub driver: String,
    pub driver_opts: Vec<KeyValue>,
    pub labels: Vec<KeyValue>,
    pub external: bool,
    pub external_name: String,
    /// `driver_opts.type`
    pub driver_opts_type: String,
    /// `driver_opts.device`
    pub driver_opts_device: String,
    /// `driver_opts.o`
    pub driver_opts_o: String,
}

impl Volume {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}
