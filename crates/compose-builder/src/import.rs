//! Document → model
//!
//! Reconstructs [Service]s, [Network]s and [Volume]s from an existing compose document.
//!
//! Import is best effort: a field with an unexpected shape is skipped (and logged) and takes its
//! default, it never fails the whole import. Where the document format allows two encodings of the
//! same collection (`environment` as list or map, `volumes` as strings or objects) the detected
//! encoding is recorded in the service's syntax selector so that rendering the imported model
//! reproduces it.
use crate::model::{
    CollectionSyntax, ConfigMount, Healthcheck, IpamPool, KeyValue, Network, PortMapping,
    Protocol, ResourceSpec, RestartPolicy, Service, Ulimit, Volume, VolumeMapping,
};
use crate::util::{command_to_string, split_key_value};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value as Yaml};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("not a valid YAML document")]
    Yaml(#[from] serde_yaml::Error),
    #[error("the document root is not a mapping")]
    NotAMapping,
}

/// Everything [import_document] could reconstruct
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportedDocument {
    pub services: Vec<Service>,
    pub networks: Vec<Network>,
    pub volumes: Vec<Volume>,
}

/// Parse `text` and import it
///
/// An empty document imports as an empty [ImportedDocument].
pub fn import_str(text: &str) -> Result<ImportedDocument, ImportError> {
    let document: Yaml = serde_yaml::from_str(text)?;
    import_document(&document)
}

/// Import an already parsed document
pub fn import_document(document: &Yaml) -> Result<ImportedDocument, ImportError> {
    let root = match document {
        Yaml::Null => return Ok(ImportedDocument::default()),
        Yaml::Mapping(root) => root,
        _ => return Err(ImportError::NotAMapping),
    };

    let services = entries(root.get("services"))
        .map(|(name, service)| import_service(name, service))
        .collect();

    let networks = entries(root.get("networks"))
        .map(|(name, network)| import_network(name, network))
        .collect();

    let volumes = entries(root.get("volumes"))
        .map(|(name, volume)| import_volume(name, volume))
        .collect();

    let imported = ImportedDocument {
        services,
        networks,
        volumes,
    };

    tracing::debug!(
        services = imported.services.len(),
        networks = imported.networks.len(),
        volumes = imported.volumes.len(),
        "imported document"
    );

    Ok(imported)
}

fn import_service(name: String, raw: &Yaml) -> Service {
    let mut service = Service::named(name, text(raw.get("image")));
    let get = |key: &str| raw.get(key);

    service.container_name = text(get("container_name"));
    service.command = command(get("command"));
    service.entrypoint = command(get("entrypoint"));
    service.restart = restart(&service.name, get("restart"));
    service.ports = sequence(get("ports")).filter_map(port).collect();
    service.expose = strings(get("expose"));

    if let Some(volumes) = get("volumes").and_then(Yaml::as_sequence) {
        if volumes.first().is_some_and(Yaml::is_mapping) {
            service.volumes_syntax = CollectionSyntax::Dict;
        }
        service.volumes = volumes.iter().filter_map(volume_mapping).collect();
    }

    match get("environment") {
        Some(Yaml::Sequence(_)) => service.environment_syntax = CollectionSyntax::Array,
        Some(Yaml::Mapping(_)) => service.environment_syntax = CollectionSyntax::Dict,
        _ => {}
    }
    service.environment = key_values(get("environment"));

    service.healthcheck = match get("healthcheck") {
        None | Some(Yaml::Null) => None,
        Some(Yaml::Mapping(healthcheck)) => Some(Healthcheck {
            test: command(healthcheck.get("test")),
            interval: text(healthcheck.get("interval")),
            timeout: text(healthcheck.get("timeout")),
            retries: text(healthcheck.get("retries")),
            start_period: text(healthcheck.get("start_period")),
            start_interval: text(healthcheck.get("start_interval")),
        }),
        Some(other) => {
            tracing::warn!(service = %service.name, ?other, "ignoring healthcheck that is not a mapping");
            None
        }
    };

    service.depends_on = names(get("depends_on"));
    service.env_file = strings(get("env_file")).join(",");
    service.extra_hosts = match get("extra_hosts") {
        Some(Yaml::Mapping(hosts)) => hosts
            .iter()
            .map(|(host, ip)| format!("{}:{}", text(Some(host)), text(Some(ip))))
            .collect(),
        other => strings(other),
    };
    service.dns = strings(get("dns"));
    service.networks = names(get("networks"));
    service.user = text(get("user"));
    service.working_dir = text(get("working_dir"));
    service.labels = key_values(get("labels"));
    service.privileged = flag(get("privileged"));
    service.read_only = flag(get("read_only"));
    service.shm_size = text(get("shm_size"));
    service.security_opt = strings(get("security_opt"));
    service.network_mode = text(get("network_mode"));
    service.cap_add = strings(get("cap_add"));
    service.cap_drop = strings(get("cap_drop"));
    service.sysctls = key_values(get("sysctls"));
    service.devices = strings(get("devices"));
    service.tmpfs = match get("tmpfs") {
        Some(Yaml::Mapping(mounts)) => mounts
            .iter()
            .map(|(path, options)| match text(Some(options)) {
                options if options.is_empty() => text(Some(path)),
                options => format!("{}:{options}", text(Some(path))),
            })
            .collect(),
        other => strings(other),
    };
    service.ulimits = entries(get("ulimits"))
        .map(|(name, limit)| ulimit(name, limit))
        .collect();
    service.init = flag(get("init"));
    service.stop_grace_period = text(get("stop_grace_period"));
    service.stop_signal = text(get("stop_signal"));
    service.tty = flag(get("tty"));
    service.stdin_open = flag(get("stdin_open"));
    service.hostname = text(get("hostname"));
    service.domainname = text(get("domainname"));
    service.mac_address = text(get("mac_address"));
    service.ipc_mode = text(get("ipc"));
    service.pid = text(get("pid"));
    service.uts = text(get("uts"));
    service.cgroup_parent = text(get("cgroup_parent"));
    service.isolation = text(get("isolation"));
    service.configs = sequence(get("configs")).map(config_mount).collect();

    if let Some(resources) = get("deploy").and_then(|deploy| deploy.get("resources")) {
        service.resources.limits = resource_spec(resources.get("limits"));
        service.resources.reservations = resource_spec(resources.get("reservations"));
    }

    service
}

fn import_network(name: String, raw: &Yaml) -> Network {
    let mut network = Network::named(name);

    network.driver = text(raw.get("driver"));
    network.driver_opts = key_values(raw.get("driver_opts"));
    network.attachable = flag(raw.get("attachable")).unwrap_or_default();
    network.labels = key_values(raw.get("labels"));
    (network.external, network.external_name) = external(raw.get("external"));
    network.internal = flag(raw.get("internal")).unwrap_or_default();
    network.enable_ipv6 = flag(raw.get("enable_ipv6")).unwrap_or_default();

    if let Some(ipam) = raw.get("ipam") {
        network.ipam.driver = text(ipam.get("driver"));
        network.ipam.config = sequence(ipam.get("config"))
            .map(|pool| IpamPool::new(text(pool.get("subnet")), text(pool.get("gateway"))))
            .collect();
        network.ipam.options = key_values(ipam.get("options"));
    }

    network
}

fn import_volume(name: String, raw: &Yaml) -> Volume {
    let mut volume = Volume::named(name);

    volume.driver = text(raw.get("driver"));
    volume.driver_opts = key_values(raw.get("driver_opts"));
    volume.labels = key_values(raw.get("labels"));
    (volume.external, volume.external_name) = external(raw.get("external"));

    if let Some(driver_opts) = raw.get("driver_opts") {
        volume.driver_opts_type = text(driver_opts.get("type"));
        volume.driver_opts_device = text(driver_opts.get("device"));
        volume.driver_opts_o = text(driver_opts.get("o"));
    }

    volume
}

/// Scalar as string, `null` and anything not a scalar as the empty string
fn text(value: Option<&Yaml>) -> String {
    match value {
        Some(Yaml::String(s)) => s.clone(),
        Some(Yaml::Number(n)) => n.to_string(),
        Some(Yaml::Bool(b)) => b.to_string(),
        Some(Yaml::Tagged(tagged)) => text(Some(&tagged.value)),
        Some(Yaml::Null) | None => String::new(),
        Some(other) => {
            tracing::debug!(?other, "expected a scalar");
            String::new()
        }
    }
}

/// `(name, value)` pairs of a mapping, nothing for anything else
fn entries(value: Option<&Yaml>) -> impl Iterator<Item = (String, &Yaml)> {
    value
        .and_then(Yaml::as_mapping)
        .into_iter()
        .flat_map(Mapping::iter)
        .map(|(key, value)| (text(Some(key)), value))
}

fn sequence(value: Option<&Yaml>) -> impl Iterator<Item = &Yaml> {
    value.and_then(Yaml::as_sequence).into_iter().flatten()
}

/// List of scalars, a single scalar is a list of one
fn strings(value: Option<&Yaml>) -> Vec<String> {
    match value {
        Some(Yaml::Sequence(items)) => items.iter().map(|item| text(Some(item))).collect(),
        Some(Yaml::Null) | None => vec![],
        Some(scalar) => vec![text(Some(scalar))],
    }
}

/// List of names, or the keys of a mapping (`depends_on: {db: {condition: ...}}`)
fn names(value: Option<&Yaml>) -> Vec<String> {
    match value {
        Some(Yaml::Mapping(_)) => entries(value).map(|(name, _)| name).collect(),
        other => strings(other),
    }
}

/// `KEY=value` list or `KEY: value` mapping
fn key_values(value: Option<&Yaml>) -> Vec<KeyValue> {
    match value {
        Some(Yaml::Mapping(_)) => entries(value)
            .map(|(key, value)| KeyValue::new(key, text(Some(value))))
            .collect(),
        other => sequence(other)
            .map(|entry| split_key_value(&text(Some(entry))))
            .collect(),
    }
}

/// Exec form is stored as a JSON array, shell form verbatim
fn command(value: Option<&Yaml>) -> String {
    match value {
        Some(Yaml::Sequence(args)) => {
            let args: Vec<String> = args.iter().map(|arg| text(Some(arg))).collect();
            command_to_string(&args)
        }
        other => text(other),
    }
}

fn flag(value: Option<&Yaml>) -> Option<bool> {
    match value {
        Some(Yaml::Bool(flag)) => Some(*flag),
        Some(Yaml::Null) | None => None,
        Some(other) => {
            tracing::warn!(?other, "ignoring non-boolean flag");
            None
        }
    }
}

fn restart(service: &str, value: Option<&Yaml>) -> Option<RestartPolicy> {
    let policy = text(value);
    if policy.is_empty() {
        return None;
    }

    match policy.parse() {
        Ok(policy) => Some(policy),
        Err(error) => {
            tracing::warn!(service, %error, "ignoring restart policy");
            None
        }
    }
}

/// `"[ip:]host:container[/protocol]"`, a bare port number or the long form
fn port(value: &Yaml) -> Option<PortMapping> {
    let (host, container, protocol) = match value {
        Yaml::Mapping(_) => (
            text(value.get("published")),
            text(value.get("target")),
            text(value.get("protocol")),
        ),
        Yaml::String(_) | Yaml::Number(_) => {
            let raw = text(Some(value));
            let (ports, protocol) = match raw.split_once('/') {
                Some((ports, protocol)) => (ports, protocol),
                None => (raw.as_str(), ""),
            };

            let (host, container) = match ports.rsplit_once(':') {
                // the ip (if any) is dropped
                Some((host, container)) => (host.rsplit(':').next().unwrap_or(host), container),
                None => ("", ports),
            };

            (host.to_string(), container.to_string(), protocol.to_string())
        }
        other => {
            tracing::warn!(?other, "ignoring port of unknown shape");
            return None;
        }
    };

    let protocol = protocol.parse().unwrap_or_else(|error| {
        tracing::warn!(%error, "ignoring port protocol");
        Protocol::None
    });

    Some(PortMapping::new(host, container, protocol))
}

/// `"host:container[:ro]"`, a bare container path or `{source, target, read_only}`
fn volume_mapping(value: &Yaml) -> Option<VolumeMapping> {
    match value {
        Yaml::Mapping(_) => Some(VolumeMapping::new(
            text(value.get("source")),
            text(value.get("target")),
            flag(value.get("read_only")).unwrap_or_default(),
        )),
        Yaml::String(raw) => {
            let mut parts = raw.split(':');
            let first = parts.next().unwrap_or_default();

            Some(match parts.next() {
                None => VolumeMapping::new("", first, false),
                Some(container) => VolumeMapping::new(first, container, parts.next() == Some("ro")),
            })
        }
        other => {
            tracing::warn!(?other, "ignoring volume of unknown shape");
            None
        }
    }
}

/// `nofile: 65536` sets both limits
fn ulimit(name: String, value: &Yaml) -> Ulimit {
    match value {
        Yaml::Mapping(_) => Ulimit {
            name,
            soft: text(value.get("soft")),
            hard: text(value.get("hard")),
        },
        scalar => {
            let limit = text(Some(scalar));
            Ulimit {
                name,
                soft: limit.clone(),
                hard: limit,
            }
        }
    }
}

fn resource_spec(value: Option<&Yaml>) -> ResourceSpec {
    ResourceSpec {
        cpus: text(value.and_then(|spec| spec.get("cpus"))),
        memory: text(value.and_then(|spec| spec.get("memory"))),
    }
}

/// short form is just the config name
fn config_mount(value: &Yaml) -> ConfigMount {
    match value {
        Yaml::Mapping(_) => ConfigMount::new(text(value.get("source")), text(value.get("target"))),
        scalar => ConfigMount::new(text(Some(scalar)), ""),
    }
}

/// `external: true` or `external: {name: <external name>}`
fn external(value: Option<&Yaml>) -> (bool, String) {
    match value {
        Some(Yaml::Bool(external)) => (*external, String::new()),
        Some(external @ Yaml::Mapping(_)) => (true, text(external.get("name"))),
        _ => (false, String::new()),
    }
}
