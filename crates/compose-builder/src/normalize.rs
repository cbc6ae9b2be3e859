//! Model → document tree
//!
//! Turns the raw form values of the model into the [Value] tree the emitter renders. This is
//! where fields are dropped (anything empty or unset becomes [Value::Absent]), collection syntax
//! is picked per service and strings are split or joined into their document shape.
//!
//! Key order within every object is fixed by the order of construction below.
use crate::model::{
    CollectionSyntax, KeyValue, Network, PortMapping, Resources, Service, Ulimit, Volume,
    VolumeMapping,
};
use crate::util::{parse_command, split_list};
use crate::value::Value;
use crate::vpn::{apply_vpn, ServiceRewrite, VpnConfig};
use indexmap::IndexMap;

/// Build the complete document tree
///
/// Top-level keys: `services`, `configs`, `networks`, `volumes`. Entities with an empty name are
/// skipped. The VPN overlay (if any) adds its sidecar after the user's services and rewrites
/// the services routed through it.
pub fn normalize(
    services: &[Service],
    networks: &[Network],
    volumes: &[Volume],
    vpn: Option<&VpnConfig>,
) -> Value {
    let overlay = vpn
        .map(|vpn| apply_vpn(vpn, services, networks, volumes))
        .unwrap_or_default();

    let mut compose_services = IndexMap::new();
    for service in named(services, |service| &service.name) {
        let rewrite = overlay.rewrite_for(&service.name);
        compose_services.insert(service.name.clone(), normalize_service(service, rewrite));
    }

    if let Some(sidecar) = &overlay.service {
        compose_services.insert(sidecar.name.clone(), normalize_service(sidecar, None));
    }

    let compose_networks: IndexMap<String, Value> =
        named(networks.iter().chain(&overlay.networks), |network| &network.name)
            .map(|network| (network.name.clone(), normalize_network(network)))
            .collect();

    let compose_volumes: IndexMap<String, Value> =
        named(volumes.iter().chain(&overlay.volumes), |volume| &volume.name)
            .map(|volume| (volume.name.clone(), normalize_volume(volume)))
            .collect();

    tracing::debug!(
        services = compose_services.len(),
        networks = compose_networks.len(),
        volumes = compose_volumes.len(),
        configs = overlay.configs.len(),
        "normalized document"
    );

    let mut document = IndexMap::new();
    document.insert("services".to_string(), Value::Object(compose_services));
    document.insert("configs".to_string(), Value::object(overlay.configs));
    document.insert("networks".to_string(), Value::object(compose_networks));
    document.insert("volumes".to_string(), Value::object(compose_volumes));

    Value::Object(document)
}

/// Entities with a non-empty name
fn named<'a, T: 'a>(
    entities: impl IntoIterator<Item = &'a T>,
    name: impl Fn(&T) -> &String,
) -> impl Iterator<Item = &'a T> {
    entities
        .into_iter()
        .filter(move |entity| !name(*entity).is_empty())
}

/// A single service
///
/// Always an object, even if every field is empty (`web: {}`).
pub fn normalize_service(service: &Service, rewrite: Option<&ServiceRewrite>) -> Value {
    let mut out = IndexMap::new();
    let mut set = |key: &str, value: Value| {
        out.insert(key.to_string(), value);
    };

    let network_mode = match rewrite {
        Some(ServiceRewrite::NetworkMode(mode)) => Some(mode.as_str()),
        _ => None,
    };

    set("image", Value::text(&service.image));
    set("container_name", Value::text(&service.container_name));
    set("command", command(&service.command));
    set("restart", service.restart.map(|restart| restart.as_str()).into());
    set(
        "ports",
        match network_mode {
            Some(_) => Value::Absent,
            None => Value::array(service.ports.iter().filter_map(port).collect()),
        },
    );
    set("expose", Value::list(&service.expose));
    set(
        "network_mode",
        match network_mode {
            Some(mode) => mode.into(),
            None => Value::text(&service.network_mode),
        },
    );
    set("volumes", volumes(&service.volumes, service.volumes_syntax));
    set(
        "environment",
        environment(&service.environment, service.environment_syntax),
    );
    set(
        "healthcheck",
        service
            .healthcheck
            .as_ref()
            .filter(|healthcheck| !healthcheck.test.trim().is_empty())
            .map(|healthcheck| {
                [
                    ("test", command(&healthcheck.test)),
                    ("interval", Value::text(&healthcheck.interval)),
                    ("timeout", Value::text(&healthcheck.timeout)),
                    ("retries", Value::text(&healthcheck.retries)),
                    ("start_period", Value::text(&healthcheck.start_period)),
                    ("start_interval", Value::text(&healthcheck.start_interval)),
                ]
                .into_iter()
                .collect::<Value>()
            })
            .into(),
    );
    set("depends_on", Value::list(&service.depends_on));
    set("entrypoint", command(&service.entrypoint));
    set("env_file", Value::list(&split_list(&service.env_file)));
    set("extra_hosts", Value::list(&service.extra_hosts));
    set("dns", Value::list(&service.dns));
    set(
        "networks",
        match rewrite {
            Some(ServiceRewrite::NetworkMode(_)) => Value::Absent,
            Some(ServiceRewrite::Networks(networks)) => Value::list(networks),
            None => Value::list(&service.networks),
        },
    );
    set("user", Value::text(&service.user));
    set("working_dir", Value::text(&service.working_dir));
    set("labels", labels(&service.labels));
    set("privileged", service.privileged.into());
    set("read_only", service.read_only.into());
    set("shm_size", Value::text(&service.shm_size));
    set("security_opt", Value::list(&service.security_opt));
    set("cap_add", Value::list(&service.cap_add));
    set("cap_drop", Value::list(&service.cap_drop));
    set(
        "sysctls",
        Value::object(
            with_key(&service.sysctls)
                .map(|sysctl| (sysctl.key.clone(), Value::text(&sysctl.value)))
                .collect(),
        ),
    );
    set("devices", Value::list(&service.devices));
    set("tmpfs", Value::list(&service.tmpfs));
    set("ulimits", ulimits(&service.ulimits));
    set("init", service.init.into());
    set("stop_grace_period", Value::text(&service.stop_grace_period));
    set("stop_signal", Value::text(&service.stop_signal));
    set("tty", service.tty.into());
    set("stdin_open", service.stdin_open.into());
    set("hostname", Value::text(&service.hostname));
    set("domainname", Value::text(&service.domainname));
    set("mac_address", Value::text(&service.mac_address));
    set("ipc", Value::text(&service.ipc_mode));
    set("pid", Value::text(&service.pid));
    set("uts", Value::text(&service.uts));
    set("cgroup_parent", Value::text(&service.cgroup_parent));
    set("isolation", Value::text(&service.isolation));
    set(
        "configs",
        Value::array(
            service
                .configs
                .iter()
                .filter(|config| !config.source.is_empty())
                .map(|config| {
                    [
                        ("source", Value::text(&config.source)),
                        ("target", Value::text(&config.target)),
                    ]
                    .into_iter()
                    .collect::<Value>()
                })
                .collect(),
        ),
    );
    set("deploy", deploy(&service.resources));

    Value::Object(out)
}

/// Argument list of a `command`-like string, absent if there are no arguments
///
/// Empty arguments are kept: `["echo", ""]` is not `["echo"]`.
fn command(raw: &str) -> Value {
    Value::array(parse_command(raw).into_iter().map(Value::from).collect())
}

/// `host:container[/protocol]`, `container[/protocol]` or nothing without a container port
fn port(mapping: &PortMapping) -> Option<Value> {
    if mapping.container.is_empty() {
        return None;
    }

    let mut port = if mapping.host.is_empty() {
        mapping.container.clone()
    } else {
        format!("{}:{}", mapping.host, mapping.container)
    };

    if let Some(protocol) = mapping.protocol.as_str() {
        port.push('/');
        port.push_str(protocol);
    }

    Some(port.into())
}

fn volumes(mappings: &[VolumeMapping], syntax: CollectionSyntax) -> Value {
    let entries = mappings.iter().filter_map(|mapping| {
        if mapping.container.is_empty() {
            return None;
        }

        let value: Value = match (syntax, mapping.host.is_empty()) {
            (CollectionSyntax::Dict, false) => [
                ("type", Value::from("bind")),
                ("source", mapping.host.as_str().into()),
                ("target", mapping.container.as_str().into()),
                ("read_only", mapping.read_only.then_some(true).into()),
            ]
            .into_iter()
            .collect(),
            // anonymous volume
            (CollectionSyntax::Dict, true) => [
                ("type", Value::from("volume")),
                ("target", mapping.container.as_str().into()),
            ]
            .into_iter()
            .collect(),
            (CollectionSyntax::Array, false) if mapping.read_only => {
                format!("{}:{}:ro", mapping.host, mapping.container).into()
            }
            (CollectionSyntax::Array, false) => {
                format!("{}:{}", mapping.host, mapping.container).into()
            }
            (CollectionSyntax::Array, true) => mapping.container.as_str().into(),
        };

        Some(value)
    });

    Value::array(entries.collect())
}

fn environment(entries: &[KeyValue], syntax: CollectionSyntax) -> Value {
    match syntax {
        CollectionSyntax::Dict => Value::object(
            with_key(entries)
                .map(|entry| (entry.key.clone(), Value::from(entry.value.as_str())))
                .collect(),
        ),
        CollectionSyntax::Array => Value::array(
            with_key(entries)
                .map(|entry| format!("{}={}", entry.key, entry.value).into())
                .collect(),
        ),
    }
}

/// `key=value` list
fn labels(entries: &[KeyValue]) -> Value {
    Value::array(
        with_key(entries)
            .map(|entry| format!("{}={}", entry.key, entry.value).into())
            .collect(),
    )
}

/// key → value map, values kept even if empty
fn key_value_map(entries: &[KeyValue]) -> IndexMap<String, Value> {
    with_key(entries)
        .map(|entry| (entry.key.clone(), Value::from(entry.value.as_str())))
        .collect()
}

fn with_key(entries: &[KeyValue]) -> impl Iterator<Item = &KeyValue> {
    entries.iter().filter(|entry| !entry.key.is_empty())
}

fn ulimits(ulimits: &[Ulimit]) -> Value {
    Value::object(
        ulimits
            .iter()
            .filter(|ulimit| !ulimit.name.is_empty())
            .map(|ulimit| {
                let mut limits = IndexMap::new();
                limits.insert("soft".to_string(), limit(ulimit, "soft", &ulimit.soft));
                limits.insert("hard".to_string(), limit(ulimit, "hard", &ulimit.hard));

                // neither soft nor hard still yields `name: {}`
                (ulimit.name.clone(), Value::Object(limits))
            })
            .collect(),
    )
}

fn limit(ulimit: &Ulimit, which: &str, raw: &str) -> Value {
    let raw = raw.trim();
    if raw.is_empty() {
        return Value::Absent;
    }

    match raw.parse::<i64>() {
        Ok(limit) => limit.into(),
        Err(error) => {
            tracing::warn!(ulimit = %ulimit.name, which, raw, %error, "ignoring non-numeric ulimit");
            Value::Absent
        }
    }
}

fn deploy(resources: &Resources) -> Value {
    if resources.is_empty() {
        return Value::Absent;
    }

    let spec = |cpus: &str, memory: &str| {
        Value::object(
            [
                ("cpus".to_string(), Value::text(cpus)),
                ("memory".to_string(), Value::text(memory)),
            ]
            .into(),
        )
    };

    let resources: Value = [
        (
            "limits",
            spec(&resources.limits.cpus, &resources.limits.memory),
        ),
        (
            "reservations",
            spec(&resources.reservations.cpus, &resources.reservations.memory),
        ),
    ]
    .into_iter()
    .collect();

    [("resources", resources)].into_iter().collect()
}

/// A top-level network
pub fn normalize_network(network: &Network) -> Value {
    let mut out = IndexMap::new();

    if network.external {
        out.insert("external".to_string(), external(&network.external_name));
        return Value::Object(out);
    }

    out.insert("driver".to_string(), Value::text(&network.driver));
    out.insert("attachable".to_string(), only_true(network.attachable));
    out.insert("internal".to_string(), only_true(network.internal));
    out.insert("enable_ipv6".to_string(), only_true(network.enable_ipv6));
    out.insert(
        "driver_opts".to_string(),
        Value::object(key_value_map(&network.driver_opts)),
    );
    out.insert("labels".to_string(), labels(&network.labels));

    let ipam = &network.ipam;
    if !ipam.is_empty() {
        let pools = ipam
            .config
            .iter()
            .map(|pool| {
                Value::object(
                    [
                        ("subnet".to_string(), Value::text(&pool.subnet)),
                        ("gateway".to_string(), Value::text(&pool.gateway)),
                    ]
                    .into(),
                )
            })
            .filter(|pool| !pool.is_absent())
            .collect();

        let value = Value::object(
            [
                ("driver".to_string(), Value::text(&ipam.driver)),
                ("config".to_string(), Value::array(pools)),
                (
                    "options".to_string(),
                    Value::object(key_value_map(&ipam.options)),
                ),
            ]
            .into(),
        );
        out.insert("ipam".to_string(), value);
    }

    Value::Object(out)
}

/// A top-level volume
pub fn normalize_volume(volume: &Volume) -> Value {
    let mut driver_opts = key_value_map(&volume.driver_opts);
    for (key, value) in [
        ("type", &volume.driver_opts_type),
        ("device", &volume.driver_opts_device),
        ("o", &volume.driver_opts_o),
    ] {
        if !value.is_empty() {
            driver_opts.insert(key.to_string(), value.as_str().into());
        }
    }

    let mut out = IndexMap::new();
    if volume.external {
        out.insert("external".to_string(), external(&volume.external_name));
    }
    out.insert("driver".to_string(), Value::text(&volume.driver));
    out.insert("driver_opts".to_string(), Value::object(driver_opts));
    out.insert("labels".to_string(), labels(&volume.labels));

    Value::Object(out)
}

/// `true` or `{name: <external name>}`
fn external(name: &str) -> Value {
    if name.is_empty() {
        true.into()
    } else {
        [("name", name)].into_iter().collect()
    }
}

fn only_true(flag: bool) -> Value {
    flag.then_some(true).into()
}
