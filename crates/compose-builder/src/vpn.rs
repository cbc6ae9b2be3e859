//! VPN / tunnel sidecars
//!
//! A [VpnConfig] selects at most one provider. When enabled, [apply_vpn] produces a
//! [VpnOverlay]: one synthesized sidecar [Service] plus whatever networks, volumes and top-level
//! configs that sidecar needs, and a [ServiceRewrite] for each service that opted in.
//!
//! Two providers (tailscale, cloudflared) take over the network namespace of opted in services:
//! they lose their own `ports`/`networks` and get `network_mode: service:<sidecar>`. Newt attaches
//! them to its external network instead. The remaining providers only add the sidecar.
//!
//! Secrets never end up in the document. A configured secret is written as a `${VAR}`
//! placeholder, an unset one is left out. Whether required secrets are present is checked by
//! [crate::validate::validate_vpn], not here.
use crate::model::{
    CollectionSyntax, ConfigMount, KeyValue, Network, RestartPolicy, Service, Volume,
    VolumeMapping,
};
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Name of the top-level config holding the tailscale serve payload
pub const SERVE_CONFIG_NAME: &str = "serve-config";
const SERVE_CONFIG_TARGET: &str = "/etc/tailscale/serve.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VpnConfig {
    pub enabled: bool,
    pub provider: Option<VpnProvider>,
    /// names of the services routed through the tunnel
    pub services: Vec<String>,
}

impl VpnConfig {
    /// Switch provider, settings of the previous provider are discarded
    ///
    /// Selecting the current provider again keeps its settings.
    pub fn select(&mut self, kind: VpnKind) {
        if self.kind() == kind {
            return;
        }

        tracing::debug!(from = %self.kind(), to = %kind, "switching vpn provider");
        self.provider = VpnProvider::with_defaults(kind);
        self.enabled = self.provider.is_some();
    }

    pub fn kind(&self) -> VpnKind {
        self.provider
            .as_ref()
            .map(VpnProvider::kind)
            .unwrap_or(VpnKind::None)
    }

    /// Enabled and a provider is selected
    pub fn active(&self) -> Option<&VpnProvider> {
        self.provider.as_ref().filter(|_| self.enabled)
    }

    pub fn uses_vpn(&self, service: &str) -> bool {
        self.services.iter().any(|name| name == service)
    }
}

/// Tag of [VpnProvider]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VpnKind {
    #[default]
    None,
    Tailscale,
    Newt,
    Cloudflared,
    Wireguard,
    Zerotier,
    Netbird,
}

impl std::fmt::Display for VpnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VpnKind::None => f.write_str("none"),
            VpnKind::Tailscale => f.write_str("tailscale"),
            VpnKind::Newt => f.write_str("newt"),
            VpnKind::Cloudflared => f.write_str("cloudflared"),
            VpnKind::Wireguard => f.write_str("wireguard"),
            VpnKind::Zerotier => f.write_str("zerotier"),
            VpnKind::Netbird => f.write_str("netbird"),
        }
    }
}

/// Provider together with its settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VpnProvider {
    Tailscale(TailscaleConfig),
    Newt(NewtConfig),
    Cloudflared(CloudflaredConfig),
    Wireguard(WireguardConfig),
    Zerotier(ZerotierConfig),
    Netbird(NetbirdConfig),
}

impl VpnProvider {
    pub fn with_defaults(kind: VpnKind) -> Option<Self> {
        Some(match kind {
            VpnKind::None => return None,
            VpnKind::Tailscale => VpnProvider::Tailscale(Default::default()),
            VpnKind::Newt => VpnProvider::Newt(Default::default()),
            VpnKind::Cloudflared => VpnProvider::Cloudflared(Default::default()),
            VpnKind::Wireguard => VpnProvider::Wireguard(Default::default()),
            VpnKind::Zerotier => VpnProvider::Zerotier(Default::default()),
            VpnKind::Netbird => VpnProvider::Netbird(Default::default()),
        })
    }

    pub fn kind(&self) -> VpnKind {
        match self {
            VpnProvider::Tailscale(_) => VpnKind::Tailscale,
            VpnProvider::Newt(_) => VpnKind::Newt,
            VpnProvider::Cloudflared(_) => VpnKind::Cloudflared,
            VpnProvider::Wireguard(_) => VpnKind::Wireguard,
            VpnProvider::Zerotier(_) => VpnKind::Zerotier,
            VpnProvider::Netbird(_) => VpnKind::Netbird,
        }
    }

    /// The sidecar is named after the provider
    pub fn service_name(&self) -> String {
        self.kind().to_string()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServeProtocol {
    #[default]
    Https,
    Http,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TailscaleConfig {
    pub auth_key: String,
    pub hostname: String,
    pub accept_dns: bool,
    pub auth_once: bool,
    pub userspace: bool,
    pub exit_node: String,
    pub exit_node_allow_lan: bool,
    pub enable_serve: bool,
    pub cert_domain: String,
    pub serve_target_service: String,
    pub serve_external_port: String,
    pub serve_internal_port: String,
    pub serve_path: String,
    pub serve_protocol: ServeProtocol,
}

impl Default for TailscaleConfig {
    fn default() -> Self {
        Self {
            auth_key: String::new(),
            hostname: String::new(),
            accept_dns: false,
            auth_once: true,
            userspace: false,
            exit_node: String::new(),
            exit_node_allow_lan: false,
            enable_serve: false,
            cert_domain: String::new(),
            serve_target_service: String::new(),
            serve_external_port: "443".to_string(),
            serve_internal_port: "8080".to_string(),
            serve_path: "/".to_string(),
            serve_protocol: ServeProtocol::Https,
        }
    }
}

impl TailscaleConfig {
    /// Serve needs a target service
    pub fn serves(&self) -> bool {
        self.enable_serve && !self.serve_target_service.is_empty()
    }

    /// `tailscale serve` configuration (JSON)
    ///
    /// Proxies `serve_path` on `serve_external_port` to `serve_internal_port` on localhost, the
    /// namespace shared with the target service.
    pub fn serve_config(&self) -> String {
        use serde_json::{json, Map, Value as Json};

        let handlers = |path: &str| {
            let mut handlers = Map::new();
            handlers.insert(
                path.to_string(),
                json!({ "Proxy": format!("http://127.0.0.1:{}", self.serve_internal_port) }),
            );
            Json::Object(handlers)
        };

        let mut port = Map::new();
        let mut config = Map::new();
        match self.serve_protocol {
            ServeProtocol::Https => {
                port.insert(self.serve_external_port.clone(), json!({ "HTTPS": true }));
                config.insert("TCP".to_string(), Json::Object(port));

                let domain = if self.cert_domain.is_empty() {
                    "${TS_CERT_DOMAIN}"
                } else {
                    &self.cert_domain
                };

                let mut site = Map::new();
                site.insert("Handlers".to_string(), handlers(&self.serve_path));

                let mut web = Map::new();
                web.insert(
                    format!("{domain}:{}", self.serve_external_port),
                    Json::Object(site),
                );
                config.insert("Web".to_string(), Json::Object(web));
            }
            ServeProtocol::Http => {
                let mut entry = Map::new();
                entry.insert("HTTP".to_string(), Json::Bool(true));
                entry.insert("Handlers".to_string(), handlers(&self.serve_path));

                port.insert(self.serve_external_port.clone(), Json::Object(entry));
                config.insert("TCP".to_string(), Json::Object(port));
            }
        }

        serde_json::to_string_pretty(&Json::Object(config)).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewtConfig {
    pub endpoint: String,
    pub newt_id: String,
    pub newt_secret: String,
    /// external network shared with the services behind the tunnel
    pub network_name: String,
}

impl Default for NewtConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://app.pangolin.net".to_string(),
            newt_id: String::new(),
            newt_secret: String::new(),
            network_name: "newt".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudflaredConfig {
    pub tunnel_token: String,
    pub no_autoupdate: bool,
}

impl Default for CloudflaredConfig {
    fn default() -> Self {
        Self {
            tunnel_token: String::new(),
            no_autoupdate: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireguardConfig {
    /// host path mounted to `/config`
    pub config_path: String,
    pub interface_name: String,
}

impl Default for WireguardConfig {
    fn default() -> Self {
        Self {
            config_path: "/etc/wireguard/wg0.conf".to_string(),
            interface_name: "wg0".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZerotierConfig {
    pub network_id: String,
    pub identity_path: String,
}

impl Default for ZerotierConfig {
    fn default() -> Self {
        Self {
            network_id: String::new(),
            identity_path: "/var/lib/zerotier-one".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetbirdConfig {
    pub setup_key: String,
    pub management_url: String,
}

/// How an opted in service is changed by the overlay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceRewrite {
    /// `ports` and `networks` are dropped, `network_mode` is replaced
    NetworkMode(String),
    /// `networks` is replaced
    Networks(Vec<String>),
}

/// Everything a VPN selection adds to or changes in a document
#[derive(Debug, Default, PartialEq)]
pub struct VpnOverlay {
    pub service: Option<Service>,
    pub networks: Vec<Network>,
    pub volumes: Vec<Volume>,
    /// top-level `configs` entries
    pub configs: IndexMap<String, Value>,
    /// keyed by service name
    pub rewrites: IndexMap<String, ServiceRewrite>,
}

impl VpnOverlay {
    pub fn rewrite_for(&self, service: &str) -> Option<&ServiceRewrite> {
        self.rewrites.get(service)
    }
}

/// Compute the sidecar and the changes to other entities for `vpn`
///
/// Never fails: missing secrets only mean missing placeholders. Networks and volumes the
/// user already declared under the same name are not added again.
pub fn apply_vpn(
    vpn: &VpnConfig,
    services: &[Service],
    networks: &[Network],
    volumes: &[Volume],
) -> VpnOverlay {
    let Some(provider) = vpn.active() else {
        return VpnOverlay::default();
    };

    let sidecar_name = provider.service_name();
    let mut overlay = VpnOverlay {
        service: Some(sidecar(provider)),
        ..Default::default()
    };

    for service in services {
        if service.name.is_empty() || !vpn.uses_vpn(&service.name) {
            continue;
        }

        let rewrite = match provider {
            VpnProvider::Tailscale(_) | VpnProvider::Cloudflared(_) => {
                ServiceRewrite::NetworkMode(format!("service:{sidecar_name}"))
            }
            VpnProvider::Newt(newt) => ServiceRewrite::Networks(vec![newt.network_name.clone()]),
            _ => continue,
        };

        tracing::trace!(service = %service.name, ?rewrite, "routing service through vpn");
        overlay.rewrites.insert(service.name.clone(), rewrite);
    }

    match provider {
        VpnProvider::Tailscale(ts) => {
            overlay.volumes.push(Volume::named("tailscale"));

            if ts.serves() {
                let content: Value = [("content", ts.serve_config())].into_iter().collect();
                overlay
                    .configs
                    .insert(SERVE_CONFIG_NAME.to_string(), content);
            }
        }
        VpnProvider::Newt(newt) => {
            let mut network = Network::named(&newt.network_name);
            network.external = true;
            network.external_name = newt.network_name.clone();
            overlay.networks.push(network);
        }
        _ => {}
    }

    overlay
        .networks
        .retain(|extra| !networks.iter().any(|network| network.name == extra.name));
    overlay
        .volumes
        .retain(|extra| !volumes.iter().any(|volume| volume.name == extra.name));

    overlay
}

/// Environment entry, left out if `value` is empty
fn env(environment: &mut Vec<KeyValue>, key: &str, value: &str) {
    if !value.is_empty() {
        environment.push(KeyValue::new(key, value));
    }
}

/// `${key}` if a secret was provided
fn placeholder(secret: &str, key: &str) -> String {
    if secret.is_empty() {
        String::new()
    } else {
        format!("${{{key}}}")
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn sysctl(entry: &str) -> KeyValue {
    crate::util::split_key_value(entry)
}

/// The synthesized service for `provider`
fn sidecar(provider: &VpnProvider) -> Service {
    let mut service = Service {
        name: provider.service_name(),
        restart: Some(RestartPolicy::Always),
        environment_syntax: CollectionSyntax::Dict,
        volumes_syntax: CollectionSyntax::Array,
        ..Default::default()
    };
    let environment = &mut service.environment;

    match provider {
        VpnProvider::Tailscale(ts) => {
            service.image = "tailscale/tailscale:latest".to_string();
            service.privileged = Some(true);
            service.volumes = vec![
                VolumeMapping::new("tailscale", "/var/lib/tailscale", false),
                VolumeMapping::new("/dev/net/tun", "/dev/net/tun", false),
            ];

            env(environment, "TS_STATE_DIR", "/var/lib/tailscale");
            env(environment, "TS_ACCEPT_DNS", flag(ts.accept_dns));
            env(environment, "TS_AUTH_ONCE", flag(ts.auth_once));
            env(environment, "TS_USERSPACE", flag(ts.userspace));
            env(environment, "TS_AUTHKEY", &placeholder(&ts.auth_key, "TS_AUTHKEY"));
            env(environment, "TS_HOSTNAME", &ts.hostname);

            if !ts.exit_node.is_empty() {
                let mut args = format!("--exit-node={}", ts.exit_node);
                if ts.exit_node_allow_lan {
                    args.push_str(" --exit-node-allow-lan-access");
                }
                env(environment, "TS_EXTRA_ARGS", &args);
            }

            if ts.serves() {
                env(environment, "TS_SERVE_CONFIG", SERVE_CONFIG_TARGET);
                service.configs = vec![ConfigMount::new(SERVE_CONFIG_NAME, SERVE_CONFIG_TARGET)];
            }
        }
        VpnProvider::Newt(newt) => {
            service.image = "fosrl/newt".to_string();
            service.container_name = "newt".to_string();

            env(environment, "PANGOLIN_ENDPOINT", &newt.endpoint);
            env(environment, "NEWT_ID", &placeholder(&newt.newt_id, "NEWT_ID"));
            env(
                environment,
                "NEWT_SECRET",
                &placeholder(&newt.newt_secret, "NEWT_SECRET"),
            );

            service.networks = vec![newt.network_name.clone()];
        }
        VpnProvider::Cloudflared(cf) => {
            service.image = "cloudflare/cloudflared".to_string();
            service.command = if cf.no_autoupdate {
                "--no-autoupdate tunnel run".to_string()
            } else {
                "tunnel run".to_string()
            };

            env(
                environment,
                "TUNNEL_TOKEN",
                &placeholder(&cf.tunnel_token, "TUNNEL_TOKEN"),
            );
        }
        VpnProvider::Wireguard(wg) => {
            service.image = "linuxserver/wireguard:latest".to_string();
            service.cap_add = vec!["NET_ADMIN".to_string(), "SYS_MODULE".to_string()];

            env(environment, "PUID", "1000");
            env(environment, "PGID", "1000");
            env(environment, "TZ", "Etc/UTC");

            service.sysctls = vec![sysctl("net.ipv4.conf.all.src_valid_mark=1")];
            service.volumes = vec![VolumeMapping::new(&wg.config_path, "/config", false)];
        }
        VpnProvider::Zerotier(zt) => {
            service.image = "zerotier/zerotier:latest".to_string();
            service.privileged = Some(true);
            service.networks = vec!["host".to_string()];
            service.volumes = vec![VolumeMapping::new(
                &zt.identity_path,
                "/var/lib/zerotier-one",
                false,
            )];

            env(
                environment,
                "ZT_NC_NETWORK",
                &placeholder(&zt.network_id, "ZT_NETWORK_ID"),
            );
        }
        VpnProvider::Netbird(nb) => {
            service.image = "netbirdio/netbird:latest".to_string();
            service.privileged = Some(true);
            service.cap_add = vec!["NET_ADMIN".to_string(), "SYS_MODULE".to_string()];
            service.sysctls = vec![
                sysctl("net.ipv4.ip_forward=1"),
                sysctl("net.ipv6.conf.all.forwarding=1"),
            ];

            env(
                environment,
                "NETBIRD_SETUP_KEY",
                &placeholder(&nb.setup_key, "NETBIRD_SETUP_KEY"),
            );
            env(environment, "NETBIRD_MANAGEMENT_URL", &nb.management_url);
        }
    }

    service
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vpn(kind: VpnKind, services: &[&str]) -> VpnConfig {
        let mut vpn = VpnConfig::default();
        vpn.select(kind);
        vpn.services = services.iter().map(|s| s.to_string()).collect();
        vpn
    }

    fn services() -> Vec<Service> {
        vec![Service::named("web", "nginx"), Service::named("db", "postgres")]
    }

    #[test]
    fn select_discards_previous_settings() {
        let mut config = vpn(VpnKind::Tailscale, &[]);
        let Some(VpnProvider::Tailscale(ts)) = config.provider.as_mut() else {
            panic!("tailscale expected");
        };
        ts.auth_key = "tskey-123".to_string();

        config.select(VpnKind::Tailscale);
        assert!(
            matches!(&config.provider, Some(VpnProvider::Tailscale(ts)) if ts.auth_key == "tskey-123")
        );

        config.select(VpnKind::Newt);
        config.select(VpnKind::Tailscale);
        assert_eq!(
            config.provider,
            Some(VpnProvider::Tailscale(TailscaleConfig::default()))
        );

        config.select(VpnKind::None);
        assert!(!config.enabled);
        assert_eq!(config.provider, None);
    }

    #[test]
    fn disabled_vpn_changes_nothing() {
        let mut config = vpn(VpnKind::Tailscale, &["web"]);
        config.enabled = false;
        assert_eq!(apply_vpn(&config, &services(), &[], &[]), VpnOverlay::default());
    }

    #[test]
    fn tailscale_takes_over_network_namespace() {
        let overlay = apply_vpn(&vpn(VpnKind::Tailscale, &["web"]), &services(), &[], &[]);

        assert_eq!(
            overlay.rewrite_for("web"),
            Some(&ServiceRewrite::NetworkMode("service:tailscale".to_string()))
        );
        assert_eq!(overlay.rewrite_for("db"), None);
        assert_eq!(overlay.volumes, vec![Volume::named("tailscale")]);
        assert!(overlay.configs.is_empty());

        let sidecar = overlay.service.expect("sidecar");
        assert_eq!(sidecar.name, "tailscale");
        assert_eq!(
            sidecar.environment,
            vec![
                KeyValue::new("TS_STATE_DIR", "/var/lib/tailscale"),
                KeyValue::new("TS_ACCEPT_DNS", "false"),
                KeyValue::new("TS_AUTH_ONCE", "true"),
                KeyValue::new("TS_USERSPACE", "false"),
            ]
        );
    }

    #[test]
    fn tailscale_user_volume_wins() {
        let volumes = vec![Volume::named("tailscale")];
        let overlay = apply_vpn(&vpn(VpnKind::Tailscale, &[]), &services(), &[], &volumes);
        assert!(overlay.volumes.is_empty());
    }

    #[test]
    fn tailscale_secrets_become_placeholders() {
        let mut config = vpn(VpnKind::Tailscale, &["web"]);
        if let Some(VpnProvider::Tailscale(ts)) = config.provider.as_mut() {
            ts.auth_key = "tskey-secret".to_string();
            ts.exit_node = "100.64.0.1".to_string();
            ts.exit_node_allow_lan = true;
        }

        let sidecar = apply_vpn(&config, &services(), &[], &[]).service.unwrap();
        assert!(sidecar
            .environment
            .contains(&KeyValue::new("TS_AUTHKEY", "${TS_AUTHKEY}")));
        assert!(sidecar.environment.contains(&KeyValue::new(
            "TS_EXTRA_ARGS",
            "--exit-node=100.64.0.1 --exit-node-allow-lan-access"
        )));
        assert!(!sidecar
            .environment
            .iter()
            .any(|kv| kv.value.contains("tskey-secret")));
    }

    #[test]
    fn tailscale_serve_https() {
        let ts = TailscaleConfig {
            enable_serve: true,
            serve_target_service: "web".to_string(),
            ..Default::default()
        };

        let expected = r#"{
  "TCP": {
    "443": {
      "HTTPS": true
    }
  },
  "Web": {
    "${TS_CERT_DOMAIN}:443": {
      "Handlers": {
        "/": {
          "Proxy": "http://127.0.0.1:8080"
        }
      }
    }
  }
}"#;
        assert_eq!(ts.serve_config(), expected);

        let config = VpnConfig {
            enabled: true,
            provider: Some(VpnProvider::Tailscale(ts)),
            services: vec!["web".to_string()],
        };
        let overlay = apply_vpn(&config, &services(), &[], &[]);

        assert_eq!(
            overlay.configs[SERVE_CONFIG_NAME].get("content"),
            Some(&Value::String(expected.to_string()))
        );
        assert_eq!(
            overlay.service.unwrap().configs,
            vec![ConfigMount::new("serve-config", "/etc/tailscale/serve.json")]
        );
    }

    #[test]
    fn tailscale_serve_http() {
        let ts = TailscaleConfig {
            enable_serve: true,
            serve_target_service: "web".to_string(),
            serve_protocol: ServeProtocol::Http,
            serve_external_port: "80".to_string(),
            serve_internal_port: "3000".to_string(),
            serve_path: "/app".to_string(),
            ..Default::default()
        };

        let expected = r#"{
  "TCP": {
    "80": {
      "HTTP": true,
      "Handlers": {
        "/app": {
          "Proxy": "http://127.0.0.1:3000"
        }
      }
    }
  }
}"#;
        assert_eq!(ts.serve_config(), expected);
    }

    #[test]
    fn serve_without_target_is_inactive() {
        let ts = TailscaleConfig {
            enable_serve: true,
            ..Default::default()
        };
        let config = VpnConfig {
            enabled: true,
            provider: Some(VpnProvider::Tailscale(ts)),
            services: vec![],
        };

        let overlay = apply_vpn(&config, &services(), &[], &[]);
        assert!(overlay.configs.is_empty());
        assert!(overlay.service.unwrap().configs.is_empty());
    }

    #[test]
    fn newt_attaches_to_external_network() {
        let overlay = apply_vpn(&vpn(VpnKind::Newt, &["db"]), &services(), &[], &[]);

        assert_eq!(
            overlay.rewrite_for("db"),
            Some(&ServiceRewrite::Networks(vec!["newt".to_string()]))
        );
        assert_eq!(overlay.networks.len(), 1);
        assert!(overlay.networks[0].external);
        assert_eq!(overlay.networks[0].external_name, "newt");

        let sidecar = overlay.service.unwrap();
        assert_eq!(sidecar.container_name, "newt");
        assert_eq!(sidecar.networks, vec!["newt"]);
        assert_eq!(
            sidecar.environment,
            vec![KeyValue::new("PANGOLIN_ENDPOINT", "https://app.pangolin.net")]
        );
    }

    #[test]
    fn cloudflared_command_follows_autoupdate() {
        let mut config = vpn(VpnKind::Cloudflared, &["web"]);
        let sidecar = apply_vpn(&config, &services(), &[], &[]).service.unwrap();
        assert_eq!(sidecar.command, "--no-autoupdate tunnel run");

        if let Some(VpnProvider::Cloudflared(cf)) = config.provider.as_mut() {
            cf.no_autoupdate = false;
            cf.tunnel_token = "token".to_string();
        }
        let overlay = apply_vpn(&config, &services(), &[], &[]);
        assert_eq!(
            overlay.rewrite_for("web"),
            Some(&ServiceRewrite::NetworkMode(
                "service:cloudflared".to_string()
            ))
        );

        let sidecar = overlay.service.unwrap();
        assert_eq!(sidecar.command, "tunnel run");
        assert_eq!(
            sidecar.environment,
            vec![KeyValue::new("TUNNEL_TOKEN", "${TUNNEL_TOKEN}")]
        );
    }

    #[test]
    fn wireguard_has_no_rewrites() {
        let overlay = apply_vpn(&vpn(VpnKind::Wireguard, &["web"]), &services(), &[], &[]);
        assert!(overlay.rewrites.is_empty());

        let sidecar = overlay.service.unwrap();
        assert_eq!(sidecar.cap_add, vec!["NET_ADMIN", "SYS_MODULE"]);
        assert_eq!(
            sidecar.sysctls,
            vec![KeyValue::new("net.ipv4.conf.all.src_valid_mark", "1")]
        );
        assert_eq!(
            sidecar.volumes,
            vec![VolumeMapping::new("/etc/wireguard/wg0.conf", "/config", false)]
        );
    }

    #[test]
    fn provider_serde_is_tagged() {
        let config = vpn(VpnKind::Netbird, &["web"]);
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["provider"]["type"], "netbird");

        let back: VpnConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }
}
