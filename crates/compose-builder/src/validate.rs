//! Model validation
//!
//! [validate] checks the handful of fields whose content can be checked without knowing the
//! target runtime (names, port numbers, environment keys, resource values). It never stops at the
//! first finding: every [Issue] is collected into one [ValidationReport].
//!
//! [validate_vpn] produces non-blocking [VpnWarning]s for incomplete tunnel settings.
use crate::model::{ResourceSpec, Service};
use crate::vpn::{VpnConfig, VpnProvider};
use regex::Regex;

lazy_static::lazy_static! {
    static ref SERVICE_NAME: Regex =
        Regex::new(r"^[a-z0-9_-]+$").expect("service name pattern is valid");
    static ref ENVIRONMENT_KEY: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("environment key pattern is valid");
    static ref CPUS: Regex = Regex::new(r"^\d+(\.\d+)?$").expect("cpu pattern is valid");
    static ref MEMORY: Regex =
        Regex::new(r"^\d+[kmgKMG]?[bB]?$").expect("memory pattern is valid");
}

/// Check every service, report all issues at once
pub fn validate(services: &[Service]) -> Result<(), ValidationReport> {
    let mut report = ValidationReport::new();

    for (index, service) in services.iter().enumerate() {
        // services without a name are referred to by position
        let label = if service.name.is_empty() {
            (index + 1).to_string()
        } else {
            service.name.clone()
        };

        if service.name.is_empty() {
            report.log(Issue::NameMissing { position: index + 1 });
        } else if !SERVICE_NAME.is_match(&service.name) {
            report.log(Issue::InvalidName {
                name: service.name.clone(),
            });
        }

        if service.image.is_empty() {
            report.log(Issue::ImageMissing {
                service: label.clone(),
            });
        }

        for (index, port) in service.ports.iter().enumerate() {
            let sides = [
                (PortSide::Host, &port.host),
                (PortSide::Container, &port.container),
            ];
            for (side, value) in sides {
                if !value.is_empty() && !is_valid_port(value) {
                    report.log(Issue::PortOutOfRange {
                        service: label.clone(),
                        port: index + 1,
                        side,
                    });
                }
            }
        }

        for (index, entry) in service.environment.iter().enumerate() {
            if !entry.key.is_empty() && !ENVIRONMENT_KEY.is_match(&entry.key) {
                report.log(Issue::InvalidEnvironmentKey {
                    service: label.clone(),
                    entry: index + 1,
                });
            }
        }

        for (kind, spec) in [
            (ResourceKind::Limit, &service.resources.limits),
            (ResourceKind::Reservation, &service.resources.reservations),
        ] {
            check_resources(&mut report, &label, kind, spec);
        }
    }

    report.into_result()
}

fn check_resources(
    report: &mut ValidationReport,
    service: &str,
    kind: ResourceKind,
    spec: &ResourceSpec,
) {
    if !spec.cpus.is_empty() && !CPUS.is_match(&spec.cpus) {
        report.log(Issue::InvalidCpus {
            service: service.to_string(),
            kind,
        });
    }

    if !spec.memory.is_empty() && !MEMORY.is_match(&spec.memory) {
        report.log(Issue::InvalidMemory {
            service: service.to_string(),
            kind,
        });
    }
}

/// `1..=65535`, both ends of a range `a-b`
fn is_valid_port(port: &str) -> bool {
    let in_range = |port: &str| {
        port.parse::<u32>()
            .is_ok_and(|port| (1..=65535).contains(&port))
    };

    match port.split_once('-') {
        Some((start, end)) => in_range(start) && in_range(end),
        None => in_range(port),
    }
}

#[derive(Debug, Default, derive_new::new)]
pub struct ValidationReport {
    #[new(default)]
    issues: Vec<Issue>,
}

impl ValidationReport {
    pub fn log(&mut self, issue: Issue) {
        tracing::trace!(?issue, "issue found");
        self.issues.push(issue);
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::error::Error for ValidationReport {}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, issue) in self.issues.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Issue {
    #[error("Service {position}: Name is required")]
    NameMissing { position: usize },
    #[error("Service \"{name}\": Service name must contain only lowercase alphanumeric characters, hyphens, and underscores")]
    InvalidName { name: String },
    #[error("Service \"{service}\": Image is required")]
    ImageMissing { service: String },
    #[error("Service \"{service}\" port {port} {side}: Port must be between 1 and 65535")]
    PortOutOfRange {
        service: String,
        port: usize,
        side: PortSide,
    },
    #[error("Service \"{service}\" env var {entry}: Environment variable key should start with a letter or underscore and contain only alphanumeric characters and underscores")]
    InvalidEnvironmentKey { service: String, entry: usize },
    #[error("Service \"{service}\" CPU {kind}: CPU value must be a number (e.g., 0.5, 1, 2)")]
    InvalidCpus { service: String, kind: ResourceKind },
    #[error("Service \"{service}\" memory {kind}: Memory value must be a number with optional unit (e.g., 512m, 2g, 1024)")]
    InvalidMemory { service: String, kind: ResourceKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSide {
    Host,
    Container,
}

impl std::fmt::Display for PortSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortSide::Host => f.write_str("host"),
            PortSide::Container => f.write_str("container"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Limit,
    Reservation,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Limit => f.write_str("limit"),
            ResourceKind::Reservation => f.write_str("reservation"),
        }
    }
}

/// Incomplete tunnel settings, the document can still be rendered
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VpnWarning {
    #[error("Tailscale Auth Key is required")]
    TailscaleAuthKeyMissing,
    #[error("Target service is required when Serve is enabled")]
    ServeTargetMissing,
    #[error("Newt ID and Secret are required")]
    NewtCredentialsMissing,
    #[error("Cloudflared Tunnel Token is required")]
    CloudflaredTokenMissing,
    #[error("ZeroTier Network ID is required")]
    ZerotierNetworkMissing,
    #[error("Netbird Setup Key is required")]
    NetbirdSetupKeyMissing,
    #[error("At least one service must be selected to use VPN")]
    NoServices,
}

/// Warnings for the active provider, none if the VPN is disabled
pub fn validate_vpn(vpn: &VpnConfig) -> Vec<VpnWarning> {
    let Some(provider) = vpn.active() else {
        return vec![];
    };

    let mut warnings = vec![];
    match provider {
        VpnProvider::Tailscale(tailscale) => {
            if tailscale.auth_key.is_empty() {
                warnings.push(VpnWarning::TailscaleAuthKeyMissing);
            }
            if tailscale.enable_serve && tailscale.serve_target_service.is_empty() {
                warnings.push(VpnWarning::ServeTargetMissing);
            }
        }
        VpnProvider::Newt(newt) => {
            if newt.newt_id.is_empty() || newt.newt_secret.is_empty() {
                warnings.push(VpnWarning::NewtCredentialsMissing);
            }
        }
        VpnProvider::Cloudflared(cloudflared) => {
            if cloudflared.tunnel_token.is_empty() {
                warnings.push(VpnWarning::CloudflaredTokenMissing);
            }
        }
        VpnProvider::Zerotier(zerotier) => {
            if zerotier.network_id.is_empty() {
                warnings.push(VpnWarning::ZerotierNetworkMissing);
            }
        }
        VpnProvider::Netbird(netbird) => {
            if netbird.setup_key.is_empty() {
                warnings.push(VpnWarning::NetbirdSetupKeyMissing);
            }
        }
        VpnProvider::Wireguard(_) => {}
    }

    if vpn.services.is_empty() {
        warnings.push(VpnWarning::NoServices);
    }

    for warning in &warnings {
        tracing::debug!(%warning, "vpn configuration incomplete");
    }

    warnings
}
