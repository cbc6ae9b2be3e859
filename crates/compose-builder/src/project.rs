//! Caller-owned aggregate of everything that makes up one document
//!
//! References between entities are by name only. Renaming or removing a network or volume
//! therefore has to be cascaded into the services by hand, which is what the methods here do.
use crate::emit::emit;
use crate::import::ImportedDocument;
use crate::model::{Network, Service, Volume};
use crate::normalize::normalize;
use crate::validate::{validate, validate_vpn, ValidationReport, VpnWarning};
use crate::value::Value;
use crate::vpn::VpnConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    pub services: Vec<Service>,
    pub networks: Vec<Network>,
    pub volumes: Vec<Volume>,
    pub vpn: VpnConfig,
}

impl Project {
    /// The document tree, VPN overlay included
    ///
    /// Serializes (skipping absent entries) to the same structure the text has.
    pub fn document(&self) -> Value {
        normalize(
            &self.services,
            &self.networks,
            &self.volumes,
            Some(&self.vpn),
        )
    }

    /// The document text
    pub fn render(&self) -> String {
        emit(&self.document())
    }

    pub fn validate(&self) -> Result<(), ValidationReport> {
        validate(&self.services)
    }

    pub fn vpn_warnings(&self) -> Vec<VpnWarning> {
        validate_vpn(&self.vpn)
    }

    /// Render only if there are no validation issues
    pub fn validate_and_render(&self) -> Result<String, ValidationReport> {
        self.validate()?;
        Ok(self.render())
    }

    pub fn rename_network(&mut self, old: &str, new: &str) {
        for network in self.networks.iter_mut().filter(|network| network.name == old) {
            network.name = new.to_string();
        }

        for service in &mut self.services {
            let references = service.networks.iter_mut();
            for network in references.filter(|network| network.as_str() == old) {
                *network = new.to_string();
            }
        }
    }

    /// Remove the network and every service's reference to it
    pub fn remove_network(&mut self, name: &str) -> Option<Network> {
        let index = self.networks.iter().position(|network| network.name == name)?;

        for service in &mut self.services {
            service.networks.retain(|network| network != name);
        }

        Some(self.networks.remove(index))
    }

    /// Rename the volume and every service volume mapping that mounts it
    pub fn rename_volume(&mut self, old: &str, new: &str) {
        for volume in self.volumes.iter_mut().filter(|volume| volume.name == old) {
            volume.name = new.to_string();
        }

        for service in &mut self.services {
            for mapping in service.volumes.iter_mut().filter(|mapping| mapping.host == old) {
                mapping.host = new.to_string();
            }
        }
    }

    /// Remove the volume and every service volume mapping that mounts it
    pub fn remove_volume(&mut self, name: &str) -> Option<Volume> {
        let index = self.volumes.iter().position(|volume| volume.name == name)?;

        for service in &mut self.services {
            service.volumes.retain(|mapping| mapping.host != name);
        }

        Some(self.volumes.remove(index))
    }

    /// Remove the service at `index`
    ///
    /// There is always at least one service: removing the last one leaves a new empty service.
    pub fn remove_service(&mut self, index: usize) -> Option<Service> {
        if index >= self.services.len() {
            return None;
        }

        let removed = self.services.remove(index);
        if self.services.is_empty() {
            self.services.push(Service::default());
        }

        self.vpn.services.retain(|name| *name != removed.name);

        Some(removed)
    }

    /// Add an imported document
    ///
    /// Unnamed services are dropped first, imported services are appended. Imported networks and
    /// volumes are only added if no entity of the same name exists.
    pub fn merge(&mut self, imported: ImportedDocument) {
        self.services.retain(|service| !service.name.trim().is_empty());
        self.services.extend(imported.services);

        for network in imported.networks {
            if !self.networks.iter().any(|existing| existing.name == network.name) {
                self.networks.push(network);
            }
        }

        for volume in imported.volumes {
            if !self.volumes.iter().any(|existing| existing.name == volume.name) {
                self.volumes.push(volume);
            }
        }

        tracing::debug!(
            services = self.services.len(),
            networks = self.networks.len(),
            volumes = self.volumes.len(),
            "merged imported document"
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::{KeyValue, VolumeMapping};
    use crate::vpn::VpnKind;
    use pretty_assertions::assert_eq;

    fn project() -> Project {
        let mut web = Service::named("web", "nginx");
        web.networks = vec!["frontend".to_string(), "backend".to_string()];
        web.volumes = vec![
            VolumeMapping::new("data", "/data", false),
            VolumeMapping::new("./html", "/usr/share/nginx/html", true),
        ];

        let mut db = Service::named("db", "postgres");
        db.networks = vec!["backend".to_string()];
        db.volumes = vec![VolumeMapping::new("data", "/var/lib/postgresql/data", false)];

        Project {
            services: vec![web, db],
            networks: vec![Network::named("frontend"), Network::named("backend")],
            volumes: vec![Volume::named("data")],
            vpn: VpnConfig::default(),
        }
    }

    #[test]
    fn rename_network_cascades() {
        let mut project = project();
        project.rename_network("backend", "internal");

        assert_eq!(project.networks[1].name, "internal");
        assert_eq!(project.services[0].networks, vec!["frontend", "internal"]);
        assert_eq!(project.services[1].networks, vec!["internal"]);
    }

    #[test]
    fn remove_network_cascades() {
        let mut project = project();
        let removed = project.remove_network("backend").unwrap();

        assert_eq!(removed.name, "backend");
        assert_eq!(project.networks, vec![Network::named("frontend")]);
        assert_eq!(project.services[0].networks, vec!["frontend"]);
        assert!(project.services[1].networks.is_empty());
        assert!(project.remove_network("backend").is_none());
    }

    #[test]
    fn volume_cascades() {
        let mut project = project();
        project.rename_volume("data", "pgdata");

        assert_eq!(project.volumes[0].name, "pgdata");
        assert_eq!(project.services[0].volumes[0].host, "pgdata");
        assert_eq!(project.services[0].volumes[1].host, "./html");
        assert_eq!(project.services[1].volumes[0].host, "pgdata");

        project.remove_volume("pgdata").unwrap();
        assert!(project.volumes.is_empty());
        assert_eq!(project.services[0].volumes.len(), 1);
        assert!(project.services[1].volumes.is_empty());
    }

    #[test]
    fn remove_service_keeps_one_and_leaves_the_vpn() {
        let mut project = project();
        project.vpn.select(VpnKind::Cloudflared);
        project.vpn.services = vec!["web".to_string(), "db".to_string()];

        assert_eq!(project.remove_service(0).unwrap().name, "web");
        assert_eq!(project.vpn.services, vec!["db"]);

        project.remove_service(0).unwrap();
        assert_eq!(project.services, vec![Service::default()]);
        assert!(project.vpn.services.is_empty());

        assert!(project.remove_service(5).is_none());
    }

    #[test]
    fn merge_import() {
        let mut project = Project {
            services: vec![Service::default()],
            networks: vec![Network::named("backend")],
            ..Default::default()
        };

        let mut imported_backend = Network::named("backend");
        imported_backend.driver = "overlay".to_string();

        project.merge(ImportedDocument {
            services: vec![Service::named("app", "node")],
            networks: vec![imported_backend, Network::named("proxy")],
            volumes: vec![Volume::named("data")],
        });

        assert_eq!(project.services, vec![Service::named("app", "node")]);
        assert_eq!(
            project.networks,
            vec![Network::named("backend"), Network::named("proxy")]
        );
        assert_eq!(project.volumes, vec![Volume::named("data")]);
    }

    #[test]
    fn render_only_when_valid() {
        let project = project();
        let expected = "\
services:
  web:
    image: nginx
    volumes:
      - \"data:/data\"
      - \"./html:/usr/share/nginx/html:ro\"
    networks:
      - frontend
      - backend
  db:
    image: postgres
    volumes:
      - \"data:/var/lib/postgresql/data\"
    networks:
      - backend
networks:
  frontend: {}
  backend: {}
volumes:
  data: {}";
        assert_eq!(project.validate_and_render().unwrap(), expected);

        let mut invalid = project;
        invalid.services[1].image.clear();
        assert_eq!(
            invalid.validate_and_render().unwrap_err().to_string(),
            "Service \"db\": Image is required"
        );
    }

    #[test]
    fn document_tree_as_json() {
        let mut project = project();
        project.services[1].environment = vec![KeyValue::new("PGDATA", "")];

        let json = serde_json::to_value(project.document()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "services": {
                    "web": {
                        "image": "nginx",
                        "volumes": ["data:/data", "./html:/usr/share/nginx/html:ro"],
                        "networks": ["frontend", "backend"],
                    },
                    "db": {
                        "image": "postgres",
                        "volumes": ["data:/var/lib/postgresql/data"],
                        "environment": ["PGDATA="],
                        "networks": ["backend"],
                    },
                },
                "networks": {"frontend": {}, "backend": {}},
                "volumes": {"data": {}},
            })
        );
    }

    #[test]
    fn serde() {
        let mut project = project();
        project.vpn.select(VpnKind::Newt);

        let json = serde_json::to_string(&project).unwrap();
        let back: Project = serde_json::from_str(&json).unwrap();
        assert_eq!(back, project);

        let minimal: Project =
            serde_json::from_str(r#"{"services": [{"name": "web", "image": "nginx"}]}"#).unwrap();
        assert_eq!(minimal.services, vec![Service::named("web", "nginx")]);
    }
}
