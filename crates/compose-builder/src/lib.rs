//! # compose-builder - form model to compose document compiler
//!
//! ## Introduction for developers
//!
//! Read this to understand how `compose-builder` works internally.
//!
//! ### Terms
//!
//! - a **document** is a compose file: top-level `services`, `networks`, `volumes` and `configs`
//! - the **model** is what a form edits: [model::Service], [model::Network], [model::Volume] and
//!   [vpn::VpnConfig]. Text fields hold raw input, an empty string means "not set"
//! - a **syntax variant** is one of the two encodings the document format allows for the same
//!   collection, e.g.
//!   ```yaml
//!   environment:        # array syntax
//!     - KEY=value
//!   environment:        # dict syntax
//!     KEY: value
//!   ```
//!   each service records which one it uses ([model::CollectionSyntax])
//! - a **sidecar** is a service that is not part of the model but synthesized from the VPN
//!   selection
//!
//! ### Compiling
//!
//! ```text
//! model ──normalize──▶ Value tree ──emit──▶ text
//!   ▲                     ▲
//!   │                     └── apply_vpn (sidecar, extra networks/volumes/configs, rewrites)
//!   └──────────── import ◀──── text / parsed document
//! ```
//!
//! 1. [vpn::apply_vpn] looks at the VPN selection and returns a [vpn::VpnOverlay]: the sidecar
//!    service, the networks/volumes/configs it needs and how each opted in service is rewritten
//!    (`network_mode: service:<sidecar>` or a replaced `networks` list)
//! 2. [normalize::normalize] converts every named entity into a [value::Value] tree. This is where
//!    fields are dropped: everything empty becomes [value::Value::Absent]. Key order in the tree is
//!    the key order of the document.
//! 3. [emit::emit] renders the tree. It is not a general purpose serializer, see the module docs
//!    for the handful of keys that get special treatment.
//!
//! [project::Project::render] does all three.
//!
//! ### Importing
//!
//! [import::import_str] parses a document and rebuilds the model. It is lossy by nature (anything
//! the model has no field for is dropped) and best effort: a field of unexpected shape is logged
//! and takes its default. The detected syntax variants are recorded so that
//!
//! ```text
//! emit(normalize(import(emit(normalize(model))))) == emit(normalize(model))
//! ```
//!
//! ### Validation
//!
//! Rendering never fails. [validate::validate] is a separate pass over the services that collects
//! every finding into one [validate::ValidationReport]. Incomplete VPN settings are reported as
//! [validate::VpnWarning]s and never block rendering.
//!
//! ### Logging
//!
//! The library logs through [tracing] and never installs a subscriber. Recovered problems (a
//! ulimit that is not a number, an unknown restart policy, ...) are logged at `warn`.
//!
pub mod emit;
pub mod import;
pub mod model;
pub mod normalize;
pub mod project;
mod util;
pub mod validate;
pub mod value;
pub mod vpn;

pub use import::{import_str, ImportError, ImportedDocument};
pub use project::Project;
