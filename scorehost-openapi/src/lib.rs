//! Swagger 2 and OpenAPI 3 / 3.1 documents for a loaded scoring script.
//!
//! Each version is an entry in a data table ([`SCHEMA_VERSIONS`]): its
//! aliases, embedded template, override file names and the function that
//! writes `ServiceInput` / `ServiceOutput` into the parsed template.
//!
//! ```no_run
//! use scorehost_openapi::{SchemaRegistry, ServiceInfo};
//! # fn demo(descriptor: std::sync::Arc<scorehost_core::script::HandlerDescriptor>) {
//! let registry = SchemaRegistry::new(
//!     "/var/scorehost/app",
//!     ServiceInfo::new("ML service", "1.0", ""),
//!     descriptor,
//! );
//! let doc = registry.get("2.0").unwrap();
//! assert_eq!(doc["swagger"], "2.0");
//! # }
//! ```

pub mod error;
pub mod registry;
pub mod schema;
pub mod version;

pub use error::SchemaError;
pub use registry::{DocumentSource, SchemaDocument, SchemaRegistry, ServiceInfo};
pub use schema::{input_schema, output_schema, permissive_schema};
pub use version::{DEFAULT_VERSION, SCHEMA_VERSIONS, SchemaInjector, SchemaVersion, find_version};
