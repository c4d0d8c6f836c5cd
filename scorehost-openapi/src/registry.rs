//! Per-script cache of versioned interface documents.

use crate::error::SchemaError;
use crate::schema::{input_schema, output_schema};
use crate::version::{SCHEMA_VERSIONS, SchemaVersion, find_version};
use scorehost_config::ServerConfig;
use scorehost_core::script::HandlerDescriptor;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

/// Service metadata substituted into the templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub path_prefix: String,
}

impl ServiceInfo {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        path_prefix: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            path_prefix: path_prefix.into(),
        }
    }

    /// `/prefix` with surrounding slashes normalised, or empty.
    pub fn normalized_prefix(&self) -> String {
        let trimmed = self.path_prefix.trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        }
    }
}

impl From<&ServerConfig> for ServiceInfo {
    fn from(config: &ServerConfig) -> Self {
        Self::new(
            config.service_name.clone(),
            config.service_version.clone(),
            config.service_path_prefix.clone(),
        )
    }
}

/// Where a document came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Override(PathBuf),
    Generated,
}

/// One built document and the names it answers to.
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    pub version: &'static str,
    pub aliases: &'static [&'static str],
    pub source: DocumentSource,
    pub body: Arc<Value>,
}

#[derive(Debug)]
struct Prepared {
    documents: Vec<SchemaDocument>,
    broken: Vec<(&'static str, SchemaError)>,
    supported: Vec<String>,
}

/// Builds the documents for one loaded script on first use and keeps them.
///
/// A new registry is created for every script generation, so a reload
/// never serves documents of the previous script. A version whose document
/// cannot be built fails on its own; the other versions are still served.
#[derive(Debug)]
pub struct SchemaRegistry {
    app_root: PathBuf,
    service: ServiceInfo,
    descriptor: Arc<HandlerDescriptor>,
    prepared: OnceLock<Prepared>,
}

impl SchemaRegistry {
    pub fn new(
        app_root: impl Into<PathBuf>,
        service: ServiceInfo,
        descriptor: Arc<HandlerDescriptor>,
    ) -> Self {
        Self {
            app_root: app_root.into(),
            service,
            descriptor,
            prepared: OnceLock::new(),
        }
    }

    pub fn from_config(config: &ServerConfig, descriptor: Arc<HandlerDescriptor>) -> Self {
        Self::new(config.app_root.clone(), ServiceInfo::from(config), descriptor)
    }

    /// Canonical versions a document exists for, sorted.
    pub fn supported_versions(&self) -> Vec<String> {
        self.prepared().supported.clone()
    }

    /// Every built document.
    pub fn documents(&self) -> Vec<SchemaDocument> {
        self.prepared().documents.clone()
    }

    /// The document for `requested`, which may be any alias.
    pub fn get(&self, requested: &str) -> Result<Arc<Value>, SchemaError> {
        let prepared = self.prepared();

        let Some(version) = find_version(requested) else {
            return Err(SchemaError::UnknownVersion {
                requested: requested.to_string(),
                supported: prepared.supported.clone(),
            });
        };

        if let Some((_, err)) = prepared
            .broken
            .iter()
            .find(|(broken, _)| *broken == version.version)
        {
            return Err(err.clone());
        }

        prepared
            .documents
            .iter()
            .find(|doc| doc.version == version.version)
            .map(|doc| Arc::clone(&doc.body))
            .ok_or_else(|| SchemaError::UnsupportedForHandler {
                requested: requested.to_string(),
                supported: prepared.supported.clone(),
            })
    }

    fn prepared(&self) -> &Prepared {
        self.prepared.get_or_init(|| self.prepare())
    }

    fn prepare(&self) -> Prepared {
        let mut documents = Vec::new();
        let mut broken = Vec::new();
        let mut skipped = Vec::new();

        for version in SCHEMA_VERSIONS {
            match self.build(version) {
                Ok(Some(doc)) => documents.push(doc),
                Ok(None) => skipped.push(version.version.to_string()),
                Err(err) => {
                    warn!("Swagger for version [{}] is not available.", version.version);
                    broken.push((version.version, err));
                }
            }
        }

        let mut supported: Vec<String> = documents.iter().map(|d| d.version.to_string()).collect();
        supported.sort();
        skipped.sort();

        match (supported.is_empty(), skipped.is_empty()) {
            (false, false) => info!(
                "Swaggers are prepared for versions [{}] and skipped for versions [{}].",
                supported.join(", "),
                skipped.join(", ")
            ),
            (false, true) => info!(
                "Swaggers are prepared for the following versions: [{}].",
                supported.join(", ")
            ),
            (true, _) => info!("No swagger is prepared."),
        }

        Prepared {
            documents,
            broken,
            supported,
        }
    }

    fn build(&self, version: &'static SchemaVersion) -> Result<Option<SchemaDocument>, SchemaError> {
        if let Some((path, body)) = self.read_override(version)? {
            return Ok(Some(SchemaDocument {
                version: version.version,
                aliases: version.aliases,
                source: DocumentSource::Override(path),
                body: Arc::new(body),
            }));
        }

        if !self.descriptor.supports_schema_version(version.aliases) {
            return Ok(None);
        }

        Ok(Some(SchemaDocument {
            version: version.version,
            aliases: version.aliases,
            source: DocumentSource::Generated,
            body: Arc::new(self.generate(version)?),
        }))
    }

    fn read_override(
        &self,
        version: &SchemaVersion,
    ) -> Result<Option<(PathBuf, Value)>, SchemaError> {
        for name in version.override_files {
            let path = self.app_root.join(name);
            if let Some(body) = read_json(version, &path)? {
                info!(
                    "Loaded user's swagger file for version [{}] from {}",
                    version.version,
                    path.display()
                );
                return Ok(Some((path, body)));
            }
        }
        Ok(None)
    }

    fn generate(&self, version: &SchemaVersion) -> Result<Value, SchemaError> {
        let text = version
            .template
            .replace("$SERVICE_NAME$", &json_escape(&self.service.name))
            .replace("$SERVICE_VERSION$", &json_escape(&self.service.version))
            .replace(
                "$PATH_PREFIX$",
                &json_escape(&self.service.normalized_prefix()),
            );

        let mut doc: Value =
            serde_json::from_str(&text).map_err(|e| SchemaError::InvalidTemplate {
                version: version.version.to_string(),
                reason: e.to_string(),
            })?;

        (version.inject)(
            &mut doc,
            input_schema(&self.descriptor),
            output_schema(&self.descriptor),
        );
        Ok(doc)
    }
}

fn read_json(version: &SchemaVersion, path: &Path) -> Result<Option<Value>, SchemaError> {
    let invalid = |reason: String| {
        warn!("Could not read swagger override {}: {}", path.display(), reason);
        SchemaError::InvalidOverride {
            version: version.version.to_string(),
            path: path.display().to_string(),
            reason,
        }
    };

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(invalid(e.to_string())),
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| invalid(e.to_string()))
}

/// Escape a value for use inside a JSON string literal.
fn json_escape(raw: &str) -> String {
    let quoted = Value::String(raw.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}
