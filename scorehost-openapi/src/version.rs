//! The table of document versions the registry knows how to build.

use serde_json::{Map, Value};

/// Writes the input and output schemas into a parsed template.
pub type SchemaInjector = fn(&mut Value, Value, Value);

/// One buildable document version.
#[derive(Debug, Clone, Copy)]
pub struct SchemaVersion {
    /// Canonical name, reported in "supported versions" lists.
    pub version: &'static str,
    /// Every name a client may request this version by, canonical included.
    pub aliases: &'static [&'static str],
    pub template: &'static str,
    /// Override files under the app root, first existing one wins.
    pub override_files: &'static [&'static str],
    pub inject: SchemaInjector,
}

const SWAGGER2_TEMPLATE: &str = include_str!("../templates/swagger2_template.json");
const SWAGGER3_TEMPLATE: &str = include_str!("../templates/swagger3_template.json");

pub static SCHEMA_VERSIONS: &[SchemaVersion] = &[
    SchemaVersion {
        version: "2",
        aliases: &["2", "2.0"],
        template: SWAGGER2_TEMPLATE,
        override_files: &["swagger.json", "swagger2.json"],
        inject: inject_definitions,
    },
    SchemaVersion {
        version: "3",
        aliases: &["3", "3.0"],
        template: SWAGGER3_TEMPLATE,
        override_files: &["swagger3.json"],
        inject: inject_components,
    },
    SchemaVersion {
        version: "3.1",
        aliases: &["3.1"],
        template: SWAGGER3_TEMPLATE,
        override_files: &["swagger3.1.json"],
        inject: inject_components_31,
    },
];

/// Version requested when the client names none.
pub const DEFAULT_VERSION: &str = "2";

/// Look up the version an alias belongs to.
pub fn find_version(alias: &str) -> Option<&'static SchemaVersion> {
    SCHEMA_VERSIONS.iter().find(|v| v.aliases.contains(&alias))
}

fn inject_definitions(doc: &mut Value, input: Value, output: Value) {
    insert_at(doc, &["definitions"], "ServiceInput", input);
    insert_at(doc, &["definitions"], "ServiceOutput", output);
}

fn inject_components(doc: &mut Value, input: Value, output: Value) {
    insert_at(doc, &["components", "schemas"], "ServiceInput", input);
    insert_at(doc, &["components", "schemas"], "ServiceOutput", output);
}

fn inject_components_31(doc: &mut Value, input: Value, output: Value) {
    inject_components(doc, input, output);
    insert_at(doc, &[], "openapi", Value::String("3.1.0".to_string()));
}

/// Insert `key` into the object at `path`, creating (or replacing non-object)
/// intermediate values as needed.
fn insert_at(target: &mut Value, path: &[&str], key: &str, value: Value) {
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(map) = target {
        match path.split_first() {
            Some((head, rest)) => {
                let next = map.entry(head.to_string()).or_insert(Value::Null);
                insert_at(next, rest, key, value);
            }
            None => {
                map.insert(key.to_string(), value);
            }
        }
    }
}
