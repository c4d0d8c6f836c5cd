//! Input and output schemas derived from a handler declaration.

use scorehost_core::script::HandlerDescriptor;
use serde_json::{Map, Value, json};

/// Schema used when a handler declares nothing: any object.
pub fn permissive_schema() -> Value {
    json!({"type": "object", "example": {}})
}

/// `ServiceInput`: an object with one property per declared parameter.
/// Parameters without a default are required.
pub fn input_schema(descriptor: &HandlerDescriptor) -> Value {
    if !descriptor.schema_capable {
        return permissive_schema();
    }

    let mut properties = Map::new();
    let mut required = Vec::new();
    let mut example = Map::new();

    for param in &descriptor.parameters {
        let mut schema = param.declared_type.clone().unwrap_or_else(|| json!({}));
        if let (Some(default), Value::Object(fields)) = (&param.default, &mut schema) {
            fields
                .entry("default".to_string())
                .or_insert_with(|| default.clone());
        }

        if let Some(sample) = schema.get("example").or(param.default.as_ref()) {
            example.insert(param.name.clone(), sample.clone());
        }
        if !param.has_default() {
            required.push(Value::String(param.name.clone()));
        }
        properties.insert(param.name.clone(), schema);
    }

    let mut schema = Map::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".to_string(), Value::Array(required));
    }
    if !example.is_empty() {
        schema.insert("example".to_string(), Value::Object(example));
    }
    Value::Object(schema)
}

/// `ServiceOutput`: the declared output schema, if any.
pub fn output_schema(descriptor: &HandlerDescriptor) -> Value {
    descriptor
        .output_schema
        .clone()
        .unwrap_or_else(permissive_schema)
}
