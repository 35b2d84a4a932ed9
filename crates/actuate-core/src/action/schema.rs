//! Payload schema descriptors and example derivation.
//!
//! An action declares the structured payload it expects the model to emit as
//! a [`PayloadType`]. The type is reflected once through `schemars` into a
//! [`SchemaDescriptor`] (either a single structured object or a list of
//! them), and the descriptor drives both the formatting instructions sent to
//! the model and the shape check applied when the reply is parsed.
//!
//! ```text
//! PayloadType::of::<Vec<Step>>()
//!        │ reflect
//!        ▼
//! SchemaDescriptor::List(StructSchema { fields: [..] })
//!        │ build_schema_example
//!        ▼
//! [ { "name": "<field description>", "retries": 3, "note": "" } ]
//! ```

use schemars::{JsonSchema, Schema};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::ActionError;

/// A type the model can be asked to produce.
///
/// Implement it (usually with an empty body) for every payload struct that
/// derives `Deserialize` and `JsonSchema`. Override `validate` to enforce
/// constraints serde cannot express.
pub trait StructuredPayload: JsonSchema + DeserializeOwned + Send + 'static {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

impl<T: StructuredPayload> StructuredPayload for Vec<T> {
    fn validate(&self) -> Result<(), String> {
        for (index, item) in self.iter().enumerate() {
            item.validate()
                .map_err(|e| format!("item {}: {}", index, e))?;
        }
        Ok(())
    }
}

/// Registration-time handle on a declared payload type.
#[derive(Clone, Copy)]
pub struct PayloadType {
    type_name: &'static str,
    schema: fn() -> Schema,
}

fn schema_of<T: JsonSchema>() -> Schema {
    schemars::schema_for!(T)
}

impl PayloadType {
    pub fn of<T: JsonSchema>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            schema: schema_of::<T>,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Reflect the type into a descriptor.
    pub fn descriptor(&self) -> Result<SchemaDescriptor, ActionError> {
        SchemaDescriptor::from_schema(self.type_name, &(self.schema)())
    }
}

impl std::fmt::Debug for PayloadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadType")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// One declared field of a structured type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub description: Option<String>,
    pub default: Option<Value>,
}

impl FieldSpec {
    /// Example value: description, else a non-empty default, else `""`.
    pub fn example_value(&self) -> Value {
        if let Some(desc) = self.description.as_deref().filter(|d| !d.is_empty()) {
            return Value::String(desc.to_string());
        }
        match &self.default {
            Some(value) if is_truthy(value) => value.clone(),
            _ => Value::String(String::new()),
        }
    }
}

/// Reflected fields of a single structured type, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct StructSchema {
    pub title: String,
    pub fields: Vec<FieldSpec>,
}

impl StructSchema {
    pub fn example(&self) -> Value {
        let mut example = Map::new();
        for field in &self.fields {
            example.insert(field.name.clone(), field.example_value());
        }
        Value::Object(example)
    }
}

/// Shape of a declared payload.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaDescriptor {
    Scalar(StructSchema),
    List(StructSchema),
}

impl SchemaDescriptor {
    /// Build a descriptor from a JSON schema document.
    ///
    /// Accepts an object schema, or an array schema whose `items` resolve to
    /// an object schema. Anything else is a `Schema` error.
    pub fn from_schema(type_name: &str, schema: &Schema) -> Result<Self, ActionError> {
        let root = schema.as_value();

        if let Some(fields) = object_fields(root, root) {
            return Ok(SchemaDescriptor::Scalar(StructSchema {
                title: title_of(root, type_name),
                fields,
            }));
        }

        if schema_type(root) == Some("array") {
            let items = root.get("items").ok_or_else(|| {
                ActionError::Schema(format!("List type {} has no element type", type_name))
            })?;
            return match object_fields(root, items) {
                Some(fields) => Ok(SchemaDescriptor::List(StructSchema {
                    title: ref_name(items)
                        .map(str::to_string)
                        .unwrap_or_else(|| title_of(resolve_ref(root, items), type_name)),
                    fields,
                })),
                None => Err(ActionError::Schema(format!(
                    "List elements of {} must be structured types",
                    type_name
                ))),
            };
        }

        Err(ActionError::Schema(format!(
            "Type {} is not a structured type",
            type_name
        )))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, SchemaDescriptor::List(_))
    }

    pub fn element(&self) -> &StructSchema {
        match self {
            SchemaDescriptor::Scalar(s) | SchemaDescriptor::List(s) => s,
        }
    }
}

/// Example document for a declared payload type.
///
/// A scalar type yields one entry per field; a list type yields a
/// single-element list wrapping the scalar example.
pub fn build_schema_example(payload: PayloadType) -> Result<Value, ActionError> {
    Ok(example_for(&payload.descriptor()?))
}

pub fn example_for(descriptor: &SchemaDescriptor) -> Value {
    match descriptor {
        SchemaDescriptor::Scalar(s) => s.example(),
        SchemaDescriptor::List(s) => Value::Array(vec![s.example()]),
    }
}

/// Pretty-printed example, two-space indented.
pub fn schema_example_text(payload: PayloadType) -> Result<String, ActionError> {
    let example = build_schema_example(payload)?;
    serde_json::to_string_pretty(&example).map_err(|e| ActionError::Schema(e.to_string()))
}

/// Formatting instructions that ask the model to reply with the example's shape only.
pub fn schema_instructions(payload: PayloadType) -> Result<String, ActionError> {
    let example = schema_example_text(payload)?;
    Ok(format!(
        "Please reply strictly in the following json format:\n{}\nMake sure the reply content only has the correct json.",
        example
    ))
}

// ─── Schema walking ─────────────────────────────────────────────────────────

fn schema_type(schema: &Value) -> Option<&str> {
    schema.get("type").and_then(|t| t.as_str())
}

fn title_of(schema: &Value, fallback: &str) -> String {
    schema
        .get("title")
        .and_then(|t| t.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| short_type_name(fallback))
}

fn short_type_name(type_name: &str) -> String {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// Section and definition name of a local `$ref`, e.g. `#/$defs/Step`.
fn local_ref(schema: &Value) -> Option<(&'static str, &str)> {
    let reference = schema.get("$ref")?.as_str()?;
    reference
        .strip_prefix("#/$defs/")
        .map(|name| ("$defs", name))
        .or_else(|| {
            reference
                .strip_prefix("#/definitions/")
                .map(|name| ("definitions", name))
        })
}

fn ref_name(schema: &Value) -> Option<&str> {
    local_ref(schema).map(|(_, name)| name)
}

/// Follow a local `$ref` into `$defs` (or legacy `definitions`).
fn resolve_ref<'a>(root: &'a Value, schema: &'a Value) -> &'a Value {
    match local_ref(schema) {
        Some((section, name)) => root
            .get(section)
            .and_then(|defs| defs.get(name))
            .unwrap_or(schema),
        None => schema,
    }
}

fn object_fields(root: &Value, schema: &Value) -> Option<Vec<FieldSpec>> {
    let schema = resolve_ref(root, schema);
    let properties = schema.get("properties").and_then(|p| p.as_object());
    // Maps (`additionalProperties` with a value schema) are not structured types.
    let open_map = schema
        .get("additionalProperties")
        .map(|extra| extra.is_object())
        .unwrap_or(false);
    if properties.is_none() && (schema_type(schema) != Some("object") || open_map) {
        return None;
    }
    let fields = properties
        .map(|props| {
            props
                .iter()
                .map(|(name, prop)| FieldSpec {
                    name: name.clone(),
                    description: prop
                        .get("description")
                        .and_then(|d| d.as_str())
                        .map(str::to_string),
                    default: prop.get("default").cloned(),
                })
                .collect()
        })
        .unwrap_or_default();
    Some(fields)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, JsonSchema)]
    struct SqlQuery {
        /// The SQL statement to run
        sql: String,
        #[serde(default = "default_limit")]
        limit: u32,
        #[serde(default)]
        dry_run: bool,
        note: Option<String>,
    }

    fn default_limit() -> u32 {
        100
    }

    impl StructuredPayload for SqlQuery {}

    #[test]
    fn test_scalar_example_priority() {
        let example = build_schema_example(PayloadType::of::<SqlQuery>()).unwrap();
        assert_eq!(
            example,
            json!({
                "sql": "The SQL statement to run",
                "limit": 100,
                "dry_run": "",
                "note": ""
            })
        );
    }

    #[test]
    fn test_scalar_example_has_one_key_per_field() {
        let descriptor = PayloadType::of::<SqlQuery>().descriptor().unwrap();
        let example = example_for(&descriptor);
        let keys: Vec<&String> = example.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["sql", "limit", "dry_run", "note"]);
        assert!(!descriptor.is_list());
        assert_eq!(descriptor.element().title, "SqlQuery");
    }

    #[test]
    fn test_list_example_wraps_scalar() {
        let scalar = build_schema_example(PayloadType::of::<SqlQuery>()).unwrap();
        let list = build_schema_example(PayloadType::of::<Vec<SqlQuery>>()).unwrap();
        assert_eq!(list, json!([scalar]));
        assert!(PayloadType::of::<Vec<SqlQuery>>()
            .descriptor()
            .unwrap()
            .is_list());
    }

    #[test]
    fn test_list_of_non_structured_is_schema_error() {
        let err = PayloadType::of::<Vec<String>>().descriptor().unwrap_err();
        assert!(matches!(err, ActionError::Schema(_)));
    }

    #[test]
    fn test_non_structured_is_schema_error() {
        let err = build_schema_example(PayloadType::of::<String>()).unwrap_err();
        assert!(matches!(err, ActionError::Schema(_)));
        let err = build_schema_example(PayloadType::of::<u64>()).unwrap_err();
        assert!(matches!(err, ActionError::Schema(_)));
        let err = build_schema_example(PayloadType::of::<std::collections::HashMap<String, u32>>())
            .unwrap_err();
        assert!(matches!(err, ActionError::Schema(_)));
    }

    #[test]
    fn test_list_element_title_from_definition() {
        let descriptor = PayloadType::of::<Vec<SqlQuery>>().descriptor().unwrap();
        assert_eq!(descriptor.element().title, "SqlQuery");
        assert_eq!(descriptor.element().fields.len(), 4);
    }

    #[test]
    fn test_example_is_idempotent() {
        let payload = PayloadType::of::<Vec<SqlQuery>>();
        assert_eq!(
            build_schema_example(payload).unwrap(),
            build_schema_example(payload).unwrap()
        );
    }

    #[test]
    fn test_instructions_embed_pretty_example() {
        let text = schema_instructions(PayloadType::of::<SqlQuery>()).unwrap();
        assert!(text.starts_with("Please reply strictly in the following json format:\n{"));
        assert!(text.contains("  \"sql\": \"The SQL statement to run\""));
        assert!(text.ends_with("Make sure the reply content only has the correct json."));
    }

    #[test]
    fn test_falsy_defaults_render_empty() {
        let field = FieldSpec {
            name: "count".into(),
            description: None,
            default: Some(json!(0)),
        };
        assert_eq!(field.example_value(), json!(""));
        let field = FieldSpec {
            name: "tags".into(),
            description: Some(String::new()),
            default: Some(json!(["a"])),
        };
        assert_eq!(field.example_value(), json!(["a"]));
    }
}
