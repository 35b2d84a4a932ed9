//! Payload extraction from free-form model text.
//!
//! Models wrap their JSON in prose, markdown fences, or both. The scanner
//! walks the text left to right and parses every top-level `{...}` or `[...]`
//! that is valid JSON. The first one found is the payload; later ones are
//! ignored, so the leftmost object always wins.

use serde_json::Value;

use crate::action::schema::{PayloadType, SchemaDescriptor, StructuredPayload};
use crate::error::ActionError;

/// All well-formed JSON objects and arrays embedded in `text`, in order of
/// appearance. Objects nested inside a match are not reported separately.
pub fn find_structured_objects(text: &str) -> Vec<Value> {
    let mut found = Vec::new();
    let mut pos = 0;

    while pos < text.len() {
        let rest = &text[pos..];
        let Some(offset) = rest.find(['{', '[']) else {
            break;
        };
        let start = pos + offset;

        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) if value.is_object() || value.is_array() => {
                pos = start + stream.byte_offset();
                found.push(value);
            }
            // Opening brackets are ASCII, so skipping one byte stays on a char boundary.
            _ => pos = start + 1,
        }
    }

    found
}

/// The first embedded JSON value in `text`.
pub fn first_structured_object(text: &str) -> Result<Value, ActionError> {
    find_structured_objects(text)
        .into_iter()
        .next()
        .ok_or(ActionError::NoStructuredOutput)
}

/// Locate, parse, and validate the payload `T` in raw model text.
///
/// For list types the first extracted value must be an array and every
/// element is parsed into the element type; otherwise the first extracted
/// value is parsed as a single object.
pub fn extract_payload<T: StructuredPayload>(raw_text: &str) -> Result<T, ActionError> {
    let descriptor = PayloadType::of::<T>().descriptor()?;
    let value = first_structured_object(raw_text)?;

    match (&descriptor, &value) {
        (SchemaDescriptor::List(element), v) if !v.is_array() => {
            return Err(ActionError::Validation(format!(
                "expected a list of {}, found a single object",
                element.title
            )));
        }
        (SchemaDescriptor::Scalar(schema), v) if !v.is_object() => {
            return Err(ActionError::Validation(format!(
                "expected a {} object, found a list",
                schema.title
            )));
        }
        _ => {}
    }

    let payload: T = serde_json::from_value(value).map_err(|e| {
        ActionError::Validation(format!("{}: {}", descriptor.element().title, e))
    })?;
    payload.validate().map_err(ActionError::Validation)?;
    Ok(payload)
}
