//! JSON projection of a `DataLayout`, used by the CLI's `info`/`check`
//! output and by tooling that wants to inspect a record without linking
//! against this crate's Rust types.

use super::schema::FieldLocation;
use super::value::Value;
use super::DataLayout;
use serde_json::{json, Map, Value as Json};

/// Controls how much detail `DataLayout::as_json` includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonProfile {
    /// Just `{field: value}`.
    ValuesOnly,
    /// `{field: {value, type, offset|index}}`, schema alongside values.
    WithSchema,
}

fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Bool(v) => json!(v),
        Value::I8(v) => json!(v),
        Value::I16(v) => json!(v),
        Value::I32(v) => json!(v),
        Value::I64(v) => json!(v),
        Value::U8(v) => json!(v),
        Value::U16(v) => json!(v),
        Value::U32(v) => json!(v),
        Value::U64(v) => json!(v),
        Value::F32(v) => json!(v),
        Value::F64(v) => json!(v),
        Value::Str(v) => json!(v),
        Value::Bytes(v) => json!(v),
    }
}

pub fn layout_to_json(layout: &DataLayout, profile: JsonProfile) -> Json {
    let mut out = Map::new();
    for field in layout.schema().fields() {
        let Some(value) = layout.get(&field.name) else {
            continue;
        };
        let entry = match profile {
            JsonProfile::ValuesOnly => value_to_json(value),
            JsonProfile::WithSchema => {
                let mut m = Map::new();
                m.insert("value".to_string(), value_to_json(value));
                m.insert("type".to_string(), json!(field.type_name));
                match field.location {
                    FieldLocation::Fixed { offset } => {
                        m.insert("offset".to_string(), json!(offset));
                    }
                    FieldLocation::Variable { index } => {
                        m.insert("index".to_string(), json!(index));
                    }
                }
                if let Some(unit) = &field.unit {
                    m.insert("unit".to_string(), json!(unit));
                }
                Json::Object(m)
            }
        };
        out.insert(field.name.clone(), entry);
    }
    Json::Object(out)
}
