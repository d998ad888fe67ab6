//! Self-describing, versionable record metadata blocks.
//!
//! A `DataLayout` packs a set of named, typed fields into a binary layout
//! with three parts: a fixed-size region (one slot per scalar field, laid
//! out at the offsets its [`Schema`] assigned), a variable-length index
//! table (one `(offset, length)` pair per string/bytes field), and a
//! variable-length data region holding the actual variable-length bytes: a
//! fixed header describing where to find the rest, one per arbitrary
//! schema rather than one fixed layout for the whole format.
//!
//! Fields are read by name (`find_data_piece_value`), not position, so a
//! reader built against an older/newer schema version can still pull out
//! the fields it knows about via [`DataLayout::map_layout`].

pub mod json;
pub mod schema;
pub mod value;

use crate::error::DataLayoutError;
use byteorder::{ByteOrder, LittleEndian};
use indexmap::IndexMap;
use schema::{FieldLocation, Schema};
use std::sync::Arc;
use value::{Value, ValueType};

pub use json::JsonProfile;

/// A schema plus the current in-memory values for each of its fields.
#[derive(Debug, Clone)]
pub struct DataLayout {
    schema: Arc<Schema>,
    values: IndexMap<String, Value>,
}

impl DataLayout {
    pub fn new(schema: Arc<Schema>) -> Self {
        DataLayout {
            schema,
            values: IndexMap::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Sets a field's current value, validating it against the schema's
    /// declared type.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), DataLayoutError> {
        let field = self
            .schema
            .get(name)
            .ok_or_else(|| DataLayoutError::UnknownField(name.to_string()))?;
        let expected = field
            .value_type()
            .ok_or_else(|| DataLayoutError::UnknownField(name.to_string()))?;
        if value.value_type() != expected {
            return Err(DataLayoutError::TypeMismatch {
                name: name.to_string(),
                expected: expected.name(),
                found: value.value_type().name(),
            });
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Whether `name` was actually packed into this record, as opposed to
    /// being absent (e.g. a field a newer schema added that an older
    /// record's writer never produced). Accessors still return the
    /// schema's declared default for an unavailable field, if any.
    pub fn is_available(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    fn default_value(&self, name: &str) -> Option<Value> {
        let field = self.schema.get(name)?;
        let value_type = field.value_type()?;
        Value::parse_default(value_type, field.default.as_ref()?)
    }

    /// Typed accessor: `find_data_piece_value::<f64>("temperature")`. Falls
    /// back to the schema's declared default when the field wasn't packed
    /// into this particular record.
    pub fn find_data_piece_value<T: value::FromValue>(&self, name: &str) -> Option<T> {
        match self.values.get(name) {
            Some(value) => T::from_value(value),
            None => self.default_value(name).as_ref().and_then(T::from_value),
        }
    }

    pub fn find_data_piece_string(&self, name: &str) -> Option<String> {
        match self.values.get(name) {
            Some(value) => Some(Value::as_string(value)),
            None => self.default_value(name).as_ref().map(Value::as_string),
        }
    }

    /// Snapshot the fields currently staged (i.e. explicitly `set`), as
    /// opposed to fields the schema declares but that were never written
    /// for this record — the snapshot is what actually gets packed.
    pub fn stage_current_values(&self) -> IndexMap<String, Value> {
        self.values.clone()
    }

    /// Packs the staged values into `(fixed_region, var_index_table,
    /// var_data)`. Unset fixed fields are zero-filled; unset variable
    /// fields get a zero-length index entry.
    pub fn pack(&self) -> Result<(Vec<u8>, Vec<u8>, Vec<u8>), DataLayoutError> {
        let mut fixed = vec![0u8; self.schema.fixed_region_size()];
        let mut var_entries: Vec<(u32, u32)> = vec![(0, 0); self.schema.variable_field_count()];
        let mut var_data = Vec::new();

        for field in self.schema.fields() {
            let Some(value) = self.values.get(&field.name) else {
                continue;
            };
            match field.location {
                FieldLocation::Fixed { offset } => {
                    let size = field
                        .value_type()
                        .and_then(|t| t.fixed_size())
                        .ok_or_else(|| DataLayoutError::UnknownField(field.name.clone()))?;
                    if offset + size > fixed.len() {
                        return Err(DataLayoutError::FixedRegionTooSmall {
                            need: offset + size,
                            have: fixed.len(),
                        });
                    }
                    value.write_fixed(&mut fixed[offset..offset + size]);
                }
                FieldLocation::Variable { index } => {
                    let bytes = value.variable_bytes().ok_or_else(|| DataLayoutError::TypeMismatch {
                        name: field.name.clone(),
                        expected: "variable-length type",
                        found: value.value_type().name(),
                    })?;
                    let start = var_data.len() as u32;
                    var_data.extend_from_slice(&bytes);
                    var_entries[index] = (start, bytes.len() as u32);
                }
            }
        }

        let mut var_index = vec![0u8; var_entries.len() * 8];
        for (i, (offset, len)) in var_entries.iter().enumerate() {
            LittleEndian::write_u32(&mut var_index[i * 8..i * 8 + 4], *offset);
            LittleEndian::write_u32(&mut var_index[i * 8 + 4..i * 8 + 8], *len);
        }

        Ok((fixed, var_index, var_data))
    }

    /// Reconstructs a `DataLayout` from its three packed regions. `fixed`
    /// and `var_index` may be smaller than `schema` expects, when the
    /// record was packed against an older schema version that declared
    /// fewer fields: any field whose slot falls outside the provided
    /// regions is simply left unavailable (see [`Self::is_available`])
    /// rather than treated as an error, so a newer reader can still make
    /// sense of an older record.
    pub fn unpack(
        schema: Arc<Schema>,
        fixed: &[u8],
        var_index: &[u8],
        var_data: &[u8],
    ) -> Result<DataLayout, DataLayoutError> {
        let slot_count = var_index.len() / 8;
        let mut layout = DataLayout::new(schema.clone());
        for field in schema.fields() {
            match field.location {
                FieldLocation::Fixed { offset } => {
                    let t = field
                        .value_type()
                        .ok_or_else(|| DataLayoutError::UnknownField(field.name.clone()))?;
                    let size = t.fixed_size().expect("fixed field always has a fixed size");
                    if offset + size > fixed.len() {
                        continue;
                    }
                    let value = Value::read_fixed(t, &fixed[offset..offset + size]);
                    layout.values.insert(field.name.clone(), value);
                }
                FieldLocation::Variable { index } => {
                    if index >= slot_count {
                        continue;
                    }
                    let offset = LittleEndian::read_u32(&var_index[index * 8..index * 8 + 4]) as usize;
                    let len = LittleEndian::read_u32(&var_index[index * 8 + 4..index * 8 + 8]) as usize;
                    if offset + len > var_data.len() {
                        return Err(DataLayoutError::VarIndexOutOfBounds {
                            index,
                            len: var_data.len(),
                        });
                    }
                    if len == 0 {
                        continue;
                    }
                    let t = field
                        .value_type()
                        .ok_or_else(|| DataLayoutError::UnknownField(field.name.clone()))?;
                    let value = Value::from_variable_bytes(t, &var_data[offset..offset + len])?;
                    layout.values.insert(field.name.clone(), value);
                }
            }
        }
        Ok(layout)
    }

    /// Schema-evolution binding: copies every field `other` has staged that
    /// `self`'s schema also declares with a matching type, leaving fields
    /// `self` doesn't know about behind. This is how an older reader can
    /// consume records written by a newer writer with extra fields, and
    /// vice versa.
    pub fn map_layout(&mut self, other: &DataLayout) {
        for (name, value) in other.values.iter() {
            if let Some(field) = self.schema.get(name) {
                if field.value_type() == Some(value.value_type()) {
                    self.values.insert(name.clone(), value.clone());
                }
            }
        }
    }

    pub fn as_json(&self, profile: JsonProfile) -> serde_json::Value {
        json::layout_to_json(self, profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::{FieldAnnotations, SchemaBuilder};

    fn sample_schema() -> Arc<Schema> {
        let mut b = SchemaBuilder::new();
        b.add_field("count", ValueType::U32, FieldAnnotations::default());
        b.add_field("temp", ValueType::F32, FieldAnnotations::default());
        b.add_field("label", ValueType::Str, FieldAnnotations::default());
        Arc::new(b.build())
    }

    #[test]
    fn pack_and_unpack_round_trips_all_fields() {
        let schema = sample_schema();
        let mut layout = DataLayout::new(schema.clone());
        layout.set("count", Value::U32(42)).unwrap();
        layout.set("temp", Value::F32(36.6)).unwrap();
        layout.set("label", Value::Str("probe-1".to_string())).unwrap();

        let (fixed, var_index, var_data) = layout.pack().unwrap();
        let back = DataLayout::unpack(schema, &fixed, &var_index, &var_data).unwrap();

        assert_eq!(back.find_data_piece_value::<u32>("count"), Some(42));
        assert_eq!(back.find_data_piece_value::<f32>("temp"), Some(36.6));
        assert_eq!(back.find_data_piece_string("label"), Some("probe-1".to_string()));
    }

    #[test]
    fn unset_fields_are_absent_after_unpack() {
        let schema = sample_schema();
        let mut layout = DataLayout::new(schema.clone());
        layout.set("count", Value::U32(1)).unwrap();
        let (fixed, var_index, var_data) = layout.pack().unwrap();
        let back = DataLayout::unpack(schema, &fixed, &var_index, &var_data).unwrap();
        assert_eq!(back.find_data_piece_string("label"), None);
    }

    #[test]
    fn set_rejects_type_mismatch() {
        let schema = sample_schema();
        let mut layout = DataLayout::new(schema);
        let err = layout.set("count", Value::Str("nope".to_string())).unwrap_err();
        assert!(matches!(err, DataLayoutError::TypeMismatch { .. }));
    }

    #[test]
    fn map_layout_copies_matching_fields_across_schema_versions() {
        let mut old_builder = SchemaBuilder::new();
        old_builder.add_field("count", ValueType::U32, FieldAnnotations::default());
        let old_schema = Arc::new(old_builder.build());
        let mut old_layout = DataLayout::new(old_schema);
        old_layout.set("count", Value::U32(7)).unwrap();

        let new_schema = sample_schema();
        let mut new_layout = DataLayout::new(new_schema);
        new_layout.map_layout(&old_layout);
        assert_eq!(new_layout.find_data_piece_value::<u32>("count"), Some(7));
        assert_eq!(new_layout.find_data_piece_string("label"), None);
    }

    #[test]
    fn unpacking_an_older_payload_against_a_newer_schema_falls_back_to_the_default() {
        let mut old_builder = SchemaBuilder::new();
        old_builder.add_field("count", ValueType::U32, FieldAnnotations::default());
        let old_schema = Arc::new(old_builder.build());
        let mut old_layout = DataLayout::new(old_schema);
        old_layout.set("count", Value::U32(9)).unwrap();
        let (fixed, var_index, var_data) = old_layout.pack().unwrap();

        let mut new_builder = SchemaBuilder::new();
        new_builder.add_field("count", ValueType::U32, FieldAnnotations::default());
        new_builder.add_field(
            "scale",
            ValueType::F32,
            FieldAnnotations {
                default: Some("1.5".to_string()),
                ..Default::default()
            },
        );
        let new_schema = Arc::new(new_builder.build());

        let back = DataLayout::unpack(new_schema, &fixed, &var_index, &var_data).unwrap();
        assert!(back.is_available("count"));
        assert!(!back.is_available("scale"));
        assert_eq!(back.find_data_piece_value::<u32>("count"), Some(9));
        assert_eq!(back.find_data_piece_value::<f32>("scale"), Some(1.5));
    }
}
