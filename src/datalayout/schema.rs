//! Self-describing field schema for a `DataLayout`.
//!
//! A schema is an explicit field descriptor list built once at
//! construction, with offsets computed once rather than re-derived on
//! every access. Fixed-size fields get a byte offset into the fixed region;
//! variable-length fields get a slot index into the var-index table.

use super::value::ValueType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Where a field's storage lives: a byte offset in the fixed region, or a
/// slot in the variable-length index table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldLocation {
    Fixed { offset: usize },
    Variable { index: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(flatten)]
    pub location: FieldLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldDescriptor {
    pub fn value_type(&self) -> Option<ValueType> {
        ValueType::from_name(&self.type_name)
    }
}

/// Field descriptor list plus precomputed total fixed-region size, built
/// once by [`SchemaBuilder`] and then immutable for the life of the layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    fields: IndexMap<String, FieldDescriptor>,
    fixed_region_size: usize,
    variable_field_count: usize,
}

impl Schema {
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.values()
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    pub fn fixed_region_size(&self) -> usize {
        self.fixed_region_size
    }

    pub fn variable_field_count(&self) -> usize {
        self.variable_field_count
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Builds a [`Schema`] by appending fields in declaration order, assigning
/// fixed-region offsets and variable-index slots as it goes.
#[derive(Default)]
pub struct SchemaBuilder {
    fields: IndexMap<String, FieldDescriptor>,
    next_fixed_offset: usize,
    next_variable_index: usize,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        SchemaBuilder::default()
    }

    pub fn add_field(
        &mut self,
        name: impl Into<String>,
        value_type: ValueType,
        annotations: FieldAnnotations,
    ) -> &mut Self {
        let name = name.into();
        let location = match value_type.fixed_size() {
            Some(size) => {
                let offset = self.next_fixed_offset;
                self.next_fixed_offset += size;
                FieldLocation::Fixed { offset }
            }
            None => {
                let index = self.next_variable_index;
                self.next_variable_index += 1;
                FieldLocation::Variable { index }
            }
        };
        self.fields.insert(
            name.clone(),
            FieldDescriptor {
                name,
                type_name: value_type.name().to_string(),
                location,
                default: annotations.default,
                min: annotations.min,
                max: annotations.max,
                unit: annotations.unit,
                description: annotations.description,
            },
        );
        self
    }

    pub fn build(self) -> Schema {
        Schema {
            fields: self.fields,
            fixed_region_size: self.next_fixed_offset,
            variable_field_count: self.next_variable_index,
        }
    }
}

/// Optional metadata attached to a field at schema-build time.
#[derive(Debug, Clone, Default)]
pub struct FieldAnnotations {
    pub default: Option<String>,
    pub min: Option<String>,
    pub max: Option<String>,
    pub unit: Option<String>,
    pub description: Option<String>,
}
