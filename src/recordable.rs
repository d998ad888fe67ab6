//! `Recordable`: the trait a stream-producing object implements to hand
//! its configuration/state snapshots to a [`crate::record_manager::RecordManager`].
//!
//! Kept deliberately small — two overridable methods — the same way the
//! original separates "what a device's config/state looks like" from "how
//! records get buffered and written", so a device driver only has to know
//! how to describe itself, never how the write pipeline works.

use crate::datalayout::DataLayout;
use crate::error::DataLayoutError;
use crate::model::StreamId;

/// Up to two `DataLayout` references plus up to three opaque byte chunks,
/// mirroring the fixed-arity composition the format allows per record:
/// most records are one `DataLayout` (metadata) and/or a couple of raw
/// chunks (image bytes, audio bytes), never an open-ended list.
#[derive(Default)]
pub struct DataSource<'a> {
    pub layouts: [Option<&'a DataLayout>; 2],
    pub chunks: [Option<&'a [u8]>; 3],
}

impl<'a> DataSource<'a> {
    pub fn new() -> Self {
        DataSource::default()
    }

    pub fn with_layout(mut self, slot: usize, layout: &'a DataLayout) -> Self {
        self.layouts[slot] = Some(layout);
        self
    }

    pub fn with_chunk(mut self, slot: usize, chunk: &'a [u8]) -> Self {
        self.chunks[slot] = Some(chunk);
        self
    }

    /// Concatenates every staged layout's packed regions and every chunk,
    /// in slot order, into one owned record payload. Fails rather than
    /// silently shipping a truncated record if any staged layout can't be
    /// packed against its own schema.
    pub fn to_payload(&self) -> Result<Vec<u8>, DataLayoutError> {
        let mut out = Vec::new();
        for layout in self.layouts.iter().flatten() {
            let (fixed, var_index, var_data) = layout.pack()?;
            out.extend_from_slice(&fixed);
            out.extend_from_slice(&var_index);
            out.extend_from_slice(&var_data);
        }
        for chunk in self.chunks.iter().flatten() {
            out.extend_from_slice(chunk);
        }
        Ok(out)
    }
}

/// Implemented by stream-producing objects (cameras, IMUs, ...) to
/// describe the configuration/state they emit. Both methods return a
/// format version and the data to pack, letting `RecordManager` do the
/// actual buffering/copying. Either can fail the same way
/// `DataSource::to_payload` can, e.g. a field set to a value that no
/// longer fits the schema's fixed region.
pub trait Recordable {
    fn stream_id(&self) -> StreamId;

    fn create_configuration_record(&mut self) -> Result<(u32, Vec<u8>), DataLayoutError>;

    fn create_state_record(&mut self) -> Result<(u32, Vec<u8>), DataLayoutError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datalayout::schema::{FieldAnnotations, SchemaBuilder};
    use crate::datalayout::value::{Value, ValueType};
    use std::sync::Arc;

    #[test]
    fn data_source_concatenates_layouts_then_chunks() {
        let mut b = SchemaBuilder::new();
        b.add_field("x", ValueType::U8, FieldAnnotations::default());
        let schema = Arc::new(b.build());
        let mut layout = DataLayout::new(schema);
        layout.set("x", Value::U8(7)).unwrap();

        let chunk = [1u8, 2, 3];
        let source = DataSource::new().with_layout(0, &layout).with_chunk(0, &chunk);
        let payload = source.to_payload().unwrap();
        assert_eq!(payload[0], 7); // fixed region byte
        assert!(payload.ends_with(&[1, 2, 3]));
    }
}
