//! Property tests for invariants that are easier to state for "any input"
//! than to enumerate by hand: `DataLayout` offset assignment is a pure
//! function of field order and type, and bucket decimation always keeps
//! the candidate nearest the bucket center no matter what order records
//! arrive in.

use proptest::prelude::*;
use std::collections::HashMap;
use vrs::datalayout::schema::{FieldAnnotations, SchemaBuilder};
use vrs::datalayout::value::ValueType;
use vrs::filter::decimate::{DecimateAction, Decimator, DefaultDecimator};
use vrs::model::{RecordType, RecordableTypeId, StreamId};

const FIXED_TYPES: &[ValueType] = &[
    ValueType::Bool,
    ValueType::I8,
    ValueType::I16,
    ValueType::I32,
    ValueType::I64,
    ValueType::U8,
    ValueType::U16,
    ValueType::U32,
    ValueType::U64,
    ValueType::F32,
    ValueType::F64,
];

fn value_type_strategy() -> impl Strategy<Value = ValueType> {
    (0..FIXED_TYPES.len()).prop_map(|i| FIXED_TYPES[i])
}

fn build_schema(types: &[ValueType]) -> vrs::datalayout::schema::Schema {
    let mut builder = SchemaBuilder::new();
    for (i, ty) in types.iter().enumerate() {
        builder.add_field(format!("f{i}"), *ty, FieldAnnotations::default());
    }
    builder.build()
}

proptest! {
    /// Building the same field-type sequence twice always assigns the same
    /// offsets, and every fixed offset equals the sum of the fixed sizes of
    /// the fields declared before it.
    #[test]
    fn schema_offsets_are_a_deterministic_function_of_declaration_order(
        types in prop::collection::vec(value_type_strategy(), 1..12)
    ) {
        let a = build_schema(&types);
        let b = build_schema(&types);

        let mut expected_offset = 0usize;
        for (i, ty) in types.iter().enumerate() {
            let name = format!("f{i}");
            let field_a = a.get(&name).unwrap();
            let field_b = b.get(&name).unwrap();
            prop_assert_eq!(&field_a.location, &field_b.location);

            let size = ty.fixed_size().unwrap();
            match field_a.location {
                vrs::datalayout::schema::FieldLocation::Fixed { offset } => {
                    prop_assert_eq!(offset, expected_offset);
                    expected_offset += size;
                }
                vrs::datalayout::schema::FieldLocation::Variable { .. } => {
                    prop_assert!(false, "fixed-size type assigned a variable slot");
                }
            }
        }
        prop_assert_eq!(a.fixed_region_size(), expected_offset);
    }
}

fn stream_id() -> StreamId {
    StreamId::new(RecordableTypeId(200), 0)
}

proptest! {
    /// Feeding the same set of (distinct) timestamps within one bucket in any
    /// order always ends with the decimator keeping the one closest to the
    /// bucket's center.
    #[test]
    fn bucket_decimation_keeps_the_timestamp_nearest_the_center(
        offsets in prop::collection::hash_set(1i32..900, 1..8),
        order_seed in 0u64..1000,
    ) {
        let bucket_interval = 1.0;
        let bucket_max_delta = 0.5;
        let center = bucket_interval / 2.0;

        let mut timestamps: Vec<f64> = offsets.iter().map(|m| *m as f64 / 1000.0).collect();
        // Deterministic shuffle from the seed, no time/randomness source needed.
        let n = timestamps.len();
        for i in 0..n {
            let j = ((order_seed as usize).wrapping_add(i * 7919)) % n;
            timestamps.swap(i, j);
        }

        let mut decimator = DefaultDecimator::new(HashMap::new(), bucket_interval, bucket_max_delta);
        for &ts in &timestamps {
            let action = decimator.decimate(stream_id(), ts, RecordType::Data);
            prop_assert_eq!(action, DecimateAction::Buffered);
        }
        let kept = decimator.flush();
        prop_assert_eq!(kept.len(), 1);

        let expected = timestamps
            .iter()
            .copied()
            .min_by(|a, b| (a - center).abs().partial_cmp(&(b - center).abs()).unwrap())
            .unwrap();
        prop_assert!((kept[0].1 - expected).abs() < 1e-9);
    }
}
