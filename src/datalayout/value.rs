//! Typed field values a `DataLayout` piece can hold.

use crate::error::DataLayoutError;
use byteorder::{ByteOrder, LittleEndian};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Str,
    Bytes,
}

impl ValueType {
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Bool => "bool",
            ValueType::I8 => "i8",
            ValueType::I16 => "i16",
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::U8 => "u8",
            ValueType::U16 => "u16",
            ValueType::U32 => "u32",
            ValueType::U64 => "u64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
            ValueType::Str => "string",
            ValueType::Bytes => "bytes",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => ValueType::Bool,
            "i8" => ValueType::I8,
            "i16" => ValueType::I16,
            "i32" => ValueType::I32,
            "i64" => ValueType::I64,
            "u8" => ValueType::U8,
            "u16" => ValueType::U16,
            "u32" => ValueType::U32,
            "u64" => ValueType::U64,
            "f32" => ValueType::F32,
            "f64" => ValueType::F64,
            "string" => ValueType::Str,
            "bytes" => ValueType::Bytes,
            _ => return None,
        })
    }

    /// Fixed-region footprint in bytes, or `None` for variable-length types
    /// which live in the var-data region instead.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            ValueType::Bool | ValueType::I8 | ValueType::U8 => Some(1),
            ValueType::I16 | ValueType::U16 => Some(2),
            ValueType::I32 | ValueType::U32 | ValueType::F32 => Some(4),
            ValueType::I64 | ValueType::U64 | ValueType::F64 => Some(8),
            ValueType::Str | ValueType::Bytes => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::I8(_) => ValueType::I8,
            Value::I16(_) => ValueType::I16,
            Value::I32(_) => ValueType::I32,
            Value::I64(_) => ValueType::I64,
            Value::U8(_) => ValueType::U8,
            Value::U16(_) => ValueType::U16,
            Value::U32(_) => ValueType::U32,
            Value::U64(_) => ValueType::U64,
            Value::F32(_) => ValueType::F32,
            Value::F64(_) => ValueType::F64,
            Value::Str(_) => ValueType::Str,
            Value::Bytes(_) => ValueType::Bytes,
        }
    }

    /// Raw bytes for a variable-length value, stored verbatim in the
    /// var-data region (`Str` as UTF-8 without a terminator).
    pub fn variable_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Value::Str(s) => Some(s.as_bytes().to_vec()),
            Value::Bytes(b) => Some(b.clone()),
            _ => None,
        }
    }

    pub fn from_variable_bytes(t: ValueType, bytes: &[u8]) -> Result<Value, DataLayoutError> {
        match t {
            ValueType::Str => Ok(Value::Str(String::from_utf8_lossy(bytes).into_owned())),
            ValueType::Bytes => Ok(Value::Bytes(bytes.to_vec())),
            other => Err(DataLayoutError::TypeMismatch {
                name: String::new(),
                expected: "variable-length type",
                found: other.name(),
            }),
        }
    }

    /// Writes a fixed-size value's little-endian bytes into `buf`, which
    /// must be exactly `value_type().fixed_size()` bytes.
    pub fn write_fixed(&self, buf: &mut [u8]) {
        match self {
            Value::Bool(v) => buf[0] = *v as u8,
            Value::I8(v) => buf[0] = *v as u8,
            Value::U8(v) => buf[0] = *v,
            Value::I16(v) => LittleEndian::write_i16(buf, *v),
            Value::U16(v) => LittleEndian::write_u16(buf, *v),
            Value::I32(v) => LittleEndian::write_i32(buf, *v),
            Value::U32(v) => LittleEndian::write_u32(buf, *v),
            Value::F32(v) => LittleEndian::write_f32(buf, *v),
            Value::I64(v) => LittleEndian::write_i64(buf, *v),
            Value::U64(v) => LittleEndian::write_u64(buf, *v),
            Value::F64(v) => LittleEndian::write_f64(buf, *v),
            Value::Str(_) | Value::Bytes(_) => {
                panic!("variable-length values are not written to the fixed region")
            }
        }
    }

    pub fn read_fixed(t: ValueType, buf: &[u8]) -> Value {
        match t {
            ValueType::Bool => Value::Bool(buf[0] != 0),
            ValueType::I8 => Value::I8(buf[0] as i8),
            ValueType::U8 => Value::U8(buf[0]),
            ValueType::I16 => Value::I16(LittleEndian::read_i16(buf)),
            ValueType::U16 => Value::U16(LittleEndian::read_u16(buf)),
            ValueType::I32 => Value::I32(LittleEndian::read_i32(buf)),
            ValueType::U32 => Value::U32(LittleEndian::read_u32(buf)),
            ValueType::F32 => Value::F32(LittleEndian::read_f32(buf)),
            ValueType::I64 => Value::I64(LittleEndian::read_i64(buf)),
            ValueType::U64 => Value::U64(LittleEndian::read_u64(buf)),
            ValueType::F64 => Value::F64(LittleEndian::read_f64(buf)),
            ValueType::Str | ValueType::Bytes => {
                panic!("variable-length values are not read from the fixed region")
            }
        }
    }

    /// Parses a schema-declared default (stored as plain text, e.g. in JSON
    /// schema files) into a typed value. `Bytes` has no textual default
    /// representation, so it always returns `None`.
    pub fn parse_default(t: ValueType, raw: &str) -> Option<Value> {
        Some(match t {
            ValueType::Bool => Value::Bool(raw.parse().ok()?),
            ValueType::I8 => Value::I8(raw.parse().ok()?),
            ValueType::I16 => Value::I16(raw.parse().ok()?),
            ValueType::I32 => Value::I32(raw.parse().ok()?),
            ValueType::I64 => Value::I64(raw.parse().ok()?),
            ValueType::U8 => Value::U8(raw.parse().ok()?),
            ValueType::U16 => Value::U16(raw.parse().ok()?),
            ValueType::U32 => Value::U32(raw.parse().ok()?),
            ValueType::U64 => Value::U64(raw.parse().ok()?),
            ValueType::F32 => Value::F32(raw.parse().ok()?),
            ValueType::F64 => Value::F64(raw.parse().ok()?),
            ValueType::Str => Value::Str(raw.to_string()),
            ValueType::Bytes => return None,
        })
    }

    pub fn as_string(&self) -> String {
        match self {
            Value::Bool(v) => v.to_string(),
            Value::I8(v) => v.to_string(),
            Value::I16(v) => v.to_string(),
            Value::I32(v) => v.to_string(),
            Value::I64(v) => v.to_string(),
            Value::U8(v) => v.to_string(),
            Value::U16(v) => v.to_string(),
            Value::U32(v) => v.to_string(),
            Value::U64(v) => v.to_string(),
            Value::F32(v) => v.to_string(),
            Value::F64(v) => v.to_string(),
            Value::Str(v) => v.clone(),
            Value::Bytes(v) => format!("<{} bytes>", v.len()),
        }
    }
}

/// Converts a typed `Value` back into a concrete Rust type, used by
/// `DataLayout::find_data_piece_value::<T>`.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! impl_from_value {
    ($t:ty, $variant:ident) => {
        impl FromValue for $t {
            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(*v),
                    _ => None,
                }
            }
        }
    };
}

impl_from_value!(bool, Bool);
impl_from_value!(i8, I8);
impl_from_value!(i16, I16);
impl_from_value!(i32, I32);
impl_from_value!(i64, I64);
impl_from_value!(u8, U8);
impl_from_value!(u16, U16);
impl_from_value!(u32, U32);
impl_from_value!(u64, U64);
impl_from_value!(f32, F32);
impl_from_value!(f64, F64);

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Str(v) => Some(v.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_values_round_trip_through_bytes() {
        let v = Value::I32(-12345);
        let mut buf = [0u8; 4];
        v.write_fixed(&mut buf);
        assert_eq!(Value::read_fixed(ValueType::I32, &buf), v);
    }

    #[test]
    fn from_value_extracts_typed_accessors() {
        let v = Value::F64(3.25);
        assert_eq!(f64::from_value(&v), Some(3.25));
        assert_eq!(i32::from_value(&v), None);
    }

    #[test]
    fn variable_bytes_round_trip_for_strings() {
        let v = Value::Str("hello".to_string());
        let bytes = v.variable_bytes().unwrap();
        let back = Value::from_variable_bytes(ValueType::Str, &bytes).unwrap();
        assert_eq!(back, v);
    }
}
