//! # Type Descriptors
//!
//! A [`TypeDescriptor`] sizes, encodes and decodes one value shape. Every
//! descriptor satisfies two laws for any value it accepts:
//!
//! - `size_of(v) == encode_to_vec(v).len()`
//! - `decode(encode(v)) == v`
//!
//! ## Wire Format
//! - Integers and floats are little-endian and fixed width
//! - `bool` is one byte, nonzero decodes to `true`
//! - `void` occupies no bytes
//! - Strings are a length prefix (the index type, `uint_8` by default) followed
//!   by UTF-8 bytes, no terminator
//! - Variable arrays are a count prefix followed by the elements; fixed arrays
//!   are the elements only
//! - Structs are their fields in declaration order
//! - Unions are a `uint_8` tag followed by the selected variant

use crate::error::{constants, ProtocolError, Result};
use crate::schema::value::Value;
use bytes::{Buf, BufMut};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Fixed-width scalar types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    /// Carried as `f64` and narrowed on encode; values that are not exactly
    /// representable in `f32` decode to the nearest `f32`
    Float32,
    Float64,
    Bool,
    Void,
}

impl Primitive {
    /// Look up a primitive by its schema name; `uint_8` and `uint8` are both accepted
    pub fn from_name(name: &str) -> Option<Self> {
        let p = match name.replace('_', "").as_str() {
            "int8" => Primitive::Int8,
            "uint8" => Primitive::Uint8,
            "int16" => Primitive::Int16,
            "uint16" => Primitive::Uint16,
            "int32" => Primitive::Int32,
            "uint32" => Primitive::Uint32,
            "int64" => Primitive::Int64,
            "uint64" => Primitive::Uint64,
            "float32" => Primitive::Float32,
            "float64" => Primitive::Float64,
            "bool" => Primitive::Bool,
            "void" => Primitive::Void,
            _ => return None,
        };
        Some(p)
    }

    pub fn name(self) -> &'static str {
        match self {
            Primitive::Int8 => "int_8",
            Primitive::Uint8 => "uint_8",
            Primitive::Int16 => "int_16",
            Primitive::Uint16 => "uint_16",
            Primitive::Int32 => "int_32",
            Primitive::Uint32 => "uint_32",
            Primitive::Int64 => "int_64",
            Primitive::Uint64 => "uint_64",
            Primitive::Float32 => "float_32",
            Primitive::Float64 => "float_64",
            Primitive::Bool => "bool",
            Primitive::Void => "void",
        }
    }

    /// Encoded width in bytes
    pub const fn width(self) -> usize {
        match self {
            Primitive::Void => 0,
            Primitive::Int8 | Primitive::Uint8 | Primitive::Bool => 1,
            Primitive::Int16 | Primitive::Uint16 => 2,
            Primitive::Int32 | Primitive::Uint32 | Primitive::Float32 => 4,
            Primitive::Int64 | Primitive::Uint64 | Primitive::Float64 => 8,
        }
    }

    pub fn is_integer(self) -> bool {
        self.int_range().is_some()
    }

    /// Inclusive range representable by an integer primitive
    pub fn int_range(self) -> Option<(i64, i64)> {
        let range = match self {
            Primitive::Int8 => (i64::from(i8::MIN), i64::from(i8::MAX)),
            Primitive::Uint8 => (0, i64::from(u8::MAX)),
            Primitive::Int16 => (i64::from(i16::MIN), i64::from(i16::MAX)),
            Primitive::Uint16 => (0, i64::from(u16::MAX)),
            Primitive::Int32 => (i64::from(i32::MIN), i64::from(i32::MAX)),
            Primitive::Uint32 => (0, i64::from(u32::MAX)),
            Primitive::Int64 => (i64::MIN, i64::MAX),
            // values are carried as i64
            Primitive::Uint64 => (0, i64::MAX),
            Primitive::Float32 | Primitive::Float64 | Primitive::Bool | Primitive::Void => {
                return None
            }
        };
        Some(range)
    }

    fn check_int(self, v: i64) -> Result<()> {
        match self.int_range() {
            Some((min, max)) if v >= min && v <= max => Ok(()),
            Some(_) => Err(ProtocolError::ValueOutOfRange {
                value: v.to_string(),
                target: self.name(),
            }),
            None => Err(ProtocolError::TypeMismatch {
                expected: self.name(),
                found: "int",
            }),
        }
    }

    /// Validate that `value` can be encoded as this primitive
    pub fn check(self, value: &Value) -> Result<()> {
        match (self, value) {
            (Primitive::Void, Value::Void)
            | (Primitive::Bool, Value::Bool(_))
            | (Primitive::Float32 | Primitive::Float64, Value::Float(_)) => Ok(()),
            (p, Value::Int(v)) if p.is_integer() => p.check_int(*v),
            (p, other) => Err(ProtocolError::TypeMismatch {
                expected: p.name(),
                found: other.kind(),
            }),
        }
    }

    pub fn encode<B: BufMut>(self, value: &Value, out: &mut B) -> Result<()> {
        self.check(value)?;
        match (self, value) {
            (Primitive::Bool, Value::Bool(b)) => out.put_u8(u8::from(*b)),
            // lossy for values outside f32 precision
            (Primitive::Float32, Value::Float(f)) => out.put_f32_le(*f as f32),
            (Primitive::Float64, Value::Float(f)) => out.put_f64_le(*f),
            (p, Value::Int(v)) => p.put_int(*v, out),
            _ => {}
        }
        Ok(())
    }

    // range already checked
    fn put_int<B: BufMut>(self, v: i64, out: &mut B) {
        match self {
            Primitive::Int8 => out.put_i8(v as i8),
            Primitive::Uint8 => out.put_u8(v as u8),
            Primitive::Int16 => out.put_i16_le(v as i16),
            Primitive::Uint16 => out.put_u16_le(v as u16),
            Primitive::Int32 => out.put_i32_le(v as i32),
            Primitive::Uint32 => out.put_u32_le(v as u32),
            Primitive::Int64 => out.put_i64_le(v),
            Primitive::Uint64 => out.put_u64_le(v as u64),
            Primitive::Float32 | Primitive::Float64 | Primitive::Bool | Primitive::Void => {}
        }
    }

    pub fn decode(self, buf: &mut &[u8]) -> Result<Value> {
        ensure_remaining(buf, self.width())?;
        let value = match self {
            Primitive::Void => Value::Void,
            Primitive::Bool => Value::Bool(buf.get_u8() != 0),
            Primitive::Int8 => Value::Int(i64::from(buf.get_i8())),
            Primitive::Uint8 => Value::Int(i64::from(buf.get_u8())),
            Primitive::Int16 => Value::Int(i64::from(buf.get_i16_le())),
            Primitive::Uint16 => Value::Int(i64::from(buf.get_u16_le())),
            Primitive::Int32 => Value::Int(i64::from(buf.get_i32_le())),
            Primitive::Uint32 => Value::Int(i64::from(buf.get_u32_le())),
            Primitive::Int64 => Value::Int(buf.get_i64_le()),
            Primitive::Uint64 => {
                let raw = buf.get_u64_le();
                let v = i64::try_from(raw).map_err(|_| ProtocolError::ValueOutOfRange {
                    value: raw.to_string(),
                    target: "uint_64",
                })?;
                Value::Int(v)
            }
            Primitive::Float32 => Value::Float(f64::from(buf.get_f32_le())),
            Primitive::Float64 => Value::Float(buf.get_f64_le()),
        };
        Ok(value)
    }

    fn check_count(self, count: usize) -> Result<()> {
        let v = i64::try_from(count).map_err(|_| ProtocolError::ValueOutOfRange {
            value: count.to_string(),
            target: self.name(),
        })?;
        self.check_int(v)
    }

    fn write_count<B: BufMut>(self, count: usize, out: &mut B) -> Result<()> {
        self.check_count(count)?;
        self.put_int(count as i64, out);
        Ok(())
    }

    fn read_count(self, buf: &mut &[u8]) -> Result<usize> {
        match self.decode(buf)? {
            Value::Int(v) => usize::try_from(v).map_err(|_| ProtocolError::ValueOutOfRange {
                value: v.to_string(),
                target: "count",
            }),
            other => Err(ProtocolError::TypeMismatch {
                expected: constants::ERR_NON_INTEGER_INDEX,
                found: other.kind(),
            }),
        }
    }
}

fn ensure_remaining(buf: &[u8], needed: usize) -> Result<()> {
    if buf.len() < needed {
        return Err(ProtocolError::Truncated {
            needed,
            remaining: buf.len(),
        });
    }
    Ok(())
}

/// Runtime codec for one schema type
#[derive(Debug, Clone)]
pub enum TypeDescriptor {
    Primitive(Primitive),
    /// UTF-8 string with a length prefix of type `index`
    String { index: Primitive },
    /// Fixed (`size` only) or variable (`index`, with `size` as an upper bound) array
    Array {
        element: Box<TypeDescriptor>,
        size: Option<usize>,
        index: Option<Primitive>,
    },
    Struct(Arc<StructType>),
    Union(Arc<UnionType>),
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TypeDescriptor::Primitive(a), TypeDescriptor::Primitive(b)) => a == b,
            (TypeDescriptor::String { index: a }, TypeDescriptor::String { index: b }) => a == b,
            (
                TypeDescriptor::Array {
                    element: ea,
                    size: sa,
                    index: ia,
                },
                TypeDescriptor::Array {
                    element: eb,
                    size: sb,
                    index: ib,
                },
            ) => sa == sb && ia == ib && ea == eb,
            // named types compare by identity; they may be self-referential
            (TypeDescriptor::Struct(a), TypeDescriptor::Struct(b)) => Arc::ptr_eq(a, b),
            (TypeDescriptor::Union(a), TypeDescriptor::Union(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl TypeDescriptor {
    /// String with the default `uint_8` length prefix
    pub fn string() -> Self {
        TypeDescriptor::String {
            index: Primitive::Uint8,
        }
    }

    pub fn fixed_array(element: TypeDescriptor, size: usize) -> Self {
        TypeDescriptor::Array {
            element: Box::new(element),
            size: Some(size),
            index: None,
        }
    }

    pub fn variable_array(element: TypeDescriptor, index: Primitive) -> Self {
        TypeDescriptor::Array {
            element: Box::new(element),
            size: None,
            index: Some(index),
        }
    }

    /// Human-readable type name for logs and errors
    pub fn describe(&self) -> String {
        match self {
            TypeDescriptor::Primitive(p) => p.name().to_string(),
            TypeDescriptor::String { index } => format!("string[{}]", index.name()),
            TypeDescriptor::Array {
                element,
                size,
                index,
            } => match (size, index) {
                (_, Some(i)) => format!("{}[{}]", element.describe(), i.name()),
                (Some(n), None) => format!("{}[{n}]", element.describe()),
                (None, None) => format!("{}[]", element.describe()),
            },
            TypeDescriptor::Struct(s) => s.name().to_string(),
            TypeDescriptor::Union(u) => u.name().to_string(),
        }
    }

    /// Encoded size, independent of the value, when there is one
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            TypeDescriptor::Primitive(p) => Some(p.width()),
            TypeDescriptor::Array {
                element,
                size: Some(n),
                index: None,
            } => element.fixed_size().map(|w| w * n),
            TypeDescriptor::Struct(s) => s
                .fields()
                .iter()
                .map(|f| f.descriptor.fixed_size())
                .sum(),
            _ => None,
        }
    }

    pub fn size_of(&self, value: &Value) -> Result<usize> {
        match self {
            TypeDescriptor::Primitive(p) => {
                p.check(value)?;
                Ok(p.width())
            }
            TypeDescriptor::String { index } => {
                let s = expect_string(value)?;
                index.check_count(s.len())?;
                Ok(index.width() + s.len())
            }
            TypeDescriptor::Array {
                element,
                size,
                index,
            } => {
                let items = expect_array(value)?;
                check_array_len(*size, *index, items.len())?;
                let prefix = index.map_or(0, Primitive::width);
                items
                    .iter()
                    .map(|item| element.size_of(item))
                    .sum::<Result<usize>>()
                    .map(|body| prefix + body)
            }
            TypeDescriptor::Struct(s) => s
                .fields()
                .iter()
                .map(|f| f.descriptor.size_of(s.field_value(value, &f.name)?))
                .sum(),
            TypeDescriptor::Union(u) => {
                let (variant, inner) = u.select(value)?;
                Ok(1 + variant.descriptor.size_of(inner)?)
            }
        }
    }

    pub fn encode<B: BufMut>(&self, value: &Value, out: &mut B) -> Result<()> {
        match self {
            TypeDescriptor::Primitive(p) => p.encode(value, out),
            TypeDescriptor::String { index } => {
                let s = expect_string(value)?;
                index.write_count(s.len(), out)?;
                out.put_slice(s.as_bytes());
                Ok(())
            }
            TypeDescriptor::Array {
                element,
                size,
                index,
            } => {
                let items = expect_array(value)?;
                check_array_len(*size, *index, items.len())?;
                if let Some(index) = index {
                    index.write_count(items.len(), out)?;
                }
                for item in items {
                    element.encode(item, out)?;
                }
                Ok(())
            }
            TypeDescriptor::Struct(s) => {
                for field in s.fields() {
                    field
                        .descriptor
                        .encode(s.field_value(value, &field.name)?, out)?;
                }
                Ok(())
            }
            TypeDescriptor::Union(u) => {
                let (variant, inner) = u.select(value)?;
                out.put_u8(variant.tag);
                variant.descriptor.encode(inner, out)
            }
        }
    }

    /// Encode into a freshly allocated buffer of exactly `size_of(value)` bytes
    pub fn encode_to_vec(&self, value: &Value) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.size_of(value)?);
        self.encode(value, &mut out)?;
        Ok(out)
    }

    /// Decode one value, advancing `buf` past it
    pub fn decode(&self, buf: &mut &[u8]) -> Result<Value> {
        match self {
            TypeDescriptor::Primitive(p) => p.decode(buf),
            TypeDescriptor::String { index } => {
                let len = index.read_count(buf)?;
                ensure_remaining(buf, len)?;
                let (head, rest) = buf.split_at(len);
                let s = std::str::from_utf8(head).map_err(|_| ProtocolError::InvalidUtf8)?;
                let value = Value::String(s.to_string());
                *buf = rest;
                Ok(value)
            }
            TypeDescriptor::Array {
                element,
                size,
                index,
            } => {
                let count = match index {
                    Some(index) => {
                        let count = index.read_count(buf)?;
                        check_array_len(*size, Some(*index), count)?;
                        count
                    }
                    None => size.unwrap_or(0),
                };
                // bounded by input length so a hostile prefix cannot force a huge allocation
                let mut items = Vec::with_capacity(count.min(buf.len()));
                for _ in 0..count {
                    items.push(element.decode(buf)?);
                }
                Ok(Value::Array(items))
            }
            TypeDescriptor::Struct(s) => {
                let mut fields = Vec::with_capacity(s.fields().len());
                for field in s.fields() {
                    fields.push((field.name.clone(), field.descriptor.decode(buf)?));
                }
                Ok(Value::Struct(fields))
            }
            TypeDescriptor::Union(u) => {
                ensure_remaining(buf, 1)?;
                let tag = buf.get_u8();
                let variant = u.variant(tag).ok_or(ProtocolError::UnknownTag(tag))?;
                Ok(Value::union(tag, variant.descriptor.decode(buf)?))
            }
        }
    }

    /// Decode one value from the front of `bytes`; trailing bytes are ignored
    pub fn decode_slice(&self, bytes: &[u8]) -> Result<Value> {
        let mut buf = bytes;
        self.decode(&mut buf)
    }
}

fn expect_string(value: &Value) -> Result<&str> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(ProtocolError::TypeMismatch {
            expected: "string",
            found: other.kind(),
        }),
    }
}

fn expect_array(value: &Value) -> Result<&[Value]> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(ProtocolError::TypeMismatch {
            expected: "array",
            found: other.kind(),
        }),
    }
}

fn check_array_len(size: Option<usize>, index: Option<Primitive>, len: usize) -> Result<()> {
    match (size, index) {
        (Some(expected), None) if len != expected => Err(ProtocolError::SizeMismatch {
            expected,
            actual: len,
        }),
        (Some(max), Some(_)) if len > max => Err(ProtocolError::SizeMismatch {
            expected: max,
            actual: len,
        }),
        (_, Some(index)) => index.check_count(len),
        _ => Ok(()),
    }
}

/// One struct field
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub descriptor: TypeDescriptor,
}

/// Struct codec: an ordered field list, declared before its fields are compiled
/// so that members may refer back to the struct itself
pub struct StructType {
    name: String,
    fields: OnceLock<Vec<Field>>,
}

impl StructType {
    pub(crate) fn declare(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fields: OnceLock::new(),
        })
    }

    pub(crate) fn define(&self, fields: Vec<Field>) -> Result<()> {
        self.fields
            .set(fields)
            .map_err(|_| ProtocolError::DuplicateSymbol(self.name.clone()))
    }

    /// Build a struct type directly from its fields
    pub fn new(name: &str, fields: Vec<Field>) -> Arc<Self> {
        let ty = Self::declare(name);
        // freshly declared, cannot already be defined
        let _ = ty.define(fields);
        ty
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in wire order
    pub fn fields(&self) -> &[Field] {
        self.fields.get().map(Vec::as_slice).unwrap_or(&[])
    }

    fn field_value<'v>(&self, value: &'v Value, field: &str) -> Result<&'v Value> {
        match value {
            Value::Struct(_) => value
                .field(field)
                .ok_or_else(|| ProtocolError::MissingField(format!("{}.{field}", self.name))),
            other => Err(ProtocolError::TypeMismatch {
                expected: "struct",
                found: other.kind(),
            }),
        }
    }
}

impl fmt::Debug for StructType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.fields().iter().map(|fd| fd.name.as_str()).collect();
        f.debug_struct("StructType")
            .field("name", &self.name)
            .field("fields", &names)
            .finish()
    }
}

/// One union alternative
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub name: String,
    pub tag: u8,
    pub descriptor: TypeDescriptor,
}

/// Union dispatch table: tag → variant type, and `Tag_<name>` → tag
pub struct UnionType {
    name: String,
    variants: OnceLock<BTreeMap<u8, Variant>>,
}

impl UnionType {
    pub(crate) fn declare(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            variants: OnceLock::new(),
        })
    }

    pub(crate) fn define(&self, variants: Vec<Variant>) -> Result<()> {
        let table = variants.into_iter().map(|v| (v.tag, v)).collect();
        self.variants
            .set(table)
            .map_err(|_| ProtocolError::DuplicateSymbol(self.name.clone()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Variants ordered by tag
    pub fn variants(&self) -> impl Iterator<Item = &Variant> {
        self.variants.get().into_iter().flat_map(BTreeMap::values)
    }

    pub fn variant(&self, tag: u8) -> Option<&Variant> {
        self.variants.get().and_then(|v| v.get(&tag))
    }

    /// The type selected by `tag`
    pub fn get(&self, tag: u8) -> Option<&TypeDescriptor> {
        self.variant(tag).map(|v| &v.descriptor)
    }

    /// Tag for a variant name, with or without the `Tag_` prefix
    pub fn tag_of(&self, name: &str) -> Option<u8> {
        let name = name.strip_prefix("Tag_").unwrap_or(name);
        self.variants().find(|v| v.name == name).map(|v| v.tag)
    }

    fn select<'v>(&self, value: &'v Value) -> Result<(&Variant, &'v Value)> {
        match value {
            Value::Union { tag, value } => {
                let variant = self.variant(*tag).ok_or(ProtocolError::UnknownTag(*tag))?;
                Ok((variant, value))
            }
            other => Err(ProtocolError::TypeMismatch {
                expected: "union",
                found: other.kind(),
            }),
        }
    }
}

impl fmt::Debug for UnionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<(u8, &str)> = self.variants().map(|v| (v.tag, v.name.as_str())).collect();
        f.debug_struct("UnionType")
            .field("name", &self.name)
            .field("variants", &tags)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn roundtrip(desc: &TypeDescriptor, value: &Value) -> Value {
        let bytes = desc.encode_to_vec(value).unwrap();
        assert_eq!(desc.size_of(value).unwrap(), bytes.len());
        desc.decode_slice(&bytes).unwrap()
    }

    #[test]
    fn test_integer_boundaries() {
        let cases = [
            (Primitive::Int8, i64::from(i8::MIN)),
            (Primitive::Int8, i64::from(i8::MAX)),
            (Primitive::Uint8, 255),
            (Primitive::Int16, i64::from(i16::MIN)),
            (Primitive::Uint16, 65_535),
            (Primitive::Int32, i64::from(i32::MIN)),
            (Primitive::Uint32, i64::from(u32::MAX)),
            (Primitive::Int64, i64::MIN),
            (Primitive::Uint64, i64::MAX),
        ];
        for (p, v) in cases {
            let desc = TypeDescriptor::Primitive(p);
            assert_eq!(roundtrip(&desc, &Value::Int(v)), Value::Int(v), "{p:?}");
        }
    }

    #[test]
    fn test_little_endian_layout() {
        let desc = TypeDescriptor::Primitive(Primitive::Uint32);
        assert_eq!(
            desc.encode_to_vec(&Value::Int(0x0102_0304)).unwrap(),
            vec![0x04, 0x03, 0x02, 0x01]
        );
    }

    #[test]
    fn test_out_of_range_rejected() {
        let desc = TypeDescriptor::Primitive(Primitive::Uint8);
        assert!(matches!(
            desc.encode_to_vec(&Value::Int(256)),
            Err(ProtocolError::ValueOutOfRange { .. })
        ));
        assert!(matches!(
            desc.encode_to_vec(&Value::Int(-1)),
            Err(ProtocolError::ValueOutOfRange { .. })
        ));
    }

    #[test]
    fn test_type_mismatch() {
        let desc = TypeDescriptor::Primitive(Primitive::Float32);
        assert!(matches!(
            desc.size_of(&Value::Int(1)),
            Err(ProtocolError::TypeMismatch {
                expected: "float_32",
                found: "int"
            })
        ));
    }

    #[test]
    fn test_bool_nonzero_is_true() {
        let desc = TypeDescriptor::Primitive(Primitive::Bool);
        assert_eq!(desc.decode_slice(&[7]).unwrap(), Value::Bool(true));
        assert_eq!(desc.decode_slice(&[0]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_void_is_empty() {
        let desc = TypeDescriptor::Primitive(Primitive::Void);
        assert!(desc.encode_to_vec(&Value::Void).unwrap().is_empty());
        assert_eq!(desc.decode_slice(&[]).unwrap(), Value::Void);
    }

    #[test]
    fn test_string_prefix_width() {
        let desc = TypeDescriptor::String {
            index: Primitive::Uint16,
        };
        let bytes = desc.encode_to_vec(&Value::from("héllo")).unwrap();
        assert_eq!(&bytes[..2], &[6, 0]);
        assert_eq!(roundtrip(&desc, &Value::from("")), Value::from(""));
    }

    #[test]
    fn test_string_too_long_for_index() {
        let long = "x".repeat(256);
        assert!(matches!(
            TypeDescriptor::string().encode_to_vec(&Value::from(long.as_str())),
            Err(ProtocolError::ValueOutOfRange { .. })
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        assert!(matches!(
            TypeDescriptor::string().decode_slice(&[2, 0xC3, 0x28]),
            Err(ProtocolError::InvalidUtf8)
        ));
    }

    #[test]
    fn test_fixed_array_size_mismatch() {
        let desc = TypeDescriptor::fixed_array(TypeDescriptor::Primitive(Primitive::Uint8), 3);
        let short = Value::Array(vec![Value::Int(1), Value::Int(2)]);
        assert!(matches!(
            desc.encode_to_vec(&short),
            Err(ProtocolError::SizeMismatch {
                expected: 3,
                actual: 2
            })
        ));
        let exact = Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(desc.encode_to_vec(&exact).unwrap(), vec![1, 2, 3]);
        assert_eq!(roundtrip(&desc, &exact), exact);
    }

    #[test]
    fn test_fixed_array_of_strings() {
        let desc = TypeDescriptor::fixed_array(TypeDescriptor::string(), 2);
        let v = Value::Array(vec![Value::from("a"), Value::from("bcd")]);
        assert_eq!(desc.size_of(&v).unwrap(), 2 + 4);
        assert_eq!(roundtrip(&desc, &v), v);
    }

    #[test]
    fn test_variable_array_prefix() {
        let desc =
            TypeDescriptor::variable_array(TypeDescriptor::Primitive(Primitive::Int16), Primitive::Uint8);
        let v = Value::Array(vec![Value::Int(-1), Value::Int(2)]);
        assert_eq!(desc.encode_to_vec(&v).unwrap(), vec![2, 0xFF, 0xFF, 2, 0]);
        assert_eq!(roundtrip(&desc, &Value::Array(vec![])), Value::Array(vec![]));
    }

    #[test]
    fn test_truncated_input() {
        let desc = TypeDescriptor::Primitive(Primitive::Uint32);
        assert!(matches!(
            desc.decode_slice(&[1, 2]),
            Err(ProtocolError::Truncated {
                needed: 4,
                remaining: 2
            })
        ));
        let arr = TypeDescriptor::variable_array(TypeDescriptor::Primitive(Primitive::Uint8), Primitive::Uint8);
        assert!(matches!(
            arr.decode_slice(&[200, 1]),
            Err(ProtocolError::Truncated { .. })
        ));
    }

    #[test]
    fn test_struct_missing_field() {
        let ty = StructType::new(
            "Pose",
            vec![Field {
                name: "x".into(),
                descriptor: TypeDescriptor::Primitive(Primitive::Float32),
            }],
        );
        let desc = TypeDescriptor::Struct(ty);
        assert!(matches!(
            desc.encode_to_vec(&Value::structure([("y", Value::Float(1.0))])),
            Err(ProtocolError::MissingField(f)) if f == "Pose.x"
        ));
    }

    #[test]
    fn test_unknown_union_tag() {
        let u = UnionType::declare("Msg");
        u.define(vec![Variant {
            name: "ping".into(),
            tag: 0,
            descriptor: TypeDescriptor::Primitive(Primitive::Void),
        }])
        .unwrap();
        let desc = TypeDescriptor::Union(u);
        assert!(matches!(
            desc.decode_slice(&[9]),
            Err(ProtocolError::UnknownTag(9))
        ));
        assert_eq!(desc.encode_to_vec(&Value::union(0, Value::Void)).unwrap(), vec![0]);
    }

    #[test]
    fn test_fixed_size() {
        let desc = TypeDescriptor::fixed_array(TypeDescriptor::Primitive(Primitive::Uint16), 4);
        assert_eq!(desc.fixed_size(), Some(8));
        assert_eq!(TypeDescriptor::string().fixed_size(), None);
    }
}
