//! # Schema Codec
//!
//! Compiles an interface-definition schema into runtime type descriptors.
//!
//! ## Components
//! - **AST**: serde-deserializable blocks handed over by the external parser
//! - **Descriptor**: `size_of` / `encode` / `decode` for one value shape
//! - **Namespace**: scope tree with parent fallback for dotted lookups
//! - **Compiler**: AST → namespace of enum tables, struct codecs and unions
//!
//! ## Example
//! ```rust
//! use cubelink::schema::{compile_schema, Block, EnumMember, Member, Schema, Value};
//!
//! let schema = Schema::new(vec![Block::namespace("Cube", vec![
//!     Block::enumeration("Color", None, vec![EnumMember::new("red"), EnumMember::new("blue")]),
//!     Block::structure("Light", vec![
//!         Member::new("Color", "color"),
//!         Member::new("uint_16", "levels").fixed_array(2),
//!     ]),
//! ])]);
//!
//! let root = compile_schema(&schema)?;
//! let light = root.type_descriptor("Cube.Light")?;
//! let value = Value::structure([
//!     ("color", Value::Int(root.constant("Cube.Color.blue")?)),
//!     ("levels", Value::Array(vec![Value::Int(10), Value::Int(20)])),
//! ]);
//! let bytes = light.encode_to_vec(&value)?;
//! assert_eq!(bytes, vec![1, 10, 0, 20, 0]);
//! assert_eq!(light.decode_slice(&bytes)?, value);
//! # Ok::<(), cubelink::error::ProtocolError>(())
//! ```

pub mod ast;
pub mod compiler;
pub mod descriptor;
pub mod namespace;
pub mod value;

pub use ast::{ArrayModifier, ArraySize, Block, EnumMember, Member, Schema};
pub use compiler::compile_schema;
pub use descriptor::{Field, Primitive, StructType, TypeDescriptor, UnionType, Variant};
pub use namespace::{Constant, EnumTable, Namespace, Symbol};
pub use value::Value;
