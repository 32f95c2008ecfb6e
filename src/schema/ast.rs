//! Schema AST consumed by the compiler.
//!
//! The grammar and parser live outside this crate; they hand over a tree of
//! [`Block`]s either in memory or as JSON:
//!
//! ```json
//! [
//!   { "type": "Namespace", "name": "Cube", "members": [
//!     { "type": "Enum", "name": "Color", "base": "uint_8",
//!       "members": [ { "name": "red" }, { "name": "blue", "value": 5 } ] },
//!     { "type": "Structure", "name": "Light", "members": [
//!       { "base": "Color", "name": "color" },
//!       { "base": "uint_16", "name": "levels", "array": { "size": 4 } }
//!     ] }
//!   ] }
//! ]
//! ```
//!
//! Member bases are either a primitive name (`uint_8`, `float_32`, `string`,
//! `string[uint_16]`, ...) or a dotted reference (`Cube.Color`).

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};

/// A whole schema file: the top-level blocks of the root namespace
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Schema {
    pub blocks: Vec<Block>,
}

impl Schema {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    /// Parse a JSON-encoded AST
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ProtocolError::SchemaError(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ProtocolError::SchemaError(e.to_string()))
    }
}

/// One declaration block
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum Block {
    Namespace {
        name: String,
        #[serde(default)]
        members: Vec<Block>,
    },
    Enum {
        name: String,
        /// Underlying integer type, `uint_8` when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base: Option<String>,
        #[serde(default)]
        members: Vec<EnumMember>,
    },
    Structure {
        name: String,
        #[serde(default)]
        members: Vec<Member>,
    },
    Union {
        name: String,
        #[serde(default)]
        members: Vec<Member>,
    },
}

impl Block {
    pub fn namespace(name: &str, members: Vec<Block>) -> Self {
        Block::Namespace {
            name: name.to_string(),
            members,
        }
    }

    pub fn enumeration(name: &str, base: Option<&str>, members: Vec<EnumMember>) -> Self {
        Block::Enum {
            name: name.to_string(),
            base: base.map(str::to_string),
            members,
        }
    }

    pub fn structure(name: &str, members: Vec<Member>) -> Self {
        Block::Structure {
            name: name.to_string(),
            members,
        }
    }

    pub fn union(name: &str, members: Vec<Member>) -> Self {
        Block::Union {
            name: name.to_string(),
            members,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Block::Namespace { name, .. }
            | Block::Enum { name, .. }
            | Block::Structure { name, .. }
            | Block::Union { name, .. } => name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Block::Namespace { .. } => "namespace",
            Block::Enum { .. } => "enum",
            Block::Structure { .. } => "structure",
            Block::Union { .. } => "union",
        }
    }
}

/// A struct field or union variant
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Member {
    pub name: String,
    pub base: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array: Option<ArrayModifier>,
    /// Explicit union tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
}

impl Member {
    pub fn new(base: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            base: base.to_string(),
            array: None,
            value: None,
        }
    }

    /// `base name[size]`
    pub fn fixed_array(mut self, size: u64) -> Self {
        self.array = Some(ArrayModifier {
            size: Some(ArraySize::Literal(size)),
            index: None,
        });
        self
    }

    /// `base name[Some.Constant]`
    pub fn sized_by(mut self, constant: &str) -> Self {
        self.array = Some(ArrayModifier {
            size: Some(ArraySize::Reference(constant.to_string())),
            index: None,
        });
        self
    }

    /// `base name[index_type]`
    pub fn indexed_array(mut self, index: &str) -> Self {
        self.array = Some(ArrayModifier {
            size: None,
            index: Some(index.to_string()),
        });
        self
    }

    pub fn with_value(mut self, value: i64) -> Self {
        self.value = Some(value);
        self
    }
}

/// Array modifier on a member
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ArrayModifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<ArraySize>,
    /// Length-prefix type; its presence makes the array variable-length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
}

/// Fixed element count: a literal or a reference to an enum constant
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ArraySize {
    Literal(u64),
    Reference(String),
}

/// An enum entry
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EnumMember {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
}

impl EnumMember {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: i64) -> Self {
        self.value = Some(value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::expect_used)]
    fn test_schema_from_json() {
        let json = r#"[
            { "type": "Namespace", "name": "Cube", "members": [
                { "type": "Enum", "name": "Color",
                  "members": [ { "name": "red" }, { "name": "blue", "value": 5 } ] },
                { "type": "Structure", "name": "Light", "members": [
                    { "base": "Color", "name": "color" },
                    { "base": "uint_16", "name": "levels", "array": { "size": 4 } },
                    { "base": "uint_8", "name": "extra", "array": { "size": "Cube.Max" } }
                ] }
            ] }
        ]"#;

        let schema = Schema::from_json(json).expect("valid AST");
        assert_eq!(schema.blocks.len(), 1);
        let Block::Namespace { members, .. } = &schema.blocks[0] else {
            panic!("expected namespace");
        };
        assert_eq!(members[0].kind(), "enum");
        let Block::Structure { members, .. } = &members[1] else {
            panic!("expected structure");
        };
        assert_eq!(
            members[1].array.as_ref().and_then(|a| a.size.clone()),
            Some(ArraySize::Literal(4))
        );
        assert_eq!(
            members[2].array.as_ref().and_then(|a| a.size.clone()),
            Some(ArraySize::Reference("Cube.Max".into()))
        );
    }

    #[test]
    fn test_unknown_block_type_rejected() {
        let json = r#"[ { "type": "Interface", "name": "X" } ]"#;
        assert!(matches!(
            Schema::from_json(json),
            Err(ProtocolError::SchemaError(_))
        ));
    }
}
