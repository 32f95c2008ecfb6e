//! Schema compiler: AST blocks → namespace tree of runtime descriptors.
//!
//! Compilation runs over an arena of scopes, each holding the index of its
//! parent, so references can be resolved while the tree is still being
//! built. Once every block compiled the arena is frozen and shared by every
//! [`Namespace`] handle. Nothing partially compiled escapes: any error aborts
//! the whole schema.
//!
//! Rules:
//! - references resolve against already-declared symbols only (no forward
//!   references); a struct or union is declared before its own members, so
//!   it may refer to itself, but only through a length-prefixed array or a
//!   union; a struct that contains itself by value has no finite encoding
//! - enum values count up from 0 and an explicit value resets the counter;
//!   entries resolve both as `Enum.entry` and bare in the enclosing scope
//! - union tags follow the same counting rule and must fit in `uint_8`
//! - union members cannot carry an array modifier
//! - declaration order of struct members is wire order

use crate::error::{constants, ProtocolError, Result};
use crate::schema::ast::{ArraySize, Block, EnumMember, Member, Schema};
use crate::schema::descriptor::{Field, Primitive, StructType, TypeDescriptor, UnionType, Variant};
use crate::schema::namespace::{resolve_entry, Constant, Entry, EnumTable, Namespace, Scope};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Compile a parsed schema into its root namespace
#[instrument(skip_all, fields(blocks = schema.blocks.len()))]
pub fn compile_schema(schema: &Schema) -> Result<Namespace> {
    let mut compiler = Compiler::new();
    compiler.compile_namespace(&schema.blocks, ROOT)?;
    debug!(scopes = compiler.scopes.len(), "Schema compiled");
    Ok(Namespace::freeze(compiler.scopes))
}

const ROOT: usize = 0;

/// Outcome of resolving a member base
#[derive(Debug)]
enum ResolvedType {
    Descriptor(TypeDescriptor),
    /// A bare enum constant used where a type was expected
    RawEnumValue(i64, Primitive),
}

impl ResolvedType {
    fn into_descriptor(self) -> TypeDescriptor {
        match self {
            ResolvedType::Descriptor(desc) => desc,
            ResolvedType::RawEnumValue(value, width) => {
                debug!(value, width = width.name(), "Enum constant used as a type");
                TypeDescriptor::Primitive(width)
            }
        }
    }
}

struct Compiler {
    scopes: Vec<Scope>,
}

impl Compiler {
    fn new() -> Self {
        Self {
            scopes: vec![Scope::new("", None)],
        }
    }

    fn qualified(&self, scope: usize, name: &str) -> String {
        let mut parts = vec![name.to_string()];
        let mut current = Some(scope);
        while let Some(idx) = current {
            let s = &self.scopes[idx];
            if !s.name.is_empty() {
                parts.push(s.name.clone());
            }
            current = s.parent;
        }
        parts.reverse();
        parts.join(".")
    }

    fn insert(&mut self, scope: usize, name: &str, entry: Entry) -> Result<()> {
        if self.scopes[scope].entries.contains_key(name) {
            return Err(ProtocolError::DuplicateSymbol(self.qualified(scope, name)));
        }
        self.scopes[scope].entries.insert(name.to_string(), entry);
        Ok(())
    }

    fn compile_namespace(&mut self, blocks: &[Block], scope: usize) -> Result<()> {
        for block in blocks {
            debug!(kind = block.kind(), name = block.name(), "Compiling block");
            match block {
                Block::Namespace { name, members } => {
                    let child = self.open_namespace(name, scope)?;
                    self.compile_namespace(members, child)?;
                }
                Block::Enum {
                    name,
                    base,
                    members,
                } => self.compile_enum(name, base.as_deref(), members, scope)?,
                Block::Structure { name, members } => self.compile_struct(name, members, scope)?,
                Block::Union { name, members } => self.compile_union(name, members, scope)?,
            }
        }
        Ok(())
    }

    /// Namespaces may be reopened; other symbols may not be redeclared
    fn open_namespace(&mut self, name: &str, scope: usize) -> Result<usize> {
        if let Some(Entry::Namespace(existing)) = self.scopes[scope].entries.get(name) {
            return Ok(*existing);
        }
        let idx = self.scopes.len();
        self.insert(scope, name, Entry::Namespace(idx))?;
        self.scopes.push(Scope::new(name, Some(scope)));
        Ok(idx)
    }

    fn compile_enum(
        &mut self,
        name: &str,
        base: Option<&str>,
        members: &[EnumMember],
        scope: usize,
    ) -> Result<()> {
        let width = match base {
            Some(base) => self.resolve_index(base, scope)?,
            None => Primitive::Uint8,
        };
        let (min, max) = width.int_range().unwrap_or((0, i64::from(u8::MAX)));

        let mut entries: Vec<(String, i64)> = Vec::with_capacity(members.len());
        let mut next = 0i64;
        for member in members {
            let value = member.value.unwrap_or(next);
            if value < min || value > max {
                return Err(ProtocolError::SchemaError(format!(
                    "{} = {value} does not fit {}",
                    self.qualified(scope, &format!("{name}.{}", member.name)),
                    width.name()
                )));
            }
            if entries.iter().any(|(n, _)| *n == member.name) {
                return Err(ProtocolError::DuplicateSymbol(
                    self.qualified(scope, &format!("{name}.{}", member.name)),
                ));
            }
            entries.push((member.name.clone(), value));
            next = value.saturating_add(1);
        }

        let table = Arc::new(EnumTable::new(name, width, entries));
        self.insert(scope, name, Entry::Enum(Arc::clone(&table)))?;
        for (entry, value) in table.entries() {
            let value = *value;
            self.insert(scope, entry, Entry::Constant(Constant { value, width }))?;
        }
        Ok(())
    }

    fn compile_struct(&mut self, name: &str, members: &[Member], scope: usize) -> Result<()> {
        let ty = StructType::declare(name);
        self.insert(scope, name, Entry::Struct(ty.clone()))?;

        let mut fields: Vec<Field> = Vec::with_capacity(members.len());
        for member in members {
            if fields.iter().any(|f| f.name == member.name) {
                return Err(ProtocolError::DuplicateSymbol(
                    self.qualified(scope, &format!("{name}.{}", member.name)),
                ));
            }
            let descriptor = self.member_descriptor(member, scope)?;
            fields.push(Field {
                name: member.name.clone(),
                descriptor,
            });
        }
        if let Some(field) = fields.iter().find(|f| contains_by_value(&f.descriptor, &ty)) {
            return Err(ProtocolError::UnsupportedConstruct(format!(
                "{}: {}",
                constants::ERR_STRUCT_CONTAINS_ITSELF,
                self.qualified(scope, &format!("{name}.{}", field.name))
            )));
        }
        ty.define(fields)
    }

    fn compile_union(&mut self, name: &str, members: &[Member], scope: usize) -> Result<()> {
        let ty = UnionType::declare(name);
        self.insert(scope, name, Entry::Union(ty.clone()))?;

        let mut variants: Vec<Variant> = Vec::with_capacity(members.len());
        let mut seen_tags = BTreeSet::new();
        let mut next = 0i64;
        for member in members {
            let member_path = self.qualified(scope, &format!("{name}.{}", member.name));
            if member.array.is_some() {
                return Err(ProtocolError::UnsupportedConstruct(format!(
                    "{}: {member_path}",
                    constants::ERR_UNION_ARRAY_MEMBER
                )));
            }
            let raw = member.value.unwrap_or(next);
            let tag = u8::try_from(raw).map_err(|_| {
                ProtocolError::UnsupportedConstruct(format!(
                    "union tag {raw} of {member_path} does not fit uint_8"
                ))
            })?;
            if !seen_tags.insert(tag) {
                return Err(ProtocolError::UnsupportedConstruct(format!(
                    "duplicate union tag {tag} at {member_path}"
                )));
            }
            if variants.iter().any(|v| v.name == member.name) {
                return Err(ProtocolError::DuplicateSymbol(member_path));
            }
            let descriptor = self.resolve_type(&member.base, scope)?.into_descriptor();
            variants.push(Variant {
                name: member.name.clone(),
                tag,
                descriptor,
            });
            next = raw + 1;
        }
        ty.define(variants)
    }

    fn member_descriptor(&self, member: &Member, scope: usize) -> Result<TypeDescriptor> {
        let element = self.resolve_type(&member.base, scope)?.into_descriptor();
        let Some(array) = &member.array else {
            return Ok(element);
        };

        let size = array
            .size
            .as_ref()
            .map(|size| self.resolve_size(size, scope))
            .transpose()?;
        let index = array
            .index
            .as_deref()
            .map(|index| self.resolve_index(index, scope))
            .transpose()?;
        if size.is_none() && index.is_none() {
            return Err(ProtocolError::SchemaError(format!(
                "{}: {}",
                constants::ERR_ARRAY_WITHOUT_SIZE,
                member.name
            )));
        }
        Ok(TypeDescriptor::Array {
            element: Box::new(element),
            size,
            index,
        })
    }

    fn resolve_type(&self, base: &str, scope: usize) -> Result<ResolvedType> {
        if let Some(p) = Primitive::from_name(base) {
            return Ok(ResolvedType::Descriptor(TypeDescriptor::Primitive(p)));
        }
        if base == "string" {
            return Ok(ResolvedType::Descriptor(TypeDescriptor::string()));
        }
        if let Some(index) = base
            .strip_prefix("string[")
            .and_then(|rest| rest.strip_suffix(']'))
        {
            let index = self.resolve_index(index.trim(), scope)?;
            return Ok(ResolvedType::Descriptor(TypeDescriptor::String { index }));
        }

        let resolved = match self.resolve(base, scope)? {
            Entry::Struct(s) => ResolvedType::Descriptor(TypeDescriptor::Struct(s)),
            Entry::Union(u) => ResolvedType::Descriptor(TypeDescriptor::Union(u)),
            Entry::Enum(table) => ResolvedType::Descriptor(table.descriptor()),
            Entry::Constant(c) => ResolvedType::RawEnumValue(c.value, c.width),
            Entry::Namespace(_) => {
                return Err(ProtocolError::UnsupportedConstruct(format!(
                    "namespace {base} used as a type"
                )))
            }
        };
        Ok(resolved)
    }

    fn resolve_index(&self, base: &str, scope: usize) -> Result<Primitive> {
        match self.resolve_type(base, scope)?.into_descriptor() {
            TypeDescriptor::Primitive(p) if p.is_integer() => Ok(p),
            _ => Err(ProtocolError::SchemaError(format!(
                "{}: {base}",
                constants::ERR_NON_INTEGER_INDEX
            ))),
        }
    }

    fn resolve_size(&self, size: &ArraySize, scope: usize) -> Result<usize> {
        let raw = match size {
            ArraySize::Literal(n) => i64::try_from(*n).unwrap_or(i64::MAX),
            ArraySize::Reference(path) => match self.resolve(path, scope)? {
                Entry::Constant(c) => c.value,
                _ => {
                    return Err(ProtocolError::SchemaError(format!(
                        "array size {path} is not a constant"
                    )))
                }
            },
        };
        usize::try_from(raw)
            .map_err(|_| ProtocolError::SchemaError(format!("invalid array size {raw}")))
    }

    fn resolve(&self, path: &str, scope: usize) -> Result<Entry> {
        resolve_entry(&self.scopes, path, scope)
    }
}

/// Whether `desc` embeds `target` inline, through struct fields or fixed
/// arrays. Length-prefixed arrays and unions break the chain.
fn contains_by_value(desc: &TypeDescriptor, target: &Arc<StructType>) -> bool {
    match desc {
        TypeDescriptor::Struct(s) => {
            Arc::ptr_eq(s, target)
                || s.fields()
                    .iter()
                    .any(|f| contains_by_value(&f.descriptor, target))
        }
        TypeDescriptor::Array {
            element,
            index: None,
            ..
        } => contains_by_value(element, target),
        _ => false,
    }
}
