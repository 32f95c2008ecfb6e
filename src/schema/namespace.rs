//! Compiled namespaces and symbol lookup.
//!
//! A compiled schema is one frozen arena of scopes shared behind an `Arc`.
//! A [`Namespace`] is a cheap handle into that arena, so holding any inner
//! namespace keeps its whole ancestor chain alive.
//!
//! [`Namespace::resolve`] checks the local map first and then walks the
//! parent chain for the first path segment. Remaining segments descend into
//! the symbol found, with no further fallback.

use crate::error::{ProtocolError, Result};
use crate::schema::descriptor::{Primitive, StructType, TypeDescriptor, UnionType};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// An integer constant: an enum entry or a union `Tag_<name>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constant {
    pub value: i64,
    /// Underlying width of the enum (or `uint_8` for union tags)
    pub width: Primitive,
}

/// Enum table: entries in declaration order and the underlying integer type
#[derive(Debug, Clone, PartialEq)]
pub struct EnumTable {
    pub name: String,
    pub width: Primitive,
    entries: Vec<(String, i64)>,
}

impl EnumTable {
    pub(crate) fn new(name: &str, width: Primitive, entries: Vec<(String, i64)>) -> Self {
        Self {
            name: name.to_string(),
            width,
            entries,
        }
    }

    pub fn get(&self, entry: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|(n, _)| n == entry)
            .map(|(_, v)| *v)
    }

    /// First entry name carrying `value`
    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.as_str())
    }

    pub fn entries(&self) -> &[(String, i64)] {
        &self.entries
    }

    /// Descriptor of the underlying integer type
    pub fn descriptor(&self) -> TypeDescriptor {
        TypeDescriptor::Primitive(self.width)
    }
}

/// Arena slot: what a name maps to inside one scope
#[derive(Debug, Clone)]
pub(crate) enum Entry {
    Namespace(usize),
    Enum(Arc<EnumTable>),
    Struct(Arc<StructType>),
    Union(Arc<UnionType>),
    Constant(Constant),
}

#[derive(Debug)]
pub(crate) struct Scope {
    pub(crate) name: String,
    pub(crate) parent: Option<usize>,
    pub(crate) entries: BTreeMap<String, Entry>,
}

impl Scope {
    pub(crate) fn new(name: &str, parent: Option<usize>) -> Self {
        Self {
            name: name.to_string(),
            parent,
            entries: BTreeMap::new(),
        }
    }
}

/// Resolve a dotted path starting at `scope`.
///
/// Fails with `UndefinedType` at the first segment that does not exist.
pub(crate) fn resolve_entry(scopes: &[Scope], path: &str, scope: usize) -> Result<Entry> {
    let undefined = || ProtocolError::UndefinedType(path.to_string());
    let mut segments = path.split('.');
    let first = segments.next().filter(|s| !s.is_empty()).ok_or_else(undefined)?;

    let mut current = lookup_chain(scopes, first, scope).ok_or_else(undefined)?;
    for segment in segments {
        current = child(scopes, &current, segment).ok_or_else(undefined)?;
    }
    Ok(current)
}

fn lookup_chain(scopes: &[Scope], name: &str, scope: usize) -> Option<Entry> {
    let mut current = Some(scope);
    while let Some(idx) = current {
        if let Some(entry) = scopes[idx].entries.get(name) {
            return Some(entry.clone());
        }
        current = scopes[idx].parent;
    }
    None
}

fn child(scopes: &[Scope], entry: &Entry, segment: &str) -> Option<Entry> {
    match entry {
        Entry::Namespace(idx) => scopes[*idx].entries.get(segment).cloned(),
        Entry::Enum(table) => table.get(segment).map(|value| {
            Entry::Constant(Constant {
                value,
                width: table.width,
            })
        }),
        Entry::Union(u) => segment
            .strip_prefix("Tag_")
            .and_then(|name| u.tag_of(name))
            .map(|tag| {
                Entry::Constant(Constant {
                    value: i64::from(tag),
                    width: Primitive::Uint8,
                })
            }),
        Entry::Struct(_) | Entry::Constant(_) => None,
    }
}

/// Anything a name can resolve to
#[derive(Debug, Clone)]
pub enum Symbol {
    Namespace(Namespace),
    Enum(Arc<EnumTable>),
    Constant(Constant),
    Type(TypeDescriptor),
    Union(Arc<UnionType>),
}

impl Symbol {
    pub fn kind(&self) -> &'static str {
        match self {
            Symbol::Namespace(_) => "namespace",
            Symbol::Enum(_) => "enum",
            Symbol::Constant(_) => "constant",
            Symbol::Type(_) => "type",
            Symbol::Union(_) => "union",
        }
    }
}

/// Handle to one scope of a compiled schema
#[derive(Clone)]
pub struct Namespace {
    scopes: Arc<[Scope]>,
    idx: usize,
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("name", &self.name())
            .field("symbols", &self.scope().entries.len())
            .finish()
    }
}

impl Namespace {
    /// Freeze a compiled arena; scope 0 is the root
    pub(crate) fn freeze(scopes: Vec<Scope>) -> Self {
        Self {
            scopes: Arc::from(scopes),
            idx: 0,
        }
    }

    fn scope(&self) -> &Scope {
        &self.scopes[self.idx]
    }

    fn at(&self, idx: usize) -> Namespace {
        Namespace {
            scopes: Arc::clone(&self.scopes),
            idx,
        }
    }

    fn symbol(&self, entry: Entry) -> Symbol {
        match entry {
            Entry::Namespace(idx) => Symbol::Namespace(self.at(idx)),
            Entry::Enum(table) => Symbol::Enum(table),
            Entry::Struct(s) => Symbol::Type(TypeDescriptor::Struct(s)),
            Entry::Union(u) => Symbol::Union(u),
            Entry::Constant(c) => Symbol::Constant(c),
        }
    }

    /// Name of this scope; empty for the root
    pub fn name(&self) -> &str {
        &self.scope().name
    }

    /// Enclosing scope
    pub fn parent(&self) -> Option<Namespace> {
        self.scope().parent.map(|idx| self.at(idx))
    }

    /// Local lookup only
    pub fn get(&self, name: &str) -> Option<Symbol> {
        self.scope()
            .entries
            .get(name)
            .cloned()
            .map(|entry| self.symbol(entry))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scope().entries.keys().map(String::as_str)
    }

    /// Resolve a dotted path against this scope and its ancestors.
    ///
    /// Fails with `UndefinedType` at the first segment that does not exist.
    pub fn resolve(&self, path: &str) -> Result<Symbol> {
        resolve_entry(&self.scopes, path, self.idx).map(|entry| self.symbol(entry))
    }

    /// Resolve a path to something encodable: struct, union or enum width
    pub fn type_descriptor(&self, path: &str) -> Result<TypeDescriptor> {
        match self.resolve(path)? {
            Symbol::Type(desc) => Ok(desc),
            Symbol::Union(u) => Ok(TypeDescriptor::Union(u)),
            Symbol::Enum(table) => Ok(table.descriptor()),
            other => Err(ProtocolError::UnsupportedConstruct(format!(
                "{path} is a {}, not a type",
                other.kind()
            ))),
        }
    }

    /// Resolve a path to an integer constant
    pub fn constant(&self, path: &str) -> Result<i64> {
        match self.resolve(path)? {
            Symbol::Constant(c) => Ok(c.value),
            other => Err(ProtocolError::UnsupportedConstruct(format!(
                "{path} is a {}, not a constant",
                other.kind()
            ))),
        }
    }

    /// Value of an enum entry (`Color.red` or bare `red`) or union tag (`U.Tag_f`)
    pub fn enum_value(&self, path: &str) -> Result<i64> {
        self.constant(path)
    }

    pub fn union_table(&self, path: &str) -> Result<Arc<UnionType>> {
        match self.resolve(path)? {
            Symbol::Union(u) => Ok(u),
            other => Err(ProtocolError::UnsupportedConstruct(format!(
                "{path} is a {}, not a union",
                other.kind()
            ))),
        }
    }

    pub fn enum_table(&self, path: &str) -> Result<Arc<EnumTable>> {
        match self.resolve(path)? {
            Symbol::Enum(e) => Ok(e),
            other => Err(ProtocolError::UnsupportedConstruct(format!(
                "{path} is a {}, not an enum",
                other.kind()
            ))),
        }
    }

    pub fn namespace(&self, path: &str) -> Result<Namespace> {
        match self.resolve(path)? {
            Symbol::Namespace(ns) => Ok(ns),
            other => Err(ProtocolError::UnsupportedConstruct(format!(
                "{path} is a {}, not a namespace",
                other.kind()
            ))),
        }
    }
}
