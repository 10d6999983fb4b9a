//! Persistence-safe function references.
//!
//! An [`EntryPoint`] pairs a durable name with a transient address slot. The
//! name is what survives an image save; the address is rewritten every time
//! the record is resolved against the running build's [`EntryPointTable`].

use std::fmt;
use std::num::NonZeroUsize;

use log::debug;
use rustc_hash::FxHashMap;

use crate::context::TaskContext;
use crate::error::FfiError;
use crate::heap::ObjectFlags;
use crate::value::Value;

/// Signature shared by every runtime entry point callable from hosted code.
pub type RtsFunction = fn(&mut TaskContext, &[Value]) -> Result<Value, FfiError>;

/// One row of the static entry-point table.
#[derive(Clone, Copy)]
pub struct EntryPointDef {
    pub name: &'static str,
    pub function: RtsFunction,
}

impl EntryPointDef {
    pub const fn new(name: &'static str, function: RtsFunction) -> Self {
        Self { name, function }
    }
}

impl fmt::Debug for EntryPointDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPointDef")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Read-only name to function table, built once from ordered groups.
pub struct EntryPointTable {
    entries: Vec<EntryPointDef>,
    index: FxHashMap<&'static str, usize>,
}

impl EntryPointTable {
    /// Build a table from groups of definitions. When a name repeats, the
    /// first definition wins.
    pub fn new(groups: &[&[EntryPointDef]]) -> Self {
        let mut entries = Vec::new();
        let mut index = FxHashMap::default();
        for def in groups.iter().flat_map(|g| g.iter()) {
            if !index.contains_key(def.name) {
                index.insert(def.name, entries.len());
                entries.push(*def);
            }
        }
        Self { entries, index }
    }

    /// Definition registered under `name`.
    pub fn lookup(&self, name: &str) -> Option<&EntryPointDef> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// True if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Definitions in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &EntryPointDef> {
        self.entries.iter()
    }
}

impl fmt::Debug for EntryPointTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|d| d.name))
            .finish()
    }
}

/// Whether a reference names code or data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Function,
    Data,
}

/// Where a resolved entry point lives.
#[derive(Clone, Copy)]
pub enum EntryAddress {
    /// A runtime function from the static table.
    Runtime(RtsFunction),
    /// A raw native address bound directly from a symbol.
    Foreign(NonZeroUsize),
}

impl EntryAddress {
    /// Numeric code address.
    pub fn address(&self) -> usize {
        match self {
            EntryAddress::Runtime(f) => *f as usize,
            EntryAddress::Foreign(a) => a.get(),
        }
    }
}

impl PartialEq for EntryAddress {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl fmt::Debug for EntryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryAddress::Runtime(_) => write!(f, "Runtime({:#x})", self.address()),
            EntryAddress::Foreign(a) => write!(f, "Foreign({:#x})", a.get()),
        }
    }
}

/// The transient half of an entry point.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum EntrySlot {
    #[default]
    Unresolved,
    Resolved(EntryAddress),
}

/// The only part of an entry point written into a saved image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PersistedEntryPoint {
    pub name: String,
    pub kind: EntryKind,
}

/// A name-addressable, reload-safe reference to a runtime or native function.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryPoint {
    slot: EntrySlot,
    name: Option<String>,
    kind: EntryKind,
}

impl EntryPoint {
    /// Header flags every entry-point record is allocated with.
    pub const FLAGS: ObjectFlags = ObjectFlags::BYTE
        .union(ObjectFlags::WEAK)
        .union(ObjectFlags::MUTABLE)
        .union(ObjectFlags::NO_OVERWRITE);

    /// Create a resolved reference by name. Fails if the name is absent.
    pub fn from_name(
        name: impl Into<String>,
        kind: EntryKind,
        table: &EntryPointTable,
    ) -> Result<Self, FfiError> {
        let mut ep = Self::from_persisted(PersistedEntryPoint {
            name: name.into(),
            kind,
        });
        if ep.resolve(table) {
            Ok(ep)
        } else {
            Err(FfiError::EntryPointNotFound {
                name: ep.name.take().unwrap_or_default(),
            })
        }
    }

    /// Rebuild a reference read back from an image. It starts unresolved.
    pub fn from_persisted(persisted: PersistedEntryPoint) -> Self {
        Self {
            slot: EntrySlot::Unresolved,
            name: Some(persisted.name),
            kind: persisted.kind,
        }
    }

    /// A nameless record holding only a native address.
    pub fn from_address(address: NonZeroUsize) -> Self {
        Self {
            slot: EntrySlot::Resolved(EntryAddress::Foreign(address)),
            name: None,
            kind: EntryKind::Function,
        }
    }

    /// Re-run the name scan. Clears the slot first, so a missing name leaves
    /// the record unresolved. Idempotent.
    pub fn resolve(&mut self, table: &EntryPointTable) -> bool {
        self.slot = EntrySlot::Unresolved;
        let Some(name) = self.name.as_deref() else {
            return false;
        };
        match table.lookup(name) {
            Some(def) => {
                self.slot = EntrySlot::Resolved(EntryAddress::Runtime(def.function));
                debug!("entry point <{name}> resolved");
                true
            }
            None => false,
        }
    }

    /// Forget the transient address.
    pub fn clear(&mut self) {
        self.slot = EntrySlot::Unresolved;
    }

    /// Current binding state.
    pub fn slot(&self) -> EntrySlot {
        self.slot
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.slot, EntrySlot::Resolved(_))
    }

    /// Resolved code address, if any.
    pub fn address(&self) -> Option<usize> {
        match self.slot {
            EntrySlot::Resolved(a) => Some(a.address()),
            EntrySlot::Unresolved => None,
        }
    }

    /// Stored name; None for address-only records.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether the record names a function or data.
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// The form written into a saved image. Address-only records have none.
    pub fn to_persisted(&self) -> Option<PersistedEntryPoint> {
        Some(PersistedEntryPoint {
            name: self.name.clone()?,
            kind: self.kind,
        })
    }

    /// Call a runtime entry point.
    ///
    /// An unresolved record means the saved image and the running build
    /// disagree; that is reported as unrecoverable.
    pub fn invoke(&self, ctx: &mut TaskContext, args: &[Value]) -> Result<Value, FfiError> {
        match self.slot {
            EntrySlot::Resolved(EntryAddress::Runtime(function)) => function(ctx, args),
            EntrySlot::Resolved(EntryAddress::Foreign(address)) => Err(FfiError::Foreign {
                message: format!(
                    "entry point at {:#x} is native code and needs a call engine",
                    address.get()
                ),
            }),
            EntrySlot::Unresolved => Err(self.unresolved_error()),
        }
    }

    /// The error reported when an unresolved record is used.
    pub fn unresolved_error(&self) -> FfiError {
        FfiError::unrecoverable(format!(
            "entry point <{}> used before it was resolved; image and runtime versions differ",
            self.name.as_deref().unwrap_or("?")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(_: &mut TaskContext, _: &[Value]) -> Result<Value, FfiError> {
        Ok(Value::Int(42))
    }

    fn echo(_: &mut TaskContext, args: &[Value]) -> Result<Value, FfiError> {
        Ok(args.first().cloned().unwrap_or_default())
    }

    const GROUP: &[EntryPointDef] = &[
        EntryPointDef::new("Answer", answer),
        EntryPointDef::new("Echo", echo),
    ];

    const SHADOW: &[EntryPointDef] = &[EntryPointDef::new("Answer", echo)];

    #[test]
    fn table_lookup_and_order() {
        let table = EntryPointTable::new(&[GROUP]);
        assert_eq!(table.len(), 2);
        assert!(table.contains("Echo"));
        assert!(table.lookup("Missing").is_none());
        let names: Vec<_> = table.iter().map(|d| d.name).collect();
        assert_eq!(names, ["Answer", "Echo"]);
    }

    #[test]
    fn first_definition_wins() {
        let table = EntryPointTable::new(&[GROUP, SHADOW]);
        assert_eq!(table.len(), 2);
        let mut ctx = TaskContext::new(0);
        let ep = EntryPoint::from_name("Answer", EntryKind::Function, &table).unwrap();
        let result = ep.invoke(&mut ctx, &[Value::Int(1)]).unwrap();
        assert_eq!(result, Value::Int(42));
    }

    #[test]
    fn from_name_resolves() {
        let table = EntryPointTable::new(&[GROUP]);
        let ep = EntryPoint::from_name("Echo", EntryKind::Function, &table).unwrap();
        assert!(ep.is_resolved());
        assert!(ep.address().is_some_and(|a| a != 0));
        assert_eq!(ep.name(), Some("Echo"));
    }

    #[test]
    fn from_name_missing_fails() {
        let table = EntryPointTable::new(&[GROUP]);
        let err = EntryPoint::from_name("Nope", EntryKind::Data, &table).unwrap_err();
        assert_eq!(
            err,
            FfiError::EntryPointNotFound {
                name: "Nope".into()
            }
        );
    }

    #[test]
    fn persisted_records_start_unresolved() {
        let table = EntryPointTable::new(&[GROUP]);
        let created = EntryPoint::from_name("Answer", EntryKind::Data, &table).unwrap();
        let saved = created.to_persisted().unwrap();
        assert_eq!(saved.kind, EntryKind::Data);

        let mut reloaded = EntryPoint::from_persisted(saved);
        assert!(!reloaded.is_resolved());
        assert!(reloaded.resolve(&table));
        assert!(reloaded.resolve(&table));
        assert_eq!(reloaded.address(), created.address());
    }

    #[test]
    fn resolve_against_smaller_table_leaves_unresolved() {
        let full = EntryPointTable::new(&[GROUP]);
        let reduced = EntryPointTable::new(&[&GROUP[1..]]);
        let mut ep = EntryPoint::from_name("Answer", EntryKind::Function, &full).unwrap();
        assert!(!ep.resolve(&reduced));
        assert_eq!(ep.slot(), EntrySlot::Unresolved);

        let mut ctx = TaskContext::new(0);
        let err = ep.invoke(&mut ctx, &[]).unwrap_err();
        assert!(err.is_unrecoverable());
        assert!(err.to_string().contains("Answer"));
    }

    #[test]
    fn address_only_records_have_no_name() {
        let mut ep = EntryPoint::from_address(NonZeroUsize::new(0xdead0).unwrap());
        assert_eq!(ep.name(), None);
        assert_eq!(ep.address(), Some(0xdead0));
        assert!(ep.to_persisted().is_none());

        let mut ctx = TaskContext::new(0);
        assert!(!ep.invoke(&mut ctx, &[]).unwrap_err().is_unrecoverable());

        let table = EntryPointTable::new(&[GROUP]);
        assert!(!ep.resolve(&table));
        assert!(!ep.is_resolved());
    }

    #[test]
    fn entry_point_flags_forbid_sharing() {
        assert!(!EntryPoint::FLAGS.is_shareable());
        assert!(EntryPoint::FLAGS.contains(ObjectFlags::WEAK));
    }
}
