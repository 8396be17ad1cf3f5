//! Types for working with extensions: fields declared outside of a message's own definition
//! inside one of its extension ranges.
//!
//! Extensions are registered with a [`Schema`](../descriptor/struct.Schema.html) and resolved
//! while decoding. Extensions that weren't registered when a message was decoded are kept
//! in the message's unknown fields instead.

use core::fmt::{self, Debug, Formatter};
use std::collections::{btree_map, BTreeMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use crate::{Mergable, internal::Sealed};
use crate::collections::{FieldSet, FieldValue};
use crate::descriptor::{self, FieldDescriptor, Schema};
use crate::io::{read, write, FieldNumber, LengthBuilder, CodedReader, CodedWriter};
use crate::message::{self, write::SizeCache};
use hashbrown::HashMap;
use log::{debug, warn};
use thiserror::Error;

/// The error type for registering extensions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// An extension with the same number was already registered for the host message
    #[error("extension {number} of {host} is already registered")]
    DuplicateExtension {
        /// Full name of the host message
        host: String,
        /// The extension's field number
        number: u32,
    },
    /// The host message isn't in the schema
    #[error("unknown message type {name}")]
    UnknownMessage {
        /// Full name of the host message
        name: String,
    },
    /// The extension's number isn't inside one of the host's extension ranges
    #[error("{number} is not in an extension range of {host}")]
    NotInExtensionRange {
        /// Full name of the host message
        host: String,
        /// The extension's field number
        number: u32,
    },
    /// The extension's type references a message or enum the schema doesn't contain
    #[error("unresolved type reference {name}")]
    UnresolvedType {
        /// The referenced full name
        name: String,
    },
    /// The extension's descriptor is invalid
    #[error(transparent)]
    InvalidField(#[from] descriptor::Error),
}

/// The result of an extension registration
pub type Result<T> = core::result::Result<T, Error>;

type ByHost = HashMap<String, HashMap<FieldNumber, Arc<FieldDescriptor>>>;

/// A registry of extension descriptors by host message name and field number.
///
/// Registration is append-only. The registry takes a write lock to register and a read
/// lock to resolve, so it can be shared between threads decoding messages.
#[derive(Default)]
pub struct ExtensionRegistry {
    by_host: RwLock<ByHost>,
}

impl ExtensionRegistry {
    /// Creates a new empty registry
    pub fn new() -> Self {
        Default::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, ByHost> {
        self.by_host.read().unwrap_or_else(|poisoned| {
            warn!("recovering poisoned extension registry lock");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, ByHost> {
        self.by_host.write().unwrap_or_else(|poisoned| {
            warn!("recovering poisoned extension registry lock");
            poisoned.into_inner()
        })
    }

    /// Registers an extension of the host message.
    ///
    /// This doesn't check the host or the extension against a schema; use
    /// [`Schema::register_extension`](../descriptor/struct.Schema.html#method.register_extension) for that.
    ///
    /// # Errors
    ///
    /// Fails with `DuplicateExtension` if the number is already registered for the host.
    pub fn register(&self, host: &str, field: FieldDescriptor) -> Result<Arc<FieldDescriptor>> {
        let number = field.number();
        let mut by_host = self.write();
        let fields = by_host.entry(host.to_owned()).or_default();
        if fields.contains_key(&number) {
            return Err(Error::DuplicateExtension { host: host.to_owned(), number: number.get() });
        }

        debug!("registered extension {} ({}) of {}", field.name(), number, host);
        let field = Arc::new(field);
        fields.insert(number, Arc::clone(&field));
        Ok(field)
    }
    /// Finds the extension of the host message with the specified number
    pub fn resolve(&self, host: &str, number: FieldNumber) -> Option<Arc<FieldDescriptor>> {
        self.read().get(host).and_then(|fields| fields.get(&number)).cloned()
    }
    /// Returns the extensions registered for the host message by ascending number
    pub fn extensions_of(&self, host: &str) -> Vec<Arc<FieldDescriptor>> {
        let mut fields: Vec<_> = self.read()
            .get(host)
            .map(|fields| fields.values().cloned().collect())
            .unwrap_or_default();
        fields.sort_by_key(|f| f.number());
        fields
    }
    /// Returns the number of registered extensions
    pub fn len(&self) -> usize {
        self.read().values().map(HashMap::len).sum()
    }
    /// Returns whether no extensions are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("len", &self.len())
            .finish()
    }
}

/// A decoded extension value with the descriptor it was decoded with
#[derive(Clone, Debug, PartialEq)]
pub struct Extension {
    descriptor: Arc<FieldDescriptor>,
    value: FieldValue,
}

impl Extension {
    /// Gets the extension's descriptor
    #[inline]
    pub fn descriptor(&self) -> &Arc<FieldDescriptor> {
        &self.descriptor
    }
    /// Gets the extension's value
    #[inline]
    pub fn value(&self) -> &FieldValue {
        &self.value
    }
}

/// The extension values of a message, by field number
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtensionSet {
    values: BTreeMap<FieldNumber, Extension>,
}

impl ExtensionSet {
    /// Creates a new empty set
    pub fn new() -> Self {
        Default::default()
    }
    /// Returns the number of extensions present
    pub fn len(&self) -> usize {
        self.values.len()
    }
    /// Returns whether no extensions are present
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    /// Returns whether an extension is present
    pub fn contains(&self, num: FieldNumber) -> bool {
        self.values.contains_key(&num)
    }
    /// Gets the extension with the specified number
    pub fn get(&self, num: FieldNumber) -> Option<&Extension> {
        self.values.get(&num)
    }
    /// Sets the value of an extension, returning the previous value
    pub fn insert(&mut self, descriptor: Arc<FieldDescriptor>, value: FieldValue) -> Option<FieldValue> {
        self.values
            .insert(descriptor.number(), Extension { descriptor, value })
            .map(|e| e.value)
    }
    /// Gets the value of an extension, inserting the value returned by `f` if it isn't present
    pub fn get_or_insert_with<F: FnOnce() -> FieldValue>(&mut self, descriptor: Arc<FieldDescriptor>, f: F) -> &mut FieldValue {
        &mut self.values
            .entry(descriptor.number())
            .or_insert_with(|| Extension { descriptor, value: f() })
            .value
    }
    /// Removes an extension
    pub fn remove(&mut self, num: FieldNumber) -> Option<FieldValue> {
        self.values.remove(&num).map(|e| e.value)
    }
    /// Removes every extension
    pub fn clear(&mut self) {
        self.values.clear()
    }
    /// Returns an iterator over the extensions present by ascending number
    pub fn iter(&self) -> btree_map::Values<'_, FieldNumber, Extension> {
        self.values.values()
    }

    /// Reads the field started by the input's last tag as the specified extension
    pub(crate) fn merge_field(
        &mut self,
        schema: &Arc<Schema>,
        descriptor: Arc<FieldDescriptor>,
        input: &mut CodedReader,
    ) -> read::Result<()> {
        let num = descriptor.number();
        let mut slot = self.values.remove(&num).map(|e| e.value);
        message::merge::merge_field(schema, &descriptor, &mut slot, input)?;
        if let Some(value) = slot {
            self.values.insert(num, Extension { descriptor, value });
        }
        Ok(())
    }

    pub(crate) fn size_with(&self, builder: LengthBuilder, cache: &mut SizeCache) -> Option<LengthBuilder> {
        self.values
            .values()
            .try_fold(builder, |builder, e| message::write::field_size(&e.descriptor, &e.value, builder, cache))
    }

    pub(crate) fn write_with(&self, output: &mut CodedWriter, cache: &mut SizeCache) -> write::Result {
        for e in self.values.values() {
            message::write::write_field(&e.descriptor, &e.value, output, cache)?;
        }
        Ok(())
    }
}

impl Sealed for ExtensionSet { }
impl Mergable for ExtensionSet {
    fn merge(&mut self, other: &Self) {
        for (num, extension) in &other.values {
            match self.values.entry(*num) {
                btree_map::Entry::Occupied(mut e) => e.get_mut().value.merge(&extension.value),
                btree_map::Entry::Vacant(e) => { e.insert(extension.clone()); },
            }
        }
    }
}
impl FieldSet for ExtensionSet {
    fn calculate_size(&self, builder: LengthBuilder) -> Option<LengthBuilder> {
        self.size_with(builder, &mut SizeCache::default())
    }
    fn write_to(&self, output: &mut CodedWriter) -> write::Result {
        let mut cache = SizeCache::default();
        self.size_with(LengthBuilder::new(), &mut cache).ok_or(write::Error::ValueTooLarge)?;
        self.write_with(output, &mut cache)
    }
    fn check_initialized(&self) -> write::Result {
        for e in self.values.values() {
            message::write::check_value_initialized(&e.value)?;
        }
        Ok(())
    }
}
