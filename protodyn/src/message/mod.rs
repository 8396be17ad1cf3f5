//! Defines the `DynamicMessage`, a message whose fields are described by a descriptor at runtime.

use core::fmt::{self, Debug, Formatter};
use std::borrow::Cow;
use std::sync::Arc;
use crate::Mergable;
use crate::collections::{FieldStore, FieldValue};
use crate::descriptor::{FieldDescriptor, FieldType, Label, MessageDescriptor, Schema};
use crate::extend::ExtensionSet;
use crate::io::{read, CodedReader, FieldNumber};
use crate::value::{MapKey, Value};
use crate::UnknownFieldSet;
use hashbrown::HashMap;
use log::warn;
use thiserror::Error;

pub(crate) mod merge;
pub(crate) mod write;

/// The error type for accessing the fields of a [`DynamicMessage`](struct.DynamicMessage.html)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The schema doesn't contain a message with the name
    #[error("unknown message type {name}")]
    UnknownMessage {
        /// Full name of the missing message type
        name: String,
    },
    /// The message doesn't declare a field with the number
    #[error("message {message} has no field {number}")]
    UnknownField {
        /// Full name of the message
        message: String,
        /// The missing field number
        number: u32,
    },
    /// A value or access didn't match the declared type or label of a field
    #[error("value doesn't match the declared type of field {field} of {message}")]
    SchemaMismatch {
        /// Full name of the message
        message: String,
        /// Name of the field
        field: String,
    },
    /// Two messages of different types were merged
    #[error("can't merge a {actual} into a {expected}")]
    TypeMismatch {
        /// Full name of the message merged into
        expected: String,
        /// Full name of the message merged from
        actual: String,
    },
}

/// The result of a field access
pub type Result<T> = core::result::Result<T, Error>;

/// Returns the default value of a type: the zero value for scalars, the first value of
/// an enum, or an empty message.
pub(crate) fn default_value(schema: &Arc<Schema>, ty: &FieldType) -> Option<Value> {
    match ty {
        FieldType::Message(name) => DynamicMessage::new(schema, name).ok().map(Value::from),
        FieldType::Enum(name) => schema
            .enumeration(name)
            .map(|e| Value::Enum(e.default_value())),
        scalar => Value::zero(scalar),
    }
}

/// A message of any type in a [`Schema`](../descriptor/struct.Schema.html).
///
/// Known fields are kept in a [`FieldStore`], extensions registered with the schema in an
/// [`ExtensionSet`] and everything else in an [`UnknownFieldSet`] so it can be written back.
///
/// [`FieldStore`]: ../collections/struct.FieldStore.html
/// [`ExtensionSet`]: ../extend/struct.ExtensionSet.html
/// [`UnknownFieldSet`]: ../collections/unknown_fields/struct.UnknownFieldSet.html
#[derive(Clone)]
pub struct DynamicMessage {
    schema: Arc<Schema>,
    descriptor: Arc<MessageDescriptor>,
    fields: FieldStore,
    extensions: ExtensionSet,
    unknown_fields: UnknownFieldSet,
}

impl DynamicMessage {
    /// Creates an empty message of the type with the specified full name
    pub fn new(schema: &Arc<Schema>, name: &str) -> Result<DynamicMessage> {
        let descriptor = schema
            .message(name)
            .ok_or_else(|| Error::UnknownMessage { name: name.to_owned() })?;
        Ok(DynamicMessage::of(schema, Arc::clone(descriptor)))
    }

    pub(crate) fn of(schema: &Arc<Schema>, descriptor: Arc<MessageDescriptor>) -> DynamicMessage {
        DynamicMessage {
            schema: Arc::clone(schema),
            descriptor,
            fields: FieldStore::new(),
            extensions: ExtensionSet::new(),
            unknown_fields: UnknownFieldSet::new(),
        }
    }

    /// Decodes a message of the type with the specified full name from a slice
    pub fn parse(schema: &Arc<Schema>, name: &str, bytes: &[u8]) -> crate::Result<DynamicMessage> {
        let mut message = DynamicMessage::new(schema, name)?;
        message.merge_from_slice(bytes)?;
        Ok(message)
    }

    /// Merges fields read from a slice into this message using the default reader options.
    ///
    /// If an error occurs the message is left unchanged.
    pub fn merge_from_slice(&mut self, bytes: &[u8]) -> read::Result<()> {
        self.merge_from(&mut CodedReader::with_slice(bytes))
    }

    /// Merges fields read from the input into this message.
    ///
    /// Singular scalars read replace the current value, singular messages are merged into
    /// the current message, repeated fields are appended to and map entries replace entries
    /// with the same key. If an error occurs the message is left unchanged.
    pub fn merge_from(&mut self, input: &mut CodedReader) -> read::Result<()> {
        let mut merged = self.clone();
        merged.merge_fields_from(input)?;
        *self = merged;
        Ok(())
    }

    /// Merges another message of the same type into this one
    pub fn merge_from_message(&mut self, other: &DynamicMessage) -> Result<()> {
        if self.descriptor.full_name() != other.descriptor.full_name() {
            return Err(Error::TypeMismatch {
                expected: self.descriptor.full_name().to_owned(),
                actual: other.descriptor.full_name().to_owned(),
            });
        }
        self.fields.merge(&other.fields);
        self.extensions.merge(&other.extensions);
        self.unknown_fields.merge(&other.unknown_fields);
        Ok(())
    }

    /// Gets the schema the message's type is from
    #[inline]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
    /// Gets the descriptor of the message's type
    #[inline]
    pub fn descriptor(&self) -> &Arc<MessageDescriptor> {
        &self.descriptor
    }

    fn field_descriptor(&self, number: u32) -> Result<&FieldDescriptor> {
        FieldNumber::new(number)
            .and_then(|num| self.descriptor.field(num))
            .ok_or_else(|| Error::UnknownField {
                message: self.descriptor.full_name().to_owned(),
                number,
            })
    }

    fn mismatch(&self, field: &FieldDescriptor) -> Error {
        Error::SchemaMismatch {
            message: self.descriptor.full_name().to_owned(),
            field: field.name().to_owned(),
        }
    }

    /// Gets the value of any known field
    pub fn field(&self, number: u32) -> Result<Option<&FieldValue>> {
        let field = self.field_descriptor(number)?;
        Ok(self.fields.get(field.number()))
    }
    /// Gets the value of a singular field if it's set
    pub fn get(&self, number: u32) -> Result<Option<&Value>> {
        let field = self.field_descriptor(number)?;
        if !field.is_singular() {
            return Err(self.mismatch(field));
        }
        Ok(self.fields.get(field.number()).and_then(FieldValue::as_singular))
    }
    /// Gets the value of a singular field, or its default if it isn't set.
    ///
    /// The default is the field's explicit default, the first value of an enum,
    /// an empty message, or the zero value of its type.
    pub fn get_or_default(&self, number: u32) -> Result<Cow<'_, Value>> {
        let field = self.field_descriptor(number)?;
        if let Some(value) = self.get(number)? {
            return Ok(Cow::Borrowed(value));
        }
        if let Some(default) = field.default_value() {
            return Ok(Cow::Owned(default.clone()));
        }
        default_value(&self.schema, field.field_type())
            .map(Cow::Owned)
            .ok_or_else(|| Error::UnknownMessage { name: field.field_type().to_string() })
    }
    /// Gets the values of a repeated field. This is empty if the field isn't set.
    pub fn repeated(&self, number: u32) -> Result<&[Value]> {
        let field = self.field_descriptor(number)?;
        if !field.is_repeated() {
            return Err(self.mismatch(field));
        }
        Ok(self.fields.get(field.number()).and_then(FieldValue::as_repeated).unwrap_or(&[]))
    }
    /// Gets the value of a map field's entry
    pub fn map_entry(&self, number: u32, key: &MapKey) -> Result<Option<&Value>> {
        let field = self.field_descriptor(number)?;
        if !field.is_map() {
            return Err(self.mismatch(field));
        }
        Ok(self.fields.get(field.number()).and_then(FieldValue::as_map).and_then(|m| m.get(key)))
    }
    /// Returns whether a singular field is set or a repeated or map field has any elements
    pub fn has(&self, number: u32) -> Result<bool> {
        Ok(self.field(number)?.map_or(false, |v| !v.is_empty()))
    }
    /// Sets the value of a singular field
    pub fn set(&mut self, number: u32, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let field = self.field_descriptor(number)?;
        if !field.is_singular() || !value.is_valid_for(field.field_type()) {
            return Err(self.mismatch(field));
        }
        let num = field.number();
        self.fields.insert(num, FieldValue::Singular(value));
        Ok(())
    }
    /// Gets a mutable reference to a singular message field, setting it to an empty message if it isn't set
    pub fn message_mut(&mut self, number: u32) -> Result<&mut DynamicMessage> {
        let field = self.field_descriptor(number)?;
        let name = match (field.label(), field.field_type()) {
            (Label::Optional, FieldType::Message(name)) | (Label::Required, FieldType::Message(name)) => name.clone(),
            _ => return Err(self.mismatch(field)),
        };
        let num = field.number();
        if !matches!(self.fields.get(num), Some(FieldValue::Singular(Value::Message(_)))) {
            let empty = DynamicMessage::new(&self.schema, &name)?;
            self.fields.insert(num, FieldValue::Singular(empty.into()));
        }
        match self.fields.get_mut(num) {
            Some(FieldValue::Singular(Value::Message(message))) => Ok(message),
            _ => Err(Error::UnknownMessage { name }),
        }
    }
    /// Appends a value to a repeated field
    pub fn push(&mut self, number: u32, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let field = self.field_descriptor(number)?;
        if !field.is_repeated() || !value.is_valid_for(field.field_type()) {
            return Err(self.mismatch(field));
        }
        let num = field.number();
        match self.fields.entry(num).or_insert_with(|| FieldValue::Repeated(Vec::new())) {
            FieldValue::Repeated(values) => values.push(value),
            other => *other = FieldValue::Repeated(vec![value]),
        }
        Ok(())
    }
    /// Inserts an entry into a map field, replacing any entry with the same key
    pub fn insert_map_entry(&mut self, number: u32, key: impl Into<MapKey>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        let field = self.field_descriptor(number)?;
        let valid = match field.map_key() {
            Some(key_type) => key.is_valid_for(key_type) && value.is_valid_for(field.field_type()),
            None => false,
        };
        if !valid {
            return Err(self.mismatch(field));
        }
        let num = field.number();
        match self.fields.entry(num).or_insert_with(|| FieldValue::Map(HashMap::new())) {
            FieldValue::Map(entries) => { entries.insert(key, value); },
            other => *other = FieldValue::Map(Some((key, value)).into_iter().collect()),
        }
        Ok(())
    }
    /// Clears a field
    pub fn clear(&mut self, number: u32) -> Result<()> {
        let num = self.field_descriptor(number)?.number();
        self.fields.remove(num);
        Ok(())
    }
    /// Clears every field, extension and unknown field of the message
    pub fn clear_all(&mut self) {
        self.fields.clear();
        self.extensions.clear();
        self.unknown_fields.clear();
    }
    /// Returns an iterator over the fields that are set, in declaration order
    pub fn fields(&self) -> impl Iterator<Item = (&FieldDescriptor, &FieldValue)> + '_ {
        self.descriptor
            .fields()
            .iter()
            .filter_map(move |f| self.fields.get(f.number()).map(|v| (f, v)))
    }
    /// Gets the store of the message's known fields
    #[inline]
    pub fn field_store(&self) -> &FieldStore {
        &self.fields
    }

    /// Gets the extensions decoded or set on the message
    #[inline]
    pub fn extensions(&self) -> &ExtensionSet {
        &self.extensions
    }
    /// Gets the value of an extension
    pub fn extension(&self, number: u32) -> Option<&FieldValue> {
        FieldNumber::new(number)
            .and_then(|num| self.extensions.get(num))
            .map(|e| e.value())
    }
    /// Sets the value of a singular extension or appends to a repeated extension.
    /// The extension must be registered with the message's schema.
    pub fn set_extension(&mut self, number: u32, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let field = FieldNumber::new(number)
            .and_then(|num| self.schema.extensions().resolve(self.descriptor.full_name(), num))
            .ok_or_else(|| Error::UnknownField {
                message: self.descriptor.full_name().to_owned(),
                number,
            })?;
        if !value.is_valid_for(field.field_type()) {
            return Err(self.mismatch(&field));
        }
        if field.is_repeated() {
            match self.extensions.get_or_insert_with(field, || FieldValue::Repeated(Vec::new())) {
                FieldValue::Repeated(values) => values.push(value),
                other => *other = FieldValue::Repeated(vec![value]),
            }
        } else {
            self.extensions.insert(field, FieldValue::Singular(value));
        }
        Ok(())
    }
    /// Clears an extension
    pub fn clear_extension(&mut self, number: u32) {
        if let Some(num) = FieldNumber::new(number) {
            self.extensions.remove(num);
        }
    }

    /// Gets the fields read that weren't known by the message
    #[inline]
    pub fn unknown_fields(&self) -> &UnknownFieldSet {
        &self.unknown_fields
    }
    /// Gets a unique reference to the fields read that weren't known by the message
    #[inline]
    pub fn unknown_fields_mut(&mut self) -> &mut UnknownFieldSet {
        &mut self.unknown_fields
    }
}

impl Mergable for DynamicMessage {
    fn merge(&mut self, other: &Self) {
        if let Err(e) = self.merge_from_message(other) {
            warn!("skipped merge: {}", e);
        }
    }
}

impl PartialEq for DynamicMessage {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor.full_name() == other.descriptor.full_name()
            && self.fields == other.fields
            && self.extensions == other.extensions
            && self.unknown_fields == other.unknown_fields
    }
}

impl Debug for DynamicMessage {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("DynamicMessage")
            .field("type", &self.descriptor.full_name())
            .field("fields", &self.fields)
            .field("extensions", &self.extensions)
            .field("unknown_fields", &self.unknown_fields)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;
    use std::sync::Arc;
    use crate::Mergable;
    use crate::descriptor::{EnumDescriptor, FieldDescriptor, FieldType, MessageDescriptor, Schema};
    use crate::value::{MapKey, Value};
    use super::{DynamicMessage, Error};

    fn schema() -> Arc<Schema> {
        let person = MessageDescriptor::builder("test.Person")
            .field(FieldDescriptor::new(1, "name", FieldType::String).unwrap().with_default("anonymous"))
            .field(FieldDescriptor::new(2, "age", FieldType::Uint32).unwrap())
            .field(FieldDescriptor::new(3, "mood", FieldType::Enum("test.Mood".into())).unwrap())
            .field(FieldDescriptor::new(4, "friends", FieldType::Message("test.Person".into())).unwrap().repeated())
            .field(FieldDescriptor::new(5, "best_friend", FieldType::Message("test.Person".into())).unwrap())
            .field(FieldDescriptor::map(6, "scores", FieldType::String, FieldType::Int64).unwrap())
            .extension_range(100..110)
            .build()
            .unwrap();
        let mood = EnumDescriptor::new("test.Mood", vec![("HAPPY", 3), ("SAD", 4)]).unwrap();
        let other = MessageDescriptor::builder("test.Other").build().unwrap();
        Arc::new(
            Schema::builder()
                .message(person)
                .message(other)
                .enumeration(mood)
                .extension("test.Person", FieldDescriptor::new(100, "nickname", FieldType::String).unwrap().repeated())
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn unknown_message_type() {
        let schema = schema();
        assert_matches!(DynamicMessage::new(&schema, "test.Missing"), Err(Error::UnknownMessage { .. }));
    }
    #[test]
    fn defaults() {
        let schema = schema();
        let person = DynamicMessage::new(&schema, "test.Person").unwrap();

        assert_eq!(person.get(1).unwrap(), None);
        assert_eq!(*person.get_or_default(1).unwrap(), Value::from("anonymous"));
        assert_eq!(person.get_or_default(2).unwrap().as_u32(), Some(0));
        assert_eq!(person.get_or_default(3).unwrap().as_enum(), Some(3));
        let friend = person.get_or_default(5).unwrap();
        assert!(friend.as_message().map_or(false, |m| m.field_store().is_empty()));
        assert!(!person.has(1).unwrap());
    }
    #[test]
    fn accessors_check_the_descriptor() {
        let schema = schema();
        let mut person = DynamicMessage::new(&schema, "test.Person").unwrap();

        assert_matches!(person.set(9, 1u32), Err(Error::UnknownField { number: 9, .. }));
        assert_matches!(person.set(2, "old"), Err(Error::SchemaMismatch { ref field, .. }) if field == "age");
        assert_matches!(person.push(2, 1u32), Err(Error::SchemaMismatch { .. }));
        assert_matches!(person.get(4), Err(Error::SchemaMismatch { .. }));
        assert_matches!(
            person.push(4, DynamicMessage::new(&schema, "test.Other").unwrap()),
            Err(Error::SchemaMismatch { .. })
        );
        assert_matches!(person.insert_map_entry(6, 1i32, 1i64), Err(Error::SchemaMismatch { .. }));

        person.set(2, 30u32).unwrap();
        person.insert_map_entry(6, "chess", 1200i64).unwrap();
        person.insert_map_entry(6, "chess", 1300i64).unwrap();
        assert_eq!(person.get(2).unwrap(), Some(&Value::U32(30)));
        assert_eq!(person.map_entry(6, &MapKey::from("chess")).unwrap(), Some(&Value::I64(1300)));

        person.clear(2).unwrap();
        assert!(!person.has(2).unwrap());
    }
    #[test]
    fn nested_mutation() {
        let schema = schema();
        let mut person = DynamicMessage::new(&schema, "test.Person").unwrap();
        person.message_mut(5).unwrap().set(1, "sam").unwrap();
        person.message_mut(5).unwrap().set(2, 7u32).unwrap();

        let friend = person.get(5).unwrap().and_then(Value::as_message).unwrap();
        assert_eq!(friend.get(1).unwrap(), Some(&Value::from("sam")));
        assert_eq!(friend.get(2).unwrap(), Some(&Value::U32(7)));
        assert_matches!(person.message_mut(2), Err(Error::SchemaMismatch { .. }));

        let names: Vec<_> = person.fields().map(|(f, _)| f.name()).collect();
        assert_eq!(names, ["best_friend"]);
    }
    #[test]
    fn extensions() {
        let schema = schema();
        let mut person = DynamicMessage::new(&schema, "test.Person").unwrap();
        person.set_extension(100, "al").unwrap();
        person.set_extension(100, "bert").unwrap();
        assert_matches!(person.set_extension(101, "x"), Err(Error::UnknownField { number: 101, .. }));
        assert_matches!(person.set_extension(100, 1u32), Err(Error::SchemaMismatch { .. }));

        assert_eq!(
            person.extension(100).and_then(|v| v.as_repeated()),
            Some(&[Value::from("al"), Value::from("bert")][..])
        );
        let parsed = DynamicMessage::parse(&schema, "test.Person", &person.to_vec().unwrap()).unwrap();
        assert_eq!(parsed, person);

        person.clear_extension(100);
        assert!(person.extensions().is_empty());
    }
    #[test]
    fn merge_messages() {
        let schema = schema();
        let mut a = DynamicMessage::new(&schema, "test.Person").unwrap();
        a.set(1, "a").unwrap();
        a.push(4, DynamicMessage::new(&schema, "test.Person").unwrap()).unwrap();
        a.message_mut(5).unwrap().set(1, "x").unwrap();

        let mut b = DynamicMessage::new(&schema, "test.Person").unwrap();
        b.set(2, 5u32).unwrap();
        b.push(4, DynamicMessage::new(&schema, "test.Person").unwrap()).unwrap();
        b.message_mut(5).unwrap().set(2, 1u32).unwrap();

        a.merge(&b);
        assert_eq!(a.get(1).unwrap(), Some(&Value::from("a")));
        assert_eq!(a.get(2).unwrap(), Some(&Value::U32(5)));
        assert_eq!(a.repeated(4).unwrap().len(), 2);
        let best = a.get(5).unwrap().and_then(Value::as_message).unwrap();
        assert_eq!(best.get(1).unwrap(), Some(&Value::from("x")));
        assert_eq!(best.get(2).unwrap(), Some(&Value::U32(1)));

        let other = DynamicMessage::new(&schema, "test.Other").unwrap();
        assert_matches!(a.merge_from_message(&other), Err(Error::TypeMismatch { .. }));

        a.clear_all();
        assert!(a.field_store().is_empty());
    }
}
