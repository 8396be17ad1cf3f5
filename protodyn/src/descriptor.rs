//! Descriptors describing the fields of messages and the values of enums, and the
//! [`Schema`](struct.Schema.html) that resolves type names to them.
//!
//! Descriptors are built once through builders that validate them, then shared
//! immutably behind `Arc`s by every message that uses them.

use core::fmt::{self, Display, Formatter};
use core::ops::Range;
use std::sync::Arc;
use crate::extend::{self, ExtensionRegistry};
use crate::io::{FieldNumber, WireType, InvalidFieldNumber};
use crate::value::Value;
use hashbrown::HashMap;
use log::debug;
use thiserror::Error;

/// The error type for building descriptors and schemas
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A field number was 0 or larger than 536,870,911
    #[error("{0}")]
    InvalidFieldNumber(#[from] InvalidFieldNumber),
    /// A field number was in the range reserved for the implementation
    #[error("field number {number} is reserved")]
    ReservedFieldNumber {
        /// The reserved field number
        number: u32,
    },
    /// Two fields in a message shared a number
    #[error("message {message} declares field number {number} more than once")]
    DuplicateFieldNumber {
        /// Full name of the message
        message: String,
        /// The repeated field number
        number: u32,
    },
    /// Two fields in a message shared a name
    #[error("message {message} declares field {name} more than once")]
    DuplicateFieldName {
        /// Full name of the message
        message: String,
        /// The repeated field name
        name: String,
    },
    /// A map field used a key type that can't be a map key
    #[error("field {field} has an invalid map key type")]
    InvalidMapKey {
        /// Name of the map field
        field: String,
    },
    /// A field was declared packed but isn't a repeated scalar field
    #[error("field {field} can't be packed")]
    InvalidPacked {
        /// Name of the field
        field: String,
    },
    /// A field's default value didn't match its type or the field can't have a default
    #[error("field {field} has an invalid default value")]
    InvalidDefault {
        /// Name of the field
        field: String,
    },
    /// An extension range was empty or out of bounds
    #[error("message {message} has an invalid extension range {start}..{end}")]
    InvalidExtensionRange {
        /// Full name of the message
        message: String,
        /// First number of the range
        start: u32,
        /// Number one past the end of the range
        end: u32,
    },
    /// A field was declared inside one of its message's extension ranges
    #[error("field number {number} of message {message} is inside an extension range")]
    FieldInExtensionRange {
        /// Full name of the message
        message: String,
        /// The field number
        number: u32,
    },
    /// Two types in a schema shared a full name
    #[error("type {name} is declared more than once")]
    DuplicateType {
        /// The repeated full name
        name: String,
    },
    /// A field referenced a type the schema doesn't contain
    #[error("unresolved type reference {name}")]
    UnresolvedType {
        /// The referenced full name
        name: String,
    },
    /// An enum was declared without values
    #[error("enum {name} has no values")]
    EmptyEnum {
        /// Full name of the enum
        name: String,
    },
    /// An extension was declared as a map or required field
    #[error("extension {field} must be optional or repeated")]
    InvalidExtensionLabel {
        /// Name of the extension
        field: String,
    },
}

/// The result of building a descriptor
pub type Result<T> = core::result::Result<T, Error>;

/// The semantic type of a field
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// bool
    Bool,
    /// int32
    Int32,
    /// int64
    Int64,
    /// uint32
    Uint32,
    /// uint64
    Uint64,
    /// sint32, zig-zag encoded
    Sint32,
    /// sint64, zig-zag encoded
    Sint64,
    /// fixed32
    Fixed32,
    /// fixed64
    Fixed64,
    /// sfixed32
    Sfixed32,
    /// sfixed64
    Sfixed64,
    /// float
    Float,
    /// double
    Double,
    /// string
    String,
    /// bytes
    Bytes,
    /// A message type referenced by its full name
    Message(String),
    /// An enum type referenced by its full name
    Enum(String),
}

impl FieldType {
    /// Returns the wire type values of this type are encoded with
    pub fn wire_type(&self) -> WireType {
        match self {
            FieldType::Bool
            | FieldType::Int32
            | FieldType::Int64
            | FieldType::Uint32
            | FieldType::Uint64
            | FieldType::Sint32
            | FieldType::Sint64
            | FieldType::Enum(_) => WireType::Varint,
            FieldType::Fixed32 | FieldType::Sfixed32 | FieldType::Float => WireType::Bit32,
            FieldType::Fixed64 | FieldType::Sfixed64 | FieldType::Double => WireType::Bit64,
            FieldType::String | FieldType::Bytes | FieldType::Message(_) => WireType::LengthDelimited,
        }
    }
    /// Returns whether repeated fields of this type can be packed
    #[inline]
    pub fn is_packable(&self) -> bool {
        self.wire_type().is_packable()
    }
    /// Returns whether this type can be used as the key of a map field
    pub fn is_valid_map_key(&self) -> bool {
        !matches!(
            self,
            FieldType::Float | FieldType::Double | FieldType::Bytes | FieldType::Message(_) | FieldType::Enum(_)
        )
    }
    /// Returns the full name of the referenced message or enum type
    pub fn type_name(&self) -> Option<&str> {
        match self {
            FieldType::Message(name) | FieldType::Enum(name) => Some(name),
            _ => None,
        }
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            FieldType::Message(name) | FieldType::Enum(name) => f.write_str(name),
            other => f.write_str(&format!("{:?}", other).to_lowercase()),
        }
    }
}

/// The cardinality of a field
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Label {
    /// A singular field that may be absent
    Optional,
    /// A singular field that must be present for its message to be written
    Required,
    /// A repeated field
    Repeated,
    /// A map field with the specified key type. The field's type is the type of the values.
    Map(FieldType),
}

/// Describes a single field of a message or an extension
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDescriptor {
    number: FieldNumber,
    name: String,
    label: Label,
    field_type: FieldType,
    packed: bool,
    default: Option<Value>,
}

impl FieldDescriptor {
    /// Creates an optional field with the specified number, name and type
    ///
    /// # Errors
    ///
    /// Fails if the number is 0, larger than 536,870,911 or in the reserved range 19000 to 19999
    pub fn new(number: u32, name: impl Into<String>, field_type: FieldType) -> Result<FieldDescriptor> {
        let number = FieldNumber::new(number).ok_or(InvalidFieldNumber(number))?;
        if number.is_reserved() {
            return Err(Error::ReservedFieldNumber { number: number.get() });
        }
        Ok(FieldDescriptor {
            number,
            name: name.into(),
            label: Label::Optional,
            field_type,
            packed: false,
            default: None,
        })
    }
    /// Creates a map field with the specified key and value types
    pub fn map(number: u32, name: impl Into<String>, key: FieldType, value: FieldType) -> Result<FieldDescriptor> {
        let mut field = FieldDescriptor::new(number, name, value)?;
        if !key.is_valid_map_key() {
            return Err(Error::InvalidMapKey { field: field.name });
        }
        field.label = Label::Map(key);
        Ok(field)
    }
    /// Makes this a repeated field
    pub fn repeated(mut self) -> Self {
        self.label = Label::Repeated;
        self
    }
    /// Makes this a required field
    pub fn required(mut self) -> Self {
        self.label = Label::Required;
        self
    }
    /// Sets whether this repeated field is written packed
    pub fn packed(mut self, value: bool) -> Self {
        self.packed = value;
        self
    }
    /// Sets the explicit default value of this singular field
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Gets the field number
    #[inline]
    pub fn number(&self) -> FieldNumber {
        self.number
    }
    /// Gets the field name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
    /// Gets the field label
    #[inline]
    pub fn label(&self) -> &Label {
        &self.label
    }
    /// Gets the type of the field, or of its values for map fields
    #[inline]
    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }
    /// Gets the key type of a map field
    pub fn map_key(&self) -> Option<&FieldType> {
        match &self.label {
            Label::Map(key) => Some(key),
            _ => None,
        }
    }
    /// Returns whether the field is written packed
    #[inline]
    pub fn is_packed(&self) -> bool {
        self.packed
    }
    /// Returns the explicit default value of the field
    #[inline]
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }
    /// Returns whether this is a repeated field
    #[inline]
    pub fn is_repeated(&self) -> bool {
        self.label == Label::Repeated
    }
    /// Returns whether this is a map field
    #[inline]
    pub fn is_map(&self) -> bool {
        matches!(self.label, Label::Map(_))
    }
    /// Returns whether this is a required field
    #[inline]
    pub fn is_required(&self) -> bool {
        self.label == Label::Required
    }
    /// Returns whether this field holds a single value
    #[inline]
    pub fn is_singular(&self) -> bool {
        matches!(self.label, Label::Optional | Label::Required)
    }
    /// Returns the wire type of the field's unpacked values. Map entries are length delimited.
    pub fn wire_type(&self) -> WireType {
        if self.is_map() {
            WireType::LengthDelimited
        } else {
            self.field_type.wire_type()
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.packed && !(self.is_repeated() && self.field_type.is_packable()) {
            return Err(Error::InvalidPacked { field: self.name.clone() });
        }
        if let Some(key) = self.map_key() {
            if !key.is_valid_map_key() {
                return Err(Error::InvalidMapKey { field: self.name.clone() });
            }
        }
        if let Some(default) = &self.default {
            if !self.is_singular() || !default.is_valid_for(&self.field_type) || default.as_message().is_some() {
                return Err(Error::InvalidDefault { field: self.name.clone() });
            }
        }
        Ok(())
    }
}

/// Describes a message type: its full name, its fields in declaration order and the
/// ranges of numbers reserved for extensions.
#[derive(Clone, Debug)]
pub struct MessageDescriptor {
    full_name: String,
    fields: Vec<FieldDescriptor>,
    by_number: HashMap<FieldNumber, usize>,
    extension_ranges: Vec<Range<u32>>,
}

impl PartialEq for MessageDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.full_name == other.full_name
            && self.fields == other.fields
            && self.extension_ranges == other.extension_ranges
    }
}

impl MessageDescriptor {
    /// Starts building a descriptor for the message with the specified full name
    pub fn builder(full_name: impl Into<String>) -> MessageBuilder {
        MessageBuilder {
            full_name: full_name.into(),
            fields: Vec::new(),
            extension_ranges: Vec::new(),
        }
    }

    /// Gets the full name of the message
    #[inline]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }
    /// Gets the fields of the message in declaration order
    #[inline]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }
    /// Finds a field by number
    pub fn field(&self, num: FieldNumber) -> Option<&FieldDescriptor> {
        self.by_number.get(&num).and_then(|&i| self.fields.get(i))
    }
    /// Finds a field by name
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
    /// Gets the extension ranges of the message
    #[inline]
    pub fn extension_ranges(&self) -> &[Range<u32>] {
        &self.extension_ranges
    }
    /// Returns whether the number is inside one of the message's extension ranges
    pub fn is_extension_number(&self, num: FieldNumber) -> bool {
        self.extension_ranges.iter().any(|r| r.contains(&num.get()))
    }
}

/// A builder for a [`MessageDescriptor`](struct.MessageDescriptor.html)
#[derive(Clone, Debug)]
pub struct MessageBuilder {
    full_name: String,
    fields: Vec<FieldDescriptor>,
    extension_ranges: Vec<Range<u32>>,
}

impl MessageBuilder {
    /// Adds a field after the fields already added
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }
    /// Reserves a half open range of numbers for extensions
    pub fn extension_range(mut self, range: Range<u32>) -> Self {
        self.extension_ranges.push(range);
        self
    }
    /// Validates and builds the descriptor
    pub fn build(self) -> Result<MessageDescriptor> {
        let MessageBuilder { full_name, fields, extension_ranges } = self;

        for range in &extension_ranges {
            if range.start == 0 || range.start >= range.end || range.end > FieldNumber::MAX_VALUE + 1 {
                return Err(Error::InvalidExtensionRange {
                    message: full_name,
                    start: range.start,
                    end: range.end,
                });
            }
        }

        let mut by_number = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            field.validate()?;
            let number = field.number.get();
            if by_number.insert(field.number, i).is_some() {
                return Err(Error::DuplicateFieldNumber { message: full_name, number });
            }
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(Error::DuplicateFieldName { message: full_name, name: field.name.clone() });
            }
            if extension_ranges.iter().any(|r| r.contains(&number)) {
                return Err(Error::FieldInExtensionRange { message: full_name, number });
            }
        }

        Ok(MessageDescriptor { full_name, fields, by_number, extension_ranges })
    }
}

/// Describes an enum type. Enums are open: numbers not listed here are still valid values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumDescriptor {
    full_name: String,
    values: Vec<(String, i32)>,
}

impl EnumDescriptor {
    /// Creates an enum descriptor from its named values. The first value is the enum's default.
    pub fn new<I, S>(full_name: impl Into<String>, values: I) -> Result<EnumDescriptor>
    where
        I: IntoIterator<Item = (S, i32)>,
        S: Into<String>,
    {
        let full_name = full_name.into();
        let values: Vec<_> = values.into_iter().map(|(n, v)| (n.into(), v)).collect();
        if values.is_empty() {
            return Err(Error::EmptyEnum { name: full_name });
        }
        Ok(EnumDescriptor { full_name, values })
    }
    /// Gets the full name of the enum
    #[inline]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }
    /// Gets the named values of the enum in declaration order
    #[inline]
    pub fn values(&self) -> &[(String, i32)] {
        &self.values
    }
    /// Gets the default value of the enum, its first declared value
    pub fn default_value(&self) -> i32 {
        self.values.first().map_or(0, |(_, v)| *v)
    }
    /// Finds the number of a value by name
    pub fn value_by_name(&self, name: &str) -> Option<i32> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }
    /// Finds the first name given to a number
    pub fn name_of(&self, number: i32) -> Option<&str> {
        self.values.iter().find(|(_, v)| *v == number).map(|(n, _)| n.as_str())
    }
}

/// A set of message and enum descriptors by full name, with the extensions registered
/// for its messages.
///
/// A schema is immutable once built apart from extension registration and is shared
/// between messages as an `Arc<Schema>`.
#[derive(Debug, Default)]
pub struct Schema {
    messages: HashMap<String, Arc<MessageDescriptor>>,
    enums: HashMap<String, Arc<EnumDescriptor>>,
    extensions: ExtensionRegistry,
}

impl Schema {
    /// Starts building a schema
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Finds a message descriptor by full name
    pub fn message(&self, name: &str) -> Option<&Arc<MessageDescriptor>> {
        self.messages.get(name)
    }
    /// Finds an enum descriptor by full name
    pub fn enumeration(&self, name: &str) -> Option<&Arc<EnumDescriptor>> {
        self.enums.get(name)
    }
    /// Returns an iterator over the message descriptors in the schema
    pub fn messages(&self) -> impl Iterator<Item = &Arc<MessageDescriptor>> {
        self.messages.values()
    }
    /// Gets the extensions registered with the schema
    #[inline]
    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    fn resolves(&self, field: &FieldDescriptor) -> bool {
        match field.field_type() {
            FieldType::Message(name) => self.messages.contains_key(name.as_str()),
            FieldType::Enum(name) => self.enums.contains_key(name.as_str()),
            _ => true,
        }
    }

    /// Registers an extension of the host message.
    ///
    /// # Errors
    ///
    /// Fails if the host isn't in the schema, the number isn't inside one of the host's
    /// extension ranges, the field's type doesn't resolve, or the number was already registered.
    pub fn register_extension(&self, host: &str, field: FieldDescriptor) -> extend::Result<Arc<FieldDescriptor>> {
        let descriptor = self.message(host).ok_or_else(|| extend::Error::UnknownMessage { name: host.to_owned() })?;
        if !descriptor.is_extension_number(field.number()) {
            return Err(extend::Error::NotInExtensionRange {
                host: host.to_owned(),
                number: field.number().get(),
            });
        }
        if !matches!(field.label(), Label::Optional | Label::Repeated) {
            return Err(Error::InvalidExtensionLabel { field: field.name().to_owned() }.into());
        }
        field.validate()?;
        if !self.resolves(&field) {
            return Err(extend::Error::UnresolvedType { name: field.field_type().to_string() });
        }
        self.extensions.register(host, field)
    }
}

/// A builder for a [`Schema`](struct.Schema.html)
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    messages: Vec<MessageDescriptor>,
    enums: Vec<EnumDescriptor>,
    extensions: Vec<(String, FieldDescriptor)>,
}

impl SchemaBuilder {
    /// Adds a message descriptor
    pub fn message(mut self, descriptor: MessageDescriptor) -> Self {
        self.messages.push(descriptor);
        self
    }
    /// Adds an enum descriptor
    pub fn enumeration(mut self, descriptor: EnumDescriptor) -> Self {
        self.enums.push(descriptor);
        self
    }
    /// Adds an extension of the host message, registered when the schema is built
    pub fn extension(mut self, host: impl Into<String>, field: FieldDescriptor) -> Self {
        self.extensions.push((host.into(), field));
        self
    }
    /// Builds the schema, checking that every type name is unique and every reference resolves
    pub fn build(self) -> crate::Result<Schema> {
        let mut schema = Schema::default();

        for descriptor in self.enums {
            let name = descriptor.full_name.clone();
            if schema.messages.contains_key(&name) || schema.enums.insert(name.clone(), Arc::new(descriptor)).is_some() {
                return Err(Error::DuplicateType { name }.into());
            }
        }
        for descriptor in self.messages {
            let name = descriptor.full_name.clone();
            if schema.enums.contains_key(&name) || schema.messages.insert(name.clone(), Arc::new(descriptor)).is_some() {
                return Err(Error::DuplicateType { name }.into());
            }
        }

        for message in schema.messages.values() {
            for field in message.fields() {
                if !schema.resolves(field) {
                    return Err(Error::UnresolvedType { name: field.field_type().to_string() }.into());
                }
            }
        }

        debug!(
            "built schema with {} messages and {} enums",
            schema.messages.len(),
            schema.enums.len()
        );

        for (host, field) in self.extensions {
            schema.register_extension(&host, field)?;
        }

        Ok(schema)
    }
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;
    use crate::Error as CrateError;
    use crate::extend;
    use crate::io::{FieldNumber, WireType};
    use crate::value::Value;
    use super::{EnumDescriptor, Error, FieldDescriptor, FieldType, Label, MessageDescriptor, Schema};

    fn message_options() -> MessageDescriptor {
        MessageDescriptor::builder("google.protobuf.MessageOptions")
            .field(FieldDescriptor::new(1, "message_set_wire_format", FieldType::Bool).unwrap().with_default(false))
            .field(FieldDescriptor::new(2, "no_standard_descriptor_accessor", FieldType::Bool).unwrap().with_default(false))
            .field(FieldDescriptor::new(3, "deprecated", FieldType::Bool).unwrap().with_default(false))
            .field(FieldDescriptor::new(7, "map_entry", FieldType::Bool).unwrap())
            .field(FieldDescriptor::new(999, "uninterpreted_option", FieldType::Message("google.protobuf.UninterpretedOption".into())).unwrap().repeated())
            .extension_range(1000..FieldNumber::MAX_VALUE + 1)
            .build()
            .unwrap()
    }

    #[test]
    fn field_lookup() {
        let descriptor = message_options();

        assert_eq!(descriptor.fields().len(), 5);
        assert_eq!(descriptor.fields()[2].name(), "deprecated");
        assert_eq!(descriptor.field(FieldNumber::new(7).unwrap()).map(FieldDescriptor::name), Some("map_entry"));
        assert!(descriptor.field(FieldNumber::new(4).unwrap()).is_none());
        assert_eq!(descriptor.field_by_name("deprecated").map(|f| f.number().get()), Some(3));
        assert!(descriptor.is_extension_number(FieldNumber::new(1000).unwrap()));
        assert!(descriptor.is_extension_number(FieldNumber::MAX));
        assert!(!descriptor.is_extension_number(FieldNumber::new(999).unwrap()));
    }
    #[test]
    fn invalid_numbers() {
        assert_matches!(FieldDescriptor::new(0, "a", FieldType::Bool), Err(Error::InvalidFieldNumber(_)));
        assert_matches!(FieldDescriptor::new(FieldNumber::MAX_VALUE + 1, "a", FieldType::Bool), Err(Error::InvalidFieldNumber(_)));
        assert_matches!(FieldDescriptor::new(19_500, "a", FieldType::Bool), Err(Error::ReservedFieldNumber { number: 19_500 }));

        let duplicate = MessageDescriptor::builder("a.M")
            .field(FieldDescriptor::new(1, "a", FieldType::Bool).unwrap())
            .field(FieldDescriptor::new(1, "b", FieldType::Bool).unwrap())
            .build();
        assert_matches!(duplicate, Err(Error::DuplicateFieldNumber { number: 1, .. }));

        let in_range = MessageDescriptor::builder("a.M")
            .field(FieldDescriptor::new(100, "a", FieldType::Bool).unwrap())
            .extension_range(100..200)
            .build();
        assert_matches!(in_range, Err(Error::FieldInExtensionRange { number: 100, .. }));

        let empty_range = MessageDescriptor::builder("a.M").extension_range(5..5).build();
        assert_matches!(empty_range, Err(Error::InvalidExtensionRange { start: 5, end: 5, .. }));
    }
    #[test]
    fn field_shapes() {
        assert_matches!(
            FieldDescriptor::map(1, "m", FieldType::Double, FieldType::Bool),
            Err(Error::InvalidMapKey { .. })
        );
        let map = FieldDescriptor::map(1, "m", FieldType::String, FieldType::Int32).unwrap();
        assert_eq!(map.label(), &Label::Map(FieldType::String));
        assert_eq!(map.wire_type(), WireType::LengthDelimited);

        let packed_string = MessageDescriptor::builder("a.M")
            .field(FieldDescriptor::new(1, "s", FieldType::String).unwrap().repeated().packed(true))
            .build();
        assert_matches!(packed_string, Err(Error::InvalidPacked { .. }));

        let bad_default = MessageDescriptor::builder("a.M")
            .field(FieldDescriptor::new(1, "s", FieldType::String).unwrap().with_default(3i32))
            .build();
        assert_matches!(bad_default, Err(Error::InvalidDefault { .. }));

        let field = FieldDescriptor::new(1, "s", FieldType::Sint64).unwrap().with_default(-3i64);
        assert_eq!(field.default_value(), Some(&Value::I64(-3)));
        assert_eq!(field.field_type().wire_type(), WireType::Varint);
    }
    #[test]
    fn enums_default_to_first_value() {
        let e = EnumDescriptor::new("a.E", vec![("B", 2), ("A", 1)]).unwrap();
        assert_eq!(e.default_value(), 2);
        assert_eq!(e.value_by_name("A"), Some(1));
        assert_eq!(e.name_of(2), Some("B"));
        assert_matches!(EnumDescriptor::new("a.E", Vec::<(String, i32)>::new()), Err(Error::EmptyEnum { .. }));
    }
    #[test]
    fn schema_resolves_references() {
        let unresolved = Schema::builder().message(message_options()).build();
        assert_matches!(
            unresolved,
            Err(CrateError::Descriptor(Error::UnresolvedType { ref name })) if name == "google.protobuf.UninterpretedOption"
        );

        let option = MessageDescriptor::builder("google.protobuf.UninterpretedOption")
            .field(FieldDescriptor::new(3, "identifier_value", FieldType::String).unwrap())
            .build()
            .unwrap();
        let schema = Schema::builder()
            .message(message_options())
            .message(option.clone())
            .build()
            .unwrap();
        assert!(schema.message("google.protobuf.MessageOptions").is_some());

        let duplicate = Schema::builder().message(option.clone()).message(option).build();
        assert_matches!(duplicate, Err(CrateError::Descriptor(Error::DuplicateType { .. })));
    }
    #[test]
    fn schema_registers_extensions() {
        let option = MessageDescriptor::builder("google.protobuf.UninterpretedOption").build().unwrap();
        let schema = Schema::builder()
            .message(message_options())
            .message(option)
            .extension("google.protobuf.MessageOptions", FieldDescriptor::new(50_000, "my_option", FieldType::String).unwrap())
            .build()
            .unwrap();
        assert!(schema.extensions().resolve("google.protobuf.MessageOptions", FieldNumber::new(50_000).unwrap()).is_some());

        assert_matches!(
            schema.register_extension("google.protobuf.MessageOptions", FieldDescriptor::new(50, "low", FieldType::Bool).unwrap()),
            Err(extend::Error::NotInExtensionRange { number: 50, .. })
        );
        assert_matches!(
            schema.register_extension("a.Missing", FieldDescriptor::new(1000, "x", FieldType::Bool).unwrap()),
            Err(extend::Error::UnknownMessage { .. })
        );
        assert_matches!(
            schema.register_extension("google.protobuf.MessageOptions", FieldDescriptor::new(1000, "x", FieldType::Enum("a.E".into())).unwrap()),
            Err(extend::Error::UnresolvedType { .. })
        );
        assert_matches!(
            schema.register_extension("google.protobuf.MessageOptions", FieldDescriptor::new(1001, "x", FieldType::Bool).unwrap().required()),
            Err(extend::Error::InvalidField(Error::InvalidExtensionLabel { .. }))
        );
    }
}
