//! Decoding fields from a coded reader into a dynamic message.

use std::sync::Arc;
use crate::collections::FieldValue;
use crate::descriptor::{FieldDescriptor, FieldType, Schema};
use crate::io::{read, CodedReader, WireType};
use crate::raw;
use crate::value::{MapKey, Value};
use hashbrown::HashMap;
use log::trace;
use super::{default_value, DynamicMessage};

impl DynamicMessage {
    /// Reads fields into the message until the input reaches its limit.
    /// Unlike `merge_from`, a failure may leave some fields merged.
    pub(crate) fn merge_fields_from(&mut self, input: &mut CodedReader) -> read::Result<()> {
        let schema = Arc::clone(&self.schema);
        let descriptor = Arc::clone(&self.descriptor);

        while let Some(tag) = input.read_tag()? {
            let num = tag.field();
            if tag.wire_type() == WireType::EndGroup {
                return Err(read::Error::UnexpectedEndGroup {
                    field: num.get(),
                    offset: input.last_tag_offset(),
                });
            }

            if let Some(field) = descriptor.field(num) {
                let mut slot = self.fields.remove(num);
                merge_field(&schema, field, &mut slot, input)?;
                if let Some(value) = slot {
                    self.fields.insert(num, value);
                }
            } else if let Some(extension) = schema.extensions().resolve(descriptor.full_name(), num) {
                trace!("reading extension {} of {}", num, descriptor.full_name());
                self.extensions.merge_field(&schema, extension, input)?;
            } else if input.options().skip_unknown_fields() {
                input.skip()?;
            } else {
                trace!("keeping unknown field {} of {}", num, descriptor.full_name());
                self.unknown_fields.add_field_from(input)?;
            }
        }
        Ok(())
    }
}

fn check_wire_type(field: &FieldDescriptor, expected: WireType, input: &CodedReader) -> read::Result<()> {
    match input.last_tag() {
        Some(tag) if tag.wire_type() == expected => Ok(()),
        Some(tag) => Err(read::Error::SchemaMismatch {
            field: field.number().get(),
            expected,
            actual: tag.wire_type(),
            offset: input.last_tag_offset(),
        }),
        None => Ok(()),
    }
}

/// Reads the field started by the input's last tag into the slot holding its current value
pub(crate) fn merge_field(
    schema: &Arc<Schema>,
    field: &FieldDescriptor,
    slot: &mut Option<FieldValue>,
    input: &mut CodedReader,
) -> read::Result<()> {
    let wire_type = match input.last_tag() {
        Some(tag) => tag.wire_type(),
        None => return Ok(()),
    };
    let ty = field.field_type();

    if let Some(key_type) = field.map_key() {
        check_wire_type(field, WireType::LengthDelimited, input)?;
        let (key, value) = read_map_entry(schema, key_type, ty, input)?;
        let mut entries = match slot.take() {
            Some(FieldValue::Map(entries)) => entries,
            _ => HashMap::new(),
        };
        entries.insert(key, value);
        *slot = Some(FieldValue::Map(entries));
    } else if field.is_repeated() {
        let mut values = match slot.take() {
            Some(FieldValue::Repeated(values)) => values,
            _ => Vec::new(),
        };
        if wire_type == WireType::LengthDelimited && ty.is_packable() {
            input.read_packed(|input| {
                values.push(read_value(schema, ty, input)?);
                Ok(())
            })?;
        } else {
            check_wire_type(field, ty.wire_type(), input)?;
            values.push(read_value(schema, ty, input)?);
        }
        *slot = Some(FieldValue::Repeated(values));
    } else {
        check_wire_type(field, ty.wire_type(), input)?;
        if let Some(FieldValue::Singular(Value::Message(message))) = slot {
            return input.read_nested(|input| message.merge_fields_from(input));
        }
        *slot = Some(FieldValue::Singular(read_value(schema, ty, input)?));
    }
    Ok(())
}

fn read_map_entry(
    schema: &Arc<Schema>,
    key_type: &FieldType,
    value_type: &FieldType,
    input: &mut CodedReader,
) -> read::Result<(MapKey, Value)> {
    let offset = input.position();
    input.read_nested(|input| {
        let mut key = None;
        let mut value = None;
        while let Some(tag) = input.read_tag()? {
            match tag.field().get() {
                1 if tag.wire_type() == key_type.wire_type() => key = Some(read_value(schema, key_type, input)?),
                2 if tag.wire_type() == value_type.wire_type() => value = Some(read_value(schema, value_type, input)?),
                _ => input.skip()?,
            }
        }

        let key = match key.or_else(|| Value::zero(key_type)).and_then(MapKey::from_value) {
            Some(key) => key,
            None => return Err(read::Error::UnknownMessage { name: key_type.to_string(), offset }),
        };
        let value = match value.or_else(|| default_value(schema, value_type)) {
            Some(value) => value,
            None => return Err(read::Error::UnknownMessage { name: value_type.to_string(), offset }),
        };
        Ok((key, value))
    })
}

/// Reads a single value of the specified type
pub(crate) fn read_value(schema: &Arc<Schema>, ty: &FieldType, input: &mut CodedReader) -> read::Result<Value> {
    Ok(match ty {
        FieldType::Bool => Value::Bool(input.read_value::<raw::Bool>()?),
        FieldType::Int32 => Value::I32(input.read_value::<raw::Int32>()?),
        FieldType::Int64 => Value::I64(input.read_value::<raw::Int64>()?),
        FieldType::Uint32 => Value::U32(input.read_value::<raw::Uint32>()?),
        FieldType::Uint64 => Value::U64(input.read_value::<raw::Uint64>()?),
        FieldType::Sint32 => Value::I32(input.read_value::<raw::Sint32>()?),
        FieldType::Sint64 => Value::I64(input.read_value::<raw::Sint64>()?),
        FieldType::Fixed32 => Value::U32(input.read_value::<raw::Fixed32>()?),
        FieldType::Fixed64 => Value::U64(input.read_value::<raw::Fixed64>()?),
        FieldType::Sfixed32 => Value::I32(input.read_value::<raw::Sfixed32>()?),
        FieldType::Sfixed64 => Value::I64(input.read_value::<raw::Sfixed64>()?),
        FieldType::Float => Value::F32(input.read_value::<raw::Float>()?),
        FieldType::Double => Value::F64(input.read_value::<raw::Double>()?),
        FieldType::String => Value::String(input.read_value::<raw::String>()?),
        FieldType::Bytes => Value::Bytes(input.read_value::<raw::Bytes>()?),
        FieldType::Enum(_) => Value::Enum(input.read_value::<raw::Enum>()?),
        FieldType::Message(name) => {
            let descriptor = schema.message(name).ok_or_else(|| read::Error::UnknownMessage {
                name: name.clone(),
                offset: input.last_tag_offset(),
            })?;
            let mut message = DynamicMessage::of(schema, Arc::clone(descriptor));
            input.read_nested(|input| message.merge_fields_from(input))?;
            Value::from(message)
        }
    })
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;
    use std::sync::Arc;
    use crate::descriptor::{EnumDescriptor, FieldDescriptor, FieldType, MessageDescriptor, Schema};
    use crate::io::{read, ReaderBuilder, WireType};
    use crate::message::DynamicMessage;
    use crate::value::{MapKey, Value};
    use crate::Error;

    fn schema() -> Arc<Schema> {
        let inner = MessageDescriptor::builder("test.Inner")
            .field(FieldDescriptor::new(1, "a", FieldType::Int32).unwrap())
            .field(FieldDescriptor::new(2, "b", FieldType::Int32).unwrap())
            .build()
            .unwrap();
        let outer = MessageDescriptor::builder("test.Outer")
            .field(FieldDescriptor::new(1, "id", FieldType::Int32).unwrap())
            .field(FieldDescriptor::new(2, "name", FieldType::String).unwrap())
            .field(FieldDescriptor::new(3, "values", FieldType::Sint32).unwrap().repeated())
            .field(FieldDescriptor::new(4, "inner", FieldType::Message("test.Inner".into())).unwrap())
            .field(FieldDescriptor::map(5, "counts", FieldType::String, FieldType::Int32).unwrap())
            .field(FieldDescriptor::new(6, "kind", FieldType::Enum("test.Kind".into())).unwrap())
            .field(FieldDescriptor::map(7, "children", FieldType::Int32, FieldType::Message("test.Inner".into())).unwrap())
            .extension_range(100..200)
            .build()
            .unwrap();
        let kind = EnumDescriptor::new("test.Kind", vec![("FIRST", 1), ("SECOND", 2)]).unwrap();
        Arc::new(
            Schema::builder()
                .message(inner)
                .message(outer)
                .enumeration(kind)
                .extension("test.Outer", FieldDescriptor::new(100, "ext", FieldType::Uint32).unwrap())
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn last_singular_wins() {
        let schema = schema();
        let message = DynamicMessage::parse(&schema, "test.Outer", &[0x08, 0x01, 0x08, 0x02]).unwrap();
        assert_eq!(message.get(1).unwrap(), Some(&Value::I32(2)));
    }
    #[test]
    fn packed_and_unpacked_repeated() {
        let schema = schema();
        let unpacked = DynamicMessage::parse(&schema, "test.Outer", &[0x18, 0x02, 0x18, 0x03, 0x18, 0x01]).unwrap();
        let packed = DynamicMessage::parse(&schema, "test.Outer", &[0x1A, 0x03, 0x02, 0x03, 0x01]).unwrap();
        assert_eq!(unpacked.repeated(3).unwrap(), [Value::I32(1), Value::I32(-2), Value::I32(-1)]);
        assert_eq!(unpacked, packed);
    }
    #[test]
    fn nested_messages_merge() {
        let schema = schema();
        // inner { a: 1 } inner { b: 2 }
        let message = DynamicMessage::parse(&schema, "test.Outer", &[0x22, 0x02, 0x08, 0x01, 0x22, 0x02, 0x10, 0x02]).unwrap();
        let inner = message.get(4).unwrap().and_then(Value::as_message).unwrap();
        assert_eq!(inner.get(1).unwrap(), Some(&Value::I32(1)));
        assert_eq!(inner.get(2).unwrap(), Some(&Value::I32(2)));
    }
    #[test]
    fn map_entries_upsert() {
        let schema = schema();
        let bytes = [
            0x2A, 0x05, 0x0A, 0x01, b'a', 0x10, 0x01,
            0x2A, 0x05, 0x0A, 0x01, b'b', 0x10, 0x02,
            0x2A, 0x05, 0x0A, 0x01, b'a', 0x10, 0x03,
            // missing key and value
            0x2A, 0x00,
        ];
        let message = DynamicMessage::parse(&schema, "test.Outer", &bytes).unwrap();
        assert_eq!(message.map_entry(5, &MapKey::from("a")).unwrap(), Some(&Value::I32(3)));
        assert_eq!(message.map_entry(5, &MapKey::from("b")).unwrap(), Some(&Value::I32(2)));
        assert_eq!(message.map_entry(5, &MapKey::from("")).unwrap(), Some(&Value::I32(0)));

        let message = DynamicMessage::parse(&schema, "test.Outer", &[0x3A, 0x02, 0x08, 0x07]).unwrap();
        let child = message.map_entry(7, &MapKey::I32(7)).unwrap().and_then(Value::as_message).unwrap();
        assert_eq!(child.descriptor().full_name(), "test.Inner");
        assert!(child.field_store().is_empty());
    }
    #[test]
    fn extensions_and_unknown_fields() {
        let schema = schema();
        // ext = 5, unregistered 101 = 6, unknown 20 = 7
        let bytes = [0xA0, 0x06, 0x05, 0xA8, 0x06, 0x06, 0xA0, 0x01, 0x07];
        let message = DynamicMessage::parse(&schema, "test.Outer", &bytes).unwrap();
        assert_eq!(message.extension(100).and_then(|v| v.as_singular()), Some(&Value::U32(5)));
        assert_eq!(message.unknown_fields().len(), 2);
        assert_eq!(message.to_vec().unwrap(), bytes);

        let mut skipping = DynamicMessage::new(&schema, "test.Outer").unwrap();
        skipping.merge_from(&mut ReaderBuilder::new().skip_unknown_fields(true).with_slice(&bytes)).unwrap();
        assert!(skipping.unknown_fields().is_empty());
        assert!(skipping.extension(100).is_some());
    }
    #[test]
    fn open_enums() {
        let schema = schema();
        let message = DynamicMessage::parse(&schema, "test.Outer", &[0x30, 0x09]).unwrap();
        assert_eq!(message.get(6).unwrap(), Some(&Value::Enum(9)));
    }
    #[test]
    fn wire_type_mismatch() {
        let schema = schema();
        assert_matches!(
            DynamicMessage::parse(&schema, "test.Outer", &[0x0D, 0x00, 0x00, 0x00, 0x00]),
            Err(Error::Read(read::Error::SchemaMismatch { field: 1, expected: WireType::Varint, actual: WireType::Bit32, offset: 0 }))
        );
        assert_matches!(
            DynamicMessage::parse(&schema, "test.Outer", &[0x12, 0x01, 0xFF]),
            Err(Error::Read(read::Error::InvalidString { offset: 1, .. }))
        );
        assert_matches!(
            DynamicMessage::parse(&schema, "test.Outer", &[0x0C]),
            Err(Error::Read(read::Error::UnexpectedEndGroup { field: 1, offset: 0 }))
        );
    }
    #[test]
    fn failed_merge_leaves_message_unchanged() {
        let schema = schema();
        let mut message = DynamicMessage::parse(&schema, "test.Outer", &[0x08, 0x01, 0x18, 0x02]).unwrap();
        let before = message.clone();

        // id = 5, values += 1, then a string that runs past the end
        let result = message.merge_from_slice(&[0x08, 0x05, 0x18, 0x02, 0x12, 0x05, b'a']);
        assert_matches!(result, Err(read::Error::TruncatedMessage { .. }));
        assert_eq!(message, before);
    }
    #[test]
    fn truncated_tag_leaves_message_unchanged() {
        let schema = schema();
        let mut message = DynamicMessage::parse(&schema, "test.Outer", &[0x08, 0x01]).unwrap();
        let before = message.clone();

        // id = 5, then a tag whose varint never ends
        let result = message.merge_from_slice(&[0x08, 0x05, 0x88]);
        assert_matches!(result, Err(read::Error::TruncatedMessage { offset: 3 }));
        assert_eq!(message, before);
        assert_eq!(message.get(1).unwrap(), Some(&Value::I32(1)));
    }
    #[test]
    fn recursion_limit() {
        let schema = schema();
        let bytes = [0x22, 0x02, 0x08, 0x01];
        let mut message = DynamicMessage::new(&schema, "test.Outer").unwrap();
        assert_matches!(
            message.merge_from(&mut ReaderBuilder::new().recursion_limit(0).with_slice(&bytes)),
            Err(read::Error::RecursionLimitExceeded { limit: 0, .. })
        );
        message.merge_from(&mut ReaderBuilder::new().recursion_limit(1).with_slice(&bytes)).unwrap();
        assert!(message.has(4).unwrap());
    }
}
