//! Sizing and writing dynamic messages to a coded writer.
//!
//! A message is sized once before it's written. Sizing records the length of every nested
//! message, map entry and packed run in a [`SizeCache`] in the order they'll be written,
//! and writing takes the lengths back out in that same order.

use crate::collections::{FieldSet, FieldValue};
use crate::descriptor::{FieldDescriptor, FieldType};
use crate::io::{write, CodedWriter, FieldNumber, Length, LengthBuilder, Tag, WireType};
use crate::raw;
use crate::value::{MapKey, Value};
use super::DynamicMessage;

/// The lengths of the length-delimited values of a message tree, in write order
#[derive(Debug, Default)]
pub(crate) struct SizeCache {
    lengths: Vec<Length>,
    next: usize,
}

impl SizeCache {
    /// Reserves the next length, fills it with the result of `f`, and returns it.
    /// Lengths recorded by `f` itself come after the reserved one.
    fn measure<F: FnOnce(&mut SizeCache) -> Option<Length>>(&mut self, f: F) -> Option<Length> {
        let slot = self.lengths.len();
        self.lengths.push(LengthBuilder::new().build());
        let len = f(self)?;
        self.lengths[slot] = len;
        Some(len)
    }

    /// Takes the next recorded length
    fn next(&mut self) -> Result<Length, write::Error> {
        let len = *self.lengths.get(self.next).ok_or(write::Error::ValueTooLarge)?;
        self.next += 1;
        Ok(len)
    }
}

/// Dispatches on the semantic type of a value to its raw codec
trait ScalarVisitor {
    type Output;

    fn scalar<V: raw::Value>(self, value: &V::Inner) -> Self::Output;
    fn message(self, value: &DynamicMessage) -> Self::Output;
    fn mismatch(self) -> Self::Output;
}

fn visit<T: ScalarVisitor>(ty: &FieldType, value: &Value, visitor: T) -> T::Output {
    match (ty, value) {
        (FieldType::Bool, Value::Bool(v)) => visitor.scalar::<raw::Bool>(v),
        (FieldType::Int32, Value::I32(v)) => visitor.scalar::<raw::Int32>(v),
        (FieldType::Int64, Value::I64(v)) => visitor.scalar::<raw::Int64>(v),
        (FieldType::Uint32, Value::U32(v)) => visitor.scalar::<raw::Uint32>(v),
        (FieldType::Uint64, Value::U64(v)) => visitor.scalar::<raw::Uint64>(v),
        (FieldType::Sint32, Value::I32(v)) => visitor.scalar::<raw::Sint32>(v),
        (FieldType::Sint64, Value::I64(v)) => visitor.scalar::<raw::Sint64>(v),
        (FieldType::Fixed32, Value::U32(v)) => visitor.scalar::<raw::Fixed32>(v),
        (FieldType::Fixed64, Value::U64(v)) => visitor.scalar::<raw::Fixed64>(v),
        (FieldType::Sfixed32, Value::I32(v)) => visitor.scalar::<raw::Sfixed32>(v),
        (FieldType::Sfixed64, Value::I64(v)) => visitor.scalar::<raw::Sfixed64>(v),
        (FieldType::Float, Value::F32(v)) => visitor.scalar::<raw::Float>(v),
        (FieldType::Double, Value::F64(v)) => visitor.scalar::<raw::Double>(v),
        (FieldType::String, Value::String(v)) => visitor.scalar::<raw::String>(v),
        (FieldType::Bytes, Value::Bytes(v)) => visitor.scalar::<raw::Bytes>(v),
        (FieldType::Enum(_), Value::Enum(v)) => visitor.scalar::<raw::Enum>(v),
        (FieldType::Message(_), Value::Message(m)) => visitor.message(m),
        _ => visitor.mismatch(),
    }
}

struct Size<'c> {
    builder: LengthBuilder,
    cache: &'c mut SizeCache,
}

impl ScalarVisitor for Size<'_> {
    type Output = Option<LengthBuilder>;

    fn scalar<V: raw::Value>(self, value: &V::Inner) -> Option<LengthBuilder> {
        self.builder.add_value::<V>(value)
    }
    fn message(self, value: &DynamicMessage) -> Option<LengthBuilder> {
        let len = self.cache.measure(|cache| value.size_with(LengthBuilder::new(), cache)?.try_build())?;
        self.builder.add_delimited(len)
    }
    fn mismatch(self) -> Option<LengthBuilder> {
        Some(self.builder)
    }
}

struct Write<'a, 'b, 'c> {
    output: &'a mut CodedWriter<'b>,
    cache: &'c mut SizeCache,
    field: FieldNumber,
}

impl ScalarVisitor for Write<'_, '_, '_> {
    type Output = write::Result;

    fn scalar<V: raw::Value>(self, value: &V::Inner) -> write::Result {
        self.output.write_value::<V>(value)
    }
    fn message(self, value: &DynamicMessage) -> write::Result {
        let len = self.cache.next()?;
        self.output.write_length(len)?;
        value.write_fields(self.output, self.cache)
    }
    fn mismatch(self) -> write::Result {
        Err(write::Error::SchemaMismatch { field: self.field.get() })
    }
}

fn value_size(ty: &FieldType, value: &Value, builder: LengthBuilder, cache: &mut SizeCache) -> Option<LengthBuilder> {
    visit(ty, value, Size { builder, cache })
}

fn write_value(
    field: FieldNumber,
    ty: &FieldType,
    value: &Value,
    output: &mut CodedWriter,
    cache: &mut SizeCache,
) -> write::Result {
    visit(ty, value, Write { output, cache, field })
}

const KEY: FieldNumber = unsafe { FieldNumber::new_unchecked(1) };
const VALUE: FieldNumber = unsafe { FieldNumber::new_unchecked(2) };

fn entry_size(
    key_type: &FieldType,
    value_type: &FieldType,
    key: &MapKey,
    value: &Value,
    cache: &mut SizeCache,
) -> Option<Length> {
    let builder = LengthBuilder::new().add_tag(Tag::new(KEY, key_type.wire_type()))?;
    let builder = value_size(key_type, &key.to_value(), builder, cache)?
        .add_tag(Tag::new(VALUE, value_type.wire_type()))?;
    value_size(value_type, value, builder, cache)?.try_build()
}

fn sorted_entries<'a>(entries: impl Iterator<Item = (&'a MapKey, &'a Value)>) -> Vec<(&'a MapKey, &'a Value)> {
    let mut entries: Vec<_> = entries.collect();
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));
    entries
}

fn packed_size(ty: &FieldType, values: &[Value], cache: &mut SizeCache) -> Option<Length> {
    values
        .iter()
        .try_fold(LengthBuilder::new(), |builder, v| value_size(ty, v, builder, cache))?
        .try_build()
}

/// Calculates the size of a field's tags and values, recording the lengths it'll be written with
pub(crate) fn field_size(
    field: &FieldDescriptor,
    value: &FieldValue,
    builder: LengthBuilder,
    cache: &mut SizeCache,
) -> Option<LengthBuilder> {
    let num = field.number();
    let ty = field.field_type();
    match value {
        FieldValue::Singular(v) => {
            let builder = builder.add_tag(Tag::new(num, ty.wire_type()))?;
            value_size(ty, v, builder, cache)
        },
        FieldValue::Repeated(values) if values.is_empty() => Some(builder),
        FieldValue::Repeated(values) if field.is_packed() => {
            let len = cache.measure(|cache| packed_size(ty, values, cache))?;
            builder
                .add_tag(Tag::new(num, WireType::LengthDelimited))?
                .add_delimited(len)
        },
        FieldValue::Repeated(values) => {
            let tag = Tag::new(num, ty.wire_type());
            values
                .iter()
                .try_fold(builder, |builder, v| value_size(ty, v, builder.add_tag(tag)?, cache))
        },
        FieldValue::Map(entries) => {
            let key_type = field.map_key()?;
            let tag = Tag::new(num, WireType::LengthDelimited);
            sorted_entries(entries.iter())
                .into_iter()
                .try_fold(builder, |builder, (key, value)| {
                    let len = cache.measure(|cache| entry_size(key_type, ty, key, value, cache))?;
                    builder.add_tag(tag)?.add_delimited(len)
                })
        },
    }
}

/// Writes a field's tags and values using the lengths recorded by `field_size`.
/// Map entries are written in key order.
pub(crate) fn write_field(
    field: &FieldDescriptor,
    value: &FieldValue,
    output: &mut CodedWriter,
    cache: &mut SizeCache,
) -> write::Result {
    let num = field.number();
    let ty = field.field_type();
    match value {
        FieldValue::Singular(v) => {
            output.write_tag(Tag::new(num, ty.wire_type()))?;
            write_value(num, ty, v, output, cache)
        },
        FieldValue::Repeated(values) if values.is_empty() => Ok(()),
        FieldValue::Repeated(values) if field.is_packed() => {
            let len = cache.next()?;
            output.write_tag(Tag::new(num, WireType::LengthDelimited))?;
            output.write_length(len)?;
            for v in values {
                write_value(num, ty, v, output, cache)?;
            }
            Ok(())
        },
        FieldValue::Repeated(values) => {
            let tag = Tag::new(num, ty.wire_type());
            for v in values {
                output.write_tag(tag)?;
                write_value(num, ty, v, output, cache)?;
            }
            Ok(())
        },
        FieldValue::Map(entries) => {
            let key_type = field.map_key().ok_or(write::Error::SchemaMismatch { field: num.get() })?;
            let tag = Tag::new(num, WireType::LengthDelimited);
            for (key, value) in sorted_entries(entries.iter()) {
                let len = cache.next()?;
                output.write_tag(tag)?;
                output.write_length(len)?;
                output.write_tag(Tag::new(KEY, key_type.wire_type()))?;
                write_value(num, key_type, &key.to_value(), output, cache)?;
                output.write_tag(Tag::new(VALUE, ty.wire_type()))?;
                write_value(num, ty, value, output, cache)?;
            }
            Ok(())
        },
    }
}

/// Checks that every message held by a field value has its required fields set
pub(crate) fn check_value_initialized(value: &FieldValue) -> write::Result {
    let check = |v: &Value| match v {
        Value::Message(m) => m.check_initialized(),
        _ => Ok(()),
    };
    match value {
        FieldValue::Singular(v) => check(v),
        FieldValue::Repeated(values) => values.iter().try_for_each(check),
        FieldValue::Map(entries) => entries.values().try_for_each(check),
    }
}

impl DynamicMessage {
    /// Returns whether every required field of the message and its nested messages is set
    pub fn is_initialized(&self) -> bool {
        self.check_initialized().is_ok()
    }

    /// Checks that every required field of the message and its nested messages is set.
    ///
    /// # Errors
    ///
    /// Returns an `IncompleteMessage` error naming the first message and field found missing.
    pub fn check_initialized(&self) -> write::Result {
        for field in self.descriptor.fields() {
            match self.fields.get(field.number()) {
                Some(value) => check_value_initialized(value)?,
                None if field.is_required() => {
                    return Err(write::Error::IncompleteMessage {
                        message: self.descriptor.full_name().to_owned(),
                        field: field.name().to_owned(),
                    })
                },
                None => { },
            }
        }
        self.extensions.check_initialized()?;
        self.unknown_fields.check_initialized()
    }

    /// Calculates the size of the message as written
    pub fn calculate_size(&self, builder: LengthBuilder) -> Option<LengthBuilder> {
        self.size_with(builder, &mut SizeCache::default())
    }

    pub(crate) fn size_with(&self, builder: LengthBuilder, cache: &mut SizeCache) -> Option<LengthBuilder> {
        let builder = self.fields()
            .try_fold(builder, |builder, (field, value)| field_size(field, value, builder, cache))?;
        let builder = self.extensions.size_with(builder, cache)?;
        self.unknown_fields.calculate_size(builder)
    }

    /// Sizes the message once, returning its length and the lengths of everything nested in it
    fn sized(&self) -> Result<(Length, SizeCache), write::Error> {
        let mut cache = SizeCache::default();
        let len = self.size_with(LengthBuilder::new(), &mut cache)
            .and_then(LengthBuilder::try_build)
            .ok_or(write::Error::ValueTooLarge)?;
        Ok((len, cache))
    }

    /// Writes the message to the output: known fields in declaration order, then extensions
    /// by ascending number, then unknown fields in the order they were read.
    ///
    /// # Errors
    ///
    /// Unless disabled in the writer's options, fails with `IncompleteMessage` before writing
    /// anything if a required field isn't set.
    pub fn write_to(&self, output: &mut CodedWriter) -> write::Result {
        if output.options().check_initialized() {
            self.check_initialized()?;
        }
        let (_, mut cache) = self.sized()?;
        self.write_fields(output, &mut cache)
    }

    pub(crate) fn write_fields(&self, output: &mut CodedWriter, cache: &mut SizeCache) -> write::Result {
        for (field, value) in self.fields() {
            write_field(field, value, output, cache)?;
        }
        self.extensions.write_with(output, cache)?;
        self.unknown_fields.write_to(output)
    }

    /// Writes the message to a new vector
    pub fn to_vec(&self) -> Result<Vec<u8>, write::Error> {
        self.check_initialized()?;
        let (len, mut cache) = self.sized()?;
        let mut out = Vec::with_capacity(len.as_usize());
        self.write_fields(&mut CodedWriter::with_vec(&mut out), &mut cache)?;
        Ok(out)
    }

    /// Writes the message to the front of a slice, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Fails with `OutputTooSmall` without writing anything if the message doesn't fit.
    pub fn write_to_slice(&self, out: &mut [u8]) -> Result<usize, write::Error> {
        self.check_initialized()?;
        let (len, mut cache) = self.sized()?;
        let len = len.as_usize();
        if len > out.len() {
            return Err(write::Error::OutputTooSmall { needed: len, remaining: out.len() });
        }
        self.write_fields(&mut CodedWriter::with_slice(out), &mut cache)?;
        Ok(len)
    }
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;
    use std::sync::Arc;
    use crate::descriptor::{FieldDescriptor, FieldType, MessageDescriptor, Schema};
    use crate::io::{encode_varint, write, CodedWriter, LengthBuilder, WriterBuilder};
    use crate::message::DynamicMessage;
    use crate::value::{MapKey, Value};

    fn schema() -> Arc<Schema> {
        let point = MessageDescriptor::builder("test.Point")
            .field(FieldDescriptor::new(1, "x", FieldType::Sint32).unwrap().required())
            .field(FieldDescriptor::new(2, "y", FieldType::Sint32).unwrap())
            .build()
            .unwrap();
        let shape = MessageDescriptor::builder("test.Shape")
            .field(FieldDescriptor::new(2, "name", FieldType::String).unwrap())
            .field(FieldDescriptor::new(1, "sides", FieldType::Uint32).unwrap())
            .field(FieldDescriptor::new(3, "points", FieldType::Message("test.Point".into())).unwrap().repeated())
            .field(FieldDescriptor::new(4, "weights", FieldType::Fixed32).unwrap().repeated().packed(true))
            .field(FieldDescriptor::map(5, "tags", FieldType::String, FieldType::Bool).unwrap())
            .build()
            .unwrap();
        Arc::new(Schema::builder().message(point).message(shape).build().unwrap())
    }

    fn node_schema() -> Arc<Schema> {
        let node = MessageDescriptor::builder("test.Node")
            .field(FieldDescriptor::new(1, "child", FieldType::Message("test.Node".into())).unwrap())
            .field(FieldDescriptor::new(2, "depth", FieldType::Uint32).unwrap())
            .field(FieldDescriptor::map(3, "children", FieldType::String, FieldType::Message("test.Node".into())).unwrap())
            .build()
            .unwrap();
        Arc::new(Schema::builder().message(node).build().unwrap())
    }

    fn node(schema: &Arc<Schema>, depth: u32) -> DynamicMessage {
        let mut node = DynamicMessage::new(schema, "test.Node").unwrap();
        node.set(2, depth).unwrap();
        node
    }

    fn point(schema: &Arc<Schema>, x: i32) -> DynamicMessage {
        let mut point = DynamicMessage::new(schema, "test.Point").unwrap();
        point.set(1, x).unwrap();
        point
    }

    #[test]
    fn fields_written_in_declaration_order() {
        let schema = schema();
        let mut shape = DynamicMessage::new(&schema, "test.Shape").unwrap();
        shape.set(1, 3u32).unwrap();
        shape.set(2, "tri").unwrap();

        assert_eq!(shape.to_vec().unwrap(), [0x12, 0x03, b't', b'r', b'i', 0x08, 0x03]);
    }
    #[test]
    fn packed_and_nested_fields() {
        let schema = schema();
        let mut shape = DynamicMessage::new(&schema, "test.Shape").unwrap();
        shape.push(3, point(&schema, -1)).unwrap();
        shape.push(4, 1u32).unwrap();
        shape.push(4, 2u32).unwrap();

        let bytes = shape.to_vec().unwrap();
        assert_eq!(
            bytes,
            [
                0x1A, 0x02, 0x08, 0x01,
                0x22, 0x08, 0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00,
            ]
        );
        assert_eq!(shape.calculate_size(LengthBuilder::new()).unwrap().build().as_usize(), bytes.len());
        assert_eq!(DynamicMessage::parse(&schema, "test.Shape", &bytes).unwrap(), shape);
    }
    #[test]
    fn map_entries_written_by_key() {
        let schema = schema();
        let mut shape = DynamicMessage::new(&schema, "test.Shape").unwrap();
        shape.insert_map_entry(5, "b", true).unwrap();
        shape.insert_map_entry(5, "a", false).unwrap();

        assert_eq!(
            shape.to_vec().unwrap(),
            [
                0x2A, 0x05, 0x0A, 0x01, b'a', 0x10, 0x00,
                0x2A, 0x05, 0x0A, 0x01, b'b', 0x10, 0x01,
            ]
        );
        assert_eq!(shape.map_entry(5, &MapKey::from("b")).unwrap(), Some(&Value::Bool(true)));
    }
    #[test]
    fn deeply_nested_messages() {
        let schema = node_schema();
        let mut root = node(&schema, 49);
        let mut expected = vec![0x10, 49];
        for depth in (0..49u8).rev() {
            let mut parent = node(&schema, u32::from(depth));
            parent.set(1, root).unwrap();
            root = parent;

            let mut bytes = vec![0x0A];
            bytes.extend(encode_varint(expected.len() as u64));
            bytes.extend(expected);
            bytes.extend([0x10, depth]);
            expected = bytes;
        }
        assert!(expected.len() > 128);

        assert_eq!(root.calculate_size(LengthBuilder::new()).unwrap().build().as_usize(), expected.len());
        assert_eq!(root.to_vec().unwrap(), expected);

        let mut out = vec![0u8; expected.len()];
        assert_eq!(root.write_to_slice(&mut out), Ok(expected.len()));
        assert_eq!(out, expected);

        let mut out = Vec::new();
        root.write_to(&mut CodedWriter::with_vec(&mut out)).unwrap();
        assert_eq!(out, expected);
        assert_eq!(DynamicMessage::parse(&schema, "test.Node", &expected).unwrap(), root);
    }
    #[test]
    fn map_entries_with_message_values() {
        let schema = node_schema();
        let mut root = DynamicMessage::new(&schema, "test.Node").unwrap();
        let mut b = node(&schema, 2);
        b.set(1, node(&schema, 3)).unwrap();
        root.insert_map_entry(3, "b", b).unwrap();
        root.insert_map_entry(3, "a", node(&schema, 1)).unwrap();

        let expected = [
            0x1A, 0x07, 0x0A, 0x01, b'a', 0x12, 0x02, 0x10, 0x01,
            0x1A, 0x0B, 0x0A, 0x01, b'b', 0x12, 0x06, 0x0A, 0x02, 0x10, 0x03, 0x10, 0x02,
        ];
        assert_eq!(root.calculate_size(LengthBuilder::new()).unwrap().build().as_usize(), expected.len());
        assert_eq!(root.to_vec().unwrap(), expected);
        assert_eq!(DynamicMessage::parse(&schema, "test.Node", &expected).unwrap(), root);
    }
    #[test]
    fn required_fields() {
        let schema = schema();
        let mut shape = DynamicMessage::new(&schema, "test.Shape").unwrap();
        shape.push(3, DynamicMessage::new(&schema, "test.Point").unwrap()).unwrap();

        assert!(!shape.is_initialized());
        assert_matches!(
            shape.to_vec(),
            Err(write::Error::IncompleteMessage { ref message, ref field }) if message == "test.Point" && field == "x"
        );

        let mut out = Vec::new();
        shape.write_to(&mut WriterBuilder::new().check_initialized(false).with_vec(&mut out)).unwrap();
        assert_eq!(out, [0x1A, 0x00]);
    }
    #[test]
    fn slice_output() {
        let schema = schema();
        let mut shape = DynamicMessage::new(&schema, "test.Shape").unwrap();
        shape.set(1, 300u32).unwrap();

        let mut small = [0u8; 2];
        assert_matches!(shape.write_to_slice(&mut small), Err(write::Error::OutputTooSmall { needed: 3, remaining: 2 }));
        assert_eq!(small, [0, 0]);

        let mut buf = [0u8; 8];
        assert_eq!(shape.write_to_slice(&mut buf), Ok(3));
        assert_eq!(buf[..3], [0x08, 0xAC, 0x02]);

        let mut exact = [0u8; 3];
        shape.write_to(&mut CodedWriter::with_slice(&mut exact)).unwrap();
        assert_eq!(exact, [0x08, 0xAC, 0x02]);
    }
}
