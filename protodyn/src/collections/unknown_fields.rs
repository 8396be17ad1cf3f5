//! Defines the `UnknownFieldSet`, a struct used to contain unknown fields as they were read from coded readers.
//!
//! As APIs are updated, certain fields may be removed or added from schema definitions. If an old version of a message
//! encounters fields it doesn't recognize it can still read them to be written again via unknown fields.
//!
//! Fields are kept in the order they were read, including repeated occurrences of the same number
//! with different wire types, so that all data is properly returned.

use core::slice;
use hashbrown::HashSet;
use crate::{internal::Sealed, Mergable};
use crate::io::{read, write, FieldNumber, WireType, Tag, LengthBuilder, CodedReader, CodedWriter};
use crate::raw;
use super::FieldSet;

/// An unknown field in an [`UnknownFieldSet`](struct.UnknownFieldSet.html).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnknownField {
    /// A varint field value
    Varint(u64),
    /// A 64-bit field value
    Bit64(u64),
    /// A length delimited series of bytes
    LengthDelimited(Box<[u8]>),
    /// A group of other unknown fields
    Group(UnknownFieldSet),
    /// A 32-bit field value
    Bit32(u32),
}

impl UnknownField {
    /// Returns the wire type the field was read with
    pub fn wire_type(&self) -> WireType {
        match self {
            UnknownField::Varint(_) => WireType::Varint,
            UnknownField::Bit64(_) => WireType::Bit64,
            UnknownField::LengthDelimited(_) => WireType::LengthDelimited,
            UnknownField::Group(_) => WireType::StartGroup,
            UnknownField::Bit32(_) => WireType::Bit32,
        }
    }
}

/// A set of unknown fields encountered while parsing
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct UnknownFieldSet {
    inner: Vec<(FieldNumber, UnknownField)>,
}

impl Sealed for UnknownFieldSet { }
impl Mergable for UnknownFieldSet {
    fn merge(&mut self, other: &Self) {
        self.inner.extend(other.inner.iter().cloned())
    }
}
impl FieldSet for UnknownFieldSet {
    fn calculate_size(&self, builder: LengthBuilder) -> Option<LengthBuilder> {
        self.inner
            .iter()
            .try_fold(builder, |builder, (num, value)| {
                let builder = builder.add_tag(Tag::new(*num, value.wire_type()))?;
                match value {
                    UnknownField::Varint(v) => builder.add_value::<raw::Uint64>(v),
                    UnknownField::Bit64(v) => builder.add_value::<raw::Fixed64>(v),
                    UnknownField::LengthDelimited(v) => builder.add_delimited(crate::io::Length::from_usize(v.len())?),
                    UnknownField::Group(v) => {
                        v.calculate_size(builder)?
                            .add_tag(Tag::new(*num, WireType::EndGroup))
                    },
                    UnknownField::Bit32(v) => builder.add_value::<raw::Fixed32>(v),
                }
            })
    }
    fn write_to(&self, output: &mut CodedWriter) -> write::Result {
        for (num, value) in &self.inner {
            output.write_tag(Tag::new(*num, value.wire_type()))?;
            match value {
                UnknownField::Varint(v) => output.write_varint64(*v)?,
                UnknownField::Bit64(v) => output.write_bit64(*v)?,
                UnknownField::LengthDelimited(v) => output.write_length_delimited(v)?,
                UnknownField::Group(v) => {
                    v.write_to(output)?;
                    output.write_tag(Tag::new(*num, WireType::EndGroup))?;
                },
                UnknownField::Bit32(v) => output.write_bit32(*v)?,
            }
        }
        Ok(())
    }
    fn check_initialized(&self) -> write::Result {
        Ok(())
    }
}
impl UnknownFieldSet {
    /// Reads the field started by the input's last tag into the set.
    /// Groups are read recursively until their matching end group tag.
    pub fn add_field_from(&mut self, input: &mut CodedReader) -> read::Result<()> {
        let last_tag = match input.last_tag() {
            Some(tag) => tag,
            None => return Ok(()),
        };
        let num = last_tag.field();
        let value = match last_tag.wire_type() {
            WireType::Varint => UnknownField::Varint(input.read_varint64()?),
            WireType::Bit64 => UnknownField::Bit64(input.read_bit64()?),
            WireType::LengthDelimited => UnknownField::LengthDelimited(input.read_bytes()?.into()),
            WireType::StartGroup => {
                let group = input.read_group(|input| {
                    let mut group = UnknownFieldSet::new();
                    loop {
                        match input.read_tag()? {
                            Some(_) if input.check_end_group(num)? => break Ok(group),
                            Some(_) => group.add_field_from(input)?,
                            None => break Err(read::Error::TruncatedMessage { offset: input.position() }),
                        }
                    }
                })?;
                UnknownField::Group(group)
            },
            WireType::Bit32 => UnknownField::Bit32(input.read_bit32()?),
            WireType::EndGroup => {
                return Err(read::Error::UnexpectedEndGroup {
                    field: num.get(),
                    offset: input.last_tag_offset(),
                })
            }
        };
        self.push(num, value);
        Ok(())
    }
}
impl UnknownFieldSet {
    /// Creates a new empty unknown field set
    pub fn new() -> Self {
        Self {
            inner: Vec::new(),
        }
    }
    /// Gets the number of field values present in this set
    pub fn len(&self) -> usize {
        self.inner.len()
    }
    /// Returns whether the set holds no fields
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
    /// Returns whether the set holds any values for a field
    pub fn contains(&self, num: FieldNumber) -> bool {
        self.inner.iter().any(|(n, _)| *n == num)
    }
    /// Returns an iterator over the values of a field in the order they were read
    pub fn values(&self, num: FieldNumber) -> impl Iterator<Item = &UnknownField> + '_ {
        self.inner.iter().filter(move |(n, _)| *n == num).map(|(_, v)| v)
    }
    /// Pushes a new value to the field
    pub fn push(&mut self, num: FieldNumber, value: UnknownField) {
        self.inner.push((num, value))
    }
    /// Returns an iterator of all of the fields in the set
    pub fn iter(&self) -> Iter<'_> {
        Iter(self.inner.iter())
    }
    /// Clears the set, removing all fields
    pub fn clear(&mut self) {
        self.inner.clear()
    }
    /// Clears the field, removing all values
    pub fn clear_field(&mut self, num: FieldNumber) {
        self.inner.retain(|(n, _)| *n != num)
    }
    /// Gets an iterator of the distinct field numbers in the set, in the order they were first read
    pub fn field_numbers(&self) -> impl Iterator<Item = FieldNumber> + '_ {
        let mut seen = HashSet::new();
        self.inner
            .iter()
            .map(|(num, _)| *num)
            .filter(move |num| seen.insert(*num))
    }
}

impl<'a> IntoIterator for &'a UnknownFieldSet {
    type Item = (FieldNumber, &'a UnknownField);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

/// An iterator over the fields of an unknown field set.
pub struct Iter<'a>(slice::Iter<'a, (FieldNumber, UnknownField)>);

impl<'a> Iterator for Iter<'a> {
    type Item = (FieldNumber, &'a UnknownField);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(n, v)| (*n, v))
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;
    use crate::Mergable;
    use crate::collections::FieldSet;
    use crate::io::{read, CodedReader, CodedWriter, FieldNumber, LengthBuilder};
    use super::{UnknownField, UnknownFieldSet};

    fn read_all(data: &[u8]) -> read::Result<UnknownFieldSet> {
        let mut reader = CodedReader::with_slice(data);
        let mut set = UnknownFieldSet::new();
        while reader.read_tag()?.is_some() {
            set.add_field_from(&mut reader)?;
        }
        Ok(set)
    }

    fn num(n: u32) -> FieldNumber {
        FieldNumber::new(n).unwrap()
    }

    #[test]
    fn reads_every_wire_type() {
        let data = [
            0x08, 0x96, 0x01,
            0x11, 1, 0, 0, 0, 0, 0, 0, 0,
            0x1A, 0x01, b'x',
            0x23, 0x08, 0x05, 0x24,
            0x2D, 2, 0, 0, 0,
            0x08, 0x07,
        ];
        let set = read_all(&data).unwrap();

        assert_eq!(set.len(), 6);
        assert_eq!(set.values(num(1)).collect::<Vec<_>>(), [&UnknownField::Varint(150), &UnknownField::Varint(7)]);
        assert_matches!(set.values(num(2)).next(), Some(UnknownField::Bit64(1)));
        assert_matches!(set.values(num(3)).next(), Some(UnknownField::LengthDelimited(b)) if &**b == b"x");
        assert_matches!(set.values(num(4)).next(), Some(UnknownField::Group(g)) if g.values(num(1)).next() == Some(&UnknownField::Varint(5)));
        assert_matches!(set.values(num(5)).next(), Some(UnknownField::Bit32(2)));
        assert_eq!(set.field_numbers().map(FieldNumber::get).collect::<Vec<_>>(), [1, 2, 3, 4, 5]);
    }
    #[test]
    fn writes_in_read_order() {
        let data = [0x10, 0x01, 0x0B, 0x1D, 4, 0, 0, 0, 0x0C, 0x08, 0x02];
        let set = read_all(&data).unwrap();

        let size = set.calculate_size(LengthBuilder::new()).unwrap().build();
        let mut out = Vec::new();
        set.write_to(&mut CodedWriter::with_vec(&mut out)).unwrap();

        assert_eq!(size.as_usize(), data.len());
        assert_eq!(out, data);
    }
    #[test]
    fn field_numbers_are_distinct_in_first_read_order() {
        let set = read_all(&[0x10, 0x01, 0x08, 0x02, 0x10, 0x03, 0x18, 0x04, 0x08, 0x05, 0x10, 0x06]).unwrap();

        assert_eq!(set.len(), 6);
        assert_eq!(set.field_numbers().map(FieldNumber::get).collect::<Vec<_>>(), [2, 1, 3]);

        let many = read_all(&[0x08, 0x00].repeat(1000)).unwrap();
        assert_eq!(many.len(), 1000);
        assert_eq!(many.field_numbers().count(), 1);
    }
    #[test]
    fn stray_end_group_is_an_error() {
        assert_matches!(read_all(&[0x0C]), Err(read::Error::UnexpectedEndGroup { field: 1, offset: 0 }));
        assert_matches!(read_all(&[0x0B, 0x08]), Err(read::Error::TruncatedMessage { .. }));
    }
    #[test]
    fn merge_appends() {
        let mut a = read_all(&[0x08, 0x01]).unwrap();
        let b = read_all(&[0x08, 0x02, 0x10, 0x03]).unwrap();
        a.merge(&b);

        assert_eq!(a.len(), 3);
        a.clear_field(num(1));
        assert!(!a.contains(num(1)));
        assert!(a.contains(num(2)));
    }
}
