//! Contains types and traits for reading and writing protobuf coded data.

pub mod read;
pub mod write;

pub use read::{decode_varint, Builder as ReaderBuilder, CodedReader, ReaderOptions};
pub use write::{encode_varint, Builder as WriterBuilder, CodedWriter, WriterOptions};

use core::convert::TryFrom;
use core::fmt::{self, Display, Formatter};
use core::num::NonZeroU32;
use core::ops::RangeInclusive;
use crate::raw::Value;
use thiserror::Error;

/// The maximum number of bytes a varint can take up on the wire.
pub const MAX_VARINT_LEN: usize = 10;

/// The wire type of a protobuf value.
///
/// A wire type is paired with a field number between 1 and 536,870,911 to create a tag,
/// a unique identifier for a field on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub enum WireType {
    /// A value read as a variable length integer.
    ///
    /// See the protobuf docs for more information on this encoding: https://developers.google.com/protocol-buffers/docs/encoding#varints
    Varint = 0,
    /// A 64-bit value encoded as 8 little endian bytes
    Bit64 = 1,
    /// A length delimited value. The length is encoded as a varint
    LengthDelimited = 2,
    /// A start group tag, deprecated in proto3.
    StartGroup = 3,
    /// An end group tag, deprecated in proto3.
    EndGroup = 4,
    /// A 32-bit value encoded as 4 little endian bytes
    Bit32 = 5,
}

/// The error returned when trying to convert a byte to a wire type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("invalid wire type {0}")]
pub struct InvalidWireType(pub u8);

impl WireType {
    /// Gets whether a wire type is eligible for repeated field packing.
    /// The valid packable wire types are Bit32, Bit64, and Varint.
    pub const fn is_packable(self) -> bool {
        matches!(self, WireType::Varint | WireType::Bit64 | WireType::Bit32)
    }
}

impl TryFrom<u8> for WireType {
    type Error = InvalidWireType;

    fn try_from(value: u8) -> Result<WireType, InvalidWireType> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Bit64),
            2 => Ok(WireType::LengthDelimited),
            3 => Ok(WireType::StartGroup),
            4 => Ok(WireType::EndGroup),
            5 => Ok(WireType::Bit32),
            _ => Err(InvalidWireType(value)),
        }
    }
}

/// A protobuf field number. Its value is known to be less than or equal to 536870911 and not 0.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldNumber(NonZeroU32);

impl FieldNumber {
    /// The max value of a field number as a u32
    pub const MAX_VALUE: u32 = 536_870_911;

    /// The max value of a field number
    pub const MAX: FieldNumber = unsafe { FieldNumber::new_unchecked(FieldNumber::MAX_VALUE) };

    /// The range of field numbers reserved for the protobuf implementation.
    /// Schemas can't declare fields in this range.
    pub const RESERVED: RangeInclusive<u32> = 19_000..=19_999;

    /// Create a field number without checking the value.
    ///
    /// # Safety
    ///
    /// The value must be a valid field number
    #[inline]
    pub const unsafe fn new_unchecked(n: u32) -> FieldNumber {
        FieldNumber(NonZeroU32::new_unchecked(n))
    }

    /// Creates a field number if the given value is not zero or more than 536870911
    ///
    /// # Examples
    ///
    /// ```
    /// use protodyn::io::FieldNumber;
    ///
    /// assert_eq!(FieldNumber::new(0), None);
    /// assert_eq!(FieldNumber::new(1).map(FieldNumber::get), Some(1));
    /// assert_eq!(FieldNumber::new(FieldNumber::MAX_VALUE), Some(FieldNumber::MAX));
    /// assert_eq!(FieldNumber::new(FieldNumber::MAX_VALUE + 1), None);
    /// ```
    #[inline]
    pub fn new(n: u32) -> Option<FieldNumber> {
        if n <= Self::MAX_VALUE {
            NonZeroU32::new(n).map(FieldNumber)
        } else {
            None
        }
    }

    /// Returns the value as a [`u32`](https://doc.rust-lang.org/nightly/std/primitive.u32.html)
    #[inline]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Returns whether this number falls in the range reserved for the implementation
    #[inline]
    pub fn is_reserved(self) -> bool {
        Self::RESERVED.contains(&self.get())
    }
}

impl Display for FieldNumber {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<FieldNumber> for u32 {
    fn from(x: FieldNumber) -> u32 {
        x.get()
    }
}

/// The error returned when a value is zero or too large to be a field number.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
#[error("{0} is not a valid field number")]
pub struct InvalidFieldNumber(pub u32);

impl TryFrom<u32> for FieldNumber {
    type Error = InvalidFieldNumber;

    fn try_from(n: u32) -> Result<FieldNumber, InvalidFieldNumber> {
        FieldNumber::new(n).ok_or(InvalidFieldNumber(n))
    }
}

/// A tag containing a wire type and field number. Its value is known to not be 0, and both field number and wire type are valid values
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(NonZeroU32);

impl Tag {
    /// Creates a new tag value
    #[inline]
    pub const fn new(f: FieldNumber, wt: WireType) -> Tag {
        // a field number is never zero, so neither is the shifted value
        unsafe { Tag(NonZeroU32::new_unchecked((f.get() << 3) | wt as u32)) }
    }

    /// Gets the wire type from this tag
    ///
    /// # Examples
    ///
    /// ```
    /// use protodyn::io::{Tag, WireType};
    /// # use std::convert::TryFrom;
    ///
    /// assert_eq!(Tag::try_from(8).unwrap().wire_type(), WireType::Varint);
    /// assert_eq!(Tag::try_from(17).unwrap().wire_type(), WireType::Bit64);
    /// ```
    #[inline]
    pub fn wire_type(self) -> WireType {
        match self.get() & 0b111 {
            0 => WireType::Varint,
            1 => WireType::Bit64,
            2 => WireType::LengthDelimited,
            3 => WireType::StartGroup,
            4 => WireType::EndGroup,
            // 6 and 7 are rejected on construction
            _ => WireType::Bit32,
        }
    }

    /// Gets the field number from this tag
    ///
    /// # Examples
    ///
    /// ```
    /// use protodyn::io::Tag;
    /// # use std::convert::TryFrom;
    ///
    /// assert_eq!(Tag::try_from(8).unwrap().field().get(), 1);
    /// assert_eq!(Tag::try_from(17).unwrap().field().get(), 2);
    /// ```
    #[inline]
    pub fn field(self) -> FieldNumber {
        unsafe { FieldNumber::new_unchecked(self.get() >> 3) }
    }

    /// Returns the value as a [`u32`](https://doc.rust-lang.org/nightly/std/primitive.u32.html)
    #[inline]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Tag> for u32 {
    fn from(x: Tag) -> u32 {
        x.get()
    }
}

/// The error returned when an attempt to convert a 32-bit value to a tag fails due to an invalid field number or wire type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid tag; this could be caused by an invalid wire type or a 0 field number")]
pub struct TryTagFromRawError(());

impl TryFrom<u32> for Tag {
    type Error = TryTagFromRawError;

    /// Creates a new tag if the value is not zero and has a valid field number and wire type
    ///
    /// # Examples
    ///
    /// ```
    /// use protodyn::io::Tag;
    /// # use std::convert::TryFrom;
    ///
    /// assert!(Tag::try_from(1).is_err());
    /// assert!(Tag::try_from(8).is_ok());
    /// assert!(Tag::try_from(16).is_ok());
    /// assert!(Tag::try_from(14).is_err());
    /// ```
    #[inline]
    fn try_from(n: u32) -> Result<Tag, TryTagFromRawError> {
        match (n & 0b111, n >> 3) {
            // (wire type, field number)
            (6, _) | (7, _) | (_, 0) => Err(TryTagFromRawError(())),
            _ => NonZeroU32::new(n).map(Tag).ok_or(TryTagFromRawError(())),
        }
    }
}

/// An opaque type that represents the length of a delimited value
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Length(i32);

impl Display for Length {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        self.get().fmt(fmt)
    }
}

impl Length {
    /// Returns the value as a [`i32`](https://doc.rust-lang.org/nightly/std/primitive.i32.html)
    #[inline]
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Makes a new length from the specified [`i32`], returning [`None`] if the value is negative
    ///
    /// [`i32`]: https://doc.rust-lang.org/nightly/std/primitive.i32.html
    /// [`None`]: https://doc.rust-lang.org/nightly/std/option/enum.Option.html#variant.None
    pub fn new(x: i32) -> Option<Length> {
        if x < 0 {
            None
        } else {
            Some(Length(x))
        }
    }

    /// Makes a new length from a buffer size, returning [`None`] if the size can't be
    /// represented on the wire.
    pub fn from_usize(x: usize) -> Option<Length> {
        i32::try_from(x).ok().map(Length)
    }

    /// Returns the length as a buffer size
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Returns the length of the value in the specified form
    pub fn of_value<V: Value>(value: &V::Inner) -> Option<Length> {
        LengthBuilder::new().add_value::<V>(value).map(LengthBuilder::build)
    }
}

impl From<Length> for i32 {
    fn from(x: Length) -> i32 {
        x.get()
    }
}

/// An opaque type for building a length for writing to an output.
///
/// Every addition returns `None` once the length can no longer be represented on the wire
/// (with the `checked_size` feature), which callers surface as a `ValueTooLarge` error.
#[derive(Debug, Clone, Copy, Default)]
pub struct LengthBuilder(i32);

impl LengthBuilder {
    /// Creates a new length builder
    #[inline]
    pub const fn new() -> LengthBuilder {
        Self(0)
    }

    /// Adds an arbitrary number of bytes to the length
    #[inline]
    #[must_use = "this returns the builder to chain and does not mutate it in place"]
    pub fn add_bytes(self, value: Length) -> Option<Self> {
        #[cfg(feature = "checked_size")]
        return self.0.checked_add(value.get()).map(LengthBuilder);

        #[cfg(not(feature = "checked_size"))]
        return Some(LengthBuilder(self.0.wrapping_add(value.get())));
    }

    /// Adds a tag's size to the length
    #[inline]
    #[must_use = "this returns the builder to chain and does not mutate it in place"]
    pub fn add_tag(self, tag: Tag) -> Option<Self> {
        self.add_bytes(raw_varint32_size(tag.get()))
    }

    /// Adds the size of a length prefix followed by the bytes it counts
    #[inline]
    #[must_use = "this returns the builder to chain and does not mutate it in place"]
    pub fn add_delimited(self, len: Length) -> Option<Self> {
        self.add_bytes(raw_varint32_size(len.get() as u32))?
            .add_bytes(len)
    }

    /// Adds a value's length to this instance
    #[inline]
    #[must_use = "this returns the builder to chain and does not mutate it in place"]
    pub fn add_value<V: Value>(self, value: &V::Inner) -> Option<Self> {
        V::wrap_ref(value).calculate_size(self)
    }

    /// Consumes the builder, returning a [`Length`](struct.Length.html) for writing to an output
    #[inline]
    pub fn build(self) -> Length {
        Length(self.0)
    }

    /// Consumes the builder, returning the length if it's still representable on the wire
    #[inline]
    pub fn try_build(self) -> Option<Length> {
        Length::new(self.0)
    }
}

/// Encodes a signed 32-bit value using zig-zag encoding so that values close to zero
/// take few bytes regardless of sign.
#[inline]
pub const fn zigzag_encode32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

/// Reverses [`zigzag_encode32`](fn.zigzag_encode32.html).
#[inline]
pub const fn zigzag_decode32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

/// Encodes a signed 64-bit value using zig-zag encoding: `(n << 1) ^ (n >> 63)`.
///
/// # Examples
///
/// ```
/// use protodyn::io::zigzag_encode64;
///
/// assert_eq!(zigzag_encode64(0), 0);
/// assert_eq!(zigzag_encode64(-1), 1);
/// assert_eq!(zigzag_encode64(1), 2);
/// assert_eq!(zigzag_encode64(i64::MIN), u64::MAX);
/// ```
#[inline]
pub const fn zigzag_encode64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Reverses [`zigzag_encode64`](fn.zigzag_encode64.html).
#[inline]
pub const fn zigzag_decode64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

#[inline]
pub(crate) const fn raw_varint32_size(value: u32) -> Length {
    Length((((31 ^ (value | 1).leading_zeros()) * 9 + 73) / 64) as i32)
}

#[inline]
pub(crate) const fn raw_varint64_size(value: u64) -> Length {
    Length((((63 ^ (value | 1).leading_zeros()) * 9 + 73) / 64) as i32)
}

#[cfg(test)]
mod test {
    use core::convert::TryFrom;
    use crate::io::{self, FieldNumber, Tag, WireType, Length, LengthBuilder};

    #[test]
    fn varint_sizes() {
        assert_eq!(io::raw_varint32_size(0).get(), 1);
        assert_eq!(io::raw_varint32_size(127).get(), 1);
        assert_eq!(io::raw_varint32_size(128).get(), 2);
        assert_eq!(io::raw_varint32_size(u32::MAX).get(), 5);
        assert_eq!(io::raw_varint64_size(u64::from(u32::MAX) + 1).get(), 5);
        assert_eq!(io::raw_varint64_size(u64::MAX).get(), 10);
    }
    #[test]
    fn zigzag() {
        for &(n, z) in &[(0i64, 0u64), (-1, 1), (1, 2), (-2, 3), (i64::MAX, u64::MAX - 1), (i64::MIN, u64::MAX)] {
            assert_eq!(io::zigzag_encode64(n), z);
            assert_eq!(io::zigzag_decode64(z), n);
        }
        for &(n, z) in &[(0i32, 0u32), (-1, 1), (1, 2), (i32::MAX, u32::MAX - 1), (i32::MIN, u32::MAX)] {
            assert_eq!(io::zigzag_encode32(n), z);
            assert_eq!(io::zigzag_decode32(z), n);
        }
    }
    #[test]
    fn reserved_numbers() {
        assert!(FieldNumber::new(19_000).unwrap().is_reserved());
        assert!(FieldNumber::new(19_999).unwrap().is_reserved());
        assert!(!FieldNumber::new(18_999).unwrap().is_reserved());
        assert!(!FieldNumber::new(20_000).unwrap().is_reserved());
        assert!(FieldNumber::try_from(0).is_err());
    }
    #[test]
    fn tag_parts() {
        let tag = Tag::new(FieldNumber::new(150).unwrap(), WireType::LengthDelimited);
        assert_eq!(tag.get(), (150 << 3) | 2);
        assert_eq!(tag.field().get(), 150);
        assert_eq!(tag.wire_type(), WireType::LengthDelimited);
        assert_eq!(Tag::try_from(tag.get()), Ok(tag));
        assert!(Tag::try_from((1 << 3) | 6).is_err());
        assert!(Tag::try_from((1 << 3) | 7).is_err());
    }
    #[test]
    fn delimited_sizes() {
        let len = LengthBuilder::new()
            .add_delimited(Length::new(300).unwrap())
            .unwrap()
            .build();
        assert_eq!(len.get(), 302);
    }
}
