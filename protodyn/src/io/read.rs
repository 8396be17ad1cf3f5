//! Defines the `CodedReader`, a reader for reading values from a protobuf encoded byte slice.

use core::convert::TryFrom;
use core::result;
use core::str::{self, Utf8Error};
use crate::io::{FieldNumber, Length, Tag, WireType, MAX_VARINT_LEN};
use crate::raw::Value;
use thiserror::Error;

/// The default depth of nested messages and groups a reader will descend into
pub const DEFAULT_RECURSION_LIMIT: u32 = 100;

/// The error type for [`CodedReader`](struct.CodedReader.html).
///
/// Every variant carries the byte offset in the input at which the problem was detected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The input contained a variable length integer longer than 10 bytes
    /// or one that overflowed 64 bits
    #[error("malformed varint at offset {offset}")]
    MalformedVarint {
        /// Offset of the first byte of the varint
        offset: usize,
    },
    /// The input ended in the middle of a tag or value
    #[error("message truncated at offset {offset}")]
    TruncatedMessage {
        /// Offset at which more input was expected
        offset: usize,
    },
    /// The input contained a tag with the wire type 6 or 7
    #[error("invalid wire type {value} at offset {offset}")]
    InvalidWireType {
        /// The wire type bits of the tag
        value: u8,
        /// Offset of the tag
        offset: usize,
    },
    /// The input contained a tag with a field number of 0 or a value that overflowed 32 bits
    #[error("invalid tag {value} at offset {offset}")]
    InvalidTag {
        /// The raw tag value
        value: u64,
        /// Offset of the tag
        offset: usize,
    },
    /// The input contained an end group tag that didn't close an open group
    #[error("unexpected end group tag for field {field} at offset {offset}")]
    UnexpectedEndGroup {
        /// Field number of the end group tag
        field: u32,
        /// Offset of the tag
        offset: usize,
    },
    /// The input contained a string field that wasn't valid UTF-8
    #[error("invalid UTF-8 string at offset {offset}")]
    InvalidString {
        /// Offset of the string's first byte
        offset: usize,
        /// The UTF-8 validation failure
        #[source]
        source: Utf8Error,
    },
    /// The wire type of a field disagreed with the type declared by its descriptor
    #[error("field {field} declared with wire type {expected:?} but read as {actual:?} at offset {offset}")]
    SchemaMismatch {
        /// The field number
        field: u32,
        /// The wire type the descriptor implies
        expected: WireType,
        /// The wire type found in the input
        actual: WireType,
        /// Offset of the tag
        offset: usize,
    },
    /// Nested messages or groups went deeper than the reader's recursion limit
    #[error("recursion limit of {limit} exceeded at offset {offset}")]
    RecursionLimitExceeded {
        /// The reader's configured limit
        limit: u32,
        /// Offset of the nested value that went too deep
        offset: usize,
    },
    /// A field referenced a message type the schema doesn't contain
    #[error("unknown message type {name} at offset {offset}")]
    UnknownMessage {
        /// Full name of the missing message type
        name: String,
        /// Offset of the field's tag
        offset: usize,
    },
}

impl Error {
    /// Returns the byte offset in the input at which the error was detected
    pub fn offset(&self) -> usize {
        match *self {
            Error::MalformedVarint { offset }
            | Error::TruncatedMessage { offset }
            | Error::InvalidWireType { offset, .. }
            | Error::InvalidTag { offset, .. }
            | Error::UnexpectedEndGroup { offset, .. }
            | Error::InvalidString { offset, .. }
            | Error::SchemaMismatch { offset, .. }
            | Error::RecursionLimitExceeded { offset, .. }
            | Error::UnknownMessage { offset, .. } => offset,
        }
    }
}

/// A result for a [`CodedReader`](struct.CodedReader.html) read operation
pub type Result<T> = result::Result<T, Error>;

/// Decodes a varint starting at `offset`, returning the value and the offset just past it.
///
/// # Errors
///
/// Fails with `MalformedVarint` if no terminating byte is found in 10 bytes, if the
/// 10th byte carries bits past 64, or if the buffer ends first.
///
/// # Examples
///
/// ```
/// use protodyn::io::decode_varint;
///
/// assert_eq!(decode_varint(&[0x00], 0), Ok((0, 1)));
/// assert_eq!(decode_varint(&[0x96, 0x01], 0), Ok((150, 2)));
/// assert!(decode_varint(&[0x96], 0).is_err());
/// ```
pub fn decode_varint(bytes: &[u8], offset: usize) -> Result<(u64, usize)> {
    let mut reader = CodedReader::with_slice(bytes);
    reader.pos = offset.min(bytes.len());
    match reader.read_varint64() {
        Ok(value) => Ok((value, reader.pos)),
        Err(Error::TruncatedMessage { .. }) => Err(Error::MalformedVarint { offset }),
        Err(e) => Err(e),
    }
}

/// Options controlling how a [`CodedReader`](struct.CodedReader.html) and the
/// messages merging from it treat their input
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReaderOptions {
    skip_unknown_fields: bool,
    recursion_limit: u32,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            skip_unknown_fields: false,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }
}

impl ReaderOptions {
    /// Gets whether fields not known to a message are discarded instead of preserved
    #[inline]
    pub fn skip_unknown_fields(&self) -> bool {
        self.skip_unknown_fields
    }
    /// Gets the maximum depth of nested messages and groups
    #[inline]
    pub fn recursion_limit(&self) -> u32 {
        self.recursion_limit
    }
}

/// A builder used to construct [`CodedReader`](struct.CodedReader.html) instances
#[derive(Clone, Debug, Default)]
pub struct Builder {
    options: ReaderOptions,
}

impl Builder {
    /// Creates a new builder with the default configuration
    #[inline]
    pub fn new() -> Self {
        Default::default()
    }
    /// Sets whether unknown fields should be skipped instead of stored
    #[inline]
    pub fn skip_unknown_fields(mut self, value: bool) -> Self {
        self.options.skip_unknown_fields = value;
        self
    }
    /// Sets the maximum depth of nested messages and groups
    #[inline]
    pub fn recursion_limit(mut self, value: u32) -> Self {
        self.options.recursion_limit = value;
        self
    }
    /// Returns the options this builder has been configured with
    #[inline]
    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }
    /// Constructs a [`CodedReader`](struct.CodedReader.html) using this builder and
    /// the specified slice of bytes
    ///
    /// # Examples
    ///
    /// ```
    /// use protodyn::io::ReaderBuilder;
    ///
    /// let data = [8, 15];
    /// let reader =
    ///     ReaderBuilder::new()
    ///         .skip_unknown_fields(true)
    ///         .with_slice(&data);
    /// assert!(reader.options().skip_unknown_fields());
    /// ```
    #[inline]
    pub fn with_slice<'a>(&self, inner: &'a [u8]) -> CodedReader<'a> {
        CodedReader {
            buf: inner,
            pos: 0,
            limit: inner.len(),
            depth: 0,
            last_tag: None,
            last_tag_offset: 0,
            options: self.options.clone(),
        }
    }
}

/// A coded input reader over a borrowed slice of bytes.
///
/// Nested values are read by pushing a length limit with [`read_nested`](#method.read_nested),
/// which restores the outer limit when the nested value has been read.
#[derive(Debug, Clone)]
pub struct CodedReader<'a> {
    buf: &'a [u8],
    pos: usize,
    limit: usize,
    depth: u32,
    last_tag: Option<Tag>,
    last_tag_offset: usize,
    options: ReaderOptions,
}

impl<'a> CodedReader<'a> {
    /// Creates a new [`CodedReader`] over the borrowed slice in the default configuration.
    ///
    /// [`CodedReader`]: struct.CodedReader.html
    pub fn with_slice(inner: &'a [u8]) -> Self {
        Builder::new().with_slice(inner)
    }

    /// Returns the options this reader was built with
    #[inline]
    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }
    /// Returns the last tag read by [`read_tag`](#method.read_tag)
    #[inline]
    pub fn last_tag(&self) -> Option<Tag> {
        self.last_tag
    }
    /// Returns the offset of the last tag read by the reader
    #[inline]
    pub fn last_tag_offset(&self) -> usize {
        self.last_tag_offset
    }
    /// Returns the current offset of the reader in the input
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }
    /// Returns the current depth of nested values
    #[inline]
    pub fn depth(&self) -> u32 {
        self.depth
    }
    /// Returns whether this coded reader has reached the current length limit
    #[inline]
    pub fn reached_limit(&self) -> bool {
        self.pos >= self.limit
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.pos)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(Error::TruncatedMessage { offset: self.pos });
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.buf[start..self.pos])
    }

    /// Reads a field tag from the input, returning `None` at the end of the input or current limit
    pub fn read_tag(&mut self) -> Result<Option<Tag>> {
        if self.reached_limit() {
            self.last_tag = None;
            return Ok(None);
        }

        let offset = self.pos;
        let value = self.read_varint64()?;
        let raw = u32::try_from(value).map_err(|_| Error::InvalidTag { value, offset })?;
        let wire_type = (raw & 0b111) as u8;
        if WireType::try_from(wire_type).is_err() {
            return Err(Error::InvalidWireType { value: wire_type, offset });
        }
        let tag = Tag::try_from(raw).map_err(|_| Error::InvalidTag { value, offset })?;

        self.last_tag = Some(tag);
        self.last_tag_offset = offset;
        Ok(self.last_tag)
    }
    /// Reads a 32-bit varint field value. This discards the top bits of 64-bit values.
    #[inline]
    pub fn read_varint32(&mut self) -> Result<u32> {
        self.read_varint64().map(|v| v as u32)
    }
    /// Reads a 64-bit varint field value.
    pub fn read_varint64(&mut self) -> Result<u64> {
        let start = self.pos;
        let mut result = 0u64;
        for i in 0..MAX_VARINT_LEN {
            let b = *self.take(1)?.first().ok_or(Error::TruncatedMessage { offset: start })?;
            if i == MAX_VARINT_LEN - 1 && b > 1 {
                return Err(Error::MalformedVarint { offset: start });
            }
            result |= u64::from(b & 0x7F) << (7 * i);
            if b & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(Error::MalformedVarint { offset: start })
    }
    /// Reads a 4-byte little endian value
    pub fn read_bit32(&mut self) -> Result<u32> {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(bytes))
    }
    /// Reads a 8-byte little endian value
    pub fn read_bit64(&mut self) -> Result<u64> {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(bytes))
    }
    /// Reads a length value from the input.
    ///
    /// # Errors
    ///
    /// A length that runs past the end of the input returns a `TruncatedMessage` error.
    pub fn read_length(&mut self) -> Result<Length> {
        let offset = self.pos;
        let value = self.read_varint64()?;
        let len = usize::try_from(value)
            .ok()
            .and_then(Length::from_usize)
            .ok_or(Error::TruncatedMessage { offset })?;
        if len.as_usize() > self.remaining() {
            return Err(Error::TruncatedMessage { offset: self.pos });
        }
        Ok(len)
    }
    /// Reads a length delimited run of bytes borrowed from the input
    pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_length()?;
        self.take(len.as_usize())
    }
    /// Reads a length delimited run of bytes
    #[inline]
    pub fn read_length_delimited(&mut self) -> Result<Vec<u8>> {
        self.read_bytes().map(<[u8]>::to_vec)
    }
    /// Reads a length delimited UTF-8 string
    pub fn read_string(&mut self) -> Result<String> {
        let offset = self.pos;
        let bytes = self.read_bytes()?;
        str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|source| Error::InvalidString { offset, source })
    }
    /// Reads a value of the specified raw type
    #[inline]
    pub fn read_value<V: Value>(&mut self) -> Result<V::Inner> {
        V::read_new(self).map(V::unwrap)
    }

    fn enter(&mut self, offset: usize) -> Result<()> {
        if self.depth >= self.options.recursion_limit {
            return Err(Error::RecursionLimitExceeded { limit: self.options.recursion_limit, offset });
        }
        self.depth += 1;
        Ok(())
    }

    /// Reads a length prefix and runs `f` with the reader limited to that many bytes.
    /// This counts as one level of nesting against the recursion limit.
    pub fn read_nested<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let len = self.read_length()?;
        let start = self.pos;
        self.enter(start)?;

        let old_limit = self.limit;
        self.limit = start + len.as_usize();
        let result = f(self);
        self.limit = old_limit;
        self.depth -= 1;

        result
    }
    /// Reads a length prefix and runs `f` until the limit it pushes has been reached.
    /// Used to read packed repeated values without increasing the depth.
    pub fn read_packed<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&mut Self) -> Result<()>,
    {
        let len = self.read_length()?;
        let old_limit = self.limit;
        self.limit = self.pos + len.as_usize();
        let mut result = Ok(());
        while !self.reached_limit() {
            result = f(self);
            if result.is_err() {
                break;
            }
        }
        self.limit = old_limit;
        result
    }
    /// Runs `f` to read the contents of the group started by the last tag.
    /// This counts as one level of nesting against the recursion limit.
    pub fn read_group<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.enter(self.last_tag_offset)?;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Checks that the last tag closes a group opened for `field`. A tag that ends a
    /// different group is an `UnexpectedEndGroup` error.
    pub fn check_end_group(&self, field: FieldNumber) -> Result<bool> {
        match self.last_tag {
            Some(tag) if tag.wire_type() == WireType::EndGroup => {
                if tag.field() == field {
                    Ok(true)
                } else {
                    Err(Error::UnexpectedEndGroup { field: tag.field().get(), offset: self.last_tag_offset })
                }
            }
            _ => Ok(false),
        }
    }

    /// Skips the last field read from the input
    pub fn skip(&mut self) -> Result<()> {
        let last_tag = match self.last_tag {
            Some(tag) => tag,
            None => return Ok(()),
        };
        match last_tag.wire_type() {
            WireType::Varint => self.read_varint64().map(drop),
            WireType::Bit64 => self.take(8).map(drop),
            WireType::LengthDelimited => self.read_bytes().map(drop),
            WireType::Bit32 => self.take(4).map(drop),
            WireType::StartGroup => {
                let field = last_tag.field();
                self.read_group(|reader| loop {
                    match reader.read_tag()? {
                        Some(_) if reader.check_end_group(field)? => break Ok(()),
                        Some(_) => reader.skip()?,
                        None => break Err(Error::TruncatedMessage { offset: reader.pos }),
                    }
                })
            }
            WireType::EndGroup => Err(Error::UnexpectedEndGroup {
                field: last_tag.field().get(),
                offset: self.last_tag_offset,
            }),
        }
    }
}
