//! Defines the `CodedWriter`, a writer for writing protobuf encoded values to vectors and slices.

use core::convert::TryFrom;
use core::mem;
use crate::io::{FieldNumber, Length, Tag, MAX_VARINT_LEN};
use crate::raw::Value;
use either::{Either, Left, Right};
use thiserror::Error;

/// The error type for [`CodedWriter`](struct.CodedWriter.html)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A required field of a message being written wasn't set
    #[error("message {message} is missing required field {field}")]
    IncompleteMessage {
        /// Full name of the message
        message: String,
        /// Name of the missing field
        field: String,
    },
    /// A value was provided that was too large to write to an output.
    #[error("the value was too large to write to the output")]
    ValueTooLarge,
    /// The output slice didn't have enough space left for a value
    #[error("output too small: needed {needed} bytes but {remaining} remained")]
    OutputTooSmall {
        /// Bytes the write required
        needed: usize,
        /// Bytes left in the output
        remaining: usize,
    },
    /// A stored value didn't match the type declared by its field's descriptor
    #[error("value of field {field} doesn't match its declared type")]
    SchemaMismatch {
        /// The field number
        field: u32,
    },
}

/// A result for a [`CodedWriter`](struct.CodedWriter.html) write operation
pub type Result = core::result::Result<(), Error>;

/// Encodes a value as a varint into a new vector
///
/// # Examples
///
/// ```
/// use protodyn::io::encode_varint;
///
/// assert_eq!(encode_varint(0), [0x00]);
/// assert_eq!(encode_varint(150), [0x96, 0x01]);
/// assert_eq!(encode_varint(u64::MAX).len(), 10);
/// ```
pub fn encode_varint(value: u64) -> Vec<u8> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = varint_to_array(value, &mut buf);
    buf[..len].to_vec()
}

#[inline]
fn varint_to_array(mut value: u64, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let mut i = 0;
    loop {
        buf[i] = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            return i + 1;
        }
        buf[i] |= 0x80;
        i += 1;
    }
}

/// Options controlling how messages write themselves to a [`CodedWriter`](struct.CodedWriter.html)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriterOptions {
    check_initialized: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions {
            check_initialized: true,
        }
    }
}

impl WriterOptions {
    /// Gets whether messages check that all their required fields are set before writing
    #[inline]
    pub fn check_initialized(&self) -> bool {
        self.check_initialized
    }
}

/// A builder used to construct [`CodedWriter`](struct.CodedWriter.html) instances
#[derive(Clone, Debug, Default)]
pub struct Builder {
    options: WriterOptions,
}

impl Builder {
    /// Creates a new builder with the default configuration
    #[inline]
    pub fn new() -> Self {
        Default::default()
    }
    /// Sets whether messages check for missing required fields before writing
    #[inline]
    pub fn check_initialized(mut self, value: bool) -> Self {
        self.options.check_initialized = value;
        self
    }
    /// Constructs a [`CodedWriter`](struct.CodedWriter.html) appending to the vector
    #[inline]
    pub fn with_vec<'a>(&self, inner: &'a mut Vec<u8>) -> CodedWriter<'a> {
        CodedWriter { inner: Left(inner), options: self.options.clone() }
    }
    /// Constructs a [`CodedWriter`](struct.CodedWriter.html) filling the slice from the front
    #[inline]
    pub fn with_slice<'a>(&self, inner: &'a mut [u8]) -> CodedWriter<'a> {
        CodedWriter { inner: Right(inner), options: self.options.clone() }
    }
}

/// A coded output writer that writes to a borrowed vector or slice.
pub struct CodedWriter<'a> {
    inner: Either<&'a mut Vec<u8>, &'a mut [u8]>,
    options: WriterOptions,
}

impl<'a> CodedWriter<'a> {
    /// Creates a new [`CodedWriter`] appending to the borrowed vector.
    ///
    /// [`CodedWriter`]: struct.CodedWriter.html
    #[inline]
    pub fn with_vec(inner: &'a mut Vec<u8>) -> Self {
        Builder::new().with_vec(inner)
    }
    /// Creates a new [`CodedWriter`] over the borrowed slice.
    ///
    /// [`CodedWriter`]: struct.CodedWriter.html
    #[inline]
    pub fn with_slice(inner: &'a mut [u8]) -> Self {
        Builder::new().with_slice(inner)
    }

    /// Returns the options this writer was built with
    #[inline]
    pub fn options(&self) -> &WriterOptions {
        &self.options
    }
    /// Returns the space left in a slice output, or `None` for a vector
    #[inline]
    pub fn remaining(&self) -> Option<usize> {
        self.inner.as_ref().right().map(|buf| buf.len())
    }

    /// Writes a tag to the output.
    #[inline]
    pub fn write_tag(&mut self, tag: Tag) -> Result {
        self.write_varint32(tag.get())
    }
    /// Writes a length to the output.
    #[inline]
    pub fn write_length(&mut self, length: Length) -> Result {
        self.write_varint32(length.get() as u32)
    }
    /// Writes a 32-bit varint to the output.
    #[inline]
    pub fn write_varint32(&mut self, value: u32) -> Result {
        self.write_varint64(u64::from(value))
    }
    /// Writes a 64-bit varint to the output.
    #[inline]
    pub fn write_varint64(&mut self, value: u64) -> Result {
        let mut buf = [0u8; MAX_VARINT_LEN];
        let len = varint_to_array(value, &mut buf);
        self.write_bytes(&buf[..len])
    }
    /// Writes a 32-bit little endian integer to the output.
    #[inline]
    pub fn write_bit32(&mut self, value: u32) -> Result {
        self.write_bytes(&value.to_le_bytes())
    }
    /// Writes a 64-bit little endian integer to the output.
    #[inline]
    pub fn write_bit64(&mut self, value: u64) -> Result {
        self.write_bytes(&value.to_le_bytes())
    }
    /// Writes raw bytes to the output. This should be used carefully as to not corrupt the coded output.
    pub fn write_bytes(&mut self, value: &[u8]) -> Result {
        match &mut self.inner {
            Left(vec) => vec.extend_from_slice(value),
            Right(buf) => {
                if value.len() > buf.len() {
                    return Err(Error::OutputTooSmall { needed: value.len(), remaining: buf.len() });
                }
                let (head, tail) = mem::take(buf).split_at_mut(value.len());
                head.copy_from_slice(value);
                *buf = tail;
            }
        }
        Ok(())
    }
    /// Writes a length delimited set of bytes to the output.
    #[inline]
    pub fn write_length_delimited(&mut self, value: &[u8]) -> Result {
        let len = i32::try_from(value.len()).map_err(|_| Error::ValueTooLarge)?;
        self.write_varint32(len as u32)?;
        self.write_bytes(value)
    }

    /// Writes a value of the specified raw type
    #[inline]
    pub fn write_value<V: Value>(&mut self, value: &V::Inner) -> Result {
        V::wrap_ref(value).write_to(self)
    }
    /// Writes a tag for the field number and the raw type's wire type followed by the value
    #[inline]
    pub fn write_field<V: Value>(&mut self, num: FieldNumber, value: &V::Inner) -> Result {
        self.write_tag(Tag::new(num, V::WIRE_TYPE))?;
        self.write_value::<V>(value)
    }
}
