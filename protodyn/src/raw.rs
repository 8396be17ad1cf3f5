//! Contains typed codecs for protobuf scalar values.
//!
//! Each type wraps the Rust value it represents and knows its wire type, how to size itself,
//! and how to read itself from a [`CodedReader`] and write itself to a [`CodedWriter`].
//! The message runtime dispatches to these codecs from the semantic type of a field.
//!
//! [`CodedReader`]: ../io/read/struct.CodedReader.html
//! [`CodedWriter`]: ../io/write/struct.CodedWriter.html

use crate::internal::Sealed;
use crate::io::{self, read, write, CodedReader, CodedWriter, Length, LengthBuilder, WireType};
use trapper::{newtype, Wrapper};

/// A value capable of reading itself from an input, writing itself to an output, and calculating its size.
pub trait Value: Wrapper + Sized + Sealed {
    /// A value indicating the wire type of the value without packing.
    const WIRE_TYPE: WireType;

    /// Calculates the size of the value as encoded on the wire
    fn calculate_size(&self, builder: LengthBuilder) -> Option<LengthBuilder>;

    /// Reads a new instance of the value from the [`CodedReader`](../io/read/struct.CodedReader.html)
    fn read_new(input: &mut CodedReader) -> read::Result<Self>;

    /// Writes the value to the [`CodedWriter`](../io/write/struct.CodedWriter.html)
    fn write_to(&self, output: &mut CodedWriter) -> write::Result;
}

/// A value with a constant size.
pub trait ConstSized: Value {
    /// The constant size of the value
    const SIZE: i32;
}

macro_rules! varint_value {
    ($(#[$m:meta])* $name:ident($ty:ty), |$v:ident| $enc:expr, |$r:ident| $dec:expr) => {
        newtype! {
            $(#[$m])*
            pub type $name($ty);
        }

        impl Sealed for $name { }
        impl Value for $name {
            const WIRE_TYPE: WireType = WireType::Varint;

            fn calculate_size(&self, builder: LengthBuilder) -> Option<LengthBuilder> {
                let $v = self.0;
                builder.add_bytes(io::raw_varint64_size($enc))
            }
            fn read_new(input: &mut CodedReader) -> read::Result<Self> {
                input.read_varint64().map(|$r| Self($dec))
            }
            fn write_to(&self, output: &mut CodedWriter) -> write::Result {
                let $v = self.0;
                output.write_varint64($enc)
            }
        }
    };
}

varint_value! {
    /// A varint encoded 32-bit value. Negative values are sign extended and encoded as 10-byte varints.
    Int32(i32), |v| i64::from(v) as u64, |r| r as i32
}
varint_value! {
    /// A varint encoded 32-bit value. Can be at most 5 bytes.
    Uint32(u32), |v| u64::from(v), |r| r as u32
}
varint_value! {
    /// A varint encoded 64-bit value. Can be at most 10 bytes.
    Int64(i64), |v| v as u64, |r| r as i64
}
varint_value! {
    /// A varint encoded 64-bit value. Can be at most 10 bytes.
    Uint64(u64), |v| v, |r| r
}
varint_value! {
    /// A zig-zag encoded 32-bit value, efficient for small negative values.
    Sint32(i32), |v| u64::from(io::zigzag_encode32(v)), |r| io::zigzag_decode32(r as u32)
}
varint_value! {
    /// A zig-zag encoded 64-bit value, efficient for small negative values.
    Sint64(i64), |v| io::zigzag_encode64(v), |r| io::zigzag_decode64(r)
}
varint_value! {
    /// An enum value, encoded like an int32. Unlisted values are kept as is.
    Enum(i32), |v| i64::from(v) as u64, |r| r as i32
}

newtype! {
    /// A boolean value encoded as a single byte varint. Any non-zero value reads as true.
    pub type Bool(bool);
}

impl Sealed for Bool { }
impl Value for Bool {
    const WIRE_TYPE: WireType = WireType::Varint;

    fn calculate_size(&self, builder: LengthBuilder) -> Option<LengthBuilder> {
        builder.add_bytes(Length::new(Self::SIZE)?)
    }
    fn read_new(input: &mut CodedReader) -> read::Result<Self> {
        input.read_varint64().map(|v| Self(v != 0))
    }
    fn write_to(&self, output: &mut CodedWriter) -> write::Result {
        output.write_varint32(self.0 as u32)
    }
}
impl ConstSized for Bool {
    const SIZE: i32 = 1;
}

macro_rules! fixed_value {
    ($(#[$m:meta])* $name:ident($ty:ty), $wt:ident, $size:literal, $read:ident, $write:ident, |$v:ident| $enc:expr, |$r:ident| $dec:expr) => {
        newtype! {
            $(#[$m])*
            pub type $name($ty);
        }

        impl Sealed for $name { }
        impl Value for $name {
            const WIRE_TYPE: WireType = WireType::$wt;

            fn calculate_size(&self, builder: LengthBuilder) -> Option<LengthBuilder> {
                builder.add_bytes(Length::new(Self::SIZE)?)
            }
            fn read_new(input: &mut CodedReader) -> read::Result<Self> {
                input.$read().map(|$r| Self($dec))
            }
            fn write_to(&self, output: &mut CodedWriter) -> write::Result {
                let $v = self.0;
                output.$write($enc)
            }
        }
        impl ConstSized for $name {
            const SIZE: i32 = $size;
        }
    };
}

fixed_value! {
    /// A fixed size 32-bit value. This is encoded as 4 little endian bytes.
    Fixed32(u32), Bit32, 4, read_bit32, write_bit32, |v| v, |r| r
}
fixed_value! {
    /// A fixed size 64-bit value. This is encoded as 8 little endian bytes.
    Fixed64(u64), Bit64, 8, read_bit64, write_bit64, |v| v, |r| r
}
fixed_value! {
    /// A fixed size signed 32-bit value. This is encoded as 4 little endian bytes.
    Sfixed32(i32), Bit32, 4, read_bit32, write_bit32, |v| v as u32, |r| r as i32
}
fixed_value! {
    /// A fixed size signed 64-bit value. This is encoded as 8 little endian bytes.
    Sfixed64(i64), Bit64, 8, read_bit64, write_bit64, |v| v as u64, |r| r as i64
}
fixed_value! {
    /// A 32-bit floating point value. This is encoded as 4 little endian bytes.
    Float(f32), Bit32, 4, read_bit32, write_bit32, |v| v.to_bits(), |r| f32::from_bits(r)
}
fixed_value! {
    /// A 64-bit floating point value. This is encoded as 8 little endian bytes.
    Double(f64), Bit64, 8, read_bit64, write_bit64, |v| v.to_bits(), |r| f64::from_bits(r)
}

newtype! {
    /// A length delimited UTF-8 string.
    pub type String(std::string::String);
}

impl Sealed for String { }
impl Value for String {
    const WIRE_TYPE: WireType = WireType::LengthDelimited;

    fn calculate_size(&self, builder: LengthBuilder) -> Option<LengthBuilder> {
        builder.add_delimited(Length::from_usize(self.0.len())?)
    }
    fn read_new(input: &mut CodedReader) -> read::Result<Self> {
        input.read_string().map(Self)
    }
    fn write_to(&self, output: &mut CodedWriter) -> write::Result {
        output.write_length_delimited(self.0.as_bytes())
    }
}

newtype! {
    /// A length delimited run of bytes.
    pub type Bytes(Vec<u8>);
}

impl Sealed for Bytes { }
impl Value for Bytes {
    const WIRE_TYPE: WireType = WireType::LengthDelimited;

    fn calculate_size(&self, builder: LengthBuilder) -> Option<LengthBuilder> {
        builder.add_delimited(Length::from_usize(self.0.len())?)
    }
    fn read_new(input: &mut CodedReader) -> read::Result<Self> {
        input.read_length_delimited().map(Self)
    }
    fn write_to(&self, output: &mut CodedWriter) -> write::Result {
        output.write_length_delimited(&self.0)
    }
}
