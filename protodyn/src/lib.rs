//! A schema driven protobuf runtime.
//!
//! Messages are described at runtime by a [`Schema`] of [`MessageDescriptor`]s and are
//! decoded into [`DynamicMessage`]s, a generic field store that can be read, modified and
//! written back to the protobuf binary wire format. Fields the schema doesn't know are
//! preserved in an [`UnknownFieldSet`] and extensions registered with the schema are decoded
//! into the message's [`ExtensionSet`].
//!
//! ```
//! use std::sync::Arc;
//! use protodyn::{DynamicMessage, Schema, Value};
//! use protodyn::descriptor::{FieldDescriptor, FieldType, MessageDescriptor};
//!
//! # fn main() -> protodyn::Result<()> {
//! let options = MessageDescriptor::builder("google.protobuf.MessageOptions")
//!     .field(FieldDescriptor::new(3, "deprecated", FieldType::Bool)?)
//!     .extension_range(1000..536_870_912)
//!     .build()?;
//! let schema = Arc::new(Schema::builder().message(options).build()?);
//!
//! let message = DynamicMessage::parse(&schema, "google.protobuf.MessageOptions", &[0x18, 0x01])?;
//! assert_eq!(message.get(3)?, Some(&Value::Bool(true)));
//! assert_eq!(message.to_vec()?, [0x18, 0x01]);
//! # Ok(())
//! # }
//! ```
//!
//! [`Schema`]: descriptor/struct.Schema.html
//! [`MessageDescriptor`]: descriptor/struct.MessageDescriptor.html
//! [`DynamicMessage`]: message/struct.DynamicMessage.html
//! [`UnknownFieldSet`]: collections/unknown_fields/struct.UnknownFieldSet.html
//! [`ExtensionSet`]: extend/struct.ExtensionSet.html

#![warn(missing_docs)]

mod internal {
    pub trait Sealed { }
}
pub mod collections;
pub mod descriptor;
pub mod extend;
pub mod io;
pub mod message;
pub mod raw;
pub mod value;

use thiserror::Error;

pub use collections::unknown_fields::{UnknownField, UnknownFieldSet};
pub use descriptor::Schema;
pub use extend::{ExtensionRegistry, ExtensionSet};
pub use message::DynamicMessage;
pub use value::{MapKey, Value};

/// A type that can merge another instance of itself into itself.
///
/// Scalars are overwritten, nested messages are merged recursively and
/// repeated values are appended.
pub trait Mergable {
    /// Merges another instance of this value into this one
    fn merge(&mut self, other: &Self);
}

/// The error type for every fallible operation in the crate, wrapping the error of the
/// concern that failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// An error decoding input
    #[error(transparent)]
    Read(#[from] io::read::Error),
    /// An error encoding output
    #[error(transparent)]
    Write(#[from] io::write::Error),
    /// An invalid descriptor or schema
    #[error(transparent)]
    Descriptor(#[from] descriptor::Error),
    /// An extension registration failure
    #[error(transparent)]
    Extension(#[from] extend::Error),
    /// An invalid access to a message's fields
    #[error(transparent)]
    Message(#[from] message::Error),
}

/// A result with the crate's [`Error`](enum.Error.html) type
pub type Result<T> = core::result::Result<T, Error>;
