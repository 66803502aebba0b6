//! Name-keyed decoding for pluggable wire types.
//!
//! Messages whose concrete type is not known from context carry a
//! discriminator ahead of the payload. The registry is assembled once at
//! startup from every type a node understands; an unrecognized discriminator
//! is a protocol error, never a silent skip.

pub mod error;
pub mod registry;

pub use error::{RegistryError, Result};
pub use registry::{write_named, write_optional_named, Factory, NamedWriteable, TypeRegistry};
