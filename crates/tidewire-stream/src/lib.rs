//! Versioned byte channels for the node-to-node and persistence wire format.
//!
//! This is the core layer of tidewire. A channel is a sequential cursor over
//! an ordered byte source or sink that carries:
//! - The protocol version negotiated for the connection or file
//! - A bounds guard that admits every declared length before allocation
//! - Variable-length integer, string, and collection codecs
//!
//! Reads are synchronous and blocking; a decode failure is fatal to the call
//! and never recovered from, because skipping malformed bytes in a
//! self-describing format would silently misinterpret everything after them.

pub mod bounds;
pub mod error;
pub mod input;
pub mod output;
pub mod time;
pub mod version;

pub use bounds::{admit, DEFAULT_MAX_DECLARED_LENGTH};
pub use error::{Result, WireError};
pub use input::{OrdinalEnum, StreamConfig, StreamInput};
pub use output::StreamOutput;
pub use time::{TimeUnit, TimeValue};
pub use version::Version;
