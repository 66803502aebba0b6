//! Exception chains across node boundaries.
//!
//! When a request fails on another node, the failure comes back over the
//! same channel as the data would have: a kind key, its fields, the cause
//! chain, and the remote stack trace.

pub mod fault;

pub use fault::{FaultKind, FileSystemKind, FormatVersions, RemoteFault, StackFrame};
