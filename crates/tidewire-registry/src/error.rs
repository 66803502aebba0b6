use thiserror::Error;

/// Failures while assembling a type registry. Decode-time failures surface
/// as [`tidewire_stream::WireError`] instead.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("type name already registered: {0}")]
    DuplicateName(&'static str),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
