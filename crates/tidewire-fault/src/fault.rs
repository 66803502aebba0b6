//! Failures that crossed a node boundary.
//!
//! A fault travels as a presence flag, a vint kind key, the kind-specific
//! fields, then a stack trace payload. Causes nest recursively through the
//! same codec, so an arbitrarily deep chain decodes from one call. The key
//! table is closed and append-only.

use std::fmt;

use tidewire_stream::{Result, StreamInput, StreamOutput, WireError};

mod key {
    pub const INTERNAL: u32 = 0;
    pub const DATA_CORRUPTION: u32 = 1;
    pub const FORMAT_TOO_NEW: u32 = 2;
    pub const FORMAT_TOO_OLD: u32 = 3;
    pub const MISSING_VALUE: u32 = 4;
    pub const NUMBER_FORMAT: u32 = 5;
    pub const ILLEGAL_ARGUMENT: u32 = 6;
    pub const RESOURCE_CLOSED: u32 = 7;
    pub const UNEXPECTED_EOF: u32 = 8;
    pub const SECURITY: u32 = 9;
    pub const STRING_INDEX_OUT_OF_BOUNDS: u32 = 10;
    pub const INDEX_OUT_OF_BOUNDS: u32 = 11;
    pub const FILE_NOT_FOUND: u32 = 12;
    pub const FILE_SYSTEM: u32 = 13;
    pub const ILLEGAL_STATE: u32 = 14;
    pub const LOCK_OBTAIN_FAILED: u32 = 15;
    pub const INTERRUPTED: u32 = 16;
    pub const IO: u32 = 17;
    pub const REJECTED_EXECUTION: u32 = 18;
    pub const UNCHECKED_IO: u32 = 19;
}

/// One frame of a remote stack trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub class_name: String,
    pub method: String,
    pub file: Option<String>,
    pub line: u32,
}

/// The storage-format versions named in a too-new or too-old fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatVersions {
    pub found: i32,
    pub min: i32,
    pub max: i32,
}

/// File system fault sub-kinds, keyed by a nested vint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSystemKind {
    NoSuchFile,
    NotDirectory,
    DirectoryNotEmpty,
    AtomicMoveNotSupported,
    FileAlreadyExists,
    AccessDenied,
    FileSystemLoop,
    Generic,
}

impl FileSystemKind {
    fn from_wire(sub_kind: u32) -> Option<Self> {
        match sub_kind {
            0 => Some(FileSystemKind::NoSuchFile),
            1 => Some(FileSystemKind::NotDirectory),
            2 => Some(FileSystemKind::DirectoryNotEmpty),
            3 => Some(FileSystemKind::AtomicMoveNotSupported),
            4 => Some(FileSystemKind::FileAlreadyExists),
            5 => Some(FileSystemKind::AccessDenied),
            6 => Some(FileSystemKind::FileSystemLoop),
            7 => Some(FileSystemKind::Generic),
            _ => None,
        }
    }

    fn to_wire(self) -> u32 {
        match self {
            FileSystemKind::NoSuchFile => 0,
            FileSystemKind::NotDirectory => 1,
            FileSystemKind::DirectoryNotEmpty => 2,
            FileSystemKind::AtomicMoveNotSupported => 3,
            FileSystemKind::FileAlreadyExists => 4,
            FileSystemKind::AccessDenied => 5,
            FileSystemKind::FileSystemLoop => 6,
            FileSystemKind::Generic => 7,
        }
    }
}

type Cause = Option<Box<RemoteFault>>;

/// What went wrong on the far node. Closed set; keys are never reassigned.
#[derive(Debug, Clone, PartialEq)]
pub enum FaultKind {
    /// Server-defined fault carrying its own numeric code.
    Internal {
        code: u32,
        message: Option<String>,
        cause: Cause,
    },
    DataCorruption {
        message: Option<String>,
        resource: Option<String>,
        cause: Cause,
    },
    FormatTooNew {
        resource: Option<String>,
        versions: FormatVersions,
    },
    /// Older writers only recorded the found version as a string, so the two
    /// forms are distinguished by a flag on the wire.
    FormatTooOld {
        resource: Option<String>,
        versions: Option<FormatVersions>,
        version_label: Option<String>,
    },
    MissingValue {
        message: Option<String>,
    },
    NumberFormat {
        message: Option<String>,
    },
    IllegalArgument {
        message: Option<String>,
        cause: Cause,
    },
    ResourceClosed {
        message: Option<String>,
        cause: Cause,
    },
    UnexpectedEof {
        message: Option<String>,
    },
    Security {
        message: Option<String>,
        cause: Cause,
    },
    StringIndexOutOfBounds {
        message: Option<String>,
    },
    IndexOutOfBounds {
        message: Option<String>,
    },
    FileNotFound {
        message: Option<String>,
    },
    FileSystem {
        sub_kind: FileSystemKind,
        file: Option<String>,
        other: Option<String>,
        reason: Option<String>,
    },
    IllegalState {
        message: Option<String>,
        cause: Cause,
    },
    LockObtainFailed {
        message: Option<String>,
        cause: Cause,
    },
    Interrupted {
        message: Option<String>,
    },
    Io {
        message: Option<String>,
        cause: Cause,
    },
    RejectedExecution {
        message: Option<String>,
        executor_shutdown: bool,
    },
    UncheckedIo {
        message: Option<String>,
        cause: Cause,
    },
}

impl FaultKind {
    fn wire_key(&self) -> u32 {
        match self {
            FaultKind::Internal { .. } => key::INTERNAL,
            FaultKind::DataCorruption { .. } => key::DATA_CORRUPTION,
            FaultKind::FormatTooNew { .. } => key::FORMAT_TOO_NEW,
            FaultKind::FormatTooOld { .. } => key::FORMAT_TOO_OLD,
            FaultKind::MissingValue { .. } => key::MISSING_VALUE,
            FaultKind::NumberFormat { .. } => key::NUMBER_FORMAT,
            FaultKind::IllegalArgument { .. } => key::ILLEGAL_ARGUMENT,
            FaultKind::ResourceClosed { .. } => key::RESOURCE_CLOSED,
            FaultKind::UnexpectedEof { .. } => key::UNEXPECTED_EOF,
            FaultKind::Security { .. } => key::SECURITY,
            FaultKind::StringIndexOutOfBounds { .. } => key::STRING_INDEX_OUT_OF_BOUNDS,
            FaultKind::IndexOutOfBounds { .. } => key::INDEX_OUT_OF_BOUNDS,
            FaultKind::FileNotFound { .. } => key::FILE_NOT_FOUND,
            FaultKind::FileSystem { .. } => key::FILE_SYSTEM,
            FaultKind::IllegalState { .. } => key::ILLEGAL_STATE,
            FaultKind::LockObtainFailed { .. } => key::LOCK_OBTAIN_FAILED,
            FaultKind::Interrupted { .. } => key::INTERRUPTED,
            FaultKind::Io { .. } => key::IO,
            FaultKind::RejectedExecution { .. } => key::REJECTED_EXECUTION,
            FaultKind::UncheckedIo { .. } => key::UNCHECKED_IO,
        }
    }

    /// The nested fault this one was caused by, if the kind carries one.
    pub fn cause(&self) -> Option<&RemoteFault> {
        match self {
            FaultKind::Internal { cause, .. }
            | FaultKind::DataCorruption { cause, .. }
            | FaultKind::IllegalArgument { cause, .. }
            | FaultKind::ResourceClosed { cause, .. }
            | FaultKind::Security { cause, .. }
            | FaultKind::IllegalState { cause, .. }
            | FaultKind::LockObtainFailed { cause, .. }
            | FaultKind::Io { cause, .. }
            | FaultKind::UncheckedIo { cause, .. } => cause.as_deref(),
            _ => None,
        }
    }

    /// The human-readable message, where the kind carries one.
    pub fn message(&self) -> Option<&str> {
        match self {
            FaultKind::Internal { message, .. }
            | FaultKind::DataCorruption { message, .. }
            | FaultKind::MissingValue { message }
            | FaultKind::NumberFormat { message }
            | FaultKind::IllegalArgument { message, .. }
            | FaultKind::ResourceClosed { message, .. }
            | FaultKind::UnexpectedEof { message }
            | FaultKind::Security { message, .. }
            | FaultKind::StringIndexOutOfBounds { message }
            | FaultKind::IndexOutOfBounds { message }
            | FaultKind::FileNotFound { message }
            | FaultKind::IllegalState { message, .. }
            | FaultKind::LockObtainFailed { message, .. }
            | FaultKind::Interrupted { message }
            | FaultKind::Io { message, .. }
            | FaultKind::RejectedExecution { message, .. }
            | FaultKind::UncheckedIo { message, .. } => message.as_deref(),
            FaultKind::FileSystem { reason, .. } => reason.as_deref(),
            FaultKind::FormatTooNew { resource, .. }
            | FaultKind::FormatTooOld { resource, .. } => resource.as_deref(),
        }
    }
}

/// A failure raised on another node, decoded from the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFault {
    pub kind: FaultKind,
    pub trace: Vec<StackFrame>,
}

impl RemoteFault {
    pub fn new(kind: FaultKind) -> Self {
        Self {
            kind,
            trace: Vec::new(),
        }
    }

    pub fn with_trace(kind: FaultKind, trace: Vec<StackFrame>) -> Self {
        Self { kind, trace }
    }

    /// Decode a presence-flagged fault, following the cause chain to its
    /// root.
    pub fn read_optional(input: &mut StreamInput<'_>) -> Result<Option<RemoteFault>> {
        if !input.read_bool()? {
            return Ok(None);
        }

        let wire_key = input.read_vint()?;
        let kind = match wire_key {
            key::INTERNAL => FaultKind::Internal {
                code: input.read_vint()?,
                message: input.read_optional_string()?,
                cause: read_cause(input)?,
            },
            key::DATA_CORRUPTION => FaultKind::DataCorruption {
                message: input.read_optional_string()?,
                resource: input.read_optional_string()?,
                cause: read_cause(input)?,
            },
            key::FORMAT_TOO_NEW => FaultKind::FormatTooNew {
                resource: input.read_optional_string()?,
                versions: read_format_versions(input)?,
            },
            key::FORMAT_TOO_OLD => {
                let resource = input.read_optional_string()?;
                if input.read_bool()? {
                    FaultKind::FormatTooOld {
                        resource,
                        versions: Some(read_format_versions(input)?),
                        version_label: None,
                    }
                } else {
                    FaultKind::FormatTooOld {
                        resource,
                        versions: None,
                        version_label: input.read_optional_string()?,
                    }
                }
            }
            key::MISSING_VALUE => FaultKind::MissingValue {
                message: input.read_optional_string()?,
            },
            key::NUMBER_FORMAT => FaultKind::NumberFormat {
                message: input.read_optional_string()?,
            },
            key::ILLEGAL_ARGUMENT => FaultKind::IllegalArgument {
                message: input.read_optional_string()?,
                cause: read_cause(input)?,
            },
            key::RESOURCE_CLOSED => FaultKind::ResourceClosed {
                message: input.read_optional_string()?,
                cause: read_cause(input)?,
            },
            key::UNEXPECTED_EOF => FaultKind::UnexpectedEof {
                message: input.read_optional_string()?,
            },
            key::SECURITY => FaultKind::Security {
                message: input.read_optional_string()?,
                cause: read_cause(input)?,
            },
            key::STRING_INDEX_OUT_OF_BOUNDS => FaultKind::StringIndexOutOfBounds {
                message: input.read_optional_string()?,
            },
            key::INDEX_OUT_OF_BOUNDS => FaultKind::IndexOutOfBounds {
                message: input.read_optional_string()?,
            },
            key::FILE_NOT_FOUND => FaultKind::FileNotFound {
                message: input.read_optional_string()?,
            },
            key::FILE_SYSTEM => {
                let sub_kind = input.read_vint()?;
                let sub_kind = FileSystemKind::from_wire(sub_kind)
                    .ok_or(WireError::UnknownExceptionKind(sub_kind))?;
                let file = input.read_optional_string()?;
                let other = input.read_optional_string()?;
                let reason = input.read_optional_string()?;
                // Deprecated slot: a message composed from the three fields
                // above. Read and discarded.
                input.read_optional_string()?;
                FaultKind::FileSystem {
                    sub_kind,
                    file,
                    other,
                    reason,
                }
            }
            key::ILLEGAL_STATE => FaultKind::IllegalState {
                message: input.read_optional_string()?,
                cause: read_cause(input)?,
            },
            key::LOCK_OBTAIN_FAILED => FaultKind::LockObtainFailed {
                message: input.read_optional_string()?,
                cause: read_cause(input)?,
            },
            key::INTERRUPTED => FaultKind::Interrupted {
                message: input.read_optional_string()?,
            },
            key::IO => FaultKind::Io {
                message: input.read_optional_string()?,
                cause: read_cause(input)?,
            },
            key::REJECTED_EXECUTION => FaultKind::RejectedExecution {
                message: input.read_optional_string()?,
                executor_shutdown: input.read_bool()?,
            },
            key::UNCHECKED_IO => FaultKind::UncheckedIo {
                message: input.read_optional_string()?,
                cause: read_cause(input)?,
            },
            unknown => return Err(WireError::UnknownExceptionKind(unknown)),
        };

        let trace = read_trace(input)?;
        Ok(Some(RemoteFault { kind, trace }))
    }

    /// Encode a presence-flagged fault, causes included.
    pub fn write_optional(fault: Option<&RemoteFault>, out: &mut StreamOutput<'_>) -> Result<()> {
        let Some(fault) = fault else {
            return out.write_bool(false);
        };
        out.write_bool(true)?;
        out.write_vint(fault.kind.wire_key())?;

        match &fault.kind {
            FaultKind::Internal {
                code,
                message,
                cause,
            } => {
                out.write_vint(*code)?;
                out.write_optional_string(message.as_deref())?;
                write_cause(cause, out)?;
            }
            FaultKind::DataCorruption {
                message,
                resource,
                cause,
            } => {
                out.write_optional_string(message.as_deref())?;
                out.write_optional_string(resource.as_deref())?;
                write_cause(cause, out)?;
            }
            FaultKind::FormatTooNew { resource, versions } => {
                out.write_optional_string(resource.as_deref())?;
                write_format_versions(*versions, out)?;
            }
            FaultKind::FormatTooOld {
                resource,
                versions,
                version_label,
            } => {
                out.write_optional_string(resource.as_deref())?;
                match versions {
                    Some(versions) => {
                        out.write_bool(true)?;
                        write_format_versions(*versions, out)?;
                    }
                    None => {
                        out.write_bool(false)?;
                        out.write_optional_string(version_label.as_deref())?;
                    }
                }
            }
            FaultKind::MissingValue { message }
            | FaultKind::NumberFormat { message }
            | FaultKind::UnexpectedEof { message }
            | FaultKind::StringIndexOutOfBounds { message }
            | FaultKind::IndexOutOfBounds { message }
            | FaultKind::FileNotFound { message }
            | FaultKind::Interrupted { message } => {
                out.write_optional_string(message.as_deref())?;
            }
            FaultKind::IllegalArgument { message, cause }
            | FaultKind::ResourceClosed { message, cause }
            | FaultKind::Security { message, cause }
            | FaultKind::IllegalState { message, cause }
            | FaultKind::LockObtainFailed { message, cause }
            | FaultKind::Io { message, cause }
            | FaultKind::UncheckedIo { message, cause } => {
                out.write_optional_string(message.as_deref())?;
                write_cause(cause, out)?;
            }
            FaultKind::FileSystem {
                sub_kind,
                file,
                other,
                reason,
            } => {
                out.write_vint(sub_kind.to_wire())?;
                out.write_optional_string(file.as_deref())?;
                out.write_optional_string(other.as_deref())?;
                out.write_optional_string(reason.as_deref())?;
                // Deprecated composed-message slot.
                out.write_optional_string(None)?;
            }
            FaultKind::RejectedExecution {
                message,
                executor_shutdown,
            } => {
                out.write_optional_string(message.as_deref())?;
                out.write_bool(*executor_shutdown)?;
            }
        }

        write_trace(&fault.trace, out)
    }
}

impl fmt::Display for RemoteFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind.message() {
            Some(message) => write!(f, "remote fault: {message}"),
            None => write!(f, "remote fault: kind {}", self.kind.wire_key()),
        }
    }
}

impl std::error::Error for RemoteFault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.cause().map(|cause| cause as _)
    }
}

fn read_cause(input: &mut StreamInput<'_>) -> Result<Cause> {
    Ok(RemoteFault::read_optional(input)?.map(Box::new))
}

fn write_cause(cause: &Cause, out: &mut StreamOutput<'_>) -> Result<()> {
    RemoteFault::write_optional(cause.as_deref(), out)
}

fn read_format_versions(input: &mut StreamInput<'_>) -> Result<FormatVersions> {
    Ok(FormatVersions {
        found: input.read_int()?,
        min: input.read_int()?,
        max: input.read_int()?,
    })
}

fn write_format_versions(versions: FormatVersions, out: &mut StreamOutput<'_>) -> Result<()> {
    out.write_int(versions.found)?;
    out.write_int(versions.min)?;
    out.write_int(versions.max)
}

fn read_trace(input: &mut StreamInput<'_>) -> Result<Vec<StackFrame>> {
    input.read_list(|input| {
        Ok(StackFrame {
            class_name: input.read_string()?,
            method: input.read_string()?,
            file: input.read_optional_string()?,
            line: input.read_vint()?,
        })
    })
}

fn write_trace(trace: &[StackFrame], out: &mut StreamOutput<'_>) -> Result<()> {
    out.write_collection(trace, |out, frame| {
        out.write_string(&frame.class_name)?;
        out.write_string(&frame.method)?;
        out.write_optional_string(frame.file.as_deref())?;
        out.write_vint(frame.line)
    })
}
