/// Errors that can occur while decoding or encoding wire data.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// A declared length was negative.
    #[error("negative length ({0})")]
    NegativeSize(i64),

    /// A declared length exceeds the configured maximum.
    #[error("declared length {declared} exceeds maximum {max}")]
    SizeTooLarge { declared: usize, max: usize },

    /// A declared length or read would run past the end of the channel.
    #[error("truncated stream (need {needed} bytes, {remaining} remain)")]
    TruncatedStream { needed: usize, remaining: usize },

    /// A variable-length int still had its continuation bit set on the fifth byte.
    #[error("malformed vint (continuation bit set on fifth byte 0x{0:02x})")]
    MalformedVarint(u8),

    /// The tenth byte of a variable-length long was not 0 or 1.
    #[error("malformed vlong (tenth byte 0x{0:02x}, must be 0 or 1)")]
    MalformedVarlong(u8),

    /// A zig-zag varlong consumed more than 63 bits of shift without terminating.
    #[error("zig-zag varlong is too long")]
    VarlongTooLong,

    /// A string payload contained an illegal lead byte.
    #[error("invalid string encoding (unexpected byte 0x{0:02x})")]
    InvalidStringEncoding(u8),

    /// A boolean byte was neither 0 nor 1 (nor 2 in optional position).
    #[error("invalid boolean encoding (unexpected byte 0x{0:02x})")]
    InvalidBooleanEncoding(u8),

    /// A generic value carried a tag outside the known table.
    #[error("unknown value tag [{0}]")]
    UnknownValueTag(i8),

    /// A named-object discriminator had no registered factory.
    #[error("unknown named type [{0}]")]
    UnknownNamedType(String),

    /// An exception discriminator or sub-kind was outside the known table.
    #[error("unknown exception kind [{0}]")]
    UnknownExceptionKind(u32),

    /// An enum ordinal was outside the declared range.
    #[error("unknown {enum_name} ordinal [{ordinal}]")]
    UnknownEnumOrdinal {
        enum_name: &'static str,
        ordinal: u32,
    },

    /// A decoder produced no value where the wire declared one present.
    #[error("decoder [{0}] produced no value where presence was declared")]
    ContractViolation(String),

    /// A retired wire format that must no longer be decoded.
    #[error("{0} is no longer supported on the wire")]
    RetiredFormat(&'static str),

    /// An I/O error from the underlying channel.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WireError>;
