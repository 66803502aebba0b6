//! Pre-allocation admission check for declared lengths.
//!
//! Every length-prefixed structure (strings, byte arrays, lists, sets, maps,
//! named-object lists) runs its declared element count through [`admit`]
//! before a single byte of payload is read or a single element is allocated.
//! A corrupted or hostile length field must fail here, not in the allocator.

use crate::error::{Result, WireError};

/// Default maximum declared length: the platform's maximum array allocation.
pub const DEFAULT_MAX_DECLARED_LENGTH: usize = i32::MAX as usize - 8;

/// Admit a declared length before it is used to size an allocation.
///
/// Rejects negative lengths, lengths over `max`, and — when the channel knows
/// how many bytes remain — lengths that cannot possibly be satisfied by the
/// remaining bytes (each element needs at least one byte).
pub fn admit(declared: i64, remaining: Option<usize>, max: usize) -> Result<usize> {
    if declared < 0 {
        return Err(WireError::NegativeSize(declared));
    }
    let declared = declared as usize;
    if declared > max {
        return Err(WireError::SizeTooLarge { declared, max });
    }
    if let Some(remaining) = remaining {
        if declared > remaining {
            return Err(WireError::TruncatedStream {
                needed: declared,
                remaining,
            });
        }
    }
    Ok(declared)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_in_range_lengths() {
        assert_eq!(admit(0, None, DEFAULT_MAX_DECLARED_LENGTH).unwrap(), 0);
        assert_eq!(admit(42, Some(42), DEFAULT_MAX_DECLARED_LENGTH).unwrap(), 42);
        assert_eq!(
            admit(1024, None, DEFAULT_MAX_DECLARED_LENGTH).unwrap(),
            1024
        );
    }

    #[test]
    fn rejects_negative_length() {
        let err = admit(-1, None, DEFAULT_MAX_DECLARED_LENGTH).unwrap_err();
        assert!(matches!(err, WireError::NegativeSize(-1)));
    }

    #[test]
    fn rejects_length_over_cap() {
        let err = admit(17, None, 16).unwrap_err();
        assert!(matches!(
            err,
            WireError::SizeTooLarge {
                declared: 17,
                max: 16
            }
        ));
    }

    #[test]
    fn rejects_length_past_remaining_bytes() {
        let err = admit(100, Some(3), DEFAULT_MAX_DECLARED_LENGTH).unwrap_err();
        assert!(matches!(
            err,
            WireError::TruncatedStream {
                needed: 100,
                remaining: 3
            }
        ));
    }

    #[test]
    fn unknown_remaining_skips_truncation_check() {
        assert!(admit(1 << 20, None, DEFAULT_MAX_DECLARED_LENGTH).is_ok());
    }
}
