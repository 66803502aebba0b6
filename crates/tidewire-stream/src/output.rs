use std::collections::HashMap;
use std::io::{ErrorKind, Write};

use crate::bounds::DEFAULT_MAX_DECLARED_LENGTH;
use crate::error::{Result, WireError};
use crate::input::OrdinalEnum;
use crate::version::Version;

/// A sequential encoding channel over an ordered byte sink.
///
/// The exact inverse of [`StreamInput`](crate::StreamInput): every
/// `write_*` here produces bytes the matching `read_*` consumes. Carries the
/// protocol version negotiated by the transport layer so version-gated
/// formats pick the representation the far side can read.
pub struct StreamOutput<'a> {
    dst: Box<dyn Write + 'a>,
    version: Version,
}

impl<'a> StreamOutput<'a> {
    /// Create a channel over a byte sink.
    pub fn new(dst: impl Write + 'a) -> Self {
        Self {
            dst: Box::new(dst),
            version: Version::CURRENT,
        }
    }

    /// The version of the node on the other side of this channel.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Set the version negotiated for this channel.
    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    /// Write raw bytes to the channel.
    pub fn write_bytes(&mut self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            match self.dst.write(buf) {
                Ok(0) => {
                    return Err(WireError::Io(std::io::Error::new(
                        ErrorKind::WriteZero,
                        "channel closed",
                    )))
                }
                Ok(written) => buf = &buf[written..],
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(WireError::Io(err)),
            }
        }
        Ok(())
    }

    /// Flush the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.dst.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(WireError::Io(err)),
            }
        }
    }

    /// Write a single byte.
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.write_bytes(&[byte])
    }

    /// Write an `i16` as two big-endian bytes.
    pub fn write_short(&mut self, value: i16) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Write an `i32` as four big-endian bytes.
    pub fn write_int(&mut self, value: i32) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Write an `i64` as eight big-endian bytes.
    pub fn write_long(&mut self, value: i64) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Write an `f32` as the big-endian bits of its `i32` pattern.
    pub fn write_float(&mut self, value: f32) -> Result<()> {
        self.write_int(value.to_bits() as i32)
    }

    /// Write an `f64` as the big-endian bits of its `i64` pattern.
    pub fn write_double(&mut self, value: f64) -> Result<()> {
        self.write_long(value.to_bits() as i64)
    }

    /// Write a `u32` in variable-length format, one to five bytes.
    pub fn write_vint(&mut self, mut value: u32) -> Result<()> {
        let mut encoded = [0u8; 5];
        let mut len = 0;
        while value & !0x7F != 0 {
            encoded[len] = (value as u8 & 0x7F) | 0x80;
            value >>= 7;
            len += 1;
        }
        encoded[len] = value as u8;
        self.write_bytes(&encoded[..=len])
    }

    /// Write a `u64` in variable-length format, one to ten bytes.
    pub fn write_vlong(&mut self, mut value: u64) -> Result<()> {
        let mut encoded = [0u8; 10];
        let mut len = 0;
        while value & !0x7F != 0 {
            encoded[len] = (value as u8 & 0x7F) | 0x80;
            value >>= 7;
            len += 1;
        }
        encoded[len] = value as u8;
        self.write_bytes(&encoded[..=len])
    }

    /// Write an `i64` in zig-zag variable-length format.
    pub fn write_zlong(&mut self, value: i64) -> Result<()> {
        self.write_vlong(zigzag_encode(value))
    }

    /// Write a boolean as one byte: 0 for false, 1 for true.
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_byte(u8::from(value))
    }

    /// Write a tri-state boolean where the byte 2 means absent.
    pub fn write_optional_bool(&mut self, value: Option<bool>) -> Result<()> {
        match value {
            Some(value) => self.write_bool(value),
            None => self.write_byte(2),
        }
    }

    /// Write an element count as a vint, rejecting counts a decoder could
    /// never admit.
    pub fn write_declared_len(&mut self, len: usize) -> Result<()> {
        if len > i32::MAX as usize {
            return Err(WireError::SizeTooLarge {
                declared: len,
                max: DEFAULT_MAX_DECLARED_LENGTH,
            });
        }
        self.write_vint(len as u32)
    }

    /// Write a length-prefixed string.
    ///
    /// The prefix counts UTF-16 code units; the payload is modified UTF-8
    /// with one, two or three bytes per unit (supplementary code points as
    /// surrogate pairs).
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        let mut char_count = 0usize;
        let mut bytes = Vec::with_capacity(value.len() + value.len() / 2);
        for unit in value.encode_utf16() {
            char_count += 1;
            if unit <= 0x7F {
                bytes.push(unit as u8);
            } else if unit <= 0x7FF {
                bytes.push(0xC0 | (unit >> 6) as u8);
                bytes.push(0x80 | (unit & 0x3F) as u8);
            } else {
                bytes.push(0xE0 | (unit >> 12) as u8);
                bytes.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                bytes.push(0x80 | (unit & 0x3F) as u8);
            }
        }
        self.write_declared_len(char_count)?;
        self.write_bytes(&bytes)
    }

    /// Write a length-prefixed byte array.
    pub fn write_byte_array(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_declared_len(bytes.len())?;
        self.write_bytes(bytes)
    }

    /// Write a length-prefixed byte reference.
    pub fn write_bytes_reference(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_byte_array(bytes)
    }

    /// Write an optional byte reference with the `len + 1` scheme, where a
    /// zero prefix means absent.
    pub fn write_optional_bytes_reference(&mut self, bytes: Option<&[u8]>) -> Result<()> {
        match bytes {
            Some(bytes) => {
                if bytes.len() >= i32::MAX as usize {
                    return Err(WireError::SizeTooLarge {
                        declared: bytes.len(),
                        max: DEFAULT_MAX_DECLARED_LENGTH,
                    });
                }
                self.write_vint(bytes.len() as u32 + 1)?;
                self.write_bytes(bytes)
            }
            None => self.write_vint(0),
        }
    }

    /// Write a count-prefixed sequence of elements.
    pub fn write_collection<T>(
        &mut self,
        items: &[T],
        mut write: impl FnMut(&mut Self, &T) -> Result<()>,
    ) -> Result<()> {
        self.write_declared_len(items.len())?;
        for item in items {
            write(self, item)?;
        }
        Ok(())
    }

    /// Write a presence flag, then the array if one is given.
    pub fn write_optional_array<T>(
        &mut self,
        items: Option<&[T]>,
        write: impl FnMut(&mut Self, &T) -> Result<()>,
    ) -> Result<()> {
        match items {
            Some(items) => {
                self.write_bool(true)?;
                self.write_collection(items, write)
            }
            None => self.write_bool(false),
        }
    }

    /// Write a count-prefixed map of key/value pairs.
    pub fn write_map<K, V>(
        &mut self,
        map: &HashMap<K, V>,
        mut write_key: impl FnMut(&mut Self, &K) -> Result<()>,
        mut write_value: impl FnMut(&mut Self, &V) -> Result<()>,
    ) -> Result<()> {
        self.write_declared_len(map.len())?;
        for (key, value) in map {
            write_key(self, key)?;
            write_value(self, value)?;
        }
        Ok(())
    }

    /// Write a count-prefixed array of strings.
    pub fn write_string_array(&mut self, values: &[String]) -> Result<()> {
        self.write_collection(values, |out, v| out.write_string(v))
    }

    /// Write a presence flag, then a string array if one is given.
    pub fn write_optional_string_array(&mut self, values: Option<&[String]>) -> Result<()> {
        match values {
            Some(values) => {
                self.write_bool(true)?;
                self.write_string_array(values)
            }
            None => self.write_bool(false),
        }
    }

    /// Write a count-prefixed array of fixed-width `i32`s.
    pub fn write_int_array(&mut self, values: &[i32]) -> Result<()> {
        self.write_collection(values, |out, v| out.write_int(*v))
    }

    /// Write a count-prefixed array of vint-encoded values.
    pub fn write_vint_array(&mut self, values: &[u32]) -> Result<()> {
        self.write_collection(values, |out, v| out.write_vint(*v))
    }

    /// Write a count-prefixed array of fixed-width `i64`s.
    pub fn write_long_array(&mut self, values: &[i64]) -> Result<()> {
        self.write_collection(values, |out, v| out.write_long(*v))
    }

    /// Write a count-prefixed array of vlong-encoded values.
    pub fn write_vlong_array(&mut self, values: &[u64]) -> Result<()> {
        self.write_collection(values, |out, v| out.write_vlong(*v))
    }

    /// Write a count-prefixed array of `f32`s.
    pub fn write_float_array(&mut self, values: &[f32]) -> Result<()> {
        self.write_collection(values, |out, v| out.write_float(*v))
    }

    /// Write a count-prefixed array of `f64`s.
    pub fn write_double_array(&mut self, values: &[f64]) -> Result<()> {
        self.write_collection(values, |out, v| out.write_double(*v))
    }

    /// Write a presence flag, then a string if one is given.
    pub fn write_optional_string(&mut self, value: Option<&str>) -> Result<()> {
        match value {
            Some(value) => {
                self.write_bool(true)?;
                self.write_string(value)
            }
            None => self.write_bool(false),
        }
    }

    /// Write a presence flag, then an `i64` if one is given.
    pub fn write_optional_long(&mut self, value: Option<i64>) -> Result<()> {
        match value {
            Some(value) => {
                self.write_bool(true)?;
                self.write_long(value)
            }
            None => self.write_bool(false),
        }
    }

    /// Write a presence flag, then an `f32` if one is given.
    pub fn write_optional_float(&mut self, value: Option<f32>) -> Result<()> {
        match value {
            Some(value) => {
                self.write_bool(true)?;
                self.write_float(value)
            }
            None => self.write_bool(false),
        }
    }

    /// Write a presence flag, then an `f64` if one is given.
    pub fn write_optional_double(&mut self, value: Option<f64>) -> Result<()> {
        match value {
            Some(value) => {
                self.write_bool(true)?;
                self.write_double(value)
            }
            None => self.write_bool(false),
        }
    }

    /// Write a presence flag, then a vint if one is given.
    pub fn write_optional_vint(&mut self, value: Option<u32>) -> Result<()> {
        match value {
            Some(value) => {
                self.write_bool(true)?;
                self.write_vint(value)
            }
            None => self.write_bool(false),
        }
    }

    /// Write an enum as its vint ordinal.
    pub fn write_enum<E: OrdinalEnum>(&mut self, value: &E) -> Result<()> {
        self.write_vint(value.ordinal())
    }
}

pub(crate) fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn write_retries_through_interrupted_and_would_block() {
        struct FlakyWriter {
            failures_left: u8,
            data: Vec<u8>,
        }

        impl Write for FlakyWriter {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                if self.failures_left > 0 {
                    self.failures_left -= 1;
                    let kind = if self.failures_left % 2 == 0 {
                        ErrorKind::Interrupted
                    } else {
                        ErrorKind::WouldBlock
                    };
                    return Err(std::io::Error::from(kind));
                }
                self.data.extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut writer = FlakyWriter {
            failures_left: 3,
            data: Vec::new(),
        };
        {
            let mut out = StreamOutput::new(&mut writer);
            out.write_string("retry").unwrap();
            out.flush().unwrap();
        }
        assert!(!writer.data.is_empty());
    }

    #[test]
    fn closed_sink_surfaces_as_io_error() {
        struct ClosedWriter;

        impl Write for ClosedWriter {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Ok(0)
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut out = StreamOutput::new(ClosedWriter);
        let err = out.write_byte(1).unwrap_err();
        assert!(matches!(err, WireError::Io(_)));
    }

    #[test]
    fn oversized_declared_len_is_rejected() {
        let mut wire = Vec::new();
        let mut out = StreamOutput::new(&mut wire);
        let err = out.write_declared_len(i32::MAX as usize + 1).unwrap_err();
        assert!(matches!(err, WireError::SizeTooLarge { .. }));
    }

    #[test]
    fn zigzag_transform_matches_definition() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        assert_eq!(zigzag_encode(i64::MAX), u64::MAX - 1);
        assert_eq!(zigzag_encode(i64::MIN), u64::MAX);
    }
}
