use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::io::{ErrorKind, Read};

use bytes::Bytes;

use crate::bounds::{self, DEFAULT_MAX_DECLARED_LENGTH};
use crate::error::{Result, WireError};
use crate::version::Version;

/// Maximum char-count decoded through the per-channel scratch buffer.
pub(crate) const SMALL_STRING_LIMIT: usize = 1024;

/// Refill chunk for string decoding. A performance device only: decoded
/// output is identical for any chunk size.
const STRING_CHUNK: usize = 1024;

/// Configuration for a byte channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Maximum declared length admitted before allocation.
    pub max_declared_length: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_declared_length: DEFAULT_MAX_DECLARED_LENGTH,
        }
    }
}

/// An enum that travels on the wire as its ordinal.
pub trait OrdinalEnum: Sized {
    /// Type name used in error reports.
    const NAME: &'static str;

    /// Map an ordinal back to a variant, or `None` if out of range.
    fn from_ordinal(ordinal: u32) -> Option<Self>;

    /// The wire ordinal of this variant.
    fn ordinal(&self) -> u32;
}

/// A sequential decoding channel over an ordered byte source.
///
/// The cursor only advances. The channel carries the protocol version
/// negotiated by the transport layer and, when the source is bounded (a
/// slice, a persisted file of known size), the number of bytes remaining —
/// which lets the bounds guard reject impossible declared lengths before
/// allocating. One decode operation may be in flight at a time; independent
/// channels decode fully in parallel.
pub struct StreamInput<'a> {
    src: Box<dyn Read + 'a>,
    version: Version,
    remaining: Option<usize>,
    config: StreamConfig,
    str_bytes: Vec<u8>,
    str_units: Vec<u16>,
}

impl<'a> StreamInput<'a> {
    /// Create a channel over a source of unknown length (e.g. a socket).
    pub fn new(src: impl Read + 'a) -> Self {
        Self::build(Box::new(src), None)
    }

    /// Create a channel over a source with a known number of bytes.
    pub fn with_remaining(src: impl Read + 'a, remaining: usize) -> Self {
        Self::build(Box::new(src), Some(remaining))
    }

    /// Create a channel over an in-memory byte slice.
    pub fn from_slice(bytes: &'a [u8]) -> Self {
        let remaining = bytes.len();
        Self::build(Box::new(bytes), Some(remaining))
    }

    fn build(src: Box<dyn Read + 'a>, remaining: Option<usize>) -> Self {
        Self {
            src,
            version: Version::CURRENT,
            remaining,
            config: StreamConfig::default(),
            str_bytes: Vec::new(),
            str_units: Vec::new(),
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

    /// Best-effort count of bytes left in the channel, if known.
    pub fn available(&self) -> Option<usize> {
        self.remaining
    }

    /// Current channel configuration.
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Update the maximum declared length admitted by the bounds guard.
    pub fn set_max_declared_length(&mut self, max_declared_length: usize) {
        self.config.max_declared_length = max_declared_length;
    }

    /// Fill `buf` from the channel, failing with `TruncatedStream` if the
    /// source ends first.
    pub fn read_bytes_into(&mut self, buf: &mut [u8]) -> Result<()> {
        if let Some(remaining) = self.remaining {
            if buf.len() > remaining {
                return Err(WireError::TruncatedStream {
                    needed: buf.len(),
                    remaining,
                });
            }
        }
        self.src.read_exact(buf).map_err(|err| {
            if err.kind() == ErrorKind::UnexpectedEof {
                WireError::TruncatedStream {
                    needed: buf.len(),
                    remaining: self.remaining.unwrap_or(0),
                }
            } else {
                WireError::Io(err)
            }
        })?;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= buf.len();
        }
        Ok(())
    }

    /// Read a single byte.
    pub fn read_byte(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.read_bytes_into(&mut byte)?;
        Ok(byte[0])
    }

    /// Read two big-endian bytes as an `i16`.
    pub fn read_short(&mut self) -> Result<i16> {
        let mut bytes = [0u8; 2];
        self.read_bytes_into(&mut bytes)?;
        Ok(i16::from_be_bytes(bytes))
    }

    /// Read four big-endian bytes as an `i32`.
    pub fn read_int(&mut self) -> Result<i32> {
        let mut bytes = [0u8; 4];
        self.read_bytes_into(&mut bytes)?;
        Ok(i32::from_be_bytes(bytes))
    }

    /// Read eight big-endian bytes as an `i64`.
    pub fn read_long(&mut self) -> Result<i64> {
        let mut bytes = [0u8; 8];
        self.read_bytes_into(&mut bytes)?;
        Ok(i64::from_be_bytes(bytes))
    }

    /// Read an `f32` stored as the big-endian bits of its `i32` pattern.
    pub fn read_float(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_int()? as u32))
    }

    /// Read an `f64` stored as the big-endian bits of its `i64` pattern.
    pub fn read_double(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_long()? as u64))
    }

    /// Read an `u32` stored in variable-length format, one to five bytes.
    ///
    /// Smaller values take fewer bytes. Values with the top bit set always
    /// take all five bytes, so callers holding signed numbers should prefer
    /// [`read_int`](Self::read_int) or [`read_zlong`](Self::read_zlong).
    pub fn read_vint(&mut self) -> Result<u32> {
        let mut value = 0u32;
        for shift in [0u32, 7, 14, 21] {
            let byte = self.read_byte()?;
            value |= u32::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        let byte = self.read_byte()?;
        if byte & 0x80 != 0 {
            return Err(WireError::MalformedVarint(byte));
        }
        Ok(value | (u32::from(byte & 0x7F) << 28))
    }

    /// Read a `u64` stored in variable-length format, one to ten bytes.
    ///
    /// The tenth byte carries only the sign bit and must be 0 or 1.
    pub fn read_vlong(&mut self) -> Result<u64> {
        let mut value = 0u64;
        for shift in (0u32..63).step_by(7) {
            let byte = self.read_byte()?;
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        let byte = self.read_byte()?;
        if byte > 1 {
            return Err(WireError::MalformedVarlong(byte));
        }
        Ok(value | (u64::from(byte) << 63))
    }

    /// Read a zig-zag encoded `i64`.
    pub fn read_zlong(&mut self) -> Result<i64> {
        let mut accumulator = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_byte()?;
            if byte & 0x80 == 0 {
                accumulator |= u64::from(byte) << shift;
                break;
            }
            accumulator |= u64::from(byte & 0x7F) << shift;
            shift += 7;
            if shift > 63 {
                return Err(WireError::VarlongTooLong);
            }
        }
        Ok(zigzag_decode(accumulator))
    }

    /// Read a boolean byte: 0 is false, 1 is true, anything else is invalid.
    pub fn read_bool(&mut self) -> Result<bool> {
        bool_from_byte(self.read_byte()?)
    }

    /// Read a tri-state boolean byte where 2 means absent.
    pub fn read_optional_bool(&mut self) -> Result<Option<bool>> {
        let byte = self.read_byte()?;
        if byte == 2 {
            return Ok(None);
        }
        bool_from_byte(byte).map(Some)
    }

    /// Read a vint element count and run it through the bounds guard.
    ///
    /// Must precede every allocation sized by wire data: a single corrupted
    /// length byte must fail here rather than in the allocator.
    pub fn read_array_size(&mut self) -> Result<usize> {
        let declared = self.read_vint()? as i32;
        bounds::admit(
            i64::from(declared),
            self.remaining,
            self.config.max_declared_length,
        )
    }

    /// Check that `needed` bytes can still be read, when the channel knows.
    pub fn ensure_can_read(&self, needed: usize) -> Result<()> {
        if let Some(remaining) = self.remaining {
            if needed > remaining {
                return Err(WireError::TruncatedStream { needed, remaining });
            }
        }
        Ok(())
    }

    /// Read a length-prefixed string.
    ///
    /// The prefix counts UTF-16 code units, not bytes; the payload is a
    /// modified UTF-8 with one, two or three bytes per unit. Supplementary
    /// code points travel as surrogate pairs of three-byte units.
    pub fn read_string(&mut self) -> Result<String> {
        let char_count = self.read_array_size()?;
        let small = char_count <= SMALL_STRING_LIMIT;
        let mut units = if small {
            let mut units = std::mem::take(&mut self.str_units);
            units.clear();
            units
        } else {
            Vec::with_capacity(char_count)
        };
        let mut buf = std::mem::take(&mut self.str_bytes);
        if buf.len() < STRING_CHUNK {
            buf.resize(STRING_CHUNK, 0);
        }

        let filled = self.decode_units(char_count, &mut units, &mut buf);
        self.str_bytes = buf;
        let decoded = filled.map(|()| String::from_utf16_lossy(&units));
        if small {
            self.str_units = units;
        }
        decoded
    }

    fn decode_units(
        &mut self,
        char_count: usize,
        units: &mut Vec<u16>,
        buf: &mut [u8],
    ) -> Result<()> {
        let mut carry = 0usize; // bytes held over from an incomplete sequence
        let mut missing = 0usize; // bytes still owed for that sequence
        while units.len() < char_count {
            let chars_left = char_count - units.len();
            // Every remaining char needs at least one byte; a partial
            // sequence still owes `missing` bytes for the char it started.
            let min_remaining = if missing > 0 {
                missing + chars_left - 1
            } else {
                chars_left
            };
            let to_read = min_remaining.min(buf.len() - carry);
            self.read_bytes_into(&mut buf[carry..carry + to_read])?;
            let filled = carry + to_read;
            carry = 0;
            missing = 0;

            let mut pos = 0;
            while pos < filled {
                let lead = buf[pos];
                let need = match lead >> 4 {
                    0..=7 => 1,
                    12 | 13 => 2,
                    14 => 3,
                    _ => return Err(WireError::InvalidStringEncoding(lead)),
                };
                if pos + need > filled {
                    // Sequence spans the refill boundary: keep its bytes at
                    // the front and finish it on the next iteration.
                    carry = filled - pos;
                    missing = need - carry;
                    buf.copy_within(pos..filled, 0);
                    break;
                }
                let unit = match need {
                    1 => u16::from(lead),
                    2 => (u16::from(lead & 0x1F) << 6) | u16::from(buf[pos + 1] & 0x3F),
                    _ => {
                        (u16::from(lead & 0x0F) << 12)
                            | (u16::from(buf[pos + 1] & 0x3F) << 6)
                            | u16::from(buf[pos + 2] & 0x3F)
                    }
                };
                units.push(unit);
                pos += need;
            }
        }
        Ok(())
    }

    /// Read a length-prefixed byte array.
    pub fn read_byte_array(&mut self) -> Result<Vec<u8>> {
        let len = self.read_array_size()?;
        let mut bytes = vec![0u8; len];
        self.read_bytes_into(&mut bytes)?;
        Ok(bytes)
    }

    /// Read a length-prefixed byte reference.
    pub fn read_bytes_reference(&mut self) -> Result<Bytes> {
        Ok(Bytes::from(self.read_byte_array()?))
    }

    /// Read an optional byte reference written with the `len + 1` scheme,
    /// where a zero prefix means absent.
    pub fn read_optional_bytes_reference(&mut self) -> Result<Option<Bytes>> {
        let declared = i64::from(self.read_vint()? as i32) - 1;
        if declared < 0 {
            return Ok(None);
        }
        let len = bounds::admit(declared, self.remaining, self.config.max_declared_length)?;
        let mut bytes = vec![0u8; len];
        self.read_bytes_into(&mut bytes)?;
        Ok(Some(Bytes::from(bytes)))
    }

    /// Read a count-prefixed sequence of elements.
    pub fn read_list<T>(
        &mut self,
        mut read: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        let count = self.read_array_size()?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(read(self)?);
        }
        Ok(items)
    }

    /// Read a count-prefixed array of elements. Same wire shape as a list.
    pub fn read_array<T>(&mut self, read: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        self.read_list(read)
    }

    /// Read a presence flag, then an array if one follows.
    pub fn read_optional_array<T>(
        &mut self,
        read: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<Option<Vec<T>>> {
        if self.read_bool()? {
            self.read_array(read).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Read a count-prefixed set of elements.
    pub fn read_set<T: Eq + Hash>(
        &mut self,
        mut read: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<HashSet<T>> {
        let count = self.read_array_size()?;
        let mut set = HashSet::with_capacity(count);
        for _ in 0..count {
            set.insert(read(self)?);
        }
        Ok(set)
    }

    /// Read a count-prefixed map of key/value pairs.
    pub fn read_map<K: Eq + Hash, V>(
        &mut self,
        mut read_key: impl FnMut(&mut Self) -> Result<K>,
        mut read_value: impl FnMut(&mut Self) -> Result<V>,
    ) -> Result<HashMap<K, V>> {
        let count = self.read_array_size()?;
        let mut map = HashMap::with_capacity(count);
        for _ in 0..count {
            let key = read_key(self)?;
            let value = read_value(self)?;
            map.insert(key, value);
        }
        Ok(map)
    }

    /// Read a map of keys to element lists.
    pub fn read_map_of_lists<K: Eq + Hash, V>(
        &mut self,
        mut read_key: impl FnMut(&mut Self) -> Result<K>,
        mut read_value: impl FnMut(&mut Self) -> Result<V>,
    ) -> Result<HashMap<K, Vec<V>>> {
        let count = self.read_array_size()?;
        let mut map = HashMap::with_capacity(count);
        for _ in 0..count {
            let key = read_key(self)?;
            let values = self.read_list(&mut read_value)?;
            map.insert(key, values);
        }
        Ok(map)
    }

    /// Read a count-prefixed array of strings.
    pub fn read_string_array(&mut self) -> Result<Vec<String>> {
        self.read_list(Self::read_string)
    }

    /// Read a count-prefixed list of strings.
    pub fn read_string_list(&mut self) -> Result<Vec<String>> {
        self.read_list(Self::read_string)
    }

    /// Read a presence flag, then a string array if one follows.
    pub fn read_optional_string_array(&mut self) -> Result<Option<Vec<String>>> {
        if self.read_bool()? {
            self.read_string_array().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Read a count-prefixed array of fixed-width `i32`s.
    pub fn read_int_array(&mut self) -> Result<Vec<i32>> {
        self.read_list(Self::read_int)
    }

    /// Read a count-prefixed array of vint-encoded values.
    pub fn read_vint_array(&mut self) -> Result<Vec<u32>> {
        self.read_list(Self::read_vint)
    }

    /// Read a count-prefixed array of fixed-width `i64`s.
    pub fn read_long_array(&mut self) -> Result<Vec<i64>> {
        self.read_list(Self::read_long)
    }

    /// Read a count-prefixed array of vlong-encoded values.
    pub fn read_vlong_array(&mut self) -> Result<Vec<u64>> {
        self.read_list(Self::read_vlong)
    }

    /// Read a count-prefixed array of `f32`s.
    pub fn read_float_array(&mut self) -> Result<Vec<f32>> {
        self.read_list(Self::read_float)
    }

    /// Read a count-prefixed array of `f64`s.
    pub fn read_double_array(&mut self) -> Result<Vec<f64>> {
        self.read_list(Self::read_double)
    }

    /// Read a presence flag, then a string if one follows.
    pub fn read_optional_string(&mut self) -> Result<Option<String>> {
        if self.read_bool()? {
            self.read_string().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Read a presence flag, then an `i64` if one follows.
    pub fn read_optional_long(&mut self) -> Result<Option<i64>> {
        if self.read_bool()? {
            self.read_long().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Read a presence flag, then an `f32` if one follows.
    pub fn read_optional_float(&mut self) -> Result<Option<f32>> {
        if self.read_bool()? {
            self.read_float().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Read a presence flag, then an `f64` if one follows.
    pub fn read_optional_double(&mut self) -> Result<Option<f64>> {
        if self.read_bool()? {
            self.read_double().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Read a presence flag, then a vint if one follows.
    pub fn read_optional_vint(&mut self) -> Result<Option<u32>> {
        if self.read_bool()? {
            self.read_vint().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Read a presence flag, then run `read` if one follows.
    ///
    /// A reader that itself yields absence where the wire declared presence
    /// is broken — one short of decoding garbage as the next value — so that
    /// case fails with `ContractViolation` instead of propagating.
    pub fn read_optional_with<T>(
        &mut self,
        what: &str,
        read: impl FnOnce(&mut Self) -> Result<Option<T>>,
    ) -> Result<Option<T>> {
        if self.read_bool()? {
            match read(self)? {
                Some(value) => Ok(Some(value)),
                None => Err(WireError::ContractViolation(what.to_string())),
            }
        } else {
            Ok(None)
        }
    }

    /// Read an enum serialized as its vint ordinal.
    pub fn read_enum<E: OrdinalEnum>(&mut self) -> Result<E> {
        let ordinal = self.read_vint()?;
        E::from_ordinal(ordinal).ok_or(WireError::UnknownEnumOrdinal {
            enum_name: E::NAME,
            ordinal,
        })
    }

    /// Read a count-prefixed set of ordinal-serialized enums.
    pub fn read_enum_set<E: OrdinalEnum + Eq + Hash>(&mut self) -> Result<HashSet<E>> {
        self.read_set(Self::read_enum)
    }
}

fn bool_from_byte(byte: u8) -> Result<bool> {
    match byte {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(WireError::InvalidBooleanEncoding(other)),
    }
}

pub(crate) fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}
