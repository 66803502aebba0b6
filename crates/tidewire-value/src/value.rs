//! The tagged generic value codec.
//!
//! A value of unspecified type travels as one tag byte followed by a
//! tag-specific payload. The tag table is closed but append-only: new kinds
//! get new numbers at the end, and existing numbers are never reassigned —
//! reassignment would silently reinterpret persisted bytes. List, array and
//! map payloads recurse into further tagged values.

use std::collections::HashMap;

use bytes::Bytes;
use tidewire_stream::{Result, StreamInput, StreamOutput, Version, WireError};

/// Wire tags. Append-only; never renumber.
mod tag {
    pub const NULL: i8 = -1;
    pub const STRING: i8 = 0;
    pub const INT: i8 = 1;
    pub const LONG: i8 = 2;
    pub const FLOAT: i8 = 3;
    pub const DOUBLE: i8 = 4;
    pub const BOOLEAN: i8 = 5;
    pub const BYTES: i8 = 6;
    pub const LIST: i8 = 7;
    pub const ARRAY: i8 = 8;
    pub const ORDERED_MAP: i8 = 9;
    pub const MAP: i8 = 10;
    pub const BYTE: i8 = 11;
    pub const DATE: i8 = 12;
    pub const TIMESTAMP_LEGACY: i8 = 13;
    pub const BYTES_REF: i8 = 14;
    // 15 carried raw text values; retired, must not be reinterpreted.
    pub const RETIRED_TEXT: i8 = 15;
    pub const SHORT: i8 = 16;
    pub const INT_ARRAY: i8 = 17;
    pub const LONG_ARRAY: i8 = 18;
    pub const FLOAT_ARRAY: i8 = 19;
    pub const DOUBLE_ARRAY: i8 = 20;
    pub const BYTES_REF_LEGACY: i8 = 21;
    pub const GEO_POINT: i8 = 22;
    pub const TIMESTAMP: i8 = 23;
    pub const DECIMAL: i8 = 24;
    pub const TIME_TZ: i8 = 25;
    pub const PERIOD: i8 = 26;
    pub const POINT: i8 = 27;
    pub const BIT_STRING: i8 = 28;
}

/// A value of unspecified type, as moved between nodes and persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    Bytes(Vec<u8>),
    /// Heterogeneous sequence.
    List(Vec<Value>),
    /// Heterogeneous fixed array. Same payload as a list, distinct tag.
    Array(Vec<Value>),
    /// String-keyed map preserving insertion order.
    OrderedMap(Vec<(String, Value)>),
    /// String-keyed map with no ordering guarantee.
    Map(HashMap<String, Value>),
    Byte(u8),
    /// Epoch milliseconds, no zone.
    Date(i64),
    /// Zoned timestamp: zone identifier plus epoch milliseconds. Decodes
    /// from the legacy and the current tag alike; the channel version picks
    /// which tag is written.
    Timestamp { zone: String, millis: i64 },
    /// Zero-copy byte reference. The legacy tag decodes to this as well.
    BytesRef(Bytes),
    Short(i16),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
    FloatArray(Vec<f32>),
    DoubleArray(Vec<f64>),
    GeoPoint { lat: f64, lon: f64 },
    /// Arbitrary-precision decimal: scale, precision (0 = unlimited) and the
    /// big-endian two's-complement unscaled magnitude.
    Decimal {
        scale: u32,
        precision: u32,
        unscaled: Vec<u8>,
    },
    /// Time of day with a fixed UTC offset.
    TimeTz {
        micros_from_midnight: i64,
        offset_seconds: i32,
    },
    Period {
        years: i32,
        months: i32,
        weeks: i32,
        days: i32,
        hours: i32,
        minutes: i32,
        seconds: i32,
        millis: i32,
    },
    Point { x: f64, y: f64 },
    /// Fixed-length bit string: packed bit bytes plus the bit count.
    BitString { bits: Vec<u8>, length: u32 },
}

impl Value {
    /// Decode one tagged value from the channel.
    pub fn read_from(input: &mut StreamInput<'_>) -> Result<Value> {
        let tag = input.read_byte()? as i8;
        match tag {
            tag::NULL => Ok(Value::Null),
            tag::STRING => Ok(Value::String(input.read_string()?)),
            tag::INT => Ok(Value::Int(input.read_int()?)),
            tag::LONG => Ok(Value::Long(input.read_long()?)),
            tag::FLOAT => Ok(Value::Float(input.read_float()?)),
            tag::DOUBLE => Ok(Value::Double(input.read_double()?)),
            tag::BOOLEAN => Ok(Value::Boolean(input.read_bool()?)),
            tag::BYTES => Ok(Value::Bytes(input.read_byte_array()?)),
            tag::LIST => Ok(Value::List(input.read_list(Value::read_from)?)),
            tag::ARRAY => Ok(Value::Array(input.read_array(Value::read_from)?)),
            tag::ORDERED_MAP => {
                let count = input.read_array_size()?;
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    let key = input.read_string()?;
                    let value = Value::read_from(input)?;
                    entries.push((key, value));
                }
                Ok(Value::OrderedMap(entries))
            }
            tag::MAP => Ok(Value::Map(
                input.read_map(StreamInput::read_string, Value::read_from)?,
            )),
            tag::BYTE => Ok(Value::Byte(input.read_byte()?)),
            tag::DATE => Ok(Value::Date(input.read_long()?)),
            tag::TIMESTAMP_LEGACY | tag::TIMESTAMP => {
                let zone = input.read_string()?;
                let millis = input.read_long()?;
                Ok(Value::Timestamp { zone, millis })
            }
            tag::BYTES_REF | tag::BYTES_REF_LEGACY => {
                Ok(Value::BytesRef(input.read_bytes_reference()?))
            }
            tag::RETIRED_TEXT => Err(WireError::RetiredFormat("the raw text value tag")),
            tag::SHORT => Ok(Value::Short(input.read_short()?)),
            tag::INT_ARRAY => Ok(Value::IntArray(input.read_int_array()?)),
            tag::LONG_ARRAY => Ok(Value::LongArray(input.read_long_array()?)),
            tag::FLOAT_ARRAY => Ok(Value::FloatArray(input.read_float_array()?)),
            tag::DOUBLE_ARRAY => Ok(Value::DoubleArray(input.read_double_array()?)),
            tag::GEO_POINT => Ok(Value::GeoPoint {
                lat: input.read_double()?,
                lon: input.read_double()?,
            }),
            tag::DECIMAL => Ok(Value::Decimal {
                scale: input.read_vint()?,
                precision: input.read_vint()?,
                unscaled: input.read_byte_array()?,
            }),
            tag::TIME_TZ => Ok(Value::TimeTz {
                micros_from_midnight: input.read_long()?,
                offset_seconds: input.read_int()?,
            }),
            tag::PERIOD => Ok(Value::Period {
                years: input.read_vint()? as i32,
                months: input.read_vint()? as i32,
                weeks: input.read_vint()? as i32,
                days: input.read_vint()? as i32,
                hours: input.read_vint()? as i32,
                minutes: input.read_vint()? as i32,
                seconds: input.read_vint()? as i32,
                millis: input.read_vint()? as i32,
            }),
            tag::POINT => Ok(Value::Point {
                x: input.read_double()?,
                y: input.read_double()?,
            }),
            tag::BIT_STRING => Ok(Value::BitString {
                bits: input.read_byte_array()?,
                length: input.read_vint()?,
            }),
            unknown => Err(WireError::UnknownValueTag(unknown)),
        }
    }

    /// Read a presence flag, then a tagged value if one follows.
    pub fn read_optional_from(input: &mut StreamInput<'_>) -> Result<Option<Value>> {
        if input.read_bool()? {
            Value::read_from(input).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Encode this value as one tagged value on the channel.
    pub fn write_to(&self, out: &mut StreamOutput<'_>) -> Result<()> {
        match self {
            Value::Null => out.write_byte(tag::NULL as u8),
            Value::String(value) => {
                out.write_byte(tag::STRING as u8)?;
                out.write_string(value)
            }
            Value::Int(value) => {
                out.write_byte(tag::INT as u8)?;
                out.write_int(*value)
            }
            Value::Long(value) => {
                out.write_byte(tag::LONG as u8)?;
                out.write_long(*value)
            }
            Value::Float(value) => {
                out.write_byte(tag::FLOAT as u8)?;
                out.write_float(*value)
            }
            Value::Double(value) => {
                out.write_byte(tag::DOUBLE as u8)?;
                out.write_double(*value)
            }
            Value::Boolean(value) => {
                out.write_byte(tag::BOOLEAN as u8)?;
                out.write_bool(*value)
            }
            Value::Bytes(bytes) => {
                out.write_byte(tag::BYTES as u8)?;
                out.write_byte_array(bytes)
            }
            Value::List(items) => {
                out.write_byte(tag::LIST as u8)?;
                out.write_collection(items, |out, item| item.write_to(out))
            }
            Value::Array(items) => {
                out.write_byte(tag::ARRAY as u8)?;
                out.write_collection(items, |out, item| item.write_to(out))
            }
            Value::OrderedMap(entries) => {
                out.write_byte(tag::ORDERED_MAP as u8)?;
                out.write_collection(entries, |out, (key, value)| {
                    out.write_string(key)?;
                    value.write_to(out)
                })
            }
            Value::Map(map) => {
                out.write_byte(tag::MAP as u8)?;
                out.write_map(
                    map,
                    |out, key| out.write_string(key),
                    |out, value| value.write_to(out),
                )
            }
            Value::Byte(value) => {
                out.write_byte(tag::BYTE as u8)?;
                out.write_byte(*value)
            }
            Value::Date(millis) => {
                out.write_byte(tag::DATE as u8)?;
                out.write_long(*millis)
            }
            Value::Timestamp { zone, millis } => {
                // Peers before the zoned-timestamp release only read the
                // legacy tag; the payload is identical under both.
                if out.version().on_or_after(Version::ZONED_TIMESTAMP) {
                    out.write_byte(tag::TIMESTAMP as u8)?;
                } else {
                    out.write_byte(tag::TIMESTAMP_LEGACY as u8)?;
                }
                out.write_string(zone)?;
                out.write_long(*millis)
            }
            Value::BytesRef(bytes) => {
                out.write_byte(tag::BYTES_REF as u8)?;
                out.write_bytes_reference(bytes)
            }
            Value::Short(value) => {
                out.write_byte(tag::SHORT as u8)?;
                out.write_short(*value)
            }
            Value::IntArray(values) => {
                out.write_byte(tag::INT_ARRAY as u8)?;
                out.write_int_array(values)
            }
            Value::LongArray(values) => {
                out.write_byte(tag::LONG_ARRAY as u8)?;
                out.write_long_array(values)
            }
            Value::FloatArray(values) => {
                out.write_byte(tag::FLOAT_ARRAY as u8)?;
                out.write_float_array(values)
            }
            Value::DoubleArray(values) => {
                out.write_byte(tag::DOUBLE_ARRAY as u8)?;
                out.write_double_array(values)
            }
            Value::GeoPoint { lat, lon } => {
                out.write_byte(tag::GEO_POINT as u8)?;
                out.write_double(*lat)?;
                out.write_double(*lon)
            }
            Value::Decimal {
                scale,
                precision,
                unscaled,
            } => {
                out.write_byte(tag::DECIMAL as u8)?;
                out.write_vint(*scale)?;
                out.write_vint(*precision)?;
                out.write_byte_array(unscaled)
            }
            Value::TimeTz {
                micros_from_midnight,
                offset_seconds,
            } => {
                out.write_byte(tag::TIME_TZ as u8)?;
                out.write_long(*micros_from_midnight)?;
                out.write_int(*offset_seconds)
            }
            Value::Period {
                years,
                months,
                weeks,
                days,
                hours,
                minutes,
                seconds,
                millis,
            } => {
                out.write_byte(tag::PERIOD as u8)?;
                for field in [years, months, weeks, days, hours, minutes, seconds, millis] {
                    out.write_vint(*field as u32)?;
                }
                Ok(())
            }
            Value::Point { x, y } => {
                out.write_byte(tag::POINT as u8)?;
                out.write_double(*x)?;
                out.write_double(*y)
            }
            Value::BitString { bits, length } => {
                out.write_byte(tag::BIT_STRING as u8)?;
                out.write_byte_array(bits)?;
                out.write_vint(*length)
            }
        }
    }

    /// Write a presence flag, then the value if one is given.
    pub fn write_optional_to(value: Option<&Value>, out: &mut StreamOutput<'_>) -> Result<()> {
        match value {
            Some(value) => {
                out.write_bool(true)?;
                value.write_to(out)
            }
            None => out.write_bool(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: &Value) -> Value {
        let wire = encode_current(value);
        let mut input = StreamInput::from_slice(&wire);
        let decoded = Value::read_from(&mut input).unwrap();
        assert_eq!(input.available(), Some(0), "trailing bytes after {value:?}");
        decoded
    }

    fn encode_current(value: &Value) -> Vec<u8> {
        let mut wire = Vec::new();
        value.write_to(&mut StreamOutput::new(&mut wire)).unwrap();
        wire
    }

    #[test]
    fn scalars_round_trip() {
        for value in [
            Value::Null,
            Value::String("select * from t".into()),
            Value::Int(i32::MIN),
            Value::Long(i64::MAX),
            Value::Float(1.25),
            Value::Double(-2.5),
            Value::Boolean(true),
            Value::Byte(0xFE),
            Value::Short(-300),
            Value::Date(1_700_000_000_000),
        ] {
            assert_eq!(round_trip(&value), value);
        }
    }

    #[test]
    fn byte_payloads_round_trip() {
        assert_eq!(
            round_trip(&Value::Bytes(vec![0, 1, 2, 255])),
            Value::Bytes(vec![0, 1, 2, 255])
        );
        let referenced = Value::BytesRef(Bytes::from_static(b"segment"));
        assert_eq!(round_trip(&referenced), referenced);
    }

    #[test]
    fn nested_collections_round_trip() {
        let value = Value::List(vec![
            Value::Null,
            Value::List(vec![Value::Int(1), Value::List(vec![Value::String("deep".into())])]),
            Value::Array(vec![Value::Boolean(false), Value::Double(0.5)]),
            Value::IntArray(vec![-1, 0, 1]),
            Value::LongArray(vec![i64::MIN]),
            Value::FloatArray(vec![0.25]),
            Value::DoubleArray(vec![f64::MAX]),
        ]);
        assert_eq!(round_trip(&value), value);
    }

    #[test]
    fn maps_round_trip_with_zero_one_and_many_entries() {
        for entries in [0usize, 1, 5] {
            let mut map = HashMap::new();
            let mut ordered = Vec::new();
            for i in 0..entries {
                map.insert(format!("k{i}"), Value::Int(i as i32));
                ordered.push((format!("k{i}"), Value::Long(i as i64)));
            }
            let unordered = Value::Map(map);
            assert_eq!(round_trip(&unordered), unordered);
            let ordered = Value::OrderedMap(ordered);
            assert_eq!(round_trip(&ordered), ordered);
        }
    }

    #[test]
    fn ordered_map_preserves_insertion_order() {
        let value = Value::OrderedMap(vec![
            ("zebra".into(), Value::Int(1)),
            ("alpha".into(), Value::Int(2)),
            ("mid".into(), Value::Int(3)),
        ]);
        let Value::OrderedMap(entries) = round_trip(&value) else {
            panic!("expected ordered map");
        };
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["zebra", "alpha", "mid"]);
    }

    #[test]
    fn domain_values_round_trip() {
        for value in [
            Value::GeoPoint { lat: 52.52, lon: 13.405 },
            Value::Point { x: -3.0, y: 7.25 },
            Value::Decimal {
                scale: 4,
                precision: 20,
                unscaled: vec![0x01, 0xFF, 0x00],
            },
            Value::TimeTz {
                micros_from_midnight: 86_399_000_000,
                offset_seconds: -3600,
            },
            Value::Period {
                years: 1,
                months: -2,
                weeks: 0,
                days: 30,
                hours: 5,
                minutes: 59,
                seconds: 1,
                millis: 999,
            },
            Value::BitString {
                bits: vec![0b1010_1010, 0b0000_0001],
                length: 9,
            },
        ] {
            assert_eq!(round_trip(&value), value);
        }
    }

    #[test]
    fn timestamp_tag_is_gated_by_channel_version() {
        let value = Value::Timestamp {
            zone: "Europe/Berlin".into(),
            millis: 1_700_000_000_000,
        };

        let current = encode_current(&value);
        assert_eq!(current[0] as i8, 23);

        let mut legacy = Vec::new();
        {
            let mut out = StreamOutput::new(&mut legacy);
            out.set_version(Version::MINIMUM_COMPATIBLE);
            value.write_to(&mut out).unwrap();
        }
        assert_eq!(legacy[0] as i8, 13);

        // Both decode to the same value regardless of reader version.
        for wire in [&current, &legacy] {
            assert_eq!(Value::read_from(&mut StreamInput::from_slice(wire)).unwrap(), value);
        }
    }

    #[test]
    fn legacy_bytes_ref_tag_still_decodes() {
        let mut wire = vec![21u8];
        {
            let mut out = StreamOutput::new(&mut wire);
            out.write_byte_array(b"held over").unwrap();
        }
        let decoded = Value::read_from(&mut StreamInput::from_slice(&wire)).unwrap();
        assert_eq!(decoded, Value::BytesRef(Bytes::from_static(b"held over")));
    }

    #[test]
    fn retired_text_tag_fails_explicitly() {
        let wire = [15u8, 0x03];
        let err = Value::read_from(&mut StreamInput::from_slice(&wire)).unwrap_err();
        assert!(matches!(err, WireError::RetiredFormat(_)));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let wire = [99u8];
        let err = Value::read_from(&mut StreamInput::from_slice(&wire)).unwrap_err();
        assert!(matches!(err, WireError::UnknownValueTag(99)));
    }

    #[test]
    fn corrupted_collection_length_fails_before_allocation() {
        // a list claiming one billion elements on a six-byte channel
        let mut wire = vec![7u8];
        {
            let mut out = StreamOutput::new(&mut wire);
            out.write_vint(1_000_000_000).unwrap();
        }
        let err = Value::read_from(&mut StreamInput::from_slice(&wire)).unwrap_err();
        assert!(matches!(err, WireError::TruncatedStream { .. }));
    }

    #[test]
    fn optional_values_round_trip() {
        let mut wire = Vec::new();
        {
            let mut out = StreamOutput::new(&mut wire);
            Value::write_optional_to(Some(&Value::Int(4)), &mut out).unwrap();
            Value::write_optional_to(None, &mut out).unwrap();
        }
        let mut input = StreamInput::from_slice(&wire);
        assert_eq!(Value::read_optional_from(&mut input).unwrap(), Some(Value::Int(4)));
        assert_eq!(Value::read_optional_from(&mut input).unwrap(), None);
    }
}
