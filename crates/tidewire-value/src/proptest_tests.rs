//! Randomized round-trip coverage for the tagged value codec.

use std::collections::HashMap;

use bytes::Bytes;
use proptest::collection::{hash_map, vec};
use proptest::prelude::*;
use tidewire_stream::{StreamInput, StreamOutput, Version};

use crate::Value;

// Floats are generated without NaN so decoded values stay comparable.
fn arb_f32() -> impl Strategy<Value = f32> {
    any::<f32>().prop_filter("NaN has no equality", |f| !f.is_nan())
}

fn arb_f64() -> impl Strategy<Value = f64> {
    any::<f64>().prop_filter("NaN has no equality", |f| !f.is_nan())
}

fn arb_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        ".*".prop_map(Value::String),
        any::<i32>().prop_map(Value::Int),
        any::<i64>().prop_map(Value::Long),
        arb_f32().prop_map(Value::Float),
        arb_f64().prop_map(Value::Double),
        any::<bool>().prop_map(Value::Boolean),
        any::<u8>().prop_map(Value::Byte),
        any::<i16>().prop_map(Value::Short),
        any::<i64>().prop_map(Value::Date),
        vec(any::<u8>(), 0..64).prop_map(Value::Bytes),
        vec(any::<u8>(), 0..64).prop_map(|b| Value::BytesRef(Bytes::from(b))),
        vec(any::<i32>(), 0..16).prop_map(Value::IntArray),
        vec(any::<i64>(), 0..16).prop_map(Value::LongArray),
        vec(arb_f32(), 0..16).prop_map(Value::FloatArray),
        vec(arb_f64(), 0..16).prop_map(Value::DoubleArray),
        (arb_f64(), arb_f64()).prop_map(|(lat, lon)| Value::GeoPoint { lat, lon }),
        (arb_f64(), arb_f64()).prop_map(|(x, y)| Value::Point { x, y }),
        ("[A-Za-z/_]{1,20}", any::<i64>())
            .prop_map(|(zone, millis)| Value::Timestamp { zone, millis }),
        (any::<u32>(), any::<u32>(), vec(any::<u8>(), 0..20)).prop_map(
            |(scale, precision, unscaled)| Value::Decimal {
                scale,
                precision,
                unscaled,
            }
        ),
        (any::<i64>(), any::<i32>()).prop_map(|(micros, offset)| Value::TimeTz {
            micros_from_midnight: micros,
            offset_seconds: offset,
        }),
        (vec(any::<u8>(), 0..16), any::<u32>())
            .prop_map(|(bits, length)| Value::BitString { bits, length }),
    ]
}

fn arb_value() -> impl Strategy<Value = Value> {
    arb_leaf().prop_recursive(3, 32, 8, |inner| {
        prop_oneof![
            vec(inner.clone(), 0..8).prop_map(Value::List),
            vec(inner.clone(), 0..8).prop_map(Value::Array),
            vec(("[a-z]{1,8}", inner.clone()), 0..8).prop_map(Value::OrderedMap),
            hash_map("[a-z]{1,8}", inner, 0..8)
                .prop_map(|m| Value::Map(m.into_iter().collect::<HashMap<_, _>>())),
        ]
    })
}

proptest! {
    #[test]
    fn any_value_round_trips(value in arb_value()) {
        let mut wire = Vec::new();
        value.write_to(&mut StreamOutput::new(&mut wire)).unwrap();

        let mut input = StreamInput::from_slice(&wire);
        let decoded = Value::read_from(&mut input).unwrap();
        prop_assert_eq!(&decoded, &value);
        // decoding consumes exactly the bytes that were written
        prop_assert_eq!(input.available(), Some(0));
    }

    #[test]
    fn legacy_channels_round_trip_too(value in arb_value()) {
        let mut wire = Vec::new();
        {
            let mut out = StreamOutput::new(&mut wire);
            out.set_version(Version::MINIMUM_COMPATIBLE);
            value.write_to(&mut out).unwrap();
        }
        let decoded = Value::read_from(&mut StreamInput::from_slice(&wire)).unwrap();
        prop_assert_eq!(decoded, value);
    }
}
