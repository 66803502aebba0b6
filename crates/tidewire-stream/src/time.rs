//! Durations on the wire: a zig-zag count plus a unit byte.

use crate::error::{Result, WireError};
use crate::input::{OrdinalEnum, StreamInput};
use crate::output::StreamOutput;

/// Time units keyed by their wire byte. The table is append-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl OrdinalEnum for TimeUnit {
    const NAME: &'static str = "TimeUnit";

    fn from_ordinal(ordinal: u32) -> Option<Self> {
        match ordinal {
            0 => Some(TimeUnit::Nanoseconds),
            1 => Some(TimeUnit::Microseconds),
            2 => Some(TimeUnit::Milliseconds),
            3 => Some(TimeUnit::Seconds),
            4 => Some(TimeUnit::Minutes),
            5 => Some(TimeUnit::Hours),
            6 => Some(TimeUnit::Days),
            _ => None,
        }
    }

    fn ordinal(&self) -> u32 {
        match self {
            TimeUnit::Nanoseconds => 0,
            TimeUnit::Microseconds => 1,
            TimeUnit::Milliseconds => 2,
            TimeUnit::Seconds => 3,
            TimeUnit::Minutes => 4,
            TimeUnit::Hours => 5,
            TimeUnit::Days => 6,
        }
    }
}

/// A duration expressed as a count of some unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeValue {
    pub duration: i64,
    pub unit: TimeUnit,
}

impl TimeValue {
    pub fn new(duration: i64, unit: TimeUnit) -> Self {
        Self { duration, unit }
    }
}

impl<'a> StreamInput<'a> {
    /// Read a time value: zig-zag duration followed by a unit byte.
    pub fn read_time_value(&mut self) -> Result<TimeValue> {
        let duration = self.read_zlong()?;
        let unit_byte = self.read_byte()?;
        let unit =
            TimeUnit::from_ordinal(u32::from(unit_byte)).ok_or(WireError::UnknownEnumOrdinal {
                enum_name: TimeUnit::NAME,
                ordinal: u32::from(unit_byte),
            })?;
        Ok(TimeValue { duration, unit })
    }

    /// Read a presence flag, then a time value if one follows.
    pub fn read_optional_time_value(&mut self) -> Result<Option<TimeValue>> {
        if self.read_bool()? {
            self.read_time_value().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Read a time zone identifier.
    pub fn read_time_zone(&mut self) -> Result<String> {
        self.read_string()
    }

    /// Read a presence flag, then a time zone identifier if one follows.
    pub fn read_optional_time_zone(&mut self) -> Result<Option<String>> {
        self.read_optional_string()
    }
}

impl<'a> StreamOutput<'a> {
    /// Write a time value: zig-zag duration followed by a unit byte.
    pub fn write_time_value(&mut self, value: TimeValue) -> Result<()> {
        self.write_zlong(value.duration)?;
        self.write_byte(value.unit.ordinal() as u8)
    }

    /// Write a presence flag, then a time value if one is given.
    pub fn write_optional_time_value(&mut self, value: Option<TimeValue>) -> Result<()> {
        match value {
            Some(value) => {
                self.write_bool(true)?;
                self.write_time_value(value)
            }
            None => self.write_bool(false),
        }
    }

    /// Write a time zone identifier.
    pub fn write_time_zone(&mut self, zone: &str) -> Result<()> {
        self.write_string(zone)
    }

    /// Write a presence flag, then a time zone identifier if one is given.
    pub fn write_optional_time_zone(&mut self, zone: Option<&str>) -> Result<()> {
        self.write_optional_string(zone)
    }
}
