use std::collections::HashMap;

use tidewire_stream::{Result as WireResult, StreamInput, StreamOutput, WireError};

use crate::error::{RegistryError, Result};

/// A decode function for one registered type.
pub type Factory<T> = fn(&mut StreamInput<'_>) -> WireResult<T>;

/// A type that travels with a name discriminator ahead of its payload.
pub trait NamedWriteable {
    /// The discriminator written before the payload. Must match the name the
    /// type was registered under.
    fn wire_name(&self) -> &'static str;

    fn write_to(&self, out: &mut StreamOutput<'_>) -> WireResult<()>;
}

struct Entry<T> {
    name: &'static str,
    factory: Factory<T>,
}

/// Name-keyed registry of decode functions, assembled once at startup and
/// then only read.
///
/// The wire carries a string discriminator before the payload; the registry
/// maps it back to the factory that knows the payload layout. Registration
/// order also assigns each entry a stable ordinal for callers that prefer a
/// compact numeric discriminator, so the order itself is part of the wire
/// contract and must not change between releases.
pub struct TypeRegistry<T> {
    entries: Vec<Entry<T>>,
    by_name: HashMap<&'static str, usize>,
}

impl<T> TypeRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Register a factory under a name. Names are unique; a duplicate is a
    /// wiring bug and fails loudly.
    pub fn register(&mut self, name: &'static str, factory: Factory<T>) -> Result<()> {
        if self.by_name.contains_key(name) {
            return Err(RegistryError::DuplicateName(name));
        }
        let ordinal = self.entries.len();
        self.entries.push(Entry { name, factory });
        self.by_name.insert(name, ordinal);
        tracing::debug!(name, ordinal, "registered wire type");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Registered names in registration (ordinal) order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|entry| entry.name)
    }

    /// Read a string discriminator, then decode the payload with the factory
    /// registered under it.
    pub fn read_named(&self, input: &mut StreamInput<'_>) -> WireResult<T> {
        let name = input.read_string()?;
        let ordinal = self
            .by_name
            .get(name.as_str())
            .copied()
            .ok_or(WireError::UnknownNamedType(name))?;
        (self.entries[ordinal].factory)(input)
    }

    /// Read a vint ordinal discriminator, then decode the payload with the
    /// factory registered at that position.
    pub fn read_named_by_ordinal(&self, input: &mut StreamInput<'_>) -> WireResult<T> {
        let ordinal = input.read_vint()? as usize;
        let entry = self
            .entries
            .get(ordinal)
            .ok_or_else(|| WireError::UnknownNamedType(format!("ordinal {ordinal}")))?;
        (entry.factory)(input)
    }

    /// Read a presence flag, then a named payload if one follows.
    pub fn read_optional_named(&self, input: &mut StreamInput<'_>) -> WireResult<Option<T>> {
        if input.read_bool()? {
            self.read_named(input).map(Some)
        } else {
            Ok(None)
        }
    }
}

impl<T> Default for TypeRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Write a name discriminator followed by the value's payload.
pub fn write_named<T: NamedWriteable + ?Sized>(
    value: &T,
    out: &mut StreamOutput<'_>,
) -> WireResult<()> {
    out.write_string(value.wire_name())?;
    value.write_to(out)
}

/// Write a presence flag, then a named payload if one is given.
pub fn write_optional_named<T: NamedWriteable>(
    value: Option<&T>,
    out: &mut StreamOutput<'_>,
) -> WireResult<()> {
    match value {
        Some(value) => {
            out.write_bool(true)?;
            write_named(value, out)
        }
        None => out.write_bool(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Request {
        Ping { payload: i64 },
        Fetch { table: String },
    }

    impl NamedWriteable for Request {
        fn wire_name(&self) -> &'static str {
            match self {
                Request::Ping { .. } => "ping",
                Request::Fetch { .. } => "fetch",
            }
        }

        fn write_to(&self, out: &mut StreamOutput<'_>) -> WireResult<()> {
            match self {
                Request::Ping { payload } => out.write_long(*payload),
                Request::Fetch { table } => out.write_string(table),
            }
        }
    }

    fn request_registry() -> TypeRegistry<Request> {
        let mut registry = TypeRegistry::new();
        registry
            .register("ping", |input| {
                Ok(Request::Ping {
                    payload: input.read_long()?,
                })
            })
            .unwrap();
        registry
            .register("fetch", |input| {
                Ok(Request::Fetch {
                    table: input.read_string()?,
                })
            })
            .unwrap();
        registry
    }

    #[test]
    fn named_round_trip() {
        let registry = request_registry();
        let request = Request::Fetch {
            table: "doc.users".into(),
        };

        let mut wire = Vec::new();
        write_named(&request, &mut StreamOutput::new(&mut wire)).unwrap();

        let decoded = registry
            .read_named(&mut StreamInput::from_slice(&wire))
            .unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn ordinal_round_trip_follows_registration_order() {
        let registry = request_registry();

        let mut wire = Vec::new();
        {
            let mut out = StreamOutput::new(&mut wire);
            out.write_vint(0).unwrap();
            out.write_long(42).unwrap();
        }
        let decoded = registry
            .read_named_by_ordinal(&mut StreamInput::from_slice(&wire))
            .unwrap();
        assert_eq!(decoded, Request::Ping { payload: 42 });
    }

    #[test]
    fn unknown_name_is_rejected() {
        let registry = request_registry();
        let mut wire = Vec::new();
        StreamOutput::new(&mut wire).write_string("evict").unwrap();

        let err = registry
            .read_named(&mut StreamInput::from_slice(&wire))
            .unwrap_err();
        assert!(matches!(err, WireError::UnknownNamedType(name) if name == "evict"));
    }

    #[test]
    fn unknown_ordinal_is_rejected() {
        let registry = request_registry();
        let mut wire = Vec::new();
        StreamOutput::new(&mut wire).write_vint(7).unwrap();

        let err = registry
            .read_named_by_ordinal(&mut StreamInput::from_slice(&wire))
            .unwrap_err();
        assert!(matches!(err, WireError::UnknownNamedType(_)));
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = request_registry();
        let err = registry
            .register("ping", |input| {
                Ok(Request::Ping {
                    payload: input.read_long()?,
                })
            })
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName("ping")));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn optional_named_round_trip() {
        let registry = request_registry();
        let request = Request::Ping { payload: -1 };

        let mut wire = Vec::new();
        {
            let mut out = StreamOutput::new(&mut wire);
            write_optional_named(Some(&request), &mut out).unwrap();
            write_optional_named::<Request>(None, &mut out).unwrap();
        }
        let mut input = StreamInput::from_slice(&wire);
        assert_eq!(
            registry.read_optional_named(&mut input).unwrap(),
            Some(request)
        );
        assert_eq!(registry.read_optional_named(&mut input).unwrap(), None);
    }

    #[test]
    fn names_iterate_in_registration_order() {
        let registry = request_registry();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, ["ping", "fetch"]);
        assert!(registry.contains("fetch"));
        assert!(!registry.contains("evict"));
    }
}
