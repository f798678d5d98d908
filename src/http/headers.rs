//! Case-preserving, multi-valued header storage.
//!
//! Entries are keyed by the lower-cased name so lookups ignore case, while
//! the first casing seen for a name is what gets written back out. Values are
//! kept in arrival order; a name with several values serializes as several
//! header lines.
//!
//! Values are decoded from the wire as ISO-8859-1, so every byte maps to one
//! `char` and converts back to the identical byte when the store is turned
//! into a transport header map.

use http::header::{HeaderMap, HeaderName, HeaderValue};
use indexmap::IndexMap;

use crate::error::ProxyError;

/// Values of one header as exposed by [`HeaderStore::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValues {
    Single(String),
    Multiple(Vec<String>),
}

#[derive(Debug, Clone)]
struct HeaderEntry {
    /// Name as first registered.
    name: String,
    values: Vec<String>,
}

/// Ordered header container with case-insensitive lookups.
#[derive(Debug, Clone, Default)]
pub struct HeaderStore {
    entries: IndexMap<String, HeaderEntry>,
}

impl HeaderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from raw `(name, value)` pairs, duplicates preserved.
    pub fn from_pairs<I, N, V>(pairs: I) -> Result<Self, ProxyError>
    where
        I: IntoIterator<Item = (N, V)>,
        N: AsRef<str>,
        V: Into<String>,
    {
        let mut store = Self::new();
        for (name, value) in pairs {
            store.append(name.as_ref(), value)?;
        }
        Ok(store)
    }

    /// Build a store from a transport header map.
    ///
    /// The map has already validated every name and value, so this cannot fail.
    pub fn from_header_map(map: &HeaderMap) -> Self {
        let mut store = Self::new();
        for (name, value) in map {
            store.push_unchecked(name.as_str(), decode_value(value));
        }
        store
    }

    /// All values stored for `name`, in arrival order.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|entry| entry.values.as_slice())
    }

    /// First value stored for `name`.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.get(name).is_some_and(|values| !values.is_empty())
    }

    /// Replace every value of `name` with a single value.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<(), ProxyError> {
        self.set_all(name, [value])
    }

    /// Replace every value of `name`.
    ///
    /// An empty list keeps the entry but it is omitted from the output.
    pub fn set_all<I, V>(&mut self, name: &str, values: I) -> Result<(), ProxyError>
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        validate_name(name)?;
        let values = values
            .into_iter()
            .map(|value| {
                let value = value.into();
                encode_value(name, &value).map(|_| value)
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.entry(name).values = values;
        Ok(())
    }

    /// Add one value to `name`, creating the entry if needed.
    pub fn append(&mut self, name: &str, value: impl Into<String>) -> Result<(), ProxyError> {
        validate_name(name)?;
        let value = value.into();
        encode_value(name, &value)?;
        self.entry(name).values.push(value);
        Ok(())
    }

    /// Drop `name` entirely, returning its values.
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.entries
            .shift_remove(&name.to_ascii_lowercase())
            .map(|entry| entry.values)
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(name, values)` using the preserved casing.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .values()
            .map(|entry| (entry.name.as_str(), entry.values.as_slice()))
    }

    /// Outbound view: one value unwrapped, several kept as a list, none omitted.
    pub fn snapshot(&self) -> IndexMap<String, HeaderValues> {
        self.entries
            .values()
            .filter_map(|entry| {
                let values = match entry.values.as_slice() {
                    [] => return None,
                    [single] => HeaderValues::Single(single.clone()),
                    many => HeaderValues::Multiple(many.to_vec()),
                };
                Some((entry.name.clone(), values))
            })
            .collect()
    }

    /// Convert into a transport header map, one occurrence per value.
    pub fn to_header_map(&self) -> Result<HeaderMap, ProxyError> {
        let mut map = HeaderMap::with_capacity(self.entries.len());
        for entry in self.entries.values() {
            let name = HeaderName::from_bytes(entry.name.as_bytes()).map_err(|_| {
                ProxyError::Validation(format!("invalid header name {:?}", entry.name))
            })?;
            for value in &entry.values {
                map.append(name.clone(), encode_value(&entry.name, value)?);
            }
        }
        Ok(map)
    }

    fn entry(&mut self, name: &str) -> &mut HeaderEntry {
        self.entries
            .entry(name.to_ascii_lowercase())
            .or_insert_with(|| HeaderEntry {
                name: name.to_string(),
                values: Vec::new(),
            })
    }

    fn push_unchecked(&mut self, name: &str, value: String) {
        self.entry(name).values.push(value);
    }
}

fn validate_name(name: &str) -> Result<(), ProxyError> {
    HeaderName::from_bytes(name.as_bytes())
        .map(|_| ())
        .map_err(|_| ProxyError::Validation(format!("invalid header name {name:?}")))
}

fn decode_value(value: &HeaderValue) -> String {
    value.as_bytes().iter().copied().map(char::from).collect()
}

fn encode_value(name: &str, value: &str) -> Result<HeaderValue, ProxyError> {
    let invalid = || ProxyError::Validation(format!("invalid value for header {name:?}"));
    let bytes = value
        .chars()
        .map(|c| u8::try_from(c).map_err(|_| invalid()))
        .collect::<Result<Vec<u8>, _>>()?;
    HeaderValue::from_bytes(&bytes).map_err(|_| invalid())
}
