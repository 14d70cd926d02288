//! Per-entry tolerant decoding for batched payloads.
//!
//! A single bad entry in a snapshot or event batch must not poison the whole
//! message. Each entry is first read as raw JSON and only then decoded into
//! its typed form; failures are kept alongside the raw value so the consumer
//! can log and skip them while still applying the rest of the batch in order.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Lenient<T> {
    Parsed(T),
    Malformed { raw: Value, error: String },
}

impl<T> Lenient<T> {
    pub fn parsed(&self) -> Option<&T> {
        match self {
            Lenient::Parsed(value) => Some(value),
            Lenient::Malformed { .. } => None,
        }
    }

    pub fn into_parsed(self) -> Option<T> {
        match self {
            Lenient::Parsed(value) => Some(value),
            Lenient::Malformed { .. } => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Lenient::Malformed { .. })
    }
}

impl<T> From<T> for Lenient<T> {
    fn from(value: T) -> Self {
        Lenient::Parsed(value)
    }
}

impl<'de, T> Deserialize<'de> for Lenient<T>
where
    T: DeserializeOwned,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        match T::deserialize(&raw) {
            Ok(value) => Ok(Lenient::Parsed(value)),
            Err(e) => Ok(Lenient::Malformed {
                raw,
                error: e.to_string(),
            }),
        }
    }
}

impl<T> Serialize for Lenient<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Lenient::Parsed(value) => value.serialize(serializer),
            Lenient::Malformed { raw, .. } => raw.serialize(serializer),
        }
    }
}
