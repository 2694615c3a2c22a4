//! Serde adapters for base64-encoded byte fields.
//!
//! Payload bytes appear as standard base64 strings in descriptors and in the
//! JSON envelope encoding, keeping binary data legible in YAML documents.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

fn decode<E: serde::de::Error>(text: &str) -> Result<Vec<u8>, E> {
    STANDARD
        .decode(text.as_bytes())
        .map_err(|err| E::custom(format!("invalid base64 payload: {err}")))
}

/// Adapter for `Option<Vec<u8>>` fields.
pub(crate) mod opt {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{decode, encode};

    pub(crate) fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(bytes) => serializer.serialize_some(&encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|text| decode(&text))
            .transpose()
    }
}

/// Adapter for `Vec<Vec<u8>>` fields.
pub(crate) mod list {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{decode, encode};

    pub(crate) fn serialize<S>(items: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(items.iter().map(|bytes| encode(bytes)))
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|text| decode(text))
            .collect()
    }
}
