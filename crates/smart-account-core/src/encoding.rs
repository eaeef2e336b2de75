//! Serde helpers rendering byte fields as standard base64 strings.
//!
//! Use with `#[serde(with = "...")]` on `Vec<u8>`, `Option<Vec<u8>>` and
//! `Vec<Vec<u8>>` fields.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Decode a base64 string
pub fn decode(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(encoded)
}

/// Encode bytes as base64
pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    STANDARD.encode(bytes)
}

/// `Vec<u8>` as a base64 string
pub mod base64_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize bytes as base64
    pub fn serialize<T: AsRef<[u8]>, S: Serializer>(
        bytes: T,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode(bytes))
    }

    /// Deserialize bytes from base64
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        super::decode(&encoded).map_err(serde::de::Error::custom)
    }
}

/// `Option<Vec<u8>>` as a base64 string or null
pub mod base64_option {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize optional bytes
    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&super::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize optional bytes
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| super::decode(&encoded).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// `Vec<Vec<u8>>` as an array of base64 strings
pub mod base64_vec {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize a list of byte strings
    pub fn serialize<S: Serializer>(items: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(items.len()))?;
        for item in items {
            seq.serialize_element(&super::encode(item))?;
        }
        seq.end()
    }

    /// Deserialize a list of byte strings
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Vec<u8>>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|encoded| super::decode(encoded).map_err(serde::de::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        #[serde(with = "super::base64_bytes")]
        data: Vec<u8>,
        #[serde(default, with = "super::base64_option")]
        params: Option<Vec<u8>>,
        #[serde(with = "super::base64_vec")]
        parts: Vec<Vec<u8>>,
    }

    #[test]
    fn test_bytes_render_as_base64() {
        let sample = Sample {
            data: b"hi".to_vec(),
            params: None,
            parts: vec![vec![1], vec![2, 3]],
        };
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["data"], "aGk=");
        assert!(json["params"].is_null());
        assert_eq!(json["parts"], serde_json::json!(["AQ==", "AgM="]));
        let back: Sample = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample);
    }

    #[test]
    fn test_missing_optional_field_defaults_to_none() {
        let back: Sample =
            serde_json::from_str(r#"{"data":"","parts":[]}"#).unwrap();
        assert_eq!(back.params, None);
    }
}
