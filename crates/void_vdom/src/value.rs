//! Dynamic prop values
//!
//! Props are stored as an ordered map of [`Value`]s so that two nodes with
//! the same props always hash and compare the same way, independent of the
//! order in which the producer inserted them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::Hasher;

/// Ordered prop map of a node
pub type Props = BTreeMap<String, Value>;

/// A dynamic value that can represent any prop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Null/None value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (i64 for wide compatibility)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Array of values
    Array(Vec<Value>),
    /// Raw bytes, serialized as `{"$bytes": "<base64>"}`.
    /// Declared before `Object` so the marker wins when deserializing.
    #[serde(with = "base64_serde")]
    Bytes(Vec<u8>),
    /// Object/map of values
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Create a null value
    pub fn null() -> Self {
        Self::Null
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as i64
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    /// Try to get as f64
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as array
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Try to get as object
    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Get a field from an object value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object()?.get(key)
    }

    /// Feed a normalized form of this value into a hasher.
    ///
    /// Floats hash by bit pattern with `-0.0` folded into `0.0` and every NaN
    /// folded into one canonical NaN, so equal-looking props hash equally.
    pub fn hash_into<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Null => state.write_u8(0),
            Self::Bool(b) => {
                state.write_u8(1);
                state.write_u8(*b as u8);
            }
            Self::Int(i) => {
                state.write_u8(2);
                state.write_i64(*i);
            }
            Self::Float(f) => {
                state.write_u8(3);
                state.write_u64(canonical_float_bits(*f));
            }
            Self::String(s) => {
                state.write_u8(4);
                state.write(s.as_bytes());
                state.write_u8(0xff);
            }
            Self::Array(items) => {
                state.write_u8(5);
                state.write_usize(items.len());
                for item in items {
                    item.hash_into(state);
                }
            }
            Self::Object(map) => {
                state.write_u8(6);
                state.write_usize(map.len());
                for (key, value) in map {
                    state.write(key.as_bytes());
                    state.write_u8(0xff);
                    value.hash_into(state);
                }
            }
            Self::Bytes(bytes) => {
                state.write_u8(7);
                state.write_usize(bytes.len());
                state.write(bytes);
            }
        }
    }
}

fn canonical_float_bits(f: f64) -> u64 {
    if f.is_nan() {
        f64::NAN.to_bits()
    } else if f == 0.0 {
        0.0f64.to_bits()
    } else {
        f.to_bits()
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map: BTreeMap<String, Value> = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::Object(map)
    }
}

/// Helper module for base64 serialization of bytes
mod base64_serde {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Single-field wrapper that keeps bytes distinct from strings
    #[derive(Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Tagged {
        #[serde(rename = "$bytes")]
        encoded: String,
    }

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        Tagged {
            encoded: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let tagged = Tagged::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(&tagged.encoded)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(value: &Value) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash_into(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_value_types() {
        assert!(Value::null().is_null());
        assert_eq!(Value::from(42).as_int(), Some(42));
        assert_eq!(Value::from(3.5).as_float(), Some(3.5));
        assert_eq!(Value::from("hello").as_str(), Some("hello"));
    }

    #[test]
    fn test_object_value() {
        let obj: Value = [("x", Value::from(1.0)), ("y", Value::from(2.0))]
            .into_iter()
            .collect();

        assert_eq!(obj.get("x").and_then(|v| v.as_float()), Some(1.0));
    }

    #[test]
    fn test_hash_normalizes_floats() {
        assert_eq!(hash_of(&Value::from(0.0)), hash_of(&Value::from(-0.0)));
        assert_eq!(hash_of(&Value::Float(f64::NAN)), hash_of(&Value::Float(-f64::NAN)));
        assert_ne!(hash_of(&Value::from(1.0)), hash_of(&Value::from(1)));
    }

    #[test]
    fn test_hash_is_insertion_order_independent() {
        let a: Value = [("a", 1), ("b", 2)].into_iter().collect();
        let b: Value = [("b", 2), ("a", 1)].into_iter().collect();
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_serde_round_trip_keeps_variants() {
        let values = vec![
            Value::Null,
            Value::Bool(true),
            Value::Int(-7),
            Value::Float(2.5),
            Value::from("AQID"),
            Value::from(vec![1, 2]),
            Value::Bytes(vec![1, 2, 3]),
            [("k", Value::Bytes(vec![0xff]))].into_iter().collect(),
        ];
        for value in values {
            let json = serde_json::to_string(&value).unwrap();
            let back: Value = serde_json::from_str(&json).unwrap();
            assert_eq!(back, value, "{}", json);
        }
    }

    #[test]
    fn test_bytes_encoding() {
        let json = serde_json::to_string(&Value::Bytes(vec![1, 2, 3])).unwrap();
        assert_eq!(json, r#"{"$bytes":"AQID"}"#);

        // An object with extra fields stays an object
        let value: Value = serde_json::from_str(r#"{"$bytes":"AQID","x":1}"#).unwrap();
        assert!(value.as_object().is_some());
    }

    #[test]
    fn test_string_boundaries_hash_differently() {
        let a = Value::from(vec!["ab", "c"]);
        let b = Value::from(vec!["a", "bc"]);
        assert_ne!(hash_of(&a), hash_of(&b));
    }
}
