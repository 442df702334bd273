//! Fail-open wrapper for condition and effect clauses.
//!
//! Story files written for older builds sometimes carry clauses with the wrong
//! value shape (a string where a map is expected, say). Rather than rejecting the
//! whole story, such a clause deserializes to [`Lenient::Malformed`] and the engine
//! treats it as vacuously satisfied / skipped while reporting a diagnostic.

use serde::de::{Deserializer, IgnoredAny};
use serde::{Deserialize, Serialize, Serializer};

/// A clause value that either parsed as `T` or had an unrecognized shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lenient<T> {
    Valid(T),
    Malformed,
}

impl<T: Default> Default for Lenient<T> {
    fn default() -> Self {
        Lenient::Valid(T::default())
    }
}

impl<T> Lenient<T> {
    /// Borrow the parsed value, if the clause was well formed.
    pub fn valid(&self) -> Option<&T> {
        match self {
            Lenient::Valid(value) => Some(value),
            Lenient::Malformed => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Lenient::Malformed)
    }
}

impl<T> From<T> for Lenient<T> {
    fn from(value: T) -> Self {
        Lenient::Valid(value)
    }
}

impl<'de, T> Deserialize<'de> for Lenient<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr<T> {
            Valid(T),
            Other(IgnoredAny),
        }

        Ok(match Repr::<T>::deserialize(deserializer)? {
            Repr::Valid(value) => Lenient::Valid(value),
            Repr::Other(_) => Lenient::Malformed,
        })
    }
}

impl<T: Serialize> Serialize for Lenient<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Lenient::Valid(value) => value.serialize(serializer),
            Lenient::Malformed => serializer.serialize_unit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn well_formed_value_parses() {
        let parsed: Lenient<BTreeMap<String, i32>> = serde_json::from_str(r#"{"strength": 40}"#).unwrap();
        assert_eq!(parsed.valid().and_then(|map| map.get("strength")), Some(&40));
    }

    #[test]
    fn wrong_shape_becomes_malformed() {
        let parsed: Lenient<BTreeMap<String, i32>> = serde_json::from_str(r#""strength""#).unwrap();
        assert!(parsed.is_malformed());
        assert!(parsed.valid().is_none());
    }

    #[test]
    fn default_is_an_empty_valid_value() {
        let clause: Lenient<Vec<String>> = Lenient::default();
        assert_eq!(clause.valid().map(Vec::len), Some(0));
    }
}
