//! Project-defined account attributes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AccountError, Result};

/// Field names owned by the account core. Attributes cannot shadow them.
pub const RESERVED_FIELDS: &[&str] = &[
    "id",
    "identifier",
    "password",
    "credential_hash",
    "is_active",
    "is_staff",
    "is_superuser",
    "joined_at",
    "last_authenticated_at",
];

/// Extensible attribute set, e.g. `birth_date` or `bio`.
///
/// Values are opaque to the core. Each key is optional on its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, Value>);

impl Attributes {
    /// Create an empty [`Attributes`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `key` and return `self`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Whether `key` holds a usable value.
    ///
    /// `null` and blank strings count as absent.
    pub fn is_supplied(&self, key: &str) -> bool {
        match self.0.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        }
    }

    /// Keys among `required` that are not supplied, in the given order.
    pub fn missing<S: AsRef<str>>(&self, required: &[S]) -> Vec<String> {
        required
            .iter()
            .map(AsRef::as_ref)
            .filter(|key| !self.is_supplied(key))
            .map(str::to_owned)
            .collect()
    }

    /// Reject keys colliding with core fields or with the identifier field.
    pub fn check_reserved(&self, identifier_field: &str) -> Result<()> {
        match self
            .0
            .keys()
            .find(|key| *key == identifier_field || RESERVED_FIELDS.contains(&key.as_str()))
        {
            Some(key) => Err(AccountError::ReservedAttribute { key: key.clone() }),
            None => Ok(()),
        }
    }

    /// Merge `changes` into this set. A `null` value removes the key.
    pub fn merge(&mut self, changes: Attributes) {
        for (key, value) in changes.0 {
            if value.is_null() {
                self.0.remove(&key);
            } else {
                self.0.insert(key, value);
            }
        }
    }

    /// Split changes into values to set and keys to remove (`null`).
    pub fn split_removals(&self) -> (Attributes, Vec<String>) {
        let (removed, kept): (Vec<_>, Vec<_>) =
            self.0.iter().partition(|(_, value)| value.is_null());

        (
            kept.into_iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            removed.into_iter().map(|(key, _)| key.clone()).collect(),
        )
    }

    /// String values, used as user inputs for strength estimation.
    pub fn text_values(&self) -> impl Iterator<Item = &str> {
        self.0.values().filter_map(Value::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_missing() {
        let attributes = Attributes::new()
            .with("given_name", "Ada")
            .with("family_name", "   ")
            .with("bio", Value::Null);

        assert_eq!(
            attributes.missing(&["given_name", "family_name", "bio", "birth_date"]),
            vec!["family_name", "bio", "birth_date"]
        );
        assert!(attributes.missing::<&str>(&[]).is_empty());
    }

    #[test]
    fn test_reserved() {
        let attributes = Attributes::new().with("is_staff", true);
        assert!(matches!(
            attributes.check_reserved("email"),
            Err(AccountError::ReservedAttribute { key }) if key == "is_staff"
        ));

        let attributes = Attributes::new().with("email", "x@example.com");
        assert!(attributes.check_reserved("email").is_err());
        assert!(attributes.check_reserved("login").is_ok());
    }

    #[test]
    fn test_merge() {
        let mut attributes = Attributes::new()
            .with("bio", "hello")
            .with("birth_date", "1990-01-01");
        attributes.merge(
            Attributes::new()
                .with("bio", Value::Null)
                .with("locale", "fr"),
        );

        assert_eq!(
            serde_json::to_value(&attributes).unwrap(),
            json!({ "birth_date": "1990-01-01", "locale": "fr" })
        );
    }

    #[test]
    fn test_split_removals() {
        let changes = Attributes::new()
            .with("bio", Value::Null)
            .with("locale", "fr");
        let (set, removed) = changes.split_removals();

        assert_eq!(serde_json::to_value(&set).unwrap(), json!({ "locale": "fr" }));
        assert_eq!(removed, vec!["bio"]);
    }
}
