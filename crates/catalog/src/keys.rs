//! Dataset key tuples and their normalization against a schema.

use std::collections::{BTreeMap, HashMap};

use crate::error::{CatalogError, Result};
use crate::schema::KeySchema;

/// Key values of a dataset in schema order.
pub type KeyTuple = Vec<String>;

/// Keys as given by a caller: positional (schema order) or by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyInput {
    Positional(Vec<String>),
    Named(BTreeMap<String, String>),
}

impl KeySchema {
    /// Resolve caller keys into a key tuple in schema order.
    ///
    /// Positional keys map one to one onto the schema; named keys must name
    /// every schema key exactly once.
    pub fn normalize(&self, keys: impl Into<KeyInput>) -> Result<KeyTuple> {
        match keys.into() {
            KeyInput::Positional(values) => {
                if values.len() != self.len() {
                    return Err(CatalogError::key_mismatch(format!(
                        "expected {} keys ({}), got {}",
                        self.len(),
                        self.names().join(", "),
                        values.len()
                    )));
                }
                Ok(values)
            }
            KeyInput::Named(mut named) => {
                if let Some(unknown) = named.keys().find(|name| !self.contains(name)) {
                    return Err(CatalogError::key_mismatch(format!(
                        "unknown key '{}'",
                        unknown
                    )));
                }

                self.names()
                    .into_iter()
                    .map(|name| {
                        named.remove(name).ok_or_else(|| {
                            CatalogError::key_mismatch(format!("missing value for key '{}'", name))
                        })
                    })
                    .collect()
            }
        }
    }

    /// Name the values of a key tuple.
    pub fn label(&self, keys: &[String]) -> BTreeMap<String, String> {
        self.names()
            .into_iter()
            .map(str::to_string)
            .zip(keys.iter().cloned())
            .collect()
    }
}

impl From<Vec<String>> for KeyInput {
    fn from(values: Vec<String>) -> Self {
        Self::Positional(values)
    }
}

impl From<&[String]> for KeyInput {
    fn from(values: &[String]) -> Self {
        Self::Positional(values.to_vec())
    }
}

impl From<&Vec<String>> for KeyInput {
    fn from(values: &Vec<String>) -> Self {
        Self::Positional(values.clone())
    }
}

impl From<Vec<&str>> for KeyInput {
    fn from(values: Vec<&str>) -> Self {
        Self::Positional(values.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for KeyInput {
    fn from(values: &[&str]) -> Self {
        Self::Positional(values.iter().map(|v| v.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for KeyInput {
    fn from(values: [&str; N]) -> Self {
        Self::Positional(values.iter().map(|v| v.to_string()).collect())
    }
}

impl From<BTreeMap<String, String>> for KeyInput {
    fn from(named: BTreeMap<String, String>) -> Self {
        Self::Named(named)
    }
}

impl From<HashMap<String, String>> for KeyInput {
    fn from(named: HashMap<String, String>) -> Self {
        Self::Named(named.into_iter().collect())
    }
}

impl<const N: usize> From<[(&str, &str); N]> for KeyInput {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self::Named(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> KeySchema {
        KeySchema::new(["sensor", "date", "band"]).unwrap()
    }

    #[test]
    fn test_positional_keys() {
        let keys = schema().normalize(["S2", "20240101", "B04"]).unwrap();
        assert_eq!(keys, vec!["S2", "20240101", "B04"]);
    }

    #[test]
    fn test_named_keys_are_reordered() {
        let keys = schema()
            .normalize([("band", "B04"), ("sensor", "S2"), ("date", "20240101")])
            .unwrap();
        assert_eq!(keys, vec!["S2", "20240101", "B04"]);
    }

    #[test]
    fn test_wrong_count_rejected() {
        let err = schema().normalize(["S2", "20240101"]).unwrap_err();
        assert!(matches!(err, CatalogError::KeyMismatch(_)));
    }

    #[test]
    fn test_unknown_or_missing_names_rejected() {
        let err = schema()
            .normalize([("sensor", "S2"), ("date", "x"), ("bnd", "B04")])
            .unwrap_err();
        assert!(matches!(err, CatalogError::KeyMismatch(_)));

        let err = schema()
            .normalize([("sensor", "S2"), ("date", "x")])
            .unwrap_err();
        assert!(matches!(err, CatalogError::KeyMismatch(_)));
    }

    #[test]
    fn test_label() {
        let labelled = schema().label(&["S2".into(), "20240101".into(), "B04".into()]);
        assert_eq!(labelled["band"], "B04");
        assert_eq!(labelled.len(), 3);
    }
}
