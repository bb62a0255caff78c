//! Ordered key schema of a catalog.

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};

/// Key names that collide with query parameters and can never be keys.
pub const RESERVED_KEYS: &[&str] = &["limit", "page"];

/// A single key of the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDefinition {
    pub name: String,
    pub description: String,
}

/// The ordered key names of a catalog with their descriptions.
///
/// Key order is fixed at creation and defines both the positional order of
/// key tuples and the canonical ordering of datasets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySchema {
    keys: Vec<KeyDefinition>,
}

impl KeySchema {
    /// Validate key names and descriptions and build a schema.
    ///
    /// Fails when a name is empty, not made of word characters, reserved or
    /// duplicated, or when a description references an undefined key.
    pub fn define<N, D, K, V>(key_names: N, descriptions: D) -> Result<Self>
    where
        N: IntoIterator,
        N::Item: Into<String>,
        D: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut keys: Vec<KeyDefinition> = Vec::new();

        for name in key_names {
            let name = name.into();
            validate_key_name(&name)?;
            if keys.iter().any(|k| k.name == name) {
                return Err(CatalogError::schema(format!("duplicate key name '{}'", name)));
            }
            keys.push(KeyDefinition {
                name,
                description: String::new(),
            });
        }

        if keys.is_empty() {
            return Err(CatalogError::schema("at least one key is required"));
        }

        for (key, description) in descriptions {
            let key = key.into();
            let slot = keys.iter_mut().find(|k| k.name == key).ok_or_else(|| {
                CatalogError::schema(format!("description given for unknown key '{}'", key))
            })?;
            slot.description = description.into();
        }

        Ok(Self { keys })
    }

    /// Schema without descriptions.
    pub fn new<N>(key_names: N) -> Result<Self>
    where
        N: IntoIterator,
        N::Item: Into<String>,
    {
        Self::define(key_names, std::iter::empty::<(String, String)>())
    }

    /// Ordered `(key_name, description)` pairs. Undescribed keys map to "".
    pub fn describe(&self) -> Vec<(String, String)> {
        self.keys
            .iter()
            .map(|k| (k.name.clone(), k.description.clone()))
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.keys.iter().map(|k| k.name.as_str()).collect()
    }

    pub fn keys(&self) -> &[KeyDefinition] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Position of a key in schema order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.keys.iter().position(|k| k.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }
}

fn validate_key_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CatalogError::schema("key names must not be empty"));
    }

    if !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(CatalogError::schema(format!(
            "key name '{}' must only contain letters, digits and underscores",
            name
        )));
    }

    if RESERVED_KEYS.contains(&name) {
        return Err(CatalogError::schema(format!(
            "key name '{}' is reserved (reserved: {})",
            name,
            RESERVED_KEYS.join(", ")
        )));
    }

    Ok(())
}
