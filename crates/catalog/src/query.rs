//! Dataset filters and pagination.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{CatalogError, Result};
use crate::schema::KeySchema;

/// Restricts datasets by key values.
///
/// Values given for the same key are alternatives (OR); conditions on
/// different keys must all hold (AND). An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyFilter {
    conditions: BTreeMap<String, BTreeSet<String>>,
}

impl KeyFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to equal `value` (or any other value already given for it).
    pub fn eq(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions
            .entry(key.into())
            .or_default()
            .insert(value.into());
        self
    }

    /// Require `key` to equal one of `values`. An empty set matches nothing.
    pub fn any_of<I, V>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.conditions
            .entry(key.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.conditions.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Check that every filtered key exists in the schema.
    pub fn validate(&self, schema: &KeySchema) -> Result<()> {
        match self.conditions.keys().find(|key| !schema.contains(key)) {
            Some(unknown) => Err(CatalogError::UnknownKey(unknown.clone())),
            None => Ok(()),
        }
    }

    /// Evaluate the filter against a key tuple in schema order.
    pub fn matches(&self, schema: &KeySchema, keys: &[String]) -> bool {
        self.conditions.iter().all(|(name, values)| {
            schema
                .position(name)
                .and_then(|idx| keys.get(idx))
                .map(|value| values.contains(value))
                .unwrap_or(false)
        })
    }
}

/// Page selection over the canonical dataset ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    /// Zero-based page index. Ignored without a limit.
    pub page: u64,
    /// Page size. `None` returns everything.
    pub limit: Option<u64>,
}

impl Page {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page,
            limit: Some(limit),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.limit == Some(0) {
            return Err(CatalogError::invalid_pagination("limit must be positive"));
        }
        self.sql_bounds().map(|_| ())
    }

    /// `(limit, offset)` as signed SQL integers, or `None` without a limit.
    ///
    /// Fails when either does not fit in an `i64`; SQLite reads a negative
    /// limit as "no limit".
    pub fn sql_bounds(&self) -> Result<Option<(i64, i64)>> {
        let Some(limit) = self.limit else {
            return Ok(None);
        };
        let offset = self.page.checked_mul(limit).ok_or_else(|| {
            CatalogError::invalid_pagination(format!(
                "page {} with limit {} overflows",
                self.page, limit
            ))
        })?;

        let limit = i64::try_from(limit).map_err(|_| {
            CatalogError::invalid_pagination(format!("limit {} is too large", limit))
        })?;
        let offset = i64::try_from(offset).map_err(|_| {
            CatalogError::invalid_pagination(format!("offset {} is too large", offset))
        })?;
        Ok(Some((limit, offset)))
    }

    /// Number of datasets skipped before this page.
    pub fn offset(&self) -> u64 {
        match self.limit {
            Some(limit) => self.page.saturating_mul(limit),
            None => 0,
        }
    }

    /// Select this page out of an ordered sequence.
    pub fn apply<I: Iterator>(&self, items: I) -> impl Iterator<Item = I::Item> {
        let limit = self.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        items.skip(self.offset() as usize).take(limit)
    }
}
