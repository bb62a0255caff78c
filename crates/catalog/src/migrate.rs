//! Explicit catalog version upgrades.

use serde::Serialize;
use tracing::info;

use crate::catalog::Catalog;
use crate::error::{CatalogError, Result};
use crate::session::Session;
use crate::version::Version;

/// Result of a migration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationOutcome {
    pub from: String,
    pub to: String,
    pub changed: bool,
}

impl Catalog {
    /// Restamp the catalog with `target` (default: the engine version).
    ///
    /// Refuses targets newer than the engine and downgrades. Opens the
    /// catalog without a version check, since migrating incompatible
    /// catalogs is the point.
    pub async fn migrate(&self, target: Option<&str>) -> Result<MigrationOutcome> {
        let mut session = self.connect(false).await?;
        let result = migrate_session(&mut session, target).await;
        session.close(result).await
    }
}

/// Restamp the catalog behind an open session.
pub async fn migrate_session(
    session: &mut Session,
    target: Option<&str>,
) -> Result<MigrationOutcome> {
    let engine = Version::current();
    let target = match target {
        Some(raw) => Version::parse(raw).ok_or_else(|| {
            CatalogError::Migration(format!("cannot parse target version '{}'", raw))
        })?,
        None => engine,
    };

    if target > engine {
        return Err(CatalogError::Migration(format!(
            "target version {} is newer than engine version {}",
            target, engine
        )));
    }

    let from_raw = session.db_version().to_string();
    let from = Version::parse(&from_raw).ok_or_else(|| {
        CatalogError::invalid_database(format!("unparseable catalog version '{}'", from_raw))
    })?;

    if target < from {
        return Err(CatalogError::Migration(format!(
            "refusing to downgrade catalog from {} to {}",
            from, target
        )));
    }

    if target == from {
        return Ok(MigrationOutcome {
            from: from_raw,
            to: target.to_string(),
            changed: false,
        });
    }

    session.set_version(&target.to_string()).await?;
    info!(path = %session.path(), from = %from, to = %target, "Migrated catalog");

    Ok(MigrationOutcome {
        from: from_raw,
        to: target.to_string(),
        changed: true,
    })
}
