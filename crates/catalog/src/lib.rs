//! Multi-key dataset catalog.
//!
//! A catalog indexes raster datasets by an ordered tuple of user-defined
//! keys. Each entry holds a storage locator and, usually, a metadata record.
//!
//! # Architecture
//!
//! ```text
//! Catalog ──connect()──► Session ──► Box<dyn StoreConnection>
//!    │                     │               ├─ SqliteMetaStore (sqlx, one transaction)
//!    │                     │               └─ MemoryMetaStore (staged writes)
//!    │                     └─ KeySchema / KeyFilter / Page validation
//!    └─ create(), migrate()
//! ```
//!
//! # Example
//!
//! ```ignore
//! use catalog::{Catalog, KeyFilter, KeySchema, Page, StoreOptions};
//!
//! let catalog = Catalog::open("sqlite:///data/catalog.db", &StoreOptions::default()).await?;
//! catalog.create(&KeySchema::new(["sensor", "date"])?).await?;
//!
//! let mut session = catalog.connect(true).await?;
//! session.insert(["S2", "20240101"], "/data/s2.zarr", None).await?;
//! let found = session.datasets(&KeyFilter::new().eq("sensor", "S2"), Page::all()).await?;
//! session.commit().await?;
//! ```

pub mod catalog;
pub mod error;
pub mod keys;
pub mod memory;
pub mod migrate;
pub mod query;
pub mod schema;
pub mod session;
pub mod sqlite;
pub mod store;
pub mod version;

pub use catalog::Catalog;
pub use error::{CatalogError, Result};
pub use keys::{KeyInput, KeyTuple};
pub use memory::MemoryMetaStore;
pub use migrate::{migrate_session, MigrationOutcome};
pub use query::{KeyFilter, Page};
pub use schema::{KeyDefinition, KeySchema, RESERVED_KEYS};
pub use session::Session;
pub use sqlite::SqliteMetaStore;
pub use store::{open_store, CatalogInfo, MetaStore, OpenMode, StoreConnection, StoreOptions};
pub use version::{check_compatible, Version, CATALOG_FORMAT_VERSION};
