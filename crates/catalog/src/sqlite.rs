//! SQLite backing store using sqlx.
//!
//! Layout:
//! - `catalog_info(version, created_at)`
//! - `key_names(key_name, description, idx)`
//! - `datasets(key_<i>..., filepath)`
//! - `metadata(key_<i>..., bounds_*, convex_hull, valid_percentage,
//!   value_min, value_max, mean, stdev, percentiles, metadata)`
//!
//! Key columns are named by position (`key_0`, `key_1`, ...) since SQLite
//! column names are case-insensitive while key names are not.
//!
//! Every session runs inside one `BEGIN IMMEDIATE` transaction, so the write
//! lock is taken up front and concurrent writers queue on the busy timeout
//! rather than failing on a lock upgrade.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{FromRow, Row, Sqlite, Transaction};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use raster_common::{BoundingBox, DatasetMetadata, Polygon};

use crate::error::{CatalogError, Result};
use crate::keys::KeyTuple;
use crate::query::{KeyFilter, Page};
use crate::schema::KeySchema;
use crate::store::{CatalogInfo, MetaStore, OpenMode, StoreConnection, StoreOptions};

const MEMORY_PATH: &str = ":memory:";

const BEGIN_WRITE: &str = "BEGIN IMMEDIATE";

#[derive(Debug)]
enum Location {
    File(PathBuf),
    Memory,
}

/// Catalog stored in a single SQLite database file.
#[derive(Debug)]
pub struct SqliteMetaStore {
    path: String,
    location: Location,
    options: StoreOptions,
    pool: OnceCell<SqlitePool>,
}

impl SqliteMetaStore {
    /// Store backed by the database file at `path`. The file is only created
    /// when a catalog is created.
    pub fn new(path: &str, options: StoreOptions) -> Result<Self> {
        let absolute = std::path::absolute(path)
            .map_err(|e| CatalogError::InvalidUrl(format!("{}: {}", path, e)))?;

        Ok(Self {
            path: absolute.to_string_lossy().into_owned(),
            location: Location::File(absolute),
            options,
            pool: OnceCell::new(),
        })
    }

    /// Open an in-memory database (for testing).
    ///
    /// The pool holds a single connection that is never recycled, so the
    /// database lives as long as the store.
    pub async fn open_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(MEMORY_PATH)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self {
            path: MEMORY_PATH.to_string(),
            location: Location::Memory,
            options: StoreOptions::default(),
            pool: OnceCell::from(pool),
        })
    }

    async fn pool(&self, mode: OpenMode) -> Result<&SqlitePool> {
        let file = match &self.location {
            Location::File(file) => file,
            Location::Memory => {
                return self
                    .pool
                    .get()
                    .ok_or_else(|| CatalogError::invalid_database("in-memory database is gone"))
            }
        };

        if mode == OpenMode::Existing && !file.exists() {
            return Err(CatalogError::invalid_database(format!(
                "no catalog found at {}",
                self.path
            )));
        }

        self.pool
            .get_or_try_init(|| async {
                let options = SqliteConnectOptions::new()
                    .filename(file)
                    .create_if_missing(true)
                    .busy_timeout(self.options.busy_timeout);

                let pool = SqlitePoolOptions::new()
                    .max_connections(self.options.max_connections)
                    .acquire_timeout(self.options.connect_timeout)
                    .connect_with(options)
                    .await?;

                info!(path = %self.path, "Opened SQLite catalog database");
                Ok::<_, CatalogError>(pool)
            })
            .await
    }
}

#[async_trait]
impl MetaStore for SqliteMetaStore {
    fn driver_name(&self) -> &'static str {
        "SqliteMetaStore"
    }

    fn path(&self) -> &str {
        &self.path
    }

    async fn begin(&self, mode: OpenMode) -> Result<Box<dyn StoreConnection>> {
        let tx = self.pool(mode).await?.begin_with(BEGIN_WRITE).await?;
        debug!(path = %self.path, "Began SQLite transaction");
        Ok(Box::new(SqliteStoreConnection { tx }))
    }
}

struct SqliteStoreConnection {
    tx: Transaction<'static, Sqlite>,
}

/// Column holding the key at `position` in schema order.
fn key_column(position: usize) -> String {
    format!("key_{}", position)
}

fn key_columns(schema: &KeySchema) -> Vec<String> {
    (0..schema.len()).map(key_column).collect()
}

fn key_predicate(schema: &KeySchema) -> String {
    key_columns(schema)
        .iter()
        .map(|c| format!("{} = ?", c))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn read_keys(row: &SqliteRow, count: usize) -> Result<KeyTuple> {
    (0..count)
        .map(|i| row.try_get::<String, _>(i).map_err(CatalogError::from))
        .collect()
}

#[derive(FromRow)]
struct MetadataRow {
    bounds_west: f64,
    bounds_south: f64,
    bounds_east: f64,
    bounds_north: f64,
    convex_hull: String,
    valid_percentage: f64,
    value_min: f64,
    value_max: f64,
    mean: f64,
    stdev: f64,
    percentiles: Vec<u8>,
    metadata: String,
}

impl MetadataRow {
    fn into_metadata(self) -> Result<DatasetMetadata> {
        if self.percentiles.len() % std::mem::size_of::<f64>() != 0 {
            return Err(CatalogError::invalid_database(format!(
                "percentile blob has {} bytes",
                self.percentiles.len()
            )));
        }

        let convex_hull: Polygon = serde_json::from_str(&self.convex_hull)?;
        let metadata: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&self.metadata)?;

        Ok(DatasetMetadata {
            range: (self.value_min, self.value_max),
            bounds: BoundingBox::new(
                self.bounds_west,
                self.bounds_south,
                self.bounds_east,
                self.bounds_north,
            ),
            convex_hull,
            valid_percentage: self.valid_percentage,
            percentiles: bytemuck::pod_collect_to_vec(&self.percentiles),
            mean: self.mean,
            stdev: self.stdev,
            metadata,
        })
    }
}

impl SqliteStoreConnection {
    async fn write_metadata(
        &mut self,
        schema: &KeySchema,
        keys: &KeyTuple,
        metadata: &DatasetMetadata,
    ) -> Result<()> {
        let sql = format!(
            "INSERT OR REPLACE INTO metadata ({}, bounds_west, bounds_south, bounds_east, \
             bounds_north, convex_hull, valid_percentage, value_min, value_max, mean, stdev, \
             percentiles, metadata) VALUES ({})",
            key_columns(schema).join(", "),
            placeholders(schema.len() + 12)
        );

        let convex_hull = serde_json::to_string(&metadata.convex_hull)?;
        let extra = serde_json::to_string(&metadata.metadata)?;
        let percentiles = bytemuck::cast_slice::<f64, u8>(&metadata.percentiles).to_vec();

        let mut query = sqlx::query(&sql);
        for key in keys {
            query = query.bind(key);
        }
        query
            .bind(metadata.bounds.min_x)
            .bind(metadata.bounds.min_y)
            .bind(metadata.bounds.max_x)
            .bind(metadata.bounds.max_y)
            .bind(convex_hull)
            .bind(metadata.valid_percentage)
            .bind(metadata.min())
            .bind(metadata.max())
            .bind(metadata.mean)
            .bind(metadata.stdev)
            .bind(percentiles)
            .bind(extra)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn delete_where_keys(
        &mut self,
        table: &str,
        schema: &KeySchema,
        keys: &KeyTuple,
    ) -> Result<u64> {
        let sql = format!("DELETE FROM {} WHERE {}", table, key_predicate(schema));
        let mut query = sqlx::query(&sql);
        for key in keys {
            query = query.bind(key);
        }
        Ok(query.execute(&mut *self.tx).await?.rows_affected())
    }
}

#[async_trait]
impl StoreConnection for SqliteStoreConnection {
    async fn read_info(&mut self) -> Result<Option<CatalogInfo>> {
        let table: Option<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'catalog_info'",
        )
        .fetch_optional(&mut *self.tx)
        .await?;

        if table.is_none() {
            return Ok(None);
        }

        let (version,): (String,) = sqlx::query_as("SELECT version FROM catalog_info LIMIT 1")
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| CatalogError::invalid_database("catalog_info holds no version"))?;

        let keys: Vec<(String, String)> =
            sqlx::query_as("SELECT key_name, description FROM key_names ORDER BY idx")
                .fetch_all(&mut *self.tx)
                .await?;

        let schema = KeySchema::define(keys.iter().map(|(name, _)| name.clone()), keys.clone())
            .map_err(|e| {
                CatalogError::invalid_database(format!("stored key schema is invalid: {}", e))
            })?;

        Ok(Some(CatalogInfo { version, schema }))
    }

    async fn initialize(&mut self, schema: &KeySchema, version: &str) -> Result<()> {
        sqlx::query("CREATE TABLE catalog_info (version TEXT NOT NULL, created_at TEXT NOT NULL)")
            .execute(&mut *self.tx)
            .await?;

        sqlx::query("INSERT INTO catalog_info (version, created_at) VALUES (?, ?)")
            .bind(version)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *self.tx)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE key_names (
                key_name TEXT PRIMARY KEY,
                description TEXT NOT NULL,
                idx INTEGER NOT NULL UNIQUE
            )
            "#,
        )
        .execute(&mut *self.tx)
        .await?;

        for (idx, key) in schema.keys().iter().enumerate() {
            sqlx::query("INSERT INTO key_names (key_name, description, idx) VALUES (?, ?, ?)")
                .bind(&key.name)
                .bind(&key.description)
                .bind(idx as i64)
                .execute(&mut *self.tx)
                .await?;
        }

        let columns = key_columns(schema);
        let key_defs = columns
            .iter()
            .map(|c| format!("{} TEXT NOT NULL", c))
            .collect::<Vec<_>>()
            .join(", ");
        let primary_key = columns.join(", ");

        sqlx::query(&format!(
            "CREATE TABLE datasets ({}, filepath TEXT NOT NULL, PRIMARY KEY ({}))",
            key_defs, primary_key
        ))
        .execute(&mut *self.tx)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE metadata (
                {},
                bounds_west REAL NOT NULL,
                bounds_south REAL NOT NULL,
                bounds_east REAL NOT NULL,
                bounds_north REAL NOT NULL,
                convex_hull TEXT NOT NULL,
                valid_percentage REAL NOT NULL,
                value_min REAL NOT NULL,
                value_max REAL NOT NULL,
                mean REAL NOT NULL,
                stdev REAL NOT NULL,
                percentiles BLOB NOT NULL,
                metadata TEXT NOT NULL,
                PRIMARY KEY ({})
            )
            "#,
            key_defs, primary_key
        ))
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn write_version(&mut self, version: &str) -> Result<()> {
        sqlx::query("UPDATE catalog_info SET version = ?")
            .bind(version)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn datasets(
        &mut self,
        schema: &KeySchema,
        filter: &KeyFilter,
        page: Page,
    ) -> Result<Vec<(KeyTuple, String)>> {
        let columns = key_columns(schema).join(", ");
        let mut sql = format!("SELECT {}, filepath FROM datasets", columns);

        let mut clauses = Vec::new();
        let mut values: Vec<&String> = Vec::new();
        for (name, alternatives) in filter.conditions() {
            if alternatives.is_empty() {
                clauses.push("0".to_string());
                continue;
            }
            let position = schema
                .position(name)
                .ok_or_else(|| CatalogError::UnknownKey(name.to_string()))?;
            clauses.push(format!(
                "{} IN ({})",
                key_column(position),
                placeholders(alternatives.len())
            ));
            values.extend(alternatives.iter());
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(&format!(" ORDER BY {}", columns));
        if page.limit.is_some() {
            sql.push_str(" LIMIT ? OFFSET ?");
        }

        let mut query = sqlx::query(&sql);
        for value in values {
            query = query.bind(value);
        }
        if let Some((limit, offset)) = page.sql_bounds()? {
            query = query.bind(limit).bind(offset);
        }

        let rows = query.fetch_all(&mut *self.tx).await?;
        rows.iter()
            .map(|row| {
                let keys = read_keys(row, schema.len())?;
                let path: String = row.try_get(schema.len())?;
                Ok((keys, path))
            })
            .collect()
    }

    async fn dataset_path(
        &mut self,
        schema: &KeySchema,
        keys: &KeyTuple,
    ) -> Result<Option<String>> {
        let sql = format!(
            "SELECT filepath FROM datasets WHERE {}",
            key_predicate(schema)
        );
        let mut query = sqlx::query_as::<_, (String,)>(&sql);
        for key in keys {
            query = query.bind(key);
        }
        Ok(query
            .fetch_optional(&mut *self.tx)
            .await?
            .map(|(path,)| path))
    }

    async fn metadata(
        &mut self,
        schema: &KeySchema,
        keys: &KeyTuple,
    ) -> Result<Option<DatasetMetadata>> {
        let sql = format!(
            "SELECT bounds_west, bounds_south, bounds_east, bounds_north, convex_hull, \
             valid_percentage, value_min, value_max, mean, stdev, percentiles, metadata \
             FROM metadata WHERE {}",
            key_predicate(schema)
        );
        let mut query = sqlx::query_as::<_, MetadataRow>(&sql);
        for key in keys {
            query = query.bind(key);
        }

        match query.fetch_optional(&mut *self.tx).await? {
            Some(row) => Ok(Some(row.into_metadata()?)),
            None => Ok(None),
        }
    }

    async fn upsert(
        &mut self,
        schema: &KeySchema,
        keys: &KeyTuple,
        path: &str,
        metadata: Option<&DatasetMetadata>,
    ) -> Result<()> {
        let sql = format!(
            "INSERT OR REPLACE INTO datasets ({}, filepath) VALUES ({})",
            key_columns(schema).join(", "),
            placeholders(schema.len() + 1)
        );
        let mut query = sqlx::query(&sql);
        for key in keys {
            query = query.bind(key);
        }
        query.bind(path).execute(&mut *self.tx).await?;

        match metadata {
            Some(metadata) => self.write_metadata(schema, keys, metadata).await,
            None => self
                .delete_where_keys("metadata", schema, keys)
                .await
                .map(|_| ()),
        }
    }

    async fn put_metadata(
        &mut self,
        schema: &KeySchema,
        keys: &KeyTuple,
        metadata: &DatasetMetadata,
    ) -> Result<()> {
        self.write_metadata(schema, keys, metadata).await
    }

    async fn remove(&mut self, schema: &KeySchema, keys: &KeyTuple) -> Result<bool> {
        self.delete_where_keys("metadata", schema, keys).await?;
        let removed = self.delete_where_keys("datasets", schema, keys).await?;
        Ok(removed > 0)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.tx.commit().await?;
        debug!("Committed SQLite transaction");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.tx.rollback().await?;
        debug!("Rolled back SQLite transaction");
        Ok(())
    }
}
