//! End-to-end tests for the raster driver over real Zarr rasters.

use catalog::{CatalogError, KeyFilter, KeySchema, Page};
use raster_common::BoundingBox;
use raster_driver::{DriverError, DriverSettings, InsertOptions, RasterDriver};
use serde_json::{json, Map};
use test_utils::{create_test_grid, TempRaster, ZarrRasterFixture};
use tile_engine::{MetadataOptions, TileError, TileRequest};

const WIDTH: usize = 20;
const HEIGHT: usize = 10;

/// Values are `col * 1000 + row`, so the range is `[0, 19009]`.
fn scene() -> TempRaster {
    let bbox = BoundingBox::new(0.0, 0.0, 20.0, 10.0);
    TempRaster::write(
        &ZarrRasterFixture::new(create_test_grid(WIDTH, HEIGHT), WIDTH, HEIGHT, bbox)
            .chunk_shape(4, 8),
    )
    .expect("failed to write raster")
}

async fn driver(name: &str) -> RasterDriver {
    let driver = RasterDriver::open(&format!("memory://{}", name), DriverSettings::default())
        .await
        .unwrap();
    driver
        .create(&KeySchema::new(["sensor", "date"]).unwrap())
        .await
        .unwrap();
    driver
}

#[tokio::test]
async fn test_insert_and_query_workflow() {
    let driver = driver("workflow").await;
    let raster = scene();

    driver
        .insert(["S2", "20240101"], &raster.locator(), InsertOptions::default())
        .await
        .unwrap();
    driver
        .insert(
            [("date", "20240102"), ("sensor", "L8")],
            &raster.locator(),
            InsertOptions::default().skip_metadata(),
        )
        .await
        .unwrap();

    let keys = driver.key_names().await.unwrap();
    assert_eq!(keys, vec!["sensor", "date"]);

    let all = driver.get_datasets(&KeyFilter::new(), Page::all()).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(
        all.keys().cloned().collect::<Vec<_>>(),
        vec![
            vec!["L8".to_string(), "20240102".to_string()],
            vec!["S2".to_string(), "20240101".to_string()],
        ]
    );

    let s2 = driver
        .get_datasets(&KeyFilter::new().eq("sensor", "S2"), Page::all())
        .await
        .unwrap();
    assert_eq!(s2.len(), 1);
    assert_eq!(
        s2.get(&vec!["S2".to_string(), "20240101".to_string()]),
        Some(&raster.locator())
    );

    let metadata = driver
        .get_metadata(["S2", "20240101"])
        .await
        .unwrap()
        .expect("metadata stored on insert");
    assert_eq!(metadata.range, (0.0, 19009.0));
    assert_eq!(metadata.valid_percentage, 100.0);
    assert_eq!(metadata.percentiles.len(), 99);
    assert_eq!(metadata.bounds_tuple(), (0.0, 0.0, 20.0, 10.0));
}

#[tokio::test]
async fn test_lazy_metadata_is_computed_and_stored() {
    let driver = driver("lazy").await;
    let raster = scene();

    driver
        .insert(
            ["S2", "20240101"],
            &raster.locator(),
            InsertOptions::default().skip_metadata(),
        )
        .await
        .unwrap();

    let mut session = driver.connect().await.unwrap();
    assert!(session.metadata(["S2", "20240101"]).await.unwrap().is_none());
    session.rollback().await.unwrap();

    let metadata = driver
        .get_metadata(["S2", "20240101"])
        .await
        .unwrap()
        .expect("metadata computed on first access");
    assert_eq!(metadata.range, (0.0, 19009.0));

    let mut session = driver.connect().await.unwrap();
    let stored = session.metadata(["S2", "20240101"]).await.unwrap();
    session.rollback().await.unwrap();
    assert_eq!(stored, Some(metadata));
}

#[tokio::test]
async fn test_missing_dataset_has_no_metadata() {
    let driver = driver("missing").await;
    assert!(driver.get_metadata(["S2", "19990101"]).await.unwrap().is_none());
}

#[tokio::test]
async fn test_override_path_and_extra_metadata() {
    let driver = driver("override").await;
    let raster = scene();

    let mut extra = Map::new();
    extra.insert("platform".to_string(), json!("sentinel-2"));

    driver
        .insert(
            ["S2", "20240101"],
            &raster.locator(),
            InsertOptions::default()
                .override_path("s3://bucket/s2.zarr")
                .extra_metadata(extra)
                .compute(MetadataOptions::exact()),
        )
        .await
        .unwrap();

    let datasets = driver.get_datasets(&KeyFilter::new(), Page::all()).await.unwrap();
    assert_eq!(
        datasets.values().cloned().collect::<Vec<_>>(),
        vec!["s3://bucket/s2.zarr".to_string()]
    );

    let metadata = driver.get_metadata(["S2", "20240101"]).await.unwrap().unwrap();
    assert_eq!(metadata.metadata.get("platform"), Some(&json!("sentinel-2")));
    assert_eq!(metadata.range, (0.0, 19009.0));
}

#[tokio::test]
async fn test_explicit_metadata_is_stored_as_given() {
    let driver = driver("explicit").await;
    let raster = scene();

    let computed = driver
        .compute_metadata(&raster.locator(), MetadataOptions::exact(), None)
        .await
        .unwrap();

    let mut extra = Map::new();
    extra.insert("source".to_string(), json!("manual"));

    driver
        .insert(
            ["S2", "20240101"],
            "/does/not/exist.zarr",
            InsertOptions::default()
                .with_metadata(computed.clone())
                .extra_metadata(extra),
        )
        .await
        .unwrap();

    let stored = driver.get_metadata(["S2", "20240101"]).await.unwrap().unwrap();
    assert_eq!(stored.range, computed.range);
    assert_eq!(stored.metadata.get("source"), Some(&json!("manual")));
}

#[tokio::test]
async fn test_bad_keys_rejected_before_reading_raster() {
    let driver = driver("badkeys").await;

    let err = driver
        .insert(["S2"], "/does/not/exist.zarr", InsertOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DriverError::Catalog(CatalogError::KeyMismatch(_))));
}

#[tokio::test]
async fn test_failed_insert_stores_nothing() {
    let driver = driver("failed").await;

    let err = driver
        .insert(["S2", "20240101"], "/does/not/exist.zarr", InsertOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DriverError::Raster(TileError::OpenFailed(_))));

    let datasets = driver.get_datasets(&KeyFilter::new(), Page::all()).await.unwrap();
    assert!(datasets.is_empty());
}

#[tokio::test]
async fn test_delete() {
    let driver = driver("delete").await;
    let raster = scene();

    driver
        .insert(
            ["S2", "20240101"],
            &raster.locator(),
            InsertOptions::default().skip_metadata(),
        )
        .await
        .unwrap();

    assert!(driver.delete(["S2", "20240101"]).await.unwrap());
    assert!(!driver.delete(["S2", "20240101"]).await.unwrap());
    assert!(driver
        .get_datasets(&KeyFilter::new(), Page::all())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_tile_by_keys() {
    let driver = driver("tiles").await;
    let raster = scene();

    driver
        .insert(
            ["S2", "20240101"],
            &raster.locator(),
            InsertOptions::default().skip_metadata(),
        )
        .await
        .unwrap();

    let request = TileRequest::default()
        .with_size(HEIGHT, WIDTH)
        .preserve_values(true);

    let sync = driver
        .get_raster_tile(["S2", "20240101"], &request)
        .await
        .unwrap();
    assert!(!sync.is_deferred());
    let sync = sync.into_ready().unwrap();
    assert_eq!(sync.shape(), (HEIGHT, WIDTH));
    assert_eq!(sync.get(0, 0), Some(0.0));
    assert_eq!(sync.get(HEIGHT - 1, WIDTH - 1), Some(19009.0));

    let deferred = driver
        .get_raster_tile(["S2", "20240101"], &request.clone().asynchronous(true))
        .await
        .unwrap();
    assert!(deferred.is_deferred());
    let tile = deferred.resolve().await.unwrap();
    assert_eq!(tile, sync);
}

#[tokio::test]
async fn test_concurrent_deferred_tiles() {
    use futures::stream::{self, StreamExt, TryStreamExt};

    let driver = driver("concurrent").await;
    let raster = scene();
    driver
        .insert(
            ["S2", "20240101"],
            &raster.locator(),
            InsertOptions::default().skip_metadata(),
        )
        .await
        .unwrap();

    let sizes = [(5, 10), (10, 20), (20, 40), (7, 3)];
    let driver_ref = &driver;
    let tiles: Vec<_> = stream::iter(sizes)
        .map(|(rows, cols)| async move {
            let request = TileRequest::default()
                .with_size(rows, cols)
                .asynchronous(true);
            driver_ref
                .get_raster_tile(["S2", "20240101"], &request)
                .await?
                .resolve()
                .await
                .map_err(DriverError::from)
        })
        .buffered(4)
        .try_collect()
        .await
        .unwrap();

    for ((rows, cols), tile) in sizes.into_iter().zip(tiles) {
        assert_eq!(tile.shape(), (rows, cols));
        let sync = driver
            .get_raster_tile(
                ["S2", "20240101"],
                &TileRequest::default().with_size(rows, cols),
            )
            .await
            .unwrap()
            .into_ready()
            .unwrap();
        assert_eq!(tile.mask, sync.mask);
        assert_eq!(
            tile.valid_values().collect::<Vec<_>>(),
            sync.valid_values().collect::<Vec<_>>()
        );
    }
}

#[tokio::test]
async fn test_tile_errors() {
    let driver = driver("tile-errors").await;

    let err = driver
        .get_raster_tile(["S2", "20240101"], &TileRequest::default())
        .await
        .unwrap_err();
    match err {
        DriverError::DatasetNotFound(keys) => assert_eq!(keys, vec!["S2", "20240101"]),
        other => panic!("expected DatasetNotFound, got {:?}", other),
    }

    // Size is checked before the lookup.
    let err = driver
        .get_raster_tile(["S2", "20240101"], &TileRequest::default().with_size(0, 256))
        .await
        .unwrap_err();
    assert!(matches!(err, DriverError::Raster(TileError::InvalidTileSize(_))));
}

#[tokio::test]
async fn test_session_batches_operations() {
    let driver = driver("batch").await;
    let raster = scene();

    let mut session = driver.connect().await.unwrap();
    for date in ["20240101", "20240102", "20240103"] {
        driver
            .insert_with(
                &mut session,
                ["S2", date],
                &raster.locator(),
                InsertOptions::default().skip_metadata(),
            )
            .await
            .unwrap();
    }
    let listed = driver
        .get_datasets_with(&mut session, &KeyFilter::new(), Page::new(0, 2))
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);
    session.rollback().await.unwrap();

    assert!(driver
        .get_datasets(&KeyFilter::new(), Page::all())
        .await
        .unwrap()
        .is_empty());

    let mut session = driver.connect().await.unwrap();
    driver
        .insert_with(
            &mut session,
            ["S2", "20240101"],
            &raster.locator(),
            InsertOptions::default().skip_metadata(),
        )
        .await
        .unwrap();
    let metadata = driver
        .get_metadata_with(&mut session, ["S2", "20240101"])
        .await
        .unwrap();
    assert!(metadata.is_some());
    session.commit().await.unwrap();

    assert_eq!(
        driver
            .get_datasets(&KeyFilter::new(), Page::all())
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_sqlite_catalog_persists() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("catalog.db");
    let url = format!("sqlite://{}", db.display());
    let raster = scene();

    let driver = RasterDriver::open(&url, DriverSettings::default()).await.unwrap();
    driver
        .create(&KeySchema::new(["sensor", "date"]).unwrap())
        .await
        .unwrap();
    driver
        .insert(["S2", "20240101"], &raster.locator(), InsertOptions::default())
        .await
        .unwrap();

    let normalized = db.display().to_string();
    assert_eq!(driver.path(), normalized);
    assert_eq!(driver.to_string(), format!("SqliteMetaStore('{}')", normalized));
    assert_eq!(RasterDriver::normalize_path(&url).await.unwrap(), normalized);

    let reopened = RasterDriver::open(&normalized, DriverSettings::default())
        .await
        .unwrap();
    let metadata = reopened.get_metadata(["S2", "20240101"]).await.unwrap().unwrap();
    assert_eq!(metadata.range, (0.0, 19009.0));
    assert_eq!(reopened.get_keys().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_migrate_at_current_version_is_noop() {
    let driver = driver("migrate").await;
    let before = driver.db_version().await.unwrap();

    let outcome = driver.migrate(None).await.unwrap();
    assert!(!outcome.changed);
    assert_eq!(outcome.from, before);
    assert_eq!(driver.db_version().await.unwrap(), before);
}

#[tokio::test]
async fn test_invalid_settings_rejected() {
    let settings = DriverSettings {
        max_connections: 0,
        ..DriverSettings::default()
    };
    let err = RasterDriver::open("memory://bad", settings).await.unwrap_err();
    assert!(matches!(err, DriverError::Config(_)));
}

async fn sqlite_driver(dir: &tempfile::TempDir) -> RasterDriver {
    let url = format!("sqlite://{}", dir.path().join("catalog.db").display());
    let driver = RasterDriver::open(&url, DriverSettings::default()).await.unwrap();
    driver
        .create(&KeySchema::new(["sensor", "date"]).unwrap())
        .await
        .unwrap();
    driver
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_inserts_on_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let driver = sqlite_driver(&dir).await;
    let raster = scene();

    let inserts: Vec<_> = (0..8)
        .map(|i| {
            let driver = driver.clone();
            let locator = raster.locator();
            tokio::spawn(async move {
                let date = format!("202401{:02}", i + 1);
                driver
                    .insert(["S2", date.as_str()], &locator, InsertOptions::default())
                    .await
            })
        })
        .collect();
    for insert in inserts {
        insert.await.unwrap().unwrap();
    }

    let all = driver.get_datasets(&KeyFilter::new(), Page::all()).await.unwrap();
    assert_eq!(all.len(), 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_lazy_metadata_on_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let driver = sqlite_driver(&dir).await;
    let raster = scene();

    driver
        .insert(
            ["S2", "20240101"],
            &raster.locator(),
            InsertOptions::default().skip_metadata(),
        )
        .await
        .unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let driver = driver.clone();
            tokio::spawn(async move { driver.get_metadata(["S2", "20240101"]).await })
        })
        .collect();
    for reader in readers {
        let metadata = reader.await.unwrap().unwrap().expect("dataset exists");
        assert_eq!(metadata.range, (0.0, 19009.0));
    }

    let mut session = driver.connect().await.unwrap();
    assert!(session.metadata(["S2", "20240101"]).await.unwrap().is_some());
    session.rollback().await.unwrap();
}

#[tokio::test]
async fn test_metadata_bounds_and_hull_of_lonlat_raster() {
    let driver = driver("extent").await;
    let bbox = BoundingBox::new(10.0, 40.0, 20.0, 50.0);
    let raster = TempRaster::write(&ZarrRasterFixture::new(
        create_test_grid(16, 16),
        16,
        16,
        bbox,
    ))
    .unwrap();

    driver
        .insert(["A", "2020-01-01"], &raster.locator(), InsertOptions::default())
        .await
        .unwrap();

    let metadata = driver.get_metadata(["A", "2020-01-01"]).await.unwrap().unwrap();
    assert_eq!(metadata.bounds_tuple(), (10.0, 40.0, 20.0, 50.0));
    let hull = metadata.convex_hull.exterior();
    assert!(hull.len() >= 4);
    for [lon, lat] in hull {
        assert!((10.0..=20.0).contains(lon) && (40.0..=50.0).contains(lat));
    }
}
