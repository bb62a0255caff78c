//! Subcommand handlers.

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Map, Value};
use tracing::info;

use catalog::{KeyFilter, KeySchema, Page};
use raster_common::BoundingBox;
use raster_driver::{InsertOptions, RasterDriver};
use tile_engine::{parse_shape, MetadataOptions, RasterTile, TileRequest};

use crate::Command;

pub(crate) async fn run(driver: &RasterDriver, command: Command) -> Result<Value> {
    match command {
        Command::Create { keys } => {
            let (names, descriptions) = parse_key_definitions(&keys);
            let schema = KeySchema::define(names, descriptions)?;
            driver.create(&schema).await?;
            info!(catalog = %driver, "Catalog created");
            Ok(json!({
                "catalog": driver.path(),
                "keys": schema.names(),
            }))
        }

        Command::Ingest {
            path,
            keys,
            skip_metadata,
            override_path,
            extra,
            stats,
            max_shape,
        } => {
            let mut options = InsertOptions::default()
                .compute(metadata_options(&stats, max_shape.as_deref())?);
            if skip_metadata {
                options = options.skip_metadata();
            }
            if let Some(locator) = override_path {
                options = options.override_path(locator);
            }
            if let Some(raw) = extra {
                options = options.extra_metadata(parse_extra(&raw)?);
            }

            let keys = driver
                .insert(keys, &path, options)
                .await
                .with_context(|| format!("failed to ingest '{}'", path))?;
            Ok(json!({ "keys": keys, "path": path }))
        }

        Command::Keys => {
            let keys: Map<String, Value> = driver
                .get_keys()
                .await?
                .into_iter()
                .map(|(name, description)| (name, Value::String(description)))
                .collect();
            Ok(Value::Object(keys))
        }

        Command::List {
            filter,
            page,
            limit,
        } => {
            let filter = parse_filter(&filter)?;
            let page = match limit {
                Some(limit) => Page::new(page, limit),
                None => Page::all(),
            };

            let names = driver.key_names().await?;
            let datasets = driver.get_datasets(&filter, page).await?;
            let rows: Vec<Value> = datasets
                .into_iter()
                .map(|(keys, path)| {
                    let labelled: Map<String, Value> = names
                        .iter()
                        .cloned()
                        .zip(keys.into_iter().map(Value::String))
                        .collect();
                    json!({ "keys": labelled, "path": path })
                })
                .collect();
            Ok(Value::Array(rows))
        }

        Command::Metadata { keys } => {
            let metadata = driver.get_metadata(keys).await?;
            Ok(serde_json::to_value(metadata)?)
        }

        Command::Delete { keys } => {
            let removed = driver.delete(keys).await?;
            Ok(json!({ "removed": removed }))
        }

        Command::Tile {
            keys,
            bounds,
            size,
            preserve_values,
            values,
        } => {
            let mut request = driver
                .engine()
                .default_request()
                .preserve_values(preserve_values);
            if let Some(raw) = bounds {
                request.tile_bounds = Some(
                    BoundingBox::parse(&raw).map_err(|e| anyhow!("invalid --bounds: {}", e))?,
                );
            }
            if let Some(raw) = size {
                let (rows, cols) = parse_shape(&raw)
                    .ok_or_else(|| anyhow!("invalid --size '{}', expected ROWSxCOLS", raw))?;
                request = request.with_size(rows, cols);
            }

            let tile = driver.get_raster_tile(keys, &request).await?.resolve().await?;
            if values {
                Ok(serde_json::to_value(&tile)?)
            } else {
                Ok(tile_summary(&tile, &request))
            }
        }

        Command::Migrate { target } => {
            let outcome = driver.migrate(target.as_deref()).await?;
            Ok(serde_json::to_value(outcome)?)
        }
    }
}

/// Split `NAME` / `NAME=DESCRIPTION` arguments into names and descriptions.
fn parse_key_definitions(args: &[String]) -> (Vec<String>, Vec<(String, String)>) {
    let mut names = Vec::with_capacity(args.len());
    let mut descriptions = Vec::new();
    for arg in args {
        match arg.split_once('=') {
            Some((name, description)) => {
                names.push(name.to_string());
                descriptions.push((name.to_string(), description.to_string()));
            }
            None => names.push(arg.clone()),
        }
    }
    (names, descriptions)
}

/// Build a filter from `KEY=VALUE` arguments. Values for the same key are
/// alternatives.
fn parse_filter(args: &[String]) -> Result<KeyFilter> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for arg in args {
        let (key, value) = arg
            .split_once('=')
            .ok_or_else(|| anyhow!("invalid filter '{}', expected KEY=VALUE", arg))?;
        grouped
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
    }

    Ok(grouped
        .into_iter()
        .fold(KeyFilter::new(), |filter, (key, values)| filter.any_of(key, values)))
}

fn metadata_options(stats: &str, max_shape: Option<&str>) -> Result<MetadataOptions> {
    let mut options = match stats.to_lowercase().as_str() {
        "auto" => MetadataOptions::default(),
        "exact" => MetadataOptions::exact(),
        "chunked" => MetadataOptions::chunked(),
        other => bail!("unknown statistics policy '{}'", other),
    };

    if let Some(raw) = max_shape {
        let shape = parse_shape(raw)
            .ok_or_else(|| anyhow!("invalid --max-shape '{}', expected ROWSxCOLS", raw))?;
        options.max_shape = Some(shape);
    }
    Ok(options)
}

fn parse_extra(raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str(raw).context("--extra is not valid JSON")? {
        Value::Object(map) => Ok(map),
        _ => bail!("--extra must be a JSON object"),
    }
}

fn tile_summary(tile: &RasterTile, request: &TileRequest) -> Value {
    let (min, max) = tile
        .valid_values()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    let valid = tile.valid_count();
    let range = (valid > 0).then_some([min, max]);

    json!({
        "shape": [tile.height, tile.width],
        "interpolation": request.interpolation(),
        "valid_count": valid,
        "range": range,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_definitions() {
        let args = vec!["sensor=Satellite sensor".to_string(), "date".to_string()];
        let (names, descriptions) = parse_key_definitions(&args);
        assert_eq!(names, vec!["sensor", "date"]);
        assert_eq!(
            descriptions,
            vec![("sensor".to_string(), "Satellite sensor".to_string())]
        );
    }

    #[test]
    fn test_parse_filter() {
        let args = vec![
            "sensor=S2".to_string(),
            "sensor=L8".to_string(),
            "date=20240101".to_string(),
        ];
        let filter = parse_filter(&args).unwrap();
        let conditions: Vec<(String, Vec<String>)> = filter
            .conditions()
            .map(|(key, values)| (key.to_string(), values.iter().cloned().collect()))
            .collect();
        assert_eq!(
            conditions,
            vec![
                ("date".to_string(), vec!["20240101".to_string()]),
                ("sensor".to_string(), vec!["L8".to_string(), "S2".to_string()]),
            ]
        );

        assert!(parse_filter(&["sensor".to_string()]).is_err());
    }

    #[test]
    fn test_metadata_options() {
        assert_eq!(metadata_options("auto", None).unwrap(), MetadataOptions::default());
        assert_eq!(metadata_options("Exact", None).unwrap(), MetadataOptions::exact());

        let options = metadata_options("auto", Some("64x32")).unwrap();
        assert_eq!(options.max_shape, Some((64, 32)));

        assert!(metadata_options("fast", None).is_err());
        assert!(metadata_options("auto", Some("64")).is_err());
    }

    #[test]
    fn test_parse_extra() {
        let extra = parse_extra(r#"{"platform": "sentinel-2"}"#).unwrap();
        assert_eq!(extra.get("platform"), Some(&json!("sentinel-2")));
        assert!(parse_extra("[1, 2]").is_err());
        assert!(parse_extra("not json").is_err());
    }
}
