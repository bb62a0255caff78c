//! Tests for BoundingBox operations and their use with tiles.

use raster_common::bbox::{BboxParseError, BoundingBox};
use raster_common::{CrsCode, TileCoord, WEB_MERCATOR_EXTENT};

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn test_parse_bbox_floating() {
    let bbox = BoundingBox::parse("-125.5,24.75,-66.25,50.125").unwrap();
    assert!((bbox.min_x - (-125.5)).abs() < 0.001);
    assert!((bbox.min_y - 24.75).abs() < 0.001);
    assert!((bbox.max_x - (-66.25)).abs() < 0.001);
    assert!((bbox.max_y - 50.125).abs() < 0.001);
}

#[test]
fn test_parse_bbox_web_mercator() {
    let bbox = BoundingBox::parse("-20037508.34,-20037508.34,20037508.34,20037508.34").unwrap();
    assert!((bbox.min_x - (-20037508.34)).abs() < 0.01);
    assert!((bbox.max_x - 20037508.34).abs() < 0.01);
}

#[test]
fn test_parse_bbox_invalid_format() {
    assert!(matches!(
        BoundingBox::parse("0,0,100"),
        Err(BboxParseError::InvalidFormat(_))
    ));
    assert!(matches!(
        BoundingBox::parse("0,0,100,100,200"),
        Err(BboxParseError::InvalidFormat(_))
    ));
    assert!(matches!(
        BoundingBox::parse(""),
        Err(BboxParseError::InvalidFormat(_))
    ));
}

#[test]
fn test_parse_bbox_invalid_number() {
    assert!(matches!(
        BoundingBox::parse("0,abc,100,100"),
        Err(BboxParseError::InvalidNumber(_))
    ));
}

#[test]
fn test_parse_bbox_rejects_inverted() {
    assert!(matches!(
        BoundingBox::parse("10,0,0,10"),
        Err(BboxParseError::Degenerate(_))
    ));
}

// ============================================================================
// Geometry
// ============================================================================

#[test]
fn test_bbox_dimensions() {
    let bbox = BoundingBox::new(-50.0, -30.0, 20.0, 10.0);
    assert_eq!(bbox.width(), 70.0);
    assert_eq!(bbox.height(), 40.0);
}

#[test]
fn test_bbox_intersects_contains() {
    let outer = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
    let inner = BoundingBox::new(25.0, 25.0, 75.0, 75.0);
    assert!(outer.intersects(&inner));
    assert!(inner.intersects(&outer));
    assert!(outer.contains(&inner, 0.0));
    assert!(!inner.contains(&outer, 0.0));
    assert_eq!(outer.intersection(&inner), Some(inner));
}

#[test]
fn test_bbox_intersection_with_self() {
    let bbox = BoundingBox::new(-10.0, -5.0, 10.0, 5.0);
    assert_eq!(bbox.intersection(&bbox), Some(bbox));
}

#[test]
fn test_bbox_contains_point_on_edge() {
    let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
    assert!(bbox.contains_point(0.0, 5.0));
    assert!(bbox.contains_point(10.0, 10.0));
    assert!(!bbox.contains_point(10.1, 5.0));
}

#[test]
fn test_bbox_validity() {
    assert!(BoundingBox::new(0.0, 0.0, 1.0, 1.0).is_valid());
    assert!(!BoundingBox::new(0.0, 0.0, 0.0, 1.0).is_valid());
    assert!(!BoundingBox::new(0.0, f64::NAN, 1.0, 1.0).is_valid());
}

// ============================================================================
// Tiles and CRS extents
// ============================================================================

#[test]
fn test_tiles_partition_the_mercator_extent() {
    let world = CrsCode::Epsg3857.valid_bounds();
    let z = 2;
    let mut area = 0.0;
    for x in 0..4 {
        for y in 0..4 {
            let tile = TileCoord::new(z, x, y).mercator_bounds();
            assert!(world.contains(&tile, 1e-6));
            area += tile.width() * tile.height();
        }
    }
    let expected = (2.0 * WEB_MERCATOR_EXTENT).powi(2);
    assert!((area - expected).abs() / expected < 1e-12);
}

#[test]
fn test_adjacent_tiles_share_edges() {
    let left = TileCoord::new(5, 10, 12).mercator_bounds();
    let right = TileCoord::new(5, 11, 12).mercator_bounds();
    assert!((left.max_x - right.min_x).abs() < 1e-6);
    assert_eq!(left.min_y, right.min_y);
    assert_eq!(left.max_y, right.max_y);
}
