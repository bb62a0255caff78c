//! Spherical Web Mercator (EPSG:3857).
//!
//! Coordinates are projected on a sphere with the WGS84 semi-major axis as
//! radius. Latitudes beyond [`MAX_LATITUDE`] are clamped so that the world
//! maps onto a square of side `2 * WEB_MERCATOR_EXTENT`.

use std::f64::consts::PI;

/// Earth radius used by Web Mercator (meters).
pub const EARTH_RADIUS: f64 = 6378137.0;

/// Latitude at which the Web Mercator square ends (degrees).
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Convert latitude (degrees) to a Web Mercator Y coordinate.
pub fn lat_to_mercator_y(lat: f64) -> f64 {
    let lat_rad = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    ((PI / 4.0) + (lat_rad / 2.0)).tan().ln() * EARTH_RADIUS
}

/// Convert a Web Mercator Y coordinate to latitude (degrees).
pub fn mercator_y_to_lat(y: f64) -> f64 {
    let y_normalized = y / EARTH_RADIUS;
    (2.0 * y_normalized.exp().atan() - PI / 2.0).to_degrees()
}

/// Convert lon/lat (degrees) to Web Mercator (meters).
pub fn lonlat_to_mercator(lon: f64, lat: f64) -> (f64, f64) {
    (lon.to_radians() * EARTH_RADIUS, lat_to_mercator_y(lat))
}

/// Convert Web Mercator (meters) to lon/lat (degrees).
pub fn mercator_to_lonlat(x: f64, y: f64) -> (f64, f64) {
    ((x / EARTH_RADIUS).to_degrees(), mercator_y_to_lat(y))
}
