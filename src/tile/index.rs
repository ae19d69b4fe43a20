use std::f64::consts::PI;

use anyhow::{Result, bail, ensure};

/// Highest zoom level accepted by the locator.
pub const MAX_ZOOM: u8 = 24;

/// Latitude limit of the Web-Mercator projection.
const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// A tile in the slippy-map pyramid, `0 <= x, y < 2^zoom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileIndex {
    zoom: u8,
    x: u32,
    y: u32,
}

impl TileIndex {
    pub fn new(zoom: u8, x: u32, y: u32) -> Result<Self> {
        ensure!(zoom <= MAX_ZOOM, "zoom {zoom} exceeds maximum of {MAX_ZOOM}");
        let n = tiles_per_axis(zoom);
        ensure!(
            u64::from(x) < n && u64::from(y) < n,
            "tile ({x}, {y}) outside the {n}x{n} grid at zoom {zoom}"
        );
        Ok(Self { zoom, x, y })
    }

    #[inline] pub fn zoom(&self) -> u8 { self.zoom }
    #[inline] pub fn x(&self) -> u32 { self.x }
    #[inline] pub fn y(&self) -> u32 { self.y }
}

impl std::fmt::Display for TileIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// A geographic rectangle in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBoundingBox {
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
}

impl GeoBoundingBox {
    /// Build a bounding box, rejecting non-finite or inverted edges.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<Self> {
        if ![min_lon, min_lat, max_lon, max_lat].iter().all(|v| v.is_finite()) {
            bail!("bounding box has non-finite edges: [{min_lon}, {min_lat}, {max_lon}, {max_lat}]");
        }
        ensure!(min_lon < max_lon, "bounding box min_lon {min_lon} must be less than max_lon {max_lon}");
        ensure!(min_lat < max_lat, "bounding box min_lat {min_lat} must be less than max_lat {max_lat}");
        ensure!(
            (-180.0..=180.0).contains(&min_lon) && (-180.0..=180.0).contains(&max_lon),
            "bounding box longitudes must lie within [-180, 180]"
        );
        ensure!(
            (-90.0..=90.0).contains(&min_lat) && (-90.0..=90.0).contains(&max_lat),
            "bounding box latitudes must lie within [-90, 90]"
        );
        Ok(Self { min_lon, min_lat, max_lon, max_lat })
    }

    /// Build from `[min_lon, min_lat, max_lon, max_lat]`.
    pub fn from_array(bbox: [f64; 4]) -> Result<Self> {
        Self::new(bbox[0], bbox[1], bbox[2], bbox[3])
    }

    #[inline] pub fn min_lon(&self) -> f64 { self.min_lon }
    #[inline] pub fn min_lat(&self) -> f64 { self.min_lat }
    #[inline] pub fn max_lon(&self) -> f64 { self.max_lon }
    #[inline] pub fn max_lat(&self) -> f64 { self.max_lat }

    /// Check whether two rectangles share any area or edge.
    pub fn intersects(&self, other: &GeoBoundingBox) -> bool {
        self.min_lon <= other.max_lon && other.min_lon <= self.max_lon
            && self.min_lat <= other.max_lat && other.min_lat <= self.max_lat
    }
}

/// Inclusive range of tiles at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub zoom: u8,
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

impl TileRange {
    /// Number of tiles in the range; never zero since both ends are inclusive.
    pub fn tile_count(&self) -> u64 {
        (u64::from(self.x_max - self.x_min) + 1) * (u64::from(self.y_max - self.y_min) + 1)
    }

    /// Iterate tiles row-major by x, then y.
    pub fn iter(&self) -> impl Iterator<Item = TileIndex> + '_ {
        (self.x_min..=self.x_max).flat_map(move |x| {
            (self.y_min..=self.y_max).map(move |y| TileIndex { zoom: self.zoom, x, y })
        })
    }
}

#[inline]
fn tiles_per_axis(zoom: u8) -> u64 { 1u64 << zoom }

/// Convert longitude to tile X coordinate at a given zoom level
fn lon_to_tile_x(lon: f64, zoom: u8) -> u32 {
    let n = tiles_per_axis(zoom) as f64;
    let x = ((lon + 180.0) / 360.0 * n).floor();
    x.clamp(0.0, n - 1.0) as u32
}

/// Convert latitude to tile Y coordinate at a given zoom level
fn lat_to_tile_y(lat: f64, zoom: u8) -> u32 {
    let n = tiles_per_axis(zoom) as f64;
    let lat_rad = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).floor();
    y.clamp(0.0, n - 1.0) as u32
}

/// Compute the range of tiles enclosing `bbox` at `zoom`.
/// Tile Y grows southward, so the north edge gives `y_min`.
pub fn bounding_box_to_tile_range(bbox: &GeoBoundingBox, zoom: u8) -> Result<TileRange> {
    ensure!(zoom <= MAX_ZOOM, "zoom {zoom} exceeds maximum of {MAX_ZOOM}");
    Ok(TileRange {
        zoom,
        x_min: lon_to_tile_x(bbox.min_lon, zoom),
        y_min: lat_to_tile_y(bbox.max_lat, zoom),
        x_max: lon_to_tile_x(bbox.max_lon, zoom),
        y_max: lat_to_tile_y(bbox.min_lat, zoom),
    })
}

/// Latitude and longitude of the north-west corner of tile `(x, y)`, as `(lat, lon)`.
/// `(x + 1, y + 1)` gives the south-east corner.
pub fn tile_index_to_lonlat(x: u32, y: u32, zoom: u8) -> (f64, f64) {
    let n = tiles_per_axis(zoom) as f64;
    let lon = x as f64 / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y as f64 / n)).sinh().atan().to_degrees();
    (lat, lon)
}

/// Geographic footprint of one tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileFootprint {
    pub lon_min: f64,
    pub lat_min: f64,
    pub lon_max: f64,
    pub lat_max: f64,
}

impl TileFootprint {
    pub fn of(tile: TileIndex) -> Self {
        let (lat_nw, lon_nw) = tile_index_to_lonlat(tile.x, tile.y, tile.zoom);
        let (lat_se, lon_se) = tile_index_to_lonlat(tile.x + 1, tile.y + 1, tile.zoom);
        Self { lon_min: lon_nw, lat_min: lat_se, lon_max: lon_se, lat_max: lat_nw }
    }

    pub fn as_bounding_box(&self) -> GeoBoundingBox {
        GeoBoundingBox {
            min_lon: self.lon_min,
            min_lat: self.lat_min,
            max_lon: self.lon_max,
            max_lat: self.lat_max,
        }
    }
}
