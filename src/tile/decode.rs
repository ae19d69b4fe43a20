use std::collections::BTreeSet;
use std::io::Read;

use flate2::read::GzDecoder;
use geo_types::{Coord, Geometry as MvtGeometry, LineString, Polygon};
use mvt_reader::{Reader, feature::Value as MvtValue};
use serde_json::{Map, Value, json};
use tracing::{trace, warn};

use crate::feature::{DecodedFeature, Feature, GeoFeature, Geometry, LonLat, Pixel, Properties, TileGeometry};
use crate::tile::{TileError, TileFootprint, TileIndex};

/// Pixel span of one tile edge in the default tile schema.
pub const DEFAULT_EXTENT: f64 = 4096.0;

/// Vertical pixel correction measured against reference points on tile.openstreetmap.jp.
/// Re-validate before using another tile source or zoom range.
pub const DEFAULT_VERTICAL_OFFSET: f64 = 45.4;

/// Parameters of the pixel to lon/lat linear map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub extent: f64,
    pub vertical_offset: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self { extent: DEFAULT_EXTENT, vertical_offset: DEFAULT_VERTICAL_OFFSET }
    }
}

impl Calibration {
    /// Map one pixel position into the tile's footprint.
    #[inline]
    pub fn project(&self, footprint: &TileFootprint, p: &Pixel) -> LonLat {
        LonLat {
            lon: footprint.lon_min + (footprint.lon_max - footprint.lon_min) * p.x / self.extent,
            lat: footprint.lat_min + (footprint.lat_max - footprint.lat_min) * (p.y + self.vertical_offset) / self.extent,
        }
    }
}

/// Allow-list on the `class` property. `None` keeps every feature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassFilter(Option<BTreeSet<String>>);

impl ClassFilter {
    #[inline] pub fn all() -> Self { Self(None) }

    pub fn only<S: Into<String>>(classes: impl IntoIterator<Item = S>) -> Self {
        Self(Some(classes.into_iter().map(Into::into).collect()))
    }

    #[inline] pub fn is_active(&self) -> bool { self.0.is_some() }

    /// Classes in the allow-list, if any.
    pub fn classes(&self) -> Option<impl Iterator<Item = &str>> {
        self.0.as_ref().map(|set| set.iter().map(String::as_str))
    }

    /// Exact match on `class`; a missing class never matches an active filter.
    pub fn accepts(&self, properties: &Properties) -> bool {
        match &self.0 {
            None => true,
            Some(set) => properties.class().is_some_and(|class| set.contains(class)),
        }
    }
}

/// Inflate gzip-wrapped payloads; pass anything else through.
fn inflate(payload: &[u8], tile: TileIndex) -> Result<Vec<u8>, TileError> {
    if payload.starts_with(&[0x1f, 0x8b]) {
        let mut decompressed = Vec::new();
        GzDecoder::new(payload).read_to_end(&mut decompressed)
            .map_err(|e| TileError::Decode { tile, message: format!("gzip: {e}") })?;
        Ok(decompressed)
    } else {
        Ok(payload.to_vec())
    }
}

fn property_value(value: &MvtValue) -> Value {
    match value {
        MvtValue::String(s) => json!(s),
        MvtValue::Float(f) => serde_json::Number::from_f64(f64::from(*f)).map_or(Value::Null, Value::Number),
        MvtValue::Double(d) => serde_json::Number::from_f64(*d).map_or(Value::Null, Value::Number),
        MvtValue::Int(i) | MvtValue::SInt(i) => json!(i),
        MvtValue::UInt(u) => json!(u),
        MvtValue::Bool(b) => json!(b),
        MvtValue::Null => Value::Null,
    }
}

/// Convert decoder geometry to pixel space with `y` measured northward (`extent - y_raw`).
/// The decoder wraps single polygons and points in their multi form; one-part
/// collections collapse back to the single variant.
fn tile_geometry(geom: &MvtGeometry<f32>, extent: f64) -> Option<TileGeometry> {
    let pixel = |c: &Coord<f32>| Pixel { x: f64::from(c.x), y: extent - f64::from(c.y) };
    let line = |ls: &LineString<f32>| ls.coords().map(pixel).collect::<Vec<_>>();
    let rings = |p: &Polygon<f32>| {
        std::iter::once(line(p.exterior()))
            .chain(p.interiors().iter().map(line))
            .collect::<Vec<_>>()
    };

    Some(match geom {
        MvtGeometry::Point(p) => Geometry::Point(pixel(&p.0)),
        MvtGeometry::MultiPoint(mp) if mp.0.len() == 1 => Geometry::Point(pixel(&mp.0[0].0)),
        MvtGeometry::MultiPoint(mp) => Geometry::MultiPoint(mp.iter().map(|p| pixel(&p.0)).collect()),
        MvtGeometry::LineString(ls) => Geometry::LineString(line(ls)),
        MvtGeometry::MultiLineString(mls) if mls.0.len() == 1 => Geometry::LineString(line(&mls.0[0])),
        MvtGeometry::MultiLineString(mls) => Geometry::MultiLineString(mls.iter().map(line).collect()),
        MvtGeometry::Polygon(p) => Geometry::Polygon(rings(p)),
        MvtGeometry::MultiPolygon(mp) if mp.0.len() == 1 => Geometry::Polygon(rings(&mp.0[0])),
        MvtGeometry::MultiPolygon(mp) => Geometry::MultiPolygon(mp.iter().map(rings).collect()),
        _ => return None,
    })
}

/// Whether a layer header disagrees with the configured pixel extent.
#[inline]
fn extent_mismatch(declared: u32, configured: f64) -> bool {
    f64::from(declared) != configured
}

/// Decode one layer of a tile payload into pixel-space features.
/// A tile without the layer yields no features.
pub fn decode_layer(
    payload: &[u8],
    tile: TileIndex,
    layer_name: &str,
    extent: f64,
) -> Result<Vec<DecodedFeature>, TileError> {
    let decode_err = |message: String| TileError::Decode { tile, message };

    let data = inflate(payload, tile)?;
    let reader = Reader::new(data).map_err(|e| decode_err(e.to_string()))?;
    let layers = reader.get_layer_metadata().map_err(|e| decode_err(e.to_string()))?;

    let Some(layer) = layers.iter().find(|layer| layer.name == layer_name) else {
        trace!("[decode] tile {tile} has no layer {layer_name}");
        return Ok(Vec::new());
    };
    if extent_mismatch(layer.extent, extent) {
        warn!(
            "[decode] tile {tile}: layer {layer_name} declares extent {}, decoding with {extent}",
            layer.extent
        );
    }

    let features = reader.get_features(layer.layer_index).map_err(|e| decode_err(e.to_string()))?;

    let mut out = Vec::with_capacity(features.len());
    for feature in &features {
        let Some(geometry) = tile_geometry(feature.get_geometry(), extent) else {
            trace!("[decode] tile {tile}: skipping unsupported geometry");
            continue;
        };
        let attributes: Map<String, Value> = feature.properties.iter()
            .flatten()
            .map(|(key, value)| (key.clone(), property_value(value)))
            .collect();
        out.push(Feature { geometry, properties: Properties::from_map(attributes) });
    }
    Ok(out)
}

/// Map a pixel-space feature into its tile's geographic footprint.
pub fn reproject(feature: &DecodedFeature, footprint: &TileFootprint, calibration: &Calibration) -> GeoFeature {
    let project = |p: &Pixel| calibration.project(footprint, p);

    let geometry = match &feature.geometry {
        Geometry::Point(p) => Geometry::Point(project(p)),
        Geometry::MultiPoint(points) => Geometry::MultiPoint(points.iter().map(project).collect()),
        Geometry::LineString(ls) => Geometry::LineString(ls.iter().map(project).collect()),
        other => other.map_positions(project),
    };

    GeoFeature { geometry, properties: feature.properties.clone() }
}

/// Decode `layer_name` from a tile payload, keep features accepted by `filter`,
/// and reproject them into lon/lat.
pub fn decode_and_reproject(
    payload: &[u8],
    tile: TileIndex,
    layer_name: &str,
    filter: &ClassFilter,
    calibration: &Calibration,
) -> Result<Vec<GeoFeature>, TileError> {
    let footprint = TileFootprint::of(tile);
    Ok(decode_layer(payload, tile, layer_name, calibration.extent)?
        .iter()
        .filter(|feature| filter.accepts(&feature.properties))
        .map(|feature| reproject(feature, &footprint, calibration))
        .collect())
}
