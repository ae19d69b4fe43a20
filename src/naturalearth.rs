use std::path::PathBuf;

use anyhow::{Result, bail, ensure};
use geo::{BooleanOps, BoundingRect, Intersects, MultiPolygon, Rect, coord};
use shapefile::Shape;
use tracing::{debug, info, warn};

use crate::common::{
    clean_polygon, prepare_output_path, read_shapefile, shp_to_geo, simplify_polygons, write_feature_collection,
};
use crate::feature::{GeoFeature, GeoGeometry, Properties};
use crate::tile::GeoBoundingBox;

/// Clip window around the Japanese archipelago, `[min_lon, min_lat, max_lon, max_lat]`.
pub const JAPAN_BBOX: [f64; 4] = [122.0, 24.0, 148.0, 46.0];

/// Settings for clipping a Natural Earth land shapefile to a window.
#[derive(Debug, Clone)]
pub struct NaturalEarthConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub bbox: GeoBoundingBox,
    /// Douglas-Peucker tolerance in degrees. Zero disables simplification.
    pub simplify_tolerance: f64,
    /// `type` property of every output feature.
    pub label: String,
    /// `name` property of every output feature.
    pub name: String,
}

impl NaturalEarthConfig {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            input: input.into(),
            output: output.into(),
            bbox: GeoBoundingBox::from_array(JAPAN_BBOX)?,
            simplify_tolerance: 0.01,
            label: "grassland".to_string(),
            name: "陸地".to_string(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.simplify_tolerance.is_finite() && self.simplify_tolerance >= 0.0,
            "simplify tolerance must be a non-negative number, got {}", self.simplify_tolerance
        );
        ensure!(!self.label.trim().is_empty(), "feature type must not be empty");
        ensure!(self.input.is_file(), "Input shapefile not found: {}", self.input.display());
        prepare_output_path(&self.output)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NaturalEarthReport {
    pub records_read: usize,
    pub records_in_window: usize,
    pub features_written: usize,
    pub bytes_written: u64,
}

fn window(bbox: &GeoBoundingBox) -> Rect<f64> {
    Rect::new(
        coord! { x: bbox.min_lon(), y: bbox.min_lat() },
        coord! { x: bbox.max_lon(), y: bbox.max_lat() },
    )
}

/// Clip one shape to `window`, simplify it and drop whatever degenerates.
/// `None` when nothing of the shape is left.
fn clip_shape(shape: &MultiPolygon<f64>, window: &Rect<f64>, tolerance: f64) -> Option<MultiPolygon<f64>> {
    if !shape.bounding_rect().is_some_and(|rect| rect.intersects(window)) {
        return None;
    }
    let clipped = shape.intersection(&MultiPolygon(vec![window.to_polygon()]));
    let simplified = simplify_polygons(clipped, tolerance);
    let parts: Vec<_> = simplified.0.iter().filter_map(clean_polygon).collect();
    (!parts.is_empty()).then_some(MultiPolygon(parts))
}

/// Clip a lon/lat land shapefile to `config.bbox`, one feature per surviving record.
pub fn clip_natural_earth(config: &NaturalEarthConfig) -> Result<NaturalEarthReport> {
    config.validate()?;

    info!("[natural-earth] reading {}", config.input.display());
    let items = read_shapefile(&config.input)?;
    if items.is_empty() {
        bail!("Shapefile has no records: {}", config.input.display());
    }
    let mut report = NaturalEarthReport { records_read: items.len(), ..Default::default() };
    info!("[natural-earth] records read: {}", report.records_read);

    let window = window(&config.bbox);
    let properties = Properties::from_attributes([("type", config.label.as_str()), ("name", config.name.as_str())]);
    let mut features = Vec::new();
    let mut skipped_shapes = 0;
    for (shape, _) in &items {
        let Shape::Polygon(polygon) = shape else {
            skipped_shapes += 1;
            continue;
        };
        let Some(clipped) = clip_shape(&shp_to_geo(polygon), &window, config.simplify_tolerance) else {
            continue;
        };
        report.records_in_window += 1;
        features.push(GeoFeature {
            geometry: GeoGeometry::from_multipolygon(&clipped),
            properties: properties.clone(),
        });
    }
    if skipped_shapes > 0 {
        warn!("[natural-earth] skipped {skipped_shapes} records without 2D polygon geometry");
    }
    debug!("[natural-earth] records inside the window: {}", report.records_in_window);

    report.features_written = features.len();
    report.bytes_written = write_feature_collection(&config.output, &features)?;
    info!(
        "[natural-earth] wrote {} features to {} ({:.2} KB)",
        report.features_written, config.output.display(), report.bytes_written as f64 / 1024.0
    );
    Ok(report)
}
