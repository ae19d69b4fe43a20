use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail, ensure};
use geo::{BoundingRect, Coord, MapCoords, MultiPolygon, Polygon};
use proj4rs::{proj::Proj as Proj4, transform::transform};
use shapefile::Shape;
use shapefile::dbase::Record;
use tracing::{debug, info, warn};

use crate::common::{
    clean_polygon, field_as_text, field_names, prepare_output_path, read_shapefile, shp_to_geo,
    simplify_polygons, try_union_all, write_feature_collection,
};
use crate::feature::{GeoFeature, GeoGeometry, Properties};

/// Attribute columns searched for a land-use code, in order.
pub const CODE_COLUMNS: [&str; 4] = ["L05_006", "L03_006", "code", "landuse"];

/// Target CRS of the conversion.
pub const WGS84_LONLAT: &str = "+proj=longlat +datum=WGS84 +no_defs +type=crs";

/// Simplified landcover classes of the national land-use survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LanduseCategory {
    Forest,
    Grassland,
    Water,
}

impl LanduseCategory {
    pub const ALL: [LanduseCategory; 3] = [Self::Forest, Self::Grassland, Self::Water];

    /// Map a survey code to its category. Codes are compared zero-padded to two
    /// digits; buildings, roads and other uses map to `None`.
    pub fn from_code(code: &str) -> Option<Self> {
        match format!("{:0>2}", code.trim()).as_str() {
            "05" => Some(Self::Forest),
            "01" | "02" | "03" | "06" => Some(Self::Grassland),
            "14" | "15" | "16" => Some(Self::Water),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forest => "forest",
            Self::Grassland => "grassland",
            Self::Water => "water",
        }
    }
}

impl std::fmt::Display for LanduseCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings for a shapefile to landcover conversion.
#[derive(Debug, Clone)]
pub struct LanduseConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Douglas-Peucker tolerance in output degrees. Zero disables simplification.
    pub simplify_tolerance: f64,
    /// Overrides the search over [`CODE_COLUMNS`].
    pub code_column: Option<String>,
    /// PROJ.4 definition of the input CRS. `None` means the input is already WGS84 lon/lat.
    pub source_proj: Option<String>,
}

impl LanduseConfig {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            simplify_tolerance: 0.001,
            code_column: None,
            source_proj: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.simplify_tolerance.is_finite() && self.simplify_tolerance >= 0.0,
            "simplify tolerance must be a non-negative number, got {}", self.simplify_tolerance
        );
        ensure!(self.input.is_file(), "Input shapefile not found: {}", self.input.display());
        prepare_output_path(&self.output)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanduseReport {
    pub records_read: usize,
    pub records_kept: usize,
    pub features_written: usize,
    pub bytes_written: u64,
}

/// Resolve the code column against the attribute names of a sample record.
fn resolve_code_column(requested: Option<&str>, sample: &Record) -> Result<String> {
    let available = field_names(sample);
    if let Some(name) = requested {
        ensure!(
            available.iter().any(|a| a == name),
            "code column {name} not found; available columns: {}", available.join(", ")
        );
        return Ok(name.to_string());
    }
    CODE_COLUMNS.iter()
        .find(|c| available.iter().any(|a| a == *c))
        .map(|c| c.to_string())
        .ok_or_else(|| anyhow!("no land-use code column found; available columns: {}", available.join(", ")))
}

/// Coordinate transform from a source CRS to WGS84 lon/lat in degrees.
struct Reprojector {
    from: Proj4,
    to: Proj4,
    source_is_geographic: bool,
}

impl Reprojector {
    fn new(source: &str) -> Result<Self> {
        let from = Proj4::from_proj_string(source)
            .with_context(|| anyhow!("failed to build source PROJ.4: {source}"))?;
        let to = Proj4::from_proj_string(WGS84_LONLAT)
            .with_context(|| anyhow!("failed to build target PROJ.4: {WGS84_LONLAT}"))?;
        let source_is_geographic = from.is_latlong();
        Ok(Self { from, to, source_is_geographic })
    }

    fn apply(&self, shape: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        // proj4rs works in radians on geographic CRSs.
        shape.try_map_coords(|coord: Coord<f64>| {
            let mut point = if self.source_is_geographic {
                (coord.x.to_radians(), coord.y.to_radians(), 0.0)
            } else {
                (coord.x, coord.y, 0.0)
            };
            transform(&self.from, &self.to, &mut point)
                .with_context(|| format!("CRS transform failed at ({}, {})", coord.x, coord.y))?;
            Ok(Coord { x: point.0.to_degrees(), y: point.1.to_degrees() })
        })
    }
}

/// Refuse input whose `.prj` sidecar declares a projected CRS.
fn check_sidecar_crs(input: &Path) -> Result<()> {
    let prj = input.with_extension("prj");
    let Ok(wkt) = std::fs::read_to_string(&prj) else {
        debug!("[landuse] no readable {}, assuming WGS84 lon/lat", prj.display());
        return Ok(());
    };
    let wkt = wkt.trim_start();
    if wkt.starts_with("PROJCS") || wkt.starts_with("PROJCRS") {
        let name = wkt.split('"').nth(1).unwrap_or("unnamed");
        bail!(
            "{} declares projected CRS {name}; pass the source CRS as a PROJ.4 string (--source-proj)",
            prj.display()
        );
    }
    Ok(())
}

/// Fail on the first coordinate outside the lon/lat domain.
fn ensure_lonlat(shape: &MultiPolygon<f64>) -> Result<()> {
    let Some(rect) = shape.bounding_rect() else { return Ok(()) };
    let (min, max) = (rect.min(), rect.max());
    ensure!(
        min.x >= -180.0 && max.x <= 180.0 && min.y >= -90.0 && max.y <= 90.0,
        "coordinates ({}, {})..({}, {}) are not WGS84 lon/lat; pass the source CRS as a PROJ.4 string (--source-proj)",
        min.x, min.y, max.x, max.y
    );
    Ok(())
}

/// Union each category's polygons into one feature, in category order.
/// A category whose union fails keeps its polygons as separate parts.
pub(crate) fn dissolve_by_category(shapes: Vec<(LanduseCategory, MultiPolygon<f64>)>) -> Vec<GeoFeature> {
    let mut groups: BTreeMap<LanduseCategory, Vec<MultiPolygon<f64>>> = BTreeMap::new();
    for (category, shape) in shapes {
        let valid: Vec<Polygon<f64>> = shape.0.iter().filter_map(clean_polygon).collect();
        if !valid.is_empty() {
            groups.entry(category).or_default().push(MultiPolygon(valid));
        }
    }

    groups.into_iter()
        .map(|(category, shapes)| {
            debug!("[landuse] dissolving {} {category} shapes", shapes.len());
            let parts = shapes.iter().map(|mp| mp.0.len()).sum::<usize>();
            let dissolved = match try_union_all(shapes.clone()) {
                Ok(mp) => mp,
                Err(reason) => {
                    warn!("[landuse] {category} union failed ({reason}); keeping {parts} separate polygons");
                    MultiPolygon(shapes.into_iter().flat_map(|mp| mp.0).collect())
                }
            };
            GeoFeature {
                geometry: GeoGeometry::from_multipolygon(&dissolved),
                properties: Properties::from_attributes([("type", category.as_str())]),
            }
        })
        .collect()
}

/// Convert a land-use shapefile into a FeatureCollection of at most one
/// dissolved polygon feature per [`LanduseCategory`].
pub fn convert_landuse(config: &LanduseConfig) -> Result<LanduseReport> {
    config.validate()?;
    let reprojector = config.source_proj.as_deref().map(Reprojector::new).transpose()?;
    if reprojector.is_none() {
        check_sidecar_crs(&config.input)?;
    }

    info!("[landuse] reading {}", config.input.display());
    let items = read_shapefile(&config.input)?;
    let mut report = LanduseReport { records_read: items.len(), ..Default::default() };
    info!("[landuse] records read: {}", report.records_read);

    let Some((_, sample)) = items.first() else {
        bail!("Shapefile has no records: {}", config.input.display());
    };
    let column = resolve_code_column(config.code_column.as_deref(), sample)?;
    info!("[landuse] code column: {column}");

    let mut shapes = Vec::new();
    let mut skipped_shapes = 0;
    for (shape, record) in &items {
        let Some(category) = field_as_text(record, &column).as_deref().and_then(LanduseCategory::from_code) else {
            continue;
        };
        let Shape::Polygon(polygon) = shape else {
            skipped_shapes += 1;
            continue;
        };

        let mut mp = shp_to_geo(polygon);
        match &reprojector {
            Some(reprojector) => mp = reprojector.apply(&mp)?,
            None => ensure_lonlat(&mp)?,
        }
        shapes.push((category, simplify_polygons(mp, config.simplify_tolerance)));
    }
    if skipped_shapes > 0 {
        warn!("[landuse] skipped {skipped_shapes} records without 2D polygon geometry");
    }
    report.records_kept = shapes.len();
    info!("[landuse] records after filtering: {}", report.records_kept);

    let features = dissolve_by_category(shapes);
    report.features_written = features.len();
    info!("[landuse] features after dissolve: {}", report.features_written);

    report.bytes_written = write_feature_collection(&config.output, &features)?;
    info!(
        "[landuse] wrote {} ({:.2} MB)",
        config.output.display(),
        report.bytes_written as f64 / 1024.0 / 1024.0
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Area, polygon};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use shapefile::dbase::FieldValue;

    #[test]
    fn codes_map_to_categories() {
        assert_eq!(LanduseCategory::from_code("05"), Some(LanduseCategory::Forest));
        assert_eq!(LanduseCategory::from_code("5"), Some(LanduseCategory::Forest));
        for code in ["01", "2", "03", "06"] {
            assert_eq!(LanduseCategory::from_code(code), Some(LanduseCategory::Grassland), "{code}");
        }
        for code in ["14", "15", "16"] {
            assert_eq!(LanduseCategory::from_code(code), Some(LanduseCategory::Water), "{code}");
        }
        for code in ["07", "09", "11", "", "A"] {
            assert_eq!(LanduseCategory::from_code(code), None, "{code}");
        }
    }

    #[test]
    fn code_column_search_order() {
        let mut record = Record::default();
        record.insert("code".to_string(), FieldValue::Character(Some("05".into())));
        record.insert("L03_006".to_string(), FieldValue::Character(Some("05".into())));
        assert_eq!(resolve_code_column(None, &record).unwrap(), "L03_006");
        assert_eq!(resolve_code_column(Some("code"), &record).unwrap(), "code");
    }

    #[test]
    fn missing_code_column_lists_available() {
        let mut record = Record::default();
        record.insert("NAME".to_string(), FieldValue::Character(Some("x".into())));
        let err = resolve_code_column(None, &record).unwrap_err().to_string();
        assert!(err.contains("NAME"), "{err}");
    }

    #[test]
    fn dissolve_emits_one_feature_per_category_in_order() {
        let a = MultiPolygon(vec![polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)]]);
        let b = MultiPolygon(vec![polygon![(x: 0.5, y: 0.0), (x: 1.5, y: 0.0), (x: 1.5, y: 1.0), (x: 0.5, y: 1.0)]]);
        let lake = MultiPolygon(vec![polygon![(x: 5.0, y: 5.0), (x: 6.0, y: 5.0), (x: 6.0, y: 6.0), (x: 5.0, y: 6.0)]]);

        let features = dissolve_by_category(vec![
            (LanduseCategory::Water, lake),
            (LanduseCategory::Forest, a),
            (LanduseCategory::Forest, b),
        ]);
        let types: Vec<_> = features.iter().map(|f| f.properties.to_geojson()).collect();
        assert_eq!(types, vec![json!({"type": "forest"}), json!({"type": "water"})]);

        let forest = features[0].geometry.to_multipolygon().unwrap();
        assert!((forest.unsigned_area() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn reprojects_geographic_input() {
        let reprojector = Reprojector::new("+proj=longlat +datum=WGS84 +no_defs").unwrap();
        let mp = MultiPolygon(vec![polygon![(x: 135.0, y: 35.0), (x: 136.0, y: 35.0), (x: 136.0, y: 36.0)]]);
        let out = reprojector.apply(&mp).unwrap();
        let first = out.0[0].exterior().0[0];
        assert!((first.x - 135.0).abs() < 1e-9 && (first.y - 35.0).abs() < 1e-9);
    }

    #[test]
    fn reprojects_projected_input() {
        // JGD2000 / Japan Plane Rectangular CS IX, origin at 139°50'E 36°N.
        let reprojector = Reprojector::new(
            "+proj=tmerc +lat_0=36 +lon_0=139.8333333333333 +k=0.9999 +x_0=0 +y_0=0 +ellps=GRS80 +units=m +no_defs",
        ).unwrap();
        assert!(!reprojector.source_is_geographic);
        let mp = MultiPolygon(vec![polygon![(x: 0.0, y: 0.0), (x: 1000.0, y: 0.0), (x: 1000.0, y: 1000.0)]]);
        let origin = reprojector.apply(&mp).unwrap().0[0].exterior().0[0];
        assert!((origin.x - 139.833_333).abs() < 1e-5, "{origin:?}");
        assert!((origin.y - 36.0).abs() < 1e-5, "{origin:?}");
    }

    #[test]
    fn geographic_detection_uses_parsed_projection() {
        assert!(Reprojector::new("+proj=latlong +ellps=GRS80").unwrap().source_is_geographic);
        assert!(!Reprojector::new("+proj=merc +ellps=WGS84").unwrap().source_is_geographic);
    }

    #[test]
    fn projected_sidecar_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("landuse.shp");
        std::fs::write(
            input.with_extension("prj"),
            r#"PROJCS["JGD2000 / Japan Plane Rectangular CS IX",GEOGCS["JGD2000"]]"#,
        ).unwrap();
        let err = check_sidecar_crs(&input).unwrap_err().to_string();
        assert!(err.contains("Japan Plane Rectangular CS IX") && err.contains("--source-proj"), "{err}");

        std::fs::write(input.with_extension("prj"), r#"GEOGCS["GCS_JGD_2000"]"#).unwrap();
        assert!(check_sidecar_crs(&input).is_ok());
        std::fs::remove_file(input.with_extension("prj")).unwrap();
        assert!(check_sidecar_crs(&input).is_ok());
    }

    #[test]
    fn metre_coordinates_are_not_lonlat() {
        let metres = MultiPolygon(vec![polygon![(x: -5000.0, y: 12000.0), (x: -4000.0, y: 12000.0), (x: -4000.0, y: 13000.0)]]);
        assert!(ensure_lonlat(&metres).is_err());
        let degrees = MultiPolygon(vec![polygon![(x: 135.0, y: 35.0), (x: 136.0, y: 35.0), (x: 136.0, y: 36.0)]]);
        assert!(ensure_lonlat(&degrees).is_ok());
    }

    #[test]
    fn negative_tolerance_is_rejected() {
        let mut config = LanduseConfig::new("in.shp", "out.json");
        config.simplify_tolerance = -1.0;
        assert!(config.validate().is_err());
    }
}
