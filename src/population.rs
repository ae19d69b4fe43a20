use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::common::{ensure_dir_exists, write_atomically, write_feature_collection};
use crate::feature::{GeoFeature, Geometry, LonLat, Properties};

/// Only version understood by [`PopulationTable::from_json`].
pub const POPULATION_TABLE_VERSION: u32 = 1;

/// Vertices of an extrusion circle, before closing.
pub const CIRCLE_SEGMENTS: usize = 32;

/// Radius in degrees of the circle for one million inhabitants.
pub const BASE_RADIUS: f64 = 0.05;

/// Cap on the `height` property, in metres.
pub const MAX_HEIGHT: f64 = 150_000.0;

/// Administrative level of a population table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceKind {
    Prefecture,
    City,
}

impl PlaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prefecture => "prefecture",
            Self::City => "city",
        }
    }
}

impl std::fmt::Display for PlaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A populated place with its office location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub population: u64,
    /// `[lon, lat]` of the prefectural or city office.
    pub center: [f64; 2],
    /// Prefecture the place belongs to. Prefecture rows leave it out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefecture: Option<String>,
}

impl Place {
    #[inline]
    pub fn center(&self) -> LonLat { LonLat::new(self.center[0], self.center[1]) }

    /// Prefecture name, which is the place's own name on prefecture rows.
    pub fn prefecture_name(&self) -> &str {
        self.prefecture.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PopulationFile {
    version: u32,
    kind: PlaceKind,
    entries: Vec<Place>,
}

/// Population figures of every prefecture or of every city above a size threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationTable {
    kind: PlaceKind,
    places: Vec<Place>,
}

impl PopulationTable {
    pub fn new(kind: PlaceKind, places: Vec<Place>) -> Result<Self> {
        for (index, place) in places.iter().enumerate() {
            ensure!(
                place.center.iter().all(|v| v.is_finite()),
                "{kind} #{index} ({}) has a non-finite center", place.name
            );
            ensure!(
                (-180.0..=180.0).contains(&place.center[0]) && (-90.0..=90.0).contains(&place.center[1]),
                "{kind} #{index} ({}) has center {:?} outside lon/lat range", place.name, place.center
            );
            if kind == PlaceKind::City {
                ensure!(place.prefecture.is_some(), "city #{index} ({}) has no prefecture", place.name);
            }
        }
        Ok(Self { kind, places })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read population table: {}", path.display()))?;
        Self::from_json(&text)
            .with_context(|| format!("Invalid population table: {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let file: PopulationFile = serde_json::from_str(text).context("Failed to parse population table JSON")?;
        ensure!(
            file.version == POPULATION_TABLE_VERSION,
            "unsupported population table version {} (expected {POPULATION_TABLE_VERSION})", file.version
        );
        Self::new(file.kind, file.entries)
    }

    /// Same table with new places, as produced by coordinate matching.
    pub fn with_places(&self, places: Vec<Place>) -> Result<Self> {
        Self::new(self.kind, places)
    }

    #[inline] pub fn kind(&self) -> PlaceKind { self.kind }
    #[inline] pub fn places(&self) -> &[Place] { &self.places }
    #[inline] pub fn len(&self) -> usize { self.places.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.places.is_empty() }

    /// Total population per prefecture.
    pub fn prefecture_totals(&self) -> BTreeMap<&str, u64> {
        let mut totals = BTreeMap::new();
        for place in &self.places {
            *totals.entry(place.prefecture_name()).or_insert(0) += place.population;
        }
        totals
    }

    fn properties(&self, place: &Place) -> Properties {
        Properties::from_attributes([
            ("name", json!(place.name)),
            ("population", json!(place.population)),
            ("type", json!(self.kind.as_str())),
            ("prefecture", json!(place.prefecture_name())),
        ])
    }

    /// One Point feature per place, for proportional-circle rendering.
    pub fn circle_features(&self) -> Vec<GeoFeature> {
        self.places.iter()
            .map(|place| GeoFeature {
                geometry: Geometry::Point(place.center()),
                properties: self.properties(place),
            })
            .collect()
    }

    /// One circular Polygon feature per place with a `height` property, for extrusion.
    pub fn extrusion_features(&self) -> Vec<GeoFeature> {
        self.places.iter()
            .map(|place| {
                let radius = BASE_RADIUS * size_factor(place.population);
                GeoFeature {
                    geometry: Geometry::Polygon(vec![circle_ring(place.center(), radius, CIRCLE_SEGMENTS)]),
                    properties: self.properties(place)
                        .with_attribute("height", extrusion_height(place.population)),
                }
            })
            .collect()
    }

    /// Serialize in the versioned table format, one entry per line.
    pub fn to_json(&self) -> Result<String> {
        let entries = self.places.iter()
            .map(serde_json::to_string)
            .collect::<serde_json::Result<Vec<_>>>()
            .context("Failed to serialize population entries")?;
        Ok(format!(
            "{{\n  \"version\": {POPULATION_TABLE_VERSION},\n  \"kind\": \"{}\",\n  \"entries\": [\n    {}\n  ]\n}}\n",
            self.kind,
            entries.join(",\n    ")
        ))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_atomically(path, self.to_json()?.as_bytes())
            .with_context(|| format!("Failed to write population table: {}", path.display()))
    }
}

/// Circle scale factor: `1.0` at one million inhabitants, growing with the square root.
#[inline]
pub fn size_factor(population: u64) -> f64 {
    (population as f64 / 1_000_000.0).sqrt()
}

/// Extrusion height in metres: one metre per hundred inhabitants, capped at [`MAX_HEIGHT`].
#[inline]
pub fn extrusion_height(population: u64) -> f64 {
    (population as f64 / 100.0).min(MAX_HEIGHT)
}

/// Closed ring of `segments` vertices on a circle of `radius` degrees, counter-clockwise from east.
pub fn circle_ring(center: LonLat, radius: f64, segments: usize) -> Vec<LonLat> {
    let mut ring: Vec<LonLat> = (0..segments)
        .map(|i| {
            let angle = 2.0 * PI * i as f64 / segments as f64;
            LonLat::new(center.lon + radius * angle.cos(), center.lat + radius * angle.sin())
        })
        .collect();
    if let Some(&first) = ring.first() {
        ring.push(first);
    }
    ring
}

/// Files written for one population table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulationReport {
    pub circle_path: PathBuf,
    pub extrusion_path: PathBuf,
    pub features: usize,
    pub bytes_written: u64,
}

/// Write `population-{kind}-circle.json` and `population-{kind}-3d.json` into `output_dir`.
pub fn write_population_layers(table: &PopulationTable, output_dir: &Path) -> Result<PopulationReport> {
    ensure_dir_exists(output_dir)?;
    let circle_path = output_dir.join(format!("population-{}-circle.json", table.kind()));
    let extrusion_path = output_dir.join(format!("population-{}-3d.json", table.kind()));

    let circles = table.circle_features();
    let mut bytes_written = write_feature_collection(&circle_path, &circles)?;
    info!("[population] {} - {} {}s", circle_path.display(), circles.len(), table.kind());

    let extrusions = table.extrusion_features();
    bytes_written += write_feature_collection(&extrusion_path, &extrusions)?;
    info!("[population] {} - {} {}s", extrusion_path.display(), extrusions.len(), table.kind());

    Ok(PopulationReport { circle_path, extrusion_path, features: circles.len(), bytes_written })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TABLE: &str = r#"{
        "version": 1,
        "kind": "city",
        "entries": [
            {"name": "府中市", "population": 260000, "center": [139.4777, 35.6689], "prefecture": "東京都"},
            {"name": "横浜市", "population": 3773000, "center": [139.638, 35.4437], "prefecture": "神奈川県"}
        ]
    }"#;

    fn bundled(name: &str) -> PopulationTable {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("data").join(name);
        PopulationTable::from_path(&path).unwrap()
    }

    #[test]
    fn circle_features_carry_population_properties() {
        let table = PopulationTable::from_json(TABLE).unwrap();
        let features = table.circle_features();
        assert_eq!(features[0].geometry, Geometry::Point(LonLat::new(139.4777, 35.6689)));
        assert_eq!(
            features[0].properties.to_geojson(),
            json!({"name": "府中市", "population": 260000, "type": "city", "prefecture": "東京都"})
        );
    }

    #[test]
    fn prefecture_rows_name_themselves() {
        let table = PopulationTable::from_json(r#"{"version": 1, "kind": "prefecture", "entries": [
            {"name": "東京都", "population": 14047000, "center": [139.69167, 35.68944]}
        ]}"#).unwrap();
        let props = table.circle_features()[0].properties.to_geojson();
        assert_eq!(props["prefecture"], "東京都");
        assert_eq!(props["type"], "prefecture");
    }

    #[test]
    fn extrusion_radius_and_height_scale_with_population() {
        let table = PopulationTable::from_json(TABLE).unwrap();
        let features = table.extrusion_features();

        let Geometry::Polygon(rings) = &features[1].geometry else { panic!("expected polygon") };
        assert_eq!(rings[0].len(), CIRCLE_SEGMENTS + 1);
        assert_eq!(rings[0].first(), rings[0].last());
        let east = rings[0][0];
        let expected = 0.05 * (3.773f64).sqrt();
        assert!((east.lon - 139.638 - expected).abs() < 1e-12);
        assert!((east.lat - 35.4437).abs() < 1e-12);

        assert_eq!(features[0].properties.get("height"), Some(&json!(2600.0)));
        assert_eq!(features[1].properties.get("height"), Some(&json!(37730.0)));
    }

    #[test]
    fn height_is_capped() {
        assert_eq!(extrusion_height(14_047_000), MAX_HEIGHT);
        assert_eq!(extrusion_height(30_000), 300.0);
        assert_eq!(size_factor(1_000_000), 1.0);
    }

    #[test]
    fn rejects_city_without_prefecture_and_bad_centers() {
        let orphan = r#"{"version": 1, "kind": "city", "entries": [
            {"name": "a", "population": 1, "center": [139.0, 35.0]}
        ]}"#;
        assert!(PopulationTable::from_json(orphan).is_err());
        let swapped = r#"{"version": 1, "kind": "prefecture", "entries": [
            {"name": "a", "population": 1, "center": [35.0, 139.0]}
        ]}"#;
        assert!(PopulationTable::from_json(swapped).is_err());
        assert!(PopulationTable::from_json(r#"{"version": 2, "kind": "city", "entries": []}"#).is_err());
    }

    #[test]
    fn json_output_reloads_unchanged() {
        let table = PopulationTable::from_json(TABLE).unwrap();
        assert_eq!(PopulationTable::from_json(&table.to_json().unwrap()).unwrap(), table);
    }

    #[test]
    fn bundled_tables_load() {
        let prefectures = bundled("population-prefectures.json");
        assert_eq!(prefectures.kind(), PlaceKind::Prefecture);
        assert_eq!(prefectures.len(), 47);
        assert_eq!(prefectures.places()[0].name, "北海道");

        let cities = bundled("population-cities.json");
        assert_eq!(cities.kind(), PlaceKind::City);
        assert_eq!(cities.len(), 284);
        assert!(cities.places().iter().all(|c| c.population >= 30_000));
        let totals = cities.prefecture_totals();
        assert!(totals.keys().all(|p| prefectures.places().iter().any(|q| q.name == *p)));
    }

    #[test]
    fn layers_are_written_per_kind() {
        let dir = tempfile::tempdir().unwrap();
        let table = PopulationTable::from_json(TABLE).unwrap();
        let report = write_population_layers(&table, &dir.path().join("geojson")).unwrap();
        assert!(report.circle_path.ends_with("geojson/population-city-circle.json"));
        assert!(report.extrusion_path.ends_with("geojson/population-city-3d.json"));
        assert_eq!(report.features, 2);

        let extrusions = crate::common::read_feature_collection(&report.extrusion_path).unwrap();
        assert_eq!(extrusions[0]["geometry"]["type"], "Polygon");
        assert_eq!(extrusions[0]["properties"]["height"], json!(2600.0));
    }
}
