use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::feature::{GeoFeature, Geometry, LonLat, Properties};

/// Only version understood by [`RegionTable::from_json`].
pub const REGION_TABLE_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
struct RegionFile {
    version: u32,
    regions: Vec<RegionEntry>,
}

#[derive(Debug, Deserialize)]
struct RegionEntry {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    coords: Vec<[f64; 2]>,
}

/// A named, hand-drawn landcover area.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    name: String,
    kind: String,
    ring: Vec<LonLat>,
}

impl Region {
    #[inline] pub fn name(&self) -> &str { &self.name }
    #[inline] pub fn kind(&self) -> &str { &self.kind }
    /// Closed exterior ring.
    #[inline] pub fn ring(&self) -> &[LonLat] { &self.ring }

    fn from_entry(index: usize, entry: RegionEntry) -> Result<Self> {
        let RegionEntry { name, kind, coords } = entry;
        ensure!(!kind.trim().is_empty(), "region #{index} ({name}) has an empty type");
        ensure!(
            coords.iter().flatten().all(|v| v.is_finite()),
            "region #{index} ({name}) has a non-finite coordinate"
        );

        let mut ring: Vec<LonLat> = coords.iter().map(|&[lon, lat]| LonLat::new(lon, lat)).collect();
        let mut distinct: Vec<LonLat> = Vec::new();
        for p in &ring {
            if !distinct.contains(p) { distinct.push(*p) }
        }
        ensure!(
            distinct.len() >= 3,
            "region #{index} ({name}) needs at least 3 distinct positions, got {}", distinct.len()
        );

        if ring.first() != ring.last() {
            ring.push(ring[0]);
        }
        Ok(Self { name, kind, ring })
    }

    pub fn to_feature(&self) -> GeoFeature {
        GeoFeature {
            geometry: Geometry::Polygon(vec![self.ring.clone()]),
            properties: Properties::from_attributes([
                ("type", self.kind.clone()),
                ("name", self.name.clone()),
            ]),
        }
    }
}

/// Immutable set of landcover regions loaded from a versioned JSON file.
#[derive(Debug, Clone, Default)]
pub struct RegionTable {
    regions: Vec<Region>,
}

impl RegionTable {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read region table: {}", path.display()))?;
        Self::from_json(&text)
            .with_context(|| format!("Invalid region table: {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let file: RegionFile = serde_json::from_str(text).context("Failed to parse region table JSON")?;
        ensure!(
            file.version == REGION_TABLE_VERSION,
            "unsupported region table version {} (expected {REGION_TABLE_VERSION})", file.version
        );

        let regions = file.regions.into_iter()
            .enumerate()
            .map(|(i, entry)| Region::from_entry(i, entry))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { regions })
    }

    #[inline] pub fn regions(&self) -> &[Region] { &self.regions }
    #[inline] pub fn len(&self) -> usize { self.regions.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.regions.is_empty() }

    /// One Polygon feature per region, in file order.
    pub fn to_features(&self) -> Vec<GeoFeature> {
        self.regions.iter().map(Region::to_feature).collect()
    }

    /// Number of regions per type.
    pub fn type_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for region in &self.regions {
            *counts.entry(region.kind()).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const TABLE: &str = r#"{
        "version": 1,
        "regions": [
            {"name": "琵琶湖", "type": "water", "coords": [[135.9, 34.95], [136.3, 34.95], [136.3, 35.55], [135.9, 35.55]]},
            {"name": "紀伊山地", "type": "forest", "coords": [[135.0, 33.3], [136.8, 33.3], [136.8, 34.8], [135.0, 33.3]]}
        ]
    }"#;

    #[test]
    fn open_rings_are_closed() {
        let table = RegionTable::from_json(TABLE).unwrap();
        let ring = table.regions()[0].ring();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.first(), ring.last());
        assert_eq!(table.regions()[1].ring().len(), 4);
    }

    #[test]
    fn features_follow_file_order() {
        let features = RegionTable::from_json(TABLE).unwrap().to_features();
        let props: Vec<_> = features.iter().map(|f| f.properties.to_geojson()).collect();
        assert_eq!(props, vec![
            json!({"type": "water", "name": "琵琶湖"}),
            json!({"type": "forest", "name": "紀伊山地"}),
        ]);
        assert_eq!(features[0].geometry.type_name(), "Polygon");
    }

    #[test]
    fn rejects_degenerate_regions() {
        let two_points = r#"{"version": 1, "regions": [
            {"name": "a", "type": "water", "coords": [[1.0, 1.0], [2.0, 2.0], [1.0, 1.0]]}
        ]}"#;
        assert!(RegionTable::from_json(two_points).is_err());

        let no_type = r#"{"version": 1, "regions": [
            {"name": "a", "type": " ", "coords": [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]}
        ]}"#;
        assert!(RegionTable::from_json(no_type).is_err());
    }

    #[test]
    fn rejects_unknown_version() {
        assert!(RegionTable::from_json(r#"{"version": 2, "regions": []}"#).is_err());
    }

    #[test]
    fn bundled_table_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/landcover-regions.json");
        let table = RegionTable::from_path(&path).unwrap();
        let counts: Vec<_> = table.type_counts().into_iter().collect();
        assert_eq!(counts, vec![("forest", 7), ("grassland", 12), ("water", 4)]);
        assert_eq!(table.regions()[0].kind(), "forest");
    }
}
