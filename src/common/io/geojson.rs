use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Value, json};

use crate::common::write_atomically;
use crate::feature::GeoFeature;

/// Write features to GeoJSON FeatureCollection bytes.
pub(crate) fn write_to_geojson_bytes(features: &[GeoFeature]) -> Result<Vec<u8>> {
    let feature_collection = json!({
        "type": "FeatureCollection",
        "features": features.iter().map(GeoFeature::to_geojson).collect::<Vec<_>>(),
    });

    serde_json::to_vec(&feature_collection).context("Failed to serialize GeoJSON to bytes")
}

/// Write features as a GeoJSON FeatureCollection file at `path`, returning the byte size.
pub fn write_feature_collection(path: &Path, features: &[GeoFeature]) -> Result<u64> {
    let bytes = write_to_geojson_bytes(features)?;
    write_atomically(path, &bytes)
        .with_context(|| format!("Failed to write GeoJSON file: {}", path.display()))?;
    Ok(bytes.len() as u64)
}

/// Read a GeoJSON FeatureCollection file and return its `features` array.
pub fn read_feature_collection(path: &Path) -> Result<Vec<Value>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read GeoJSON file: {}", path.display()))?;
    let mut value: Value = serde_json::from_slice(&bytes).context("Failed to parse GeoJSON bytes")?;

    anyhow::ensure!(
        value["type"] == "FeatureCollection",
        "{} is not a GeoJSON FeatureCollection", path.display()
    );
    match value["features"].take() {
        Value::Array(features) => Ok(features),
        _ => anyhow::bail!("{} has no features array", path.display()),
    }
}
