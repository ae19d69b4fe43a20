use std::path::PathBuf;

use anyhow::{Result, ensure};
use tracing::{info, warn};

use crate::common::{prepare_output_path, write_feature_collection};
use crate::feature::{GeoFeature, MergeLabel, MergeOutcome, merge_by_class};
use crate::tile::{
    Calibration, ClassFilter, GeoBoundingBox, MAX_ZOOM, TileError, TileSource,
    bounding_box_to_tile_range, decode_and_reproject,
};

/// Settings for one vector-tile extraction run.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    pub bbox: GeoBoundingBox,
    pub zoom: u8,
    pub output: PathBuf,
    pub layer: String,
    pub filter: ClassFilter,
    pub calibration: Calibration,
    pub merge: bool,
    /// Label stored on the merged feature.
    pub label: String,
    /// Report progress each time this many more features have accumulated.
    pub progress_every: usize,
}

impl ExtractConfig {
    /// Defaults for urban areas over Japan from the OpenStreetMap Japan tile server.
    pub fn new(bbox: GeoBoundingBox, zoom: u8, output: impl Into<PathBuf>) -> Self {
        Self {
            bbox,
            zoom,
            output: output.into(),
            layer: "landuse".into(),
            filter: ClassFilter::only(["residential", "commercial", "industrial"]),
            calibration: Calibration::default(),
            merge: true,
            label: "urban".into(),
            progress_every: 100,
        }
    }

    /// Provenance recorded on the merged feature.
    pub fn source_description(&self) -> String {
        format!("OpenStreetMap zoom {}", self.zoom)
    }

    /// Reject settings that cannot produce a run. Creates the output directory.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.zoom <= MAX_ZOOM, "zoom {} exceeds maximum of {MAX_ZOOM}", self.zoom);
        ensure!(!self.layer.is_empty(), "layer name must not be empty");
        ensure!(
            self.calibration.extent.is_finite() && self.calibration.extent > 0.0,
            "tile extent must be positive, got {}", self.calibration.extent
        );
        ensure!(
            self.calibration.vertical_offset.is_finite(),
            "vertical offset must be finite, got {}", self.calibration.vertical_offset
        );
        if let Some(mut classes) = self.filter.classes() {
            ensure!(classes.next().is_some(), "class filter is active but lists no classes");
        }
        ensure!(self.progress_every > 0, "progress interval must be positive");
        ensure!(!self.label.is_empty(), "merge label must not be empty");
        prepare_output_path(&self.output)
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub tiles_total: u64,
    pub tiles_unavailable: u64,
    pub tiles_failed: u64,
    pub features_extracted: usize,
    pub features_written: usize,
    pub merged: bool,
    pub bytes_written: u64,
}

/// Download every tile covering the bounding box, decode and reproject the
/// selected layer, optionally merge the result, and write one FeatureCollection.
///
/// Per-tile failures are logged and counted; nothing is written until every
/// tile has been processed.
pub fn extract_vector_tiles(config: &ExtractConfig, source: &impl TileSource) -> Result<ExtractReport> {
    config.validate()?;

    let range = bounding_box_to_tile_range(&config.bbox, config.zoom)?;
    info!(
        "[extract] zoom {}: tiles x={}-{}, y={}-{}",
        config.zoom, range.x_min, range.x_max, range.y_min, range.y_max
    );
    info!("[extract] total tiles: {}", range.tile_count());

    let mut report = ExtractReport { tiles_total: range.tile_count(), ..Default::default() };
    let mut features: Vec<GeoFeature> = Vec::new();
    let mut next_checkpoint = config.progress_every;

    for tile in range.iter() {
        let decoded = source.fetch(tile).and_then(|payload| {
            decode_and_reproject(&payload, tile, &config.layer, &config.filter, &config.calibration)
        });

        match decoded {
            Ok(tile_features) => features.extend(tile_features),
            Err(e @ (TileError::Status { .. } | TileError::Transport { .. })) => {
                warn!("[extract] {e}");
                report.tiles_unavailable += 1;
            }
            Err(e @ TileError::Decode { .. }) => {
                warn!("[extract] {e}");
                report.tiles_failed += 1;
            }
        }

        if features.len() >= next_checkpoint {
            info!("[extract] progress: {} features extracted", features.len());
            next_checkpoint = (features.len() / config.progress_every + 1) * config.progress_every;
        }
    }

    report.features_extracted = features.len();
    info!("[extract] extracted {} features", report.features_extracted);

    let label = MergeLabel::new(&config.label, config.source_description());
    if config.merge {
        info!("[extract] merging polygons");
    }
    let outcome = merge_by_class(features, config.merge, &label);
    match &outcome {
        MergeOutcome::Merged { features, unioned, dropped } => {
            info!("[extract] merged {unioned} polygons into {} features ({dropped} dropped)", features.len());
            report.merged = true;
        }
        MergeOutcome::Fallback { reason, .. } => {
            warn!("[extract] merge skipped ({reason}); writing unmerged features");
        }
        MergeOutcome::Skipped(_) | MergeOutcome::Disabled(_) => {}
    }
    let features = outcome.into_features();

    info!("[extract] writing {}", config.output.display());
    report.features_written = features.len();
    report.bytes_written = write_feature_collection(&config.output, &features)?;
    info!(
        "[extract] done: {} features, {:.2} MB",
        report.features_written,
        report.bytes_written as f64 / 1024.0 / 1024.0
    );

    Ok(report)
}
