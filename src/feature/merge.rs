use geo::MultiPolygon;
use tracing::{debug, warn};

use crate::common::{clean_polygon, try_union_all};
use crate::feature::{GeoFeature, GeoGeometry, Properties};

/// Label and provenance recorded on a merged feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeLabel {
    pub label: String,
    pub source: String,
}

impl MergeLabel {
    pub fn new(label: impl Into<String>, source: impl Into<String>) -> Self {
        Self { label: label.into(), source: source.into() }
    }

    fn properties(&self) -> Properties {
        Properties::from_attributes([("type", self.label.clone()), ("source", self.source.clone())])
    }
}

/// What the merge step did with its input.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// Merging was disabled; features are the input.
    Disabled(Vec<GeoFeature>),
    /// Valid polygons were unioned into one feature, followed by any non-polygonal features.
    Merged { features: Vec<GeoFeature>, unioned: usize, dropped: usize },
    /// No valid polygon was found; features are the input.
    Skipped(Vec<GeoFeature>),
    /// The union failed; features are the input.
    Fallback { features: Vec<GeoFeature>, reason: String },
}

impl MergeOutcome {
    pub fn features(&self) -> &[GeoFeature] {
        match self {
            MergeOutcome::Disabled(features)
            | MergeOutcome::Skipped(features)
            | MergeOutcome::Merged { features, .. }
            | MergeOutcome::Fallback { features, .. } => features,
        }
    }

    pub fn into_features(self) -> Vec<GeoFeature> {
        match self {
            MergeOutcome::Disabled(features)
            | MergeOutcome::Skipped(features)
            | MergeOutcome::Merged { features, .. }
            | MergeOutcome::Fallback { features, .. } => features,
        }
    }
}

/// Keep only the valid parts of a feature's planar polygon, with repeated vertices removed.
fn valid_multipolygon(feature: &GeoFeature) -> Option<MultiPolygon<f64>> {
    let mp = feature.geometry.to_multipolygon()?;
    let valid: Vec<_> = mp.0.iter().filter_map(clean_polygon).collect();
    (!valid.is_empty()).then_some(MultiPolygon(valid))
}

/// Union all polygonal features into one feature labelled by `label`.
///
/// Invalid or empty polygons are dropped before the union. Points and lines are
/// passed through after the merged feature. If the union fails, the input is
/// returned unchanged.
pub fn merge_by_class(features: Vec<GeoFeature>, enable_merge: bool, label: &MergeLabel) -> MergeOutcome {
    if !enable_merge {
        return MergeOutcome::Disabled(features);
    }
    merge_with(features, label, try_union_all)
}

fn merge_with(
    features: Vec<GeoFeature>,
    label: &MergeLabel,
    union: impl FnOnce(Vec<MultiPolygon<f64>>) -> Result<MultiPolygon<f64>, String>,
) -> MergeOutcome {
    let mut shapes = Vec::new();
    let mut passthrough = Vec::new();
    let mut dropped = 0;
    for feature in &features {
        if !feature.geometry.is_polygonal() {
            passthrough.push(feature.clone());
            continue;
        }
        match valid_multipolygon(feature) {
            Some(mp) => shapes.push(mp),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        warn!("[merge] dropped {dropped} invalid or empty polygon features");
    }
    if shapes.is_empty() {
        debug!("[merge] no valid polygon to merge");
        return MergeOutcome::Skipped(features);
    }

    let unioned = shapes.len();
    let merged = match union(shapes) {
        Ok(mp) => mp,
        Err(reason) => {
            warn!("[merge] union failed: {reason}; keeping unmerged features");
            return MergeOutcome::Fallback { features, reason };
        }
    };

    let mut out = Vec::with_capacity(1 + passthrough.len());
    out.push(GeoFeature {
        geometry: GeoGeometry::from_multipolygon(&merged),
        properties: label.properties(),
    });
    out.extend(passthrough);

    MergeOutcome::Merged { features: out, unioned, dropped }
}
