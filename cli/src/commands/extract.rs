use std::time::Duration;

use anyhow::{Context, Result};
use geoprep::tile::{Calibration, ClassFilter, GeoBoundingBox, HttpTileSource};
use geoprep::{ExtractConfig, extract_vector_tiles};
use tracing::info;

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::ExtractArgs) -> Result<()> {
    let [min_lon, min_lat, max_lon, max_lat] = args.bbox[..] else {
        anyhow::bail!("--bbox takes exactly four values, got {}", args.bbox.len());
    };
    let bbox = GeoBoundingBox::new(min_lon, min_lat, max_lon, max_lat)?;

    let mut config = ExtractConfig::new(bbox, args.zoom, &args.output);
    config.layer = args.layer.clone();
    config.filter = if args.all_classes { ClassFilter::all() } else { ClassFilter::only(args.classes.iter().cloned()) };
    config.merge = !args.no_merge;
    config.label = args.label.clone();
    config.calibration = Calibration { extent: args.extent, vertical_offset: args.vertical_offset };

    let timeout = Duration::try_from_secs_f64(args.timeout)
        .with_context(|| format!("invalid timeout: {}", args.timeout))?;
    let source = HttpTileSource::new(&args.url, timeout)?;

    info!("[extract] fetching layer {} from {}", config.layer, source.url_template());
    let report = extract_vector_tiles(&config, &source)?;

    info!(
        "[extract] tiles: {} attempted, {} unavailable, {} failed",
        report.tiles_total, report.tiles_unavailable, report.tiles_failed
    );
    info!(
        "[extract] features: {} extracted, {} written to {}",
        report.features_extracted, report.features_written, config.output.display()
    );

    Ok(())
}
