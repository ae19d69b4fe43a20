use anyhow::Result;
use geoprep::tile::GeoBoundingBox;
use geoprep::{NaturalEarthConfig, clip_natural_earth};
use tracing::info;

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::NaturalEarthArgs) -> Result<()> {
    let [min_lon, min_lat, max_lon, max_lat] = args.bbox[..] else {
        anyhow::bail!("--bbox takes exactly four values, got {}", args.bbox.len());
    };

    let mut config = NaturalEarthConfig::new(&args.input, &args.output)?;
    config.bbox = GeoBoundingBox::new(min_lon, min_lat, max_lon, max_lat)?;
    config.simplify_tolerance = args.simplify;

    let report = clip_natural_earth(&config)?;
    info!(
        "[natural-earth] {} of {} records inside the window",
        report.records_in_window, report.records_read
    );
    Ok(())
}
