use anyhow::Result;
use geoprep::{LanduseConfig, convert_landuse};
use tracing::info;

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::LanduseArgs) -> Result<()> {
    let mut config = LanduseConfig::new(&args.input, &args.output);
    config.simplify_tolerance = args.simplify;
    config.code_column = args.code_column.clone();
    config.source_proj = args.source_proj.clone();

    let report = convert_landuse(&config)?;
    info!(
        "[landuse] {} of {} records kept, {} features written",
        report.records_kept, report.records_read, report.features_written
    );

    Ok(())
}
