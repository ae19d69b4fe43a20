use anyhow::Result;
use geoprep::{CityHallConfig, fix_city_coordinates};
use tracing::info;

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::CityhallArgs) -> Result<()> {
    let output = args.output.clone().unwrap_or_else(|| args.table.clone());
    let mut config = CityHallConfig::new(&args.table, &args.city_halls, output);
    config.moved_threshold_km = args.report_km;

    let report = fix_city_coordinates(&config)?;
    info!(
        "[cityhall] {} matched, {} unmatched, {} moved more than {} km",
        report.exact + report.by_name, report.unmatched.len(), report.moved.len(), args.report_km
    );
    Ok(())
}
