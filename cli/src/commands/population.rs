use anyhow::Result;
use geoprep::{PopulationTable, write_population_layers};
use tracing::info;

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::PopulationArgs) -> Result<()> {
    for path in &args.tables {
        info!("[population] loading {}", path.display());
        let table = PopulationTable::from_path(path)?;
        let report = write_population_layers(&table, &args.output_dir)?;
        info!(
            "[population] {} {}s, {:.2} KB written",
            report.features, table.kind(), report.bytes_written as f64 / 1024.0
        );
    }
    Ok(())
}
