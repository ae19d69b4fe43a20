use anyhow::Result;
use geoprep::{RegionTable, write_feature_collection};
use tracing::info;

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::RegionsArgs) -> Result<()> {
    info!("[regions] loading {}", args.table.display());
    let table = RegionTable::from_path(&args.table)?;

    let features = table.to_features();
    let bytes = write_feature_collection(&args.output, &features)?;
    info!(
        "[regions] wrote {} features to {} ({:.2} KB)",
        features.len(), args.output.display(), bytes as f64 / 1024.0
    );

    for (kind, count) in table.type_counts() {
        info!("[regions]   {kind}: {count}");
    }

    Ok(())
}
