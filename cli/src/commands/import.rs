use anyhow::{Context, Result};
use walkzone::{decode_file, normalize::TabularOutcome};

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::ImportArgs) -> Result<()> {
    let decoded = decode_file(&args.input).with_context(|| format!("import {}", args.input.display()))?;

    match &decoded.tabular {
        Some(TabularOutcome::NoCoordinateColumns) => {
            tracing::warn!(file = %args.input.display(), "no longitude/latitude columns found, nothing imported");
        }
        Some(TabularOutcome::Empty) => tracing::warn!(file = %args.input.display(), "file has no rows"),
        Some(TabularOutcome::Resolved { x_key, y_key, dropped }) => {
            tracing::info!(%x_key, %y_key, dropped, "coordinates read from columns");
        }
        None => {}
    }

    let bytes = serde_json::to_vec(&decoded.collection.to_geojson())?;
    super::write_output(args.output.as_deref(), &bytes)
}
