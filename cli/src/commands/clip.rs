use anyhow::{Context, Result};
use walkzone::{decode_file, io::first_polygon, spatial::clip_to_polygon};

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::ClipArgs) -> Result<()> {
    let features = decode_file(&args.features).with_context(|| format!("read {}", args.features.display()))?;
    let boundary = decode_file(&args.boundary).with_context(|| format!("read {}", args.boundary.display()))?;

    let polygon = first_polygon(&boundary.collection)
        .with_context(|| format!("{} contains no polygon", args.boundary.display()))?;

    let clipped = clip_to_polygon(&features.collection, &polygon);
    tracing::info!(kept = clipped.len(), of = features.collection.len(), "clipped");

    let bytes = serde_json::to_vec(&clipped.to_geojson())?;
    super::write_output(args.output.as_deref(), &bytes)
}
