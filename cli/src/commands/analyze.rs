use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result};
use geo::Point;
use walkzone::{decode_file, Analysis, FeatureCollection, Format};

/// Decode every supported file in `dir`, keyed by file stem. Unsupported files are skipped.
fn load_layers(dir: &Path) -> Result<HashMap<String, FeatureCollection>> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("read layer directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    let mut layers = HashMap::new();
    for path in paths {
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        if Format::from_filename(&name).is_err() {
            tracing::debug!(file = %path.display(), "skipping unsupported file");
            continue;
        }
        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else { continue };

        let decoded = decode_file(&path).with_context(|| format!("read layer {}", path.display()))?;
        tracing::info!(layer = %stem, features = decoded.collection.len(), "loaded layer");
        layers.insert(stem, decoded.collection);
    }
    Ok(layers)
}

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::AnalyzeArgs) -> Result<()> {
    let config = super::load_config(args.origin.config.as_deref())?;
    let analysis = Analysis::new(&config)?;

    let layers = load_layers(&args.layers)?;
    for indicator in analysis.indicators().iter().filter(|i| i.enabled) {
        if !layers.contains_key(indicator.data_source) {
            tracing::warn!(indicator = indicator.id, "no layer named '{}', scoring as empty", indicator.data_source);
        }
    }

    let contours = super::contours(&args.origin, &config, &[])?;
    let result = analysis.run(Point::new(args.origin.lon, args.origin.lat), &contours, &layers);

    let bytes = serde_json::to_vec_pretty(&result)?;
    super::write_output(args.output.as_deref(), &bytes)
}
