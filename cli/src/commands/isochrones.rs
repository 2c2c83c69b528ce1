use anyhow::Result;
use serde_json::json;
use walkzone::{palette::Palette, spatial::IsochroneContour, Feature, FeatureCollection, Geometry, Properties};

/// Contours as polygon features carrying their metadata and a display color.
fn to_collection(contours: &[IsochroneContour]) -> FeatureCollection {
    let mut palette = Palette::new();
    contours.iter()
        .map(|c| {
            let mut properties = Properties::new();
            properties.insert("minutes".into(), json!(c.minutes));
            properties.insert("zone".into(), json!(c.zone().map(|z| z.to_string())));
            properties.insert("source".into(), json!(c.source.label()));
            properties.insert("area_km2".into(), json!(c.area_km2));
            if let Some(reached) = c.source.reached() {
                properties.insert("num_nodes".into(), json!(reached.nodes));
                properties.insert("num_edges".into(), json!(reached.edges));
            }
            properties.insert("fill".into(), json!(palette.color(&format!("{} min", c.minutes)).to_hex()));
            Feature::new(Geometry::MultiPolygon(c.polygon.clone()), properties)
        })
        .collect()
}

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::IsochroneArgs) -> Result<()> {
    let config = super::load_config(args.origin.config.as_deref())?;
    let contours = super::contours(&args.origin, &config, &args.minutes)?;

    for c in &contours {
        tracing::info!(minutes = c.minutes, source = c.source.label(), area_km2 = c.area_km2, "contour");
    }

    let bytes = serde_json::to_vec(&to_collection(&contours).to_geojson())?;
    super::write_output(args.output.as_deref(), &bytes)
}
