pub mod analyze;
pub mod clip;
pub mod import;
pub mod isochrones;

use std::{io::Write, path::Path};

use anyhow::{Context, Result};
use geo::Point;
use walkzone::{
    config::AnalysisConfig,
    decode_file,
    isochrone::{fetch_contours, CancellationToken, FetchOptions, IsochroneProvider, NetworkIsochroneProvider},
    spatial::IsochroneContour,
};

use crate::cli::OriginArgs;

/// Write to `path`, or stdout when absent.
pub(crate) fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, bytes).with_context(|| format!("write {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.write_all(b"\n")?;
            Ok(())
        }
    }
}

pub(crate) fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => AnalysisConfig::load(path).with_context(|| format!("load config {}", path.display())),
        None => Ok(AnalysisConfig::default()),
    }
}

/// Pick the isochrone provider: an explicit street network, then a configured HTTP
/// service. `None` means walking buffers.
fn provider(origin: &OriginArgs, config: &AnalysisConfig) -> Result<Option<Box<dyn IsochroneProvider>>> {
    if origin.buffers { return Ok(None) }

    if let Some(path) = &origin.network {
        let network = decode_file(path).with_context(|| format!("read street network {}", path.display()))?;
        let provider = NetworkIsochroneProvider::new(&network.collection, config.isochrone.network_walking_speed_ms)?;
        let stats = provider.stats();
        tracing::info!(nodes = stats.nodes, edges = stats.edges, connected = stats.connected, average_degree = stats.average_degree, "loaded street network");
        return Ok(Some(Box::new(provider)));
    }

    #[cfg(feature = "http")]
    if let Some(http) = &config.isochrone.http {
        let timeout = std::time::Duration::from_secs(config.isochrone.timeout_secs);
        return Ok(Some(Box::new(walkzone::isochrone::HttpIsochroneProvider::new(http, timeout)?)));
    }

    Ok(None)
}

/// Contours around the origin using the configured provider and fallback policy.
pub(crate) fn contours(origin: &OriginArgs, config: &AnalysisConfig, minutes: &[f64]) -> Result<Vec<IsochroneContour>> {
    let point = Point::new(origin.lon, origin.lat);
    let provider = provider(origin, config)?;
    let minutes = if minutes.is_empty() { config.isochrone.minutes.as_slice() } else { minutes };

    fetch_contours(provider.as_deref(), point, minutes, &FetchOptions::from(&config.isochrone), &CancellationToken::new())
        .with_context(|| format!("isochrones around ({}, {})", origin.lon, origin.lat))
}
