//! Walking isochrones: provider abstraction, sequential retrieval and buffer fallback.

mod buffer;
#[cfg(feature = "http")]
mod http;
mod network;

use std::{
    sync::{atomic::{AtomicBool, Ordering}, Arc},
    time::Duration,
};

use geo::{MultiPolygon, Point};

pub use buffer::{area_km2, buffer_polygon, destination, haversine_distance, walking_radius_m};
#[cfg(feature = "http")]
pub use http::HttpIsochroneProvider;
pub use network::{NetworkIsochroneProvider, NetworkStats};

use crate::{
    config::IsochroneConfig,
    spatial::{ContourSource, IsochroneContour, ReachedNetwork},
    Error, Result,
};

/// Something that can compute the area reachable on foot from a point.
pub trait IsochroneProvider {
    /// Short name recorded on the contours it produces.
    fn name(&self) -> &str;

    /// Reachable area within `minutes` of walking from `origin`.
    fn fetch(&self, origin: Point<f64>, minutes: f64) -> Result<MultiPolygon<f64>>;

    /// [`fetch`](Self::fetch), plus the size of the street network reached when the
    /// provider traverses it itself.
    fn fetch_reached(&self, origin: Point<f64>, minutes: f64) -> Result<(MultiPolygon<f64>, Option<ReachedNetwork>)> {
        Ok((self.fetch(origin, minutes)?, None))
    }
}

/// Shared flag used to abort a contour run between requests.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self { Self::default() }

    pub fn cancel(&self) { self.0.store(true, Ordering::SeqCst) }

    pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::SeqCst) }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() { Err(Error::Cancelled) } else { Ok(()) }
    }
}

/// Retrieval policy for [`fetch_contours`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Pause between consecutive provider requests.
    pub request_delay: Duration,
    /// Replace failed thresholds with circular buffers.
    pub fallback_to_buffers: bool,
    /// Straight-line walking speed for buffers, in m/s.
    pub walking_speed_ms: f64,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self { request_delay: Duration::from_millis(200), fallback_to_buffers: true, walking_speed_ms: 1.4 }
    }
}

impl From<&IsochroneConfig> for FetchOptions {
    fn from(config: &IsochroneConfig) -> Self {
        Self {
            request_delay: Duration::from_millis(config.request_delay_ms),
            fallback_to_buffers: config.fallback_to_buffers,
            walking_speed_ms: config.walking_speed_ms,
        }
    }
}

/// A buffer contour standing in for a network one.
pub fn buffer_contour(origin: Point<f64>, minutes: f64, walking_speed_ms: f64, reason: impl Into<String>) -> IsochroneContour {
    let polygon = MultiPolygon::new(vec![buffer_polygon(origin, walking_radius_m(minutes, walking_speed_ms))]);
    IsochroneContour {
        area_km2: area_km2(&polygon),
        polygon,
        minutes,
        source: ContourSource::BufferFallback { reason: reason.into() },
    }
}

/// Sorted, de-duplicated, positive thresholds.
fn thresholds(minutes: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = minutes.iter().copied()
        .filter(|m| {
            let ok = m.is_finite() && *m > 0.0;
            if !ok { tracing::warn!(minutes = m, "ignoring invalid isochrone threshold") }
            ok
        })
        .collect();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    sorted
}

/// Fetch one contour per threshold, in ascending minutes.
///
/// Requests are issued one at a time with `options.request_delay` between them.
/// A failed threshold is replaced by a buffer contour when fallback is enabled and
/// omitted otherwise; if every threshold fails without fallback the run fails with
/// [`Error::IsochroneUnavailable`]. With no provider every contour is a buffer.
pub fn fetch_contours(
    provider: Option<&dyn IsochroneProvider>,
    origin: Point<f64>,
    minutes: &[f64],
    options: &FetchOptions,
    cancel: &CancellationToken,
) -> Result<Vec<IsochroneContour>> {
    let thresholds = thresholds(minutes);
    if thresholds.is_empty() {
        return Err(Error::IsochroneUnavailable { minutes: minutes.to_vec(), reason: "no valid thresholds".into() });
    }

    let Some(provider) = provider else {
        tracing::info!(?thresholds, "no isochrone provider, using walking buffers");
        return thresholds.iter()
            .map(|&m| {
                cancel.check()?;
                Ok(buffer_contour(origin, m, options.walking_speed_ms, "no isochrone provider configured"))
            })
            .collect();
    };

    let mut contours = Vec::with_capacity(thresholds.len());
    let mut failures: Vec<String> = Vec::new();

    for (i, &m) in thresholds.iter().enumerate() {
        cancel.check()?;
        if i > 0 && !options.request_delay.is_zero() {
            std::thread::sleep(options.request_delay);
            cancel.check()?;
        }

        match provider.fetch_reached(origin, m) {
            Ok((polygon, reached)) if !polygon.0.is_empty() => {
                tracing::debug!(provider = provider.name(), minutes = m, "fetched isochrone");
                contours.push(IsochroneContour {
                    area_km2: area_km2(&polygon),
                    polygon,
                    minutes: m,
                    source: ContourSource::NetworkIsochrone { provider: provider.name().to_string(), reached },
                });
            }
            outcome => {
                let reason = match outcome {
                    Err(Error::Cancelled) => return Err(Error::Cancelled),
                    Err(e) => e.to_string(),
                    Ok(_) => "provider returned an empty polygon".to_string(),
                };
                tracing::warn!(provider = provider.name(), minutes = m, %reason, "isochrone request failed");
                if options.fallback_to_buffers {
                    contours.push(buffer_contour(origin, m, options.walking_speed_ms, reason.clone()));
                }
                failures.push(format!("{m} min: {reason}"));
            }
        }
    }

    if failures.len() == thresholds.len() {
        if !options.fallback_to_buffers {
            return Err(Error::IsochroneUnavailable { minutes: thresholds, reason: failures.join("; ") });
        }
        tracing::warn!(provider = provider.name(), "every isochrone request failed, all contours are walking buffers");
    }
    Ok(contours)
}
