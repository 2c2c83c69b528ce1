//! OpenRouteService-compatible isochrone client.

use std::time::Duration;

use geo::{MultiPolygon, Point};
use reqwest::blocking::Client;
use serde_json::json;

use super::IsochroneProvider;
use crate::{config::HttpProviderConfig, feature::Geometry, Error, Result};

const USER_AGENT: &str = concat!("walkzone/", env!("CARGO_PKG_VERSION"));

/// Blocking client for a `POST {url}/v2/isochrones/{profile}` endpoint that
/// answers with a GeoJSON FeatureCollection of reachability polygons.
#[derive(Debug)]
pub struct HttpIsochroneProvider {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpIsochroneProvider {
    pub fn new(config: &HttpProviderConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/v2/isochrones/{}", config.url.trim_end_matches('/'), config.profile),
            api_key: config.api_key.clone(),
        })
    }
}

impl IsochroneProvider for HttpIsochroneProvider {
    fn name(&self) -> &str { "openrouteservice" }

    fn fetch(&self, origin: Point<f64>, minutes: f64) -> Result<MultiPolygon<f64>> {
        let body = json!({
            "locations": [[origin.x(), origin.y()]],
            "range": [minutes * 60.0],
            "range_type": "time",
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header(reqwest::header::AUTHORIZATION, key);
        }

        let response = request.send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Http(format!("POST {}: {e}", self.endpoint)))?;
        let collection: geojson::FeatureCollection = response.json()
            .map_err(|e| Error::Http(format!("POST {}: invalid response ({e})", self.endpoint)))?;

        let polygons: Vec<_> = collection.features.iter()
            .filter_map(|f| Geometry::from_geojson(&f.geometry.as_ref()?.value)?.as_multipolygon())
            .flat_map(|mp| mp.0)
            .collect();
        if polygons.is_empty() {
            return Err(Error::Http(format!("POST {}: response contained no polygons", self.endpoint)));
        }
        Ok(MultiPolygon::new(polygons))
    }
}
