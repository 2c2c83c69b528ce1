//! Analysis settings loaded from TOML.
//!
//! Every section is optional; a missing file section takes its defaults.
//!
//! ```toml
//! [weights]
//! urban = 40
//! social = 20
//! economic = 20
//! historical = 20
//!
//! [scoring.optimal]
//! target = 6
//!
//! [isochrone]
//! minutes = [5, 10, 15]
//! fallback_to_buffers = true
//!
//! [isochrone.http]
//! api_key = "..."
//!
//! [[indicators]]
//! id = "cycling"
//! enabled = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    scoring::{catalog, CategoryWeights, ScoringParams, ZoneWeights},
    Error, Result,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub weights: CategoryWeights,
    pub zones: ZoneWeights,
    pub scoring: ScoringParams,
    pub isochrone: IsochroneConfig,
    pub indicators: Vec<IndicatorOverride>,
}

/// Enable or disable one catalog indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndicatorOverride {
    pub id: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IsochroneConfig {
    /// Contour thresholds in minutes.
    pub minutes: Vec<f64>,
    /// Straight-line speed for buffer contours, in m/s.
    pub walking_speed_ms: f64,
    /// Speed along street-network edges, in m/s.
    pub network_walking_speed_ms: f64,
    pub request_delay_ms: u64,
    pub timeout_secs: u64,
    pub fallback_to_buffers: bool,
    pub http: Option<HttpProviderConfig>,
}

impl Default for IsochroneConfig {
    fn default() -> Self {
        Self {
            minutes: vec![5.0, 10.0, 15.0],
            walking_speed_ms: 1.4,
            network_walking_speed_ms: 1.25,
            request_delay_ms: 200,
            timeout_secs: 30,
            fallback_to_buffers: true,
            http: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpProviderConfig {
    pub url: String,
    pub api_key: Option<String>,
    /// Routing profile, e.g. `foot-walking`.
    pub profile: String,
}

impl Default for HttpProviderConfig {
    fn default() -> Self {
        Self {
            url: "https://api.openrouteservice.org".to_string(),
            api_key: None,
            profile: "foot-walking".to_string(),
        }
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 { Ok(()) } else {
        Err(Error::Config(format!("{name} must be positive, got {value}")))
    }
}

impl AnalysisConfig {
    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml_str(&text)
            .map_err(|e| match e {
                Error::Config(reason) => Error::Config(format!("{}: {reason}", path.display())),
                other => other,
            })
    }

    pub fn validate(&self) -> Result<()> {
        self.weights.validate().map_err(Error::Config)?;

        for (name, value) in [("zones.a", self.zones.a), ("zones.b", self.zones.b), ("zones.c", self.zones.c)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(Error::Config(format!("{name} must be non-negative, got {value}")));
            }
        }

        positive("scoring.linear.saturation", self.scoring.linear.saturation)?;
        positive("scoring.optimal.target", self.scoring.optimal.target)?;
        positive("scoring.optimal.overshoot_span", self.scoring.optimal.overshoot_span)?;
        let p = &self.scoring.presence;
        if !(0.0..=5.0).contains(&p.baseline) || !(p.baseline..=5.0).contains(&p.bonus) || !(p.growth >= 0.0) {
            return Err(Error::Config("scoring.presence requires 0 <= baseline <= bonus <= 5 and growth >= 0".into()));
        }

        if self.isochrone.minutes.is_empty() {
            return Err(Error::Config("isochrone.minutes must not be empty".into()));
        }
        for &m in &self.isochrone.minutes {
            positive("isochrone.minutes", m)?;
        }
        positive("isochrone.walking_speed_ms", self.isochrone.walking_speed_ms)?;
        positive("isochrone.network_walking_speed_ms", self.isochrone.network_walking_speed_ms)?;
        if self.isochrone.timeout_secs == 0 {
            return Err(Error::Config("isochrone.timeout_secs must be at least 1".into()));
        }

        let known = catalog();
        if let Some(unknown) = self.indicators.iter().find(|o| !known.iter().any(|i| i.id == o.id)) {
            return Err(Error::Config(format!("unknown indicator '{}'", unknown.id)));
        }
        Ok(())
    }
}
