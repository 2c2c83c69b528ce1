//! Normalization curves from zone-weighted feature counts to a 0-5 score.

use serde::{Deserialize, Serialize};

use crate::spatial::{Zone, ZoneCounts};

/// Highest attainable indicator score.
pub const MAX_SCORE: f64 = 5.0;

/// Relevance of a feature by walking zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ZoneWeights {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Default for ZoneWeights {
    fn default() -> Self { Self { a: 1.0, b: 0.6, c: 0.3 } }
}

impl ZoneWeights {
    pub fn get(&self, zone: Zone) -> f64 {
        match zone { Zone::A => self.a, Zone::B => self.b, Zone::C => self.c }
    }

    /// `count_A * a + count_B * b + count_C * c`.
    pub fn effective_count(&self, counts: ZoneCounts) -> f64 {
        Zone::ALL.iter().map(|&z| counts.get(z) as f64 * self.get(z)).sum()
    }
}

/// Linear curve: `saturation` effective features reach the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinearParams {
    pub saturation: f64,
}

impl Default for LinearParams {
    fn default() -> Self { Self { saturation: 10.0 } }
}

/// Tent curve peaking at `target`, back to zero at `target + overshoot_span`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimalParams {
    pub target: f64,
    pub overshoot_span: f64,
}

impl Default for OptimalParams {
    fn default() -> Self { Self { target: 8.0, overshoot_span: 16.0 } }
}

/// Step curve: `baseline` without zone-A features, `bonus` once one exists.
/// Each effective feature adds `growth` on top.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PresenceParams {
    pub baseline: f64,
    pub bonus: f64,
    pub growth: f64,
}

impl Default for PresenceParams {
    fn default() -> Self { Self { baseline: 0.5, bonus: 3.5, growth: 0.25 } }
}

/// Curve parameters for every strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringParams {
    pub linear: LinearParams,
    pub optimal: OptimalParams,
    pub presence: PresenceParams,
}

/// Normalization strategy, fixed per indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// More is better, saturating.
    Linear,
    /// Penalizes both scarcity and over-saturation.
    OptimalRange,
    /// Existence within zone A matters more than count.
    PresenceBonus,
}

impl Strategy {
    /// Score in `[0, 5]` for the given zone counts.
    pub fn score(self, counts: ZoneCounts, zones: &ZoneWeights, params: &ScoringParams) -> f64 {
        let effective = zones.effective_count(counts);
        let score = match self {
            Self::Linear => {
                let LinearParams { saturation } = params.linear;
                MAX_SCORE * effective / saturation
            }
            Self::OptimalRange => {
                let OptimalParams { target, overshoot_span } = params.optimal;
                if effective <= target {
                    MAX_SCORE * effective / target
                } else {
                    MAX_SCORE * (1.0 - (effective - target) / overshoot_span).max(0.0)
                }
            }
            Self::PresenceBonus => {
                let PresenceParams { baseline, bonus, growth } = params.presence;
                if counts.a > 0 {
                    bonus + growth * (effective - 1.0)
                } else {
                    (baseline + growth * effective).min(bonus)
                }
            }
        };
        if score.is_finite() { score.clamp(0.0, MAX_SCORE) } else { 0.0 }
    }
}
