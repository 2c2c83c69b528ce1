//! Zone-weighted indicator scoring, category weights and the composite score.

mod aggregate;
mod analysis;
mod indicator;
mod strategy;
mod weights;

pub use aggregate::{aggregate, CategoryScores};
pub use analysis::{Analysis, AnalysisResult, ContourSummary, IndicatorScore};
pub use indicator::{catalog, Category, Indicator, ZoneSensitivity};
pub use strategy::{LinearParams, OptimalParams, PresenceParams, ScoringParams, Strategy, ZoneWeights, MAX_SCORE};
pub use weights::{CategoryWeights, SUM_TOLERANCE};
