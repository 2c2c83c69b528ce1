use std::collections::HashMap;

use chrono::{DateTime, Utc};
use geo::Point;
use serde::Serialize;

use super::{aggregate, catalog, Category, CategoryScores, CategoryWeights, Indicator, ScoringParams, Strategy, ZoneWeights};
use crate::{
    config::AnalysisConfig,
    feature::FeatureCollection,
    spatial::{classify, IsochroneContour, ReachedNetwork, Zone, ZoneCounts},
    Error, Result,
};

/// Score of one enabled indicator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorScore {
    pub id: &'static str,
    pub category: Category,
    pub strategy: Strategy,
    pub counts: ZoneCounts,
    pub effective_count: f64,
    pub score: f64,
    /// `false` when the indicator's layer was not supplied.
    pub layer_present: bool,
}

/// Contour metadata carried into the result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContourSummary {
    pub minutes: f64,
    pub zone: Option<Zone>,
    pub source: &'static str,
    pub area_km2: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reached: Option<ReachedNetwork>,
}

/// Outcome of one analysis run. Superseded, never mutated, by the next run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    /// `[lon, lat]`.
    pub source_point: [f64; 2],
    pub category_scores: CategoryScores,
    pub total_score: f64,
    pub weights: CategoryWeights,
    /// Features by zone, summed over the distinct layers of enabled indicators.
    pub feature_counts_by_zone: ZoneCounts,
    pub indicators: Vec<IndicatorScore>,
    pub contours: Vec<ContourSummary>,
    pub timestamp: DateTime<Utc>,
}

/// Indicator catalog, category weights and scoring parameters for analysis runs.
#[derive(Debug, Clone)]
pub struct Analysis {
    indicators: Vec<Indicator>,
    weights: CategoryWeights,
    zones: ZoneWeights,
    params: ScoringParams,
}

impl Default for Analysis {
    fn default() -> Self {
        Self {
            indicators: catalog(),
            weights: CategoryWeights::default(),
            zones: ZoneWeights::default(),
            params: ScoringParams::default(),
        }
    }
}

impl Analysis {
    /// Catalog with the config's weights, curves and indicator overrides applied.
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        config.validate()?;
        let mut analysis = Self {
            weights: config.weights,
            zones: config.zones,
            params: config.scoring,
            ..Self::default()
        };
        for o in &config.indicators {
            analysis.set_enabled(&o.id, o.enabled)?;
        }
        Ok(analysis)
    }

    pub fn indicators(&self) -> &[Indicator] { &self.indicators }

    pub fn weights(&self) -> CategoryWeights { self.weights }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<()> {
        let indicator = self.indicators.iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| Error::Config(format!("unknown indicator '{id}'")))?;
        indicator.enabled = enabled;
        Ok(())
    }

    /// Rebalancing weight update; see [`CategoryWeights::set_weight`].
    pub fn set_weight(&mut self, category: Category, value: f64) -> CategoryWeights {
        self.weights.set_weight(category, value)
    }

    /// Score `point` against `contours` using the point-of-interest `layers`, keyed
    /// by indicator data source. Layers are only read.
    pub fn run(
        &self,
        point: Point<f64>,
        contours: &[IsochroneContour],
        layers: &HashMap<String, FeatureCollection>,
    ) -> AnalysisResult {
        let empty = FeatureCollection::default();
        let mut counts_by_source: HashMap<&str, ZoneCounts> = HashMap::new();

        let indicators: Vec<IndicatorScore> = self.indicators.iter()
            .filter(|i| i.enabled)
            .map(|indicator| {
                let layer = layers.get(indicator.data_source);
                if layer.is_none() {
                    tracing::debug!(indicator = indicator.id, "layer missing, scoring as empty");
                }

                let counts = *counts_by_source.entry(indicator.data_source)
                    .or_insert_with(|| classify(layer.unwrap_or(&empty), contours).counts());
                IndicatorScore {
                    id: indicator.id,
                    category: indicator.category,
                    strategy: indicator.strategy,
                    counts,
                    effective_count: self.zones.effective_count(counts),
                    score: indicator.strategy.score(counts, &self.zones, &self.params),
                    layer_present: layer.is_some(),
                }
            })
            .collect();

        let category_scores = CategoryScores::averages(indicators.iter().map(|s| (s.category, s.score)));
        let total_score = aggregate(&category_scores, &self.weights);

        let mut feature_counts_by_zone = ZoneCounts::default();
        for counts in counts_by_source.values() {
            feature_counts_by_zone += *counts;
        }

        let mut contours: Vec<ContourSummary> = contours.iter()
            .map(|c| ContourSummary {
                minutes: c.minutes,
                zone: c.zone(),
                source: c.source.label(),
                area_km2: c.area_km2,
                reached: c.source.reached(),
            })
            .collect();
        contours.sort_by(|a, b| a.minutes.total_cmp(&b.minutes));

        tracing::info!(lon = point.x(), lat = point.y(), total_score, indicators = indicators.len(), "analysis complete");
        AnalysisResult {
            source_point: [point.x(), point.y()],
            category_scores,
            total_score,
            weights: self.weights,
            feature_counts_by_zone,
            indicators,
            contours,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use geo::{polygon, MultiPolygon};

    use super::*;
    use crate::{feature::Feature, spatial::ContourSource};

    fn contour(minutes: f64, half: f64) -> IsochroneContour {
        IsochroneContour {
            polygon: MultiPolygon::new(vec![polygon![
                (x: -half, y: -half), (x: half, y: -half), (x: half, y: half), (x: -half, y: half), (x: -half, y: -half),
            ]]),
            minutes,
            source: ContourSource::NetworkIsochrone { provider: "test".into(), reached: None },
            area_km2: 0.0,
        }
    }

    fn points(xs: &[f64]) -> FeatureCollection {
        xs.iter().map(|&x| Feature::new(Point::new(x, 0.0), Default::default())).collect()
    }

    #[test]
    fn disabled_historical_category_nulls_its_share() {
        let mut analysis = Analysis::default();
        for id in ["heritage_sites", "museums", "cultural_venues"] {
            analysis.set_enabled(id, false).unwrap();
        }

        let contours = [contour(5.0, 1.0), contour(10.0, 2.0), contour(15.0, 3.0)];
        // Ten features in zone A saturate every linear indicator.
        let dense = points(&[0.0; 10]);
        let layers: HashMap<String, FeatureCollection> = analysis.indicators().iter()
            .map(|i| (i.data_source.to_string(), dense.clone()))
            .collect();

        let result = analysis.run(Point::new(0.0, 0.0), &contours, &layers);
        assert_eq!(result.category_scores.historical, 0.0);
        assert!(result.indicators.iter().all(|s| s.category != Category::Historical));

        let expected: f64 = [Category::Urban, Category::Social, Category::Economic].iter()
            .map(|&c| result.weights.get(c) / 100.0 * result.category_scores.get(c))
            .sum();
        assert!((result.total_score - expected).abs() < 1e-9);
        assert!(result.total_score <= 5.0 * 0.75 + 1e-9);
    }

    #[test]
    fn missing_layers_score_as_empty() {
        let analysis = Analysis::default();
        let result = analysis.run(Point::new(0.0, 0.0), &[contour(5.0, 1.0)], &HashMap::new());

        let healthcare = result.indicators.iter().find(|s| s.id == "healthcare").unwrap();
        assert!(!healthcare.layer_present);
        assert_eq!(healthcare.score, 0.5);
        assert_eq!(result.feature_counts_by_zone.total(), 0);
        assert_eq!(result.contours[0].source, "network-isochrone");
    }

    #[test]
    fn zone_counts_feed_the_scores() {
        let analysis = Analysis::default();
        let contours = [contour(15.0, 3.0), contour(5.0, 1.0), contour(10.0, 2.0)];
        let mut layers = HashMap::new();
        layers.insert("transit_stops".to_string(), points(&[0.5, 1.5, 2.5, 9.0]));

        let result = analysis.run(Point::new(0.0, 0.0), &contours, &layers);
        let transit = result.indicators.iter().find(|s| s.id == "transit_stops").unwrap();
        assert_eq!(transit.counts, ZoneCounts { a: 1, b: 1, c: 1 });
        assert!((transit.effective_count - 1.9).abs() < 1e-9);
        assert!((transit.score - 0.95).abs() < 1e-9);
        assert_eq!(result.feature_counts_by_zone, ZoneCounts { a: 1, b: 1, c: 1 });

        let minutes: Vec<f64> = result.contours.iter().map(|c| c.minutes).collect();
        assert_eq!(minutes, vec![5.0, 10.0, 15.0]);
    }

    #[test]
    fn config_overrides_apply() {
        let config = AnalysisConfig::from_toml_str("[[indicators]]\nid = \"cycling\"\nenabled = false\n").unwrap();
        let analysis = Analysis::new(&config).unwrap();
        assert!(!analysis.indicators().iter().find(|i| i.id == "cycling").unwrap().enabled);

        let mut analysis = analysis;
        assert!(analysis.set_enabled("nightlife", true).is_err());
        assert_eq!(analysis.set_weight(Category::Urban, 70.0).urban, 70.0);
    }
}
