use std::fmt;

use serde::{Deserialize, Serialize};

use super::Strategy;

/// The four score categories, in the fixed order used for weight balancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Urban,
    Social,
    Economic,
    Historical,
}

impl Category {
    pub const ALL: [Category; 4] = [Category::Urban, Category::Social, Category::Economic, Category::Historical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Urban => "urban",
            Self::Social => "social",
            Self::Economic => "economic",
            Self::Historical => "historical",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown category '{s}'"))
    }
}

/// How strongly an indicator's relevance decays with walking distance.
/// Informational; scoring uses the shared zone weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneSensitivity {
    High,
    Medium,
    Low,
}

/// A scored accessibility criterion backed by one point-of-interest layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Indicator {
    pub id: &'static str,
    pub name: &'static str,
    pub category: Category,
    pub enabled: bool,
    /// Name of the layer whose features this indicator counts.
    pub data_source: &'static str,
    pub zone_sensitivity: ZoneSensitivity,
    pub strategy: Strategy,
}

const fn indicator(
    id: &'static str,
    name: &'static str,
    category: Category,
    zone_sensitivity: ZoneSensitivity,
    strategy: Strategy,
) -> Indicator {
    Indicator { id, name, category, enabled: true, data_source: id, zone_sensitivity, strategy }
}

/// The fixed indicator catalog, all enabled.
pub fn catalog() -> Vec<Indicator> {
    use Category::*;
    use Strategy::*;
    use ZoneSensitivity::*;

    vec![
        indicator("transit_stops", "Public transport stops", Urban, High, Linear),
        indicator("green_spaces", "Parks and green spaces", Urban, Medium, Linear),
        indicator("cycling", "Cycling infrastructure", Urban, Low, Linear),
        indicator("healthcare", "Healthcare facilities", Social, High, PresenceBonus),
        indicator("education", "Schools and education", Social, Medium, PresenceBonus),
        indicator("community_centers", "Community centres", Social, Low, Linear),
        indicator("retail_density", "Shops and retail", Economic, High, OptimalRange),
        indicator("markets", "Markets and groceries", Economic, Medium, PresenceBonus),
        indicator("employment", "Employment centres", Economic, Low, Linear),
        indicator("heritage_sites", "Heritage sites", Historical, High, PresenceBonus),
        indicator("museums", "Museums and galleries", Historical, Medium, PresenceBonus),
        indicator("cultural_venues", "Cultural venues", Historical, Low, Linear),
    ]
}
