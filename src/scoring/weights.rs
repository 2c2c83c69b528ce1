use serde::{Deserialize, Serialize};

use super::Category;

/// Allowed deviation of the weight total from 100.
pub const SUM_TOLERANCE: f64 = 0.1;

#[inline]
fn round1(v: f64) -> f64 { (v * 10.0).round() / 10.0 }

/// Category weights in percent. Every mutation keeps the total at 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CategoryWeights {
    pub urban: f64,
    pub social: f64,
    pub economic: f64,
    pub historical: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self { Self { urban: 25.0, social: 25.0, economic: 25.0, historical: 25.0 } }
}

impl CategoryWeights {
    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Urban => self.urban,
            Category::Social => self.social,
            Category::Economic => self.economic,
            Category::Historical => self.historical,
        }
    }

    fn slot(&mut self, category: Category) -> &mut f64 {
        match category {
            Category::Urban => &mut self.urban,
            Category::Social => &mut self.social,
            Category::Economic => &mut self.economic,
            Category::Historical => &mut self.historical,
        }
    }

    pub fn sum(&self) -> f64 {
        Category::ALL.iter().map(|&c| self.get(c)).sum()
    }

    /// Every weight in `[0, 100]` and the total within [`SUM_TOLERANCE`] of 100.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(c) = Category::ALL.into_iter().find(|&c| !(0.0..=100.0).contains(&self.get(c))) {
            return Err(format!("{c} weight {} is outside [0, 100]", self.get(c)));
        }
        if (self.sum() - 100.0).abs() > SUM_TOLERANCE {
            return Err(format!("weights sum to {}, expected 100", self.sum()));
        }
        Ok(())
    }

    /// Set one weight and rebalance the other three so the total stays 100.
    ///
    /// `value` is clamped to `[0, 100]` and rounded to 0.1. The change is taken
    /// evenly from the other categories in [`Category::ALL`] order: the first two
    /// each move by a third, clamped and rounded, and the last takes the exact
    /// remainder. A negative remainder is set to zero and the shortfall is taken
    /// from the first, then the second category.
    pub fn set_weight(&mut self, category: Category, value: f64) -> CategoryWeights {
        let new = round1(value.clamp(0.0, 100.0));
        let delta = new - self.get(category);
        if delta == 0.0 { return *self }

        let [first, second, last]: [Category; 3] = {
            let mut others = Category::ALL.into_iter().filter(|&c| c != category);
            match (others.next(), others.next(), others.next()) {
                (Some(a), Some(b), Some(c)) => [a, b, c],
                _ => return *self,
            }
        };

        let share = delta / 3.0;
        let mut o1 = round1((self.get(first) - share).clamp(0.0, 100.0));
        let mut o2 = round1((self.get(second) - share).clamp(0.0, 100.0));
        let mut o3 = 100.0 - new - o1 - o2;

        if o3 < 0.0 {
            let mut deficit = -o3;
            o3 = 0.0;
            for slot in [&mut o1, &mut o2] {
                let take = deficit.min(*slot);
                *slot = round1(*slot - take);
                deficit -= take;
            }
        }

        *self.slot(category) = new;
        *self.slot(first) = o1;
        *self.slot(second) = o2;
        *self.slot(last) = round1(o3.max(0.0));

        tracing::debug!(%category, value = new, weights = ?self, "rebalanced category weights");
        *self
    }
}
