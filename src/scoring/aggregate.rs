use serde::Serialize;

use super::{Category, CategoryWeights, MAX_SCORE};

/// One 0-5 value per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CategoryScores {
    pub urban: f64,
    pub social: f64,
    pub economic: f64,
    pub historical: f64,
}

impl CategoryScores {
    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Urban => self.urban,
            Category::Social => self.social,
            Category::Economic => self.economic,
            Category::Historical => self.historical,
        }
    }

    pub fn set(&mut self, category: Category, value: f64) {
        match category {
            Category::Urban => self.urban = value,
            Category::Social => self.social = value,
            Category::Economic => self.economic = value,
            Category::Historical => self.historical = value,
        }
    }

    /// Arithmetic mean of the indicator scores in each category. A category with
    /// no scores averages 0.
    pub fn averages(scores: impl IntoIterator<Item = (Category, f64)>) -> Self {
        let mut sums = [(0.0, 0usize); 4];
        for (category, score) in scores {
            let slot = &mut sums[category as usize];
            slot.0 += score;
            slot.1 += 1;
        }

        let mut averages = Self::default();
        for category in Category::ALL {
            let (sum, n) = sums[category as usize];
            averages.set(category, if n == 0 { 0.0 } else { sum / n as f64 });
        }
        averages
    }
}

/// `Σ weight/100 × average` over the four categories.
///
/// A category averaging 0 still carries its weight, so an empty category lowers
/// the total rather than shifting its share to the others.
pub fn aggregate(averages: &CategoryScores, weights: &CategoryWeights) -> f64 {
    let total: f64 = Category::ALL.iter()
        .map(|&c| weights.get(c) / 100.0 * averages.get(c))
        .sum();
    total.clamp(0.0, MAX_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_per_category() {
        let averages = CategoryScores::averages([
            (Category::Urban, 4.0), (Category::Urban, 2.0), (Category::Social, 5.0),
        ]);
        assert_eq!(averages, CategoryScores { urban: 3.0, social: 5.0, economic: 0.0, historical: 0.0 });
    }

    #[test]
    fn empty_category_is_not_redistributed() {
        let averages = CategoryScores { urban: 4.0, social: 4.0, economic: 4.0, historical: 0.0 };
        assert!((aggregate(&averages, &CategoryWeights::default()) - 3.0).abs() < 1e-9);

        let uniform = CategoryScores { urban: 4.0, social: 4.0, economic: 4.0, historical: 4.0 };
        assert!((aggregate(&uniform, &CategoryWeights::default()) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn weights_shift_the_total() {
        let averages = CategoryScores { urban: 5.0, social: 0.0, economic: 0.0, historical: 0.0 };
        let mut weights = CategoryWeights::default();
        weights.set_weight(Category::Urban, 70.0);
        assert!((aggregate(&averages, &weights) - 3.5).abs() < 1e-9);
    }
}
