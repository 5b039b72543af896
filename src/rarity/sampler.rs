use rand::Rng;

use crate::{
    foundation::error::{GenError, GenResult},
    rarity::table::TraitDefinition,
};

/// Draws trait names from one category's weighted distribution.
///
/// Weights are relative; they need not sum to 1 or 100. The cumulative table is built once so each
/// draw is a single uniform roll plus a binary search.
#[derive(Clone, Debug)]
pub struct WeightedSampler<'a> {
    category: &'a str,
    names: Vec<&'a str>,
    cumulative: Vec<f64>,
    total: f64,
}

impl<'a> WeightedSampler<'a> {
    pub fn new(category: &'a str, traits: &'a [TraitDefinition]) -> GenResult<Self> {
        Self::from_weights(category, traits.iter().map(|t| (t.name.as_str(), t.weight)))
    }

    pub fn from_weights(
        category: &'a str,
        weights: impl IntoIterator<Item = (&'a str, f64)>,
    ) -> GenResult<Self> {
        let mut names = Vec::new();
        let mut cumulative = Vec::new();
        let mut total = 0.0f64;

        for (name, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(GenError::distribution(
                    category,
                    format!("weight {weight} for '{name}' must be finite and >= 0"),
                ));
            }
            total += weight;
            names.push(name);
            cumulative.push(total);
        }

        if names.is_empty() {
            return Err(GenError::distribution(category, "no candidate traits"));
        }
        if total <= 0.0 {
            return Err(GenError::distribution(category, "all trait weights are zero"));
        }

        Ok(Self {
            category,
            names,
            cumulative,
            total,
        })
    }

    pub fn category(&self) -> &'a str {
        self.category
    }

    /// Number of names that can actually be drawn (weight > 0).
    pub fn reachable_count(&self) -> usize {
        let mut prev = 0.0;
        let mut n = 0;
        for &c in &self.cumulative {
            if c > prev {
                n += 1;
            }
            prev = c;
        }
        n
    }

    /// Weight of `name`, `0.0` when it is not in the distribution.
    pub fn weight_of(&self, name: &str) -> f64 {
        self.names
            .iter()
            .position(|n| *n == name)
            .map_or(0.0, |i| self.weight_at(i))
    }

    fn weight_at(&self, idx: usize) -> f64 {
        let prev = if idx == 0 { 0.0 } else { self.cumulative[idx - 1] };
        self.cumulative[idx] - prev
    }

    /// Draw among the positive-weight names accepted by `keep`, renormalizing their weights.
    ///
    /// Returns `None` when `keep` rules out every reachable name.
    pub fn sample_where<R: Rng>(
        &self,
        rng: &mut R,
        keep: impl Fn(&str) -> bool,
    ) -> Option<&'a str> {
        let candidates: Vec<(&'a str, f64)> = (0..self.names.len())
            .map(|i| (self.names[i], self.weight_at(i)))
            .filter(|&(name, w)| w > 0.0 && keep(name))
            .collect();
        let total: f64 = candidates.iter().map(|(_, w)| w).sum();
        if candidates.is_empty() || total <= 0.0 {
            return None;
        }

        let mut roll = rng.gen_range(0.0..total);
        for &(name, w) in &candidates {
            if roll < w {
                return Some(name);
            }
            roll -= w;
        }
        candidates.last().map(|&(name, _)| name)
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> &'a str {
        let roll = rng.gen_range(0.0..self.total);
        // First entry whose running total exceeds the roll; zero-weight entries never qualify.
        let idx = self.cumulative.partition_point(|&c| c <= roll);
        self.names[idx.min(self.names.len() - 1)]
    }
}
