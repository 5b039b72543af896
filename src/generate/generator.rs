use std::collections::BTreeMap;

use rand::Rng;

use crate::{
    config::GenConfig,
    foundation::error::{GenError, GenResult},
    generate::combination::{AcceptedCombinations, Combination, GeneratedItem},
    rarity::{sampler::WeightedSampler, table::RarityTable},
};

/// Builds unique trait combinations by rejection sampling.
///
/// Categories are drawn in configured order from one caller-supplied RNG, so a fixed seed
/// reproduces the same items.
#[derive(Clone, Debug)]
pub struct TraitCombinationGenerator<'a> {
    samplers: Vec<(&'a str, WeightedSampler<'a>)>,
    max_attempts: u64,
}

impl<'a> TraitCombinationGenerator<'a> {
    pub fn new(table: &'a RarityTable, config: &'a GenConfig) -> GenResult<Self> {
        let mut samplers = Vec::with_capacity(config.categories.len());
        for spec in &config.categories {
            let traits = table.get(&spec.table_type).ok_or_else(|| {
                GenError::distribution(&spec.table_type, "no traits declared in rarity table")
            })?;
            samplers.push((
                spec.key.as_str(),
                WeightedSampler::new(&spec.table_type, traits)?,
            ));
        }
        Ok(Self {
            samplers,
            max_attempts: config.max_attempts_per_item.max(1),
        })
    }

    /// Number of distinct combinations reachable with non-zero probability (saturating).
    pub fn capacity(&self) -> u128 {
        self.samplers
            .iter()
            .map(|(_, s)| s.reachable_count() as u128)
            .fold(1u128, u128::saturating_mul)
    }

    /// Draw one candidate combination, one name per category.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> Combination {
        let mut combination = Combination::new();
        for (key, sampler) in &self.samplers {
            combination.insert(*key, sampler.sample(rng));
        }
        combination
    }

    /// Generate `count` items that are new with respect to `accepted`.
    ///
    /// Identifiers continue from `accepted.len()`, so a fresh set yields `0..count`. Fails fast with
    /// [`GenError::CapacityExceeded`] before drawing anything if the request cannot be satisfied.
    /// After `max_attempts_per_item` duplicate draws for one item, the remaining draw is restricted
    /// to combinations not yet accepted, so any request within capacity completes.
    pub fn generate_into<R: Rng>(
        &self,
        count: usize,
        accepted: &mut AcceptedCombinations,
        rng: &mut R,
    ) -> GenResult<Vec<GeneratedItem>> {
        let available = self.capacity().saturating_sub(self.reachable_accepted(accepted));
        if count as u128 > available {
            return Err(GenError::CapacityExceeded {
                requested: count as u128,
                available,
            });
        }

        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            let identifier = accepted.len() as u64;
            let mut attempts = 0u64;
            let combination = loop {
                if attempts == self.max_attempts {
                    tracing::debug!(
                        identifier,
                        attempts,
                        "retry bound reached, drawing among unaccepted combinations"
                    );
                    break self.draw_unaccepted(accepted, rng).ok_or(
                        GenError::RetriesExhausted {
                            identifier,
                            attempts,
                        },
                    )?;
                }
                attempts += 1;

                let candidate = self.draw(rng);
                if accepted.contains(&candidate) {
                    tracing::debug!(identifier, attempts, "duplicate combination, redrawing");
                    continue;
                }
                break candidate;
            };

            tracing::debug!(identifier, ?combination, "accepted combination");
            accepted.accept(combination.clone());
            items.push(GeneratedItem {
                identifier,
                combination,
            });
        }
        Ok(items)
    }

    /// Draw category by category, skipping any name whose remaining combinations are all taken.
    fn draw_unaccepted<R: Rng>(
        &self,
        accepted: &AcceptedCombinations,
        rng: &mut R,
    ) -> Option<Combination> {
        let mut taken: Vec<&Combination> =
            accepted.iter().filter(|c| self.is_reachable(c)).collect();
        let mut combination = Combination::new();

        for (depth, (key, sampler)) in self.samplers.iter().enumerate() {
            let below = self.samplers[depth + 1..]
                .iter()
                .map(|(_, s)| s.reachable_count() as u128)
                .fold(1u128, u128::saturating_mul);
            let name = sampler.sample_where(rng, |name| {
                let used = taken.iter().filter(|c| c.get(key) == Some(name)).count();
                (used as u128) < below
            })?;
            taken.retain(|c| c.get(key) == Some(name));
            combination.insert(*key, name);
        }
        Some(combination)
    }

    /// Whether this generator could have drawn `combination`.
    fn is_reachable(&self, combination: &Combination) -> bool {
        combination.len() == self.samplers.len()
            && self.samplers.iter().all(|(key, sampler)| {
                combination
                    .get(key)
                    .is_some_and(|name| sampler.weight_of(name) > 0.0)
            })
    }

    fn reachable_accepted(&self, accepted: &AcceptedCombinations) -> u128 {
        accepted.iter().filter(|c| self.is_reachable(c)).count() as u128
    }

    pub fn generate<R: Rng>(&self, count: usize, rng: &mut R) -> GenResult<Vec<GeneratedItem>> {
        self.generate_into(count, &mut AcceptedCombinations::new(), rng)
    }
}

/// How often each trait name was chosen, per category key.
pub fn trait_counts(items: &[GeneratedItem]) -> BTreeMap<String, BTreeMap<String, u64>> {
    let mut out = BTreeMap::<String, BTreeMap<String, u64>>::new();
    for item in items {
        for (category, name) in item.combination.iter() {
            *out.entry(category.to_string())
                .or_default()
                .entry(name.to_string())
                .or_default() += 1;
        }
    }
    out
}
