use std::collections::{BTreeMap, HashSet};

/// One complete assignment of a trait name to every configured category key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Combination(BTreeMap<String, String>);

impl Combination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category: impl Into<String>, name: impl Into<String>) {
        self.0.insert(category.into(), name.into());
    }

    pub fn get(&self, category: &str) -> Option<&str> {
        self.0.get(category).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Combination {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// An accepted combination and its 0-based identifier in acceptance order.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct GeneratedItem {
    pub identifier: u64,
    pub combination: Combination,
}

/// Every combination accepted so far in a run.
///
/// Owned by the caller and threaded through generation so nothing is shared implicitly between
/// runs.
#[derive(Clone, Debug, Default)]
pub struct AcceptedCombinations {
    seen: HashSet<Combination>,
}

impl AcceptedCombinations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, combination: &Combination) -> bool {
        self.seen.contains(combination)
    }

    /// Returns `false` (and leaves the set untouched) if the combination was already accepted.
    pub fn accept(&mut self, combination: Combination) -> bool {
        self.seen.insert(combination)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Combination> {
        self.seen.iter()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
