use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::Context as _;

use crate::{
    config::GenConfig,
    foundation::error::{GenError, GenResult},
};

const COL_TYPE: &str = "type";
const COL_NAME: &str = "name";
const COL_RARITY: &str = "rarity";

/// One row of the rarity table.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct TraitDefinition {
    pub category: String,
    pub name: String,
    /// Percentage in `[0, 100]`, rounded to two decimals.
    pub weight: f64,
    /// 1-based line in the source table, `0` when built in memory.
    pub line: usize,
}

impl TraitDefinition {
    pub fn new(category: impl Into<String>, name: impl Into<String>, weight: f64) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
            weight,
            line: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct CategoryTraits {
    category: String,
    traits: Vec<TraitDefinition>,
}

/// Trait definitions grouped by category.
///
/// Categories keep the order of their first appearance and definitions keep row order, so logs and
/// sampling tables are reproducible. The table is read-only once built.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RarityTable {
    categories: Vec<CategoryTraits>,
}

/// Convert a raw probability in `[0, 1]` to a percentage rounded to two decimals.
pub fn percent_from_probability(p: f64) -> f64 {
    (p * 100.0 * 100.0).round() / 100.0
}

impl RarityTable {
    pub fn from_definitions(defs: impl IntoIterator<Item = TraitDefinition>) -> GenResult<Self> {
        let mut table = Self::default();
        for def in defs {
            table.push(def)?;
        }
        Ok(table)
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> GenResult<Self> {
        let path = path.as_ref();
        let f = File::open(path)
            .with_context(|| format!("open rarity table '{}'", path.display()))?;
        Self::from_csv_reader(BufReader::new(f))
    }

    pub fn from_csv_reader<R: Read>(mut r: R) -> GenResult<Self> {
        let mut text = String::new();
        r.read_to_string(&mut text)
            .map_err(|e| GenError::malformed(format!("read rarity table: {e}")))?;
        Self::from_csv_str(&text)
    }

    /// Parse a table with a header row containing `type`, `name` and `rarity` columns.
    ///
    /// Extra columns are ignored. `rarity` is a probability in `[0, 1]`.
    pub fn from_csv_str(text: &str) -> GenResult<Self> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut rows = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l))
            .filter(|(_, l)| !l.trim().is_empty());

        let Some((header_line, header)) = rows.next() else {
            return Err(GenError::malformed("rarity table is empty"));
        };
        let header = split_record(header, header_line)?;
        let col = |name: &str| -> GenResult<usize> {
            header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| {
                    GenError::malformed(format!(
                        "rarity table is missing required column '{name}'"
                    ))
                })
        };
        let (type_idx, name_idx, rarity_idx) = (col(COL_TYPE)?, col(COL_NAME)?, col(COL_RARITY)?);

        let mut table = Self::default();
        for (line, row) in rows {
            let fields = split_record(row, line)?;
            let category = required_field(&fields, type_idx, COL_TYPE, line)?;
            let name = required_field(&fields, name_idx, COL_NAME, line)?;
            let raw = required_field(&fields, rarity_idx, COL_RARITY, line)?;
            let p: f64 = raw.parse().map_err(|_| {
                GenError::malformed(format!(
                    "line {line}: rarity '{raw}' for {category}/{name} is not a number"
                ))
            })?;
            if !p.is_finite() || !(0.0..=1.0).contains(&p) {
                return Err(GenError::malformed(format!(
                    "line {line}: rarity {p} for {category}/{name} must be within [0, 1]"
                )));
            }

            table.push(TraitDefinition {
                category: category.to_string(),
                name: name.to_string(),
                weight: percent_from_probability(p),
                line,
            })?;
        }

        if table.is_empty() {
            return Err(GenError::malformed("rarity table has no trait rows"));
        }
        Ok(table)
    }

    fn push(&mut self, def: TraitDefinition) -> GenResult<()> {
        let idx = match self
            .categories
            .iter()
            .position(|c| c.category == def.category)
        {
            Some(idx) => idx,
            None => {
                self.categories.push(CategoryTraits {
                    category: def.category.clone(),
                    traits: Vec::new(),
                });
                self.categories.len() - 1
            }
        };

        let traits = &mut self.categories[idx].traits;
        if let Some(prev) = traits.iter().find(|t| t.name == def.name) {
            return Err(GenError::malformed(format!(
                "line {}: duplicate trait {}/{} (first declared on line {})",
                def.line, def.category, def.name, prev.line
            )));
        }
        traits.push(def);
        Ok(())
    }

    pub fn get(&self, category: &str) -> Option<&[TraitDefinition]> {
        self.categories
            .iter()
            .find(|c| c.category == category)
            .map(|c| c.traits.as_slice())
    }

    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.category.as_str())
    }

    /// All definitions, category by category, in table order.
    pub fn definitions(&self) -> impl Iterator<Item = &TraitDefinition> {
        self.categories.iter().flat_map(|c| c.traits.iter())
    }

    pub fn len(&self) -> usize {
        self.categories.iter().map(|c| c.traits.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that every configured category has a usable distribution.
    ///
    /// Table categories the config does not mention are reported and otherwise ignored.
    pub fn validate_for(&self, config: &GenConfig) -> GenResult<()> {
        for spec in &config.categories {
            let traits = self.get(&spec.table_type).ok_or_else(|| {
                GenError::distribution(&spec.table_type, "no traits declared in rarity table")
            })?;
            let total: f64 = traits.iter().map(|t| t.weight).sum();
            if total <= 0.0 {
                return Err(GenError::distribution(
                    &spec.table_type,
                    "all trait weights are zero",
                ));
            }
        }

        for category in self.category_names() {
            if !config.categories.iter().any(|c| c.table_type == category) {
                tracing::warn!(category, "rarity table category is not configured; ignoring");
            }
        }
        Ok(())
    }
}

fn required_field<'a>(
    fields: &'a [String],
    idx: usize,
    column: &str,
    line: usize,
) -> GenResult<&'a str> {
    let v = fields.get(idx).map(|s| s.trim()).unwrap_or("");
    if v.is_empty() {
        return Err(GenError::malformed(format!(
            "line {line}: empty '{column}' value"
        )));
    }
    Ok(v)
}

/// Split one CSV record, honouring double-quoted fields and `""` escapes.
fn split_record(line: &str, line_no: usize) -> GenResult<Vec<String>> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = line.trim_end_matches('\r').chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                chars.next();
                cur.push('"');
            }
            ('"', true) => in_quotes = false,
            ('"', false) if cur.trim().is_empty() => {
                cur.clear();
                in_quotes = true;
            }
            (',', false) => out.push(std::mem::take(&mut cur)),
            _ => cur.push(c),
        }
    }
    if in_quotes {
        return Err(GenError::malformed(format!(
            "line {line_no}: unterminated quoted field"
        )));
    }
    out.push(cur);
    Ok(out)
}
