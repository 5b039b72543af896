use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::Context as _;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::{foundation::error::GenResult, generate::combination::GeneratedItem};

pub const MANIFEST_FILE_NAME: &str = "traits.json";
pub const IDENTIFIER_FIELD: &str = "token_id";

/// Item records keyed by identifier string, in ascending identifier order.
///
/// Within an entry, categories listed in the key order come first, in that order; any others follow
/// alphabetically.
pub struct Manifest<'a> {
    items: Vec<&'a GeneratedItem>,
    key_order: Vec<&'a str>,
}

impl<'a> Manifest<'a> {
    pub fn new(items: impl IntoIterator<Item = &'a GeneratedItem>) -> Self {
        let mut items: Vec<_> = items.into_iter().collect();
        items.sort_by_key(|i| i.identifier);
        Self {
            items,
            key_order: Vec::new(),
        }
    }

    pub fn with_key_order(mut self, keys: impl IntoIterator<Item = &'a str>) -> Self {
        self.key_order = keys.into_iter().collect();
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn to_writer<W: Write>(&self, w: W) -> GenResult<()> {
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(w, formatter);
        self.serialize(&mut ser).context("serialize manifest JSON")?;
        Ok(())
    }

    pub fn write_to_path(&self, path: &Path) -> GenResult<()> {
        let f = File::create(path)
            .with_context(|| format!("create manifest '{}'", path.display()))?;
        let mut w = BufWriter::new(f);
        self.to_writer(&mut w)?;
        w.flush()
            .with_context(|| format!("flush manifest '{}'", path.display()))?;
        Ok(())
    }
}

struct Entry<'a> {
    item: &'a GeneratedItem,
    key_order: &'a [&'a str],
}

impl Serialize for Entry<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let combination = &self.item.combination;
        let mut map = serializer.serialize_map(Some(combination.len() + 1))?;
        for key in self.key_order {
            if let Some(name) = combination.get(key) {
                map.serialize_entry(key, name)?;
            }
        }
        for (category, name) in combination.iter() {
            if !self.key_order.contains(&category) {
                map.serialize_entry(category, name)?;
            }
        }
        map.serialize_entry(IDENTIFIER_FIELD, &self.item.identifier)?;
        map.end()
    }
}

impl Serialize for Manifest<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.items.len()))?;
        for item in &self.items {
            let entry = Entry {
                item,
                key_order: &self.key_order,
            };
            map.serialize_entry(&item.identifier.to_string(), &entry)?;
        }
        map.end()
    }
}
