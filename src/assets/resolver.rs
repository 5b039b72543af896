use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use crate::foundation::error::{GenError, GenResult, MissingAsset};
use crate::rarity::table::RarityTable;

/// A validated `(category, name)` to file binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerAsset {
    pub category: String,
    pub name: String,
    pub path: PathBuf,
}

/// Maps trait categories and names to layer files under an asset root.
///
/// Layout: `<root>/<category>/<name>.<extension>`.
#[derive(Clone, Debug)]
pub struct LayerResolver {
    root: PathBuf,
    extension: String,
}

impl LayerResolver {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into().trim_start_matches('.').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Expected location of a layer; does not touch the filesystem.
    pub fn path_for(&self, category: &str, name: &str) -> GenResult<PathBuf> {
        validate_segment(category, "category")?;
        validate_segment(name, "trait name")?;
        Ok(self
            .root
            .join(category)
            .join(format!("{name}.{}", self.extension)))
    }

    pub fn resolve_one(&self, category: &str, name: &str) -> GenResult<LayerAsset> {
        let path = self.path_for(category, name)?;
        if !path.is_file() {
            return Err(GenError::AssetNotFound {
                missing: vec![MissingAsset {
                    category: category.to_string(),
                    name: name.to_string(),
                    path,
                }],
            });
        }
        Ok(LayerAsset {
            category: category.to_string(),
            name: name.to_string(),
            path,
        })
    }

    /// Resolve every definition in the table, reporting all missing files at once.
    pub fn resolve(&self, table: &RarityTable) -> GenResult<ResolvedLayers> {
        let mut layers = HashMap::new();
        let mut missing = Vec::new();

        for def in table.definitions() {
            let path = self.path_for(&def.category, &def.name)?;
            if !path.is_file() {
                tracing::warn!(
                    category = %def.category,
                    name = %def.name,
                    path = %path.display(),
                    "layer asset not found"
                );
                missing.push(MissingAsset {
                    category: def.category.clone(),
                    name: def.name.clone(),
                    path,
                });
                continue;
            }

            tracing::info!(
                category = %def.category,
                name = %def.name,
                weight = def.weight,
                path = %path.display(),
                "trait"
            );
            layers.insert(
                (def.category.clone(), def.name.clone()),
                LayerAsset {
                    category: def.category.clone(),
                    name: def.name.clone(),
                    path,
                },
            );
        }

        if !missing.is_empty() {
            return Err(GenError::AssetNotFound { missing });
        }
        Ok(ResolvedLayers { layers })
    }
}

/// Lookup of every resolved layer in a rarity table.
#[derive(Clone, Debug, Default)]
pub struct ResolvedLayers {
    layers: HashMap<(String, String), LayerAsset>,
}

impl ResolvedLayers {
    pub fn get(&self, category: &str, name: &str) -> GenResult<&LayerAsset> {
        self.layers
            .get(&(category.to_string(), name.to_string()))
            .ok_or_else(|| {
                GenError::validation(format!("no resolved layer for {category}/{name}"))
            })
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

fn validate_segment(segment: &str, what: &str) -> GenResult<()> {
    if segment.is_empty() {
        return Err(GenError::malformed(format!("{what} must be non-empty")));
    }
    if segment == "." || segment == ".." || segment.contains(['/', '\\']) {
        return Err(GenError::malformed(format!(
            "{what} '{segment}' must be a single path segment"
        )));
    }
    Ok(())
}
