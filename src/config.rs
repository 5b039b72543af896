use std::{collections::BTreeSet, fs::File, io::BufReader, path::Path};

use crate::foundation::{
    core::Canvas,
    error::{GenError, GenResult},
};

/// One trait category: `key` names it in combinations and the manifest, `table_type` is the
/// value of the rarity table's `type` column (and the asset sub-directory).
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CategorySpec {
    pub key: String,
    pub table_type: String,
}

impl CategorySpec {
    pub fn new(key: impl Into<String>, table_type: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            table_type: table_type.into(),
        }
    }
}

/// One compositing slot. `mirrored` draws the category's layer flipped horizontally.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LayerSlot {
    pub category: String,
    #[serde(default)]
    pub mirrored: bool,
}

impl LayerSlot {
    pub fn plain(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            mirrored: false,
        }
    }

    pub fn mirrored(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            mirrored: true,
        }
    }
}

/// Trait schema and compositing layout for a generation run.
///
/// `categories` is the sampling order; `layers` is the bottom-to-top stacking order. A category
/// may be sampled without being drawn.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GenConfig {
    pub canvas: Canvas,
    pub categories: Vec<CategorySpec>,
    pub layers: Vec<LayerSlot>,
    pub max_attempts_per_item: u64,
    pub asset_extension: String,
}

impl Default for GenConfig {
    fn default() -> Self {
        Self {
            canvas: Canvas::default(),
            categories: vec![
                CategorySpec::new("arm", "arm"),
                CategorySpec::new("eyes", "eyes"),
                CategorySpec::new("front_plate", "front_plate"),
                CategorySpec::new("background", "backgrounds"),
                CategorySpec::new("mouth", "mouth"),
                CategorySpec::new("hat", "hats"),
                CategorySpec::new("slot_color", "slot_colors"),
            ],
            layers: vec![
                LayerSlot::plain("background"),
                LayerSlot::plain("slot_color"),
                LayerSlot::plain("eyes"),
                LayerSlot::plain("mouth"),
                LayerSlot::plain("hat"),
                LayerSlot::plain("arm"),
                LayerSlot::mirrored("arm"),
            ],
            max_attempts_per_item: 100_000,
            asset_extension: "png".to_string(),
        }
    }
}

impl GenConfig {
    pub fn from_reader<R: std::io::Read>(r: R) -> GenResult<Self> {
        let config: Self = serde_json::from_reader(r)
            .map_err(|e| GenError::validation(format!("parse config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> GenResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            GenError::validation(format!("open config JSON '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    pub fn validate(&self) -> GenResult<()> {
        self.canvas.validate()?;
        if self.categories.is_empty() {
            return Err(GenError::validation("config must declare at least one category"));
        }
        if self.layers.is_empty() {
            return Err(GenError::validation("config must declare at least one layer"));
        }
        if self.max_attempts_per_item == 0 {
            return Err(GenError::validation("max_attempts_per_item must be >= 1"));
        }
        if self.asset_extension.trim().is_empty() {
            return Err(GenError::validation("asset_extension must be non-empty"));
        }

        let mut keys = BTreeSet::new();
        let mut types = BTreeSet::new();
        for c in &self.categories {
            if c.key.trim().is_empty() || c.table_type.trim().is_empty() {
                return Err(GenError::validation(
                    "category key and table_type must be non-empty",
                ));
            }
            if !keys.insert(c.key.as_str()) {
                return Err(GenError::validation(format!(
                    "duplicate category key '{}'",
                    c.key
                )));
            }
            if !types.insert(c.table_type.as_str()) {
                return Err(GenError::validation(format!(
                    "duplicate category table_type '{}'",
                    c.table_type
                )));
            }
        }

        for slot in &self.layers {
            if !keys.contains(slot.category.as_str()) {
                return Err(GenError::validation(format!(
                    "layer references unknown category '{}'",
                    slot.category
                )));
            }
        }
        Ok(())
    }

    pub fn category(&self, key: &str) -> Option<&CategorySpec> {
        self.categories.iter().find(|c| c.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_and_stacks_mirrored_arm_last() {
        let cfg = GenConfig::default();
        cfg.validate().unwrap();
        let order: Vec<_> = cfg
            .layers
            .iter()
            .map(|l| (l.category.as_str(), l.mirrored))
            .collect();
        assert_eq!(
            order,
            vec![
                ("background", false),
                ("slot_color", false),
                ("eyes", false),
                ("mouth", false),
                ("hat", false),
                ("arm", false),
                ("arm", true),
            ]
        );
        assert_eq!(cfg.category("hat").unwrap().table_type, "hats");
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let json = r#"{ "canvas": { "width": 4, "height": 2 } }"#;
        let cfg = GenConfig::from_reader(json.as_bytes()).unwrap();
        assert_eq!(cfg.canvas, Canvas { width: 4, height: 2 });
        assert_eq!(cfg.categories.len(), 7);
        assert_eq!(cfg.asset_extension, "png");
    }

    #[test]
    fn layer_with_unknown_category_is_rejected() {
        let json = r#"{
            "categories": [ { "key": "eyes", "table_type": "eyes" } ],
            "layers": [ { "category": "hat" } ]
        }"#;
        let err = GenConfig::from_reader(json.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("unknown category 'hat'"));
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let mut cfg = GenConfig::default();
        cfg.categories.push(CategorySpec::new("eyes", "eyes2"));
        assert!(cfg.validate().is_err());

        let mut cfg = GenConfig::default();
        cfg.categories.push(CategorySpec::new("eyes2", "eyes"));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_retry_bound_is_rejected() {
        let cfg = GenConfig {
            max_attempts_per_item: 0,
            ..GenConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
