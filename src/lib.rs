//! Generates batches of unique trait combinations from a weighted rarity table and flattens each
//! one into an image by stacking transparent layers in a fixed z-order.
//!
//! - Load a [`RarityTable`] and a [`GenConfig`]
//! - [`prepare_batch`] validates everything and draws unique [`GeneratedItem`]s
//! - [`run_batch`] also composites every item and writes the [`Manifest`]
#![forbid(unsafe_code)]

mod assets;
mod foundation;
mod generate;
mod rarity;
mod render;

pub mod config;
pub mod manifest;
pub mod pipeline;

pub use crate::assets::decode::{PreparedLayer, decode_layer, load_layer};
pub use crate::assets::resolver::{LayerAsset, LayerResolver, ResolvedLayers};
pub use crate::config::{CategorySpec, GenConfig, LayerSlot};
pub use crate::foundation::core::Canvas;
pub use crate::foundation::error::{GenError, GenResult, MissingAsset};
pub use crate::generate::combination::{AcceptedCombinations, Combination, GeneratedItem};
pub use crate::generate::generator::{TraitCombinationGenerator, trait_counts};
pub use crate::manifest::Manifest;
pub use crate::pipeline::{
    BatchOpts, BatchReport, FailurePolicy, ItemFailure, PreparedBatch, RenderThreading,
    prepare_batch, render_item, run_batch,
};
pub use crate::rarity::sampler::WeightedSampler;
pub use crate::rarity::table::{RarityTable, TraitDefinition, percent_from_probability};
pub use crate::render::composite::{over, over_in_place, premultiply};
pub use crate::render::compositor::{Compositor, LayerSource, layer_stack};
