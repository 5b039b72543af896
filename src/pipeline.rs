use std::{
    io::Cursor,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;

use crate::{
    assets::resolver::{LayerResolver, ResolvedLayers},
    config::GenConfig,
    foundation::error::{GenError, GenResult},
    generate::{
        combination::GeneratedItem,
        generator::{TraitCombinationGenerator, trait_counts},
    },
    manifest::{MANIFEST_FILE_NAME, Manifest},
    rarity::table::RarityTable,
    render::compositor::{Compositor, layer_stack},
};

/// What to do when one item's layers fail to decode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop the batch; no manifest is written.
    #[default]
    Abort,
    /// Log the item, leave it out of the manifest, and keep going.
    Skip,
}

#[derive(Clone, Debug, Default)]
pub struct RenderThreading {
    pub parallel: bool,
    pub threads: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct BatchOpts {
    pub count: usize,
    pub seed: Option<u64>,
    pub out_dir: PathBuf,
    pub failure_policy: FailurePolicy,
    pub threading: RenderThreading,
}

#[derive(Debug)]
pub struct ItemFailure {
    pub identifier: u64,
    pub error: GenError,
}

#[derive(Debug)]
pub struct BatchReport {
    /// Seed the run used; pass it back to reproduce the same combinations.
    pub seed: u64,
    pub generated: Vec<GeneratedItem>,
    /// Identifiers with an image on disk and an entry in the manifest.
    pub rendered: Vec<u64>,
    pub failures: Vec<ItemFailure>,
    pub manifest_path: PathBuf,
}

/// Everything that can be checked without writing output.
#[derive(Debug)]
pub struct PreparedBatch {
    pub seed: u64,
    pub items: Vec<GeneratedItem>,
    pub resolved: ResolvedLayers,
}

/// Validate inputs, resolve every layer, and generate `count` unique items.
///
/// Only configuration-level errors can come out of here, and nothing is written to disk.
pub fn prepare_batch(
    table: &RarityTable,
    config: &GenConfig,
    assets_root: &Path,
    count: usize,
    seed: Option<u64>,
) -> GenResult<PreparedBatch> {
    config.validate()?;
    table.validate_for(config)?;

    let resolver = LayerResolver::new(assets_root, config.asset_extension.as_str());
    let resolved = resolver.resolve(table)?;

    let generator = TraitCombinationGenerator::new(table, config)?;
    let seed = seed.unwrap_or_else(rand::random);
    tracing::info!(
        seed,
        count,
        capacity = %generator.capacity(),
        "generating combinations"
    );

    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let items = generator.generate(count, &mut rng)?;

    for (category, names) in trait_counts(&items) {
        for (name, n) in names {
            tracing::debug!(%category, %name, n, "trait frequency");
        }
    }

    Ok(PreparedBatch {
        seed,
        items,
        resolved,
    })
}

pub fn render_item(
    item: &GeneratedItem,
    config: &GenConfig,
    resolved: &ResolvedLayers,
    compositor: &Compositor,
) -> GenResult<image::RgbaImage> {
    let stack = layer_stack(item, config, resolved)?;
    compositor.composite(&stack)
}

pub fn item_image_path(out_dir: &Path, identifier: u64) -> PathBuf {
    out_dir.join(format!("{identifier}.png"))
}

/// Render an item and encode it as PNG in memory.
fn render_png(
    item: &GeneratedItem,
    config: &GenConfig,
    resolved: &ResolvedLayers,
    compositor: &Compositor,
) -> GenResult<Vec<u8>> {
    let img = render_item(item, config, resolved, compositor)?;
    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .with_context(|| format!("encode png for item {}", item.identifier))?;
    Ok(png)
}

fn write_png(out_dir: &Path, identifier: u64, png: &[u8]) -> GenResult<()> {
    let path = item_image_path(out_dir, identifier);
    std::fs::write(&path, png).with_context(|| format!("write png '{}'", path.display()))?;
    tracing::info!(identifier, path = %path.display(), "item rendered");
    Ok(())
}

/// Run a full batch: setup checks, generation, compositing, the manifest, then the images.
///
/// Items are composited in memory first, so nothing is written when the batch aborts. The manifest
/// lists only items that rendered, and exactly those get an image file.
#[tracing::instrument(skip(table, config, opts), fields(count = opts.count))]
pub fn run_batch(
    table: &RarityTable,
    config: &GenConfig,
    assets_root: &Path,
    opts: &BatchOpts,
) -> GenResult<BatchReport> {
    let PreparedBatch {
        seed,
        items,
        resolved,
    } = prepare_batch(table, config, assets_root, opts.count, opts.seed)?;

    let compositor = Compositor::new(config.canvas);
    let render = |item: &GeneratedItem| render_png(item, config, &resolved, &compositor);

    let pool = if opts.threading.parallel {
        Some(build_thread_pool(opts.threading.threads)?)
    } else {
        None
    };

    let outcomes: Vec<(u64, GenResult<Vec<u8>>)> = match &pool {
        Some(pool) => pool.install(|| {
            items
                .par_iter()
                .map(|item| (item.identifier, render(item)))
                .collect()
        }),
        None => {
            let mut out = Vec::with_capacity(items.len());
            for item in &items {
                let result = render(item);
                let failed = result.is_err();
                out.push((item.identifier, result));
                if failed && opts.failure_policy == FailurePolicy::Abort {
                    break;
                }
            }
            out
        }
    };

    let mut images = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    for (identifier, result) in outcomes {
        match result {
            Ok(png) => images.push((identifier, png)),
            Err(error) => {
                tracing::warn!(
                    identifier,
                    category = error.category().unwrap_or("-"),
                    %error,
                    "item failed to render"
                );
                failures.push(ItemFailure { identifier, error });
            }
        }
    }

    // Outcomes, and so failures, are in identifier order.
    if opts.failure_policy == FailurePolicy::Abort && !failures.is_empty() {
        let first = failures.swap_remove(0);
        return Err(GenError::item(first.identifier, first.error));
    }

    std::fs::create_dir_all(&opts.out_dir)
        .with_context(|| format!("create output dir '{}'", opts.out_dir.display()))?;

    let rendered: Vec<u64> = images.iter().map(|(id, _)| *id).collect();
    let manifest_path = opts.out_dir.join(MANIFEST_FILE_NAME);
    let manifest = Manifest::new(
        items
            .iter()
            .filter(|i| rendered.binary_search(&i.identifier).is_ok()),
    )
    .with_key_order(config.categories.iter().map(|c| c.key.as_str()));
    manifest.write_to_path(&manifest_path)?;
    tracing::info!(
        path = %manifest_path.display(),
        entries = manifest.len(),
        skipped = failures.len(),
        "manifest written"
    );

    let write = |(identifier, png): &(u64, Vec<u8>)| write_png(&opts.out_dir, *identifier, png);
    match &pool {
        Some(pool) => pool.install(|| images.par_iter().try_for_each(write))?,
        None => images.iter().try_for_each(write)?,
    }

    Ok(BatchReport {
        seed,
        generated: items,
        rendered,
        failures,
        manifest_path,
    })
}

fn build_thread_pool(threads: Option<usize>) -> GenResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(GenError::validation(
            "render threading 'threads' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| GenError::validation(format!("failed to build rayon thread pool: {e}")))
}
