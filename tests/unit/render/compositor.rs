use std::{path::PathBuf, sync::Arc};

use super::*;

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "traitforge_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

fn write_png(path: &Path, width: u32, height: u32, rgba: Vec<u8>) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    image::save_buffer_with_format(
        path,
        &rgba,
        width,
        height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .unwrap();
}

fn solid(canvas: Canvas, px: [u8; 4]) -> PreparedLayer {
    PreparedLayer {
        width: canvas.width,
        height: canvas.height,
        rgba8_premul: Arc::new(px.repeat((canvas.width * canvas.height) as usize)),
    }
}

#[test]
fn topmost_opaque_layer_wins() {
    let canvas = Canvas::new(1, 1).unwrap();
    let colors = [
        [255, 0, 0, 255],
        [0, 255, 0, 255],
        [0, 0, 255, 255],
        [10, 20, 30, 255],
    ];
    let layers: Vec<_> = colors.iter().map(|c| solid(canvas, *c)).collect();
    let out = Compositor::new(canvas).stack_prepared(&layers).unwrap();
    assert_eq!(out, vec![10, 20, 30, 255]);

    // A fully transparent top layer leaves the one below visible.
    let mut with_clear_top = layers.clone();
    with_clear_top.push(solid(canvas, [0, 0, 0, 0]));
    let out = Compositor::new(canvas)
        .stack_prepared(&with_clear_top)
        .unwrap();
    assert_eq!(out, vec![10, 20, 30, 255]);
}

#[test]
fn empty_stack_is_transparent() {
    let canvas = Canvas::new(2, 1).unwrap();
    let out = Compositor::new(canvas).stack_prepared(&[]).unwrap();
    assert_eq!(out, vec![0u8; 8]);
}

#[test]
fn wrong_sized_prepared_layer_is_rejected() {
    let out = Compositor::new(Canvas::new(2, 2).unwrap())
        .stack_prepared(&[solid(Canvas::new(1, 1).unwrap(), [1, 2, 3, 255])]);
    assert!(out.is_err());
}

#[test]
fn default_z_order_and_mirrored_arm() {
    let root = temp_dir("compositor_zorder");
    let canvas = Canvas::new(4, 1).unwrap();

    // background: every column. hat: columns 1-2. arm: column 0 (blue) and column 2 (grey).
    let bg = root.join("backgrounds/red.png");
    write_png(&bg, 4, 1, [200u8, 0, 0, 255].repeat(4));
    let hat = root.join("hats/cap.png");
    let mut hat_px = vec![0u8; 16];
    hat_px[4..8].copy_from_slice(&[0, 200, 0, 255]);
    hat_px[8..12].copy_from_slice(&[0, 200, 0, 255]);
    write_png(&hat, 4, 1, hat_px);
    let arm = root.join("arm/left.png");
    let mut arm_px = vec![0u8; 16];
    arm_px[0..4].copy_from_slice(&[0, 0, 200, 255]);
    arm_px[8..12].copy_from_slice(&[50, 50, 50, 255]);
    write_png(&arm, 4, 1, arm_px);

    let stack = [
        LayerSource {
            category: "background",
            path: &bg,
            mirrored: false,
        },
        LayerSource {
            category: "hat",
            path: &hat,
            mirrored: false,
        },
        LayerSource {
            category: "arm",
            path: &arm,
            mirrored: false,
        },
        LayerSource {
            category: "arm",
            path: &arm,
            mirrored: true,
        },
    ];
    let out = Compositor::new(canvas).composite(&stack).unwrap();
    let px = |x: u32| out.get_pixel(x, 0).0;

    assert_eq!(px(0), [0, 0, 200, 255]); // arm over background
    assert_eq!(px(1), [50, 50, 50, 255]); // mirrored arm (source column 2) over hat
    assert_eq!(px(2), [50, 50, 50, 255]); // arm over hat
    assert_eq!(px(3), [0, 0, 200, 255]); // mirrored arm (source column 0) over background

    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn mirrored_slot_is_horizontal_flip_of_primary() {
    let root = temp_dir("compositor_mirror");
    let canvas = Canvas::new(3, 2).unwrap();
    let arm = root.join("arm/a.png");
    let mut px = Vec::new();
    for i in 0..6u8 {
        px.extend_from_slice(&[i * 40, 255 - i * 40, i, 255]);
    }
    write_png(&arm, 3, 2, px);

    let primary = Compositor::new(canvas)
        .composite(&[LayerSource {
            category: "arm",
            path: &arm,
            mirrored: false,
        }])
        .unwrap();
    let mirrored = Compositor::new(canvas)
        .composite(&[LayerSource {
            category: "arm",
            path: &arm,
            mirrored: true,
        }])
        .unwrap();

    for y in 0..canvas.height {
        for x in 0..canvas.width {
            assert_eq!(
                mirrored.get_pixel(x, y),
                primary.get_pixel(canvas.width - 1 - x, y)
            );
        }
    }

    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn compositing_is_deterministic() {
    let root = temp_dir("compositor_determinism");
    let canvas = Canvas::new(5, 4).unwrap();
    let a = root.join("backgrounds/a.png");
    let b = root.join("eyes/b.png");
    let mut a_px = Vec::new();
    let mut b_px = Vec::new();
    for i in 0..12u8 {
        a_px.extend_from_slice(&[i * 20, i * 3, 255 - i, 255]);
        b_px.extend_from_slice(&[i, 128, i * 10, i * 21]);
    }
    // Sources are 4x3 so both are resampled onto the 5x4 canvas.
    write_png(&a, 4, 3, a_px);
    write_png(&b, 4, 3, b_px);

    let stack = [
        LayerSource {
            category: "background",
            path: &a,
            mirrored: false,
        },
        LayerSource {
            category: "eyes",
            path: &b,
            mirrored: false,
        },
    ];
    let first = Compositor::new(canvas).composite(&stack).unwrap();
    let second = Compositor::new(canvas).composite(&stack).unwrap();
    assert_eq!(first.dimensions(), (5, 4));
    assert_eq!(first.as_raw(), second.as_raw());

    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn corrupt_source_names_path_and_category() {
    let root = temp_dir("compositor_corrupt");
    std::fs::create_dir_all(root.join("hats")).unwrap();
    let bad = root.join("hats/broken.png");
    std::fs::write(&bad, b"\x89PNG garbage").unwrap();

    let err = Compositor::new(Canvas::new(1, 1).unwrap())
        .composite(&[LayerSource {
            category: "hat",
            path: &bad,
            mirrored: false,
        }])
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("'hat'"));
    assert!(msg.contains("broken.png"));

    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn layer_stack_follows_configured_slots() {
    let root = temp_dir("compositor_stack");
    let table = crate::rarity::table::RarityTable::from_definitions([
        crate::rarity::table::TraitDefinition::new("backgrounds", "red", 100.0),
        crate::rarity::table::TraitDefinition::new("arm", "left", 100.0),
    ])
    .unwrap();
    write_png(&root.join("backgrounds/red.png"), 1, 1, vec![1, 2, 3, 255]);
    write_png(&root.join("arm/left.png"), 1, 1, vec![4, 5, 6, 255]);
    let resolved = crate::assets::resolver::LayerResolver::new(&root, "png")
        .resolve(&table)
        .unwrap();

    let config = GenConfig {
        categories: vec![
            crate::config::CategorySpec::new("arm", "arm"),
            crate::config::CategorySpec::new("background", "backgrounds"),
        ],
        layers: vec![
            crate::config::LayerSlot::plain("background"),
            crate::config::LayerSlot::plain("arm"),
            crate::config::LayerSlot::mirrored("arm"),
        ],
        ..GenConfig::default()
    };
    let item = GeneratedItem {
        identifier: 0,
        combination: [("arm", "left"), ("background", "red")].into_iter().collect(),
    };

    let stack = layer_stack(&item, &config, &resolved).unwrap();
    let summary: Vec<_> = stack.iter().map(|l| (l.category, l.mirrored)).collect();
    assert_eq!(
        summary,
        vec![("background", false), ("arm", false), ("arm", true)]
    );
    assert_eq!(stack[0].path, root.join("backgrounds").join("red.png"));

    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn default_schema_stacks_all_seven_slots() {
    let root = temp_dir("compositor_default_schema");
    let colours: [(&str, &str, [u8; 4]); 7] = [
        ("backgrounds", "sky", [10, 10, 10, 255]),
        ("slot_colors", "gold", [20, 20, 20, 255]),
        ("eyes", "open", [30, 30, 30, 255]),
        ("mouth", "grin", [40, 40, 40, 255]),
        ("hats", "cap", [50, 50, 50, 255]),
        ("arm", "left", [60, 60, 60, 255]),
        ("front_plate", "steel", [70, 70, 70, 255]),
    ];
    let mut defs = Vec::new();
    for (table_type, name, px) in colours {
        write_png(
            &root.join(table_type).join(format!("{name}.png")),
            1,
            1,
            px.to_vec(),
        );
        defs.push(crate::rarity::table::TraitDefinition::new(table_type, name, 100.0));
    }
    let table = crate::rarity::table::RarityTable::from_definitions(defs).unwrap();
    let resolved = crate::assets::resolver::LayerResolver::new(&root, "png")
        .resolve(&table)
        .unwrap();

    let config = GenConfig {
        canvas: Canvas::new(1, 1).unwrap(),
        ..GenConfig::default()
    };
    let mut item = GeneratedItem {
        identifier: 0,
        combination: [
            ("arm", "left"),
            ("eyes", "open"),
            ("front_plate", "steel"),
            ("background", "sky"),
            ("mouth", "grin"),
            ("hat", "cap"),
            ("slot_color", "gold"),
        ]
        .into_iter()
        .collect(),
    };

    let stack = layer_stack(&item, &config, &resolved).unwrap();
    let order: Vec<_> = stack.iter().map(|l| l.category).collect();
    assert_eq!(
        order,
        vec![
            "background",
            "slot_color",
            "eyes",
            "mouth",
            "hat",
            "arm",
            "arm"
        ]
    );
    assert!(stack[6].mirrored);

    let compositor = Compositor::new(config.canvas);
    let out = crate::pipeline::render_item(&item, &config, &resolved, &compositor).unwrap();
    // Topmost opaque layer is the arm; the sampled-only front plate is never drawn.
    assert_eq!(out.get_pixel(0, 0).0, [60, 60, 60, 255]);

    // With a clear arm the hat beneath it shows.
    write_png(&root.join("arm/clear.png"), 1, 1, vec![0, 0, 0, 0]);
    let resolved = crate::assets::resolver::LayerResolver::new(&root, "png")
        .resolve(
            &crate::rarity::table::RarityTable::from_definitions([
                crate::rarity::table::TraitDefinition::new("backgrounds", "sky", 100.0),
                crate::rarity::table::TraitDefinition::new("slot_colors", "gold", 100.0),
                crate::rarity::table::TraitDefinition::new("eyes", "open", 100.0),
                crate::rarity::table::TraitDefinition::new("mouth", "grin", 100.0),
                crate::rarity::table::TraitDefinition::new("hats", "cap", 100.0),
                crate::rarity::table::TraitDefinition::new("arm", "clear", 100.0),
                crate::rarity::table::TraitDefinition::new("front_plate", "steel", 100.0),
            ])
            .unwrap(),
        )
        .unwrap();
    item.combination.insert("arm", "clear");
    let out = crate::pipeline::render_item(&item, &config, &resolved, &compositor).unwrap();
    assert_eq!(out.get_pixel(0, 0).0, [50, 50, 50, 255]);

    std::fs::remove_dir_all(&root).ok();
}
