use battlemat::{Brush, BrushShape, FOG_ALPHA, FogMask, PaintMode, Point};

fn temp_dir(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "battlemat_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

#[test]
fn painted_mask_survives_png_roundtrip() {
    let tmp = temp_dir("fog_roundtrip");
    std::fs::create_dir_all(&tmp).unwrap();
    let path = tmp.join("crypt_mask.png");

    let mut mask = FogMask::fogged(1000, 800);
    mask.paint(
        Brush {
            shape: BrushShape::Rectangle,
            size: 32,
        },
        Point::new(500.0, 400.0),
        PaintMode::Remove,
    );
    mask.paint(
        Brush {
            shape: BrushShape::Circle,
            size: 60,
        },
        Point::new(120.0, 120.0),
        PaintMode::Remove,
    );
    mask.save_png(&path).unwrap();

    let loaded = FogMask::load_png(&path, 1000, 800).unwrap();
    assert_eq!(loaded.alpha(), mask.alpha());
    assert_eq!(loaded.alpha_at(500, 400), 0);
    assert_eq!(loaded.alpha_at(120, 120), 0);
    assert_eq!(loaded.alpha_at(0, 0), FOG_ALPHA);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn corrupt_mask_file_falls_back_to_fully_fogged() {
    let tmp = temp_dir("fog_corrupt");
    std::fs::create_dir_all(&tmp).unwrap();
    let path = tmp.join("broken_mask.png");
    std::fs::write(&path, b"this is not a png").unwrap();

    let mask = FogMask::load_or_fogged(Some(&path), 64, 48);
    assert!(mask.alpha().iter().all(|&a| a == FOG_ALPHA));
    assert_eq!((mask.width(), mask.height()), (64, 48));

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn mismatched_mask_dimensions_fall_back_to_fully_fogged() {
    let tmp = temp_dir("fog_mismatch");
    std::fs::create_dir_all(&tmp).unwrap();
    let path = tmp.join("small_mask.png");
    FogMask::fogged(10, 10).save_png(&path).unwrap();

    // Base image was swapped for a larger one since the mask was written.
    let mask = FogMask::load_or_fogged(Some(&path), 200, 150);
    assert_eq!((mask.width(), mask.height()), (200, 150));
    assert!(mask.alpha().iter().all(|&a| a == FOG_ALPHA));

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn missing_mask_path_starts_fully_fogged() {
    let mask = FogMask::load_or_fogged(None, 32, 32);
    assert!(mask.alpha().iter().all(|&a| a == FOG_ALPHA));
}
