use std::sync::Arc;

use battlemat::web::SnapshotSource as _;
use battlemat::{
    JsonFileStore, MapRecord, MapSession, ModelStore as _, PaintMode, Point, TokenKind,
};

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

fn open_session(tmp: &std::path::Path, size: (u32, u32)) -> MapSession {
    let image_path = tmp.join("base.png");
    image::RgbaImage::from_pixel(400, 300, image::Rgba([180, 180, 180, 255]))
        .save_with_format(&image_path, image::ImageFormat::Png)
        .unwrap();
    let record = MapRecord::new("Arena", image_path.to_string_lossy());
    let store = Arc::new(JsonFileStore::new(tmp.join("maps.json")));
    store.save_items(&[record.clone()]).unwrap();
    MapSession::open(store, tmp.join("masks"), &record, size).unwrap()
}

#[test]
fn player_surface_hides_what_the_gm_still_sees() {
    let tmp = temp_dir("surfaces");
    std::fs::create_dir_all(&tmp).unwrap();
    let mut session = open_session(&tmp, (400, 300));

    // Reveal a window in the middle, leave the rest fogged.
    session.begin_fog_stroke();
    session.paint_fog(Point::new(200.0, 150.0), PaintMode::Remove);
    session.end_fog_stroke();

    let gm = session.render_gm();
    let player = session.render_player((400, 300));

    // Revealed window: identical base pixels on both surfaces.
    assert_eq!(gm.get_pixel(200, 150).0, [180, 180, 180, 255]);
    assert_eq!(player.get_pixel(200, 150).0, [180, 180, 180, 255]);

    // Fogged area: dimmed but legible for the GM, black for players.
    let g = gm.get_pixel(20, 20).0;
    assert!(g[0] > 0, "gm fog must stay translucent, got {g:?}");
    assert_eq!(player.get_pixel(20, 20).0, [0, 0, 0, 255]);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn dead_token_is_crossed_out_for_players_only() {
    let tmp = temp_dir("dead_cross");
    std::fs::create_dir_all(&tmp).unwrap();
    let mut session = open_session(&tmp, (400, 300));
    session.clear_fog();

    let id = session.add_token(TokenKind::Creature, None, String::new()).unwrap();
    session.set_hp(id, 0);
    let pos = session.tokens().get(id).unwrap().pos;
    let size = session.tokens().get(id).unwrap().size;
    let center = (
        (pos.x + f64::from(size) / 2.0) as u32,
        (pos.y + f64::from(size) / 2.0) as u32,
    );

    let gm = session.render_gm();
    let player = session.render_player((400, 300));

    // Placeholder sprite red on the GM view, cross stroke red on the player
    // view; the cross is a much brighter red.
    assert_eq!(gm.get_pixel(center.0, center.1).0, [200, 30, 30, 255]);
    assert_eq!(player.get_pixel(center.0, center.1).0, [0xff, 0x33, 0x33, 255]);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn snapshot_source_yields_decodable_png() {
    let tmp = temp_dir("snapshot_png");
    std::fs::create_dir_all(&tmp).unwrap();
    let mut session = open_session(&tmp, (320, 240));
    session.clear_fog();

    let bytes = session.snapshot_png().unwrap();
    let img = image::load_from_memory(&bytes).unwrap().to_rgba8();
    assert_eq!(img.dimensions(), (320, 240));
    assert_eq!(img.get_pixel(100, 100).0, [180, 180, 180, 255]);

    std::fs::remove_dir_all(&tmp).ok();
}
