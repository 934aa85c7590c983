use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "battlemat", version)]
struct Cli {
    /// Map store JSON file.
    #[arg(long, default_value = "maps.json")]
    store: PathBuf,

    /// Directory for fog mask PNGs.
    #[arg(long, default_value = "masks")]
    masks_dir: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the maps in the store.
    Maps,
    /// Render one surface of a map as a PNG.
    Frame(FrameArgs),
    /// Serve the player snapshot view over HTTP.
    Serve(ServeArgs),
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Map name in the store.
    #[arg(long)]
    map: String,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Which surface to render.
    #[arg(long, value_enum, default_value_t = SurfaceChoice::Gm)]
    surface: SurfaceChoice,

    /// Surface width in pixels.
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Surface height in pixels.
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// TTF/OTF font for labels and hp badges.
    #[arg(long)]
    font: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ServeArgs {
    /// Map name in the store.
    #[arg(long)]
    map: String,

    /// Listen address.
    #[arg(long, default_value = "0.0.0.0:8080")]
    addr: SocketAddr,

    /// Snapshot width in pixels.
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Snapshot height in pixels.
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// TTF/OTF font for labels and hp badges.
    #[arg(long)]
    font: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SurfaceChoice {
    /// GM view: translucent fog.
    Gm,
    /// Player view: opaque fog, death markers.
    Player,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "battlemat=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let store = Arc::new(battlemat::JsonFileStore::new(&cli.store));
    match cli.cmd {
        Command::Maps => cmd_maps(store.as_ref()),
        Command::Frame(args) => cmd_frame(store, cli.masks_dir, args),
        Command::Serve(args) => cmd_serve(store, cli.masks_dir, args),
    }
}

fn cmd_maps(store: &battlemat::JsonFileStore) -> anyhow::Result<()> {
    use battlemat::ModelStore as _;
    let items = store.load_items()?;
    if items.is_empty() {
        println!("no maps in '{}'", store.path().display());
        return Ok(());
    }
    for map in items {
        println!("{}  ({}, {} tokens)", map.name, map.image_path, map.tokens.len());
    }
    Ok(())
}

fn open_session(
    store: Arc<battlemat::JsonFileStore>,
    masks_dir: PathBuf,
    map: &str,
    size: (u32, u32),
    font: Option<&PathBuf>,
) -> anyhow::Result<battlemat::MapSession> {
    let mut session = battlemat::MapSession::open_by_name(store, masks_dir, map, size)
        .with_context(|| format!("open map '{map}'"))?;
    if let Some(path) = font {
        session.set_font(battlemat::LabelFont::load(path)?);
    }
    Ok(session)
}

fn cmd_frame(
    store: Arc<battlemat::JsonFileStore>,
    masks_dir: PathBuf,
    args: FrameArgs,
) -> anyhow::Result<()> {
    let size = (args.width, args.height);
    let session = open_session(store, masks_dir, &args.map, size, args.font.as_ref())?;
    let frame = match args.surface {
        SurfaceChoice::Gm => session.render_gm(),
        SurfaceChoice::Player => session.render_player(size),
    };
    frame
        .save_with_format(&args.out, image::ImageFormat::Png)
        .with_context(|| format!("write frame '{}'", args.out.display()))?;
    println!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_serve(
    store: Arc<battlemat::JsonFileStore>,
    masks_dir: PathBuf,
    args: ServeArgs,
) -> anyhow::Result<()> {
    let size = (args.width, args.height);
    let session = open_session(store, masks_dir, &args.map, size, args.font.as_ref())?;
    let source: battlemat::web::SharedSource = Arc::new(Mutex::new(session));
    battlemat::web::serve(source, args.addr)?;
    Ok(())
}
