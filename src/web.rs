use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::Context as _;
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;

use crate::error::BattlematResult;

/// Anything that can produce a fresh player-view PNG on demand.
///
/// The HTTP layer knows nothing about maps; it pulls bytes through this seam
/// so tests can serve canned images.
pub trait SnapshotSource: Send {
    fn snapshot_png(&mut self) -> BattlematResult<Vec<u8>>;
}

pub type SharedSource = Arc<Mutex<dyn SnapshotSource>>;

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>Battle Map</title>
<style>
  body { margin: 0; background: #181818; }
  img { display: block; width: 100vw; height: 100vh; object-fit: contain; }
</style>
</head>
<body>
<img id="map" src="/map.png" alt="battle map">
<script>
  setInterval(() => {
    document.getElementById('map').src = '/map.png?t=' + Date.now();
  }, 2000);
</script>
</body>
</html>
"#;

pub fn router(source: SharedSource) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/map.png", get(map_png))
        .with_state(source)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Render and return the current player view. Every request gets a fresh
/// frame; `no-store` keeps browsers from showing a stale board.
async fn map_png(State(source): State<SharedSource>) -> Response {
    let png = {
        let mut source = match source.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        source.snapshot_png()
    };
    match png {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "image/png"),
                (header::CACHE_CONTROL, "no-store"),
            ],
            bytes,
        )
            .into_response(),
        Err(error) => {
            tracing::error!(%error, "snapshot render failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "snapshot unavailable").into_response()
        }
    }
}

/// Serve the snapshot mirror until the process exits. Blocks the calling
/// thread on a single-threaded runtime.
pub fn serve(source: SharedSource, addr: SocketAddr) -> BattlematResult<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build snapshot server runtime")?;
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("bind snapshot server on {addr}"))?;
        tracing::info!(%addr, "snapshot server listening");
        axum::serve(listener, router(source))
            .await
            .context("snapshot server")?;
        Ok(())
    })
}

/// Run the snapshot mirror on a background thread.
pub fn spawn(source: SharedSource, addr: SocketAddr) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        if let Err(error) = serve(source, addr) {
            tracing::error!(%error, "snapshot server exited");
        }
    })
}
