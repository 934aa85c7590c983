use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::document::{MapRecord, ModelStore, upsert_record};
use crate::fog::FogMask;

/// Quiet period before a scheduled save hits the datastore.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Where a map's fog mask lives on disk: `<masks_dir>/<image stem>_mask.png`.
pub fn mask_path_for(masks_dir: &Path, image_path: &str) -> PathBuf {
    let stem = Path::new(image_path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("map");
    masks_dir.join(format!("{stem}_mask.png"))
}

/// One queued save: a value snapshot of everything that needs to land on disk.
///
/// Snapshots decouple the worker from live editing state; edits made after
/// scheduling never leak into an in-flight write.
#[derive(Clone, Debug)]
pub struct SaveJob {
    pub record: MapRecord,
    pub fog: FogMask,
    pub fog_path: PathBuf,
}

enum Command {
    Save(Box<SaveJob>),
    /// Write this job immediately, discard any pending older snapshot, then
    /// signal the waiting caller.
    Flush(Box<SaveJob>, mpsc::Sender<()>),
    Shutdown,
}

/// Debounced write-behind gateway for map state.
///
/// Edits schedule snapshots; the background worker coalesces bursts so only
/// the latest snapshot in a quiet window is written. Latest wins. Write
/// failures are logged, never surfaced to the editing path.
pub struct SaveGateway {
    tx: mpsc::Sender<Command>,
    handle: Option<JoinHandle<()>>,
    store: Arc<dyn ModelStore>,
}

impl SaveGateway {
    pub fn spawn(store: Arc<dyn ModelStore>) -> Self {
        Self::spawn_with_debounce(store, DEFAULT_DEBOUNCE)
    }

    pub fn spawn_with_debounce(store: Arc<dyn ModelStore>, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::channel();
        let worker_store = store.clone();
        let handle = std::thread::spawn(move || worker(&worker_store, &rx, debounce));
        Self {
            tx,
            handle: Some(handle),
            store,
        }
    }

    /// Queue a snapshot. Returns immediately; the write happens after the
    /// debounce window closes.
    pub fn schedule(&self, job: SaveJob) {
        if self.tx.send(Command::Save(Box::new(job))).is_err() {
            tracing::error!("save worker is gone; snapshot dropped");
        }
    }

    /// Write a snapshot synchronously, superseding anything still debouncing.
    ///
    /// The write goes through the worker so ordering is total: any snapshot
    /// queued before this call is discarded rather than flushed later on top
    /// of the newer state.
    pub fn save_now(&self, job: SaveJob) {
        let (ack_tx, ack_rx) = mpsc::channel();
        if self.tx.send(Command::Flush(Box::new(job.clone()), ack_tx)).is_err() {
            tracing::error!("save worker is gone; writing snapshot inline");
            flush(self.store.as_ref(), job);
            return;
        }
        if ack_rx.recv().is_err() {
            tracing::error!("save worker died mid-flush; writing snapshot inline");
            flush(self.store.as_ref(), job);
        }
    }

    /// Stop the worker, writing any still-pending snapshot first.
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.tx.send(Command::Shutdown).ok();
            if handle.join().is_err() {
                tracing::error!("save worker panicked during shutdown");
            }
        }
    }
}

impl Drop for SaveGateway {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}

fn worker(store: &Arc<dyn ModelStore>, rx: &mpsc::Receiver<Command>, debounce: Duration) {
    'idle: loop {
        let mut pending = match rx.recv() {
            Ok(Command::Save(job)) => job,
            Ok(Command::Flush(job, ack)) => {
                flush(store.as_ref(), *job);
                ack.send(()).ok();
                continue 'idle;
            }
            Ok(Command::Shutdown) | Err(_) => return,
        };
        // Coalesce: keep replacing the pending snapshot until the channel
        // stays quiet for the debounce window.
        loop {
            match rx.recv_timeout(debounce) {
                Ok(Command::Save(job)) => pending = job,
                Ok(Command::Flush(job, ack)) => {
                    // An explicit save is newer than whatever was debouncing;
                    // the pending snapshot is dropped, not written on top.
                    flush(store.as_ref(), *job);
                    ack.send(()).ok();
                    continue 'idle;
                }
                Ok(Command::Shutdown) => {
                    flush(store.as_ref(), *pending);
                    return;
                }
                Err(mpsc::RecvTimeoutError::Timeout) => break,
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    flush(store.as_ref(), *pending);
                    return;
                }
            }
        }
        flush(store.as_ref(), *pending);
    }
}

/// Write one snapshot synchronously: fog mask PNG first, then the record.
pub fn flush(store: &dyn ModelStore, job: SaveJob) {
    let SaveJob {
        mut record,
        fog,
        fog_path,
    } = job;

    match fog.save_png(&fog_path) {
        Ok(()) => {
            record.fog_mask_path = Some(fog_path.to_string_lossy().into_owned());
        }
        Err(error) => {
            tracing::error!(
                path = %fog_path.display(),
                %error,
                "fog mask write failed; record keeps its previous mask path"
            );
        }
    }

    if let Err(error) = upsert_record(store, record) {
        tracing::error!(%error, "map record write failed; will retry on next save");
    } else {
        tracing::debug!(path = %fog_path.display(), "map snapshot persisted");
    }
}
