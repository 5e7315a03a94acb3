// Emitter -- ships a batch's JSON payload to the sidecar message bus. Never
// blocks the cycle: the orchestrator hands payloads to a dedicated thread
// over a bounded channel, mirroring the teacher's main-loop -> logger-thread
// handoff in its old `main.rs`/`logger.rs` pair.

use crossbeam_channel::{bounded, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tungstenite::{connect, Message};
use url::Url;

/// A destination for emitted batches. Implementations must not block the
/// cycle beyond a modest bound and must not let errors escape into the
/// orchestrator.
pub trait Emitter: Send {
    fn emit(&self, channel: &str, payload: String);

    /// Flushes any pending work and releases resources. Called once at
    /// shutdown.
    fn close(self: Box<Self>) {}
}

struct Batch {
    channel: String,
    payload: String,
}

/// WebSocket-backed emitter. Owns a background thread that holds (and
/// lazily reconnects) the socket; `emit` is a non-blocking `try_send`.
pub struct WebSocketEmitter {
    sender: Sender<Batch>,
    handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    warned_about_dropping: AtomicBool,
    currently_dropping: AtomicBool,
    total_dropped: AtomicU64,
}

impl WebSocketEmitter {
    /// Validates `url` eagerly (the fatal "malformed sidecar URL" case of
    /// the error design lives here, at construction, not mid-cycle) and
    /// spawns the background writer thread.
    pub fn new(url: &str) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(url)?;
        let (sender, receiver) = bounded::<Batch>(64);
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();
        let url_owned = parsed.to_string();

        let handle = thread::spawn(move || {
            let mut socket = None;
            while running_clone.load(Ordering::SeqCst) {
                let batch = match receiver.recv_timeout(Duration::from_millis(200)) {
                    Ok(batch) => batch,
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
                    Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                };

                if socket.is_none() {
                    socket = connect(&url_owned).ok().map(|(stream, _response)| stream);
                    if socket.is_none() {
                        tracing::warn!(url = %url_owned, "sidecar connect failed, dropping batch");
                        continue;
                    }
                }

                let message = Message::Text(format!("{}\u{1}{}", batch.channel, batch.payload));
                if let Some(stream) = socket.as_mut() {
                    if stream.send(message).is_err() {
                        tracing::warn!(url = %url_owned, "sidecar write failed, will reconnect");
                        socket = None;
                    }
                }
            }
        });

        Ok(WebSocketEmitter {
            sender,
            handle: Some(handle),
            running,
            warned_about_dropping: AtomicBool::new(false),
            currently_dropping: AtomicBool::new(false),
            total_dropped: AtomicU64::new(0),
        })
    }
}

impl Emitter for WebSocketEmitter {
    fn emit(&self, channel: &str, payload: String) {
        match self.sender.try_send(Batch { channel: channel.to_string(), payload }) {
            Ok(()) => {
                if self.currently_dropping.swap(false, Ordering::SeqCst) {
                    tracing::info!("sidecar channel caught up, resuming emission");
                }
            }
            Err(TrySendError::Full(_)) => {
                self.total_dropped.fetch_add(1, Ordering::Relaxed);
                self.currently_dropping.store(true, Ordering::SeqCst);
                if !self.warned_about_dropping.swap(true, Ordering::SeqCst) {
                    tracing::warn!("sidecar channel full, dropping batches to keep the cycle moving");
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::warn!("sidecar writer thread gone, dropping batch");
            }
        }
    }

    fn close(mut self: Box<Self>) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl WebSocketEmitter {
    /// Total batches dropped for backpressure over this emitter's lifetime.
    pub fn dropped_count(&self) -> u64 {
        self.total_dropped.load(Ordering::Relaxed)
    }
}
