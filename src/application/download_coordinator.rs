use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use tokio::sync::mpsc::UnboundedSender;

use crate::{
    application::{format_policy, progress::translate},
    domain::{AppError, DownloadPhase, DownloadRequest, ErrorKind, ProgressEvent, SessionId},
    engine::{EngineError, EngineOptions, MediaEngine, RawProgress},
};

/// Receives every state transition of a session, from whichever thread
/// produced it. Implementations must not block.
///
/// The slot is freed just before a session's terminal event is published,
/// so the `Starting` event of the next session can arrive ahead of the
/// previous `Done`/`Failed`. Every event carries its `session` id; filter
/// on it rather than on arrival order.
pub trait ProgressObserver: Send + Sync + 'static {
    fn on_progress(&self, event: ProgressEvent);
}

impl ProgressObserver for UnboundedSender<ProgressEvent> {
    fn on_progress(&self, event: ProgressEvent) {
        if self.send(event).is_err() {
            tracing::debug!("Progress receiver dropped; event discarded");
        }
    }
}

#[derive(Debug)]
struct ActiveSession {
    id: SessionId,
}

type SessionSlot = Arc<Mutex<Option<ActiveSession>>>;

fn lock(slot: &SessionSlot) -> MutexGuard<'_, Option<ActiveSession>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Runs at most one download at a time on a background thread and
/// publishes its progress to the registered observer.
#[derive(Clone)]
pub struct DownloadCoordinator {
    engine: Arc<dyn MediaEngine>,
    destination: PathBuf,
    observer: Arc<dyn ProgressObserver>,
    active: SessionSlot,
    next_id: Arc<AtomicU64>,
}

impl DownloadCoordinator {
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        destination: PathBuf,
        observer: Arc<dyn ProgressObserver>,
    ) -> Self {
        Self {
            engine,
            destination,
            observer,
            active: Arc::new(Mutex::new(None)),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn destination(&self) -> &PathBuf {
        &self.destination
    }

    pub fn is_active(&self) -> bool {
        lock(&self.active).is_some()
    }

    /// Starts a session for `request`.
    ///
    /// Rejections create no session and publish nothing. Once accepted,
    /// every outcome, including engine failures, arrives at the observer
    /// as a terminal event.
    pub fn submit(&self, request: DownloadRequest) -> Result<SessionId, AppError> {
        if request.url().is_empty() {
            tracing::warn!("Rejected submission with empty URL");
            return Err(AppError::EmptyInput);
        }

        let id = {
            let mut slot = lock(&self.active);
            if let Some(active) = slot.as_ref() {
                tracing::warn!(active = active.id, "Rejected submission while a download is running");
                return Err(AppError::SessionActive);
            }
            let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
            *slot = Some(ActiveSession { id });
            id
        };

        tracing::info!(session = id, url = request.url(), mode = ?request.mode(), "Download submitted");

        let mut session = DownloadSession {
            id,
            request,
            destination: self.destination.clone(),
            engine: Arc::clone(&self.engine),
            observer: Arc::clone(&self.observer),
            active: Arc::clone(&self.active),
            phase: DownloadPhase::Idle,
        };
        session.advance(ProgressEvent::starting());

        let spawned = thread::Builder::new()
            .name(format!("download-session-{}", id))
            .spawn(move || session.run());

        // The dropped session has already released the slot.
        if let Err(e) = spawned {
            tracing::error!(session = id, "Failed to start download thread: {}", e);
            self.observer.on_progress(
                ProgressEvent::failed(ErrorKind::from(&AppError::Io(e.to_string())))
                    .for_session(id),
            );
        }

        Ok(id)
    }
}

/// Live context of one in-flight request, owned by its background thread.
struct DownloadSession {
    id: SessionId,
    request: DownloadRequest,
    destination: PathBuf,
    engine: Arc<dyn MediaEngine>,
    observer: Arc<dyn ProgressObserver>,
    active: SessionSlot,
    phase: DownloadPhase,
}

impl DownloadSession {
    fn run(mut self) {
        let options = EngineOptions::new(format_policy::resolve(&self.request), &self.destination)
            .with_post_processors(format_policy::post_processing(self.request.mode()));
        tracing::info!(session = self.id, format = %options.format, "Engine starting");

        let urls = vec![self.request.url().to_string()];
        let engine = Arc::clone(&self.engine);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            engine.download(&urls, &options, &mut |raw: RawProgress| {
                self.advance(translate(&raw))
            })
        }));

        let terminal = match outcome {
            Ok(Ok(output)) => {
                tracing::info!(session = self.id, files = ?output.saved_files, "Download complete");
                ProgressEvent::done(output.saved_files.last().cloned())
            }
            Ok(Err(e)) => {
                tracing::error!(session = self.id, "Download failed: {}", e);
                ProgressEvent::failed(classify_engine_error(&e))
            }
            Err(_) => {
                tracing::error!(session = self.id, "Download engine panicked");
                ProgressEvent::failed(ErrorKind::Unknown {
                    snippet: "download engine crashed".to_string(),
                })
            }
        };

        self.release();
        self.advance(terminal);
    }

    fn advance(&mut self, event: ProgressEvent) {
        if !self.phase.can_advance_to(event.phase) {
            tracing::debug!(
                session = self.id,
                from = ?self.phase,
                to = ?event.phase,
                "Ignoring out-of-order progress event"
            );
            return;
        }
        self.phase = event.phase;
        self.observer.on_progress(event.for_session(self.id));
    }

    fn release(&self) {
        let mut slot = lock(&self.active);
        if slot.as_ref().is_some_and(|active| active.id == self.id) {
            *slot = None;
        }
    }
}

impl Drop for DownloadSession {
    fn drop(&mut self) {
        self.release();
    }
}

fn classify_engine_error(error: &EngineError) -> ErrorKind {
    match error {
        EngineError::Launch { .. } => ErrorKind::MissingTranscoder,
        other => ErrorKind::classify(&other.to_string()),
    }
}
