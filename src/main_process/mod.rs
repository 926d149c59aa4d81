//! Main process entry point.
//!
//! The main process owns the event queue. Events captured here, or forwarded
//! by renderers, are written to disk as they arrive and handed to the
//! [`Transport`] only when the application flushes or closes the SDK, so a
//! crash between capture and delivery loses nothing already queued.

mod envelope;
mod queue;

pub use envelope::{decode_entry, encode_entry, EnvelopeError};
pub use queue::EventQueue;

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::dispatcher::{EntryPoint, Lifecycle};
use crate::error::SdkError;
use crate::event::{CrashEvent, Level};
use crate::integrations::{setup_integrations, IntegrationContext};
use crate::options::SdkOptions;
use crate::renderer::{IpcMessage, RendererProcessEntryPoint};
use crate::role::ProcessRole;
use crate::transport::Transport;

/// Queue location when `cache_dir` is not configured.
pub fn default_queue_dir() -> PathBuf {
    std::env::temp_dir().join("bugstr").join("queue")
}

#[derive(Debug, Clone)]
struct MainState {
    queue: EventQueue,
    release: Option<String>,
    environment: Option<String>,
}

type SharedState = Arc<Mutex<Option<MainState>>>;

fn snapshot(state: &SharedState) -> Option<MainState> {
    state.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

/// SDK entry point for the main process.
pub struct MainProcessEntryPoint {
    transport: Arc<dyn Transport>,
    state: SharedState,
    ipc_tx: mpsc::UnboundedSender<IpcMessage>,
    /// Handed to the receiver task by the first `init`.
    ipc_rx: Mutex<Option<mpsc::UnboundedReceiver<IpcMessage>>>,
}

impl MainProcessEntryPoint {
    pub fn new(transport: impl Transport + 'static) -> Self {
        let (ipc_tx, ipc_rx) = mpsc::unbounded_channel();
        Self {
            transport: Arc::new(transport),
            state: Arc::new(Mutex::new(None)),
            ipc_tx,
            ipc_rx: Mutex::new(Some(ipc_rx)),
        }
    }

    /// Creates a renderer entry point whose events arrive at this process.
    pub fn renderer_channel(&self) -> RendererProcessEntryPoint {
        RendererProcessEntryPoint::new(self.ipc_tx.clone())
    }

    fn current_state(&self) -> Option<MainState> {
        snapshot(&self.state)
    }

    /// Directory of the event queue, once initialized.
    pub fn queue_dir(&self) -> Option<PathBuf> {
        self.current_state().map(|s| s.queue.dir().to_path_buf())
    }

    /// Queues an event and returns its ID.
    ///
    /// Renderer events sent before this call are queued ahead of it.
    pub async fn capture_event(&self, event: CrashEvent) -> Result<String, SdkError> {
        let state = self.current_state().ok_or(SdkError::NotInitialized)?;
        self.sync_renderer_events().await;

        let event = event
            .stamp(state.release.as_deref(), state.environment.as_deref())
            .with_id();
        state.queue.push(&event).await?;
        Ok(event.event_id.unwrap_or_default())
    }

    pub async fn capture_message(
        &self,
        level: Level,
        message: impl Into<String>,
    ) -> Result<String, SdkError> {
        self.capture_event(CrashEvent::new(ProcessRole::Main, level, message))
            .await
    }

    fn start_receiver(&self, runtime: &Handle) {
        let mut slot = self.ipc_rx.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(rx) = slot.take() {
            runtime.spawn(receive_renderer_events(self.state.clone(), rx));
        }
    }

    /// Waits until every renderer event sent so far has been handled.
    /// Returns whether all of them reached the queue.
    async fn sync_renderer_events(&self) -> bool {
        let (done, handled) = oneshot::channel();
        if self.ipc_tx.send(IpcMessage::Sync(done)).is_err() {
            return false;
        }
        handled.await.unwrap_or(false)
    }

    /// Sends queued events oldest first. Stops at the first transport failure.
    async fn drain(&self) -> Result<bool, SdkError> {
        let Some(state) = self.current_state() else {
            return Ok(false);
        };
        let received = self.sync_renderer_events().await;

        let entries = state.queue.entries().await?;
        let mut sent = 0;
        for name in &entries {
            let event = match state.queue.load(name).await {
                Ok(event) => event,
                Err(e) => {
                    warn!(entry = %name, error = %e, "dropping unreadable queue entry");
                    state.queue.remove(name).await?;
                    continue;
                }
            };

            if let Err(e) = self.transport.send(&event).await {
                warn!(entry = %name, error = %e, "delivery failed, keeping remaining events queued");
                return Ok(false);
            }
            if !state.queue.remove(name).await? {
                debug!(entry = %name, "delivered entry was already removed");
            }
            sent += 1;
        }

        debug!(sent, "queue drained");
        Ok(received)
    }

    async fn flush_with_timeout(&self, timeout: Option<Duration>) -> bool {
        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, self.drain()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(timeout = ?limit, "flush timed out");
                    return false;
                }
            },
            None => self.drain().await,
        };

        result.unwrap_or_else(|e| {
            warn!(error = %e, "flush failed");
            false
        })
    }
}

/// Persists renderer events as they arrive. Events that cannot be written
/// stay in the backlog and are retried with the next message.
async fn receive_renderer_events(
    state: SharedState,
    mut rx: mpsc::UnboundedReceiver<IpcMessage>,
) {
    let mut backlog = VecDeque::new();
    while let Some(message) = rx.recv().await {
        match message {
            IpcMessage::Event(event) => {
                backlog.push_back(event);
                persist_backlog(&state, &mut backlog).await;
            }
            IpcMessage::Sync(done) => {
                persist_backlog(&state, &mut backlog).await;
                let _ = done.send(backlog.is_empty());
            }
        }
    }

    if !backlog.is_empty() {
        warn!(lost = backlog.len(), "renderer channel closed with unqueued events");
    }
}

async fn persist_backlog(state: &SharedState, backlog: &mut VecDeque<CrashEvent>) {
    // Not initialized, or closed: hold events until the next init.
    let Some(state) = snapshot(state) else {
        return;
    };

    while let Some(event) = backlog.front() {
        let event = event
            .clone()
            .stamp(state.release.as_deref(), state.environment.as_deref())
            .with_id();
        if let Err(e) = state.queue.push(&event).await {
            warn!(error = %e, pending = backlog.len(), "could not queue renderer event, will retry");
            return;
        }
        backlog.pop_front();
        debug!(process = %event.process, "queued renderer event");
    }
}

impl EntryPoint for MainProcessEntryPoint {
    fn init(&self, options: SdkOptions) -> Result<(), SdkError> {
        let runtime = Handle::try_current().map_err(|_| SdkError::NoRuntime)?;
        let dir = options.cache_dir.clone().unwrap_or_else(default_queue_dir);
        let queue = EventQueue::create(
            dir,
            options.max_queue_size,
            options.compression_threshold,
        )?;

        let ctx = IntegrationContext {
            role: ProcessRole::Main,
            queue: Some(queue.clone()),
            release: options.release.clone(),
            environment: options.environment.clone(),
        };
        let installed = setup_integrations(&options, &ctx);

        if options.debug {
            debug!(?options, "main process options");
        }
        info!(
            queue = %queue.dir().display(),
            integrations = ?installed,
            "main process SDK initialized"
        );

        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = Some(MainState {
            queue,
            release: options.release,
            environment: options.environment,
        });
        self.start_receiver(&runtime);
        Ok(())
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        Some(self)
    }
}

impl Lifecycle for MainProcessEntryPoint {
    fn close(&self, timeout: Option<Duration>) -> BoxFuture<'_, bool> {
        async move {
            let drained = self.flush_with_timeout(timeout).await;
            if self
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take()
                .is_some()
            {
                info!(drained, "main process SDK closed");
            }
            drained
        }
        .boxed()
    }

    fn flush(&self, timeout: Option<Duration>) -> BoxFuture<'_, bool> {
        self.flush_with_timeout(timeout).boxed()
    }
}
