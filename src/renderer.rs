//! Renderer process entry point.
//!
//! Renderers never touch the queue. Captured events are stamped and forwarded
//! to the main process, which persists and delivers them.

use std::sync::{Mutex, PoisonError};

use tokio::sync::{mpsc, oneshot};
use tracing::info;

use crate::dispatcher::EntryPoint;
use crate::error::SdkError;
use crate::event::{CrashEvent, Level};
use crate::integrations::{setup_integrations, IntegrationContext};
use crate::options::SdkOptions;
use crate::role::ProcessRole;

/// Messages carried from renderers to the main process.
#[derive(Debug)]
pub(crate) enum IpcMessage {
    Event(CrashEvent),
    /// Answered once every earlier event has been handled. Carries whether
    /// all of them reached the queue.
    Sync(oneshot::Sender<bool>),
}

#[derive(Debug, Clone)]
struct RendererState {
    release: Option<String>,
    environment: Option<String>,
}

/// SDK entry point for renderer processes. Offers no `close` or `flush`.
pub struct RendererProcessEntryPoint {
    ipc: mpsc::UnboundedSender<IpcMessage>,
    state: Mutex<Option<RendererState>>,
}

impl RendererProcessEntryPoint {
    /// Creates an entry point that forwards events over `ipc`.
    pub(crate) fn new(ipc: mpsc::UnboundedSender<IpcMessage>) -> Self {
        Self {
            ipc,
            state: Mutex::new(None),
        }
    }

    /// Forwards an event to the main process and returns its ID.
    pub fn capture_event(&self, event: CrashEvent) -> Result<String, SdkError> {
        let state = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(SdkError::NotInitialized)?;

        let event = event
            .stamp(state.release.as_deref(), state.environment.as_deref())
            .with_id();
        let id = event.event_id.clone().unwrap_or_default();
        self.ipc
            .send(IpcMessage::Event(event))
            .map_err(|_| SdkError::IpcClosed)?;
        Ok(id)
    }

    pub fn capture_message(&self, level: Level, message: impl Into<String>) -> Result<String, SdkError> {
        self.capture_event(CrashEvent::new(ProcessRole::Renderer, level, message))
    }
}

impl EntryPoint for RendererProcessEntryPoint {
    fn init(&self, options: SdkOptions) -> Result<(), SdkError> {
        let ctx = IntegrationContext {
            role: ProcessRole::Renderer,
            queue: None,
            release: options.release.clone(),
            environment: options.environment.clone(),
        };
        let installed = setup_integrations(&options, &ctx);
        info!(integrations = ?installed, "renderer SDK initialized");

        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = Some(RendererState {
            release: options.release,
            environment: options.environment,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_forwards_stamped_event() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let renderer = RendererProcessEntryPoint::new(tx);
        renderer
            .init(SdkOptions {
                environment: Some("staging".into()),
                ..SdkOptions::default()
            })
            .unwrap();

        let id = renderer.capture_message(Level::Warning, "slow frame").unwrap();

        let Ok(IpcMessage::Event(event)) = rx.try_recv() else {
            panic!("expected a forwarded event");
        };
        assert_eq!(event.event_id.as_deref(), Some(id.as_str()));
        assert_eq!(event.process, ProcessRole::Renderer);
        assert_eq!(event.environment.as_deref(), Some("staging"));
    }

    #[test]
    fn capture_before_init_fails() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let renderer = RendererProcessEntryPoint::new(tx);

        assert!(matches!(
            renderer.capture_message(Level::Error, "early"),
            Err(SdkError::NotInitialized)
        ));
    }

    #[test]
    fn capture_after_main_is_gone_fails() {
        let (tx, rx) = mpsc::unbounded_channel();
        let renderer = RendererProcessEntryPoint::new(tx);
        renderer.init(SdkOptions::default()).unwrap();
        drop(rx);

        assert!(matches!(
            renderer.capture_message(Level::Error, "orphan"),
            Err(SdkError::IpcClosed)
        ));
    }

    #[test]
    fn renderer_has_no_lifecycle() {
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(RendererProcessEntryPoint::new(tx).lifecycle().is_none());
    }
}
