//! Entry point selection.
//!
//! A desktop application runs the SDK in two kinds of process. The
//! [`Dispatcher`] holds one entry point per [`ProcessRole`] and forwards each
//! call to the one matching the role of the current process, read afresh on
//! every call.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tracing::debug;

use crate::error::{Operation, SdkError};
use crate::options::{remove_empty_integrations, SdkOptions};
use crate::role::ProcessRole;

/// Shutdown operations, only offered by the main process.
pub trait Lifecycle: Send + Sync {
    /// Flushes queued events, then disables the SDK.
    ///
    /// Resolves to `true` if the queue drained before `timeout`.
    fn close(&self, timeout: Option<Duration>) -> BoxFuture<'_, bool>;

    /// Delivers queued events. Resolves to `true` if the queue drained before
    /// `timeout`, `false` otherwise or when the SDK is not initialized.
    fn flush(&self, timeout: Option<Duration>) -> BoxFuture<'_, bool>;
}

/// A role-specific SDK implementation.
pub trait EntryPoint: Send + Sync {
    fn init(&self, options: SdkOptions) -> Result<(), SdkError>;

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        None
    }
}

/// Reports the role of the current process.
pub type RoleDetector = fn() -> ProcessRole;

/// Routes SDK calls to the entry point for the current process role.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use bugstr_desktop::{Dispatcher, MainProcessEntryPoint, SdkOptions, Transport};
///
/// # async fn run(transport: impl Transport + 'static) -> Result<(), bugstr_desktop::SdkError> {
/// let main = Arc::new(MainProcessEntryPoint::new(transport));
/// let dispatcher = Dispatcher::new()
///     .with_renderer(Arc::new(main.renderer_channel()))
///     .with_main(main);
///
/// dispatcher.init(&SdkOptions::from_env()?)?;
/// // ...
/// dispatcher.close(None).await?;
/// # Ok(())
/// # }
/// ```
pub struct Dispatcher {
    detect_role: RoleDetector,
    main: Option<Arc<dyn EntryPoint>>,
    renderer: Option<Arc<dyn EntryPoint>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Creates a dispatcher that reads the role from the environment.
    pub fn new() -> Self {
        Self {
            detect_role: ProcessRole::detect,
            main: None,
            renderer: None,
        }
    }

    pub fn with_role_detector(mut self, detect_role: RoleDetector) -> Self {
        self.detect_role = detect_role;
        self
    }

    pub fn with_main(mut self, entry_point: Arc<dyn EntryPoint>) -> Self {
        self.main = Some(entry_point);
        self
    }

    pub fn with_renderer(mut self, entry_point: Arc<dyn EntryPoint>) -> Self {
        self.renderer = Some(entry_point);
        self
    }

    /// Returns the entry point for the current process role.
    pub fn resolve_entry_point(&self) -> Result<Arc<dyn EntryPoint>, SdkError> {
        let role = (self.detect_role)();
        let slot = match role {
            ProcessRole::Main => &self.main,
            ProcessRole::Renderer => &self.renderer,
        };
        debug!(%role, registered = slot.is_some(), "resolving entry point");
        slot.clone().ok_or(SdkError::EntryPointNotFound { role })
    }

    /// Initializes the current role's entry point with `options`, minus any
    /// placeholder integrations. `options` itself is not modified.
    pub fn init(&self, options: &SdkOptions) -> Result<(), SdkError> {
        let options = remove_empty_integrations(options);
        self.resolve_entry_point()?.init(options)
    }

    pub async fn close(&self, timeout: Option<Duration>) -> Result<bool, SdkError> {
        let entry_point = self.resolve_entry_point()?;
        match entry_point.lifecycle() {
            Some(lifecycle) => Ok(lifecycle.close(timeout).await),
            None => Err(SdkError::MainProcessOnly {
                operation: Operation::Close,
            }),
        }
    }

    pub async fn flush(&self, timeout: Option<Duration>) -> Result<bool, SdkError> {
        let entry_point = self.resolve_entry_point()?;
        match entry_point.lifecycle() {
            Some(lifecycle) => Ok(lifecycle.flush(timeout).await),
            None => Err(SdkError::MainProcessOnly {
                operation: Operation::Flush,
            }),
        }
    }
}
