//! Bugstr Desktop - crash reporting for multi-process desktop applications
//!
//! A desktop application runs one main process and any number of renderer
//! processes. This crate picks the right SDK entry point for the process it
//! runs in and provides the filesystem layer the main process uses to queue
//! crash events on disk until they are delivered.
//!
//! # Features
//!
//! - Role-based entry point dispatch (`init`, `close`, `flush`)
//! - Renderer to main event forwarding
//! - File-backed event queue with gzip envelopes for large events
//! - Panic capture into the queue
//! - Future-returning filesystem helpers with typed errors
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bugstr_desktop::{Dispatcher, Level, MainProcessEntryPoint, SdkOptions, Transport};
//!
//! # async fn run(transport: impl Transport + 'static) -> Result<(), bugstr_desktop::SdkError> {
//! let main = Arc::new(MainProcessEntryPoint::new(transport));
//! let dispatcher = Dispatcher::new().with_main(main.clone());
//!
//! dispatcher.init(&SdkOptions::from_env()?)?;
//! main.capture_message(Level::Error, "something broke").await?;
//!
//! // Deliver everything that was queued before shutting down.
//! dispatcher.close(Some(std::time::Duration::from_secs(2))).await?;
//! # Ok(())
//! # }
//! ```

pub mod dispatcher;
pub mod error;
pub mod event;
pub mod fs;
pub mod integrations;
pub mod main_process;
pub mod options;
pub mod renderer;
pub mod role;
pub mod transport;

pub use dispatcher::{Dispatcher, EntryPoint, Lifecycle, RoleDetector};
pub use error::{Operation, SdkError};
pub use event::{CrashEvent, Level};
pub use fs::{FsError, FsErrorKind};
pub use integrations::{default_integrations, EmptyIntegration, Integration, IntegrationContext, PanicCapture};
pub use main_process::{default_queue_dir, EventQueue, MainProcessEntryPoint};
pub use options::{remove_empty_integrations, SdkOptions};
pub use renderer::RendererProcessEntryPoint;
pub use role::{ProcessRole, PROCESS_TYPE_ENV};
pub use transport::{Transport, TransportError};
