//! Integrations installed when an entry point is initialized.
//!
//! An integration is a capability the SDK sets up once per process, such as
//! capturing panics. Integrations that only make sense in the main process are
//! represented in renderers by an [`EmptyIntegration`] with the same name, so
//! option sets can be shared between roles; placeholders are dropped before
//! setup.

use std::collections::HashSet;
use std::panic::PanicHookInfo;
use std::sync::{Arc, Mutex, Once, PoisonError};

use tracing::{debug, warn};

use crate::event::{CrashEvent, Level};
use crate::main_process::EventQueue;
use crate::options::SdkOptions;
use crate::role::ProcessRole;

/// Everything an integration may need during setup.
#[derive(Debug, Clone)]
pub struct IntegrationContext {
    pub role: ProcessRole,
    /// Main process queue, absent in renderers
    pub queue: Option<EventQueue>,
    pub release: Option<String>,
    pub environment: Option<String>,
}

pub trait Integration: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this is a placeholder that does nothing.
    fn is_empty(&self) -> bool {
        false
    }

    fn setup_once(&self, ctx: &IntegrationContext);
}

/// Stand-in for an integration that is unavailable in the current process.
#[derive(Debug, Clone, Copy)]
pub struct EmptyIntegration {
    name: &'static str,
}

impl EmptyIntegration {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl Integration for EmptyIntegration {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_empty(&self) -> bool {
        true
    }

    fn setup_once(&self, _ctx: &IntegrationContext) {}
}

struct PanicTarget {
    queue: EventQueue,
    release: Option<String>,
    environment: Option<String>,
}

static PANIC_TARGET: Mutex<Option<PanicTarget>> = Mutex::new(None);
static PANIC_HOOK: Once = Once::new();

/// Persists panics from the main process as fatal events.
///
/// The hook is installed once and chains to the previously installed hook.
/// Re-initializing the SDK only retargets it at the new queue. The report is
/// written synchronously, since an unwinding thread has no runtime to rely on.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanicCapture;

impl PanicCapture {
    pub const NAME: &'static str = "PanicCapture";
}

impl Integration for PanicCapture {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn setup_once(&self, ctx: &IntegrationContext) {
        let (ProcessRole::Main, Some(queue)) = (ctx.role, &ctx.queue) else {
            debug!(role = %ctx.role, "panic capture skipped outside the main process");
            return;
        };

        *PANIC_TARGET.lock().unwrap_or_else(PoisonError::into_inner) = Some(PanicTarget {
            queue: queue.clone(),
            release: ctx.release.clone(),
            environment: ctx.environment.clone(),
        });

        PANIC_HOOK.call_once(|| {
            let previous = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                persist_panic(info);
                previous(info);
            }));
            debug!("panic hook installed");
        });
    }
}

fn persist_panic(info: &PanicHookInfo<'_>) {
    let guard = PANIC_TARGET.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(target) = guard.as_ref() else {
        return;
    };

    let message = if let Some(s) = info.payload().downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = info.payload().downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    };
    let message = match info.location() {
        Some(location) => format!("panicked at {}: {}", location, message),
        None => format!("panicked: {}", message),
    };
    let backtrace = std::backtrace::Backtrace::force_capture().to_string();

    let event = CrashEvent::new(ProcessRole::Main, Level::Fatal, message)
        .with_stack(backtrace)
        .stamp(target.release.as_deref(), target.environment.as_deref())
        .with_id();

    if let Err(e) = target.queue.push_sync(&event) {
        warn!(error = %e, "failed to persist panic report");
    }
}

/// Integrations a role gets when `default_integrations` is enabled.
pub fn default_integrations(role: ProcessRole) -> Vec<Arc<dyn Integration>> {
    match role {
        ProcessRole::Main => vec![Arc::new(PanicCapture)],
        ProcessRole::Renderer => vec![Arc::new(EmptyIntegration::new(PanicCapture::NAME))],
    }
}

/// Merges defaults with user integrations and drops placeholders.
///
/// A user integration replaces a default of the same name.
pub fn effective_integrations(options: &SdkOptions, role: ProcessRole) -> Vec<Arc<dyn Integration>> {
    let user_names: HashSet<&str> = options.integrations.iter().map(|i| i.name()).collect();

    let defaults = if options.default_integrations {
        default_integrations(role)
    } else {
        Vec::new()
    };

    defaults
        .into_iter()
        .filter(|i| !user_names.contains(i.name()))
        .chain(options.integrations.iter().cloned())
        .filter(|i| !i.is_empty())
        .collect()
}

/// Sets up every effective integration for `ctx.role`.
pub fn setup_integrations(options: &SdkOptions, ctx: &IntegrationContext) -> Vec<&'static str> {
    effective_integrations(options, ctx.role)
        .iter()
        .map(|integration| {
            integration.setup_once(ctx);
            integration.name()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    impl Integration for Counting {
        fn name(&self) -> &'static str {
            "Counting"
        }

        fn setup_once(&self, _ctx: &IntegrationContext) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn renderer_ctx() -> IntegrationContext {
        IntegrationContext {
            role: ProcessRole::Renderer,
            queue: None,
            release: None,
            environment: None,
        }
    }

    #[test]
    fn renderer_defaults_are_placeholders() {
        let defaults = default_integrations(ProcessRole::Renderer);
        assert_eq!(defaults.len(), 1);
        assert!(defaults[0].is_empty());
        assert_eq!(defaults[0].name(), PanicCapture::NAME);

        let effective = effective_integrations(&SdkOptions::default(), ProcessRole::Renderer);
        assert!(effective.is_empty());
    }

    #[test]
    fn main_defaults_include_panic_capture() {
        let effective = effective_integrations(&SdkOptions::default(), ProcessRole::Main);
        let names: Vec<_> = effective.iter().map(|i| i.name()).collect();
        assert_eq!(names, vec![PanicCapture::NAME]);
    }

    #[test]
    fn user_integration_replaces_default_by_name() {
        let options =
            SdkOptions::default().with_integration(EmptyIntegration::new(PanicCapture::NAME));

        assert!(effective_integrations(&options, ProcessRole::Main).is_empty());
    }

    #[test]
    fn default_integrations_can_be_disabled() {
        let options = SdkOptions {
            default_integrations: false,
            ..SdkOptions::default()
        };
        assert!(effective_integrations(&options, ProcessRole::Main).is_empty());
    }

    #[test]
    fn setup_runs_each_integration() {
        let calls = Arc::new(AtomicUsize::new(0));
        let options = SdkOptions::default().with_integration(Counting {
            calls: calls.clone(),
        });

        let names = setup_integrations(&options, &renderer_ctx());

        assert_eq!(names, vec!["Counting"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
