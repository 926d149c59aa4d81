//! SDK configuration.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::SdkError;
use crate::integrations::Integration;

/// Default cap on queued events in the main process.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 30;

/// Queue entries at least this large (in bytes of JSON) are gzip-enveloped.
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 1024;

/// Configuration passed to an entry point's `init`.
#[derive(Clone)]
pub struct SdkOptions {
    /// Where the transport delivers events
    pub dsn: Option<String>,
    /// Application release, e.g. `my-app@1.2.0`
    pub release: Option<String>,
    /// Deployment environment, e.g. `production`
    pub environment: Option<String>,
    /// Log SDK internals at debug level
    pub debug: bool,
    /// Directory holding the main process event queue
    pub cache_dir: Option<PathBuf>,
    /// Maximum queued events before the oldest are dropped
    pub max_queue_size: usize,
    /// Minimum JSON size for compressed queue entries
    pub compression_threshold: usize,
    /// Install the role's default integrations
    pub default_integrations: bool,
    /// Additional integrations; an entry replaces a default with the same name
    pub integrations: Vec<Arc<dyn Integration>>,
}

impl Default for SdkOptions {
    fn default() -> Self {
        Self {
            dsn: None,
            release: None,
            environment: None,
            debug: false,
            cache_dir: None,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            default_integrations: true,
            integrations: Vec::new(),
        }
    }
}

impl fmt::Debug for SdkOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let integrations: Vec<&str> = self.integrations.iter().map(|i| i.name()).collect();
        f.debug_struct("SdkOptions")
            .field("dsn", &self.dsn)
            .field("release", &self.release)
            .field("environment", &self.environment)
            .field("debug", &self.debug)
            .field("cache_dir", &self.cache_dir)
            .field("max_queue_size", &self.max_queue_size)
            .field("compression_threshold", &self.compression_threshold)
            .field("default_integrations", &self.default_integrations)
            .field("integrations", &integrations)
            .finish()
    }
}

impl SdkOptions {
    /// Builds options from `BUGSTR_*` environment variables.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `BUGSTR_DSN` | `dsn` |
    /// | `BUGSTR_RELEASE` | `release` |
    /// | `BUGSTR_ENVIRONMENT` | `environment` |
    /// | `BUGSTR_DEBUG` | `debug` (`1`/`true`/`0`/`false`) |
    /// | `BUGSTR_CACHE_DIR` | `cache_dir` |
    /// | `BUGSTR_MAX_QUEUE_SIZE` | `max_queue_size` |
    pub fn from_env() -> Result<Self, SdkError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SdkError> {
        let mut options = Self::default();
        options.dsn = lookup("BUGSTR_DSN").filter(|s| !s.is_empty());
        options.release = lookup("BUGSTR_RELEASE").filter(|s| !s.is_empty());
        options.environment = lookup("BUGSTR_ENVIRONMENT").filter(|s| !s.is_empty());
        options.cache_dir = lookup("BUGSTR_CACHE_DIR")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        if let Some(debug) = lookup("BUGSTR_DEBUG") {
            options.debug = match debug.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                other => {
                    return Err(SdkError::Config(format!(
                        "BUGSTR_DEBUG must be a boolean, got '{}'",
                        other
                    )))
                }
            };
        }

        if let Some(size) = lookup("BUGSTR_MAX_QUEUE_SIZE") {
            options.max_queue_size = size.trim().parse().map_err(|_| {
                SdkError::Config(format!(
                    "BUGSTR_MAX_QUEUE_SIZE must be a positive integer, got '{}'",
                    size
                ))
            })?;
        }

        Ok(options)
    }

    pub fn with_integration(mut self, integration: impl Integration + 'static) -> Self {
        self.integrations.push(Arc::new(integration));
        self
    }
}

/// Returns a copy of `options` without placeholder integrations.
pub fn remove_empty_integrations(options: &SdkOptions) -> SdkOptions {
    let mut filtered = options.clone();
    filtered.integrations.retain(|integration| !integration.is_empty());
    filtered
}
