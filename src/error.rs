//! Crate-level error type.

use std::fmt;

use thiserror::Error;

use crate::fs::FsError;
use crate::main_process::EnvelopeError;
use crate::role::ProcessRole;

/// Lifecycle operations that only the main process supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Close,
    Flush,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Close => f.write_str("closed"),
            Operation::Flush => f.write_str("flushed"),
        }
    }
}

/// Errors surfaced by the SDK entry points.
#[derive(Debug, Error)]
pub enum SdkError {
    #[error(
        "Failed to automatically detect correct SDK entry point for the {role} process.

In the main process you should construct the entry point directly:
    bugstr_desktop::MainProcessEntryPoint::new(transport)

In a renderer process you should use:
    main_entry_point.renderer_channel()"
    )]
    EntryPointNotFound { role: ProcessRole },

    #[error("The SDK should be {operation} from the main process")]
    MainProcessOnly { operation: Operation },

    #[error("SDK has not been initialized")]
    NotInitialized,

    #[error("Main process is no longer receiving renderer events")]
    IpcClosed,

    #[error("The main process SDK must be initialized inside a tokio runtime")]
    NoRuntime,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Fs(#[from] FsError),

    #[error("JSON serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_process_only_message() {
        let err = SdkError::MainProcessOnly {
            operation: Operation::Close,
        };
        assert_eq!(err.to_string(), "The SDK should be closed from the main process");

        let err = SdkError::MainProcessOnly {
            operation: Operation::Flush,
        };
        assert_eq!(err.to_string(), "The SDK should be flushed from the main process");
    }

    #[test]
    fn entry_point_not_found_explains_remedy() {
        let msg = SdkError::EntryPointNotFound {
            role: ProcessRole::Renderer,
        }
        .to_string();

        assert!(msg.contains("renderer process"));
        assert!(msg.contains("MainProcessEntryPoint::new"));
        assert!(msg.contains("renderer_channel()"));
    }
}
