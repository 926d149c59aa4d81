//! Process role detection.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Environment variable the host runtime sets to announce the process type.
pub const PROCESS_TYPE_ENV: &str = "BUGSTR_PROCESS_TYPE";

/// Which side of a multi-process desktop application this process is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessRole {
    /// The coordinating process (reported by the runtime as `browser`).
    Main,
    /// A rendering process, and the fallback when no type is reported.
    Renderer,
}

impl ProcessRole {
    /// Maps a runtime process type string to a role.
    pub fn from_process_type(process_type: &str) -> Self {
        match process_type.trim().to_lowercase().as_str() {
            "browser" | "main" => ProcessRole::Main,
            _ => ProcessRole::Renderer,
        }
    }

    /// Reads the role of the current process from [`PROCESS_TYPE_ENV`].
    pub fn detect() -> Self {
        std::env::var(PROCESS_TYPE_ENV)
            .map(|value| Self::from_process_type(&value))
            .unwrap_or(ProcessRole::Renderer)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessRole::Main => "main",
            ProcessRole::Renderer => "renderer",
        }
    }
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_is_main() {
        assert_eq!(ProcessRole::from_process_type("browser"), ProcessRole::Main);
        assert_eq!(ProcessRole::from_process_type(" Main "), ProcessRole::Main);
    }

    #[test]
    fn everything_else_is_renderer() {
        assert_eq!(ProcessRole::from_process_type("renderer"), ProcessRole::Renderer);
        assert_eq!(ProcessRole::from_process_type("worker"), ProcessRole::Renderer);
        assert_eq!(ProcessRole::from_process_type(""), ProcessRole::Renderer);
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ProcessRole::Main).unwrap(), "\"main\"");
        assert_eq!(ProcessRole::Renderer.to_string(), "renderer");
    }
}
