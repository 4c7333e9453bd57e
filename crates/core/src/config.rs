//! Process-wide engine settings, built once at startup and shared by every screen.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Poll interval for screens whose refresh policy does not set one.
    pub refresh_interval_ms: u64,
    /// Characters reserved per declared column for cell padding.
    pub column_padding: u16,
    /// Width assumed for columns that declare neither a minimum nor a fixed width.
    pub default_column_width: u16,
    /// How long a status line stays visible.
    pub status_ttl_ms: u64,
    /// Rows moved by page up/down.
    pub page_size: usize,
    /// Known kube contexts, listed by the contexts screen.
    pub contexts: Vec<String>,
    pub current_context: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 2_000,
            column_padding: 2,
            default_column_width: 20,
            status_ttl_ms: 4_000,
            page_size: 20,
            contexts: Vec::new(),
            current_context: None,
        }
    }
}

impl EngineConfig {
    pub fn refresh_interval(&self) -> Duration { Duration::from_millis(self.refresh_interval_ms.max(1)) }
    pub fn status_ttl(&self) -> Duration { Duration::from_millis(self.status_ttl_ms) }
}
