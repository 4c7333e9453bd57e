use std::path::PathBuf;

use clap::Parser;
use kubedeck_core::config::EngineConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "kubedeck", version, about = "Terminal dashboard for Kubernetes resources")]
pub struct Cli {
    /// JSON `List` of Kubernetes objects to browse
    #[arg(long, env = "KUBEDECK_FIXTURE")]
    pub fixture: Option<PathBuf>,

    /// Screen shown at startup, e.g. "pods" or "deployments"
    #[arg(long, env = "KUBEDECK_SCREEN", default_value = "pods")]
    pub screen: String,

    /// Default refresh interval in milliseconds
    #[arg(long = "refresh-ms", env = "KUBEDECK_REFRESH_MS", default_value_t = 2_000)]
    pub refresh_ms: u64,

    /// Known kube contexts (comma separated)
    #[arg(long, env = "KUBEDECK_CONTEXTS", value_delimiter = ',')]
    pub contexts: Vec<String>,

    /// Current kube context
    #[arg(long, env = "KUBEDECK_CONTEXT")]
    pub context: Option<String>,

    /// Write logs here; logging is off without it
    #[arg(long = "log-file", env = "KUBEDECK_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Serve Prometheus metrics on host:port
    #[arg(long = "metrics-addr", env = "KUBEDECK_METRICS_ADDR")]
    pub metrics_addr: Option<String>,
}

impl Cli {
    pub fn engine_config(&self) -> EngineConfig {
        let mut contexts: Vec<String> =
            self.contexts.iter().map(|c| c.trim().to_string()).filter(|c| !c.is_empty()).collect();
        if let Some(ctx) = &self.context {
            if !contexts.contains(ctx) {
                contexts.push(ctx.clone());
            }
        }
        EngineConfig {
            refresh_interval_ms: self.refresh_ms,
            contexts,
            current_context: self.context.clone(),
            ..EngineConfig::default()
        }
    }
}
