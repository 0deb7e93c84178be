use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    /// API key for the places provider. Redacted in `Debug`.
    pub places_api_key: String,
    /// Directory holding one checkpoint file per run key.
    pub checkpoint_dir: PathBuf,
    /// Directory the export collaborator writes result files into.
    pub export_dir: PathBuf,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Minimum wall-clock spacing between provider calls within one run.
    pub min_call_interval_ms: u64,
    /// Extra spacing between grid points, layered on top of the call pacer.
    pub inter_point_delay_ms: u64,
    /// Cap on accumulated results per grid point across pagination.
    pub max_results_per_point: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("places_api_key", &"[redacted]")
            .field("checkpoint_dir", &self.checkpoint_dir)
            .field("export_dir", &self.export_dir)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("min_call_interval_ms", &self.min_call_interval_ms)
            .field("inter_point_delay_ms", &self.inter_point_delay_ms)
            .field("max_results_per_point", &self.max_results_per_point)
            .finish()
    }
}
