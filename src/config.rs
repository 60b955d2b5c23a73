use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Allowed page sizes offered by the page-size selector.
    pub page_sizes: Vec<u64>,
    /// Initial page size for new screens.
    pub default_limit: u64,
    /// Delay before refreshing a relation panel list after a save, to
    /// tolerate backend read-after-write lag. Milliseconds; 0 disables.
    pub refresh_timeout_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            page_sizes: vec![15, 30, 50, 100],
            default_limit: 15,
            refresh_timeout_ms: 0,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from defaults, an optional `admin` config file and
    /// `ADMIN_`-prefixed environment variables.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = config::Config::builder();

        config = config.add_source(config::Config::try_from(&RuntimeConfig::default())?);
        config = config.add_source(config::File::with_name("admin").required(false));
        // No key separator: the struct is flat, so ADMIN_DEFAULT_LIMIT must
        // map to `default_limit`, not a nested `default.limit`.
        config = config.add_source(
            config::Environment::with_prefix("ADMIN").prefix_separator("_"),
        );

        let config = config.build()?;
        let runtime_config: RuntimeConfig = config.try_deserialize()?;

        Ok(runtime_config)
    }
}

/// Initialize logging for binaries and examples. Tests and embedding
/// applications may configure `env_logger` themselves instead.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
