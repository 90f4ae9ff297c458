use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

/// Binance USD-M futures testnet
pub const TESTNET_REST_URL: &str = "https://testnet.binancefuture.com";

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub twap: TwapConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub oco: OcoConfig,
    #[serde(default)]
    pub dry_run: DryRunConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    /// REST API endpoint for order execution
    #[serde(default = "default_rest_url")]
    pub rest_url: String,
    /// Signed request validity window in milliseconds
    #[serde(default = "default_recv_window")]
    pub recv_window_ms: u64,
    /// Per-request network timeout in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_rest_url() -> String {
    TESTNET_REST_URL.to_string()
}

fn default_recv_window() -> u64 {
    5000
}

fn default_request_timeout() -> u64 {
    10_000
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            rest_url: default_rest_url(),
            recv_window_ms: default_recv_window(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Total attempts per step for transient failures (first try included)
    #[serde(default = "default_max_retries")]
    pub max_retries: u8,
    /// Fixed pause between transient retries in milliseconds
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

fn default_max_retries() -> u8 {
    3
}

fn default_retry_backoff() -> u64 {
    500
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TwapConfig {
    /// Consecutive failed chunks before the plan is aborted
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
    /// Lot step for chunk sizing when the gateway has no exchange rules
    /// (e.g. 0.001 for BTCUSDT); the exchange LOT_SIZE wins otherwise
    #[serde(default)]
    pub quantity_step: Option<Decimal>,
}

fn default_max_consecutive_failures() -> u32 {
    3
}

impl Default for TwapConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: default_max_consecutive_failures(),
            quantity_step: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    /// Decimal places for level prices when the exchange tick size is unknown
    #[serde(default = "default_price_scale")]
    pub price_scale: u32,
}

fn default_price_scale() -> u32 {
    crate::domain::DEFAULT_PRICE_SCALE
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            price_scale: default_price_scale(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcoConfig {
    /// Seconds between leg status polls
    #[serde(default = "default_oco_poll")]
    pub poll_interval_secs: u64,
}

fn default_oco_poll() -> u64 {
    5
}

impl Default for OcoConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_oco_poll(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DryRunConfig {
    /// Enable dry run mode (no real orders)
    #[serde(default)]
    pub enabled: bool,
    /// Fixed mark price for the paper gateway; live ticker is used when unset
    #[serde(default)]
    pub paper_price: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for the rolling log file
    #[serde(default = "default_log_dir")]
    pub dir: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            dir: default_log_dir(),
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("execution.max_retries", 3)?
            .set_default("twap.max_consecutive_failures", 3)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("BOT_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (BOT_EXCHANGE__REST_URL, etc.)
            .add_source(
                Environment::with_prefix("BOT")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Create a default configuration for CLI usage
    pub fn default_config(dry_run: bool) -> Self {
        Self {
            exchange: ExchangeConfig::default(),
            execution: ExecutionConfig::default(),
            twap: TwapConfig::default(),
            grid: GridConfig::default(),
            oco: OcoConfig::default(),
            dry_run: DryRunConfig {
                enabled: dry_run,
                paper_price: None,
            },
            logging: LoggingConfig::default(),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !self.exchange.rest_url.starts_with("http") {
            errors.push(format!(
                "exchange.rest_url must be an http(s) URL, got '{}'",
                self.exchange.rest_url
            ));
        }

        if self.exchange.recv_window_ms == 0 || self.exchange.recv_window_ms > 60_000 {
            errors.push("exchange.recv_window_ms must be in 1..=60000".to_string());
        }

        if self.exchange.request_timeout_ms == 0 {
            errors.push("exchange.request_timeout_ms must be positive".to_string());
        }

        if self.execution.max_retries == 0 {
            errors.push("execution.max_retries must be at least 1".to_string());
        }

        if self.twap.max_consecutive_failures == 0 {
            errors.push("twap.max_consecutive_failures must be at least 1".to_string());
        }

        if let Some(step) = self.twap.quantity_step {
            if step <= Decimal::ZERO {
                errors.push("twap.quantity_step must be positive".to_string());
            }
        }

        if self.oco.poll_interval_secs == 0 {
            errors.push("oco.poll_interval_secs must be at least 1".to_string());
        }

        if let Some(price) = self.dry_run.paper_price {
            if price <= Decimal::ZERO {
                errors.push("dry_run.paper_price must be positive".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
