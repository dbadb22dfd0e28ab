use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use sms_cheapglobalsms::CheapGlobalSmsConfig;
use sms_core::TransportOptions;
use sms_nexmo::NexmoConfig;
use sms_plivo::PlivoConfig;
use sms_twilio::TwilioConfig;
use sms_voxbone::VoxboneConfig;
use std::env;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Name of the driver used when none is requested explicitly
    pub driver: String,
    /// HTTP transport configuration
    pub transport: TransportConfig,
    /// SMS providers configuration
    pub providers: ProvidersConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Webhook server configuration
    pub server: ServerConfig,
}

/// Timeouts handed to the HTTP transport
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TransportConfig {
    /// Connect timeout in seconds (default: 10)
    pub connect_timeout_seconds: u64,
    /// Whole-request timeout in seconds (default: 30)
    pub request_timeout_seconds: u64,
}

impl TransportConfig {
    pub fn options(&self) -> TransportOptions {
        TransportOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_seconds),
            request_timeout: Duration::from_secs(self.request_timeout_seconds),
        }
    }
}

/// SMS providers configuration. A provider is available only when its section is present.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub twilio: Option<TwilioConfig>,
    #[serde(default)]
    pub plivo: Option<PlivoConfig>,
    #[serde(default)]
    pub nexmo: Option<NexmoConfig>,
    #[serde(default)]
    pub voxbone: Option<VoxboneConfig>,
    #[serde(default)]
    pub cheapglobalsms: Option<CheapGlobalSmsConfig>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level filter, e.g. `info` or `smsgate=debug,sms_core=trace` (default: info)
    pub level: String,
    /// Output format: `json` or `pretty` (default: json)
    pub format: String,
}

/// Server configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Server host (default: 0.0.0.0)
    pub host: String,
    /// Server port (default: 3000)
    pub port: u16,
    /// Base URL providers use to reach this server (default: http://localhost:3000)
    pub public_url: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: 10,
            request_timeout_seconds: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            public_url: "http://localhost:3000".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            driver: "twilio".to_string(),
            transport: TransportConfig::default(),
            providers: ProvidersConfig::default(),
            logging: LoggingConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local configuration file (gitignored)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables, e.g. SMSGATE__PROVIDERS__TWILIO__AUTH_TOKEN
            .add_source(Environment::with_prefix("SMSGATE").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Build configuration from a TOML document layered over the defaults.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
