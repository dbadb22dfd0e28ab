use crate::config::AppConfig;
use sms_cheapglobalsms::CheapGlobalSmsDriver;
use sms_core::{Driver, DriverRegistry, HttpTransport, SmsError};
use sms_nexmo::NexmoDriver;
use sms_plivo::PlivoDriver;
use sms_twilio::TwilioDriver;
use sms_voxbone::VoxboneDriver;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, info};

/// Every driver name the manager knows how to build.
pub const DRIVERS: [&str; 5] = ["twilio", "plivo", "nexmo", "voxbone", "cheapglobalsms"];

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("unknown driver: {0}")]
    UnknownDriver(String),
    #[error("driver {0} has no configuration section")]
    NotConfigured(String),
    #[error("driver construction failed: {0}")]
    Driver(#[from] SmsError),
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Resolves driver names to constructed drivers, building each at most once.
pub struct DriverManager {
    config: AppConfig,
    transport: Arc<dyn HttpTransport>,
    default_driver: RwLock<String>,
    drivers: RwLock<HashMap<String, Arc<dyn Driver>>>,
}

impl DriverManager {
    pub fn new(config: AppConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let default_driver = RwLock::new(config.driver.to_ascii_lowercase());
        Self {
            config,
            transport,
            default_driver,
            drivers: RwLock::new(HashMap::new()),
        }
    }

    /// Build a manager that talks to providers over reqwest with the configured timeouts.
    pub fn from_config(config: AppConfig) -> Result<Self, ManagerError> {
        let transport = sms_core::ReqwestTransport::new(config.transport.options())?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn default_driver(&self) -> String {
        self.default_driver
            .read()
            .map(|name| name.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn set_default_driver(&self, name: &str) {
        let name = name.to_ascii_lowercase();
        info!("default SMS driver set to {}", name);
        match self.default_driver.write() {
            Ok(mut current) => *current = name,
            Err(poisoned) => *poisoned.into_inner() = name,
        }
    }

    /// The driver registered under `name` (case-insensitive).
    pub fn driver(&self, name: &str) -> Result<Arc<dyn Driver>, ManagerError> {
        let name = name.to_ascii_lowercase();
        if let Some(driver) = self.cached(&name) {
            return Ok(driver);
        }

        let driver = self.build(&name)?;
        debug!("constructed {} driver", name);
        let mut drivers = self
            .drivers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // A concurrent caller may have built it first; keep the one already cached.
        let driver = drivers.entry(name).or_insert(driver).clone();
        Ok(driver)
    }

    pub fn default(&self) -> Result<Arc<dyn Driver>, ManagerError> {
        self.driver(&self.default_driver())
    }

    /// Registry of every configured driver, for the webhook layer.
    pub fn registry(&self) -> Result<DriverRegistry, ManagerError> {
        let mut registry = DriverRegistry::new();
        for name in DRIVERS {
            match self.driver(name) {
                Ok(driver) => registry = registry.with(driver),
                Err(ManagerError::NotConfigured(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(registry)
    }

    fn cached(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.drivers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
    }

    fn build(&self, name: &str) -> Result<Arc<dyn Driver>, ManagerError> {
        let providers = &self.config.providers;
        let transport = self.transport.clone();
        let missing = || ManagerError::NotConfigured(name.to_string());
        let driver: Arc<dyn Driver> = match name {
            "twilio" => {
                let config = providers.twilio.clone().ok_or_else(missing)?;
                Arc::new(TwilioDriver::new(config, transport)?)
            }
            "plivo" => {
                let config = providers.plivo.clone().ok_or_else(missing)?;
                Arc::new(PlivoDriver::new(config, transport)?)
            }
            "nexmo" => {
                let config = providers.nexmo.clone().ok_or_else(missing)?;
                Arc::new(NexmoDriver::new(config, transport)?)
            }
            "voxbone" => {
                let config = providers.voxbone.clone().ok_or_else(missing)?;
                Arc::new(VoxboneDriver::new(config, transport)?)
            }
            "cheapglobalsms" => {
                let config = providers.cheapglobalsms.clone().ok_or_else(missing)?;
                Arc::new(CheapGlobalSmsDriver::new(config, transport)?)
            }
            other => return Err(ManagerError::UnknownDriver(other.to_string())),
        };
        Ok(driver)
    }
}
