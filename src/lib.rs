//! # smsgate
//!
//! Send and receive SMS through interchangeable gateway providers behind one
//! [`Driver`](sms_core::Driver) contract.
//!
//! ## Features
//!
//! - **Providers**: Twilio, Plivo, Nexmo, Voxbone and CheapGlobalSMS
//! - **Canonical messages**: one `OutgoingMessage`/`IncomingMessage` shape for every provider
//! - **Webhook processing**: framework-agnostic processor with an Axum adapter
//! - **Configuration**: files plus `SMSGATE__*` environment variables
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use smsgate::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     smsgate::logging::init(&config.logging);
//!     let manager = DriverManager::from_config(config)?;
//!
//!     let message = OutgoingMessage::builder()
//!         .to("+15551234567")
//!         .text("Hello from smsgate!")
//!         .build()?;
//!
//!     let report = manager.default()?.send(message).await?;
//!     for receipt in report.receipts {
//!         println!("{} -> {}", receipt.to, receipt.id);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod logging;
pub mod manager;

pub use crate::config::*;
pub use manager::{DriverManager, ManagerError};

/// Common imports for smsgate usage
pub mod prelude {
    pub use crate::config::{
        AppConfig, LoggingConfig, ProvidersConfig, ServerConfig, TransportConfig,
    };
    pub use crate::manager::{DriverManager, ManagerError};
    pub use sms_core::*;
}
