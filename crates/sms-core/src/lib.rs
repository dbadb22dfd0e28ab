//! # SMS Core
//!
//! Core traits and types for the smsgate multi-provider SMS facade.
//!
//! This crate provides the fundamental building blocks every provider adapter is made of:
//! - [`Driver`] trait: `send`, `receive`, `check_messages`, `get_message`
//! - [`OutgoingMessage`] / [`IncomingMessage`], the canonical message shapes
//! - [`ApiCall`] and [`RequestBody`] for building provider calls
//! - [`ProviderResponse`] and [`execute`] for typed response decoding and fault detection
//! - [`SignatureVerifier`] schemes for inbound webhook authenticity
//! - [`HttpTransport`], the HTTP boundary, with a reqwest implementation
//!
//! ## Example
//!
//! ```rust,ignore
//! use sms_core::{Driver, OutgoingMessage};
//!
//! let message = OutgoingMessage::builder()
//!     .from("+15557654321")
//!     .to("+15551234567")
//!     .text("Hello")
//!     .build()?;
//! let report = driver.send(message).await?;
//! ```

mod driver;
mod error;
mod fanout;
mod message;
mod request;
mod response;
mod transport;
mod verify;
mod webhook;

#[cfg(feature = "reqwest")]
mod digest_auth;
#[cfg(any(test, feature = "testkit"))]
pub mod mock;

pub use driver::{DispatchPolicy, Driver, DriverRegistry};
pub use error::{HttpStatus, ProviderFault, SmsError, WebhookError};
pub use fanout::send_each;
pub use message::{
    IncomingMessage, IncomingMessageBuilder, MessageBody, MessageWindow, OutgoingMessage,
    OutgoingMessageBuilder, Receipt, SendReport,
};
pub use request::{ApiCall, Auth, Encoding, HttpRequest, Method, RequestBody};
pub use response::{decode_response, execute, fetch_one, ProviderResponse};
pub use transport::{HttpTransport, RawResponse, TransportOptions};
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
pub use verify::{BodySha256, SignatureVerifier, UrlNonceSha256, UrlParamsSha1};
pub use webhook::WebhookRequest;

use serde::Serialize;

/// Lightweight header representation to avoid tying the core to any HTTP framework.
pub type Headers = Vec<(String, String)>;

/// Generic webhook response that can be converted to any framework's response type
#[derive(Debug, Clone)]
pub struct WebhookResponse {
    pub status: HttpStatus,
    pub body: String,
    pub content_type: String,
}

impl WebhookResponse {
    pub fn success(message: &IncomingMessage) -> Self {
        Self {
            status: HttpStatus::Ok,
            body: serde_json::to_string(message).unwrap_or_else(|_| "{}".to_string()),
            content_type: "application/json".to_string(),
        }
    }

    pub fn error(status: HttpStatus, message: &str) -> Self {
        #[derive(Serialize)]
        struct ErrorBody<'a> {
            error: &'a str,
        }
        Self {
            status,
            body: serde_json::to_string(&ErrorBody { error: message })
                .unwrap_or_else(|_| r#"{"error":"unknown"}"#.to_string()),
            content_type: "application/json".to_string(),
        }
    }
}

/// The message's `from`, or the adapter's configured default sender.
pub fn sender<'a>(message: &'a OutgoingMessage, default: Option<&'a str>) -> Result<&'a str, SmsError> {
    message
        .from()
        .or(default)
        .ok_or_else(|| SmsError::Invalid("no sender: message has no `from` and no default is configured".into()))
}
