//! # Voxbone SMS Driver
//!
//! One JSON `POST /sms/v1/{to}` per recipient, authenticated with HTTP digest
//! auth. Voxbone offers no message history API, so `check_messages` and
//! `get_message` fail with [`SmsError::Unsupported`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sms_core::{
    execute, send_each, ApiCall, Auth, BodySha256, DispatchPolicy, Driver, Encoding,
    HttpTransport, IncomingMessage, MessageWindow, OutgoingMessage, ProviderFault,
    ProviderResponse, SendReport, SignatureVerifier, SmsError, WebhookRequest,
};
use std::sync::Arc;
use tracing::{debug, info};

const PROVIDER: &str = "voxbone";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VoxboneConfig {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub verify: bool,
    #[serde(default)]
    pub signing_secret: Option<String>,
    #[serde(default)]
    pub signature_header: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl VoxboneConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            from: None,
            verify: false,
            signing_secret: None,
            signature_header: None,
            base_url: None,
        }
    }
}

pub struct VoxboneDriver {
    username: String,
    password: String,
    from: Option<String>,
    base_url: String,
    verifier: Option<BodySha256>,
    transport: Arc<dyn HttpTransport>,
}

impl VoxboneDriver {
    pub fn new(config: VoxboneConfig, transport: Arc<dyn HttpTransport>) -> Result<Self, SmsError> {
        if config.username.is_empty() || config.password.is_empty() {
            return Err(SmsError::Invalid("voxbone requires username and password".into()));
        }
        let verifier = BodySha256::configured(
            PROVIDER,
            config.verify,
            config.signing_secret.as_deref(),
            config.signature_header.as_deref(),
        )?;
        Ok(Self {
            username: config.username,
            password: config.password,
            from: config.from,
            base_url: config
                .base_url
                .unwrap_or_else(|| "https://sms.voxbone.com:4443".to_string()),
            verifier,
            transport,
        })
    }

    async fn send_one(&self, from: &str, to: &str, msg: &str) -> Result<String, SmsError> {
        let request = ApiCall::new(&self.base_url)
            .call(format!("/sms/v1/{}", to))
            .encoding(Encoding::Json)
            .auth(Auth::digest(&self.username, &self.password))
            .header("Accept", "application/json")
            .with_field("from", from)
            .with_field("msg", msg)
            .build();
        let res: SendResponse = execute(self.transport.as_ref(), request).await?;
        res.transaction_id
            .ok_or_else(|| SmsError::Decode("voxbone response has no transaction_id".into()))
    }
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    transaction_id: Option<String>,
    status: Option<serde_json::Value>,
    message: Option<String>,
}

impl ProviderResponse for SendResponse {
    fn fault(&self) -> Option<ProviderFault> {
        if self.transaction_id.is_some() {
            return None;
        }
        let message = self.message.clone()?;
        let code = match &self.status {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "error".to_string(),
        };
        Some(ProviderFault::new(code, message))
    }
}

#[async_trait]
impl Driver for VoxboneDriver {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy::PerRecipient
    }

    async fn send(&self, message: OutgoingMessage) -> Result<SendReport, SmsError> {
        let from = sms_core::sender(&message, self.from.as_deref())?;
        let msg = message.compose_message()?;
        let msg = msg.as_str();
        info!("Sending SMS via Voxbone to {} recipient(s)", message.to().len());
        send_each(PROVIDER, message.to(), |to| self.send_one(from, to, msg)).await
    }

    /// Voxbone delivers inbound messages as JSON.
    fn receive(&self, request: &WebhookRequest) -> Result<IncomingMessage, SmsError> {
        if let Some(verifier) = &self.verifier {
            verifier.verify(request)?;
        }
        debug!("Parsing Voxbone webhook");
        IncomingMessage::builder(PROVIDER)
            .id(request.require("uuid")?)
            .from(request.require("from")?)
            .to(request.require("to")?)
            .message(request.require("msg")?)
            .raw(request.raw().clone())
            .build()
    }

    async fn check_messages(
        &self,
        _window: MessageWindow,
    ) -> Result<Vec<IncomingMessage>, SmsError> {
        Err(SmsError::Unsupported {
            provider: PROVIDER,
            operation: "check_messages",
        })
    }

    async fn get_message(&self, _id: &str) -> Result<IncomingMessage, SmsError> {
        Err(SmsError::Unsupported {
            provider: PROVIDER,
            operation: "get_message",
        })
    }
}
