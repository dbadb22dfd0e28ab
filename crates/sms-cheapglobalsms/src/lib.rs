//! # CheapGlobalSMS Driver
//!
//! Everything goes through `GET /api_v1` with the sub-account credentials and
//! an `action` in the query string. A send is a single batch call with the
//! recipients comma-joined; the provider answers with one batch id.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sms_core::{
    execute, fetch_one, ApiCall, BodySha256, DispatchPolicy, Driver, Encoding, HttpTransport,
    IncomingMessage, Method, MessageWindow, OutgoingMessage, ProviderFault, ProviderResponse,
    Receipt, RequestBody, SendReport, SignatureVerifier, SmsError, WebhookRequest,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

const PROVIDER: &str = "cheapglobalsms";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheapGlobalSmsConfig {
    pub sub_account: String,
    pub sub_account_pass: String,
    /// Default `sender_id` when a message has no `from`.
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub verify: bool,
    #[serde(default)]
    pub signing_secret: Option<String>,
    #[serde(default)]
    pub signature_header: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl CheapGlobalSmsConfig {
    pub fn new(sub_account: impl Into<String>, sub_account_pass: impl Into<String>) -> Self {
        Self {
            sub_account: sub_account.into(),
            sub_account_pass: sub_account_pass.into(),
            sender_id: None,
            verify: false,
            signing_secret: None,
            signature_header: None,
            base_url: None,
        }
    }
}

pub struct CheapGlobalSmsDriver {
    credentials: RequestBody,
    sender_id: Option<String>,
    base_url: String,
    verifier: Option<BodySha256>,
    transport: Arc<dyn HttpTransport>,
}

impl CheapGlobalSmsDriver {
    pub fn new(
        config: CheapGlobalSmsConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, SmsError> {
        if config.sub_account.is_empty() || config.sub_account_pass.is_empty() {
            return Err(SmsError::Invalid(
                "cheapglobalsms requires sub_account and sub_account_pass".into(),
            ));
        }
        let verifier = BodySha256::configured(
            PROVIDER,
            config.verify,
            config.signing_secret.as_deref(),
            config.signature_header.as_deref(),
        )?;
        Ok(Self {
            credentials: RequestBody::new()
                .with_field("sub_account", config.sub_account)
                .with_field("sub_account_pass", config.sub_account_pass),
            sender_id: config.sender_id,
            base_url: config
                .base_url
                .unwrap_or_else(|| "http://cheapglobalsms.com".to_string()),
            verifier,
            transport,
        })
    }

    fn action(&self, action: &str) -> ApiCall {
        ApiCall::new(&self.base_url)
            .call("/api_v1")
            .method(Method::Get)
            .encoding(Encoding::Query)
            .body(self.credentials.clone())
            .with_field("action", action)
    }
}

/// Answers carry either a result or an `error` string.
#[derive(Debug, Deserialize)]
struct SendResponse {
    batch_id: Option<serde_json::Value>,
    error: Option<String>,
}

impl ProviderResponse for SendResponse {
    fn fault(&self) -> Option<ProviderFault> {
        self.error
            .as_ref()
            .map(|e| ProviderFault::new("error", e.clone()))
    }
}

/// A received message record.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheapGlobalSmsMessage {
    pub id: Option<serde_json::Value>,
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReadResponse {
    #[serde(default)]
    messages: Vec<CheapGlobalSmsMessage>,
    error: Option<String>,
}

impl ProviderResponse for ReadResponse {
    fn fault(&self) -> Option<ProviderFault> {
        self.error
            .as_ref()
            .map(|e| ProviderFault::new("error", e.clone()))
    }
}

fn scalar_to_string(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl TryFrom<CheapGlobalSmsMessage> for IncomingMessage {
    type Error = SmsError;

    fn try_from(m: CheapGlobalSmsMessage) -> Result<Self, Self::Error> {
        let raw = serde_json::to_value(&m).unwrap_or_default();
        let mut builder = IncomingMessage::builder(PROVIDER).raw(raw);
        if let Some(id) = m.id.as_ref().and_then(scalar_to_string) {
            builder = builder.id(id);
        }
        if let Some(sender) = m.sender {
            builder = builder.from(sender);
        }
        if let Some(recipient) = m.recipient {
            builder = builder.to(recipient);
        }
        if let Some(message) = m.message {
            builder = builder.message(message);
        }
        builder.build()
    }
}

#[async_trait]
impl Driver for CheapGlobalSmsDriver {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy::Batch
    }

    async fn send(&self, message: OutgoingMessage) -> Result<SendReport, SmsError> {
        let sender_id = sms_core::sender(&message, self.sender_id.as_deref())?;
        let request = self
            .action("send_sms")
            .with_field("sender_id", sender_id)
            .with_field("recipients", message.to().join(","))
            .with_field("message", message.compose_message()?)
            .build();
        info!(
            "Sending SMS via CheapGlobalSMS to {} recipient(s)",
            message.to().len()
        );

        let res: SendResponse = execute(self.transport.as_ref(), request).await?;
        let batch_id = res
            .batch_id
            .as_ref()
            .and_then(scalar_to_string)
            .ok_or_else(|| SmsError::Decode("cheapglobalsms response has no batch_id".into()))?;
        Ok(SendReport {
            provider: PROVIDER,
            receipts: message
                .to()
                .iter()
                .map(|to| Receipt::new(to.as_str(), batch_id.clone()))
                .collect(),
        })
    }

    fn receive(&self, request: &WebhookRequest) -> Result<IncomingMessage, SmsError> {
        if let Some(verifier) = &self.verifier {
            verifier.verify(request)?;
        }
        debug!("Parsing CheapGlobalSMS webhook");
        IncomingMessage::builder(PROVIDER)
            .id(request.require("id")?)
            .from(request.require("sender")?)
            .to(request.require("recipient")?)
            .message(request.require("message")?)
            .raw(request.raw().clone())
            .build()
    }

    async fn check_messages(
        &self,
        window: MessageWindow,
    ) -> Result<Vec<IncomingMessage>, SmsError> {
        if window.is_empty() {
            return Ok(Vec::new());
        }
        let request = self
            .action("read_sms")
            .with_field("offset", window.start().to_string())
            .with_field("limit", window.len().to_string())
            .build();
        let read: ReadResponse = execute(self.transport.as_ref(), request).await?;
        Ok(read
            .messages
            .into_iter()
            .take(window.len())
            .filter_map(|m| {
                IncomingMessage::try_from(m)
                    .map_err(|e| warn!("skipping cheapglobalsms message: {}", e))
                    .ok()
            })
            .collect())
    }

    async fn get_message(&self, id: &str) -> Result<IncomingMessage, SmsError> {
        let request = self.action("read_sms").with_field("message_id", id).build();
        let read: ReadResponse = fetch_one(self.transport.as_ref(), request, id).await?;
        // Unknown ids come back as 404 or as an empty list.
        read.messages
            .into_iter()
            .next()
            .ok_or_else(|| SmsError::NotFound(id.to_string()))?
            .try_into()
    }
}
