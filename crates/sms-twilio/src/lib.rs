//! # Twilio SMS Driver
//!
//! Sends one `Messages.json` call per recipient (form-encoded, HTTP basic auth
//! with the account SID and auth token), reads message history from the same
//! resource, and validates inbound webhooks with the `X-Twilio-Signature`
//! scheme.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sms_core::{Driver, OutgoingMessage, ReqwestTransport, TransportOptions};
//! use sms_twilio::{TwilioConfig, TwilioDriver};
//!
//! let transport = Arc::new(ReqwestTransport::new(TransportOptions::default())?);
//! let twilio = TwilioDriver::new(TwilioConfig::new("AC...", "token"), transport)?;
//! twilio.send(OutgoingMessage::builder().from("+15557654321").to("+15551234567").text("Hello").build()?).await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sms_core::{
    execute, fetch_one, send_each, ApiCall, Auth, DispatchPolicy, Driver, HttpTransport,
    IncomingMessage, Method, MessageWindow, OutgoingMessage, ProviderFault, ProviderResponse,
    RequestBody, SendReport, SignatureVerifier, SmsError, UrlParamsSha1, WebhookRequest,
};
use std::sync::Arc;
use time::format_description::well_known::Rfc2822;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

const PROVIDER: &str = "twilio";
const API_BASE: &str = "https://api.twilio.com";

/// Twilio driver settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender used when a message has no `from`.
    #[serde(default)]
    pub from: Option<String>,
    /// Validate `X-Twilio-Signature` on inbound webhooks.
    #[serde(default)]
    pub verify: bool,
    /// API base URL; override for testing/mocking.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl TwilioConfig {
    pub fn new(account_sid: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            from: None,
            verify: false,
            base_url: None,
        }
    }
}

pub struct TwilioDriver {
    account_sid: String,
    auth_token: String,
    from: Option<String>,
    base_url: String,
    verifier: Option<UrlParamsSha1>,
    transport: Arc<dyn HttpTransport>,
}

impl TwilioDriver {
    pub fn new(config: TwilioConfig, transport: Arc<dyn HttpTransport>) -> Result<Self, SmsError> {
        if config.account_sid.is_empty() || config.auth_token.is_empty() {
            return Err(SmsError::Invalid(
                "twilio requires account_sid and auth_token".into(),
            ));
        }
        let verifier = config
            .verify
            .then(|| UrlParamsSha1::new(config.auth_token.clone()));
        Ok(Self {
            account_sid: config.account_sid,
            auth_token: config.auth_token,
            from: config.from,
            base_url: config.base_url.unwrap_or_else(|| API_BASE.to_string()),
            verifier,
            transport,
        })
    }

    fn api(&self, path: &str) -> ApiCall {
        ApiCall::new(&self.base_url)
            .call(format!(
                "/2010-04-01/Accounts/{}/{}",
                self.account_sid, path
            ))
            .auth(Auth::basic(&self.account_sid, &self.auth_token))
    }

    async fn send_one(&self, from: &str, to: &str, body: &str) -> Result<String, SmsError> {
        let request = self
            .api("Messages.json")
            .body(
                RequestBody::new()
                    .with_field("To", to)
                    .with_field("From", from)
                    .with_field("Body", body),
            )
            .build();
        let created: TwilioMessage = execute(self.transport.as_ref(), request).await?;
        created
            .sid
            .ok_or_else(|| SmsError::Decode("twilio response has no sid".into()))
    }
}

/// A Twilio Message resource, or a Twilio error document.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TwilioMessage {
    pub sid: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub body: Option<String>,
    pub date_sent: Option<String>,
    pub error_code: Option<i64>,
    pub error_message: Option<String>,
    /// Present on error documents.
    pub code: Option<i64>,
    pub message: Option<String>,
}

/// Only error documents are faults. `error_code` describes the delivery
/// outcome of an existing message and stays on the record.
impl ProviderResponse for TwilioMessage {
    fn fault(&self) -> Option<ProviderFault> {
        self.code.map(|code| {
            ProviderFault::new(code.to_string(), self.message.clone().unwrap_or_default())
        })
    }
}

impl TryFrom<TwilioMessage> for IncomingMessage {
    type Error = SmsError;

    fn try_from(m: TwilioMessage) -> Result<Self, Self::Error> {
        let raw = serde_json::to_value(&m).unwrap_or_default();
        let timestamp = m
            .date_sent
            .as_deref()
            .and_then(|s| OffsetDateTime::parse(s, &Rfc2822).ok());
        let mut builder = IncomingMessage::builder(PROVIDER).timestamp(timestamp).raw(raw);
        if let Some(sid) = m.sid {
            builder = builder.id(sid);
        }
        if let Some(from) = m.from {
            builder = builder.from(from);
        }
        if let Some(to) = m.to {
            builder = builder.to(to);
        }
        if let Some(body) = m.body {
            builder = builder.message(body);
        }
        builder.build()
    }
}

#[derive(Debug, Deserialize)]
struct MessagePage {
    #[serde(default)]
    messages: Vec<TwilioMessage>,
    code: Option<i64>,
    message: Option<String>,
}

impl ProviderResponse for MessagePage {
    fn fault(&self) -> Option<ProviderFault> {
        self.code.map(|code| {
            ProviderFault::new(code.to_string(), self.message.clone().unwrap_or_default())
        })
    }
}

/// Twilio pages by number, so a window maps onto one page when it is
/// aligned to its own size; otherwise the first `end` records are fetched
/// and the leading `start` dropped.
fn page_for(window: MessageWindow) -> (usize, usize, usize) {
    let len = window.len();
    if window.start() % len == 0 {
        (len, window.start() / len, 0)
    } else {
        (window.end(), 0, window.start())
    }
}

#[async_trait]
impl Driver for TwilioDriver {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy::PerRecipient
    }

    async fn send(&self, message: OutgoingMessage) -> Result<SendReport, SmsError> {
        let from = sms_core::sender(&message, self.from.as_deref())?;
        let body = message.compose_message()?;
        let body = body.as_str();
        info!("Sending SMS via Twilio to {} recipient(s)", message.to().len());
        send_each(PROVIDER, message.to(), |to| self.send_one(from, to, body)).await
    }

    fn receive(&self, request: &WebhookRequest) -> Result<IncomingMessage, SmsError> {
        if let Some(verifier) = &self.verifier {
            verifier.verify(request)?;
        }
        debug!("Parsing Twilio webhook");
        IncomingMessage::builder(PROVIDER)
            .id(request.require("MessageSid")?)
            .from(request.require("From")?)
            .to(request.require("To")?)
            .message(request.require("Body")?)
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
        let (page_size, page, skip) = page_for(window);
        let request = self
            .api("Messages.json")
            .method(Method::Get)
            .encoding(sms_core::Encoding::Query)
            .with_field("PageSize", page_size.to_string())
            .with_field("Page", page.to_string())
            .build();
        let listing: MessagePage = execute(self.transport.as_ref(), request).await?;

        Ok(listing
            .messages
            .into_iter()
            .skip(skip)
            .take(window.len())
            .filter_map(|m| match IncomingMessage::try_from(m) {
                Ok(msg) => Some(msg),
                Err(e) => {
                    warn!("skipping twilio message: {}", e);
                    None
                }
            })
            .collect())
    }

    async fn get_message(&self, id: &str) -> Result<IncomingMessage, SmsError> {
        let request = self
            .api(&format!("Messages/{}.json", id))
            .method(Method::Get)
            .build();
        let message: TwilioMessage = fetch_one(self.transport.as_ref(), request, id).await?;
        message.try_into()
    }
}
