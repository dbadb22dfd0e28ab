//! # Nexmo SMS Driver
//!
//! Nexmo takes its credentials in the request body, so every call starts from
//! a [`RequestBody`] holding `api_key` and `api_secret` and merges the call's
//! own fields over it. Sends are one `/sms/json` call per recipient. Failures
//! arrive in a 200 body as `messages[0].status != "0"`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sms_core::{
    decode_response, execute, send_each, ApiCall, BodySha256, DispatchPolicy, Driver, Encoding,
    HttpTransport, IncomingMessage, Method, MessageWindow, OutgoingMessage, ProviderFault,
    ProviderResponse, RequestBody, SendReport, SignatureVerifier, SmsError, WebhookRequest,
};
use std::sync::Arc;
use time::macros::format_description;
use time::PrimitiveDateTime;
use tracing::{debug, info, warn};

const PROVIDER: &str = "nexmo";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NexmoConfig {
    pub api_key: String,
    pub api_secret: String,
    #[serde(default)]
    pub from: Option<String>,
    /// Send as `type=unicode`.
    #[serde(default = "default_unicode")]
    pub unicode: bool,
    #[serde(default)]
    pub verify: bool,
    /// Shared secret for the body signature on inbound webhooks.
    #[serde(default)]
    pub signing_secret: Option<String>,
    #[serde(default)]
    pub signature_header: Option<String>,
    /// Filter applied by `check_messages`; the search API rejects unfiltered listings.
    #[serde(default)]
    pub search: Option<SearchFilter>,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Message search filter: every message sent to `to` on `date`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SearchFilter {
    /// `YYYY-MM-DD`
    pub date: String,
    pub to: String,
}

impl SearchFilter {
    pub fn new(date: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            to: to.into(),
        }
    }

    fn validate(&self) -> Result<(), SmsError> {
        if self.date.trim().is_empty() || self.to.trim().is_empty() {
            return Err(SmsError::Invalid(
                "nexmo search filter needs both date and to".into(),
            ));
        }
        Ok(())
    }
}

fn default_unicode() -> bool {
    true
}

impl NexmoConfig {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            from: None,
            unicode: true,
            verify: false,
            signing_secret: None,
            signature_header: None,
            search: None,
            base_url: None,
        }
    }
}

pub struct NexmoDriver {
    credentials: RequestBody,
    from: Option<String>,
    unicode: bool,
    search: Option<SearchFilter>,
    base_url: String,
    verifier: Option<BodySha256>,
    transport: Arc<dyn HttpTransport>,
}

impl NexmoDriver {
    pub fn new(config: NexmoConfig, transport: Arc<dyn HttpTransport>) -> Result<Self, SmsError> {
        if config.api_key.is_empty() || config.api_secret.is_empty() {
            return Err(SmsError::Invalid("nexmo requires api_key and api_secret".into()));
        }
        if let Some(filter) = &config.search {
            filter.validate()?;
        }
        let verifier = BodySha256::configured(
            PROVIDER,
            config.verify,
            config.signing_secret.as_deref(),
            config.signature_header.as_deref(),
        )?;
        Ok(Self {
            credentials: RequestBody::new()
                .with_field("api_key", config.api_key)
                .with_field("api_secret", config.api_secret),
            from: config.from,
            unicode: config.unicode,
            search: config.search,
            base_url: config
                .base_url
                .unwrap_or_else(|| "https://rest.nexmo.com".to_string()),
            verifier,
            transport,
        })
    }

    fn call(&self, path: &str) -> ApiCall {
        ApiCall::new(&self.base_url)
            .call(path)
            .body(self.credentials.clone())
    }

    /// List messages matching `filter`. The search API has no offset
    /// parameter; the window is applied to the returned items.
    pub async fn search(
        &self,
        filter: &SearchFilter,
        window: MessageWindow,
    ) -> Result<Vec<IncomingMessage>, SmsError> {
        filter.validate()?;
        if window.is_empty() {
            return Ok(Vec::new());
        }
        let request = self
            .call("/search/messages")
            .method(Method::Get)
            .encoding(Encoding::Query)
            .with_field("date", &filter.date)
            .with_field("to", &filter.to)
            .build();
        let found: SearchResponse = execute(self.transport.as_ref(), request).await?;
        Ok(found
            .items
            .into_iter()
            .skip(window.start())
            .take(window.len())
            .filter_map(|r| {
                IncomingMessage::try_from(r)
                    .map_err(|e| warn!("skipping nexmo message: {}", e))
                    .ok()
            })
            .collect())
    }

    async fn send_one(&self, from: &str, to: &str, text: &str) -> Result<String, SmsError> {
        let mut call = self
            .call("/sms/json")
            .with_field("from", from)
            .with_field("to", to)
            .with_field("text", text);
        if self.unicode {
            call = call.with_field("type", "unicode");
        }
        let res: SendResponse = execute(self.transport.as_ref(), call.build()).await?;
        res.messages
            .into_iter()
            .next()
            .and_then(|m| m.message_id)
            .ok_or_else(|| SmsError::Decode("nexmo response has no message-id".into()))
    }
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SubmittedMessage>,
}

#[derive(Debug, Deserialize)]
struct SubmittedMessage {
    #[serde(rename = "message-id")]
    message_id: Option<String>,
    status: Option<String>,
    #[serde(rename = "error-text")]
    error_text: Option<String>,
}

impl ProviderResponse for SendResponse {
    fn fault(&self) -> Option<ProviderFault> {
        let first = self.messages.first()?;
        let status = first.status.as_deref()?;
        if status.trim().parse::<i64>().unwrap_or(-1) == 0 {
            return None;
        }
        let message = first
            .error_text
            .clone()
            .unwrap_or_else(|| format!("An error occurred. Nexmo status code: {}", status));
        Some(ProviderFault::new(status, message))
    }
}

/// A record from the Nexmo search API.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NexmoRecord {
    #[serde(rename = "message-id")]
    pub message_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub body: Option<String>,
    #[serde(rename = "date-received")]
    pub date_received: Option<String>,
    #[serde(rename = "error-code")]
    pub error_code: Option<String>,
    #[serde(rename = "error-code-label")]
    pub error_code_label: Option<String>,
}

impl ProviderResponse for NexmoRecord {
    fn fault(&self) -> Option<ProviderFault> {
        search_fault(&self.error_code, &self.error_code_label)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<NexmoRecord>,
    #[serde(rename = "error-code")]
    error_code: Option<String>,
    #[serde(rename = "error-code-label")]
    error_code_label: Option<String>,
}

impl ProviderResponse for SearchResponse {
    fn fault(&self) -> Option<ProviderFault> {
        search_fault(&self.error_code, &self.error_code_label)
    }
}

fn search_fault(code: &Option<String>, label: &Option<String>) -> Option<ProviderFault> {
    let code = code.as_deref().filter(|c| *c != "200")?;
    Some(ProviderFault::new(code, label.clone().unwrap_or_default()))
}

fn parse_time(s: &str) -> Option<time::OffsetDateTime> {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    PrimitiveDateTime::parse(s, format)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

impl TryFrom<NexmoRecord> for IncomingMessage {
    type Error = SmsError;

    fn try_from(r: NexmoRecord) -> Result<Self, Self::Error> {
        let raw = serde_json::to_value(&r).unwrap_or_default();
        let mut builder = IncomingMessage::builder(PROVIDER)
            .timestamp(r.date_received.as_deref().and_then(parse_time))
            .raw(raw);
        if let Some(id) = r.message_id {
            builder = builder.id(id);
        }
        if let Some(from) = r.from {
            builder = builder.from(from);
        }
        if let Some(to) = r.to {
            builder = builder.to(to);
        }
        if let Some(body) = r.body {
            builder = builder.message(body);
        }
        builder.build()
    }
}

#[async_trait]
impl Driver for NexmoDriver {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy::PerRecipient
    }

    async fn send(&self, message: OutgoingMessage) -> Result<SendReport, SmsError> {
        let from = sms_core::sender(&message, self.from.as_deref())?;
        let text = message.compose_message()?;
        let text = text.as_str();
        info!("Sending SMS via Nexmo to {} recipient(s)", message.to().len());
        send_each(PROVIDER, message.to(), |to| self.send_one(from, to, text)).await
    }

    fn receive(&self, request: &WebhookRequest) -> Result<IncomingMessage, SmsError> {
        if let Some(verifier) = &self.verifier {
            verifier.verify(request)?;
        }
        debug!("Parsing Nexmo webhook");
        IncomingMessage::builder(PROVIDER)
            .id(request.require("messageId")?)
            .from(request.require("msisdn")?)
            .to(request.require("to")?)
            .message(request.require("text")?)
            .timestamp(request.get("message-timestamp").and_then(parse_time))
            .raw(request.raw().clone())
            .build()
    }

    /// Searches with the configured [`SearchFilter`].
    async fn check_messages(
        &self,
        window: MessageWindow,
    ) -> Result<Vec<IncomingMessage>, SmsError> {
        let filter = self.search.as_ref().ok_or_else(|| {
            SmsError::Invalid("nexmo message search needs a configured search filter".into())
        })?;
        self.search(filter, window).await
    }

    async fn get_message(&self, id: &str) -> Result<IncomingMessage, SmsError> {
        let request = self
            .call("/search/message")
            .method(Method::Get)
            .encoding(Encoding::Query)
            .with_field("id", id)
            .build();
        let raw = self.transport.execute(request).await?;
        // Unknown ids come back as 404 or as an empty document.
        if raw.status == 404 || raw.body.iter().all(u8::is_ascii_whitespace) {
            return Err(SmsError::NotFound(id.to_string()));
        }
        let record: NexmoRecord = decode_response(&raw)?;
        if record.message_id.is_none() {
            return Err(SmsError::NotFound(id.to_string()));
        }
        record.try_into()
    }
}
