use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sms_core::{
    execute, fetch_one, ApiCall, Auth, DispatchPolicy, Driver, Encoding, HttpTransport,
    IncomingMessage, Method, MessageWindow, OutgoingMessage, ProviderFault, ProviderResponse,
    Receipt, SendReport, SignatureVerifier, SmsError, UrlNonceSha256, WebhookRequest,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

const PROVIDER: &str = "plivo";

/// Plivo driver settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlivoConfig {
    /// Plivo Auth ID (aka account SID).
    pub auth_id: String,
    /// Plivo Auth Token (password for Basic auth, key for webhook signatures).
    pub auth_token: String,
    #[serde(default)]
    pub from: Option<String>,
    /// Validate `X-Plivo-Signature-V2` on inbound webhooks.
    #[serde(default)]
    pub verify: bool,
    /// API base URL; override for testing/mocking.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl PlivoConfig {
    pub fn new<S: Into<String>>(auth_id: S, auth_token: S) -> Self {
        Self {
            auth_id: auth_id.into(),
            auth_token: auth_token.into(),
            from: None,
            verify: false,
            base_url: None,
        }
    }
}

/// Plivo REST driver.
///
/// `send` is a single batch call: every recipient goes into one `dst`
/// joined with `<`, and Plivo accepts or rejects the call as a whole.
pub struct PlivoDriver {
    auth_id: String,
    auth_token: String,
    from: Option<String>,
    base_url: String,
    verifier: Option<UrlNonceSha256>,
    transport: Arc<dyn HttpTransport>,
}

impl PlivoDriver {
    pub fn new(config: PlivoConfig, transport: Arc<dyn HttpTransport>) -> Result<Self, SmsError> {
        if config.auth_id.is_empty() || config.auth_token.is_empty() {
            return Err(SmsError::Invalid("plivo requires auth_id and auth_token".into()));
        }
        Ok(Self {
            verifier: config
                .verify
                .then(|| UrlNonceSha256::new(config.auth_token.clone())),
            auth_id: config.auth_id,
            auth_token: config.auth_token,
            from: config.from,
            base_url: config
                .base_url
                .unwrap_or_else(|| "https://api.plivo.com".to_string()),
            transport,
        })
    }

    fn message_resource(&self, suffix: &str) -> ApiCall {
        ApiCall::new(&self.base_url)
            .call(format!("/v1/Account/{}/Message/{}", self.auth_id, suffix))
            .auth(Auth::basic(&self.auth_id, &self.auth_token))
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct PlivoSendResponse {
    message: Option<String>,
    #[serde(default)]
    message_uuid: Vec<String>,
    api_id: Option<String>,
    error: Option<String>,
}

impl ProviderResponse for PlivoSendResponse {
    fn fault(&self) -> Option<ProviderFault> {
        self.error
            .as_ref()
            .map(|error| ProviderFault::new("error", error.clone()))
    }
}

/// A message record from Plivo's message history.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlivoMessage {
    pub message_uuid: Option<String>,
    pub from_number: Option<String>,
    pub to_number: Option<String>,
    /// Body text; records without it cannot be normalized.
    #[serde(alias = "message_text")]
    pub message_content: Option<String>,
    pub message_time: Option<String>,
    pub error: Option<String>,
}

impl ProviderResponse for PlivoMessage {
    fn fault(&self) -> Option<ProviderFault> {
        self.error
            .as_ref()
            .map(|error| ProviderFault::new("error", error.clone()))
    }
}

impl TryFrom<PlivoMessage> for IncomingMessage {
    type Error = SmsError;

    fn try_from(p: PlivoMessage) -> Result<Self, Self::Error> {
        let raw = serde_json::to_value(&p).unwrap_or_default();
        let ts = p.message_time.as_deref().and_then(parse_time);
        let mut builder = IncomingMessage::builder(PROVIDER).timestamp(ts).raw(raw);
        if let Some(id) = p.message_uuid {
            builder = builder.id(id);
        }
        if let Some(from) = p.from_number {
            builder = builder.from(from);
        }
        if let Some(to) = p.to_number {
            builder = builder.to(to);
        }
        if let Some(text) = p.message_content {
            builder = builder.message(text);
        }
        builder.build()
    }
}

#[derive(Debug, Deserialize)]
struct PlivoMessageList {
    #[serde(default)]
    objects: Vec<PlivoMessage>,
    error: Option<String>,
}

impl ProviderResponse for PlivoMessageList {
    fn fault(&self) -> Option<ProviderFault> {
        self.error
            .as_ref()
            .map(|error| ProviderFault::new("error", error.clone()))
    }
}

fn parse_time(s: &str) -> Option<time::OffsetDateTime> {
    // Plivo uses ISO 8601-like formats; best-effort parse
    time::OffsetDateTime::parse(s, &time::format_description::well_known::Rfc3339).ok()
}

#[async_trait]
impl Driver for PlivoDriver {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy::Batch
    }

    async fn send(&self, message: OutgoingMessage) -> Result<SendReport, SmsError> {
        let src = sms_core::sender(&message, self.from.as_deref())?;
        let request = self
            .message_resource("")
            .encoding(Encoding::Json)
            .with_field("src", src)
            .with_field("dst", message.to().join("<"))
            .with_field("text", message.compose_message()?)
            .build();
        info!("Sending SMS via Plivo to {} recipient(s)", message.to().len());

        let res: PlivoSendResponse = execute(self.transport.as_ref(), request).await?;

        // Plivo returns one uuid per destination, in request order.
        if res.message_uuid.len() != message.to().len() {
            return Err(SmsError::Decode(format!(
                "plivo returned {} message uuid(s) for {} recipient(s)",
                res.message_uuid.len(),
                message.to().len()
            )));
        }
        let receipts = message
            .to()
            .iter()
            .zip(res.message_uuid)
            .map(|(to, uuid)| Receipt::new(to.as_str(), uuid))
            .collect();
        Ok(SendReport {
            provider: PROVIDER,
            receipts,
        })
    }

    fn receive(&self, request: &WebhookRequest) -> Result<IncomingMessage, SmsError> {
        if let Some(verifier) = &self.verifier {
            verifier.verify(request)?;
        }
        debug!("Parsing Plivo webhook");
        // Plivo sends application/x-www-form-urlencoded by default for SMS inbound webhooks.
        IncomingMessage::builder(PROVIDER)
            .id(request.require("MessageUUID")?)
            .from(request.require("From")?)
            .to(request.require("To")?)
            .message(request.require("Text")?)
            .timestamp(request.get("Time").and_then(parse_time))
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
            .message_resource("")
            .method(Method::Get)
            .encoding(Encoding::Query)
            .with_field("offset", window.start().to_string())
            .with_field("limit", window.len().to_string())
            .build();
        let list: PlivoMessageList = execute(self.transport.as_ref(), request).await?;
        Ok(list
            .objects
            .into_iter()
            .take(window.len())
            .filter_map(|m| {
                IncomingMessage::try_from(m)
                    .map_err(|e| warn!("skipping plivo message: {}", e))
                    .ok()
            })
            .collect())
    }

    async fn get_message(&self, id: &str) -> Result<IncomingMessage, SmsError> {
        let request = self
            .message_resource(&format!("{}/", id))
            .method(Method::Get)
            .build();
        let message: PlivoMessage = fetch_one(self.transport.as_ref(), request, id).await?;
        message.try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sms_core::mock::MockTransport;
    use sms_core::RawResponse;

    fn driver(mock: &MockTransport, verify: bool) -> PlivoDriver {
        let mut config = PlivoConfig::new("MA123", "plivo-token");
        config.verify = verify;
        config.base_url = Some("https://plivo.test".into());
        PlivoDriver::new(config, Arc::new(mock.clone())).unwrap()
    }

    #[tokio::test]
    async fn batch_send_is_one_call() {
        let mock = MockTransport::always(RawResponse::json(
            202,
            &json!({
                "message": "message(s) queued",
                "message_uuid": ["uuid-1", "uuid-2"],
                "api_id": "xyz"
            }),
        ));
        let plivo = driver(&mock, false);
        let msg = OutgoingMessage::builder()
            .from("+15557654321")
            .to("+15551230001")
            .to("+15551230002")
            .text("Hello")
            .build()
            .unwrap();

        let report = plivo.send(msg).await.unwrap();
        assert_eq!(report.receipts[1], Receipt::new("+15551230002", "uuid-2"));

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://plivo.test/v1/Account/MA123/Message/");
        assert_eq!(requests[0].body.get("dst"), Some("+15551230001<+15551230002"));
        assert_eq!(requests[0].encoding, Encoding::Json);
    }

    #[tokio::test]
    async fn short_uuid_list_is_a_decode_error() {
        let mock = MockTransport::always(RawResponse::json(
            202,
            &json!({"message": "message(s) queued", "message_uuid": ["uuid-1"], "api_id": "xyz"}),
        ));
        let plivo = driver(&mock, false);
        let msg = OutgoingMessage::builder()
            .from("+15557654321")
            .to_all(["+15551230001", "+15551230002"])
            .text("Hello")
            .build()
            .unwrap();
        assert!(matches!(plivo.send(msg).await, Err(SmsError::Decode(_))));
    }

    #[tokio::test]
    async fn error_field_is_rejection() {
        let mock = MockTransport::always(RawResponse::json(
            400,
            &json!({"api_id": "xyz", "error": "invalid src"}),
        ));
        let plivo = driver(&mock, false);
        let msg = OutgoingMessage::builder()
            .from("bad")
            .to("+1")
            .text("x")
            .build()
            .unwrap();
        assert!(plivo.send(msg).await.unwrap_err().is_rejection());
    }

    #[test]
    fn inbound_conversion() {
        let plivo = driver(&MockTransport::new(), false);
        let req = WebhookRequest::from_form(
            "https://example.com/webhooks/plivo",
            vec![],
            "From=%2B15550001111&To=%2B15550002222&Text=Hello&Type=sms&MessageUUID=uuid-1&Time=2024-12-30T12%3A34%3A56Z",
        )
        .unwrap();
        let msg = plivo.receive(&req).unwrap();
        assert_eq!(msg.from(), "+15550001111");
        assert_eq!(msg.provider(), "plivo");
        assert!(msg.timestamp().is_some());
    }

    #[test]
    fn receive_rejects_bad_signature() {
        let plivo = driver(&MockTransport::new(), true);
        let req = WebhookRequest::from_form(
            "https://example.com/webhooks/plivo",
            vec![
                ("X-Plivo-Signature-V2".into(), "bm9wZQ==".into()),
                ("X-Plivo-Signature-V2-Nonce".into(), "1234".into()),
            ],
            "From=1&To=2&Text=x&MessageUUID=u",
        )
        .unwrap();
        assert!(matches!(plivo.receive(&req), Err(SmsError::Authenticity(_))));
    }

    #[tokio::test]
    async fn history_uses_offset_and_limit() {
        let mock = MockTransport::always(RawResponse::json(
            200,
            &json!({"objects": [{
                "message_uuid": "uuid-7",
                "from_number": "15550001111",
                "to_number": "15550002222",
                "message_content": "hi",
                "message_time": "2024-12-30T12:34:56Z"
            }, {
                "message_uuid": "uuid-8",
                "from_number": "15550001111",
                "to_number": "15550002222"
            }]}),
        ));
        let plivo = driver(&mock, false);
        let messages = plivo
            .check_messages(MessageWindow::new(10, 15).unwrap())
            .await
            .unwrap();
        // The second record has no text and is skipped.
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id(), "uuid-7");

        let req = &mock.requests()[0];
        assert_eq!(req.body.get("offset"), Some("10"));
        assert_eq!(req.body.get("limit"), Some("5"));
    }

    #[tokio::test]
    async fn unknown_uuid_is_not_found() {
        let mock = MockTransport::always(RawResponse::json(404, &json!({"error": "not found"})));
        let plivo = driver(&mock, false);
        assert!(matches!(
            plivo.get_message("nope").await,
            Err(SmsError::NotFound(_))
        ));
    }
}
