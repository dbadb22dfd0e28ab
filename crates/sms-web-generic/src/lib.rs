use sms_core::{
    DriverRegistry, Headers, HttpStatus, IncomingMessage, SmsError, WebhookError,
    WebhookRequest, WebhookResponse,
};
use tracing::{info, warn};

/// Framework-agnostic webhook processor that hands inbound callbacks to the
/// matching driver's `receive`.
#[derive(Clone)]
pub struct WebhookProcessor {
    registry: DriverRegistry,
}

impl WebhookProcessor {
    pub fn new(registry: DriverRegistry) -> Self {
        Self { registry }
    }

    /// Process an incoming webhook request and return a framework-agnostic response.
    ///
    /// `url` is the public URL the provider called; signature schemes that
    /// sign the URL need it exactly as the provider saw it.
    pub fn process_webhook(
        &self,
        provider: &str,
        url: &str,
        headers: Headers,
        body: &[u8],
    ) -> WebhookResponse {
        match self.process_webhook_internal(provider, url, headers, body) {
            Ok(message) => {
                info!("{} webhook accepted message {}", provider, message.id());
                WebhookResponse::success(&message)
            }
            Err(e) => {
                warn!("{} webhook rejected: {}", provider, e);
                self.error_to_response(e)
            }
        }
    }

    fn process_webhook_internal(
        &self,
        provider: &str,
        url: &str,
        headers: Headers,
        body: &[u8],
    ) -> Result<IncomingMessage, WebhookError> {
        let driver = self
            .registry
            .get(provider)
            .ok_or_else(|| WebhookError::ProviderNotFound(provider.to_string()))?;

        let request = WebhookRequest::from_parts(url, headers, body.to_vec())
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;

        driver.receive(&request).map_err(|e| match e {
            SmsError::Authenticity(msg) => WebhookError::VerificationFailed(msg),
            SmsError::Decode(msg) | SmsError::Invalid(msg) => WebhookError::ParseError(msg),
            other => WebhookError::SmsError(other),
        })
    }

    fn error_to_response(&self, error: WebhookError) -> WebhookResponse {
        match error {
            WebhookError::ProviderNotFound(_) => {
                WebhookResponse::error(HttpStatus::NotFound, "unknown provider")
            }
            WebhookError::VerificationFailed(msg) => WebhookResponse::error(
                HttpStatus::Unauthorized,
                &format!("verification failed: {}", msg),
            ),
            WebhookError::ParseError(msg) => {
                WebhookResponse::error(HttpStatus::BadRequest, &format!("parse error: {}", msg))
            }
            WebhookError::SmsError(e) => {
                WebhookResponse::error(e.http_status(), &format!("SMS error: {}", e))
            }
        }
    }
}

/// Helper trait for framework adapters to convert headers
pub trait HeaderConverter {
    type HeaderType;

    fn to_generic_headers(headers: &Self::HeaderType) -> Headers;
}

/// Helper trait for framework adapters to convert responses
pub trait ResponseConverter {
    type ResponseType;

    fn from_webhook_response(response: WebhookResponse) -> Self::ResponseType;
}
