use crate::message::Receipt;

/// Errors that can occur during SMS operations
#[derive(Debug, thiserror::Error)]
pub enum SmsError {
    /// The HTTP call itself failed: network, timeout, or a non-2xx answer
    /// whose body could not be decoded.
    #[error("transport error: {0}")]
    Transport(String),
    /// The provider answered but the body encodes a business-level failure.
    #[error("provider rejected request ({code}): {message}")]
    ProviderRejection { code: String, message: String },
    /// Inbound webhook signature did not match.
    #[error("authenticity check failed: {0}")]
    Authenticity(String),
    /// The provider does not know the requested message.
    #[error("message not found: {0}")]
    NotFound(String),
    /// Invalid request parameters or configuration
    #[error("invalid request: {0}")]
    Invalid(String),
    /// A provider payload could not be turned into the canonical shape.
    #[error("decode error: {0}")]
    Decode(String),
    #[error("{provider} does not support {operation}")]
    Unsupported {
        provider: &'static str,
        operation: &'static str,
    },
    /// Some recipients were delivered, others failed.
    #[error("partial delivery: {} delivered, {} failed", delivered.len(), failed.len())]
    PartialDelivery {
        delivered: Vec<Receipt>,
        failed: Vec<(String, SmsError)>,
    },
}

impl SmsError {
    pub fn rejection(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderRejection {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::ProviderRejection { .. })
    }

    /// Status a webhook endpoint should answer with when this error ends a request.
    pub fn http_status(&self) -> HttpStatus {
        match self {
            Self::Authenticity(_) => HttpStatus::Unauthorized,
            Self::NotFound(_) => HttpStatus::NotFound,
            Self::Invalid(_) | Self::Decode(_) => HttpStatus::BadRequest,
            Self::Unsupported { .. } => HttpStatus::NotImplemented,
            Self::Transport(_) | Self::ProviderRejection { .. } | Self::PartialDelivery { .. } => {
                HttpStatus::BadGateway
            }
        }
    }
}

/// A business-level failure reported in a provider response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFault {
    pub code: String,
    pub message: String,
}

impl ProviderFault {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<ProviderFault> for SmsError {
    fn from(fault: ProviderFault) -> Self {
        SmsError::ProviderRejection {
            code: fault.code,
            message: fault.message,
        }
    }
}

/// Web-specific error types for webhook processing
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("provider not found: {0}")]
    ProviderNotFound(String),
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),
    #[error("parsing failed: {0}")]
    ParseError(String),
    #[error("SMS processing error: {0}")]
    SmsError(#[from] SmsError),
}

/// HTTP status code for web responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStatus {
    Ok = 200,
    BadRequest = 400,
    Unauthorized = 401,
    NotFound = 404,
    InternalServerError = 500,
    NotImplemented = 501,
    BadGateway = 502,
}

impl HttpStatus {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_becomes_rejection() {
        let err: SmsError = ProviderFault::new("1", "Bad number").into();
        match err {
            SmsError::ProviderRejection { code, message } => {
                assert_eq!(code, "1");
                assert_eq!(message, "Bad number");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            SmsError::Authenticity("bad".into()).http_status(),
            HttpStatus::Unauthorized
        );
        assert_eq!(
            SmsError::Decode("missing From".into()).http_status().as_u16(),
            400
        );
        assert_eq!(
            SmsError::Unsupported {
                provider: "voxbone",
                operation: "get_message"
            }
            .http_status()
            .as_u16(),
            501
        );
    }

    #[test]
    fn partial_delivery_display_counts() {
        let err = SmsError::PartialDelivery {
            delivered: vec![Receipt::new("+15550001111", "a")],
            failed: vec![("+15550002222".into(), SmsError::rejection("9", "quota"))],
        };
        assert_eq!(err.to_string(), "partial delivery: 1 delivered, 1 failed");
        assert!(!err.is_rejection());
    }
}
