//! Typed decoding of provider answers.
//!
//! Every adapter declares the shape of its provider's response body and how
//! that shape reports a failure ([`ProviderResponse::fault`]). The helpers
//! here are the only way an adapter turns a [`RawResponse`] into success, so
//! the fault check runs on every body.

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::{HttpRequest, HttpTransport, ProviderFault, RawResponse, SmsError};

pub trait ProviderResponse: DeserializeOwned {
    /// `Some` when the decoded body encodes a business-level failure.
    fn fault(&self) -> Option<ProviderFault>;
}

/// Decode `raw` as `R` and surface any fault it carries.
///
/// A non-2xx answer that does not decode is a transport failure; one that
/// decodes without naming a fault is rejected with the HTTP status as code.
pub fn decode_response<R: ProviderResponse>(raw: &RawResponse) -> Result<R, SmsError> {
    match serde_json::from_slice::<R>(&raw.body) {
        Ok(decoded) => {
            if let Some(fault) = decoded.fault() {
                warn!("provider fault {}: {}", fault.code, fault.message);
                return Err(fault.into());
            }
            if !raw.is_success() {
                return Err(SmsError::rejection(raw.status.to_string(), raw.text()));
            }
            Ok(decoded)
        }
        Err(e) if raw.is_success() => Err(SmsError::Decode(format!(
            "unexpected response body: {}",
            e
        ))),
        Err(_) => Err(SmsError::Transport(format!(
            "HTTP {}: {}",
            raw.status,
            raw.text()
        ))),
    }
}

/// Perform `request` and decode the answer.
pub async fn execute<R: ProviderResponse>(
    transport: &dyn HttpTransport,
    request: HttpRequest,
) -> Result<R, SmsError> {
    let raw = transport.execute(request).await?;
    decode_response(&raw)
}

/// Like [`execute`], for lookups of a single record: a 404 becomes
/// [`SmsError::NotFound`] naming `id`.
pub async fn fetch_one<R: ProviderResponse>(
    transport: &dyn HttpTransport,
    request: HttpRequest,
    id: &str,
) -> Result<R, SmsError> {
    let raw = transport.execute(request).await?;
    if raw.status == 404 {
        return Err(SmsError::NotFound(id.to_string()));
    }
    decode_response(&raw)
}
