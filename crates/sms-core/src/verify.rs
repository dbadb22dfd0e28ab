//! Webhook authenticity checks.
//!
//! Each scheme recomputes the provider's HMAC over the parts of the request it
//! signs and compares it, in constant time, to the base64 value the provider
//! sent in a header.

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;
use tracing::warn;

use crate::{SmsError, WebhookRequest};

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

pub trait SignatureVerifier: Send + Sync {
    /// Fails with [`SmsError::Authenticity`] unless the request carries a valid signature.
    fn verify(&self, request: &WebhookRequest) -> Result<(), SmsError>;
}

fn provided_signature<'a>(request: &'a WebhookRequest, header: &str) -> Result<Vec<u8>, SmsError> {
    let value = request
        .header(header)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| SmsError::Authenticity(format!("missing {} header", header)))?;
    B64.decode(value.trim())
        .map_err(|e| SmsError::Authenticity(format!("{} is not base64: {}", header, e)))
}

fn check<M: Mac>(mac: M, provided: &[u8], scheme: &str) -> Result<(), SmsError> {
    mac.verify_slice(provided).map_err(|_| {
        warn!("{} signature mismatch", scheme);
        SmsError::Authenticity(format!("{} signature mismatch", scheme))
    })
}

fn sha1_mac(key: &str, data: &[u8]) -> Result<HmacSha1, SmsError> {
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| SmsError::Invalid(format!("invalid HMAC key: {}", e)))?;
    mac.update(data);
    Ok(mac)
}

fn sha256_mac(key: &str, data: &[u8]) -> Result<HmacSha256, SmsError> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| SmsError::Invalid(format!("invalid HMAC key: {}", e)))?;
    mac.update(data);
    Ok(mac)
}

/// HMAC-SHA1 over the URL followed by every parameter as `key + value`,
/// sorted by key (Twilio).
#[derive(Clone)]
pub struct UrlParamsSha1 {
    auth_token: String,
    header: String,
}

impl UrlParamsSha1 {
    pub fn new(auth_token: impl Into<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
            header: "X-Twilio-Signature".into(),
        }
    }

    fn signed_data(request: &WebhookRequest) -> String {
        let mut params: Vec<(&str, &str)> = request.params().collect();
        params.sort();
        params
            .into_iter()
            .fold(request.url().to_string(), |mut acc, (k, v)| {
                acc.push_str(k);
                acc.push_str(v);
                acc
            })
    }

    pub fn sign(&self, request: &WebhookRequest) -> Result<String, SmsError> {
        let mac = sha1_mac(&self.auth_token, Self::signed_data(request).as_bytes())?;
        Ok(B64.encode(mac.finalize().into_bytes()))
    }
}

impl SignatureVerifier for UrlParamsSha1 {
    fn verify(&self, request: &WebhookRequest) -> Result<(), SmsError> {
        let provided = provided_signature(request, &self.header)?;
        let mac = sha1_mac(&self.auth_token, Self::signed_data(request).as_bytes())?;
        check(mac, &provided, "url-params-sha1")
    }
}

/// HMAC-SHA256 over the URL without its query string followed by a
/// header-supplied nonce (Plivo V2).
#[derive(Clone)]
pub struct UrlNonceSha256 {
    auth_token: String,
    signature_header: String,
    nonce_header: String,
}

impl UrlNonceSha256 {
    pub fn new(auth_token: impl Into<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
            signature_header: "X-Plivo-Signature-V2".into(),
            nonce_header: "X-Plivo-Signature-V2-Nonce".into(),
        }
    }

    fn signed_data(&self, request: &WebhookRequest) -> Result<String, SmsError> {
        let nonce = request.header(&self.nonce_header).ok_or_else(|| {
            SmsError::Authenticity(format!("missing {} header", self.nonce_header))
        })?;
        let base = request.url().split('?').next().unwrap_or_default();
        Ok(format!("{}{}", base, nonce))
    }

    pub fn sign(&self, request: &WebhookRequest) -> Result<String, SmsError> {
        let mac = sha256_mac(&self.auth_token, self.signed_data(request)?.as_bytes())?;
        Ok(B64.encode(mac.finalize().into_bytes()))
    }
}

impl SignatureVerifier for UrlNonceSha256 {
    fn verify(&self, request: &WebhookRequest) -> Result<(), SmsError> {
        let provided = provided_signature(request, &self.signature_header)?;
        let mac = sha256_mac(&self.auth_token, self.signed_data(request)?.as_bytes())?;
        check(mac, &provided, "url-nonce-sha256")
    }
}

/// HMAC-SHA256 over the raw request body, signature in a configurable header.
#[derive(Clone)]
pub struct BodySha256 {
    secret: String,
    header: String,
}

impl BodySha256 {
    pub fn new(secret: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            header: header.into(),
        }
    }

    pub const DEFAULT_HEADER: &'static str = "X-Signature";

    /// Build from driver settings: `Ok(None)` when verification is off,
    /// [`SmsError::Invalid`] when it is on without a secret.
    pub fn configured(
        provider: &str,
        verify: bool,
        secret: Option<&str>,
        header: Option<&str>,
    ) -> Result<Option<Self>, SmsError> {
        if !verify {
            return Ok(None);
        }
        let secret = secret.filter(|s| !s.is_empty()).ok_or_else(|| {
            SmsError::Invalid(format!("{provider}: verify is on but no signing_secret is set"))
        })?;
        Ok(Some(Self::new(
            secret,
            header.unwrap_or(Self::DEFAULT_HEADER),
        )))
    }

    pub fn sign(&self, body: &[u8]) -> Result<String, SmsError> {
        let mac = sha256_mac(&self.secret, body)?;
        Ok(B64.encode(mac.finalize().into_bytes()))
    }
}

impl SignatureVerifier for BodySha256 {
    fn verify(&self, request: &WebhookRequest) -> Result<(), SmsError> {
        let provided = provided_signature(request, &self.header)?;
        let mac = sha256_mac(&self.secret, request.body())?;
        check(mac, &provided, "body-sha256")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://mycompany.com/myapp.php?foo=1&bar=2";

    fn twilio_request(signature: &str) -> WebhookRequest {
        WebhookRequest::from_form(
            URL,
            vec![("X-Twilio-Signature".into(), signature.into())],
            "CallSid=CA1234567890ABCDE&Caller=%2B12349013030&Digits=1234&From=%2B12349013030&To=%2B18005551212",
        )
        .unwrap()
    }

    #[test]
    fn url_params_are_sorted_and_concatenated() {
        let req = twilio_request("");
        assert_eq!(
            UrlParamsSha1::signed_data(&req),
            "https://mycompany.com/myapp.php?foo=1&bar=2\
             CallSidCA1234567890ABCDECaller+12349013030Digits1234From+12349013030To+18005551212"
        );
    }

    #[test]
    fn repeated_params_are_all_signed() {
        let req = WebhookRequest::from_form(
            "https://example.com/hook",
            vec![],
            "MediaUrl0=b&Body=hi&MediaUrl0=a",
        )
        .unwrap();
        assert_eq!(
            UrlParamsSha1::signed_data(&req),
            "https://example.com/hookBodyhiMediaUrl0aMediaUrl0b"
        );
    }

    #[test]
    fn url_params_signature_round_trip() {
        let verifier = UrlParamsSha1::new("12345");
        let sig = verifier.sign(&twilio_request("")).unwrap();
        assert!(verifier.verify(&twilio_request(&sig)).is_ok());
        assert!(UrlParamsSha1::new("54321")
            .verify(&twilio_request(&sig))
            .is_err());
    }

    #[test]
    fn tampered_signature_fails() {
        let verifier = UrlParamsSha1::new("12345");
        let req = twilio_request("AAAAAAAAAAAAAAAAAAAAAAAAAAA=");
        assert!(matches!(
            verifier.verify(&req),
            Err(SmsError::Authenticity(_))
        ));
    }

    #[test]
    fn missing_header_fails() {
        let verifier = BodySha256::new("secret", "X-Signature");
        let req = WebhookRequest::from_form("u", vec![], "a=b").unwrap();
        assert!(matches!(
            verifier.verify(&req),
            Err(SmsError::Authenticity(_))
        ));
    }

    #[test]
    fn body_signature_round_trip() {
        let verifier = BodySha256::new("secret", "X-Signature");
        let body = b"msisdn=15550001111&text=hi";
        let sig = verifier.sign(body).unwrap();
        let req =
            WebhookRequest::from_form("u", vec![("x-signature".into(), sig)], body.to_vec()).unwrap();
        assert!(verifier.verify(&req).is_ok());
    }

    #[test]
    fn configured_requires_secret_when_verifying() {
        assert!(BodySha256::configured("nexmo", false, None, None).unwrap().is_none());
        assert!(matches!(
            BodySha256::configured("nexmo", true, None, None),
            Err(SmsError::Invalid(_))
        ));
        let verifier = BodySha256::configured("nexmo", true, Some("s"), None)
            .unwrap()
            .unwrap();
        assert_eq!(verifier.header, "X-Signature");
    }

    #[test]
    fn nonce_signature_ignores_query() {
        let verifier = UrlNonceSha256::new("token");
        let unsigned = WebhookRequest::from_form(
            "https://example.com/sms",
            vec![("X-Plivo-Signature-V2-Nonce".into(), "12345".into())],
            "",
        )
        .unwrap();
        let sig = verifier.sign(&unsigned).unwrap();
        let req = WebhookRequest::from_form(
            "https://example.com/sms?retry=1",
            vec![
                ("X-Plivo-Signature-V2-Nonce".into(), "12345".into()),
                ("X-Plivo-Signature-V2".into(), sig),
            ],
            "",
        )
        .unwrap();
        assert!(verifier.verify(&req).is_ok());
    }
}
