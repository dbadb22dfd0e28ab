use indexmap::IndexMap;
use serde_json::Value;

use crate::{Headers, SmsError};

/// An inbound provider callback: the URL it was delivered to, its headers,
/// the raw body, and the body decoded into key/value parameters.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    url: String,
    headers: Headers,
    body: Vec<u8>,
    /// Every decoded pair in body order, repeated keys included.
    pairs: Vec<(String, String)>,
    /// Lookup view over `pairs`; the last value of a repeated key wins.
    params: IndexMap<String, String>,
    raw: Value,
}

impl WebhookRequest {
    /// Decode an `application/x-www-form-urlencoded` body.
    pub fn from_form(
        url: impl Into<String>,
        headers: Headers,
        body: impl Into<Vec<u8>>,
    ) -> Result<Self, SmsError> {
        let body = body.into();
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(&body)
            .map_err(|e| SmsError::Invalid(format!("form decode: {}", e)))?;
        let params: IndexMap<String, String> = pairs.iter().cloned().collect();
        let raw = Value::Object(
            params
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        );
        Ok(Self {
            url: url.into(),
            headers,
            body,
            pairs,
            params,
            raw,
        })
    }

    /// Decode a JSON object body; top-level scalars become parameters.
    pub fn from_json(
        url: impl Into<String>,
        headers: Headers,
        body: impl Into<Vec<u8>>,
    ) -> Result<Self, SmsError> {
        let body = body.into();
        let raw: Value = serde_json::from_slice(&body)
            .map_err(|e| SmsError::Invalid(format!("json decode: {}", e)))?;
        let object = raw
            .as_object()
            .ok_or_else(|| SmsError::Invalid("webhook body is not a JSON object".into()))?;
        let params: IndexMap<String, String> = object
            .iter()
            .filter_map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => return None,
                };
                Some((k.clone(), value))
            })
            .collect();
        let pairs = params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(Self {
            url: url.into(),
            headers,
            body,
            pairs,
            params,
            raw,
        })
    }

    /// Pick the decoder from the `content-type` header; form encoding is the default.
    pub fn from_parts(
        url: impl Into<String>,
        headers: Headers,
        body: impl Into<Vec<u8>>,
    ) -> Result<Self, SmsError> {
        let is_json = headers.iter().any(|(k, v)| {
            k.eq_ignore_ascii_case("content-type") && v.to_ascii_lowercase().contains("json")
        });
        if is_json {
            Self::from_json(url, headers, body)
        } else {
            Self::from_form(url, headers, body)
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Like [`get`](Self::get), failing with [`SmsError::Decode`] when absent.
    pub fn require(&self, key: &str) -> Result<&str, SmsError> {
        self.get(key)
            .ok_or_else(|| SmsError::Decode(format!("webhook is missing `{}`", key)))
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Every decoded parameter in body order, including each value of a
    /// repeated key. Signature schemes that cover all parameters use this.
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The decoded payload, kept for [`IncomingMessage::raw`](crate::IncomingMessage::raw).
    pub fn raw(&self) -> &Value {
        &self.raw
    }
}
