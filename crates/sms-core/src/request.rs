//! Request building shared by the REST adapters.
//!
//! An adapter starts every call from a fresh [`ApiCall`] seeded with its
//! credential fields, records the endpoint with [`ApiCall::call`], merges the
//! message fields with [`ApiCall::body`], and hands the finished
//! [`HttpRequest`] to an [`HttpTransport`](crate::HttpTransport).

use indexmap::IndexMap;
use std::fmt;

use crate::{Headers, SmsError};

/// Ordered request parameters. Later writes replace earlier values for the
/// same key but keep the key's original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestBody {
    fields: IndexMap<String, String>,
}

impl RequestBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Union with `other`; `other` wins on collisions.
    pub fn extend(&mut self, other: RequestBody) {
        self.fields.extend(other.fields);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn to_form(&self) -> Result<String, SmsError> {
        let pairs: Vec<(&str, &str)> = self.iter().collect();
        serde_urlencoded::to_string(pairs)
            .map_err(|e| SmsError::Invalid(format!("form encode: {}", e)))
    }

    pub fn to_json(&self) -> Result<Vec<u8>, SmsError> {
        serde_json::to_vec(&self.fields)
            .map_err(|e| SmsError::Invalid(format!("json encode: {}", e)))
    }
}

impl<K, V> FromIterator<(K, V)> for RequestBody
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// How the body fields travel on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Form,
    Json,
    /// Appended to the URL query string; no request body.
    Query,
}

#[derive(Clone, PartialEq, Eq, Default)]
pub enum Auth {
    #[default]
    None,
    Basic { username: String, password: String },
    Digest { username: String, password: String },
}

impl Auth {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Auth::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn digest(username: impl Into<String>, password: impl Into<String>) -> Self {
        Auth::Digest {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::None => f.write_str("None"),
            Auth::Basic { username, .. } => write!(f, "Basic({username}, ***)"),
            Auth::Digest { username, .. } => write!(f, "Digest({username}, ***)"),
        }
    }
}

/// A fully built call, ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub auth: Auth,
    pub encoding: Encoding,
    pub body: RequestBody,
}

impl HttpRequest {
    /// URL including the query string when the body travels as [`Encoding::Query`].
    pub fn full_url(&self) -> Result<String, SmsError> {
        if self.encoding != Encoding::Query || self.body.is_empty() {
            return Ok(self.url.clone());
        }
        let sep = if self.url.contains('?') { '&' } else { '?' };
        Ok(format!("{}{}{}", self.url, sep, self.body.to_form()?))
    }

    /// Encoded payload and its content type, if the request carries one.
    pub fn payload(&self) -> Result<Option<(&'static str, Vec<u8>)>, SmsError> {
        if self.method == Method::Get || self.body.is_empty() {
            return Ok(None);
        }
        match self.encoding {
            Encoding::Form => Ok(Some((
                "application/x-www-form-urlencoded",
                self.body.to_form()?.into_bytes(),
            ))),
            Encoding::Json => Ok(Some(("application/json", self.body.to_json()?))),
            Encoding::Query => Ok(None),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Builder for one provider call.
#[derive(Debug, Clone)]
pub struct ApiCall {
    base_url: String,
    path: String,
    method: Method,
    encoding: Encoding,
    auth: Auth,
    headers: Headers,
    body: RequestBody,
}

impl ApiCall {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            path: String::new(),
            method: Method::Post,
            encoding: Encoding::Form,
            auth: Auth::None,
            headers: Vec::new(),
            body: RequestBody::new(),
        }
    }

    /// Endpoint path, relative to the base URL.
    pub fn call(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Merge `fields` into the accumulated body.
    pub fn body(mut self, fields: RequestBody) -> Self {
        self.body.extend(fields);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.body.insert(key, value);
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn build(self) -> HttpRequest {
        let url = if self.path.is_empty() {
            self.base_url
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                self.path.trim_start_matches('/')
            )
        };
        HttpRequest {
            method: self.method,
            url,
            headers: self.headers,
            auth: self.auth,
            encoding: self.encoding,
            body: self.body,
        }
    }
}
