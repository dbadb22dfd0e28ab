use async_trait::async_trait;
use std::time::Duration;

use crate::{Headers, HttpRequest, SmsError};

/// Raw provider answer, before any provider-specific decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        let mut response = Self::new(status, value.to_string());
        response
            .headers
            .push(("content-type".into(), "application/json".into()));
        response
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The boundary to whatever actually moves bytes over HTTP.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<RawResponse, SmsError>;
}

/// Timeouts applied by the transport; the drivers themselves never time out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportOptions {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_transport::ReqwestTransport;

#[cfg(feature = "reqwest")]
mod reqwest_transport {
    use super::*;
    use crate::digest_auth::DigestChallenge;
    use crate::{Auth, Method};
    use tracing::{debug, error};

    /// [`HttpTransport`] backed by a shared `reqwest::Client`.
    #[derive(Clone, Debug)]
    pub struct ReqwestTransport {
        http: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new(options: TransportOptions) -> Result<Self, SmsError> {
            let http = reqwest::Client::builder()
                .connect_timeout(options.connect_timeout)
                .timeout(options.request_timeout)
                .build()
                .map_err(|e| SmsError::Transport(e.to_string()))?;
            Ok(Self { http })
        }

        pub fn with_client(http: reqwest::Client) -> Self {
            Self { http }
        }

        async fn dispatch(
            &self,
            request: &HttpRequest,
            authorization: Option<String>,
        ) -> Result<RawResponse, SmsError> {
            let url = request.full_url()?;
            let mut builder = match request.method {
                Method::Get => self.http.get(&url),
                Method::Post => self.http.post(&url),
            };
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Auth::Basic { username, password } = &request.auth {
                builder = builder.basic_auth(username, Some(password));
            }
            if let Some(authorization) = authorization {
                builder = builder.header(reqwest::header::AUTHORIZATION, authorization);
            }
            if let Some((content_type, bytes)) = request.payload()? {
                builder = builder
                    .header(reqwest::header::CONTENT_TYPE, content_type)
                    .body(bytes);
            }

            let res = builder.send().await.map_err(|e| {
                error!("HTTP call to {} failed: {}", request.url, e);
                if e.is_timeout() {
                    SmsError::Transport(format!("timeout: {}", e))
                } else {
                    SmsError::Transport(e.to_string())
                }
            })?;

            let status = res.status().as_u16();
            let headers = res
                .headers()
                .iter()
                .map(|(k, v)| {
                    (
                        k.as_str().to_string(),
                        v.to_str().unwrap_or_default().to_string(),
                    )
                })
                .collect();
            let body = res
                .bytes()
                .await
                .map_err(|e| SmsError::Transport(e.to_string()))?
                .to_vec();
            Ok(RawResponse {
                status,
                headers,
                body,
            })
        }
    }

    #[async_trait]
    impl HttpTransport for ReqwestTransport {
        async fn execute(&self, request: HttpRequest) -> Result<RawResponse, SmsError> {
            debug!("{:?} {}", request.method, request.url);
            let first = self.dispatch(&request, None).await?;

            let Auth::Digest { username, password } = &request.auth else {
                return Ok(first);
            };
            if first.status != 401 {
                return Ok(first);
            }
            let challenge = first
                .header("www-authenticate")
                .and_then(DigestChallenge::parse)
                .ok_or_else(|| {
                    SmsError::Transport("401 without a digest challenge".to_string())
                })?;
            let url = request.full_url()?;
            let uri = reqwest::Url::parse(&url)
                .map(|u| match u.query() {
                    Some(q) => format!("{}?{}", u.path(), q),
                    None => u.path().to_string(),
                })
                .map_err(|e| SmsError::Invalid(format!("bad url {}: {}", url, e)))?;
            let method = match request.method {
                Method::Get => "GET",
                Method::Post => "POST",
            };
            let cnonce = uuid::Uuid::new_v4().simple().to_string();
            let authorization =
                challenge.authorization(username, password, method, &uri, &cnonce);
            self.dispatch(&request, Some(authorization)).await
        }
    }
}
