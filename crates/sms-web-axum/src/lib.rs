use axum::{
    extract::{Path, State},
    http::{HeaderMap, Uri},
    response::IntoResponse,
    routing::post,
    Router,
};
use bytes::Bytes;
use sms_core::{DriverRegistry, Headers};
use sms_web_generic::{HeaderConverter, ResponseConverter, WebhookProcessor};

#[derive(Clone)]
pub struct AppState {
    pub processor: WebhookProcessor,
    /// Externally visible base URL, e.g. `https://sms.example.com`.
    pub public_url: String,
}

impl AppState {
    pub fn new(registry: DriverRegistry, public_url: impl Into<String>) -> Self {
        Self {
            processor: WebhookProcessor::new(registry),
            public_url: public_url.into(),
        }
    }

    /// The URL the provider called, rebuilt from the public base so that
    /// URL-signing schemes see what the provider signed.
    fn callback_url(&self, uri: &Uri) -> String {
        let mut url = format!("{}{}", self.public_url.trim_end_matches('/'), uri.path());
        if let Some(query) = uri.query() {
            url.push('?');
            url.push_str(query);
        }
        url
    }
}

/// Axum-specific header converter
pub struct AxumHeaderConverter;

impl HeaderConverter for AxumHeaderConverter {
    type HeaderType = HeaderMap;

    fn to_generic_headers(headers: &Self::HeaderType) -> Headers {
        headers
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    v.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect()
    }
}

/// Axum-specific response converter
pub struct AxumResponseConverter;

impl ResponseConverter for AxumResponseConverter {
    type ResponseType = axum::response::Response;

    fn from_webhook_response(response: sms_core::WebhookResponse) -> Self::ResponseType {
        let status = axum::http::StatusCode::from_u16(response.status.as_u16())
            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        (
            status,
            [(axum::http::header::CONTENT_TYPE, response.content_type)],
            response.body,
        )
            .into_response()
    }
}

/// Unified handler: POST /webhooks/{provider}
pub async fn unified_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let url = state.callback_url(&uri);
    let generic_headers = AxumHeaderConverter::to_generic_headers(&headers);
    let response = state
        .processor
        .process_webhook(&provider, &url, generic_headers, &body);
    AxumResponseConverter::from_webhook_response(response)
}

/// Router exposing `POST /webhooks/{provider}`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhooks/{provider}", post(unified_webhook))
        .with_state(state)
}
