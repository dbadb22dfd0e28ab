use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use handlebars::{no_escape, Handlebars, Template};
use time::OffsetDateTime;

use crate::SmsError;

/// Content of an outgoing message, rendered by [`OutgoingMessage::compose_message`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageBody {
    Text(String),
    /// Handlebars template rendered over `data`; unknown keys render empty.
    Template {
        template: String,
        data: BTreeMap<String, String>,
    },
}

impl MessageBody {
    fn render(&self) -> Result<String, SmsError> {
        match self {
            MessageBody::Text(text) => Ok(text.clone()),
            MessageBody::Template { template, data } => render_template(template, data),
        }
    }
}

/// Plain-text registry: SMS bodies are not HTML, so nothing is escaped.
fn hb_registry() -> Handlebars<'static> {
    let mut h = Handlebars::new();
    h.register_escape_fn(no_escape);
    h
}

fn render_template(template: &str, data: &BTreeMap<String, String>) -> Result<String, SmsError> {
    hb_registry()
        .render_template(template, data)
        .map_err(|e| SmsError::Invalid(format!("template render: {}", e)))
}

/// A normalized message before transport.
///
/// Built with [`OutgoingMessage::builder`] and consumed by exactly one
/// [`Driver::send`](crate::Driver::send).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    from: Option<String>,
    to: Vec<String>,
    body: MessageBody,
}

impl OutgoingMessage {
    pub fn builder() -> OutgoingMessageBuilder {
        OutgoingMessageBuilder::default()
    }

    pub fn from(&self) -> Option<&str> {
        self.from.as_deref()
    }

    /// Recipients in insertion order, without duplicates. Never empty.
    pub fn to(&self) -> &[String] {
        &self.to
    }

    pub fn body(&self) -> &MessageBody {
        &self.body
    }

    /// Render the body text. Drivers call this once per send.
    pub fn compose_message(&self) -> Result<String, SmsError> {
        self.body.render()
    }
}

#[derive(Debug, Default)]
pub struct OutgoingMessageBuilder {
    from: Option<String>,
    to: Vec<String>,
    body: Option<MessageBody>,
}

impl OutgoingMessageBuilder {
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Add a recipient. Repeated recipients are kept once, at their first position.
    pub fn to(mut self, to: impl Into<String>) -> Self {
        let to = to.into();
        if !self.to.contains(&to) {
            self.to.push(to);
        }
        self
    }

    pub fn to_all<I, S>(self, recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        recipients.into_iter().fold(self, |b, to| b.to(to))
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.body = Some(MessageBody::Text(text.into()));
        self
    }

    pub fn template(mut self, template: impl Into<String>, data: BTreeMap<String, String>) -> Self {
        self.body = Some(MessageBody::Template {
            template: template.into(),
            data,
        });
        self
    }

    pub fn build(self) -> Result<OutgoingMessage, SmsError> {
        if self.to.is_empty() {
            return Err(SmsError::Invalid("message has no recipients".into()));
        }
        if self.to.iter().any(|to| to.trim().is_empty()) {
            return Err(SmsError::Invalid("blank recipient".into()));
        }
        let body = self
            .body
            .ok_or_else(|| SmsError::Invalid("message has no body".into()))?;
        if let MessageBody::Template { template, .. } = &body {
            Template::compile(template)
                .map_err(|e| SmsError::Invalid(format!("template: {}", e)))?;
        }
        Ok(OutgoingMessage {
            from: self.from.filter(|f| !f.trim().is_empty()),
            to: self.to,
            body,
        })
    }
}

/// Normalized inbound message (a reply, or an entry from a provider's history).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IncomingMessage {
    id: String,
    from: String,
    to: String,
    message: String,
    #[serde(with = "time::serde::rfc3339::option")]
    timestamp: Option<OffsetDateTime>,
    provider: &'static str,
    raw: serde_json::Value,
}

impl IncomingMessage {
    pub fn builder(provider: &'static str) -> IncomingMessageBuilder {
        IncomingMessageBuilder {
            provider,
            id: None,
            from: None,
            to: None,
            message: None,
            timestamp: None,
            raw: serde_json::Value::Null,
        }
    }

    /// Provider-assigned id; unique only within that provider.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn timestamp(&self) -> Option<OffsetDateTime> {
        self.timestamp
    }

    pub fn provider(&self) -> &'static str {
        self.provider
    }

    /// Original provider payload, for diagnostics.
    pub fn raw(&self) -> &serde_json::Value {
        &self.raw
    }

    pub fn into_raw(self) -> serde_json::Value {
        self.raw
    }
}

#[derive(Debug)]
pub struct IncomingMessageBuilder {
    provider: &'static str,
    id: Option<String>,
    from: Option<String>,
    to: Option<String>,
    message: Option<String>,
    timestamp: Option<OffsetDateTime>,
    raw: serde_json::Value,
}

impl IncomingMessageBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn timestamp(mut self, timestamp: Option<OffsetDateTime>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = raw;
        self
    }

    /// Fails with [`SmsError::Decode`] unless all four normalized fields are non-blank.
    pub fn build(self) -> Result<IncomingMessage, SmsError> {
        let provider = self.provider;
        let require = |field: Option<String>, name: &str| {
            field
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| SmsError::Decode(format!("{provider} message is missing `{name}`")))
        };
        Ok(IncomingMessage {
            id: require(self.id, "id")?,
            from: require(self.from, "from")?,
            to: require(self.to, "to")?,
            message: require(self.message, "message")?,
            timestamp: self.timestamp,
            provider,
            raw: self.raw,
        })
    }
}

/// Proof that one recipient was accepted by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub to: String,
    /// Provider-assigned id for the submission.
    pub id: String,
}

impl Receipt {
    pub fn new(to: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SendReport {
    /// Name of the backend/provider that produced the report, e.g. "twilio".
    pub provider: &'static str,
    pub receipts: Vec<Receipt>,
}

/// Half-open `[start, end)` window over a provider's message history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MessageWindow {
    start: usize,
    end: usize,
}

impl MessageWindow {
    pub fn new(start: usize, end: usize) -> Result<Self, SmsError> {
        if start > end {
            return Err(SmsError::Invalid(format!(
                "message window start {start} is past end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl Default for MessageWindow {
    fn default() -> Self {
        Self { start: 0, end: 25 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipients_are_an_ordered_set() {
        let msg = OutgoingMessage::builder()
            .to("+15550000002")
            .to("+15550000001")
            .to("+15550000002")
            .text("hi")
            .build()
            .unwrap();
        assert_eq!(msg.to(), ["+15550000002", "+15550000001"]);
    }

    #[test]
    fn empty_recipients_rejected() {
        let err = OutgoingMessage::builder().text("hi").build().unwrap_err();
        assert!(matches!(err, SmsError::Invalid(_)));

        let err = OutgoingMessage::builder().to("  ").text("hi").build().unwrap_err();
        assert!(matches!(err, SmsError::Invalid(_)));
    }

    #[test]
    fn template_is_composed() {
        let mut data = BTreeMap::new();
        data.insert("name".to_string(), "Ada".to_string());
        data.insert("code".to_string(), "4821".to_string());
        let msg = OutgoingMessage::builder()
            .to("+15551234567")
            .template("Hi {{ name }}, your code is {{code}}.{{ missing }}", data)
            .build()
            .unwrap();
        assert_eq!(msg.compose_message().unwrap(), "Hi Ada, your code is 4821.");
    }

    #[test]
    fn template_values_are_not_html_escaped() {
        let mut data = BTreeMap::new();
        data.insert("who".to_string(), "Tom & Jerry <3".to_string());
        let out = render_template("Hello {{who}}", &data).unwrap();
        assert_eq!(out, "Hello Tom & Jerry <3");
    }

    #[test]
    fn malformed_template_is_rejected_at_build() {
        let err = OutgoingMessage::builder()
            .to("+15551234567")
            .template("value {{ open", BTreeMap::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, SmsError::Invalid(_)));
    }

    #[test]
    fn incoming_requires_all_fields() {
        let err = IncomingMessage::builder("twilio")
            .id("SM1")
            .from("+15550001111")
            .to("")
            .message("Hello")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("`to`"));

        let ok = IncomingMessage::builder("twilio")
            .id("SM1")
            .from("+15550001111")
            .to("+15550002222")
            .message("Hello")
            .raw(serde_json::json!({"Body": "Hello"}))
            .build()
            .unwrap();
        assert_eq!(ok.provider(), "twilio");
        assert_eq!(ok.into_raw()["Body"], "Hello");
    }

    #[test]
    fn window_bounds() {
        assert_eq!(MessageWindow::default().len(), 25);
        assert_eq!(MessageWindow::new(10, 15).unwrap().len(), 5);
        assert!(MessageWindow::new(15, 10).is_err());
    }
}
