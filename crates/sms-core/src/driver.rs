use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{IncomingMessage, MessageWindow, OutgoingMessage, SendReport, SmsError, WebhookRequest};

/// How a driver's `send` reaches multiple recipients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPolicy {
    /// One call per recipient, every recipient attempted (see [`send_each`](crate::send_each)).
    PerRecipient,
    /// One call carrying every recipient; the provider accepts or rejects it as a whole.
    Batch,
}

/// The uniform capability every provider adapter implements.
///
/// Adapters hold only their credentials and options after construction, so a
/// single instance can serve concurrent calls.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Stable provider key, e.g. "twilio".
    fn provider(&self) -> &'static str;

    fn dispatch_policy(&self) -> DispatchPolicy;

    /// Transmit `message` to every recipient in `message.to()`.
    async fn send(&self, message: OutgoingMessage) -> Result<SendReport, SmsError>;

    /// Parse an inbound webhook. Verifies authenticity first when the adapter
    /// was configured to.
    fn receive(&self, request: &WebhookRequest) -> Result<IncomingMessage, SmsError>;

    /// List messages from the provider's history; at most `window.len()` results.
    async fn check_messages(&self, window: MessageWindow)
    -> Result<Vec<IncomingMessage>, SmsError>;

    /// Fetch one message; [`SmsError::NotFound`] when the provider does not know `id`.
    async fn get_message(&self, id: &str) -> Result<IncomingMessage, SmsError>;
}

/// Runtime registry so apps can register any combination of drivers and treat them interchangeably.
#[derive(Default, Clone)]
pub struct DriverRegistry {
    map: Arc<HashMap<&'static str, Arc<dyn Driver>>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self {
            map: Arc::new(HashMap::new()),
        }
    }

    pub fn with(mut self, driver: Arc<dyn Driver>) -> Self {
        let mut m = (*self.map).clone();
        m.insert(driver.provider(), driver);
        self.map = Arc::new(m);
        self
    }

    pub fn get(&self, provider: &str) -> Option<Arc<dyn Driver>> {
        self.map.get(provider).cloned()
    }

    pub fn providers(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.map.keys().copied()
    }
}
