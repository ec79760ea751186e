//! Message transport over the antenna's write and notify characteristics

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::{DecodeError, PlatformError};
use crate::platform::{BlePlatform, EventSender, LinkHandle, SubscriptionHandle};
use crate::protocol::{decode_payload, encode_payload};

/// Text ready to go on the wire: trimmed and non-empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundText(String);

impl OutboundText {
    /// `None` for text that is blank after trimming
    pub fn new(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Encodes, writes and decodes messages on one service
pub struct MessageTransport<P: BlePlatform> {
    platform: Arc<P>,
    service: Uuid,
    write_characteristic: Uuid,
    notify_characteristic: Uuid,
    write_timeout: Duration,
}

impl<P: BlePlatform> MessageTransport<P> {
    pub fn new(platform: Arc<P>, config: &SessionConfig) -> Self {
        Self {
            platform,
            service: config.service_uuid,
            write_characteristic: config.write_characteristic_uuid,
            notify_characteristic: config.notify_characteristic_uuid,
            write_timeout: config.write_timeout(),
        }
    }

    /// Subscribe to the notify characteristic of a fresh link
    pub async fn open(
        &self,
        link: &LinkHandle,
        events: EventSender,
    ) -> Result<SubscriptionHandle, PlatformError> {
        self.platform
            .subscribe(link, self.service, self.notify_characteristic, events)
            .await
    }

    /// Acknowledged write of one message; a write still unanswered after the
    /// write timeout fails with [`PlatformError::Timeout`]
    pub async fn send(&self, link: &LinkHandle, text: &OutboundText) -> Result<(), PlatformError> {
        let payload = encode_payload(text.as_str());
        tracing::debug!(
            "Writing {} bytes to {} on {}",
            payload.len(),
            self.write_characteristic,
            link.peripheral
        );
        let write = self
            .platform
            .write(link, self.service, self.write_characteristic, &payload);
        match timeout(self.write_timeout, write).await {
            Ok(result) => result,
            Err(_) => Err(PlatformError::Timeout {
                duration_ms: self.write_timeout.as_millis() as u64,
            }),
        }
    }

    /// Decode a notification value into trimmed text
    pub fn decode(&self, value: &[u8]) -> Result<String, DecodeError> {
        decode_payload(value).map(|text| text.trim().to_string())
    }
}
