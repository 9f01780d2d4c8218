use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One message as delivered by a source connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    #[serde(rename = "sourceChannel")]
    pub source_channel: String,
    pub text: String,
    #[serde(rename = "timestampUnixSeconds", with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
}

impl RawMessage {
    pub fn new(source_channel: impl Into<String>, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            source_channel: source_channel.into(),
            text: text.into(),
            timestamp,
        }
    }
}
