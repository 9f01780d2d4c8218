use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use tracing::debug;

use crate::error::SourceError;
use crate::models::RawMessage;
use crate::sources::MessageSource;

/// Replays a JSON array of messages, for offline runs and fixtures.
pub struct JsonFileSource {
    path: PathBuf,
    title: String,
    override_title: bool,
}

impl JsonFileSource {
    /// Without a title the records keep their own `sourceChannel`.
    pub fn new(path: impl Into<PathBuf>, title: Option<String>) -> Self {
        let path = path.into();
        let override_title = title.is_some();
        let title = title.unwrap_or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        });

        Self {
            path,
            title,
            override_title,
        }
    }
}

#[async_trait]
impl MessageSource for JsonFileSource {
    async fn fetch(&self, _client: &Client, limit: usize) -> Result<Vec<RawMessage>, SourceError> {
        let path_label = self.path.display().to_string();
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SourceError::Replay {
                path: path_label.clone(),
                source,
            })?;
        let mut messages: Vec<RawMessage> =
            serde_json::from_str(&content).map_err(|source| SourceError::Decode {
                path: path_label.clone(),
                source,
            })?;

        messages.sort_by_key(|m| m.timestamp);
        if messages.len() > limit {
            messages.drain(..messages.len() - limit);
        }
        if self.override_title {
            for message in &mut messages {
                message.source_channel = self.title.clone();
            }
        }

        debug!("Replayed {} messages from {}", messages.len(), path_label);
        Ok(messages)
    }

    fn channel_title(&self) -> &str {
        &self.title
    }
}
