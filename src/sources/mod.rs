use async_trait::async_trait;
use reqwest::Client;

use crate::error::SourceError;
use crate::models::RawMessage;

mod json_file;
mod telegram;

pub use json_file::JsonFileSource;
pub use telegram::{parse_channel_page, ChannelPage, ChannelPost, TelegramWebSource};

/// Delivers the newest messages of one channel.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// At most `limit` messages, oldest first.
    async fn fetch(&self, client: &Client, limit: usize) -> Result<Vec<RawMessage>, SourceError>;
    fn channel_title(&self) -> &str;
}
