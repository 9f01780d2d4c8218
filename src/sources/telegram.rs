use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::{Lazy, OnceCell};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Client;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::debug;
use url::Url;

use crate::config::ChannelConfig;
use crate::error::SourceError;
use crate::models::RawMessage;
use crate::sources::MessageSource;
use crate::utils::http::fetch_with_retry;

const HANDLE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'_');

static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".tgme_channel_info_header_title").expect("Invalid title selector")
});
static MESSAGE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".tgme_widget_message[data-post]").expect("Invalid message selector")
});
static TEXT_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".tgme_widget_message_text").expect("Invalid message text selector")
});
static TIME_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".tgme_widget_message_date time[datetime]").expect("Invalid time selector")
});

/// One post of a channel's web preview.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelPost {
    pub id: u64,
    /// `None` for media-only posts.
    pub text: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelPage {
    pub title: Option<String>,
    pub posts: Vec<ChannelPost>,
}

/// Text of an element with `<br>` turned back into line breaks.
fn text_with_breaks(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if el.name() == "br" => out.push('\n'),
            _ => {}
        }
    }
    out
}

fn post_id(data_post: &str) -> Option<u64> {
    data_post.rsplit('/').next()?.parse().ok()
}

/// Parses one page of `t.me/s/<handle>`.
pub fn parse_channel_page(html: &str) -> ChannelPage {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let posts = document
        .select(&MESSAGE_SELECTOR)
        .filter_map(|message| {
            let id = message.value().attr("data-post").and_then(post_id)?;
            let text = message
                .select(&TEXT_SELECTOR)
                .next()
                .map(text_with_breaks)
                .filter(|t| !t.trim().is_empty());
            let timestamp = message
                .select(&TIME_SELECTOR)
                .next()
                .and_then(|time| time.value().attr("datetime"))
                .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
                .map(|dt| dt.with_timezone(&Utc));

            Some(ChannelPost {
                id,
                text,
                timestamp,
            })
        })
        .collect();

    ChannelPage { title, posts }
}

/// Reads a public channel through its web preview, walking back with
/// `?before=<post id>` until enough posts are collected.
pub struct TelegramWebSource {
    handle: String,
    configured_title: Option<String>,
    scraped_title: OnceCell<String>,
    base_url: String,
    max_retries: u32,
}

impl TelegramWebSource {
    pub fn new(channel: &ChannelConfig, base_url: impl Into<String>, max_retries: u32) -> Self {
        Self {
            handle: channel.handle.trim_start_matches('@').to_string(),
            configured_title: channel.title.clone(),
            scraped_title: OnceCell::new(),
            base_url: base_url.into(),
            max_retries,
        }
    }

    pub fn page_url(&self, before: Option<u64>) -> Result<Url, SourceError> {
        let path = format!("s/{}", utf8_percent_encode(&self.handle, HANDLE));
        let mut url = Url::parse(&self.base_url)?.join(&path)?;
        if let Some(before) = before {
            url.set_query(Some(&serde_urlencoded::to_string([("before", before)])?));
        }
        Ok(url)
    }

    pub async fn fetch_page(&self, client: &Client, before: Option<u64>) -> Result<ChannelPage, SourceError> {
        let url = self.page_url(before)?;
        let http_error = |e: &dyn std::fmt::Display| SourceError::Http {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = fetch_with_retry(client, url.as_str(), self.max_retries)
            .await
            .map_err(|e| http_error(&format!("{:#}", e)))?;
        let html = response.text().await.map_err(|e| http_error(&e))?;

        let page = parse_channel_page(&html);
        if let Some(title) = &page.title {
            let _ = self.scraped_title.set(title.clone());
        }
        debug!("{}: {} posts before {:?}", self.handle, page.posts.len(), before);
        Ok(page)
    }
}

#[async_trait]
impl MessageSource for TelegramWebSource {
    async fn fetch(&self, client: &Client, limit: usize) -> Result<Vec<RawMessage>, SourceError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut posts: Vec<ChannelPost> = Vec::new();
        let mut before = None;

        loop {
            let page = self.fetch_page(client, before).await?;
            let older: Vec<ChannelPost> = page
                .posts
                .into_iter()
                .filter(|post| before.map_or(true, |b| post.id < b))
                .collect();

            if older.is_empty() {
                if posts.is_empty() {
                    return Err(SourceError::EmptyPage {
                        channel: self.handle.clone(),
                    });
                }
                break;
            }

            before = older.iter().map(|post| post.id).min();
            posts.extend(older);
            if posts.len() >= limit {
                break;
            }
        }

        posts.sort_by(|a, b| b.id.cmp(&a.id));
        posts.truncate(limit);
        posts.reverse();

        let title = self.channel_title().to_string();
        let messages: Vec<RawMessage> = posts
            .into_iter()
            .filter_map(|post| Some(RawMessage::new(title.clone(), post.text?, post.timestamp?)))
            .collect();

        debug!("Collected {} messages from {}", messages.len(), title);
        Ok(messages)
    }

    fn channel_title(&self) -> &str {
        self.configured_title
            .as_deref()
            .or_else(|| self.scraped_title.get().map(String::as_str))
            .unwrap_or(&self.handle)
    }
}
