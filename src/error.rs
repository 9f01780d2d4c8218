use thiserror::Error;

/// A rule table entry that could not be compiled.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid pattern in rule table `{table}`: {pattern}")]
    InvalidPattern {
        table: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Failures raised by a message source. Any of these aborts that channel's
/// contribution to the current run, never the whole run.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("channel {channel} returned a page without messages")]
    EmptyPage { channel: String },

    #[error("failed to read replay file {path}")]
    Replay {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode replay file {path}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("failed to encode query: {0}")]
    Query(#[from] serde_urlencoded::ser::Error),
}
