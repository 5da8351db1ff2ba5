pub mod discord;
pub mod reddit;

use chrono::{DateTime, Utc};

use crate::error::SourceError;

/// One post or chat message as handed over by a source.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub text: String,
    pub published_at: Option<DateTime<Utc>>,
    pub provenance_link: String,
    pub source_id: String,
}

/// Anything that can be polled for recent messages.
pub trait MessageSource {
    fn id(&self) -> &str;

    /// True when `fetch` returns messages newest first and only a fixed
    /// number of them is worth reading.
    fn newest_first(&self) -> bool {
        false
    }

    fn fetch(&self) -> Result<Vec<RawMessage>, SourceError>;
}

pub(crate) fn http_client(timeout_secs: u64) -> reqwest::blocking::Client {
    reqwest::blocking::Client::builder()
        .user_agent(concat!("codewatch/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| reqwest::blocking::Client::new())
}
