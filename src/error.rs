use thiserror::Error;

/// Failure while pulling messages from an upstream feed or channel.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Parse(String),
}

impl From<quick_xml::Error> for SourceError {
    fn from(e: quick_xml::Error) -> Self {
        SourceError::Parse(e.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self {
        SourceError::Parse(e.to_string())
    }
}

/// Failure reading or appending the known-code file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot read known codes from {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot append {code} to {path}: {source}")]
    Append {
        code: String,
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("notifier returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("notifier rejected message: {0}")]
    Rejected(String),
}
