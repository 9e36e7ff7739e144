/// Watch history loading: local JSON file, remote JSON URL, or in-memory.
use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;
use thiserror::Error;
use watchrank_core::WatchEvent;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to read history file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("history request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("history URL returned {status}")]
    Status { status: reqwest::StatusCode },

    #[error("history is not a valid watch event list: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Where the watch history comes from. Loaded again on every recomputation.
#[derive(Debug, Clone)]
pub enum HistorySource {
    File(PathBuf),
    Url(String),
    Inline(Arc<[WatchEvent]>),
}

impl HistorySource {
    pub async fn load(&self, client: &Client) -> Result<Vec<WatchEvent>, HistoryError> {
        match self {
            HistorySource::File(path) => {
                let content = tokio::fs::read_to_string(path).await.map_err(|source| HistoryError::Io {
                    path: path.clone(),
                    source,
                })?;
                parse_history(&content)
            }
            HistorySource::Url(url) => {
                let resp = client.get(url).send().await?;
                if !resp.status().is_success() {
                    return Err(HistoryError::Status { status: resp.status() });
                }
                let body = resp.text().await?;
                parse_history(&body)
            }
            HistorySource::Inline(events) => Ok(events.to_vec()),
        }
    }

    /// Short human-readable description for logs.
    pub fn describe(&self) -> String {
        match self {
            HistorySource::File(path) => path.display().to_string(),
            HistorySource::Url(url) => url.clone(),
            HistorySource::Inline(events) => format!("<{} inline events>", events.len()),
        }
    }
}

/// Parse a JSON array of watch events.
pub fn parse_history(content: &str) -> Result<Vec<WatchEvent>, HistoryError> {
    Ok(serde_json::from_str(content.trim())?)
}
