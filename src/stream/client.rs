//! Follows an engine stream over HTTP and feeds the bytes into a view

use futures::StreamExt;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::playback::view::{ViewCommand, ViewHandle};

/// Engine stream client
#[derive(Clone)]
pub struct StreamClient {
    client: Client,
    base_url: Option<String>,
}

impl StreamClient {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    /// Stream URL for a match on the configured engine
    pub fn match_stream_url(&self, match_id: &str) -> Option<String> {
        self.base_url
            .as_ref()
            .map(|base| format!("{}/matches/{}/stream", base, match_id))
    }

    /// Pick the URL to follow: an explicit one wins, otherwise the engine's
    /// stream for the match.
    pub fn resolve_url(
        &self,
        stream_url: Option<&str>,
        match_id: Option<&str>,
    ) -> Result<Option<String>, StreamError> {
        match (stream_url, match_id) {
            (Some(url), _) => {
                reqwest::Url::parse(url).map_err(|_| StreamError::InvalidUrl(url.to_string()))?;
                Ok(Some(url.to_string()))
            }
            (None, Some(id)) => Ok(self.match_stream_url(id)),
            (None, None) => Ok(None),
        }
    }

    /// Read the stream to the end, forwarding every chunk to the view.
    /// Returns the number of bytes forwarded.
    pub async fn follow(&self, url: &str, view: &ViewHandle) -> Result<u64, StreamError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(StreamError::Request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StreamError::Api {
                status: status.as_u16(),
                body,
            });
        }

        info!(view_id = %view.id, url, "Following engine stream");

        let mut body = response.bytes_stream();
        let mut forwarded = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(StreamError::Request)?;
            forwarded += chunk.len() as u64;
            view.send(ViewCommand::Ingest(chunk))
                .await
                .map_err(|_| StreamError::ViewClosed)?;
        }

        view.send(ViewCommand::EndOfStream)
            .await
            .map_err(|_| StreamError::ViewClosed)?;
        debug!(view_id = %view.id, forwarded, "Engine stream finished");
        Ok(forwarded)
    }

    /// Follow in the background. The task ends with the stream or the view.
    pub fn spawn_follow(&self, url: String, view: ViewHandle) {
        let client = self.clone();
        tokio::spawn(async move {
            match client.follow(&url, &view).await {
                Ok(_) => {}
                Err(StreamError::ViewClosed) => {
                    debug!(view_id = %view.id, "View closed while streaming");
                }
                Err(e) => {
                    warn!(view_id = %view.id, error = %e, "Engine stream failed");
                }
            }
        });
    }
}

/// Stream client errors
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Request failed: {0}")]
    Request(reqwest::Error),

    #[error("Engine error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid stream URL: {0}")]
    InvalidUrl(String),

    #[error("View closed")]
    ViewClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_url_from_base() {
        let client = StreamClient::new(Some("http://engine:9000/".into()));
        assert_eq!(
            client.match_stream_url("abc").as_deref(),
            Some("http://engine:9000/matches/abc/stream")
        );
        assert!(StreamClient::new(None).match_stream_url("abc").is_none());
    }

    #[test]
    fn explicit_url_wins() {
        let client = StreamClient::new(Some("http://engine:9000".into()));
        let url = client
            .resolve_url(Some("http://other/feed"), Some("abc"))
            .expect("valid");
        assert_eq!(url.as_deref(), Some("http://other/feed"));

        let url = client.resolve_url(None, Some("abc")).expect("valid");
        assert_eq!(url.as_deref(), Some("http://engine:9000/matches/abc/stream"));

        assert!(client.resolve_url(None, None).expect("valid").is_none());
        assert!(matches!(
            client.resolve_url(Some("not a url"), None),
            Err(StreamError::InvalidUrl(_))
        ));
    }
}
