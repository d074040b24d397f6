//! Remote notes service client

use async_trait::async_trait;

use crate::types::Note;

#[cfg(feature = "http")]
use crate::error::{NoteSyncError, Result};
#[cfg(feature = "http")]
use crate::types::RemoteConfig;

/// Remote side of synchronization.
///
/// Neither operation reports failure to the engine. `fetch` degrades to
/// `None` ("no remote update this cycle") and `store` drops failed writes
/// after logging them.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Current remote version of a note, if it could be obtained
    async fn fetch(&self, title: &str) -> Option<Note>;

    /// Push a note to the remote service
    async fn store(&self, note: &Note);
}

/// HTTP client for the shared notes service
///
/// Construct once and share it through an `Arc`; the underlying
/// `reqwest::Client` keeps its connection pool across calls.
#[cfg(feature = "http")]
pub struct HttpRemoteClient {
    http: reqwest::Client,
    base_url: reqwest::Url,
}

#[cfg(feature = "http")]
impl HttpRemoteClient {
    /// Create a new client with the given configuration.
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let raw = config.base_url.trim();
        if raw.is_empty() {
            return Err(NoteSyncError::Config("remote URL cannot be empty".into()));
        }
        if !raw.starts_with("http://") && !raw.starts_with("https://") {
            return Err(NoteSyncError::Config(
                "remote URL must start with http:// or https://".into(),
            ));
        }

        let base_url = reqwest::Url::parse(raw.trim_end_matches('/'))
            .map_err(|e| NoteSyncError::Config(format!("invalid remote URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(NoteSyncError::Config(format!(
                "remote URL cannot carry a path: {}",
                base_url
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(format!("notesync/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Build `{base}/{segments...}` with each segment percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| NoteSyncError::Config("remote URL cannot carry a path".into()))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    /// `GET /notes/{title}`. A 404 or an empty body means the service has no
    /// such note.
    pub async fn get_note(&self, title: &str) -> Result<Option<Note>> {
        let url = self.endpoint(&["notes", title])?;
        tracing::debug!(%url, "Fetching remote note");

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(NoteSyncError::Remote {
                status: status.as_u16(),
                message: body,
            });
        }
        if body.trim().is_empty() {
            return Ok(None);
        }

        Note::from_json(&body).map(Some)
    }

    /// `PUT /notes/{title}` with the note as JSON. The acknowledgement body
    /// is not interpreted.
    pub async fn put_note(&self, note: &Note) -> Result<()> {
        let url = self.endpoint(&["notes", note.title()])?;
        tracing::debug!(%url, updated_at = note.updated_at(), "Pushing note");

        let response = self.http.put(url).json(note).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NoteSyncError::Remote {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }

    /// `GET /echo/{msg}`, returning the raw body. Used as a connectivity check.
    pub async fn echo(&self, msg: &str) -> Result<String> {
        let url = self.endpoint(&["echo", msg])?;
        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(NoteSyncError::Remote {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(body)
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn fetch(&self, title: &str) -> Option<Note> {
        match self.get_note(title).await {
            Ok(note) => note,
            Err(e) => {
                tracing::warn!(title, error = %e, "Remote fetch failed");
                None
            }
        }
    }

    async fn store(&self, note: &Note) {
        if let Err(e) = self.put_note(note).await {
            tracing::warn!(title = note.title(), error = %e, "Remote store failed, dropping write");
        }
    }
}
