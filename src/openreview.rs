use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::models::{Note, NoteEdit};

pub const DEFAULT_BASE_URL: &str = "https://api2.openreview.net";
const PAGE_SIZE: usize = 1000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[async_trait]
pub trait ReviewSource: Send + Sync {
    async fn submissions(&self, invitation: &str) -> Result<Vec<Note>, ApiError>;

    async fn forum_notes(&self, forum_id: &str) -> Result<Vec<Note>, ApiError>;

    async fn note_edits(&self, note_id: &str) -> Result<Vec<NoteEdit>, ApiError>;
}

#[derive(Debug, Deserialize)]
struct NotesPage {
    #[serde(default)]
    notes: Vec<Note>,
    #[serde(default)]
    count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EditsPage {
    #[serde(default)]
    edits: Vec<NoteEdit>,
}

pub struct OpenReviewClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl OpenReviewClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("rebuttal-finder/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::Client)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {url} {query:?}");

        let mut request = self.http.get(&url).query(query);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| ApiError::Decode { url, source })
    }

    async fn all_notes(&self, filter: &[(&str, String)]) -> Result<Vec<Note>, ApiError> {
        let mut notes = Vec::new();
        let mut offset = 0;

        loop {
            let mut query = filter.to_vec();
            query.push(("offset", offset.to_string()));
            query.push(("limit", PAGE_SIZE.to_string()));

            let page: NotesPage = self.get_json("/notes", &query).await?;
            let fetched = page.notes.len();
            notes.extend(page.notes);

            match next_offset(offset, fetched, page.count) {
                Some(next) => offset = next,
                None => break,
            }
        }

        Ok(notes)
    }
}

#[async_trait]
impl ReviewSource for OpenReviewClient {
    async fn submissions(&self, invitation: &str) -> Result<Vec<Note>, ApiError> {
        self.all_notes(&[
            ("invitation", invitation.to_string()),
            ("details", "directReplies".to_string()),
        ])
        .await
    }

    async fn forum_notes(&self, forum_id: &str) -> Result<Vec<Note>, ApiError> {
        self.all_notes(&[("forum", forum_id.to_string())]).await
    }

    async fn note_edits(&self, note_id: &str) -> Result<Vec<NoteEdit>, ApiError> {
        let page: EditsPage = self
            .get_json("/notes/edits", &[("note.id", note_id.to_string())])
            .await?;
        Ok(page.edits)
    }
}

/// Offset of the next page, or `None` once a short page or the reported
/// total says the listing is exhausted.
fn next_offset(offset: usize, fetched: usize, total: Option<usize>) -> Option<usize> {
    let next = offset + fetched;
    if fetched < PAGE_SIZE {
        return None;
    }
    match total {
        Some(total) if next >= total => None,
        _ => Some(next),
    }
}
