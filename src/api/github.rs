//! Implements `RemoteStore` over the GitHub contents API.
//!
//! `GET  {api}/repos/{owner}/{repo}/contents/{path}?ref={branch}` returns `{content, sha}` with the
//! content base64 encoded. `PUT` on the same resource takes `{message, content, branch, sha?}` and
//! fails with 409 or 422 when `sha` is not the current revision.

use crate::api::{Document, RemoteStore, RepoId, Revision, StoreError};
use crate::error::Res;
use anyhow::{bail, Context};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use url::Url;

const ACCEPT_V3: &str = "application/vnd.github.v3+json";
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

pub struct GitHubStore {
    client: reqwest::Client,
    api_url: Url,
    repo: RepoId,
    branch: String,
    token: String,
}

impl GitHubStore {
    pub fn new(api_url: &str, repo: RepoId, branch: &str, token: String) -> Res<Self> {
        let api_url =
            Url::parse(api_url).with_context(|| format!("Invalid API URL '{api_url}'"))?;
        if api_url.cannot_be_a_base() {
            bail!("Invalid API URL '{api_url}'");
        }
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Unable to build the HTTP client")?;
        Ok(Self {
            client,
            api_url,
            repo,
            branch: branch.to_string(),
            token,
        })
    }

    fn contents_url(&self, path: &str) -> Url {
        let mut url = self.api_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["repos", self.repo.owner(), self.repo.name(), "contents"])
                .extend(path.split('/').filter(|s| !s.is_empty()));
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(AUTHORIZATION, format!("token {}", self.token))
            .header(ACCEPT, ACCEPT_V3)
    }
}

#[derive(Deserialize)]
struct ContentResponse {
    content: String,
    sha: String,
}

#[derive(Serialize)]
struct PutRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Deserialize)]
struct PutResponse {
    content: PutContent,
}

#[derive(Deserialize)]
struct PutContent {
    sha: String,
}

#[async_trait::async_trait]
impl RemoteStore for GitHubStore {
    async fn fetch_document(&self, path: &str) -> Result<Option<Document>, StoreError> {
        let url = self.contents_url(path);
        trace!("GET {url}");
        let response = self
            .authorize(self.client.get(url))
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await
            .map_err(|e| StoreError::Network(format!("GET {path}: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("No document at {path} on {}", self.branch);
            return Ok(None);
        }
        let response = check_status(response, path, false).await?;
        let body: ContentResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Malformed(format!("GET {path}: {e}")))?;
        let content = decode_content(&body.content)
            .map_err(|e| StoreError::Malformed(format!("GET {path}: {e}")))?;
        Ok(Some(Document {
            content,
            revision: Revision::new(body.sha),
        }))
    }

    async fn put_document(
        &self,
        path: &str,
        content: &[u8],
        revision: Option<&Revision>,
        message: &str,
    ) -> Result<Revision, StoreError> {
        let url = self.contents_url(path);
        trace!("PUT {url}");
        let request = PutRequest {
            message,
            content: STANDARD.encode(content),
            branch: &self.branch,
            sha: revision.map(Revision::as_str),
        };
        let response = self
            .authorize(self.client.put(url))
            .json(&request)
            .send()
            .await
            .map_err(|e| StoreError::Network(format!("PUT {path}: {e}")))?;

        let response = check_status(response, path, true).await?;
        let body: PutResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Malformed(format!("PUT {path}: {e}")))?;
        debug!("Wrote {path} on {} at revision {}", self.branch, body.content.sha);
        Ok(Revision::new(body.content.sha))
    }
}

/// Maps a non-success status to a `StoreError`. Conflict statuses only mean a stale revision when
/// `is_write` is set.
async fn check_status(
    response: Response,
    path: &str,
    is_write: bool,
) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = format!("{path} returned {status}: {body}");
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Auth(message),
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY if is_write => {
            StoreError::Conflict(message)
        }
        _ => StoreError::Network(message),
    })
}

/// GitHub wraps base64 content at 60 columns.
fn decode_content(content: &str) -> Res<Vec<u8>> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact)
        .context("The document content is not valid base64")
}
