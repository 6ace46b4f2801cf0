//! The remote ledger store: a versioned document API that holds the whole dataset as one JSON file
//! per path.
//!
//! `RemoteStore` is the seam. `GitHubStore` talks to the GitHub contents API, and `TestStore` keeps
//! documents in memory so that the whole app can run without a network.

mod github;
mod test_store;

pub use github::GitHubStore;
pub use test_store::TestStore;

use crate::error::{ErrorType, Res};
use crate::Config;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tracing::{debug, info};

/// When this environment variable is set and non-empty the app uses `TestStore` instead of GitHub.
pub const TEST_MODE_ENV: &str = "LEDGER_SYNC_IN_TEST_MODE";

/// A shared handle to a remote store.
pub type DynStore = Arc<dyn RemoteStore>;

/// Reads and conditionally writes whole documents by path.
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync {
    /// Returns the document at `path` with its current revision, or `None` if there is no
    /// document there.
    async fn fetch_document(&self, path: &str) -> Result<Option<Document>, StoreError>;

    /// Writes `content` to `path`. Pass `None` as `revision` to create a document that does not
    /// exist yet, or the last-read revision to replace it. Returns the new revision.
    async fn put_document(
        &self,
        path: &str,
        content: &[u8],
        revision: Option<&Revision>,
        message: &str,
    ) -> Result<Revision, StoreError>;
}

/// An opaque token identifying one version of a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Revision {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content: Vec<u8>,
    pub revision: Revision,
}

/// The ways a remote store call can fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The revision passed to a write is not the document's current revision.
    Conflict(String),
    /// The credential is missing, invalid, or lacks permission.
    Auth(String),
    /// The store could not be reached, or answered with an unexpected status.
    Network(String),
    /// The store answered, but the answer could not be understood.
    Malformed(String),
}

impl StoreError {
    pub fn error_type(&self) -> ErrorType {
        match self {
            StoreError::Conflict(_) => ErrorType::Conflict,
            StoreError::Auth(_) => ErrorType::Auth,
            StoreError::Network(_) => ErrorType::Network,
            StoreError::Malformed(_) => ErrorType::Serialization,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Conflict(m) => write!(f, "Revision conflict: {m}"),
            StoreError::Auth(m) => write!(f, "Not authorized: {m}"),
            StoreError::Network(m) => write!(f, "Remote store unavailable: {m}"),
            StoreError::Malformed(m) => write!(f, "Unexpected response from remote store: {m}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Selects the `RemoteStore` implementation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    #[default]
    GitHub,
    Test,
}

impl Mode {
    /// `Mode::Test` when `LEDGER_SYNC_IN_TEST_MODE` is set and non-empty, otherwise
    /// `Mode::GitHub`.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Test,
            _ => Mode::GitHub,
        }
    }
}

/// The repository that holds the ledger documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    owner: String,
    name: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Accepts `https://github.com/OWNER/REPO` (optionally ending in `.git` or with more path
    /// segments after the repository name) or the short form `OWNER/REPO`.
    pub fn from_url(url: &str) -> Res<Self> {
        let trimmed = url.trim();
        let path = match url::Url::parse(trimmed) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => trimmed.to_string(),
        };
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let (Some(owner), Some(name)) = (segments.next(), segments.next()) else {
            bail!("Invalid repository URL '{url}'. Expected: https://github.com/OWNER/REPO");
        };
        let name = name.strip_suffix(".git").unwrap_or(name);
        if name.is_empty() {
            bail!("Invalid repository URL '{url}'. Expected: https://github.com/OWNER/REPO");
        }
        Ok(Self::new(owner, name))
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Display for RepoId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Builds the remote store for `config`, or `None` when no credential is configured, in which case
/// every save is local-only.
pub async fn store(config: &Config, mode: Mode) -> Res<Option<DynStore>> {
    let repo = config.repo().clone();
    match mode {
        Mode::Test => {
            info!("Running in test mode, the remote store is in memory");
            let store: DynStore = Arc::new(TestStore::shared(&repo.to_string()));
            Ok(Some(store))
        }
        Mode::GitHub => {
            let Some(token) = config.token().await? else {
                info!("No GitHub token is configured, changes will be saved locally only");
                return Ok(None);
            };
            debug!("Using the GitHub contents API for {repo}");
            let store: DynStore = Arc::new(
                GitHubStore::new(config.api_url(), repo, config.branch(), token)
                    .context("Unable to create the GitHub client")?,
            );
            Ok(Some(store))
        }
    }
}
