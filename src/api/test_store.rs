//! Implements the `RemoteStore` trait using in-memory documents for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without using GitHub.

use crate::api::{Document, RemoteStore, Revision, StoreError};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// Repositories created with `TestStore::shared`, by id. Every handle with the same id sees the
/// same documents.
static REPOS: LazyLock<Mutex<HashMap<String, Arc<Mutex<TestRepo>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

#[derive(Debug, Default)]
struct TestRepo {
    documents: HashMap<String, Stored>,
    fail_auth: bool,
    fail_network: bool,
    /// Remaining number of writes per path that will be answered with a conflict.
    conflicts: HashMap<String, u32>,
    /// Paths whose writes fail with a network error.
    broken_paths: HashSet<String>,
    writes: HashMap<String, usize>,
}

#[derive(Debug, Clone)]
struct Stored {
    content: Vec<u8>,
    version: u64,
}

impl Stored {
    fn revision(&self) -> Revision {
        Revision::new(self.version.to_string())
    }
}

impl TestRepo {
    fn check_reachable(&self, path: &str) -> Result<(), StoreError> {
        if self.fail_network {
            return Err(StoreError::Network(format!("{path}: connection refused")));
        }
        if self.fail_auth {
            return Err(StoreError::Auth(format!("{path}: bad credentials")));
        }
        Ok(())
    }

    fn store(&mut self, path: &str, content: &[u8]) -> Revision {
        let version = self.documents.get(path).map(|s| s.version + 1).unwrap_or(1);
        let stored = Stored {
            content: content.to_vec(),
            version,
        };
        let revision = stored.revision();
        self.documents.insert(path.to_string(), stored);
        revision
    }
}

/// An in-memory `RemoteStore`. Cloning a `TestStore` yields another handle to the same documents.
#[derive(Debug, Clone, Default)]
pub struct TestStore {
    repo: Arc<Mutex<TestRepo>>,
}

impl TestStore {
    /// Creates a store whose documents are not shared with any other store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle to the repository named `id`, creating it empty on first use.
    pub fn shared(id: &str) -> Self {
        let mut repos = REPOS.lock().unwrap_or_else(PoisonError::into_inner);
        let repo = repos.entry(id.to_string()).or_default().clone();
        Self { repo }
    }

    fn lock(&self) -> MutexGuard<'_, TestRepo> {
        self.repo.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes `content` to `path` unconditionally, as an out-of-band edit would.
    pub fn seed(&self, path: &str, content: &[u8]) -> Revision {
        self.lock().store(path, content)
    }

    pub fn document(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().documents.get(path).map(|s| s.content.clone())
    }

    pub fn revision(&self, path: &str) -> Option<Revision> {
        self.lock().documents.get(path).map(Stored::revision)
    }

    /// Number of successful writes to `path`.
    pub fn write_count(&self, path: &str) -> usize {
        self.lock().writes.get(path).copied().unwrap_or(0)
    }

    /// While set, every call fails with `StoreError::Auth`.
    pub fn set_unauthorized(&self, value: bool) {
        self.lock().fail_auth = value;
    }

    /// While set, every call fails with `StoreError::Network`.
    pub fn set_unreachable(&self, value: bool) {
        self.lock().fail_network = value;
    }

    /// The next `count` writes to `path` fail with `StoreError::Conflict`, as if someone else had
    /// written it in between.
    pub fn inject_conflicts(&self, path: &str, count: u32) {
        self.lock().conflicts.insert(path.to_string(), count);
    }

    /// Writes to `path` fail with `StoreError::Network` until cleared.
    pub fn break_path(&self, path: &str, broken: bool) {
        let mut repo = self.lock();
        if broken {
            repo.broken_paths.insert(path.to_string());
        } else {
            repo.broken_paths.remove(path);
        }
    }
}

#[async_trait::async_trait]
impl RemoteStore for TestStore {
    async fn fetch_document(&self, path: &str) -> Result<Option<Document>, StoreError> {
        let repo = self.lock();
        repo.check_reachable(path)?;
        trace!("TestStore fetch {path}");
        Ok(repo.documents.get(path).map(|s| Document {
            content: s.content.clone(),
            revision: s.revision(),
        }))
    }

    async fn put_document(
        &self,
        path: &str,
        content: &[u8],
        revision: Option<&Revision>,
        _message: &str,
    ) -> Result<Revision, StoreError> {
        let mut repo = self.lock();
        repo.check_reachable(path)?;
        if repo.broken_paths.contains(path) {
            return Err(StoreError::Network(format!("{path}: service unavailable")));
        }
        if let Some(remaining) = repo.conflicts.get_mut(path) {
            if *remaining > 0 {
                *remaining -= 1;
                // Someone else wrote the document in between.
                let current = repo.documents.get(path).map(|s| s.content.clone());
                repo.store(path, &current.unwrap_or_default());
                return Err(StoreError::Conflict(format!("{path}: injected conflict")));
            }
        }
        let current = repo.documents.get(path).map(Stored::revision);
        if current.as_ref() != revision {
            return Err(StoreError::Conflict(format!(
                "{path}: expected revision {}, got {}",
                current.map(|r| r.to_string()).unwrap_or_else(|| "none".into()),
                revision.map(|r| r.to_string()).unwrap_or_else(|| "none".into()),
            )));
        }
        trace!("TestStore put {path}");
        *repo.writes.entry(path.to_string()).or_default() += 1;
        Ok(repo.store(path, content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATH: &str = "public/budget.json";

    #[tokio::test]
    async fn test_revisions_advance() {
        let store = TestStore::new();
        assert!(store.fetch_document(PATH).await.unwrap().is_none());

        let first = store.put_document(PATH, b"{}", None, "m").await.unwrap();
        let doc = store.fetch_document(PATH).await.unwrap().unwrap();
        assert_eq!(doc.revision, first);

        let second = store
            .put_document(PATH, b"{\"a\":1}", Some(&first), "m")
            .await
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(store.document(PATH).unwrap(), b"{\"a\":1}");
        assert_eq!(store.write_count(PATH), 2);
    }

    #[tokio::test]
    async fn test_stale_and_missing_revisions_conflict() {
        let store = TestStore::new();
        let first = store.put_document(PATH, b"{}", None, "m").await.unwrap();
        assert!(store
            .put_document(PATH, b"{}", None, "m")
            .await
            .unwrap_err()
            .is_conflict());
        store.seed(PATH, b"{}");
        assert!(store
            .put_document(PATH, b"{}", Some(&first), "m")
            .await
            .unwrap_err()
            .is_conflict());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = TestStore::new();
        store.set_unauthorized(true);
        assert!(matches!(
            store.fetch_document(PATH).await,
            Err(StoreError::Auth(_))
        ));
        store.set_unauthorized(false);

        store.set_unreachable(true);
        assert!(matches!(
            store.put_document(PATH, b"{}", None, "m").await,
            Err(StoreError::Network(_))
        ));
        store.set_unreachable(false);

        store.inject_conflicts(PATH, 1);
        let err = store.put_document(PATH, b"{}", None, "m").await.unwrap_err();
        assert!(err.is_conflict());
        let revision = store.revision(PATH);
        store
            .put_document(PATH, b"{}", revision.as_ref(), "m")
            .await
            .unwrap();

        store.break_path("data/budget.json", true);
        assert!(matches!(
            store.put_document("data/budget.json", b"{}", None, "m").await,
            Err(StoreError::Network(_))
        ));
    }

    #[test]
    fn test_shared_by_id() {
        let a = TestStore::shared("test_shared_by_id");
        let b = TestStore::shared("test_shared_by_id");
        a.seed(PATH, b"{}");
        assert_eq!(b.document(PATH).unwrap(), b"{}");
        assert!(TestStore::shared("someone_else").document(PATH).is_none());
    }
}
