//! The synchronizer keeps the dataset durable across the remote store and the local cache.
//!
//! Every save runs `Idle -> Loading -> Merging -> Writing` and ends in one of `Committed`,
//! `Degraded` or `Failed`:
//! - `Loading` fetches the whole dataset from the published path. Only `Synchronizer::load` can
//!   produce a `Snapshot`, so a write always starts from a fresh read.
//! - `Merging` applies the caller's mutation to the snapshot. Month keys the mutation does not
//!   touch pass through as they were read.
//! - `Writing` writes the cache, then the published path with the snapshot's revision, then the
//!   source path with its own freshly fetched revision.
//!
//! A stale revision on the published path reloads and re-applies the mutation, up to
//! `conflict_retries` times. After that, and on any auth or network failure, the save degrades: the
//! data is in the local cache and the save is reported as successful but local.

mod autosave;

pub use autosave::{Autosave, MonthEditor, MonthSink};

use crate::api::{DynStore, RemoteStore, Revision};
use crate::cache::LocalCache;
use crate::error::{Error, ErrorType, IntoResult, Result};
use crate::model::Dataset;
use crate::Config;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Where and how the synchronizer writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Authoritative for reads, written first.
    pub published_path: String,
    /// Mirror of the published document, written second.
    pub source_path: String,
    /// How many times a save reloads and re-applies its mutation after a stale revision.
    pub conflict_retries: u32,
}

/// The steps of a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Loading,
    Merging,
    Writing,
    /// The published path was written.
    Committed,
    /// The remote store was not written, the data is in the local cache only.
    Degraded,
    /// Nothing was written.
    Failed,
}

serde_plain::derive_display_from_serialize!(SyncState);

/// Where the dataset in a `Snapshot` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Read from the published path. An absent document reads as the empty dataset.
    Remote,
    /// The remote store could not be used, read from the local cache.
    Cache,
    /// The remote store could not be used and the local cache is empty.
    Empty,
}

/// A dataset as it was read at one moment, along with the published revision it was read at.
#[derive(Debug, Clone)]
pub struct Snapshot {
    dataset: Dataset,
    revision: Option<Revision>,
    origin: Origin,
    /// Why the remote store could not be read.
    remote_error: Option<String>,
}

impl Snapshot {
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn into_dataset(self) -> Dataset {
        self.dataset
    }

    /// The published revision, `None` if the document did not exist or was not read remotely.
    pub fn revision(&self) -> Option<&Revision> {
        self.revision.as_ref()
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Why the remote store could not be read, when it was not.
    pub fn remote_error(&self) -> Option<&str> {
        self.remote_error.as_deref()
    }
}

/// The result of writing one of the two mirrored paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PathOutcome {
    Written { revision: Revision },
    Failed { error: String },
    Skipped,
}

impl PathOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, PathOutcome::Written { .. })
    }
}

/// Reports the two mirrored writes independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirrorReport {
    pub published: PathOutcome,
    pub source: PathOutcome,
}

impl MirrorReport {
    pub(crate) fn skipped() -> Self {
        Self {
            published: PathOutcome::Skipped,
            source: PathOutcome::Skipped,
        }
    }

    /// The published path was written but the source path was not.
    pub fn is_partial(&self) -> bool {
        self.published.is_written() && !self.source.is_written()
    }
}

/// What happened to a save that did not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    /// `Committed` or `Degraded`, `Idle` when there was nothing to save.
    pub state: SyncState,
    pub mirror: MirrorReport,
    /// Number of load-merge-write passes, more than one after a conflict.
    pub attempts: u32,
    /// Why the save degraded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SaveReport {
    /// The report for a save that was not needed because nothing changed.
    pub fn unchanged() -> Self {
        Self {
            state: SyncState::Idle,
            mirror: MirrorReport::skipped(),
            attempts: 0,
            reason: None,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.state == SyncState::Committed
    }

    pub fn is_degraded(&self) -> bool {
        self.state == SyncState::Degraded
    }

    /// A one-line description for command output.
    pub fn describe(&self) -> String {
        match (&self.state, &self.reason) {
            (SyncState::Committed, _) if self.mirror.is_partial() => {
                "Saved to the published path, the source path was not updated".to_string()
            }
            (SyncState::Committed, _) => "Saved to the remote store".to_string(),
            (SyncState::Idle, _) => "Nothing to save".to_string(),
            (_, Some(reason)) => format!("Saved locally only: {reason}"),
            _ => "Saved locally only".to_string(),
        }
    }
}

/// Loads and saves the dataset. Cloning is cheap and clones share the store and the cache.
#[derive(Clone)]
pub struct Synchronizer {
    store: Option<DynStore>,
    cache: LocalCache,
    settings: SyncSettings,
}

impl Synchronizer {
    /// `store` is `None` when no credential is configured. Every save is then local-only.
    pub fn new(store: Option<DynStore>, cache: LocalCache, settings: SyncSettings) -> Self {
        Self {
            store,
            cache,
            settings,
        }
    }

    /// Builds the synchronizer described by `config`.
    pub async fn from_config(config: &Config, mode: crate::Mode) -> Result<Self> {
        let store = crate::api::store(config, mode)
            .await
            .pub_result(ErrorType::Config)?;
        let cache = config.cache().await?;
        Ok(Self::new(store, cache, config.sync_settings()))
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    pub fn has_remote(&self) -> bool {
        self.store.is_some()
    }

    /// Reads the whole dataset from the published path. Falls back to the local cache when there
    /// is no remote store or it cannot be reached. A document that cannot be parsed reads as the
    /// empty dataset.
    pub async fn load(&self) -> Result<Snapshot> {
        let mut remote_error = None;
        if let Some(store) = &self.store {
            let path = &self.settings.published_path;
            match store.fetch_document(path).await {
                Ok(Some(document)) => {
                    let dataset = Dataset::from_json_lenient(&document.content, path);
                    debug!(
                        "Loaded {} month(s) from {path} at revision {}",
                        dataset.len(),
                        document.revision
                    );
                    return Ok(Snapshot {
                        dataset,
                        revision: Some(document.revision),
                        origin: Origin::Remote,
                        remote_error: None,
                    });
                }
                Ok(None) => {
                    debug!("There is no document at {path} yet");
                    return Ok(Snapshot {
                        dataset: Dataset::new(),
                        revision: None,
                        origin: Origin::Remote,
                        remote_error: None,
                    });
                }
                Err(e) => {
                    warn!("Unable to load from the remote store, using the local cache: {e}");
                    remote_error = Some(e.to_string());
                }
            }
        }

        let cached = self
            .cache
            .load_dataset()
            .await
            .pub_result(ErrorType::Cache)?;
        Ok(match cached {
            Some(dataset) => Snapshot {
                dataset,
                revision: None,
                origin: Origin::Cache,
                remote_error,
            },
            None => Snapshot {
                dataset: Dataset::new(),
                revision: None,
                origin: Origin::Empty,
                remote_error,
            },
        })
    }

    /// Loads a fresh snapshot, applies `mutation` to it and writes the whole dataset back.
    ///
    /// `mutation` may run more than once: after a conflict it is applied again to a newly loaded
    /// snapshot. If it returns an error nothing is written.
    ///
    /// # Errors
    /// - The error returned by `mutation`.
    /// - `Serialization` if the dataset cannot be serialized.
    /// - `Cache` if the local cache cannot be read, or cannot be written while the remote write
    ///   also failed.
    pub async fn mutate<T, F>(&self, mut mutation: F) -> Result<(T, SaveReport)>
    where
        F: FnMut(&mut Dataset) -> Result<T> + Send,
        T: Send,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            enter(SyncState::Loading, attempts);
            let snapshot = self.load().await.inspect_err(fail)?;

            enter(SyncState::Merging, attempts);
            let Snapshot {
                mut dataset,
                revision,
                origin,
                remote_error,
            } = snapshot;
            let value = mutation(&mut dataset).inspect_err(fail)?;

            enter(SyncState::Writing, attempts);
            let content = dataset
                .to_json()
                .pub_result(ErrorType::Serialization)
                .inspect_err(fail)?;
            let cached = self.cache.store_dataset(&dataset).await;
            if let Err(e) = &cached {
                warn!("Unable to write the local cache: {e:#}");
            }

            let published = match (&self.store, origin) {
                (None, _) => Err(Degrade::skipped("no GitHub token is configured")),
                (Some(_), Origin::Cache | Origin::Empty) => Err(Degrade::failed(
                    remote_error.unwrap_or_else(|| "the remote store is unavailable".to_string()),
                )),
                (Some(store), Origin::Remote) => {
                    let path = &self.settings.published_path;
                    let message = commit_message();
                    match store
                        .put_document(path, content.as_bytes(), revision.as_ref(), &message)
                        .await
                    {
                        Ok(new_revision) => Ok((store, new_revision, message)),
                        Err(e) if e.is_conflict() && attempts <= self.settings.conflict_retries => {
                            warn!("{e}, reloading and retrying the save (attempt {attempts})");
                            continue;
                        }
                        Err(e) => Err(Degrade::failed(e.to_string())),
                    }
                }
            };

            let report = match published {
                Ok((store, new_revision, message)) => {
                    let source = self
                        .write_source(&**store, content.as_bytes(), &message)
                        .await;
                    enter(SyncState::Committed, attempts);
                    info!(
                        "Saved {} month(s) to {} at revision {new_revision}",
                        dataset.len(),
                        self.settings.published_path
                    );
                    SaveReport {
                        state: SyncState::Committed,
                        mirror: MirrorReport {
                            published: PathOutcome::Written {
                                revision: new_revision,
                            },
                            source,
                        },
                        attempts,
                        reason: None,
                    }
                }
                Err(degrade) => {
                    if let Err(e) = cached {
                        let error = Error::new(
                            ErrorType::Cache,
                            e.context(format!(
                                "The save was not written anywhere, the remote store was not \
                                written because {}",
                                degrade.reason
                            )),
                        );
                        fail(&error);
                        return Err(error);
                    }
                    enter(SyncState::Degraded, attempts);
                    info!("Saved locally only: {}", degrade.reason);
                    SaveReport {
                        state: SyncState::Degraded,
                        mirror: MirrorReport {
                            published: degrade.published,
                            source: PathOutcome::Skipped,
                        },
                        attempts,
                        reason: Some(degrade.reason),
                    }
                }
            };
            return Ok((value, report));
        }
    }

    /// Writes the mirror copy with its own revision. Failure here never fails the save.
    async fn write_source(
        &self,
        store: &dyn RemoteStore,
        content: &[u8],
        message: &str,
    ) -> PathOutcome {
        let path = &self.settings.source_path;
        let revision = match store.fetch_document(path).await {
            Ok(document) => document.map(|d| d.revision),
            Err(e) => {
                warn!("The save is only partially mirrored, unable to read {path}: {e}");
                return PathOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };
        match store
            .put_document(path, content, revision.as_ref(), message)
            .await
        {
            Ok(revision) => {
                debug!("Mirrored the dataset to {path} at revision {revision}");
                PathOutcome::Written { revision }
            }
            Err(e) => {
                warn!("The save is only partially mirrored, unable to write {path}: {e}");
                PathOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}

/// Why the published path was not written.
struct Degrade {
    reason: String,
    published: PathOutcome,
}

impl Degrade {
    fn skipped(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
            published: PathOutcome::Skipped,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            reason: error.clone(),
            published: PathOutcome::Failed { error },
        }
    }
}

fn enter(state: SyncState, attempt: u32) {
    debug!("sync: {state} (attempt {attempt})");
}

fn fail(error: &Error) {
    debug!("sync: {} ({error})", SyncState::Failed);
}

fn commit_message() -> String {
    format!("Update budget data - {}", Utc::now().to_rfc3339())
}
