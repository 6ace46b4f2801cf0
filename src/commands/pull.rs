use crate::api::Revision;
use crate::backup::PULL;
use crate::commands::Out;
use crate::error::{Error, ErrorType, IntoResult};
use crate::ledger::Ledger;
use crate::sync::Origin;
use crate::{Config, Mode, Result};
use anyhow::anyhow;
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

/// What `ledger pull` downloaded and where it kept copies.
#[derive(Debug, Clone, Serialize)]
pub struct Pulled {
    pub months: usize,
    /// `None` when there is no remote document yet.
    pub revision: Option<Revision>,
    pub backup: PathBuf,
    /// The local cache as it was before the pull.
    pub cache_backup: Option<PathBuf>,
}

/// Downloads the published dataset and replaces the local cache with it.
///
/// Before anything is replaced, the downloaded dataset is saved to the backups directory as
/// `pull.YYYY-MM-DD-NNN.json` and the cache file is copied next to it.
///
/// # Errors
/// - `Config` when no GitHub token is configured.
/// - The remote error when the remote store cannot be read. Nothing is changed locally.
/// - `Validation` when nothing has been published yet but the local cache holds months, which
///   would otherwise be replaced by an empty ledger.
pub async fn pull(config: Config, mode: Mode) -> Result<Out<Pulled>> {
    let ledger = Ledger::open(&config, mode).await?;
    let sync = ledger.synchronizer();
    if !sync.has_remote() {
        return Err(Error::new(
            ErrorType::Config,
            anyhow!(
                "There is no GitHub token, provide one in {} or through LEDGER_GITHUB_TOKEN",
                config.token_path().display()
            ),
        ));
    }

    let snapshot = ledger.load().await?;
    if snapshot.origin() != Origin::Remote {
        return Err(Error::new(
            ErrorType::Network,
            anyhow!(
                "Unable to download the ledger: {}",
                snapshot
                    .remote_error()
                    .unwrap_or("the remote store is unavailable")
            ),
        ));
    }

    if snapshot.revision().is_none() {
        let cached = sync
            .cache()
            .load_dataset()
            .await
            .pub_result(ErrorType::Cache)?
            .unwrap_or_default();
        if !cached.is_empty() {
            return Err(Error::validation(format!(
                "Nothing has been published to {} yet, refusing to replace the {} month(s) in \
                the local cache with an empty ledger. Save a change to publish them first",
                config.repo(),
                cached.len()
            )));
        }
    }

    let backup = config.backup();
    let backup_path = backup
        .save_json(PULL, snapshot.dataset())
        .await
        .pub_result(ErrorType::Internal)?;
    debug!("Saved the downloaded ledger to {}", backup_path.display());
    let cache_backup = backup
        .copy_cache()
        .await
        .pub_result(ErrorType::Internal)?;

    sync.cache()
        .store_dataset(snapshot.dataset())
        .await
        .pub_result(ErrorType::Cache)?;

    let pulled = Pulled {
        months: snapshot.dataset().len(),
        revision: snapshot.revision().cloned(),
        backup: backup_path,
        cache_backup,
    };
    Ok(Out::new(
        format!(
            "Downloaded {} month(s) from {} into the local cache",
            pulled.months,
            config.repo()
        ),
        pulled,
    ))
}
