//! Backup management for local file backups taken when the remote dataset is pulled.

use crate::error::Res;
use crate::model::Dataset;
use crate::{utils, Config};
use anyhow::Context;
use chrono::Local;
use std::path::PathBuf;

/// Prefix for the dataset downloaded by `pull`.
pub const PULL: &str = "pull";

/// Prefix for copies of the local cache taken before `pull` replaces it.
pub const CACHE: &str = "ledger.sqlite";

/// Manages backup file creation and rotation.
///
/// The `Backup` struct is immutable and owns copies of the paths and settings it needs.
/// Create a new instance via `Config::backup()` or `Backup::new()`.
#[derive(Debug, Clone)]
pub struct Backup {
    backups_dir: PathBuf,
    backup_copies: u32,
    cache_path: PathBuf,
}

impl Backup {
    pub fn new(config: &Config) -> Self {
        Self {
            backups_dir: config.backups().to_path_buf(),
            backup_copies: config.backup_copies(),
            cache_path: config.cache_path().to_path_buf(),
        }
    }

    /// Saves a `Dataset` as an indented JSON backup file.
    ///
    /// The filename format is `{prefix}.YYYY-MM-DD-NNN.json` where NNN is a sequence number.
    /// Automatically rotates old backups, keeping only `backup_copies` files.
    ///
    /// Returns the path to the created backup file.
    pub(crate) async fn save_json(&self, prefix: &str, dataset: &Dataset) -> Res<PathBuf> {
        let date = today();
        let seq = self.next_sequence_number(prefix, &date, "json").await?;
        let path = self.backups_dir.join(format!("{prefix}.{date}-{seq:03}.json"));

        utils::write(&path, dataset.to_json()?).await?;
        self.rotate(prefix, "json").await?;
        Ok(path)
    }

    /// Copies the local cache file to the backups directory as `ledger.sqlite.YYYY-MM-DD-NNN`.
    /// Returns `None` if there is no cache file yet.
    pub(crate) async fn copy_cache(&self) -> Res<Option<PathBuf>> {
        if !self.cache_path.is_file() {
            return Ok(None);
        }
        let date = today();
        let seq = self.next_sequence_number(CACHE, &date, "").await?;
        let path = self.backups_dir.join(format!("{CACHE}.{date}-{seq:03}"));

        utils::copy(&self.cache_path, &path).await?;
        self.rotate(CACHE, "").await?;
        Ok(Some(path))
    }

    /// Scans the backups directory for existing files with the given prefix and date,
    /// and returns the next sequence number.
    async fn next_sequence_number(&self, prefix: &str, date: &str, extension: &str) -> Res<u32> {
        let pattern_start = format!("{prefix}.{date}-");
        let mut max_seq: u32 = 0;

        let mut dir = utils::read_dir(&self.backups_dir).await?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .context("Failed to read directory entry")?
        {
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            if name.starts_with(&pattern_start) {
                if let Some(seq) = parse_sequence_number(&name, prefix, date, extension) {
                    max_seq = max_seq.max(seq);
                }
            }
        }

        Ok(max_seq + 1)
    }

    /// Deletes the oldest backups with the given prefix until at most `backup_copies` remain.
    async fn rotate(&self, prefix: &str, extension: &str) -> Res<()> {
        let mut files: Vec<(PathBuf, String)> = Vec::new();

        let mut dir = utils::read_dir(&self.backups_dir).await?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .context("Failed to read directory entry")?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if is_backup_file(&name, prefix, extension) {
                files.push((entry.path(), name));
            }
        }

        // The name format sorts by date, then sequence number.
        files.sort_by(|a, b| a.1.cmp(&b.1));

        let to_delete = files.len().saturating_sub(self.backup_copies as usize);
        for (path, _) in files.into_iter().take(to_delete) {
            utils::remove(&path).await?;
        }

        Ok(())
    }
}

/// Returns today's date in YYYY-MM-DD format.
fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Parses the sequence number from `{prefix}.{date}-{NNN}.{ext}`, or `{prefix}.{date}-{NNN}` when
/// `extension` is empty.
fn parse_sequence_number(filename: &str, prefix: &str, date: &str, extension: &str) -> Option<u32> {
    let remainder = filename.strip_prefix(&format!("{prefix}.{date}-"))?;
    let seq_str = if extension.is_empty() {
        remainder
    } else {
        remainder.strip_suffix(&format!(".{extension}"))?
    };
    seq_str.parse().ok()
}

fn is_backup_file(filename: &str, prefix: &str, extension: &str) -> bool {
    let starts_ok = filename.starts_with(&format!("{prefix}."));
    let ends_ok = if extension.is_empty() {
        !filename.ends_with(".json")
    } else {
        filename.ends_with(&format!(".{extension}"))
    };
    starts_ok && ends_ok
}
