//! Configuration file handling for the ledger.
//!
//! The configuration file is stored at `$LEDGER_HOME/config.json` and contains the repository that
//! holds the ledger documents, the document paths, backup settings and the synchronization tuning
//! knobs.

use crate::api::RepoId;
use crate::backup::Backup;
use crate::cache::LocalCache;
use crate::error::{ErrorType, IntoResult, Res};
use crate::sync::SyncSettings;
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// When set and non-empty, used as the GitHub token instead of the token file.
pub const TOKEN_ENV: &str = "LEDGER_GITHUB_TOKEN";

const APP_NAME: &str = "ledger";
const CONFIG_VERSION: u8 = 1;
const BACKUP_COPIES: u32 = 5;
const AUTOSAVE_MS: u64 = 1000;
const CONFLICT_RETRIES: u32 = 3;
const BRANCH: &str = "main";
const PUBLISHED_PATH: &str = "public/budget.json";
const SOURCE_PATH: &str = "data/budget.json";
const API_URL: &str = "https://api.github.com";
const SECRETS: &str = ".secrets";
const BACKUPS: &str = ".backups";
const TOKEN_FILE: &str = "token";
const CONFIG_JSON: &str = "config.json";
const LEDGER_SQLITE: &str = "ledger.sqlite";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$LEDGER_HOME` and from there it loads `$LEDGER_HOME/config.json`. It provides
/// paths to other items that are either configurable or are expected in a certain location within
/// the ledger home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    backups: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    repo: RepoId,
    cache_path: PathBuf,
}

impl Config {
    /// Creates the data directory, its subdirectories, an initial `config.json` and the local
    /// cache. If `token` is given it is written to the token file, readable only by the current
    /// user.
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the root of the data directory, e.g. `$HOME/ledger`
    /// - `repo_url` - The GitHub repository holding the ledger documents, e.g.
    ///   `https://github.com/jdoe/budget`
    /// - `token` - A GitHub token with write access to the repository's contents
    pub async fn create(
        dir: impl Into<PathBuf>,
        repo_url: &str,
        token: Option<&str>,
    ) -> Result<Self> {
        Self::create_inner(dir.into(), repo_url, token)
            .await
            .pub_result(ErrorType::Config)
    }

    async fn create_inner(dir: PathBuf, repo_url: &str, token: Option<&str>) -> Res<Self> {
        let repo = RepoId::from_url(repo_url)?;

        utils::make_dir(&dir)
            .await
            .context("Unable to create the ledger home directory")?;
        let root = utils::canonicalize(&dir).await?;

        let backups = root.join(BACKUPS);
        utils::make_dir(&backups).await?;
        let secrets = root.join(SECRETS);
        utils::make_dir(&secrets).await?;

        let config_path = root.join(CONFIG_JSON);
        if config_path.exists() {
            bail!(
                "A ledger home already exists at '{}'",
                config_path.display()
            );
        }
        let config_file = ConfigFile::new(repo_url.to_string());
        config_file.save(&config_path).await?;

        let cache_path = root.join(LEDGER_SQLITE);
        LocalCache::open(&cache_path)
            .await
            .context("Unable to create the local cache")?;

        let config = Self {
            root,
            backups,
            secrets,
            config_path,
            config_file,
            repo,
            cache_path,
        };
        if let Some(token) = token {
            config.save_token(token).await?;
        }
        Ok(config)
    }

    /// This will
    /// - validate that `ledger_home` exists and that the config file exists
    /// - load the config file
    /// - validate that the backups and secrets directories exist
    /// - return the loaded configuration object
    pub async fn load(ledger_home: impl Into<PathBuf>) -> Result<Self> {
        Self::load_inner(ledger_home.into())
            .await
            .pub_result(ErrorType::Config)
    }

    async fn load_inner(ledger_home: PathBuf) -> Res<Self> {
        let root = utils::canonicalize(&ledger_home)
            .await
            .context("The ledger home is missing, run 'ledger init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;
        let repo = RepoId::from_url(&config_file.repo_url)
            .context("Failed to read the repository from repo_url")?;

        let config = Self {
            backups: root.join(BACKUPS),
            secrets: root.join(SECRETS),
            cache_path: root.join(LEDGER_SQLITE),
            root,
            config_path,
            config_file,
            repo,
        };
        if !config.backups.is_dir() {
            bail!(
                "The backups directory is missing '{}'",
                config.backups.display()
            )
        }
        if !config.secrets.is_dir() {
            bail!(
                "The secrets directory is missing '{}'",
                config.secrets.display()
            )
        }
        Ok(config)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn backups(&self) -> &Path {
        &self.backups
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    pub fn repo_url(&self) -> &str {
        &self.config_file.repo_url
    }

    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    pub fn branch(&self) -> &str {
        &self.config_file.branch
    }

    pub fn api_url(&self) -> &str {
        &self.config_file.api_url
    }

    pub fn published_path(&self) -> &str {
        &self.config_file.published_path
    }

    pub fn source_path(&self) -> &str {
        &self.config_file.source_path
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    pub fn backup_copies(&self) -> u32 {
        self.config_file.backup_copies
    }

    /// The quiet period after the last edit before autosave writes.
    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.config_file.autosave_ms)
    }

    pub fn conflict_retries(&self) -> u32 {
        self.config_file.conflict_retries
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            published_path: self.published_path().to_string(),
            source_path: self.source_path().to_string(),
            conflict_retries: self.conflict_retries(),
        }
    }

    /// Creates a new `Backup` instance for managing backup files.
    pub fn backup(&self) -> Backup {
        Backup::new(self)
    }

    /// Opens the local cache.
    pub async fn cache(&self) -> Result<LocalCache> {
        LocalCache::open(&self.cache_path)
            .await
            .pub_result(ErrorType::Cache)
    }

    /// Returns the stored `token_path` if it is absolute, otherwise resolves the relative path.
    pub fn token_path(&self) -> PathBuf {
        let p = self.config_file.token_path();
        if p.is_absolute() {
            return p;
        }
        self.root.join(p)
    }

    /// The GitHub token: `LEDGER_GITHUB_TOKEN` if it is set and non-empty, otherwise the contents
    /// of the token file, otherwise `None`.
    pub async fn token(&self) -> Res<Option<String>> {
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.trim().is_empty() {
                return Ok(Some(token.trim().to_string()));
            }
        }
        let path = self.token_path();
        if !path.is_file() {
            return Ok(None);
        }
        let token = utils::read(&path).await?;
        let token = token.trim();
        Ok((!token.is_empty()).then(|| token.to_string()))
    }

    /// Writes `token` to the token file.
    pub async fn save_token(&self, token: &str) -> Res<()> {
        utils::write_secret(self.token_path(), token.trim())
            .await
            .context("Unable to save the GitHub token")
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "ledger",
///   "config_version": 1,
///   "repo_url": "https://github.com/jdoe/budget",
///   "branch": "main",
///   "published_path": "public/budget.json",
///   "source_path": "data/budget.json",
///   "api_url": "https://api.github.com",
///   "backup_copies": 5,
///   "autosave_ms": 1000,
///   "conflict_retries": 3,
///   "token_path": ".secrets/token"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "ledger"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// URL of the GitHub repository that holds the ledger documents
    repo_url: String,

    #[serde(default = "default_branch")]
    branch: String,

    /// The authoritative copy of the dataset
    #[serde(default = "default_published_path")]
    published_path: String,

    /// The mirrored copy of the dataset
    #[serde(default = "default_source_path")]
    source_path: String,

    #[serde(default = "default_api_url")]
    api_url: String,

    /// Number of backup copies to keep
    #[serde(default = "default_backup_copies")]
    backup_copies: u32,

    #[serde(default = "default_autosave_ms")]
    autosave_ms: u64,

    /// How many times a save reloads and retries after a stale revision
    #[serde(default = "default_conflict_retries")]
    conflict_retries: u32,

    /// Path to the GitHub token file (optional, relative to config.json or absolute)
    /// Defaults to $LEDGER_HOME/.secrets/token if not specified
    #[serde(skip_serializing_if = "Option::is_none")]
    token_path: Option<PathBuf>,
}

fn default_branch() -> String {
    BRANCH.to_string()
}

fn default_published_path() -> String {
    PUBLISHED_PATH.to_string()
}

fn default_source_path() -> String {
    SOURCE_PATH.to_string()
}

fn default_api_url() -> String {
    API_URL.to_string()
}

fn default_backup_copies() -> u32 {
    BACKUP_COPIES
}

fn default_autosave_ms() -> u64 {
    AUTOSAVE_MS
}

fn default_conflict_retries() -> u32 {
    CONFLICT_RETRIES
}

impl ConfigFile {
    fn new(repo_url: String) -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            repo_url,
            branch: default_branch(),
            published_path: default_published_path(),
            source_path: default_source_path(),
            api_url: default_api_url(),
            backup_copies: BACKUP_COPIES,
            autosave_ms: AUTOSAVE_MS,
            conflict_retries: CONFLICT_RETRIES,
            token_path: None,
        }
    }

    async fn load(path: &Path) -> Res<Self> {
        let config: ConfigFile = utils::deserialize(path).await?;
        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            config.published_path != config.source_path,
            "published_path and source_path must differ, both are '{}'",
            config.published_path
        );
        Ok(config)
    }

    async fn save(&self, path: &Path) -> Res<()> {
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(path, data)
            .await
            .context("Unable to write config file")
    }

    /// If the path is relative, it is interpreted as relative to the config.json file.
    fn token_path(&self) -> PathBuf {
        self.token_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(TOKEN_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const REPO_URL: &str = "https://github.com/jdoe/budget";

    #[tokio::test]
    async fn test_config_create() {
        let dir = TempDir::new().unwrap();
        let home_dir = dir.path().join("ledger_home");

        let config = Config::create(&home_dir, REPO_URL, Some("ghp_abc\n"))
            .await
            .unwrap();

        assert_eq!(REPO_URL, config.repo_url());
        assert_eq!("jdoe/budget", config.repo().to_string());
        assert_eq!("public/budget.json", config.published_path());
        assert_eq!("data/budget.json", config.source_path());
        assert_eq!(Duration::from_millis(1000), config.autosave_delay());
        assert_eq!(3, config.conflict_retries());
        assert!(config.backups().is_dir());
        assert!(config.secrets().is_dir());
        assert!(config.cache_path().is_file());
        assert_eq!(
            utils::read(&config.token_path()).await.unwrap(),
            "ghp_abc"
        );
    }

    #[tokio::test]
    async fn test_config_create_twice_fails() {
        let dir = TempDir::new().unwrap();
        Config::create(dir.path(), REPO_URL, None).await.unwrap();
        let err = Config::create(dir.path(), REPO_URL, None)
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
    }

    #[tokio::test]
    async fn test_config_load() {
        let dir = TempDir::new().unwrap();
        let created = Config::create(dir.path(), REPO_URL, None).await.unwrap();
        let loaded = Config::load(dir.path()).await.unwrap();
        assert_eq!(created.config_file, loaded.config_file);
        assert_eq!(created.root(), loaded.root());
    }

    #[tokio::test]
    async fn test_config_load_missing_home() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(dir.path().join("nope")).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
    }

    #[tokio::test]
    async fn test_config_file_load_with_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let json = r#"{
            "app_name": "ledger",
            "config_version": 1,
            "repo_url": "https://github.com/jdoe/budget"
        }"#;
        utils::write(&config_path, json).await.unwrap();

        let config = ConfigFile::load(&config_path).await.unwrap();
        assert_eq!(config, ConfigFile::new(REPO_URL.to_string()));
        assert_eq!(config.token_path(), PathBuf::from(SECRETS).join(TOKEN_FILE));
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_app_name() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let json = r#"{
            "app_name": "wrong_app",
            "config_version": 1,
            "repo_url": "https://github.com/jdoe/budget"
        }"#;
        utils::write(&config_path, json).await.unwrap();

        let err = ConfigFile::load(&config_path).await.unwrap_err();
        assert!(err.to_string().contains("Invalid app_name"));
    }

    #[tokio::test]
    async fn test_config_file_rejects_identical_paths() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let json = r#"{
            "app_name": "ledger",
            "config_version": 1,
            "repo_url": "https://github.com/jdoe/budget",
            "published_path": "budget.json",
            "source_path": "budget.json"
        }"#;
        utils::write(&config_path, json).await.unwrap();
        assert!(ConfigFile::load(&config_path).await.is_err());
    }

    #[test]
    fn test_config_file_serialization_omits_none_fields() {
        let json = serde_json::to_string(&ConfigFile::new(REPO_URL.to_string())).unwrap();
        assert!(!json.contains("token_path"));
        assert!(json.contains("\"conflict_retries\":3"));
    }

    #[tokio::test]
    async fn test_token_absent() {
        let dir = TempDir::new().unwrap();
        let config = Config::create(dir.path(), REPO_URL, None).await.unwrap();
        // Only meaningful when the environment does not provide one.
        if std::env::var(TOKEN_ENV).is_err() {
            assert_eq!(config.token().await.unwrap(), None);
        }
        config.save_token("  ghp_xyz  ").await.unwrap();
        if std::env::var(TOKEN_ENV).is_err() {
            assert_eq!(config.token().await.unwrap().as_deref(), Some("ghp_xyz"));
        }
    }
}
