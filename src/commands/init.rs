use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the data directory, its subdirectories and:
/// - Creates an initial `config.json` file using `repo_url` along with default settings
/// - Creates the local cache
/// - Saves `token`, if given, to its default location in the secrets directory
///
/// # Arguments
/// - `ledger_home` - The directory that will be the root of data directory, e.g. `$HOME/ledger`
/// - `repo_url` - The GitHub repository that holds the ledger documents, e.g.
///   https://github.com/jdoe/budget
/// - `token` - A GitHub token with write access to the repository's contents
///
/// # Errors
/// - Returns an error if the directory is already initialized or any file operation fails.
pub async fn init(ledger_home: &Path, repo_url: &str, token: Option<&str>) -> Result<Out<()>> {
    let config = Config::create(ledger_home, repo_url, token)
        .await
        .context("Unable to create the data directory and configs")
        .pub_result(ErrorType::Config)?;
    let message = if token.is_some() {
        format!(
            "Successfully created the ledger directory and config for {}",
            config.repo()
        )
    } else {
        format!(
            "Successfully created the ledger directory and config for {}. No token was given, \
            changes will be saved locally until one is provided",
            config.repo()
        )
    };
    Ok(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_twice_fails() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("ledger");
        let out = init(&home, "https://github.com/jdoe/budget", Some("abc"))
            .await
            .unwrap();
        assert!(out.message().contains("jdoe/budget"));
        assert!(home.join("config.json").is_file());
        assert!(home.join("ledger.sqlite").is_file());

        let err = init(&home, "https://github.com/jdoe/budget", None)
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
    }
}
