//! Error types for the ledger.
//!
//! Internally the crate works with `anyhow` (see `Res`) so that context can be attached freely.
//! At the public boundary results are converted to `Result`, which tags the error with an
//! `ErrorType` so that callers (the CLI, the HTTP surface) can decide how to report it.

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

/// The internal result type.
pub(crate) type Res<T> = anyhow::Result<T>;

/// The public result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies a public error.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// A request was missing a required value or carried an invalid one. Nothing was written.
    Validation,
    /// The configuration directory or file is missing or invalid.
    Config,
    /// The remote store rejected the credential.
    Auth,
    /// The remote store could not be reached or returned an unexpected status.
    Network,
    /// The remote revision token was stale.
    Conflict,
    /// A stored document could not be serialized or parsed.
    Serialization,
    /// The local durable cache could not be read or written.
    Cache,
    /// Anything else.
    Internal,
}

serde_plain::derive_display_from_serialize!(ErrorType);
serde_plain::derive_fromstr_from_deserialize!(ErrorType);

/// The public error type. It wraps an `anyhow::Error` along with an `ErrorType`.
pub struct Error {
    error_type: ErrorType,
    inner: anyhow::Error,
}

impl Error {
    pub(crate) fn new(error_type: ErrorType, inner: impl Into<anyhow::Error>) -> Self {
        Self {
            error_type,
            inner: inner.into(),
        }
    }

    /// Creates a `Validation` error from a message.
    pub(crate) fn validation(message: impl Display) -> Self {
        Self::new(ErrorType::Validation, anyhow::anyhow!("{message}"))
    }

    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }

    pub fn is_validation(&self) -> bool {
        self.error_type == ErrorType::Validation
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {:?}", self.error_type, self.inner)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // Alternate formatting includes the context chain.
        write!(f, "{:#}", self.inner)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

/// Converts an internal result into a public `Result` tagged with an `ErrorType`.
pub(crate) trait IntoResult<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T, E> IntoResult<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| Error::new(error_type, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_pub_result_keeps_context() {
        let r: Res<()> = Err(anyhow::anyhow!("disk full")).context("Unable to write cache");
        let e = r.pub_result(ErrorType::Cache).unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Cache);
        let message = e.to_string();
        assert!(message.contains("Unable to write cache"), "{message}");
        assert!(message.contains("disk full"), "{message}");
    }

    #[test]
    fn test_error_type_display() {
        assert_eq!(ErrorType::Validation.to_string(), "validation");
        assert_eq!(ErrorType::Network.to_string(), "network");
    }

    #[test]
    fn test_validation() {
        let e = Error::validation("Month is required");
        assert!(e.is_validation());
        assert_eq!(e.to_string(), "Month is required");
    }
}
