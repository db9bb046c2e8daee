use thiserror::Error;

/// Errors that can occur during a property search or postcode lookup.
///
/// Every variant is terminal for the call that raised it; a search
/// either fully succeeds or fully fails.
#[derive(Debug, Error)]
pub enum ScoutError {
    /// Bad caller input, reported before any I/O is attempted.
    #[error("validation error: {0}")]
    Validation(String),

    /// The remote store answered with a non-success HTTP status.
    #[error("remote query failed with status {status}: {body}")]
    RemoteQuery { status: u16, body: String },

    /// Network-level failure reaching the remote store. Not retried.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A fetched row is missing a mandatory field.
    #[error("incomplete record: missing field '{0}'")]
    IncompleteRecord(String),

    /// The lookup key has no match in the local reference dataset.
    #[error("not found: {0}")]
    NotFound(String),

    /// An error originating from the underlying SQLite store.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, ScoutError>;
