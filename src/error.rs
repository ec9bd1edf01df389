//! Error taxonomy surfaced to clients of the core (spec §7).

use thiserror::Error;

/// The stable error kinds a client of the daemon can observe, independent of
/// the transport (HTTP status, JSON-RPC code, CLI exit message) that carries
/// them.
#[derive(Debug, Error)]
pub enum SemadexError {
    /// Malformed input: missing fields, empty query, `top_k` out of range.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An index name was used that isn't in the registry.
    #[error("unknown index: {0}")]
    UnknownIndex(String),

    /// No default index is configured and none was given explicitly.
    #[error("no index loaded and none specified")]
    IndexNotLoaded,

    /// The embedder call failed; retryable by the client.
    #[error("embedder failure: {0}")]
    EmbedderFailure(String),

    /// Filesystem read/write failed. Indexing aborts the pass with no
    /// partial commit; queries surface it directly.
    #[error("io failure: {0}")]
    IoFailure(#[from] std::io::Error),

    /// A persisted artifact (store/graph/BM25) failed to (de)serialize.
    /// The index manager keeps its previous engine active when this occurs
    /// during a load.
    #[error("corrupt artifact: {0}")]
    CorruptArtifact(String),
}

impl SemadexError {
    /// Stable string tag matching spec §7's `Kind` column, for transports
    /// that need a machine-readable error code (JSON-RPC `code`/`error.code`,
    /// HTTP response body `code`).
    pub fn kind(&self) -> &'static str {
        match self {
            SemadexError::InvalidRequest(_) => "INVALID_REQUEST",
            SemadexError::UnknownIndex(_) => "UNKNOWN_INDEX",
            SemadexError::IndexNotLoaded => "INDEX_NOT_LOADED",
            SemadexError::EmbedderFailure(_) => "EMBEDDER_FAILURE",
            SemadexError::IoFailure(_) => "IO_FAILURE",
            SemadexError::CorruptArtifact(_) => "CORRUPT_ARTIFACT",
        }
    }
}

pub type Result<T> = std::result::Result<T, SemadexError>;
