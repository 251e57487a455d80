//! Error types for the replay binary.

use starclick_core::{CatalogError, ConfigError};
use starclick_db::DbError;
use starclick_service::ServiceError;

use crate::script::ScriptError;

/// Top-level error for `starclick-replay`.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// Bad command-line arguments.
    #[error("{message}\n\nusage: starclick-replay <script.json> [--config <path>] [--catalog <path>] [--seed <n>] [--postgres]")]
    Usage {
        /// What was wrong.
        message: String,
    },

    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// Catalog loading failed.
    #[error("catalog error: {source}")]
    Catalog {
        /// The underlying catalog error.
        #[from]
        source: CatalogError,
    },

    /// Script loading failed.
    #[error("script error: {source}")]
    Script {
        /// The underlying script error.
        #[from]
        source: ScriptError,
    },

    /// The `PostgreSQL` backend could not be opened.
    #[error("database error: {source}")]
    Database {
        /// The underlying database error.
        #[from]
        source: DbError,
    },

    /// A query against the service failed after the script ran.
    #[error("service error: {source}")]
    Service {
        /// The underlying service error.
        #[from]
        source: ServiceError,
    },

    /// Writing the report failed.
    #[error("write error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A report line could not be serialized.
    #[error("output error: {source}")]
    Output {
        /// The underlying serialization error.
        #[from]
        source: serde_json::Error,
    },

    /// At least one player's ledger disagrees with their state.
    #[error("{count} player ledger(s) failed reconciliation")]
    Unbalanced {
        /// Number of players with an anomaly.
        count: usize,
    },
}
