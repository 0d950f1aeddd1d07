use thiserror::Error;
use uuid::Uuid;

/// Result alias for MongoDB backend operations.
pub type MongoResult<T> = Result<T, MongoDaoError>;

/// Failures raised by the MongoDB match store.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The configured URI could not be parsed.
    #[error("invalid MongoDB URI `{uri}`")]
    InvalidUri {
        /// The offending URI.
        uri: String,
        /// Driver error.
        #[source]
        source: mongodb::error::Error,
    },
    /// The driver client could not be constructed.
    #[error("failed to construct MongoDB client")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: mongodb::error::Error,
    },
    /// The initial connectivity ping never succeeded.
    #[error("MongoDB did not answer the initial ping after {attempts} attempts")]
    InitialPing {
        /// Number of ping attempts made.
        attempts: u32,
        /// Driver error from the last attempt.
        #[source]
        source: mongodb::error::Error,
    },
    /// Creating a collection index failed.
    #[error("failed to ensure index `{index}` on `{collection}`")]
    EnsureIndex {
        /// Collection name.
        collection: &'static str,
        /// Index description.
        index: &'static str,
        /// Driver error.
        #[source]
        source: mongodb::error::Error,
    },
    /// A health-check ping failed.
    #[error("MongoDB health ping failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: mongodb::error::Error,
    },
    /// A read or write against the `matches` collection failed.
    #[error("match operation `{operation}` failed for `{id}`")]
    MatchOp {
        /// Name of the failed operation.
        operation: &'static str,
        /// Match id.
        id: Uuid,
        /// Driver error.
        #[source]
        source: mongodb::error::Error,
    },
    /// A read or write against the `rounds` collection failed.
    #[error("round operation `{operation}` failed for match `{match_id}`")]
    RoundOp {
        /// Name of the failed operation.
        operation: &'static str,
        /// Match id the round belongs to.
        match_id: Uuid,
        /// Driver error.
        #[source]
        source: mongodb::error::Error,
    },
}
