use jsonrpsee::types::ErrorObjectOwned;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("internal error: {}", .0.as_deref().unwrap_or("unknown"))]
    InternalError(Option<String>),
    #[error("genesis error: {0}")]
    GenesisError(String),
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("transaction error: {0}")]
    TransactionError(String),
    #[error("database error: {0}")]
    DatabaseError(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("snapshot error: {0}")]
    SnapshotError(String),
    #[error("resource limit exception: {0}")]
    ResourceLimitException(String),
    #[error(
        "authorizing account '{account}' has insufficient objective cpu resources for this transaction, used in window {used}us, allowed in window {allowed}us"
    )]
    TxCpuUsageExceeded {
        account: String,
        used: u128,
        allowed: u128,
    },
    #[error(
        "authorizing account '{account}' has insufficient net resources for this transaction, used in window {used}, allowed in window {allowed}"
    )]
    TxNetUsageExceeded {
        account: String,
        used: u128,
        allowed: u128,
    },
    #[error("block resource exhausted: {0}")]
    BlockResourceExhausted(String),
    #[error("account {account} has insufficient ram; needs {needs} bytes has {available} bytes")]
    RamUsageExceeded {
        account: String,
        needs: u64,
        available: u64,
    },
    #[error("rate limiting state inconsistent: {0}")]
    RateLimitingStateInconsistent(String),
}

impl ChainError {
    /// Consistency violations mean the persisted state is corrupt; callers must
    /// halt instead of failing the transaction.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChainError::RateLimitingStateInconsistent(_))
    }

    /// The block cannot take any more work of the exhausted kind.
    pub fn is_block_exhausted(&self) -> bool {
        matches!(self, ChainError::BlockResourceExhausted(_))
    }

    fn rpc_code(&self) -> i32 {
        match self {
            ChainError::TxCpuUsageExceeded { .. } => 3080004,
            ChainError::TxNetUsageExceeded { .. } => 3080002,
            ChainError::BlockResourceExhausted(_) => 3080005,
            ChainError::RamUsageExceeded { .. } => 3080001,
            ChainError::ResourceLimitException(_) => 3210000,
            ChainError::RateLimitingStateInconsistent(_) => 3210001,
            ChainError::TransactionError(_) => 3040000,
            ChainError::InvalidArgument(_) | ChainError::ParseError(_) => 400,
            ChainError::DatabaseError(_) => 404,
            _ => 500,
        }
    }
}

impl From<ChainError> for ErrorObjectOwned {
    fn from(e: ChainError) -> Self {
        ErrorObjectOwned::owned::<()>(e.rpc_code(), e.to_string(), None)
    }
}
