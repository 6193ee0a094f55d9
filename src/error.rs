use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReportError>;

/// Fatal categories only. A failure that degrades a single report field is
/// folded into `chain::Reading::Unavailable` at the call site instead of
/// surfacing here.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("network error: {0}")]
    Rpc(#[from] RpcError),
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no service configuration found under any of {searched} search roots")]
    NoServiceFound { searched: usize },
    #[error("incomplete service configuration: missing required field `{field}`")]
    IncompleteConfiguration { field: &'static str },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("invalid URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("no reachable RPC endpoint after probing {attempted} candidates")]
    NoReachableEndpoint { attempted: usize },
    #[error("transport failure: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("staking state unavailable: {0}")]
    StateUnavailable(String),
    #[error("contract returned unknown staking state value {0}")]
    UnknownStakingState(u8),
}
