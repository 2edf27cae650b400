// Error types and error handling module
// This file defines the typed errors that cross module boundaries: upstream
// RPC failures, caller input errors, decimal resolution and per-hop failures
//
// Numan Thabit 2025 Nov

use thiserror::Error;

use crate::token::TokenKey;

/// Failures talking to the chain node.
#[derive(Debug, Error)]
pub enum AggrError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("execution reverted: {0}")]
    Reverted(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("backoff exhausted")]
    BackoffExhausted,
}

/// Malformed request parameters. The only error surfaced to callers of the
/// route query; raised before any network activity.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallerInputError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("sell and buy token are the same")]
    SameToken,
    #[error("tokens span different chains ({sell} vs {buy})")]
    ChainMismatch { sell: u64, buy: u64 },
    #[error("max hops must be 1 or 2, got {0}")]
    InvalidMaxHops(u8),
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("invalid reference price: {0}")]
    InvalidReferencePrice(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecimalFailure {
    Reverted,
    MissingAccessor,
    Transport,
    Timeout,
}

impl DecimalFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecimalFailure::Reverted => "reverted",
            DecimalFailure::MissingAccessor => "missing_accessor",
            DecimalFailure::Transport => "transport",
            DecimalFailure::Timeout => "timeout",
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("cannot resolve decimals for {token}: {}", kind.as_str())]
pub struct DecimalResolutionError {
    pub token: TokenKey,
    pub kind: DecimalFailure,
}

impl DecimalResolutionError {
    pub fn new(token: TokenKey, kind: DecimalFailure) -> Self {
        Self { token, kind }
    }
}

impl From<&AggrError> for DecimalFailure {
    fn from(err: &AggrError) -> Self {
        match err {
            AggrError::Reverted(_) => DecimalFailure::Reverted,
            AggrError::Decode(_) => DecimalFailure::MissingAccessor,
            AggrError::Transport(_) | AggrError::Provider(_) | AggrError::BackoffExhausted => {
                DecimalFailure::Transport
            }
        }
    }
}

/// Outcome of a single hop quote that produced no amount. All of these are
/// routine during route discovery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HopFailure {
    #[error("no pool for hop")]
    NotFound,
    #[error("hop quote timed out")]
    Timeout,
    #[error("decimals unknown for hop token")]
    DecimalsUnknown,
    #[error("venue circuit open")]
    CircuitOpen,
    #[error("transport: {0}")]
    Transport(String),
}

impl HopFailure {
    pub fn reason(&self) -> &'static str {
        match self {
            HopFailure::NotFound => "not_found",
            HopFailure::Timeout => "timeout",
            HopFailure::DecimalsUnknown => "decimals_unknown",
            HopFailure::CircuitOpen => "circuit_open",
            HopFailure::Transport(_) => "transport",
        }
    }

    /// Whether the failure says something about venue health.
    pub fn counts_against_venue(&self) -> bool {
        matches!(self, HopFailure::Timeout | HopFailure::Transport(_))
    }
}

impl From<AggrError> for HopFailure {
    fn from(err: AggrError) -> Self {
        match err {
            AggrError::Reverted(_) => HopFailure::NotFound,
            other => HopFailure::Transport(other.to_string()),
        }
    }
}
