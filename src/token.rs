// Token identity and swap mode
// Tokens are identified by (chain, contract, optional sub-id); everything
// else on them is display metadata
//
// Numan Thabit 2025 Nov

use alloy_primitives::{address, Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::CallerInputError;

/// Pseudo-address used for the chain's native currency.
pub const NATIVE_ADDRESS: Address = address!("eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenKey {
    pub chain_id: u64,
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_id: Option<U256>,
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sub_id {
            Some(id) => write!(f, "{}:{}#{}", self.chain_id, self.address, id),
            None => write!(f, "{}:{}", self.chain_id, self.address),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStandard {
    #[default]
    Fungible,
    MultiToken,
    Native,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub chain_id: u64,
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_id: Option<U256>,
    #[serde(default)]
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub standard: TokenStandard,
    /// Decimals as declared by the caller's token list. Advisory only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
}

impl Token {
    pub fn erc20(chain_id: u64, address: Address, symbol: &str) -> Self {
        Self {
            chain_id,
            address,
            sub_id: None,
            symbol: symbol.to_string(),
            name: None,
            standard: TokenStandard::Fungible,
            decimals: None,
        }
    }

    pub fn native(chain_id: u64, symbol: &str) -> Self {
        Self {
            standard: TokenStandard::Native,
            ..Self::erc20(chain_id, NATIVE_ADDRESS, symbol)
        }
    }

    pub fn multi_token(chain_id: u64, address: Address, id: U256, symbol: &str) -> Self {
        Self {
            sub_id: Some(id),
            standard: TokenStandard::MultiToken,
            ..Self::erc20(chain_id, address, symbol)
        }
    }

    pub fn key(&self) -> TokenKey {
        TokenKey {
            chain_id: self.chain_id,
            address: self.address,
            sub_id: self.sub_id,
        }
    }

    pub fn is_native(&self) -> bool {
        self.standard == TokenStandard::Native
    }

    /// Label used in logs and route keys.
    pub fn label(&self) -> String {
        if self.symbol.is_empty() {
            self.key().to_string()
        } else {
            self.symbol.clone()
        }
    }

    pub fn validate(&self) -> Result<(), CallerInputError> {
        match self.standard {
            TokenStandard::MultiToken if self.sub_id.is_none() => Err(
                CallerInputError::InvalidToken(format!("{} is multi-token but has no sub-id", self.label())),
            ),
            TokenStandard::Fungible | TokenStandard::Native if self.sub_id.is_some() => Err(
                CallerInputError::InvalidToken(format!("{} carries a sub-id but is not multi-token", self.label())),
            ),
            TokenStandard::Fungible | TokenStandard::MultiToken if self.address == Address::ZERO => Err(
                CallerInputError::InvalidToken(format!("{} has the zero address", self.label())),
            ),
            _ => Ok(()),
        }
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Token {}

impl std::hash::Hash for Token {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

/// Which side of the trade is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwapMode {
    ExactIn,
    ExactOut,
}

impl SwapMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapMode::ExactIn => "EXACT_IN",
            SwapMode::ExactOut => "EXACT_OUT",
        }
    }
}
