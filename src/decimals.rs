// Token decimal resolution
// Resolves the precision of every token a query touches. Results live in a
// process-wide insert-only cache: decimals never change on-chain, so entries
// are never invalidated. Failures are per token and are never cached.
//
// Numan Thabit 2025 Nov

use alloy_sol_types::SolCall;
use async_trait::async_trait;
use futures::future::join_all;
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

use crate::errors::{DecimalFailure, DecimalResolutionError};
use crate::token::{Token, TokenKey, TokenStandard};
use crate::transport::abi::{IERC20Metadata, IERC6909Metadata};
use crate::transport::EthCall;

/// Where decimals come from when the cache misses.
#[async_trait]
pub trait DecimalsSource: Send + Sync {
    async fn read_decimals(&self, token: &Token) -> Result<u8, DecimalFailure>;
}

/// Reads `decimals()` (ERC-20) or `decimals(id)` (ERC-6909) over eth_call.
pub struct OnchainDecimals {
    rpc: Arc<dyn EthCall>,
}

impl OnchainDecimals {
    pub fn new(rpc: Arc<dyn EthCall>) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl DecimalsSource for OnchainDecimals {
    async fn read_decimals(&self, token: &Token) -> Result<u8, DecimalFailure> {
        let data = match (token.standard, token.sub_id) {
            (TokenStandard::Fungible, _) => IERC20Metadata::decimalsCall {}.abi_encode(),
            (TokenStandard::MultiToken, Some(id)) => IERC6909Metadata::decimalsCall { id }.abi_encode(),
            // Native currency has no contract; multi-token without id cannot be read.
            _ => return Err(DecimalFailure::MissingAccessor),
        };
        let raw = self
            .rpc
            .call(token.address, data)
            .await
            .map_err(|e| DecimalFailure::from(&e))?;
        if raw.is_empty() {
            return Err(DecimalFailure::MissingAccessor);
        }
        // Both accessors share the uint8 return layout.
        IERC20Metadata::decimalsCall::abi_decode_returns(&raw)
            .map_err(|_| DecimalFailure::MissingAccessor)
    }
}

static GLOBAL_CACHE: Lazy<Arc<DecimalCache>> = Lazy::new(|| Arc::new(DecimalCache::default()));

#[derive(Debug, Default)]
pub struct DecimalCache {
    inner: RwLock<HashMap<TokenKey, u8>>,
}

impl DecimalCache {
    /// The process-wide cache.
    pub fn shared() -> Arc<DecimalCache> {
        Arc::clone(&GLOBAL_CACHE)
    }

    pub fn get(&self, key: &TokenKey) -> Option<u8> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard.get(key).copied()
    }

    /// Insert unless present; returns the value that ends up cached.
    pub fn insert_if_absent(&self, key: TokenKey, decimals: u8) -> u8 {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard.entry(key).or_insert(decimals)
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of resolving a batch of tokens.
#[derive(Debug, Clone, Default)]
pub struct ResolvedDecimals {
    pub decimals: HashMap<TokenKey, u8>,
    pub failures: Vec<DecimalResolutionError>,
}

impl ResolvedDecimals {
    pub fn get(&self, key: &TokenKey) -> Option<u8> {
        self.decimals.get(key).copied()
    }

    pub fn is_resolved(&self, key: &TokenKey) -> bool {
        self.decimals.contains_key(key)
    }
}

pub struct DecimalResolver {
    source: Arc<dyn DecimalsSource>,
    cache: Arc<DecimalCache>,
    native_decimals: u8,
    call_timeout: Duration,
}

impl DecimalResolver {
    pub fn new(
        source: Arc<dyn DecimalsSource>,
        cache: Arc<DecimalCache>,
        native_decimals: u8,
        call_timeout: Duration,
    ) -> Self {
        Self {
            source,
            cache,
            native_decimals,
            call_timeout,
        }
    }

    pub fn cache(&self) -> &Arc<DecimalCache> {
        &self.cache
    }

    /// Resolve every distinct token, reading uncached ones concurrently.
    pub async fn resolve_decimals(&self, tokens: &[Token]) -> ResolvedDecimals {
        let mut out = ResolvedDecimals::default();
        let mut pending: BTreeMap<TokenKey, &Token> = BTreeMap::new();

        for token in tokens {
            let key = token.key();
            if out.decimals.contains_key(&key) || pending.contains_key(&key) {
                continue;
            }
            if token.is_native() {
                out.decimals.insert(key, self.native_decimals);
            } else if let Some(d) = self.cache.get(&key) {
                out.decimals.insert(key, d);
            } else {
                pending.insert(key, token);
            }
        }

        if pending.is_empty() {
            return out;
        }

        let reads = pending.iter().map(|(key, token)| async move {
            let res = tokio::time::timeout(self.call_timeout, self.source.read_decimals(token))
                .await
                .unwrap_or(Err(DecimalFailure::Timeout));
            (*key, *token, res)
        });

        for (key, token, res) in join_all(reads).await {
            match res {
                Ok(read) => {
                    let stored = self.cache.insert_if_absent(key, read);
                    if let Some(declared) = token.decimals.filter(|d| *d != stored) {
                        warn!(
                            token = %token.label(),
                            declared,
                            resolved = stored,
                            "declared decimals disagree with chain; using chain value"
                        );
                    }
                    debug!(token = %token.label(), decimals = stored, "resolved decimals");
                    out.decimals.insert(key, stored);
                }
                Err(kind) => {
                    warn!(
                        token = %token.label(),
                        key = %key,
                        reason = kind.as_str(),
                        "decimal resolution failed; token disqualified"
                    );
                    out.failures.push(DecimalResolutionError::new(key, kind));
                }
            }
        }
        out
    }
}
