// Transport layer
// JSON-RPC access to the chain node and the ABI of the read-only contracts
// the venue adapters and decimal resolver call
//
// Numan Thabit 2025 Nov

pub mod abi;
pub mod jsonrpc;

pub use jsonrpc::{EthCall, JsonRpc};
