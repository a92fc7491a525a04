//! chainwindow-evm — EVM JSON-RPC implementation of the ledger client.

pub mod client;
pub mod rpc;

pub use client::{block_from_json, parse_hex_u64, HttpLedgerClient};
pub use rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
