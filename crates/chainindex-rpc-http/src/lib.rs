//! chainindex-rpc-http — the concrete HTTP transport for
//! [`chainindex_rpc::RpcTransport`], used by both chain node adapters.

pub mod client;

pub use client::{HttpClientConfig, HttpRpcClient};
