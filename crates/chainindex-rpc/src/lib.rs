//! chainindex-rpc — the JSON-RPC 2.0 transport shared by the Cosmos and
//! EVM node adapters.
//!
//! # Overview
//!
//! Both chain backends speak JSON-RPC 2.0 over HTTP; this crate owns the
//! envelope, the transport-error taxonomy, and the retry/circuit-breaker
//! policy so neither adapter duplicates it. It defines:
//!
//! - [`RpcTransport`] — the central async trait every transport implements
//! - [`JsonRpcRequest`] / [`JsonRpcResponse`] — wire types
//! - [`TransportError`] — structured error type
//! - [`HealthStatus`] — provider liveness check
//! - [`policy`] module — retry, circuit breaker, rate limiter

pub mod error;
pub mod policy;
pub mod request;
pub mod transport;

pub use error::TransportError;
pub use request::{JsonRpcRequest, JsonRpcResponse, RpcId, RpcParam};
pub use transport::{HealthStatus, RpcTransport};
