//! HTTP clients for DataChain
//!
//! Implementations of the core `BlobStore` and `ChainService` traits on top
//! of a pinning gateway and a chain node REST API.

pub mod chain;
pub mod error;
pub mod gateway;

pub use chain::ChainClient;
pub use error::{ClientError, Result};
pub use gateway::GatewayClient;
