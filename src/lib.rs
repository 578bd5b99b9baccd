//! A Gas Station Network client in rust
//!
//! Builds and signs EIP-712 relay requests, prepares gasless token transfers
//! by permit or by `executeMetaTransaction`, submits them to a relay server
//! and waits for their receipts.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]
#![forbid(unsafe_code)]

mod macros;

/// Calldata encoders and decoders for the contracts the client calls
pub mod abi;

/// Relay request builder
pub mod builders;

/// Calldata gas cost estimation
pub mod calldata;

/// Relay server client
pub mod client;
pub use client::{RelayClient, Relayer};

/// Network configuration
pub mod config;
pub use config::{ContractsConfig, GsnConfig, NetworkConfig};

/// EIP-712 typed data and the structs the client signs
pub mod eip712;
pub use eip712::RelayRequest;

mod error;
pub use error::*;

/// User-facing network facade
pub mod network;
pub use network::Network;

/// Node access
pub mod provider;
pub use provider::{BlockInfo, GsnProvider};

/// Relay server wire types
pub mod rpc;

pub(crate) mod ser;

/// Receipt polling
pub mod task;
pub use task::{CancellationToken, PendingReceipt};

/// Transaction builders for claims and transfers
pub mod tx;

/// Shared GSN types
pub mod types;
pub use types::*;

/// Amount helpers
pub mod utils;

/// Re-export reqwest for convenience
pub use reqwest;
