//! EIP-712 typed data: the generic encoder and the GSN, ERC-2612 and
//! meta-transaction messages built on it

mod typed_data;
pub use typed_data::*;

/// GSN relay requests
pub mod relay_request;
pub use relay_request::{ForwardRequest, RelayData, RelayRequest};

/// ERC-2612 permits
pub mod permit;
pub use permit::Permit;

/// `executeMetaTransaction` messages
pub mod meta_tx;
pub use meta_tx::MetaTransaction;
