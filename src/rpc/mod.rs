//! Relay server request and response definitions

pub(crate) mod relay;
pub use relay::*;

pub(crate) mod server;
pub use server::*;
