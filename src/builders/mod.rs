//! Request builders

mod relay_request;
pub use relay_request::*;
