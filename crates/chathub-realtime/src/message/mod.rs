//! Wire frames and payload validation.

pub mod types;
pub mod validator;

pub use types::{Frame, OutboundMessage};
