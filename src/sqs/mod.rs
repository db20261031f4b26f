//! AWS SQS dialect: the engine facade and its request/response types.

pub mod handler;
pub mod types;

pub use handler::SqsEngine;
pub use types::*;
