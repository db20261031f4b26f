//! # nimbusq
//!
//! An in-process, multi-tenant message queue engine with AWS SQS standard-queue
//! semantics.
//!
//! Every message follows a delayed → available → in-flight state machine driven
//! by per-queue timers. Receipt handles are single-use per receive, messages
//! that exceed a queue's `maxReceiveCount` are redriven to a dead-letter queue
//! (chains included), and every queue-addressed call is checked against the
//! owning account.
//!
//! ```no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! use nimbusq::{AccountId, EngineConfig, ReceiveOptions, SendMessageRequest, SqsEngine};
//! use nimbusq::core::access::StaticAccountDirectory;
//!
//! # async fn run() -> nimbusq::Result<()> {
//! let account = AccountId::new("123456789012")?;
//! let accounts = Arc::new(StaticAccountDirectory::with_accounts([account.clone()]));
//! let engine = SqsEngine::new(EngineConfig::default(), accounts);
//!
//! let url = engine.create_queue(&account, "orders", &HashMap::new()).await?;
//! engine.send_message(&account, &url, SendMessageRequest::new("hello")).await?;
//! let messages = engine.receive_message(&account, &url, ReceiveOptions::default()).await?;
//! for message in messages {
//!     engine.delete_message(&account, &url, &message.receipt_handle).await?;
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod error;
pub mod metrics;
pub mod sqs;
pub mod storage;
pub mod types;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use sqs::SqsEngine;
pub use types::{
    AccountId, QueueKey, ReceiveOptions, ReceivedMessage, RedrivePolicy, SendMessageRequest,
    SendMessageResult,
};
