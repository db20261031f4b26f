//! Receipt handle generation and parsing.
//!
//! A handle encodes the queue, the message, the receive generation and a
//! random nonce. Only the most recent handle of a message validates: each
//! receive bumps the generation and draws a new nonce, and validation is an
//! equality check against the message's current token.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{MessageId, QueueKey};
use crate::{Error, Result};

/// Receipt handle data structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptHandleData {
    /// Queue the message was received from (`accountId/name`).
    pub queue: String,
    /// Message ID.
    pub message_id: MessageId,
    /// Receive generation of the message.
    pub generation: u64,
    /// Random nonce making the handle unguessable.
    pub nonce: String,
}

/// The part of a handle a message keeps to validate later presentations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptToken {
    /// Receive generation.
    pub generation: u64,
    /// Nonce issued with the generation.
    pub nonce: String,
}

impl ReceiptHandleData {
    /// Whether this handle is the one `token` was issued with.
    pub fn matches(&self, queue: &QueueKey, message_id: &MessageId, token: &ReceiptToken) -> bool {
        self.queue == queue.to_string()
            && &self.message_id == message_id
            && self.generation == token.generation
            && self.nonce == token.nonce
    }
}

/// Issue a receipt handle for one receive of a message.
pub fn generate_receipt_handle(
    queue: &QueueKey,
    message_id: &MessageId,
    generation: u64,
) -> Result<(String, ReceiptToken)> {
    let data = ReceiptHandleData {
        queue: queue.to_string(),
        message_id: message_id.clone(),
        generation,
        nonce: Uuid::new_v4().simple().to_string(),
    };

    let json = serde_json::to_string(&data)?;
    let token = ReceiptToken {
        generation,
        nonce: data.nonce,
    };
    Ok((URL_SAFE_NO_PAD.encode(json.as_bytes()), token))
}

/// Parse a receipt handle and extract the data.
pub fn parse_receipt_handle(receipt_handle: &str) -> Result<ReceiptHandleData> {
    let decoded = URL_SAFE_NO_PAD
        .decode(receipt_handle)
        .map_err(|_| Error::InvalidReceiptHandle)?;

    let json = String::from_utf8(decoded).map_err(|_| Error::InvalidReceiptHandle)?;

    let data: ReceiptHandleData =
        serde_json::from_str(&json).map_err(|_| Error::InvalidReceiptHandle)?;

    Ok(data)
}
