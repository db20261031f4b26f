//! AWS SQS-specific data types.

use md5::{Digest, Md5};

use crate::types::{MessageAttributes, MessageId};

/// SQS error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqsErrorCode {
    /// Queue does not exist.
    QueueDoesNotExist,
    /// Queue already exists.
    QueueAlreadyExists,
    /// Malformed queue URL.
    InvalidAddress,
    /// Account referenced by the request does not exist.
    AccountNotFound,
    /// Caller may not access the queue.
    AccessDenied,
    /// Invalid parameter value.
    InvalidParameterValue,
    /// Invalid attribute name.
    InvalidAttributeName,
    /// Invalid attribute value.
    InvalidAttributeValue,
    /// Receipt handle invalid or superseded.
    ReceiptHandleIsInvalid,
    /// Visibility change on a message that is not in flight.
    MessageNotInflight,
    /// Message body exceeds the limit.
    MessageTooLong,
    /// Limit exceeded.
    OverLimit,
    /// Batch request with no entries.
    EmptyBatchRequest,
    /// Batch request with too many entries.
    TooManyEntriesInBatchRequest,
    /// Batch entry ids repeated.
    BatchEntryIdsNotDistinct,
    /// Internal error.
    InternalError,
}

impl SqsErrorCode {
    /// Convert error code to string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QueueDoesNotExist => "AWS.SimpleQueueService.NonExistentQueue",
            Self::QueueAlreadyExists => "QueueAlreadyExists",
            Self::InvalidAddress => "InvalidAddress",
            Self::AccountNotFound => "AccountNotFound",
            Self::AccessDenied => "AccessDenied",
            Self::InvalidParameterValue => "InvalidParameterValue",
            Self::InvalidAttributeName => "InvalidAttributeName",
            Self::InvalidAttributeValue => "InvalidAttributeValue",
            Self::ReceiptHandleIsInvalid => "ReceiptHandleIsInvalid",
            Self::MessageNotInflight => "AWS.SimpleQueueService.MessageNotInflight",
            Self::MessageTooLong => "MessageTooLong",
            Self::OverLimit => "OverLimit",
            Self::EmptyBatchRequest => "AWS.SimpleQueueService.EmptyBatchRequest",
            Self::TooManyEntriesInBatchRequest => {
                "AWS.SimpleQueueService.TooManyEntriesInBatchRequest"
            }
            Self::BatchEntryIdsNotDistinct => "AWS.SimpleQueueService.BatchEntryIdsNotDistinct",
            Self::InternalError => "InternalError",
        }
    }
}

/// One entry of a send batch.
#[derive(Debug, Clone)]
pub struct SendMessageBatchEntry {
    /// Caller-chosen entry id.
    pub id: String,
    /// The message to send.
    pub request: crate::types::SendMessageRequest,
}

/// One entry of a delete batch.
#[derive(Debug, Clone)]
pub struct DeleteMessageBatchEntry {
    /// Caller-chosen entry id.
    pub id: String,
    /// Receipt handle to delete.
    pub receipt_handle: String,
}

/// One entry of a visibility-change batch.
#[derive(Debug, Clone)]
pub struct ChangeMessageVisibilityBatchEntry {
    /// Caller-chosen entry id.
    pub id: String,
    /// Receipt handle of the in-flight message.
    pub receipt_handle: String,
    /// New visibility timeout in seconds.
    pub visibility_timeout: u32,
}

/// Successful batch entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResultEntry {
    /// Entry ID.
    pub id: String,
    /// Message ID, for send batches.
    pub message_id: Option<MessageId>,
    /// MD5 of body, for send batches.
    pub md5_of_body: Option<String>,
}

/// Failed batch entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchErrorEntry {
    /// Entry ID.
    pub id: String,
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
    /// Whether the caller is at fault.
    pub sender_fault: bool,
}

impl BatchErrorEntry {
    pub(crate) fn from_error(id: String, error: &crate::Error) -> Self {
        Self {
            id,
            code: error.error_code().to_string(),
            message: error.to_string(),
            sender_fault: error.status_code() < 500,
        }
    }
}

/// Outcome of a batch operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    /// Entries that succeeded.
    pub successful: Vec<BatchResultEntry>,
    /// Entries that failed.
    pub failed: Vec<BatchErrorEntry>,
}

/// Calculate MD5 hash of message body.
pub fn calculate_md5_of_body(body: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Calculate MD5 hash of message attributes.
pub fn calculate_md5_of_attributes(attributes: &MessageAttributes) -> String {
    // Sorted by name; each attribute encodes name, data type, a transport
    // byte (1 = string, 2 = binary) and the value, lengths as big-endian u32.
    let mut sorted_attrs: Vec<_> = attributes.iter().collect();
    sorted_attrs.sort_by_key(|(name, _)| *name);

    let mut buffer = Vec::new();

    for (name, value) in sorted_attrs {
        buffer.extend_from_slice(&(name.len() as u32).to_be_bytes());
        buffer.extend_from_slice(name.as_bytes());

        buffer.extend_from_slice(&(value.data_type.len() as u32).to_be_bytes());
        buffer.extend_from_slice(value.data_type.as_bytes());

        if let Some(ref string_value) = value.string_value {
            buffer.push(1);
            buffer.extend_from_slice(&(string_value.len() as u32).to_be_bytes());
            buffer.extend_from_slice(string_value.as_bytes());
        } else if let Some(ref binary_value) = value.binary_value {
            buffer.push(2);
            buffer.extend_from_slice(&(binary_value.len() as u32).to_be_bytes());
            buffer.extend_from_slice(binary_value);
        }
    }

    let mut hasher = Md5::new();
    hasher.update(&buffer);
    format!("{:x}", hasher.finalize())
}
