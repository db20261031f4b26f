//! Error types for nimbusq.

use thiserror::Error;

/// Result type for nimbusq operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for nimbusq.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Queue already exists with a different configuration.
    #[error("Queue already exists: {0}")]
    QueueAlreadyExists(String),

    /// Queue not found under an existing account.
    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    /// The queue URL could not be parsed.
    #[error("Invalid queue URL: {0}")]
    InvalidQueueUrl(String),

    /// The account segment of a reference does not resolve.
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Caller account differs from the queue owner account.
    #[error("Access to the resource {resource} is denied for account {caller}")]
    AccessDenied {
        /// Caller account id.
        caller: String,
        /// Queue URL the caller tried to reach.
        resource: String,
    },

    /// Invalid or superseded receipt handle.
    #[error("Invalid receipt handle")]
    InvalidReceiptHandle,

    /// Visibility change on a message that is not in flight.
    #[error("Message is not in flight")]
    MessageNotInflight,

    /// Tenant queue-count ceiling reached.
    #[error("Queue quota exceeded for account {account}: limit is {limit}")]
    QuotaExceeded {
        /// Account id.
        account: String,
        /// Maximum number of queues for the account.
        limit: usize,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP-equivalent status surfaced to external callers.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::AccessDenied { .. } => 403,
            Error::AccountNotFound(_) | Error::InvalidReceiptHandle => 404,
            Error::Validation(_)
            | Error::QueueAlreadyExists(_)
            | Error::QueueNotFound(_)
            | Error::InvalidQueueUrl(_)
            | Error::MessageNotInflight
            | Error::QuotaExceeded { .. } => 400,
            Error::Config(_) | Error::Serialization(_) | Error::Io(_) | Error::Internal(_) => 500,
        }
    }

    /// AWS error code string for this error.
    pub fn error_code(&self) -> &'static str {
        use crate::sqs::types::SqsErrorCode;

        let code = match self {
            Error::Validation(v) => v.error_code(),
            Error::QueueAlreadyExists(_) => SqsErrorCode::QueueAlreadyExists,
            Error::QueueNotFound(_) => SqsErrorCode::QueueDoesNotExist,
            Error::InvalidQueueUrl(_) => SqsErrorCode::InvalidAddress,
            Error::AccountNotFound(_) => SqsErrorCode::AccountNotFound,
            Error::AccessDenied { .. } => SqsErrorCode::AccessDenied,
            Error::InvalidReceiptHandle => SqsErrorCode::ReceiptHandleIsInvalid,
            Error::MessageNotInflight => SqsErrorCode::MessageNotInflight,
            Error::QuotaExceeded { .. } => SqsErrorCode::OverLimit,
            Error::Config(_) | Error::Serialization(_) | Error::Io(_) | Error::Internal(_) => {
                SqsErrorCode::InternalError
            }
        };
        code.as_str()
    }
}

/// Validation error types.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid queue name.
    #[error("Invalid queue name: {0}")]
    InvalidQueueName(String),

    /// Invalid account id.
    #[error("Invalid account id: {0}")]
    InvalidAccountId(String),

    /// Message too large.
    #[error("Message too large: {size} bytes (max: {max} bytes)")]
    MessageTooLarge {
        /// Actual message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Unknown or read-only attribute name.
    #[error("Invalid attribute name: {0}")]
    InvalidAttributeName(String),

    /// Attribute value out of range or malformed.
    #[error("Invalid value for attribute {name}: {reason}")]
    InvalidAttributeValue {
        /// Attribute name.
        name: String,
        /// Reason for invalidity.
        reason: String,
    },

    /// Invalid parameter.
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// Reason for invalidity.
        reason: String,
    },

    /// Batch request carried no entries.
    #[error("Batch request must contain at least one entry")]
    EmptyBatchRequest,

    /// Batch request carried more entries than allowed.
    #[error("Batch request contains {count} entries (max: {max})")]
    TooManyEntriesInBatchRequest {
        /// Number of entries supplied.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// Batch entry ids repeated.
    #[error("Batch entry id {0} is not distinct")]
    BatchEntryIdsNotDistinct(String),
}

impl ValidationError {
    fn error_code(&self) -> crate::sqs::types::SqsErrorCode {
        use crate::sqs::types::SqsErrorCode;

        match self {
            ValidationError::InvalidQueueName(_)
            | ValidationError::InvalidAccountId(_)
            | ValidationError::InvalidParameter { .. } => SqsErrorCode::InvalidParameterValue,
            ValidationError::MessageTooLarge { .. } => SqsErrorCode::MessageTooLong,
            ValidationError::InvalidAttributeName(_) => SqsErrorCode::InvalidAttributeName,
            ValidationError::InvalidAttributeValue { .. } => SqsErrorCode::InvalidAttributeValue,
            ValidationError::EmptyBatchRequest => SqsErrorCode::EmptyBatchRequest,
            ValidationError::TooManyEntriesInBatchRequest { .. } => {
                SqsErrorCode::TooManyEntriesInBatchRequest
            }
            ValidationError::BatchEntryIdsNotDistinct(_) => SqsErrorCode::BatchEntryIdsNotDistinct,
        }
    }
}
