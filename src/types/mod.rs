//! Common data types for nimbusq.

pub mod validation;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::types::validation::{
    parse_bounded_attribute, validate_account_id, MAX_DELAY_SECONDS, MAX_MAX_RECEIVE_COUNT,
    MAX_RETENTION_PERIOD, MAX_VISIBILITY_TIMEOUT, MAX_WAIT_TIME_SECONDS, MIN_MAX_RECEIVE_COUNT,
    MIN_RETENTION_PERIOD, SQS_MAX_MESSAGE_SIZE, SQS_MIN_MESSAGE_SIZE_LIMIT,
};
use crate::{Error, Result};

/// Default visibility timeout (30 seconds).
pub const DEFAULT_VISIBILITY_TIMEOUT: u32 = 30;
/// Default retention period (4 days).
pub const DEFAULT_RETENTION_PERIOD: u32 = 345_600;

/// 12-digit AWS account identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Parse and validate an account id.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        validate_account_id(&id)?;
        Ok(AccountId(id))
    }

    /// Account id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for AccountId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        AccountId::new(s)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Queue identity: owning account plus queue name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueueKey {
    /// Owner account.
    pub account_id: AccountId,
    /// Queue name, unique within the account.
    pub name: String,
}

impl QueueKey {
    /// Create a queue key.
    pub fn new(account_id: AccountId, name: impl Into<String>) -> Self {
        Self {
            account_id,
            name: name.into(),
        }
    }

    /// Queue URL: `<endpoint>/<accountId>/<queueName>`.
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.account_id, self.name)
    }

    /// Queue ARN: `arn:aws:sqs:<region>:<accountId>:<queueName>`.
    pub fn arn(&self, region: &str) -> String {
        format!("arn:aws:sqs:{}:{}:{}", region, self.account_id, self.name)
    }

    /// Parse a queue ARN into its key, ignoring the region.
    pub fn from_arn(arn: &str) -> Result<Self> {
        let parts: Vec<&str> = arn.split(':').collect();
        match parts.as_slice() {
            ["arn", _partition, "sqs", _region, account, name] if !name.is_empty() => {
                Ok(QueueKey::new(AccountId::new(*account)?, *name))
            }
            _ => Err(ValidationError::InvalidParameter {
                name: "QueueArn".to_string(),
                reason: format!("'{}' is not an SQS queue ARN", arn),
            }
            .into()),
        }
    }
}

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account_id, self.name)
    }
}

/// Unique message identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Create a new random message ID.
    pub fn new() -> Self {
        MessageId(Uuid::new_v4().to_string())
    }

    /// Create a message ID from a string.
    pub fn from_string(s: String) -> Self {
        MessageId(s)
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message attributes.
pub type MessageAttributes = HashMap<String, MessageAttributeValue>;

/// Message attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAttributeValue {
    /// Data type (String, Number, Binary).
    pub data_type: String,
    /// String value.
    pub string_value: Option<String>,
    /// Binary value.
    pub binary_value: Option<Vec<u8>>,
}

impl MessageAttributeValue {
    /// A `String` attribute.
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            data_type: "String".to_string(),
            string_value: Some(value.into()),
            binary_value: None,
        }
    }

    /// A `Number` attribute.
    pub fn number(value: impl ToString) -> Self {
        Self {
            data_type: "Number".to_string(),
            string_value: Some(value.to_string()),
            binary_value: None,
        }
    }

    /// Bytes this attribute contributes to the message size.
    pub fn size(&self) -> usize {
        self.data_type.len()
            + self.string_value.as_ref().map(String::len).unwrap_or(0)
            + self.binary_value.as_ref().map(Vec::len).unwrap_or(0)
    }
}

/// Redrive policy routing messages to a dead-letter queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedrivePolicy {
    /// Receives in the source queue before the message is moved.
    pub max_receive_count: u32,
    /// ARN of the dead-letter queue.
    pub dead_letter_target_arn: String,
}

impl RedrivePolicy {
    /// Parse the `RedrivePolicy` JSON attribute. `maxReceiveCount` may be a
    /// string or a number.
    pub fn from_json(value: &str) -> Result<Self> {
        let invalid = |reason: String| ValidationError::InvalidAttributeValue {
            name: "RedrivePolicy".to_string(),
            reason,
        };

        let json: serde_json::Value =
            serde_json::from_str(value).map_err(|e| invalid(format!("invalid JSON: {}", e)))?;

        let dead_letter_target_arn = json
            .get("deadLetterTargetArn")
            .and_then(|v| v.as_str())
            .ok_or_else(|| invalid("deadLetterTargetArn is required".to_string()))?
            .to_string();

        let max_receive_count = json
            .get("maxReceiveCount")
            .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .ok_or_else(|| invalid("maxReceiveCount is required".to_string()))?;

        if !(MIN_MAX_RECEIVE_COUNT as u64..=MAX_MAX_RECEIVE_COUNT as u64).contains(&max_receive_count)
        {
            return Err(invalid(format!(
                "maxReceiveCount must be between {} and {}",
                MIN_MAX_RECEIVE_COUNT, MAX_MAX_RECEIVE_COUNT
            ))
            .into());
        }

        QueueKey::from_arn(&dead_letter_target_arn)
            .map_err(|_| invalid(format!("'{}' is not a queue ARN", dead_letter_target_arn)))?;

        Ok(RedrivePolicy {
            max_receive_count: max_receive_count as u32,
            dead_letter_target_arn,
        })
    }

    /// Render as the `RedrivePolicy` attribute value.
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "maxReceiveCount": self.max_receive_count.to_string(),
            "deadLetterTargetArn": self.dead_letter_target_arn,
        })
        .to_string()
    }
}

/// Mutable queue configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueAttributes {
    /// Visibility timeout in seconds (default: 30).
    pub visibility_timeout: u32,
    /// Message retention period in seconds (default: 345600 = 4 days).
    pub message_retention_period: u32,
    /// Maximum message size in bytes (default: 262144 = 256KB).
    pub maximum_message_size: usize,
    /// Delay seconds (0-900).
    pub delay_seconds: u32,
    /// Default long-poll wait for receives (0-20).
    pub receive_message_wait_time_seconds: u32,
    /// Dead letter queue configuration.
    pub redrive_policy: Option<RedrivePolicy>,
}

impl Default for QueueAttributes {
    fn default() -> Self {
        Self {
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
            message_retention_period: DEFAULT_RETENTION_PERIOD,
            maximum_message_size: SQS_MAX_MESSAGE_SIZE,
            delay_seconds: 0,
            receive_message_wait_time_seconds: 0,
            redrive_policy: None,
        }
    }
}

impl QueueAttributes {
    /// Build attributes from defaults overlaid with `attrs`.
    pub fn from_map(attrs: &HashMap<String, String>) -> Result<Self> {
        let mut attributes = Self::default();
        attributes.apply(attrs)?;
        Ok(attributes)
    }

    /// Apply settable attributes. Nothing is changed if any entry is invalid.
    pub fn apply(&mut self, attrs: &HashMap<String, String>) -> Result<()> {
        let mut updated = self.clone();

        for (key, value) in attrs {
            match key.parse::<QueueAttributeName>() {
                Ok(QueueAttributeName::VisibilityTimeout) => {
                    updated.visibility_timeout =
                        parse_bounded_attribute(key, value, 0, MAX_VISIBILITY_TIMEOUT)?;
                }
                Ok(QueueAttributeName::MessageRetentionPeriod) => {
                    updated.message_retention_period = parse_bounded_attribute(
                        key,
                        value,
                        MIN_RETENTION_PERIOD,
                        MAX_RETENTION_PERIOD,
                    )?;
                }
                Ok(QueueAttributeName::DelaySeconds) => {
                    updated.delay_seconds =
                        parse_bounded_attribute(key, value, 0, MAX_DELAY_SECONDS)?;
                }
                Ok(QueueAttributeName::MaximumMessageSize) => {
                    updated.maximum_message_size = parse_bounded_attribute(
                        key,
                        value,
                        SQS_MIN_MESSAGE_SIZE_LIMIT as u32,
                        SQS_MAX_MESSAGE_SIZE as u32,
                    )? as usize;
                }
                Ok(QueueAttributeName::ReceiveMessageWaitTimeSeconds) => {
                    updated.receive_message_wait_time_seconds =
                        parse_bounded_attribute(key, value, 0, MAX_WAIT_TIME_SECONDS)?;
                }
                Ok(QueueAttributeName::RedrivePolicy) => {
                    updated.redrive_policy = if value.trim().is_empty() {
                        None
                    } else {
                        Some(RedrivePolicy::from_json(value)?)
                    };
                }
                _ => {
                    return Err(ValidationError::InvalidAttributeName(key.clone()).into());
                }
            }
        }

        *self = updated;
        Ok(())
    }

    /// Whether every supplied attribute equals the current value.
    pub fn matches(&self, attrs: &HashMap<String, String>) -> Result<bool> {
        let mut candidate = self.clone();
        candidate.apply(attrs)?;
        Ok(candidate == *self)
    }

    /// Render the settable attributes as name/value pairs.
    pub fn to_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(
            QueueAttributeName::VisibilityTimeout.as_str().to_string(),
            self.visibility_timeout.to_string(),
        );
        map.insert(
            QueueAttributeName::MessageRetentionPeriod.as_str().to_string(),
            self.message_retention_period.to_string(),
        );
        map.insert(
            QueueAttributeName::DelaySeconds.as_str().to_string(),
            self.delay_seconds.to_string(),
        );
        map.insert(
            QueueAttributeName::MaximumMessageSize.as_str().to_string(),
            self.maximum_message_size.to_string(),
        );
        map.insert(
            QueueAttributeName::ReceiveMessageWaitTimeSeconds.as_str().to_string(),
            self.receive_message_wait_time_seconds.to_string(),
        );
        if let Some(policy) = &self.redrive_policy {
            map.insert(
                QueueAttributeName::RedrivePolicy.as_str().to_string(),
                policy.to_json(),
            );
        }
        map
    }
}

/// SQS queue attribute names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueAttributeName {
    /// All attributes.
    All,
    /// Approximate number of available messages.
    ApproximateNumberOfMessages,
    /// Approximate number of in-flight messages.
    ApproximateNumberOfMessagesNotVisible,
    /// Approximate number of delayed messages.
    ApproximateNumberOfMessagesDelayed,
    /// Created timestamp.
    CreatedTimestamp,
    /// Last modified timestamp.
    LastModifiedTimestamp,
    /// Visibility timeout.
    VisibilityTimeout,
    /// Maximum message size.
    MaximumMessageSize,
    /// Message retention period.
    MessageRetentionPeriod,
    /// Delay seconds.
    DelaySeconds,
    /// Long-poll wait time.
    ReceiveMessageWaitTimeSeconds,
    /// Redrive policy.
    RedrivePolicy,
    /// Queue ARN.
    QueueArn,
}

impl QueueAttributeName {
    /// Every concrete attribute, in the order `All` expands to.
    pub const ALL: [QueueAttributeName; 12] = [
        Self::ApproximateNumberOfMessages,
        Self::ApproximateNumberOfMessagesNotVisible,
        Self::ApproximateNumberOfMessagesDelayed,
        Self::CreatedTimestamp,
        Self::LastModifiedTimestamp,
        Self::VisibilityTimeout,
        Self::MaximumMessageSize,
        Self::MessageRetentionPeriod,
        Self::DelaySeconds,
        Self::ReceiveMessageWaitTimeSeconds,
        Self::RedrivePolicy,
        Self::QueueArn,
    ];

    /// Convert attribute to string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "All",
            Self::ApproximateNumberOfMessages => "ApproximateNumberOfMessages",
            Self::ApproximateNumberOfMessagesNotVisible => "ApproximateNumberOfMessagesNotVisible",
            Self::ApproximateNumberOfMessagesDelayed => "ApproximateNumberOfMessagesDelayed",
            Self::CreatedTimestamp => "CreatedTimestamp",
            Self::LastModifiedTimestamp => "LastModifiedTimestamp",
            Self::VisibilityTimeout => "VisibilityTimeout",
            Self::MaximumMessageSize => "MaximumMessageSize",
            Self::MessageRetentionPeriod => "MessageRetentionPeriod",
            Self::DelaySeconds => "DelaySeconds",
            Self::ReceiveMessageWaitTimeSeconds => "ReceiveMessageWaitTimeSeconds",
            Self::RedrivePolicy => "RedrivePolicy",
            Self::QueueArn => "QueueArn",
        }
    }
}

impl FromStr for QueueAttributeName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "All" => Ok(Self::All),
            "ApproximateNumberOfMessages" => Ok(Self::ApproximateNumberOfMessages),
            "ApproximateNumberOfMessagesNotVisible" => {
                Ok(Self::ApproximateNumberOfMessagesNotVisible)
            }
            "ApproximateNumberOfMessagesDelayed" => Ok(Self::ApproximateNumberOfMessagesDelayed),
            "CreatedTimestamp" => Ok(Self::CreatedTimestamp),
            "LastModifiedTimestamp" => Ok(Self::LastModifiedTimestamp),
            "VisibilityTimeout" => Ok(Self::VisibilityTimeout),
            "MaximumMessageSize" => Ok(Self::MaximumMessageSize),
            "MessageRetentionPeriod" => Ok(Self::MessageRetentionPeriod),
            "DelaySeconds" => Ok(Self::DelaySeconds),
            "ReceiveMessageWaitTimeSeconds" => Ok(Self::ReceiveMessageWaitTimeSeconds),
            "RedrivePolicy" => Ok(Self::RedrivePolicy),
            "QueueArn" => Ok(Self::QueueArn),
            _ => Err(ValidationError::InvalidAttributeName(s.to_string()).into()),
        }
    }
}

/// System attributes returned alongside received messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageSystemAttributeName {
    /// All system attributes.
    All,
    /// Account id of the sender.
    SenderId,
    /// Send time, epoch seconds.
    SentTimestamp,
    /// Cumulative receive count.
    ApproximateReceiveCount,
    /// First receive time, epoch seconds.
    ApproximateFirstReceiveTimestamp,
}

impl MessageSystemAttributeName {
    /// Convert attribute to string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "All",
            Self::SenderId => "SenderId",
            Self::SentTimestamp => "SentTimestamp",
            Self::ApproximateReceiveCount => "ApproximateReceiveCount",
            Self::ApproximateFirstReceiveTimestamp => "ApproximateFirstReceiveTimestamp",
        }
    }
}

impl FromStr for MessageSystemAttributeName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "All" => Ok(Self::All),
            "SenderId" => Ok(Self::SenderId),
            "SentTimestamp" => Ok(Self::SentTimestamp),
            "ApproximateReceiveCount" => Ok(Self::ApproximateReceiveCount),
            "ApproximateFirstReceiveTimestamp" => Ok(Self::ApproximateFirstReceiveTimestamp),
            _ => Err(ValidationError::InvalidAttributeName(s.to_string()).into()),
        }
    }
}

/// Options for receiving messages.
#[derive(Debug, Clone)]
pub struct ReceiveOptions {
    /// Maximum number of messages to receive (1-10).
    pub max_messages: u32,
    /// Visibility timeout override in seconds.
    pub visibility_timeout: Option<u32>,
    /// Long-poll wait override in seconds (0-20); the queue default applies when absent.
    pub wait_time_seconds: Option<u32>,
    /// System attribute names to return.
    pub attribute_names: Vec<String>,
    /// Message attribute names to return.
    pub message_attribute_names: Vec<String>,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            max_messages: 1,
            visibility_timeout: None,
            wait_time_seconds: None,
            attribute_names: vec![],
            message_attribute_names: vec![],
        }
    }
}

impl ReceiveOptions {
    /// Receive up to `max_messages` with all system attributes.
    pub fn with_all_attributes(max_messages: u32) -> Self {
        Self {
            max_messages,
            attribute_names: vec!["All".to_string()],
            message_attribute_names: vec!["All".to_string()],
            ..Default::default()
        }
    }
}

/// A send request.
#[derive(Debug, Clone, Default)]
pub struct SendMessageRequest {
    /// Message body.
    pub body: String,
    /// Per-message delay override (0-900).
    pub delay_seconds: Option<u32>,
    /// User message attributes.
    pub message_attributes: MessageAttributes,
}

impl SendMessageRequest {
    /// A request with only a body.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }

    /// Set a per-message delay.
    pub fn with_delay(mut self, delay_seconds: u32) -> Self {
        self.delay_seconds = Some(delay_seconds);
        self
    }

    /// Add a message attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: MessageAttributeValue) -> Self {
        self.message_attributes.insert(name.into(), value);
        self
    }
}

/// Result of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageResult {
    /// Assigned message id.
    pub message_id: MessageId,
    /// MD5 of the body.
    pub md5_of_body: String,
    /// MD5 of the message attributes, when any were sent.
    pub md5_of_message_attributes: Option<String>,
}

/// Snapshot of a message returned by a receive.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    /// Message id.
    pub message_id: MessageId,
    /// Receipt handle for this receive.
    pub receipt_handle: String,
    /// Message body.
    pub body: String,
    /// MD5 of the body.
    pub md5_of_body: String,
    /// Requested system attributes.
    pub attributes: HashMap<String, String>,
    /// Requested user message attributes.
    pub message_attributes: MessageAttributes,
}

impl ReceivedMessage {
    /// `ApproximateReceiveCount`, if it was requested.
    pub fn receive_count(&self) -> Option<u32> {
        self.attributes
            .get(MessageSystemAttributeName::ApproximateReceiveCount.as_str())
            .and_then(|v| v.parse().ok())
    }
}

/// Live message counts for a queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Messages available for receive.
    pub available_messages: u64,
    /// Messages waiting out a delay.
    pub delayed_messages: u64,
    /// Messages received and not yet deleted or expired.
    pub in_flight_messages: u64,
    /// Oldest message send time.
    pub oldest_message_timestamp: Option<DateTime<Utc>>,
}
