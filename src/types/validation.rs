//! Validation functions for queue names, account ids, and attribute values.

use crate::error::ValidationError;
use crate::types::MessageAttributes;
use crate::Result;

/// Maximum message size accepted by SQS (256 KB).
pub const SQS_MAX_MESSAGE_SIZE: usize = 262_144;

/// Smallest configurable `MaximumMessageSize`.
pub const SQS_MIN_MESSAGE_SIZE_LIMIT: usize = 1_024;

/// Maximum visibility timeout in seconds (12 hours).
pub const MAX_VISIBILITY_TIMEOUT: u32 = 43_200;

/// Maximum delay in seconds (15 minutes).
pub const MAX_DELAY_SECONDS: u32 = 900;

/// Retention period bounds in seconds (1 minute to 14 days).
pub const MIN_RETENTION_PERIOD: u32 = 60;
/// Upper retention bound.
pub const MAX_RETENTION_PERIOD: u32 = 1_209_600;

/// Maximum long-poll wait in seconds.
pub const MAX_WAIT_TIME_SECONDS: u32 = 20;

/// Maximum number of messages returned by one receive.
pub const MAX_RECEIVE_MESSAGES: u32 = 10;

/// Maximum entries in a batch request.
pub const MAX_BATCH_ENTRIES: usize = 10;

/// Redrive `maxReceiveCount` bounds.
pub const MIN_MAX_RECEIVE_COUNT: u32 = 1;
/// Upper `maxReceiveCount` bound.
pub const MAX_MAX_RECEIVE_COUNT: u32 = 1_000;

/// SQS queue name validation (1-80 chars, alphanumeric + - and _).
pub fn validate_sqs_queue_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 80 {
        return Err(ValidationError::InvalidQueueName(format!(
            "Queue name must be 1-80 characters, got {}",
            name.len()
        ))
        .into());
    }

    if name.ends_with(".fifo") {
        return Err(ValidationError::InvalidQueueName(
            "FIFO queues are not supported".to_string(),
        )
        .into());
    }

    for ch in name.chars() {
        if !ch.is_ascii_alphanumeric() && ch != '-' && ch != '_' {
            return Err(ValidationError::InvalidQueueName(format!(
                "Queue name contains invalid character: '{}'",
                ch
            ))
            .into());
        }
    }

    Ok(())
}

/// Account ids are exactly 12 ASCII digits.
pub fn validate_account_id(account_id: &str) -> Result<()> {
    if account_id.len() != 12 || !account_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidAccountId(format!(
            "Account id must be 12 digits, got '{}'",
            account_id
        ))
        .into());
    }
    Ok(())
}

/// Validate message size against the queue limit.
pub fn validate_message_size(size: usize, max_size: usize) -> Result<()> {
    if size > max_size {
        return Err(ValidationError::MessageTooLarge { size, max: max_size }.into());
    }
    Ok(())
}

/// Parse a numeric attribute and check it lies in `min..=max`.
pub fn parse_bounded_attribute(name: &str, value: &str, min: u32, max: u32) -> Result<u32> {
    let parsed: u32 = value
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidAttributeValue {
            name: name.to_string(),
            reason: format!("'{}' is not a non-negative integer", value),
        })?;

    if !(min..=max).contains(&parsed) {
        return Err(ValidationError::InvalidAttributeValue {
            name: name.to_string(),
            reason: format!("must be between {} and {}, got {}", min, max, parsed),
        }
        .into());
    }

    Ok(parsed)
}

/// Check a request parameter lies in `min..=max`.
pub fn validate_parameter_range(name: &str, value: u32, min: u32, max: u32) -> Result<()> {
    if !(min..=max).contains(&value) {
        return Err(ValidationError::InvalidParameter {
            name: name.to_string(),
            reason: format!("must be between {} and {}, got {}", min, max, value),
        }
        .into());
    }
    Ok(())
}

/// Validate batch entry ids: 1..=10 entries, distinct, alphanumeric/-/_.
pub fn validate_batch_ids<'a, I>(ids: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let ids: Vec<&str> = ids.into_iter().collect();

    if ids.is_empty() {
        return Err(ValidationError::EmptyBatchRequest.into());
    }
    if ids.len() > MAX_BATCH_ENTRIES {
        return Err(ValidationError::TooManyEntriesInBatchRequest {
            count: ids.len(),
            max: MAX_BATCH_ENTRIES,
        }
        .into());
    }

    let mut seen = std::collections::HashSet::new();
    for id in ids {
        if id.is_empty()
            || id.len() > 80
            || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::InvalidParameter {
                name: "Id".to_string(),
                reason: format!("invalid batch entry id '{}'", id),
            }
            .into());
        }
        if !seen.insert(id) {
            return Err(ValidationError::BatchEntryIdsNotDistinct(id.to_string()).into());
        }
    }

    Ok(())
}

/// Maximum number of user message attributes per message.
pub const MAX_MESSAGE_ATTRIBUTES: usize = 10;

/// Validate user message attributes: at most 10, names 1-256 characters
/// from `[A-Za-z0-9_.-]` not starting with `aws.`/`amazon.`, data type
/// `String`, `Number` or `Binary` (optionally with a `.label`) and a value
/// matching the type.
pub fn validate_message_attributes(attributes: &MessageAttributes) -> Result<()> {
    if attributes.len() > MAX_MESSAGE_ATTRIBUTES {
        return Err(ValidationError::InvalidParameter {
            name: "MessageAttributes".to_string(),
            reason: format!(
                "at most {} attributes allowed, got {}",
                MAX_MESSAGE_ATTRIBUTES,
                attributes.len()
            ),
        }
        .into());
    }

    for (name, value) in attributes {
        let invalid = |reason: String| ValidationError::InvalidParameter {
            name: format!("MessageAttribute.{}", name),
            reason,
        };

        let lower = name.to_ascii_lowercase();
        if name.is_empty()
            || name.len() > 256
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            || lower.starts_with("aws.")
            || lower.starts_with("amazon.")
        {
            return Err(invalid("invalid attribute name".to_string()).into());
        }

        let base_type = value.data_type.split('.').next().unwrap_or_default();
        let has_value = match base_type {
            "String" | "Number" => value.string_value.as_ref().is_some_and(|v| !v.is_empty()),
            "Binary" => value.binary_value.as_ref().is_some_and(|v| !v.is_empty()),
            _ => {
                return Err(invalid(format!("unsupported data type '{}'", value.data_type)).into());
            }
        };
        if !has_value {
            return Err(invalid(format!("missing {} value", base_type)).into());
        }
        if base_type == "Number" {
            let number = value.string_value.as_deref().unwrap_or_default();
            if number.parse::<f64>().is_err() {
                return Err(invalid(format!("'{}' is not a number", number)).into());
            }
        }
    }

    Ok(())
}
