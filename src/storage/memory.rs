//! In-memory message store and per-message state machine for one queue.
//!
//! [`QueueData`] is always accessed under its queue's lock, so every method
//! here is synchronous and sees a consistent view of the queue.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, trace, warn};

use crate::core::receipt::{generate_receipt_handle, parse_receipt_handle, ReceiptToken};
use crate::core::scheduler::{TimerEntry, TimerKind, TimerQueue};
use crate::error::ValidationError;
use crate::sqs::types::calculate_md5_of_body;
use crate::types::validation::validate_message_size;
use crate::types::{
    AccountId, MessageAttributes, MessageId, MessageSystemAttributeName, QueueAttributes,
    QueueKey, QueueStats, ReceiveOptions, ReceivedMessage, RedrivePolicy, SendMessageRequest,
};
use crate::{Error, Result};

/// Timer entries kept before stale ones are pruned, regardless of how few
/// messages the queue holds.
const TIMER_COMPACTION_FLOOR: usize = 64;

/// Live state of a stored message. Terminal states are represented by the
/// message leaving the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    /// Waiting out a delay.
    Delayed {
        /// When the message becomes available.
        until: DateTime<Utc>,
    },
    /// Receivable.
    Available,
    /// Received and hidden until the deadline.
    InFlight {
        /// When the message becomes visible again.
        deadline: DateTime<Utc>,
    },
}

/// Stored message with metadata.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    id: MessageId,
    body: String,
    attributes: MessageAttributes,
    sender_id: AccountId,
    sent_timestamp: DateTime<Utc>,
    /// Receives across every queue the message has lived in.
    receive_count: u32,
    /// Receives since the message arrived in this queue.
    queue_receive_count: u32,
    first_receive_timestamp: Option<DateTime<Utc>>,
    generation: u64,
    receipt: Option<ReceiptToken>,
    state: MessageState,
    retention_deadline: DateTime<Utc>,
}

impl StoredMessage {
    /// Message id.
    pub fn id(&self) -> &MessageId {
        &self.id
    }

    /// Cumulative receive count.
    pub fn receive_count(&self) -> u32 {
        self.receive_count
    }

    /// Original send time.
    pub fn sent_timestamp(&self) -> DateTime<Utc> {
        self.sent_timestamp
    }
}

/// Which attributes a receive returns.
#[derive(Debug, Clone, Default)]
pub struct AttributeSelection {
    system: HashSet<MessageSystemAttributeName>,
    all_message_attributes: bool,
    message_attribute_names: Vec<String>,
}

impl AttributeSelection {
    /// Build the selection from receive options, rejecting unknown system names.
    pub fn from_options(options: &ReceiveOptions) -> Result<Self> {
        let mut system = HashSet::new();
        for name in &options.attribute_names {
            match name.parse::<MessageSystemAttributeName>()? {
                MessageSystemAttributeName::All => {
                    system.extend([
                        MessageSystemAttributeName::SenderId,
                        MessageSystemAttributeName::SentTimestamp,
                        MessageSystemAttributeName::ApproximateReceiveCount,
                        MessageSystemAttributeName::ApproximateFirstReceiveTimestamp,
                    ]);
                }
                other => {
                    system.insert(other);
                }
            }
        }

        let all_message_attributes = options
            .message_attribute_names
            .iter()
            .any(|n| n == "All" || n == ".*");

        Ok(Self {
            system,
            all_message_attributes,
            message_attribute_names: options.message_attribute_names.clone(),
        })
    }

    fn wants_message_attribute(&self, name: &str) -> bool {
        self.all_message_attributes
            || self.message_attribute_names.iter().any(|pattern| {
                match pattern.strip_suffix(".*") {
                    Some(prefix) => name.starts_with(prefix),
                    None => pattern == name,
                }
            })
    }

    fn snapshot(&self, message: &StoredMessage, receipt_handle: String) -> ReceivedMessage {
        let mut attributes = HashMap::new();
        for name in &self.system {
            let value = match name {
                MessageSystemAttributeName::SenderId => Some(message.sender_id.to_string()),
                MessageSystemAttributeName::SentTimestamp => {
                    Some(message.sent_timestamp.timestamp().to_string())
                }
                MessageSystemAttributeName::ApproximateReceiveCount => {
                    Some(message.receive_count.to_string())
                }
                MessageSystemAttributeName::ApproximateFirstReceiveTimestamp => message
                    .first_receive_timestamp
                    .map(|ts| ts.timestamp().to_string()),
                MessageSystemAttributeName::All => None,
            };
            if let Some(value) = value {
                attributes.insert(name.as_str().to_string(), value);
            }
        }

        let message_attributes = message
            .attributes
            .iter()
            .filter(|(name, _)| self.wants_message_attribute(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        ReceivedMessage {
            message_id: message.id.clone(),
            receipt_handle,
            body: message.body.clone(),
            md5_of_body: calculate_md5_of_body(&message.body),
            attributes,
            message_attributes,
        }
    }
}

/// Result of one pass over due timers.
#[derive(Debug, Default)]
pub struct DueOutcome {
    /// Messages that became receivable.
    pub became_available: usize,
    /// Messages removed by retention expiry.
    pub expired: usize,
    /// Messages taken out for redrive to the dead-letter queue.
    pub redriven: Vec<StoredMessage>,
}

/// Queue data storage.
#[derive(Debug)]
pub struct QueueData {
    key: QueueKey,
    attributes: QueueAttributes,
    created_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
    messages: HashMap<MessageId, StoredMessage>,
    /// Receive order of available messages. May hold ids that have since
    /// left the available state; those are skipped on receive.
    available: VecDeque<MessageId>,
    timers: TimerQueue,
    deleted: bool,
}

impl QueueData {
    /// Create an empty queue.
    pub fn new(key: QueueKey, attributes: QueueAttributes, now: DateTime<Utc>) -> Self {
        Self {
            key,
            attributes,
            created_at: now,
            last_modified: now,
            messages: HashMap::new(),
            available: VecDeque::new(),
            timers: TimerQueue::new(),
            deleted: false,
        }
    }

    /// Queue identity.
    pub fn key(&self) -> &QueueKey {
        &self.key
    }

    /// Current configuration.
    pub fn attributes(&self) -> &QueueAttributes {
        &self.attributes
    }

    /// Creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last configuration change.
    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    /// Whether `entry` still describes a pending transition of a stored message.
    fn timer_is_live(messages: &HashMap<MessageId, StoredMessage>, entry: &TimerEntry) -> bool {
        let Some(message) = messages.get(&entry.message_id) else {
            return false;
        };
        match entry.kind {
            TimerKind::DelayExpiry => message.state == (MessageState::Delayed { until: entry.fire_at }),
            TimerKind::VisibilityExpiry => {
                message.state == (MessageState::InFlight { deadline: entry.fire_at })
            }
            TimerKind::RetentionExpiry => message.retention_deadline == entry.fire_at,
        }
    }

    /// Prune stale timer entries once they outnumber the live ones. A stored
    /// message has at most two live entries, so after a pass the heap holds
    /// no more than twice the message count.
    fn compact_timers(&mut self) {
        let threshold = TIMER_COMPACTION_FLOOR.max(4 * self.messages.len());
        if self.timers.len() <= threshold {
            return;
        }

        let before = self.timers.len();
        let messages = &self.messages;
        let mut seen = HashSet::new();
        self.timers.retain(|entry| {
            Self::timer_is_live(messages, entry)
                && seen.insert((entry.message_id.clone(), entry.kind))
        });

        trace!(
            queue = %self.key,
            before = before,
            after = self.timers.len(),
            "Timer entries compacted"
        );
    }

    fn ensure_live(&self) -> Result<()> {
        if self.deleted {
            return Err(Error::QueueNotFound(self.key.to_string()));
        }
        Ok(())
    }

    /// Replace the configuration. Retention deadlines of stored messages are
    /// recomputed from their send time when the retention period changes.
    pub fn set_attributes(&mut self, attributes: QueueAttributes, now: DateTime<Utc>) -> Result<()> {
        self.ensure_live()?;

        let retention_changed =
            attributes.message_retention_period != self.attributes.message_retention_period;
        self.attributes = attributes;
        self.last_modified = now;

        if retention_changed {
            let period = Duration::seconds(self.attributes.message_retention_period as i64);
            for message in self.messages.values_mut() {
                message.retention_deadline = message.sent_timestamp + period;
                self.timers.schedule(
                    message.retention_deadline,
                    message.id.clone(),
                    TimerKind::RetentionExpiry,
                );
            }
            self.compact_timers();
        }
        Ok(())
    }

    /// Store a new message.
    pub fn send(
        &mut self,
        sender: &AccountId,
        request: SendMessageRequest,
        now: DateTime<Utc>,
    ) -> Result<MessageId> {
        self.ensure_live()?;

        if request.body.is_empty() {
            return Err(ValidationError::InvalidParameter {
                name: "MessageBody".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }

        let size = request.body.len()
            + request
                .message_attributes
                .iter()
                .map(|(name, value)| name.len() + value.size())
                .sum::<usize>();
        validate_message_size(size, self.attributes.maximum_message_size)?;

        let delay = request.delay_seconds.unwrap_or(self.attributes.delay_seconds);
        let id = MessageId::new();
        let state = if delay > 0 {
            MessageState::Delayed {
                until: now + Duration::seconds(delay as i64),
            }
        } else {
            MessageState::Available
        };

        let message = StoredMessage {
            id: id.clone(),
            body: request.body,
            attributes: request.message_attributes,
            sender_id: sender.clone(),
            sent_timestamp: now,
            receive_count: 0,
            queue_receive_count: 0,
            first_receive_timestamp: None,
            generation: 0,
            receipt: None,
            state,
            retention_deadline: now
                + Duration::seconds(self.attributes.message_retention_period as i64),
        };

        self.insert(message);

        debug!(
            queue = %self.key,
            message_id = %id,
            visible_in_seconds = delay,
            "Message sent"
        );

        Ok(id)
    }

    fn insert(&mut self, message: StoredMessage) {
        let id = message.id.clone();
        self.timers
            .schedule(message.retention_deadline, id.clone(), TimerKind::RetentionExpiry);
        match message.state {
            MessageState::Delayed { until } => {
                self.timers.schedule(until, id.clone(), TimerKind::DelayExpiry);
            }
            MessageState::Available => self.available.push_back(id.clone()),
            MessageState::InFlight { deadline } => {
                self.timers
                    .schedule(deadline, id.clone(), TimerKind::VisibilityExpiry);
            }
        }
        self.messages.insert(id, message);
        self.compact_timers();
    }

    /// Accept a message redriven from another queue. It arrives available,
    /// without a receipt handle, keeping its id, send time and cumulative
    /// receive count. A deleted queue hands the message back.
    pub fn accept_redriven(
        &mut self,
        mut message: StoredMessage,
        now: DateTime<Utc>,
    ) -> std::result::Result<bool, StoredMessage> {
        if self.deleted {
            return Err(message);
        }

        message.retention_deadline = message.sent_timestamp
            + Duration::seconds(self.attributes.message_retention_period as i64);
        if message.retention_deadline <= now {
            debug!(queue = %self.key, message_id = %message.id, "Redriven message already past retention");
            return Ok(false);
        }

        message.state = MessageState::Available;
        message.receipt = None;
        message.queue_receive_count = 0;
        self.insert(message);
        Ok(true)
    }

    /// Put back messages whose redrive could not complete.
    pub fn restore(&mut self, messages: Vec<StoredMessage>) {
        if self.deleted {
            return;
        }
        for mut message in messages {
            message.state = MessageState::Available;
            self.insert(message);
        }
    }

    /// Apply every timer due at `now`, in fire-time order.
    ///
    /// `redrive` is the policy whose target currently resolves; when it no
    /// longer matches the queue's own policy it is ignored and expiring
    /// messages return to the available state.
    pub fn process_due(&mut self, now: DateTime<Utc>, redrive: Option<&RedrivePolicy>) -> DueOutcome {
        let mut outcome = DueOutcome::default();
        if self.deleted {
            return outcome;
        }

        let redrive = redrive.filter(|p| self.attributes.redrive_policy.as_ref() == Some(*p));

        while let Some(entry) = self.timers.pop_due(now) {
            let Some(message) = self.messages.get_mut(&entry.message_id) else {
                continue;
            };
            trace!(
                queue = %self.key,
                message_id = %entry.message_id,
                timer = entry.kind.as_str(),
                "Timer due"
            );

            match entry.kind {
                TimerKind::DelayExpiry => {
                    if message.state == (MessageState::Delayed { until: entry.fire_at }) {
                        message.state = MessageState::Available;
                        self.available.push_back(entry.message_id);
                        outcome.became_available += 1;
                    }
                }
                TimerKind::VisibilityExpiry => {
                    if message.state != (MessageState::InFlight { deadline: entry.fire_at }) {
                        continue;
                    }

                    if let Some(policy) = redrive {
                        if message.queue_receive_count >= policy.max_receive_count {
                            if let Some(message) = self.messages.remove(&entry.message_id) {
                                debug!(
                                    queue = %self.key,
                                    message_id = %message.id,
                                    receive_count = message.receive_count,
                                    max_receive_count = policy.max_receive_count,
                                    "Message exceeded max receive count"
                                );
                                outcome.redriven.push(message);
                            }
                            continue;
                        }
                    }

                    message.state = MessageState::Available;
                    self.available.push_back(entry.message_id);
                    outcome.became_available += 1;
                }
                TimerKind::RetentionExpiry => {
                    if message.retention_deadline == entry.fire_at {
                        self.messages.remove(&entry.message_id);
                        outcome.expired += 1;
                        debug!(queue = %self.key, message_id = %entry.message_id, "Message expired");
                    }
                }
            }
        }

        outcome
    }

    /// Receive up to `max_messages` available messages.
    pub fn receive(
        &mut self,
        max_messages: usize,
        visibility_timeout: u32,
        selection: &AttributeSelection,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReceivedMessage>> {
        self.ensure_live()?;

        let deadline = now + Duration::seconds(visibility_timeout as i64);
        let mut received = Vec::new();

        while received.len() < max_messages {
            let Some(id) = self.available.pop_front() else {
                break;
            };
            let Some(message) = self.messages.get_mut(&id) else {
                continue;
            };
            if message.state != MessageState::Available {
                continue;
            }

            let generation = message.generation + 1;
            let (receipt_handle, token) = generate_receipt_handle(&self.key, &id, generation)?;

            message.generation = generation;
            message.receipt = Some(token);
            message.state = MessageState::InFlight { deadline };
            message.receive_count += 1;
            message.queue_receive_count += 1;
            if message.receive_count == 1 {
                message.first_receive_timestamp = Some(now);
            }

            received.push(selection.snapshot(message, receipt_handle));
            self.timers.schedule(deadline, id, TimerKind::VisibilityExpiry);
        }
        self.compact_timers();

        debug!(queue = %self.key, count = received.len(), "Messages received");
        Ok(received)
    }

    fn current_message_id(&self, receipt_handle: &str) -> Result<MessageId> {
        let data = parse_receipt_handle(receipt_handle)?;
        let message = self
            .messages
            .get(&data.message_id)
            .ok_or(Error::InvalidReceiptHandle)?;
        match &message.receipt {
            Some(token) if data.matches(&self.key, &message.id, token) => Ok(message.id.clone()),
            _ => Err(Error::InvalidReceiptHandle),
        }
    }

    /// Delete a message with its current receipt handle.
    pub fn delete_message(&mut self, receipt_handle: &str) -> Result<MessageId> {
        self.ensure_live()?;
        let id = self.current_message_id(receipt_handle)?;
        self.messages.remove(&id);
        self.compact_timers();
        debug!(queue = %self.key, message_id = %id, "Message deleted");
        Ok(id)
    }

    /// Reset the visibility deadline of an in-flight message to `now + timeout`.
    pub fn change_visibility(
        &mut self,
        receipt_handle: &str,
        visibility_timeout: u32,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_live()?;
        let id = self.current_message_id(receipt_handle)?;
        let message = self
            .messages
            .get_mut(&id)
            .ok_or(Error::InvalidReceiptHandle)?;

        if !matches!(message.state, MessageState::InFlight { .. }) {
            return Err(Error::MessageNotInflight);
        }

        let deadline = now + Duration::seconds(visibility_timeout as i64);
        message.state = MessageState::InFlight { deadline };
        self.timers.schedule(deadline, id.clone(), TimerKind::VisibilityExpiry);
        self.compact_timers();

        debug!(
            queue = %self.key,
            message_id = %id,
            visibility_timeout = visibility_timeout,
            "Visibility changed"
        );
        Ok(())
    }

    /// Remove every message regardless of state.
    pub fn purge(&mut self) -> Result<usize> {
        self.ensure_live()?;
        Ok(self.clear())
    }

    fn clear(&mut self) -> usize {
        let count = self.messages.len();
        self.messages.clear();
        self.available.clear();
        self.timers.clear();
        count
    }

    /// Mark the queue deleted and drop its messages.
    pub fn mark_deleted(&mut self) -> usize {
        let count = self.clear();
        self.deleted = true;
        if count > 0 {
            warn!(queue = %self.key, discarded = count, "Queue deleted with messages");
        }
        count
    }

    /// Live message counts.
    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats::default();
        for message in self.messages.values() {
            match message.state {
                MessageState::Available => stats.available_messages += 1,
                MessageState::Delayed { .. } => stats.delayed_messages += 1,
                MessageState::InFlight { .. } => stats.in_flight_messages += 1,
            }
            stats.oldest_message_timestamp = Some(
                stats
                    .oldest_message_timestamp
                    .map_or(message.sent_timestamp, |ts| ts.min(message.sent_timestamp)),
            );
        }
        stats
    }
}
