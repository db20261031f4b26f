//! SQS engine: every queue operation, gated by account access and backed by
//! the queue registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::MutexGuard;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::core::access::{AccessGate, AccountDirectory};
use crate::core::clock::{Clock, SystemClock};
use crate::core::shutdown::ShutdownSignal;
use crate::core::visibility::VisibilityManager;
use crate::error::ValidationError;
use crate::metrics::{get_metrics, Metrics};
use crate::sqs::types::{
    calculate_md5_of_attributes, calculate_md5_of_body, BatchErrorEntry, BatchResult,
    BatchResultEntry, ChangeMessageVisibilityBatchEntry, DeleteMessageBatchEntry,
    SendMessageBatchEntry,
};
use crate::storage::{AttributeSelection, CreateOutcome, QueueData, QueueHandle, QueueRegistry, StoredMessage};
use crate::types::validation::{
    validate_batch_ids, validate_message_attributes, validate_parameter_range,
    validate_sqs_queue_name, MAX_DELAY_SECONDS, MAX_RECEIVE_MESSAGES, MAX_VISIBILITY_TIMEOUT,
    MAX_WAIT_TIME_SECONDS,
};
use crate::types::{
    AccountId, QueueAttributeName, QueueAttributes, QueueKey, QueueStats, ReceiveOptions,
    ReceivedMessage, RedrivePolicy, SendMessageRequest, SendMessageResult,
};
use crate::{Error, Result};

struct EngineInner {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    registry: QueueRegistry,
    gate: AccessGate,
}

/// Multi-tenant SQS engine. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SqsEngine {
    inner: Arc<EngineInner>,
}

impl SqsEngine {
    /// Create an engine on the system clock.
    pub fn new(config: EngineConfig, accounts: Arc<dyn AccountDirectory>) -> Self {
        Self::with_clock(config, accounts, Arc::new(SystemClock::new()))
    }

    /// Create an engine on a caller-supplied clock.
    pub fn with_clock(
        config: EngineConfig,
        accounts: Arc<dyn AccountDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        info!(
            endpoint = %config.endpoint,
            region = %config.region,
            tick_interval_ms = config.scheduler.tick_interval_ms,
            "SQS engine initialized"
        );
        Self {
            inner: Arc::new(EngineInner {
                registry: QueueRegistry::new(config.region.clone(), config.endpoint.clone()),
                gate: AccessGate::new(accounts),
                clock,
                config,
            }),
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Current engine time.
    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// Spawn the background timer task. It stops when `shutdown` fires.
    pub fn start_background(&self, shutdown: &ShutdownSignal) -> JoinHandle<()> {
        let manager = Arc::new(VisibilityManager::with_interval(
            self.clone(),
            self.inner.config.scheduler.tick_interval(),
        ));
        tokio::spawn(manager.start(shutdown.subscribe()))
    }

    fn record(&self, f: impl FnOnce(&Metrics)) {
        if self.inner.config.metrics.enabled {
            if let Some(metrics) = get_metrics() {
                f(&metrics);
            }
        }
    }

    fn count(&self, key: &QueueKey, by: u64, counter: impl FnOnce(&Metrics) -> &prometheus::IntCounterVec) {
        if by == 0 {
            return;
        }
        self.record(|m| {
            counter(m)
                .with_label_values(&[key.account_id.as_str(), key.name.as_str()])
                .inc_by(by)
        });
    }

    async fn update_queue_gauge(&self) {
        if self.inner.config.metrics.enabled {
            let total = self.inner.registry.total_queue_count().await;
            self.record(|m| m.queue_count.set(total as i64));
        }
    }

    /// Authorize `url` for `caller` and look the queue up.
    async fn queue(&self, caller: &AccountId, url: &str) -> Result<Arc<QueueHandle>> {
        let key = self.inner.gate.authorize(caller, url).await?;
        self.inner.registry.get(&key).await
    }

    /// Resolve a dead-letter target ARN to a live queue.
    pub async fn resolve_target(&self, arn: &str) -> Option<Arc<QueueHandle>> {
        self.inner.registry.get_by_arn(arn).await
    }

    /// Lock a queue after applying every timer due now, handing redriven
    /// messages to their dead-letter queue.
    ///
    /// The policy is read from the queue's own attributes. `process_due`
    /// ignores it if the attributes change before the queue is locked again.
    async fn settle<'a>(&self, handle: &'a Arc<QueueHandle>) -> MutexGuard<'a, QueueData> {
        loop {
            let policy = handle.data.lock().await.attributes().redrive_policy.clone();
            let target = match &policy {
                Some(policy) => self.resolve_target(&policy.dead_letter_target_arn).await,
                None => None,
            };
            let active = policy.as_ref().filter(|_| target.is_some());

            let mut data = handle.data.lock().await;
            let outcome = data.process_due(self.now(), active);

            if outcome.became_available > 0 {
                handle.notify().notify_waiters();
            }
            self.count(handle.key(), outcome.expired as u64, |m| &m.messages_expired_total);

            match (target, outcome.redriven.is_empty()) {
                (Some(target), false) => {
                    drop(data);
                    self.hand_off(handle, &target, outcome.redriven).await;
                }
                _ => return data,
            }
        }
    }

    /// Move redriven messages into `target`. Messages the target cannot take
    /// go back to the source.
    async fn hand_off(
        &self,
        source: &Arc<QueueHandle>,
        target: &Arc<QueueHandle>,
        messages: Vec<StoredMessage>,
    ) {
        let mut moved = 0u64;
        let mut expired = 0u64;
        let mut rejected = Vec::new();
        {
            let mut data = target.data.lock().await;
            let now = self.now();
            for message in messages {
                let message_id = message.id().clone();
                let receive_count = message.receive_count();
                match data.accept_redriven(message, now) {
                    Ok(true) => {
                        moved += 1;
                        info!(
                            source_queue = %source.key(),
                            dlq = %target.key(),
                            message_id = %message_id,
                            receive_count = receive_count,
                            "Moved message to DLQ"
                        );
                    }
                    Ok(false) => expired += 1,
                    Err(message) => rejected.push(message),
                }
            }
        }

        if moved > 0 {
            target.notify().notify_waiters();
        }
        self.count(source.key(), moved, |m| &m.messages_to_dlq_total);
        self.count(target.key(), expired, |m| &m.messages_expired_total);

        if !rejected.is_empty() {
            warn!(
                source_queue = %source.key(),
                dlq = %target.key(),
                count = rejected.len(),
                "DLQ deleted during redrive, returning messages to source"
            );
            source.data.lock().await.restore(rejected);
            source.notify().notify_waiters();
        }
    }

    /// Apply due timers on every queue. Called by the background task.
    pub async fn process_due_timers(&self) -> Result<()> {
        for handle in self.inner.registry.all().await {
            drop(self.settle(&handle).await);
        }
        Ok(())
    }

    /// Check that a redrive policy names an existing queue in `owner`'s account.
    async fn validate_redrive_target(&self, owner: &AccountId, policy: &RedrivePolicy) -> Result<()> {
        let invalid = |reason: &str| ValidationError::InvalidAttributeValue {
            name: QueueAttributeName::RedrivePolicy.as_str().to_string(),
            reason: reason.to_string(),
        };

        let target = QueueKey::from_arn(&policy.dead_letter_target_arn)?;
        if &target.account_id != owner {
            return Err(invalid("dead-letter target must be in the same account").into());
        }
        if self.resolve_target(&policy.dead_letter_target_arn).await.is_none() {
            return Err(invalid("dead-letter target queue does not exist").into());
        }
        Ok(())
    }

    // ----- Queue lifecycle -----

    /// Create a queue, or return the URL of an existing queue whose
    /// configuration matches every supplied attribute.
    pub async fn create_queue(
        &self,
        caller: &AccountId,
        name: &str,
        attributes: &HashMap<String, String>,
    ) -> Result<String> {
        self.inner.gate.ensure_account(caller).await?;
        validate_sqs_queue_name(name)?;

        let queue_attributes = QueueAttributes::from_map(attributes)?;
        if let Some(policy) = &queue_attributes.redrive_policy {
            self.validate_redrive_target(caller, policy).await?;
        }

        let quota = match self.inner.gate.accounts().queue_quota(caller).await {
            Some(quota) => Some(quota),
            None => self.inner.config.limits.max_queues_per_account,
        };

        let key = QueueKey::new(caller.clone(), name);
        let outcome = self
            .inner
            .registry
            .create(key.clone(), queue_attributes.clone(), quota, self.now())
            .await?;

        match outcome {
            CreateOutcome::Created(handle) => {
                self.update_queue_gauge().await;
                Ok(handle.url().to_string())
            }
            CreateOutcome::Existing(handle) => {
                if handle.data.lock().await.attributes().matches(attributes)? {
                    debug!(queue = %key, "Queue already exists with matching attributes");
                    Ok(handle.url().to_string())
                } else {
                    Err(Error::QueueAlreadyExists(name.to_string()))
                }
            }
        }
    }

    /// Delete a queue and every message in it.
    pub async fn delete_queue(&self, caller: &AccountId, url: &str) -> Result<()> {
        let key = self.inner.gate.authorize(caller, url).await?;
        self.inner.registry.remove(&key).await?;
        self.update_queue_gauge().await;
        Ok(())
    }

    /// URL of `name` in `owner`'s account (the caller's by default).
    pub async fn get_queue_url(
        &self,
        caller: &AccountId,
        name: &str,
        owner: Option<&AccountId>,
    ) -> Result<String> {
        let owner = owner.unwrap_or(caller);
        self.inner.gate.ensure_account(owner).await?;
        validate_sqs_queue_name(name)?;

        let handle = self.inner.registry.get(&QueueKey::new(owner.clone(), name)).await?;
        Ok(handle.url().to_string())
    }

    /// URLs of the caller's queues whose names start with `prefix`, sorted.
    pub async fn list_queues(&self, caller: &AccountId, prefix: Option<&str>) -> Result<Vec<String>> {
        self.inner.gate.ensure_account(caller).await?;
        Ok(self
            .inner
            .registry
            .list(caller, prefix)
            .await
            .iter()
            .map(|handle| handle.url().to_string())
            .collect())
    }

    /// URLs of the live queues whose redrive policy targets this queue.
    pub async fn list_dead_letter_source_queues(
        &self,
        caller: &AccountId,
        url: &str,
    ) -> Result<Vec<String>> {
        let handle = self.queue(caller, url).await?;
        let mut urls = Vec::new();
        for source in self.inner.registry.redrive().sources_of(handle.arn()).await {
            let Ok(source) = self.inner.registry.get(&source).await else {
                continue;
            };
            let targets_queue = source
                .data
                .lock()
                .await
                .attributes()
                .redrive_policy
                .as_ref()
                .is_some_and(|policy| policy.dead_letter_target_arn == handle.arn());
            if targets_queue {
                urls.push(source.url().to_string());
            }
        }
        Ok(urls)
    }

    // ----- Messages -----

    /// Send one message.
    pub async fn send_message(
        &self,
        caller: &AccountId,
        url: &str,
        request: SendMessageRequest,
    ) -> Result<SendMessageResult> {
        let handle = self.queue(caller, url).await?;
        self.send_to(caller, &handle, request).await
    }

    async fn send_to(
        &self,
        caller: &AccountId,
        handle: &Arc<QueueHandle>,
        request: SendMessageRequest,
    ) -> Result<SendMessageResult> {
        let start = Instant::now();

        if let Some(delay) = request.delay_seconds {
            validate_parameter_range("DelaySeconds", delay, 0, MAX_DELAY_SECONDS)?;
        }
        validate_message_attributes(&request.message_attributes)?;

        let md5_of_body = calculate_md5_of_body(&request.body);
        let md5_of_message_attributes = (!request.message_attributes.is_empty())
            .then(|| calculate_md5_of_attributes(&request.message_attributes));

        let message_id = {
            let mut data = self.settle(handle).await;
            data.send(caller, request, self.now())?
        };
        handle.notify().notify_waiters();

        self.count(handle.key(), 1, |m| &m.messages_sent_total);
        self.record(|m| m.send_latency_seconds.observe(start.elapsed().as_secs_f64()));

        Ok(SendMessageResult {
            message_id,
            md5_of_body,
            md5_of_message_attributes,
        })
    }

    /// Send up to 10 messages. Entry failures are reported per entry.
    pub async fn send_message_batch(
        &self,
        caller: &AccountId,
        url: &str,
        entries: Vec<SendMessageBatchEntry>,
    ) -> Result<BatchResult> {
        validate_batch_ids(entries.iter().map(|e| e.id.as_str()))?;
        let handle = self.queue(caller, url).await?;

        let mut result = BatchResult::default();
        for entry in entries {
            match self.send_to(caller, &handle, entry.request).await {
                Ok(sent) => result.successful.push(BatchResultEntry {
                    id: entry.id,
                    message_id: Some(sent.message_id),
                    md5_of_body: Some(sent.md5_of_body),
                }),
                Err(e) => result.failed.push(BatchErrorEntry::from_error(entry.id, &e)),
            }
        }
        Ok(result)
    }

    /// Receive up to `max_messages` messages, long-polling when a wait time
    /// applies and nothing is available.
    pub async fn receive_message(
        &self,
        caller: &AccountId,
        url: &str,
        options: ReceiveOptions,
    ) -> Result<Vec<ReceivedMessage>> {
        let start = Instant::now();

        validate_parameter_range("MaxNumberOfMessages", options.max_messages, 1, MAX_RECEIVE_MESSAGES)?;
        if let Some(timeout) = options.visibility_timeout {
            validate_parameter_range("VisibilityTimeout", timeout, 0, MAX_VISIBILITY_TIMEOUT)?;
        }
        if let Some(wait) = options.wait_time_seconds {
            validate_parameter_range("WaitTimeSeconds", wait, 0, MAX_WAIT_TIME_SECONDS)?;
        }
        let selection = AttributeSelection::from_options(&options)?;
        let handle = self.queue(caller, url).await?;

        let tick = self.inner.config.scheduler.tick_interval();
        let mut wait_until: Option<Instant> = None;

        let messages = loop {
            let notified = handle.notify().notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let (messages, wait_seconds) = {
                let mut data = self.settle(&handle).await;
                let visibility_timeout = options
                    .visibility_timeout
                    .unwrap_or(data.attributes().visibility_timeout);
                let messages = data.receive(
                    options.max_messages as usize,
                    visibility_timeout,
                    &selection,
                    self.now(),
                )?;
                let wait_seconds = options
                    .wait_time_seconds
                    .unwrap_or(data.attributes().receive_message_wait_time_seconds);
                (messages, wait_seconds)
            };

            let deadline =
                *wait_until.get_or_insert_with(|| start + Duration::from_secs(wait_seconds as u64));
            let now = Instant::now();
            if !messages.is_empty() || now >= deadline {
                break messages;
            }

            let step = (deadline - now).min(tick);
            let _ = tokio::time::timeout(step, notified).await;
        };

        self.count(handle.key(), messages.len() as u64, |m| &m.messages_received_total);
        self.record(|m| m.receive_latency_seconds.observe(start.elapsed().as_secs_f64()));
        Ok(messages)
    }

    /// Delete a message with its current receipt handle.
    pub async fn delete_message(&self, caller: &AccountId, url: &str, receipt_handle: &str) -> Result<()> {
        let handle = self.queue(caller, url).await?;
        self.settle(&handle).await.delete_message(receipt_handle)?;
        self.count(handle.key(), 1, |m| &m.messages_deleted_total);
        Ok(())
    }

    /// Delete up to 10 messages. Entry failures are reported per entry.
    pub async fn delete_message_batch(
        &self,
        caller: &AccountId,
        url: &str,
        entries: Vec<DeleteMessageBatchEntry>,
    ) -> Result<BatchResult> {
        validate_batch_ids(entries.iter().map(|e| e.id.as_str()))?;
        let handle = self.queue(caller, url).await?;

        let mut result = BatchResult::default();
        {
            let mut data = self.settle(&handle).await;
            for entry in entries {
                match data.delete_message(&entry.receipt_handle) {
                    Ok(_) => result.successful.push(BatchResultEntry {
                        id: entry.id,
                        message_id: None,
                        md5_of_body: None,
                    }),
                    Err(e) => result.failed.push(BatchErrorEntry::from_error(entry.id, &e)),
                }
            }
        }

        self.count(handle.key(), result.successful.len() as u64, |m| &m.messages_deleted_total);
        Ok(result)
    }

    /// Reset the visibility timeout of an in-flight message, counted from now.
    pub async fn change_message_visibility(
        &self,
        caller: &AccountId,
        url: &str,
        receipt_handle: &str,
        visibility_timeout: u32,
    ) -> Result<()> {
        validate_parameter_range("VisibilityTimeout", visibility_timeout, 0, MAX_VISIBILITY_TIMEOUT)?;
        let handle = self.queue(caller, url).await?;
        let mut data = self.settle(&handle).await;
        data.change_visibility(receipt_handle, visibility_timeout, self.now())
    }

    /// Change visibility of up to 10 messages. Entry failures are reported
    /// per entry.
    pub async fn change_message_visibility_batch(
        &self,
        caller: &AccountId,
        url: &str,
        entries: Vec<ChangeMessageVisibilityBatchEntry>,
    ) -> Result<BatchResult> {
        validate_batch_ids(entries.iter().map(|e| e.id.as_str()))?;
        let handle = self.queue(caller, url).await?;

        let mut result = BatchResult::default();
        let mut data = self.settle(&handle).await;
        let now = self.now();
        for entry in entries {
            let changed = validate_parameter_range(
                "VisibilityTimeout",
                entry.visibility_timeout,
                0,
                MAX_VISIBILITY_TIMEOUT,
            )
            .and_then(|_| data.change_visibility(&entry.receipt_handle, entry.visibility_timeout, now));

            match changed {
                Ok(()) => result.successful.push(BatchResultEntry {
                    id: entry.id,
                    message_id: None,
                    md5_of_body: None,
                }),
                Err(e) => result.failed.push(BatchErrorEntry::from_error(entry.id, &e)),
            }
        }
        Ok(result)
    }

    /// Remove every message from the queue regardless of state.
    pub async fn purge_queue(&self, caller: &AccountId, url: &str) -> Result<()> {
        let handle = self.queue(caller, url).await?;
        let purged = self.settle(&handle).await.purge()?;
        info!(queue = %handle.key(), purged = purged, "Queue purged");
        self.count(handle.key(), purged as u64, |m| &m.messages_purged_total);
        Ok(())
    }

    // ----- Attributes -----

    /// Update settable attributes. Nothing changes if any entry is invalid.
    pub async fn set_queue_attributes(
        &self,
        caller: &AccountId,
        url: &str,
        attributes: &HashMap<String, String>,
    ) -> Result<()> {
        let handle = self.queue(caller, url).await?;

        if let Some(value) = attributes.get(QueueAttributeName::RedrivePolicy.as_str()) {
            if !value.trim().is_empty() {
                let policy = RedrivePolicy::from_json(value)?;
                self.validate_redrive_target(&handle.key().account_id, &policy).await?;
            }
        }

        let mut data = self.settle(&handle).await;
        let mut updated = data.attributes().clone();
        updated.apply(attributes)?;
        let policy = updated.redrive_policy.clone();
        data.set_attributes(updated, self.now())?;

        let redrive = self.inner.registry.redrive();
        match policy {
            Some(policy) => redrive.register_policy(handle.key(), policy).await,
            None => {
                redrive.clear_policy(handle.key()).await;
            }
        }

        debug!(queue = %handle.key(), "Queue attributes updated");
        Ok(())
    }

    /// Read queue attributes. `All` expands to every attribute; unknown names
    /// fail with `InvalidAttributeName`.
    pub async fn get_queue_attributes(
        &self,
        caller: &AccountId,
        url: &str,
        names: &[String],
    ) -> Result<HashMap<String, String>> {
        let mut requested = Vec::new();
        for name in names {
            match name.parse::<QueueAttributeName>()? {
                QueueAttributeName::All => requested.extend(QueueAttributeName::ALL),
                other => requested.push(other),
            }
        }

        let handle = self.queue(caller, url).await?;
        let data = self.settle(&handle).await;
        let stats = data.stats();
        let settable = data.attributes().to_map();

        let mut result = HashMap::new();
        for name in requested {
            let value = match name {
                QueueAttributeName::ApproximateNumberOfMessages => {
                    Some(stats.available_messages.to_string())
                }
                QueueAttributeName::ApproximateNumberOfMessagesNotVisible => {
                    Some(stats.in_flight_messages.to_string())
                }
                QueueAttributeName::ApproximateNumberOfMessagesDelayed => {
                    Some(stats.delayed_messages.to_string())
                }
                QueueAttributeName::CreatedTimestamp => {
                    Some(data.created_at().timestamp().to_string())
                }
                QueueAttributeName::LastModifiedTimestamp => {
                    Some(data.last_modified().timestamp().to_string())
                }
                QueueAttributeName::QueueArn => Some(handle.arn().to_string()),
                QueueAttributeName::All => None,
                settable_name => settable.get(settable_name.as_str()).cloned(),
            };
            if let Some(value) = value {
                result.insert(name.as_str().to_string(), value);
            }
        }
        Ok(result)
    }

    /// Live message counts of a queue.
    pub async fn queue_stats(&self, caller: &AccountId, url: &str) -> Result<QueueStats> {
        let handle = self.queue(caller, url).await?;
        let stats = self.settle(&handle).await.stats();
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::access::StaticAccountDirectory;
    use crate::core::clock::ManualClock;

    const ACCOUNT: &str = "123456789012";

    fn account() -> AccountId {
        AccountId::new(ACCOUNT).unwrap()
    }

    fn engine() -> (SqsEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let accounts = Arc::new(StaticAccountDirectory::with_accounts([account()]));
        let engine = SqsEngine::with_clock(EngineConfig::default(), accounts, clock.clone());
        (engine, clock)
    }

    #[tokio::test]
    async fn test_create_queue_returns_url() {
        let (engine, _) = engine();
        let url = engine
            .create_queue(&account(), "orders", &HashMap::new())
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:9324/123456789012/orders");
        assert_eq!(
            engine.get_queue_url(&account(), "orders", None).await.unwrap(),
            url
        );
    }

    #[tokio::test]
    async fn test_send_receive_delete() {
        let (engine, _) = engine();
        let url = engine
            .create_queue(&account(), "orders", &HashMap::new())
            .await
            .unwrap();

        let sent = engine
            .send_message(&account(), &url, SendMessageRequest::new("Hello, World!"))
            .await
            .unwrap();
        assert_eq!(sent.md5_of_body, "65a8e27d8879283831b664bd8b7f0ad4");
        assert!(sent.md5_of_message_attributes.is_none());

        let received = engine
            .receive_message(&account(), &url, ReceiveOptions::default())
            .await
            .unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].message_id, sent.message_id);

        engine
            .delete_message(&account(), &url, &received[0].receipt_handle)
            .await
            .unwrap();
        assert_eq!(engine.queue_stats(&account(), &url).await.unwrap(), QueueStats::default());
    }

    #[tokio::test]
    async fn test_invalid_receive_parameters() {
        let (engine, _) = engine();
        let url = engine
            .create_queue(&account(), "orders", &HashMap::new())
            .await
            .unwrap();

        let options = ReceiveOptions {
            max_messages: 11,
            ..Default::default()
        };
        assert!(engine.receive_message(&account(), &url, options).await.is_err());

        let options = ReceiveOptions {
            wait_time_seconds: Some(21),
            ..Default::default()
        };
        assert!(engine.receive_message(&account(), &url, options).await.is_err());
    }

    #[tokio::test]
    async fn test_get_queue_attributes_all() {
        let (engine, clock) = engine();
        let url = engine
            .create_queue(&account(), "orders", &HashMap::new())
            .await
            .unwrap();
        engine
            .send_message(&account(), &url, SendMessageRequest::new("a"))
            .await
            .unwrap();
        engine
            .send_message(&account(), &url, SendMessageRequest::new("b").with_delay(30))
            .await
            .unwrap();

        let attrs = engine
            .get_queue_attributes(&account(), &url, &["All".to_string()])
            .await
            .unwrap();
        assert_eq!(attrs["ApproximateNumberOfMessages"], "1");
        assert_eq!(attrs["ApproximateNumberOfMessagesDelayed"], "1");
        assert_eq!(attrs["ApproximateNumberOfMessagesNotVisible"], "0");
        assert_eq!(attrs["QueueArn"], "arn:aws:sqs:us-east-1:123456789012:orders");
        assert_eq!(attrs["VisibilityTimeout"], "30");
        assert_eq!(attrs["CreatedTimestamp"], clock.now().timestamp().to_string());
        assert!(!attrs.contains_key("RedrivePolicy"));

        assert!(engine
            .get_queue_attributes(&account(), &url, &["Bogus".to_string()])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_batch_requests_validated_as_a_whole() {
        let (engine, _) = engine();
        let url = engine
            .create_queue(&account(), "orders", &HashMap::new())
            .await
            .unwrap();

        let err = engine
            .send_message_batch(&account(), &url, Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "AWS.SimpleQueueService.EmptyBatchRequest");

        let entries = vec![
            SendMessageBatchEntry {
                id: "ok".to_string(),
                request: SendMessageRequest::new("fine"),
            },
            SendMessageBatchEntry {
                id: "empty".to_string(),
                request: SendMessageRequest::new(""),
            },
        ];
        let result = engine
            .send_message_batch(&account(), &url, entries)
            .await
            .unwrap();
        assert_eq!(result.successful.len(), 1);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].id, "empty");
        assert!(result.failed[0].sender_fault);
    }

    #[tokio::test]
    async fn test_redrive_follows_queue_attributes_not_index() {
        let (engine, clock) = engine();
        let dlq = engine
            .create_queue(&account(), "dlq", &HashMap::new())
            .await
            .unwrap();
        let policy = format!(
            r#"{{"deadLetterTargetArn":"arn:aws:sqs:us-east-1:{}:dlq","maxReceiveCount":"1"}}"#,
            ACCOUNT
        );
        let attributes = HashMap::from([("RedrivePolicy".to_string(), policy)]);
        let source = engine
            .create_queue(&account(), "source", &attributes)
            .await
            .unwrap();

        // A stale clear of the source's link must not stop redrive.
        let key = QueueKey::new(account(), "source");
        engine.inner.registry.redrive().clear_policy(&key).await;

        engine
            .send_message(&account(), &source, SendMessageRequest::new("m"))
            .await
            .unwrap();
        let options = ReceiveOptions {
            visibility_timeout: Some(1),
            ..Default::default()
        };
        assert_eq!(
            engine.receive_message(&account(), &source, options).await.unwrap().len(),
            1
        );
        clock.advance_secs(1);
        engine.process_due_timers().await.unwrap();

        assert_eq!(engine.queue_stats(&account(), &dlq).await.unwrap().available_messages, 1);
        assert_eq!(engine.queue_stats(&account(), &source).await.unwrap(), QueueStats::default());
    }
}
