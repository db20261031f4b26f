//! Queue registry: per-account namespaces of live queues.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::info;

use crate::core::dlq::RedriveIndex;
use crate::storage::memory::QueueData;
use crate::types::{AccountId, QueueAttributes, QueueKey};
use crate::{Error, Result};

/// A live queue: identity, message state and a wake-up channel for long polls.
#[derive(Debug)]
pub struct QueueHandle {
    key: QueueKey,
    arn: String,
    url: String,
    /// Message state. Never lock the registry while holding this.
    pub data: Mutex<QueueData>,
    notify: Notify,
}

impl QueueHandle {
    fn new(
        key: QueueKey,
        attributes: QueueAttributes,
        region: &str,
        endpoint: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            arn: key.arn(region),
            url: key.url(endpoint),
            data: Mutex::new(QueueData::new(key.clone(), attributes, now)),
            key,
            notify: Notify::new(),
        }
    }

    /// Queue identity.
    pub fn key(&self) -> &QueueKey {
        &self.key
    }

    /// Queue ARN.
    pub fn arn(&self) -> &str {
        &self.arn
    }

    /// Queue URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Long-poll wake-up channel.
    pub fn notify(&self) -> &Notify {
        &self.notify
    }
}

/// Outcome of [`QueueRegistry::create`].
#[derive(Debug)]
pub enum CreateOutcome {
    /// A new queue was created.
    Created(Arc<QueueHandle>),
    /// A queue with that name already existed.
    Existing(Arc<QueueHandle>),
}

/// All queues, grouped by owning account and sorted by name.
///
/// Redrive links of a queue are registered and cleared while the registry
/// write lock is held, so a queue deleted and recreated under the same name
/// never loses the new queue's link.
#[derive(Debug)]
pub struct QueueRegistry {
    region: String,
    endpoint: String,
    queues: RwLock<HashMap<AccountId, BTreeMap<String, Arc<QueueHandle>>>>,
    redrive: RedriveIndex,
}

impl QueueRegistry {
    /// Create an empty registry issuing ARNs in `region` and URLs under `endpoint`.
    pub fn new(region: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            endpoint: endpoint.into(),
            queues: RwLock::new(HashMap::new()),
            redrive: RedriveIndex::new(),
        }
    }

    /// Dead-letter links of every queue.
    pub fn redrive(&self) -> &RedriveIndex {
        &self.redrive
    }

    /// Create `key` unless it exists. `quota` caps the number of queues the
    /// owning account may hold; it is checked only when a new queue would be
    /// created.
    pub async fn create(
        &self,
        key: QueueKey,
        attributes: QueueAttributes,
        quota: Option<usize>,
        now: DateTime<Utc>,
    ) -> Result<CreateOutcome> {
        let mut queues = self.queues.write().await;
        let namespace = queues.entry(key.account_id.clone()).or_default();

        if let Some(existing) = namespace.get(&key.name) {
            return Ok(CreateOutcome::Existing(existing.clone()));
        }

        if let Some(limit) = quota {
            if namespace.len() >= limit {
                return Err(Error::QuotaExceeded {
                    account: key.account_id.to_string(),
                    limit,
                });
            }
        }

        let policy = attributes.redrive_policy.clone();
        let handle = Arc::new(QueueHandle::new(
            key.clone(),
            attributes,
            &self.region,
            &self.endpoint,
            now,
        ));
        namespace.insert(key.name.clone(), handle.clone());
        if let Some(policy) = policy {
            self.redrive.register_policy(&key, policy).await;
        }

        info!(queue = %key, arn = %handle.arn, "Queue created");
        Ok(CreateOutcome::Created(handle))
    }

    /// Look up a queue.
    pub async fn get(&self, key: &QueueKey) -> Result<Arc<QueueHandle>> {
        self.queues
            .read()
            .await
            .get(&key.account_id)
            .and_then(|namespace| namespace.get(&key.name))
            .cloned()
            .ok_or_else(|| Error::QueueNotFound(key.to_string()))
    }

    /// Look up a queue by ARN. Returns `None` when the ARN is malformed or the
    /// queue does not exist.
    pub async fn get_by_arn(&self, arn: &str) -> Option<Arc<QueueHandle>> {
        let key = QueueKey::from_arn(arn).ok()?;
        let handle = self.get(&key).await.ok()?;
        (handle.arn == arn).then_some(handle)
    }

    /// Remove a queue from its namespace and discard its messages.
    pub async fn remove(&self, key: &QueueKey) -> Result<Arc<QueueHandle>> {
        let handle = {
            let mut queues = self.queues.write().await;
            let namespace = queues
                .get_mut(&key.account_id)
                .ok_or_else(|| Error::QueueNotFound(key.to_string()))?;
            let handle = namespace
                .remove(&key.name)
                .ok_or_else(|| Error::QueueNotFound(key.to_string()))?;
            if namespace.is_empty() {
                queues.remove(&key.account_id);
            }
            self.redrive.clear_policy(key).await;
            handle
        };

        let discarded = handle.data.lock().await.mark_deleted();
        handle.notify.notify_waiters();

        info!(queue = %key, discarded = discarded, "Queue deleted");
        Ok(handle)
    }

    /// Queues of `account` whose names start with `prefix`, sorted by name.
    pub async fn list(&self, account: &AccountId, prefix: Option<&str>) -> Vec<Arc<QueueHandle>> {
        let queues = self.queues.read().await;
        let Some(namespace) = queues.get(account) else {
            return Vec::new();
        };

        match prefix.filter(|p| !p.is_empty()) {
            Some(prefix) => namespace
                .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
                .take_while(|(name, _)| name.starts_with(prefix))
                .map(|(_, handle)| handle.clone())
                .collect(),
            None => namespace.values().cloned().collect(),
        }
    }

    /// Every live queue.
    pub async fn all(&self) -> Vec<Arc<QueueHandle>> {
        self.queues
            .read()
            .await
            .values()
            .flat_map(|namespace| namespace.values().cloned())
            .collect()
    }

    /// Number of live queues across all accounts.
    pub async fn total_queue_count(&self) -> usize {
        self.queues.read().await.values().map(BTreeMap::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> AccountId {
        AccountId::new("123456789012").unwrap()
    }

    fn registry() -> QueueRegistry {
        QueueRegistry::new("us-east-1", "http://localhost:9324")
    }

    async fn create(registry: &QueueRegistry, name: &str) -> Arc<QueueHandle> {
        let outcome = registry
            .create(
                QueueKey::new(account(), name),
                QueueAttributes::default(),
                None,
                Utc::now(),
            )
            .await
            .unwrap();
        match outcome {
            CreateOutcome::Created(handle) => handle,
            CreateOutcome::Existing(_) => panic!("queue {} already existed", name),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let registry = registry();
        let handle = create(&registry, "orders").await;

        assert_eq!(handle.url(), "http://localhost:9324/123456789012/orders");
        assert_eq!(handle.arn(), "arn:aws:sqs:us-east-1:123456789012:orders");

        let found = registry.get(&QueueKey::new(account(), "orders")).await.unwrap();
        assert!(Arc::ptr_eq(&handle, &found));
        assert!(registry.get_by_arn(handle.arn()).await.is_some());
        assert!(registry
            .get_by_arn("arn:aws:sqs:eu-west-1:123456789012:orders")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_create_existing_returns_same_queue() {
        let registry = registry();
        let first = create(&registry, "orders").await;
        let outcome = registry
            .create(
                QueueKey::new(account(), "orders"),
                QueueAttributes::default(),
                None,
                Utc::now(),
            )
            .await
            .unwrap();

        match outcome {
            CreateOutcome::Existing(existing) => assert!(Arc::ptr_eq(&first, &existing)),
            CreateOutcome::Created(_) => panic!("expected the existing queue"),
        }
        assert_eq!(registry.list(&account(), None).await.len(), 1);
    }

    #[tokio::test]
    async fn test_quota_applies_to_new_queues_only() {
        let registry = registry();
        let key = |name: &str| QueueKey::new(account(), name);
        let now = Utc::now();

        registry.create(key("a"), QueueAttributes::default(), Some(1), now).await.unwrap();
        assert!(registry
            .create(key("a"), QueueAttributes::default(), Some(1), now)
            .await
            .is_ok());
        assert!(matches!(
            registry.create(key("b"), QueueAttributes::default(), Some(1), now).await,
            Err(Error::QuotaExceeded { limit: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_prefix_listing() {
        let registry = registry();
        for name in ["a", "b", "c", "aa", "bb", "cc", "ab", "ac", "aab", "aba", "abb", "abc"] {
            create(&registry, name).await;
        }

        let names = |handles: Vec<Arc<QueueHandle>>| -> Vec<String> {
            handles.iter().map(|h| h.key().name.clone()).collect()
        };

        assert_eq!(
            names(registry.list(&account(), Some("ab")).await),
            vec!["ab", "aba", "abb", "abc"]
        );
        assert_eq!(names(registry.list(&account(), Some("c")).await), vec!["c", "cc"]);
        assert!(registry.list(&account(), Some("z")).await.is_empty());
        assert_eq!(registry.list(&account(), None).await.len(), 12);
        assert_eq!(registry.list(&account(), Some("")).await.len(), 12);
    }

    #[tokio::test]
    async fn test_remove_marks_deleted() {
        let registry = registry();
        let handle = create(&registry, "orders").await;

        registry.remove(handle.key()).await.unwrap();
        assert!(matches!(
            handle
                .data
                .lock()
                .await
                .send(&account(), crate::types::SendMessageRequest::new("m"), Utc::now()),
            Err(Error::QueueNotFound(_))
        ));
        assert!(matches!(
            registry.get(handle.key()).await,
            Err(Error::QueueNotFound(_))
        ));
        assert!(registry.remove(handle.key()).await.is_err());
        assert_eq!(registry.total_queue_count().await, 0);
    }

    #[tokio::test]
    async fn test_redrive_link_follows_queue_lifecycle() {
        let registry = registry();
        let dlq_arn = "arn:aws:sqs:us-east-1:123456789012:dlq";
        let with_policy = || QueueAttributes {
            redrive_policy: Some(crate::types::RedrivePolicy {
                max_receive_count: 3,
                dead_letter_target_arn: dlq_arn.to_string(),
            }),
            ..Default::default()
        };
        let key = QueueKey::new(account(), "orders");

        registry.create(key.clone(), with_policy(), None, Utc::now()).await.unwrap();
        assert_eq!(registry.redrive().sources_of(dlq_arn).await, vec![key.clone()]);

        registry.remove(&key).await.unwrap();
        assert!(registry.redrive().sources_of(dlq_arn).await.is_empty());

        // The recreated queue owns its link; nothing from the old queue clears it.
        registry.create(key.clone(), with_policy(), None, Utc::now()).await.unwrap();
        assert_eq!(registry.redrive().sources_of(dlq_arn).await, vec![key]);
    }
}
