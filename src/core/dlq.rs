//! Dead-letter redrive index.
//!
//! Tracks which queues redrive to which dead-letter ARN, for listing the
//! sources of a dead-letter queue. Targets are kept as ARNs and resolved live
//! through the registry, so a dead-letter queue that is deleted and recreated
//! under the same name picks its sources back up. The redrive decision itself
//! reads the policy from the source queue's attributes.

use std::collections::{BTreeSet, HashMap};

use tokio::sync::RwLock;
use tracing::debug;

use crate::types::{QueueKey, RedrivePolicy};

#[derive(Debug, Default)]
struct IndexState {
    policies: HashMap<QueueKey, RedrivePolicy>,
    sources: HashMap<String, BTreeSet<QueueKey>>,
}

impl IndexState {
    fn unlink(&mut self, source: &QueueKey) -> Option<RedrivePolicy> {
        let previous = self.policies.remove(source)?;
        if let Some(sources) = self.sources.get_mut(&previous.dead_letter_target_arn) {
            sources.remove(source);
            if sources.is_empty() {
                self.sources.remove(&previous.dead_letter_target_arn);
            }
        }
        Some(previous)
    }
}

/// Forward and reverse redrive links.
#[derive(Debug, Default)]
pub struct RedriveIndex {
    state: RwLock<IndexState>,
}

impl RedriveIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the policy of `source`, replacing any previous link.
    pub async fn register_policy(&self, source: &QueueKey, policy: RedrivePolicy) {
        let mut state = self.state.write().await;
        state.unlink(source);
        state
            .sources
            .entry(policy.dead_letter_target_arn.clone())
            .or_default()
            .insert(source.clone());

        debug!(
            source = %source,
            target_arn = %policy.dead_letter_target_arn,
            max_receive_count = policy.max_receive_count,
            "Redrive policy registered"
        );
        state.policies.insert(source.clone(), policy);
    }

    /// Remove the policy of `source`, if any.
    pub async fn clear_policy(&self, source: &QueueKey) -> Option<RedrivePolicy> {
        let previous = self.state.write().await.unlink(source);
        if previous.is_some() {
            debug!(source = %source, "Redrive policy cleared");
        }
        previous
    }

    /// Queues whose policy targets `target_arn`, sorted.
    pub async fn sources_of(&self, target_arn: &str) -> Vec<QueueKey> {
        self.state
            .read()
            .await
            .sources
            .get(target_arn)
            .map(|sources| sources.iter().cloned().collect())
            .unwrap_or_default()
    }
}
