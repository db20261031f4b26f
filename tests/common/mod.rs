//! Shared helpers for engine integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use nimbusq::core::access::StaticAccountDirectory;
use nimbusq::core::clock::ManualClock;
use nimbusq::{
    AccountId, EngineConfig, ReceiveOptions, ReceivedMessage, SendMessageRequest, SqsEngine,
};

pub const OWNER: &str = "111111111111";
pub const OTHER: &str = "222222222222";

pub fn account(id: &str) -> AccountId {
    AccountId::new(id).expect("valid account id")
}

/// Engine on a manual clock with two registered accounts.
pub struct TestEnv {
    pub engine: SqsEngine,
    pub clock: Arc<ManualClock>,
    pub accounts: Arc<StaticAccountDirectory>,
    pub owner: AccountId,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let clock = Arc::new(ManualClock::starting_now());
        let accounts = Arc::new(StaticAccountDirectory::with_accounts([
            account(OWNER),
            account(OTHER),
        ]));
        let engine = SqsEngine::with_clock(config, accounts.clone(), clock.clone());
        Self {
            engine,
            clock,
            accounts,
            owner: account(OWNER),
        }
    }

    pub async fn create_queue(&self, name: &str) -> String {
        self.create_queue_with(name, &[]).await
    }

    pub async fn create_queue_with(&self, name: &str, attributes: &[(&str, &str)]) -> String {
        self.engine
            .create_queue(&self.owner, name, &attrs(attributes))
            .await
            .expect("Failed to create queue")
    }

    /// Queue redriving to `dlq_url` once a message reaches `max_receive_count`
    /// receives in it.
    pub async fn create_queue_with_dlq(
        &self,
        name: &str,
        dlq_url: &str,
        max_receive_count: u32,
    ) -> String {
        let policy = redrive_policy(&self.queue_arn(dlq_url).await, max_receive_count);
        self.create_queue_with(name, &[("RedrivePolicy", &policy)])
            .await
    }

    pub async fn queue_arn(&self, url: &str) -> String {
        self.engine
            .get_queue_attributes(&self.owner, url, &["QueueArn".to_string()])
            .await
            .expect("Failed to get queue ARN")
            .remove("QueueArn")
            .expect("QueueArn present")
    }

    pub async fn send(&self, url: &str, body: &str) {
        self.engine
            .send_message(&self.owner, url, SendMessageRequest::new(body))
            .await
            .expect("Failed to send message");
    }

    /// Receive at most one message with all attributes.
    pub async fn receive_one(&self, url: &str, visibility_timeout: u32) -> Option<ReceivedMessage> {
        let options = ReceiveOptions {
            visibility_timeout: Some(visibility_timeout),
            ..ReceiveOptions::with_all_attributes(1)
        };
        self.engine
            .receive_message(&self.owner, url, options)
            .await
            .expect("Failed to receive")
            .pop()
    }

    /// (available, in flight, delayed)
    pub async fn counts(&self, url: &str) -> (u64, u64, u64) {
        let stats = self
            .engine
            .queue_stats(&self.owner, url)
            .await
            .expect("Failed to get stats");
        (
            stats.available_messages,
            stats.in_flight_messages,
            stats.delayed_messages,
        )
    }
}

pub fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn redrive_policy(dlq_arn: &str, max_receive_count: u32) -> String {
    format!(
        r#"{{"maxReceiveCount":"{}","deadLetterTargetArn":"{}"}}"#,
        max_receive_count, dlq_arn
    )
}
