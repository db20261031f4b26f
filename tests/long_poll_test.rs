//! Long polling and concurrency tests on the system clock.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use nimbusq::core::access::StaticAccountDirectory;
use nimbusq::core::shutdown::ShutdownSignal;
use nimbusq::{AccountId, EngineConfig, Error, ReceiveOptions, SendMessageRequest, SqsEngine};

fn setup() -> (SqsEngine, AccountId) {
    let owner = AccountId::new("111111111111").unwrap();
    let accounts = Arc::new(StaticAccountDirectory::with_accounts([owner.clone()]));
    (SqsEngine::new(EngineConfig::default(), accounts), owner)
}

fn wait_options(seconds: u32) -> ReceiveOptions {
    ReceiveOptions {
        wait_time_seconds: Some(seconds),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_long_poll_returns_when_message_arrives() {
    let (engine, owner) = setup();
    let url = engine
        .create_queue(&owner, "poll", &Default::default())
        .await
        .unwrap();

    let receiver = {
        let engine = engine.clone();
        let owner = owner.clone();
        let url = url.clone();
        tokio::spawn(async move {
            let start = Instant::now();
            let messages = engine.receive_message(&owner, &url, wait_options(10)).await;
            (messages, start.elapsed())
        })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    engine
        .send_message(&owner, &url, SendMessageRequest::new("wake up"))
        .await
        .unwrap();

    let (messages, elapsed) = tokio::time::timeout(Duration::from_secs(5), receiver)
        .await
        .expect("long poll did not return")
        .unwrap();
    let messages = messages.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].body, "wake up");
    assert!(elapsed < Duration::from_secs(5));
}

#[tokio::test]
async fn test_empty_long_poll_waits_for_deadline() {
    let (engine, owner) = setup();
    let url = engine
        .create_queue(&owner, "quiet", &Default::default())
        .await
        .unwrap();

    let start = Instant::now();
    let messages = engine
        .receive_message(&owner, &url, wait_options(1))
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert!(messages.is_empty());
    assert!(elapsed >= Duration::from_secs(1), "returned after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(3), "returned after {:?}", elapsed);
}

#[tokio::test]
async fn test_queue_wait_time_attribute_applies() {
    let (engine, owner) = setup();
    let mut attributes = std::collections::HashMap::new();
    attributes.insert("ReceiveMessageWaitTimeSeconds".to_string(), "1".to_string());
    let url = engine.create_queue(&owner, "slow", &attributes).await.unwrap();

    let start = Instant::now();
    let messages = engine
        .receive_message(&owner, &url, ReceiveOptions::default())
        .await
        .unwrap();
    assert!(messages.is_empty());
    assert!(start.elapsed() >= Duration::from_secs(1));

    // An explicit zero overrides the queue default.
    let start = Instant::now();
    engine
        .receive_message(&owner, &url, wait_options(0))
        .await
        .unwrap();
    assert!(start.elapsed() < Duration::from_millis(500));
}

#[tokio::test]
async fn test_long_poll_sees_delayed_message_become_visible() {
    let (engine, owner) = setup();
    let url = engine
        .create_queue(&owner, "delayed", &Default::default())
        .await
        .unwrap();
    engine
        .send_message(&owner, &url, SendMessageRequest::new("later").with_delay(1))
        .await
        .unwrap();

    let messages = engine
        .receive_message(&owner, &url, wait_options(5))
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].body, "later");
}

#[tokio::test]
async fn test_queue_deleted_during_long_poll() {
    let (engine, owner) = setup();
    let url = engine
        .create_queue(&owner, "vanishing", &Default::default())
        .await
        .unwrap();

    let receiver = {
        let engine = engine.clone();
        let owner = owner.clone();
        let url = url.clone();
        tokio::spawn(async move { engine.receive_message(&owner, &url, wait_options(10)).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    engine.delete_queue(&owner, &url).await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), receiver)
        .await
        .expect("long poll did not return")
        .unwrap();
    assert!(matches!(result, Err(Error::QueueNotFound(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_receivers_never_share_a_message() {
    let (engine, owner) = setup();
    let url = engine
        .create_queue(&owner, "contended", &Default::default())
        .await
        .unwrap();

    for i in 0..100 {
        engine
            .send_message(&owner, &url, SendMessageRequest::new(format!("m{}", i)))
            .await
            .unwrap();
    }

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let engine = engine.clone();
        let owner = owner.clone();
        let url = url.clone();
        tasks.push(tokio::spawn(async move {
            let mut ids = Vec::new();
            let options = ReceiveOptions {
                max_messages: 3,
                visibility_timeout: Some(300),
                ..Default::default()
            };
            loop {
                let batch = engine
                    .receive_message(&owner, &url, options.clone())
                    .await
                    .unwrap();
                if batch.is_empty() {
                    break;
                }
                ids.extend(batch.into_iter().map(|m| m.message_id));
            }
            ids
        }));
    }

    let mut seen = HashSet::new();
    for task in tasks {
        for id in task.await.unwrap() {
            assert!(seen.insert(id), "message delivered twice");
        }
    }
    assert_eq!(seen.len(), 100);
}

#[tokio::test]
async fn test_background_task_redrives_idle_queue() {
    let (engine, owner) = setup();
    let dlq = engine
        .create_queue(&owner, "idle-dlq", &Default::default())
        .await
        .unwrap();
    let arn = engine
        .get_queue_attributes(&owner, &dlq, &["QueueArn".to_string()])
        .await
        .unwrap()
        .remove("QueueArn")
        .unwrap();

    let mut attributes = std::collections::HashMap::new();
    attributes.insert(
        "RedrivePolicy".to_string(),
        format!(r#"{{"maxReceiveCount":"1","deadLetterTargetArn":"{}"}}"#, arn),
    );
    let source = engine.create_queue(&owner, "idle", &attributes).await.unwrap();

    engine
        .send_message(&owner, &source, SendMessageRequest::new("m"))
        .await
        .unwrap();
    let options = ReceiveOptions {
        visibility_timeout: Some(1),
        ..Default::default()
    };
    assert_eq!(
        engine.receive_message(&owner, &source, options).await.unwrap().len(),
        1
    );

    let signal = ShutdownSignal::new();
    let background = engine.start_background(&signal);

    // The DLQ receive does not settle the source; only the background task can.
    let messages = engine
        .receive_message(&owner, &dlq, wait_options(5))
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);

    signal.shutdown();
    tokio::time::timeout(Duration::from_secs(1), background)
        .await
        .expect("background task did not stop")
        .unwrap();
}
