//! Access control for queue-addressed operations.
//!
//! Accounts are owned by an external directory; the engine only asks whether
//! an account exists and how many queues it may own. A caller may only touch
//! queues its own account owns.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::types::validation::validate_sqs_queue_name;
use crate::types::{AccountId, QueueKey};
use crate::{Error, Result};

/// Source of truth for account existence and per-account limits.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Whether the account exists.
    async fn account_exists(&self, account: &AccountId) -> bool;

    /// Maximum number of queues the account may own. `None` defers to the
    /// engine configuration.
    async fn queue_quota(&self, _account: &AccountId) -> Option<usize> {
        None
    }
}

/// In-memory account directory.
#[derive(Debug, Default)]
pub struct StaticAccountDirectory {
    accounts: RwLock<HashMap<AccountId, Option<usize>>>,
}

impl StaticAccountDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory holding `accounts` without quotas.
    pub fn with_accounts<I>(accounts: I) -> Self
    where
        I: IntoIterator<Item = AccountId>,
    {
        Self {
            accounts: RwLock::new(accounts.into_iter().map(|a| (a, None)).collect()),
        }
    }

    /// Add or update an account.
    pub async fn register(&self, account: AccountId, queue_quota: Option<usize>) {
        self.accounts.write().await.insert(account, queue_quota);
    }

    /// Remove an account.
    pub async fn remove(&self, account: &AccountId) -> bool {
        self.accounts.write().await.remove(account).is_some()
    }
}

#[async_trait]
impl AccountDirectory for StaticAccountDirectory {
    async fn account_exists(&self, account: &AccountId) -> bool {
        self.accounts.read().await.contains_key(account)
    }

    async fn queue_quota(&self, account: &AccountId) -> Option<usize> {
        self.accounts.read().await.get(account).copied().flatten()
    }
}

/// Parse `<anything>/<accountId>/<queueName>` into a queue key.
pub fn parse_queue_url(url: &str) -> Result<QueueKey> {
    let invalid = || Error::InvalidQueueUrl(url.to_string());

    let path = url.split(['?', '#']).next().unwrap_or_default();
    let mut segments = path.trim_end_matches('/').rsplit('/');
    let name = segments.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
    let account = segments.next().ok_or_else(invalid)?;

    let account_id = AccountId::new(account).map_err(|_| invalid())?;
    validate_sqs_queue_name(name).map_err(|_| invalid())?;

    Ok(QueueKey::new(account_id, name))
}

/// Gate applied before every queue-addressed operation.
#[derive(Clone)]
pub struct AccessGate {
    accounts: Arc<dyn AccountDirectory>,
}

impl AccessGate {
    /// Create a gate backed by `accounts`.
    pub fn new(accounts: Arc<dyn AccountDirectory>) -> Self {
        Self { accounts }
    }

    /// The account directory behind this gate.
    pub fn accounts(&self) -> &Arc<dyn AccountDirectory> {
        &self.accounts
    }

    /// Fail with `AccountNotFound` unless `account` exists.
    pub async fn ensure_account(&self, account: &AccountId) -> Result<()> {
        if self.accounts.account_exists(account).await {
            Ok(())
        } else {
            Err(Error::AccountNotFound(account.to_string()))
        }
    }

    /// Resolve `url` to a queue key the caller may access.
    ///
    /// Checks run in order: URL shape, owner account existence, then
    /// caller/owner equality. Queue existence is left to the registry.
    pub async fn authorize(&self, caller: &AccountId, url: &str) -> Result<QueueKey> {
        let key = parse_queue_url(url)?;
        self.ensure_account(&key.account_id).await?;

        if caller != &key.account_id {
            debug!(caller = %caller, queue = %key, "Access denied");
            return Err(Error::AccessDenied {
                caller: caller.to_string(),
                resource: url.to_string(),
            });
        }

        Ok(key)
    }
}
