//! Push synchronization to a downstream consumer.
//!
//! Persons and org units are pushed to a downstream directory as
//! upserts and deletes. Every send is guarded by the [`DedupCache`]:
//! a payload identical to the last one sent for the same resource is
//! skipped.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::fmt;
use tracing::{debug, info};

use crate::dedup::DedupCache;
use crate::error::SyncResult;

/// Resource kinds the downstream consumer accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A person/user record.
    Person,
    /// An organizational unit record.
    OrgUnit,
}

impl ResourceKind {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Person => "person",
            ResourceKind::OrgUnit => "org_unit",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The downstream system receiving pushed resources. Transport,
/// authentication and retries live behind this trait.
#[async_trait]
pub trait DownstreamConsumer: Send + Sync {
    /// Create or replace a resource.
    async fn upsert(&self, kind: ResourceKind, resource_id: &str, payload: &Value)
        -> SyncResult<()>;

    /// Remove a resource.
    async fn delete(&self, kind: ResourceKind, resource_id: &str) -> SyncResult<()>;
}

/// Push-style synchronization with dedup suppression.
pub struct PushSync<C> {
    consumer: C,
    cache: DedupCache,
}

impl<C: DownstreamConsumer> PushSync<C> {
    /// Wrap a consumer with a fresh content-hash cache.
    pub fn new(consumer: C) -> Self {
        Self {
            consumer,
            cache: DedupCache::new(),
        }
    }

    /// Wrap a consumer with an externally built cache (e.g. one in
    /// stub token mode).
    pub fn with_cache(consumer: C, cache: DedupCache) -> Self {
        Self { consumer, cache }
    }

    /// Upsert a resource; returns `false` when the send was
    /// suppressed because the payload is unchanged.
    pub async fn upsert(
        &mut self,
        kind: ResourceKind,
        resource_id: &str,
        payload: &Value,
    ) -> SyncResult<bool> {
        let key = cache_key(kind, resource_id);
        if self.cache.already_sent(&key, payload, "upsert") {
            debug!(kind = %kind, resource = resource_id, "Upsert suppressed, payload unchanged");
            return Ok(false);
        }
        info!(kind = %kind, resource = resource_id, "Upserting resource downstream");
        self.consumer.upsert(kind, resource_id, payload).await?;
        Ok(true)
    }

    /// Delete a resource; returns `false` when a delete for it was
    /// already sent.
    pub async fn delete(&mut self, kind: ResourceKind, resource_id: &str) -> SyncResult<bool> {
        let key = cache_key(kind, resource_id);
        if self.cache.already_sent(&key, &json!({}), "delete") {
            debug!(kind = %kind, resource = resource_id, "Delete suppressed, already sent");
            return Ok(false);
        }
        info!(kind = %kind, resource = resource_id, "Deleting resource downstream");
        self.consumer.delete(kind, resource_id).await?;
        Ok(true)
    }

    /// Access the cache, e.g. to `reset()` between test cases.
    pub fn cache_mut(&mut self) -> &mut DedupCache {
        &mut self.cache
    }
}

fn cache_key(kind: ResourceKind, resource_id: &str) -> String {
    format!("{kind}/{resource_id}")
}
