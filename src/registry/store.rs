//! Subscription registry implementation
//!
//! Maps client-chosen subscription ids to the handles that stop them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use super::config::RegistryConfig;
use super::entry::{CloseHandle, Registration, RegistryEntry};
use super::error::RegistryError;

/// Registry of live subscriptions for one connection
///
/// Thread-safe via `RwLock`. Every mutation (insert, remove) takes the write
/// lock for the duration of a single map operation, which makes
/// check-and-insert and remove-and-return atomic.
pub struct SubscriptionRegistry {
    /// Map of subscription id to entry
    entries: RwLock<HashMap<String, RegistryEntry>>,

    /// Next generation to hand out
    next_generation: AtomicU64,

    /// Configuration
    config: RegistryConfig,
}

impl SubscriptionRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a handle under `id`
    ///
    /// Fails if `id` is already live or the subscription limit is reached;
    /// the map is left untouched in both cases.
    pub async fn insert(&self, id: &str, handle: CloseHandle) -> Result<Registration, RegistryError> {
        let mut entries = self.entries.write().await;

        if entries.contains_key(id) {
            return Err(RegistryError::IdInUse(id.to_string()));
        }
        if self.config.is_limited() && entries.len() >= self.config.max_subscriptions {
            return Err(RegistryError::LimitReached {
                limit: self.config.max_subscriptions,
            });
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        entries.insert(id.to_string(), RegistryEntry::new(generation, handle));

        tracing::trace!(id = %id, generation = generation, live = entries.len(), "Subscription registered");

        Ok(Registration { generation })
    }

    /// Check whether `id` could be inserted right now
    ///
    /// Lets callers refuse early, before doing expensive work; `insert`
    /// repeats the check atomically.
    pub async fn check_available(&self, id: &str) -> Result<(), RegistryError> {
        let entries = self.entries.read().await;

        if entries.contains_key(id) {
            return Err(RegistryError::IdInUse(id.to_string()));
        }
        if self.config.is_limited() && entries.len() >= self.config.max_subscriptions {
            return Err(RegistryError::LimitReached {
                limit: self.config.max_subscriptions,
            });
        }
        Ok(())
    }

    /// Remove and return the handle registered under `id`
    ///
    /// Returns `None` if no subscription is live under `id`.
    pub async fn remove(&self, id: &str) -> Option<CloseHandle> {
        let mut entries = self.entries.write().await;
        entries.remove(id).map(|entry| entry.handle)
    }

    /// Remove the entry under `id` only if it is still `generation`
    ///
    /// Used by a stream bridge to release its own slot. If the slot was
    /// already released, or now belongs to a newer subscription that reused
    /// the id, nothing is removed and `None` is returned.
    pub async fn remove_if_current(&self, id: &str, generation: u64) -> Option<CloseHandle> {
        let mut entries = self.entries.write().await;

        match entries.get(id) {
            Some(entry) if entry.generation == generation => {
                entries.remove(id).map(|entry| entry.handle)
            }
            _ => None,
        }
    }

    /// Remove and return every live handle
    pub async fn drain(&self) -> Vec<(String, CloseHandle)> {
        let mut entries = self.entries.write().await;
        entries
            .drain()
            .map(|(id, entry)| (id, entry.handle))
            .collect()
    }

    /// Check if a subscription is live under `id`
    pub async fn contains(&self, id: &str) -> bool {
        self.entries.read().await.contains_key(id)
    }

    /// Generation of the subscription live under `id`
    pub async fn generation(&self, id: &str) -> Option<u64> {
        self.entries.read().await.get(id).map(|e| e.generation)
    }

    /// Number of live subscriptions
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether no subscription is live
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Ids of all live subscriptions
    pub async fn ids(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_insert_and_remove() {
        let registry = SubscriptionRegistry::new();
        let handle = CloseHandle::new();

        registry.insert("1", handle.clone()).await.unwrap();
        assert!(registry.contains("1").await);
        assert_eq!(registry.len().await, 1);

        let removed = registry.remove("1").await.unwrap();
        assert!(!removed.is_closed());
        assert!(registry.is_empty().await);

        // Second remove finds nothing
        assert!(registry.remove("1").await.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let registry = SubscriptionRegistry::new();

        let first = registry.insert("1", CloseHandle::new()).await.unwrap();
        let result = registry.insert("1", CloseHandle::new()).await;

        assert_eq!(result, Err(RegistryError::IdInUse("1".into())));
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.generation("1").await, Some(first.generation));
    }

    #[tokio::test]
    async fn test_reuse_after_remove_gets_new_generation() {
        let registry = SubscriptionRegistry::new();

        let first = registry.insert("1", CloseHandle::new()).await.unwrap();
        registry.remove("1").await.unwrap();
        let second = registry.insert("1", CloseHandle::new()).await.unwrap();

        assert_ne!(first.generation, second.generation);
    }

    #[tokio::test]
    async fn test_remove_if_current_ignores_stale_generation() {
        let registry = SubscriptionRegistry::new();

        let old = registry.insert("1", CloseHandle::new()).await.unwrap();
        registry.remove("1").await.unwrap();
        let new = registry.insert("1", CloseHandle::new()).await.unwrap();

        // Stale bridge must not evict the newer subscription
        assert!(registry.remove_if_current("1", old.generation).await.is_none());
        assert!(registry.contains("1").await);

        assert!(registry.remove_if_current("1", new.generation).await.is_some());
        assert!(!registry.contains("1").await);
        assert!(registry.remove_if_current("1", new.generation).await.is_none());
    }

    #[tokio::test]
    async fn test_subscription_limit() {
        let registry = SubscriptionRegistry::with_config(RegistryConfig::default().max_subscriptions(2));

        registry.insert("a", CloseHandle::new()).await.unwrap();
        assert_eq!(registry.check_available("b").await, Ok(()));
        assert_eq!(
            registry.check_available("a").await,
            Err(RegistryError::IdInUse("a".into()))
        );
        registry.insert("b", CloseHandle::new()).await.unwrap();

        assert_eq!(
            registry.check_available("c").await,
            Err(RegistryError::LimitReached { limit: 2 })
        );
        let result = registry.insert("c", CloseHandle::new()).await;
        assert_eq!(result, Err(RegistryError::LimitReached { limit: 2 }));

        // Freed slot can be used again
        registry.remove("a").await.unwrap();
        registry.insert("c", CloseHandle::new()).await.unwrap();
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_drain() {
        let registry = SubscriptionRegistry::new();
        registry.insert("a", CloseHandle::new()).await.unwrap();
        registry.insert("b", CloseHandle::new()).await.unwrap();

        let mut drained: Vec<String> = registry.drain().await.into_iter().map(|(id, _)| id).collect();
        drained.sort();

        assert_eq!(drained, vec!["a".to_string(), "b".to_string()]);
        assert!(registry.is_empty().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_remove_has_single_winner() {
        for _ in 0..100 {
            let registry = Arc::new(SubscriptionRegistry::new());
            let generation = registry.insert("x", CloseHandle::new()).await.unwrap().generation;

            let by_id = {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.remove("x").await.is_some() })
            };
            let by_generation = {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.remove_if_current("x", generation).await.is_some() })
            };

            let wins = [by_id.await.unwrap(), by_generation.await.unwrap()];
            assert_eq!(wins.iter().filter(|w| **w).count(), 1);
            assert!(registry.is_empty().await);
        }
    }
}
