use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::sync::RwLock;

/// Map of independently locked values.
pub(crate) struct Arena<K, V> {
    entries: RwLock<HashMap<K, Arc<Mutex<V>>>>,
}

impl<K, V> Arena<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Insert `value` unless `key` is taken; returns whether it was inserted.
    pub async fn insert(&self, key: K, value: V) -> bool {
        match self.entries.write().await.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(value)));
                true
            }
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let entry = self.entry(key).await?;
        let value = entry.lock().await;
        Some(value.clone())
    }

    /// Apply `update` under the entry's lock.
    pub async fn update<R>(&self, key: &K, update: impl FnOnce(&mut V) -> R) -> Option<R> {
        let entry = self.entry(key).await?;
        let mut value = entry.lock().await;
        Some(update(&mut value))
    }

    /// Drop `key`; returns whether it was present.
    pub async fn remove(&self, key: &K) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    async fn entry(&self, key: &K) -> Option<Arc<Mutex<V>>> {
        self.entries.read().await.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_is_first_writer_wins() {
        let arena = Arena::new();

        assert!(arena.insert("a", 1).await);
        assert!(!arena.insert("a", 2).await);
        assert_eq!(arena.get(&"a").await, Some(1));
    }

    #[tokio::test]
    async fn test_remove_frees_the_key() {
        let arena = Arena::new();
        arena.insert("a", 1).await;

        assert!(arena.remove(&"a").await);
        assert!(!arena.remove(&"a").await);
        assert_eq!(arena.get(&"a").await, None);
        assert!(arena.insert("a", 2).await);
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_serialized() {
        let arena = Arc::new(Arena::new());
        arena.insert("counter", 0u32).await;

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let arena = Arc::clone(&arena);
                tokio::spawn(async move { arena.update(&"counter", |n| *n += 1).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(arena.get(&"counter").await, Some(32));
        assert_eq!(arena.update(&"missing", |n| *n += 1).await, None);
    }
}
