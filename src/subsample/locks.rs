use super::CacheKey;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

struct LockEntry {
    lock: Arc<AsyncMutex<()>>,
    // Callers holding or waiting for the lock
    users: usize,
}

type LockTable = HashMap<CacheKey, LockEntry>;

/// Per-key build locks. Two requests for the same picture serialize so the
/// second one finds a fresh artifact instead of rebuilding it. Entries live
/// only while someone holds or waits for them.
#[derive(Clone, Default)]
pub struct BuildLocks {
    table: Arc<Mutex<LockTable>>,
}

/// Held while a key is being built. Releases the lock, then the table entry.
pub struct BuildGuard {
    _guard: OwnedMutexGuard<()>,
    _registration: Registration,
}

/// One caller's interest in a key. Dropping it, whether after the build or
/// while still waiting, gives the entry back.
struct Registration {
    key: CacheKey,
    table: Arc<Mutex<LockTable>>,
}

impl BuildLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &CacheKey) -> BuildGuard {
        let (lock, registration) = {
            let mut table = lock_table(&self.table);
            let entry = table.entry(key.clone()).or_insert_with(|| LockEntry {
                lock: Arc::new(AsyncMutex::new(())),
                users: 0,
            });
            entry.users += 1;
            (
                entry.lock.clone(),
                Registration {
                    key: key.clone(),
                    table: self.table.clone(),
                },
            )
        };

        let guard = lock.lock_owned().await;
        BuildGuard {
            _guard: guard,
            _registration: registration,
        }
    }

    /// Number of keys currently held or awaited.
    pub fn in_flight(&self) -> usize {
        lock_table(&self.table).len()
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut table = lock_table(&self.table);
        if let Some(entry) = table.get_mut(&self.key) {
            entry.users = entry.users.saturating_sub(1);
            if entry.users == 0 {
                table.remove(&self.key);
            }
        }
    }
}

fn lock_table(table: &Mutex<LockTable>) -> MutexGuard<'_, LockTable> {
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::super::derive_key;
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_entries_are_released() {
        let locks = BuildLocks::new();
        let key = derive_key("a.jpg");

        let guard = locks.acquire(&key).await;
        assert_eq!(locks.in_flight(), 1);
        drop(guard);
        assert_eq!(locks.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        let locks = BuildLocks::new();
        let key = derive_key("shared.jpg");
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let locks = locks.clone();
            let key = key.clone();
            let active = active.clone();
            let max_active = max_active.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(&key).await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert_eq!(locks.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let locks = BuildLocks::new();
        let first = locks.acquire(&derive_key("one.jpg")).await;
        let second = tokio::time::timeout(
            Duration::from_secs(1),
            locks.acquire(&derive_key("two.jpg")),
        )
        .await;

        assert!(second.is_ok());
        assert_eq!(locks.in_flight(), 2);
        drop(first);
    }

    #[tokio::test]
    async fn test_abandoned_waiter_releases_entry() {
        let locks = BuildLocks::new();
        let key = derive_key("abandoned.jpg");

        let holder = locks.acquire(&key).await;
        let mut waiter = Box::pin(locks.acquire(&key));
        let polled = tokio::time::timeout(Duration::from_millis(20), &mut waiter).await;
        assert!(polled.is_err(), "waiter must still be blocked");

        drop(holder);
        assert_eq!(locks.in_flight(), 1);

        // The request went away before it got the lock
        drop(waiter);
        assert_eq!(locks.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_key_is_reusable_after_abandoned_waiter() {
        let locks = BuildLocks::new();
        let key = derive_key("again.jpg");

        let holder = locks.acquire(&key).await;
        let mut waiter = Box::pin(locks.acquire(&key));
        let _ = tokio::time::timeout(Duration::from_millis(20), &mut waiter).await;
        drop(waiter);
        assert_eq!(locks.in_flight(), 1);
        drop(holder);
        assert_eq!(locks.in_flight(), 0);

        let again = tokio::time::timeout(Duration::from_secs(1), locks.acquire(&key)).await;
        assert!(again.is_ok());
    }
}
