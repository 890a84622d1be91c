//! Per-key serialization of concurrent handlers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// An async mutex map keyed by string.
///
/// Duplicate deliveries of the same event can race: two handlers may try to
/// reserve or cancel for the same order number at once. Acquiring the
/// order's lock before touching state serializes them without a global lock.
///
/// Entries are created on first use and kept for the lifetime of the map;
/// the key space is bounded by the number of in-flight business keys.
#[derive(Clone, Default)]
pub struct KeyedLock {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl KeyedLock {
    /// Creates an empty lock map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for `key`, waiting if another holder has it.
    ///
    /// The returned guard releases the lock on drop.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut locks = self.locks.lock().expect("keyed lock map poisoned");
            Arc::clone(
                locks
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        entry.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn same_key_serializes() {
        let locks = KeyedLock::new();
        let counter = Arc::new(AtomicU32::new(0));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let locks = locks.clone();
            let counter = Arc::clone(&counter);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("ORD-1").await;
                let seen = counter.fetch_add(1, Ordering::SeqCst);
                // While the guard is held no other task can be inside.
                tokio::task::yield_now().await;
                assert_eq!(counter.load(Ordering::SeqCst), seen + 1);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locks = KeyedLock::new();
        let _a = locks.acquire("ORD-1").await;
        // Must not deadlock.
        let _b = locks.acquire("ORD-2").await;
    }
}
