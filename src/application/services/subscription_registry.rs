use crate::application::ports::ListenerRegistration;
use crate::domain::value_objects::CollectionKey;
use crate::shared::error::AppError;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// 有効な購読 1 件を表すハンドル。
///
/// 配送タスクは適用前に `is_live` を確認し、解除後に届いた更新は破棄する。
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    key: CollectionKey,
    generation: u64,
    live: Arc<AtomicBool>,
}

impl SubscriptionHandle {
    fn new(key: CollectionKey, generation: u64) -> Self {
        Self {
            key,
            generation,
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn key(&self) -> &CollectionKey {
        &self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    fn invalidate(&self) {
        self.live.store(false, Ordering::Release);
    }
}

struct RegistryEntry {
    handle: SubscriptionHandle,
    registration: Box<dyn ListenerRegistration>,
    observers: usize,
}

impl RegistryEntry {
    fn cancel(self) {
        self.handle.invalidate();
        self.registration.remove();
    }
}

/// キーごとに高々 1 つのリモート購読だけを保持するレジストリ
pub struct SubscriptionRegistry {
    entries: Mutex<HashMap<CollectionKey, RegistryEntry>>,
    next_generation: AtomicU64,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    /// `key` に有効な購読があればそれを返し、無ければ `start` で購読を開始する。
    ///
    /// ロックは `start` の完了まで保持されるため、同じキーへの同時呼び出しでも
    /// `start` は高々 1 回しか実行されない。`start` の中からレジストリを呼ばないこと。
    pub async fn ensure_subscribed<F, Fut>(
        &self,
        key: CollectionKey,
        start: F,
    ) -> Result<SubscriptionHandle, AppError>
    where
        F: FnOnce(SubscriptionHandle) -> Fut,
        Fut: Future<Output = Result<Box<dyn ListenerRegistration>, AppError>>,
    {
        let mut entries = self.entries.lock().await;

        if let Some(entry) = entries.get_mut(&key) {
            if entry.handle.is_live() {
                entry.observers += 1;
                debug!(
                    "Reusing subscription {} (observers: {})",
                    key, entry.observers
                );
                return Ok(entry.handle.clone());
            }
            if let Some(stale) = entries.remove(&key) {
                stale.cancel();
            }
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let handle = SubscriptionHandle::new(key.clone(), generation);

        match start(handle.clone()).await {
            Ok(registration) => {
                info!("Subscribed to {} (generation {})", key, generation);
                entries.insert(
                    key,
                    RegistryEntry {
                        handle: handle.clone(),
                        registration,
                        observers: 1,
                    },
                );
                Ok(handle)
            }
            Err(err) => {
                handle.invalidate();
                warn!("Failed to subscribe to {}: {}", key, err);
                Err(match err {
                    AppError::SubscriptionFailed(msg) => AppError::SubscriptionFailed(msg),
                    other => AppError::SubscriptionFailed(format!("{key}: {other}")),
                })
            }
        }
    }

    /// 購読を明示的に破棄する。未登録キーに対しては何もしない。
    pub async fn release(&self, key: &CollectionKey) -> bool {
        let removed = self.entries.lock().await.remove(key);
        match removed {
            Some(entry) => {
                info!("Released subscription {}", key);
                entry.cancel();
                true
            }
            None => false,
        }
    }

    /// 観測者を 1 つ減らし、誰も残らなければ購読を破棄する
    pub async fn unobserve(&self, key: &CollectionKey) -> bool {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get_mut(key) else {
            return false;
        };
        entry.observers = entry.observers.saturating_sub(1);
        if entry.observers > 0 {
            debug!("Subscription {} still has {} observers", key, entry.observers);
            return false;
        }
        if let Some(entry) = entries.remove(key) {
            info!("Last observer left, released subscription {}", key);
            entry.cancel();
        }
        true
    }

    pub async fn release_all(&self) -> usize {
        let drained: Vec<RegistryEntry> = {
            let mut entries = self.entries.lock().await;
            entries.drain().map(|(_, entry)| entry).collect()
        };
        let count = drained.len();
        for entry in drained {
            entry.cancel();
        }
        if count > 0 {
            info!("Released {} subscriptions", count);
        }
        count
    }

    pub async fn is_live(&self, key: &CollectionKey) -> bool {
        self.entries
            .lock()
            .await
            .get(key)
            .is_some_and(|entry| entry.handle.is_live())
    }

    pub async fn observer_count(&self, key: &CollectionKey) -> usize {
        self.entries
            .lock()
            .await
            .get(key)
            .map(|entry| entry.observers)
            .unwrap_or(0)
    }

    pub async fn active_keys(&self) -> Vec<CollectionKey> {
        let mut keys: Vec<CollectionKey> = self.entries.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}
