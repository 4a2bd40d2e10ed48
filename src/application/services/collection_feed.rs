use super::derived_view_store::DerivedViewStore;
use super::subscription_registry::{SubscriptionHandle, SubscriptionRegistry};
use crate::application::ports::{
    DocumentQuery, DocumentSnapshot, DocumentStore, ListenerRegistration, SnapshotReceiver,
};
use crate::domain::projection::Projectable;
use crate::domain::value_objects::CollectionKey;
use crate::shared::error::AppError;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;
use tracing::{debug, warn};

/// スナップショット列をドメインの項目列へ変換する関数
pub type Decoder<T> = fn(Vec<DocumentSnapshot>) -> Vec<T>;

/// リモートリスナーと配送タスクをまとめて解除する登録
struct FeedRegistration {
    listener: Box<dyn ListenerRegistration>,
    delivery: AbortHandle,
}

impl ListenerRegistration for FeedRegistration {
    fn remove(&self) {
        self.listener.remove();
        self.delivery.abort();
    }
}

/// レジストリ経由でライブコレクションを開き、届いた内容をビューストアへ流し込む
pub struct CollectionFeed<T: Projectable> {
    store: Arc<dyn DocumentStore>,
    registry: Arc<SubscriptionRegistry>,
    views: Arc<DerivedViewStore<T>>,
    decode: Decoder<T>,
}

impl<T: Projectable> CollectionFeed<T> {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        registry: Arc<SubscriptionRegistry>,
        views: Arc<DerivedViewStore<T>>,
        decode: Decoder<T>,
    ) -> Self {
        Self {
            store,
            registry,
            views,
            decode,
        }
    }

    pub fn views(&self) -> &Arc<DerivedViewStore<T>> {
        &self.views
    }

    /// `key` の購読を確保して絞り込み済みビューの受信側を返す。
    ///
    /// 購読に失敗した場合はビューを空にしたうえでエラーを返す。
    pub async fn open(
        &self,
        key: CollectionKey,
        query: DocumentQuery,
    ) -> Result<watch::Receiver<Vec<T>>, AppError> {
        let receiver = self.views.watch(&key);
        let store = Arc::clone(&self.store);
        let views = Arc::clone(&self.views);
        let decode = self.decode;

        let opened = self
            .registry
            .ensure_subscribed(key.clone(), |handle| async move {
                let (sink, deliveries) = mpsc::unbounded_channel();
                let listener = store.subscribe(&query, sink).await?;
                let task = tokio::spawn(deliver(handle, deliveries, views, decode));
                Ok(Box::new(FeedRegistration {
                    listener,
                    delivery: task.abort_handle(),
                }) as Box<dyn ListenerRegistration>)
            })
            .await;

        match opened {
            Ok(_) => Ok(receiver),
            Err(err) => {
                self.views.update_raw(&key, Vec::new());
                Err(err)
            }
        }
    }

    /// 観測者を 1 つ外す。最後の観測者ならリモート購読も閉じる。
    pub async fn close(&self, key: &CollectionKey) -> bool {
        self.registry.unobserve(key).await
    }
}

async fn deliver<T: Projectable>(
    handle: SubscriptionHandle,
    mut deliveries: SnapshotReceiver,
    views: Arc<DerivedViewStore<T>>,
    decode: Decoder<T>,
) {
    while let Some(delivery) = deliveries.recv().await {
        let items = match delivery {
            Ok(snapshots) => decode(snapshots),
            Err(err) => {
                warn!("Listener error on {}: {}", handle.key(), err);
                Vec::new()
            }
        };
        // 解放済みかどうかはビューのロック内で確かめる
        if !views.update_raw_if(handle.key(), items, || handle.is_live()) {
            debug!(
                "Dropping delivery for released subscription {} (generation {})",
                handle.key(),
                handle.generation()
            );
            break;
        }
    }
}
