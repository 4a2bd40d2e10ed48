use crate::application::ports::{
    DocumentQuery, DocumentSnapshot, DocumentStore, ListenerRegistration, SnapshotSender,
    SortDirection, TransactionFn,
};
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, trace, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredDocument {
    data: Value,
    version: u64,
}

/// コレクション内のドキュメントと、そのコレクションで単調増加するバージョンカウンタ。
/// 削除後に同じ ID で作り直しても以前のバージョンは再利用されない。
#[derive(Debug, Default)]
struct CollectionData {
    documents: HashMap<String, StoredDocument>,
    clock: u64,
}

impl CollectionData {
    fn next_version(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn put(&mut self, id: &str, data: Value) -> u64 {
        let version = self.next_version();
        self.documents
            .insert(id.to_string(), StoredDocument { data, version });
        version
    }
}

type Collections = HashMap<String, CollectionData>;

struct Listener {
    query: DocumentQuery,
    sink: SnapshotSender,
}

struct Inner {
    collections: Mutex<Collections>,
    listeners: Mutex<HashMap<u64, Listener>>,
    next_listener_id: AtomicU64,
    available: AtomicBool,
    max_attempts: u32,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Inner {
    fn ensure_available(&self) -> Result<(), AppError> {
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(AppError::Storage("Backend unavailable".to_string()))
        }
    }

    /// コレクションの変更をそのコレクションを購読しているリスナーへ配送する。
    /// ドキュメントのロックを保持したまま呼ぶことで配送順を書き込み順に揃える。
    fn notify(&self, collections: &Collections, collection: &str) {
        let mut listeners = lock(&self.listeners);
        listeners.retain(|id, listener| {
            if listener.query.collection != collection {
                return true;
            }
            let snapshots = run_query(collections, &listener.query);
            let delivered = listener.sink.send(Ok(snapshots)).is_ok();
            if !delivered {
                debug!("Dropping listener {} with closed receiver", id);
            }
            delivered
        });
    }

    fn write(&self, collection: &str, id: &str, data: Value) -> u64 {
        let mut collections = lock(&self.collections);
        let version = collections
            .entry(collection.to_string())
            .or_default()
            .put(id, data);
        trace!("Wrote {}/{} (version {})", collection, id, version);
        self.notify(&collections, collection);
        version
    }

    fn remove(&self, collection: &str, id: &str) -> bool {
        let mut collections = lock(&self.collections);
        let removed = collections
            .get_mut(collection)
            .and_then(|data| data.documents.remove(id))
            .is_some();
        if removed {
            self.notify(&collections, collection);
        }
        removed
    }
}

fn run_query(collections: &Collections, query: &DocumentQuery) -> Vec<DocumentSnapshot> {
    let Some(data) = collections.get(&query.collection) else {
        return Vec::new();
    };
    let mut matched: Vec<DocumentSnapshot> = data
        .documents
        .iter()
        .filter(|(_, doc)| query.matches(&doc.data))
        .map(|(id, doc)| DocumentSnapshot::new(id.clone(), doc.data.clone()))
        .collect();

    matched.sort_by(|a, b| a.id.cmp(&b.id));
    if let Some((field, direction)) = &query.order_by {
        matched.sort_by(|a, b| {
            let ordering = compare_values(a.field(field), b.field(field));
            match direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
    }
    matched
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(CmpOrdering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(_), None) => CmpOrdering::Greater,
        (None, Some(_)) => CmpOrdering::Less,
        _ => CmpOrdering::Equal,
    }
}

struct MemoryListenerRegistration {
    inner: Weak<Inner>,
    id: u64,
}

impl ListenerRegistration for MemoryListenerRegistration {
    fn remove(&self) {
        if let Some(inner) = self.inner.upgrade()
            && lock(&inner.listeners).remove(&self.id).is_some()
        {
            debug!("Removed listener {}", self.id);
        }
    }
}

/// プロセス内で完結するドキュメントストア。
///
/// ドキュメントごとにバージョンを持ち、トランザクションはバージョン比較で競合を検出して
/// 最大 `max_attempts` 回まで再試行する。購読は初回スナップショットの後、変更のたびに
/// クエリ結果全体を配送する。
#[derive(Clone)]
pub struct MemoryDocumentStore {
    inner: Arc<Inner>,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new(5)
    }
}

impl MemoryDocumentStore {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            inner: Arc::new(Inner {
                collections: Mutex::new(HashMap::new()),
                listeners: Mutex::new(HashMap::new()),
                next_listener_id: AtomicU64::new(1),
                available: AtomicBool::new(true),
                max_attempts: max_attempts.max(1),
            }),
        }
    }

    /// 同期的にドキュメントを書き込む（初期データ投入や他クライアントの書き込みの再現用）
    pub fn insert(&self, collection: &str, id: &str, data: Value) {
        self.inner.write(collection, id, data);
    }

    /// 同期的にドキュメントを削除する（他クライアントの削除の再現用）
    pub fn remove(&self, collection: &str, id: &str) -> bool {
        self.inner.remove(collection, id)
    }

    fn stored(&self, collection: &str, id: &str) -> Option<StoredDocument> {
        lock(&self.inner.collections)
            .get(collection)
            .and_then(|data| data.documents.get(id))
            .cloned()
    }

    pub fn document(&self, collection: &str, id: &str) -> Option<Value> {
        self.stored(collection, id).map(|doc| doc.data)
    }

    pub fn version(&self, collection: &str, id: &str) -> Option<u64> {
        self.stored(collection, id).map(|doc| doc.version)
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }

    /// `false` にすると以降のリモート操作はすべて `Storage` エラーになる
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::Release);
    }

    /// `collection` の購読者全員にリスナーエラーを届ける
    pub fn fail_listeners(&self, collection: &str, error: AppError) {
        for listener in lock(&self.inner.listeners).values() {
            if listener.query.collection == collection {
                let _ = listener.sink.send(Err(error.clone()));
            }
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<DocumentSnapshot>, AppError> {
        self.inner.ensure_available()?;
        Ok(self
            .document(collection, id)
            .map(|data| DocumentSnapshot::new(id, data)))
    }

    async fn query(&self, query: &DocumentQuery) -> Result<Vec<DocumentSnapshot>, AppError> {
        self.inner.ensure_available()?;
        Ok(run_query(&lock(&self.inner.collections), query))
    }

    async fn subscribe(
        &self,
        query: &DocumentQuery,
        sink: SnapshotSender,
    ) -> Result<Box<dyn ListenerRegistration>, AppError> {
        self.inner.ensure_available()?;
        let collections = lock(&self.inner.collections);
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);

        sink.send(Ok(run_query(&collections, query)))
            .map_err(|_| AppError::SubscriptionFailed("Snapshot receiver closed".to_string()))?;
        lock(&self.inner.listeners).insert(
            id,
            Listener {
                query: query.clone(),
                sink,
            },
        );
        debug!("Registered listener {} on {}", id, query.collection);

        Ok(Box::new(MemoryListenerRegistration {
            inner: Arc::downgrade(&self.inner),
            id,
        }))
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<(), AppError> {
        self.inner.ensure_available()?;
        self.inner.write(collection, id, data);
        Ok(())
    }

    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), AppError> {
        self.inner.ensure_available()?;
        let mut collections = lock(&self.inner.collections);
        let data = collections
            .get_mut(collection)
            .filter(|data| data.documents.contains_key(id))
            .ok_or_else(|| AppError::NotFound(format!("{collection}/{id}")))?;
        let version = data.next_version();
        if let Some(document) = data.documents.get_mut(id) {
            match &mut document.data {
                Value::Object(existing) => existing.extend(fields),
                other => *other = Value::Object(fields),
            }
            document.version = version;
        }
        self.inner.notify(&collections, collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), AppError> {
        self.inner.ensure_available()?;
        self.inner.remove(collection, id);
        Ok(())
    }

    async fn run_transaction(
        &self,
        collection: &str,
        id: &str,
        update: TransactionFn,
    ) -> Result<Value, AppError> {
        for attempt in 1..=self.inner.max_attempts {
            self.inner.ensure_available()?;
            let (current, read_version) = match self.stored(collection, id) {
                Some(doc) => (Some(doc.data), Some(doc.version)),
                None => (None, None),
            };

            // 更新関数はロックの外で評価する
            let next = update(current.as_ref())?;

            let mut collections = lock(&self.inner.collections);
            let data = collections.entry(collection.to_string()).or_default();
            let latest_version = data.documents.get(id).map(|doc| doc.version);
            if latest_version != read_version {
                debug!(
                    "Transaction on {}/{} conflicted (attempt {}/{})",
                    collection, id, attempt, self.inner.max_attempts
                );
                continue;
            }

            let version = data.put(id, next.clone());
            trace!("Committed {}/{} (version {})", collection, id, version);
            self.inner.notify(&collections, collection);
            return Ok(next);
        }

        warn!(
            "Transaction on {}/{} gave up after {} attempts",
            collection, id, self.inner.max_attempts
        );
        Err(AppError::Conflict(format!(
            "Transaction on {collection}/{id} failed after {} attempts",
            self.inner.max_attempts
        )))
    }

    fn new_document_id(&self, _collection: &str) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn subscribe_sends_initial_snapshot_then_changes() {
        let store = MemoryDocumentStore::default();
        store.insert("answers", "a1", json!({"questionId": "q1", "timestamp": 1}));
        store.insert("answers", "a2", json!({"questionId": "q2", "timestamp": 2}));
        let (sink, mut rx) = mpsc::unbounded_channel();
        let query = DocumentQuery::collection("answers").where_eq("questionId", "q1");

        let registration = store.subscribe(&query, sink).await.unwrap();
        let initial = rx.recv().await.unwrap().unwrap();
        assert_eq!(initial.len(), 1);

        store
            .set("answers", "a3", json!({"questionId": "q1", "timestamp": 3}))
            .await
            .unwrap();
        let next = rx.recv().await.unwrap().unwrap();
        assert_eq!(next.len(), 2);

        registration.remove();
        assert_eq!(store.listener_count(), 0);
        store.insert("answers", "a4", json!({"questionId": "q1"}));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn query_orders_by_field() {
        let store = MemoryDocumentStore::default();
        store.insert("questions", "a", json!({"timestamp": 100}));
        store.insert("questions", "b", json!({"timestamp": 300}));
        store.insert("questions", "c", json!({"timestamp": 200}));

        let ids: Vec<String> = store
            .query(&DocumentQuery::collection("questions").order_by("timestamp", SortDirection::Descending))
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn update_fields_merges_and_requires_document() {
        let store = MemoryDocumentStore::default();
        store.insert("users", "u1", json!({"name": "Alice", "email": "a@x"}));
        let mut fields = Map::new();
        fields.insert("name".into(), json!("Alicia"));

        store.update_fields("users", "u1", fields.clone()).await.unwrap();
        assert_eq!(
            store.document("users", "u1").unwrap(),
            json!({"name": "Alicia", "email": "a@x"})
        );
        assert_eq!(store.version("users", "u1"), Some(2));

        let err = store.update_fields("users", "nobody", fields).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn transaction_retries_after_concurrent_write() {
        let store = MemoryDocumentStore::new(5);
        store.insert("answers", "a1", json!({"upvotes": []}));
        let calls = Arc::new(AtomicUsize::new(0));

        let writer = store.clone();
        let counter = Arc::clone(&calls);
        let written = store
            .run_transaction(
                "answers",
                "a1",
                Box::new(move |current: Option<&Value>| {
                    // 1 回目の評価中に別クライアントが投票する
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        writer.insert("answers", "a1", json!({"upvotes": ["u3"]}));
                    }
                    let mut next = current.cloned().unwrap_or_default();
                    if let Some(voters) = next["upvotes"].as_array_mut() {
                        voters.push(json!("u2"));
                    }
                    Ok(next)
                }),
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(written, json!({"upvotes": ["u3", "u2"]}));
        assert_eq!(store.document("answers", "a1").unwrap(), written);
    }

    #[tokio::test]
    async fn recreated_document_gets_fresh_version() {
        let store = MemoryDocumentStore::new(5);
        store.insert("answers", "a1", json!({"upvotes": []}));
        assert_eq!(store.version("answers", "a1"), Some(1));
        let calls = Arc::new(AtomicUsize::new(0));

        let writer = store.clone();
        let counter = Arc::clone(&calls);
        let written = store
            .run_transaction(
                "answers",
                "a1",
                Box::new(move |current: Option<&Value>| {
                    // 読み取り後に同じ内容で削除・再作成される
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        assert!(writer.remove("answers", "a1"));
                        writer.insert("answers", "a1", json!({"upvotes": []}));
                    }
                    let mut next = current.cloned().unwrap_or_default();
                    next["upvotes"] = json!(["u2"]);
                    Ok(next)
                }),
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(written, json!({"upvotes": ["u2"]}));
        assert_eq!(store.version("answers", "a1"), Some(3));
    }

    #[tokio::test]
    async fn versions_never_repeat_within_a_collection() {
        let store = MemoryDocumentStore::default();
        store.insert("questions", "q1", json!({"title": "a"}));
        store.insert("questions", "q2", json!({"title": "b"}));
        store.delete("questions", "q1").await.unwrap();
        assert_eq!(store.version("questions", "q1"), None);

        store
            .set("questions", "q1", json!({"title": "a"}))
            .await
            .unwrap();
        assert_eq!(store.version("questions", "q1"), Some(3));
    }

    #[tokio::test]
    async fn transaction_gives_up_with_conflict() {
        let store = MemoryDocumentStore::new(3);
        store.insert("answers", "a1", json!({"n": 0}));
        let writer = store.clone();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let err = store
            .run_transaction(
                "answers",
                "a1",
                Box::new(move |_: Option<&Value>| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    writer.insert("answers", "a1", json!({"n": 1}));
                    Ok(json!({"n": 2}))
                }),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.document("answers", "a1").unwrap(), json!({"n": 1}));
    }

    #[tokio::test]
    async fn unavailable_backend_rejects_operations() {
        let store = MemoryDocumentStore::default();
        store.set_available(false);
        let (sink, _rx) = mpsc::unbounded_channel();

        assert!(matches!(
            store.get("questions", "q1").await,
            Err(AppError::Storage(_))
        ));
        assert!(store
            .subscribe(&DocumentQuery::collection("questions"), sink)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn listener_errors_are_delivered() {
        let store = MemoryDocumentStore::default();
        let (sink, mut rx) = mpsc::unbounded_channel();
        let _registration = store
            .subscribe(&DocumentQuery::collection("questions"), sink)
            .await
            .unwrap();
        rx.recv().await.unwrap().unwrap();

        store.fail_listeners("questions", AppError::Storage("permission denied".into()));
        assert!(rx.recv().await.unwrap().is_err());
    }
}
