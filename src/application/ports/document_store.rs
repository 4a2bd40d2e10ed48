use crate::shared::error::AppError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

/// リモートドキュメント 1 件分のスナップショット
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub id: String,
    pub data: Value,
}

impl DocumentSnapshot {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// コレクションに対する等値フィルタ付きクエリ
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentQuery {
    pub collection: String,
    pub equals: Vec<(String, Value)>,
    pub order_by: Option<(String, SortDirection)>,
}

impl DocumentQuery {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            equals: Vec::new(),
            order_by: None,
        }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.push((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn matches(&self, data: &Value) -> bool {
        self.equals
            .iter()
            .all(|(field, expected)| data.get(field) == Some(expected))
    }
}

/// リアルタイム購読の配送先。初回スナップショットと変更ごとのスナップショットが順に届く。
pub type SnapshotSender = mpsc::UnboundedSender<Result<Vec<DocumentSnapshot>, AppError>>;
pub type SnapshotReceiver = mpsc::UnboundedReceiver<Result<Vec<DocumentSnapshot>, AppError>>;

/// 購読解除のための capability
pub trait ListenerRegistration: Send + Sync {
    fn remove(&self);
}

/// トランザクション内で現在値から次の値を計算する関数。
/// 競合時には最新値で再度呼ばれるため副作用を持たせないこと。
pub type TransactionFn = Box<dyn Fn(Option<&Value>) -> Result<Value, AppError> + Send + Sync>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<DocumentSnapshot>, AppError>;

    async fn query(&self, query: &DocumentQuery) -> Result<Vec<DocumentSnapshot>, AppError>;

    /// クエリ結果の変化を `sink` に流し続ける。戻り値を `remove` するまで有効。
    async fn subscribe(
        &self,
        query: &DocumentQuery,
        sink: SnapshotSender,
    ) -> Result<Box<dyn ListenerRegistration>, AppError>;

    /// ドキュメントを作成または丸ごと上書きする
    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<(), AppError>;

    /// 既存ドキュメントの指定フィールドだけを更新する
    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), AppError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), AppError>;

    /// 読み取り・変更・書き込みを compare-and-swap で行い、書き込んだ値を返す
    async fn run_transaction(
        &self,
        collection: &str,
        id: &str,
        update: TransactionFn,
    ) -> Result<Value, AppError>;

    fn new_document_id(&self, collection: &str) -> String;
}
