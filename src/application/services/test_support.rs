//! サービス単体テスト用のポートのモック

use crate::application::ports::{
    AuthGateway, DocumentQuery, DocumentSnapshot, DocumentStore, ListenerRegistration,
    SnapshotSender, TransactionFn,
};
use crate::domain::entities::AuthUser;
use crate::shared::error::AppError;
use async_trait::async_trait;
use mockall::mock;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

mock! {
    pub Auth {}

    #[async_trait]
    impl AuthGateway for Auth {
        async fn current_user(&self) -> Option<AuthUser>;
        async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AppError>;
        async fn sign_up(
            &self,
            email: &str,
            password: &str,
            display_name: &str,
        ) -> Result<AuthUser, AppError>;
        async fn sign_out(&self) -> Result<(), AppError>;
        async fn update_display_name(&self, display_name: &str) -> Result<AuthUser, AppError>;
        async fn update_password(&self, new_password: &str) -> Result<(), AppError>;
        async fn update_email(&self, new_email: &str) -> Result<AuthUser, AppError>;
    }
}

mock! {
    pub Store {}

    #[async_trait]
    impl DocumentStore for Store {
        async fn get(&self, collection: &str, id: &str) -> Result<Option<DocumentSnapshot>, AppError>;
        async fn query(&self, query: &DocumentQuery) -> Result<Vec<DocumentSnapshot>, AppError>;
        async fn subscribe(
            &self,
            query: &DocumentQuery,
            sink: SnapshotSender,
        ) -> Result<Box<dyn ListenerRegistration>, AppError>;
        async fn set(&self, collection: &str, id: &str, data: Value) -> Result<(), AppError>;
        async fn update_fields(
            &self,
            collection: &str,
            id: &str,
            fields: Map<String, Value>,
        ) -> Result<(), AppError>;
        async fn delete(&self, collection: &str, id: &str) -> Result<(), AppError>;
        async fn run_transaction(
            &self,
            collection: &str,
            id: &str,
            update: TransactionFn,
        ) -> Result<Value, AppError>;
        fn new_document_id(&self, collection: &str) -> String;
    }
}

/// `remove` の呼び出し回数を数えるだけのリスナー登録
#[derive(Clone, Default)]
pub struct CountingRegistration {
    pub removed: Arc<AtomicUsize>,
}

impl CountingRegistration {
    pub fn removed(&self) -> usize {
        self.removed.load(Ordering::SeqCst)
    }
}

impl ListenerRegistration for CountingRegistration {
    fn remove(&self) {
        self.removed.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn user(uid: &str) -> AuthUser {
    AuthUser {
        uid: uid.into(),
        email: format!("{uid}@example.com"),
        display_name: None,
    }
}

pub fn signed_in(uid: &'static str) -> MockAuth {
    let mut auth = MockAuth::new();
    auth.expect_current_user().returning(move || Some(user(uid)));
    auth
}

pub fn signed_out() -> MockAuth {
    let mut auth = MockAuth::new();
    auth.expect_current_user().returning(|| None);
    auth
}
