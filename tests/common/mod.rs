#![allow(dead_code)]

use askit_core::domain::entities::AuthUser;
use askit_core::infrastructure::{MemoryAuthGateway, MemoryDocumentStore};
use askit_core::{AppConfig, AppState};
use serde_json::json;
use std::sync::Once;
use std::time::Duration;
use tokio::sync::watch;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("askit_core=debug")
            .with_test_writer()
            .compact()
            .try_init();
    });
}

pub struct TestApp {
    pub state: AppState,
    pub store: MemoryDocumentStore,
    pub auth: MemoryAuthGateway,
}

pub fn app() -> TestApp {
    app_with(AppConfig::default())
}

pub fn app_with(config: AppConfig) -> TestApp {
    init_tracing();
    let (state, store, auth) = AppState::in_memory(config).expect("in-memory state");
    TestApp { state, store, auth }
}

impl TestApp {
    pub async fn register(&self, name: &str, email: &str) -> AuthUser {
        self.state
            .auth_service
            .register(name, email, "password123")
            .await
            .expect("register")
    }

    /// 他クライアントが書き込んだ質問を再現する
    pub fn seed_question(&self, id: &str, uid: &str, title: &str, category: &str, timestamp: i64) {
        self.store.insert(
            "questions",
            id,
            json!({
                "id": id,
                "uid": uid,
                "title": title,
                "description": format!("About {title}"),
                "category": category,
                "timestamp": timestamp,
                "authorName": "Seeder",
                "likes": 0,
                "answersCount": 0
            }),
        );
    }

    pub fn seed_answer(&self, id: &str, question_id: &str, uid: &str, timestamp: i64) {
        self.store.insert(
            "answers",
            id,
            json!({
                "id": id,
                "questionId": question_id,
                "uid": uid,
                "text": format!("Answer {id}"),
                "timestamp": timestamp,
                "upvotes": []
            }),
        );
    }
}

/// `predicate` を満たす値が流れてくるまで待つ
pub async fn wait_for<T, F>(rx: &mut watch::Receiver<T>, predicate: F) -> T
where
    T: Clone,
    F: Fn(&T) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            {
                let current = rx.borrow_and_update();
                if predicate(&current) {
                    return current.clone();
                }
            }
            rx.changed().await.expect("view sender dropped");
        }
    })
    .await
    .expect("timed out waiting for view")
}
