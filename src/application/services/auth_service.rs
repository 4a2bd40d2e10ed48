use super::derived_view_store::DerivedViewStore;
use super::subscription_registry::SubscriptionRegistry;
use crate::application::ports::{AuthGateway, DocumentStore};
use crate::application::shared::mappers::users::{normalize_email, profile_to_document};
use crate::domain::entities::{Answer, AuthUser, Question, UserProfile};
use crate::shared::error::AppError;
use std::sync::Arc;
use tracing::info;

pub struct AuthService {
    auth: Arc<dyn AuthGateway>,
    store: Arc<dyn DocumentStore>,
    registry: Arc<SubscriptionRegistry>,
    question_views: Arc<DerivedViewStore<Question>>,
    answer_views: Arc<DerivedViewStore<Answer>>,
    users_collection: String,
}

impl AuthService {
    pub fn new(
        auth: Arc<dyn AuthGateway>,
        store: Arc<dyn DocumentStore>,
        registry: Arc<SubscriptionRegistry>,
        question_views: Arc<DerivedViewStore<Question>>,
        answer_views: Arc<DerivedViewStore<Answer>>,
        users_collection: impl Into<String>,
    ) -> Self {
        Self {
            auth,
            store,
            registry,
            question_views,
            answer_views,
            users_collection: users_collection.into(),
        }
    }

    /// アカウントを作成し、`users/{uid}` にプロフィールを書き込む
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthUser, AppError> {
        let name = name.trim();
        let email = normalize_email(email);
        if name.is_empty() {
            return Err(AppError::ValidationError("Name is required".to_string()));
        }
        if email.is_empty() || password.is_empty() {
            return Err(AppError::ValidationError(
                "Email and password are required".to_string(),
            ));
        }

        let user = self.auth.sign_up(&email, password, name).await?;
        let profile = UserProfile::new(user.uid.clone(), name.to_string(), email);
        self.store
            .set(
                &self.users_collection,
                &user.uid,
                profile_to_document(&profile)?,
            )
            .await?;

        info!("Registered user {}", user.uid);
        Ok(user)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AppError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AppError::ValidationError(
                "Email and password are required".to_string(),
            ));
        }
        let user = self.auth.sign_in(&email, password).await?;
        info!("Signed in as {}", user.uid);
        Ok(user)
    }

    /// すべての購読を解除し、ローカルのビューを空にしてからサインアウトする
    pub async fn sign_out(&self) -> Result<(), AppError> {
        let released = self.registry.release_all().await;
        self.question_views.clear();
        self.answer_views.clear();
        self.auth.sign_out().await?;
        info!("Signed out ({} subscriptions released)", released);
        Ok(())
    }

    pub async fn current_user(&self) -> Option<AuthUser> {
        self.auth.current_user().await
    }

    pub async fn is_authenticated(&self) -> bool {
        self.auth.current_user().await.is_some()
    }
}
