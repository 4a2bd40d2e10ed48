use super::auth_service::AuthService;
use super::collection_feed::CollectionFeed;
use super::derived_view_store::DerivedViewStore;
use super::mutation_coordinator::{Mutation, MutationCoordinator};
use super::subscription_registry::SubscriptionRegistry;
use crate::application::ports::{AuthGateway, DocumentQuery, DocumentStore, SortDirection};
use crate::application::shared::mappers::answers::answers_from_snapshots;
use crate::application::shared::mappers::users::{normalize_email, profile_from_snapshot};
use crate::domain::badges;
use crate::domain::entities::{Answer, BadgeSet, Question, UserProfile};
use crate::domain::value_objects::{CollectionKey, Milestone, MilestoneList};
use crate::shared::config::{AppConfig, MilestoneConfig};
use crate::shared::error::AppError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// プロフィール画面に表示する活動量とバッジ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSummary {
    pub uid: String,
    pub questions_count: u32,
    pub answers_count: u32,
    pub badges: BadgeSet,
    pub next_question_milestone: Option<Milestone>,
    pub next_answer_milestone: Option<Milestone>,
}

pub struct ProfileService {
    auth: Arc<dyn AuthGateway>,
    store: Arc<dyn DocumentStore>,
    registry: Arc<SubscriptionRegistry>,
    coordinator: Arc<MutationCoordinator>,
    auth_service: Arc<AuthService>,
    question_views: Arc<DerivedViewStore<Question>>,
    answer_feed: CollectionFeed<Answer>,
    question_milestones: MilestoneList,
    answer_milestones: MilestoneList,
    users_collection: String,
    questions_collection: String,
    answers_collection: String,
}

impl ProfileService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        auth: Arc<dyn AuthGateway>,
        store: Arc<dyn DocumentStore>,
        registry: Arc<SubscriptionRegistry>,
        coordinator: Arc<MutationCoordinator>,
        auth_service: Arc<AuthService>,
        question_views: Arc<DerivedViewStore<Question>>,
        answer_views: Arc<DerivedViewStore<Answer>>,
        config: &AppConfig,
    ) -> Result<Self, AppError> {
        Ok(Self {
            answer_feed: CollectionFeed::new(
                Arc::clone(&store),
                Arc::clone(&registry),
                answer_views,
                answers_from_snapshots,
            ),
            auth,
            store,
            registry,
            coordinator,
            auth_service,
            question_views,
            question_milestones: milestone_list(&config.badges.question_milestones)?,
            answer_milestones: milestone_list(&config.badges.answer_milestones)?,
            users_collection: config.collections.users.clone(),
            questions_collection: config.collections.questions.clone(),
            answers_collection: config.collections.answers.clone(),
        })
    }

    /// ログインユーザーのプロフィール。ドキュメントが無ければ認証情報から組み立てる。
    pub async fn load_profile(&self) -> Result<UserProfile, AppError> {
        let user = self
            .auth
            .current_user()
            .await
            .ok_or(AppError::NotAuthenticated)?;

        match self.store.get(&self.users_collection, &user.uid).await? {
            Some(snapshot) => profile_from_snapshot(snapshot),
            None => {
                debug!("No profile document for {}, using auth data", user.uid);
                Ok(UserProfile::new(
                    user.uid.clone(),
                    user.display_name_or("").to_string(),
                    user.email.clone(),
                ))
            }
        }
    }

    pub async fn watch_user_answers(
        &self,
        uid: &str,
    ) -> Result<watch::Receiver<Vec<Answer>>, AppError> {
        let query = DocumentQuery::collection(&self.answers_collection)
            .where_eq("uid", uid)
            .order_by("timestamp", SortDirection::Descending);
        self.answer_feed
            .open(CollectionKey::UserAnswers(uid.to_string()), query)
            .await
    }

    /// 質問数・回答数とそこから導出したバッジ
    pub async fn activity(&self, uid: &str) -> Result<ProfileSummary, AppError> {
        let questions_count = self
            .count(
                &CollectionKey::UserQuestions(uid.to_string()),
                &self.questions_collection,
                uid,
            )
            .await?;
        let answers_count = self
            .count(
                &CollectionKey::UserAnswers(uid.to_string()),
                &self.answers_collection,
                uid,
            )
            .await?;

        Ok(ProfileSummary {
            uid: uid.to_string(),
            questions_count,
            answers_count,
            badges: badges::evaluate(
                questions_count,
                answers_count,
                &self.question_milestones,
                &self.answer_milestones,
            ),
            next_question_milestone: self.question_milestones.next_after(questions_count).cloned(),
            next_answer_milestone: self.answer_milestones.next_after(answers_count).cloned(),
        })
    }

    /// ライブ購読中ならローカルの生データ件数、そうでなければリモートに問い合わせる
    async fn count(&self, key: &CollectionKey, collection: &str, uid: &str) -> Result<u32, AppError> {
        let len = if self.registry.is_live(key).await {
            if key.is_question_feed() {
                self.question_views.raw_len(key)
            } else {
                self.answer_feed.views().raw_len(key)
            }
        } else {
            let query = DocumentQuery::collection(collection).where_eq("uid", uid);
            self.store.query(&query).await?.len()
        };
        Ok(u32::try_from(len).unwrap_or(u32::MAX))
    }

    pub async fn update_profile_image(&self, image_base64: &str) -> Result<(), AppError> {
        let encoded = image_base64.trim();
        if encoded.is_empty() {
            return Err(AppError::InvalidInput("Image data is empty".to_string()));
        }
        STANDARD.decode(encoded)?;

        self.coordinator
            .submit(Mutation::UpdateProfile, |user| async move {
                self.write_user_field(&user.uid, "profileImageBase64", encoded)
                    .await
            })
            .await
    }

    /// 表示名を変更し、`users/{uid}.name` にも書き込む
    pub async fn update_username(&self, name: &str) -> Result<(), AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::ValidationError("Name is required".to_string()));
        }

        self.coordinator
            .submit(Mutation::UpdateUsername, |user| async move {
                self.write_user_field(&user.uid, "name", name).await?;
                self.auth.update_display_name(name).await?;
                Ok(())
            })
            .await
    }

    pub async fn update_password(&self, new_password: &str) -> Result<(), AppError> {
        if new_password.is_empty() {
            return Err(AppError::ValidationError(
                "Password is required".to_string(),
            ));
        }

        self.coordinator
            .submit(Mutation::UpdatePassword, |_| async move {
                self.auth.update_password(new_password).await
            })
            .await
    }

    /// 認証側のメールアドレスを変えてからプロフィールの `email` を合わせる
    pub async fn update_email(&self, new_email: &str) -> Result<(), AppError> {
        let email = normalize_email(new_email);
        if email.is_empty() {
            return Err(AppError::ValidationError("Email is required".to_string()));
        }

        self.coordinator
            .submit(Mutation::UpdateEmail, |user| async move {
                self.auth.update_email(&email).await?;
                self.write_user_field(&user.uid, "email", &email).await
            })
            .await
    }

    async fn write_user_field(&self, uid: &str, field: &str, value: &str) -> Result<(), AppError> {
        let mut fields = Map::new();
        fields.insert(field.to_string(), Value::from(value));
        self.store
            .update_fields(&self.users_collection, uid, fields)
            .await
    }

    pub async fn logout(&self) -> Result<(), AppError> {
        self.auth_service.sign_out().await
    }
}

fn milestone_list(config: &[MilestoneConfig]) -> Result<MilestoneList, AppError> {
    MilestoneList::from_pairs(config.iter().map(|m| (m.threshold, m.label.clone()))).map_err(|e| {
        warn!("Invalid milestone configuration: {}", e);
        AppError::ConfigurationError(e)
    })
}
