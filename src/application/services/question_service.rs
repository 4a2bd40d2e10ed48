use super::collection_feed::CollectionFeed;
use super::derived_view_store::DerivedViewStore;
use super::mutation_coordinator::{Mutation, MutationCoordinator};
use super::subscription_registry::SubscriptionRegistry;
use crate::application::ports::{DocumentQuery, DocumentStore, SortDirection};
use crate::application::shared::mappers::questions::{
    question_from_snapshot, question_to_document, questions_from_snapshots,
};
use crate::domain::entities::{AuthUser, Question};
use crate::domain::value_objects::CollectionKey;
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;
use uuid::Uuid;

pub struct QuestionService {
    store: Arc<dyn DocumentStore>,
    coordinator: Arc<MutationCoordinator>,
    feed: CollectionFeed<Question>,
    collection: String,
    anonymous_author: String,
}

impl QuestionService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        registry: Arc<SubscriptionRegistry>,
        views: Arc<DerivedViewStore<Question>>,
        coordinator: Arc<MutationCoordinator>,
        config: &AppConfig,
    ) -> Self {
        Self {
            feed: CollectionFeed::new(
                Arc::clone(&store),
                registry,
                views,
                questions_from_snapshots,
            ),
            store,
            coordinator,
            collection: config.collections.questions.clone(),
            anonymous_author: config.feed.anonymous_author_name.clone(),
        }
    }

    pub fn views(&self) -> &Arc<DerivedViewStore<Question>> {
        self.feed.views()
    }

    pub async fn post_question(
        &self,
        title: &str,
        description: &str,
        category: &str,
    ) -> Result<Question, AppError> {
        validate_fields(title, description, category)?;
        let question_id = Uuid::new_v4().to_string();
        let store = Arc::clone(&self.store);
        let collection = self.collection.clone();
        let anonymous = self.anonymous_author.clone();

        self.coordinator
            .submit(
                Mutation::CreateQuestion {
                    question_id: question_id.clone(),
                },
                |user| async move {
                    let question = Question::new(
                        question_id,
                        user.uid.clone(),
                        user.display_name_or(&anonymous).to_string(),
                        title.trim().to_string(),
                        description.trim().to_string(),
                        category.to_string(),
                    );
                    store
                        .set(&collection, &question.id, question_to_document(&question)?)
                        .await?;
                    Ok(question)
                },
            )
            .await
    }

    /// タイトル・本文・カテゴリを更新する（作成者のみ）
    pub async fn edit_question(
        &self,
        question_id: &str,
        title: &str,
        description: &str,
        category: &str,
    ) -> Result<Question, AppError> {
        validate_fields(title, description, category)?;

        self.coordinator
            .submit(
                Mutation::UpdateQuestion {
                    question_id: question_id.to_string(),
                },
                |user| async move {
                    let current = self.owned_question(question_id, &user).await?;
                    let edited = current.with_edits(
                        title.trim().to_string(),
                        description.trim().to_string(),
                        category.to_string(),
                    );
                    let mut fields = Map::new();
                    fields.insert("title".into(), Value::from(edited.title.clone()));
                    fields.insert("description".into(), Value::from(edited.description.clone()));
                    fields.insert("category".into(), Value::from(edited.category.clone()));
                    self.store
                        .update_fields(&self.collection, question_id, fields)
                        .await?;
                    Ok(edited)
                },
            )
            .await
    }

    pub async fn delete_question(&self, question_id: &str) -> Result<(), AppError> {
        self.coordinator
            .submit(
                Mutation::DeleteQuestion {
                    question_id: question_id.to_string(),
                },
                |user| async move {
                    self.owned_question(question_id, &user).await?;
                    self.store.delete(&self.collection, question_id).await
                },
            )
            .await
    }

    async fn owned_question(&self, question_id: &str, user: &AuthUser) -> Result<Question, AppError> {
        let snapshot = self
            .store
            .get(&self.collection, question_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Question {question_id}")))?;
        let question = question_from_snapshot(snapshot)?;
        if !question.is_owned_by(&user.uid) {
            return Err(AppError::Auth(
                "Only the author can modify this question".to_string(),
            ));
        }
        Ok(question)
    }

    /// 全質問のライブフィード（新しい順）
    pub async fn watch_all_questions(&self) -> Result<watch::Receiver<Vec<Question>>, AppError> {
        let query = DocumentQuery::collection(&self.collection)
            .order_by("timestamp", SortDirection::Descending);
        self.feed.open(CollectionKey::AllQuestions, query).await
    }

    pub async fn watch_user_questions(
        &self,
        uid: &str,
    ) -> Result<watch::Receiver<Vec<Question>>, AppError> {
        let query = DocumentQuery::collection(&self.collection)
            .where_eq("uid", uid)
            .order_by("timestamp", SortDirection::Descending);
        self.feed
            .open(CollectionKey::UserQuestions(uid.to_string()), query)
            .await
    }

    pub async fn unwatch_all_questions(&self) -> bool {
        self.feed.close(&CollectionKey::AllQuestions).await
    }

    pub async fn unwatch_user_questions(&self, uid: &str) -> bool {
        self.feed
            .close(&CollectionKey::UserQuestions(uid.to_string()))
            .await
    }

    /// 全質問フィードだけを絞り込む。ユーザー別フィードは常に全件を見せる。
    pub fn set_search_query(&self, query: &str) {
        self.views()
            .set_search_text_for(&CollectionKey::AllQuestions, query);
    }

    pub fn set_selected_category(&self, category: &str) {
        self.views()
            .set_category_for(&CollectionKey::AllQuestions, category);
    }

    /// ユーザーの質問数。取得に失敗した場合は 0 とみなす。
    pub async fn question_count(&self, uid: &str) -> u32 {
        let query = DocumentQuery::collection(&self.collection).where_eq("uid", uid);
        match self.store.query(&query).await {
            Ok(documents) => u32::try_from(documents.len()).unwrap_or(u32::MAX),
            Err(err) => {
                warn!("Failed to count questions of {}: {}", uid, err);
                0
            }
        }
    }
}

fn validate_fields(title: &str, description: &str, category: &str) -> Result<(), AppError> {
    if title.trim().is_empty() {
        return Err(AppError::ValidationError("Title is required".to_string()));
    }
    if description.trim().is_empty() {
        return Err(AppError::ValidationError(
            "Description is required".to_string(),
        ));
    }
    if category.trim().is_empty() {
        return Err(AppError::ValidationError("Category is required".to_string()));
    }
    Ok(())
}
