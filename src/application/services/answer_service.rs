use super::collection_feed::CollectionFeed;
use super::derived_view_store::DerivedViewStore;
use super::mutation_coordinator::{Mutation, MutationCoordinator};
use super::subscription_registry::SubscriptionRegistry;
use crate::application::ports::{DocumentQuery, DocumentStore, SortDirection};
use crate::application::shared::mappers::answers::{
    answer_from_snapshot, answer_to_document, answers_from_snapshots,
};
use crate::application::shared::mappers::questions::increment_answers_count;
use crate::domain::entities::Answer;
use crate::domain::value_objects::{CollectionKey, VoterSet};
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

pub struct AnswerService {
    store: Arc<dyn DocumentStore>,
    registry: Arc<SubscriptionRegistry>,
    coordinator: Arc<MutationCoordinator>,
    feed: CollectionFeed<Answer>,
    answers_collection: String,
    questions_collection: String,
}

impl AnswerService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        registry: Arc<SubscriptionRegistry>,
        views: Arc<DerivedViewStore<Answer>>,
        coordinator: Arc<MutationCoordinator>,
        config: &AppConfig,
    ) -> Self {
        Self {
            feed: CollectionFeed::new(
                Arc::clone(&store),
                Arc::clone(&registry),
                views,
                answers_from_snapshots,
            ),
            store,
            registry,
            coordinator,
            answers_collection: config.collections.answers.clone(),
            questions_collection: config.collections.questions.clone(),
        }
    }

    pub fn views(&self) -> &Arc<DerivedViewStore<Answer>> {
        self.feed.views()
    }

    /// 回答を投稿し、質問側の `answersCount` をトランザクションで 1 増やす
    pub async fn post_answer(&self, question_id: &str, text: &str) -> Result<Answer, AppError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::ValidationError(
                "Answer text is required".to_string(),
            ));
        }

        self.coordinator
            .submit(
                Mutation::CreateAnswer {
                    question_id: question_id.to_string(),
                },
                |user| async move {
                    let id = self.store.new_document_id(&self.answers_collection);
                    let answer = Answer::new(
                        id,
                        question_id.to_string(),
                        user.uid.clone(),
                        text.to_string(),
                    );
                    self.store
                        .set(&self.answers_collection, &answer.id, answer_to_document(&answer)?)
                        .await?;

                    // 回答自体は保存済みなので件数の更新失敗は投稿失敗としない
                    if let Err(err) = self
                        .store
                        .run_transaction(
                            &self.questions_collection,
                            question_id,
                            Box::new(increment_answers_count),
                        )
                        .await
                    {
                        warn!("Failed to bump answersCount of {}: {}", question_id, err);
                    }
                    Ok(answer)
                },
            )
            .await
    }

    pub async fn watch_answers(
        &self,
        question_id: &str,
    ) -> Result<watch::Receiver<Vec<Answer>>, AppError> {
        let query = DocumentQuery::collection(&self.answers_collection)
            .where_eq("questionId", question_id)
            .order_by("timestamp", SortDirection::Descending);
        self.feed
            .open(CollectionKey::QuestionAnswers(question_id.to_string()), query)
            .await
    }

    /// 回答画面を離れるときに購読を破棄する
    pub async fn close_answers(&self, question_id: &str) -> bool {
        let key = CollectionKey::QuestionAnswers(question_id.to_string());
        let released = self.registry.release(&key).await;
        self.views().remove_collection(&key);
        released
    }

    /// ログインユーザーの投票をトグルし、確定した投票者集合を返す
    pub async fn toggle_upvote(&self, answer_id: &str) -> Result<VoterSet, AppError> {
        let question_id = match self.views().find(answer_id) {
            Some(answer) => answer.question_id,
            None => {
                let snapshot = self
                    .store
                    .get(&self.answers_collection, answer_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Answer {answer_id}")))?;
                answer_from_snapshot(snapshot)?.question_id
            }
        };

        self.coordinator
            .toggle_vote(
                self.views(),
                &self.answers_collection,
                &question_id,
                answer_id,
            )
            .await
    }
}
