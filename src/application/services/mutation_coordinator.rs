use super::derived_view_store::DerivedViewStore;
use super::subscription_registry::SubscriptionRegistry;
use crate::application::ports::{AuthGateway, DocumentStore};
use crate::application::shared::mappers::answers::{
    toggle_upvote_in_document, upvotes_from_document,
};
use crate::domain::entities::{Answer, AuthUser};
use crate::domain::projection::Projectable;
use crate::domain::value_objects::{CollectionKey, VoterSet};
use crate::shared::error::AppError;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// リモートへの書き込み操作の種類
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    CreateQuestion { question_id: String },
    UpdateQuestion { question_id: String },
    DeleteQuestion { question_id: String },
    CreateAnswer { question_id: String },
    ToggleVote { question_id: String, answer_id: String },
    UpdateProfile,
    UpdateUsername,
    UpdatePassword,
    UpdateEmail,
}

impl Mutation {
    pub fn success_message(&self) -> &'static str {
        match self {
            Mutation::CreateQuestion { .. } => "Question posted successfully",
            Mutation::UpdateQuestion { .. } => "Question updated",
            Mutation::DeleteQuestion { .. } => "Question deleted",
            Mutation::CreateAnswer { .. } => "Answer posted successfully",
            Mutation::ToggleVote { .. } => "Vote updated",
            Mutation::UpdateProfile => "Profile updated",
            Mutation::UpdateUsername => "Username updated",
            Mutation::UpdatePassword => "Password updated",
            Mutation::UpdateEmail => "Email updated",
        }
    }

    pub fn failure_message(&self) -> &'static str {
        match self {
            Mutation::CreateQuestion { .. } => "Failed to post question",
            Mutation::UpdateQuestion { .. } => "Failed to update question",
            Mutation::DeleteQuestion { .. } => "Failed to delete question",
            Mutation::CreateAnswer { .. } => "Failed to post answer",
            Mutation::ToggleVote { .. } => "Failed to update like",
            Mutation::UpdateProfile => "Failed to update profile",
            Mutation::UpdateUsername | Mutation::UpdatePassword | Mutation::UpdateEmail => {
                "Failed to update"
            }
        }
    }

    /// 書き込み成功後に内容が変わりうるコレクション
    pub fn affected_keys(&self, user: &AuthUser) -> Vec<CollectionKey> {
        match self {
            Mutation::CreateQuestion { .. }
            | Mutation::UpdateQuestion { .. }
            | Mutation::DeleteQuestion { .. } => vec![
                CollectionKey::AllQuestions,
                CollectionKey::UserQuestions(user.uid.clone()),
            ],
            Mutation::CreateAnswer { question_id } => vec![
                CollectionKey::QuestionAnswers(question_id.clone()),
                CollectionKey::UserAnswers(user.uid.clone()),
                CollectionKey::AllQuestions,
            ],
            Mutation::ToggleVote { question_id, .. } => {
                vec![CollectionKey::QuestionAnswers(question_id.clone())]
            }
            Mutation::UpdateProfile
            | Mutation::UpdateUsername
            | Mutation::UpdatePassword
            | Mutation::UpdateEmail => Vec::new(),
        }
    }
}

/// 直近の書き込み結果。UI のスナックバー等に表示する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationStatus {
    pub mutation: Mutation,
    pub succeeded: bool,
    pub message: String,
}

/// 書き込みを発行し、ローカル状態との整合を取るコーディネーター。
///
/// 反映はリアルタイム購読に任せる。成功時にローカルの生データを直接書き換えることはせず、
/// 楽観的更新を明示的に選んだ操作だけが事前にローカルを書き換え、失敗時に巻き戻す。
pub struct MutationCoordinator {
    auth: Arc<dyn AuthGateway>,
    store: Arc<dyn DocumentStore>,
    registry: Arc<SubscriptionRegistry>,
    status: watch::Sender<Option<MutationStatus>>,
}

impl MutationCoordinator {
    pub fn new(
        auth: Arc<dyn AuthGateway>,
        store: Arc<dyn DocumentStore>,
        registry: Arc<SubscriptionRegistry>,
    ) -> Self {
        let (status, _) = watch::channel(None);
        Self {
            auth,
            store,
            registry,
            status,
        }
    }

    pub fn status(&self) -> watch::Receiver<Option<MutationStatus>> {
        self.status.subscribe()
    }

    pub fn clear_status(&self) {
        self.status.send_replace(None);
    }

    async fn require_user(&self, mutation: &Mutation) -> Result<AuthUser, AppError> {
        match self.auth.current_user().await {
            Some(user) => Ok(user),
            None => {
                warn!("Rejected {:?}: no signed-in user", mutation);
                self.publish(mutation, false, AppError::NotAuthenticated.user_message());
                Err(AppError::NotAuthenticated)
            }
        }
    }

    fn publish(&self, mutation: &Mutation, succeeded: bool, message: String) {
        self.status.send_replace(Some(MutationStatus {
            mutation: mutation.clone(),
            succeeded,
            message,
        }));
    }

    fn fail(&self, mutation: &Mutation, err: AppError) -> AppError {
        let message = match err {
            AppError::MutationFailed(msg) => msg,
            other => format!("{}: {}", mutation.failure_message(), other),
        };
        warn!("{}", message);
        self.publish(mutation, false, mutation.failure_message().to_string());
        AppError::MutationFailed(message)
    }

    async fn reconcile(&self, mutation: &Mutation, user: &AuthUser) {
        for key in mutation.affected_keys(user) {
            if self.registry.is_live(&key).await {
                debug!("{} will receive the change through its subscription", key);
            } else {
                debug!("{} has no live subscription; it loads fresh data on next subscribe", key);
            }
        }
        info!("{}", mutation.success_message());
        self.publish(mutation, true, mutation.success_message().to_string());
    }

    /// ログインユーザーを確認してから `remote_call` を実行する。
    ///
    /// 失敗時はローカル状態に一切触れず `MutationFailed` を返す。
    pub async fn submit<T, F, Fut>(&self, mutation: Mutation, remote_call: F) -> Result<T, AppError>
    where
        F: FnOnce(AuthUser) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let user = self.require_user(&mutation).await?;
        match remote_call(user.clone()).await {
            Ok(value) => {
                self.reconcile(&mutation, &user).await;
                Ok(value)
            }
            Err(err) => Err(self.fail(&mutation, err)),
        }
    }

    /// `views` 上の `item_id` を先に書き換えてから `remote_call` を実行し、失敗したら巻き戻す
    pub async fn submit_optimistic<I, T, P, F, Fut>(
        &self,
        mutation: Mutation,
        views: &DerivedViewStore<I>,
        item_id: &str,
        patch: P,
        remote_call: F,
    ) -> Result<T, AppError>
    where
        I: Projectable,
        P: Fn(&mut I, &AuthUser),
        F: FnOnce(AuthUser) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let user = self.require_user(&mutation).await?;
        let optimistic = views.patch_item(item_id, |item| patch(item, &user));

        match remote_call(user.clone()).await {
            Ok(value) => {
                self.reconcile(&mutation, &user).await;
                Ok(value)
            }
            Err(err) => {
                let restored = views.rollback(optimistic);
                debug!("Rolled back optimistic change to {} in {} collections", item_id, restored);
                Err(self.fail(&mutation, err))
            }
        }
    }

    /// 回答への投票をトグルする。
    ///
    /// 新しい投票者集合はトランザクション内で最新の確定値から計算するため、
    /// 他ユーザーの同時投票を上書きしない。
    pub async fn toggle_vote(
        &self,
        views: &DerivedViewStore<Answer>,
        answers_collection: &str,
        question_id: &str,
        answer_id: &str,
    ) -> Result<VoterSet, AppError> {
        let mutation = Mutation::ToggleVote {
            question_id: question_id.to_string(),
            answer_id: answer_id.to_string(),
        };
        let store = Arc::clone(&self.store);

        self.submit_optimistic(
            mutation,
            views,
            answer_id,
            |answer, user| answer.toggle_upvote(&user.uid),
            |user| async move {
                let uid = user.uid.clone();
                let written = store
                    .run_transaction(
                        answers_collection,
                        answer_id,
                        Box::new(move |current: Option<&Value>| {
                            toggle_upvote_in_document(current, &uid)
                        }),
                    )
                    .await?;
                Ok(upvotes_from_document(&written))
            },
        )
        .await
    }
}
