use crate::application::ports::{AuthGateway, DocumentStore};
use crate::application::services::{
    AnswerService, AuthService, DerivedViewStore, MutationCoordinator, ProfileService,
    QuestionService, SubscriptionRegistry,
};
use crate::domain::entities::{Answer, Question};
use crate::domain::value_objects::{CollectionKey, ViewFilter};
use crate::infrastructure::{MemoryAuthGateway, MemoryDocumentStore};
use crate::shared::config::AppConfig;
use std::sync::Arc;
use tracing::info;

/// アプリケーション全体の状態を管理する構造体
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<SubscriptionRegistry>,
    pub coordinator: Arc<MutationCoordinator>,
    pub question_views: Arc<DerivedViewStore<Question>>,
    pub answer_views: Arc<DerivedViewStore<Answer>>,
    pub auth_service: Arc<AuthService>,
    pub question_service: Arc<QuestionService>,
    pub answer_service: Arc<AnswerService>,
    pub profile_service: Arc<ProfileService>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        auth: Arc<dyn AuthGateway>,
        store: Arc<dyn DocumentStore>,
    ) -> anyhow::Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
        let config = Arc::new(config);

        let registry = Arc::new(SubscriptionRegistry::new());
        let question_views = Arc::new(DerivedViewStore::new());
        // 既定カテゴリは全質問フィードにだけ効かせる
        question_views.set_filter_for(
            &CollectionKey::AllQuestions,
            ViewFilter::new("", config.feed.default_category.clone()),
        );
        let answer_views = Arc::new(DerivedViewStore::new());
        let coordinator = Arc::new(MutationCoordinator::new(
            Arc::clone(&auth),
            Arc::clone(&store),
            Arc::clone(&registry),
        ));

        let auth_service = Arc::new(AuthService::new(
            Arc::clone(&auth),
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&question_views),
            Arc::clone(&answer_views),
            config.collections.users.clone(),
        ));
        let question_service = Arc::new(QuestionService::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&question_views),
            Arc::clone(&coordinator),
            &config,
        ));
        let answer_service = Arc::new(AnswerService::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&answer_views),
            Arc::clone(&coordinator),
            &config,
        ));
        let profile_service = Arc::new(ProfileService::new(
            auth,
            store,
            Arc::clone(&registry),
            Arc::clone(&coordinator),
            Arc::clone(&auth_service),
            Arc::clone(&question_views),
            Arc::clone(&answer_views),
            &config,
        )?);

        info!(
            "AskIt state initialised (collections: {}, {}, {})",
            config.collections.questions, config.collections.answers, config.collections.users
        );

        Ok(Self {
            config,
            registry,
            coordinator,
            question_views,
            answer_views,
            auth_service,
            question_service,
            answer_service,
            profile_service,
        })
    }

    /// インメモリのストアと認証で状態を組み立てる（ローカル実行・テスト用）
    pub fn in_memory(
        config: AppConfig,
    ) -> anyhow::Result<(Self, MemoryDocumentStore, MemoryAuthGateway)> {
        let store = MemoryDocumentStore::new(config.transactions.max_attempts);
        let auth = MemoryAuthGateway::new();
        let state = Self::new(config, Arc::new(auth.clone()), Arc::new(store.clone()))?;
        Ok((state, store, auth))
    }
}
