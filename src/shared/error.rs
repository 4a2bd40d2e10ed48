use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// リモート購読の確立に失敗した
    #[error("Subscription failed: {0}")]
    SubscriptionFailed(String),
    /// リモート書き込みが拒否された
    #[error("Mutation failed: {0}")]
    MutationFailed(String),
    /// ログインユーザーがいない状態で書き込みを試みた
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("Auth error: {0}")]
    Auth(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    /// トランザクションの再試行回数を使い切った
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Deserialization error: {0}")]
    DeserializationError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// UI にそのまま表示できる短いメッセージ
    pub fn user_message(&self) -> String {
        match self {
            AppError::SubscriptionFailed(_) => "Could not load the latest data".to_string(),
            AppError::MutationFailed(msg) => msg.clone(),
            AppError::NotAuthenticated => "User not logged in".to_string(),
            AppError::Auth(msg) => msg.clone(),
            AppError::NotFound(what) => format!("{what} not found"),
            AppError::InvalidInput(msg) | AppError::ValidationError(msg) => msg.clone(),
            AppError::Conflict(_) => "Someone else changed this at the same time, try again".to_string(),
            _ => "Something went wrong".to_string(),
        }
    }

    pub fn is_not_authenticated(&self) -> bool {
        matches!(self, AppError::NotAuthenticated)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::DeserializationError(err.to_string())
    }
}

impl From<base64::DecodeError> for AppError {
    fn from(err: base64::DecodeError) -> Self {
        AppError::InvalidInput(format!("Invalid base64 payload: {err}"))
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Internal(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
