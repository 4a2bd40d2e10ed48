use crate::domain::entities::AuthUser;
use crate::shared::error::AppError;
use async_trait::async_trait;

/// 認証サービスのポート。
///
/// Application 層はこの trait 経由でのみ認証状態を参照し、
/// 具体的な実装（マネージド認証 SDK やインメモリ実装）は Infrastructure 層に置く。
#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn current_user(&self) -> Option<AuthUser>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AppError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<AuthUser, AppError>;

    async fn sign_out(&self) -> Result<(), AppError>;

    /// 以下はいずれもサインイン中のユーザーに対する操作
    async fn update_display_name(&self, display_name: &str) -> Result<AuthUser, AppError>;

    async fn update_password(&self, new_password: &str) -> Result<(), AppError>;

    async fn update_email(&self, new_email: &str) -> Result<AuthUser, AppError>;
}
