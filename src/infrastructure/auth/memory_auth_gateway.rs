use crate::application::ports::AuthGateway;
use crate::domain::entities::AuthUser;
use crate::shared::error::AppError;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
struct Account {
    uid: String,
    password_digest: String,
    display_name: Option<String>,
}

/// メールアドレスとパスワードで認証するインメモリ実装
#[derive(Clone, Default)]
pub struct MemoryAuthGateway {
    accounts: Arc<RwLock<HashMap<String, Account>>>,
    current: Arc<RwLock<Option<AuthUser>>>,
}

impl MemoryAuthGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn account_count(&self) -> usize {
        self.accounts.read().await.len()
    }
}

fn check_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Auth(format!(
            "Password should be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn password_digest(uid: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(uid.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    STANDARD.encode(hasher.finalize())
}

#[async_trait]
impl AuthGateway for MemoryAuthGateway {
    async fn current_user(&self) -> Option<AuthUser> {
        self.current.read().await.clone()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AppError> {
        let accounts = self.accounts.read().await;
        let account = accounts
            .get(email)
            .filter(|account| account.password_digest == password_digest(&account.uid, password))
            .ok_or_else(|| AppError::Auth("Invalid email or password".to_string()))?;

        let user = AuthUser {
            uid: account.uid.clone(),
            email: email.to_string(),
            display_name: account.display_name.clone(),
        };
        *self.current.write().await = Some(user.clone());
        debug!("Session started for {}", user.uid);
        Ok(user)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<AuthUser, AppError> {
        check_password(password)?;

        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(email) {
            return Err(AppError::Auth(
                "The email address is already in use".to_string(),
            ));
        }

        let uid = Uuid::new_v4().simple().to_string();
        let display_name = Some(display_name.trim().to_string()).filter(|n| !n.is_empty());
        accounts.insert(
            email.to_string(),
            Account {
                uid: uid.clone(),
                password_digest: password_digest(&uid, password),
                display_name: display_name.clone(),
            },
        );

        let user = AuthUser {
            uid,
            email: email.to_string(),
            display_name,
        };
        *self.current.write().await = Some(user.clone());
        info!("Created account {}", user.uid);
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        self.current.write().await.take();
        Ok(())
    }

    async fn update_display_name(&self, display_name: &str) -> Result<AuthUser, AppError> {
        // ロックは常に accounts, current の順に取る
        let mut accounts = self.accounts.write().await;
        let mut current = self.current.write().await;
        let user = current.as_mut().ok_or(AppError::NotAuthenticated)?;
        let display_name = Some(display_name.trim().to_string()).filter(|n| !n.is_empty());

        let account = accounts
            .get_mut(&user.email)
            .ok_or_else(|| AppError::NotFound(format!("Account {}", user.uid)))?;
        account.display_name = display_name.clone();
        user.display_name = display_name;
        debug!("Display name changed for {}", user.uid);
        Ok(user.clone())
    }

    async fn update_password(&self, new_password: &str) -> Result<(), AppError> {
        let mut accounts = self.accounts.write().await;
        let current = self.current.read().await;
        let user = current.as_ref().ok_or(AppError::NotAuthenticated)?;
        check_password(new_password)?;

        let account = accounts
            .get_mut(&user.email)
            .ok_or_else(|| AppError::NotFound(format!("Account {}", user.uid)))?;
        account.password_digest = password_digest(&account.uid, new_password);
        info!("Password changed for {}", user.uid);
        Ok(())
    }

    async fn update_email(&self, new_email: &str) -> Result<AuthUser, AppError> {
        let mut accounts = self.accounts.write().await;
        let mut current = self.current.write().await;
        let user = current.as_mut().ok_or(AppError::NotAuthenticated)?;
        if user.email == new_email {
            return Ok(user.clone());
        }
        if accounts.contains_key(new_email) {
            return Err(AppError::Auth(
                "The email address is already in use".to_string(),
            ));
        }
        let account = accounts
            .remove(&user.email)
            .ok_or_else(|| AppError::NotFound(format!("Account {}", user.uid)))?;
        accounts.insert(new_email.to_string(), account);
        user.email = new_email.to_string();
        info!("Email changed for {}", user.uid);
        Ok(user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_up_starts_session() {
        let gateway = MemoryAuthGateway::new();
        let user = gateway
            .sign_up("alice@example.com", "secret1", "Alice")
            .await
            .unwrap();
        assert_eq!(user.display_name.as_deref(), Some("Alice"));
        assert_eq!(gateway.current_user().await, Some(user));
    }

    #[tokio::test]
    async fn duplicate_email_and_short_password_are_rejected() {
        let gateway = MemoryAuthGateway::new();
        gateway
            .sign_up("alice@example.com", "secret1", "Alice")
            .await
            .unwrap();

        assert!(matches!(
            gateway.sign_up("alice@example.com", "secret2", "A").await,
            Err(AppError::Auth(_))
        ));
        assert!(matches!(
            gateway.sign_up("bob@example.com", "123", "Bob").await,
            Err(AppError::Auth(_))
        ));
        assert_eq!(gateway.account_count().await, 1);
    }

    #[tokio::test]
    async fn sign_in_checks_password() {
        let gateway = MemoryAuthGateway::new();
        let created = gateway
            .sign_up("alice@example.com", "secret1", "")
            .await
            .unwrap();
        gateway.sign_out().await.unwrap();
        assert!(gateway.current_user().await.is_none());

        assert!(gateway.sign_in("alice@example.com", "wrong!").await.is_err());
        let user = gateway
            .sign_in("alice@example.com", "secret1")
            .await
            .unwrap();
        assert_eq!(user.uid, created.uid);
        assert!(user.display_name.is_none());
    }

    #[tokio::test]
    async fn account_updates_require_session() {
        let gateway = MemoryAuthGateway::new();
        assert_eq!(
            gateway.update_display_name("Alice").await,
            Err(AppError::NotAuthenticated)
        );
        assert_eq!(
            gateway.update_password("secret2").await,
            Err(AppError::NotAuthenticated)
        );
        assert_eq!(
            gateway.update_email("a@example.com").await,
            Err(AppError::NotAuthenticated)
        );
    }

    #[tokio::test]
    async fn password_change_replaces_old_password() {
        let gateway = MemoryAuthGateway::new();
        gateway
            .sign_up("alice@example.com", "secret1", "Alice")
            .await
            .unwrap();
        assert!(matches!(
            gateway.update_password("123").await,
            Err(AppError::Auth(_))
        ));
        gateway.update_password("secret2").await.unwrap();
        gateway.sign_out().await.unwrap();

        assert!(gateway.sign_in("alice@example.com", "secret1").await.is_err());
        assert!(gateway.sign_in("alice@example.com", "secret2").await.is_ok());
    }

    #[tokio::test]
    async fn email_change_moves_account() {
        let gateway = MemoryAuthGateway::new();
        gateway
            .sign_up("bob@example.com", "secret1", "Bob")
            .await
            .unwrap();
        let created = gateway
            .sign_up("alice@example.com", "secret1", "Alice")
            .await
            .unwrap();

        assert!(matches!(
            gateway.update_email("bob@example.com").await,
            Err(AppError::Auth(_))
        ));
        let moved = gateway.update_email("alice@askit.dev").await.unwrap();
        assert_eq!(moved.uid, created.uid);
        assert_eq!(moved.email, "alice@askit.dev");
        gateway.sign_out().await.unwrap();

        assert!(gateway.sign_in("alice@example.com", "secret1").await.is_err());
        let user = gateway.sign_in("alice@askit.dev", "secret1").await.unwrap();
        assert_eq!(user.uid, created.uid);
        assert_eq!(gateway.account_count().await, 2);
    }

    #[tokio::test]
    async fn display_name_change_is_kept_across_sessions() {
        let gateway = MemoryAuthGateway::new();
        gateway
            .sign_up("alice@example.com", "secret1", "Alice")
            .await
            .unwrap();
        let renamed = gateway.update_display_name("  Alice L. ").await.unwrap();
        assert_eq!(renamed.display_name.as_deref(), Some("Alice L."));
        gateway.sign_out().await.unwrap();

        let user = gateway
            .sign_in("alice@example.com", "secret1")
            .await
            .unwrap();
        assert_eq!(user.display_name.as_deref(), Some("Alice L."));
    }
}
