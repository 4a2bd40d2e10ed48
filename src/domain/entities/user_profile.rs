use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub name: String,
    pub email: String,
    pub profile_image_base64: Option<String>,
    pub questions_count: u32,
    pub answers_count: u32,
    pub badges: Vec<String>,
}

impl UserProfile {
    pub fn new(uid: String, name: String, email: String) -> Self {
        Self {
            uid,
            name,
            email,
            ..Default::default()
        }
    }
}

/// サインイン中ユーザーの認証情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
}

impl AuthUser {
    /// 表示名が未設定・空の場合は `fallback` を返す
    pub fn display_name_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        match self.display_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => fallback,
        }
    }
}
