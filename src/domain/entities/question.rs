use crate::domain::projection::Projectable;
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub uid: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub timestamp: i64,
    pub author_name: String,
    pub likes: u32,
    pub answers_count: u32,
}

impl Question {
    pub fn new(
        id: String,
        uid: String,
        author_name: String,
        title: String,
        description: String,
        category: String,
    ) -> Self {
        Self {
            id,
            uid,
            title,
            description,
            category,
            timestamp: Utc::now().timestamp_millis(),
            author_name,
            likes: 0,
            answers_count: 0,
        }
    }

    pub fn is_owned_by(&self, uid: &str) -> bool {
        self.uid == uid
    }

    /// 本文系フィールドだけを差し替える（作成者・時刻・集計値は保持）
    pub fn with_edits(&self, title: String, description: String, category: String) -> Self {
        Self {
            title,
            description,
            category,
            ..self.clone()
        }
    }
}

impl Projectable for Question {
    fn item_id(&self) -> &str {
        &self.id
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn matches_text(&self, needle_lower: &str) -> bool {
        self.title.to_lowercase().contains(needle_lower)
            || self.description.to_lowercase().contains(needle_lower)
    }

    fn category(&self) -> Option<&str> {
        Some(&self.category)
    }
}
