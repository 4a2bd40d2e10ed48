use crate::domain::projection::Projectable;
use crate::domain::value_objects::VoterSet;
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Answer {
    pub id: String,
    pub question_id: String,
    pub uid: String,
    pub text: String,
    pub timestamp: i64,
    pub upvotes: VoterSet,
}

impl Answer {
    pub fn new(id: String, question_id: String, uid: String, text: String) -> Self {
        Self {
            id,
            question_id,
            uid,
            text,
            timestamp: Utc::now().timestamp_millis(),
            upvotes: VoterSet::new(),
        }
    }

    pub fn upvote_count(&self) -> usize {
        self.upvotes.len()
    }

    pub fn is_upvoted_by(&self, uid: &str) -> bool {
        self.upvotes.contains(uid)
    }

    pub fn toggle_upvote(&mut self, uid: &str) {
        self.upvotes = self.upvotes.toggled(uid);
    }
}

impl Projectable for Answer {
    fn item_id(&self) -> &str {
        &self.id
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn matches_text(&self, needle_lower: &str) -> bool {
        self.text.to_lowercase().contains(needle_lower)
    }

    // 回答にはカテゴリが無い
    fn category(&self) -> Option<&str> {
        None
    }
}
