use serde::{Deserialize, Serialize};
use std::fmt;

/// 1 つのライブコレクションを識別するキー。
///
/// Subscription Registry の購読キーであり、同時に Derived View Store の
/// コレクション ID でもある。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CollectionKey {
    AllQuestions,
    UserQuestions(String),
    QuestionAnswers(String),
    UserAnswers(String),
}

impl CollectionKey {
    pub fn as_parts(&self) -> (&'static str, Option<&str>) {
        match self {
            CollectionKey::AllQuestions => ("questions", None),
            CollectionKey::UserQuestions(uid) => ("questions:user", Some(uid.as_str())),
            CollectionKey::QuestionAnswers(id) => ("answers:question", Some(id.as_str())),
            CollectionKey::UserAnswers(uid) => ("answers:user", Some(uid.as_str())),
        }
    }

    pub fn is_question_feed(&self) -> bool {
        matches!(
            self,
            CollectionKey::AllQuestions | CollectionKey::UserQuestions(_)
        )
    }

    pub fn is_answer_feed(&self) -> bool {
        !self.is_question_feed()
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_parts() {
            (prefix, Some(id)) => write!(f, "{prefix}:{id}"),
            (prefix, None) => write!(f, "{prefix}"),
        }
    }
}
