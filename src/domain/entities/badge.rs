use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeKind {
    Question,
    Answer,
}

/// 活動件数から導出されるバッジ。永続化はしない。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Badge {
    pub kind: BadgeKind,
    pub threshold: u32,
    pub label: String,
    pub description: String,
}

impl Badge {
    pub fn new(kind: BadgeKind, threshold: u32, label: impl Into<String>) -> Self {
        let description = match kind {
            BadgeKind::Question => format!("Asked {threshold} questions"),
            BadgeKind::Answer => format!("Answered {threshold} questions"),
        };
        Self {
            kind,
            threshold,
            label: label.into(),
            description,
        }
    }
}

/// 種別・閾値順に並んだバッジ集合
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BadgeSet(BTreeSet<Badge>);

impl BadgeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, badge: Badge) -> bool {
        self.0.insert(badge)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_label(&self, label: &str) -> bool {
        self.0.iter().any(|b| b.label == label)
    }

    pub fn labels(&self) -> Vec<String> {
        self.0.iter().map(|b| b.label.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Badge> {
        self.0.iter()
    }

    pub fn is_subset(&self, other: &BadgeSet) -> bool {
        self.0.is_subset(&other.0)
    }
}

impl FromIterator<Badge> for BadgeSet {
    fn from_iter<I: IntoIterator<Item = Badge>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
