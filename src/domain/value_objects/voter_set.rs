use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 投票者 ID の集合。同じユーザーは高々 1 回しか含まれない。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoterSet(BTreeSet<String>);

impl VoterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.0.contains(user_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 含まれていれば取り除き、含まれていなければ追加した集合を返す
    pub fn toggled(&self, user_id: &str) -> Self {
        let mut next = self.0.clone();
        if !next.remove(user_id) {
            next.insert(user_id.to_string());
        }
        Self(next)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for VoterSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
