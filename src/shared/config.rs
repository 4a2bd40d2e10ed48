use crate::domain::constants::ALL_CATEGORIES;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub collections: CollectionsConfig,
    pub feed: FeedConfig,
    pub badges: BadgeConfig,
    pub transactions: TransactionConfig,
}

/// バックエンド側のコレクション名
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionsConfig {
    pub questions: String,
    pub answers: String,
    pub users: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    pub default_category: String,
    pub anonymous_author_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MilestoneConfig {
    pub threshold: u32,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BadgeConfig {
    pub question_milestones: Vec<MilestoneConfig>,
    pub answer_milestones: Vec<MilestoneConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionConfig {
    pub max_attempts: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            collections: CollectionsConfig {
                questions: "questions".to_string(),
                answers: "answers".to_string(),
                users: "users".to_string(),
            },
            feed: FeedConfig {
                default_category: ALL_CATEGORIES.to_string(),
                anonymous_author_name: "Anonymous".to_string(),
            },
            badges: BadgeConfig::default(),
            transactions: TransactionConfig { max_attempts: 5 },
        }
    }
}

impl Default for BadgeConfig {
    fn default() -> Self {
        Self {
            question_milestones: milestones(&[
                (1, "First Question"),
                (10, "Curious Mind"),
                (50, "Question Explorer"),
                (100, "Knowledge Seeker"),
                (200, "Master Inquisitor"),
            ]),
            answer_milestones: milestones(&[
                (1, "First Answer"),
                (10, "Helper"),
                (50, "Support Specialist"),
                (100, "Trusted Answerer"),
                (200, "Answer Guru"),
            ]),
        }
    }
}

fn milestones(pairs: &[(u32, &str)]) -> Vec<MilestoneConfig> {
    pairs
        .iter()
        .map(|(threshold, label)| MilestoneConfig {
            threshold: *threshold,
            label: label.to_string(),
        })
        .collect()
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 環境変数の代わりに任意のルックアップ関数から設定を組み立てる
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup("ASKIT_QUESTIONS_COLLECTION") {
            cfg.collections.questions = v.trim().to_string();
        }
        if let Some(v) = lookup("ASKIT_ANSWERS_COLLECTION") {
            cfg.collections.answers = v.trim().to_string();
        }
        if let Some(v) = lookup("ASKIT_USERS_COLLECTION") {
            cfg.collections.users = v.trim().to_string();
        }
        if let Some(v) = lookup("ASKIT_ANONYMOUS_AUTHOR")
            && !v.trim().is_empty()
        {
            cfg.feed.anonymous_author_name = v.trim().to_string();
        }
        if let Some(v) = lookup("ASKIT_TX_MAX_ATTEMPTS")
            && let Some(value) = parse_u32(&v)
        {
            cfg.transactions.max_attempts = value;
        }
        if let Some(v) = lookup("ASKIT_QUESTION_MILESTONES")
            && let Some(parsed) = parse_milestones(&v)
        {
            cfg.badges.question_milestones = parsed;
        }
        if let Some(v) = lookup("ASKIT_ANSWER_MILESTONES")
            && let Some(parsed) = parse_milestones(&v)
        {
            cfg.badges.answer_milestones = parsed;
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        let names = [
            ("questions", &self.collections.questions),
            ("answers", &self.collections.answers),
            ("users", &self.collections.users),
        ];
        for (label, name) in names {
            if name.is_empty() {
                return Err(format!("Collection name for {label} must not be empty"));
            }
        }
        if self.transactions.max_attempts == 0 {
            return Err("Transaction max_attempts must be greater than 0".to_string());
        }
        check_increasing("question", &self.badges.question_milestones)?;
        check_increasing("answer", &self.badges.answer_milestones)?;
        Ok(())
    }
}

fn check_increasing(kind: &str, list: &[MilestoneConfig]) -> Result<(), String> {
    let mut previous = 0;
    for milestone in list {
        if milestone.threshold <= previous {
            return Err(format!(
                "{kind} milestone thresholds must be >= 1 and strictly increasing (got {} after {previous})",
                milestone.threshold
            ));
        }
        previous = milestone.threshold;
    }
    Ok(())
}

/// `1:First Question,10:Curious Mind` 形式
fn parse_milestones(value: &str) -> Option<Vec<MilestoneConfig>> {
    let mut out = Vec::new();
    for part in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (threshold, label) = part.split_once(':')?;
        out.push(MilestoneConfig {
            threshold: parse_u32(threshold)?,
            label: label.trim().to_string(),
        });
    }
    if out.is_empty() { None } else { Some(out) }
}

fn parse_u32(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok()
}
