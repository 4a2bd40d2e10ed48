use serde::{Deserialize, Serialize};

/// バッジ獲得の閾値とラベルの組
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    threshold: u32,
    label: String,
}

impl Milestone {
    pub fn new(threshold: u32, label: impl Into<String>) -> Result<Self, String> {
        if threshold == 0 {
            return Err("Milestone threshold must be at least 1".to_string());
        }
        let label = label.into();
        if label.trim().is_empty() {
            return Err("Milestone label cannot be empty".to_string());
        }
        Ok(Self { threshold, label })
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_reached_by(&self, count: u32) -> bool {
        count >= self.threshold
    }
}

/// 閾値が狭義単調増加であることを保証したマイルストーン列
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MilestoneList(Vec<Milestone>);

impl MilestoneList {
    pub fn new(milestones: Vec<Milestone>) -> Result<Self, String> {
        for pair in milestones.windows(2) {
            if pair[1].threshold <= pair[0].threshold {
                return Err(format!(
                    "Milestone thresholds must be strictly increasing: {} is not greater than {}",
                    pair[1].threshold, pair[0].threshold
                ));
            }
        }
        Ok(Self(milestones))
    }

    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        let milestones = pairs
            .into_iter()
            .map(|(threshold, label)| Milestone::new(threshold, label))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(milestones)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Milestone> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `count` 以上で到達できる次のマイルストーン
    pub fn next_after(&self, count: u32) -> Option<&Milestone> {
        self.0.iter().find(|m| !m.is_reached_by(count))
    }
}

impl<'de> Deserialize<'de> for MilestoneList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = Vec::<Milestone>::deserialize(deserializer)?;
        let raw = raw
            .into_iter()
            .map(|m| Milestone::new(m.threshold, m.label))
            .collect::<Result<Vec<_>, _>>()
            .map_err(serde::de::Error::custom)?;
        MilestoneList::new(raw).map_err(serde::de::Error::custom)
    }
}
