//! 活動件数からバッジ集合を導出する純粋関数群。

use crate::domain::entities::{Badge, BadgeKind, BadgeSet};
use crate::domain::value_objects::MilestoneList;

/// 質問数・回答数とマイルストーン列から獲得済みバッジを求める。
///
/// 上位の閾値に到達しても下位のバッジは残る（累積）。
pub fn evaluate(
    question_count: u32,
    answer_count: u32,
    question_milestones: &MilestoneList,
    answer_milestones: &MilestoneList,
) -> BadgeSet {
    let questions = reached(BadgeKind::Question, question_count, question_milestones);
    let answers = reached(BadgeKind::Answer, answer_count, answer_milestones);
    questions.chain(answers).collect()
}

fn reached(
    kind: BadgeKind,
    count: u32,
    milestones: &MilestoneList,
) -> impl Iterator<Item = Badge> + '_ {
    milestones
        .iter()
        .filter(move |m| m.is_reached_by(count))
        .map(move |m| Badge::new(kind, m.threshold(), m.label()))
}
