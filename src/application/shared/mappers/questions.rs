use crate::application::ports::DocumentSnapshot;
use crate::domain::entities::Question;
use crate::shared::error::AppError;
use serde_json::Value;
use tracing::warn;

pub(crate) fn question_from_snapshot(snapshot: DocumentSnapshot) -> Result<Question, AppError> {
    let mut question: Question = serde_json::from_value(snapshot.data)?;
    question.id = snapshot.id;
    Ok(question)
}

/// 変換できないドキュメントは読み飛ばす
pub(crate) fn questions_from_snapshots(snapshots: Vec<DocumentSnapshot>) -> Vec<Question> {
    snapshots
        .into_iter()
        .filter_map(|snapshot| {
            let id = snapshot.id.clone();
            question_from_snapshot(snapshot)
                .inspect_err(|err| warn!("Skipping malformed question {}: {}", id, err))
                .ok()
        })
        .collect()
}

pub(crate) fn question_to_document(question: &Question) -> Result<Value, AppError> {
    Ok(serde_json::to_value(question)?)
}

/// トランザクション用: `answersCount` を 1 増やしたドキュメントを返す
pub(crate) fn increment_answers_count(current: Option<&Value>) -> Result<Value, AppError> {
    let Some(Value::Object(fields)) = current else {
        return Err(AppError::NotFound("Question".to_string()));
    };
    let count = fields
        .get("answersCount")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let mut next = fields.clone();
    next.insert("answersCount".to_string(), Value::from(count + 1));
    Ok(Value::Object(next))
}
