use crate::application::ports::DocumentSnapshot;
use crate::domain::entities::Answer;
use crate::domain::value_objects::VoterSet;
use crate::shared::error::AppError;
use serde_json::Value;
use tracing::warn;

const UPVOTES_FIELD: &str = "upvotes";

/// `upvotes` が配列でない（旧形式の件数など）場合は空集合として扱う。
/// 配列中の文字列以外の要素は読み飛ばす。
pub(crate) fn upvotes_from_document(data: &Value) -> VoterSet {
    match data.get(UPVOTES_FIELD) {
        Some(Value::Array(voters)) => voters.iter().filter_map(Value::as_str).collect(),
        _ => VoterSet::new(),
    }
}

pub(crate) fn answer_from_snapshot(snapshot: DocumentSnapshot) -> Result<Answer, AppError> {
    let upvotes = upvotes_from_document(&snapshot.data);
    let mut data = snapshot.data;
    if let Value::Object(fields) = &mut data {
        fields.remove(UPVOTES_FIELD);
    }
    let mut answer: Answer = serde_json::from_value(data)?;
    answer.id = snapshot.id;
    answer.upvotes = upvotes;
    Ok(answer)
}

pub(crate) fn answers_from_snapshots(snapshots: Vec<DocumentSnapshot>) -> Vec<Answer> {
    snapshots
        .into_iter()
        .filter_map(|snapshot| {
            let id = snapshot.id.clone();
            answer_from_snapshot(snapshot)
                .inspect_err(|err| warn!("Skipping malformed answer {}: {}", id, err))
                .ok()
        })
        .collect()
}

pub(crate) fn answer_to_document(answer: &Answer) -> Result<Value, AppError> {
    Ok(serde_json::to_value(answer)?)
}

/// トランザクション用: 現在の投票者集合で `uid` をトグルしたドキュメントを返す
pub(crate) fn toggle_upvote_in_document(
    current: Option<&Value>,
    uid: &str,
) -> Result<Value, AppError> {
    let Some(document @ Value::Object(fields)) = current else {
        return Err(AppError::NotFound("Answer".to_string()));
    };
    let voters = upvotes_from_document(document).toggled(uid);
    let mut next = fields.clone();
    next.insert(UPVOTES_FIELD.to_string(), serde_json::to_value(&voters)?);
    Ok(Value::Object(next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_numeric_upvotes_become_empty_set() {
        let snapshot = DocumentSnapshot::new(
            "a1",
            json!({"questionId": "q1", "text": "hi", "upvotes": 3}),
        );
        let answer = answer_from_snapshot(snapshot).unwrap();
        assert_eq!(answer.id, "a1");
        assert!(answer.upvotes.is_empty());
    }

    #[test]
    fn upvote_array_is_read_as_set() {
        let snapshot = DocumentSnapshot::new("a1", json!({"upvotes": ["u2", "u1", "u2"]}));
        let answer = answer_from_snapshot(snapshot).unwrap();
        assert_eq!(answer.upvote_count(), 2);
    }

    #[test]
    fn non_string_voters_are_skipped() {
        let snapshots = vec![DocumentSnapshot::new(
            "a1",
            json!({"questionId": "q1", "text": "hi", "upvotes": ["u1", 3, null, {"uid": "u2"}]}),
        )];
        let answers = answers_from_snapshots(snapshots);
        assert_eq!(answers.len(), 1);
        assert!(answers[0].is_upvoted_by("u1"));
        assert_eq!(answers[0].upvote_count(), 1);

        let document = json!({"questionId": "q1", "upvotes": ["u1", 7]});
        let toggled = toggle_upvote_in_document(Some(&document), "u2").unwrap();
        assert_eq!(toggled["upvotes"], json!(["u1", "u2"]));
    }

    #[test]
    fn toggle_in_document_is_idempotent_over_two_calls() {
        let original = json!({"questionId": "q1", "upvotes": ["u3"]});
        let once = toggle_upvote_in_document(Some(&original), "u2").unwrap();
        assert_eq!(once["upvotes"], json!(["u2", "u3"]));
        let twice = toggle_upvote_in_document(Some(&once), "u2").unwrap();
        assert_eq!(twice, original);
    }

    #[test]
    fn toggle_on_missing_answer_fails() {
        assert!(matches!(
            toggle_upvote_in_document(None, "u1"),
            Err(AppError::NotFound(_))
        ));
    }
}
