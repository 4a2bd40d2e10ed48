use crate::application::ports::DocumentSnapshot;
use crate::domain::entities::UserProfile;
use crate::shared::error::AppError;
use serde_json::Value;

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn profile_from_snapshot(snapshot: DocumentSnapshot) -> Result<UserProfile, AppError> {
    let mut profile: UserProfile = serde_json::from_value(snapshot.data)?;
    if profile.uid.is_empty() {
        profile.uid = snapshot.id;
    }
    Ok(profile)
}

pub(crate) fn profile_to_document(profile: &UserProfile) -> Result<Value, AppError> {
    Ok(serde_json::to_value(profile)?)
}
