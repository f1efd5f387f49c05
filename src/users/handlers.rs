use anyhow::Context;
use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use bytes::Bytes;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::jwt::AuthUser;
use crate::auth::policy::{self, Action};
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::image_ext_from_mime;
use crate::users::dto::UserResponse;
use crate::users::repo::{self as repo, ProfileChanges, User};

const PRESIGN_TTL_SECS: u64 = 30 * 60;
const MAX_BIO_LEN: usize = 500;

pub async fn present_user(state: &AppState, user: User) -> anyhow::Result<UserResponse> {
    let profile_image = match &user.profile_image_key {
        Some(key) => Some(state.storage.presign_get(key, PRESIGN_TTL_SECS).await?),
        None => None,
    };
    let resume_url = match &user.resume_key {
        Some(key) => Some(state.storage.presign_get(key, PRESIGN_TTL_SECS).await?),
        None => None,
    };
    let role = user.role();
    Ok(UserResponse {
        id: user.id,
        email: user.email,
        name: user.name,
        username: user.username,
        bio: user.bio,
        linkedin: user.linkedin,
        github: user.github,
        portfolio: user.portfolio,
        twitter: user.twitter,
        profile_picture_url: user.profile_picture_url,
        profile_image,
        resume_url,
        role,
        created_at: user.created_at,
    })
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = repo::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(Json(present_user(&state, user).await?))
}

#[instrument(skip(state, mp))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> Result<Json<UserResponse>, ApiError> {
    let current = repo::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    let mut changes = ProfileChanges::default();
    let mut profile_image: Option<(Bytes, String)> = None;
    let mut resume: Option<(Bytes, String, &'static str)> = None;

    while let Ok(Some(field)) = mp.next_field().await {
        let Some(name) = field.name().map(|s| s.to_string()) else {
            continue;
        };
        match name.as_str() {
            "profileImage" => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let bytes = field.bytes().await.map_err(malformed)?;
                if !bytes.is_empty() {
                    profile_image = Some((bytes, content_type));
                }
            }
            "resume" => {
                let file_name = field.file_name().map(|s| s.to_string()).unwrap_or_default();
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let bytes = field.bytes().await.map_err(malformed)?;
                if !bytes.is_empty() {
                    let ext = resume_ext(&file_name).ok_or_else(|| {
                        ApiError::Validation("Resume must be a PDF, DOC, or DOCX file".into())
                    })?;
                    resume = Some((bytes, content_type, ext));
                }
            }
            _ => {
                let value = field.text().await.map_err(malformed)?;
                set_text_field(&mut changes, &name, value);
            }
        }
    }

    if let Some(bio) = &changes.bio {
        if bio.chars().count() > MAX_BIO_LEN {
            return Err(ApiError::Validation(
                "Bio must be 500 characters or fewer".into(),
            ));
        }
    }

    if let Some(username) = &changes.username {
        if current.username.as_deref() != Some(username.as_str())
            && repo::find_by_username(&state.db, username).await?.is_some()
        {
            return Err(ApiError::Conflict("Username already taken".into()));
        }
    }

    if let Some((bytes, content_type)) = profile_image {
        let ext = image_ext_from_mime(&content_type).ok_or_else(|| {
            ApiError::Validation("Profile image must be a JPEG, PNG, WEBP or GIF image".into())
        })?;
        let key = format!("profiles/{}/{}.{}", user_id, Uuid::new_v4(), ext);
        state
            .storage
            .put_object(&key, bytes, &content_type)
            .await
            .context("upload profile image")?;
        changes.profile_image_key = Some(key);
    }

    if let Some((bytes, content_type, ext)) = resume {
        let key = format!("resumes/{}/{}.{}", user_id, Uuid::new_v4(), ext);
        state
            .storage
            .put_object(&key, bytes, &content_type)
            .await
            .context("upload resume")?;
        changes.resume_key = Some(key);
    }

    let updated = repo::update_profile(&state.db, user_id, &changes).await?;

    // Release the files the update replaced. An orphaned object is only
    // worth a warning, never a failed profile edit.
    if changes.profile_image_key.is_some() {
        if let Some(old) = &current.profile_image_key {
            if let Err(e) = state.storage.delete_object(old).await {
                warn!(error = %e, key = %old, "failed to delete replaced profile image");
            }
        }
    }
    if changes.resume_key.is_some() {
        if let Some(old) = &current.resume_key {
            if let Err(e) = state.storage.delete_object(old).await {
                warn!(error = %e, key = %old, "failed to delete replaced resume");
            }
        }
    }

    info!(user_id = %user_id, "profile updated");
    Ok(Json(present_user(&state, updated).await?))
}

/// Teacher-only view of a student's profile.
#[instrument(skip(state))]
pub async fn student_profile(
    State(state): State<AppState>,
    AuthUser(actor_id): AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>, ApiError> {
    let actor = repo::find_by_id(&state.db, actor_id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    policy::authorize(actor.role(), Action::ViewStudentProfile)?;

    let student = repo::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::NotFound("Student"))?;
    Ok(Json(present_user(&state, student).await?))
}

fn malformed(_: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::Validation("Malformed multipart body".into())
}

fn set_text_field(changes: &mut ProfileChanges, name: &str, value: String) {
    let Some(value) = non_empty(value) else {
        return;
    };
    match name {
        // `fullName` is what older profile forms still send.
        "name" | "fullName" => changes.name = Some(value),
        "username" => changes.username = Some(value),
        "bio" => changes.bio = Some(value),
        "linkedin" => changes.linkedin = Some(value),
        "github" => changes.github = Some(value),
        "portfolio" => changes.portfolio = Some(value),
        "twitter" => changes.twitter = Some(value),
        _ => {}
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn resume_ext(file_name: &str) -> Option<&'static str> {
    let lower = file_name.to_lowercase();
    if lower.ends_with(".pdf") {
        Some("pdf")
    } else if lower.ends_with(".docx") {
        Some("docx")
    } else if lower.ends_with(".doc") {
        Some("doc")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_ext_accepts_documents_only() {
        assert_eq!(resume_ext("cv.pdf"), Some("pdf"));
        assert_eq!(resume_ext("CV.PDF"), Some("pdf"));
        assert_eq!(resume_ext("resume.doc"), Some("doc"));
        assert_eq!(resume_ext("resume.docx"), Some("docx"));
        assert_eq!(resume_ext("resume.exe"), None);
        assert_eq!(resume_ext("resume"), None);
    }

    #[test]
    fn text_fields_accept_legacy_full_name() {
        let mut changes = ProfileChanges::default();
        set_text_field(&mut changes, "fullName", "Sam Doe".into());
        assert_eq!(changes.name.as_deref(), Some("Sam Doe"));
    }

    #[test]
    fn empty_text_fields_mean_no_change() {
        let mut changes = ProfileChanges::default();
        set_text_field(&mut changes, "bio", "   ".into());
        assert!(changes.bio.is_none());
    }

    #[test]
    fn unknown_text_fields_are_ignored() {
        let mut changes = ProfileChanges::default();
        set_text_field(&mut changes, "role", "teacher".into());
        assert_eq!(changes, ProfileChanges::default());
    }
}
