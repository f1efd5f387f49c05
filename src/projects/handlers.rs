use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::auth::jwt::AuthUser;
use crate::auth::policy::{self, Action};
use crate::error::ApiError;
use crate::projects::dto::{
    CommentRequest, CommentResponse, CreateProjectForm, DeleteResponse, ProjectResponse,
    UploadedFile, validate_comment,
};
use crate::projects::repo::{self as repo, VoteKind};
use crate::projects::services;
use crate::state::AppState;
use crate::users::repo as users;

/// POST /api/projects (multipart: projectName, projectDescription,
/// techUsed, projectUrl, githubUrl?, screenshot)
#[instrument(skip(state, mp))]
pub async fn create_project(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> Result<(StatusCode, Json<ProjectResponse>), ApiError> {
    let mut form = CreateProjectForm::default();
    while let Ok(Some(field)) = mp.next_field().await {
        let Some(name) = field.name().map(|s| s.to_string()) else {
            continue;
        };
        if name == "screenshot" {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "application/octet-stream".into());
            let bytes = field.bytes().await.map_err(malformed)?;
            if !bytes.is_empty() {
                form.screenshot = Some(UploadedFile {
                    bytes,
                    content_type,
                });
            }
        } else {
            let value = field.text().await.map_err(malformed)?;
            form.set_field(&name, value);
        }
    }

    let new = form.finish()?;
    let id = services::create_with_screenshot(&state, user_id, new).await?;

    let row = repo::get(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;
    let resp = services::present_project(&state, row).await?;

    info!(project_id = %id, user_id = %user_id, "project created");
    Ok((StatusCode::CREATED, Json(resp)))
}

/// GET /api/projects: the caller's own projects, newest first.
#[instrument(skip(state))]
pub async fn list_own(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<ProjectResponse>>, ApiError> {
    let rows = repo::list_by_owner(&state.db, user_id).await?;
    Ok(Json(services::present_projects(&state, rows).await?))
}

/// GET /api/projects/community (alias /all): everyone's projects with
/// owner name and avatar joined in.
#[instrument(skip(state))]
pub async fn list_community(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
) -> Result<Json<Vec<ProjectResponse>>, ApiError> {
    let rows = repo::list_all(&state.db).await?;
    Ok(Json(services::present_projects(&state, rows).await?))
}

#[instrument(skip(state))]
pub async fn get_project(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ProjectResponse>, ApiError> {
    let row = repo::get(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;
    Ok(Json(services::present_project(&state, row).await?))
}

/// DELETE /api/projects/:id, owner only; releases the screenshot too.
#[instrument(skip(state))]
pub async fn delete_project(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let row = repo::get(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;
    policy::ensure_owner(row.user_id, user_id, "You can only delete your own projects")?;

    repo::delete(&state.db, id).await?;

    if let Some(key) = &row.screenshot_key {
        if let Err(e) = state.storage.delete_object(key).await {
            warn!(error = %e, key = %key, "failed to delete screenshot object");
        }
    }

    info!(project_id = %id, user_id = %user_id, "project deleted");
    Ok(Json(DeleteResponse {
        message: "Project removed".into(),
    }))
}

pub async fn upvote(
    state: State<AppState>,
    auth: AuthUser,
    id: Path<Uuid>,
) -> Result<Json<ProjectResponse>, ApiError> {
    vote(state, auth, id, VoteKind::Up).await
}

pub async fn downvote(
    state: State<AppState>,
    auth: AuthUser,
    id: Path<Uuid>,
) -> Result<Json<ProjectResponse>, ApiError> {
    vote(state, auth, id, VoteKind::Down).await
}

#[instrument(skip(state))]
async fn vote(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    kind: VoteKind,
) -> Result<Json<ProjectResponse>, ApiError> {
    if !repo::exists(&state.db, id).await? {
        return Err(ApiError::NotFound("Project"));
    }

    let outcome = repo::toggle_vote(&state.db, id, user_id, kind).await?;
    debug!(project_id = %id, user_id = %user_id, ?outcome, "vote toggled");

    let row = repo::get(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;
    Ok(Json(services::present_project(&state, row).await?))
}

/// POST /api/projects/:id/comment, teacher only.
#[instrument(skip(state, body))]
pub async fn add_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<CommentRequest>,
) -> Result<(StatusCode, Json<ProjectResponse>), ApiError> {
    if !repo::exists(&state.db, id).await? {
        return Err(ApiError::NotFound("Project"));
    }

    let actor = users::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    policy::authorize(actor.role(), Action::PostComment)?;

    let text = validate_comment(&body.text)?;
    let comment_id = repo::insert_comment(&state.db, id, user_id, text).await?;
    debug!(project_id = %id, comment_id = %comment_id, "comment added");

    let row = repo::get(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;
    Ok((
        StatusCode::CREATED,
        Json(services::present_project(&state, row).await?),
    ))
}

/// DELETE /api/projects/:id/comment/:comment_id, author only; returns
/// the comments that remain.
#[instrument(skip(state))]
pub async fn delete_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((id, comment_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Vec<CommentResponse>>, ApiError> {
    let author = repo::comment_author(&state.db, id, comment_id)
        .await?
        .ok_or(ApiError::NotFound("Comment"))?;
    policy::ensure_owner(author, user_id, "You can only delete your own comments")?;

    repo::delete_comment(&state.db, id, comment_id).await?;
    info!(project_id = %id, comment_id = %comment_id, "comment deleted");

    let remaining = repo::comments_for(&state.db, &[id])
        .await?
        .into_iter()
        .map(services::present_comment)
        .collect();
    Ok(Json(remaining))
}

fn malformed(_: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::Validation("Malformed multipart body".into())
}
