use std::collections::HashMap;

use anyhow::Context;
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;
use crate::projects::dto::{
    CommentAuthor, CommentResponse, NewProject, ProjectOwner, ProjectResponse,
};
use crate::projects::repo::{self as repo, CommentRow, ProjectRow};
use crate::state::AppState;
use crate::storage::image_ext_from_mime;

const PRESIGN_TTL_SECS: u64 = 30 * 60;

/// Upload the screenshot, then record the project. A failed insert can
/// orphan the uploaded object; that is only worth a warning, the
/// request still fails.
pub async fn create_with_screenshot(
    state: &AppState,
    user_id: Uuid,
    new: NewProject,
) -> Result<Uuid, ApiError> {
    let ext = image_ext_from_mime(&new.screenshot.content_type).ok_or_else(|| {
        ApiError::Validation("Screenshot must be a JPEG, PNG, WEBP or GIF image".into())
    })?;
    let key = format!("projects/{}/{}.{}", user_id, Uuid::new_v4(), ext);
    state
        .storage
        .put_object(&key, new.screenshot.bytes, &new.screenshot.content_type)
        .await
        .with_context(|| format!("upload screenshot {key}"))?;

    let record = repo::NewProjectRecord {
        name: &new.name,
        description: &new.description,
        tech: new.tech.as_str(),
        project_url: &new.project_url,
        github_url: new.github_url.as_deref(),
        screenshot_key: &key,
    };
    let id = match repo::insert(&state.db, user_id, &record).await {
        Ok(id) => id,
        Err(e) => {
            warn!(key = %key, "project insert failed after screenshot upload");
            return Err(e.into());
        }
    };
    Ok(id)
}

/// Resolve rows into client responses: voter-set cardinalities as the
/// counts, comments grouped per project, stored keys presigned.
pub async fn present_projects(
    state: &AppState,
    rows: Vec<ProjectRow>,
) -> anyhow::Result<Vec<ProjectResponse>> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let comments = repo::comments_for(&state.db, &ids).await?;

    let mut grouped: HashMap<Uuid, Vec<CommentResponse>> = HashMap::new();
    for comment in comments {
        grouped
            .entry(comment.project_id)
            .or_default()
            .push(present_comment(comment));
    }

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let screenshot_url = match &row.screenshot_key {
            Some(key) => Some(state.storage.presign_get(key, PRESIGN_TTL_SECS).await?),
            None => None,
        };
        // Prefer the uploaded profile image; fall back to the external
        // avatar URL from OAuth.
        let owner_image = match &row.owner_image_key {
            Some(key) => Some(state.storage.presign_get(key, PRESIGN_TTL_SECS).await?),
            None => row.owner_picture_url.clone(),
        };
        let comments = grouped.remove(&row.id).unwrap_or_default();
        out.push(assemble(row, screenshot_url, owner_image, comments));
    }
    Ok(out)
}

/// Pure row-to-response mapping; counts are the voter-set sizes.
fn assemble(
    row: ProjectRow,
    screenshot_url: Option<String>,
    owner_image: Option<String>,
    comments: Vec<CommentResponse>,
) -> ProjectResponse {
    ProjectResponse {
        id: row.id,
        user: ProjectOwner {
            id: row.user_id,
            name: row.owner_name,
            profile_image: owner_image,
        },
        project_name: row.name,
        project_description: row.description,
        tech_used: row.tech,
        project_url: row.project_url,
        github_url: row.github_url,
        screenshot_url,
        upvotes: row.upvoted_by.len(),
        downvotes: row.downvoted_by.len(),
        upvoted_by: row.upvoted_by,
        downvoted_by: row.downvoted_by,
        comments,
        created_at: row.created_at,
    }
}

pub async fn present_project(state: &AppState, row: ProjectRow) -> anyhow::Result<ProjectResponse> {
    let mut presented = present_projects(state, vec![row]).await?;
    presented
        .pop()
        .context("present_project lost its only row")
}

pub fn present_comment(comment: CommentRow) -> CommentResponse {
    CommentResponse {
        id: comment.id,
        user: CommentAuthor {
            id: comment.user_id,
            name: comment.author_name,
        },
        text: comment.body,
        created_at: comment.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn row(id: Uuid, upvoters: Vec<Uuid>, downvoters: Vec<Uuid>) -> ProjectRow {
        ProjectRow {
            id,
            user_id: Uuid::new_v4(),
            name: "Pathfinder".into(),
            description: "A* visualizer".into(),
            tech: "web-development".into(),
            project_url: "https://pathfinder.example".into(),
            github_url: None,
            screenshot_key: Some("projects/abc/shot.png".into()),
            created_at: OffsetDateTime::UNIX_EPOCH,
            owner_name: Some("Sam".into()),
            owner_image_key: None,
            owner_picture_url: Some("https://lh3.example/avatar".into()),
            upvoted_by: upvoters,
            downvoted_by: downvoters,
        }
    }

    #[test]
    fn counts_equal_set_cardinality() {
        let voters = vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let downvoter = Uuid::new_v4();
        let resp = assemble(
            row(Uuid::new_v4(), voters.clone(), vec![downvoter]),
            None,
            None,
            Vec::new(),
        );
        assert_eq!(resp.upvotes, 3);
        assert_eq!(resp.downvotes, 1);
        assert_eq!(resp.upvoted_by, voters);
        assert_eq!(resp.downvoted_by, vec![downvoter]);
    }

    #[test]
    fn owner_avatar_prefers_uploaded_image() {
        let resp = assemble(
            row(Uuid::new_v4(), vec![], vec![]),
            Some("https://store.example/shot".into()),
            Some("https://store.example/presigned-avatar".into()),
            Vec::new(),
        );
        assert_eq!(
            resp.user.profile_image.as_deref(),
            Some("https://store.example/presigned-avatar")
        );
        assert_eq!(
            resp.screenshot_url.as_deref(),
            Some("https://store.example/shot")
        );
    }

    #[test]
    fn comment_mapping_keeps_author_identity() {
        let author = Uuid::new_v4();
        let mapped = present_comment(CommentRow {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            user_id: author,
            body: "nice work".into(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            author_name: Some("Prof".into()),
        });
        assert_eq!(mapped.text, "nice work");
        assert_eq!(mapped.user.id, author);
        assert_eq!(mapped.user.name.as_deref(), Some("Prof"));
    }
}
