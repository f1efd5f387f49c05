use anyhow::Context;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteKind {
    Up,
    Down,
}

impl VoteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteKind::Up => "up",
            VoteKind::Down => "down",
        }
    }
}

/// What a toggle actually did, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Same-direction vote existed and was removed.
    Cleared,
    /// Vote recorded, replacing any opposite-direction vote.
    Set(VoteKind),
}

/// Project row with the owner joined in and both voter sets attached.
/// Counts are derived from the sets, never stored.
#[derive(Debug, Clone, FromRow)]
pub struct ProjectRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: String,
    pub tech: String,
    pub project_url: String,
    pub github_url: Option<String>,
    pub screenshot_key: Option<String>,
    pub created_at: OffsetDateTime,
    pub owner_name: Option<String>,
    pub owner_image_key: Option<String>,
    pub owner_picture_url: Option<String>,
    pub upvoted_by: Vec<Uuid>,
    pub downvoted_by: Vec<Uuid>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CommentRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub body: String,
    pub created_at: OffsetDateTime,
    pub author_name: Option<String>,
}

const PROJECT_SELECT: &str = "SELECT p.id, p.user_id, p.name, p.description, p.tech, \
        p.project_url, p.github_url, p.screenshot_key, p.created_at, \
        u.name AS owner_name, \
        u.profile_image_key AS owner_image_key, \
        u.profile_picture_url AS owner_picture_url, \
        ARRAY(SELECT v.user_id FROM project_votes v \
               WHERE v.project_id = p.id AND v.direction = 'up') AS upvoted_by, \
        ARRAY(SELECT v.user_id FROM project_votes v \
               WHERE v.project_id = p.id AND v.direction = 'down') AS downvoted_by \
   FROM projects p \
   JOIN users u ON u.id = p.user_id";

pub struct NewProjectRecord<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub tech: &'a str,
    pub project_url: &'a str,
    pub github_url: Option<&'a str>,
    pub screenshot_key: &'a str,
}

pub async fn insert(db: &PgPool, owner: Uuid, new: &NewProjectRecord<'_>) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO projects (user_id, name, description, tech, project_url, github_url, screenshot_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(owner)
    .bind(new.name)
    .bind(new.description)
    .bind(new.tech)
    .bind(new.project_url)
    .bind(new.github_url)
    .bind(new.screenshot_key)
    .fetch_one(db)
    .await
    .context("insert project")?;
    Ok(id)
}

pub async fn list_by_owner(db: &PgPool, owner: Uuid) -> anyhow::Result<Vec<ProjectRow>> {
    let sql = format!("{PROJECT_SELECT} WHERE p.user_id = $1 ORDER BY p.created_at DESC");
    let rows = sqlx::query_as::<_, ProjectRow>(&sql)
        .bind(owner)
        .fetch_all(db)
        .await
        .context("list projects by owner")?;
    Ok(rows)
}

pub async fn list_all(db: &PgPool) -> anyhow::Result<Vec<ProjectRow>> {
    let sql = format!("{PROJECT_SELECT} ORDER BY p.created_at DESC");
    let rows = sqlx::query_as::<_, ProjectRow>(&sql)
        .fetch_all(db)
        .await
        .context("list all projects")?;
    Ok(rows)
}

pub async fn get(db: &PgPool, id: Uuid) -> anyhow::Result<Option<ProjectRow>> {
    let sql = format!("{PROJECT_SELECT} WHERE p.id = $1");
    let row = sqlx::query_as::<_, ProjectRow>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
        .context("get project")?;
    Ok(row)
}

pub async fn exists(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let found: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM projects WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
        .context("project exists")?;
    Ok(found.is_some())
}

/// Votes and comments go with the project via ON DELETE CASCADE.
pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM projects WHERE id = $1")
        .bind(id)
        .execute(db)
        .await
        .context("delete project")?;
    Ok(())
}

/// Toggle-policy vote as an atomic set-membership update. The
/// conditional DELETE clears a same-direction vote; otherwise the
/// UPSERT on the (project_id, user_id) key records the new direction,
/// replacing an opposite-direction row. The primary key keeps a user
/// out of both sets at once no matter how requests interleave.
pub async fn toggle_vote(
    db: &PgPool,
    project_id: Uuid,
    user_id: Uuid,
    kind: VoteKind,
) -> anyhow::Result<VoteOutcome> {
    let mut tx = db.begin().await.context("begin vote tx")?;

    let cleared = sqlx::query(
        "DELETE FROM project_votes WHERE project_id = $1 AND user_id = $2 AND direction = $3",
    )
    .bind(project_id)
    .bind(user_id)
    .bind(kind.as_str())
    .execute(&mut *tx)
    .await
    .context("clear same-direction vote")?;

    let outcome = if cleared.rows_affected() > 0 {
        VoteOutcome::Cleared
    } else {
        sqlx::query(
            r#"
            INSERT INTO project_votes (project_id, user_id, direction)
            VALUES ($1, $2, $3)
            ON CONFLICT (project_id, user_id) DO UPDATE SET direction = EXCLUDED.direction
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .bind(kind.as_str())
        .execute(&mut *tx)
        .await
        .context("set vote")?;
        VoteOutcome::Set(kind)
    };

    tx.commit().await.context("commit vote tx")?;
    Ok(outcome)
}

pub async fn insert_comment(
    db: &PgPool,
    project_id: Uuid,
    user_id: Uuid,
    body: &str,
) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO project_comments (project_id, user_id, body)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(project_id)
    .bind(user_id)
    .bind(body)
    .fetch_one(db)
    .await
    .context("insert comment")?;
    Ok(id)
}

pub async fn comment_author(
    db: &PgPool,
    project_id: Uuid,
    comment_id: Uuid,
) -> anyhow::Result<Option<Uuid>> {
    let row: Option<(Uuid,)> = sqlx::query_as(
        "SELECT user_id FROM project_comments WHERE id = $1 AND project_id = $2",
    )
    .bind(comment_id)
    .bind(project_id)
    .fetch_optional(db)
    .await
    .context("find comment author")?;
    Ok(row.map(|(id,)| id))
}

pub async fn delete_comment(db: &PgPool, project_id: Uuid, comment_id: Uuid) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM project_comments WHERE id = $1 AND project_id = $2")
        .bind(comment_id)
        .bind(project_id)
        .execute(db)
        .await
        .context("delete comment")?;
    Ok(())
}

/// Comments for a set of projects, newest first, with author names.
pub async fn comments_for(db: &PgPool, project_ids: &[Uuid]) -> anyhow::Result<Vec<CommentRow>> {
    if project_ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = sqlx::query_as::<_, CommentRow>(
        r#"
        SELECT c.id, c.project_id, c.user_id, c.body, c.created_at,
               u.name AS author_name
          FROM project_comments c
          JOIN users u ON u.id = c.user_id
         WHERE c.project_id = ANY($1)
         ORDER BY c.created_at DESC
        "#,
    )
    .bind(project_ids)
    .fetch_all(db)
    .await
    .context("list comments")?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_kind_maps_to_direction_column() {
        assert_eq!(VoteKind::Up.as_str(), "up");
        assert_eq!(VoteKind::Down.as_str(), "down");
    }

    #[test]
    fn vote_outcomes_are_distinct() {
        assert_ne!(VoteOutcome::Cleared, VoteOutcome::Set(VoteKind::Up));
        assert_ne!(VoteOutcome::Set(VoteKind::Up), VoteOutcome::Set(VoteKind::Down));
    }
}
