use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Coarse permission class gating teacher-only actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
        }
    }

    /// Rows store the role as text; anything unexpected degrades to the
    /// least-privileged role.
    pub fn parse(s: &str) -> Role {
        match s {
            "teacher" => Role::Teacher,
            _ => Role::Student,
        }
    }
}

/// User record in the database. The password hash never serializes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: Option<String>,
    pub username: Option<String>,
    pub bio: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub portfolio: Option<String>,
    pub twitter: Option<String>,
    pub profile_picture_url: Option<String>,
    pub profile_image_key: Option<String>,
    pub resume_key: Option<String>,
    pub role: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    pub fn role(&self) -> Role {
        Role::parse(&self.role)
    }
}

const USER_COLS: &str = "id, email, password_hash, name, username, bio, linkedin, github, \
     portfolio, twitter, profile_picture_url, profile_image_key, resume_key, role, \
     created_at, updated_at";

pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
    let sql = format!("SELECT {USER_COLS} FROM users WHERE email = $1");
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(email)
        .fetch_optional(db)
        .await
        .context("find user by email")?;
    Ok(user)
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
    let sql = format!("SELECT {USER_COLS} FROM users WHERE id = $1");
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find user by id")?;
    Ok(user)
}

pub async fn find_by_username(db: &PgPool, username: &str) -> anyhow::Result<Option<User>> {
    let sql = format!("SELECT {USER_COLS} FROM users WHERE username = $1");
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(username)
        .fetch_optional(db)
        .await
        .context("find user by username")?;
    Ok(user)
}

pub async fn create(
    db: &PgPool,
    email: &str,
    password_hash: &str,
    name: Option<&str>,
    role: Role,
) -> anyhow::Result<User> {
    let sql = format!(
        "INSERT INTO users (email, password_hash, name, role) \
         VALUES ($1, $2, $3, $4) \
         RETURNING {USER_COLS}"
    );
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(email)
        .bind(password_hash)
        .bind(name)
        .bind(role.as_str())
        .fetch_one(db)
        .await
        .context("create user")?;
    Ok(user)
}

/// Refresh name and avatar from the Google profile on a returning OAuth
/// login. Fields the profile does not carry are left untouched.
pub async fn update_google_profile(
    db: &PgPool,
    id: Uuid,
    name: Option<&str>,
    picture_url: Option<&str>,
) -> anyhow::Result<User> {
    let sql = format!(
        "UPDATE users \
            SET name = COALESCE($2, name), \
                profile_picture_url = COALESCE($3, profile_picture_url), \
                updated_at = now() \
          WHERE id = $1 \
      RETURNING {USER_COLS}"
    );
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .bind(name)
        .bind(picture_url)
        .fetch_one(db)
        .await
        .context("update google profile")?;
    Ok(user)
}

/// Profile edit payload; `None` means "leave as is".
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub username: Option<String>,
    pub bio: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub portfolio: Option<String>,
    pub twitter: Option<String>,
    pub profile_image_key: Option<String>,
    pub resume_key: Option<String>,
}

pub async fn update_profile(
    db: &PgPool,
    id: Uuid,
    changes: &ProfileChanges,
) -> anyhow::Result<User> {
    let sql = format!(
        "UPDATE users \
            SET name = COALESCE($2, name), \
                username = COALESCE($3, username), \
                bio = COALESCE($4, bio), \
                linkedin = COALESCE($5, linkedin), \
                github = COALESCE($6, github), \
                portfolio = COALESCE($7, portfolio), \
                twitter = COALESCE($8, twitter), \
                profile_image_key = COALESCE($9, profile_image_key), \
                resume_key = COALESCE($10, resume_key), \
                updated_at = now() \
          WHERE id = $1 \
      RETURNING {USER_COLS}"
    );
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.username.as_deref())
        .bind(changes.bio.as_deref())
        .bind(changes.linkedin.as_deref())
        .bind(changes.github.as_deref())
        .bind(changes.portfolio.as_deref())
        .bind(changes.twitter.as_deref())
        .bind(changes.profile_image_key.as_deref())
        .bind(changes.resume_key.as_deref())
        .fetch_one(db)
        .await
        .context("update profile")?;
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_known_values() {
        assert_eq!(Role::parse("teacher"), Role::Teacher);
        assert_eq!(Role::parse("student"), Role::Student);
    }

    #[test]
    fn unknown_role_degrades_to_student() {
        assert_eq!(Role::parse("admin"), Role::Student);
        assert_eq!(Role::parse(""), Role::Student);
    }

    #[test]
    fn role_round_trips_through_as_str() {
        for role in [Role::Student, Role::Teacher] {
            assert_eq!(Role::parse(role.as_str()), role);
        }
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Teacher).unwrap(), "\"teacher\"");
        assert_eq!(serde_json::to_string(&Role::Student).unwrap(), "\"student\"");
    }

    #[test]
    fn password_hash_never_serializes() {
        let user = User {
            id: Uuid::new_v4(),
            email: "a@b.co".into(),
            password_hash: "$argon2id$secret".into(),
            name: None,
            username: None,
            bio: None,
            linkedin: None,
            github: None,
            portfolio: None,
            twitter: None,
            profile_picture_url: None,
            profile_image_key: None,
            resume_key: None,
            role: "student".into(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("password_hash"));
    }
}
