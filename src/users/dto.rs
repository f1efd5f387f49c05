use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::repo::Role;

/// User as clients see it: everything except the password hash, with
/// stored file keys already resolved to presigned URLs.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub username: Option<String>,
    pub bio: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub portfolio: Option<String>,
    pub twitter: Option<String>,
    pub profile_picture_url: Option<String>,
    pub profile_image: Option<String>,
    pub resume_url: Option<String>,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_response_is_camel_case_and_has_no_password() {
        let resp = UserResponse {
            id: Uuid::new_v4(),
            email: "s@example.com".into(),
            name: Some("Sam".into()),
            username: None,
            bio: None,
            linkedin: None,
            github: None,
            portfolio: None,
            twitter: None,
            profile_picture_url: Some("https://lh3.example/avatar".into()),
            profile_image: None,
            resume_url: None,
            role: Role::Student,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"profilePictureUrl\""));
        assert!(json.contains("\"createdAt\":\"1970-01-01T00:00:00Z\""));
        assert!(!json.contains("password"));
    }
}
