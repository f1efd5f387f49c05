use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiError;

pub const MAX_COMMENT_LEN: usize = 1000;

/// Fixed technology category set. Stored as the kebab-case string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Technology {
    WebDevelopment,
    AndroidDevelopment,
    IosDevelopment,
    AiMl,
    DataScience,
    Blockchain,
    GameDevelopment,
    DesktopApp,
    Devops,
    Cybersecurity,
    Iot,
    Other,
}

impl Technology {
    pub const ALL: [Technology; 12] = [
        Technology::WebDevelopment,
        Technology::AndroidDevelopment,
        Technology::IosDevelopment,
        Technology::AiMl,
        Technology::DataScience,
        Technology::Blockchain,
        Technology::GameDevelopment,
        Technology::DesktopApp,
        Technology::Devops,
        Technology::Cybersecurity,
        Technology::Iot,
        Technology::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Technology::WebDevelopment => "web-development",
            Technology::AndroidDevelopment => "android-development",
            Technology::IosDevelopment => "ios-development",
            Technology::AiMl => "ai-ml",
            Technology::DataScience => "data-science",
            Technology::Blockchain => "blockchain",
            Technology::GameDevelopment => "game-development",
            Technology::DesktopApp => "desktop-app",
            Technology::Devops => "devops",
            Technology::Cybersecurity => "cybersecurity",
            Technology::Iot => "iot",
            Technology::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Technology> {
        Technology::ALL.iter().copied().find(|t| t.as_str() == s)
    }
}

/// A file pulled out of a multipart request.
#[derive(Debug)]
pub struct UploadedFile {
    pub bytes: Bytes,
    pub content_type: String,
}

/// Accumulates multipart fields for project creation. Legacy clients
/// send `title`/`description`; both spellings land on the same
/// canonical field here and nowhere else.
#[derive(Debug, Default)]
pub struct CreateProjectForm {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tech: Option<String>,
    pub project_url: Option<String>,
    pub github_url: Option<String>,
    pub screenshot: Option<UploadedFile>,
}

impl CreateProjectForm {
    pub fn set_field(&mut self, name: &str, value: String) {
        let Some(value) = non_empty(value) else {
            return;
        };
        match name {
            "projectName" => self.name = Some(value),
            "projectDescription" => self.description = Some(value),
            // Legacy aliases; the canonical spelling wins if both arrive.
            "title" => {
                if self.name.is_none() {
                    self.name = Some(value);
                }
            }
            "description" => {
                if self.description.is_none() {
                    self.description = Some(value);
                }
            }
            "techUsed" => self.tech = Some(value),
            "projectUrl" => self.project_url = Some(value),
            "githubUrl" => self.github_url = Some(value),
            _ => {}
        }
    }

    /// Validates the accumulated fields into the canonical creation
    /// payload, listing every missing field in one error.
    pub fn finish(self) -> Result<NewProject, ApiError> {
        let mut missing = Vec::new();
        if self.name.is_none() {
            missing.push("projectName");
        }
        if self.description.is_none() {
            missing.push("projectDescription");
        }
        if self.tech.is_none() {
            missing.push("techUsed");
        }
        if self.project_url.is_none() {
            missing.push("projectUrl");
        }
        if self.screenshot.is_none() {
            missing.push("screenshot");
        }
        if !missing.is_empty() {
            return Err(ApiError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        let tech = Technology::parse(self.tech.as_deref().unwrap_or("")).ok_or_else(|| {
            let allowed: Vec<&str> = Technology::ALL.iter().map(|t| t.as_str()).collect();
            ApiError::Validation(format!("techUsed must be one of: {}", allowed.join(", ")))
        })?;

        let (Some(name), Some(description), Some(project_url), Some(screenshot)) =
            (self.name, self.description, self.project_url, self.screenshot)
        else {
            // Guarded by the missing-field check above.
            return Err(ApiError::Validation("Missing required fields".into()));
        };

        Ok(NewProject {
            name,
            description,
            tech,
            project_url,
            github_url: self.github_url,
            screenshot,
        })
    }
}

/// Canonical, validated project creation payload.
#[derive(Debug)]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub tech: Technology,
    pub project_url: String,
    pub github_url: Option<String>,
    pub screenshot: UploadedFile,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

/// Non-empty, at most 1000 characters, surrounding whitespace dropped.
pub fn validate_comment(text: &str) -> Result<&str, ApiError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation("Comment text is required".into()));
    }
    if trimmed.chars().count() > MAX_COMMENT_LEN {
        return Err(ApiError::Validation(
            "Comment must be 1000 characters or fewer".into(),
        ));
    }
    Ok(trimmed)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectOwner {
    pub id: Uuid,
    pub name: Option<String>,
    pub profile_image: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentAuthor {
    pub id: Uuid,
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: Uuid,
    pub user: CommentAuthor,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResponse {
    pub id: Uuid,
    pub user: ProjectOwner,
    pub project_name: String,
    pub project_description: String,
    pub tech_used: String,
    pub project_url: String,
    pub github_url: Option<String>,
    pub screenshot_url: Option<String>,
    pub upvotes: usize,
    pub downvotes: usize,
    pub upvoted_by: Vec<Uuid>,
    pub downvoted_by: Vec<Uuid>,
    pub comments: Vec<CommentResponse>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screenshot() -> UploadedFile {
        UploadedFile {
            bytes: Bytes::from_static(b"\x89PNG"),
            content_type: "image/png".into(),
        }
    }

    fn filled_form() -> CreateProjectForm {
        let mut form = CreateProjectForm::default();
        form.set_field("projectName", "Chess Engine".into());
        form.set_field("projectDescription", "Bitboard move generation".into());
        form.set_field("techUsed", "game-development".into());
        form.set_field("projectUrl", "https://chess.example".into());
        form.screenshot = Some(screenshot());
        form
    }

    #[test]
    fn technology_round_trips() {
        for tech in Technology::ALL {
            assert_eq!(Technology::parse(tech.as_str()), Some(tech));
        }
        assert_eq!(Technology::parse("basket-weaving"), None);
    }

    #[test]
    fn technology_serde_matches_as_str() {
        for tech in Technology::ALL {
            let json = serde_json::to_string(&tech).unwrap();
            assert_eq!(json, format!("\"{}\"", tech.as_str()));
        }
    }

    #[test]
    fn finish_accepts_a_complete_form() {
        let new = filled_form().finish().expect("complete form");
        assert_eq!(new.name, "Chess Engine");
        assert_eq!(new.tech, Technology::GameDevelopment);
        assert!(new.github_url.is_none());
    }

    #[test]
    fn finish_lists_every_missing_field() {
        let err = CreateProjectForm::default().finish().unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("Missing required fields:"));
        for field in [
            "projectName",
            "projectDescription",
            "techUsed",
            "projectUrl",
            "screenshot",
        ] {
            assert!(msg.contains(field), "missing {field} in {msg}");
        }
    }

    #[test]
    fn legacy_aliases_are_normalized() {
        let mut form = CreateProjectForm::default();
        form.set_field("title", "Old Client".into());
        form.set_field("description", "Sent by a legacy form".into());
        assert_eq!(form.name.as_deref(), Some("Old Client"));
        assert_eq!(form.description.as_deref(), Some("Sent by a legacy form"));
    }

    #[test]
    fn canonical_fields_beat_legacy_aliases() {
        let mut form = CreateProjectForm::default();
        form.set_field("projectName", "Canonical".into());
        form.set_field("title", "Legacy".into());
        assert_eq!(form.name.as_deref(), Some("Canonical"));
    }

    #[test]
    fn invalid_technology_is_rejected_with_the_allowed_set() {
        let mut form = filled_form();
        form.tech = Some("underwater-basket-weaving".into());
        let msg = form.finish().unwrap_err().to_string();
        assert!(msg.contains("techUsed must be one of"));
        assert!(msg.contains("web-development"));
    }

    #[test]
    fn blank_fields_count_as_missing() {
        let mut form = filled_form();
        form.set_field("projectName", "   ".into());
        // set_field ignores blanks, so the earlier value stays.
        assert_eq!(form.name.as_deref(), Some("Chess Engine"));

        let mut empty = CreateProjectForm::default();
        empty.set_field("projectName", "  ".into());
        assert!(empty.name.is_none());
    }

    #[test]
    fn comment_length_boundaries() {
        let exactly_max: String = "x".repeat(MAX_COMMENT_LEN);
        assert!(validate_comment(&exactly_max).is_ok());

        let too_long: String = "x".repeat(MAX_COMMENT_LEN + 1);
        assert!(validate_comment(&too_long).is_err());

        assert!(validate_comment("").is_err());
        assert!(validate_comment("   \n\t").is_err());
    }

    #[test]
    fn comment_text_is_trimmed() {
        assert_eq!(validate_comment("  solid work  ").unwrap(), "solid work");
    }

    #[test]
    fn comment_length_counts_characters_not_bytes() {
        // 1000 multi-byte characters is still within the limit.
        let unicode: String = "é".repeat(MAX_COMMENT_LEN);
        assert!(validate_comment(&unicode).is_ok());
    }
}
