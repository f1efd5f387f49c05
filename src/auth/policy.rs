use uuid::Uuid;

use crate::error::ApiError;
use crate::users::repo::Role;

/// Everything a route can ask a role to do. Handlers query this module
/// instead of branching on roles themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateProject,
    ListOwnProjects,
    BrowseCommunity,
    Vote,
    PostComment,
    ViewStudentProfile,
}

pub fn authorize(role: Role, action: Action) -> Result<(), ApiError> {
    match action {
        Action::PostComment => {
            if role == Role::Teacher {
                Ok(())
            } else {
                Err(ApiError::Forbidden(
                    "Only teachers can comment on projects".into(),
                ))
            }
        }
        Action::ViewStudentProfile => {
            if role == Role::Teacher {
                Ok(())
            } else {
                Err(ApiError::Forbidden(
                    "Only teachers can view student profiles".into(),
                ))
            }
        }
        // Open to any authenticated user regardless of role.
        Action::CreateProject | Action::ListOwnProjects | Action::BrowseCommunity | Action::Vote => {
            Ok(())
        }
    }
}

/// Ownership is identity equality, never a role question.
pub fn ensure_owner(owner: Uuid, actor: Uuid, denied: &str) -> Result<(), ApiError> {
    if owner == actor {
        Ok(())
    } else {
        Err(ApiError::Forbidden(denied.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn commenting_is_teacher_only() {
        assert!(authorize(Role::Teacher, Action::PostComment).is_ok());
        let err = authorize(Role::Student, Action::PostComment).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn student_profiles_are_teacher_only() {
        assert!(authorize(Role::Teacher, Action::ViewStudentProfile).is_ok());
        assert!(authorize(Role::Student, Action::ViewStudentProfile).is_err());
    }

    #[test]
    fn open_actions_allow_both_roles() {
        for role in [Role::Student, Role::Teacher] {
            for action in [
                Action::CreateProject,
                Action::ListOwnProjects,
                Action::BrowseCommunity,
                Action::Vote,
            ] {
                assert!(authorize(role, action).is_ok(), "{role:?} {action:?}");
            }
        }
    }

    #[test]
    fn owner_check_compares_identity() {
        let owner = Uuid::new_v4();
        assert!(ensure_owner(owner, owner, "nope").is_ok());

        let err = ensure_owner(owner, Uuid::new_v4(), "You can only delete your own projects")
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.to_string(), "You can only delete your own projects");
    }
}
