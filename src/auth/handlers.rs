use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::auth::dto::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use crate::auth::jwt::JwtKeys;
use crate::auth::password;
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::repo::{self as users, Role};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Dashboard the client should land on for a given role.
pub(crate) fn dashboard_for(role: Role) -> &'static str {
    match role {
        Role::Student => "student-dashboard.html",
        Role::Teacher => "teacher-dashboard.html",
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }

    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::Validation("Password too short".into()));
    }

    if users::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let hash = password::hash_password(&payload.password)?;
    let role = payload.role.unwrap_or(Role::Student);
    let user = users::create(&state.db, &payload.email, &hash, payload.name.as_deref(), role).await?;

    info!(user_id = %user.id, email = %user.email, role = role.as_str(), "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully!".into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }

    let user = users::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| {
            warn!(email = %payload.email, "login unknown email");
            ApiError::Validation("Invalid credentials".into())
        })?;

    if !password::verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(ApiError::Validation("Invalid credentials".into()));
    }

    // Role is server-assigned; a different role in the request body is
    // ignored rather than written back.
    let role = user.role();
    if let Some(requested) = payload.role {
        if requested != role {
            warn!(
                user_id = %user.id,
                requested = requested.as_str(),
                stored = role.as_str(),
                "login requested role ignored"
            );
        }
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, role)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(LoginResponse {
        token,
        role,
        redirect_to: dashboard_for(role).into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("student@example.com"));
        assert!(is_valid_email("a.b+c@sub.domain.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("missing@tld"));
        assert!(!is_valid_email("spaces in@mail.com"));
    }

    #[test]
    fn dashboards_follow_role() {
        assert_eq!(dashboard_for(Role::Student), "student-dashboard.html");
        assert_eq!(dashboard_for(Role::Teacher), "teacher-dashboard.html");
    }
}
