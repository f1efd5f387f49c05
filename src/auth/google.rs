use anyhow::Context;
use axum::{
    extract::{FromRef, Query, State},
    response::Redirect,
};
use rand::{distributions::Alphanumeric, Rng};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::auth::jwt::JwtKeys;
use crate::auth::password;
use crate::config::GoogleConfig;
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::repo::{self as users, Role, User};

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleProfile {
    email: String,
    name: Option<String>,
    picture: Option<String>,
}

fn google_config(state: &AppState) -> Result<&GoogleConfig, ApiError> {
    state
        .config
        .google
        .as_ref()
        .ok_or_else(|| ApiError::Validation("Google sign-in is not configured".into()))
}

/// Send the browser to Google's consent page.
pub async fn start(State(state): State<AppState>) -> Result<Redirect, ApiError> {
    let google = google_config(&state)?;
    let url = format!(
        "{AUTH_URL}?client_id={}&redirect_uri={}&response_type=code&scope={}",
        urlencoding::encode(&google.client_id),
        urlencoding::encode(&google.redirect_url),
        urlencoding::encode("openid email profile"),
    );
    Ok(Redirect::temporary(&url))
}

/// Exchange the authorization code, upsert the user by email and hand
/// the browser a signed token on the dashboard URL.
#[instrument(skip(state, query))]
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect, ApiError> {
    let google = google_config(&state)?;

    let token: TokenResponse = state
        .http
        .post(TOKEN_URL)
        .form(&[
            ("code", query.code.as_str()),
            ("client_id", google.client_id.as_str()),
            ("client_secret", google.client_secret.as_str()),
            ("redirect_uri", google.redirect_url.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .context("google token exchange")?
        .error_for_status()
        .map_err(|e| {
            warn!(error = %e, "google rejected the authorization code");
            ApiError::Validation("Google sign-in failed".into())
        })?
        .json()
        .await
        .context("decode google token response")?;

    let profile: GoogleProfile = state
        .http
        .get(USERINFO_URL)
        .bearer_auth(&token.access_token)
        .send()
        .await
        .context("google userinfo")?
        .error_for_status()
        .map_err(|e| {
            warn!(error = %e, "google userinfo request failed");
            ApiError::Validation("Google sign-in failed".into())
        })?
        .json()
        .await
        .context("decode google userinfo")?;

    let user = upsert_google_user(&state, &profile).await?;

    let keys = JwtKeys::from_ref(&state);
    let jwt = keys.sign(user.id, user.role())?;

    info!(user_id = %user.id, "google login");
    Ok(Redirect::temporary(&format!(
        "{}/dashboard.html?token={}",
        state.config.frontend_url, jwt
    )))
}

async fn upsert_google_user(state: &AppState, profile: &GoogleProfile) -> Result<User, ApiError> {
    let email = profile.email.trim().to_lowercase();

    if let Some(user) = users::find_by_email(&state.db, &email).await? {
        let user = users::update_google_profile(
            &state.db,
            user.id,
            profile.name.as_deref(),
            profile.picture.as_deref(),
        )
        .await?;
        return Ok(user);
    }

    // First Google sign-in: the local-login password is random and
    // never disclosed, so the account is OAuth-only until reset.
    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect();
    let hash = password::hash_password(&random)?;
    let user = users::create(&state.db, &email, &hash, profile.name.as_deref(), Role::Student).await?;

    info!(user_id = %user.id, "user created from google profile");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consent_url_is_escaped() {
        let client_id = "abc 123";
        let redirect = "http://localhost:8080/auth/google/callback";
        let url = format!(
            "{AUTH_URL}?client_id={}&redirect_uri={}&response_type=code&scope={}",
            urlencoding::encode(client_id),
            urlencoding::encode(redirect),
            urlencoding::encode("openid email profile"),
        );
        assert!(url.contains("client_id=abc%20123"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fauth%2Fgoogle%2Fcallback"));
        assert!(url.contains("scope=openid%20email%20profile"));
    }

    #[test]
    fn profile_decodes_with_missing_optional_fields() {
        let p: GoogleProfile = serde_json::from_str(r#"{"email":"s@g.com"}"#).unwrap();
        assert_eq!(p.email, "s@g.com");
        assert!(p.name.is_none());
        assert!(p.picture.is_none());
    }
}
