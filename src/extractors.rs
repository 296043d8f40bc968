use std::ops::Deref;

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::auth::decode_token;
use crate::db::{models::User, queries};
use crate::error::AppError;
use crate::state::AppState;

pub const ACCOUNT_DISABLED: &str = "Your account has been disabled. Please contact support.";

/// The caller identified by the bearer token, loaded fresh from the database.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl Deref for CurrentUser {
    type Target = User;

    fn deref(&self) -> &User {
        &self.0
    }
}

/// Extractor that requires a valid bearer token.
/// Returns 401 for a missing or bad token and 403 for disabled accounts.
/// Admins are never locked out by the disabled flag.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("Not authenticated".into()))?;

        let user_id = decode_token(token, state.config.auth.jwt_secret.as_bytes())?;

        let conn = state.db.get()?;
        let user = queries::find_user(&conn, user_id)?
            .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

        if !user.is_active && !user.is_admin {
            return Err(AppError::forbidden(ACCOUNT_DISABLED));
        }

        Ok(CurrentUser(user))
    }
}

/// Extractor for admin-only endpoints. Returns 403 for everyone else.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl Deref for AdminUser {
    type Target = User;

    fn deref(&self) -> &User {
        &self.0
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(AppError::admin_required());
        }
        Ok(AdminUser(user))
    }
}

fn extract_bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
