use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::auth::{create_token, email_domain_allowed, password};
use crate::db::{now_timestamp, queries};
use crate::domain::Role;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, ACCOUNT_DISABLED};
use crate::state::AppState;
use crate::views::user_view;

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email(message = "Email is invalid"))]
    pub email: String,
    #[validate(length(min = 6, max = 128, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub role: Option<Role>,
    #[validate(length(max = 100))]
    pub vehicle_model: Option<String>,
    #[validate(length(max = 20))]
    pub vehicle_number: Option<String>,
    #[validate(length(max = 30))]
    pub vehicle_color: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/profile", get(me).put(update_profile))
}

async fn signup(
    State(state): State<AppState>,
    Json(body): Json<SignupRequest>,
) -> AppResult<Json<Value>> {
    body.validate()?;

    let domain = &state.config.auth.allowed_email_domain;
    if !email_domain_allowed(&body.email, domain) {
        return Err(AppError::bad_request(format!(
            "Only {} emails are allowed",
            domain
        )));
    }
    if body.role == Role::Admin {
        return Err(AppError::bad_request("Role must be rider or driver"));
    }

    let email = body.email.trim().to_lowercase();

    let conn = state.db.get()?;
    if queries::find_user_by_email(&conn, &email)?.is_some() {
        return Err(AppError::bad_request("Email already registered"));
    }

    let hash = password::hash_password(&body.password, state.config.auth.bcrypt_cost)?;

    conn.execute(
        "INSERT INTO users (email, password, name, role, is_admin, verification_status, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, 'unverified', ?5)",
        params![email, hash, body.name.trim(), body.role, now_timestamp()],
    )?;
    let user_id = conn.last_insert_rowid();
    let user = queries::find_user(&conn, user_id)?
        .ok_or_else(|| AppError::Internal("User vanished after insert".into()))?;

    let token = create_token(
        user_id,
        state.config.auth.jwt_secret.as_bytes(),
        state.config.auth.token_minutes,
    )?;

    tracing::info!(user_id, role = %body.role, "User signed up");

    Ok(Json(json!({
        "message": "User created successfully",
        "token": token,
        "user": user_view(&conn, &user, &state.config.trust)?,
    })))
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<Value>> {
    body.validate()?;

    let conn = state.db.get()?;
    let email = body.email.trim().to_lowercase();
    let invalid = || AppError::Unauthorized("Invalid email or password".into());

    let user = queries::find_user_by_email(&conn, &email)?.ok_or_else(invalid)?;
    if !password::verify_password(&body.password, &user.password_hash) {
        tracing::debug!(user_id = user.id, "Login rejected: bad password");
        return Err(invalid());
    }
    if !user.is_active {
        return Err(AppError::forbidden(ACCOUNT_DISABLED));
    }

    let token = create_token(
        user.id,
        state.config.auth.jwt_secret.as_bytes(),
        state.config.auth.token_minutes,
    )?;

    Ok(Json(json!({
        "message": "Login successful",
        "token": token,
        "user": user_view(&conn, &user, &state.config.trust)?,
    })))
}

async fn me(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    Ok(Json(json!({
        "user": user_view(&conn, &user, &state.config.trust)?,
    })))
}

async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<ProfileUpdate>,
) -> AppResult<Json<Value>> {
    body.validate()?;

    if body.role == Some(Role::Admin) {
        return Err(AppError::forbidden("Role must be rider or driver"));
    }
    // Admins keep their role; everyone else may switch between rider and driver.
    let role = body.role.filter(|_| !user.is_admin);

    let conn = state.db.get()?;
    let changed = conn.execute(
        "UPDATE users SET
            name = COALESCE(?1, name),
            role = COALESCE(?2, role),
            vehicle_model = COALESCE(?3, vehicle_model),
            vehicle_number = COALESCE(?4, vehicle_number),
            vehicle_color = COALESCE(?5, vehicle_color)
         WHERE id = ?6
           AND (?1 IS NOT NULL OR ?2 IS NOT NULL OR ?3 IS NOT NULL OR ?4 IS NOT NULL OR ?5 IS NOT NULL)",
        params![
            body.name.as_deref().map(str::trim),
            role,
            body.vehicle_model,
            body.vehicle_number,
            body.vehicle_color,
            user.id
        ],
    )?;

    let updated = queries::find_user(&conn, user.id)?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let message = if changed > 0 {
        "Profile updated"
    } else {
        "No changes made"
    };
    Ok(Json(json!({
        "message": message,
        "user": user_view(&conn, &updated, &state.config.trust)?,
    })))
}
