mod password;
mod token;

use std::sync::Arc;

use axum::{
    Json, Router, debug_handler,
    extract::{FromRequestParts, State},
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{AppError, AppResult, AppState, Config};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/profile", put(update_profile))
        .route("/users", get(list_users))
}

/// The authenticated caller, resolved from the `Authorization: Bearer` header
/// by every protected route.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuthUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub preferences: String,
    pub last_login: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl AuthUser {
    fn to_json(&self) -> Value {
        let preferences: Value =
            serde_json::from_str(&self.preferences).unwrap_or_else(|_| json!({}));
        json!({
            "id": self.id,
            "username": self.username,
            "email": self.email,
            "preferences": preferences,
            "lastLogin": self.last_login.map(rfc3339),
            "createdAt": rfc3339(self.created_at),
        })
    }
}

pub(crate) fn rfc3339(t: OffsetDateTime) -> String {
    t.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthorized("No token, authorization denied"))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AppError::Unauthorized("No token, authorization denied"))?;

        let claims = token::verify(token, &state.config.jwt_secret)?;

        sqlx::query_as::<_, AuthUser>(
            "SELECT id,username,email,preferences,last_login,created_at FROM users WHERE id=?",
        )
        .bind(&claims.sub)
        .fetch_optional(&state.db_pool)
        .await?
        .ok_or(AppError::Unauthorized("Token is not valid"))
    }
}

#[derive(Deserialize)]
struct RegisterPayload {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

#[debug_handler(state = AppState)]
async fn register(
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    Json(payload): Json<RegisterPayload>,
) -> AppResult<Response> {
    let mut errors = Vec::new();
    let username = payload.username.unwrap_or_default();
    let email = payload.email.unwrap_or_default();
    let password = payload.password.unwrap_or_default();
    if username.len() < 3 || username.len() > 30 {
        errors.push("Username must be 3-30 characters".to_string());
    }
    if !email.contains('@') {
        errors.push("Please provide a valid email".to_string());
    }
    if password.len() < 6 {
        errors.push("Password must be at least 6 characters".to_string());
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let existing: Option<(String, String)> =
        sqlx::query_as("SELECT email,username FROM users WHERE email=? OR username=?")
            .bind(&email)
            .bind(&username)
            .fetch_optional(&db_pool)
            .await?;
    if let Some((existing_email, _)) = existing {
        let message = if existing_email == email {
            "Email already registered"
        } else {
            "Username already taken"
        };
        return Err(AppError::Conflict(message.to_string()));
    }

    let password_hash = password::hash_password(&password)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("password hash failed: {e}")))?;

    let id = Uuid::now_v7().to_string();
    let now = OffsetDateTime::now_utc();
    sqlx::query(
        "INSERT INTO users (id,username,email,password_hash,preferences,created_at) VALUES (?,?,?,?,'{}',?)",
    )
    .bind(&id)
    .bind(&username)
    .bind(&email)
    .bind(&password_hash)
    .bind(now)
    .execute(&db_pool)
    .await?;

    let token = token::issue(&id, &config.jwt_secret, config.token_ttl)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "token": token,
            "user": {
                "id": id,
                "username": username,
                "email": email,
                "preferences": {},
                "createdAt": rfc3339(now),
            },
        })),
    )
        .into_response())
}

#[derive(Deserialize)]
struct LoginPayload {
    email: Option<String>,
    password: Option<String>,
}

#[debug_handler(state = AppState)]
async fn login(
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    Json(payload): Json<LoginPayload>,
) -> AppResult<Json<Value>> {
    let (Some(email), Some(password)) = (payload.email, payload.password) else {
        return Err(AppError::validation("Email and password are required"));
    };

    let row: Option<(String, String)> =
        sqlx::query_as("SELECT id,password_hash FROM users WHERE email=?")
            .bind(&email)
            .fetch_optional(&db_pool)
            .await?;
    let Some((id, password_hash)) = row else {
        return Err(AppError::Conflict("Invalid credentials".to_string()));
    };

    if !password::verify_password(&password, &password_hash).unwrap_or(false) {
        return Err(AppError::Conflict("Invalid credentials".to_string()));
    }

    let now = OffsetDateTime::now_utc();
    sqlx::query("UPDATE users SET last_login=? WHERE id=?")
        .bind(now)
        .bind(&id)
        .execute(&db_pool)
        .await?;

    let user = sqlx::query_as::<_, AuthUser>(
        "SELECT id,username,email,preferences,last_login,created_at FROM users WHERE id=?",
    )
    .bind(&id)
    .fetch_one(&db_pool)
    .await?;

    let token = token::issue(&id, &config.jwt_secret, config.token_ttl)?;

    Ok(Json(json!({
        "message": "Login successful",
        "token": token,
        "user": user.to_json(),
    })))
}

#[debug_handler(state = AppState)]
async fn me(user: AuthUser) -> Json<Value> {
    Json(json!({ "user": user.to_json() }))
}

#[derive(Deserialize)]
struct ProfilePayload {
    username: Option<String>,
    email: Option<String>,
    preferences: Option<Value>,
}

#[debug_handler(state = AppState)]
async fn update_profile(
    State(db_pool): State<SqlitePool>,
    mut user: AuthUser,
    Json(payload): Json<ProfilePayload>,
) -> AppResult<Json<Value>> {
    if let Some(username) = payload.username
        && username != user.username
    {
        if username.len() < 3 || username.len() > 30 {
            return Err(AppError::validation("Username must be 3-30 characters"));
        }
        let taken: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE username=?")
            .bind(&username)
            .fetch_optional(&db_pool)
            .await?;
        if taken.is_some() {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }
        user.username = username;
    }

    if let Some(email) = payload.email
        && email != user.email
    {
        if !email.contains('@') {
            return Err(AppError::validation("Please provide a valid email"));
        }
        let taken: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email=?")
            .bind(&email)
            .fetch_optional(&db_pool)
            .await?;
        if taken.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }
        user.email = email;
    }

    if let Some(Value::Object(incoming)) = payload.preferences {
        // Shallow merge, incoming keys win.
        let mut merged = match serde_json::from_str::<Value>(&user.preferences) {
            Ok(Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        for (k, v) in incoming {
            merged.insert(k, v);
        }
        user.preferences = serde_json::to_string(&Value::Object(merged))?;
    }

    sqlx::query("UPDATE users SET username=?, email=?, preferences=? WHERE id=?")
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.preferences)
        .bind(&user.id)
        .execute(&db_pool)
        .await?;

    Ok(Json(json!({
        "message": "Profile updated successfully",
        "user": user.to_json(),
    })))
}

#[debug_handler(state = AppState)]
async fn list_users(
    State(db_pool): State<SqlitePool>,
    _user: AuthUser,
) -> AppResult<Json<Value>> {
    let users: Vec<(String, String, String)> =
        sqlx::query_as("SELECT id,username,email FROM users ORDER BY created_at DESC")
            .fetch_all(&db_pool)
            .await?;

    let users: Vec<Value> = users
        .into_iter()
        .map(|(id, username, email)| json!({ "id": id, "username": username, "email": email }))
        .collect();

    Ok(Json(json!({ "users": users })))
}
