use axum::{
    Json, Router, debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    AppError, AppResult, AppState,
    auth::{AuthUser, rfc3339},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_secrets).post(create_secret))
        .route("/{id}", axum::routing::delete(delete_secret))
        .route("/{id}/like", post(toggle_like))
        .route("/{id}/comment", post(add_comment))
}

#[derive(sqlx::FromRow)]
struct SecretRow {
    id: String,
    author_id: String,
    author_name: String,
    content: String,
    is_anonymous: bool,
    is_active: bool,
    created_at: OffsetDateTime,
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: String,
    author_id: String,
    author_name: String,
    content: String,
    is_anonymous: bool,
    created_at: OffsetDateTime,
}

/// Anonymity stripping happens here, not in the client: an anonymous secret
/// or comment goes out with `author: null` for everyone, the author included.
fn author_field(is_anonymous: bool, id: &str, username: &str) -> Value {
    if is_anonymous {
        Value::Null
    } else {
        json!({ "id": id, "username": username })
    }
}

fn comment_json(c: &CommentRow) -> Value {
    json!({
        "id": c.id,
        "content": c.content,
        "author": author_field(c.is_anonymous, &c.author_id, &c.author_name),
        "isAnonymous": c.is_anonymous,
        "createdAt": rfc3339(c.created_at),
    })
}

async fn secret_json(db_pool: &SqlitePool, secret: &SecretRow) -> AppResult<Value> {
    let likes: Vec<(String, OffsetDateTime)> =
        sqlx::query_as("SELECT user_id,created_at FROM secret_likes WHERE secret_id=?")
            .bind(&secret.id)
            .fetch_all(db_pool)
            .await?;
    let likes: Vec<Value> = likes
        .iter()
        .map(|(user, created_at)| json!({ "user": user, "createdAt": rfc3339(*created_at) }))
        .collect();

    let comments: Vec<CommentRow> = sqlx::query_as(
        "SELECT c.id,c.author_id,u.username AS author_name,c.content,c.is_anonymous,c.created_at
         FROM secret_comments c JOIN users u ON u.id=c.author_id
         WHERE c.secret_id=? ORDER BY c.created_at",
    )
    .bind(&secret.id)
    .fetch_all(db_pool)
    .await?;

    Ok(json!({
        "id": secret.id,
        "content": secret.content,
        "author": author_field(secret.is_anonymous, &secret.author_id, &secret.author_name),
        "isAnonymous": secret.is_anonymous,
        "likes": likes,
        "comments": comments.iter().map(comment_json).collect::<Vec<_>>(),
        "isActive": secret.is_active,
        "createdAt": rfc3339(secret.created_at),
    }))
}

#[debug_handler(state = AppState)]
async fn list_secrets(State(db_pool): State<SqlitePool>, _user: AuthUser) -> AppResult<Json<Value>> {
    let secrets: Vec<SecretRow> = sqlx::query_as(
        "SELECT s.id,s.author_id,u.username AS author_name,s.content,s.is_anonymous,s.is_active,s.created_at
         FROM secrets s JOIN users u ON u.id=s.author_id
         WHERE s.is_active=1 ORDER BY s.created_at DESC LIMIT 50",
    )
    .fetch_all(&db_pool)
    .await?;

    let mut out = Vec::with_capacity(secrets.len());
    for secret in &secrets {
        out.push(secret_json(&db_pool, secret).await?);
    }

    Ok(Json(json!({ "secrets": out })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSecretPayload {
    content: Option<String>,
    is_anonymous: Option<bool>,
}

#[debug_handler(state = AppState)]
async fn create_secret(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Json(payload): Json<CreateSecretPayload>,
) -> AppResult<Response> {
    let content = payload.content.unwrap_or_default().trim().to_string();
    if content.is_empty() {
        return Err(AppError::validation("Secret content is required"));
    }
    if content.len() > 1000 {
        return Err(AppError::validation("Content cannot exceed 1000 characters"));
    }

    let id = Uuid::now_v7().to_string();
    let now = OffsetDateTime::now_utc();
    sqlx::query(
        "INSERT INTO secrets (id,author_id,content,is_anonymous,created_at) VALUES (?,?,?,?,?)",
    )
    .bind(&id)
    .bind(&user.id)
    .bind(&content)
    .bind(payload.is_anonymous.unwrap_or(true))
    .bind(now)
    .execute(&db_pool)
    .await?;

    let secret = sqlx::query_as::<_, SecretRow>(
        "SELECT s.id,s.author_id,u.username AS author_name,s.content,s.is_anonymous,s.is_active,s.created_at
         FROM secrets s JOIN users u ON u.id=s.author_id WHERE s.id=?",
    )
    .bind(&id)
    .fetch_one(&db_pool)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Secret shared successfully",
            "secret": secret_json(&db_pool, &secret).await?,
        })),
    )
        .into_response())
}

#[debug_handler(state = AppState)]
async fn toggle_like(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let secret: Option<(String,)> = sqlx::query_as("SELECT id FROM secrets WHERE id=?")
        .bind(id.to_string())
        .fetch_optional(&db_pool)
        .await?;
    let Some((secret_id,)) = secret else {
        return Err(AppError::NotFound("Secret not found"));
    };

    let existing: Option<(String,)> =
        sqlx::query_as("SELECT user_id FROM secret_likes WHERE secret_id=? AND user_id=?")
            .bind(&secret_id)
            .bind(&user.id)
            .fetch_optional(&db_pool)
            .await?;

    if existing.is_some() {
        sqlx::query("DELETE FROM secret_likes WHERE secret_id=? AND user_id=?")
            .bind(&secret_id)
            .bind(&user.id)
            .execute(&db_pool)
            .await?;
    } else {
        sqlx::query("INSERT INTO secret_likes (secret_id,user_id,created_at) VALUES (?,?,?)")
            .bind(&secret_id)
            .bind(&user.id)
            .bind(OffsetDateTime::now_utc())
            .execute(&db_pool)
            .await?;
    }

    let (likes_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM secret_likes WHERE secret_id=?")
            .bind(&secret_id)
            .fetch_one(&db_pool)
            .await?;

    Ok(Json(json!({
        "message": if existing.is_some() { "Secret unliked" } else { "Secret liked" },
        "likesCount": likes_count,
        "isLiked": existing.is_none(),
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentPayload {
    content: Option<String>,
    is_anonymous: Option<bool>,
}

#[debug_handler(state = AppState)]
async fn add_comment(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CommentPayload>,
) -> AppResult<Response> {
    let content = payload.content.unwrap_or_default().trim().to_string();
    if content.is_empty() {
        return Err(AppError::validation("Comment content is required"));
    }
    if content.len() > 500 {
        return Err(AppError::validation("Comment cannot exceed 500 characters"));
    }

    let secret: Option<(String,)> = sqlx::query_as("SELECT id FROM secrets WHERE id=?")
        .bind(id.to_string())
        .fetch_optional(&db_pool)
        .await?;
    let Some((secret_id,)) = secret else {
        return Err(AppError::NotFound("Secret not found"));
    };

    let comment_id = Uuid::now_v7().to_string();
    sqlx::query(
        "INSERT INTO secret_comments (id,secret_id,author_id,content,is_anonymous,created_at) VALUES (?,?,?,?,?,?)",
    )
    .bind(&comment_id)
    .bind(&secret_id)
    .bind(&user.id)
    .bind(&content)
    .bind(payload.is_anonymous.unwrap_or(true))
    .bind(OffsetDateTime::now_utc())
    .execute(&db_pool)
    .await?;

    let comment = sqlx::query_as::<_, CommentRow>(
        "SELECT c.id,c.author_id,u.username AS author_name,c.content,c.is_anonymous,c.created_at
         FROM secret_comments c JOIN users u ON u.id=c.author_id WHERE c.id=?",
    )
    .bind(&comment_id)
    .fetch_one(&db_pool)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Comment added successfully",
            "comment": comment_json(&comment),
        })),
    )
        .into_response())
}

#[debug_handler(state = AppState)]
async fn delete_secret(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let found: Option<(String,)> =
        sqlx::query_as("SELECT id FROM secrets WHERE id=? AND author_id=?")
            .bind(id.to_string())
            .bind(&user.id)
            .fetch_optional(&db_pool)
            .await?;
    let Some((secret_id,)) = found else {
        return Err(AppError::NotFound("Secret not found or unauthorized"));
    };

    sqlx::query("UPDATE secrets SET is_active=0 WHERE id=?")
        .bind(&secret_id)
        .execute(&db_pool)
        .await?;

    Ok(Json(json!({ "message": "Secret deleted successfully" })))
}
