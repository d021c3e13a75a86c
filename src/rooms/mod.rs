mod code;

use axum::{
    Json, Router, debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
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
        .route("/me", get(my_room))
        .route("/create", post(create_room))
        .route("/join", post(join_room))
        .route("/leave", post(leave_room))
        .route("/{id}", put(update_room))
        .route("/{id}/regenerate-code", post(regenerate_code))
}

#[derive(sqlx::FromRow)]
struct RoomRow {
    id: String,
    name: String,
    code: String,
    owner_id: String,
    max_size: i64,
    created_at: OffsetDateTime,
}

/// Members in join order, which is also the ownership succession order.
async fn members_of(db_pool: &SqlitePool, room_id: &str) -> AppResult<Vec<(String, String, String)>> {
    Ok(sqlx::query_as(
        "SELECT u.id,u.username,u.email FROM room_members m JOIN users u ON u.id=m.user_id
         WHERE m.room_id=? ORDER BY m.rowid",
    )
    .bind(room_id)
    .fetch_all(db_pool)
    .await?)
}

async fn room_of_user(db_pool: &SqlitePool, user_id: &str) -> AppResult<Option<RoomRow>> {
    Ok(sqlx::query_as::<_, RoomRow>(
        "SELECT r.* FROM rooms r JOIN room_members m ON m.room_id=r.id WHERE m.user_id=?",
    )
    .bind(user_id)
    .fetch_optional(db_pool)
    .await?)
}

async fn room_json(db_pool: &SqlitePool, room: &RoomRow) -> AppResult<Value> {
    let members = members_of(db_pool, &room.id).await?;
    let owner = members
        .iter()
        .find(|(id, _, _)| *id == room.owner_id)
        .cloned();

    let member_json = |(id, username, email): &(String, String, String)| {
        json!({ "id": id, "username": username, "email": email })
    };

    Ok(json!({
        "id": room.id,
        "name": room.name,
        "code": room.code,
        "owner": owner.as_ref().map(member_json),
        "members": members.iter().map(member_json).collect::<Vec<_>>(),
        "maxSize": room.max_size,
        "createdAt": rfc3339(room.created_at),
    }))
}

#[debug_handler(state = AppState)]
async fn my_room(State(db_pool): State<SqlitePool>, user: AuthUser) -> AppResult<Json<Value>> {
    match room_of_user(&db_pool, &user.id).await? {
        Some(room) => Ok(Json(json!({ "room": room_json(&db_pool, &room).await? }))),
        None => Ok(Json(json!({ "room": null }))),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoomPayload {
    name: Option<String>,
    max_size: Option<i64>,
}

#[debug_handler(state = AppState)]
async fn create_room(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Json(payload): Json<CreateRoomPayload>,
) -> AppResult<Response> {
    let mut errors = Vec::new();
    if let Some(name) = payload.name.as_deref()
        && (name.is_empty() || name.len() > 50)
    {
        errors.push("Name must be 1-50 chars".to_string());
    }
    if !payload.max_size.is_some_and(|n| (2..=5).contains(&n)) {
        errors.push("maxSize must be between 2 and 5".to_string());
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let already: Option<(String,)> =
        sqlx::query_as("SELECT room_id FROM room_members WHERE user_id=?")
            .bind(&user.id)
            .fetch_optional(&db_pool)
            .await?;
    if already.is_some() {
        return Err(AppError::Conflict("You already belong to a room".to_string()));
    }

    let id = Uuid::now_v7().to_string();
    let code = code::generate_unique_code(&db_pool).await?;
    let now = OffsetDateTime::now_utc();

    sqlx::query("INSERT INTO rooms (id,name,code,owner_id,max_size,created_at) VALUES (?,?,?,?,?,?)")
        .bind(&id)
        .bind(payload.name.as_deref().unwrap_or("My Room"))
        .bind(&code)
        .bind(&user.id)
        .bind(payload.max_size.unwrap_or(5))
        .bind(now)
        .execute(&db_pool)
        .await?;
    sqlx::query("INSERT INTO room_members (room_id,user_id,joined_at) VALUES (?,?,?)")
        .bind(&id)
        .bind(&user.id)
        .bind(now)
        .execute(&db_pool)
        .await?;

    let room = sqlx::query_as::<_, RoomRow>("SELECT * FROM rooms WHERE id=?")
        .bind(&id)
        .fetch_one(&db_pool)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Room created",
            "room": room_json(&db_pool, &room).await?,
        })),
    )
        .into_response())
}

#[derive(Deserialize)]
struct JoinPayload {
    code: Option<String>,
}

#[debug_handler(state = AppState)]
async fn join_room(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Json(payload): Json<JoinPayload>,
) -> AppResult<Json<Value>> {
    let code = payload.code.unwrap_or_default();
    if code.len() < 4 || code.len() > 10 {
        return Err(AppError::validation("Invalid code"));
    }

    // Checks run in the same order as always: membership, existence,
    // capacity, then the defensive already-a-member case.
    let already: Option<(String,)> =
        sqlx::query_as("SELECT room_id FROM room_members WHERE user_id=?")
            .bind(&user.id)
            .fetch_optional(&db_pool)
            .await?;
    if already.is_some() {
        return Err(AppError::Conflict("You already belong to a room".to_string()));
    }

    let room: Option<RoomRow> = sqlx::query_as("SELECT * FROM rooms WHERE code=?")
        .bind(&code)
        .fetch_optional(&db_pool)
        .await?;
    let Some(room) = room else {
        return Err(AppError::NotFound("Room not found"));
    };

    let members = members_of(&db_pool, &room.id).await?;
    if members.len() as i64 >= room.max_size {
        return Err(AppError::Conflict("Room is full".to_string()));
    }
    if members.iter().any(|(id, _, _)| *id == user.id) {
        return Err(AppError::Conflict("You are already in this room".to_string()));
    }

    sqlx::query("INSERT INTO room_members (room_id,user_id,joined_at) VALUES (?,?,?)")
        .bind(&room.id)
        .bind(&user.id)
        .bind(OffsetDateTime::now_utc())
        .execute(&db_pool)
        .await?;

    Ok(Json(json!({
        "message": "Joined room",
        "room": room_json(&db_pool, &room).await?,
    })))
}

#[debug_handler(state = AppState)]
async fn leave_room(State(db_pool): State<SqlitePool>, user: AuthUser) -> AppResult<Json<Value>> {
    let Some(mut room) = room_of_user(&db_pool, &user.id).await? else {
        return Err(AppError::Conflict("You are not in a room".to_string()));
    };

    sqlx::query("DELETE FROM room_members WHERE room_id=? AND user_id=?")
        .bind(&room.id)
        .bind(&user.id)
        .execute(&db_pool)
        .await?;

    let members = members_of(&db_pool, &room.id).await?;
    if members.is_empty() {
        sqlx::query("DELETE FROM rooms WHERE id=?")
            .bind(&room.id)
            .execute(&db_pool)
            .await?;
        return Ok(Json(json!({
            "message": "Left room and room deleted (no members left)",
        })));
    }

    // Owner left: the earliest remaining joiner takes over.
    if room.owner_id == user.id {
        room.owner_id = members[0].0.clone();
        sqlx::query("UPDATE rooms SET owner_id=? WHERE id=?")
            .bind(&room.owner_id)
            .bind(&room.id)
            .execute(&db_pool)
            .await?;
    }

    Ok(Json(json!({
        "message": "Left room",
        "room": room_json(&db_pool, &room).await?,
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRoomPayload {
    name: Option<String>,
    max_size: Option<i64>,
}

#[debug_handler(state = AppState)]
async fn update_room(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRoomPayload>,
) -> AppResult<Json<Value>> {
    let mut errors = Vec::new();
    if let Some(name) = payload.name.as_deref()
        && (name.is_empty() || name.len() > 50)
    {
        errors.push("Name must be 1-50 chars".to_string());
    }
    if let Some(max_size) = payload.max_size
        && !(2..=5).contains(&max_size)
    {
        errors.push("maxSize must be between 2 and 5".to_string());
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let room: Option<RoomRow> = sqlx::query_as("SELECT * FROM rooms WHERE id=?")
        .bind(id.to_string())
        .fetch_optional(&db_pool)
        .await?;
    let Some(mut room) = room else {
        return Err(AppError::NotFound("Room not found"));
    };

    if room.owner_id != user.id {
        return Err(AppError::Forbidden("Only room owner can update settings"));
    }

    if let Some(name) = payload.name {
        room.name = name;
    }
    if let Some(max_size) = payload.max_size {
        let members = members_of(&db_pool, &room.id).await?;
        if max_size < members.len() as i64 {
            return Err(AppError::Conflict(format!(
                "maxSize cannot be less than current member count ({})",
                members.len()
            )));
        }
        room.max_size = max_size;
    }

    sqlx::query("UPDATE rooms SET name=?, max_size=? WHERE id=?")
        .bind(&room.name)
        .bind(room.max_size)
        .bind(&room.id)
        .execute(&db_pool)
        .await?;

    Ok(Json(json!({
        "message": "Room updated",
        "room": room_json(&db_pool, &room).await?,
    })))
}

#[debug_handler(state = AppState)]
async fn regenerate_code(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let room: Option<RoomRow> = sqlx::query_as("SELECT * FROM rooms WHERE id=?")
        .bind(id.to_string())
        .fetch_optional(&db_pool)
        .await?;
    let Some(mut room) = room else {
        return Err(AppError::NotFound("Room not found"));
    };

    if room.owner_id != user.id {
        return Err(AppError::Forbidden("Only room owner can regenerate code"));
    }

    room.code = code::generate_unique_code(&db_pool).await?;
    sqlx::query("UPDATE rooms SET code=? WHERE id=?")
        .bind(&room.code)
        .bind(&room.id)
        .execute(&db_pool)
        .await?;

    Ok(Json(json!({
        "message": "Code regenerated",
        "room": room_json(&db_pool, &room).await?,
    })))
}
