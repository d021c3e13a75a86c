mod streak;

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
        .route("/", get(list_habits).post(create_habit))
        .route("/analytics", get(analytics))
        .route("/{id}", put(update_habit).delete(delete_habit))
        .route("/{id}/complete", post(complete_habit))
}

const CATEGORIES: &[&str] = &[
    "health",
    "productivity",
    "learning",
    "fitness",
    "mindfulness",
    "social",
    "other",
];
const FREQUENCIES: &[&str] = &["daily", "weekly", "monthly"];

#[derive(sqlx::FromRow)]
struct HabitRow {
    id: String,
    user_id: String,
    title: String,
    description: Option<String>,
    category: String,
    frequency: String,
    target_count: i64,
    is_active: bool,
    streak_current: i64,
    streak_longest: i64,
    created_at: OffsetDateTime,
}

#[derive(sqlx::FromRow)]
struct CompletionRow {
    date: OffsetDateTime,
    count: i64,
    notes: Option<String>,
}

async fn fetch_habit(
    db_pool: &SqlitePool,
    id: &Uuid,
    user_id: &str,
) -> AppResult<Option<HabitRow>> {
    Ok(sqlx::query_as::<_, HabitRow>("SELECT * FROM habits WHERE id=? AND user_id=?")
        .bind(id.to_string())
        .bind(user_id)
        .fetch_optional(db_pool)
        .await?)
}

async fn habit_json(db_pool: &SqlitePool, habit: &HabitRow) -> AppResult<Value> {
    let completions: Vec<CompletionRow> = sqlx::query_as(
        "SELECT date,count,notes FROM habit_completions WHERE habit_id=? ORDER BY date",
    )
    .bind(&habit.id)
    .fetch_all(db_pool)
    .await?;

    let completions: Vec<Value> = completions
        .iter()
        .map(|c| {
            json!({
                "date": rfc3339(c.date),
                "count": c.count,
                "notes": c.notes,
            })
        })
        .collect();

    Ok(json!({
        "id": habit.id,
        "title": habit.title,
        "description": habit.description,
        "category": habit.category,
        "frequency": habit.frequency,
        "targetCount": habit.target_count,
        "user": habit.user_id,
        "isActive": habit.is_active,
        "streak": { "current": habit.streak_current, "longest": habit.streak_longest },
        "completions": completions,
        "createdAt": rfc3339(habit.created_at),
    }))
}

#[debug_handler(state = AppState)]
async fn list_habits(State(db_pool): State<SqlitePool>, user: AuthUser) -> AppResult<Json<Value>> {
    let habits: Vec<HabitRow> = sqlx::query_as(
        "SELECT * FROM habits WHERE user_id=? AND is_active=1 ORDER BY created_at DESC",
    )
    .bind(&user.id)
    .fetch_all(&db_pool)
    .await?;

    let mut out = Vec::with_capacity(habits.len());
    for habit in &habits {
        out.push(habit_json(&db_pool, habit).await?);
    }

    Ok(Json(json!({ "habits": out })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateHabitPayload {
    title: Option<String>,
    description: Option<String>,
    category: Option<String>,
    frequency: Option<String>,
    target_count: Option<i64>,
}

fn validate_habit_fields(
    errors: &mut Vec<String>,
    title: Option<&str>,
    description: Option<&str>,
    category: Option<&str>,
    frequency: Option<&str>,
    target_count: Option<i64>,
) {
    if let Some(title) = title
        && (title.trim().is_empty() || title.len() > 100)
    {
        errors.push("Title must be 1-100 characters".to_string());
    }
    if let Some(description) = description
        && description.len() > 500
    {
        errors.push("Description cannot exceed 500 characters".to_string());
    }
    if let Some(category) = category
        && !CATEGORIES.contains(&category)
    {
        errors.push("Invalid category".to_string());
    }
    if let Some(frequency) = frequency
        && !FREQUENCIES.contains(&frequency)
    {
        errors.push("Invalid frequency".to_string());
    }
    if let Some(target_count) = target_count
        && target_count < 1
    {
        errors.push("Target count must be at least 1".to_string());
    }
}

#[debug_handler(state = AppState)]
async fn create_habit(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Json(payload): Json<CreateHabitPayload>,
) -> AppResult<Response> {
    let mut errors = Vec::new();
    if payload.title.as_deref().is_none_or(|t| t.trim().is_empty()) {
        errors.push("Habit title is required".to_string());
    }
    validate_habit_fields(
        &mut errors,
        payload.title.as_deref(),
        payload.description.as_deref(),
        payload.category.as_deref(),
        payload.frequency.as_deref(),
        payload.target_count,
    );
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let id = Uuid::now_v7().to_string();
    let now = OffsetDateTime::now_utc();
    sqlx::query(
        "INSERT INTO habits (id,user_id,title,description,category,frequency,target_count,created_at)
         VALUES (?,?,?,?,?,?,?,?)",
    )
    .bind(&id)
    .bind(&user.id)
    .bind(payload.title.unwrap_or_default().trim())
    .bind(&payload.description)
    .bind(payload.category.as_deref().unwrap_or("other"))
    .bind(payload.frequency.as_deref().unwrap_or("daily"))
    .bind(payload.target_count.unwrap_or(1))
    .bind(now)
    .execute(&db_pool)
    .await?;

    let habit = sqlx::query_as::<_, HabitRow>("SELECT * FROM habits WHERE id=?")
        .bind(&id)
        .fetch_one(&db_pool)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Habit created successfully",
            "habit": habit_json(&db_pool, &habit).await?,
        })),
    )
        .into_response())
}

#[debug_handler(state = AppState)]
async fn update_habit(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateHabitPayload>,
) -> AppResult<Json<Value>> {
    let mut errors = Vec::new();
    validate_habit_fields(
        &mut errors,
        payload.title.as_deref(),
        payload.description.as_deref(),
        payload.category.as_deref(),
        payload.frequency.as_deref(),
        payload.target_count,
    );
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let Some(mut habit) = fetch_habit(&db_pool, &id, &user.id).await? else {
        return Err(AppError::NotFound("Habit not found"));
    };

    if let Some(title) = payload.title {
        habit.title = title.trim().to_string();
    }
    if let Some(description) = payload.description {
        habit.description = Some(description);
    }
    if let Some(category) = payload.category {
        habit.category = category;
    }
    if let Some(frequency) = payload.frequency {
        habit.frequency = frequency;
    }
    if let Some(target_count) = payload.target_count {
        habit.target_count = target_count;
    }

    sqlx::query(
        "UPDATE habits SET title=?, description=?, category=?, frequency=?, target_count=? WHERE id=?",
    )
    .bind(&habit.title)
    .bind(&habit.description)
    .bind(&habit.category)
    .bind(&habit.frequency)
    .bind(habit.target_count)
    .bind(&habit.id)
    .execute(&db_pool)
    .await?;

    Ok(Json(json!({
        "message": "Habit updated successfully",
        "habit": habit_json(&db_pool, &habit).await?,
    })))
}

#[derive(Deserialize)]
struct CompletePayload {
    count: Option<i64>,
    notes: Option<String>,
}

#[debug_handler(state = AppState)]
async fn complete_habit(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CompletePayload>,
) -> AppResult<Json<Value>> {
    let mut errors = Vec::new();
    if payload.count.is_some_and(|c| c < 1) {
        errors.push("Count must be at least 1".to_string());
    }
    if payload.notes.as_deref().is_some_and(|n| n.len() > 200) {
        errors.push("Notes cannot exceed 200 characters".to_string());
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let Some(mut habit) = fetch_habit(&db_pool, &id, &user.id).await? else {
        return Err(AppError::NotFound("Habit not found"));
    };

    let now = OffsetDateTime::now_utc();
    let today = now.date();

    let existing: Vec<CompletionRow> =
        sqlx::query_as("SELECT date,count,notes FROM habit_completions WHERE habit_id=?")
            .bind(&habit.id)
            .fetch_all(&db_pool)
            .await?;

    // One completion per calendar day. Check-then-act, same window as the
    // original; the store's per-statement atomicity is the only guard.
    if existing.iter().any(|c| c.date.date() == today) {
        return Err(AppError::Conflict("Habit already completed today".to_string()));
    }

    sqlx::query("INSERT INTO habit_completions (id,habit_id,date,count,notes) VALUES (?,?,?,?,?)")
        .bind(Uuid::now_v7().to_string())
        .bind(&habit.id)
        .bind(now)
        .bind(payload.count.unwrap_or(1))
        .bind(&payload.notes)
        .execute(&db_pool)
        .await?;

    let mut days: Vec<time::Date> = existing.iter().map(|c| c.date.date()).collect();
    days.push(today);
    let streak = streak::recompute(today, &days, habit.streak_longest);

    sqlx::query("UPDATE habits SET streak_current=?, streak_longest=? WHERE id=?")
        .bind(streak.current)
        .bind(streak.longest)
        .bind(&habit.id)
        .execute(&db_pool)
        .await?;
    habit.streak_current = streak.current;
    habit.streak_longest = streak.longest;

    Ok(Json(json!({
        "message": "Habit completed successfully",
        "habit": habit_json(&db_pool, &habit).await?,
    })))
}

#[debug_handler(state = AppState)]
async fn delete_habit(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let Some(habit) = fetch_habit(&db_pool, &id, &user.id).await? else {
        return Err(AppError::NotFound("Habit not found"));
    };

    // Soft delete: history stays for analytics.
    sqlx::query("UPDATE habits SET is_active=0 WHERE id=?")
        .bind(&habit.id)
        .execute(&db_pool)
        .await?;

    Ok(Json(json!({ "message": "Habit deleted successfully" })))
}

#[debug_handler(state = AppState)]
async fn analytics(State(db_pool): State<SqlitePool>, user: AuthUser) -> AppResult<Json<Value>> {
    let habits: Vec<HabitRow> =
        sqlx::query_as("SELECT * FROM habits WHERE user_id=? AND is_active=1")
            .bind(&user.id)
            .fetch_all(&db_pool)
            .await?;

    let total_habits = habits.len() as i64;
    let mut total_completions = 0i64;
    let mut daily_completions = serde_json::Map::new();

    let thirty_days_ago = OffsetDateTime::now_utc() - time::Duration::days(30);
    let day_format = time::macros::format_description!("[year]-[month]-[day]");

    for habit in &habits {
        let completions: Vec<CompletionRow> =
            sqlx::query_as("SELECT date,count,notes FROM habit_completions WHERE habit_id=?")
                .bind(&habit.id)
                .fetch_all(&db_pool)
                .await?;
        total_completions += completions.len() as i64;

        for completion in &completions {
            if completion.date >= thirty_days_ago {
                let key = completion.date.date().format(day_format).unwrap_or_default();
                let entry = daily_completions.entry(key).or_insert(json!(0));
                *entry = json!(entry.as_i64().unwrap_or(0) + 1);
            }
        }
    }

    let average_streak = if total_habits > 0 {
        let sum: i64 = habits.iter().map(|h| h.streak_current).sum();
        round1(sum as f64 / total_habits as f64)
    } else {
        0.0
    };
    let longest_streak = habits.iter().map(|h| h.streak_longest).max().unwrap_or(0);

    Ok(Json(json!({
        "analytics": {
            "totalHabits": total_habits,
            "totalCompletions": total_completions,
            "averageStreak": average_streak,
            "longestStreak": longest_streak,
            "dailyCompletions": daily_completions,
        },
    })))
}

pub(crate) fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}
