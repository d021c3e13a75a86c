use axum::{
    Json, Router, debug_handler,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::{
    AppError, AppResult, AppState,
    auth::{AuthUser, rfc3339},
    habits::round1,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_moods).post(create_mood))
        .route("/analytics", get(analytics))
        .route("/{id}", put(update_mood).delete(delete_mood))
}

const MOODS: &[&str] = &["very_sad", "sad", "neutral", "happy", "very_happy"];

/// very_sad=1 .. very_happy=5, the fixed map the trend math runs on.
fn mood_value(mood: &str) -> i64 {
    MOODS.iter().position(|m| *m == mood).map_or(0, |i| i as i64 + 1)
}

#[derive(sqlx::FromRow)]
struct MoodRow {
    id: String,
    mood: String,
    intensity: i64,
    notes: Option<String>,
    tags: String,
    date: OffsetDateTime,
    created_at: OffsetDateTime,
}

fn mood_json(row: &MoodRow, user_id: &str) -> Value {
    let tags: Vec<String> = serde_json::from_str(&row.tags).unwrap_or_default();
    json!({
        "id": row.id,
        "user": user_id,
        "mood": row.mood,
        "intensity": row.intensity,
        "notes": row.notes,
        "tags": tags,
        "date": rfc3339(row.date),
        "createdAt": rfc3339(row.created_at),
    })
}

/// Accepts RFC 3339 or a bare `YYYY-MM-DD` (read as UTC midnight).
fn parse_date_param(s: &str) -> Option<OffsetDateTime> {
    if let Ok(t) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(t);
    }
    let day_format = time::macros::format_description!("[year]-[month]-[day]");
    time::Date::parse(s, day_format)
        .ok()
        .map(|d| d.midnight().assume_utc())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    start_date: Option<String>,
    end_date: Option<String>,
    limit: Option<i64>,
}

#[debug_handler(state = AppState)]
async fn list_moods(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Value>> {
    let start = match &query.start_date {
        Some(s) => Some(parse_date_param(s).ok_or(AppError::validation("Invalid startDate"))?),
        None => None,
    };
    let end = match &query.end_date {
        Some(s) => Some(parse_date_param(s).ok_or(AppError::validation("Invalid endDate"))?),
        None => None,
    };

    let mut sql = String::from(
        "SELECT id,mood,intensity,notes,tags,date,created_at FROM moods WHERE user_id=?",
    );
    if start.is_some() {
        sql += " AND date>=?";
    }
    if end.is_some() {
        sql += " AND date<=?";
    }
    sql += " ORDER BY date DESC LIMIT ?";

    let mut q = sqlx::query_as::<_, MoodRow>(&sql).bind(&user.id);
    if let Some(start) = start {
        q = q.bind(start);
    }
    if let Some(end) = end {
        q = q.bind(end);
    }
    let moods = q.bind(query.limit.unwrap_or(30)).fetch_all(&db_pool).await?;

    let moods: Vec<Value> = moods.iter().map(|m| mood_json(m, &user.id)).collect();
    Ok(Json(json!({ "moods": moods })))
}

#[derive(Deserialize)]
struct MoodPayload {
    mood: Option<String>,
    intensity: Option<i64>,
    notes: Option<String>,
    tags: Option<Vec<String>>,
    date: Option<String>,
}

fn validate_mood_fields(errors: &mut Vec<String>, payload: &MoodPayload) {
    if let Some(mood) = payload.mood.as_deref()
        && !MOODS.contains(&mood)
    {
        errors.push("Invalid mood".to_string());
    }
    if let Some(intensity) = payload.intensity
        && !(1..=5).contains(&intensity)
    {
        errors.push("Intensity must be between 1 and 5".to_string());
    }
    if payload.notes.as_deref().is_some_and(|n| n.len() > 500) {
        errors.push("Notes cannot exceed 500 characters".to_string());
    }
    if let Some(tags) = &payload.tags
        && tags.iter().any(|t| t.len() > 50)
    {
        errors.push("Tag cannot exceed 50 characters".to_string());
    }
}

#[debug_handler(state = AppState)]
async fn create_mood(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Json(payload): Json<MoodPayload>,
) -> AppResult<Response> {
    let mut errors = Vec::new();
    if payload.mood.is_none() {
        errors.push("Mood is required".to_string());
    }
    if payload.intensity.is_none() {
        errors.push("Intensity is required".to_string());
    }
    validate_mood_fields(&mut errors, &payload);
    let date = match payload.date.as_deref() {
        Some(s) => match parse_date_param(s) {
            Some(t) => t,
            None => {
                errors.push("Invalid date".to_string());
                OffsetDateTime::now_utc()
            }
        },
        None => OffsetDateTime::now_utc(),
    };
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let id = Uuid::now_v7().to_string();
    let now = OffsetDateTime::now_utc();
    sqlx::query(
        "INSERT INTO moods (id,user_id,mood,intensity,notes,tags,date,created_at) VALUES (?,?,?,?,?,?,?,?)",
    )
    .bind(&id)
    .bind(&user.id)
    .bind(&payload.mood)
    .bind(payload.intensity)
    .bind(&payload.notes)
    .bind(serde_json::to_string(&payload.tags.unwrap_or_default())?)
    .bind(date)
    .bind(now)
    .execute(&db_pool)
    .await?;

    let row = sqlx::query_as::<_, MoodRow>(
        "SELECT id,mood,intensity,notes,tags,date,created_at FROM moods WHERE id=?",
    )
    .bind(&id)
    .fetch_one(&db_pool)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Mood logged successfully",
            "mood": mood_json(&row, &user.id),
        })),
    )
        .into_response())
}

#[debug_handler(state = AppState)]
async fn update_mood(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<MoodPayload>,
) -> AppResult<Json<Value>> {
    let mut errors = Vec::new();
    validate_mood_fields(&mut errors, &payload);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let row: Option<MoodRow> = sqlx::query_as(
        "SELECT id,mood,intensity,notes,tags,date,created_at FROM moods WHERE id=? AND user_id=?",
    )
    .bind(id.to_string())
    .bind(&user.id)
    .fetch_optional(&db_pool)
    .await?;
    let Some(mut row) = row else {
        return Err(AppError::NotFound("Mood entry not found"));
    };

    if let Some(mood) = payload.mood {
        row.mood = mood;
    }
    if let Some(intensity) = payload.intensity {
        row.intensity = intensity;
    }
    if let Some(notes) = payload.notes {
        row.notes = Some(notes);
    }
    if let Some(tags) = payload.tags {
        row.tags = serde_json::to_string(&tags)?;
    }

    sqlx::query("UPDATE moods SET mood=?, intensity=?, notes=?, tags=? WHERE id=?")
        .bind(&row.mood)
        .bind(row.intensity)
        .bind(&row.notes)
        .bind(&row.tags)
        .bind(&row.id)
        .execute(&db_pool)
        .await?;

    Ok(Json(json!({
        "message": "Mood updated successfully",
        "mood": mood_json(&row, &user.id),
    })))
}

#[debug_handler(state = AppState)]
async fn delete_mood(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let found: Option<(String,)> =
        sqlx::query_as("SELECT id FROM moods WHERE id=? AND user_id=?")
            .bind(id.to_string())
            .bind(&user.id)
            .fetch_optional(&db_pool)
            .await?;
    if found.is_none() {
        return Err(AppError::NotFound("Mood entry not found"));
    }

    sqlx::query("DELETE FROM moods WHERE id=?")
        .bind(id.to_string())
        .execute(&db_pool)
        .await?;

    Ok(Json(json!({ "message": "Mood entry deleted successfully" })))
}

#[derive(Deserialize)]
struct AnalyticsQuery {
    days: Option<i64>,
}

#[debug_handler(state = AppState)]
async fn analytics(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Query(query): Query<AnalyticsQuery>,
) -> AppResult<Json<Value>> {
    let days = query.days.unwrap_or(30).max(1);
    let now = OffsetDateTime::now_utc();
    let start = now - time::Duration::days(days);

    let moods: Vec<MoodRow> = sqlx::query_as(
        "SELECT id,mood,intensity,notes,tags,date,created_at FROM moods WHERE user_id=? AND date>=? ORDER BY date",
    )
    .bind(&user.id)
    .bind(start)
    .fetch_all(&db_pool)
    .await?;

    let mut mood_counts: serde_json::Map<String, Value> =
        MOODS.iter().map(|m| (m.to_string(), json!(0))).collect();
    let mut total_intensity = 0i64;
    let mut daily_moods = serde_json::Map::new();
    let day_format = time::macros::format_description!("[year]-[month]-[day]");

    for m in &moods {
        if let Some(entry) = mood_counts.get_mut(m.mood.as_str()) {
            *entry = json!(entry.as_i64().unwrap_or(0) + 1);
        }
        total_intensity += m.intensity;

        let key = m.date.date().format(day_format).unwrap_or_default();
        if let Some(day) = daily_moods
            .entry(key)
            .or_insert_with(|| json!([]))
            .as_array_mut()
        {
            day.push(json!({ "mood": m.mood, "intensity": m.intensity }));
        }
    }

    let average_intensity = if moods.is_empty() {
        0.0
    } else {
        round1(total_intensity as f64 / moods.len() as f64)
    };

    // Rolling weekly averages, most recent week last.
    let mut weekly_trends = Vec::new();
    let mut i = 0;
    while i < days {
        let week_start = now - time::Duration::days(i + 6);
        let week_end = now - time::Duration::days(i);
        let week: Vec<&MoodRow> = moods
            .iter()
            .filter(|m| m.date >= week_start && m.date <= week_end)
            .collect();
        if !week.is_empty() {
            let sum: i64 = week.iter().map(|m| mood_value(&m.mood)).sum();
            weekly_trends.push(json!({
                "week": format!(
                    "{} to {}",
                    week_start.date().format(day_format).unwrap_or_default(),
                    week_end.date().format(day_format).unwrap_or_default(),
                ),
                "average": round1(sum as f64 / week.len() as f64),
                "count": week.len(),
            }));
        }
        i += 7;
    }
    weekly_trends.reverse();

    Ok(Json(json!({
        "analytics": {
            "totalEntries": moods.len(),
            "averageIntensity": average_intensity,
            "moodDistribution": mood_counts,
            "dailyMoods": daily_moods,
            "weeklyTrends": weekly_trends,
        },
    })))
}
