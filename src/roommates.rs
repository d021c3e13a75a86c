//! Mock roommates surface. Nothing here touches the database; the payloads
//! exist so the dashboard renders, and the shapes match the real endpoints
//! that will eventually back them.

use axum::{
    Json, Router, debug_handler,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use time::format_description::well_known::Rfc3339;

use crate::{AppError, AppResult, AppState, auth::AuthUser};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_roommates))
        .route("/invite", post(invite))
        .route("/analytics", get(analytics))
}

#[debug_handler(state = AppState)]
async fn list_roommates(_user: AuthUser) -> Json<Value> {
    Json(json!({
        "roommates": [
            {
                "id": "1",
                "name": "Alex Johnson",
                "email": "alex@example.com",
                "avatar": null,
                "joinedAt": "2024-01-15T00:00:00Z",
                "isActive": true,
            },
            {
                "id": "2",
                "name": "Sarah Chen",
                "email": "sarah@example.com",
                "avatar": null,
                "joinedAt": "2024-02-01T00:00:00Z",
                "isActive": true,
            },
        ],
        "chores": [
            {
                "id": "1",
                "title": "Clean Kitchen",
                "assignedTo": "Alex Johnson",
                "dueDate": in_days(2),
                "completed": false,
                "priority": "high",
            },
            {
                "id": "2",
                "title": "Take Out Trash",
                "assignedTo": "Sarah Chen",
                "dueDate": in_days(1),
                "completed": false,
                "priority": "medium",
            },
        ],
        "expenses": [
            {
                "id": "1",
                "description": "Groceries",
                "amount": 85.5,
                "paidBy": "Alex Johnson",
                "splitBetween": ["Alex Johnson", "Sarah Chen"],
                "date": "2024-01-20T00:00:00Z",
                "category": "food",
            },
            {
                "id": "2",
                "description": "Internet Bill",
                "amount": 60.0,
                "paidBy": "Sarah Chen",
                "splitBetween": ["Alex Johnson", "Sarah Chen"],
                "date": "2024-01-15T00:00:00Z",
                "category": "utilities",
            },
        ],
    }))
}

#[derive(Deserialize)]
struct InvitePayload {
    email: Option<String>,
}

#[debug_handler(state = AppState)]
async fn invite(_user: AuthUser, Json(payload): Json<InvitePayload>) -> AppResult<Response> {
    let email = payload.email.unwrap_or_default();
    if !email.contains('@') {
        return Err(AppError::validation("Please provide a valid email"));
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("Invitation sent to {email}"),
            "invitation": {
                "email": email,
                "sentAt": now_rfc3339(),
                "status": "pending",
            },
        })),
    )
        .into_response())
}

#[debug_handler(state = AppState)]
async fn analytics(_user: AuthUser) -> Json<Value> {
    Json(json!({
        "analytics": {
            "totalRoommates": 2,
            "activeChores": 2,
            "completedChores": 8,
            "totalExpenses": 145.5,
            "averageExpensePerPerson": 72.75,
            "monthlyExpenses": [
                { "month": "Jan", "amount": 145.5 },
                { "month": "Dec", "amount": 230.2 },
                { "month": "Nov", "amount": 180.75 },
            ],
        },
    }))
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

fn in_days(days: i64) -> String {
    (time::OffsetDateTime::now_utc() + time::Duration::days(days))
        .format(&Rfc3339)
        .unwrap_or_default()
}
