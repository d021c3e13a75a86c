pub mod mailer;

use axum::{
    Json, Router, debug_handler,
    extract::State,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{AppError, AppResult, AppState, Mailer};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/contact", post(contact))
        .route("/chat", post(chat))
        .route("/verify", get(verify))
}

#[derive(Deserialize)]
struct ContactPayload {
    name: Option<String>,
    email: Option<String>,
    subject: Option<String>,
    message: Option<String>,
}

// Delivery failures deliberately do not fail these requests: the UI never
// blocks on email. Only request-shape problems get a 400.

#[debug_handler(state = AppState)]
async fn contact(
    State(mailer): State<Mailer>,
    Json(payload): Json<ContactPayload>,
) -> AppResult<Json<Value>> {
    let mut errors = Vec::new();
    let name = payload.name.unwrap_or_default();
    let email = payload.email.unwrap_or_default();
    let message = payload.message.unwrap_or_default();
    if name.trim().is_empty() {
        errors.push("Name is required".to_string());
    }
    if !email.contains('@') {
        errors.push("Please provide a valid email".to_string());
    }
    if message.trim().is_empty() {
        errors.push("Message is required".to_string());
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let subject = payload.subject.unwrap_or_default();
    let subject_line = format!(
        "[Contact] {} from {name}",
        if subject.is_empty() { "New message" } else { &subject },
    );
    let text = format!("Name: {name}\nEmail: {email}\nSubject: {subject}\n\nMessage:\n{message}");

    let delivery = mailer
        .send("Cohabify Support", &subject_line, text, Some(&email))
        .await;

    Ok(Json(json!({
        "message": "Message accepted",
        "delivered": delivery.delivered,
        "previewUrl": delivery.preview_url,
    })))
}

#[derive(Deserialize)]
struct ChatPayload {
    user: Option<String>,
    text: Option<String>,
}

#[debug_handler(state = AppState)]
async fn chat(
    State(mailer): State<Mailer>,
    Json(payload): Json<ChatPayload>,
) -> AppResult<Json<Value>> {
    let text = payload.text.unwrap_or_default();
    if text.trim().is_empty() {
        return Err(AppError::validation("Text is required"));
    }

    let subject_line = match payload.user.as_deref() {
        Some(user) if !user.is_empty() => format!("[Live Chat] From {user}"),
        _ => "[Live Chat] New message".to_string(),
    };
    let body = format!(
        "User: {}\n\n{text}",
        payload.user.as_deref().unwrap_or("Anonymous"),
    );

    let delivery = mailer.send("Cohabify Chat", &subject_line, body, None).await;

    Ok(Json(json!({
        "message": "Chat message accepted",
        "delivered": delivery.delivered,
        "previewUrl": delivery.preview_url,
    })))
}

#[debug_handler(state = AppState)]
async fn verify(State(mailer): State<Mailer>) -> Json<Value> {
    match mailer.verify().await {
        Ok(ok) => Json(json!({ "ok": ok })),
        Err(error) => Json(json!({ "ok": false, "error": error })),
    }
}
