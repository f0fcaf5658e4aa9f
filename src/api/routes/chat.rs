use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::api::routes::middleware::CurrentUser;
use crate::api::state::AppState;
use crate::core::chat_service::QUICK_SUGGESTIONS;
use crate::infrastructure::error::AppResult;

const HISTORY_LIMIT: i64 = 20;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

/// Les échecs de l'assistant sont dans le corps (`success: false`), pas dans le statut
#[post("/chat")]
pub async fn chat(
    user: CurrentUser,
    payload: web::Json<ChatRequest>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let reply = state.chat.ask(&user, &payload.message).await?;
    Ok(HttpResponse::Ok().json(reply))
}

/// Dernières conversations, plus récentes d'abord
#[get("/chat/history")]
pub async fn history(user: CurrentUser, state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let conversations = state.chat.history(&user, HISTORY_LIMIT).await?;
    Ok(HttpResponse::Ok().json(json!({ "conversations": conversations })))
}

#[get("/chat/suggestions")]
pub async fn suggestions(_user: CurrentUser) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "suggestions": QUICK_SUGGESTIONS }))
}
