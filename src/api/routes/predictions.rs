use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::api::routes::middleware::CurrentUser;
use crate::api::state::AppState;
use crate::infrastructure::error::AppResult;

#[derive(Debug, Deserialize, Validate)]
pub struct CompareRequest {
    #[validate(length(max = 50, message = "You can compare at most 50 analyses at once."))]
    #[serde(default)]
    pub ids: Vec<i64>,
}

/// Tableau de bord: utilisateur, total et activité des 7 derniers jours
#[get("/home")]
pub async fn home(user: CurrentUser, state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let overview = state.analysis.overview(&user).await?;
    Ok(HttpResponse::Ok().json(json!({
        "user": user.0,
        "prediction_count": overview.prediction_count,
        "recent_activity": overview.recent_activity,
    })))
}

/// Page de résultat d'une analyse
#[get("/predictions/{id}")]
pub async fn get_prediction(
    user: CurrentUser,
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let report = state.analysis.get_report(&user, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(report))
}

#[get("/history")]
pub async fn history(user: CurrentUser, state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let predictions = state.analysis.history(&user).await?;
    Ok(HttpResponse::Ok().json(json!({
        "total": predictions.len(),
        "predictions": predictions,
    })))
}

#[post("/compare/data")]
pub async fn compare_data(
    user: CurrentUser,
    payload: web::Json<CompareRequest>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    payload.validate()?;
    let predictions = state.analysis.compare(&user, &payload.ids).await?;
    Ok(HttpResponse::Ok().json(json!({ "predictions": predictions })))
}
