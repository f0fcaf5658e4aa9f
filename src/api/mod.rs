pub mod routes;
pub mod state;

use actix_web::{error::JsonPayloadError, web, HttpRequest};

pub use state::AppState;

use crate::infrastructure::error::AppError;

/// Configure toutes les routes de l'API
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler));

    cfg.service(
        web::scope("/api/v1")
            // Routes publiques
            .service(routes::auth::register)
            .service(routes::auth::verify_email)
            .service(routes::auth::resend_otp)
            .service(routes::auth::login)
            .service(routes::auth::admin_login)
            .service(routes::auth::logout)
            .service(routes::auth::forgot_password)
            .service(routes::auth::verify_reset_code)
            .service(routes::auth::reset_password)
            // Routes protégées (extracteur CurrentUser)
            .service(routes::predictions::home)
            .service(routes::profile::get_profile)
            .service(routes::profile::update_profile)
            .service(routes::analysis::analyze)
            .service(routes::predictions::get_prediction)
            .service(routes::predictions::history)
            .service(routes::predictions::compare_data)
            .service(routes::chat::chat)
            .service(routes::chat::history)
            .service(routes::chat::suggestions),
    );

    // Endpoint de santé
    cfg.service(web::resource("/health").route(web::get().to(health_check)));
}

/// Les corps JSON invalides suivent le format d'erreur commun
fn json_error_handler(error: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(format!("Invalid JSON payload: {}", error)).into()
}

/// Endpoint de santé pour monitoring
async fn health_check(state: web::Data<AppState>) -> impl actix_web::Responder {
    actix_web::HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": crate::NAME,
        "version": crate::VERSION,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": state.config.run_mode,
        "chat_configured": state.chat.is_configured(),
    }))
}
