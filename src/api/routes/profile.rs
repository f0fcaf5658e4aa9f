use actix_web::{get, put, web, HttpResponse};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::api::routes::middleware::CurrentUser;
use crate::api::state::AppState;
use crate::domain::{AccountUpdate, ProfileUpdate};
use crate::infrastructure::error::AppResult;

/// Formulaire de la page profil (compte + profil)
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 3, max = 150, message = "Username must be between 3 and 150 characters."))]
    pub username: String,
    #[validate(email(message = "Please enter a valid email address."))]
    pub email: String,
    #[validate(length(max = 150))]
    #[serde(default)]
    pub first_name: String,
    #[validate(length(max = 150))]
    #[serde(default)]
    pub last_name: String,
    #[validate(length(max = 500, message = "Bio must be at most 500 characters."))]
    #[serde(default)]
    pub bio: String,
    #[validate(length(max = 20, message = "Phone number must be at most 20 characters."))]
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default = "default_notifications")]
    pub email_notifications: bool,
}

fn default_notifications() -> bool {
    true
}

#[get("/profile")]
pub async fn get_profile(user: CurrentUser, state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let view = state.profiles.view(&user).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[put("/profile")]
pub async fn update_profile(
    user: CurrentUser,
    payload: web::Json<UpdateProfileRequest>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    payload.validate()?;
    let form = payload.into_inner();

    let view = state
        .profiles
        .update(
            &user,
            AccountUpdate {
                username: form.username,
                email: form.email,
                first_name: form.first_name,
                last_name: form.last_name,
            },
            ProfileUpdate {
                bio: form.bio,
                phone: form.phone,
                date_of_birth: form.date_of_birth,
                email_notifications: form.email_notifications,
            },
        )
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "profile": view,
        "message": "Your profile has been updated successfully!",
    })))
}
