//! # API Middleware
//!
//! Authentification des routes protégées par l'extracteur `CurrentUser`:
//! - lit l'en-tête `Authorization: Bearer <token>`
//! - vérifie la signature, l'expiration et l'usage (`access`) du JWT
//! - charge l'utilisateur depuis le store et refuse les comptes désactivés
//!
//! Les tokens de parcours (vérification d'email, réinitialisation) sont
//! refusés ici: ils ne servent qu'aux endpoints de leur étape.

use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;

use crate::api::state::AppState;
use crate::domain::User;
use crate::infrastructure::error::{unauthorized, AppError};

/// Extension pour obtenir l'utilisateur courant
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl std::ops::Deref for CurrentUser {
    type Target = User;

    fn deref(&self) -> &User {
        &self.0
    }
}

impl FromRequest for CurrentUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let token = bearer_token(req);

        Box::pin(async move {
            let state = state.ok_or_else(|| {
                AppError::InternalError("application state is not registered".to_string())
            })?;
            let token = token.ok_or_else(|| unauthorized("Authentication required."))?;
            let user = state.auth.authenticate(&token).await?;
            Ok(CurrentUser(user))
        })
    }
}

/// Token porté par l'en-tête `Authorization`
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn extracts_bearer_token() {
        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer abc.def.ghi"))
            .to_http_request();
        assert_eq!(bearer_token(&req).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn ignores_other_schemes_and_empty_tokens() {
        let basic = TestRequest::default()
            .insert_header((AUTHORIZATION, "Basic dXNlcjpwYXNz"))
            .to_http_request();
        assert_eq!(bearer_token(&basic), None);

        let empty = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer   "))
            .to_http_request();
        assert_eq!(bearer_token(&empty), None);

        assert_eq!(bearer_token(&TestRequest::default().to_http_request()), None);
    }
}
