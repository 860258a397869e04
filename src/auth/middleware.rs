use crate::auth::jwt::AuthService;
use crate::context;
use crate::types::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

/// Header carrying a static API key.
pub const API_KEY_HEADER: &str = "api-key";

/// Accepts either a configured `api-key` header or an `Authorization: Bearer`
/// token. Bearer tokens are verified when a JWT secret is configured and are
/// stored as the request's current auth token.
///
/// Keys and secrets are read from the live configuration on every request.
pub async fn auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let config = state.config_manager.config();
    if !config.auth.enabled {
        return Ok(next.run(req).await);
    }

    if let Some(api_key) = header_value(req.headers(), API_KEY_HEADER) {
        if config.api_keys().iter().any(|key| key == api_key) {
            return Ok(next.run(req).await);
        }
        return Err(AppError::Auth("Invalid or missing API Key".to_string()));
    }

    let token = header_value(req.headers(), header::AUTHORIZATION.as_str())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Auth("Missing Bearer token".to_string()))?
        .to_string();

    if let Some(secret) = config.jwt_secret() {
        let claims = AuthService::new(secret).verify_token(&token)?;
        tracing::debug!(subject = %claims.sub, "bearer token verified");
    }

    context::set_current_auth_token(Some(token))?;
    Ok(next.run(req).await)
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|h| h.to_str().ok())
}
