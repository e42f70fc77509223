use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use crate::{
    api::state::AppState,
    domain::Identity,
    error::AppError,
};

#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub identity: Identity,
}

impl CurrentUser {
    pub fn user_id(&self) -> &str {
        &self.identity.user_id
    }
}

/// Bearer token from the Authorization header, or the `session` cookie.
fn extract_token(request: &Request, jar: &CookieJar) -> Option<String> {
    let from_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());

    from_header.or_else(|| jar.get("session").map(|cookie| cookie.value().to_string()))
}

async fn authenticate(state: &AppState, token: Option<String>) -> Result<Identity, AppError> {
    let token = token.ok_or(AppError::Unauthorized)?;

    state
        .service_context
        .identity_provider
        .identify(&token)
        .await
}

pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(&request, &jar);
    let identity = authenticate(&state, token).await?;

    // Insert current user into request extensions
    request.extensions_mut().insert(CurrentUser { identity });

    Ok(next.run(request).await)
}

pub async fn require_admin(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(&request, &jar);
    let identity = authenticate(&state, token).await?;

    if !identity.is_admin() {
        return Err(AppError::Permission(format!(
            "{} lacks the admin claim for {} {}",
            identity.user_id,
            request.method(),
            request.uri().path()
        )));
    }

    request.extensions_mut().insert(CurrentUser { identity });

    Ok(next.run(request).await)
}
