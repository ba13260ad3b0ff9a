use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, error};

use super::services::{resolve_session, CurrentUser};
use crate::{
    cookies::{append_cookie, cookie_value, removal_cookie, SESSION_COOKIE},
    error::AppError,
    state::AppState,
};

/// Gate for protected routes: resolves the session cookie and stores
/// `CurrentUser` in request extensions, otherwise redirects to `/login`.
pub async fn require_login(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = cookie_value(request.headers(), SESSION_COOKIE).map(str::to_owned);
    let resolved = match token.as_deref() {
        Some(t) => resolve_session(&state, t).await,
        None => Ok(None),
    };

    match resolved {
        Ok(Some(current)) => {
            request.extensions_mut().insert(current);
            next.run(request).await
        }
        Ok(None) => {
            debug!(path = %request.uri().path(), "unauthenticated request redirected to login");
            let mut response = Redirect::to("/login").into_response();
            if token.is_some() {
                append_cookie(
                    response.headers_mut(),
                    removal_cookie(SESSION_COOKIE, state.config.session.cookie_secure),
                );
            }
            response
        }
        Err(e) => AppError::from(e).into_response(),
    }
}

/// Logged-in user if there is one; never rejects.
pub struct MaybeUser(pub Option<CurrentUser>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(current) = parts.extensions.get::<CurrentUser>() {
            return Ok(MaybeUser(Some(current.clone())));
        }
        let Some(token) = cookie_value(&parts.headers, SESSION_COOKIE) else {
            return Ok(MaybeUser(None));
        };
        match resolve_session(state, token).await {
            Ok(current) => Ok(MaybeUser(current)),
            Err(e) => {
                error!(error = %e, "session lookup failed; treating request as anonymous");
                Ok(MaybeUser(None))
            }
        }
    }
}
