use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware,
    response::Response,
    routing::get,
    Extension, Form, Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::{FieldErrors, LoginForm, RegisterForm},
    extractors::{require_login, MaybeUser},
    services::{self, CurrentUser, RegisterError},
};
use crate::{
    cookies::{append_cookie, build_cookie, removal_cookie, SESSION_COOKIE},
    error::AppError,
    flash::{redirect_with, Flash, Level},
    state::AppState,
    views::{self, PageContext},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/register", get(register_page).post(register))
}

pub fn session_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/logout", get(logout))
        .route_layer(middleware::from_fn_with_state(state, require_login))
}

#[instrument(skip_all)]
pub async fn login_page(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    headers: HeaderMap,
) -> Response {
    let ctx = PageContext::new(&state, &headers, user.as_ref());
    views::respond(&ctx, StatusCode::OK, views::login(&ctx, "", &FieldErrors::default()))
}

#[instrument(skip(state, headers, form))]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(mut form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let errors = form.validate();
    if !errors.is_empty() {
        let ctx = PageContext::new(&state, &headers, None);
        return Ok(views::respond(&ctx, StatusCode::OK, views::login(&ctx, &form.email, &errors)));
    }

    let Some(user) = services::authenticate(&state, &form.email, &form.password).await? else {
        warn!("login rejected");
        let mut ctx = PageContext::new(&state, &headers, None);
        ctx.flash = Some(Flash::new(Level::Danger, "Invalid email or password."));
        let html = views::login(&ctx, &form.email, &FieldErrors::default());
        return Ok(views::respond(&ctx, StatusCode::OK, html));
    };

    let token = services::start_session(&state, &user).await?;
    let secure = state.config.session.cookie_secure;
    let max_age = state.config.session.ttl_minutes.max(1) * 60;

    let mut response = redirect_with("/", Flash::new(Level::Success, "You are logged in."), secure);
    append_cookie(
        response.headers_mut(),
        build_cookie(SESSION_COOKIE, &token, Some(max_age), secure),
    );
    info!(user_id = user.id, "user logged in");
    Ok(response)
}

#[instrument(skip_all)]
pub async fn register_page(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    headers: HeaderMap,
) -> Response {
    let ctx = PageContext::new(&state, &headers, user.as_ref());
    views::respond(
        &ctx,
        StatusCode::OK,
        views::register(&ctx, "", "", &FieldErrors::default()),
    )
}

#[instrument(skip(state, headers, form))]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(mut form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    let mut errors = form.validate();
    if errors.is_empty() {
        match services::register(&state, &form).await {
            Ok(_) => {
                return Ok(redirect_with(
                    "/login",
                    Flash::new(Level::Success, "Registration complete. Please log in."),
                    state.config.session.cookie_secure,
                ));
            }
            Err(RegisterError::Invalid(e)) => errors = e,
            Err(RegisterError::Store(e)) => return Err(e.into()),
            Err(RegisterError::Hash(e)) => return Err(e.into()),
        }
    }

    let ctx = PageContext::new(&state, &headers, None);
    Ok(views::respond(
        &ctx,
        StatusCode::OK,
        views::register(&ctx, &form.username, &form.email, &errors),
    ))
}

#[instrument(skip_all, fields(user_id = current.user.id))]
pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    services::end_session(&state, &current).await?;
    let secure = state.config.session.cookie_secure;
    let mut response = redirect_with("/", Flash::new(Level::Info, "You have logged out."), secure);
    append_cookie(response.headers_mut(), removal_cookie(SESSION_COOKIE, secure));
    Ok(response)
}
