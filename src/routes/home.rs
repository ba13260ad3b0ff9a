use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use tracing::instrument;

use crate::{
    auth::extractors::MaybeUser,
    state::AppState,
    views::{self, PageContext},
};

#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    headers: HeaderMap,
) -> Response {
    let ctx = PageContext::new(&state, &headers, user.as_ref());
    views::respond(&ctx, StatusCode::OK, views::index(&ctx))
}

pub async fn health() -> &'static str {
    "ok"
}
