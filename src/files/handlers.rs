use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    Extension,
};
use tracing::{info, instrument, warn};

use super::dto::{extract_items, FilesQuery};
use crate::{
    auth::services::CurrentUser,
    flash::{redirect_with, Flash, Level},
    state::AppState,
    views::{self, PageContext},
    yandex::DiskError,
};

fn upstream_message(err: &DiskError) -> String {
    match err {
        DiskError::Status { status, .. } => {
            format!("Could not fetch files: the storage service answered {status}.")
        }
        _ => "Could not fetch files: the storage service is unavailable.".to_string(),
    }
}

/// GET /files?public_key=..&path=..
#[instrument(skip_all, fields(user_id = current.user.id))]
pub async fn list_files(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<FilesQuery>,
    headers: HeaderMap,
) -> Response {
    let secure = state.config.session.cookie_secure;

    let Some(public_key) = query
        .public_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
    else {
        return redirect_with("/", Flash::new(Level::Warning, "No public key provided."), secure);
    };
    let path = query
        .path
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or("/");

    let listing = match state.disk.fetch_listing(public_key, path).await {
        Ok(listing) => listing,
        Err(e) => {
            warn!(error = %e, path, "listing fetch failed");
            return redirect_with("/", Flash::new(Level::Danger, upstream_message(&e)), secure);
        }
    };

    let items = extract_items(&listing);
    info!(count = items.len(), path, "listing rendered");

    let ctx = PageContext::new(&state, &headers, Some(&current));
    views::respond(
        &ctx,
        StatusCode::OK,
        views::files(&ctx, public_key, path, &items),
    )
}
