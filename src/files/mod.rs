mod dto;
pub mod handlers;

pub use dto::{files_href, parent_path, ListingItem};

use crate::{auth::extractors::require_login, state::AppState};
use axum::{middleware, routing::get, Router};

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/files", get(handlers::list_files))
        .route_layer(middleware::from_fn_with_state(state, require_login))
}
