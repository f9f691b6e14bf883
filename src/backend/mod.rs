//! A small collection store speaking the same REST dialect as
//! [`RestStore`](crate::store::RestStore), for local development and tests.

pub mod db;
mod records;

use axum::{Router, routing::{delete, get}};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .nest("/api", api())
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

fn api() -> Router<AppState> {
    Router::new()
        .route("/{collection}", get(records::list_records).post(records::create_record))
        .route("/{collection}/{id}", delete(records::delete_record))
}
