//! Chat-backed file vault: uploads are stored as chat messages, metadata in
//! SQLite, and documents can be summarized or turned into quizzes by a
//! generative model with the results cached back into the chat.

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// The full application router with middleware applied.
pub fn app(state: state::AppState) -> Router {
    routes::routes::routes()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
