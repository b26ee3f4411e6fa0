use crate::state::AppState;
use axum::Router;

pub mod document;
pub mod dto;
pub mod handlers;
pub mod repo_types;
pub mod services;
pub mod unique;

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
