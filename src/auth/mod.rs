use crate::state::AppState;
use axum::Router;

pub mod claims;
mod dto;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo_types;
pub mod reset;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
