use crate::state::AppState;
use axum::Router;

mod claims;
mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod legacy;
pub mod lockout;
#[cfg(test)]
mod memory;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod roles;
pub mod service;
pub mod validation;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
        .merge(handlers::admin_routes())
}
