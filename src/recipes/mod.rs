pub mod dto;
pub mod handlers;
pub mod repo;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router(state: AppState) -> Router<AppState> {
    handlers::public_routes()
        .merge(handlers::read_routes())
        .merge(handlers::write_routes(state))
}
