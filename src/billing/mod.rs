use crate::state::AppState;
use axum::Router;

mod dto;
pub mod handlers;
pub mod idempotency;
pub mod webhook;

pub fn router() -> Router<AppState> {
    handlers::billing_routes()
}
