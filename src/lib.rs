pub mod broadcast;
pub mod config;
pub mod judge;
pub mod payout;
pub mod phone;
pub mod routes;
pub mod state;
pub mod types;

use axum::Router;
use state::AppState;

pub fn app(state: AppState) -> Router {
    routes::router(state)
}
