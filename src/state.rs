use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::payout::PayoutClient;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<Config>,
    pub payout: PayoutClient,
}
