pub mod ai;
pub mod api;
pub mod config;
pub mod db;

pub use db::DbPool;

use crate::ai::AiClient;
use config::Config;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub ai: AiClient,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let ai = AiClient::new(config.ai.clone());
        Self { config, db, ai }
    }
}
