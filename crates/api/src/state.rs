//! Application state shared by every request handler

use std::sync::Arc;

use crate::{auth::JwtManager, config::Config, relay::RelayState};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub jwt: JwtManager,
    pub relay: RelayState,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let jwt = JwtManager::new(&config.jwt_secret, config.jwt_expiry_hours);
        Self {
            config: Arc::new(config),
            jwt,
            relay: RelayState::new(),
        }
    }
}
