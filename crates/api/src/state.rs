use std::sync::Arc;

use crate::{
    config::Config, repos::Repos, rewards::RewardQueue, services::EmailSender, stores::Stores,
    tokens::ReviewTokenService,
};

#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Database repositories.
    pub repos: Repos,
    /// Ephemeral stores (Redis or in-process).
    pub stores: Stores,
    /// Email sender.
    pub email: Arc<dyn EmailSender>,
    /// Reward jobs for the background worker.
    pub rewards: RewardQueue,
}

impl AppState {
    pub fn tokens(&self) -> ReviewTokenService {
        ReviewTokenService::new(self.repos.tokens.clone())
    }
}
