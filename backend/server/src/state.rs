use std::sync::Arc;

use crate::{
    config::Config,
    credentials::{Credentials, Sha256Hasher},
    database::Store,
    error::AppError,
    guard::AccessGuard,
    reviews::ReviewAggregator,
    token::TokenIssuer,
};

pub struct State {
    pub config: Config,
    pub guard: AccessGuard,
    pub credentials: Credentials,
    pub reviews: ReviewAggregator,
}

impl State {
    pub fn new(config: Config) -> Result<Arc<Self>, AppError> {
        let store = Arc::new(Store::open(&config.database_path, config.busy_timeout)?);

        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Config, store: Arc<Store>) -> Arc<Self> {
        let tokens = Arc::new(TokenIssuer::new(
            config.jwt_secret.as_bytes(),
            config.token_ttl,
        ));

        Arc::new(Self {
            guard: AccessGuard::new(tokens.clone()),
            credentials: Credentials::new(store.clone(), tokens, Arc::new(Sha256Hasher)),
            reviews: ReviewAggregator::new(store),
            config,
        })
    }
}
