use std::sync::Arc;

use super::{
    config::Config,
    database::Store,
    pinning::{PinError, PinningService},
};

pub struct AppState {
    pub config: Config,
    pub store: Store,
    pub pinning: PinningService,
}

impl AppState {
    pub fn new(config: Config) -> Result<Arc<Self>, PinError> {
        let store = if config.seed {
            Store::seeded()
        } else {
            Store::new()
        };

        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, store: Store) -> Result<Arc<Self>, PinError> {
        let pinning = PinningService::from_config(&config)?;

        Ok(Arc::new(Self {
            config,
            store,
            pinning,
        }))
    }
}
