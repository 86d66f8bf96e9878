use std::sync::Arc;

use crate::{config::Config, database::ReportStore, ids::IdAllocator};

pub struct State {
    pub config: Config,
    pub store: ReportStore,
    pub ids: IdAllocator,
}

impl State {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();

        let store = ReportStore::connect(&config.database_path)
            .await
            .expect("Database misconfigured!");

        Arc::new(Self {
            config,
            store,
            ids: IdAllocator::default(),
        })
    }
}
