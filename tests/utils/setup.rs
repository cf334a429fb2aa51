use std::sync::Arc;

use diamondstats::{
    store::models::{League, NewLeague},
    stats::Ruleset,
    AppConfig, AppState, ImportService, InMemoryStatsStore, QueryService, StatsStore,
};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub memory: Arc<InMemoryStatsStore>,
    pub store: Arc<dyn StatsStore>,
    pub imports: Arc<ImportService>,
    pub queries: QueryService,
    pub league: League,
    pub state: AppState,
}

pub struct TestSetupBuilder {
    ruleset: Ruleset,
    config: AppConfig,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            ruleset: Ruleset::Softball,
            config: AppConfig::default(),
        }
    }

    pub fn baseball(mut self) -> Self {
        self.ruleset = Ruleset::Baseball;
        self
    }

    pub async fn build(self) -> TestSetup {
        let memory = Arc::new(InMemoryStatsStore::new());
        let store: Arc<dyn StatsStore> = memory.clone();

        let league = store
            .create_league(NewLeague {
                name: "Spring League".to_string(),
                season: "2025".to_string(),
                ruleset: self.ruleset,
            })
            .await
            .expect("league should be created");

        let state = AppState::new(Arc::clone(&store), self.config.clone());

        TestSetup {
            imports: Arc::clone(&state.import_service),
            queries: QueryService::new(Arc::clone(&store), self.config.query_limits()),
            memory,
            store,
            league,
            state,
        }
    }
}

impl Default for TestSetupBuilder {
    fn default() -> Self {
        Self::new()
    }
}
