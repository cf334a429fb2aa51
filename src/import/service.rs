use std::collections::HashMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::plan::{GameTarget, ImportAction, ImportDecision, ImportReport};
use super::planner::plan_import;
use crate::identity::MatchPolicy;
use crate::parser::{parse_game_xml, ParsedGame};
use crate::shared::AppError;
use crate::store::{SnapshotRequest, StatsStore};

const MAX_PLAN_ATTEMPTS: usize = 3;

pub struct ImportService {
    store: Arc<dyn StatsStore>,
    policy: MatchPolicy,
    game_mutexes: Arc<RwLock<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl ImportService {
    pub fn new(store: Arc<dyn StatsStore>, policy: MatchPolicy) -> Self {
        Self {
            store,
            policy,
            game_mutexes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Parses, reconciles and stores one game document.
    ///
    /// Imports of the same game are serialized; different games proceed in
    /// parallel. On any error nothing is written.
    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    pub async fn import_xml(&self, league_id: i64, bytes: &[u8]) -> Result<ImportReport, AppError> {
        let parsed = parse_game_xml(bytes).map_err(|err| {
            warn!(league_id, error = %err, "Rejected malformed game document");
            AppError::from(err)
        })?;
        let digest = hex::encode(Sha256::digest(bytes));

        let key = game_key(league_id, &parsed);
        let game_lock = self.game_lock(&key).await;
        let guard = game_lock.lock().await;
        let result = self.reconcile(league_id, &parsed, digest).await;
        drop(guard);
        self.clear_game_lock(&key, game_lock).await;

        let report = result?;
        info!(
            league_id,
            game_id = report.game_id,
            action = %report.action,
            digest = %report.digest,
            "Imported game document"
        );
        Ok(report)
    }

    /// Plans against a fresh snapshot and applies. A plan the store finds
    /// stale is re-planned, up to [`MAX_PLAN_ATTEMPTS`] times.
    async fn reconcile(
        &self,
        league_id: i64,
        parsed: &ParsedGame,
        digest: String,
    ) -> Result<ImportReport, AppError> {
        let mut attempt = 1;
        loop {
            match self.plan_and_apply(league_id, parsed, &digest).await {
                Err(AppError::StalePlan(reason)) if attempt < MAX_PLAN_ATTEMPTS => {
                    debug!(league_id, attempt, %reason, "Re-planning stale import");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn plan_and_apply(
        &self,
        league_id: i64,
        parsed: &ParsedGame,
        digest: &str,
    ) -> Result<ImportReport, AppError> {
        let request = SnapshotRequest {
            league_id,
            date: parsed.date,
            game_external_id: parsed.external_id.clone(),
            player_external_ids: parsed
                .teams()
                .iter()
                .flat_map(|team| team.players.iter())
                .filter_map(|player| player.external_id.clone())
                .collect(),
        };
        let snapshot = self.store.import_snapshot(&request).await?;

        let decision = plan_import(parsed, &snapshot, digest, &self.policy).map_err(|err| {
            warn!(league_id, %digest, error = %err, "Import could not be reconciled");
            AppError::from(err)
        })?;

        let report = match decision {
            ImportDecision::Unchanged { game_id } => {
                debug!(league_id, game_id, %digest, "Skipping identical import");
                ImportReport {
                    import_id: Uuid::new_v4(),
                    league_id,
                    game_id,
                    action: ImportAction::Unchanged,
                    digest: digest.to_string(),
                    teams_created: 0,
                    players_created: 0,
                    batting_lines: 0,
                    pitching_lines: 0,
                    fielding_lines: 0,
                    plays: 0,
                }
            }
            ImportDecision::Apply(plan) => {
                let applied = self.store.apply_import(&plan).await?;
                let action = match plan.target {
                    GameTarget::Insert => ImportAction::Inserted,
                    GameTarget::Update(_) => ImportAction::Updated,
                };
                ImportReport {
                    import_id: Uuid::new_v4(),
                    league_id,
                    game_id: applied.game_id,
                    action,
                    digest: digest.to_string(),
                    teams_created: applied.teams_created,
                    players_created: applied.players_created,
                    batting_lines: plan.batting.as_ref().map_or(0, Vec::len),
                    pitching_lines: plan.pitching.as_ref().map_or(0, Vec::len),
                    fielding_lines: plan.fielding.as_ref().map_or(0, Vec::len),
                    plays: plan.plays.as_ref().map_or(0, Vec::len),
                }
            }
        };
        Ok(report)
    }

    async fn game_lock(&self, key: &str) -> Arc<AsyncMutex<()>> {
        {
            let guard = self.game_mutexes.read().await;
            if let Some(lock) = guard.get(key) {
                return lock.clone();
            }
        }

        let mut guard = self.game_mutexes.write().await;
        guard
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Drops the map entry once no other import holds or awaits the lock
    async fn clear_game_lock(&self, key: &str, lock: Arc<AsyncMutex<()>>) {
        let mut guard = self.game_mutexes.write().await;
        let ours = guard.get(key).is_some_and(|stored| Arc::ptr_eq(stored, &lock));
        // One reference in the map, one here
        if ours && Arc::strong_count(&lock) <= 2 {
            guard.remove(key);
        }
    }

    #[cfg(test)]
    async fn held_game_locks(&self) -> usize {
        self.game_mutexes.read().await.len()
    }
}

/// Lock key for the game a document describes, as spelled in the document
fn game_key(league_id: i64, parsed: &ParsedGame) -> String {
    format!(
        "{}:{}:{}:{}",
        league_id, parsed.visitor.code, parsed.home.code, parsed.date
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Ruleset;
    use crate::store::models::NewLeague;
    use crate::store::InMemoryStatsStore;

    const SAMPLE: &str = include_str!("../../tests/fixtures/sample_game.xml");

    #[test]
    fn game_key_uses_league_teams_and_date() {
        let parsed = parse_game_xml(SAMPLE.as_bytes()).unwrap();
        assert_eq!(game_key(3, &parsed), "3:TIG:HAW:2025-03-15");
    }

    async fn service_with_league() -> (ImportService, i64) {
        let store = Arc::new(InMemoryStatsStore::new());
        let league = store
            .create_league(NewLeague {
                name: "Spring League".to_string(),
                season: "2025".to_string(),
                ruleset: Ruleset::Softball,
            })
            .await
            .unwrap();
        (ImportService::new(store, MatchPolicy::default()), league.id)
    }

    #[tokio::test]
    async fn game_locks_are_released_after_each_import() {
        let (service, league_id) = service_with_league().await;

        service.import_xml(league_id, SAMPLE.as_bytes()).await.unwrap();
        service.import_xml(league_id, SAMPLE.as_bytes()).await.unwrap();
        assert_eq!(service.held_game_locks().await, 0);

        let err = service.import_xml(league_id, b"<bsgame>").await.unwrap_err();
        assert!(matches!(err, AppError::MalformedInput { .. }));
        service.import_xml(league_id + 1, SAMPLE.as_bytes()).await.unwrap_err();
        assert_eq!(service.held_game_locks().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_imports_leave_no_locks_behind() {
        let (service, league_id) = service_with_league().await;
        let service = Arc::new(service);

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.import_xml(league_id, SAMPLE.as_bytes()).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(service.held_game_locks().await, 0);
    }

    #[test]
    fn digest_is_lowercase_sha256_hex() {
        let digest = hex::encode(Sha256::digest(b"abc"));
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
