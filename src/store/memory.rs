use std::collections::{BTreeMap, BTreeSet, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::models::{
    BattingLine, FieldingLine, Game, GameDetail, League, LeagueUpdate, NewLeague, NewPlayer,
    NewTeam, PitchingLine, PlayEvent, Player, Side, StatLines, Team, TeamUpdate,
};
use super::repository::{ImportSnapshot, SnapshotRequest, StatsStore};
use crate::import::{AppliedImport, BoundIds, GameTarget, ImportPlan, PlayerRef, TeamRef};
use crate::shared::AppError;

#[derive(Debug, Default)]
struct Sequence(i64);

impl Sequence {
    fn next_id(&mut self) -> i64 {
        self.0 += 1;
        self.0
    }
}

#[derive(Debug, Default)]
struct Tables {
    league_ids: Sequence,
    team_ids: Sequence,
    player_ids: Sequence,
    game_ids: Sequence,
    leagues: BTreeMap<i64, League>,
    teams: BTreeMap<i64, Team>,
    players: BTreeMap<i64, Player>,
    /// (team id, player id)
    rosters: BTreeSet<(i64, i64)>,
    games: BTreeMap<i64, Game>,
    batting: BTreeMap<i64, Vec<BattingLine>>,
    pitching: BTreeMap<i64, Vec<PitchingLine>>,
    fielding: BTreeMap<i64, Vec<FieldingLine>>,
    plays: BTreeMap<i64, Vec<PlayEvent>>,
}

impl Tables {
    fn roster(&self, team_id: i64) -> Vec<Player> {
        let mut players: Vec<Player> = self
            .rosters
            .range((team_id, i64::MIN)..=(team_id, i64::MAX))
            .filter_map(|(_, player_id)| self.players.get(player_id).cloned())
            .collect();
        players.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        players
    }

    fn lines_for_games(&self, game_ids: &HashSet<i64>) -> StatLines {
        let pick = |game_id: &i64| game_ids.contains(game_id);
        StatLines {
            batting: self
                .batting
                .iter()
                .filter(|(id, _)| pick(id))
                .flat_map(|(_, lines)| lines.iter().cloned())
                .collect(),
            pitching: self
                .pitching
                .iter()
                .filter(|(id, _)| pick(id))
                .flat_map(|(_, lines)| lines.iter().cloned())
                .collect(),
            fielding: self
                .fielding
                .iter()
                .filter(|(id, _)| pick(id))
                .flat_map(|(_, lines)| lines.iter().cloned())
                .collect(),
        }
    }

    /// Rejects a plan that no longer fits the stored data. Runs before any
    /// mutation so a failed apply leaves the tables untouched.
    fn validate(&self, plan: &ImportPlan) -> Result<(), AppError> {
        if !self.leagues.contains_key(&plan.league_id) {
            return Err(AppError::NotFound(format!("League {}", plan.league_id)));
        }

        let updating = match plan.target {
            GameTarget::Insert => None,
            GameTarget::Update(game_id) => match self.games.get(&game_id) {
                Some(game) if game.league_id == plan.league_id => Some(game_id),
                _ => {
                    return Err(AppError::ReconciliationConflict(format!(
                        "game {} is no longer stored in league {}",
                        game_id, plan.league_id
                    )))
                }
            },
        };

        if let Some(external_id) = plan.game.external_id.as_deref() {
            let clash = self.games.values().find(|game| {
                game.league_id == plan.league_id
                    && game.external_id.as_deref() == Some(external_id)
                    && Some(game.id) != updating
            });
            if let Some(game) = clash {
                let message = format!(
                    "vendor game id {} already belongs to game {}",
                    external_id, game.id
                );
                return Err(match updating {
                    None => AppError::StalePlan(message),
                    Some(_) => AppError::ReconciliationConflict(message),
                });
            }
        }

        if updating.is_none() {
            let visitor = self.stored_team_id(plan.league_id, &plan.visitor);
            let home = self.stored_team_id(plan.league_id, &plan.home);
            if let (Some(visitor), Some(home)) = (visitor, home) {
                let fixture = plan.fixture(visitor, home);
                let stored = self
                    .games
                    .values()
                    .find(|game| game.league_id == plan.league_id && fixture.matches(game));
                if let Some(game) = stored {
                    return Err(AppError::StalePlan(format!(
                        "game {} was stored after this import was planned",
                        game.id
                    )));
                }
            }
        }

        for team in [&plan.visitor, &plan.home] {
            if let TeamRef::Existing(id) = team {
                if !matches!(self.teams.get(id), Some(team) if team.league_id == plan.league_id) {
                    return Err(AppError::ReconciliationConflict(format!(
                        "team {} is not part of league {}",
                        id, plan.league_id
                    )));
                }
            }
        }

        for planned in &plan.players {
            if let PlayerRef::Existing { id, .. } = &planned.player {
                if !self.players.contains_key(id) {
                    return Err(AppError::ReconciliationConflict(format!(
                        "player {} no longer exists",
                        id
                    )));
                }
            }
        }

        Ok(())
    }

    /// Id the team would resolve to without creating anything
    fn stored_team_id(&self, league_id: i64, team: &TeamRef) -> Option<i64> {
        match team {
            TeamRef::Existing(id) => Some(*id),
            TeamRef::New(new_team) => self
                .teams
                .values()
                .find(|team| team.league_id == league_id && team.code == new_team.code)
                .map(|team| team.id),
        }
    }

    fn team_id(&mut self, league_id: i64, team: &TeamRef, created: &mut usize) -> i64 {
        match team {
            TeamRef::Existing(id) => *id,
            TeamRef::New(new_team) => self.get_or_insert_team(league_id, new_team, created),
        }
    }

    fn get_or_insert_team(&mut self, league_id: i64, new_team: &NewTeam, created: &mut usize) -> i64 {
        if let Some(team) = self
            .teams
            .values()
            .find(|team| team.league_id == league_id && team.code == new_team.code)
        {
            return team.id;
        }

        let id = self.team_ids.next_id();
        self.teams.insert(
            id,
            Team {
                id,
                league_id,
                code: new_team.code.clone(),
                external_id: new_team.external_id.clone(),
                name: new_team.name.clone(),
                abbreviation: new_team.abbreviation.clone(),
            },
        );
        *created += 1;
        id
    }

    fn player_id(&mut self, team_id: i64, player: &PlayerRef, created: &mut usize) -> i64 {
        match player {
            PlayerRef::Existing {
                id,
                backfill_external_id,
            } => {
                if let (Some(stored), Some(external_id)) =
                    (self.players.get_mut(id), backfill_external_id)
                {
                    if stored.external_id.is_none() {
                        stored.external_id = Some(external_id.clone());
                    }
                }
                *id
            }
            PlayerRef::New(new_player) => self.get_or_insert_player(team_id, new_player, created),
        }
    }

    fn get_or_insert_player(
        &mut self,
        team_id: i64,
        new_player: &NewPlayer,
        created: &mut usize,
    ) -> i64 {
        let existing = match new_player.external_id.as_deref() {
            Some(external_id) => self
                .players
                .values()
                .find(|player| player.external_id.as_deref() == Some(external_id))
                .map(|player| player.id),
            None => self
                .roster(team_id)
                .into_iter()
                .find(|player| {
                    player.name == new_player.name
                        && player.uniform_number == new_player.uniform_number
                })
                .map(|player| player.id),
        };
        if let Some(id) = existing {
            return id;
        }

        let id = self.player_ids.next_id();
        self.players.insert(id, new_player.clone().into_player(id));
        *created += 1;
        id
    }
}

/// In-memory implementation of [`StatsStore`] for development and testing.
///
/// All tables sit behind one lock; `apply_import` validates the plan
/// before touching anything, so readers never observe a partial import.
#[derive(Debug, Default)]
pub struct InMemoryStatsStore {
    tables: RwLock<Tables>,
}

impl InMemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored games across all leagues
    pub async fn game_count(&self) -> usize {
        self.tables.read().await.games.len()
    }
}

#[async_trait]
impl StatsStore for InMemoryStatsStore {
    #[instrument(skip(self, league), fields(name = %league.name))]
    async fn create_league(&self, league: NewLeague) -> Result<League, AppError> {
        let mut tables = self.tables.write().await;
        let id = tables.league_ids.next_id();
        let league = League {
            id,
            name: league.name,
            season: league.season,
            ruleset: league.ruleset,
            created_at: Utc::now(),
        };
        tables.leagues.insert(id, league.clone());
        debug!(league_id = id, "Created league in memory");
        Ok(league)
    }

    async fn list_leagues(&self) -> Result<Vec<League>, AppError> {
        Ok(self.tables.read().await.leagues.values().cloned().collect())
    }

    async fn get_league(&self, league_id: i64) -> Result<Option<League>, AppError> {
        Ok(self.tables.read().await.leagues.get(&league_id).cloned())
    }

    #[instrument(skip(self, update))]
    async fn update_league(
        &self,
        league_id: i64,
        update: LeagueUpdate,
    ) -> Result<League, AppError> {
        let mut tables = self.tables.write().await;
        let league = tables
            .leagues
            .get_mut(&league_id)
            .ok_or_else(|| AppError::NotFound(format!("League {}", league_id)))?;

        if let Some(name) = update.name {
            league.name = name;
        }
        if let Some(season) = update.season {
            league.season = season;
        }
        if let Some(ruleset) = update.ruleset {
            league.ruleset = ruleset;
        }
        Ok(league.clone())
    }

    #[instrument(skip(self))]
    async fn delete_league(&self, league_id: i64) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        if !tables.leagues.contains_key(&league_id) {
            return Err(AppError::NotFound(format!("League {}", league_id)));
        }
        if tables.games.values().any(|game| game.league_id == league_id) {
            warn!(league_id, "Refusing to delete league with games");
            return Err(AppError::Conflict(format!(
                "League {} still has games",
                league_id
            )));
        }

        let team_ids: HashSet<i64> = tables
            .teams
            .values()
            .filter(|team| team.league_id == league_id)
            .map(|team| team.id)
            .collect();
        tables.teams.retain(|id, _| !team_ids.contains(id));
        tables
            .rosters
            .retain(|(team_id, _)| !team_ids.contains(team_id));
        tables.leagues.remove(&league_id);

        debug!(league_id, teams = team_ids.len(), "Deleted league from memory");
        Ok(())
    }

    #[instrument(skip(self, team), fields(code = %team.code))]
    async fn create_team(&self, league_id: i64, team: NewTeam) -> Result<Team, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.leagues.contains_key(&league_id) {
            return Err(AppError::NotFound(format!("League {}", league_id)));
        }
        let taken = tables
            .teams
            .values()
            .any(|stored| stored.league_id == league_id && stored.code == team.code);
        if taken {
            return Err(AppError::Conflict(format!(
                "League {} already has a team with code {}",
                league_id, team.code
            )));
        }

        let mut created = 0;
        let team_id = tables.get_or_insert_team(league_id, &team, &mut created);
        debug!(league_id, team_id, "Created team in memory");
        tables.teams.get(&team_id).cloned().ok_or(AppError::Internal)
    }

    #[instrument(skip(self, update))]
    async fn update_team(&self, team_id: i64, update: TeamUpdate) -> Result<Team, AppError> {
        let mut tables = self.tables.write().await;
        let league_id = tables
            .teams
            .get(&team_id)
            .map(|team| team.league_id)
            .ok_or_else(|| AppError::NotFound(format!("Team {}", team_id)))?;

        if let Some(code) = &update.code {
            let taken = tables.teams.values().any(|team| {
                team.league_id == league_id && team.id != team_id && &team.code == code
            });
            if taken {
                return Err(AppError::Conflict(format!(
                    "League {} already has a team with code {}",
                    league_id, code
                )));
            }
        }

        let team = tables
            .teams
            .get_mut(&team_id)
            .ok_or_else(|| AppError::NotFound(format!("Team {}", team_id)))?;
        if let Some(code) = update.code {
            team.code = code;
        }
        if let Some(name) = update.name {
            team.name = name;
        }
        if let Some(abbreviation) = update.abbreviation {
            team.abbreviation = Some(abbreviation).filter(|value| !value.is_empty());
        }
        Ok(team.clone())
    }

    #[instrument(skip(self))]
    async fn delete_team(&self, team_id: i64) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        if !tables.teams.contains_key(&team_id) {
            return Err(AppError::NotFound(format!("Team {}", team_id)));
        }
        let scheduled = tables
            .games
            .values()
            .any(|game| game.visitor_team_id == team_id || game.home_team_id == team_id);
        if scheduled {
            warn!(team_id, "Refusing to delete team with games");
            return Err(AppError::Conflict(format!("Team {} still has games", team_id)));
        }

        tables.teams.remove(&team_id);
        tables.rosters.retain(|(roster_team, _)| *roster_team != team_id);
        debug!(team_id, "Deleted team from memory");
        Ok(())
    }

    async fn list_teams(&self, league_id: i64) -> Result<Vec<Team>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .teams
            .values()
            .filter(|team| team.league_id == league_id)
            .cloned()
            .collect())
    }

    async fn get_team(&self, team_id: i64) -> Result<Option<Team>, AppError> {
        Ok(self.tables.read().await.teams.get(&team_id).cloned())
    }

    async fn team_roster(&self, team_id: i64) -> Result<Vec<Player>, AppError> {
        Ok(self.tables.read().await.roster(team_id))
    }

    async fn get_player(&self, player_id: i64) -> Result<Option<Player>, AppError> {
        Ok(self.tables.read().await.players.get(&player_id).cloned())
    }

    async fn player_teams(&self, player_id: i64) -> Result<Vec<Team>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .rosters
            .iter()
            .filter(|(_, id)| *id == player_id)
            .filter_map(|(team_id, _)| tables.teams.get(team_id).cloned())
            .collect())
    }

    async fn list_games(&self, league_id: i64) -> Result<Vec<Game>, AppError> {
        let tables = self.tables.read().await;
        let mut games: Vec<Game> = tables
            .games
            .values()
            .filter(|game| game.league_id == league_id)
            .cloned()
            .collect();
        games.sort_by_key(|game| (game.date, game.doubleheader, game.id));
        Ok(games)
    }

    async fn get_game(&self, game_id: i64) -> Result<Option<Game>, AppError> {
        Ok(self.tables.read().await.games.get(&game_id).cloned())
    }

    async fn game_detail(&self, game_id: i64) -> Result<Option<GameDetail>, AppError> {
        let tables = self.tables.read().await;
        let Some(game) = tables.games.get(&game_id).cloned() else {
            return Ok(None);
        };

        let lines = tables.lines_for_games(&HashSet::from([game_id]));
        let mut plays = tables.plays.get(&game_id).cloned().unwrap_or_default();
        plays.sort_by_key(|play| play.ordinal);

        Ok(Some(GameDetail { game, lines, plays }))
    }

    async fn league_lines(&self, league_id: i64) -> Result<StatLines, AppError> {
        let tables = self.tables.read().await;
        let game_ids: HashSet<i64> = tables
            .games
            .values()
            .filter(|game| game.league_id == league_id)
            .map(|game| game.id)
            .collect();
        Ok(tables.lines_for_games(&game_ids))
    }

    async fn player_lines(&self, player_id: i64) -> Result<StatLines, AppError> {
        let tables = self.tables.read().await;
        let mut lines = tables.lines_for_games(&tables.games.keys().copied().collect());
        lines.batting.retain(|line| line.player_id == player_id);
        lines.pitching.retain(|line| line.player_id == player_id);
        lines.fielding.retain(|line| line.player_id == player_id);
        Ok(lines)
    }

    #[instrument(skip(self, request), fields(league_id = request.league_id, date = %request.date))]
    async fn import_snapshot(
        &self,
        request: &SnapshotRequest,
    ) -> Result<ImportSnapshot, AppError> {
        let tables = self.tables.read().await;
        if !tables.leagues.contains_key(&request.league_id) {
            return Err(AppError::NotFound(format!("League {}", request.league_id)));
        }

        let teams: Vec<Team> = tables
            .teams
            .values()
            .filter(|team| team.league_id == request.league_id)
            .cloned()
            .collect();
        let rosters = teams
            .iter()
            .map(|team| (team.id, tables.roster(team.id)))
            .collect();

        let wanted: HashSet<&str> = request
            .player_external_ids
            .iter()
            .map(String::as_str)
            .collect();
        let known_players = tables
            .players
            .values()
            .filter(|player| {
                player
                    .external_id
                    .as_deref()
                    .is_some_and(|id| wanted.contains(id))
            })
            .cloned()
            .collect();

        let games = tables
            .games
            .values()
            .filter(|game| game.league_id == request.league_id)
            .filter(|game| {
                game.date == request.date
                    || (game.external_id.is_some()
                        && game.external_id == request.game_external_id)
            })
            .cloned()
            .collect();

        Ok(ImportSnapshot {
            league_id: request.league_id,
            teams,
            rosters,
            known_players,
            games,
        })
    }

    #[instrument(skip(self, plan), fields(league_id = plan.league_id))]
    async fn apply_import(&self, plan: &ImportPlan) -> Result<AppliedImport, AppError> {
        let mut tables = self.tables.write().await;
        tables.validate(plan)?;

        let mut teams_created = 0;
        let mut players_created = 0;

        let visitor_team_id = tables.team_id(plan.league_id, &plan.visitor, &mut teams_created);
        let home_team_id = tables.team_id(plan.league_id, &plan.home, &mut teams_created);

        let mut player_ids = Vec::with_capacity(plan.players.len());
        for planned in &plan.players {
            let team_id = match planned.side {
                Side::Visitor => visitor_team_id,
                Side::Home => home_team_id,
            };
            let player_id = tables.player_id(team_id, &planned.player, &mut players_created);
            tables.rosters.insert((team_id, player_id));
            player_ids.push(player_id);
        }

        let game_id = match plan.target {
            GameTarget::Insert => tables.game_ids.next_id(),
            GameTarget::Update(id) => id,
        };

        let bound = plan.bind(
            &BoundIds {
                game_id,
                visitor_team_id,
                home_team_id,
                player_ids,
            },
            Utc::now(),
        );

        tables.games.insert(game_id, bound.game);
        if let Some(lines) = bound.batting {
            tables.batting.insert(game_id, lines);
        }
        if let Some(lines) = bound.pitching {
            tables.pitching.insert(game_id, lines);
        }
        if let Some(lines) = bound.fielding {
            tables.fielding.insert(game_id, lines);
        }
        if let Some(plays) = bound.plays {
            tables.plays.insert(game_id, plays);
        }

        debug!(game_id, teams_created, players_created, "Applied import in memory");
        Ok(AppliedImport {
            game_id,
            teams_created,
            players_created,
        })
    }
}
