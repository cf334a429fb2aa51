use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, instrument};

use super::types::{
    BoxBattingRow, BoxFieldingRow, BoxPitchingRow, BoxScore, GameLogEntry, GameSide, GameSummary,
    LeagueTable, PlayerBattingRow, PlayerPage, PlayerPitchingRow, SeasonLine, Standings,
    TeamBatting, TeamBox, TeamPitching, TeamRoster,
};
use crate::shared::AppError;
use crate::standings::compute_standings;
use crate::stats::aggregate::{lines_by_player, lines_for_team};
use crate::stats::{
    rank_leaders, BattingRates, BattingTotals, Direction, FieldingRates, LeaderCandidate,
    PitchingRates, PitchingTotals, Ruleset, StatTotals,
};
use crate::store::models::{Game, League, Player, Side, StatLines, Team};
use crate::store::StatsStore;

/// Thresholds and sizes for read views
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    /// Minimum at-bats to appear on the batting average leaderboard
    pub min_at_bats: u32,
    /// Minimum outs recorded to appear on the ERA leaderboard
    pub min_outs: u32,
    pub game_log_limit: usize,
    pub leaderboard_size: usize,
}

impl QueryLimits {
    pub const DEFAULT_MIN_AT_BATS: u32 = 10;
    pub const DEFAULT_MIN_OUTS: u32 = 30;
    pub const GAME_LOG_LIMIT: usize = 10;
    pub const LEADERBOARD_SIZE: usize = 10;
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            min_at_bats: Self::DEFAULT_MIN_AT_BATS,
            min_outs: Self::DEFAULT_MIN_OUTS,
            game_log_limit: Self::GAME_LOG_LIMIT,
            leaderboard_size: Self::LEADERBOARD_SIZE,
        }
    }
}

/// Read-only projections over the store. Only final games feed totals,
/// standings and leaderboards; box scores show any game.
pub struct QueryService {
    store: Arc<dyn StatsStore>,
    limits: QueryLimits,
}

impl QueryService {
    pub fn new(store: Arc<dyn StatsStore>, limits: QueryLimits) -> Self {
        Self { store, limits }
    }

    pub async fn list_leagues(&self) -> Result<Vec<League>, AppError> {
        self.store.list_leagues().await
    }

    pub async fn get_league(&self, league_id: i64) -> Result<League, AppError> {
        self.store
            .get_league(league_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("League {}", league_id)))
    }

    pub async fn list_teams(&self, league_id: i64) -> Result<Vec<Team>, AppError> {
        self.get_league(league_id).await?;
        let mut teams = self.store.list_teams(league_id).await?;
        teams.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(teams)
    }

    #[instrument(skip(self))]
    pub async fn list_games(&self, league_id: i64) -> Result<Vec<GameSummary>, AppError> {
        self.get_league(league_id).await?;
        let (teams, games) = futures::try_join!(
            self.store.list_teams(league_id),
            self.store.list_games(league_id)
        )?;
        let teams: HashMap<i64, Team> = teams.into_iter().map(|team| (team.id, team)).collect();

        let side = |team_id: i64, runs: u32| {
            let team = teams.get(&team_id);
            GameSide {
                team_id,
                code: team.map(|t| t.code.clone()).unwrap_or_default(),
                name: team.map(|t| t.name.clone()).unwrap_or_default(),
                runs,
            }
        };

        Ok(games
            .into_iter()
            .map(|game| GameSummary {
                visitor: side(game.visitor_team_id, game.visitor_line.runs),
                home: side(game.home_team_id, game.home_line.runs),
                id: game.id,
                external_id: game.external_id,
                date: game.date,
                start_time: game.start_time,
                doubleheader: game.doubleheader,
                status: game.status,
            })
            .collect())
    }

    pub async fn team_roster(&self, team_id: i64) -> Result<TeamRoster, AppError> {
        let team = self.get_team(team_id).await?;
        let players = self.store.team_roster(team_id).await?;
        Ok(TeamRoster { team, players })
    }

    /// Season batting line for every player who batted for the team
    #[instrument(skip(self))]
    pub async fn team_batting(&self, team_id: i64) -> Result<TeamBatting, AppError> {
        let team = self.get_team(team_id).await?;
        let (lines, roster) = self.final_team_lines(&team).await?;

        let mut players: Vec<PlayerBattingRow> = lines_by_player(&lines)
            .into_iter()
            .filter(|(_, lines)| !lines.batting.is_empty())
            .map(|(player_id, lines)| {
                let player = roster.get(&player_id);
                PlayerBattingRow {
                    player_id,
                    name: player_name(player, player_id),
                    uniform_number: player.and_then(|p| p.uniform_number.clone()),
                    totals: BattingTotals::from_lines(&lines.batting),
                }
            })
            .collect();
        players.sort_by(|a, b| a.name.cmp(&b.name).then(a.player_id.cmp(&b.player_id)));

        Ok(TeamBatting {
            totals: BattingTotals::from_lines(&lines.batting),
            team,
            players,
        })
    }

    #[instrument(skip(self))]
    pub async fn team_pitching(&self, team_id: i64) -> Result<TeamPitching, AppError> {
        let team = self.get_team(team_id).await?;
        let ruleset = self.get_league(team.league_id).await?.ruleset;
        let (lines, roster) = self.final_team_lines(&team).await?;

        let mut players: Vec<PlayerPitchingRow> = lines_by_player(&lines)
            .into_iter()
            .filter(|(_, lines)| !lines.pitching.is_empty())
            .map(|(player_id, lines)| {
                let player = roster.get(&player_id);
                PlayerPitchingRow {
                    player_id,
                    name: player_name(player, player_id),
                    uniform_number: player.and_then(|p| p.uniform_number.clone()),
                    totals: PitchingTotals::from_lines(&lines.pitching, ruleset),
                }
            })
            .collect();
        players.sort_by(|a, b| a.name.cmp(&b.name).then(a.player_id.cmp(&b.player_id)));

        Ok(TeamPitching {
            totals: PitchingTotals::from_lines(&lines.pitching, ruleset),
            team,
            players,
        })
    }

    #[instrument(skip(self))]
    pub async fn box_score(&self, game_id: i64) -> Result<BoxScore, AppError> {
        let detail = self
            .store
            .game_detail(game_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Game {}", game_id)))?;
        let game = detail.game;
        let ruleset = self.get_league(game.league_id).await?.ruleset;

        let mut names: HashMap<i64, Player> = HashMap::new();
        for team_id in [game.visitor_team_id, game.home_team_id] {
            for player in self.store.team_roster(team_id).await? {
                names.insert(player.id, player);
            }
        }

        let visitor = self
            .team_box(&game, Side::Visitor, &detail.lines, &names, ruleset)
            .await?;
        let home = self
            .team_box(&game, Side::Home, &detail.lines, &names, ruleset)
            .await?;

        Ok(BoxScore {
            game_id: game.id,
            league_id: game.league_id,
            external_id: game.external_id,
            date: game.date,
            start_time: game.start_time,
            doubleheader: game.doubleheader,
            status: game.status,
            venue: game.venue,
            visitor,
            home,
            plays: detail.plays,
        })
    }

    /// Career totals, per-season breakdown and recent games
    #[instrument(skip(self))]
    pub async fn player_page(&self, player_id: i64) -> Result<PlayerPage, AppError> {
        let player = self
            .store
            .get_player(player_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Player {}", player_id)))?;
        let (teams, mut lines) = futures::try_join!(
            self.store.player_teams(player_id),
            self.store.player_lines(player_id)
        )?;

        let mut leagues: BTreeMap<i64, League> = BTreeMap::new();
        let mut games: HashMap<i64, Game> = HashMap::new();
        let league_ids: HashSet<i64> = teams.iter().map(|team| team.league_id).collect();
        for league_id in league_ids {
            if let Some(league) = self.store.get_league(league_id).await? {
                leagues.insert(league_id, league);
            }
            for game in self.store.list_games(league_id).await? {
                if game.status.is_final() {
                    games.insert(game.id, game);
                }
            }
        }
        lines.retain_games(|game_id| games.contains_key(&game_id));

        let mut played: Vec<&Game> = line_game_ids(&lines)
            .iter()
            .filter_map(|game_id| games.get(game_id))
            .collect();
        played.sort_by_key(|game| Reverse((game.date, game.doubleheader, game.id)));

        // Career ERA uses the rules of the league played in most recently
        let career_ruleset = played
            .first()
            .and_then(|game| leagues.get(&game.league_id))
            .map(|league| league.ruleset)
            .unwrap_or_default();
        let career = StatTotals::from_lines(&lines, career_ruleset);

        let team_names: HashMap<i64, &Team> = teams.iter().map(|team| (team.id, team)).collect();

        let mut seasons = Vec::new();
        for team in &teams {
            let team_lines = lines_for_team(&lines, team.id);
            if line_game_ids(&team_lines).is_empty() {
                continue;
            }
            let Some(league) = leagues.get(&team.league_id) else {
                continue;
            };
            seasons.push(SeasonLine {
                league_id: league.id,
                league_name: league.name.clone(),
                season: league.season.clone(),
                team_id: team.id,
                team_name: team.name.clone(),
                totals: StatTotals::from_lines(&team_lines, league.ruleset),
            });
        }

        let mut opponent_names: HashMap<i64, String> = HashMap::new();
        for game in played.iter().take(self.limits.game_log_limit) {
            for team_id in [game.visitor_team_id, game.home_team_id] {
                if opponent_names.contains_key(&team_id) {
                    continue;
                }
                let name = match team_names.get(&team_id) {
                    Some(team) => team.name.clone(),
                    None => self
                        .store
                        .get_team(team_id)
                        .await?
                        .map(|team| team.name)
                        .unwrap_or_default(),
                };
                opponent_names.insert(team_id, name);
            }
        }

        let game_log = played
            .iter()
            .take(self.limits.game_log_limit)
            .filter_map(|game| game_log_entry(game, &lines, &opponent_names))
            .collect();

        debug!(player_id, seasons = seasons.len(), "Built player page");
        Ok(PlayerPage {
            player,
            teams,
            career,
            seasons,
            game_log,
        })
    }

    pub async fn standings(&self, league_id: i64) -> Result<Standings, AppError> {
        let league = self.get_league(league_id).await?;
        let (teams, games) = futures::try_join!(
            self.store.list_teams(league_id),
            self.store.list_games(league_id)
        )?;

        Ok(Standings {
            league,
            rows: compute_standings(&teams, &games),
        })
    }

    /// Standings plus the league leaderboards
    #[instrument(skip(self))]
    pub async fn league_table(&self, league_id: i64) -> Result<LeagueTable, AppError> {
        let league = self.get_league(league_id).await?;
        let (teams, games, mut lines) = futures::try_join!(
            self.store.list_teams(league_id),
            self.store.list_games(league_id),
            self.store.league_lines(league_id)
        )?;

        let final_ids: HashSet<i64> = games
            .iter()
            .filter(|game| game.status.is_final())
            .map(|game| game.id)
            .collect();
        lines.retain_games(|game_id| final_ids.contains(&game_id));

        let mut players: HashMap<i64, Player> = HashMap::new();
        for team in &teams {
            for player in self.store.team_roster(team.id).await? {
                players.insert(player.id, player);
            }
        }
        let team_names: HashMap<i64, String> = teams
            .iter()
            .map(|team| (team.id, team.name.clone()))
            .collect();

        let mut batting = Vec::new();
        let mut home_runs = Vec::new();
        let mut era = Vec::new();
        let mut strikeouts = Vec::new();

        for (player_id, player_lines) in lines_by_player(&lines) {
            let totals = StatTotals::from_lines(&player_lines, league.ruleset);
            let team_id = latest_team(&player_lines);
            let candidate = |value: f64| LeaderCandidate {
                player_id,
                player_name: player_name(players.get(&player_id), player_id),
                team_id,
                team_name: team_names.get(&team_id).cloned().unwrap_or_default(),
                value,
            };

            let at_bats = totals.batting.counts.at_bats;
            if at_bats > 0 && at_bats >= self.limits.min_at_bats {
                batting.push(candidate(totals.batting.rates.avg));
            }
            if totals.batting.counts.home_runs > 0 {
                home_runs.push(candidate(f64::from(totals.batting.counts.home_runs)));
            }
            let outs = totals.pitching.counts.outs;
            if outs >= self.limits.min_outs {
                if let Some(value) = totals.pitching.rates.era {
                    era.push(candidate(value));
                }
            }
            if totals.pitching.counts.strikeouts > 0 {
                strikeouts.push(candidate(f64::from(totals.pitching.counts.strikeouts)));
            }
        }

        let size = self.limits.leaderboard_size;
        Ok(LeagueTable {
            standings: compute_standings(&teams, &games),
            batting_average_leaders: rank_leaders(batting, Direction::HigherIsBetter, size),
            home_run_leaders: rank_leaders(home_runs, Direction::HigherIsBetter, size),
            era_leaders: rank_leaders(era, Direction::LowerIsBetter, size),
            strikeout_leaders: rank_leaders(strikeouts, Direction::HigherIsBetter, size),
            league,
        })
    }

    async fn get_team(&self, team_id: i64) -> Result<Team, AppError> {
        self.store
            .get_team(team_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Team {}", team_id)))
    }

    /// The team's lines from final games, plus its roster keyed by id
    async fn final_team_lines(
        &self,
        team: &Team,
    ) -> Result<(StatLines, HashMap<i64, Player>), AppError> {
        let (games, lines, roster) = futures::try_join!(
            self.store.list_games(team.league_id),
            self.store.league_lines(team.league_id),
            self.store.team_roster(team.id)
        )?;

        let final_ids: HashSet<i64> = games
            .iter()
            .filter(|game| game.status.is_final())
            .map(|game| game.id)
            .collect();
        let mut lines = lines_for_team(&lines, team.id);
        lines.retain_games(|game_id| final_ids.contains(&game_id));

        let roster = roster
            .into_iter()
            .map(|player| (player.id, player))
            .collect();
        Ok((lines, roster))
    }

    async fn team_box(
        &self,
        game: &Game,
        side: Side,
        lines: &StatLines,
        names: &HashMap<i64, Player>,
        ruleset: Ruleset,
    ) -> Result<TeamBox, AppError> {
        let (team_id, line) = match side {
            Side::Visitor => (game.visitor_team_id, game.visitor_line.clone()),
            Side::Home => (game.home_team_id, game.home_line.clone()),
        };
        let team = self.get_team(team_id).await?;
        let lines = lines_for_team(lines, team_id);
        let name = |player_id: i64| player_name(names.get(&player_id), player_id);

        let mut batting: Vec<BoxBattingRow> = lines
            .batting
            .iter()
            .map(|line| BoxBattingRow {
                player_id: line.player_id,
                name: name(line.player_id),
                position: line.position.clone(),
                batting_order: line.batting_order,
                substitute: line.substitute,
                counts: line.counts,
                rates: BattingRates::from_counts(&line.counts),
            })
            .collect();
        // Unknown spots (0) go last
        batting.sort_by_key(|row| {
            (
                row.batting_order == 0,
                row.batting_order,
                row.substitute,
                row.name.clone(),
            )
        });

        let pitching = lines
            .pitching
            .iter()
            .map(|line| BoxPitchingRow {
                player_id: line.player_id,
                name: name(line.player_id),
                counts: line.counts,
                rates: PitchingRates::from_counts(&line.counts, ruleset),
            })
            .collect();

        let fielding = lines
            .fielding
            .iter()
            .map(|line| BoxFieldingRow {
                player_id: line.player_id,
                name: name(line.player_id),
                position: line.position.clone(),
                counts: line.counts,
                rates: FieldingRates::from_counts(&line.counts),
            })
            .collect();

        Ok(TeamBox {
            team_id,
            code: team.code,
            name: team.name,
            line,
            totals: StatTotals::from_lines(&lines, ruleset),
            batting,
            pitching,
            fielding,
        })
    }
}

fn player_name(player: Option<&Player>, player_id: i64) -> String {
    player
        .map(|player| player.name.clone())
        .unwrap_or_else(|| format!("Player {}", player_id))
}

fn line_game_ids(lines: &StatLines) -> HashSet<i64> {
    lines
        .batting
        .iter()
        .map(|line| line.game_id)
        .chain(lines.pitching.iter().map(|line| line.game_id))
        .chain(lines.fielding.iter().map(|line| line.game_id))
        .collect()
}

/// Team of the player's highest-numbered game in `lines`
fn latest_team(lines: &StatLines) -> i64 {
    lines
        .batting
        .iter()
        .map(|line| (line.game_id, line.team_id))
        .chain(lines.pitching.iter().map(|line| (line.game_id, line.team_id)))
        .chain(lines.fielding.iter().map(|line| (line.game_id, line.team_id)))
        .max()
        .map(|(_, team_id)| team_id)
        .unwrap_or_default()
}

fn game_log_entry(
    game: &Game,
    lines: &StatLines,
    team_names: &HashMap<i64, String>,
) -> Option<GameLogEntry> {
    let batting = lines.batting.iter().find(|line| line.game_id == game.id);
    let pitching = lines.pitching.iter().find(|line| line.game_id == game.id);
    let fielding = lines.fielding.iter().find(|line| line.game_id == game.id);

    let team_id = batting
        .map(|line| line.team_id)
        .or_else(|| pitching.map(|line| line.team_id))
        .or_else(|| fielding.map(|line| line.team_id))?;
    let side = game.team_side(team_id)?;
    let opponent_id = game.opponent_of(team_id)?;

    let scored = game.runs_for(side);
    let allowed = game.runs_for(match side {
        Side::Visitor => Side::Home,
        Side::Home => Side::Visitor,
    });
    let outcome = match scored.cmp(&allowed) {
        std::cmp::Ordering::Greater => "W",
        std::cmp::Ordering::Less => "L",
        std::cmp::Ordering::Equal => "T",
    };

    Some(GameLogEntry {
        game_id: game.id,
        league_id: game.league_id,
        date: game.date,
        team_id,
        opponent_id,
        opponent_name: team_names.get(&opponent_id).cloned().unwrap_or_default(),
        home: side == Side::Home,
        result: format!("{} {}-{}", outcome, scored, allowed),
        batting: batting.map(|line| line.counts),
        pitching: pitching.map(|line| line.counts),
        fielding: fielding.map(|line| line.counts),
    })
}
