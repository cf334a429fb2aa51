use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction};
use tracing::{debug, instrument, warn};

use super::models::{
    BattingLine, FieldingLine, Game, GameDetail, League, LeagueUpdate, NewLeague, NewPlayer,
    NewTeam, PitchingLine, PlayEvent, Player, Side, StatLines, Team, TeamUpdate,
};
use super::repository::{ImportSnapshot, SnapshotRequest, StatsStore};
use crate::import::{AppliedImport, BoundIds, GameTarget, ImportPlan, PlayerRef, TeamRef};
use crate::shared::AppError;

const LEAGUE_COLUMNS: &str = "id, name, season, ruleset, created_at";
const TEAM_COLUMNS: &str = "id, league_id, code, external_id, name, abbreviation";
const PLAYER_COLUMNS: &str =
    "p.id, p.external_id, p.name, p.short_name, p.uniform_number, p.bats, p.throws, p.class_year";
const GAME_COLUMNS: &str = "id, league_id, external_id, visitor_team_id, home_team_id, game_date, \
     start_time, doubleheader, venue, status, visitor_line, home_line, source_digest, imported_at";

const READ_SNAPSHOT: &str = "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY";

/// PostgreSQL implementation of [`StatsStore`]
pub struct PostgresStatsStore {
    pool: PgPool,
}

impl PostgresStatsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the schema if it does not exist yet
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to run database migrations");
                AppError::DatabaseError(e.to_string())
            })
    }

    /// Read-only transaction over one snapshot, for reads spanning several
    /// statements
    async fn begin_read(&self) -> Result<Transaction<'static, Postgres>, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin read"))?;
        sqlx::query(READ_SNAPSHOT)
            .execute(&mut *tx)
            .await
            .map_err(db_error("set read isolation"))?;
        Ok(tx)
    }
}

fn db_error(operation: &'static str) -> impl Fn(sqlx::Error) -> AppError {
    move |e| {
        warn!(error = %e, operation, "Database operation failed");
        AppError::DatabaseError(e.to_string())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

fn parse_column<T: FromStr>(row: &PgRow, column: &str) -> Result<T, AppError> {
    let raw: String = row.get(column);
    raw.parse().map_err(|_| {
        warn!(column, value = %raw, "Unrecognized value stored in database");
        AppError::DatabaseError(format!("unrecognized {} '{}'", column, raw))
    })
}

fn count(row: &PgRow, column: &str) -> u32 {
    u32::try_from(row.get::<i32, _>(column)).unwrap_or_default()
}

fn league_from_row(row: &PgRow) -> Result<League, AppError> {
    Ok(League {
        id: row.get("id"),
        name: row.get("name"),
        season: row.get("season"),
        ruleset: parse_column(row, "ruleset")?,
        created_at: row.get("created_at"),
    })
}

fn team_from_row(row: &PgRow) -> Team {
    Team {
        id: row.get("id"),
        league_id: row.get("league_id"),
        code: row.get("code"),
        external_id: row.get("external_id"),
        name: row.get("name"),
        abbreviation: row.get("abbreviation"),
    }
}

fn player_from_row(row: &PgRow) -> Player {
    Player {
        id: row.get("id"),
        external_id: row.get("external_id"),
        name: row.get("name"),
        short_name: row.get("short_name"),
        uniform_number: row.get("uniform_number"),
        bats: row.get("bats"),
        throws: row.get("throws"),
        class_year: row.get("class_year"),
    }
}

fn game_from_row(row: &PgRow) -> Result<Game, AppError> {
    Ok(Game {
        id: row.get("id"),
        league_id: row.get("league_id"),
        external_id: row.get("external_id"),
        visitor_team_id: row.get("visitor_team_id"),
        home_team_id: row.get("home_team_id"),
        date: row.get("game_date"),
        start_time: row.get("start_time"),
        doubleheader: u8::try_from(row.get::<i16, _>("doubleheader")).unwrap_or_default(),
        venue: row.get::<Json<_>, _>("venue").0,
        status: parse_column(row, "status")?,
        visitor_line: row.get::<Json<_>, _>("visitor_line").0,
        home_line: row.get::<Json<_>, _>("home_line").0,
        source_digest: row.get("source_digest"),
        imported_at: row.get("imported_at"),
    })
}

fn batting_from_row(row: &PgRow) -> BattingLine {
    BattingLine {
        game_id: row.get("game_id"),
        player_id: row.get("player_id"),
        team_id: row.get("team_id"),
        batting_order: count(row, "batting_order"),
        position: row.get("position"),
        starter: row.get("starter"),
        substitute: row.get("substitute"),
        counts: row.get::<Json<_>, _>("counts").0,
    }
}

fn pitching_from_row(row: &PgRow) -> PitchingLine {
    PitchingLine {
        game_id: row.get("game_id"),
        player_id: row.get("player_id"),
        team_id: row.get("team_id"),
        counts: row.get::<Json<_>, _>("counts").0,
    }
}

fn fielding_from_row(row: &PgRow) -> FieldingLine {
    FieldingLine {
        game_id: row.get("game_id"),
        player_id: row.get("player_id"),
        team_id: row.get("team_id"),
        position: row.get("position"),
        counts: row.get::<Json<_>, _>("counts").0,
    }
}

fn play_from_row(row: &PgRow) -> Result<PlayEvent, AppError> {
    Ok(PlayEvent {
        game_id: row.get("game_id"),
        ordinal: count(row, "ordinal"),
        inning: count(row, "inning"),
        half: parse_column(row, "half")?,
        sequence: count(row, "sequence"),
        outs_before: count(row, "outs_before"),
        batter: row.get("batter"),
        pitcher: row.get("pitcher"),
        pitch_sequence: row.get("pitch_sequence"),
        narrative: row.get("narrative"),
    })
}

/// Advisory lock key shared by every import touching a league on one date
fn import_lock_key(plan: &ImportPlan) -> i64 {
    let digest = Sha256::digest(format!("{}:{}", plan.league_id, plan.game.date).as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(bytes)
}

fn as_db_int(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Lines filtered by `condition`, which may reference `$1` and the games
/// table as `g`
async fn select_lines(
    conn: &mut PgConnection,
    condition: &str,
    id: i64,
) -> Result<StatLines, AppError> {
    let batting = sqlx::query(&format!(
        "SELECT l.* FROM batting_lines l JOIN games g ON g.id = l.game_id WHERE {} ORDER BY l.game_id, l.player_id",
        condition
    ))
    .bind(id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error("select batting lines"))?;

    let pitching = sqlx::query(&format!(
        "SELECT l.* FROM pitching_lines l JOIN games g ON g.id = l.game_id WHERE {} ORDER BY l.game_id, l.player_id",
        condition
    ))
    .bind(id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error("select pitching lines"))?;

    let fielding = sqlx::query(&format!(
        "SELECT l.* FROM fielding_lines l JOIN games g ON g.id = l.game_id WHERE {} ORDER BY l.game_id, l.player_id",
        condition
    ))
    .bind(id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error("select fielding lines"))?;

    Ok(StatLines {
        batting: batting.iter().map(batting_from_row).collect(),
        pitching: pitching.iter().map(pitching_from_row).collect(),
        fielding: fielding.iter().map(fielding_from_row).collect(),
    })
}

async fn validate_plan(
    tx: &mut Transaction<'_, Postgres>,
    plan: &ImportPlan,
) -> Result<(), AppError> {
    let league = sqlx::query("SELECT id FROM leagues WHERE id = $1 FOR SHARE")
        .bind(plan.league_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_error("lock league"))?;
    if league.is_none() {
        return Err(AppError::NotFound(format!("League {}", plan.league_id)));
    }

    let updating = match plan.target {
        GameTarget::Insert => None,
        GameTarget::Update(game_id) => {
            let found = sqlx::query("SELECT id FROM games WHERE id = $1 AND league_id = $2")
                .bind(game_id)
                .bind(plan.league_id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(db_error("check game"))?;
            if found.is_none() {
                return Err(AppError::ReconciliationConflict(format!(
                    "game {} is no longer stored in league {}",
                    game_id, plan.league_id
                )));
            }
            Some(game_id)
        }
    };

    if let Some(external_id) = plan.game.external_id.as_deref() {
        let clash = sqlx::query(
            "SELECT id FROM games WHERE league_id = $1 AND external_id = $2 AND id IS DISTINCT FROM $3",
        )
        .bind(plan.league_id)
        .bind(external_id)
        .bind(updating)
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_error("check vendor game id"))?;
        if let Some(row) = clash {
            let game_id: i64 = row.get("id");
            let message = format!(
                "vendor game id {} already belongs to game {}",
                external_id, game_id
            );
            return Err(match updating {
                None => AppError::StalePlan(message),
                Some(_) => AppError::ReconciliationConflict(message),
            });
        }
    }

    if updating.is_none() {
        let visitor = stored_team_id(tx, plan.league_id, &plan.visitor).await?;
        let home = stored_team_id(tx, plan.league_id, &plan.home).await?;
        if let (Some(visitor), Some(home)) = (visitor, home) {
            let rows = sqlx::query(&format!(
                "SELECT {} FROM games WHERE league_id = $1 AND visitor_team_id = $2 \
                 AND home_team_id = $3 AND game_date = $4",
                GAME_COLUMNS
            ))
            .bind(plan.league_id)
            .bind(visitor)
            .bind(home)
            .bind(plan.game.date)
            .fetch_all(&mut **tx)
            .await
            .map_err(db_error("check fixture"))?;

            let fixture = plan.fixture(visitor, home);
            for row in &rows {
                let game = game_from_row(row)?;
                if fixture.matches(&game) {
                    return Err(AppError::StalePlan(format!(
                        "game {} was stored after this import was planned",
                        game.id
                    )));
                }
            }
        }
    }

    for team in [&plan.visitor, &plan.home] {
        if let TeamRef::Existing(id) = team {
            let found = sqlx::query("SELECT id FROM teams WHERE id = $1 AND league_id = $2")
                .bind(id)
                .bind(plan.league_id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(db_error("check team"))?;
            if found.is_none() {
                return Err(AppError::ReconciliationConflict(format!(
                    "team {} is not part of league {}",
                    id, plan.league_id
                )));
            }
        }
    }

    Ok(())
}

/// Id the team would resolve to without creating anything
async fn stored_team_id(
    tx: &mut Transaction<'_, Postgres>,
    league_id: i64,
    team: &TeamRef,
) -> Result<Option<i64>, AppError> {
    let code = match team {
        TeamRef::Existing(id) => return Ok(Some(*id)),
        TeamRef::New(new_team) => &new_team.code,
    };
    let row = sqlx::query("SELECT id FROM teams WHERE league_id = $1 AND code = $2")
        .bind(league_id)
        .bind(code)
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_error("find team"))?;
    Ok(row.map(|row| row.get("id")))
}

async fn team_id(
    tx: &mut Transaction<'_, Postgres>,
    league_id: i64,
    team: &TeamRef,
    created: &mut usize,
) -> Result<i64, AppError> {
    let new_team: &NewTeam = match team {
        TeamRef::Existing(id) => return Ok(*id),
        TeamRef::New(new_team) => new_team,
    };

    let inserted = sqlx::query(
        "INSERT INTO teams (league_id, code, external_id, name, abbreviation) \
         VALUES ($1, $2, $3, $4, $5) ON CONFLICT (league_id, code) DO NOTHING RETURNING id",
    )
    .bind(league_id)
    .bind(&new_team.code)
    .bind(&new_team.external_id)
    .bind(&new_team.name)
    .bind(&new_team.abbreviation)
    .fetch_optional(&mut **tx)
    .await
    .map_err(db_error("insert team"))?;

    if let Some(row) = inserted {
        *created += 1;
        return Ok(row.get("id"));
    }

    let row = sqlx::query("SELECT id FROM teams WHERE league_id = $1 AND code = $2")
        .bind(league_id)
        .bind(&new_team.code)
        .fetch_one(&mut **tx)
        .await
        .map_err(db_error("select team"))?;
    Ok(row.get("id"))
}

async fn player_id(
    tx: &mut Transaction<'_, Postgres>,
    team_id: i64,
    player: &PlayerRef,
    created: &mut usize,
) -> Result<i64, AppError> {
    let new_player: &NewPlayer = match player {
        PlayerRef::Existing {
            id,
            backfill_external_id,
        } => {
            if let Some(external_id) = backfill_external_id {
                sqlx::query(
                    "UPDATE players SET external_id = $2 WHERE id = $1 AND external_id IS NULL",
                )
                .bind(id)
                .bind(external_id)
                .execute(&mut **tx)
                .await
                .map_err(db_error("backfill player vendor id"))?;
            }
            return Ok(*id);
        }
        PlayerRef::New(new_player) => new_player,
    };

    let existing = match &new_player.external_id {
        Some(external_id) => sqlx::query("SELECT id FROM players WHERE external_id = $1")
            .bind(external_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(db_error("select player by vendor id"))?,
        None => sqlx::query(
            "SELECT p.id FROM players p JOIN roster_entries r ON r.player_id = p.id \
             WHERE r.team_id = $1 AND p.name = $2 AND p.uniform_number IS NOT DISTINCT FROM $3 \
             ORDER BY p.id LIMIT 1",
        )
        .bind(team_id)
        .bind(&new_player.name)
        .bind(&new_player.uniform_number)
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_error("select rostered player"))?,
    };
    if let Some(row) = existing {
        return Ok(row.get("id"));
    }

    let row = sqlx::query(
        "INSERT INTO players (external_id, name, short_name, uniform_number, bats, throws, class_year) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
    )
    .bind(&new_player.external_id)
    .bind(&new_player.name)
    .bind(&new_player.short_name)
    .bind(&new_player.uniform_number)
    .bind(&new_player.bats)
    .bind(&new_player.throws)
    .bind(&new_player.class_year)
    .fetch_one(&mut **tx)
    .await
    .map_err(db_error("insert player"))?;
    *created += 1;
    Ok(row.get("id"))
}

#[async_trait]
impl StatsStore for PostgresStatsStore {
    #[instrument(skip(self, league), fields(name = %league.name))]
    async fn create_league(&self, league: NewLeague) -> Result<League, AppError> {
        let row = sqlx::query(&format!(
            "INSERT INTO leagues (name, season, ruleset) VALUES ($1, $2, $3) RETURNING {}",
            LEAGUE_COLUMNS
        ))
        .bind(&league.name)
        .bind(&league.season)
        .bind(league.ruleset.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("insert league"))?;

        let league = league_from_row(&row)?;
        debug!(league_id = league.id, "League created in database");
        Ok(league)
    }

    async fn list_leagues(&self) -> Result<Vec<League>, AppError> {
        let rows = sqlx::query(&format!("SELECT {} FROM leagues ORDER BY id", LEAGUE_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list leagues"))?;
        rows.iter().map(league_from_row).collect()
    }

    async fn get_league(&self, league_id: i64) -> Result<Option<League>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM leagues WHERE id = $1", LEAGUE_COLUMNS))
            .bind(league_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get league"))?;
        row.as_ref().map(league_from_row).transpose()
    }

    #[instrument(skip(self, update))]
    async fn update_league(
        &self,
        league_id: i64,
        update: LeagueUpdate,
    ) -> Result<League, AppError> {
        let row = sqlx::query(&format!(
            "UPDATE leagues SET name = COALESCE($2, name), season = COALESCE($3, season), \
             ruleset = COALESCE($4, ruleset) WHERE id = $1 RETURNING {}",
            LEAGUE_COLUMNS
        ))
        .bind(league_id)
        .bind(&update.name)
        .bind(&update.season)
        .bind(update.ruleset.map(|ruleset| ruleset.to_string()))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("update league"))?;

        match row {
            Some(row) => league_from_row(&row),
            None => Err(AppError::NotFound(format!("League {}", league_id))),
        }
    }

    #[instrument(skip(self))]
    async fn delete_league(&self, league_id: i64) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin"))?;

        let league = sqlx::query("SELECT id FROM leagues WHERE id = $1 FOR UPDATE")
            .bind(league_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error("lock league"))?;
        if league.is_none() {
            return Err(AppError::NotFound(format!("League {}", league_id)));
        }

        let games: i64 = sqlx::query("SELECT COUNT(*) AS games FROM games WHERE league_id = $1")
            .bind(league_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error("count games"))?
            .get("games");
        if games > 0 {
            warn!(league_id, games, "Refusing to delete league with games");
            return Err(AppError::Conflict(format!(
                "League {} still has games",
                league_id
            )));
        }

        sqlx::query("DELETE FROM leagues WHERE id = $1")
            .bind(league_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("delete league"))?;
        tx.commit().await.map_err(db_error("commit"))?;

        debug!(league_id, "League deleted from database");
        Ok(())
    }

    #[instrument(skip(self, team), fields(code = %team.code))]
    async fn create_team(&self, league_id: i64, team: NewTeam) -> Result<Team, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin"))?;

        let league = sqlx::query("SELECT id FROM leagues WHERE id = $1 FOR SHARE")
            .bind(league_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error("lock league"))?;
        if league.is_none() {
            return Err(AppError::NotFound(format!("League {}", league_id)));
        }

        let row = sqlx::query(&format!(
            "INSERT INTO teams (league_id, code, external_id, name, abbreviation) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT (league_id, code) DO NOTHING RETURNING {}",
            TEAM_COLUMNS
        ))
        .bind(league_id)
        .bind(&team.code)
        .bind(&team.external_id)
        .bind(&team.name)
        .bind(&team.abbreviation)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("insert team"))?;
        let Some(row) = row else {
            return Err(AppError::Conflict(format!(
                "League {} already has a team with code {}",
                league_id, team.code
            )));
        };
        tx.commit().await.map_err(db_error("commit"))?;

        let team = team_from_row(&row);
        debug!(league_id, team_id = team.id, "Team created in database");
        Ok(team)
    }

    #[instrument(skip(self, update))]
    async fn update_team(&self, team_id: i64, update: TeamUpdate) -> Result<Team, AppError> {
        let row = sqlx::query(&format!(
            "UPDATE teams SET code = COALESCE($2, code), name = COALESCE($3, name), \
             abbreviation = CASE WHEN $4::TEXT IS NULL THEN abbreviation ELSE NULLIF($4, '') END \
             WHERE id = $1 RETURNING {}",
            TEAM_COLUMNS
        ))
        .bind(team_id)
        .bind(&update.code)
        .bind(&update.name)
        .bind(&update.abbreviation)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                AppError::Conflict(format!(
                    "Team code {} is already taken",
                    update.code.as_deref().unwrap_or_default()
                ))
            } else {
                db_error("update team")(err)
            }
        })?;

        row.as_ref()
            .map(team_from_row)
            .ok_or_else(|| AppError::NotFound(format!("Team {}", team_id)))
    }

    #[instrument(skip(self))]
    async fn delete_team(&self, team_id: i64) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin"))?;

        let team = sqlx::query("SELECT id FROM teams WHERE id = $1 FOR UPDATE")
            .bind(team_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error("lock team"))?;
        if team.is_none() {
            return Err(AppError::NotFound(format!("Team {}", team_id)));
        }

        let games: i64 = sqlx::query(
            "SELECT COUNT(*) AS games FROM games WHERE visitor_team_id = $1 OR home_team_id = $1",
        )
        .bind(team_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("count team games"))?
        .get("games");
        if games > 0 {
            warn!(team_id, games, "Refusing to delete team with games");
            return Err(AppError::Conflict(format!("Team {} still has games", team_id)));
        }

        sqlx::query("DELETE FROM teams WHERE id = $1")
            .bind(team_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("delete team"))?;
        tx.commit().await.map_err(db_error("commit"))?;

        debug!(team_id, "Team deleted from database");
        Ok(())
    }

    async fn list_teams(&self, league_id: i64) -> Result<Vec<Team>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM teams WHERE league_id = $1 ORDER BY id",
            TEAM_COLUMNS
        ))
        .bind(league_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list teams"))?;
        Ok(rows.iter().map(team_from_row).collect())
    }

    async fn get_team(&self, team_id: i64) -> Result<Option<Team>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM teams WHERE id = $1", TEAM_COLUMNS))
            .bind(team_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get team"))?;
        Ok(row.as_ref().map(team_from_row))
    }

    async fn team_roster(&self, team_id: i64) -> Result<Vec<Player>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM players p JOIN roster_entries r ON r.player_id = p.id \
             WHERE r.team_id = $1 ORDER BY p.name, p.id",
            PLAYER_COLUMNS
        ))
        .bind(team_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("team roster"))?;
        Ok(rows.iter().map(player_from_row).collect())
    }

    async fn get_player(&self, player_id: i64) -> Result<Option<Player>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM players p WHERE p.id = $1", PLAYER_COLUMNS))
            .bind(player_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get player"))?;
        Ok(row.as_ref().map(player_from_row))
    }

    async fn player_teams(&self, player_id: i64) -> Result<Vec<Team>, AppError> {
        let rows = sqlx::query(
            "SELECT t.id, t.league_id, t.code, t.external_id, t.name, t.abbreviation \
             FROM teams t JOIN roster_entries r ON r.team_id = t.id \
             WHERE r.player_id = $1 ORDER BY t.id",
        )
        .bind(player_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("player teams"))?;
        Ok(rows.iter().map(team_from_row).collect())
    }

    async fn list_games(&self, league_id: i64) -> Result<Vec<Game>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM games WHERE league_id = $1 ORDER BY game_date, doubleheader, id",
            GAME_COLUMNS
        ))
        .bind(league_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list games"))?;
        rows.iter().map(game_from_row).collect()
    }

    async fn get_game(&self, game_id: i64) -> Result<Option<Game>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM games WHERE id = $1", GAME_COLUMNS))
            .bind(game_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get game"))?;
        row.as_ref().map(game_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn game_detail(&self, game_id: i64) -> Result<Option<GameDetail>, AppError> {
        let mut tx = self.begin_read().await?;

        let row = sqlx::query(&format!("SELECT {} FROM games WHERE id = $1", GAME_COLUMNS))
            .bind(game_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error("get game"))?;
        let Some(game) = row.as_ref().map(game_from_row).transpose()? else {
            return Ok(None);
        };

        let lines = select_lines(&mut *tx, "g.id = $1", game_id).await?;
        let plays = sqlx::query("SELECT * FROM play_events WHERE game_id = $1 ORDER BY ordinal")
            .bind(game_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(db_error("select plays"))?
            .iter()
            .map(play_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        tx.commit().await.map_err(db_error("end read"))?;
        Ok(Some(GameDetail { game, lines, plays }))
    }

    async fn league_lines(&self, league_id: i64) -> Result<StatLines, AppError> {
        let mut tx = self.begin_read().await?;
        let lines = select_lines(&mut *tx, "g.league_id = $1", league_id).await?;
        tx.commit().await.map_err(db_error("end read"))?;
        Ok(lines)
    }

    async fn player_lines(&self, player_id: i64) -> Result<StatLines, AppError> {
        let mut tx = self.begin_read().await?;
        let lines = select_lines(&mut *tx, "l.player_id = $1", player_id).await?;
        tx.commit().await.map_err(db_error("end read"))?;
        Ok(lines)
    }

    #[instrument(skip(self, request), fields(league_id = request.league_id, date = %request.date))]
    async fn import_snapshot(
        &self,
        request: &SnapshotRequest,
    ) -> Result<ImportSnapshot, AppError> {
        let mut tx = self.begin_read().await?;

        let league = sqlx::query("SELECT id FROM leagues WHERE id = $1")
            .bind(request.league_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error("snapshot league"))?;
        if league.is_none() {
            return Err(AppError::NotFound(format!("League {}", request.league_id)));
        }

        let teams = sqlx::query(&format!(
            "SELECT {} FROM teams WHERE league_id = $1 ORDER BY id",
            TEAM_COLUMNS
        ))
        .bind(request.league_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error("snapshot teams"))?
        .iter()
        .map(team_from_row)
        .collect();

        let roster_rows = sqlx::query(&format!(
            "SELECT r.team_id, {} FROM players p \
             JOIN roster_entries r ON r.player_id = p.id \
             JOIN teams t ON t.id = r.team_id \
             WHERE t.league_id = $1 ORDER BY p.name, p.id",
            PLAYER_COLUMNS
        ))
        .bind(request.league_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error("snapshot rosters"))?;
        let mut rosters: HashMap<i64, Vec<Player>> = HashMap::new();
        for row in &roster_rows {
            rosters
                .entry(row.get("team_id"))
                .or_default()
                .push(player_from_row(row));
        }

        let known_players = sqlx::query(&format!(
            "SELECT {} FROM players p WHERE p.external_id = ANY($1)",
            PLAYER_COLUMNS
        ))
        .bind(&request.player_external_ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error("snapshot known players"))?
        .iter()
        .map(player_from_row)
        .collect();

        let games = sqlx::query(&format!(
            "SELECT {} FROM games WHERE league_id = $1 AND (game_date = $2 OR external_id = $3)",
            GAME_COLUMNS
        ))
        .bind(request.league_id)
        .bind(request.date)
        .bind(&request.game_external_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error("snapshot games"))?
        .iter()
        .map(game_from_row)
        .collect::<Result<Vec<_>, _>>()?;

        tx.commit().await.map_err(db_error("end read"))?;
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
        let mut tx = self.pool.begin().await.map_err(db_error("begin"))?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(import_lock_key(plan))
            .execute(&mut *tx)
            .await
            .map_err(db_error("advisory lock"))?;

        validate_plan(&mut tx, plan).await?;

        let mut teams_created = 0;
        let mut players_created = 0;
        let visitor_team_id = team_id(&mut tx, plan.league_id, &plan.visitor, &mut teams_created).await?;
        let home_team_id = team_id(&mut tx, plan.league_id, &plan.home, &mut teams_created).await?;

        let mut player_ids = Vec::with_capacity(plan.players.len());
        for planned in &plan.players {
            let team_id = match planned.side {
                Side::Visitor => visitor_team_id,
                Side::Home => home_team_id,
            };
            let player_id = player_id(&mut tx, team_id, &planned.player, &mut players_created).await?;
            sqlx::query(
                "INSERT INTO roster_entries (team_id, player_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(team_id)
            .bind(player_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("insert roster entry"))?;
            player_ids.push(player_id);
        }

        let game = &plan.game;
        let imported_at = Utc::now();
        let game_id: i64 = match plan.target {
            GameTarget::Insert => sqlx::query(
                "INSERT INTO games (league_id, external_id, visitor_team_id, home_team_id, game_date, \
                 start_time, doubleheader, venue, status, visitor_line, home_line, source_digest, imported_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) RETURNING id",
            )
            .bind(plan.league_id)
            .bind(&game.external_id)
            .bind(visitor_team_id)
            .bind(home_team_id)
            .bind(game.date)
            .bind(&game.start_time)
            .bind(i16::from(game.doubleheader))
            .bind(Json(&game.venue))
            .bind(game.status.to_string())
            .bind(Json(&game.visitor_line))
            .bind(Json(&game.home_line))
            .bind(&game.source_digest)
            .bind(imported_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error("insert game"))?
            .get("id"),
            GameTarget::Update(id) => {
                sqlx::query(
                    "UPDATE games SET external_id = $2, visitor_team_id = $3, home_team_id = $4, \
                     game_date = $5, start_time = $6, doubleheader = $7, venue = $8, status = $9, \
                     visitor_line = $10, home_line = $11, source_digest = $12, imported_at = $13 \
                     WHERE id = $1",
                )
                .bind(id)
                .bind(&game.external_id)
                .bind(visitor_team_id)
                .bind(home_team_id)
                .bind(game.date)
                .bind(&game.start_time)
                .bind(i16::from(game.doubleheader))
                .bind(Json(&game.venue))
                .bind(game.status.to_string())
                .bind(Json(&game.visitor_line))
                .bind(Json(&game.home_line))
                .bind(&game.source_digest)
                .bind(imported_at)
                .execute(&mut *tx)
                .await
                .map_err(db_error("update game"))?;
                id
            }
        };

        let bound = plan.bind(
            &BoundIds {
                game_id,
                visitor_team_id,
                home_team_id,
                player_ids,
            },
            imported_at,
        );

        if let Some(lines) = &bound.batting {
            sqlx::query("DELETE FROM batting_lines WHERE game_id = $1")
                .bind(game_id)
                .execute(&mut *tx)
                .await
                .map_err(db_error("clear batting lines"))?;
            for line in lines {
                sqlx::query(
                    "INSERT INTO batting_lines (game_id, player_id, team_id, batting_order, position, \
                     starter, substitute, counts) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                )
                .bind(line.game_id)
                .bind(line.player_id)
                .bind(line.team_id)
                .bind(as_db_int(line.batting_order))
                .bind(&line.position)
                .bind(line.starter)
                .bind(line.substitute)
                .bind(Json(&line.counts))
                .execute(&mut *tx)
                .await
                .map_err(db_error("insert batting line"))?;
            }
        }

        if let Some(lines) = &bound.pitching {
            sqlx::query("DELETE FROM pitching_lines WHERE game_id = $1")
                .bind(game_id)
                .execute(&mut *tx)
                .await
                .map_err(db_error("clear pitching lines"))?;
            for line in lines {
                sqlx::query(
                    "INSERT INTO pitching_lines (game_id, player_id, team_id, counts) VALUES ($1, $2, $3, $4)",
                )
                .bind(line.game_id)
                .bind(line.player_id)
                .bind(line.team_id)
                .bind(Json(&line.counts))
                .execute(&mut *tx)
                .await
                .map_err(db_error("insert pitching line"))?;
            }
        }

        if let Some(lines) = &bound.fielding {
            sqlx::query("DELETE FROM fielding_lines WHERE game_id = $1")
                .bind(game_id)
                .execute(&mut *tx)
                .await
                .map_err(db_error("clear fielding lines"))?;
            for line in lines {
                sqlx::query(
                    "INSERT INTO fielding_lines (game_id, player_id, team_id, position, counts) \
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(line.game_id)
                .bind(line.player_id)
                .bind(line.team_id)
                .bind(&line.position)
                .bind(Json(&line.counts))
                .execute(&mut *tx)
                .await
                .map_err(db_error("insert fielding line"))?;
            }
        }

        if let Some(plays) = &bound.plays {
            sqlx::query("DELETE FROM play_events WHERE game_id = $1")
                .bind(game_id)
                .execute(&mut *tx)
                .await
                .map_err(db_error("clear plays"))?;
            for play in plays {
                sqlx::query(
                    "INSERT INTO play_events (game_id, ordinal, inning, half, sequence, outs_before, \
                     batter, pitcher, pitch_sequence, narrative) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
                )
                .bind(play.game_id)
                .bind(as_db_int(play.ordinal))
                .bind(as_db_int(play.inning))
                .bind(play.half.to_string())
                .bind(as_db_int(play.sequence))
                .bind(as_db_int(play.outs_before))
                .bind(&play.batter)
                .bind(&play.pitcher)
                .bind(&play.pitch_sequence)
                .bind(&play.narrative)
                .execute(&mut *tx)
                .await
                .map_err(db_error("insert play"))?;
            }
        }

        tx.commit().await.map_err(db_error("commit"))?;

        debug!(game_id, teams_created, players_created, "Import committed to database");
        Ok(AppliedImport {
            game_id,
            teams_created,
            players_created,
        })
    }
}
