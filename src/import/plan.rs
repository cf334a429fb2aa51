use chrono::{DateTime, Utc};
use serde::Serialize;
use strum_macros::Display;

use super::planner::Fixture;
use crate::store::models::{
    BattingLine, FieldingLine, Game, NewPlayer, NewTeam, PitchingLine, PlayEvent, Side,
};

/// Outcome of planning one document against the current store
#[derive(Debug, Clone, PartialEq)]
pub enum ImportDecision {
    /// The matched game was imported from byte-identical input
    Unchanged { game_id: i64 },
    Apply(Box<ImportPlan>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameTarget {
    Insert,
    Update(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TeamRef {
    Existing(i64),
    New(NewTeam),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerRef {
    Existing {
        id: i64,
        /// Vendor id learned from this file for a player stored without one
        backfill_external_id: Option<String>,
    },
    New(NewPlayer),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedPlayer {
    pub side: Side,
    pub player: PlayerRef,
}

/// A stat line whose game, player and team ids are filled in at apply
/// time. `player` indexes [`ImportPlan::players`].
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedLine<T> {
    pub player: usize,
    pub line: T,
}

/// Everything needed to write one game atomically.
///
/// `None` sections were absent from the document and keep whatever is
/// stored; `Some` sections replace the stored ones wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportPlan {
    pub league_id: i64,
    pub target: GameTarget,
    /// Game row with placeholder ids
    pub game: Game,
    pub visitor: TeamRef,
    pub home: TeamRef,
    pub players: Vec<PlannedPlayer>,
    pub batting: Option<Vec<PlannedLine<BattingLine>>>,
    pub pitching: Option<Vec<PlannedLine<PitchingLine>>>,
    pub fielding: Option<Vec<PlannedLine<FieldingLine>>>,
    pub plays: Option<Vec<PlayEvent>>,
}

impl ImportPlan {
    pub fn team(&self, side: Side) -> &TeamRef {
        match side {
            Side::Visitor => &self.visitor,
            Side::Home => &self.home,
        }
    }

    /// Natural key of the planned game once its team ids are known
    pub fn fixture(&self, visitor_team_id: i64, home_team_id: i64) -> Fixture<'_> {
        Fixture {
            visitor_team_id,
            home_team_id,
            date: self.game.date,
            doubleheader: self.game.doubleheader,
            start_time: &self.game.start_time,
            external_id: self.game.external_id.as_deref(),
        }
    }

    pub fn new_team_count(&self) -> usize {
        [&self.visitor, &self.home]
            .iter()
            .filter(|team| matches!(team, TeamRef::New(_)))
            .count()
    }

    pub fn new_player_count(&self) -> usize {
        self.players
            .iter()
            .filter(|planned| matches!(planned.player, PlayerRef::New(_)))
            .count()
    }

    /// Resolves placeholder ids once the store knows the real ones.
    /// `player_ids` is parallel to `players`.
    pub fn bind(&self, ids: &BoundIds, imported_at: DateTime<Utc>) -> BoundImport {
        let team_id = |side: Side| match side {
            Side::Visitor => ids.visitor_team_id,
            Side::Home => ids.home_team_id,
        };
        let owner = |index: usize| {
            let side = self
                .players
                .get(index)
                .map(|planned| planned.side)
                .unwrap_or(Side::Visitor);
            (ids.player_ids.get(index).copied().unwrap_or_default(), team_id(side))
        };

        let game = Game {
            id: ids.game_id,
            league_id: self.league_id,
            visitor_team_id: ids.visitor_team_id,
            home_team_id: ids.home_team_id,
            imported_at,
            ..self.game.clone()
        };

        let batting = self.batting.as_ref().map(|lines| {
            lines
                .iter()
                .map(|planned| {
                    let (player_id, team_id) = owner(planned.player);
                    BattingLine {
                        game_id: ids.game_id,
                        player_id,
                        team_id,
                        ..planned.line.clone()
                    }
                })
                .collect()
        });
        let pitching = self.pitching.as_ref().map(|lines| {
            lines
                .iter()
                .map(|planned| {
                    let (player_id, team_id) = owner(planned.player);
                    PitchingLine {
                        game_id: ids.game_id,
                        player_id,
                        team_id,
                        ..planned.line.clone()
                    }
                })
                .collect()
        });
        let fielding = self.fielding.as_ref().map(|lines| {
            lines
                .iter()
                .map(|planned| {
                    let (player_id, team_id) = owner(planned.player);
                    FieldingLine {
                        game_id: ids.game_id,
                        player_id,
                        team_id,
                        ..planned.line.clone()
                    }
                })
                .collect()
        });
        let plays = self.plays.as_ref().map(|plays| {
            plays
                .iter()
                .map(|play| PlayEvent {
                    game_id: ids.game_id,
                    ..play.clone()
                })
                .collect()
        });

        BoundImport {
            game,
            batting,
            pitching,
            fielding,
            plays,
        }
    }
}

/// Real ids assigned while applying a plan
#[derive(Debug, Clone, PartialEq)]
pub struct BoundIds {
    pub game_id: i64,
    pub visitor_team_id: i64,
    pub home_team_id: i64,
    pub player_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundImport {
    pub game: Game,
    pub batting: Option<Vec<BattingLine>>,
    pub pitching: Option<Vec<PitchingLine>>,
    pub fielding: Option<Vec<FieldingLine>>,
    pub plays: Option<Vec<PlayEvent>>,
}

/// What the store actually did with a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedImport {
    pub game_id: i64,
    pub teams_created: usize,
    pub players_created: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ImportAction {
    Inserted,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReport {
    pub import_id: uuid::Uuid,
    pub league_id: i64,
    pub game_id: i64,
    pub action: ImportAction,
    pub digest: String,
    pub teams_created: usize,
    pub players_created: usize,
    pub batting_lines: usize,
    pub pitching_lines: usize,
    pub fielding_lines: usize,
    pub plays: usize,
}
