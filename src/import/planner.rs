use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use tracing::debug;

use super::errors::ImportError;
use super::plan::{
    GameTarget, ImportDecision, ImportPlan, PlannedLine, PlannedPlayer, PlayerRef, TeamRef,
};
use crate::identity::{name_key, resolve_player, resolve_team, MatchPolicy, Resolution};
use crate::parser::{ParsedGame, ParsedPlayer, ParsedTeam};
use crate::stats::StatRole;
use crate::store::models::{
    BattingLine, FieldingLine, Game, NewPlayer, NewTeam, PitchingLine, PlayEvent, Player, Side,
};
use crate::store::ImportSnapshot;

/// Decides how a parsed document lands in the store. Pure: the snapshot
/// is the only view of existing data and nothing is written here.
pub fn plan_import(
    parsed: &ParsedGame,
    snapshot: &ImportSnapshot,
    digest: &str,
    policy: &MatchPolicy,
) -> Result<ImportDecision, ImportError> {
    let visitor = team_ref(&parsed.visitor, snapshot, policy)?;
    let home = team_ref(&parsed.home, snapshot, policy)?;

    let existing = match_game(parsed, &visitor, &home, snapshot)?;
    if let Some(game) = existing {
        if game.source_digest == digest {
            debug!(game_id = game.id, "Document already imported");
            return Ok(ImportDecision::Unchanged { game_id: game.id });
        }
    }

    let mut players = PlayerTable::default();
    let mut lines = LineBuilder::default();

    for team in parsed.teams() {
        let team_ref = match team.side {
            Side::Visitor => &visitor,
            Side::Home => &home,
        };
        let roster: &[Player] = match team_ref {
            TeamRef::Existing(id) => snapshot.rosters.get(id).map(Vec::as_slice).unwrap_or(&[]),
            TeamRef::New(_) => &[],
        };

        for player in &team.players {
            let resolution = resolve_player(player, roster, &snapshot.known_players, policy);
            let index = players.add(team.side, player, resolution, roster, &snapshot.known_players)?;
            if player.played {
                lines.add(index, player)?;
            }
        }
    }

    let sections = parsed.sections;
    let (visitor_line, home_line) = match existing {
        Some(game) if !sections.line_score => (game.visitor_line.clone(), game.home_line.clone()),
        _ => (
            parsed.visitor.line_score.clone(),
            parsed.home.line_score.clone(),
        ),
    };

    let game = Game {
        id: existing.map(|game| game.id).unwrap_or_default(),
        league_id: snapshot.league_id,
        external_id: parsed
            .external_id
            .clone()
            .or_else(|| existing.and_then(|game| game.external_id.clone())),
        visitor_team_id: 0,
        home_team_id: 0,
        date: parsed.date,
        start_time: parsed.start_time.clone(),
        doubleheader: parsed.doubleheader,
        venue: parsed.venue.clone(),
        status: parsed.status,
        visitor_line,
        home_line,
        source_digest: digest.to_string(),
        imported_at: existing.map(|game| game.imported_at).unwrap_or_default(),
    };

    let plays = parsed
        .plays
        .iter()
        .enumerate()
        .map(|(ordinal, play)| PlayEvent {
            game_id: 0,
            ordinal: ordinal as u32,
            inning: play.inning,
            half: play.half,
            sequence: play.sequence,
            outs_before: play.outs_before,
            batter: play.batter.clone(),
            pitcher: play.pitcher.clone(),
            pitch_sequence: play.pitch_sequence.clone(),
            narrative: play.narrative.clone(),
        })
        .collect();

    let plan = ImportPlan {
        league_id: snapshot.league_id,
        target: existing
            .map(|game| GameTarget::Update(game.id))
            .unwrap_or(GameTarget::Insert),
        game,
        visitor,
        home,
        players: players.planned,
        batting: sections.batting.then_some(lines.batting),
        pitching: sections.pitching.then_some(lines.pitching),
        fielding: sections.fielding.then_some(lines.fielding),
        plays: sections.plays.then_some(plays),
    };

    debug!(
        game_target = ?plan.target,
        new_teams = plan.new_team_count(),
        new_players = plan.new_player_count(),
        "Planned import"
    );
    Ok(ImportDecision::Apply(Box::new(plan)))
}

fn team_ref(
    team: &ParsedTeam,
    snapshot: &ImportSnapshot,
    policy: &MatchPolicy,
) -> Result<TeamRef, ImportError> {
    match resolve_team(team, &snapshot.teams, policy) {
        Resolution::Matched(id) => Ok(TeamRef::Existing(id)),
        Resolution::Create => Ok(TeamRef::New(NewTeam {
            code: team.code.clone(),
            external_id: team.external_id.clone(),
            name: team.name.clone(),
            abbreviation: None,
        })),
        Resolution::Ambiguous(candidates) => Err(ImportError::AmbiguousIdentity {
            kind: "team",
            name: team.name.clone(),
            candidates,
        }),
    }
}

/// Finds the stored game this document describes, if any
fn match_game<'a>(
    parsed: &ParsedGame,
    visitor: &TeamRef,
    home: &TeamRef,
    snapshot: &'a ImportSnapshot,
) -> Result<Option<&'a Game>, ImportError> {
    if let Some(external_id) = parsed.external_id.as_deref() {
        let by_id = snapshot
            .games
            .iter()
            .find(|game| game.external_id.as_deref() == Some(external_id));
        if by_id.is_some() {
            return Ok(by_id);
        }
    }

    // A game between teams we have never seen cannot exist yet
    let (TeamRef::Existing(visitor_id), TeamRef::Existing(home_id)) = (visitor, home) else {
        return Ok(None);
    };

    let fixture = Fixture {
        visitor_team_id: *visitor_id,
        home_team_id: *home_id,
        date: parsed.date,
        doubleheader: parsed.doubleheader,
        start_time: &parsed.start_time,
        external_id: parsed.external_id.as_deref(),
    };
    let candidates: Vec<&Game> = snapshot
        .games
        .iter()
        .filter(|game| fixture.matches(game))
        .collect();

    match candidates.as_slice() {
        [] => Ok(None),
        [game] => Ok(Some(*game)),
        many => Err(ImportError::MultipleGames {
            candidates: many.iter().map(|game| game.id).collect(),
        }),
    }
}

/// Natural key of a game: both teams and the date, narrowed by
/// doubleheader number, start time and vendor id where both sides have one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fixture<'a> {
    pub visitor_team_id: i64,
    pub home_team_id: i64,
    pub date: NaiveDate,
    pub doubleheader: u8,
    pub start_time: &'a str,
    pub external_id: Option<&'a str>,
}

impl Fixture<'_> {
    pub fn matches(&self, stored: &Game) -> bool {
        stored.visitor_team_id == self.visitor_team_id
            && stored.home_team_id == self.home_team_id
            && stored.date == self.date
            && match (stored.external_id.as_deref(), self.external_id) {
                (Some(theirs), Some(ours)) => theirs == ours,
                _ => true,
            }
            && (stored.doubleheader == 0
                || self.doubleheader == 0
                || stored.doubleheader == self.doubleheader)
            && start_times_agree(&stored.start_time, self.start_time)
    }
}

fn start_times_agree(stored: &str, parsed: &str) -> bool {
    let (stored, parsed) = (stored.trim(), parsed.trim());
    stored.is_empty() || parsed.is_empty() || stored.eq_ignore_ascii_case(parsed)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PlayerKey {
    Existing(i64),
    New(Side, String, Option<String>),
}

/// Deduplicates resolved players so each identity appears once in the plan
#[derive(Default)]
struct PlayerTable {
    planned: Vec<PlannedPlayer>,
    indices: HashMap<PlayerKey, usize>,
}

impl PlayerTable {
    fn add(
        &mut self,
        side: Side,
        player: &ParsedPlayer,
        resolution: Resolution,
        roster: &[Player],
        known: &[Player],
    ) -> Result<usize, ImportError> {
        let (key, player_ref) = match resolution {
            Resolution::Matched(id) => {
                let stored = roster.iter().chain(known).find(|p| p.id == id);
                let backfill_external_id = match stored {
                    Some(stored) if stored.external_id.is_none() => player.external_id.clone(),
                    _ => None,
                };
                (
                    PlayerKey::Existing(id),
                    PlayerRef::Existing {
                        id,
                        backfill_external_id,
                    },
                )
            }
            Resolution::Create => (
                PlayerKey::New(
                    side,
                    name_key(&player.name),
                    player.uniform_number.clone(),
                ),
                PlayerRef::New(NewPlayer {
                    external_id: player.external_id.clone(),
                    name: player.name.clone(),
                    short_name: player.short_name.clone(),
                    uniform_number: player.uniform_number.clone(),
                    bats: player.bats.clone(),
                    throws: player.throws.clone(),
                    class_year: player.class_year.clone(),
                }),
            ),
            Resolution::Ambiguous(candidates) => {
                return Err(ImportError::AmbiguousIdentity {
                    kind: "player",
                    name: player.name.clone(),
                    candidates,
                })
            }
        };

        if let Some(&index) = self.indices.get(&key) {
            return Ok(index);
        }
        let index = self.planned.len();
        self.planned.push(PlannedPlayer {
            side,
            player: player_ref,
        });
        self.indices.insert(key, index);
        Ok(index)
    }
}

#[derive(Default)]
struct LineBuilder {
    batting: Vec<PlannedLine<BattingLine>>,
    pitching: Vec<PlannedLine<PitchingLine>>,
    fielding: Vec<PlannedLine<FieldingLine>>,
    seen: HashSet<(usize, StatRole)>,
}

impl LineBuilder {
    fn add(&mut self, index: usize, player: &ParsedPlayer) -> Result<(), ImportError> {
        if let Some(counts) = player.batting {
            self.claim(index, player, StatRole::Batting)?;
            self.batting.push(PlannedLine {
                player: index,
                line: BattingLine {
                    game_id: 0,
                    player_id: 0,
                    team_id: 0,
                    batting_order: player.batting_order,
                    position: player.position.clone(),
                    starter: player.starter,
                    substitute: player.substitute,
                    counts,
                },
            });
        }
        if let Some(counts) = player.pitching {
            self.claim(index, player, StatRole::Pitching)?;
            self.pitching.push(PlannedLine {
                player: index,
                line: PitchingLine {
                    game_id: 0,
                    player_id: 0,
                    team_id: 0,
                    counts,
                },
            });
        }
        if let Some(counts) = player.fielding {
            self.claim(index, player, StatRole::Fielding)?;
            self.fielding.push(PlannedLine {
                player: index,
                line: FieldingLine {
                    game_id: 0,
                    player_id: 0,
                    team_id: 0,
                    position: player.position.clone(),
                    counts,
                },
            });
        }
        Ok(())
    }

    fn claim(&mut self, index: usize, player: &ParsedPlayer, role: StatRole) -> Result<(), ImportError> {
        if self.seen.insert((index, role)) {
            Ok(())
        } else {
            Err(ImportError::DuplicateLine {
                name: player.name.clone(),
                role,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_game_xml;
    use crate::stats::BattingCounts;
    use crate::store::models::{GameStatus, LineScore, Team, Venue};
    use chrono::{NaiveDate, Utc};

    const SAMPLE: &str = include_str!("../../tests/fixtures/sample_game.xml");

    fn sample() -> ParsedGame {
        parse_game_xml(SAMPLE.as_bytes()).unwrap()
    }

    fn team(id: i64, code: &str, name: &str) -> Team {
        Team {
            id,
            league_id: 1,
            code: code.to_string(),
            external_id: None,
            name: name.to_string(),
            abbreviation: None,
        }
    }

    fn stored_game(id: i64, external_id: Option<&str>, digest: &str) -> Game {
        Game {
            id,
            league_id: 1,
            external_id: external_id.map(str::to_string),
            visitor_team_id: 10,
            home_team_id: 20,
            date: NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(),
            start_time: String::new(),
            doubleheader: 0,
            venue: Venue::default(),
            status: GameStatus::Final,
            visitor_line: LineScore {
                runs: 1,
                ..Default::default()
            },
            home_line: LineScore::default(),
            source_digest: digest.to_string(),
            imported_at: Utc::now(),
        }
    }

    fn snapshot_with(games: Vec<Game>) -> ImportSnapshot {
        ImportSnapshot {
            league_id: 1,
            teams: vec![team(10, "TIG", "Tigers"), team(20, "HAW", "Hawks")],
            games,
            ..Default::default()
        }
    }

    fn plan(decision: ImportDecision) -> ImportPlan {
        match decision {
            ImportDecision::Apply(plan) => *plan,
            other => panic!("expected a plan, got {:?}", other),
        }
    }

    #[test]
    fn fresh_league_creates_everything() {
        let decision =
            plan_import(&sample(), &ImportSnapshot::default(), "abc", &MatchPolicy::default())
                .unwrap();
        let plan = plan(decision);

        assert_eq!(plan.target, GameTarget::Insert);
        assert_eq!(plan.new_team_count(), 2);
        assert_eq!(plan.new_player_count(), 6);
        assert_eq!(plan.batting.as_ref().map(Vec::len), Some(4));
        assert_eq!(plan.pitching.as_ref().map(Vec::len), Some(2));
        assert_eq!(plan.fielding.as_ref().map(Vec::len), Some(5));
        assert_eq!(plan.plays.as_ref().map(Vec::len), Some(4));
        assert_eq!(plan.game.source_digest, "abc");
    }

    #[test]
    fn vendor_game_id_selects_update() {
        let snapshot = snapshot_with(vec![stored_game(7, Some("20250315-TIG-HAW"), "old")]);
        let plan = plan(plan_import(&sample(), &snapshot, "new", &MatchPolicy::default()).unwrap());

        assert_eq!(plan.target, GameTarget::Update(7));
        assert_eq!(plan.visitor, TeamRef::Existing(10));
        assert_eq!(plan.home, TeamRef::Existing(20));
    }

    #[test]
    fn identical_digest_is_unchanged() {
        let snapshot = snapshot_with(vec![stored_game(7, None, "same")]);
        let decision = plan_import(&sample(), &snapshot, "same", &MatchPolicy::default()).unwrap();

        assert_eq!(decision, ImportDecision::Unchanged { game_id: 7 });
    }

    #[test]
    fn conflicting_vendor_game_id_is_a_different_game() {
        let snapshot = snapshot_with(vec![stored_game(7, Some("OTHER-GAME"), "old")]);
        let plan = plan(plan_import(&sample(), &snapshot, "new", &MatchPolicy::default()).unwrap());

        assert_eq!(plan.target, GameTarget::Insert);
    }

    #[test]
    fn two_natural_key_matches_conflict() {
        let snapshot = snapshot_with(vec![stored_game(7, None, "a"), stored_game(8, None, "b")]);
        let mut parsed = sample();
        parsed.external_id = None;

        let err = plan_import(&parsed, &snapshot, "c", &MatchPolicy::default()).unwrap_err();
        assert_eq!(err, ImportError::MultipleGames { candidates: vec![7, 8] });
    }

    #[test]
    fn doubleheader_number_narrows_candidates() {
        let mut first = stored_game(7, None, "a");
        first.doubleheader = 1;
        let mut second = stored_game(8, None, "b");
        second.doubleheader = 2;
        let snapshot = snapshot_with(vec![first, second]);

        let mut parsed = sample();
        parsed.external_id = None;
        parsed.doubleheader = 2;

        let plan = plan(plan_import(&parsed, &snapshot, "c", &MatchPolicy::default()).unwrap());
        assert_eq!(plan.target, GameTarget::Update(8));
    }

    #[test]
    fn absent_sections_are_left_alone() {
        let snapshot = snapshot_with(vec![stored_game(7, None, "old")]);
        let mut parsed = sample();
        parsed.sections.fielding = false;
        parsed.sections.plays = false;
        parsed.sections.line_score = false;

        let plan = plan(plan_import(&parsed, &snapshot, "new", &MatchPolicy::default()).unwrap());

        assert!(plan.fielding.is_none());
        assert!(plan.plays.is_none());
        assert!(plan.batting.is_some());
        assert_eq!(plan.game.visitor_line.runs, 1, "stored line score kept");
    }

    #[test]
    fn duplicate_player_lines_are_rejected() {
        let mut parsed = sample();
        let mut twin = parsed.home.players[0].clone();
        twin.batting = Some(BattingCounts {
            at_bats: 1,
            ..Default::default()
        });
        parsed.home.players.push(twin);

        let err = plan_import(&parsed, &ImportSnapshot::default(), "x", &MatchPolicy::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ImportError::DuplicateLine {
                role: StatRole::Batting,
                ..
            }
        ));
    }

    #[test]
    fn known_player_gets_vendor_id_backfilled() {
        let mut snapshot = snapshot_with(Vec::new());
        snapshot.rosters.insert(
            20,
            vec![Player {
                id: 55,
                external_id: None,
                name: "Taylor Reed".to_string(),
                short_name: "T. Reed".to_string(),
                uniform_number: Some("18".to_string()),
                bats: String::new(),
                throws: String::new(),
                class_year: String::new(),
            }],
        );

        let plan = plan(plan_import(&sample(), &snapshot, "x", &MatchPolicy::default()).unwrap());
        let reed = plan
            .players
            .iter()
            .find(|planned| matches!(planned.player, PlayerRef::Existing { id: 55, .. }))
            .unwrap();

        assert_eq!(
            reed.player,
            PlayerRef::Existing {
                id: 55,
                backfill_external_id: Some("P202".to_string()),
            }
        );
        assert_eq!(reed.side, Side::Home);
    }
}
