use std::collections::{BTreeMap, HashSet};

use super::models::{Record, StandingRow};
use crate::store::models::{Game, Side, Team};

#[derive(Debug, Default)]
struct TeamLedger {
    overall: Record,
    home: Record,
    away: Record,
    runs_scored: u32,
    runs_allowed: u32,
    /// Chronological results: 'W', 'L' or 'T'
    results: Vec<char>,
}

impl TeamLedger {
    fn run_differential(&self) -> i64 {
        i64::from(self.runs_scored) - i64::from(self.runs_allowed)
    }

    fn streak(&self) -> String {
        let Some(&last) = self.results.last() else {
            return String::new();
        };
        let length = self
            .results
            .iter()
            .rev()
            .take_while(|&&result| result == last)
            .count();
        format!("{}{}", last, length)
    }
}

/// Standings for `teams` from their final games.
///
/// Ordered by winning percentage, then head-to-head percentage among the
/// teams sharing that percentage, then run differential, name and id.
/// Games involving a team outside `teams` are ignored.
pub fn compute_standings(teams: &[Team], games: &[Game]) -> Vec<StandingRow> {
    let mut final_games: Vec<&Game> = games
        .iter()
        .filter(|game| game.status.is_final())
        .filter(|game| {
            teams.iter().any(|team| team.id == game.visitor_team_id)
                && teams.iter().any(|team| team.id == game.home_team_id)
        })
        .collect();
    final_games.sort_by_key(|game| (game.date, game.doubleheader, game.id));

    let mut ledgers: BTreeMap<i64, TeamLedger> =
        teams.iter().map(|team| (team.id, TeamLedger::default())).collect();

    for game in &final_games {
        for side in [Side::Visitor, Side::Home] {
            let (team_id, opponent_side) = match side {
                Side::Visitor => (game.visitor_team_id, Side::Home),
                Side::Home => (game.home_team_id, Side::Visitor),
            };
            let scored = game.runs_for(side);
            let allowed = game.runs_for(opponent_side);

            if let Some(ledger) = ledgers.get_mut(&team_id) {
                ledger.overall.record_result(scored, allowed);
                match side {
                    Side::Home => ledger.home.record_result(scored, allowed),
                    Side::Visitor => ledger.away.record_result(scored, allowed),
                }
                ledger.runs_scored = ledger.runs_scored.saturating_add(scored);
                ledger.runs_allowed = ledger.runs_allowed.saturating_add(allowed);
                ledger.results.push(match scored.cmp(&allowed) {
                    std::cmp::Ordering::Greater => 'W',
                    std::cmp::Ordering::Less => 'L',
                    std::cmp::Ordering::Equal => 'T',
                });
            }
        }
    }

    let mut order: Vec<&Team> = teams.iter().collect();
    order.sort_by(|a, b| {
        let (la, lb) = (&ledgers[&a.id], &ledgers[&b.id]);
        lb.overall.pct().cmp(&la.overall.pct()).then(a.id.cmp(&b.id))
    });

    // Break ties within each block of equal percentage
    let mut start = 0;
    while start < order.len() {
        let pct = ledgers[&order[start].id].overall.pct();
        let end = order[start..]
            .iter()
            .position(|team| ledgers[&team.id].overall.pct() != pct)
            .map_or(order.len(), |offset| start + offset);

        if end - start > 1 {
            let group: HashSet<i64> = order[start..end].iter().map(|team| team.id).collect();
            let head_to_head: BTreeMap<i64, Record> = group
                .iter()
                .map(|&team_id| (team_id, head_to_head(team_id, &group, &final_games)))
                .collect();

            order[start..end].sort_by(|a, b| {
                head_to_head[&b.id]
                    .pct()
                    .cmp(&head_to_head[&a.id].pct())
                    .then(
                        ledgers[&b.id]
                            .run_differential()
                            .cmp(&ledgers[&a.id].run_differential()),
                    )
                    .then(a.name.cmp(&b.name))
                    .then(a.id.cmp(&b.id))
            });
        }
        start = end;
    }

    let leader = order.first().map(|team| ledgers[&team.id].overall);

    order
        .into_iter()
        .enumerate()
        .map(|(index, team)| {
            let ledger = &ledgers[&team.id];
            let record = ledger.overall;
            let games_behind = leader.map_or(0.0, |leader| {
                let wins = f64::from(leader.wins) - f64::from(record.wins);
                let losses = f64::from(record.losses) - f64::from(leader.losses);
                (wins + losses) / 2.0
            });

            StandingRow {
                rank: index + 1,
                team_id: team.id,
                team_code: team.code.clone(),
                team_name: team.name.clone(),
                games: record.games(),
                wins: record.wins,
                losses: record.losses,
                ties: record.ties,
                pct: record.pct().value(),
                games_behind,
                runs_scored: ledger.runs_scored,
                runs_allowed: ledger.runs_allowed,
                run_differential: ledger.run_differential(),
                home: ledger.home,
                away: ledger.away,
                streak: ledger.streak(),
            }
        })
        .collect()
}

fn head_to_head(team_id: i64, group: &HashSet<i64>, games: &[&Game]) -> Record {
    let mut record = Record::default();
    for game in games {
        let Some(side) = game.team_side(team_id) else {
            continue;
        };
        let opponent = match side {
            Side::Visitor => game.home_team_id,
            Side::Home => game.visitor_team_id,
        };
        if !group.contains(&opponent) {
            continue;
        }
        let opponent_side = match side {
            Side::Visitor => Side::Home,
            Side::Home => Side::Visitor,
        };
        record.record_result(game.runs_for(side), game.runs_for(opponent_side));
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::{GameStatus, LineScore, Venue};
    use chrono::{Duration, NaiveDate, Utc};

    fn team(id: i64, name: &str) -> Team {
        Team {
            id,
            league_id: 1,
            code: name.to_uppercase(),
            external_id: None,
            name: name.to_string(),
            abbreviation: None,
        }
    }

    struct Schedule {
        games: Vec<Game>,
    }

    impl Schedule {
        fn new() -> Self {
            Self { games: Vec::new() }
        }

        fn play(&mut self, visitor: i64, visitor_runs: u32, home: i64, home_runs: u32) -> &mut Self {
            self.add(visitor, visitor_runs, home, home_runs, GameStatus::Final)
        }

        fn add(
            &mut self,
            visitor: i64,
            visitor_runs: u32,
            home: i64,
            home_runs: u32,
            status: GameStatus,
        ) -> &mut Self {
            let id = self.games.len() as i64 + 1;
            let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap() + Duration::days(id);
            self.games.push(Game {
                id,
                league_id: 1,
                external_id: None,
                visitor_team_id: visitor,
                home_team_id: home,
                date,
                start_time: String::new(),
                doubleheader: 0,
                venue: Venue::default(),
                status,
                visitor_line: LineScore {
                    runs: visitor_runs,
                    ..Default::default()
                },
                home_line: LineScore {
                    runs: home_runs,
                    ..Default::default()
                },
                source_digest: String::new(),
                imported_at: Utc::now(),
            });
            self
        }
    }

    fn ids(rows: &[StandingRow]) -> Vec<i64> {
        rows.iter().map(|row| row.team_id).collect()
    }

    #[test]
    fn better_record_ranks_first_with_games_behind() {
        let teams = vec![team(1, "Alpha"), team(2, "Beta"), team(3, "Gamma")];
        let mut schedule = Schedule::new();
        // Alpha 10-2, Beta 9-3 against Gamma
        for _ in 0..10 {
            schedule.play(3, 1, 1, 5);
        }
        for _ in 0..2 {
            schedule.play(3, 5, 1, 1);
        }
        for _ in 0..9 {
            schedule.play(3, 0, 2, 2);
        }
        for _ in 0..3 {
            schedule.play(3, 4, 2, 3);
        }

        let rows = compute_standings(&teams, &schedule.games);

        assert_eq!(ids(&rows), vec![1, 2, 3]);
        assert_eq!((rows[0].wins, rows[0].losses), (10, 2));
        assert_eq!(rows[0].games_behind, 0.0);
        assert_eq!(rows[1].games_behind, 1.0);
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[2].rank, 3);
    }

    #[test]
    fn head_to_head_breaks_equal_percentage() {
        let teams = vec![team(1, "Alpha"), team(2, "Beta"), team(3, "Gamma")];
        let mut schedule = Schedule::new();
        schedule
            .play(1, 2, 2, 3) // Beta beats Alpha
            .play(3, 1, 1, 4) // Alpha beats Gamma
            .play(2, 0, 3, 9); // Gamma blows out Beta

        // Everyone is 1-1; the head-to-head records inside the group are
        // also 1-1, so run differential decides: Gamma +6, Alpha +2, Beta -8
        let rows = compute_standings(&teams, &schedule.games);
        assert_eq!(ids(&rows), vec![3, 1, 2]);
    }

    #[test]
    fn head_to_head_wins_over_run_differential() {
        let teams = vec![
            team(1, "Alpha"),
            team(2, "Beta"),
            team(3, "Gamma"),
            team(4, "Delta"),
        ];
        let mut schedule = Schedule::new();
        schedule
            .play(1, 1, 2, 0) // Alpha edges Beta
            .play(1, 0, 4, 10) // Delta routs Alpha
            .play(3, 0, 2, 20); // Beta routs Gamma

        // Alpha and Beta are both 1-1; Beta has the far better run
        // differential but lost the game between them
        let rows = compute_standings(&teams, &schedule.games);
        assert_eq!(ids(&rows), vec![4, 1, 2, 3]);
        assert!(rows[2].run_differential > rows[1].run_differential);
    }

    #[test]
    fn no_head_to_head_games_ties_with_a_winless_head_to_head() {
        let teams = vec![
            team(1, "Alpha"),
            team(2, "Beta"),
            team(3, "Gamma"),
            team(4, "Epsilon"),
            team(5, "Phi"),
        ];
        let mut schedule = Schedule::new();
        schedule
            .play(2, 2, 3, 1) // Beta beats Gamma
            .play(1, 1, 4, 0) // Alpha beats Epsilon
            .play(1, 0, 5, 5) // Phi beats Alpha
            .play(2, 0, 5, 1) // Phi beats Beta
            .play(3, 10, 4, 0); // Gamma routs Epsilon

        // Alpha, Beta and Gamma are 1-1. Inside that group Beta is 1-0,
        // Gamma 0-1 and Alpha 0-0; the last two are level, so Gamma's run
        // differential puts it ahead of Alpha
        let rows = compute_standings(&teams, &schedule.games);
        assert_eq!(ids(&rows), vec![5, 2, 3, 1, 4]);
    }

    #[test]
    fn identical_records_fall_back_to_name_then_id() {
        let teams = vec![team(4, "Zeta"), team(2, "Alpha"), team(3, "Alpha")];
        let rows = compute_standings(&teams, &[]);

        assert_eq!(ids(&rows), vec![2, 3, 4]);
        assert!(rows.iter().all(|row| row.games == 0 && row.pct == 0.0));
        assert!(rows.iter().all(|row| row.streak.is_empty()));
    }

    #[test]
    fn ties_and_non_final_games() {
        let teams = vec![team(1, "Alpha"), team(2, "Beta")];
        let mut schedule = Schedule::new();
        schedule
            .play(1, 3, 2, 3)
            .play(1, 4, 2, 1)
            .add(1, 0, 2, 9, GameStatus::Suspended)
            .add(1, 0, 2, 9, GameStatus::Scheduled);

        let rows = compute_standings(&teams, &schedule.games);
        let alpha = &rows[0];

        assert_eq!(alpha.team_id, 1);
        assert_eq!((alpha.wins, alpha.losses, alpha.ties), (1, 0, 1));
        assert_eq!(alpha.pct, 0.75);
        assert_eq!(alpha.runs_scored, 7);
        assert_eq!(alpha.away, Record { wins: 1, losses: 0, ties: 1 });
        assert_eq!(alpha.streak, "W1");
        assert_eq!(rows[1].games_behind, 1.0);
    }
}
