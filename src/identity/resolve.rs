use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;

use crate::parser::{ParsedPlayer, ParsedTeam};
use crate::store::models::{Player, Team};

/// Thresholds for fuzzy name matching
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchPolicy {
    /// Minimum Jaro-Winkler similarity for a fuzzy match
    pub threshold: f64,
    /// Candidates this close to the best score make the match ambiguous
    pub ambiguity_margin: f64,
}

impl MatchPolicy {
    pub const DEFAULT_THRESHOLD: f64 = 0.92;
    pub const DEFAULT_AMBIGUITY_MARGIN: f64 = 0.02;
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
            ambiguity_margin: Self::DEFAULT_AMBIGUITY_MARGIN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Matched(i64),
    Create,
    /// Several existing identities fit equally well; ids are sorted
    Ambiguous(Vec<i64>),
}

impl Resolution {
    fn from_ids(ids: impl IntoIterator<Item = i64>) -> Option<Self> {
        let ids: BTreeSet<i64> = ids.into_iter().collect();
        match ids.len() {
            0 => None,
            1 => ids.into_iter().next().map(Resolution::Matched),
            _ => Some(Resolution::Ambiguous(ids.into_iter().collect())),
        }
    }
}

/// Lower-cased alphanumeric words separated by single spaces.
/// `"J. SMITH-Jones"` becomes `"j smith jones"`.
pub fn name_key(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolves a file's team against the teams of one league.
///
/// Order: vendor id, exact code, exact name against any alias (code,
/// abbreviation, name), then fuzzy name similarity.
pub fn resolve_team(candidate: &ParsedTeam, existing: &[Team], policy: &MatchPolicy) -> Resolution {
    if let Some(external_id) = candidate.external_id.as_deref() {
        let by_id = existing
            .iter()
            .filter(|team| team.external_id.as_deref() == Some(external_id))
            .map(|team| team.id);
        if let Some(resolution) = Resolution::from_ids(by_id) {
            return resolution;
        }
    }

    if let Some(team) = existing.iter().find(|team| team.code == candidate.code) {
        return Resolution::Matched(team.id);
    }

    let wanted = [name_key(&candidate.name), name_key(&candidate.code)];
    let by_alias = existing
        .iter()
        .filter(|team| {
            team_aliases(team)
                .iter()
                .any(|alias| !alias.is_empty() && wanted.contains(alias))
        })
        .map(|team| team.id);
    if let Some(resolution) = Resolution::from_ids(by_alias) {
        return resolution;
    }

    let name = name_key(&candidate.name);
    best_fuzzy(
        existing
            .iter()
            .map(|team| (team.id, jaro_winkler(&name, &name_key(&team.name)))),
        policy,
    )
}

fn team_aliases(team: &Team) -> Vec<String> {
    let mut aliases = vec![name_key(&team.code), name_key(&team.name)];
    if let Some(abbreviation) = &team.abbreviation {
        aliases.push(name_key(abbreviation));
    }
    aliases
}

/// Resolves a file's player.
///
/// `known` holds players from anywhere in the store that share a vendor id
/// with this file; `roster` is the team's current roster. Name matching
/// only considers the roster and never crosses a conflicting vendor id.
pub fn resolve_player(
    candidate: &ParsedPlayer,
    roster: &[Player],
    known: &[Player],
    policy: &MatchPolicy,
) -> Resolution {
    if let Some(external_id) = candidate.external_id.as_deref() {
        let by_id = roster
            .iter()
            .chain(known)
            .filter(|player| player.external_id.as_deref() == Some(external_id))
            .map(|player| player.id);
        if let Some(resolution) = Resolution::from_ids(by_id) {
            return resolution;
        }
    }

    let eligible: Vec<&Player> = roster
        .iter()
        .filter(|player| {
            !matches!(
                (player.external_id.as_deref(), candidate.external_id.as_deref()),
                (Some(theirs), Some(ours)) if theirs != ours
            )
        })
        .collect();

    let key = name_key(&candidate.name);
    let exact: Vec<&Player> = eligible
        .iter()
        .copied()
        .filter(|player| name_key(&player.name) == key)
        .collect();
    if exact.len() > 1 {
        let narrowed: Vec<&Player> = exact
            .iter()
            .copied()
            .filter(|player| uniforms_agree(player, candidate))
            .collect();
        return Resolution::from_ids(narrowed.iter().map(|player| player.id))
            .unwrap_or_else(|| Resolution::Ambiguous(sorted_ids(&exact)));
    }
    if let Some(player) = exact.first() {
        return Resolution::Matched(player.id);
    }

    best_fuzzy(
        eligible
            .iter()
            .filter(|player| uniforms_agree(player, candidate))
            .map(|player| (player.id, jaro_winkler(&key, &name_key(&player.name)))),
        policy,
    )
}

/// Equal when both are known; an unknown number never rules a player out
fn uniforms_agree(player: &Player, candidate: &ParsedPlayer) -> bool {
    match (
        player.uniform_number.as_deref().map(str::trim),
        candidate.uniform_number.as_deref().map(str::trim),
    ) {
        (Some(theirs), Some(ours)) => theirs == ours,
        _ => true,
    }
}

fn sorted_ids(players: &[&Player]) -> Vec<i64> {
    let ids: BTreeSet<i64> = players.iter().map(|player| player.id).collect();
    ids.into_iter().collect()
}

fn best_fuzzy(scores: impl Iterator<Item = (i64, f64)>, policy: &MatchPolicy) -> Resolution {
    let passing: Vec<(i64, f64)> = scores
        .filter(|(_, score)| *score >= policy.threshold)
        .collect();

    let Some(best) = passing.iter().map(|(_, score)| *score).reduce(f64::max) else {
        return Resolution::Create;
    };

    let contenders = passing
        .into_iter()
        .filter(|(_, score)| best - score <= policy.ambiguity_margin)
        .map(|(id, _)| id);
    Resolution::from_ids(contenders).unwrap_or(Resolution::Create)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::{LineScore, Side};
    use rstest::rstest;

    fn team(id: i64, code: &str, name: &str, external_id: Option<&str>) -> Team {
        Team {
            id,
            league_id: 1,
            code: code.to_string(),
            external_id: external_id.map(str::to_string),
            name: name.to_string(),
            abbreviation: None,
        }
    }

    fn parsed_team(code: &str, name: &str, external_id: Option<&str>) -> ParsedTeam {
        ParsedTeam {
            side: Side::Visitor,
            code: code.to_string(),
            external_id: external_id.map(str::to_string),
            name: name.to_string(),
            line_score: LineScore::default(),
            players: Vec::new(),
        }
    }

    fn player(id: i64, name: &str, uni: Option<&str>, external_id: Option<&str>) -> Player {
        Player {
            id,
            external_id: external_id.map(str::to_string),
            name: name.to_string(),
            short_name: name.to_string(),
            uniform_number: uni.map(str::to_string),
            bats: String::new(),
            throws: String::new(),
            class_year: String::new(),
        }
    }

    fn parsed_player(name: &str, uni: Option<&str>, external_id: Option<&str>) -> ParsedPlayer {
        ParsedPlayer {
            external_id: external_id.map(str::to_string),
            name: name.to_string(),
            short_name: name.to_string(),
            uniform_number: uni.map(str::to_string),
            bats: String::new(),
            throws: String::new(),
            class_year: String::new(),
            played: true,
            starter: true,
            substitute: false,
            batting_order: 1,
            position: "ss".to_string(),
            batting: None,
            pitching: None,
            fielding: None,
        }
    }

    #[rstest]
    #[case("J. Smith", "j smith")]
    #[case("  HUFFMAN,   Ashley ", "huffman ashley")]
    #[case("O'Neil-Smith", "o neil smith")]
    #[case("", "")]
    fn builds_name_keys(#[case] raw: &str, #[case] key: &str) {
        assert_eq!(name_key(raw), key);
    }

    #[test]
    fn team_vendor_id_wins_over_code() {
        let existing = vec![
            team(1, "TIG", "Tigers", Some("OTHER")),
            team(2, "TGR", "Tigers", Some("STATS1")),
        ];
        let candidate = parsed_team("TIG", "Tigers", Some("STATS1"));

        assert_eq!(
            resolve_team(&candidate, &existing, &MatchPolicy::default()),
            Resolution::Matched(2)
        );
    }

    #[test]
    fn team_matches_by_code_then_alias() {
        let mut hawks = team(2, "HAW", "Hawks", None);
        hawks.abbreviation = Some("Hawk Nation".to_string());
        let existing = vec![team(1, "TIG", "Tigers", None), hawks];
        let policy = MatchPolicy::default();

        assert_eq!(
            resolve_team(&parsed_team("TIG", "Anything", None), &existing, &policy),
            Resolution::Matched(1)
        );
        assert_eq!(
            resolve_team(&parsed_team("HWK", "hawks", None), &existing, &policy),
            Resolution::Matched(2)
        );
        assert_eq!(
            resolve_team(&parsed_team("HN", "Hawk Nation", None), &existing, &policy),
            Resolution::Matched(2)
        );
    }

    #[test]
    fn team_fuzzy_match_and_creation() {
        let existing = vec![team(1, "WSU", "Westfield State", None)];
        let policy = MatchPolicy::default();

        assert_eq!(
            resolve_team(&parsed_team("WST", "Westfield St", None), &existing, &policy),
            Resolution::Matched(1)
        );
        assert_eq!(
            resolve_team(&parsed_team("OWL", "Owls", None), &existing, &policy),
            Resolution::Create
        );
    }

    #[test]
    fn duplicate_team_names_are_ambiguous() {
        let existing = vec![
            team(3, "EAG", "Eagles", None),
            team(1, "EGL", "Eagles", None),
        ];
        let candidate = parsed_team("EAGL", "Eagles", None);

        assert_eq!(
            resolve_team(&candidate, &existing, &MatchPolicy::default()),
            Resolution::Ambiguous(vec![1, 3])
        );
    }

    #[test]
    fn player_vendor_id_matches_across_teams() {
        let known = vec![player(9, "Jordan Smith", Some("4"), Some("P100"))];
        let candidate = parsed_player("J. Smith", Some("14"), Some("P100"));

        assert_eq!(
            resolve_player(&candidate, &[], &known, &MatchPolicy::default()),
            Resolution::Matched(9)
        );
    }

    #[test]
    fn player_exact_name_narrowed_by_uniform() {
        let roster = vec![
            player(1, "Chris Lee", Some("3"), None),
            player(2, "Chris Lee", Some("30"), None),
        ];
        let policy = MatchPolicy::default();

        assert_eq!(
            resolve_player(&parsed_player("Chris Lee", Some("30"), None), &roster, &[], &policy),
            Resolution::Matched(2)
        );
        assert_eq!(
            resolve_player(&parsed_player("Chris Lee", None, None), &roster, &[], &policy),
            Resolution::Ambiguous(vec![1, 2])
        );
    }

    #[test]
    fn player_fuzzy_match_requires_matching_uniform() {
        let roster = vec![player(5, "Jonathan Baker", Some("21"), None)];
        let policy = MatchPolicy::default();

        assert_eq!(
            resolve_player(&parsed_player("Jonathon Baker", Some("21"), None), &roster, &[], &policy),
            Resolution::Matched(5)
        );
        assert_eq!(
            resolve_player(&parsed_player("Jonathon Baker", Some("9"), None), &roster, &[], &policy),
            Resolution::Create
        );
    }

    #[test]
    fn conflicting_vendor_ids_never_match_by_name() {
        let roster = vec![player(5, "Casey Baker", Some("21"), Some("P101"))];
        let candidate = parsed_player("Casey Baker", Some("21"), Some("P999"));

        assert_eq!(
            resolve_player(&candidate, &roster, &[], &MatchPolicy::default()),
            Resolution::Create
        );
    }

    #[test]
    fn close_fuzzy_candidates_are_ambiguous() {
        let roster = vec![
            player(1, "Jon Martinez", None, None),
            player(2, "Jun Martinez", None, None),
        ];
        let candidate = parsed_player("Jen Martinez", None, None);

        assert_eq!(
            resolve_player(&candidate, &roster, &[], &MatchPolicy::default()),
            Resolution::Ambiguous(vec![1, 2])
        );
    }
}
