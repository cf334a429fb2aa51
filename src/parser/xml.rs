use std::borrow::Cow;

use roxmltree::{Document, Node, ParsingOptions};
use tracing::{debug, instrument};

use super::errors::ParseError;
use super::normalize::{
    innings_to_outs, normalize_person_name, normalize_team_code, parse_flag, parse_marker,
    parse_vendor_date,
};
use super::types::{ParsedGame, ParsedPlay, ParsedPlayer, ParsedTeam, Sections};
use crate::stats::{BattingCounts, FieldingCounts, PitchingCounts};
use crate::store::models::{GameStatus, Half, LineScore, Side, Venue};

/// Parses a PrestoSports/DakStats game file into a [`ParsedGame`].
///
/// Pure transform: nothing is looked up or written. Optional sections that
/// are missing become empty collections; structural problems and numbers
/// that do not parse fail with [`ParseError::MalformedInput`].
#[instrument(skip(bytes), fields(bytes = bytes.len()))]
pub fn parse_game_xml(bytes: &[u8]) -> Result<ParsedGame, ParseError> {
    let text = decode(bytes);
    let text = text.trim_start_matches('\u{feff}');

    let mut options = ParsingOptions::default();
    options.allow_dtd = true;

    let doc = Document::parse_with_options(text, options).map_err(|err| {
        let pos = err.pos();
        ParseError::malformed(
            format!("document (line {}, column {})", pos.row, pos.col),
            err.to_string(),
        )
    })?;

    let game = read_game(doc.root_element())?;
    debug!(
        date = %game.date,
        visitor = %game.visitor.code,
        home = %game.home.code,
        plays = game.plays.len(),
        "Parsed game document"
    );
    Ok(game)
}

/// Vendor tools emit either UTF-8 or Latin-1
fn decode(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
    }
}

fn read_game(root: Node) -> Result<ParsedGame, ParseError> {
    let venue = child(root, "venue")
        .ok_or_else(|| ParseError::malformed(location(root, None), "missing <venue> element"))?;

    let raw_date = venue.attribute("date").unwrap_or_default();
    let date = parse_vendor_date(raw_date).ok_or_else(|| {
        ParseError::malformed(
            location(venue, Some("date")),
            format!("unrecognized date '{}'", raw_date),
        )
    })?;

    let doubleheader = count(venue, "dhgame")?;
    let doubleheader = u8::try_from(doubleheader).map_err(|_| {
        ParseError::malformed(
            location(venue, Some("dhgame")),
            format!("doubleheader number {} is out of range", doubleheader),
        )
    })?;

    let venue_info = Venue {
        location: text(venue, "location"),
        stadium: text(venue, "stadium"),
        duration: text(venue, "duration"),
        attendance: count(venue, "attend")?,
        scheduled_innings: optional_count(venue, "schedinn")?,
        weather: text(venue, "weather"),
        league_game: parse_flag(venue.attribute("leaguegame").unwrap_or_default()),
        used_dh: child(venue, "rules")
            .map(|rules| parse_flag(rules.attribute("usedh").unwrap_or_default()))
            .unwrap_or(false),
    };

    let mut sections = Sections::default();
    let mut visitor = None;
    let mut home = None;

    for node in children(root, "team") {
        let side = match node.attribute("vh").map(|vh| vh.trim().to_ascii_uppercase()) {
            Some(vh) if vh == "V" => Side::Visitor,
            Some(vh) if vh == "H" => Side::Home,
            other => {
                return Err(ParseError::malformed(
                    location(node, Some("vh")),
                    format!("expected V or H, found '{}'", other.unwrap_or_default()),
                ))
            }
        };

        let team = read_team(node, side, &mut sections)?;
        let slot = match side {
            Side::Visitor => &mut visitor,
            Side::Home => &mut home,
        };
        if slot.is_some() {
            return Err(ParseError::malformed(
                location(node, Some("vh")),
                format!("more than one {} team", side),
            ));
        }
        *slot = Some(team);
    }

    let visitor = visitor.ok_or_else(|| {
        ParseError::malformed(location(root, None), "missing visiting <team vh=\"V\">")
    })?;
    let home = home.ok_or_else(|| {
        ParseError::malformed(location(root, None), "missing home <team vh=\"H\">")
    })?;

    let plays = match child(root, "plays") {
        Some(plays) => {
            sections.plays = true;
            read_plays(plays)?
        }
        None => Vec::new(),
    };

    Ok(ParsedGame {
        external_id: optional_text(venue, "gameid"),
        date,
        start_time: text(venue, "start"),
        doubleheader,
        venue: venue_info,
        status: read_status(root),
        visitor,
        home,
        plays,
        sections,
    })
}

fn read_status(root: Node) -> GameStatus {
    let Some(status) = child(root, "status") else {
        return GameStatus::Scheduled;
    };

    let complete = status.attribute("complete").unwrap_or_default().trim();
    if parse_flag(complete) {
        GameStatus::Final
    } else if complete.eq_ignore_ascii_case("S")
        || parse_flag(status.attribute("suspended").unwrap_or_default())
    {
        GameStatus::Suspended
    } else {
        GameStatus::Scheduled
    }
}

fn read_team(node: Node, side: Side, sections: &mut Sections) -> Result<ParsedTeam, ParseError> {
    let name = text(node, "name");
    let code = [text(node, "code"), text(node, "id"), name.clone()]
        .into_iter()
        .find(|candidate| !candidate.is_empty())
        .map(|code| normalize_team_code(&code))
        .ok_or_else(|| {
            ParseError::malformed(location(node, Some("code")), "team has no code, id or name")
        })?;

    let line_score = match child(node, "linescore") {
        Some(linescore) => {
            sections.line_score = true;
            read_line_score(linescore)?
        }
        None => LineScore::default(),
    };

    let players = children(node, "player")
        .map(|player| read_player(player, sections))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ParsedTeam {
        side,
        name: if name.is_empty() { code.clone() } else { name },
        code,
        external_id: optional_text(node, "id"),
        line_score,
        players,
    })
}

fn read_line_score(node: Node) -> Result<LineScore, ParseError> {
    let mut innings = Vec::new();
    for (position, inning) in children(node, "lineinn").enumerate() {
        let number = optional_count(inning, "inn")?.unwrap_or(position as u32 + 1);
        innings.push((number, text(inning, "score")));
    }
    innings.sort_by_key(|(number, _)| *number);

    Ok(LineScore {
        runs: count(node, "runs")?,
        hits: count(node, "hits")?,
        errors: count(node, "errs")?,
        left_on_base: count(node, "lob")?,
        innings: innings.into_iter().map(|(_, score)| score).collect(),
    })
}

fn read_player(node: Node, sections: &mut Sections) -> Result<ParsedPlayer, ParseError> {
    let raw_name = match text(node, "name") {
        name if name.is_empty() => text(node, "shortname"),
        name => name,
    };
    let name = normalize_person_name(&raw_name);
    if name.is_empty() {
        return Err(ParseError::malformed(
            location(node, Some("name")),
            "player has no name",
        ));
    }

    // Without a gp attribute, the presence of stat blocks decides.
    let played = match optional_count(node, "gp")? {
        Some(games) => games > 0,
        None => true,
    };

    let batting = child(node, "hitting").map(read_batting).transpose()?;
    let pitching = child(node, "pitching").map(read_pitching).transpose()?;
    let fielding = child(node, "fielding").map(read_fielding).transpose()?;
    sections.batting |= batting.is_some();
    sections.pitching |= pitching.is_some();
    sections.fielding |= fielding.is_some();

    let short_name = match text(node, "shortname") {
        short if short.is_empty() => name.clone(),
        short => short,
    };

    Ok(ParsedPlayer {
        external_id: optional_text(node, "playerId"),
        name,
        short_name,
        uniform_number: optional_text(node, "uni"),
        bats: text(node, "bats"),
        throws: text(node, "throws"),
        class_year: text(node, "class"),
        played,
        starter: count(node, "gs")? > 0,
        substitute: parse_flag(node.attribute("sub").unwrap_or_default()),
        batting_order: count(node, "spot")?,
        position: text(node, "pos"),
        batting,
        pitching,
        fielding,
    })
}

fn read_batting(node: Node) -> Result<BattingCounts, ParseError> {
    Ok(BattingCounts {
        at_bats: count(node, "ab")?,
        runs: count(node, "r")?,
        hits: count(node, "h")?,
        runs_batted_in: count(node, "rbi")?,
        doubles: count(node, "double")?,
        triples: count(node, "triple")?,
        home_runs: count(node, "hr")?,
        walks: count(node, "bb")?,
        strikeouts: count(node, "so")?,
        stolen_bases: count(node, "sb")?,
        caught_stealing: count(node, "cs")?,
        hit_by_pitch: count(node, "hbp")?,
        sacrifice_hits: count(node, "sh")?,
        sacrifice_flies: count(node, "sf")?,
        grounded_into_double_plays: count(node, "gdp")?,
        intentional_walks: count(node, "ibb")?,
        strikeouts_looking: count(node, "kl")?,
    })
}

fn read_pitching(node: Node) -> Result<PitchingCounts, ParseError> {
    let outs = innings_to_outs(node.attribute("ip").unwrap_or_default())
        .map_err(|message| ParseError::malformed(location(node, Some("ip")), message))?;
    let marker = |attr: &str| u32::from(parse_marker(node.attribute(attr).unwrap_or_default()));

    Ok(PitchingCounts {
        appearances: count(node, "appear")?,
        games_started: count(node, "gs")?,
        outs,
        hits: count(node, "h")?,
        runs: count(node, "r")?,
        earned_runs: count(node, "er")?,
        walks: count(node, "bb")?,
        strikeouts: count(node, "so")?,
        home_runs: count(node, "hr")?,
        doubles: count(node, "double")?,
        triples: count(node, "triple")?,
        hit_by_pitch: count(node, "hbp")?,
        batters_faced: count(node, "bf")?,
        wild_pitches: count(node, "wp")?,
        balks: count(node, "bk")?,
        intentional_walks: count(node, "ibb")?,
        pitches: count(node, "pitches")?,
        strikes: count(node, "strikes")?,
        complete_games: count(node, "cg")?,
        shutouts: count(node, "sho")?,
        wins: marker("win"),
        losses: marker("loss"),
        saves: marker("save"),
    })
}

fn read_fielding(node: Node) -> Result<FieldingCounts, ParseError> {
    Ok(FieldingCounts {
        putouts: count(node, "po")?,
        assists: count(node, "a")?,
        errors: count(node, "e")?,
        passed_balls: count(node, "pb")?,
        catcher_interference: count(node, "ci")?,
        stolen_bases_allowed: count(node, "sba")?,
    })
}

fn read_plays(node: Node) -> Result<Vec<ParsedPlay>, ParseError> {
    let mut plays = Vec::new();

    for inning in children(node, "inning") {
        let number = count(inning, "number")?;

        for batting in children(inning, "batting") {
            let half = match batting.attribute("vh").map(str::trim) {
                Some(vh) if vh.eq_ignore_ascii_case("V") => Half::Top,
                _ => Half::Bottom,
            };

            for play in children(batting, "play") {
                let mut narrative = child(play, "narrative")
                    .and_then(|n| n.attribute("text"))
                    .unwrap_or_default()
                    .to_string();
                if narrative.is_empty() {
                    if let Some(sub) = child(play, "sub") {
                        narrative = format!(
                            "{} to {} for {}.",
                            text(sub, "who"),
                            text(sub, "pos"),
                            text(sub, "for")
                        );
                    }
                }

                let batter = text(play, "batter");
                if narrative.is_empty() && batter.is_empty() {
                    continue;
                }

                plays.push(ParsedPlay {
                    inning: number,
                    half,
                    sequence: count(play, "seq")?,
                    outs_before: count(play, "outs")?,
                    batter,
                    pitcher: text(play, "pitcher"),
                    pitch_sequence: child(play, "pitches")
                        .and_then(|p| p.attribute("text"))
                        .unwrap_or_default()
                        .to_string(),
                    narrative,
                });
            }
        }
    }

    Ok(plays)
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

fn children<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |c| c.is_element() && c.tag_name().name() == name)
}

fn location(node: Node, attribute: Option<&str>) -> String {
    let pos = node.document().text_pos_at(node.range().start);
    let element = node.tag_name().name();
    match attribute {
        Some(attribute) => format!(
            "<{}> attribute '{}' (line {}, column {})",
            element, attribute, pos.row, pos.col
        ),
        None => format!("<{}> (line {}, column {})", element, pos.row, pos.col),
    }
}

fn text(node: Node, attribute: &str) -> String {
    node.attribute(attribute)
        .map(|value| value.trim().to_string())
        .unwrap_or_default()
}

fn optional_text(node: Node, attribute: &str) -> Option<String> {
    Some(text(node, attribute)).filter(|value| !value.is_empty())
}

/// Missing or blank counts are zero; anything else must be a whole number.
fn count(node: Node, attribute: &str) -> Result<u32, ParseError> {
    Ok(optional_count(node, attribute)?.unwrap_or(0))
}

fn optional_count(node: Node, attribute: &str) -> Result<Option<u32>, ParseError> {
    match node.attribute(attribute).map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|_| {
            ParseError::malformed(
                location(node, Some(attribute)),
                format!("expected a non-negative whole number, found '{}'", raw),
            )
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const SAMPLE: &str = include_str!("../../tests/fixtures/sample_game.xml");

    fn minimal(teams: &str) -> String {
        format!(
            r#"<bsgame><venue date="4/2/2025"/>{}</bsgame>"#,
            teams
        )
    }

    fn player<'a>(game: &'a ParsedGame, name: &str) -> &'a ParsedPlayer {
        game.teams()
            .into_iter()
            .flat_map(|team| team.players.iter())
            .find(|p| p.name == name)
            .unwrap_or_else(|| panic!("player {} not parsed", name))
    }

    #[test]
    fn parses_sample_game() {
        let game = parse_game_xml(SAMPLE.as_bytes()).unwrap();

        assert_eq!(game.external_id.as_deref(), Some("20250315-TIG-HAW"));
        assert_eq!(game.date, NaiveDate::from_ymd_opt(2025, 3, 15).unwrap());
        assert_eq!(game.status, GameStatus::Final);
        assert_eq!(game.start_time, "4:00 PM");
        assert_eq!(game.venue.attendance, 120);
        assert_eq!(game.venue.scheduled_innings, Some(7));
        assert!(game.venue.league_game);
        assert!(!game.venue.used_dh);

        assert_eq!(game.visitor.code, "TIG");
        assert_eq!(game.visitor.external_id.as_deref(), Some("STATS1"));
        assert_eq!(game.home.name, "Hawks");
        assert_eq!(game.visitor.line_score.runs, 0);
        assert_eq!(game.home.line_score.runs, 5);
        assert_eq!(game.home.line_score.innings.len(), 7);
        assert_eq!(game.home.line_score.innings[6], "X");

        assert_eq!(
            game.sections,
            Sections {
                line_score: true,
                batting: true,
                pitching: true,
                fielding: true,
                plays: true,
            }
        );
    }

    #[test]
    fn maps_player_lines() {
        let game = parse_game_xml(SAMPLE.as_bytes()).unwrap();

        let huffman = player(&game, "A. Huffman");
        let batting = huffman.batting.unwrap();
        assert_eq!((batting.hits, batting.at_bats), (3, 3));
        assert_eq!(batting.runs_batted_in, 3);
        assert_eq!(batting.doubles, 1);
        assert_eq!(huffman.external_id.as_deref(), Some("P200"));
        assert_eq!(huffman.batting_order, 3);
        assert!(huffman.starter);

        let smith = player(&game, "Jordan Smith");
        assert_eq!(smith.short_name, "J. Smith");
        assert_eq!(smith.fielding.unwrap().errors, 1);

        let reed = player(&game, "Taylor Reed");
        let pitching = reed.pitching.unwrap();
        assert_eq!(pitching.outs, 21);
        assert_eq!(pitching.wins, 1);
        assert_eq!(pitching.losses, 0);
        assert!(reed.batting.is_none());

        let bench = player(&game, "Riley Bench");
        assert!(!bench.played);
    }

    #[test]
    fn keeps_play_order_and_synthesizes_substitutions() {
        let game = parse_game_xml(SAMPLE.as_bytes()).unwrap();

        let narratives: Vec<_> = game.plays.iter().map(|p| p.narrative.as_str()).collect();
        assert_eq!(
            narratives,
            vec![
                "J. Smith grounded out to ss.",
                "A. Huffman doubled to left center, 2 RBI.",
                "P. Ortiz to ph for J. Smith.",
                "C. Baker struck out looking.",
            ]
        );
        assert_eq!(game.plays[1].half, Half::Bottom);
        assert_eq!(game.plays[1].pitch_sequence, "KBBX");
        assert_eq!(game.plays[3].sequence, 2);
        assert_eq!(game.plays[3].outs_before, 1);
    }

    #[test]
    fn missing_sections_become_empty() {
        let xml = minimal(
            r#"<team vh="V" code="a" name="Alpha"><player name="X" gp="1"><hitting ab="1"/></player></team>
               <team vh="H" code="b" name="Beta"/>"#,
        );
        let game = parse_game_xml(xml.as_bytes()).unwrap();

        assert_eq!(game.status, GameStatus::Scheduled);
        assert!(game.plays.is_empty());
        assert!(game.home.players.is_empty());
        assert_eq!(game.visitor.code, "A");
        assert!(game.sections.batting);
        assert!(!game.sections.fielding);
        assert!(!game.sections.plays);
        assert!(!game.sections.line_score);
        assert!(game.visitor.players[0].fielding.is_none());
    }

    #[test]
    fn missing_venue_is_malformed() {
        let err = parse_game_xml(b"<bsgame><team vh=\"V\"/></bsgame>").unwrap_err();
        assert!(err.location().starts_with("<bsgame>"));
    }

    #[test]
    fn unparseable_xml_reports_position() {
        let err = parse_game_xml(b"<bsgame><venue></bsgame>").unwrap_err();
        assert!(err.location().starts_with("document (line 1"));
    }

    #[test]
    fn bad_number_names_element_and_attribute() {
        let xml = minimal(
            r#"<team vh="V" code="A"><player name="X"><hitting ab="four"/></player></team>
               <team vh="H" code="B"/>"#,
        );
        let err = parse_game_xml(xml.as_bytes()).unwrap_err();

        assert!(err.location().contains("<hitting> attribute 'ab'"));
        assert!(err.to_string().contains("four"));
    }

    #[test]
    fn rejects_unknown_side_and_duplicate_sides() {
        let bad_side = minimal(r#"<team vh="X" code="A"/><team vh="H" code="B"/>"#);
        let err = parse_game_xml(bad_side.as_bytes()).unwrap_err();
        assert!(err.location().contains("'vh'"));

        let two_home = minimal(r#"<team vh="H" code="A"/><team vh="H" code="B"/>"#);
        assert!(parse_game_xml(two_home.as_bytes()).is_err());

        let one_team = minimal(r#"<team vh="V" code="A"/>"#);
        assert!(parse_game_xml(one_team.as_bytes()).is_err());
    }

    #[test]
    fn rejects_unrecognized_date() {
        let xml = r#"<bsgame><venue date="someday"/><team vh="V" code="A"/><team vh="H" code="B"/></bsgame>"#;
        let err = parse_game_xml(xml.as_bytes()).unwrap_err();
        assert!(err.location().contains("<venue> attribute 'date'"));
    }

    #[test]
    fn decodes_latin1_documents() {
        let mut bytes = br#"<bsgame><venue date="2025-04-02" stadium="Estadio Nu"#.to_vec();
        bytes.push(0xF1); // n with tilde in Latin-1
        bytes.extend_from_slice(br#"ez"/><team vh="V" code="A"/><team vh="H" code="B"/></bsgame>"#);

        let game = parse_game_xml(&bytes).unwrap();
        assert_eq!(game.venue.stadium, "Estadio Nuñez");
    }

    #[test]
    fn suspended_status_is_recognized() {
        let xml = r#"<bsgame><venue date="2025-04-02"/><status complete="N" suspended="Y"/>
            <team vh="V" code="A"/><team vh="H" code="B"/></bsgame>"#;
        let game = parse_game_xml(xml.as_bytes()).unwrap();
        assert_eq!(game.status, GameStatus::Suspended);
    }
}
