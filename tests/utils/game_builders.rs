use std::fmt::Write;

/// One player's entry in a generated game document
#[derive(Debug, Clone)]
pub struct PlayerEntry {
    pub name: String,
    pub uniform: String,
    pub player_id: Option<String>,
    pub spot: u32,
    pub position: String,
    pub hitting: Option<(u32, u32, u32)>,
    pub pitching: Option<(String, u32, u32)>,
    pub fielding: Option<(u32, u32, u32)>,
}

impl PlayerEntry {
    /// Batter with at-bats, hits and home runs
    pub fn batter(name: &str, uniform: &str, spot: u32, ab: u32, h: u32, hr: u32) -> Self {
        Self {
            name: name.to_string(),
            uniform: uniform.to_string(),
            player_id: None,
            spot,
            position: "of".to_string(),
            hitting: Some((ab, h, hr)),
            pitching: None,
            fielding: Some((1, 0, 0)),
        }
    }

    /// Pitcher with innings (vendor notation), earned runs and strikeouts
    pub fn pitcher(name: &str, uniform: &str, ip: &str, er: u32, so: u32) -> Self {
        Self {
            name: name.to_string(),
            uniform: uniform.to_string(),
            player_id: None,
            spot: 0,
            position: "p".to_string(),
            hitting: None,
            pitching: Some((ip.to_string(), er, so)),
            fielding: Some((0, 1, 0)),
        }
    }

    pub fn with_id(mut self, player_id: &str) -> Self {
        self.player_id = Some(player_id.to_string());
        self
    }
}

#[derive(Debug, Clone)]
struct TeamEntry {
    code: String,
    name: String,
    runs: u32,
    players: Vec<PlayerEntry>,
}

/// Builder for PrestoSports-style game documents
#[derive(Debug, Clone)]
pub struct GameBuilder {
    game_id: Option<String>,
    date: String,
    start: String,
    doubleheader: u8,
    complete: bool,
    visitor: TeamEntry,
    home: TeamEntry,
    line_score: bool,
    plays: bool,
    batting: bool,
    pitching: bool,
    fielding: bool,
}

impl GameBuilder {
    pub fn new(visitor: (&str, &str), home: (&str, &str)) -> Self {
        let team = |(code, name): (&str, &str)| TeamEntry {
            code: code.to_string(),
            name: name.to_string(),
            runs: 0,
            players: Vec::new(),
        };
        Self {
            game_id: None,
            date: "3/15/2025".to_string(),
            start: String::new(),
            doubleheader: 0,
            complete: true,
            visitor: team(visitor),
            home: team(home),
            line_score: true,
            plays: true,
            batting: true,
            fielding: true,
            pitching: true,
        }
    }

    /// Tigers at Hawks, the pairing most tests use
    pub fn tigers_at_hawks() -> Self {
        Self::new(("TIG", "Tigers"), ("HAW", "Hawks"))
    }

    pub fn game_id(mut self, game_id: &str) -> Self {
        self.game_id = Some(game_id.to_string());
        self
    }

    pub fn on(mut self, date: &str) -> Self {
        self.date = date.to_string();
        self
    }

    pub fn doubleheader(mut self, number: u8) -> Self {
        self.doubleheader = number;
        self
    }

    pub fn score(mut self, visitor: u32, home: u32) -> Self {
        self.visitor.runs = visitor;
        self.home.runs = home;
        self
    }

    pub fn in_progress(mut self) -> Self {
        self.complete = false;
        self
    }

    pub fn visitor_player(mut self, player: PlayerEntry) -> Self {
        self.visitor.players.push(player);
        self
    }

    pub fn home_player(mut self, player: PlayerEntry) -> Self {
        self.home.players.push(player);
        self
    }

    pub fn without_plays(mut self) -> Self {
        self.plays = false;
        self
    }

    pub fn without_pitching(mut self) -> Self {
        self.pitching = false;
        self
    }

    pub fn without_fielding(mut self) -> Self {
        self.fielding = false;
        self
    }

    pub fn without_line_score(mut self) -> Self {
        self.line_score = false;
        self
    }

    pub fn build(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<bsgame>\n");
        let game_id = self
            .game_id
            .as_ref()
            .map(|id| format!(" gameid=\"{}\"", id))
            .unwrap_or_default();
        let _ = writeln!(
            xml,
            "  <venue{} date=\"{}\" start=\"{}\" dhgame=\"{}\" schedinn=\"7\"/>",
            game_id, self.date, self.start, self.doubleheader
        );
        let _ = writeln!(
            xml,
            "  <status complete=\"{}\"/>",
            if self.complete { "Y" } else { "N" }
        );
        self.write_team(&mut xml, "V", &self.visitor);
        self.write_team(&mut xml, "H", &self.home);

        if self.plays {
            xml.push_str("  <plays>\n    <inning number=\"1\">\n      <batting vh=\"V\">\n");
            xml.push_str("        <play seq=\"1\" outs=\"0\"><narrative text=\"Leadoff grounded out.\"/></play>\n");
            xml.push_str("      </batting>\n    </inning>\n  </plays>\n");
        }
        xml.push_str("</bsgame>\n");
        xml
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.build().into_bytes()
    }

    fn write_team(&self, xml: &mut String, vh: &str, team: &TeamEntry) {
        let _ = writeln!(
            xml,
            "  <team vh=\"{}\" code=\"{}\" name=\"{}\">",
            vh, team.code, team.name
        );
        if self.line_score {
            let _ = writeln!(
                xml,
                "    <linescore runs=\"{}\" hits=\"0\" errs=\"0\" lob=\"0\"/>",
                team.runs
            );
        }
        for player in &team.players {
            let player_id = player
                .player_id
                .as_ref()
                .map(|id| format!(" playerId=\"{}\"", id))
                .unwrap_or_default();
            let _ = writeln!(
                xml,
                "    <player name=\"{}\" uni=\"{}\" gp=\"1\" gs=\"1\" spot=\"{}\" pos=\"{}\"{}>",
                player.name, player.uniform, player.spot, player.position, player_id
            );
            if let (true, Some((ab, h, hr))) = (self.batting, player.hitting) {
                let _ = writeln!(
                    xml,
                    "      <hitting ab=\"{}\" h=\"{}\" hr=\"{}\"/>",
                    ab, h, hr
                );
            }
            if let (true, Some((ip, er, so))) = (self.pitching, &player.pitching) {
                let _ = writeln!(
                    xml,
                    "      <pitching appear=\"1\" ip=\"{}\" er=\"{}\" r=\"{}\" so=\"{}\"/>",
                    ip, er, er, so
                );
            }
            if let (true, Some((po, a, e))) = (self.fielding, player.fielding) {
                let _ = writeln!(
                    xml,
                    "      <fielding po=\"{}\" a=\"{}\" e=\"{}\"/>",
                    po, a, e
                );
            }
            xml.push_str("    </player>\n");
        }
        xml.push_str("  </team>\n");
    }
}
