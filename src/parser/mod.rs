pub mod errors;
pub mod normalize;
pub mod types;
pub mod xml;

pub use errors::ParseError;
pub use types::{ParsedGame, ParsedPlay, ParsedPlayer, ParsedTeam, Sections};
pub use xml::parse_game_xml;
