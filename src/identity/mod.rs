//! Matching incoming team and player identities against what a league
//! already knows. Everything here is pure; callers decide what to do with
//! a [`Resolution`].

mod resolve;

pub use resolve::{name_key, resolve_player, resolve_team, MatchPolicy, Resolution};
