pub mod game_builders;
pub mod setup;

// Re-export main utilities for use by test files
pub use game_builders::{GameBuilder, PlayerEntry};
#[allow(unused_imports)]
pub use setup::{TestSetup, TestSetupBuilder};
