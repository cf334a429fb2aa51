use std::str::FromStr;

use tracing::warn;

use crate::identity::MatchPolicy;
use crate::query::QueryLimits;

/// Runtime configuration, read once from the environment at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Postgres connection string; the in-memory store is used when unset
    pub database_url: Option<String>,
    pub bind_addr: String,
    /// Upper bound on an uploaded XML document
    pub max_upload_bytes: usize,
    pub identity_match_threshold: f64,
    pub leaderboard_min_at_bats: u32,
    pub leaderboard_min_outs: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            bind_addr: "0.0.0.0:3000".to_string(),
            max_upload_bytes: 16 * 1024 * 1024, // 16 MiB
            identity_match_threshold: MatchPolicy::DEFAULT_THRESHOLD,
            leaderboard_min_at_bats: QueryLimits::DEFAULT_MIN_AT_BATS,
            leaderboard_min_outs: QueryLimits::DEFAULT_MIN_OUTS,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let threshold = env_or("IDENTITY_MATCH_THRESHOLD", defaults.identity_match_threshold);
        let identity_match_threshold = if (0.0..=1.0).contains(&threshold) {
            threshold
        } else {
            warn!(threshold, "IDENTITY_MATCH_THRESHOLD outside 0..=1, using default");
            defaults.identity_match_threshold
        };

        Self {
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
            identity_match_threshold,
            leaderboard_min_at_bats: env_or(
                "LEADERBOARD_MIN_AT_BATS",
                defaults.leaderboard_min_at_bats,
            ),
            leaderboard_min_outs: env_or("LEADERBOARD_MIN_OUTS", defaults.leaderboard_min_outs),
        }
    }

    pub fn match_policy(&self) -> MatchPolicy {
        MatchPolicy {
            threshold: self.identity_match_threshold,
            ..MatchPolicy::default()
        }
    }

    pub fn query_limits(&self) -> QueryLimits {
        QueryLimits {
            min_at_bats: self.leaderboard_min_at_bats,
            min_outs: self.leaderboard_min_outs,
            ..QueryLimits::default()
        }
    }
}

fn env_or<T: FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Ignoring unparseable configuration value");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert!(config.database_url.is_none());
        assert_eq!(config.match_policy().threshold, 0.92);
        assert_eq!(config.query_limits().min_at_bats, 10);
        assert_eq!(config.query_limits().min_outs, 30);
    }

    #[test]
    fn env_or_falls_back_on_garbage() {
        std::env::set_var("DIAMONDSTATS_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_or("DIAMONDSTATS_TEST_GARBAGE", 7u32), 7);
        std::env::set_var("DIAMONDSTATS_TEST_NUMBER", " 12 ");
        assert_eq!(env_or("DIAMONDSTATS_TEST_NUMBER", 7u32), 12);
    }
}
