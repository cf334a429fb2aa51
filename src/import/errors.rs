use thiserror::Error;

use crate::parser::ParseError;
use crate::shared::AppError;
use crate::stats::StatRole;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ImportError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{kind} '{name}' matches several existing identities {candidates:?}")]
    AmbiguousIdentity {
        kind: &'static str,
        name: String,
        candidates: Vec<i64>,
    },

    #[error("{name} would receive two {role} lines for the same game")]
    DuplicateLine { name: String, role: StatRole },

    #[error("game matches several stored games {candidates:?}")]
    MultipleGames { candidates: Vec<i64> },
}

impl From<ImportError> for AppError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Parse(parse) => parse.into(),
            ImportError::AmbiguousIdentity { .. } | ImportError::DuplicateLine { .. } => {
                AppError::IdentityAmbiguous(err.to_string())
            }
            ImportError::MultipleGames { .. } => AppError::ReconciliationConflict(err.to_string()),
        }
    }
}
