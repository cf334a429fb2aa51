//! Import reconciler: turns a vendor document into an atomic write plan
//! and applies it under a per-game lock.

pub mod errors;
pub mod handlers;
pub mod plan;
pub mod planner;
pub mod service;

pub use errors::ImportError;
pub use plan::{
    AppliedImport, BoundIds, BoundImport, GameTarget, ImportAction, ImportDecision, ImportPlan,
    ImportReport, PlannedLine, PlannedPlayer, PlayerRef, TeamRef,
};
pub use planner::{plan_import, Fixture};
pub use service::ImportService;
