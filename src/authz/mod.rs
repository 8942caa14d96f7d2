//! Authorization core - roles, permission evaluation, visibility
//!
//! Every access decision in the application goes through this module instead
//! of being re-derived inline per handler:
//! - workspace role resolution (owner is authoritative, members scanned fresh
//!   per call)
//! - a single permission evaluator over an explicit action enum
//! - the project visibility gate, returning lazy enrollment as data so the
//!   caller decides whether to persist it
//! - the goal visibility gate (private goals are owner-and-members only)
//! - the owner-membership repair procedure

mod evaluator;
mod repair;
mod resolver;
mod roles;
mod visibility;

pub use evaluator::{can_perform, require, WorkspaceAction};
pub use repair::repair_owner_membership;
pub use resolver::resolve_workspace_role;
pub use roles::{ProjectRole, WorkspaceRole};
pub use visibility::{authorize_goal_access, authorize_project_access, AccessDecision};
