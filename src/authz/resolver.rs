use uuid::Uuid;

use super::WorkspaceRole;
use crate::models::workspace::Workspace;

/// Resolve the effective workspace role of a user.
///
/// `owner_id` is authoritative: the owner resolves to `owner` even when the
/// membership collection disagrees or omits them (historical data predating
/// the owner-membership invariant). Everyone else is looked up in `members`,
/// which is already canonical at this point - legacy bare-id entries were
/// normalized to `{userId, role}` when the row was decoded.
///
/// Resolution is fresh per call on purpose; a role can change between two
/// requests of the same session and callers must observe the latest value.
pub fn resolve_workspace_role(workspace: &Workspace, user_id: Uuid) -> Option<WorkspaceRole> {
    if workspace.owner_id == user_id {
        return Some(WorkspaceRole::Owner);
    }

    workspace
        .members
        .iter()
        .find(|member| member.user_id == user_id)
        .map(|member| member.role)
}
