use super::WorkspaceRole;
use crate::models::workspace::{Member, Workspace};

/// Restore the owner-membership invariant: `owner_id` must appear in
/// `members` with role `owner`.
///
/// Idempotent upsert - a correct entry is left alone, a wrong-role entry is
/// corrected in place, a missing entry is appended. Returns whether anything
/// changed so callers only write back repaired workspaces. Legacy bare-id
/// member arrays were already converted to object form when the row was
/// decoded, so saving the repaired workspace persists the canonical shape.
pub fn repair_owner_membership(workspace: &mut Workspace) -> bool {
    let owner_id = workspace.owner_id;

    if let Some(entry) = workspace
        .members
        .iter_mut()
        .find(|member| member.user_id == owner_id)
    {
        if entry.role == WorkspaceRole::Owner {
            return false;
        }
        entry.role = WorkspaceRole::Owner;
        return true;
    }

    workspace.members.push(Member {
        user_id: owner_id,
        role: WorkspaceRole::Owner,
    });
    true
}
