use super::WorkspaceRole;
use crate::errors::{AppError, AppResult};

/// Workspace-scoped actions subject to permission checks.
///
/// `AddMemberDirect`, `PromoteToAdmin` and `RemoveMember` are not purely
/// role-gated: the verdict also depends on the role being granted to or held
/// by the target user, so [`can_perform`] takes an optional target role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceAction {
    UpdateWorkspace,
    CreateProject,
    InviteMember,
    AddMemberDirect,
    PromoteToAdmin,
    RemoveMember,
    DeleteWorkspace,
}

impl WorkspaceAction {
    fn needs_target(&self) -> bool {
        matches!(
            self,
            WorkspaceAction::AddMemberDirect
                | WorkspaceAction::PromoteToAdmin
                | WorkspaceAction::RemoveMember
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceAction::UpdateWorkspace => "update_workspace",
            WorkspaceAction::CreateProject => "create_project",
            WorkspaceAction::InviteMember => "invite_member",
            WorkspaceAction::AddMemberDirect => "add_member_direct",
            WorkspaceAction::PromoteToAdmin => "promote_to_admin",
            WorkspaceAction::RemoveMember => "remove_member",
            WorkspaceAction::DeleteWorkspace => "delete_workspace",
        }
    }
}

/// Evaluate whether `actor` may perform `action`, total over the declared
/// role/action space.
///
/// The owner role can never be assigned or removed through these actions;
/// a target of `owner` is rejected as an invariant violation rather than a
/// plain deny, so the caller surfaces it instead of silently ignoring it.
pub fn can_perform(
    actor: WorkspaceRole,
    action: WorkspaceAction,
    target: Option<WorkspaceRole>,
) -> AppResult<bool> {
    if action.needs_target() {
        match target {
            Some(WorkspaceRole::Owner) => {
                return Err(AppError::invariant_violation(
                    "the owner role cannot be granted or removed through membership actions",
                ));
            }
            Some(_) => {}
            None => {
                return Err(AppError::internal(format!(
                    "action {} evaluated without a target role",
                    action.as_str()
                )));
            }
        }
    }

    let allowed = match action {
        WorkspaceAction::UpdateWorkspace
        | WorkspaceAction::CreateProject
        | WorkspaceAction::InviteMember => {
            matches!(actor, WorkspaceRole::Owner | WorkspaceRole::Admin)
        }
        WorkspaceAction::AddMemberDirect => match target {
            Some(WorkspaceRole::Admin) => actor == WorkspaceRole::Owner,
            _ => matches!(actor, WorkspaceRole::Owner | WorkspaceRole::Admin),
        },
        WorkspaceAction::RemoveMember => match target {
            Some(WorkspaceRole::Admin) => actor == WorkspaceRole::Owner,
            _ => matches!(actor, WorkspaceRole::Owner | WorkspaceRole::Admin),
        },
        WorkspaceAction::PromoteToAdmin | WorkspaceAction::DeleteWorkspace => {
            actor == WorkspaceRole::Owner
        }
    };

    Ok(allowed)
}

/// Handler-side consolidation of the evaluator: a missing role or a deny
/// verdict becomes `Forbidden`, invariant violations pass through.
pub fn require(
    actor: Option<WorkspaceRole>,
    action: WorkspaceAction,
    target: Option<WorkspaceRole>,
) -> AppResult<()> {
    let role = actor.ok_or_else(|| {
        AppError::forbidden(format!(
            "no workspace role, cannot {}",
            action.as_str()
        ))
    })?;

    if can_perform(role, action, target)? {
        Ok(())
    } else {
        tracing::debug!(actor = %role, action = action.as_str(), "permission denied");
        Err(AppError::forbidden(format!(
            "role {} may not {}",
            role,
            action.as_str()
        )))
    }
}
