use uuid::Uuid;

use super::{ProjectRole, WorkspaceRole};
use crate::models::goal::Goal;
use crate::models::project::ProjectVisibility;

/// Outcome of the project visibility gate.
///
/// `granted_role` carries the lazy-enrollment side effect as data: when set,
/// the caller should persist a new direct role entry for the user. Keeping
/// the mutation out of the check lets read-only callers (and tests) skip it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
    pub granted_role: Option<ProjectRole>,
}

impl AccessDecision {
    fn denied() -> Self {
        Self { allowed: false, granted_role: None }
    }

    fn allowed() -> Self {
        Self { allowed: true, granted_role: None }
    }

    fn enroll(role: ProjectRole) -> Self {
        Self { allowed: true, granted_role: Some(role) }
    }
}

/// Decide whether a user may access a project, first match wins:
///
/// 1. already holds a direct project role - allowed, nothing to record
/// 2. workspace owner/admin - allowed, enrolled as project `Owner`/`Admin`
/// 3. public project and any workspace role - allowed, enrolled as `Member`
/// 4. denied (covers invite-only projects for plain members and strangers)
pub fn authorize_project_access(
    visibility: ProjectVisibility,
    workspace_role: Option<WorkspaceRole>,
    direct_role: Option<ProjectRole>,
) -> AccessDecision {
    if direct_role.is_some() {
        return AccessDecision::allowed();
    }

    match workspace_role {
        Some(WorkspaceRole::Owner) => AccessDecision::enroll(ProjectRole::Owner),
        Some(WorkspaceRole::Admin) => AccessDecision::enroll(ProjectRole::Admin),
        Some(WorkspaceRole::Member) if visibility == ProjectVisibility::Public => {
            AccessDecision::enroll(ProjectRole::Member)
        }
        _ => AccessDecision::denied(),
    }
}

/// Goal visibility has no enrollment side effect: a public goal is open to
/// every workspace member, a private one only to its owner and the users in
/// its `members` list. No workspace role means no access either way.
pub fn authorize_goal_access(
    goal: &Goal,
    workspace_role: Option<WorkspaceRole>,
    user_id: Uuid,
) -> bool {
    if workspace_role.is_none() {
        return false;
    }
    !goal.is_private || goal.owner_id == user_id || goal.members.contains(&user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ProjectVisibility::{InviteOnly, Public};

    #[test]
    fn direct_role_short_circuits_without_enrollment() {
        let decision = authorize_project_access(InviteOnly, None, Some(ProjectRole::Member));
        assert!(decision.allowed);
        assert_eq!(decision.granted_role, None);
    }

    #[test]
    fn workspace_admins_are_enrolled_even_on_invite_only_projects() {
        let decision = authorize_project_access(InviteOnly, Some(WorkspaceRole::Admin), None);
        assert!(decision.allowed);
        assert_eq!(decision.granted_role, Some(ProjectRole::Admin));

        let decision = authorize_project_access(InviteOnly, Some(WorkspaceRole::Owner), None);
        assert_eq!(decision.granted_role, Some(ProjectRole::Owner));
    }

    #[test]
    fn public_project_enrolls_any_workspace_member() {
        let decision = authorize_project_access(Public, Some(WorkspaceRole::Member), None);
        assert!(decision.allowed);
        assert_eq!(decision.granted_role, Some(ProjectRole::Member));
    }

    #[test]
    fn invite_only_project_denies_plain_members() {
        let decision = authorize_project_access(InviteOnly, Some(WorkspaceRole::Member), None);
        assert!(!decision.allowed);
        assert_eq!(decision.granted_role, None);
    }

    #[test]
    fn no_workspace_role_is_always_denied() {
        assert!(!authorize_project_access(Public, None, None).allowed);
        assert!(!authorize_project_access(InviteOnly, None, None).allowed);
    }

    fn goal(owner: Uuid, members: Vec<Uuid>, is_private: bool) -> Goal {
        use crate::models::goal::{GoalStatus, Timeframe};
        Goal {
            id: Uuid::new_v4(),
            workspace_id: Uuid::new_v4(),
            owner_id: owner,
            title: "g".into(),
            description: None,
            status: GoalStatus::NoStatus,
            progress: 0,
            is_private,
            members,
            timeframe: Timeframe::Custom,
            timeframe_year: None,
            start_date: None,
            due_date: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn private_goals_admit_owner_and_listed_members_only() {
        let owner = Uuid::new_v4();
        let member = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let g = goal(owner, vec![member], true);
        let role = Some(WorkspaceRole::Member);

        assert!(authorize_goal_access(&g, role, owner));
        assert!(authorize_goal_access(&g, role, member));
        assert!(!authorize_goal_access(&g, role, stranger));
    }

    #[test]
    fn public_goals_are_open_to_the_workspace_but_not_outsiders() {
        let stranger = Uuid::new_v4();
        let g = goal(Uuid::new_v4(), vec![], false);

        assert!(authorize_goal_access(&g, Some(WorkspaceRole::Member), stranger));
        assert!(!authorize_goal_access(&g, None, stranger));
    }

    #[test]
    fn even_the_goal_owner_needs_a_workspace_role() {
        let owner = Uuid::new_v4();
        let g = goal(owner, vec![], true);
        assert!(!authorize_goal_access(&g, None, owner));
    }
}
