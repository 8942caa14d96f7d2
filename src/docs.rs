use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::authz;
use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health,
        routes::auth::register,
        routes::auth::login,
        routes::auth::me,
        routes::workspaces::list_workspaces,
        routes::workspaces::create_workspace,
        routes::workspaces::get_workspace,
        routes::workspaces::update_workspace,
        routes::workspaces::delete_workspace,
        routes::workspaces::add_member,
        routes::workspaces::update_member_role,
        routes::workspaces::remove_member,
        routes::projects::list_projects,
        routes::projects::create_project,
        routes::projects::get_project,
        routes::projects::update_project,
        routes::projects::delete_project,
        routes::projects::add_project_member,
        routes::tasks::list_tasks,
        routes::tasks::create_task,
        routes::tasks::update_task,
        routes::tasks::delete_task,
        routes::goals::list_goals,
        routes::goals::create_goal,
        routes::goals::get_goal,
        routes::goals::update_goal,
        routes::goals::delete_goal,
        routes::portfolios::list_portfolios,
        routes::portfolios::create_portfolio,
        routes::portfolios::get_portfolio,
        routes::portfolios::update_portfolio,
        routes::portfolios::delete_portfolio,
        routes::invites::create_invite,
        routes::invites::list_invites,
        routes::invites::get_invite,
        routes::invites::accept_invite,
        routes::invites::cancel_invite,
        routes::invites::reject_invite,
        routes::invites::validate_token,
        routes::notifications::list_notifications,
        routes::notifications::mark_read,
    ),
    components(
        schemas(
            authz::WorkspaceRole,
            authz::ProjectRole,
            models::user::User,
            models::user::AuthResponse,
            models::user::LoginRequest,
            models::user::RegisterRequest,
            models::workspace::Workspace,
            models::workspace::Member,
            models::workspace::WorkspaceCreateRequest,
            models::workspace::WorkspaceUpdateRequest,
            models::workspace::AddMemberRequest,
            models::workspace::UpdateMemberRoleRequest,
            models::project::Project,
            models::project::ProjectMember,
            models::project::ProjectStatus,
            models::project::ProjectVisibility,
            models::project::ProjectCreateRequest,
            models::project::ProjectUpdateRequest,
            models::project::AddProjectMemberRequest,
            models::task::Task,
            models::task::TaskCreateRequest,
            models::task::TaskUpdateRequest,
            models::goal::Goal,
            models::goal::GoalStatus,
            models::goal::Timeframe,
            models::goal::GoalCreateRequest,
            models::goal::GoalUpdateRequest,
            models::portfolio::Portfolio,
            models::portfolio::PortfolioStatus,
            models::portfolio::PortfolioCreateRequest,
            models::portfolio::PortfolioUpdateRequest,
            models::invite::Invite,
            models::invite::InviteStatus,
            models::invite::RevokeReason,
            models::invite::InviteCreateRequest,
            models::invite::AcceptInviteRequest,
            models::invite::TokenValidation,
            models::notification::Notification,
            routes::health::HealthResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Workspaces", description = "Workspace and membership management"),
        (name = "Projects", description = "Project management and visibility"),
        (name = "Tasks", description = "Task management"),
        (name = "Goals", description = "Workspace goals and their visibility"),
        (name = "Portfolios", description = "Project groupings"),
        (name = "Invites", description = "Workspace invitations"),
        (name = "Notifications", description = "Stored notifications"),
        (name = "Health", description = "Service health")
    )
)]
pub struct ApiDoc;

/// Registers the bearer scheme so Swagger UI's Authorize dialog sends the
/// Authorization header.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
