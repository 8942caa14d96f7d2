use std::sync::Arc;

use axum::http::Method;
use axum::routing::{delete, get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::jwt::JwtConfig;
use crate::routes::{
    auth, goals, health, invites, notifications, portfolios, projects, tasks, workspaces,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let state = AppState::new(pool, jwt_config);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    let workspace_routes = Router::new()
        .route("/", get(workspaces::list_workspaces))
        .route("/", post(workspaces::create_workspace))
        .route("/:id", get(workspaces::get_workspace))
        .route("/:id", put(workspaces::update_workspace))
        .route("/:id", delete(workspaces::delete_workspace))
        .route("/:id/members", post(workspaces::add_member))
        .route("/:id/members/:user_id", put(workspaces::update_member_role))
        .route("/:id/members/:user_id", delete(workspaces::remove_member))
        .route("/:id/projects", get(projects::list_projects))
        .route("/:id/projects", post(projects::create_project))
        .route("/:id/goals", get(goals::list_goals))
        .route("/:id/goals", post(goals::create_goal))
        .route("/:id/portfolios", get(portfolios::list_portfolios))
        .route("/:id/portfolios", post(portfolios::create_portfolio));

    // Parameter name matches the nested task routes below; axum requires
    // captures at the same position to agree.
    let project_routes = Router::new()
        .route("/:project_id", get(projects::get_project))
        .route("/:project_id", put(projects::update_project))
        .route("/:project_id", delete(projects::delete_project))
        .route("/:project_id/members", post(projects::add_project_member));

    let task_routes = Router::new()
        .route("/", get(tasks::list_tasks))
        .route("/", post(tasks::create_task))
        .route("/:id", put(tasks::update_task))
        .route("/:id", delete(tasks::delete_task));

    let invite_routes = Router::new()
        .route("/", post(invites::create_invite))
        .route("/", get(invites::list_invites))
        .route("/accept", post(invites::accept_invite))
        .route("/validate/:token", get(invites::validate_token))
        .route("/:id", get(invites::get_invite))
        .route("/:id/cancel", post(invites::cancel_invite))
        .route("/:id/reject", post(invites::reject_invite));

    let goal_routes = Router::new()
        .route("/:id", get(goals::get_goal))
        .route("/:id", put(goals::update_goal))
        .route("/:id", delete(goals::delete_goal));

    let portfolio_routes = Router::new()
        .route("/:id", get(portfolios::get_portfolio))
        .route("/:id", put(portfolios::update_portfolio))
        .route("/:id", delete(portfolios::delete_portfolio));

    let notification_routes = Router::new()
        .route("/", get(notifications::list_notifications))
        .route("/:id/read", post(notifications::mark_read));

    let router = Router::new()
        .route("/api/health", get(health::health))
        .nest("/auth", auth_routes)
        .nest("/workspaces", workspace_routes)
        .nest("/projects", project_routes)
        .nest("/projects/:project_id/tasks", task_routes)
        .nest("/goals", goal_routes)
        .nest("/portfolios", portfolio_routes)
        .nest("/invites", invite_routes)
        .nest("/notifications", notification_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
