pub mod auth;
pub mod goals;
pub mod health;
pub mod invites;
pub mod notifications;
pub mod portfolios;
pub mod projects;
pub mod tasks;
pub mod workspaces;
