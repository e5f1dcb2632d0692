pub mod auth;
pub mod edit;
pub mod list;
pub mod new;
pub mod rm;
pub mod show;
pub mod status;
pub mod watch;
