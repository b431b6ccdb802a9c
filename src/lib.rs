pub mod ops;

mod app;
pub mod commands;
pub mod config;
pub mod error;
pub mod plugin;
pub mod pull_request;
pub mod registry;

pub use app::App;
pub use app::FORK_REMOTE;
pub use app::ForkTarget;
pub use app::Reconciled;
pub use config::Config;
pub use error::SkillKitError;

// Disable colors for all tests to get clean output
#[cfg(test)]
#[ctor::ctor]
fn init_tests() {
    colored::control::set_override(false);
}
