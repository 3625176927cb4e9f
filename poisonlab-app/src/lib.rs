pub mod bootstrap;
pub mod commands;
pub mod config;
pub mod server;

pub use bootstrap::build_state;
pub use config::AppConfig;
pub use server::{router, AppState};
