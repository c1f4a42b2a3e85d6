pub mod api;
pub mod app;
pub mod config;
pub mod cors;
pub mod error;
pub mod proxy;
pub mod store;
pub mod validation;

pub use api::AppState;
pub use app::build_app;
pub use config::ServerConfig;
