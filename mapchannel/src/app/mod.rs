//! Application lifecycle.
//!
//! [`MapApp`] creates the shared resources channels and sources need and
//! tears them down again.

mod bootstrap;
mod config;
mod error;

pub use bootstrap::MapApp;
pub use config::{AppConfig, TileCacheConfig};
pub use error::AppError;
