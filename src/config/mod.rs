//! # Configuration Module
//!
//! Configuration can be loaded from:
//! - Environment variables (prefixed with APP__, plus a few plain ones)
//! - Configuration files (config/default.toml, config/{environment}.toml)
//! - .env files (via dotenvy)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chat_outbox::config::Settings;
//!
//! let settings = Settings::load()?;
//! println!("Polling every {}s", settings.outbox.polling_interval_seconds);
//! ```

mod settings;

pub use settings::*;
