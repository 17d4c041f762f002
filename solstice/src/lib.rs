//! Application bootstrapping based on [solstice_di] dependency injection.
//!
//! Instead of defining every service in code, applications can describe them in JSON definition
//! files (see [loader]) and let [Application](application::Application) build a standalone
//! [Core](solstice_di::Core) out of them. The application also configures supporting
//! infrastructure, e.g. logging, according to its [config].

pub mod application;
pub mod config;
pub mod loader;
