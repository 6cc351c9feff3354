//! Configuration, secret handling, and startup wiring for RepoGPT.

pub mod bootstrap;
pub mod config;
pub mod secret;

pub use config::Config;
