//! Developer-side orchestrator for a fleet of local LLM backends.
//!
//! [`config`] loads the fleet's TOML config, [`fleet`] discovers and probes
//! hosts, [`classify`] tiers a query, [`route`] places it on a concrete
//! host/model, [`inception`] resolves any mid-stream expert sub-queries in
//! the response, and [`tools`] exposes all of it over HTTP via [`api`].

pub mod api;
pub mod backend;
pub mod classify;
pub mod config;
pub mod error;
pub mod fleet;
pub mod inception;
pub mod route;
pub mod state;
pub mod tools;

pub use config::Config;
pub use error::ToolError;
pub use state::AppState;
