//! Router — rule matching and entry point handler assembly
//!
//! Supports Traefik-style rule expressions:
//! - `Host(`domain`)` — match by hostname
//! - `PathPrefix(`/path`)` — match by path prefix
//! - `Path(`/exact`)` — match exact path
//! - `Headers(`key`, `value`)` — match by header
//! - `Method(`GET`)` — match by HTTP method
//! - `&&` — combine matchers with AND
//! - `||` — combine with OR; `&&` binds tighter
//!
//! Parenthesized groups are not supported; write alternatives out in
//! disjunctive form instead.
//!
//! [`Manager`] turns the runtime router table into one handler per entry
//! point, memoizing each router's handler in a [`HandlerCache`].

mod cache;
mod engine;
mod manager;
mod rule;

pub use cache::HandlerCache;
pub use engine::{EngineFactory, RuleEngine, RuleRouter, RuleRouterFactory};
pub use manager::{EntryPointBuild, Manager, RouterBuildError};
pub use rule::{Matcher, Rule};

pub(crate) use engine::request_host;
