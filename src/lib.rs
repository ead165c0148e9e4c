//! FlowBridge: a content-aware HTTP webhook router.
//!
//! See `SPEC_FULL.md` at the repository root for the full design. The
//! module layout mirrors the components of that design, leaves first:
//! [`path`] and [`predicate`] implement the filtering engine, [`routing`]
//! the destination lookup, [`forwarder`] the single bounded upstream POST,
//! [`config`] the loader/validator, and [`pipeline`]/[`api`] the request
//! orchestration and HTTP surface.

pub mod api;
pub mod config;
pub mod error;
pub mod forwarder;
pub mod logging;
pub mod middleware;
pub mod path;
pub mod pipeline;
pub mod predicate;
pub mod routing;

pub use config::Config;
pub use pipeline::AppState;
