// SPDX-License-Identifier: GPL-3.0-only

//! Streaming session core
//!
//! - [`state`]: the immutable [`SessionState`] snapshot and its reducer
//! - [`controller`]: [`SessionController`], which drives the backend and
//!   publishes snapshots
//! - [`filters`]: mutually exclusive effect selection

pub mod controller;
pub mod filters;
pub mod state;

pub use controller::SessionController;
pub use filters::{FilterPipeline, FilterSelection};
pub use state::{SessionEvent, SessionPhase, SessionState, reduce};
