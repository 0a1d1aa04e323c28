// SPDX-License-Identifier: GPL-3.0-only

//! Livestream - camera preview, live effects and RTMP push
//!
//! This library provides the session core of a live-streaming camera front
//! end: a preview, mutually exclusive visual effects and a connect/stream
//! state machine driven by asynchronous connection callbacks.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`session`]: Session state, reducer, controller and filter selection
//! - [`backends`]: Contracts for the camera/encoder/connection resource, plus
//!   the GStreamer implementation
//! - [`config`]: User configuration handling
//! - [`terminal`]: Interactive terminal front end
//!
//! # Example
//!
//! ```ignore
//! let (events_tx, events_rx) = livestream::backends::connection_events();
//! let client = Arc::new(GstStreamClient::new(config.clone(), events_tx)?);
//! let controller = Arc::new(SessionController::from_config(&config));
//! controller.attach(AttachedResources::from_backend(client));
//! tokio::spawn(Arc::clone(&controller).pump_events(events_rx));
//! controller.start_preview();
//! controller.request_start();
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod session;
pub mod terminal;

// Re-export commonly used types
pub use backends::{AttachedResources, ConnectionEvent, EffectKind};
pub use config::Config;
pub use constants::BitratePreset;
pub use errors::{AppError, BackendError, StartRejection};
pub use session::{FilterSelection, SessionController, SessionPhase, SessionState};
