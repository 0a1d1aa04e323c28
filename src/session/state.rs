// SPDX-License-Identifier: GPL-3.0-only

//! Session state and its reducer
//!
//! [`SessionState`] is an immutable snapshot: every transition produces a new
//! value through [`reduce`], which is the only place the connect/stream rules
//! live. User intents and connection callbacks both arrive here as
//! [`SessionEvent`]s.

use crate::backends::ConnectionEvent;
use crate::constants::{AUTH_FAILED_REASON, DEFAULT_STREAM_URL};
use crate::errors::StartRejection;
use serde::Serialize;

/// Connect/stream phase derived from a snapshot
///
/// A failed attempt is folded straight back into `Idle` with `last_error`
/// populated, so there is no observable errored phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionPhase {
    Idle,
    Connecting,
    Streaming,
}

impl SessionPhase {
    pub fn description(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "Idle",
            SessionPhase::Connecting => "Connecting",
            SessionPhase::Streaming => "Streaming",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Externally visible session snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionState {
    /// Destination as typed by the user (trimmed when read)
    pub target_url: String,
    /// Camera preview is attached and running
    pub preview_on: bool,
    /// A stream is being transmitted
    pub streaming: bool,
    /// A connect attempt is in flight
    pub connecting: bool,
    /// Most recent user-facing failure
    pub last_error: Option<String>,
    /// A connect command was issued and has not resolved or been cancelled.
    /// Callbacks that arrive without one are stale and ignored.
    #[serde(skip)]
    pub(crate) attempt_outstanding: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(DEFAULT_STREAM_URL)
    }
}

impl SessionState {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            target_url: url.into(),
            preview_on: false,
            streaming: false,
            connecting: false,
            last_error: None,
            attempt_outstanding: false,
        }
    }

    /// The destination with surrounding whitespace removed
    pub fn trimmed_url(&self) -> &str {
        self.target_url.trim()
    }

    pub fn phase(&self) -> SessionPhase {
        if self.streaming {
            SessionPhase::Streaming
        } else if self.connecting {
            SessionPhase::Connecting
        } else {
            SessionPhase::Idle
        }
    }

    /// Whether a start request would currently be accepted by the UI
    pub fn can_start(&self) -> bool {
        !self.streaming && !self.connecting
    }

    fn end_attempt(mut self) -> Self {
        self.connecting = false;
        self.streaming = false;
        self.attempt_outstanding = false;
        self
    }

    fn fail(self, reason: &str) -> Self {
        let mut next = self.end_attempt();
        next.preview_on = false;
        next.last_error = Some(reason.to_string());
        next
    }
}

/// Everything that can move the session from one snapshot to the next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The user edited the destination
    UrlChanged(String),
    /// The camera preview started running
    PreviewStarted,
    /// The camera preview stopped
    PreviewStopped,
    /// The camera preview could not be started
    PreviewFailed(String),
    /// `request_start` refused or aborted before connecting
    StartRejected(StartRejection),
    /// Encoders are ready and the connect command went out
    ConnectIssued,
    /// Callback from the connection client
    Connection(ConnectionEvent),
    /// The user stopped the session
    StopRequested { preview_stopped: bool },
    /// Camera resources were released
    ResourcesDetached,
}

impl From<ConnectionEvent> for SessionEvent {
    fn from(event: ConnectionEvent) -> Self {
        SessionEvent::Connection(event)
    }
}

/// Compute the snapshot that follows `state` once `event` is applied
pub fn reduce(state: &SessionState, event: &SessionEvent) -> SessionState {
    let next = state.clone();
    match event {
        SessionEvent::UrlChanged(url) => SessionState {
            target_url: url.clone(),
            last_error: None,
            ..next
        },
        SessionEvent::PreviewStarted => SessionState {
            preview_on: true,
            last_error: None,
            ..next
        },
        SessionEvent::PreviewStopped => SessionState {
            preview_on: false,
            ..next
        },
        SessionEvent::PreviewFailed(reason) => SessionState {
            preview_on: false,
            last_error: Some(reason.clone()),
            ..next
        },
        SessionEvent::StartRejected(rejection) => {
            let mut next = next.end_attempt();
            next.last_error = Some(rejection.to_string());
            next
        }
        SessionEvent::ConnectIssued => SessionState {
            attempt_outstanding: true,
            last_error: None,
            ..next
        },
        SessionEvent::Connection(event) => reduce_connection(next, event),
        SessionEvent::StopRequested { preview_stopped } => {
            let mut next = next.end_attempt();
            if *preview_stopped {
                next.preview_on = false;
            }
            next
        }
        SessionEvent::ResourcesDetached => {
            let mut next = next.end_attempt();
            next.preview_on = false;
            next
        }
    }
}

fn reduce_connection(state: SessionState, event: &ConnectionEvent) -> SessionState {
    match event {
        ConnectionEvent::ConnectStarted { .. } if state.attempt_outstanding => SessionState {
            connecting: true,
            streaming: false,
            last_error: None,
            ..state
        },
        ConnectionEvent::ConnectSucceeded if state.attempt_outstanding => SessionState {
            connecting: false,
            streaming: true,
            last_error: None,
            attempt_outstanding: false,
            ..state
        },
        ConnectionEvent::ConnectFailed { reason }
            if state.attempt_outstanding || state.streaming =>
        {
            state.fail(reason)
        }
        ConnectionEvent::AuthFailed if state.attempt_outstanding || state.streaming => {
            state.fail(AUTH_FAILED_REASON)
        }
        ConnectionEvent::Disconnected => state.end_attempt(),
        // Stale callbacks for a cancelled attempt, and auth success
        _ => state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issued() -> SessionState {
        reduce(&SessionState::new("rtmp://host/app/key"), &SessionEvent::ConnectIssued)
    }

    fn apply(state: &SessionState, events: &[SessionEvent]) -> SessionState {
        events.iter().fold(state.clone(), |s, e| reduce(&s, e))
    }

    #[test]
    fn test_url_edit_clears_error() {
        let state = reduce(
            &SessionState::new(""),
            &SessionEvent::StartRejected(StartRejection::UrlRequired),
        );
        assert_eq!(state.last_error.as_deref(), Some("URL required"));

        let state = reduce(&state, &SessionEvent::UrlChanged("  rtmp://a/b ".into()));
        assert_eq!(state.last_error, None);
        assert_eq!(state.target_url, "  rtmp://a/b ");
        assert_eq!(state.trimmed_url(), "rtmp://a/b");
    }

    #[test]
    fn test_connect_happy_path() {
        let state = apply(
            &issued(),
            &[SessionEvent::Connection(ConnectionEvent::ConnectStarted {
                url: "rtmp://host/app/key".into(),
            })],
        );
        assert_eq!(state.phase(), SessionPhase::Connecting);

        let state = reduce(&state, &ConnectionEvent::ConnectSucceeded.into());
        assert_eq!(state.phase(), SessionPhase::Streaming);
        assert!(!state.connecting);
        assert_eq!(state.last_error, None);
    }

    #[test]
    fn test_failure_fails_closed() {
        let mut state = issued();
        state.preview_on = true;
        let state = reduce(
            &state,
            &ConnectionEvent::ConnectFailed {
                reason: "timeout".into(),
            }
            .into(),
        );
        assert!(!state.connecting);
        assert!(!state.streaming);
        assert!(!state.preview_on);
        assert_eq!(state.last_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_auth_failure_reason() {
        let state = reduce(&issued(), &ConnectionEvent::AuthFailed.into());
        assert_eq!(state.last_error.as_deref(), Some("authentication error"));
    }

    #[test]
    fn test_disconnect_is_not_an_error() {
        let mut state = reduce(&issued(), &ConnectionEvent::ConnectSucceeded.into());
        state.preview_on = true;
        let state = reduce(&state, &ConnectionEvent::Disconnected.into());
        assert_eq!(state.phase(), SessionPhase::Idle);
        assert!(state.preview_on);
        assert_eq!(state.last_error, None);
    }

    #[test]
    fn test_stale_success_after_stop_is_ignored() {
        let state = apply(
            &issued(),
            &[
                SessionEvent::Connection(ConnectionEvent::ConnectStarted { url: "x".into() }),
                SessionEvent::StopRequested {
                    preview_stopped: false,
                },
                SessionEvent::Connection(ConnectionEvent::ConnectSucceeded),
            ],
        );
        assert!(!state.streaming);
        assert!(!state.connecting);
    }

    #[test]
    fn test_stale_failure_after_stop_is_ignored() {
        let mut state = issued();
        state.preview_on = true;
        let state = apply(
            &state,
            &[
                SessionEvent::StopRequested {
                    preview_stopped: false,
                },
                SessionEvent::Connection(ConnectionEvent::ConnectFailed {
                    reason: "late".into(),
                }),
            ],
        );
        assert!(state.preview_on);
        assert_eq!(state.last_error, None);
    }

    #[test]
    fn test_encoder_rejection_returns_to_idle() {
        let state = reduce(
            &issued(),
            &SessionEvent::StartRejected(StartRejection::EncoderInitFailed),
        );
        assert_eq!(state.phase(), SessionPhase::Idle);
        assert!(!state.attempt_outstanding);
        assert_eq!(
            state.last_error.as_deref(),
            Some("encoder initialization failed")
        );
    }

    #[test]
    fn test_auth_success_is_ignored() {
        let state = issued();
        assert_eq!(reduce(&state, &ConnectionEvent::AuthSucceeded.into()), state);
    }
}
