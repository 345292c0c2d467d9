//! Connection state machine

use crate::{Error, Result};

/// Connection state
///
/// After every completed request the connection is either `Connected`
/// with the server at ReadyForQuery, or `Error`; there are no
/// half-consumed response streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket; the initial state and the state after close
    Disconnected,

    /// TCP/TLS setup, startup and authentication in progress
    Connecting,

    /// Server is at ReadyForQuery
    Connected,

    /// A local I/O or protocol fault made the session unusable
    Error,
}

impl ConnectionState {
    /// Check if transition is valid
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Error, Connecting)
                | (Connecting, Connected)
                | (_, Error)
                | (_, Disconnected)
        )
    }

    /// Transition to new state
    pub fn transition(&mut self, next: ConnectionState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(Error::Protocol(format!(
                "invalid connection state transition {} -> {}",
                self, next
            )));
        }
        *self = next;
        Ok(())
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_cycle() {
        let mut state = ConnectionState::Disconnected;
        assert!(state.transition(ConnectionState::Connecting).is_ok());
        assert!(state.transition(ConnectionState::Connected).is_ok());
        assert!(state.transition(ConnectionState::Disconnected).is_ok());
    }

    #[test]
    fn test_cannot_skip_connecting() {
        let mut state = ConnectionState::Disconnected;
        assert!(state.transition(ConnectionState::Connected).is_err());
    }

    #[test]
    fn test_error_from_any_state() {
        for start in [
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Disconnected,
        ] {
            let mut state = start;
            assert!(state.transition(ConnectionState::Error).is_ok());
        }
    }

    #[test]
    fn test_reconnect_after_error() {
        let mut state = ConnectionState::Error;
        assert!(state.transition(ConnectionState::Connecting).is_ok());
        assert!(state.transition(ConnectionState::Connected).is_ok());
    }
}
