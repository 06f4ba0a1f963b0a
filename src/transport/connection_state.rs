use std::fmt;

/// ConnectionState indicates the state of the native ICE/DTLS transport
/// behind a [`Transport`].
///
/// [`Transport`]: crate::transport::Transport
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Unspecified,

    /// No connectivity check started yet.
    New,

    /// ICE or DTLS is negotiating.
    Connecting,

    /// Media can flow.
    Connected,

    /// Connectivity was lost; the transport may recover on its own.
    Disconnected,

    /// Connectivity checks failed. Only an ICE restart recovers.
    Failed,

    /// The transport was closed locally. Terminal.
    Closed,
}

const CONNECTION_STATE_NEW_STR: &str = "new";
const CONNECTION_STATE_CONNECTING_STR: &str = "connecting";
const CONNECTION_STATE_CONNECTED_STR: &str = "connected";
const CONNECTION_STATE_DISCONNECTED_STR: &str = "disconnected";
const CONNECTION_STATE_FAILED_STR: &str = "failed";
const CONNECTION_STATE_CLOSED_STR: &str = "closed";

impl From<&str> for ConnectionState {
    fn from(raw: &str) -> Self {
        match raw {
            CONNECTION_STATE_NEW_STR => ConnectionState::New,
            CONNECTION_STATE_CONNECTING_STR => ConnectionState::Connecting,
            CONNECTION_STATE_CONNECTED_STR => ConnectionState::Connected,
            CONNECTION_STATE_DISCONNECTED_STR => ConnectionState::Disconnected,
            CONNECTION_STATE_FAILED_STR => ConnectionState::Failed,
            CONNECTION_STATE_CLOSED_STR => ConnectionState::Closed,
            _ => ConnectionState::Unspecified,
        }
    }
}

impl From<u8> for ConnectionState {
    fn from(v: u8) -> Self {
        match v {
            1 => ConnectionState::New,
            2 => ConnectionState::Connecting,
            3 => ConnectionState::Connected,
            4 => ConnectionState::Disconnected,
            5 => ConnectionState::Failed,
            6 => ConnectionState::Closed,
            _ => ConnectionState::Unspecified,
        }
    }
}

impl From<ConnectionState> for u8 {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Unspecified => 0,
            ConnectionState::New => 1,
            ConnectionState::Connecting => 2,
            ConnectionState::Connected => 3,
            ConnectionState::Disconnected => 4,
            ConnectionState::Failed => 5,
            ConnectionState::Closed => 6,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            ConnectionState::New => CONNECTION_STATE_NEW_STR,
            ConnectionState::Connecting => CONNECTION_STATE_CONNECTING_STR,
            ConnectionState::Connected => CONNECTION_STATE_CONNECTED_STR,
            ConnectionState::Disconnected => CONNECTION_STATE_DISCONNECTED_STR,
            ConnectionState::Failed => CONNECTION_STATE_FAILED_STR,
            ConnectionState::Closed => CONNECTION_STATE_CLOSED_STR,
            ConnectionState::Unspecified => crate::UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}
