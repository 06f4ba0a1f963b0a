use std::fmt;

use serde::{Deserialize, Serialize};

/// TransportDirection tells whether a transport sends or receives media.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportDirection {
    #[default]
    #[serde(rename = "unspecified")]
    Unspecified,

    /// Carries Producers.
    #[serde(rename = "send")]
    Send,

    /// Carries Consumers.
    #[serde(rename = "recv")]
    Recv,
}

const TRANSPORT_DIRECTION_SEND_STR: &str = "send";
const TRANSPORT_DIRECTION_RECV_STR: &str = "recv";

impl From<&str> for TransportDirection {
    fn from(raw: &str) -> Self {
        match raw {
            TRANSPORT_DIRECTION_SEND_STR => TransportDirection::Send,
            TRANSPORT_DIRECTION_RECV_STR => TransportDirection::Recv,
            _ => TransportDirection::Unspecified,
        }
    }
}

impl fmt::Display for TransportDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            TransportDirection::Send => TRANSPORT_DIRECTION_SEND_STR,
            TransportDirection::Recv => TRANSPORT_DIRECTION_RECV_STR,
            TransportDirection::Unspecified => crate::UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}
