#[cfg(test)]
mod ice_transport_test;

pub mod ice_candidate;
pub mod ice_credential_type;
pub mod ice_server;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use ice_candidate::{IceCandidate, IceCandidateType, IceProtocol};
pub use ice_credential_type::IceCredentialType;
pub use ice_server::IceServer;

/// IceParameters are the remote ICE credentials handed out by the server.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceParameters {
    pub username_fragment: String,
    pub password: String,
    #[serde(default)]
    pub ice_lite: bool,
}

impl IceParameters {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.username_fragment.is_empty() {
            return Err(Error::ErrParameter(
                "missing iceParameters.usernameFragment".to_owned(),
            ));
        }
        if self.password.is_empty() {
            return Err(Error::ErrParameter(
                "missing iceParameters.password".to_owned(),
            ));
        }
        Ok(())
    }
}

/// IceTransportPolicy defines the ICE candidate policy surface the
/// permitted candidates.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IceTransportPolicy {
    /// any type of candidate used
    #[default]
    #[serde(rename = "all")]
    All,

    /// only media relay candidates used
    #[serde(rename = "relay")]
    Relay,
}

const ICE_TRANSPORT_POLICY_ALL_STR: &str = "all";
const ICE_TRANSPORT_POLICY_RELAY_STR: &str = "relay";

impl From<&str> for IceTransportPolicy {
    fn from(raw: &str) -> Self {
        match raw {
            ICE_TRANSPORT_POLICY_RELAY_STR => IceTransportPolicy::Relay,
            _ => IceTransportPolicy::All,
        }
    }
}

impl fmt::Display for IceTransportPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            IceTransportPolicy::Relay => ICE_TRANSPORT_POLICY_RELAY_STR,
            IceTransportPolicy::All => ICE_TRANSPORT_POLICY_ALL_STR,
        };
        write!(f, "{s}")
    }
}
