use std::fmt;

use serde::{Deserialize, Serialize};

/// IceProtocol indicates the transport protocol type that is used in the
/// ice.URL structure.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IceProtocol {
    #[default]
    #[serde(rename = "udp")]
    Udp,
    #[serde(rename = "tcp")]
    Tcp,
}

impl fmt::Display for IceProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            IceProtocol::Udp => write!(f, "udp"),
            IceProtocol::Tcp => write!(f, "tcp"),
        }
    }
}

/// IceCandidateType represents the type of the ICE candidate used.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IceCandidateType {
    #[default]
    #[serde(rename = "host")]
    Host,
    #[serde(rename = "srflx")]
    Srflx,
    #[serde(rename = "prflx")]
    Prflx,
    #[serde(rename = "relay")]
    Relay,
}

impl fmt::Display for IceCandidateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            IceCandidateType::Host => "host",
            IceCandidateType::Srflx => "srflx",
            IceCandidateType::Prflx => "prflx",
            IceCandidateType::Relay => "relay",
        };
        write!(f, "{s}")
    }
}

/// IceCandidate is a remote candidate advertised by the server.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub foundation: String,
    pub priority: u32,
    pub ip: String,
    pub protocol: IceProtocol,
    pub port: u16,
    #[serde(rename = "type")]
    pub typ: IceCandidateType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_type: Option<String>,
}

impl IceCandidate {
    /// to_sdp_value renders the candidate as the value of an `a=candidate`
    /// attribute. The server only offers RTP component candidates.
    pub fn to_sdp_value(&self) -> String {
        let mut value = format!(
            "{} 1 {} {} {} {} typ {}",
            self.foundation, self.protocol, self.priority, self.ip, self.port, self.typ
        );
        if let Some(tcp_type) = &self.tcp_type {
            value += &format!(" tcptype {tcp_type}");
        }
        value
    }
}
