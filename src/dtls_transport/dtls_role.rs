use std::fmt;

use sdp::description::session::ATTR_KEY_CONNECTION_SETUP;
use sdp::util::ConnectionRole;
use sdp::SessionDescription;
use serde::{Deserialize, Serialize};

/// DtlsRole indicates the role of the DTLS transport.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DtlsRole {
    /// DtlsRoleAuto defines the DTLS role is determined based on
    /// the resolved ICE role.
    #[default]
    #[serde(rename = "auto")]
    Auto,

    /// DtlsRoleClient defines the DTLS client role.
    #[serde(rename = "client")]
    Client,

    /// DtlsRoleServer defines the DTLS server role.
    #[serde(rename = "server")]
    Server,
}

const DTLS_ROLE_AUTO_STR: &str = "auto";
const DTLS_ROLE_CLIENT_STR: &str = "client";
const DTLS_ROLE_SERVER_STR: &str = "server";

impl From<&str> for DtlsRole {
    fn from(raw: &str) -> Self {
        match raw {
            DTLS_ROLE_CLIENT_STR => DtlsRole::Client,
            DTLS_ROLE_SERVER_STR => DtlsRole::Server,
            _ => DtlsRole::Auto,
        }
    }
}

impl fmt::Display for DtlsRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            DtlsRole::Auto => DTLS_ROLE_AUTO_STR,
            DtlsRole::Client => DTLS_ROLE_CLIENT_STR,
            DtlsRole::Server => DTLS_ROLE_SERVER_STR,
        };
        write!(f, "{s}")
    }
}

/// Read the local DTLS role out of a session description. The first
/// `a=setup` found decides; none found means auto.
impl From<&SessionDescription> for DtlsRole {
    fn from(session_description: &SessionDescription) -> Self {
        for media_section in &session_description.media_descriptions {
            if let Some(value) = media_section.attribute(ATTR_KEY_CONNECTION_SETUP) {
                return match value {
                    Some("active") => DtlsRole::Client,
                    Some("passive") => DtlsRole::Server,
                    _ => DtlsRole::Auto,
                };
            }
        }

        DtlsRole::Auto
    }
}

impl DtlsRole {
    /// to_connection_role is the `a=setup` value announced for this role.
    pub(crate) fn to_connection_role(self) -> ConnectionRole {
        match self {
            DtlsRole::Client => ConnectionRole::Active,
            DtlsRole::Server => ConnectionRole::Passive,
            DtlsRole::Auto => ConnectionRole::Actpass,
        }
    }

    /// opposite is the role the remote side takes when we take `self`.
    pub fn opposite(self) -> Self {
        match self {
            DtlsRole::Client => DtlsRole::Server,
            DtlsRole::Server => DtlsRole::Client,
            DtlsRole::Auto => DtlsRole::Auto,
        }
    }
}
