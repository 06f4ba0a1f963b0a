use std::fmt;

use serde::{Deserialize, Serialize};

/// IceCredentialType indicates the type of credentials used to connect to
/// an ICE server.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IceCredentialType {
    #[serde(rename = "unspecified")]
    Unspecified,

    /// IceCredentialType::Password describes username and password based
    /// credentials as described in <https://tools.ietf.org/html/rfc5389>.
    #[default]
    #[serde(rename = "password")]
    Password,

    /// IceCredentialType::Oauth describes token based credential as described
    /// in <https://tools.ietf.org/html/rfc7635>.
    #[serde(rename = "oauth")]
    Oauth,
}

const ICE_CREDENTIAL_TYPE_PASSWORD_STR: &str = "password";
const ICE_CREDENTIAL_TYPE_OAUTH_STR: &str = "oauth";

impl From<&str> for IceCredentialType {
    fn from(raw: &str) -> Self {
        match raw {
            ICE_CREDENTIAL_TYPE_PASSWORD_STR => IceCredentialType::Password,
            ICE_CREDENTIAL_TYPE_OAUTH_STR => IceCredentialType::Oauth,
            _ => IceCredentialType::Unspecified,
        }
    }
}

impl fmt::Display for IceCredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            IceCredentialType::Password => write!(f, "{ICE_CREDENTIAL_TYPE_PASSWORD_STR}"),
            IceCredentialType::Oauth => write!(f, "{ICE_CREDENTIAL_TYPE_OAUTH_STR}"),
            _ => write!(f, "{}", crate::UNSPECIFIED_STR),
        }
    }
}
