use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ice_transport::ice_credential_type::IceCredentialType;

const SCHEME_STUN: &str = "stun";
const SCHEME_STUNS: &str = "stuns";
const SCHEME_TURN: &str = "turn";
const SCHEME_TURNS: &str = "turns";

/// IceServer describes a single STUN and TURN server that can be used by
/// the native transport to establish a connection.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub credential: String,
    #[serde(default)]
    pub credential_type: IceCredentialType,
}

impl IceServer {
    pub(crate) fn parse_url(&self, url_str: &str) -> Result<url::Url> {
        url::Url::parse(url_str)
            .map_err(|err| Error::ErrParameter(format!("invalid ICE server url {url_str}: {err}")))
    }

    pub(crate) fn validate(&self) -> Result<()> {
        self.urls()?;
        Ok(())
    }

    pub(crate) fn urls(&self) -> Result<Vec<url::Url>> {
        if self.urls.is_empty() {
            return Err(Error::ErrParameter("ICE server without urls".to_owned()));
        }

        let mut urls = vec![];
        for url_str in &self.urls {
            let url = self.parse_url(url_str)?;
            match url.scheme() {
                SCHEME_STUN | SCHEME_STUNS => {}
                SCHEME_TURN | SCHEME_TURNS => {
                    if self.username.is_empty() || self.credential.is_empty() {
                        return Err(Error::ErrParameter(
                            "turn server credentials required".to_owned(),
                        ));
                    }
                    if self.credential_type == IceCredentialType::Unspecified {
                        return Err(Error::ErrParameter(
                            "invalid turn server credentials".to_owned(),
                        ));
                    }
                }
                scheme => {
                    return Err(Error::ErrParameter(format!(
                        "unknown ICE server scheme {scheme}"
                    )))
                }
            }
            urls.push(url);
        }

        Ok(urls)
    }
}
