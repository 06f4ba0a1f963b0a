use serde::{Deserialize, Serialize};

use super::dtls_role::*;
use crate::error::{Error, Result};

/// DtlsFingerprint specifies the hash function algorithm and certificate
/// fingerprint as described in <https://tools.ietf.org/html/rfc4572>.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtlsFingerprint {
    /// Algorithm specifies one of the the hash function algorithms defined in
    /// the 'Hash function Textual Names' registry.
    pub algorithm: String,

    /// Value specifies the value of the certificate fingerprint in lowercase
    /// hex string as expressed utilizing the syntax of 'fingerprint' in
    /// <https://tools.ietf.org/html/rfc4572#section-5>.
    pub value: String,
}

/// DtlsParameters holds information relating to DTLS configuration.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtlsParameters {
    #[serde(default)]
    pub role: DtlsRole,
    pub fingerprints: Vec<DtlsFingerprint>,
}

impl DtlsParameters {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.fingerprints.is_empty() {
            return Err(Error::ErrParameter(
                "missing dtlsParameters.fingerprints".to_owned(),
            ));
        }
        for fingerprint in &self.fingerprints {
            if fingerprint.algorithm.is_empty() || fingerprint.value.is_empty() {
                return Err(Error::ErrParameter(
                    "invalid dtlsParameters fingerprint".to_owned(),
                ));
            }
        }
        Ok(())
    }

    /// The session level fingerprint announced in the remote description is
    /// the last one the server offered.
    pub(crate) fn last_fingerprint(&self) -> Option<&DtlsFingerprint> {
        self.fingerprints.last()
    }
}
