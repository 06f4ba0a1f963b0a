use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of SCTP streams a side is willing to open (OS) and accept (MIS).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct NumSctpStreams {
    pub os: u16,
    pub mis: u16,
}

impl Default for NumSctpStreams {
    fn default() -> Self {
        NumSctpStreams {
            os: 1024,
            mis: 1024,
        }
    }
}

/// SctpCapabilities describes the data channel support of the local engine.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SctpCapabilities {
    pub num_streams: NumSctpStreams,
}

impl SctpCapabilities {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.num_streams.os == 0 || self.num_streams.mis == 0 {
            return Err(Error::ErrParameter(
                "sctpCapabilities.numStreams must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }
}

/// SctpParameters describes the remote SCTP association.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SctpParameters {
    pub port: u16,
    #[serde(rename = "OS")]
    pub os: u16,
    #[serde(rename = "MIS")]
    pub mis: u16,
    pub max_message_size: u32,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sctp_capabilities_validate() {
        assert!(SctpCapabilities::default().validate().is_ok());

        let invalid = SctpCapabilities {
            num_streams: NumSctpStreams { os: 0, mis: 1024 },
        };
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_sctp_parameters_deserialize() -> Result<()> {
        let params: SctpParameters = serde_json::from_str(
            r#"{"port":5000,"OS":1024,"MIS":1024,"maxMessageSize":262144}"#,
        )?;
        assert_eq!(params.port, 5000);
        assert_eq!(params.max_message_size, 262144);

        let caps: SctpCapabilities =
            serde_json::from_str(r#"{"numStreams":{"OS":16,"MIS":8}}"#)?;
        assert_eq!(caps.num_streams, NumSctpStreams { os: 16, mis: 8 });

        Ok(())
    }
}
