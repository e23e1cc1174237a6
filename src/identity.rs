//! Product identification from the `ATI` response.

use crate::response::Response;
use serde::{Deserialize, Serialize};

/// Fields a SIMCom module reports for `ATI`.
///
/// ```text
/// Manufacturer: SIMCOM INCORPORATED
/// Model: SIMCOM_SIM7600E-H
/// Revision: SIM7600M22_V1.1
/// IMEI: 868822040061234
/// +GCAP: +CGSM
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub revision: Option<String>,
    pub imei: Option<String>,
}

impl DeviceIdentity {
    /// Pick the known `Key: value` lines out of an `ATI` response.
    pub fn parse(response: &Response) -> Self {
        let mut identity = Self::default();
        for line in response.body() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let slot = match key.trim() {
                "Manufacturer" => &mut identity.manufacturer,
                "Model" => &mut identity.model,
                "Revision" => &mut identity.revision,
                "IMEI" => &mut identity.imei,
                _ => continue,
            };
            *slot = Some(value.to_string());
        }
        identity
    }

    pub fn is_simcom(&self) -> bool {
        self.manufacturer
            .as_deref()
            .is_some_and(|m| m.to_ascii_uppercase().contains("SIMCOM"))
    }

    pub fn is_sim7600(&self) -> bool {
        self.is_simcom() && self.model.as_deref().is_some_and(|m| m.contains("SIM7600"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ati(lines: &[&str]) -> Response {
        Response::new("ATI", lines.iter().map(|l| l.to_string()).collect())
    }

    #[test]
    fn test_parse_sim7600() {
        let identity = DeviceIdentity::parse(&ati(&[
            "ATI",
            "Manufacturer: SIMCOM INCORPORATED",
            "Model: SIMCOM_SIM7600E-H",
            "Revision: SIM7600M22_V1.1",
            "IMEI: 868822040061234",
            "+GCAP: +CGSM",
            "",
            "OK",
        ]));

        assert_eq!(
            identity,
            DeviceIdentity {
                manufacturer: Some("SIMCOM INCORPORATED".into()),
                model: Some("SIMCOM_SIM7600E-H".into()),
                revision: Some("SIM7600M22_V1.1".into()),
                imei: Some("868822040061234".into()),
            }
        );
        assert!(identity.is_simcom());
        assert!(identity.is_sim7600());
    }

    #[test]
    fn test_parse_other_vendor() {
        let identity = DeviceIdentity::parse(&ati(&["Quectel", "EC25", "Revision: EC25EFAR06A06M4G", "OK"]));

        assert_eq!(identity.manufacturer, None);
        assert_eq!(identity.revision.as_deref(), Some("EC25EFAR06A06M4G"));
        assert!(!identity.is_simcom());
    }

    #[test]
    fn test_simcom_non_7600() {
        let identity = DeviceIdentity::parse(&ati(&[
            "Manufacturer: SIMCOM INCORPORATED",
            "Model: SIMCOM_SIM7000E",
            "OK",
        ]));
        assert!(identity.is_simcom());
        assert!(!identity.is_sim7600());
    }
}
