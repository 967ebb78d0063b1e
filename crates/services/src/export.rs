//! Export payload: the persisted record plus informational metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use study_core::model::{FORMAT_VERSION, ProgressRecord};

/// Best-effort description of the device that produced an export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standalone: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,
}

/// Host-supplied build metadata stamped onto exports. Never needed for import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportMeta {
    pub app_version: Option<String>,
    pub build_time: Option<String>,
    pub device: Option<DeviceInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPayload {
    pub version: u64,
    pub exported_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: ProgressRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceInfo>,
}

impl ExportPayload {
    #[must_use]
    pub fn new(record: ProgressRecord, exported_at: DateTime<Utc>, meta: &ExportMeta) -> Self {
        Self {
            version: FORMAT_VERSION,
            exported_at,
            record,
            app_version: meta.app_version.clone(),
            build_time: meta.build_time.clone(),
            device: meta.device.clone(),
        }
    }

    /// Pretty-printed JSON suitable for saving or sharing.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use study_core::model::TopicId;
    use study_core::time::fixed_now;

    #[test]
    fn payload_is_a_superset_of_the_persisted_record() {
        let record = ProgressRecord {
            plan: vec![TopicId::new("mole")],
            ..ProgressRecord::default()
        };
        let meta = ExportMeta {
            app_version: Some("1.4.0".into()),
            build_time: None,
            device: Some(DeviceInfo {
                language: Some("en-US".into()),
                online: Some(true),
                ..DeviceInfo::default()
            }),
        };
        let json = ExportPayload::new(record, fixed_now(), &meta)
            .to_json_pretty()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["version"], 1);
        assert_eq!(value["exportedAt"], "2023-11-14T22:13:20Z");
        assert_eq!(value["plan"][0], "mole");
        assert_eq!(value["appVersion"], "1.4.0");
        assert_eq!(value["device"]["language"], "en-US");
        assert!(value.get("buildTime").is_none());
        assert!(value["device"].get("userAgent").is_none());
    }
}
