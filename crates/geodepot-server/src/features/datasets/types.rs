//! Shared types for the dataset feature

use serde::Serialize;
use uuid::Uuid;

use crate::metadata::MetadataRecord;
use crate::resources::Resource;

/// Response envelope for upload and replace
///
/// The same shape is returned on success and failure; clients branch on
/// `success`. Field names are part of the public contract and stay as the
/// legacy clients expect them.
#[derive(Debug, Default, Serialize)]
pub struct UploadEnvelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errormsgs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_session: Option<Uuid>,
}

impl UploadEnvelope {
    pub fn succeeded(type_name: &str) -> Self {
        Self {
            success: true,
            url: Some(format!("/api/v1/datasets/{type_name}")),
            ..Default::default()
        }
    }

    pub fn failed(
        message: impl Into<String>,
        traceback: Option<String>,
        upload_session: Option<Uuid>,
    ) -> Self {
        let message = message.into();
        Self {
            success: false,
            errors: Some(message.clone()),
            errormsgs: Some(message),
            traceback,
            upload_session,
            ..Default::default()
        }
    }
}

/// Detail view: the resource plus its optional metadata record
#[derive(Debug, Serialize)]
pub struct DatasetDetail {
    pub resource: Resource,
    pub metadata: Option<MetadataRecord>,
    pub permissions: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_shape() {
        let envelope = UploadEnvelope::succeeded("roads");
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "success": true,
                "url": "/api/v1/datasets/roads",
            })
        );
    }

    #[test]
    fn test_failure_envelope_shape() {
        let session = Uuid::new_v4();
        let mut envelope = UploadEnvelope::failed(
            "Catalog sync failed",
            Some("Catalog sync failed\ncaused by: timeout".to_string()),
            Some(session),
        );
        envelope.context = Some("GeoServer log tail".to_string());
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["success"], serde_json::json!(false));
        assert_eq!(value["errors"], serde_json::json!("Catalog sync failed"));
        assert_eq!(value["errormsgs"], serde_json::json!("Catalog sync failed"));
        assert!(value["traceback"].as_str().unwrap().contains("caused by"));
        assert_eq!(value["context"], serde_json::json!("GeoServer log tail"));
        assert_eq!(value["upload_session"], serde_json::json!(session));
        assert!(value.get("url").is_none());
    }
}
