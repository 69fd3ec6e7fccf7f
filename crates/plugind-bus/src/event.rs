// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Progress events and their wire form.

use plugind_core::{Operation, Status};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Resource name carried by every error payload.
pub const ERROR_RESOURCE: &str = "plugins";

/// Error payload of an `error` progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressError {
    pub error_id: String,
    pub message: String,
    pub resource: String,
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl ProgressError {
    pub fn new(
        error_id: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            error_id: error_id.into(),
            message: message.into(),
            resource: ERROR_RESOURCE.to_string(),
            details,
        }
    }
}

/// One status notification for one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub operation: Operation,
    pub uuid: Uuid,
    pub status: Status,
    pub error: Option<ProgressError>,
}

impl ProgressEvent {
    pub fn status(operation: Operation, uuid: Uuid, status: Status) -> Self {
        Self {
            operation,
            uuid,
            status,
            error: None,
        }
    }

    pub fn error(operation: Operation, uuid: Uuid, error: ProgressError) -> Self {
        Self {
            operation,
            uuid,
            status: Status::Error,
            error: Some(error),
        }
    }

    /// `plugin.install.<uuid>.<status>`; subscribers bind `plugin.install.#`.
    pub fn routing_key(&self) -> String {
        format!("plugin.{}.{}.{}", self.operation, self.uuid, self.status)
    }

    pub fn event_name(&self) -> String {
        format!("plugin_{}_progress", self.operation)
    }

    pub fn to_message(&self) -> BusMessage {
        BusMessage {
            name: self.event_name(),
            data: ProgressData {
                uuid: self.uuid,
                status: self.status,
                errors: self.error.clone(),
            },
        }
    }
}

/// Body of a progress message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressData {
    pub uuid: Uuid,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<ProgressError>,
}

/// The published message: `{name, data}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    pub name: String,
    pub data: ProgressData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_event_wire_shape() {
        let uuid = Uuid::nil();
        let event = ProgressEvent::status(Operation::Install, uuid, Status::InstallingDependencies);
        assert_eq!(
            event.routing_key(),
            format!("plugin.install.{uuid}.installing-dependencies")
        );

        let json = serde_json::to_value(event.to_message()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "plugin_install_progress",
                "data": {"uuid": uuid.to_string(), "status": "installing-dependencies"},
            })
        );
    }

    #[test]
    fn error_event_carries_payload() {
        let mut details = serde_json::Map::new();
        details.insert("namespace".into(), "official".into());
        let event = ProgressEvent::error(
            Operation::Uninstall,
            Uuid::nil(),
            ProgressError::new("removing_error", "Removing Error", details),
        );

        let json = serde_json::to_value(event.to_message()).unwrap();
        assert_eq!(json["name"], "plugin_uninstall_progress");
        assert_eq!(json["data"]["status"], "error");
        assert_eq!(json["data"]["errors"]["error_id"], "removing_error");
        assert_eq!(json["data"]["errors"]["resource"], "plugins");
        assert_eq!(json["data"]["errors"]["details"]["namespace"], "official");
    }
}
