//! Alternate telemetry feed payloads
//!
//! JSON shapes for the message-stream transport that bypasses the BLE
//! stack. Only the payload contract lives here; the transport itself is
//! external to this crate.

use serde::{Deserialize, Serialize};

/// Telemetry object received over the persistent message stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedTelemetry {
    pub altitude: f64,
    pub vertical_speed: f64,
    pub buzzer_enabled: bool,
}

/// Outbound control message for the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedControl {
    pub action: FeedAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedAction {
    Enable,
    Disable,
}

impl FeedControl {
    pub fn for_buzzer(enabled: bool) -> Self {
        Self {
            action: if enabled {
                FeedAction::Enable
            } else {
                FeedAction::Disable
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_uses_camel_case_keys() {
        let json = r#"{"altitude": 812.4, "verticalSpeed": -1.2, "buzzerEnabled": true}"#;
        let telemetry: FeedTelemetry = serde_json::from_str(json).unwrap();
        assert_eq!(telemetry.altitude, 812.4);
        assert_eq!(telemetry.vertical_speed, -1.2);
        assert!(telemetry.buzzer_enabled);
    }

    #[test]
    fn control_action_serializes_lowercase() {
        let json = serde_json::to_string(&FeedControl::for_buzzer(true)).unwrap();
        assert_eq!(json, r#"{"action":"enable"}"#);
        let json = serde_json::to_string(&FeedControl::for_buzzer(false)).unwrap();
        assert_eq!(json, r#"{"action":"disable"}"#);
    }
}
