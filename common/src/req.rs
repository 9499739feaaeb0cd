//! Response bodies of the proxy's query server.

/// Version reported by `/get-version`. Bumped only when the query protocol changes.
pub const API_VERSION: &str = "1";

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct VersionResponse {
    pub version: String,
}

impl Default for VersionResponse {
    fn default() -> Self {
        Self {
            version: API_VERSION.to_string(),
        }
    }
}

/// Body of `/get-earliest-timestamp`; serializes to `{}` when the archive is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct EarliestTimestamp {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>, // s since epoch
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_earliest_timestamp_empty_renders_as_empty_object() {
        let json = serde_json::to_string(&EarliestTimestamp::default()).unwrap();
        assert_eq!(json, "{}");

        let json = serde_json::to_string(&EarliestTimestamp {
            timestamp: Some(1600657320),
        })
        .unwrap();
        assert_eq!(json, r#"{"timestamp":1600657320}"#);
    }

    #[test]
    fn test_version_response() {
        let json = serde_json::to_string(&VersionResponse::default()).unwrap();
        assert_eq!(json, r#"{"version":"1"}"#);
    }
}
