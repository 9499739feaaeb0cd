//! Wire format of a reading, as served by the sensor at `/v1/current_conditions`
//! and re-served by the proxy.
//!
//! Field order matters: clients of the proxy compare rendered payloads
//! textually, so the structs below list members in the order the device
//! emits them.

/// Schema version every reading is normalized to.
pub const DATA_STRUCTURE_TYPE: i64 = 6;

/// Legacy schema version whose `pm_10*` keys use the `pm_10p0*` spelling.
pub const LEGACY_DATA_STRUCTURE_TYPE: i64 = 5;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WireReading {
    pub data: WireData,
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WireData {
    pub did: String,
    pub name: String,
    pub ts: i64,
    pub conditions: Vec<WireCondition>,
}

/// One entry of the `conditions` array. The device only ever sends one.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WireCondition {
    pub lsid: Option<i64>,
    pub data_structure_type: i64,
    pub temp: Option<f64>,       // °F
    pub hum: Option<f64>,        // percent
    pub dew_point: Option<f64>,  // °F
    pub wet_bulb: Option<f64>,   // °F
    pub heat_index: Option<f64>, // °F
    pub pm_1_last: Option<i64>,
    pub pm_2p5_last: Option<i64>,
    pub pm_10_last: Option<i64>,
    pub pm_1: Option<f64>,
    pub pm_2p5: Option<f64>,
    pub pm_2p5_last_1_hour: Option<f64>,
    pub pm_2p5_last_3_hours: Option<f64>,
    pub pm_2p5_last_24_hours: Option<f64>,
    pub pm_2p5_nowcast: Option<f64>,
    pub pm_10: Option<f64>,
    pub pm_10_last_1_hour: Option<f64>,
    pub pm_10_last_3_hours: Option<f64>,
    pub pm_10_last_24_hours: Option<f64>,
    pub pm_10_nowcast: Option<f64>,
    pub last_report_time: Option<i64>,
    pub pct_pm_data_last_1_hour: Option<i64>,
    pub pct_pm_data_last_3_hours: Option<i64>,
    pub pct_pm_data_nowcast: Option<i64>,
    pub pct_pm_data_last_24_hours: Option<i64>,
}

impl WireReading {
    /// Wraps a single condition block into a complete, error-free envelope.
    pub fn new(did: String, name: String, ts: i64, condition: WireCondition) -> Self {
        Self {
            data: WireData {
                did,
                name,
                ts,
                conditions: vec![condition],
            },
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_key_order() {
        let reading = WireReading::new(
            "abc".to_string(),
            "foo".to_string(),
            1,
            WireCondition {
                data_structure_type: DATA_STRUCTURE_TYPE,
                ..Default::default()
            },
        );
        let json = serde_json::to_string(&reading).unwrap();

        assert!(json.starts_with(r#"{"data":{"did":"abc","name":"foo","ts":1,"conditions":[{"lsid":null,"data_structure_type":6,"temp":null"#));
        assert!(json.ends_with(r#""pct_pm_data_last_24_hours":null}]},"error":null}"#));
    }

    #[test]
    fn test_missing_optional_members_deserialize_as_none() {
        let json = r#"{"data": {"did": "x", "name": "y", "ts": 5,
            "conditions": [{"data_structure_type": 6, "temp": 70}]}, "error": null}"#;
        let reading: WireReading = serde_json::from_str(json).unwrap();
        let condition = &reading.data.conditions[0];

        assert_eq!(condition.temp, Some(70.0));
        assert_eq!(condition.pm_1, None);
        assert_eq!(condition.lsid, None);
    }
}
