use common::wire::{WireCondition, WireReading};
use diesel::prelude::*;

use crate::schema::readings;

/// Whether a stored row is the single current reading or an archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Current,
    Archive,
}

impl RecordKind {
    /// Value of the `record_type` column.
    pub fn code(self) -> i32 {
        match self {
            RecordKind::Current => 0,
            RecordKind::Archive => 1,
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Current => write!(f, "current"),
            RecordKind::Archive => write!(f, "archive"),
        }
    }
}

/// One validated sensor sample.
///
/// Only the identity fields (`did`, `name`, `ts`, `data_structure_type`) are
/// mandatory. Everything else is `None` when the sensor did not report it.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = readings, check_for_backend(diesel::sqlite::Sqlite))]
pub struct Reading {
    pub did: String,
    pub name: String,
    pub ts: i64, // s since epoch
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
    pub pm_1: Option<f64>, // µg/m³
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
    pub last_report_time: Option<i64>, // s since epoch
    pub pct_pm_data_last_1_hour: Option<i64>,
    pub pct_pm_data_last_3_hours: Option<i64>,
    pub pct_pm_data_nowcast: Option<i64>,
    pub pct_pm_data_last_24_hours: Option<i64>,
}

impl Reading {
    pub fn from_wire(wire: WireReading) -> Option<Self> {
        let WireReading { data, .. } = wire;
        let c = data.conditions.into_iter().next()?;

        Some(Self {
            did: data.did,
            name: data.name,
            ts: data.ts,
            lsid: c.lsid,
            data_structure_type: c.data_structure_type,
            temp: c.temp,
            hum: c.hum,
            dew_point: c.dew_point,
            wet_bulb: c.wet_bulb,
            heat_index: c.heat_index,
            pm_1_last: c.pm_1_last,
            pm_2p5_last: c.pm_2p5_last,
            pm_10_last: c.pm_10_last,
            pm_1: c.pm_1,
            pm_2p5: c.pm_2p5,
            pm_2p5_last_1_hour: c.pm_2p5_last_1_hour,
            pm_2p5_last_3_hours: c.pm_2p5_last_3_hours,
            pm_2p5_last_24_hours: c.pm_2p5_last_24_hours,
            pm_2p5_nowcast: c.pm_2p5_nowcast,
            pm_10: c.pm_10,
            pm_10_last_1_hour: c.pm_10_last_1_hour,
            pm_10_last_3_hours: c.pm_10_last_3_hours,
            pm_10_last_24_hours: c.pm_10_last_24_hours,
            pm_10_nowcast: c.pm_10_nowcast,
            last_report_time: c.last_report_time,
            pct_pm_data_last_1_hour: c.pct_pm_data_last_1_hour,
            pct_pm_data_last_3_hours: c.pct_pm_data_last_3_hours,
            pct_pm_data_nowcast: c.pct_pm_data_nowcast,
            pct_pm_data_last_24_hours: c.pct_pm_data_last_24_hours,
        })
    }

    pub fn to_wire(&self) -> WireReading {
        WireReading::new(
            self.did.clone(),
            self.name.clone(),
            self.ts,
            WireCondition {
                lsid: self.lsid,
                data_structure_type: self.data_structure_type,
                temp: self.temp,
                hum: self.hum,
                dew_point: self.dew_point,
                wet_bulb: self.wet_bulb,
                heat_index: self.heat_index,
                pm_1_last: self.pm_1_last,
                pm_2p5_last: self.pm_2p5_last,
                pm_10_last: self.pm_10_last,
                pm_1: self.pm_1,
                pm_2p5: self.pm_2p5,
                pm_2p5_last_1_hour: self.pm_2p5_last_1_hour,
                pm_2p5_last_3_hours: self.pm_2p5_last_3_hours,
                pm_2p5_last_24_hours: self.pm_2p5_last_24_hours,
                pm_2p5_nowcast: self.pm_2p5_nowcast,
                pm_10: self.pm_10,
                pm_10_last_1_hour: self.pm_10_last_1_hour,
                pm_10_last_3_hours: self.pm_10_last_3_hours,
                pm_10_last_24_hours: self.pm_10_last_24_hours,
                pm_10_nowcast: self.pm_10_nowcast,
                last_report_time: self.last_report_time,
                pct_pm_data_last_1_hour: self.pct_pm_data_last_1_hour,
                pct_pm_data_last_3_hours: self.pct_pm_data_last_3_hours,
                pct_pm_data_nowcast: self.pct_pm_data_nowcast,
                pct_pm_data_last_24_hours: self.pct_pm_data_last_24_hours,
            },
        )
    }

    /// Renders the reading in wire format, ready to be served.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.to_wire())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_reading(ts: i64) -> Reading {
        crate::diagnostics::reference_reading(ts)
    }

    #[test]
    fn test_to_json() {
        let json = sample_reading(1576381385).to_json().unwrap();

        assert_eq!(json, crate::diagnostics::REFERENCE_JSON);
    }

    #[test]
    fn test_trailing_zero_dropped() {
        let json = sample_reading(0).to_json().unwrap();
        assert!(json.contains(r#""pm_10_nowcast":10.101,"#));
        assert!(!json.contains("10.1010"));
    }

    #[test]
    fn test_absent_fields_render_as_null() {
        let mut reading = sample_reading(0);
        reading.pm_1 = None;
        reading.lsid = None;

        let json = reading.to_json().unwrap();
        assert!(json.contains(r#""lsid":null"#));
        assert!(json.contains(r#""pm_1":null"#));
    }

    #[test]
    fn test_from_wire_round_trip() {
        let reading = sample_reading(1576381385);
        assert_eq!(Reading::from_wire(reading.to_wire()), Some(reading));
    }

    #[test]
    fn test_from_wire_without_conditions() {
        let mut wire = sample_reading(0).to_wire();
        wire.data.conditions.clear();
        assert_eq!(Reading::from_wire(wire), None);
    }

    #[test]
    fn test_record_kind_codes_are_distinct() {
        assert_eq!(RecordKind::Current.code(), 0);
        assert_eq!(RecordKind::Archive.code(), 1);
        assert_eq!(RecordKind::Current.to_string(), "current");
        assert_eq!(RecordKind::Archive.to_string(), "archive");
    }
}
