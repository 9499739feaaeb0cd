//! Turns a raw device payload into a [`Reading`], or explains why not.
//!
//! The steps run in a fixed order: device error, legacy schema upgrade,
//! structural sanity check, staleness check, normalization. Nothing here
//! touches the network or the clock; `now` is passed in.

use common::wire::{WireReading, DATA_STRUCTURE_TYPE, LEGACY_DATA_STRUCTURE_TYPE};
use log::{debug, info};
use serde_json::{Map, Value};

use crate::reading::Reading;

/// Readings older than this are discarded.
pub const MAX_AGE_SECS: f64 = 60.0;

/// Legacy key → canonical key, for the `pm_10` family of type 5 payloads.
const LEGACY_PM_10_KEYS: [(&str, &str); 5] = [
    ("pm_10p0", "pm_10"),
    ("pm_10p0_last_1_hour", "pm_10_last_1_hour"),
    ("pm_10p0_last_3_hours", "pm_10_last_3_hours"),
    ("pm_10p0_last_24_hours", "pm_10_last_24_hours"),
    ("pm_10p0_nowcast", "pm_10_nowcast"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldType {
    Str,
    Int,
    /// Any JSON number; the device drops the decimal point on whole values.
    Float,
    Array,
}

impl FieldType {
    fn matches(self, value: &Value) -> bool {
        match self {
            FieldType::Str => value.is_string(),
            FieldType::Int => value.is_i64() || value.is_u64(),
            FieldType::Float => value.is_number(),
            FieldType::Array => value.is_array(),
        }
    }
}

struct Field {
    name: &'static str,
    ty: FieldType,
    nullable: bool,
}

const fn required(name: &'static str, ty: FieldType) -> Field {
    Field {
        name,
        ty,
        nullable: false,
    }
}

const fn nullable(name: &'static str, ty: FieldType) -> Field {
    Field {
        name,
        ty,
        nullable: true,
    }
}

const DATA_FIELDS: &[Field] = &[
    required("did", FieldType::Str),
    required("name", FieldType::Str),
    required("ts", FieldType::Int),
    required("conditions", FieldType::Array),
];

// data_structure_type is checked separately, before these.
const CONDITION_FIELDS: &[Field] = &[
    nullable("pm_1_last", FieldType::Int),
    nullable("pm_2p5_last", FieldType::Int),
    nullable("pm_10_last", FieldType::Int),
    nullable("last_report_time", FieldType::Int),
    nullable("pct_pm_data_last_1_hour", FieldType::Int),
    nullable("pct_pm_data_last_3_hours", FieldType::Int),
    nullable("pct_pm_data_nowcast", FieldType::Int),
    nullable("pct_pm_data_last_24_hours", FieldType::Int),
    nullable("lsid", FieldType::Int),
    required("temp", FieldType::Float),
    required("hum", FieldType::Float),
    required("dew_point", FieldType::Float),
    required("wet_bulb", FieldType::Float),
    required("heat_index", FieldType::Float),
    nullable("pm_1", FieldType::Float),
    nullable("pm_2p5", FieldType::Float),
    nullable("pm_2p5_last_1_hour", FieldType::Float),
    nullable("pm_2p5_last_3_hours", FieldType::Float),
    nullable("pm_2p5_last_24_hours", FieldType::Float),
    nullable("pm_2p5_nowcast", FieldType::Float),
    nullable("pm_10", FieldType::Float),
    nullable("pm_10_last_1_hour", FieldType::Float),
    nullable("pm_10_last_3_hours", FieldType::Float),
    nullable("pm_10_last_24_hours", FieldType::Float),
    nullable("pm_10_nowcast", FieldType::Float),
];

/// Why a payload did not produce a reading.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("payload is not valid JSON: {0}")]
    Malformed(String),

    #[error("device returned error({code}): {message}")]
    DeviceError { code: i64, message: String },

    #[error("reading not sane: {0}")]
    Insane(String),

    #[error("reading has no last_report_time")]
    NoReportTime,

    #[error("last_report_time must be time since boot: {report_time} seconds")]
    SinceBoot { report_time: i64 },

    #[error("reading is stale, age: {age:.0} seconds")]
    Stale { age: f64 },
}

/// Runs the full pipeline over a response body.
pub fn process(body: &str, now: f64) -> Result<Reading, Rejection> {
    let mut payload: Value =
        serde_json::from_str(body).map_err(|e| Rejection::Malformed(e.to_string()))?;

    check_device_error(&payload)?;

    if condition(&payload)
        .and_then(|c| c.get("data_structure_type"))
        .and_then(Value::as_i64)
        == Some(LEGACY_DATA_STRUCTURE_TYPE)
    {
        upgrade_legacy(&mut payload);
    }

    check_sanity(&payload).map_err(Rejection::Insane)?;
    check_freshness(&payload, now)?;
    normalize(payload)
}

fn condition(payload: &Value) -> Option<&Map<String, Value>> {
    payload
        .get("data")?
        .get("conditions")?
        .get(0)?
        .as_object()
}

fn check_device_error(payload: &Value) -> Result<(), Rejection> {
    match payload.get("error") {
        None | Some(Value::Null) => Ok(()),
        Some(error) => Err(Rejection::DeviceError {
            code: error.get("code").and_then(Value::as_i64).unwrap_or(-1),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
        }),
    }
}

/// Rewrites a type 5 payload into the type 6 layout.
///
/// Stops at the first missing legacy key and leaves the type at 5, so the
/// sanity check rejects what could not be converted.
pub fn upgrade_legacy(payload: &mut Value) {
    let Some(condition) = payload
        .get_mut("data")
        .and_then(|d| d.get_mut("conditions"))
        .and_then(|c| c.get_mut(0))
        .and_then(Value::as_object_mut)
    else {
        return;
    };

    for (legacy, canonical) in LEGACY_PM_10_KEYS {
        let Some(value) = condition.remove(legacy) else {
            info!("Cannot upgrade type 5 reading: missing {}", legacy);
            return;
        };
        condition.insert(canonical.to_string(), value);
    }

    condition.insert(
        "data_structure_type".to_string(),
        Value::from(DATA_STRUCTURE_TYPE),
    );
    debug!("Converted type 5 record to type 6.");
}

fn check_fields(object: &Map<String, Value>, fields: &[Field]) -> Result<(), String> {
    for field in fields {
        let ok = match object.get(field.name) {
            Some(Value::Null) => field.nullable,
            Some(value) => field.ty.matches(value),
            None => false,
        };
        if !ok {
            return Err(format!("Missing or malformed \"{}\" field", field.name));
        }
    }
    Ok(())
}

/// Structural check: presence and primitive type of every required field.
pub fn check_sanity(payload: &Value) -> Result<(), String> {
    let data = payload
        .get("data")
        .and_then(Value::as_object)
        .ok_or_else(|| "Missing or malformed \"data\" field".to_string())?;
    check_fields(data, DATA_FIELDS)?;

    let condition = condition(payload)
        .ok_or_else(|| "Expected one element in conditions array.".to_string())?;

    match condition.get("data_structure_type") {
        Some(v) if FieldType::Int.matches(v) => {
            if v.as_i64() != Some(DATA_STRUCTURE_TYPE) {
                return Err(format!(
                    "Expected data_structure_type of {} (or type {} auto converted to {}).",
                    DATA_STRUCTURE_TYPE, LEGACY_DATA_STRUCTURE_TYPE, DATA_STRUCTURE_TYPE
                ));
            }
        }
        _ => return Err("Missing or malformed \"data_structure_type\" field".to_string()),
    }

    check_fields(condition, CONDITION_FIELDS)
}

/// Rejects readings whose report time is more than [`MAX_AGE_SECS`] behind `now`.
fn check_freshness(payload: &Value, now: f64) -> Result<(), Rejection> {
    let condition = condition(payload).ok_or(Rejection::NoReportTime)?;
    let report_time = condition
        .get("last_report_time")
        .and_then(Value::as_i64)
        .ok_or(Rejection::NoReportTime)?;

    let age = now - report_time as f64;
    if age <= MAX_AGE_SECS {
        return Ok(());
    }

    // Until the device syncs its clock after a reboot, last_report_time counts
    // seconds since boot and pm_1 is not yet populated.
    if condition.get("pm_1").map_or(true, Value::is_null) {
        Err(Rejection::SinceBoot { report_time })
    } else {
        Err(Rejection::Stale { age })
    }
}

fn normalize(mut payload: Value) -> Result<Reading, Rejection> {
    // only the first condition block is checked and kept
    if let Some(conditions) = payload
        .pointer_mut("/data/conditions")
        .and_then(Value::as_array_mut)
    {
        conditions.truncate(1);
    }

    let mut missed: Vec<&str> = Vec::new();
    if let Some(data) = payload.get("data") {
        for field in DATA_FIELDS {
            if data.get(field.name).map_or(true, Value::is_null) {
                missed.push(field.name);
            }
        }
    }
    if let Some(condition) = condition(&payload) {
        for field in CONDITION_FIELDS {
            if condition.get(field.name).map_or(true, Value::is_null) {
                missed.push(field.name);
            }
        }
    }
    if !missed.is_empty() {
        info!("Sensor didn't report field(s): {}", missed.join(","));
    }

    let wire: WireReading =
        serde_json::from_value(payload).map_err(|e| Rejection::Insane(e.to_string()))?;
    Reading::from_wire(wire)
        .ok_or_else(|| Rejection::Insane("Expected one element in conditions array.".to_string()))
}
