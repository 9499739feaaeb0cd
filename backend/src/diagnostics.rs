//! Utility modes: `--test` runs a live self-test against the configured
//! device, `--dump` prints the content of a store.

use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, ensure, Context, Result};

use crate::{
    config::Config,
    db::Store,
    reading::{Reading, RecordKind},
    sensor::SensorClient,
    utils::{datetime_display, secs_since_epoch},
};

const GREEN: &str = "\x1b[92m";
const RED: &str = "\x1b[91m";
const RESET: &str = "\x1b[0m";

/// Wire rendering of `reference_reading(1576381385)` (2019-12-15 03:43:05 UTC).
pub const REFERENCE_JSON: &str = concat!(
    r#"{"data":{"did":"abc","name":"foo","ts":1576381385,"conditions":[{"#,
    r#""lsid":123,"data_structure_type":6,"temp":100.0,"hum":90.0,"dew_point":85.0,"#,
    r#""wet_bulb":66.0,"heat_index":99.0,"pm_1_last":1,"pm_2p5_last":3,"pm_10_last":10,"#,
    r#""pm_1":1.1,"pm_2p5":2.5,"pm_2p5_last_1_hour":2.1,"pm_2p5_last_3_hours":2.3,"#,
    r#""pm_2p5_last_24_hours":2.24,"pm_2p5_nowcast":2.22,"pm_10":10.0,"#,
    r#""pm_10_last_1_hour":10.1,"pm_10_last_3_hours":10.3,"pm_10_last_24_hours":10.24,"#,
    r#""pm_10_nowcast":10.101,"last_report_time":1576381385,"#,
    r#""pct_pm_data_last_1_hour":94,"pct_pm_data_last_3_hours":97,"#,
    r#""pct_pm_data_nowcast":100,"pct_pm_data_last_24_hours":76}]},"error":null}"#,
);

/// A fully populated reading with fixed values, reported at `ts`.
pub fn reference_reading(ts: i64) -> Reading {
    Reading {
        did: "abc".to_string(),
        name: "foo".to_string(),
        ts,
        lsid: Some(123),
        data_structure_type: 6,
        temp: Some(100.0),
        hum: Some(90.0),
        dew_point: Some(85.0),
        wet_bulb: Some(66.0),
        heat_index: Some(99.0),
        pm_1_last: Some(1),
        pm_2p5_last: Some(3),
        pm_10_last: Some(10),
        pm_1: Some(1.1),
        pm_2p5: Some(2.5),
        pm_2p5_last_1_hour: Some(2.1),
        pm_2p5_last_3_hours: Some(2.3),
        pm_2p5_last_24_hours: Some(2.24),
        pm_2p5_nowcast: Some(2.22),
        pm_10: Some(10.0),
        pm_10_last_1_hour: Some(10.1),
        pm_10_last_3_hours: Some(10.3),
        pm_10_last_24_hours: Some(10.24),
        pm_10_nowcast: Some(10.1010),
        last_report_time: Some(ts),
        pct_pm_data_last_1_hour: Some(94),
        pct_pm_data_last_3_hours: Some(97),
        pct_pm_data_nowcast: Some(100),
        pct_pm_data_last_24_hours: Some(76),
    }
}

fn begin(name: &str) {
    print!("{name}....");
    let _ = std::io::stdout().flush();
}

fn report<T>(result: Result<T>) -> Result<T> {
    match &result {
        Ok(_) => println!("{GREEN}PASSED{RESET}"),
        Err(err) => {
            println!("{RED}FAILED{RESET}");
            println!("{err:#}");
        }
    }
    result
}

/// Runs every self-test step. Fails if any step failed.
pub async fn run_self_test(config: &Config) -> Result<()> {
    let client = SensorClient::new(config.hostname()?, config.port, config.fetch_timeout())?;

    begin("collect_two_readings_one_second_apart");
    let (first, second) = report(collect_two_readings(&client).await)?;

    let dir = tempfile::tempdir().context("cannot create a scratch directory")?;
    let checks = [
        ("test_store_archive_records", {
            begin("test_store_archive_records");
            report(check_archive_store(&dir.path().join("archive.sdb"), &first))
        }),
        ("test_store_current_records", {
            begin("test_store_current_records");
            report(check_current_store(
                &dir.path().join("current.sdb"),
                &first,
                &second,
            ))
        }),
        ("sanity_check_reading", {
            begin("sanity_check_reading");
            report(check_ranges(&first, secs_since_epoch() as i64))
        }),
        ("test_wire_format", {
            begin("test_wire_format");
            report(check_wire_format(&first, &second))
        }),
    ];

    let failed: Vec<_> = checks
        .iter()
        .filter(|(_, result)| result.is_err())
        .map(|(name, _)| *name)
        .collect();
    if !failed.is_empty() {
        bail!("self-test failed: {}", failed.join(", "));
    }
    Ok(())
}

async fn collect_two_readings(client: &SensorClient) -> Result<(Reading, Reading)> {
    let first = client
        .fetch()
        .await?
        .ok_or_else(|| anyhow!("{} returned no usable reading", client.url()))?;
    // a different second on the second reading
    tokio::time::sleep(Duration::from_secs(1)).await;
    let second = client
        .fetch()
        .await?
        .ok_or_else(|| anyhow!("{} returned no usable reading", client.url()))?;
    Ok((first, second))
}

fn check_archive_store(path: &Path, reading: &Reading) -> Result<()> {
    let store = Store::create(path)?;
    store.save_archive((reading.ts / 60 + 1) * 60, reading)?;

    let out = store.fetch_archive(0, None, None)?;
    ensure!(out.len() == 1, "expected 1 archive record, found {}", out.len());
    ensure!(
        &out[0] == reading,
        "in: {:?}, out: {:?}",
        reading,
        out[0]
    );
    Ok(())
}

fn check_current_store(path: &Path, first: &Reading, second: &Reading) -> Result<()> {
    let store = Store::create(path)?;
    store.save_current(first)?;
    store.save_current(second)?;

    let count = store.count(RecordKind::Current)?;
    ensure!(count == 1, "expected 1 current record, found {count}");
    let out = store.fetch_current()?;
    ensure!(
        out.as_ref() == Some(second),
        "in: {:?}, out: {:?}",
        second,
        out
    );
    Ok(())
}

fn within(name: &str, value: Option<f64>, low: f64, high: f64) -> Result<()> {
    let value = value.ok_or_else(|| anyhow!("reading has no {name}"))?;
    ensure!(
        (low..=high).contains(&value),
        "reading returned insane {name}: {value}"
    );
    Ok(())
}

fn recent(name: &str, ts: Option<i64>, now: i64) -> Result<()> {
    let ts = ts.ok_or_else(|| anyhow!("reading has no {name}"))?;
    ensure!(
        ts > now - 60 && ts <= now,
        "reading returned insane {name}: {}",
        datetime_display(ts)
    );
    Ok(())
}

fn check_ranges(reading: &Reading, now: i64) -> Result<()> {
    recent("ts", Some(reading.ts), now)?;
    recent("last_report_time", reading.last_report_time, now)?;
    within("temp", reading.temp, 0.0, 100.0)?;
    within("hum", reading.hum, 0.0, 100.0)?;
    within("pm_1", reading.pm_1, 0.0, 10000.0)?;
    within("pm_2p5", reading.pm_2p5, 0.0, 10000.0)?;
    within("pm_10", reading.pm_10, 0.0, 10000.0)?;
    Ok(())
}

fn check_wire_format(first: &Reading, second: &Reading) -> Result<()> {
    first.to_json()?;
    second.to_json()?;

    let json = reference_reading(1576381385).to_json()?;
    ensure!(
        json == REFERENCE_JSON,
        "expected json: {REFERENCE_JSON}, found: {json}"
    );
    Ok(())
}

fn print_reading(out: &mut impl Write, reading: &Reading) -> Result<()> {
    writeln!(out, "{}", datetime_display(reading.ts))?;
    writeln!(out, "{}", reading.to_json()?)?;
    writeln!(out, "---")?;
    Ok(())
}

/// Prints the current reading, then every archive reading, oldest first.
pub fn dump_store(store: &Store, out: &mut impl Write) -> Result<()> {
    let start = Instant::now();

    writeln!(out, "----------------------------")?;
    writeln!(out, "* Dumping current reading  *")?;
    writeln!(out, "----------------------------")?;
    if let Some(reading) = store.fetch_current()? {
        print_reading(out, &reading)?;
    }

    writeln!(out, "----------------------------")?;
    writeln!(out, "* Dumping archive readings *")?;
    writeln!(out, "----------------------------")?;
    for reading in store.fetch_archive(0, None, None)? {
        print_reading(out, &reading)?;
    }

    writeln!(
        out,
        "Dumped {} in {:.3} seconds.",
        store.path().display(),
        start.elapsed().as_secs_f64()
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_reference_reading_renders_reference_json() {
        assert!(check_wire_format(&reference_reading(1), &reference_reading(2)).is_ok());
    }

    #[test]
    fn test_store_checks_pass_on_scratch_stores() {
        let dir = tempdir().unwrap();
        let first = reference_reading(1600657321);
        let second = reference_reading(1600657322);

        check_archive_store(&dir.path().join("archive.sdb"), &first).unwrap();
        check_current_store(&dir.path().join("current.sdb"), &first, &second).unwrap();
    }

    #[test]
    fn test_check_ranges() {
        let now = 1600657380;
        assert!(check_ranges(&reference_reading(now - 2), now).is_ok());

        let old = reference_reading(now - 61);
        assert!(check_ranges(&old, now).is_err());

        let mut hot = reference_reading(now);
        hot.temp = Some(101.5);
        let err = check_ranges(&hot, now).unwrap_err();
        assert_eq!(err.to_string(), "reading returned insane temp: 101.5");

        let mut no_pm = reference_reading(now);
        no_pm.pm_10 = None;
        assert_eq!(
            check_ranges(&no_pm, now).unwrap_err().to_string(),
            "reading has no pm_10"
        );
    }

    #[test]
    fn test_dump_store() {
        let dir = tempdir().unwrap();
        let store = Store::create(dir.path().join("airlink.sdb")).unwrap();
        store.save_current(&reference_reading(1600657385)).unwrap();
        store.save_archive(1600657320, &reference_reading(1600657321)).unwrap();
        store.save_archive(1600657380, &reference_reading(1600657381)).unwrap();

        let mut out = Vec::new();
        dump_store(&store, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();

        let current = out.find("* Dumping current reading  *").unwrap();
        let archive = out.find("* Dumping archive readings *").unwrap();
        assert!(current < archive);
        assert_eq!(out.lines().filter(|line| *line == "---").count(), 3);
        let first = out.find(r#""ts":1600657321"#).unwrap();
        let second = out.find(r#""ts":1600657381"#).unwrap();
        assert!(archive < first && first < second);
        assert!(out.contains("Dumped "));
    }
}
