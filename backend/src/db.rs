//! Persistent store of readings.
//!
//! One table keyed by (record kind, timestamp). At most one current row exists
//! at any time; archive rows are append-only. Every operation opens its own
//! connection so the ingest loop and the query server never share a handle.

use std::path::{Path, PathBuf};

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sqlite::SqliteConnection;
use log::debug;

use crate::reading::{Reading, RecordKind};
use crate::schema::readings;

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT_MS: u32 = 5000;

const CREATE_READING_TABLE: &str = "
CREATE TABLE readings (
    record_type               INTEGER NOT NULL,
    timestamp                 INTEGER NOT NULL,
    did                       TEXT    NOT NULL,
    name                      TEXT    NOT NULL,
    ts                        INTEGER NOT NULL,
    lsid                      INTEGER,
    data_structure_type       INTEGER NOT NULL,
    temp                      REAL,
    hum                       REAL,
    dew_point                 REAL,
    wet_bulb                  REAL,
    heat_index                REAL,
    pm_1_last                 INTEGER,
    pm_2p5_last               INTEGER,
    pm_10_last                INTEGER,
    pm_1                      REAL,
    pm_2p5                    REAL,
    pm_2p5_last_1_hour        REAL,
    pm_2p5_last_3_hours       REAL,
    pm_2p5_last_24_hours      REAL,
    pm_2p5_nowcast            REAL,
    pm_10                     REAL,
    pm_10_last_1_hour         REAL,
    pm_10_last_3_hours        REAL,
    pm_10_last_24_hours       REAL,
    pm_10_nowcast             REAL,
    last_report_time          INTEGER,
    pct_pm_data_last_1_hour   INTEGER,
    pct_pm_data_last_3_hours  INTEGER,
    pct_pm_data_nowcast       INTEGER,
    pct_pm_data_last_24_hours INTEGER,
    PRIMARY KEY (record_type, timestamp)
);
";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store {} already exists", .0.display())]
    AlreadyExists(PathBuf),

    #[error("store {} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("archive record at {0} already exists")]
    DuplicateArchive(i64),

    #[error("cannot create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("connection error: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("database error: {0}")]
    Database(#[from] DieselError),
}

/// Handle to a store file. Cheap to clone; holds no connection.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    /// Creates a new store at `path`, including any missing parent directory.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            return Err(StoreError::AlreadyExists(path));
        }

        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir).map_err(|source| StoreError::CreateDir {
                    path: dir.to_path_buf(),
                    source,
                })?;
            }
        }

        let store = Self { path };
        let mut conn = store.connect()?;
        conn.batch_execute("PRAGMA journal_mode = WAL;")?;
        conn.batch_execute(CREATE_READING_TABLE)?;
        debug!("Created store {}", store.path.display());

        Ok(store)
    }

    /// Opens an existing store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(StoreError::NotFound(path));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<SqliteConnection, StoreError> {
        let mut conn = SqliteConnection::establish(&self.path.to_string_lossy())?;
        conn.batch_execute(&format!("PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};"))?;
        Ok(conn)
    }

    /// Replaces the current reading. The delete and the insert commit together.
    pub fn save_current(&self, reading: &Reading) -> Result<(), StoreError> {
        let mut conn = self.connect()?;
        let current = RecordKind::Current.code();

        conn.immediate_transaction::<_, DieselError, _>(|conn| {
            diesel::delete(readings::table.filter(readings::record_type.eq(current)))
                .execute(conn)?;
            diesel::insert_into(readings::table)
                .values((
                    readings::record_type.eq(current),
                    readings::timestamp.eq(reading.ts),
                    reading,
                ))
                .execute(conn)?;
            Ok(())
        })?;

        debug!("Saved {} reading at {}", RecordKind::Current, reading.ts);
        Ok(())
    }

    /// Appends an archive reading under `timestamp`, the archive bucket it belongs to.
    pub fn save_archive(&self, timestamp: i64, reading: &Reading) -> Result<(), StoreError> {
        let mut conn = self.connect()?;

        diesel::insert_into(readings::table)
            .values((
                readings::record_type.eq(RecordKind::Archive.code()),
                readings::timestamp.eq(timestamp),
                reading,
            ))
            .execute(&mut conn)
            .map_err(|err| match err {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    StoreError::DuplicateArchive(timestamp)
                }
                err => err.into(),
            })?;

        debug!("Saved {} reading at {}", RecordKind::Archive, timestamp);
        Ok(())
    }

    pub fn fetch_current(&self) -> Result<Option<Reading>, StoreError> {
        let mut conn = self.connect()?;

        let res = readings::table
            .filter(readings::record_type.eq(RecordKind::Current.code()))
            .select(Reading::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(res)
    }

    /// Archive readings with `since_ts < timestamp <= max_ts`, oldest first.
    pub fn fetch_archive(
        &self,
        since_ts: i64,
        max_ts: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Vec<Reading>, StoreError> {
        let mut conn = self.connect()?;

        let mut query = readings::table
            .filter(readings::record_type.eq(RecordKind::Archive.code()))
            .filter(readings::timestamp.gt(since_ts))
            .order(readings::timestamp.asc())
            .select(Reading::as_select())
            .into_boxed();

        if let Some(max_ts) = max_ts {
            query = query.filter(readings::timestamp.le(max_ts));
        }
        if let Some(limit) = limit {
            query = query.limit(limit);
        }

        Ok(query.load(&mut conn)?)
    }

    pub fn fetch_earliest_archive_timestamp(&self) -> Result<Option<i64>, StoreError> {
        let mut conn = self.connect()?;

        let res = readings::table
            .filter(readings::record_type.eq(RecordKind::Archive.code()))
            .select(diesel::dsl::min(readings::timestamp))
            .first::<Option<i64>>(&mut conn)?;

        Ok(res)
    }

    /// Number of stored rows of the given kind.
    pub fn count(&self, kind: RecordKind) -> Result<i64, StoreError> {
        let mut conn = self.connect()?;

        let res = readings::table
            .filter(readings::record_type.eq(kind.code()))
            .count()
            .get_result(&mut conn)?;

        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::tests::sample_reading;
    use tempfile::tempdir;

    fn archive_of(store: &Store, since_ts: i64, max_ts: Option<i64>, limit: Option<i64>) -> Vec<i64> {
        store
            .fetch_archive(since_ts, max_ts, limit)
            .unwrap()
            .iter()
            .map(|r| r.ts)
            .collect()
    }

    #[test]
    fn test_create_makes_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("airlink.sdb");

        let store = Store::create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.path(), path.as_path());
        assert_eq!(store.fetch_current().unwrap(), None);
    }

    #[test]
    fn test_create_fails_if_store_exists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("airlink.sdb");

        Store::create(&path).unwrap();
        assert!(matches!(
            Store::create(&path),
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_open_missing_store() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            Store::open(dir.path().join("missing.sdb")),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_current_is_replaced() {
        let dir = tempdir().unwrap();
        let store = Store::create(dir.path().join("airlink.sdb")).unwrap();

        let first = sample_reading(1576381385);
        let mut second = sample_reading(1576381390);
        second.pm_1 = None;

        store.save_current(&first).unwrap();
        store.save_current(&second).unwrap();

        assert_eq!(store.fetch_current().unwrap(), Some(second));
        assert_eq!(store.count(RecordKind::Current).unwrap(), 1);
        assert_eq!(store.count(RecordKind::Archive).unwrap(), 0);
    }

    #[test]
    fn test_current_same_timestamp_twice() {
        let dir = tempdir().unwrap();
        let store = Store::create(dir.path().join("airlink.sdb")).unwrap();

        store.save_current(&sample_reading(100)).unwrap();
        store.save_current(&sample_reading(100)).unwrap();
        assert_eq!(store.count(RecordKind::Current).unwrap(), 1);
    }

    #[test]
    fn test_archive_round_trip_and_duplicate() {
        let dir = tempdir().unwrap();
        let store = Store::create(dir.path().join("airlink.sdb")).unwrap();
        let reading = sample_reading(1576381385);

        store.save_archive(1576381380, &reading).unwrap();

        assert_eq!(store.fetch_archive(0, None, None).unwrap(), vec![reading.clone()]);
        assert!(matches!(
            store.save_archive(1576381380, &sample_reading(1576381386)),
            Err(StoreError::DuplicateArchive(1576381380))
        ));
        assert_eq!(store.count(RecordKind::Archive).unwrap(), 1);
    }

    #[test]
    fn test_archive_and_current_share_timestamp() {
        let dir = tempdir().unwrap();
        let store = Store::create(dir.path().join("airlink.sdb")).unwrap();
        let reading = sample_reading(60);

        store.save_archive(60, &reading).unwrap();
        store.save_current(&reading).unwrap();

        assert_eq!(store.count(RecordKind::Current).unwrap(), 1);
        assert_eq!(store.count(RecordKind::Archive).unwrap(), 1);
    }

    #[test]
    fn test_fetch_archive_bounds() {
        let dir = tempdir().unwrap();
        let store = Store::create(dir.path().join("airlink.sdb")).unwrap();

        // inserted out of order on purpose
        for ts in [300, 60, 240, 120, 180] {
            store.save_archive(ts, &sample_reading(ts)).unwrap();
        }

        assert_eq!(archive_of(&store, 0, None, None), vec![60, 120, 180, 240, 300]);
        assert_eq!(archive_of(&store, 120, None, None), vec![180, 240, 300]);
        assert_eq!(archive_of(&store, 120, Some(240), None), vec![180, 240]);
        assert_eq!(archive_of(&store, 0, None, Some(2)), vec![60, 120]);
        assert_eq!(archive_of(&store, 180, None, Some(10)), vec![240, 300]);
        assert_eq!(archive_of(&store, 60, Some(300), Some(3)), vec![120, 180, 240]);
        assert!(archive_of(&store, 300, None, None).is_empty());
    }

    #[test]
    fn test_fetch_archive_excludes_current() {
        let dir = tempdir().unwrap();
        let store = Store::create(dir.path().join("airlink.sdb")).unwrap();

        store.save_current(&sample_reading(500)).unwrap();
        assert!(store.fetch_archive(0, None, None).unwrap().is_empty());
    }

    #[test]
    fn test_earliest_archive_timestamp() {
        let dir = tempdir().unwrap();
        let store = Store::create(dir.path().join("airlink.sdb")).unwrap();

        assert_eq!(store.fetch_earliest_archive_timestamp().unwrap(), None);

        store.save_current(&sample_reading(10)).unwrap();
        assert_eq!(store.fetch_earliest_archive_timestamp().unwrap(), None);

        store.save_archive(180, &sample_reading(175)).unwrap();
        store.save_archive(120, &sample_reading(115)).unwrap();
        assert_eq!(store.fetch_earliest_archive_timestamp().unwrap(), Some(120));
    }

    #[test]
    fn test_reopen_sees_existing_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("airlink.sdb");

        Store::create(&path)
            .unwrap()
            .save_archive(60, &sample_reading(58))
            .unwrap();

        let store = Store::open(&path).unwrap();
        assert_eq!(store.fetch_earliest_archive_timestamp().unwrap(), Some(60));
    }
}
