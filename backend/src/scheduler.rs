//! Decides, from the wall clock alone, when the next poll happens and whether
//! it is also an archive boundary.
//!
//! Nothing is carried over between calls: a late wake-up or a slow fetch only
//! shortens the following sleep, so the schedule never drifts.

use log::{debug, warn};

/// Seconds added to the wake time when computing an archive bucket, so a
/// cycle that runs slightly early still lands in the right bucket.
const ARCHIVE_BUCKET_GUARD_SECS: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Poll,
    Archive,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("archive interval ({archive}s) must be a multiple of the poll interval ({poll}s)")]
    NotAMultiple { archive: u64, poll: u64 },
}

#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    poll_secs: u64,
    archive_secs: u64,
    offset_secs: u64,
}

impl Scheduler {
    pub fn new(poll_secs: u64, archive_secs: u64, offset_secs: u64) -> Result<Self, ScheduleError> {
        if poll_secs == 0 {
            return Err(ScheduleError::ZeroPollInterval);
        }
        if archive_secs == 0 || archive_secs % poll_secs != 0 {
            return Err(ScheduleError::NotAMultiple {
                archive: archive_secs,
                poll: poll_secs,
            });
        }
        if offset_secs % poll_secs != 0 {
            warn!(
                "Archive offset {}s is not on the {}s poll grid; no archive records will be written.",
                offset_secs, poll_secs
            );
        }

        Ok(Self {
            poll_secs,
            archive_secs,
            offset_secs,
        })
    }

    /// Next event and how long to sleep until it, for wall-clock time `now`.
    pub fn next_event(&self, now: f64) -> (Event, f64) {
        let poll = self.poll_secs as f64;
        let archive = self.archive_secs as f64;
        let offset = self.offset_secs as f64;

        let next_poll = (now / poll).floor() * poll + poll;
        let next_archive = ((now - offset) / archive).floor() * archive + archive + offset;

        let event = if next_poll == next_archive {
            Event::Archive
        } else {
            Event::Poll
        };
        let secs_to_event = (next_poll - now).max(0.0);

        debug!(
            "Next event: {:?} in {:.3} seconds (poll: {}, archive: {})",
            event, secs_to_event, next_poll, next_archive
        );
        (event, secs_to_event)
    }

    /// Archive bucket (start of the archive interval) for a cycle running at `now`.
    pub fn archive_bucket(&self, now: f64) -> i64 {
        let archive = self.archive_secs as f64;
        (((now + ARCHIVE_BUCKET_GUARD_SECS) / archive).floor() * archive) as i64
    }
}
