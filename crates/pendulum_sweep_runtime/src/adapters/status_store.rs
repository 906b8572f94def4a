use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use pendulum_sweep_core::storage_keys::status_record_path;

use crate::error::Result;

pub const STATUS_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusWrite {
    Created,
    AlreadyPresent,
}

/// Named lifecycle markers shared by every process taking part in an experiment.
///
/// A marker goes from absent to present exactly once. Nothing in this crate
/// removes one.
pub trait StatusStore: Send + Sync {
    fn has_status(&self, name: &str) -> Result<bool>;
    /// Creates the marker if absent. Exactly one concurrent caller observes `Created`.
    fn record_status(&self, name: &str, timestamp: &str) -> Result<StatusWrite>;
    fn read_status(&self, name: &str) -> Result<Option<String>>;
}

#[derive(Debug, Clone)]
pub struct FsStatusStore {
    dir: PathBuf,
}

impl FsStatusStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl StatusStore for FsStatusStore {
    fn has_status(&self, name: &str) -> Result<bool> {
        let path = status_record_path(&self.dir, name)?;
        Ok(path.try_exists()?)
    }

    fn record_status(&self, name: &str, timestamp: &str) -> Result<StatusWrite> {
        let path = status_record_path(&self.dir, name)?;
        fs::create_dir_all(&self.dir)?;

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
                return Ok(StatusWrite::AlreadyPresent);
            }
            Err(error) => return Err(error.into()),
        };

        // The marker is claimed at this point; a missing body only loses the timestamp.
        if let Err(error) = writeln!(file, "{timestamp}").and_then(|()| file.sync_all()) {
            tracing::warn!(
                component = "status_store",
                event = "status_body_write_failed",
                status = name,
                error = %error,
            );
        } else {
            tracing::info!(
                component = "status_store",
                event = "status_recorded",
                status = name,
                timestamp,
            );
        }

        Ok(StatusWrite::Created)
    }

    fn read_status(&self, name: &str) -> Result<Option<String>> {
        let path = status_record_path(&self.dir, name)?;
        match fs::read_to_string(&path) {
            Ok(body) => Ok(Some(body.trim_end().to_string())),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }
}

pub fn status_timestamp(at: DateTime<Local>) -> String {
    at.format(STATUS_TIMESTAMP_FORMAT).to_string()
}

pub fn current_status_timestamp() -> String {
    status_timestamp(Local::now())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use chrono::TimeZone;

    use super::*;
    use crate::error::SweepError;

    #[test]
    fn first_record_wins_and_later_timestamps_are_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsStatusStore::new(dir.path().join("status"));

        assert!(!store.has_status("started").expect("lookup"));
        assert_eq!(
            store
                .record_status("started", "2026-10-14T09:30:00")
                .expect("record"),
            StatusWrite::Created
        );
        assert_eq!(
            store
                .record_status("started", "2026-10-14T10:00:00")
                .expect("record"),
            StatusWrite::AlreadyPresent
        );

        assert!(store.has_status("started").expect("lookup"));
        assert_eq!(
            store.read_status("started").expect("read"),
            Some("2026-10-14T09:30:00".to_string())
        );
        let raw = fs::read_to_string(dir.path().join("status/started")).expect("raw body");
        assert_eq!(raw, "2026-10-14T09:30:00\n");
    }

    #[test]
    fn missing_status_reads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsStatusStore::new(dir.path());

        assert_eq!(store.read_status("completed").expect("read"), None);
    }

    #[test]
    fn rejects_names_outside_the_status_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsStatusStore::new(dir.path());

        let error = store
            .record_status("../started", "2026-10-14T09:30:00")
            .expect_err("name should be rejected");
        assert!(matches!(error, SweepError::Validation(_)));
    }

    #[test]
    fn exactly_one_concurrent_writer_claims_the_marker() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(FsStatusStore::new(dir.path()));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|idx| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    store
                        .record_status("started", &format!("2026-10-14T09:30:0{idx}"))
                        .expect("record")
                })
            })
            .collect();

        let created = handles
            .into_iter()
            .map(|handle| handle.join().expect("writer thread"))
            .filter(|write| *write == StatusWrite::Created)
            .count();
        assert_eq!(created, 1);
    }

    #[test]
    fn formats_local_timestamp_without_offset() {
        let at = Local
            .with_ymd_and_hms(2026, 10, 14, 9, 5, 7)
            .single()
            .expect("unambiguous local time");
        assert_eq!(status_timestamp(at), "2026-10-14T09:05:07");
    }
}
