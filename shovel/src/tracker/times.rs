use std::sync::OnceLock;

use chrono::Utc;

/// Start and end timestamps of the phases of a sync, in milliseconds since the Unix epoch.
///
/// Every timestamp is written at most once, later writes are ignored.
#[derive(Debug, Default)]
pub struct TimeTracker {
    replication_start: OnceLock<i64>,
    replication_end: OnceLock<i64>,
    source_read_start: OnceLock<i64>,
    source_read_end: OnceLock<i64>,
    destination_write_start: OnceLock<i64>,
    destination_write_end: OnceLock<i64>,
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl TimeTracker {
    pub fn track_replication_start(&self) {
        let _ = self.replication_start.set(now_millis());
    }

    pub fn track_replication_end(&self) {
        let _ = self.replication_end.set(now_millis());
    }

    pub fn track_source_read_start(&self) {
        let _ = self.source_read_start.set(now_millis());
    }

    pub fn track_source_read_end(&self) {
        let _ = self.source_read_end.set(now_millis());
    }

    pub fn track_destination_write_start(&self) {
        let _ = self.destination_write_start.set(now_millis());
    }

    pub fn track_destination_write_end(&self) {
        let _ = self.destination_write_end.set(now_millis());
    }

    pub fn replication_start(&self) -> Option<i64> {
        self.replication_start.get().copied()
    }

    pub fn replication_end(&self) -> Option<i64> {
        self.replication_end.get().copied()
    }

    pub fn source_read_start(&self) -> Option<i64> {
        self.source_read_start.get().copied()
    }

    pub fn source_read_end(&self) -> Option<i64> {
        self.source_read_end.get().copied()
    }

    pub fn destination_write_start(&self) -> Option<i64> {
        self.destination_write_start.get().copied()
    }

    pub fn destination_write_end(&self) -> Option<i64> {
        self.destination_write_end.get().copied()
    }
}
