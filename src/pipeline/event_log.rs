//! Bounded in-memory session log. Oldest entries are overwritten; nothing is persisted.

use std::fmt;

use chrono::{DateTime, Local};
use ringbuf::traits::{Consumer, Observer, RingBuffer};
use ringbuf::HeapRb;

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub at: DateTime<Local>,
    pub message: String,
}

impl LogEntry {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            at: Local::now(),
            message: message.into(),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -- {}", self.at.format("%H:%M:%S"), self.message)
    }
}

pub struct EventLog {
    ring: HeapRb<LogEntry>,
    capacity: usize,
    opened_at: DateTime<Local>,
    /// Entries lost to overwrite since the last clear
    evicted: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: HeapRb::new(capacity),
            capacity,
            opened_at: Local::now(),
            evicted: 0,
        }
    }

    pub fn push(&mut self, entry: LogEntry) {
        if self.ring.push_overwrite(entry).is_some() {
            self.evicted += 1;
        }
    }

    /// Start a fresh log, e.g. for a new session
    pub fn clear(&mut self) {
        self.ring = HeapRb::new(self.capacity);
        self.opened_at = Local::now();
        self.evicted = 0;
    }

    /// Oldest first
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.ring.iter()
    }

    pub fn len(&self) -> usize {
        self.ring.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn evicted(&self) -> usize {
        self.evicted
    }

    pub fn title(&self) -> String {
        format!("LOG File [{}]", self.opened_at.format("%Y-%m-%d -- %H:%M:%S"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn overwrites_oldest_when_full() {
        let mut log = EventLog::new(2);
        log.push(LogEntry::now("a"));
        log.push(LogEntry::now("b"));
        log.push(LogEntry::now("c"));

        let messages: Vec<_> = log.entries().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["b", "c"]);
        assert_eq!(log.evicted(), 1);
    }

    #[test]
    fn clear_empties_log() {
        let mut log = EventLog::new(4);
        log.push(LogEntry::now("a"));
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.evicted(), 0);
    }

    #[test]
    fn entry_and_title_formatting() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 3).unwrap();
        let entry = LogEntry {
            at,
            message: "Drowsiness Detected".into(),
        };
        assert_eq!(entry.to_string(), "07:05:03 -- Drowsiness Detected");

        let log = EventLog::new(1);
        assert!(log.title().starts_with("LOG File ["));
        assert!(log.title().contains(" -- "));
    }
}
