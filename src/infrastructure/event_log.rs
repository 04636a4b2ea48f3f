//! Newline-delimited JSON event log.
//!
//! Each event is one JSON object on its own line, appended to a single file
//! that is never rewritten. A record torn by a crash is just a line that
//! fails to parse: readers skip it, and the next append starts on a fresh
//! line so the damage never spreads to later records.

use crate::application::ports::{EventLog, EventLogError};
use crate::domain::event::Event;
use chrono::{DateTime, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};

/// Default location of the log, relative to the working directory.
pub const DEFAULT_LOG_PATH: &str = ".data/telemetry.jsonl";

/// Append-only JSONL file.
///
/// Appends take the write side of an internal lock and readers the read
/// side, so a reader never sees half of a record written by this process.
#[derive(Debug)]
pub struct JsonlEventLog {
    path: PathBuf,
    lock: RwLock<()>,
}

impl JsonlEventLog {
    /// Create a log backed by `path`. Nothing is touched on disk until the first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_for_append(&self) -> io::Result<File> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
    }

    /// Parse every readable record, keeping those accepted by `keep`.
    fn scan(&self, mut keep: impl FnMut(&Event) -> bool) -> Result<Vec<Event>, EventLogError> {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);

        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut events = Vec::new();
        let mut skipped = 0usize;
        for (index, line) in BufReader::new(file).split(b'\n').enumerate() {
            let line = line?;
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<Event>(&line) {
                Ok(event) => {
                    if keep(&event) {
                        events.push(event);
                    }
                }
                Err(err) => {
                    skipped += 1;
                    debug!(line = index + 1, error = %err, "skipping malformed telemetry record");
                }
            }
        }

        if skipped > 0 {
            warn!(
                path = %self.path.display(),
                skipped,
                "telemetry log contains unreadable records"
            );
        }
        Ok(events)
    }
}

/// True when the file is non-empty and does not end with a newline.
fn ends_mid_record(file: &mut File) -> io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

impl EventLog for JsonlEventLog {
    fn append(&self, event: &Event) -> Result<(), EventLogError> {
        let mut record = serde_json::to_vec(event)?;
        record.push(b'\n');

        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        let mut file = self.open_for_append()?;
        if ends_mid_record(&mut file)? {
            record.insert(0, b'\n');
        }
        file.write_all(&record)?;
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<Event>, EventLogError> {
        self.scan(|_| true)
    }

    fn read_since(&self, since: DateTime<Utc>) -> Result<Vec<Event>, EventLogError> {
        self.scan(|event| event.timestamp() >= since)
    }
}
