//! Durable event journal
//!
//! One append-only file per scenario at
//! `<data_dir>/events/<tenant>/<scenario>.log`, one line per event:
//!
//! ```text
//! {"crc":<u32>,"event":{...}}
//! ```
//!
//! The CRC32 covers the exact event JSON bytes. Every line is fsynced
//! before the event becomes visible. Replay verifies every checksum and the
//! sequence contiguity of every file; any damage halts startup.
//!
//! A file is opened only for the duration of one append. The caller tracks
//! the committed length of each file; a failed append is cut back to it, and
//! bytes past it found before the next append are cut as well.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::observability::{log_event, LogEvent, Logger};

use super::errors::{EventLogError, EventLogResult};
use super::event::{Event, ScenarioKey};

const LINE_PREFIX: &str = "{\"crc\":";
const EVENT_FIELD: &str = ",\"event\":";

/// Journal root
#[derive(Debug, Clone)]
pub struct EventJournal {
    root: PathBuf,
}

/// File-like target of a journal append
pub trait JournalFile: Write {
    fn size(&self) -> io::Result<u64>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

impl JournalFile for File {
    fn size(&self) -> io::Result<u64> {
        self.metadata().map(|m| m.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

impl EventJournal {
    /// Open (creating if needed) the journal under `data_dir`.
    pub fn open(data_dir: &Path) -> EventLogResult<Self> {
        let root = data_dir.join("events");
        fs::create_dir_all(&root).map_err(|e| {
            EventLogError::JournalIo(format!("create {}: {}", root.display(), e))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the journal file for a scenario
    pub fn path_for(&self, key: &ScenarioKey) -> PathBuf {
        self.root
            .join(path_segment(&key.0))
            .join(format!("{}.log", key.1))
    }

    /// Append one event to its scenario's file and fsync.
    ///
    /// `committed` is the verified length of the file. Returns the new
    /// committed length; on error the file is cut back to `committed`.
    pub fn append(&self, event: &Event, committed: u64) -> EventLogResult<u64> {
        let path = self.path_for(&event.key());
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| {
                EventLogError::JournalIo(format!("create {}: {}", dir.display(), e))
            })?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| EventLogError::JournalIo(format!("open {}: {}", path.display(), e)))?;
        append_committed(&mut file, &path, event, committed)
    }

    /// Current length of a scenario's file, 0 when absent
    pub fn committed_len(&self, key: &ScenarioKey) -> EventLogResult<u64> {
        let path = self.path_for(key);
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(EventLogError::JournalIo(format!("stat {}: {}", path.display(), e))),
        }
    }

    /// Read back every scenario journal.
    ///
    /// Streams are returned sorted by tenant then scenario, events by
    /// sequence. Any checksum, parse or contiguity failure is fatal.
    pub fn replay_all(&self) -> EventLogResult<Vec<(ScenarioKey, Vec<Event>)>> {
        log_event(
            LogEvent::JournalReplayBegin,
            &[("root", self.root.display().to_string().as_str())],
        );

        let mut files = Vec::new();
        for tenant_dir in read_dir_sorted(&self.root)? {
            if tenant_dir.is_dir() {
                for file in read_dir_sorted(&tenant_dir)? {
                    if file.extension().map_or(false, |ext| ext == "log") {
                        files.push(file);
                    }
                }
            }
        }

        let mut streams = Vec::with_capacity(files.len());
        let mut total = 0usize;
        for path in files {
            let events = Self::read_file(&path)?;
            if let Some(first) = events.first() {
                total += events.len();
                streams.push((first.key(), events));
            }
        }
        streams.sort_by(|a, b| a.0.cmp(&b.0));

        log_event(
            LogEvent::JournalReplayComplete,
            &[
                ("scenarios", streams.len().to_string().as_str()),
                ("events", total.to_string().as_str()),
            ],
        );
        Ok(streams)
    }

    /// Read and verify one journal file.
    pub fn read_file(path: &Path) -> EventLogResult<Vec<Event>> {
        let file = File::open(path)
            .map_err(|e| EventLogError::JournalIo(format!("open {}: {}", path.display(), e)))?;
        let corrupt = |line: usize, reason: String| {
            let err = EventLogError::JournalCorruption {
                path: path.display().to_string(),
                line,
                reason,
            };
            log_event(
                LogEvent::JournalCorruption,
                &[
                    ("path", path.display().to_string().as_str()),
                    ("line", line.to_string().as_str()),
                ],
            );
            err
        };

        let mut events: Vec<Event> = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line_no = index + 1;
            let line = line.map_err(|e| corrupt(line_no, format!("unreadable line: {}", e)))?;
            let event = decode_line(&line).map_err(|reason| corrupt(line_no, reason))?;

            let expected = events.len() as u64 + 1;
            if event.sequence != expected {
                return Err(corrupt(
                    line_no,
                    format!("sequence {} where {} was expected", event.sequence, expected),
                ));
            }
            if let Some(first) = events.first() {
                if first.key() != event.key() {
                    return Err(corrupt(line_no, "event belongs to another scenario".into()));
                }
            }
            events.push(event);
        }
        Ok(events)
    }
}

/// Write one event line after `committed` bytes and fsync.
///
/// Bytes past `committed` belong to an earlier failed append and are cut
/// first. Any write or fsync failure cuts the file back to `committed`.
pub fn append_committed<F: JournalFile>(
    file: &mut F,
    path: &Path,
    event: &Event,
    committed: u64,
) -> EventLogResult<u64> {
    let io_err = |op: &str, e: io::Error| {
        EventLogError::JournalIo(format!(
            "{} {} sequence {}: {}",
            op,
            path.display(),
            event.sequence,
            e
        ))
    };
    let line = encode_line(event)?;

    let size = file.size().map_err(|e| io_err("stat", e))?;
    if size < committed {
        return Err(EventLogError::JournalIo(format!(
            "{} is {} bytes, {} were committed",
            path.display(),
            size,
            committed
        )));
    }
    if size > committed {
        rollback(file, path, size, committed).map_err(|e| io_err("truncate", e))?;
    }

    let written = file
        .write_all(line.as_bytes())
        .map_err(|e| io_err("write", e))
        .and_then(|_| file.sync().map_err(|e| io_err("fsync", e)));
    match written {
        Ok(()) => Ok(committed + line.len() as u64),
        Err(err) => {
            let size = file.size().unwrap_or(committed + line.len() as u64);
            if let Err(e) = rollback(file, path, size, committed) {
                // cut again before the next append
                Logger::error(
                    LogEvent::JournalRollback,
                    &[("path", path.display().to_string().as_str()), ("error", e.to_string().as_str())],
                );
            }
            Err(err)
        }
    }
}

fn rollback<F: JournalFile>(file: &mut F, path: &Path, size: u64, committed: u64) -> io::Result<()> {
    file.truncate(committed)?;
    file.sync()?;
    Logger::warn(
        LogEvent::JournalRollback,
        &[
            ("path", path.display().to_string().as_str()),
            ("cut_bytes", size.saturating_sub(committed).to_string().as_str()),
        ],
    );
    Ok(())
}

/// Render one journal line, including the newline
pub fn encode_line(event: &Event) -> EventLogResult<String> {
    let json = serde_json::to_string(event)
        .map_err(|e| EventLogError::Internal(format!("serialize event: {}", e)))?;
    let crc = crc32fast::hash(json.as_bytes());
    Ok(format!("{}{}{}{}}}\n", LINE_PREFIX, crc, EVENT_FIELD, json))
}

/// Parse and verify one journal line
pub fn decode_line(line: &str) -> Result<Event, String> {
    let rest = line
        .strip_prefix(LINE_PREFIX)
        .ok_or_else(|| "missing crc field".to_string())?;
    let split = rest
        .find(EVENT_FIELD)
        .ok_or_else(|| "missing event field".to_string())?;
    let crc: u32 = rest[..split]
        .parse()
        .map_err(|_| format!("bad crc '{}'", &rest[..split]))?;
    let json = rest[split + EVENT_FIELD.len()..]
        .strip_suffix('}')
        .ok_or_else(|| "truncated record".to_string())?;

    let actual = crc32fast::hash(json.as_bytes());
    if actual != crc {
        return Err(format!("checksum mismatch: stored {}, computed {}", crc, actual));
    }
    serde_json::from_str(json).map_err(|e| format!("undecodable event: {}", e))
}

/// Tenant ids become directory names; anything outside `[A-Za-z0-9_-]`
/// is hex-escaped so no tenant id can leave the journal root.
fn path_segment(tenant: &str) -> String {
    let mut out = String::with_capacity(tenant.len());
    for b in tenant.bytes() {
        if b.is_ascii_alphanumeric() || b == b'_' || b == b'-' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02x}", b));
        }
    }
    if out.is_empty() {
        out.push('%');
    }
    out
}

fn read_dir_sorted(dir: &Path) -> EventLogResult<Vec<PathBuf>> {
    let mut entries = Vec::new();
    let iter = fs::read_dir(dir)
        .map_err(|e| EventLogError::JournalIo(format!("read {}: {}", dir.display(), e)))?;
    for entry in iter {
        let entry =
            entry.map_err(|e| EventLogError::JournalIo(format!("read {}: {}", dir.display(), e)))?;
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}
